use chrono::{Days, NaiveDate, NaiveDateTime};
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::collections::HashMap;

use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::database::models::CallRecord;
use crate::database::naming::TableSet;

const CALL_COLUMNS: &str = r#"id, agent_number, customer_number, duration, call_status, "timestamp",
    remarks, name, remarks_status, (recordings IS NOT NULL) AS has_recording,
    alternative_numbers, meeting_datetime, meeting_description"#;

#[derive(Debug, Clone, Default)]
pub struct CallFilter {
    /// Restrict to one agent's calls
    pub agent_number: Option<String>,
    /// Inclusive day bounds on the call timestamp
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
pub struct NewCall {
    pub agent_number: String,
    pub customer_number: String,
    pub duration: Option<i32>,
    pub call_status: Option<String>,
    pub timestamp: Option<NaiveDateTime>,
    pub name: Option<String>,
    pub remarks: Option<String>,
}

/// Client-supplied annotation of a call. Remarks and remark status are
/// appended to the history; the other fields replace the stored value.
#[derive(Debug, Clone, Default)]
pub struct CallAnnotation {
    pub remarks: Option<String>,
    pub remarks_status: Option<String>,
    pub name: Option<String>,
    pub alternative_numbers: Option<String>,
    pub meeting_datetime: Option<NaiveDateTime>,
    pub meeting_description: Option<String>,
}

/// The annotatable columns of one call
#[derive(Debug, Clone, Default, PartialEq, sqlx::FromRow)]
pub struct CallNotes {
    pub customer_number: String,
    pub remarks: Option<String>,
    pub name: Option<String>,
    pub remarks_status: Option<String>,
    pub alternative_numbers: Option<String>,
    pub meeting_datetime: Option<NaiveDateTime>,
    pub meeting_description: Option<String>,
}

/// Append `entry` to a `|`-separated history, stamping it with `now`
pub fn append_history(existing: Option<&str>, entry: &str, now: NaiveDateTime) -> String {
    let stamped = format!(
        "{} <span style='font-size:10px;color:gray;'>[{}]</span>",
        entry,
        now.format("%d/%m/%Y %H:%M:%S")
    );
    match existing.filter(|s| !s.is_empty()) {
        Some(old) => format!("{} | {}", old, stamped),
        None => stamped,
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl CallAnnotation {
    /// Fold this annotation into the stored notes
    pub fn apply(&self, current: &CallNotes, now: NaiveDateTime) -> CallNotes {
        let mut next = current.clone();
        if let Some(entry) = non_blank(&self.remarks) {
            next.remarks = Some(append_history(current.remarks.as_deref(), entry, now));
        }
        if let Some(entry) = non_blank(&self.remarks_status) {
            next.remarks_status = Some(append_history(current.remarks_status.as_deref(), entry, now));
        }
        if let Some(name) = non_blank(&self.name) {
            next.name = Some(name.to_string());
        }
        if let Some(numbers) = non_blank(&self.alternative_numbers) {
            next.alternative_numbers = Some(numbers.to_string());
        }
        if self.meeting_datetime.is_some() {
            next.meeting_datetime = self.meeting_datetime;
        }
        if let Some(description) = non_blank(&self.meeting_description) {
            next.meeting_description = Some(description.to_string());
        }
        next
    }

    pub fn renames_customer(&self) -> bool {
        non_blank(&self.name).is_some()
    }
}

/// Show each customer under one name: the most recent non-empty one.
/// `calls` must be ordered newest first.
pub fn unify_customer_names(calls: &mut [CallRecord]) {
    let mut latest: HashMap<String, String> = HashMap::new();
    for call in calls.iter() {
        if let Some(name) = call.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            latest
                .entry(call.customer_number.clone())
                .or_insert_with(|| name.to_string());
        }
    }
    for call in calls.iter_mut() {
        if let Some(name) = latest.get(&call.customer_number) {
            call.name = Some(name.clone());
        }
    }
}

pub struct CallRepository {
    pool: PgPool,
    table: String,
}

impl CallRepository {
    pub fn new(pool: PgPool, tables: &TableSet) -> Self {
        Self {
            pool,
            table: DatabaseManager::quote_identifier(&tables.calls),
        }
    }

    /// Calls newest first, names unified per customer
    pub async fn list(&self, filter: &CallFilter) -> Result<Vec<CallRecord>, DatabaseError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM {} WHERE TRUE", CALL_COLUMNS, self.table));
        if let Some(agent) = &filter.agent_number {
            builder.push(" AND agent_number = ").push_bind(agent);
        }
        if let Some(from) = filter.from.and_then(|d| d.and_hms_opt(0, 0, 0)) {
            builder.push(r#" AND "timestamp" >= "#).push_bind(from);
        }
        if let Some(end) = filter
            .to
            .and_then(|d| d.checked_add_days(Days::new(1)))
            .and_then(|d| d.and_hms_opt(0, 0, 0))
        {
            builder.push(r#" AND "timestamp" < "#).push_bind(end);
        }
        builder.push(r#" ORDER BY "timestamp" DESC, id DESC"#);

        let mut calls = builder.build_query_as::<CallRecord>().fetch_all(&self.pool).await?;
        unify_customer_names(&mut calls);
        Ok(calls)
    }

    pub async fn find(&self, call_id: i32) -> Result<Option<CallRecord>, DatabaseError> {
        let call = sqlx::query_as::<_, CallRecord>(&format!("SELECT {} FROM {} WHERE id = $1", CALL_COLUMNS, self.table))
            .bind(call_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(call)
    }

    pub async fn create(&self, call: &NewCall) -> Result<CallRecord, DatabaseError> {
        let created = sqlx::query_as::<_, CallRecord>(&format!(
            r#"INSERT INTO {} (agent_number, customer_number, duration, call_status, "timestamp", name, remarks)
               VALUES ($1, $2, $3, $4, COALESCE($5, CURRENT_TIMESTAMP), $6, $7)
               RETURNING {}"#,
            self.table, CALL_COLUMNS
        ))
        .bind(&call.agent_number)
        .bind(&call.customer_number)
        .bind(call.duration)
        .bind(&call.call_status)
        .bind(call.timestamp)
        .bind(&call.name)
        .bind(&call.remarks)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    /// Apply an annotation atomically. A new display name is propagated to every
    /// call with the same customer number in this table. `owner` restricts the
    /// call to one agent's.
    pub async fn annotate(
        &self,
        call_id: i32,
        owner: Option<&str>,
        annotation: &CallAnnotation,
        now: NaiveDateTime,
    ) -> Result<CallRecord, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, CallNotes>(&format!(
            "SELECT customer_number, remarks, name, remarks_status, alternative_numbers,
                    meeting_datetime, meeting_description
             FROM {} WHERE id = $1 AND ($2::text IS NULL OR agent_number = $2) FOR UPDATE",
            self.table
        ))
        .bind(call_id)
        .bind(owner)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DatabaseError::NotFound("Call not found".to_string()))?;

        let next = annotation.apply(&current, now);
        sqlx::query(&format!(
            "UPDATE {} SET remarks = $1, name = $2, remarks_status = $3, alternative_numbers = $4,
                    meeting_datetime = $5, meeting_description = $6
             WHERE id = $7",
            self.table
        ))
        .bind(&next.remarks)
        .bind(&next.name)
        .bind(&next.remarks_status)
        .bind(&next.alternative_numbers)
        .bind(next.meeting_datetime)
        .bind(&next.meeting_description)
        .bind(call_id)
        .execute(&mut *tx)
        .await?;

        if annotation.renames_customer() {
            sqlx::query(&format!("UPDATE {} SET name = $1 WHERE customer_number = $2", self.table))
                .bind(&next.name)
                .bind(&current.customer_number)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        self.find(call_id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound("Call not found".to_string()))
    }

    pub async fn update_alternative_numbers(
        &self,
        call_id: i32,
        owner: Option<&str>,
        numbers: &str,
    ) -> Result<(), DatabaseError> {
        let affected = sqlx::query(&format!(
            "UPDATE {} SET alternative_numbers = $1 WHERE id = $2 AND ($3::text IS NULL OR agent_number = $3)",
            self.table
        ))
        .bind(numbers)
        .bind(call_id)
        .bind(owner)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if affected == 0 {
            return Err(DatabaseError::NotFound("Call not found".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 8, 7).unwrap().and_hms_opt(h, m, s).unwrap()
    }

    fn call(id: i32, customer: &str, name: Option<&str>) -> CallRecord {
        CallRecord {
            id,
            agent_number: "1000000000".into(),
            customer_number: customer.into(),
            duration: Some(60),
            call_status: Some("Completed".into()),
            timestamp: at(10, 0, id as u32),
            remarks: None,
            name: name.map(String::from),
            remarks_status: None,
            has_recording: false,
            alternative_numbers: None,
            meeting_datetime: None,
            meeting_description: None,
        }
    }

    #[test]
    fn history_entries_are_stamped_and_joined() {
        let first = append_history(None, "called back", at(9, 5, 0));
        assert_eq!(
            first,
            "called back <span style='font-size:10px;color:gray;'>[07/08/2025 09:05:00]</span>"
        );
        let second = append_history(Some(&first), "no answer", at(11, 0, 0));
        assert!(second.starts_with(&first));
        assert!(second.contains(" | no answer <span"));
        assert_eq!(append_history(Some(""), "x", at(1, 0, 0)).matches('|').count(), 0);
    }

    #[test]
    fn annotation_appends_history_and_replaces_the_rest() {
        let current = CallNotes {
            customer_number: "+1555".into(),
            remarks: Some("old".into()),
            name: Some("Old Name".into()),
            remarks_status: None,
            alternative_numbers: Some("111".into()),
            meeting_datetime: None,
            meeting_description: None,
        };
        let annotation = CallAnnotation {
            remarks: Some("follow up".into()),
            remarks_status: Some("Interested".into()),
            name: Some("  New Name ".into()),
            alternative_numbers: Some(String::new()),
            meeting_datetime: Some(at(16, 0, 0)),
            meeting_description: Some("demo".into()),
        };
        let next = annotation.apply(&current, at(12, 0, 0));
        assert!(next.remarks.as_deref().unwrap().starts_with("old | follow up"));
        assert!(next.remarks_status.as_deref().unwrap().starts_with("Interested <span"));
        assert_eq!(next.name.as_deref(), Some("New Name"));
        assert_eq!(next.alternative_numbers.as_deref(), Some("111"));
        assert_eq!(next.meeting_datetime, Some(at(16, 0, 0)));
        assert!(annotation.renames_customer());
    }

    #[test]
    fn empty_annotation_changes_nothing() {
        let current = CallNotes {
            customer_number: "+1".into(),
            remarks: Some("kept".into()),
            ..CallNotes::default()
        };
        let annotation = CallAnnotation {
            name: Some("   ".into()),
            ..CallAnnotation::default()
        };
        assert_eq!(annotation.apply(&current, at(1, 0, 0)), current);
        assert!(!annotation.renames_customer());
    }

    #[test]
    fn names_unify_to_latest_non_empty() {
        // newest first
        let mut calls = vec![
            call(3, "+1", Some("")),
            call(2, "+1", Some("Latest")),
            call(1, "+1", Some("Oldest")),
            call(0, "+2", None),
        ];
        unify_customer_names(&mut calls);
        assert!(calls[..3].iter().all(|c| c.name.as_deref() == Some("Latest")));
        assert_eq!(calls[3].name, None);
    }
}
