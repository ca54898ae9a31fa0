use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use std::collections::BTreeMap;

use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::database::models::{AgentBreak, BreakStatus, BreakWithAgent};
use crate::database::naming::TableSet;

const BREAK_COLUMNS: &str = "id, agent_number, status, break_start, break_end, duration_seconds, remark, created_at";

#[derive(Debug, Clone)]
pub struct NewBreak {
    pub agent_number: String,
    pub status: BreakStatus,
    pub break_start: Option<NaiveDateTime>,
    pub break_end: Option<NaiveDateTime>,
    pub remark: Option<String>,
}

impl NewBreak {
    pub fn opens_break(&self) -> bool {
        self.status == BreakStatus::Break && self.break_end.is_none()
    }
}

/// Whole seconds from `start` to `end`; `end` may not precede `start`
pub fn break_duration_seconds(start: NaiveDateTime, end: NaiveDateTime) -> Result<i32, DatabaseError> {
    let seconds = (end - start).num_seconds();
    if seconds < 0 {
        return Err(DatabaseError::InvalidArgument(
            "break end must not be before break start".to_string(),
        ));
    }
    i32::try_from(seconds).map_err(|_| DatabaseError::InvalidArgument("break is too long".to_string()))
}

/// Break rows keyed by report day (`YYYY-MM-DD`), newest day first, rows in input order
pub fn group_by_day(rows: Vec<BreakWithAgent>) -> Vec<(String, Vec<BreakWithAgent>)> {
    let mut days: BTreeMap<String, Vec<BreakWithAgent>> = BTreeMap::new();
    for row in rows {
        days.entry(row.entry.report_day()).or_default().push(row);
    }
    days.into_iter().rev().collect()
}

/// An agent's present state, derived from their latest break row
#[derive(Debug, Clone, Serialize)]
pub struct AgentCurrentStatus {
    pub agent_number: String,
    pub name: String,
    pub status: BreakStatus,
    #[serde(with = "crate::database::models::timestamp::option")]
    pub since: Option<NaiveDateTime>,
}

#[derive(Debug, FromRow)]
struct LatestBreakRow {
    agent_number: String,
    name: String,
    last_status: Option<String>,
    break_start: Option<NaiveDateTime>,
    break_end: Option<NaiveDateTime>,
}

impl LatestBreakRow {
    fn into_status(self) -> AgentCurrentStatus {
        let on_break = self.last_status.as_deref() == Some(BreakStatus::Break.as_str()) && self.break_end.is_none();
        AgentCurrentStatus {
            agent_number: self.agent_number,
            name: self.name,
            status: if on_break { BreakStatus::Break } else { BreakStatus::Working },
            since: if on_break { self.break_start } else { self.break_end },
        }
    }
}

pub struct BreakRepository {
    pool: PgPool,
    raw_table: String,
    table: String,
    agents: String,
}

impl BreakRepository {
    pub fn new(pool: PgPool, tables: &TableSet) -> Self {
        Self {
            pool,
            raw_table: tables.breaks.clone(),
            table: DatabaseManager::quote_identifier(&tables.breaks),
            agents: DatabaseManager::quote_identifier(&tables.agents),
        }
    }

    /// Insert a status row. Opening a second break while one is open is a conflict.
    pub async fn record(&self, entry: &NewBreak) -> Result<AgentBreak, DatabaseError> {
        let duration = match (entry.break_start, entry.break_end) {
            (Some(start), Some(end)) => Some(break_duration_seconds(start, end)?),
            _ => None,
        };

        let mut tx = self.pool.begin().await?;

        if entry.opens_break() {
            // serialize concurrent opens for the same agent in the same table
            sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
                .bind(format!("{}:{}", self.raw_table, entry.agent_number))
                .execute(&mut *tx)
                .await?;

            let (open,): (i64,) = sqlx::query_as(&format!(
                "SELECT COUNT(*) FROM {} WHERE agent_number = $1 AND status = 'Break' AND break_end IS NULL",
                self.table
            ))
            .bind(&entry.agent_number)
            .fetch_one(&mut *tx)
            .await?;
            if open > 0 {
                return Err(DatabaseError::Duplicate {
                    field: "open break".to_string(),
                    value: entry.agent_number.clone(),
                });
            }
        }

        let created = sqlx::query_as::<_, AgentBreak>(&format!(
            "INSERT INTO {} (agent_number, status, break_start, break_end, duration_seconds, remark)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {}",
            self.table, BREAK_COLUMNS
        ))
        .bind(&entry.agent_number)
        .bind(entry.status.as_str())
        .bind(entry.break_start)
        .bind(entry.break_end)
        .bind(duration)
        .bind(&entry.remark)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(created)
    }

    /// Close the agent's most recent open break at `end`
    pub async fn close_latest(&self, agent_number: &str, end: NaiveDateTime) -> Result<AgentBreak, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let open = sqlx::query_as::<_, AgentBreak>(&format!(
            "SELECT {} FROM {}
             WHERE agent_number = $1 AND status = 'Break' AND break_end IS NULL
             ORDER BY break_start DESC NULLS LAST, id DESC
             LIMIT 1
             FOR UPDATE",
            BREAK_COLUMNS, self.table
        ))
        .bind(agent_number)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DatabaseError::NotFound("No ongoing break found".to_string()))?;

        let start = open.break_start.unwrap_or(open.created_at);
        let duration = break_duration_seconds(start, end)?;

        let closed = sqlx::query_as::<_, AgentBreak>(&format!(
            "UPDATE {} SET break_start = $1, break_end = $2, duration_seconds = $3 WHERE id = $4 RETURNING {}",
            self.table, BREAK_COLUMNS
        ))
        .bind(start)
        .bind(end)
        .bind(duration)
        .bind(open.id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(closed)
    }

    /// Break rows with agent names, newest first, optionally filtered by agent name or number
    pub async fn list(&self, search: Option<&str>) -> Result<Vec<BreakWithAgent>, DatabaseError> {
        let pattern = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")));

        let columns = BREAK_COLUMNS
            .split(", ")
            .map(|c| format!("b.{}", c))
            .collect::<Vec<_>>()
            .join(", ");

        let rows = sqlx::query_as::<_, BreakWithAgent>(&format!(
            "SELECT {columns}, a.name AS agent_name, a.email AS agent_email
             FROM {breaks} b
             LEFT JOIN {agents} a ON a.agent_number = b.agent_number
             WHERE ($1::text IS NULL OR a.name ILIKE $1 OR b.agent_number ILIKE $1)
             ORDER BY COALESCE(b.break_start, b.created_at) DESC, b.id DESC",
            columns = columns,
            breaks = self.table,
            agents = self.agents,
        ))
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Current status for every active non-admin agent, or only for `agent_number`
    pub async fn current_statuses(&self, agent_number: Option<&str>) -> Result<Vec<AgentCurrentStatus>, DatabaseError> {
        let rows = sqlx::query_as::<_, LatestBreakRow>(&format!(
            "SELECT a.agent_number, a.name, b.status AS last_status, b.break_start, b.break_end
             FROM {agents} a
             LEFT JOIN LATERAL (
                 SELECT status, break_start, break_end FROM {breaks}
                 WHERE agent_number = a.agent_number
                 ORDER BY COALESCE(break_start, created_at) DESC, id DESC
                 LIMIT 1
             ) b ON TRUE
             WHERE CASE WHEN $1::text IS NULL
                        THEN a.status = 'Active' AND NOT a.is_admin
                        ELSE a.agent_number = $1 END
             ORDER BY a.agent_number",
            agents = self.agents,
            breaks = self.table,
        ))
        .bind(agent_number)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(LatestBreakRow::into_status).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 8, day).unwrap().and_hms_opt(h, m, 0).unwrap()
    }

    fn row(id: i32, start: Option<NaiveDateTime>, end: Option<NaiveDateTime>) -> BreakWithAgent {
        BreakWithAgent {
            entry: AgentBreak {
                id,
                agent_number: "2000000000".into(),
                status: BreakStatus::Break,
                break_start: start,
                break_end: end,
                duration_seconds: None,
                remark: None,
                created_at: at(1, 0, 0),
            },
            agent_name: Some("Asha".into()),
            agent_email: None,
        }
    }

    #[test]
    fn duration_is_end_minus_start() {
        assert_eq!(break_duration_seconds(at(7, 10, 30), at(7, 10, 45)).unwrap(), 900);
        assert_eq!(break_duration_seconds(at(7, 10, 30), at(7, 10, 30)).unwrap(), 0);
        assert!(matches!(
            break_duration_seconds(at(7, 10, 45), at(7, 10, 30)),
            Err(DatabaseError::InvalidArgument(_))
        ));
    }

    #[test]
    fn groups_newest_day_first() {
        let grouped = group_by_day(vec![
            row(3, Some(at(8, 9, 0)), None),
            row(2, Some(at(7, 15, 0)), Some(at(7, 15, 15))),
            row(1, Some(at(7, 10, 0)), Some(at(7, 10, 15))),
            row(0, None, None),
        ]);
        let days: Vec<_> = grouped.iter().map(|(d, rows)| (d.as_str(), rows.len())).collect();
        assert_eq!(days, vec![("2025-08-08", 1), ("2025-08-07", 2), ("2025-08-01", 1)]);
        assert_eq!(grouped[1].1[0].entry.id, 2);
    }

    #[test]
    fn open_break_means_on_break() {
        let latest = |status: Option<&str>, end: Option<NaiveDateTime>| LatestBreakRow {
            agent_number: "2000000000".into(),
            name: "Asha".into(),
            last_status: status.map(String::from),
            break_start: Some(at(7, 10, 0)),
            break_end: end,
        };
        assert_eq!(latest(Some("Break"), None).into_status().status, BreakStatus::Break);
        assert_eq!(latest(Some("Break"), Some(at(7, 10, 5))).into_status().status, BreakStatus::Working);
        assert_eq!(latest(Some("Working"), None).into_status().status, BreakStatus::Working);
        assert_eq!(latest(None, None).into_status().status, BreakStatus::Working);
    }

    #[test]
    fn only_unterminated_breaks_open() {
        let entry = NewBreak {
            agent_number: "1".into(),
            status: BreakStatus::Break,
            break_start: Some(at(7, 9, 0)),
            break_end: None,
            remark: None,
        };
        assert!(entry.opens_break());
        assert!(!NewBreak { break_end: Some(at(7, 9, 5)), ..entry.clone() }.opens_break());
        assert!(!NewBreak { status: BreakStatus::Working, ..entry }.opens_break());
    }
}
