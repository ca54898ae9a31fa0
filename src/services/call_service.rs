use chrono::{Local, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use sqlx::PgPool;

use super::tenant_resolver::TenantScope;
use super::ServiceError;
use crate::database::models::{timestamp, CallRecord};
use crate::database::repository::{CallAnnotation, CallFilter, CallRepository, NewCall};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallListQuery {
    pub from: Option<String>,
    pub to: Option<String>,
}

impl CallListQuery {
    pub fn bounds(&self) -> Result<(Option<NaiveDate>, Option<NaiveDate>), ServiceError> {
        let day = |value: &Option<String>, label: &str| -> Result<Option<NaiveDate>, ServiceError> {
            match value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                None => Ok(None),
                Some(v) => NaiveDate::parse_from_str(v, "%Y-%m-%d")
                    .map(Some)
                    .map_err(|_| ServiceError::Validation(format!("'{}' must be a YYYY-MM-DD date", label))),
            }
        };
        Ok((day(&self.from, "from")?, day(&self.to, "to")?))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnnotateCallInput {
    pub remarks: Option<String>,
    pub remarks_status: Option<String>,
    pub name: Option<String>,
    pub alternative_numbers: Option<String>,
    #[serde(default, with = "timestamp::option")]
    pub meeting_datetime: Option<NaiveDateTime>,
    pub meeting_description: Option<String>,
}

impl From<AnnotateCallInput> for CallAnnotation {
    fn from(input: AnnotateCallInput) -> Self {
        CallAnnotation {
            remarks: input.remarks,
            remarks_status: input.remarks_status,
            name: input.name,
            alternative_numbers: input.alternative_numbers,
            meeting_datetime: input.meeting_datetime,
            meeting_description: input.meeting_description,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogCallInput {
    pub agent_number: Option<String>,
    pub customer_number: Option<String>,
    pub duration: Option<i32>,
    pub call_status: Option<String>,
    #[serde(default, with = "timestamp::option")]
    pub timestamp: Option<NaiveDateTime>,
    pub name: Option<String>,
    pub remarks: Option<String>,
}

pub struct CallService {
    calls: CallRepository,
    scope: TenantScope,
}

impl CallService {
    pub fn new(pool: PgPool, scope: TenantScope) -> Self {
        Self {
            calls: CallRepository::new(pool, &scope.tables),
            scope,
        }
    }

    pub async fn list(&self, query: &CallListQuery) -> Result<Vec<CallRecord>, ServiceError> {
        let (from, to) = query.bounds()?;
        let filter = CallFilter {
            agent_number: self.scope.agent_filter().map(str::to_string),
            from,
            to,
        };
        Ok(self.calls.list(&filter).await?)
    }

    pub async fn annotate(&self, call_id: i32, input: AnnotateCallInput) -> Result<CallRecord, ServiceError> {
        self.scope.ensure_writable()?;
        let annotation = CallAnnotation::from(input);
        let now = Local::now().naive_local();
        Ok(self
            .calls
            .annotate(call_id, self.scope.agent_filter(), &annotation, now)
            .await?)
    }

    pub async fn set_alternative_numbers(&self, call_id: i32, numbers: Option<String>) -> Result<(), ServiceError> {
        self.scope.ensure_writable()?;
        let numbers = numbers.unwrap_or_default();
        Ok(self
            .calls
            .update_alternative_numbers(call_id, self.scope.agent_filter(), numbers.trim())
            .await?)
    }

    pub async fn log(&self, input: LogCallInput) -> Result<CallRecord, ServiceError> {
        self.scope.ensure_writable()?;
        let agent_number = match self.scope.agent_filter() {
            Some(own) => own.to_string(),
            None => input
                .agent_number
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .ok_or_else(|| ServiceError::Validation("agent_number is required".to_string()))?,
        };
        let customer_number = input
            .customer_number
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ServiceError::Validation("customer_number is required".to_string()))?;

        let call = NewCall {
            agent_number,
            customer_number,
            duration: input.duration,
            call_status: input.call_status,
            timestamp: Some(input.timestamp.unwrap_or_else(|| Local::now().naive_local())),
            name: input.name,
            remarks: input.remarks,
        };
        Ok(self.calls.create(&call).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_day_bounds() {
        let query = CallListQuery {
            from: Some("2025-08-01".into()),
            to: Some(" ".into()),
        };
        let (from, to) = query.bounds().unwrap();
        assert_eq!(from, NaiveDate::from_ymd_opt(2025, 8, 1));
        assert_eq!(to, None);

        let bad = CallListQuery {
            from: Some("01/08/2025".into()),
            to: None,
        };
        assert!(matches!(bad.bounds(), Err(ServiceError::Validation(_))));
    }

    #[test]
    fn annotation_carries_every_field() {
        let input: AnnotateCallInput = serde_json::from_value(serde_json::json!({
            "remarks": "called back",
            "name": "Ravi",
            "meeting_datetime": "2025-08-09T11:30",
            "meeting_description": ""
        }))
        .unwrap();
        let annotation = CallAnnotation::from(input);
        assert_eq!(annotation.remarks.as_deref(), Some("called back"));
        assert!(annotation.renames_customer());
        assert!(annotation.meeting_datetime.is_some());
    }
}
