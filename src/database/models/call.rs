use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::FromRow;

/// Call log entry as listed to clients. The recording payload is never
/// loaded here; `has_recording` reports whether one is stored.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CallRecord {
    pub id: i32,
    pub agent_number: String,
    pub customer_number: String,
    pub duration: Option<i32>,
    pub call_status: Option<String>,
    #[serde(with = "super::timestamp")]
    pub timestamp: NaiveDateTime,
    pub remarks: Option<String>,
    pub name: Option<String>,
    pub remarks_status: Option<String>,
    pub has_recording: bool,
    pub alternative_numbers: Option<String>,
    #[serde(with = "super::timestamp::option")]
    pub meeting_datetime: Option<NaiveDateTime>,
    pub meeting_description: Option<String>,
}
