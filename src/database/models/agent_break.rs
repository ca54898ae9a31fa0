use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::FromRow;

text_enum! {
    BreakStatus {
        Working => "Working",
        Break => "Break",
    }
}

/// Row of `agent_breaks` or `agent_breaks_{tenant}`
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AgentBreak {
    pub id: i32,
    pub agent_number: String,
    #[sqlx(try_from = "String")]
    pub status: BreakStatus,
    #[serde(with = "super::timestamp::option")]
    pub break_start: Option<NaiveDateTime>,
    #[serde(with = "super::timestamp::option")]
    pub break_end: Option<NaiveDateTime>,
    pub duration_seconds: Option<i32>,
    pub remark: Option<String>,
    #[serde(with = "super::timestamp")]
    pub created_at: NaiveDateTime,
}

impl AgentBreak {
    /// A break that has started and not yet ended
    pub fn is_open(&self) -> bool {
        self.status == BreakStatus::Break && self.break_end.is_none()
    }

    /// Day the row is filed under in break reports
    pub fn report_day(&self) -> String {
        self.break_start
            .unwrap_or(self.created_at)
            .format("%Y-%m-%d")
            .to_string()
    }
}

/// Break row joined with the agent's display fields
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct BreakWithAgent {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub entry: AgentBreak,
    pub agent_name: Option<String>,
    pub agent_email: Option<String>,
}
