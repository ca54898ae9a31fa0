use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use super::tenant_resolver::{AccessError, DenyReason, TenantScope};
use super::ServiceError;
use crate::database::models::{timestamp, AgentBreak, BreakStatus, BreakWithAgent};
use crate::database::repository::breaks::group_by_day;
use crate::database::repository::{BreakRepository, NewBreak};

#[derive(Debug, Clone, Deserialize)]
pub struct RecordBreakInput {
    pub agent_number: Option<String>,
    pub status: Option<BreakStatus>,
    #[serde(default, with = "timestamp::option")]
    pub break_start: Option<NaiveDateTime>,
    #[serde(default, with = "timestamp::option")]
    pub break_end: Option<NaiveDateTime>,
    pub remark: Option<String>,
}

/// A finished break reported after the fact
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakRangeInput {
    pub agent_number: Option<String>,
    #[serde(default, with = "timestamp::option")]
    pub from_time: Option<NaiveDateTime>,
    #[serde(default, with = "timestamp::option")]
    pub to_time: Option<NaiveDateTime>,
    pub remark: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CloseBreakInput {
    pub agent_number: Option<String>,
    #[serde(default, with = "timestamp::option")]
    pub break_end: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BreakDay {
    pub date: String,
    pub breaks: Vec<BreakWithAgent>,
}

pub struct BreakService {
    breaks: BreakRepository,
    scope: TenantScope,
}

impl BreakService {
    pub fn new(pool: PgPool, scope: TenantScope) -> Self {
        Self {
            breaks: BreakRepository::new(pool, &scope.tables),
            scope,
        }
    }

    /// The agent a break request acts on. Agents act only on themselves;
    /// admins name the agent explicitly.
    fn target_agent(&self, requested: Option<String>) -> Result<String, ServiceError> {
        let requested = requested.map(|a| a.trim().to_string()).filter(|a| !a.is_empty());
        if self.scope.is_admin() {
            return requested.ok_or_else(|| ServiceError::Validation("agent_number is required".to_string()));
        }
        let own = self.scope.acting_agent().unwrap_or_default().to_string();
        match requested {
            Some(other) if other != own => Err(AccessError::Denied(DenyReason::RoleNotPermitted).into()),
            _ => Ok(own),
        }
    }

    pub async fn record(&self, input: RecordBreakInput) -> Result<AgentBreak, ServiceError> {
        self.scope.ensure_writable()?;
        let agent_number = self.target_agent(input.agent_number)?;
        let status = input
            .status
            .ok_or_else(|| ServiceError::Validation("Missing required fields".to_string()))?;

        let entry = NewBreak {
            agent_number,
            status,
            break_start: input.break_start,
            break_end: input.break_end,
            remark: input.remark,
        };
        Ok(self.breaks.record(&entry).await?)
    }

    pub async fn record_range(&self, input: BreakRangeInput) -> Result<AgentBreak, ServiceError> {
        self.scope.ensure_writable()?;
        let agent_number = self.target_agent(input.agent_number)?;
        let (Some(start), Some(end)) = (input.from_time, input.to_time) else {
            return Err(ServiceError::Validation("fromTime and toTime are required".to_string()));
        };
        if end <= start {
            return Err(ServiceError::Validation("toTime must be after fromTime".to_string()));
        }

        let entry = NewBreak {
            agent_number,
            status: BreakStatus::Break,
            break_start: Some(start),
            break_end: Some(end),
            remark: Some(input.remark.unwrap_or_default()),
        };
        Ok(self.breaks.record(&entry).await?)
    }

    pub async fn close_latest(&self, input: CloseBreakInput) -> Result<AgentBreak, ServiceError> {
        self.scope.ensure_writable()?;
        let agent_number = self.target_agent(input.agent_number)?;
        let end = input.break_end.unwrap_or_else(|| Local::now().naive_local());
        Ok(self.breaks.close_latest(&agent_number, end).await?)
    }

    pub async fn list_by_day(&self, search: Option<&str>) -> Result<Vec<BreakDay>, ServiceError> {
        self.scope.require_admin()?;
        let rows = self.breaks.list(search).await?;
        Ok(group_by_day(rows)
            .into_iter()
            .map(|(date, breaks)| BreakDay { date, breaks })
            .collect())
    }
}
