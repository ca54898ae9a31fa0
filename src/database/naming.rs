// Tenant table naming. Every per-tenant identifier that reaches SQL is built here.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::manager::DatabaseError;

/// Base entities that have a per-tenant copy
pub const TENANT_ENTITIES: [&str; 3] = ["agents", "calls", "agent_breaks"];

/// Positive tenant id, the primary key of `companies`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i32")]
pub struct TenantId(i32);

impl TenantId {
    pub fn new(id: i64) -> Result<Self, DatabaseError> {
        if id <= 0 {
            return Err(DatabaseError::InvalidArgument(format!(
                "tenant id must be a positive integer, got {}",
                id
            )));
        }
        i32::try_from(id)
            .map(TenantId)
            .map_err(|_| DatabaseError::InvalidArgument(format!("tenant id {} is out of range", id)))
    }

    pub fn get(self) -> i32 {
        self.0
    }
}

impl TryFrom<i64> for TenantId {
    type Error = DatabaseError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        TenantId::new(value)
    }
}

impl From<TenantId> for i32 {
    fn from(id: TenantId) -> Self {
        id.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenantEntity {
    Agents,
    Calls,
    AgentBreaks,
}

impl TenantEntity {
    pub const ALL: [TenantEntity; 3] = [TenantEntity::Agents, TenantEntity::Calls, TenantEntity::AgentBreaks];

    /// Shared (legacy) table name
    pub fn base_name(self) -> &'static str {
        match self {
            TenantEntity::Agents => "agents",
            TenantEntity::Calls => "calls",
            TenantEntity::AgentBreaks => "agent_breaks",
        }
    }

    pub fn table_for(self, tenant: TenantId) -> String {
        // Both halves are validated by construction.
        format!("{}_{}", self.base_name(), tenant)
    }
}

impl std::str::FromStr for TenantEntity {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TenantEntity::ALL
            .into_iter()
            .find(|e| e.base_name() == s)
            .ok_or_else(|| DatabaseError::InvalidArgument(format!("'{}' is not a tenant entity", s)))
    }
}

/// Build the physical table name for `base_entity` owned by `tenant_id`.
///
/// `base_entity` must be one of [`TENANT_ENTITIES`] (letters and underscores only) and
/// `tenant_id` a positive integer; anything else is rejected before it can reach SQL.
/// The mapping is injective: distinct `(base, id)` pairs always yield distinct names.
pub fn table_name(base_entity: &str, tenant_id: i64) -> Result<String, DatabaseError> {
    if base_entity.is_empty() || !base_entity.chars().all(|c| c.is_ascii_alphabetic() || c == '_') {
        return Err(DatabaseError::InvalidArgument(format!(
            "'{}' is not a valid base table identifier",
            base_entity
        )));
    }
    let entity: TenantEntity = base_entity.parse()?;
    let tenant = TenantId::new(tenant_id)?;
    Ok(entity.table_for(tenant))
}

/// Which set of tables a request reads and writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "tenant_id", rename_all = "snake_case")]
pub enum TenantContext {
    /// The shared tables predating per-tenant isolation
    Legacy,
    Tenant(TenantId),
}

impl TenantContext {
    pub fn tenant_id(&self) -> Option<TenantId> {
        match self {
            TenantContext::Legacy => None,
            TenantContext::Tenant(id) => Some(*id),
        }
    }
}

/// Resolved physical table names for one context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSet {
    pub context: TenantContext,
    pub agents: String,
    pub calls: String,
    pub breaks: String,
}

impl TableSet {
    pub fn for_context(context: TenantContext) -> Self {
        let name = |entity: TenantEntity| match context {
            TenantContext::Legacy => entity.base_name().to_string(),
            TenantContext::Tenant(id) => entity.table_for(id),
        };

        Self {
            context,
            agents: name(TenantEntity::Agents),
            calls: name(TenantEntity::Calls),
            breaks: name(TenantEntity::AgentBreaks),
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self.context, TenantContext::Legacy)
    }
}
