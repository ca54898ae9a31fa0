// handlers/protected/agents.rs - /api/agents[/:agent_number], /api/agents/current-status

use axum::{extract::Path, Extension, Json};

use crate::database::manager::DatabaseManager;
use crate::database::models::Agent;
use crate::database::repository::AgentCurrentStatus;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::agent_service::{AgentService, CreateAgentInput, UpdateAgentInput};
use crate::services::tenant_resolver::TenantScope;

async fn service(scope: TenantScope) -> Result<AgentService, ApiError> {
    Ok(AgentService::new(DatabaseManager::pool().await?, scope))
}

/// GET /api/agents
pub async fn agents_get(Extension(scope): Extension<TenantScope>) -> ApiResult<Vec<Agent>> {
    Ok(ApiResponse::success(service(scope).await?.list().await?))
}

/// POST /api/agents - admin only
pub async fn agents_post(
    Extension(scope): Extension<TenantScope>,
    Json(input): Json<CreateAgentInput>,
) -> ApiResult<Agent> {
    let agent = service(scope).await?.add(input).await?;
    Ok(ApiResponse::created(agent).message("Agent added successfully"))
}

/// PUT /api/agents/:agent_number
pub async fn agent_put(
    Extension(scope): Extension<TenantScope>,
    Path(agent_number): Path<String>,
    Json(input): Json<UpdateAgentInput>,
) -> ApiResult<Agent> {
    let agent = service(scope).await?.edit(&agent_number, input).await?;
    Ok(ApiResponse::success(agent).message("Agent updated successfully"))
}

/// DELETE /api/agents/:agent_number - marks the agent Removed
pub async fn agent_delete(
    Extension(scope): Extension<TenantScope>,
    Path(agent_number): Path<String>,
) -> ApiResult<Agent> {
    let agent = service(scope).await?.remove(&agent_number).await?;
    Ok(ApiResponse::success(agent).message("Agent removed successfully"))
}

/// GET /api/agents/current-status
pub async fn agents_current_status_get(
    Extension(scope): Extension<TenantScope>,
) -> ApiResult<Vec<AgentCurrentStatus>> {
    Ok(ApiResponse::success(service(scope).await?.current_statuses().await?))
}
