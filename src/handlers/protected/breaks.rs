// handlers/protected/breaks.rs - break and working-status records
//
// POST /api/agents/breaks        record a status row
// PUT  /api/agents/breaks/close  close the latest open break
// GET  /api/agents/breaks        admin listing grouped by day (?search=)
// POST /api/breaks               record a finished break from a time range

use axum::{extract::Query, Extension, Json};
use serde::Deserialize;

use crate::database::manager::DatabaseManager;
use crate::database::models::AgentBreak;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::break_service::{BreakDay, BreakRangeInput, BreakService, CloseBreakInput, RecordBreakInput};
use crate::services::tenant_resolver::TenantScope;

#[derive(Debug, Default, Deserialize)]
pub struct BreakSearch {
    pub search: Option<String>,
}

async fn service(scope: TenantScope) -> Result<BreakService, ApiError> {
    Ok(BreakService::new(DatabaseManager::pool().await?, scope))
}

pub async fn agent_breaks_post(
    Extension(scope): Extension<TenantScope>,
    Json(input): Json<RecordBreakInput>,
) -> ApiResult<AgentBreak> {
    let entry = service(scope).await?.record(input).await?;
    Ok(ApiResponse::created(entry).message("Break/working status recorded successfully"))
}

pub async fn break_close_put(
    Extension(scope): Extension<TenantScope>,
    Json(input): Json<CloseBreakInput>,
) -> ApiResult<AgentBreak> {
    let entry = service(scope).await?.close_latest(input).await?;
    Ok(ApiResponse::success(entry).message("Break closed successfully"))
}

pub async fn agent_breaks_get(
    Extension(scope): Extension<TenantScope>,
    Query(query): Query<BreakSearch>,
) -> ApiResult<Vec<BreakDay>> {
    let days = service(scope).await?.list_by_day(query.search.as_deref()).await?;
    Ok(ApiResponse::success(days))
}

pub async fn breaks_post(
    Extension(scope): Extension<TenantScope>,
    Json(input): Json<BreakRangeInput>,
) -> ApiResult<AgentBreak> {
    let entry = service(scope).await?.record_range(input).await?;
    Ok(ApiResponse::created(entry).message("Break inserted successfully"))
}
