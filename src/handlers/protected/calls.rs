// handlers/protected/calls.rs - /api/calls

use axum::{
    extract::{Path, Query},
    Extension, Json,
};
use serde::Deserialize;

use crate::database::manager::DatabaseManager;
use crate::database::models::CallRecord;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::call_service::{AnnotateCallInput, CallListQuery, CallService, LogCallInput};
use crate::services::tenant_resolver::TenantScope;

#[derive(Debug, Deserialize)]
pub struct AlternativeNumbersInput {
    pub alternative_numbers: Option<String>,
}

async fn service(scope: TenantScope) -> Result<CallService, ApiError> {
    Ok(CallService::new(DatabaseManager::pool().await?, scope))
}

/// GET /api/calls?from=YYYY-MM-DD&to=YYYY-MM-DD - agents see only their own calls
pub async fn calls_get(
    Extension(scope): Extension<TenantScope>,
    Query(query): Query<CallListQuery>,
) -> ApiResult<Vec<CallRecord>> {
    query.bounds()?;
    Ok(ApiResponse::success(service(scope).await?.list(&query).await?))
}

/// POST /api/calls - log a manual call
pub async fn calls_post(
    Extension(scope): Extension<TenantScope>,
    Json(input): Json<LogCallInput>,
) -> ApiResult<CallRecord> {
    let call = service(scope).await?.log(input).await?;
    Ok(ApiResponse::created(call).message("Call logged successfully"))
}

/// PUT /api/calls/:id/custom - remarks, name, alternative numbers, meeting
pub async fn call_custom_put(
    Extension(scope): Extension<TenantScope>,
    Path(id): Path<i32>,
    Json(input): Json<AnnotateCallInput>,
) -> ApiResult<CallRecord> {
    let call = service(scope).await?.annotate(id, input).await?;
    Ok(ApiResponse::success(call).message("Custom fields updated successfully"))
}

/// PUT /api/calls/:id/alternative-numbers
pub async fn call_alternative_numbers_put(
    Extension(scope): Extension<TenantScope>,
    Path(id): Path<i32>,
    Json(input): Json<AlternativeNumbersInput>,
) -> ApiResult<()> {
    service(scope)
        .await?
        .set_alternative_numbers(id, input.alternative_numbers)
        .await?;
    Ok(ApiResponse::success(()).message("Alternative numbers updated"))
}
