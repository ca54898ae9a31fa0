// handlers/public/login.rs - POST /api/login and POST /api/master/login
//
// Both return `{success, message, data: {token, user}}`. Lockout outcomes
// (removed, inactive, company disabled) are 403s with distinct codes; bad
// credentials are 401.

use axum::Json;
use serde::Serialize;
use std::sync::Arc;

use crate::database::directory::PgTenantDirectory;
use crate::database::manager::DatabaseManager;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::login_service::{LoginRequest, LoginService, LoginUser};

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: LoginUser,
}

async fn login_service() -> Result<LoginService, ApiError> {
    let pool = DatabaseManager::pool().await?;
    Ok(LoginService::from_config(Arc::new(PgTenantDirectory::new(pool))))
}

pub async fn login_post(Json(request): Json<LoginRequest>) -> ApiResult<LoginResponse> {
    request.validate()?;
    let outcome = login_service().await?.login(&request).await?;
    Ok(ApiResponse::success(LoginResponse {
        token: outcome.token,
        user: outcome.user,
    })
    .message(outcome.message))
}

pub async fn master_login_post(Json(request): Json<LoginRequest>) -> ApiResult<LoginResponse> {
    if request.password.as_deref().unwrap_or_default().is_empty() || request.user_id.is_none() {
        return Err(ApiError::validation_error("Username and password required", None));
    }
    let outcome = login_service().await?.master_login(&request).await?;
    Ok(ApiResponse::success(LoginResponse {
        token: outcome.token,
        user: outcome.user,
    })
    .message(outcome.message))
}
