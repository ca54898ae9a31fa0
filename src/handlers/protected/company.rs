// handlers/protected/company.rs - GET /api/company

use axum::Extension;
use serde::Serialize;

use crate::database::manager::DatabaseManager;
use crate::database::models::Company;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::company_service::CompanyService;

#[derive(Debug, Serialize)]
pub struct CompanyView {
    pub company: Option<Company>,
    pub blocked: bool,
}

/// The caller's own company, with a `blocked` flag the dashboard uses for its lockout overlay
pub async fn company_get(Extension(auth): Extension<AuthUser>) -> ApiResult<CompanyView> {
    let pool = DatabaseManager::pool().await?;
    let company = CompanyService::new(pool).current(auth.claims()).await?;
    let blocked = company.as_ref().is_some_and(Company::is_blocked);
    Ok(ApiResponse::success(CompanyView { company, blocked }))
}
