// handlers/master/companies.rs - /api/master/companies[/:id[/stop]]

use axum::{extract::Path, Extension, Json};

use crate::database::manager::DatabaseManager;
use crate::database::models::Company;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::company_service::{CompanyError, CompanyService, CreateCompanyInput, UpdateCompanyInput};

/// Role check first, so non-master callers never touch the store
async fn service(auth: &AuthUser) -> Result<CompanyService, ApiError> {
    if !auth.claims().is_master() {
        return Err(CompanyError::NotMaster.into());
    }
    Ok(CompanyService::new(DatabaseManager::pool().await?))
}

/// GET /api/master/companies - companies created by the caller, newest first
pub async fn companies_get(Extension(auth): Extension<AuthUser>) -> ApiResult<Vec<Company>> {
    let companies = service(&auth).await?.list(auth.claims()).await?;
    Ok(ApiResponse::success(companies))
}

/// POST /api/master/companies - create a company, its tables and its admin agent
pub async fn companies_post(
    Extension(auth): Extension<AuthUser>,
    Json(input): Json<CreateCompanyInput>,
) -> ApiResult<Company> {
    let company = service(&auth).await?.create(auth.claims(), input).await?;
    Ok(ApiResponse::created(company).message("Company created successfully"))
}

/// PUT /api/master/companies/:id
pub async fn company_put(
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i32>,
    Json(input): Json<UpdateCompanyInput>,
) -> ApiResult<Company> {
    let company = service(&auth).await?.update(auth.claims(), id, input).await?;
    Ok(ApiResponse::success(company).message("Company updated successfully"))
}

/// POST /api/master/companies/:id/stop - fully close the company
pub async fn company_stop_post(Extension(auth): Extension<AuthUser>, Path(id): Path<i32>) -> ApiResult<Company> {
    let company = service(&auth).await?.stop(auth.claims(), id).await?;
    Ok(ApiResponse::success(company).message("Company stopped"))
}
