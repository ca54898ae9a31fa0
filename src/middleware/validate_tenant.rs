use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::auth::AuthUser;
use crate::database::directory::PgTenantDirectory;
use crate::database::manager::DatabaseManager;
use crate::error::ApiError;
use crate::services::tenant_resolver::resolve_tenant_scope;

/// Resolves the caller's tenant scope after JWT authentication and injects it
/// into the request. Disabled tenants are refused here.
pub async fn validate_tenant_middleware(mut request: Request, next: Next) -> Response {
    let Some(auth_user) = request.extensions().get::<AuthUser>().cloned() else {
        return ApiError::unauthorized("JWT authentication required before tenant validation").into_response();
    };

    let pool = match DatabaseManager::pool().await {
        Ok(pool) => pool,
        Err(e) => return ApiError::from(e).into_response(),
    };
    let directory = PgTenantDirectory::new(pool);

    match resolve_tenant_scope(auth_user.claims(), &directory).await {
        Ok(scope) => {
            request.extensions_mut().insert(scope);
            next.run(request).await
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}
