// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::auth::password::PasswordError;
use crate::auth::JwtError;
use crate::database::manager::DatabaseError;
use crate::services::company_service::CompanyError;
use crate::services::login_service::LoginError;
use crate::services::tenant_resolver::{AccessError, DenyReason};
use crate::services::ServiceError;

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    ValidationError {
        message: String,
        field_errors: Option<HashMap<String, String>>,
    },

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden; `code` keeps distinct lockout reasons apart for clients
    Forbidden { message: String, code: &'static str },

    // 404 Not Found
    NotFound(String),

    // 409 Conflict
    Conflict(String),

    // 500 Internal Server Error
    InternalServerError(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::ValidationError { .. } => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::Forbidden { .. } => 403,
            ApiError::NotFound(_) => 404,
            ApiError::Conflict(_) => 409,
            ApiError::InternalServerError(_) => 500,
            ApiError::ServiceUnavailable(_) => 503,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::ValidationError { message, .. } => message,
            ApiError::Unauthorized(msg) => msg,
            ApiError::Forbidden { message, .. } => message,
            ApiError::NotFound(msg) => msg,
            ApiError::Conflict(msg) => msg,
            ApiError::InternalServerError(msg) => msg,
            ApiError::ServiceUnavailable(msg) => msg,
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        let mut response = json!({
            "error": true,
            "message": self.message(),
            "code": self.error_code()
        });
        if let ApiError::ValidationError {
            field_errors: Some(field_errors),
            ..
        } = self
        {
            response["field_errors"] = json!(field_errors);
        }
        response
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::ValidationError { .. } => "VALIDATION_ERROR",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden { code, .. } => code,
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn validation_error(message: impl Into<String>, field_errors: Option<HashMap<String, String>>) -> Self {
        ApiError::ValidationError {
            message: message.into(),
            field_errors,
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::forbidden_with_code(message, "FORBIDDEN")
    }

    pub fn forbidden_with_code(message: impl Into<String>, code: &'static str) -> Self {
        ApiError::Forbidden {
            message: message.into(),
            code,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound(msg) => ApiError::not_found(msg),
            DatabaseError::InvalidArgument(msg) => ApiError::bad_request(msg),
            DatabaseError::Duplicate { field, value } => {
                tracing::debug!("Duplicate {} '{}'", field, value);
                ApiError::conflict(format!("{} already exists", field))
            }
            DatabaseError::ConfigMissing(what) => {
                tracing::error!("Missing database configuration: {}", what);
                ApiError::service_unavailable("Database temporarily unavailable")
            }
            DatabaseError::InvalidDatabaseUrl => {
                tracing::error!("Invalid database URL");
                ApiError::service_unavailable("Database temporarily unavailable")
            }
            DatabaseError::MigrationStepFailed { step, reason } => {
                tracing::error!("Migration step {} failed: {}", step, reason);
                ApiError::service_unavailable("Service is being updated, please try again later")
            }
            DatabaseError::Sqlx(sqlx_err) => {
                // Log the real error but return generic message
                tracing::error!("SQLx error: {}", sqlx_err);
                match sqlx_err {
                    sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                        ApiError::service_unavailable("Database temporarily unavailable")
                    }
                    _ => ApiError::internal_server_error("Database error occurred"),
                }
            }
        }
    }
}

impl From<AccessError> for ApiError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::Denied(reason) => {
                let code = match reason {
                    DenyReason::TenantDisabled => "TENANT_DISABLED",
                    DenyReason::MasterHasNoTenantData | DenyReason::RoleNotPermitted => "FORBIDDEN",
                    DenyReason::LegacyReadOnly => "LEGACY_READ_ONLY",
                };
                ApiError::forbidden_with_code(reason.message(), code)
            }
            AccessError::NotFound(msg) => ApiError::not_found(msg),
            AccessError::Database(e) => e.into(),
        }
    }
}

impl From<LoginError> for ApiError {
    fn from(err: LoginError) -> Self {
        let message = err.to_string();
        match err {
            LoginError::InvalidCredentials => ApiError::unauthorized(message),
            LoginError::AccountRemoved => ApiError::forbidden_with_code(message, "ACCOUNT_REMOVED"),
            LoginError::AccountInactive => ApiError::forbidden_with_code(message, "ACCOUNT_INACTIVE"),
            LoginError::TenantDisabled => ApiError::forbidden_with_code(message, "TENANT_DISABLED"),
            LoginError::Validation(msg) => ApiError::validation_error(msg, None),
            LoginError::Token(e) => e.into(),
            LoginError::Password(e) => e.into(),
            LoginError::Database(e) => e.into(),
        }
    }
}

impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::InvalidToken(_) => ApiError::unauthorized("Invalid or expired token"),
            JwtError::InvalidSecret => {
                tracing::error!("JWT secret not configured");
                ApiError::internal_server_error("Authentication is not available")
            }
            JwtError::TokenGeneration(reason) => {
                tracing::error!("Token generation failed: {}", reason);
                ApiError::internal_server_error("Authentication is not available")
            }
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        tracing::error!("Password hashing error: {}", err);
        ApiError::internal_server_error("An error occurred while processing your request")
    }
}

impl From<CompanyError> for ApiError {
    fn from(err: CompanyError) -> Self {
        let message = err.to_string();
        match err {
            CompanyError::Validation(msg) => ApiError::validation_error(msg, None),
            CompanyError::NotMaster => ApiError::forbidden(message),
            CompanyError::Password(e) => e.into(),
            CompanyError::Database(e) => e.into(),
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(msg) => ApiError::validation_error(msg, None),
            ServiceError::Access(e) => e.into(),
            ServiceError::Password(e) => e.into(),
            ServiceError::Database(e) => e.into(),
        }
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lockout_reasons_stay_distinct() {
        let removed = ApiError::from(LoginError::AccountRemoved);
        let inactive = ApiError::from(LoginError::AccountInactive);
        let disabled = ApiError::from(LoginError::TenantDisabled);
        let invalid = ApiError::from(LoginError::InvalidCredentials);

        assert_eq!(removed.status_code(), 403);
        assert_eq!(removed.error_code(), "ACCOUNT_REMOVED");
        assert_eq!(inactive.error_code(), "ACCOUNT_INACTIVE");
        assert_eq!(disabled.error_code(), "TENANT_DISABLED");
        assert_eq!(invalid.status_code(), 401);
        assert_eq!(invalid.message(), "Invalid credentials");
    }

    #[test]
    fn duplicates_are_conflicts() {
        let err = ApiError::from(DatabaseError::Duplicate {
            field: "agent_number".into(),
            value: "2000000000".into(),
        });
        assert_eq!(err.status_code(), 409);
        assert_eq!(err.message(), "agent_number already exists");
    }

    #[test]
    fn disabled_tenant_is_forbidden() {
        let err = ApiError::from(AccessError::Denied(DenyReason::TenantDisabled));
        assert_eq!(err.status_code(), 403);
        assert_eq!(err.to_json()["code"], "TENANT_DISABLED");
    }
}
