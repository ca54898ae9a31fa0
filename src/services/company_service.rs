// Master-side company management: creation with tenant provisioning, edits mirrored
// onto the tenant's admin agent, and the stop event.

use serde::Deserialize;
use sqlx::PgPool;

use crate::auth::password::{hash_password, PasswordError};
use crate::auth::Claims;
use crate::config;
use crate::database::manager::DatabaseError;
use crate::database::models::{Company, CompanyStatus, PaymentStatus};
use crate::database::repository::{CompanyChanges, CompanyRepository, NewCompany};
use crate::database::naming::TenantId;

#[derive(Debug, thiserror::Error)]
pub enum CompanyError {
    #[error("{0}")]
    Validation(String),
    #[error("Only master accounts can manage companies")]
    NotMaster,
    #[error(transparent)]
    Password(#[from] PasswordError),
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCompanyInput {
    pub name: Option<String>,
    pub admin_username: Option<serde_json::Value>,
    pub admin_password: Option<String>,
    pub email: Option<String>,
    pub contact_no: Option<String>,
    pub payment_status: Option<PaymentStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCompanyInput {
    pub name: Option<String>,
    pub admin_username: Option<serde_json::Value>,
    pub admin_password: Option<String>,
    pub email: Option<String>,
    pub contact_no: Option<String>,
    pub payment_status: Option<PaymentStatus>,
    pub status: Option<CompanyStatus>,
}

/// Normalize an admin username to a bare 10-digit mobile number.
/// Accepts `0`- and `91`-prefixed forms and any punctuation.
pub fn normalize_admin_username(raw: &str) -> Result<String, CompanyError> {
    let mut digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.len() == 11 && digits.starts_with('0') {
        digits.remove(0);
    }
    if digits.len() == 12 && digits.starts_with("91") {
        digits.drain(..2);
    }
    let valid = digits.len() == 10 && matches!(digits.as_bytes()[0], b'6'..=b'9');
    if !valid {
        return Err(CompanyError::Validation(
            "Admin username must be a valid 10-digit Indian mobile number".to_string(),
        ));
    }
    Ok(digits)
}

fn username_text(value: &serde_json::Value) -> Result<String, CompanyError> {
    match value {
        serde_json::Value::String(s) => Ok(s.clone()),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        _ => Err(CompanyError::Validation("Admin username must be a phone number".to_string())),
    }
}

fn required(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub struct CompanyService {
    repository: CompanyRepository,
    bcrypt_cost: u32,
}

impl CompanyService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: CompanyRepository::new(pool),
            bcrypt_cost: config::config().security.bcrypt_cost,
        }
    }

    fn master_id(claims: &Claims) -> Result<i32, CompanyError> {
        if claims.is_master() {
            Ok(claims.user_id)
        } else {
            Err(CompanyError::NotMaster)
        }
    }

    pub async fn list(&self, claims: &Claims) -> Result<Vec<Company>, CompanyError> {
        let master = Self::master_id(claims)?;
        Ok(self.repository.list_for_master(master).await?)
    }

    pub async fn create(&self, claims: &Claims, input: CreateCompanyInput) -> Result<Company, CompanyError> {
        let master = Self::master_id(claims)?;
        let missing = || CompanyError::Validation("Missing required fields".to_string());

        let name = required(input.name).ok_or_else(missing)?;
        let email = required(input.email).ok_or_else(missing)?;
        let password = input.admin_password.filter(|p| !p.is_empty()).ok_or_else(missing)?;
        let username = input.admin_username.as_ref().ok_or_else(missing)?;
        let admin_username = normalize_admin_username(&username_text(username)?)?;

        let company = NewCompany {
            name,
            admin_username,
            admin_password_hash: hash_password(&password, self.bcrypt_cost).await?,
            email,
            contact_no: required(input.contact_no),
            payment_status: input.payment_status.unwrap_or(PaymentStatus::Paid),
        };
        Ok(self.repository.create(master, &company).await?)
    }

    pub async fn update(&self, claims: &Claims, id: i32, input: UpdateCompanyInput) -> Result<Company, CompanyError> {
        Self::master_id(claims)?;

        let admin_username = match &input.admin_username {
            Some(value) if !value.is_null() => Some(normalize_admin_username(&username_text(value)?)?),
            _ => None,
        };
        let admin_password_hash = match input.admin_password.as_deref() {
            Some(password) if !password.is_empty() => Some(hash_password(password, self.bcrypt_cost).await?),
            _ => None,
        };

        let changes = CompanyChanges {
            name: required(input.name),
            admin_username,
            admin_password_hash,
            email: required(input.email),
            contact_no: input.contact_no,
            payment_status: input.payment_status,
            status: input.status,
        };
        if changes.is_empty() {
            return Err(CompanyError::Validation("No fields to update".to_string()));
        }
        Ok(self.repository.update(id, &changes).await?)
    }

    pub async fn stop(&self, claims: &Claims, id: i32) -> Result<Company, CompanyError> {
        Self::master_id(claims)?;
        Ok(self.repository.stop(id).await?)
    }

    /// The caller's own company, if their token names one
    pub async fn current(&self, claims: &Claims) -> Result<Option<Company>, CompanyError> {
        let Some(id) = claims.company_id else {
            return Ok(None);
        };
        let tenant = TenantId::new(id.into())?;
        match self.repository.find(tenant.get()).await {
            Ok(company) => Ok(Some(company)),
            Err(DatabaseError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
