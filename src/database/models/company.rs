use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::FromRow;

use crate::database::manager::DatabaseError;
use crate::database::naming::TenantId;

text_enum! {
    PaymentStatus {
        Paid => "Paid",
        Unpaid => "Unpaid",
    }
}

text_enum! {
    CompanyStatus {
        Active => "Active",
        PartiallyClose => "Partially Close",
        FullyClose => "Fully Close",
    }
}

/// A tenant. Its id suffixes the tenant's physical tables.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Company {
    pub id: i32,
    pub name: String,
    pub admin_username: String,
    #[serde(skip_serializing)]
    pub admin_password: String,
    pub email: String,
    pub contact_no: Option<String>,
    #[sqlx(try_from = "String")]
    pub payment_status: PaymentStatus,
    #[sqlx(try_from = "String")]
    pub status: CompanyStatus,
    pub created_by_master_id: Option<i32>,
    #[serde(with = "super::timestamp")]
    pub created_at: NaiveDateTime,
}

impl Company {
    pub fn tenant_id(&self) -> Result<TenantId, DatabaseError> {
        TenantId::new(self.id.into())
    }

    /// Fully closed or unpaid tenants may not log in or reach their data
    pub fn is_blocked(&self) -> bool {
        self.status == CompanyStatus::FullyClose || self.payment_status == PaymentStatus::Unpaid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn company(status: CompanyStatus, payment_status: PaymentStatus) -> Company {
        Company {
            id: 3,
            name: "Acme".into(),
            admin_username: "9876543210".into(),
            admin_password: String::new(),
            email: "ops@acme.test".into(),
            contact_no: None,
            payment_status,
            status,
            created_by_master_id: Some(1),
            created_at: chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .unwrap(),
        }
    }

    #[test]
    fn blocked_when_closed_or_unpaid() {
        assert!(!company(CompanyStatus::Active, PaymentStatus::Paid).is_blocked());
        assert!(!company(CompanyStatus::PartiallyClose, PaymentStatus::Paid).is_blocked());
        assert!(company(CompanyStatus::FullyClose, PaymentStatus::Paid).is_blocked());
        assert!(company(CompanyStatus::Active, PaymentStatus::Unpaid).is_blocked());
    }

    #[test]
    fn status_text_matches_storage() {
        assert_eq!(CompanyStatus::FullyClose.as_str(), "Fully Close");
        assert_eq!("Partially Close".parse::<CompanyStatus>().unwrap(), CompanyStatus::PartiallyClose);
        let json = serde_json::to_value(company(CompanyStatus::FullyClose, PaymentStatus::Unpaid)).unwrap();
        assert_eq!(json["status"], "Fully Close");
        assert!(json.get("admin_password").is_none());
    }
}
