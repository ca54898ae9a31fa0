mod common;

use std::sync::Arc;

use anyhow::Result;
use callcenter_api::database::models::{AgentStatus, CompanyStatus, PaymentStatus, Role};
use callcenter_api::services::login_service::{LoginError, LoginPath, LoginRequest, LoginService};
use common::{agent, company, issuer, MemoryDirectory};

fn service(directory: MemoryDirectory, tenant_scan: bool) -> LoginService {
    LoginService::new(Arc::new(directory), issuer(), tenant_scan)
}

fn request(user_id: Option<&str>, agent_number: Option<&str>, password: &str) -> LoginRequest {
    LoginRequest {
        user_id: user_id.map(str::to_string),
        agent_number: agent_number.map(str::to_string),
        password: Some(password.to_string()),
        login_type: None,
    }
}

/// Tenant 7 with an admin and a regular agent in `agents_7`
fn tenant_seven() -> MemoryDirectory {
    MemoryDirectory::default()
        .with_company(company(7, "Acme", "1000000000"))
        .with_tenant_agent(7, agent(1, "1000000000", "admin-pass", AgentStatus::Active, true))
        .with_tenant_agent(7, agent(2, "2000000000", "agent-pass", AgentStatus::Active, false))
}

#[tokio::test]
async fn admin_username_resolves_to_its_company() -> Result<()> {
    let login = service(tenant_seven(), true);

    let (user, path) = login.authenticate(&request(Some("1000000000"), None, "admin-pass")).await?;
    assert_eq!(user.role, Role::Admin);
    assert_eq!(user.company_id, Some(7));
    assert_eq!(path, LoginPath::AdminUsername);

    let outcome = login.login(&request(Some("1000000000"), None, "admin-pass")).await?;
    let claims = issuer().verify(&outcome.token)?;
    assert_eq!(claims.company_id, Some(7));
    assert_eq!(claims.role, Role::Admin);
    assert_eq!(claims.agent_number.as_deref(), Some("1000000000"));
    Ok(())
}

#[tokio::test]
async fn wrong_password_is_invalid_credentials() -> Result<()> {
    let login = service(tenant_seven(), true);
    let err = login
        .authenticate(&request(None, Some("2000000000"), "not-it"))
        .await
        .unwrap_err();
    assert!(matches!(err, LoginError::InvalidCredentials), "got {err:?}");
    Ok(())
}

#[tokio::test]
async fn agent_number_found_by_scan_when_unmapped() -> Result<()> {
    let login = service(tenant_seven(), true);
    let (user, path) = login.authenticate(&request(None, Some("2000000000"), "agent-pass")).await?;
    assert_eq!(user.role, Role::Agent);
    assert_eq!(user.company_id, Some(7));
    assert_eq!(path, LoginPath::TenantScan);
    Ok(())
}

#[tokio::test]
async fn scan_skips_companies_without_tables() -> Result<()> {
    let directory = MemoryDirectory::default()
        .with_company(company(1, "Broken", "1100000000"))
        .with_company(company(2, "Beta", "1200000000"))
        .with_broken_tenant(1)
        .with_tenant_agent(2, agent(5, "3000000000", "pw", AgentStatus::Active, false));
    let login = service(directory, true);

    let (user, path) = login.authenticate(&request(None, Some("3000000000"), "pw")).await?;
    assert_eq!(user.company_id, Some(2));
    assert_eq!(path, LoginPath::TenantScan);

    // Nothing matched anywhere is still a plain credential failure
    let err = login
        .authenticate(&request(None, Some("3999999999"), "pw"))
        .await
        .unwrap_err();
    assert!(matches!(err, LoginError::InvalidCredentials), "got {err:?}");
    Ok(())
}

#[tokio::test]
async fn scan_disabled_needs_a_mapping() -> Result<()> {
    let unmapped = service(tenant_seven(), false);
    let err = unmapped
        .authenticate(&request(None, Some("2000000000"), "agent-pass"))
        .await
        .unwrap_err();
    assert!(matches!(err, LoginError::InvalidCredentials));

    let mapped = service(
        tenant_seven().with_mapping(Some(7), agent(90, "2000000000", "agent-pass", AgentStatus::Active, false)),
        false,
    );
    let (user, path) = mapped.authenticate(&request(None, Some("2000000000"), "agent-pass")).await?;
    assert_eq!(path, LoginPath::SharedMapping);
    assert_eq!(user.company_id, Some(7));
    Ok(())
}

#[tokio::test]
async fn removed_and_inactive_are_distinct() -> Result<()> {
    let directory = tenant_seven()
        .with_tenant_agent(7, agent(3, "3000000000", "pw", AgentStatus::Removed, false))
        .with_tenant_agent(7, agent(4, "4000000000", "pw", AgentStatus::Inactive, false));
    let login = service(directory, true);

    let removed = login.authenticate(&request(None, Some("3000000000"), "pw")).await.unwrap_err();
    assert!(matches!(removed, LoginError::AccountRemoved));
    assert_eq!(removed.to_string(), "You are no longer an agent.");

    let inactive = login.authenticate(&request(None, Some("4000000000"), "pw")).await.unwrap_err();
    assert!(matches!(inactive, LoginError::AccountInactive));
    Ok(())
}

#[tokio::test]
async fn disabled_company_refuses_login() -> Result<()> {
    let mut closed = company(7, "Acme", "1000000000");
    closed.status = CompanyStatus::FullyClose;
    let mut unpaid = company(8, "Beta", "1100000000");
    unpaid.payment_status = PaymentStatus::Unpaid;

    let directory = MemoryDirectory::default()
        .with_company(closed)
        .with_company(unpaid)
        .with_tenant_agent(7, agent(1, "1000000000", "pw", AgentStatus::Active, true))
        .with_tenant_agent(8, agent(2, "5000000000", "pw", AgentStatus::Active, false));
    let login = service(directory, true);

    let err = login.authenticate(&request(Some("1000000000"), None, "pw")).await.unwrap_err();
    assert!(matches!(err, LoginError::TenantDisabled));
    let err = login.authenticate(&request(None, Some("5000000000"), "pw")).await.unwrap_err();
    assert!(matches!(err, LoginError::TenantDisabled));
    Ok(())
}

#[tokio::test]
async fn master_login_is_exclusive() -> Result<()> {
    let directory = tenant_seven().with_master(1, "master", "master-pass");
    let login = service(directory, true);

    let master = LoginRequest {
        user_id: Some("master".into()),
        password: Some("master-pass".into()),
        ..Default::default()
    };
    let outcome = login.master_login(&master).await?;
    assert_eq!(outcome.user.role, Role::Master);
    assert_eq!(outcome.user.company_id, None);

    // Tenant credentials never satisfy a master login
    let tenant_admin = LoginRequest {
        user_id: Some("1000000000".into()),
        password: Some("admin-pass".into()),
        ..Default::default()
    };
    let err = login.master_login(&tenant_admin).await.unwrap_err();
    assert!(matches!(err, LoginError::InvalidCredentials));
    Ok(())
}

#[tokio::test]
async fn legacy_user_is_the_last_resort() -> Result<()> {
    let directory = MemoryDirectory::default().with_legacy_user(11, "9000000000", "legacy-pw", None);
    let login = service(directory, true);

    let (user, path) = login.authenticate(&request(Some("9000000000"), None, "legacy-pw")).await?;
    assert_eq!(path, LoginPath::LegacyUser);
    assert_eq!(user.role, Role::Admin);
    assert_eq!(user.company_id, None);
    Ok(())
}

#[tokio::test]
async fn rejects_malformed_identifiers_before_lookup() {
    let login = service(MemoryDirectory::default(), true);
    let err = login
        .authenticate(&request(Some("12ab"), None, "pw"))
        .await
        .unwrap_err();
    assert!(matches!(err, LoginError::Validation(_)));

    let err = login
        .authenticate(&LoginRequest {
            agent_number: Some("2000000000".into()),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, LoginError::Validation(_)));
}
