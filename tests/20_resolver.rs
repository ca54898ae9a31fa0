mod common;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;

use callcenter_api::database::models::{CompanyStatus, PaymentStatus, Role};
use callcenter_api::database::TenantContext;
use callcenter_api::services::agent_service::UpdateAgentInput;
use callcenter_api::services::break_service::CloseBreakInput;
use callcenter_api::services::call_service::AnnotateCallInput;
use callcenter_api::services::tenant_resolver::{resolve_tenant_scope, AccessError, DenyReason};
use callcenter_api::services::{AgentService, BreakService, CallService, ServiceError};
use common::{company, issuer, tenant, MemoryDirectory};

fn directory() -> MemoryDirectory {
    let mut closed = company(9, "Closed", "1200000000");
    closed.status = CompanyStatus::FullyClose;
    let mut unpaid = company(10, "Unpaid", "1300000000");
    unpaid.payment_status = PaymentStatus::Unpaid;
    MemoryDirectory::default()
        .with_company(company(7, "Acme", "1000000000"))
        .with_company(closed)
        .with_company(unpaid)
}

#[tokio::test]
async fn tenant_claims_bind_tenant_tables() -> Result<()> {
    let claims = issuer().claims(2, Role::Agent, Some(tenant(7)), Some("2000000000".into()));
    let scope = resolve_tenant_scope(&claims, &directory()).await?;

    assert_eq!(scope.context(), TenantContext::Tenant(tenant(7)));
    assert_eq!(scope.tables.agents, "agents_7");
    assert_eq!(scope.tables.calls, "calls_7");
    assert_eq!(scope.tables.breaks, "agent_breaks_7");
    assert_eq!(scope.agent_filter(), Some("2000000000"));
    assert!(scope.ensure_writable().is_ok());

    let resolved = scope.resolved();
    assert_eq!(resolved.tenant_id, Some(tenant(7)));
    assert!(!resolved.read_only_legacy);
    Ok(())
}

#[tokio::test]
async fn admins_see_the_whole_tenant() -> Result<()> {
    let claims = issuer().claims(1, Role::Admin, Some(tenant(7)), Some("1000000000".into()));
    let scope = resolve_tenant_scope(&claims, &directory()).await?;
    assert_eq!(scope.agent_filter(), None);
    assert!(scope.require_admin().is_ok());
    Ok(())
}

#[tokio::test]
async fn missing_company_falls_back_to_read_only_legacy() -> Result<()> {
    let claims = issuer().claims(11, Role::Admin, None, None);
    let scope = resolve_tenant_scope(&claims, &directory()).await?;

    assert_eq!(scope.context(), TenantContext::Legacy);
    assert_eq!(scope.tables.agents, "agents");
    assert!(scope.resolved().read_only_legacy);
    assert!(matches!(
        scope.ensure_writable(),
        Err(AccessError::Denied(DenyReason::LegacyReadOnly))
    ));
    Ok(())
}

#[tokio::test]
async fn masters_have_no_tenant_data() {
    let claims = issuer().claims(1, Role::Master, None, None);
    let err = resolve_tenant_scope(&claims, &directory()).await.unwrap_err();
    assert!(matches!(err, AccessError::Denied(DenyReason::MasterHasNoTenantData)));
}

#[tokio::test]
async fn blocked_tenants_are_refused() {
    for id in [9, 10] {
        let claims = issuer().claims(1, Role::Admin, Some(tenant(id)), Some("1200000000".into()));
        let err = resolve_tenant_scope(&claims, &directory()).await.unwrap_err();
        assert!(
            matches!(err, AccessError::Denied(DenyReason::TenantDisabled)),
            "tenant {id}: {err:?}"
        );
    }
}

#[tokio::test]
async fn unknown_company_is_not_found() {
    let claims = issuer().claims(1, Role::Admin, Some(tenant(404)), Some("1000000000".into()));
    let err = resolve_tenant_scope(&claims, &directory()).await.unwrap_err();
    assert!(matches!(err, AccessError::NotFound(_)));
}

#[tokio::test]
async fn agent_tokens_need_an_agent_number() {
    let claims = issuer().claims(2, Role::Agent, Some(tenant(7)), None);
    let err = resolve_tenant_scope(&claims, &directory()).await.unwrap_err();
    assert!(matches!(err, AccessError::Denied(DenyReason::RoleNotPermitted)));
}

fn is_read_only<T: std::fmt::Debug>(result: Result<T, ServiceError>) -> bool {
    matches!(
        result,
        Err(ServiceError::Access(AccessError::Denied(DenyReason::LegacyReadOnly)))
    )
}

#[tokio::test]
async fn legacy_scope_refuses_every_write() -> Result<()> {
    let claims = issuer().claims(11, Role::Admin, None, Some("4000000000".into()));
    let scope = resolve_tenant_scope(&claims, &directory()).await?;
    // Refused before any query, so the pool never connects
    let pool = PgPoolOptions::new().connect_lazy("postgres://localhost/unreachable")?;

    let agents = AgentService::new(pool.clone(), scope.clone());
    let rename = UpdateAgentInput {
        name: Some("Renamed".into()),
        ..Default::default()
    };
    assert!(is_read_only(agents.edit("4000000000", rename).await));
    assert!(is_read_only(agents.remove("4000000000").await));

    let calls = CallService::new(pool.clone(), scope.clone());
    let annotation = AnnotateCallInput {
        name: Some("Ravi".into()),
        ..Default::default()
    };
    assert!(is_read_only(calls.annotate(1, annotation).await));
    assert!(is_read_only(calls.set_alternative_numbers(1, Some("9000000000".into())).await));

    let breaks = BreakService::new(pool, scope);
    let close = CloseBreakInput {
        agent_number: Some("4000000000".into()),
        break_end: None,
    };
    assert!(is_read_only(breaks.close_latest(close).await));
    Ok(())
}
