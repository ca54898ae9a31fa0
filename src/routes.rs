// Route table. Public routes, then JWT routes, then JWT + tenant-scope routes.

use axum::{
    http::HeaderValue,
    middleware,
    routing::{get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::config;
use crate::handlers::{master, protected, public};
use crate::middleware::{jwt_auth_middleware, validate_tenant_middleware};

pub fn app() -> Router {
    let security = &config::config().security;
    let cors = cors_layer(security.enable_cors, &security.cors_origins);

    let router = Router::new()
        .merge(public_routes())
        .merge(authenticated_routes());

    if config::config().api.enable_request_logging {
        // trace outermost
        router.layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
    } else {
        router.layer(cors)
    }
}

fn public_routes() -> Router {
    Router::new()
        .route("/api/health", get(public::health_get))
        .route("/api/login", post(public::login_post))
        .route("/api/master/login", post(public::master_login_post))
}

fn authenticated_routes() -> Router {
    Router::new()
        .merge(master_routes())
        .merge(tenant_routes())
        .route("/api/company", get(protected::company_get))
        .route_layer(middleware::from_fn(jwt_auth_middleware))
}

fn master_routes() -> Router {
    Router::new()
        .route(
            "/api/master/companies",
            get(master::companies_get).post(master::companies_post),
        )
        .route("/api/master/companies/:id", put(master::company_put))
        .route("/api/master/companies/:id/stop", post(master::company_stop_post))
}

fn tenant_routes() -> Router {
    Router::new()
        .route("/api/agents", get(protected::agents_get).post(protected::agents_post))
        .route(
            "/api/agents/breaks",
            get(protected::agent_breaks_get).post(protected::agent_breaks_post),
        )
        .route("/api/agents/breaks/close", put(protected::break_close_put))
        .route("/api/agents/current-status", get(protected::agents_current_status_get))
        .route(
            "/api/agents/:agent_number",
            put(protected::agent_put).delete(protected::agent_delete),
        )
        .route("/api/breaks", post(protected::breaks_post))
        .route("/api/calls", get(protected::calls_get).post(protected::calls_post))
        .route("/api/calls/:id/custom", put(protected::call_custom_put))
        .route(
            "/api/calls/:id/alternative-numbers",
            put(protected::call_alternative_numbers_put),
        )
        .route_layer(middleware::from_fn(validate_tenant_middleware))
}

fn cors_layer(enabled: bool, origins: &[String]) -> CorsLayer {
    if !enabled {
        return CorsLayer::new();
    }
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }
    let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    CorsLayer::permissive().allow_origin(AllowOrigin::list(allowed))
}
