//! Router assembly for the account API.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::{Extension, Router};
use registry_auth::ScopeAuthorizer;
use tower_http::trace::TraceLayer;

use crate::domain::processor::AccountProcessor;
use crate::infra::storage::SeaOrmAccountRepository;

use super::handlers;

/// Type alias for the concrete processor type.
pub type ConcreteProcessor = AccountProcessor<SeaOrmAccountRepository>;

pub struct ApiState {
    pub processor: ConcreteProcessor,
    pub authorizer: ScopeAuthorizer,
}

pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/healthcheck", get(handlers::healthcheck))
        .route("/keppel/v1/accounts", get(handlers::list_accounts))
        .route(
            "/keppel/v1/accounts/{name}",
            get(handlers::get_account)
                .put(handlers::put_account)
                .delete(handlers::delete_account),
        )
        .route(
            "/keppel/v1/accounts/{name}/sublease",
            post(handlers::post_sublease),
        )
        .route(
            "/keppel/v1/accounts/{name}/security_scan_policies",
            get(handlers::get_security_scan_policies).put(handlers::put_security_scan_policies),
        )
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
}
