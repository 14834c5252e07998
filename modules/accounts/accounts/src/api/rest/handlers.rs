//! Request handlers of the account API.

use std::sync::Arc;

use accounts_sdk::SubleaseToken;
use axum::body::Bytes;
use axum::extract::{Extension, Path};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use registry_auth::{AuthError, Authorization, Permission, Scope};

use crate::domain::error::DomainError;
use crate::domain::processor::AccountSpec;

use super::dto;
use super::error::{
    bad_request, domain_error_response, forbidden_with_challenge, unauthorized,
};
use super::routes::ApiState;

/// Header carrying the base64-JSON sublease token on replica creation.
pub const SUBLEASE_TOKEN_HEADER: &str = "X-Keppel-Sublease-Token";

pub async fn healthcheck() -> &'static str {
    "ok"
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

async fn authenticate(state: &ApiState, headers: &HeaderMap) -> Result<Authorization, Response> {
    match state.authorizer.authenticate(bearer_token(headers)).await {
        Ok(authz) => Ok(authz),
        Err(AuthError::InvalidCredentials) => Err(unauthorized()),
        Err(err) => Err(domain_error_response(DomainError::Internal(err.into()))),
    }
}

pub async fn list_accounts(
    Extension(state): Extension<Arc<ApiState>>,
    headers: HeaderMap,
) -> Response {
    let authz = match authenticate(&state, &headers).await {
        Ok(authz) => authz,
        Err(response) => return response,
    };
    if authz.is_anonymous() {
        return unauthorized();
    }

    let accounts = match state.processor.list_accounts().await {
        Ok(accounts) => accounts,
        Err(err) => return domain_error_response(err),
    };
    // Partial access: the response is filtered to in-scope tenants
    // instead of failing the whole request.
    let visible = authz.tenants_with(Permission::View);
    let accounts = accounts
        .into_iter()
        .filter(|account| visible.contains(account.auth_tenant_id.as_str()))
        .map(dto::AccountResponse::from)
        .collect();
    Json(dto::AccountListEnvelope { accounts }).into_response()
}

pub async fn get_account(
    Extension(state): Extension<Arc<ApiState>>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Response {
    let authz = match authenticate(&state, &headers).await {
        Ok(authz) => authz,
        Err(response) => return response,
    };
    let account = match state.processor.get_account(&name).await {
        Ok(account) => account,
        Err(err) => return domain_error_response(err),
    };
    // A missing account and a forbidden one answer identically so the
    // response does not leak which names exist.
    match account {
        Some(account) if authz.can(Permission::View, &account.auth_tenant_id) => {
            Json(dto::AccountEnvelope {
                account: account.into(),
            })
            .into_response()
        }
        _ => forbidden_with_challenge(
            &state.authorizer,
            Permission::View,
            &Scope::account(name),
        ),
    }
}

pub async fn put_account(
    Extension(state): Extension<Arc<ApiState>>,
    Path(name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request: dto::PutAccountRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(err) => return bad_request(&format!("request body is not valid: {err}")),
    };
    let body = request.account;
    if body
        .name
        .as_ref()
        .is_some_and(|n| !n.is_empty() && *n != name)
    {
        return bad_request("account name in body differs from URL");
    }

    let authz = match authenticate(&state, &headers).await {
        Ok(authz) => authz,
        Err(response) => return response,
    };
    if let Err(err) = state
        .authorizer
        .driver()
        .validate_tenant_id(&body.auth_tenant_id)
    {
        return domain_error_response(DomainError::Validation(err.to_string()));
    }
    if !authz.can(Permission::Change, &body.auth_tenant_id) {
        return forbidden_with_challenge(
            &state.authorizer,
            Permission::Change,
            &Scope::account(name),
        );
    }

    let spec = AccountSpec {
        name,
        auth_tenant_id: body.auth_tenant_id,
        replication: body.replication,
        platform_filter: body.platform_filter,
        rbac_policies: body.rbac_policies.unwrap_or_default(),
        gc_policies: body.gc_policies.unwrap_or_default(),
        tag_policies: body.tag_policies.unwrap_or_default(),
        required_labels: body
            .validation
            .map(|v| v.required_labels)
            .unwrap_or_default(),
    };

    let sublease_header = headers
        .get(SUBLEASE_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_owned();

    let result = state
        .processor
        .create_or_update(
            spec,
            authz.user_name(),
            move || SubleaseToken::parse(&sublease_header).map_err(DomainError::from),
            |_new, existing| {
                if existing.is_some_and(|account| account.is_managed) {
                    Err(DomainError::Forbidden(
                        "account is managed by an external control plane".to_owned(),
                    ))
                } else {
                    Ok(())
                }
            },
        )
        .await;

    match result {
        Ok(account) => Json(dto::AccountEnvelope {
            account: account.into(),
        })
        .into_response(),
        Err(err) => domain_error_response(err),
    }
}

pub async fn delete_account(
    Extension(state): Extension<Arc<ApiState>>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Response {
    let authz = match authenticate(&state, &headers).await {
        Ok(authz) => authz,
        Err(response) => return response,
    };
    let account = match state.processor.get_account(&name).await {
        Ok(account) => account,
        Err(err) => return domain_error_response(err),
    };
    let Some(account) = account else {
        return forbidden_with_challenge(
            &state.authorizer,
            Permission::Delete,
            &Scope::account(name),
        );
    };
    if !authz.can(Permission::Delete, &account.auth_tenant_id) {
        return forbidden_with_challenge(
            &state.authorizer,
            Permission::Delete,
            &Scope::account(name),
        );
    }
    if account.is_managed {
        return domain_error_response(DomainError::Forbidden(
            "account is managed by an external control plane".to_owned(),
        ));
    }

    match state.processor.delete_account(&name, authz.user_name()).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => domain_error_response(err),
    }
}

pub async fn post_sublease(
    Extension(state): Extension<Arc<ApiState>>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Response {
    let authz = match authenticate(&state, &headers).await {
        Ok(authz) => authz,
        Err(response) => return response,
    };
    let account = match state.processor.get_account(&name).await {
        Ok(account) => account,
        Err(err) => return domain_error_response(err),
    };
    let Some(account) = account else {
        return forbidden_with_challenge(
            &state.authorizer,
            Permission::Change,
            &Scope::account(name),
        );
    };
    if !authz.can(Permission::Change, &account.auth_tenant_id) {
        return forbidden_with_challenge(
            &state.authorizer,
            Permission::Change,
            &Scope::account(name),
        );
    }

    match state.processor.issue_sublease(&account).await {
        Ok(sublease_token) => Json(dto::SubleaseTokenEnvelope { sublease_token }).into_response(),
        Err(err) => domain_error_response(err),
    }
}

pub async fn get_security_scan_policies(
    Extension(state): Extension<Arc<ApiState>>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Response {
    let authz = match authenticate(&state, &headers).await {
        Ok(authz) => authz,
        Err(response) => return response,
    };
    let account = match state.processor.get_account(&name).await {
        Ok(account) => account,
        Err(err) => return domain_error_response(err),
    };
    match account {
        Some(account) if authz.can(Permission::View, &account.auth_tenant_id) => {
            Json(dto::SecurityScanPoliciesEnvelope {
                security_scan_policies: account.security_scan_policies,
            })
            .into_response()
        }
        _ => forbidden_with_challenge(
            &state.authorizer,
            Permission::View,
            &Scope::account(name),
        ),
    }
}

pub async fn put_security_scan_policies(
    Extension(state): Extension<Arc<ApiState>>,
    Path(name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request: dto::PutSecurityScanPoliciesRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(err) => return bad_request(&format!("request body is not valid: {err}")),
    };

    let authz = match authenticate(&state, &headers).await {
        Ok(authz) => authz,
        Err(response) => return response,
    };
    let account = match state.processor.get_account(&name).await {
        Ok(account) => account,
        Err(err) => return domain_error_response(err),
    };
    let Some(account) = account else {
        return forbidden_with_challenge(
            &state.authorizer,
            Permission::Change,
            &Scope::account(name),
        );
    };
    if !authz.can(Permission::Change, &account.auth_tenant_id) {
        return forbidden_with_challenge(
            &state.authorizer,
            Permission::Change,
            &Scope::account(name),
        );
    }

    let result = state
        .processor
        .put_security_scan_policies(
            &account,
            request.security_scan_policies,
            authz.user_name(),
        )
        .await;
    match result {
        Ok(security_scan_policies) => Json(dto::SecurityScanPoliciesEnvelope {
            security_scan_policies,
        })
        .into_response(),
        Err(err) => domain_error_response(err),
    }
}
