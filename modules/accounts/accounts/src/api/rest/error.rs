//! Maps domain errors to HTTP responses.
//!
//! The five error kinds each map to a distinct status; deletion
//! conflicts carry their progress payload; server errors are logged
//! with a correlation id and answered with a generic message.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use registry_auth::{Permission, Scope, ScopeAuthorizer};
use serde_json::json;

use crate::domain::error::{DeletionProgress, DomainError};

pub fn domain_error_response(err: DomainError) -> Response {
    match err {
        DomainError::Validation(message) => error_body(StatusCode::UNPROCESSABLE_ENTITY, &message),
        DomainError::Conflict(message) => error_body(StatusCode::CONFLICT, &message),
        DomainError::DeletionBlocked(progress) => deletion_progress_response(&progress),
        DomainError::Forbidden(message) => error_body(StatusCode::FORBIDDEN, &message),
        DomainError::BadRequest(message) => error_body(StatusCode::BAD_REQUEST, &message),
        DomainError::MalformedToken => {
            error_body(StatusCode::BAD_REQUEST, "malformed sublease token")
        }
        DomainError::Internal(source) => {
            let correlation_id = uuid::Uuid::new_v4();
            tracing::error!(%correlation_id, error = ?source, "request failed");
            error_body(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("internal server error (correlation id {correlation_id})"),
            )
        }
    }
}

fn deletion_progress_response(progress: &DeletionProgress) -> Response {
    let body = match progress {
        DeletionProgress::RemainingManifests { count, next } => json!({
            "remaining_manifests": { "count": count, "next": next },
        }),
        DeletionProgress::RemainingBlobs { count } => json!({
            "remaining_blobs": { "count": count },
        }),
        DeletionProgress::MaintenanceRequired => json!({
            "error": "account must be set in maintenance first",
        }),
    };
    (StatusCode::CONFLICT, Json(body)).into_response()
}

fn error_body(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// 401 for callers that presented no usable credentials.
pub fn unauthorized() -> Response {
    error_body(StatusCode::UNAUTHORIZED, "authentication required")
}

/// 403 carrying a bearer challenge so the client can acquire a token.
/// Also used for accounts the caller may not see, to hide existence.
pub fn forbidden_with_challenge(
    authorizer: &ScopeAuthorizer,
    permission: Permission,
    scope: &Scope,
) -> Response {
    let challenge = authorizer.bearer_challenge(permission, scope);
    let mut response = error_body(StatusCode::FORBIDDEN, "access denied");
    if let Ok(value) = header::HeaderValue::from_str(&challenge) {
        response
            .headers_mut()
            .insert(header::WWW_AUTHENTICATE, value);
    }
    response
}

/// 400 for bodies that do not decode, including unknown fields.
pub fn bad_request(message: &str) -> Response {
    error_body(StatusCode::BAD_REQUEST, message)
}
