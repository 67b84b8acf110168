//! Caller identity and permission gating.
//!
//! Sessions are terminated upstream; the authenticated user id arrives in the
//! `x-user-id` header. Permission decisions are delegated to the
//! [`PermissionChecker`] installed as a request extension.

pub mod permissions;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
    Extension,
};
use std::sync::Arc;
use thiserror::Error;

use crate::errors::{ApiError, ServiceError};
pub use permissions::{consts, PermissionChecker, StaticPermissionChecker};

/// Header carrying the authenticated user id
pub const USER_ID_HEADER: &str = "x-user-id";

/// Shared handle to the permission checker
pub type SharedPermissionChecker = Arc<dyn PermissionChecker>;

/// Authenticated caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: String,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing authentication")]
    MissingAuth,
    #[error("Insufficient permissions")]
    InsufficientPermissions,
    #[error("Permission checker not configured")]
    CheckerUnavailable,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            AuthError::MissingAuth => ApiError::Unauthorized.into_response(),
            AuthError::InsufficientPermissions => ApiError::Forbidden.into_response(),
            AuthError::CheckerUnavailable => {
                ApiError::ServiceError(ServiceError::InternalError(self.to_string()))
                    .into_response()
            }
        }
    }
}

fn user_from_headers(headers: &HeaderMap) -> Option<AuthUser> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| AuthUser {
            user_id: id.to_string(),
        })
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }
        user_from_headers(&parts.headers).ok_or(AuthError::MissingAuth)
    }
}

/// Authentication middleware: resolves the caller or rejects with 401.
pub async fn auth_middleware(mut request: Request, next: Next) -> Result<Response, AuthError> {
    let user = user_from_headers(request.headers()).ok_or(AuthError::MissingAuth)?;
    tracing::debug!(user_id = %user.user_id, "caller authenticated");
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Permission middleware to check if a user has the required permission
pub async fn permission_middleware(
    State(required_permission): State<String>,
    checker: Option<Extension<SharedPermissionChecker>>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .cloned()
        .ok_or(AuthError::MissingAuth)?;

    let Some(Extension(checker)) = checker else {
        tracing::error!("no permission checker installed");
        return Err(AuthError::CheckerUnavailable);
    };

    if !checker
        .has_permission(&user.user_id, &required_permission)
        .await
    {
        tracing::info!(
            user_id = %user.user_id,
            permission = %required_permission,
            "permission denied"
        );
        return Err(AuthError::InsufficientPermissions);
    }

    Ok(next.run(request).await)
}

/// Extension methods for Router to add auth middleware
pub trait AuthRouterExt {
    fn with_auth(self) -> Self;
    fn with_permission(self, permission: &str) -> Self;
}

impl<S> AuthRouterExt for axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_auth(self) -> Self {
        self.layer(axum::middleware::from_fn(auth_middleware))
    }

    fn with_permission(self, permission: &str) -> Self {
        self.layer(axum::middleware::from_fn_with_state(
            permission.to_string(),
            permission_middleware,
        ))
        .with_auth()
    }
}
