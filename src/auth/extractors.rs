use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, StatusCode},
    Json,
};
use tracing::{debug, error};

use super::dto::ApiResponse;
use super::errors::{AuthError, ErrorKind};
use crate::state::AppState;

const ACCESS_TOKEN_HEADER: &str = "x-access-token";

/// Token from `Authorization: Bearer <token>`; the scheme is case-insensitive.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?;
    let mut parts = value.split(' ');
    let (scheme, token) = (parts.next()?, parts.next()?);
    if parts.next().is_some() || !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return None;
    }
    Some(token)
}

/// Token from `X-Access-Token`, falling back to a bearer `Authorization` header.
pub fn access_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(ACCESS_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .or_else(|| bearer_token(headers))
}

type ApiRejection = (StatusCode, Json<ApiResponse>);

/// Identity of the caller if a valid access token was presented. Anonymous
/// requests and rejected tokens both resolve to `None`; only an internal
/// failure rejects the request.
pub struct MaybeAuthUser(pub Option<i64>);

/// Identity of the caller, resolved from a still-valid access token.
pub struct AuthUser(pub i64);

fn resolve(result: Result<i64, AuthError>) -> Result<Option<i64>, ApiRejection> {
    match result {
        Ok(user_id) => Ok(Some(user_id)),
        Err(e) if e.kind() == ErrorKind::Internal => {
            error!(error = %e, "access token parsing failed");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::message(super::handlers::INTERNAL_MESSAGE)),
            ))
        }
        Err(e) => {
            debug!(error = %e, "access token ignored");
            Ok(None)
        }
    }
}

fn require(user: Option<i64>) -> Result<AuthUser, ApiRejection> {
    user.map(AuthUser).ok_or((
        StatusCode::UNAUTHORIZED,
        Json(ApiResponse::message("invalid or missing access token")),
    ))
}

#[async_trait]
impl FromRequestParts<AppState> for MaybeAuthUser {
    type Rejection = ApiRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = access_token(&parts.headers) else {
            return Ok(MaybeAuthUser(None));
        };
        resolve(state.auth.parse_token(token).await).map(MaybeAuthUser)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let MaybeAuthUser(user) = MaybeAuthUser::from_request_parts(parts, state).await?;
        require(user)
    }
}
