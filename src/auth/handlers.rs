use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{
            validate_activation_code, ApiResponse, AuthenticateRequest, MeResponse,
            PublishOutcome, RegisterRequest,
        },
        errors::{AuthError, ErrorKind},
        extractors::{access_token, AuthUser},
    },
    state::AppState,
};

pub(crate) const INTERNAL_MESSAGE: &str = "sorry, try again later";
const CREDENTIALS_MESSAGE: &str = "credentials are wrong";

type ApiError = (StatusCode, Json<ApiResponse>);

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/user/register", post(register))
        .route("/auth/user/activate/:code", get(activate))
        .route("/auth/user/authenticate", post(authenticate))
        .route("/auth/token/refresh", post(refresh))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/auth/user/me", get(get_me))
}

fn internal(endpoint: &'static str, err: AuthError) -> ApiError {
    error!(error = %err, endpoint, "API internal server error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiResponse::message(INTERNAL_MESSAGE)),
    )
}

fn bad_request(message: String) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(ApiResponse::message(message)))
}

fn register_error(err: AuthError) -> ApiError {
    match err.kind() {
        ErrorKind::EmailBusy => bad_request(err.to_string()),
        _ => internal("register", err),
    }
}

fn activate_error(err: AuthError) -> ApiError {
    match err.kind() {
        ErrorKind::ActivationCodeNotFound | ErrorKind::UserNotFound => {
            (StatusCode::NOT_FOUND, Json(ApiResponse::default()))
        }
        _ => internal("activate", err),
    }
}

fn authenticate_error(err: AuthError) -> ApiError {
    match err.kind() {
        ErrorKind::UserNotFound | ErrorKind::IncorrectPassword => {
            bad_request(CREDENTIALS_MESSAGE.into())
        }
        _ => internal("authenticate", err),
    }
}

fn refresh_error(err: AuthError) -> ApiError {
    match err.kind() {
        ErrorKind::InvalidAccessToken | ErrorKind::UserNotFound => {
            (StatusCode::UNAUTHORIZED, Json(ApiResponse::default()))
        }
        _ => internal("refresh", err),
    }
}

/// Same headers as identity resolution: `X-Access-Token` or a bearer token.
fn presented_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    access_token(headers).ok_or((StatusCode::UNAUTHORIZED, Json(ApiResponse::default())))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<Json<ApiResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();
    payload.validate().map_err(|msg| {
        warn!(email = %payload.email, reason = %msg, "invalid register request");
        bad_request(msg)
    })?;

    let registration = state
        .auth
        .register(payload.name.trim(), &payload.email, &payload.password)
        .await
        .map_err(register_error)?;

    if let PublishOutcome::Failed(reason) = &registration.notification {
        warn!(user_id = registration.user_id, %reason, "activation code was not delivered");
    }
    Ok(Json(ApiResponse::ok()))
}

#[instrument(skip_all)]
pub async fn activate(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<ApiResponse>, ApiError> {
    validate_activation_code(&code).map_err(bad_request)?;

    state.auth.activate(&code).await.map_err(activate_error)?;
    Ok(Json(ApiResponse::ok()))
}

#[instrument(skip(state, payload))]
pub async fn authenticate(
    State(state): State<AppState>,
    Json(mut payload): Json<AuthenticateRequest>,
) -> Result<Json<ApiResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();
    payload.validate().map_err(bad_request)?;

    let token = state
        .auth
        .authenticate(&payload.email, &payload.password)
        .await
        .map_err(|e| {
            if e.kind() != ErrorKind::Internal {
                warn!(email = %payload.email, error = %e, "authentication refused");
            }
            authenticate_error(e)
        })?;
    Ok(Json(ApiResponse::token(token)))
}

#[instrument(skip_all)]
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse>, ApiError> {
    let token = presented_token(&headers)?;

    let token = state
        .auth
        .refresh_token(token)
        .await
        .map_err(refresh_error)?;
    info!("access token refreshed");
    Ok(Json(ApiResponse::token(token)))
}

#[instrument(skip_all)]
pub async fn get_me(AuthUser(user_id): AuthUser) -> Json<MeResponse> {
    Json(MeResponse { ok: true, user_id })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::TokenError;
    use crate::auth::repo_types::StoreError;

    fn infra() -> AuthError {
        AuthError::TxBegin(StoreError::Unavailable("down".into()))
    }

    #[test]
    fn register_maps_busy_email_to_bad_request() {
        let (status, Json(body)) = register_error(AuthError::EmailBusy);
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.message.as_deref(), Some("busy email"));

        let (status, Json(body)) = register_error(infra());
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.message.as_deref(), Some(INTERNAL_MESSAGE));
    }

    #[test]
    fn activate_maps_missing_code_and_user_to_not_found() {
        assert_eq!(
            activate_error(AuthError::ActivationCodeNotFound).0,
            StatusCode::NOT_FOUND
        );
        assert_eq!(activate_error(AuthError::UserNotFound).0, StatusCode::NOT_FOUND);
        assert_eq!(activate_error(infra()).0, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn authenticate_hides_which_credential_was_wrong() {
        let (s1, Json(b1)) = authenticate_error(AuthError::UserNotFound);
        let (s2, Json(b2)) = authenticate_error(AuthError::IncorrectPassword);
        assert_eq!(s1, StatusCode::BAD_REQUEST);
        assert_eq!(s1, s2);
        assert_eq!(b1.message, b2.message);
        assert_eq!(b1.message.as_deref(), Some(CREDENTIALS_MESSAGE));
    }

    #[test]
    fn refresh_reads_both_token_headers() {
        use axum::http::HeaderValue;

        let mut headers = HeaderMap::new();
        assert_eq!(presented_token(&headers).unwrap_err().0, StatusCode::UNAUTHORIZED);

        headers.insert("x-access-token", HeaderValue::from_static("direct"));
        assert_eq!(presented_token(&headers).ok(), Some("direct"));

        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer abc"));
        assert_eq!(presented_token(&headers).ok(), Some("abc"));
    }

    #[test]
    fn refresh_maps_token_failures_to_unauthorized() {
        let err = AuthError::TokenParse(TokenError::Malformed("bad".into()));
        assert_eq!(refresh_error(err).0, StatusCode::UNAUTHORIZED);
        assert_eq!(refresh_error(AuthError::UserNotFound).0, StatusCode::UNAUTHORIZED);
        assert_eq!(refresh_error(infra()).0, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
