use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const MAX_NAME_LEN: usize = 255;
const MAX_EMAIL_LEN: usize = 255;
const MAX_PASSWORD_LEN: usize = 70;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// What happened to the activation notification of a registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Delivered,
    Failed(String),
}

/// Result of a successful registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub user_id: i64,
    pub notification: PublishOutcome,
}

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name is required".into());
        }
        if self.name.chars().count() > MAX_NAME_LEN {
            return Err("name is too long".into());
        }
        validate_credentials(&self.email, &self.password)
    }
}

/// Request body for authentication.
#[derive(Debug, Deserialize)]
pub struct AuthenticateRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl AuthenticateRequest {
    pub fn validate(&self) -> Result<(), String> {
        validate_credentials(&self.email, &self.password)
    }
}

fn validate_credentials(email: &str, password: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("email is required".into());
    }
    if email.chars().count() > MAX_EMAIL_LEN || !is_valid_email(email) {
        return Err("invalid email".into());
    }
    if password.is_empty() {
        return Err("password is required".into());
    }
    if password.chars().count() > MAX_PASSWORD_LEN {
        return Err("password is too long".into());
    }
    Ok(())
}

/// Activation codes are issued as UUIDs; anything else cannot exist.
pub fn validate_activation_code(code: &str) -> Result<(), String> {
    Uuid::parse_str(code)
        .map(|_| ())
        .map_err(|_| "invalid activation code".to_string())
}

/// Envelope returned by every auth endpoint.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

impl ApiResponse {
    pub fn ok() -> Self {
        Self {
            ok: true,
            ..Self::default()
        }
    }

    pub fn token(access_token: String) -> Self {
        Self {
            ok: true,
            access_token: Some(access_token),
            ..Self::default()
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::default()
        }
    }
}

/// Identity resolved from the presented access token.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub ok: bool,
    pub user_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(name: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            name: name.into(),
            email: email.into(),
            password: password.into(),
        }
    }

    #[test]
    fn register_request_validation() {
        assert!(register("Ivan Ivanov", "i.ivanov@example.com", "Qwerty123!")
            .validate()
            .is_ok());
        assert!(register("", "i.ivanov@example.com", "Qwerty123!")
            .validate()
            .is_err());
        assert!(register("Ivan", "not-an-email", "Qwerty123!")
            .validate()
            .is_err());
        assert!(register("Ivan", "i.ivanov@example.com", &"x".repeat(71))
            .validate()
            .is_err());
        assert!(register(&"n".repeat(256), "i.ivanov@example.com", "pw")
            .validate()
            .is_err());
    }

    #[test]
    fn activation_code_must_be_uuid() {
        assert!(validate_activation_code(&Uuid::new_v4().to_string()).is_ok());
        assert!(validate_activation_code("dummyCode").is_err());
    }

    #[test]
    fn api_response_uses_camel_case_and_skips_empty_fields() {
        let json = serde_json::to_string(&ApiResponse::token("abc".into())).unwrap();
        assert_eq!(json, r#"{"ok":true,"accessToken":"abc"}"#);

        let json = serde_json::to_string(&ApiResponse::default()).unwrap();
        assert_eq!(json, r#"{"ok":false}"#);
    }
}
