use thiserror::Error;

use super::jwt::TokenError;
use super::password::PasswordError;
use super::repo_types::StoreError;

/// Closed set of outcomes a caller may branch on. Anything else is `Internal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    EmailBusy,
    UserNotFound,
    ActivationCodeNotFound,
    IncorrectPassword,
    InvalidAccessToken,
    Internal,
}

/// Error returned by the account use cases.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("busy email")]
    EmailBusy,
    #[error("user not found")]
    UserNotFound,
    #[error("activation code not found")]
    ActivationCodeNotFound,
    #[error("incorrect password")]
    IncorrectPassword,
    #[error("access token parsing error: {0}")]
    TokenParse(#[source] TokenError),
    #[error("access token validation error: {0}")]
    TokenValidation(#[source] TokenError),

    #[error("tx beginning error: {0}")]
    TxBegin(#[source] StoreError),
    #[error("tx committing error: {0}")]
    TxCommit(#[source] StoreError),
    #[error("{step} error: {source}")]
    Store {
        step: &'static str,
        #[source]
        source: StoreError,
    },
    #[error("password hash generation error: {0}")]
    PasswordHash(#[source] PasswordError),
    #[error("password validation error: {0}")]
    PasswordValidate(#[source] PasswordError),
    #[error("access token signing error: {0}")]
    TokenSign(#[source] TokenError),
}

impl AuthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::EmailBusy => ErrorKind::EmailBusy,
            AuthError::UserNotFound => ErrorKind::UserNotFound,
            AuthError::ActivationCodeNotFound => ErrorKind::ActivationCodeNotFound,
            AuthError::IncorrectPassword => ErrorKind::IncorrectPassword,
            AuthError::TokenParse(_) | AuthError::TokenValidation(_) => {
                ErrorKind::InvalidAccessToken
            }
            AuthError::TxBegin(_)
            | AuthError::TxCommit(_)
            | AuthError::Store { .. }
            | AuthError::PasswordHash(_)
            | AuthError::PasswordValidate(_)
            | AuthError::TokenSign(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn store(step: &'static str) -> impl FnOnce(StoreError) -> Self {
        move |source| AuthError::Store { step, source }
    }
}
