use std::sync::Arc;

use tracing::{info, instrument, warn};

use super::activation::ActivationService;
use super::dto::Registration;
use super::errors::AuthError;
use super::jwt::AccessTokenCodec;
use super::password::{PasswordError, PasswordHasher};
use super::repo_types::{StoreError, User};
use super::store::{AccountStore, AccountTx, UserRepository};
use crate::notify::ActivationPublisher;

/// Account use cases: register, activate, authenticate, refresh and parse.
///
/// Every use case that opens a transaction either commits it or rolls it back
/// before returning.
pub struct AuthService<S: AccountStore> {
    store: S,
    hasher: Arc<dyn PasswordHasher>,
    activation: ActivationService,
    tokens: AccessTokenCodec,
}

impl<S: AccountStore> AuthService<S> {
    pub fn new(
        store: S,
        hasher: Arc<dyn PasswordHasher>,
        publisher: Arc<dyn ActivationPublisher>,
        tokens: AccessTokenCodec,
    ) -> Self {
        Self {
            store,
            hasher,
            activation: ActivationService::new(publisher),
            tokens,
        }
    }

    #[instrument(skip(self, name, password))]
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<Registration, AuthError> {
        let mut tx = self.store.begin_tx().await.map_err(AuthError::TxBegin)?;

        let registration = match self.register_in_tx(&mut tx, name, email, password).await {
            Ok(r) => r,
            Err(e) => {
                tx.rollback().await;
                return Err(e);
            }
        };

        tx.commit().await.map_err(AuthError::TxCommit)?;
        info!(user_id = registration.user_id, "user registered");
        Ok(registration)
    }

    async fn register_in_tx(
        &self,
        tx: &mut S::Tx,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<Registration, AuthError> {
        let busy = tx
            .email_exists(email)
            .await
            .map_err(AuthError::store("email existence checking in repository"))?;
        if busy {
            return Err(AuthError::EmailBusy);
        }

        let password_hash = self
            .hasher
            .generate(password)
            .map_err(AuthError::PasswordHash)?;

        let mut user = User::new(name, email, password_hash);
        tx.save(&mut user).await.map_err(|e| match e {
            // lost a race with a concurrent registration of the same email
            StoreError::UniqueViolation => AuthError::EmailBusy,
            other => AuthError::store("user saving")(other),
        })?;

        let notification = self.activation.send_code(tx, &user).await?;
        Ok(Registration {
            user_id: user.id,
            notification,
        })
    }

    #[instrument(skip(self, code))]
    pub async fn activate(&self, code: &str) -> Result<(), AuthError> {
        let mut tx = self.store.begin_tx().await.map_err(AuthError::TxBegin)?;

        let user_id = match self.activation.activate(&mut tx, code).await {
            Ok(id) => id,
            Err(e) => {
                tx.rollback().await;
                return Err(e);
            }
        };

        tx.commit().await.map_err(AuthError::TxCommit)?;
        info!(user_id, "user activated");
        Ok(())
    }

    /// Returns a signed access token for valid credentials.
    #[instrument(skip(self, password))]
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<String, AuthError> {
        let mut conn = self
            .store
            .conn()
            .await
            .map_err(AuthError::store("connection acquiring"))?;
        let user = conn
            .get_by_email(email)
            .await
            .map_err(AuthError::store("user getting by email"))?
            .ok_or(AuthError::UserNotFound)?;

        self.hasher
            .validate(password, &user.password_hash)
            .map_err(|e| match e {
                PasswordError::Mismatch => AuthError::IncorrectPassword,
                other => AuthError::PasswordValidate(other),
            })?;

        let object = self.tokens.new_object(user.id);
        let token = self.tokens.sign(&object).map_err(AuthError::TokenSign)?;
        info!(user_id = user.id, "user authenticated");
        Ok(token)
    }

    /// Reissues a token for its subject. Expiration of the old token is not
    /// checked, only its signature.
    #[instrument(skip_all)]
    pub async fn refresh_token(&self, old_token: &str) -> Result<String, AuthError> {
        let mut object = self
            .tokens
            .parse(old_token)
            .map_err(AuthError::TokenParse)?;
        self.ensure_user_exists(object.user_id).await?;

        self.tokens.refresh(&mut object);
        self.tokens.sign(&object).map_err(AuthError::TokenSign)
    }

    /// Resolves the caller's identity from a token that must still be valid.
    #[instrument(skip_all)]
    pub async fn parse_token(&self, token: &str) -> Result<i64, AuthError> {
        let object = self
            .tokens
            .parse_and_validate(token)
            .map_err(|e| {
                warn!(error = %e, "access token rejected");
                AuthError::TokenValidation(e)
            })?;
        self.ensure_user_exists(object.user_id).await?;
        Ok(object.user_id)
    }

    async fn ensure_user_exists(&self, user_id: i64) -> Result<(), AuthError> {
        let mut conn = self
            .store
            .conn()
            .await
            .map_err(AuthError::store("connection acquiring"))?;
        let exists = conn
            .exists(user_id)
            .await
            .map_err(AuthError::store("user checking existence in repository"))?;
        if !exists {
            return Err(AuthError::UserNotFound);
        }
        Ok(())
    }
}
