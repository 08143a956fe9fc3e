use std::sync::Arc;

use tracing::{debug, error};
use uuid::Uuid;

use super::dto::PublishOutcome;
use super::errors::AuthError;
use super::repo_types::User;
use super::store::AccountTx;
use crate::notify::{ActivationMessage, ActivationPublisher};

/// Issues activation codes inside the caller's transaction and exchanges them
/// for an active account.
#[derive(Clone)]
pub struct ActivationService {
    publisher: Arc<dyn ActivationPublisher>,
}

impl ActivationService {
    pub fn new(publisher: Arc<dyn ActivationPublisher>) -> Self {
        Self { publisher }
    }

    /// Stores a fresh code for `user` and publishes it. A failed publish is
    /// logged and reported in the outcome; it never fails the call.
    pub async fn send_code<T: AccountTx>(
        &self,
        tx: &mut T,
        user: &User,
    ) -> Result<PublishOutcome, AuthError> {
        let code = Uuid::new_v4().to_string();
        tx.add(&code, user.id)
            .await
            .map_err(AuthError::store("activation code adding to repository"))?;

        let msg = ActivationMessage {
            email: user.email.clone(),
            code,
        };
        match self.publisher.publish(&msg).await {
            Ok(()) => {
                debug!(user_id = user.id, "activation code published");
                Ok(PublishOutcome::Delivered)
            }
            Err(e) => {
                error!(error = %e, user_id = user.id, "produce activation message error");
                Ok(PublishOutcome::Failed(e.to_string()))
            }
        }
    }

    /// Marks the code's owner active and retires all of their codes.
    pub async fn activate<T: AccountTx>(&self, tx: &mut T, code: &str) -> Result<i64, AuthError> {
        let user_id = tx
            .get_user_id(code)
            .await
            .map_err(AuthError::store("user ID getting from repository"))?;
        if user_id == 0 {
            return Err(AuthError::ActivationCodeNotFound);
        }

        let activated = tx
            .activate(user_id)
            .await
            .map_err(AuthError::store("user activating in repository"))?;
        if !activated {
            return Err(AuthError::UserNotFound);
        }

        tx.remove_codes(user_id)
            .await
            .map_err(AuthError::store("codes removing from repository"))?;
        Ok(user_id)
    }
}
