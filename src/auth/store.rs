use async_trait::async_trait;

use super::repo_types::{StoreError, User};

#[async_trait]
pub trait UserRepository: Send {
    /// Inserts when `user.id == 0` (assigning the id), otherwise updates.
    async fn save(&mut self, user: &mut User) -> Result<(), StoreError>;
    async fn get_by_email(&mut self, email: &str) -> Result<Option<User>, StoreError>;
    async fn email_exists(&mut self, email: &str) -> Result<bool, StoreError>;
    async fn exists(&mut self, id: i64) -> Result<bool, StoreError>;
    /// Returns `false` when no user row matched.
    async fn activate(&mut self, id: i64) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait ActivationCodeRepository: Send {
    async fn add(&mut self, code: &str, user_id: i64) -> Result<(), StoreError>;
    /// Returns `0` when the code is unknown.
    async fn get_user_id(&mut self, code: &str) -> Result<i64, StoreError>;
    async fn remove_codes(&mut self, user_id: i64) -> Result<(), StoreError>;
}

/// An open unit of work. Both finishing methods consume the handle.
#[async_trait]
pub trait AccountTx: UserRepository + ActivationCodeRepository + Sized {
    async fn commit(self) -> Result<(), StoreError>;
    /// Best effort; failures are logged, never returned.
    async fn rollback(self);
}

#[async_trait]
pub trait AccountStore: Send + Sync + 'static {
    type Tx: AccountTx;
    type Conn: UserRepository;

    async fn begin_tx(&self) -> Result<Self::Tx, StoreError>;
    /// Plain connection for reads that need no transaction.
    async fn conn(&self) -> Result<Self::Conn, StoreError>;
}
