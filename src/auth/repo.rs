use std::ops::DerefMut;

use async_trait::async_trait;
use sqlx::{pool::PoolConnection, PgConnection, PgPool, Postgres, Transaction};
use tracing::error;

use super::repo_types::{StoreError, User};
use super::store::{AccountStore, AccountTx, ActivationCodeRepository, UserRepository};

// ---- Users ----

/// Insert a new user or update an existing one, depending on `user.id`.
pub async fn save_user(conn: &mut PgConnection, user: &mut User) -> Result<(), StoreError> {
    if user.id == 0 {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO users (name, email, password_hash, active)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.active)
        .fetch_one(&mut *conn)
        .await?;
        user.id = id;
        return Ok(());
    }

    sqlx::query(
        r#"
        UPDATE users
           SET name = $2, email = $3, password_hash = $4, active = $5
         WHERE id = $1
        "#,
    )
    .bind(user.id)
    .bind(&user.name)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.active)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Find a user by email.
pub async fn find_user_by_email(
    conn: &mut PgConnection,
    email: &str,
) -> Result<Option<User>, StoreError> {
    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, name, email, password_hash, active
        FROM users
        WHERE email = $1
        "#,
    )
    .bind(email)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(user)
}

pub async fn email_exists(conn: &mut PgConnection, email: &str) -> Result<bool, StoreError> {
    let exists =
        sqlx::query_scalar::<_, bool>(r#"SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)"#)
            .bind(email)
            .fetch_one(&mut *conn)
            .await?;
    Ok(exists)
}

pub async fn user_exists(conn: &mut PgConnection, id: i64) -> Result<bool, StoreError> {
    let exists =
        sqlx::query_scalar::<_, bool>(r#"SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)"#)
            .bind(id)
            .fetch_one(&mut *conn)
            .await?;
    Ok(exists)
}

pub async fn activate_user(conn: &mut PgConnection, id: i64) -> Result<bool, StoreError> {
    let result = sqlx::query(r#"UPDATE users SET active = TRUE WHERE id = $1"#)
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

// ---- Activation codes ----

pub async fn insert_code(conn: &mut PgConnection, code: &str, user_id: i64) -> Result<(), StoreError> {
    sqlx::query(r#"INSERT INTO activation_codes (code, user_id) VALUES ($1, $2)"#)
        .bind(code)
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Returns 0 when the code is unknown.
pub async fn code_user_id(conn: &mut PgConnection, code: &str) -> Result<i64, StoreError> {
    let user_id =
        sqlx::query_scalar::<_, i64>(r#"SELECT user_id FROM activation_codes WHERE code = $1"#)
            .bind(code)
            .fetch_optional(&mut *conn)
            .await?;
    Ok(user_id.unwrap_or(0))
}

pub async fn delete_codes(conn: &mut PgConnection, user_id: i64) -> Result<(), StoreError> {
    sqlx::query(r#"DELETE FROM activation_codes WHERE user_id = $1"#)
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

// ---- Store ----

/// Postgres-backed account store.
#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

/// A connection-owning session: either a transaction or a pooled connection.
pub struct PgSession<C>(C);

pub type PgTx = PgSession<Transaction<'static, Postgres>>;
pub type PgConn = PgSession<PoolConnection<Postgres>>;

#[async_trait]
impl<C> UserRepository for PgSession<C>
where
    C: DerefMut<Target = PgConnection> + Send,
{
    async fn save(&mut self, user: &mut User) -> Result<(), StoreError> {
        save_user(&mut *self.0, user).await
    }

    async fn get_by_email(&mut self, email: &str) -> Result<Option<User>, StoreError> {
        find_user_by_email(&mut *self.0, email).await
    }

    async fn email_exists(&mut self, email: &str) -> Result<bool, StoreError> {
        email_exists(&mut *self.0, email).await
    }

    async fn exists(&mut self, id: i64) -> Result<bool, StoreError> {
        user_exists(&mut *self.0, id).await
    }

    async fn activate(&mut self, id: i64) -> Result<bool, StoreError> {
        activate_user(&mut *self.0, id).await
    }
}

#[async_trait]
impl ActivationCodeRepository for PgTx {
    async fn add(&mut self, code: &str, user_id: i64) -> Result<(), StoreError> {
        insert_code(&mut *self.0, code, user_id).await
    }

    async fn get_user_id(&mut self, code: &str) -> Result<i64, StoreError> {
        code_user_id(&mut *self.0, code).await
    }

    async fn remove_codes(&mut self, user_id: i64) -> Result<(), StoreError> {
        delete_codes(&mut *self.0, user_id).await
    }
}

#[async_trait]
impl AccountTx for PgTx {
    async fn commit(self) -> Result<(), StoreError> {
        self.0.commit().await?;
        Ok(())
    }

    async fn rollback(self) {
        if let Err(e) = self.0.rollback().await {
            error!(error = %e, "tx rollback failed");
        }
    }
}

#[async_trait]
impl AccountStore for PgStore {
    type Tx = PgTx;
    type Conn = PgConn;

    async fn begin_tx(&self) -> Result<PgTx, StoreError> {
        Ok(PgSession(self.db.begin().await?))
    }

    async fn conn(&self) -> Result<PgConn, StoreError> {
        Ok(PgSession(self.db.acquire().await?))
    }
}
