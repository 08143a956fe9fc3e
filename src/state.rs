use std::sync::Arc;

use tracing::warn;

use crate::auth::{jwt::AccessTokenCodec, password::Argon2Hasher, repo::PgStore, services::AuthService};
use crate::config::AppConfig;
use crate::db;
use crate::notify::{ActivationPublisher, LogPublisher, RedisStreamPublisher};

pub type Auth = AuthService<PgStore>;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub auth: Arc<Auth>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let pool = db::connect(&config).await?;
        db::migrate(&pool).await?;

        let publisher = match &config.notify.redis_url {
            Some(url) => Arc::new(
                RedisStreamPublisher::connect(url, &config.notify.activation_stream).await?,
            ) as Arc<dyn ActivationPublisher>,
            None => {
                warn!("REDIS_URL is not set; activation codes will only be logged");
                Arc::new(LogPublisher) as Arc<dyn ActivationPublisher>
            }
        };

        let auth = Arc::new(AuthService::new(
            PgStore::new(pool),
            Arc::new(Argon2Hasher),
            publisher,
            AccessTokenCodec::new(&config.token),
        ));

        Ok(Self { config, auth })
    }
}
