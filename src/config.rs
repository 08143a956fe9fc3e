use anyhow::Context;
use serde::Deserialize;

pub const DEFAULT_ISSUER: &str = "blog";
pub const DEFAULT_AUDIENCE: &str = "auth";

#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub leeway_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotifyConfig {
    pub redis_url: Option<String>,
    pub activation_stream: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app_env: String,
    pub server: ServerConfig,
    pub database_url: String,
    pub db_max_connections: u32,
    pub token: TokenConfig,
    pub notify: NotifyConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let app_env = std::env::var("APP_ENV").unwrap_or_else(|_| "LOCAL".into());
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;

        let secret = match std::env::var("ACCESS_TOKEN_SECRET") {
            Ok(s) if !s.is_empty() => s,
            _ if app_env == "PROD" => {
                anyhow::bail!("ACCESS_TOKEN_SECRET cannot be empty on PROD")
            }
            _ => "secret".into(),
        };

        let token = TokenConfig {
            secret,
            issuer: std::env::var("ACCESS_TOKEN_ISSUER").unwrap_or_else(|_| DEFAULT_ISSUER.into()),
            audience: std::env::var("ACCESS_TOKEN_AUDIENCE")
                .unwrap_or_else(|_| DEFAULT_AUDIENCE.into()),
            ttl_minutes: env_parse("ACCESS_TOKEN_TTL_MINUTES", 12 * 60),
            leeway_minutes: env_parse("ACCESS_TOKEN_LEEWAY_MINUTES", 2 * 60),
        };

        let notify = NotifyConfig {
            redis_url: std::env::var("REDIS_URL").ok().filter(|v| !v.is_empty()),
            activation_stream: std::env::var("ACTIVATION_STREAM")
                .unwrap_or_else(|_| "auth.activation_codes".into()),
        };

        let server = ServerConfig {
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env_parse("APP_PORT", 8080),
        };

        Ok(Self {
            app_env,
            server,
            database_url,
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", 10),
            token,
            notify,
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
impl TokenConfig {
    pub fn for_tests() -> Self {
        Self {
            secret: "test-secret".into(),
            issuer: DEFAULT_ISSUER.into(),
            audience: DEFAULT_AUDIENCE.into(),
            ttl_minutes: 12 * 60,
            leeway_minutes: 2 * 60,
        }
    }
}
