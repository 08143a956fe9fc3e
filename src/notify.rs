use anyhow::Context;
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Payload delivered to the mailer so it can send the activation link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationMessage {
    pub email: String,
    pub code: String,
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("json marshal error: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("write message to redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// At-least-once outbound channel for activation codes.
#[async_trait]
pub trait ActivationPublisher: Send + Sync {
    async fn publish(&self, msg: &ActivationMessage) -> Result<(), PublishError>;
}

/// Appends activation messages to a Redis stream consumed by the mailer.
#[derive(Clone)]
pub struct RedisStreamPublisher {
    conn: MultiplexedConnection,
    stream: String,
}

impl RedisStreamPublisher {
    pub async fn connect(url: &str, stream: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(url).context("invalid redis url")?;
        let conn = client
            .get_multiplexed_tokio_connection()
            .await
            .context("connect to redis")?;
        info!(stream, "activation publisher connected to redis");
        Ok(Self {
            conn,
            stream: stream.to_string(),
        })
    }
}

#[async_trait]
impl ActivationPublisher for RedisStreamPublisher {
    async fn publish(&self, msg: &ActivationMessage) -> Result<(), PublishError> {
        let value = serde_json::to_string(msg)?;
        let mut conn = self.conn.clone();
        let id: String = redis::cmd("XADD")
            .arg(&self.stream)
            .arg("*")
            .arg("key")
            .arg("send_email")
            .arg("value")
            .arg(value)
            .query_async(&mut conn)
            .await?;
        debug!(stream = %self.stream, entry_id = %id, "activation message published");
        Ok(())
    }
}

/// Development fallback when no broker is configured: the message only goes
/// to the log.
#[derive(Clone, Default)]
pub struct LogPublisher;

#[async_trait]
impl ActivationPublisher for LogPublisher {
    async fn publish(&self, msg: &ActivationMessage) -> Result<(), PublishError> {
        info!(email = %msg.email, code = %msg.code, "activation message (not delivered, no broker)");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Records every message; optionally fails each publish after recording it.
    #[derive(Default)]
    pub struct RecordingPublisher {
        pub sent: Mutex<Vec<ActivationMessage>>,
        pub fail: bool,
    }

    impl RecordingPublisher {
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub fn sent(&self) -> Vec<ActivationMessage> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ActivationPublisher for RecordingPublisher {
        async fn publish(&self, msg: &ActivationMessage) -> Result<(), PublishError> {
            self.sent.lock().unwrap().push(msg.clone());
            if self.fail {
                let err = serde_json::from_str::<ActivationMessage>("{").unwrap_err();
                return Err(PublishError::Encode(err));
            }
            Ok(())
        }
    }
}
