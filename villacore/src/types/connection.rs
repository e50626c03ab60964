use async_trait::async_trait;
use serde::{Deserialize, Deserializer};

/// Websocket access info handed out by the platform for one bot.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConnectionInfo {
    #[serde(rename = "websocket_url")]
    pub endpoint_url: String,
    /// Numeric connection uid. The platform API sends it as a string.
    #[serde(deserialize_with = "uid_from_str_or_int")]
    pub uid: u64,
    pub app_id: i32,
    pub platform: i32,
    pub device_id: String,
}

impl ConnectionInfo {
    /// Parses the `data` object of a `getWebsocketInfo` response.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

fn uid_from_str_or_int<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Uid {
        Int(u64),
        Str(String),
    }

    match Uid::deserialize(deserializer)? {
        Uid::Int(uid) => Ok(uid),
        Uid::Str(uid) => uid.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Supplies everything a connection attempt needs to reach and log in to the
/// gateway. Called again on every reconnect; an error is retried after the
/// reconnect backoff.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn connection_info(&self) -> Result<ConnectionInfo, anyhow::Error>;

    /// Token presented in the login handshake, usually a
    /// [`LoginToken`](crate::token::LoginToken) rendered to a string.
    async fn login_token(&self) -> Result<String, anyhow::Error>;
}
