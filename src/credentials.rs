use async_trait::async_trait;
use villacore::token::LoginToken;
use villacore::types::connection::{ConnectionInfo, CredentialProvider};

/// Credentials fixed up front, for bots whose websocket info is configured
/// rather than fetched from the platform API on each connect.
#[derive(Clone)]
pub struct StaticCredentials {
    info: ConnectionInfo,
    token: String,
}

impl StaticCredentials {
    pub fn new(info: ConnectionInfo, token: &LoginToken) -> Self {
        Self {
            info,
            token: token.to_string(),
        }
    }

    /// Uses an already rendered login token as-is.
    pub fn with_raw_token(info: ConnectionInfo, token: impl Into<String>) -> Self {
        Self {
            info,
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("info", &self.info)
            .field("token", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn connection_info(&self) -> Result<ConnectionInfo, anyhow::Error> {
        Ok(self.info.clone())
    }

    async fn login_token(&self) -> Result<String, anyhow::Error> {
        Ok(self.token.clone())
    }
}
