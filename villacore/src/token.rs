use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

/// Websocket login token, rendered as `{villa_id}.{secret}.{bot_id}`.
///
/// While a bot is unpublished `villa_id` must be its test villa; published
/// bots pass `0`.
#[derive(Clone, PartialEq, Eq)]
pub struct LoginToken {
    pub villa_id: u64,
    pub secret: String,
    pub bot_id: String,
}

impl LoginToken {
    pub fn new(villa_id: u64, secret: impl Into<String>, bot_id: impl Into<String>) -> Self {
        Self {
            villa_id,
            secret: secret.into(),
            bot_id: bot_id.into(),
        }
    }

    /// Builds a token whose secret is encrypted with the bot's public key, as
    /// the gateway expects for bots that have one configured.
    pub fn with_pub_key(
        villa_id: u64,
        secret: &str,
        pub_key: &str,
        bot_id: impl Into<String>,
    ) -> Self {
        Self::new(villa_id, Self::encrypt_secret(secret, pub_key), bot_id)
    }

    /// HMAC-SHA256 keyed with the PEM public key, lowercase hex.
    pub fn encrypt_secret(secret: &str, pub_key: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(pub_key.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(secret.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

impl fmt::Display for LoginToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.villa_id, self.secret, self.bot_id)
    }
}

impl fmt::Debug for LoginToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginToken")
            .field("villa_id", &self.villa_id)
            .field("secret", &"<redacted>")
            .field("bot_id", &self.bot_id)
            .finish()
    }
}
