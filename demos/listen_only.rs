use chrono::Utc;
use log::{error, info};
use villa_ws::token::LoginToken;
use villa_ws::types::connection::ConnectionInfo;
use villa_ws::{Bot, ClientConfig, Runner, StaticCredentials};

// Connects one bot and logs every event payload it receives.
//
// Usage:
//   VILLA_BOT_ID=bot_xxx VILLA_BOT_SECRET=... VILLA_WS_INFO='{"websocket_url":...}' \
//     cargo run --example listen_only
//
// VILLA_WS_INFO is the `data` object of the platform's getWebsocketInfo reply.
// Set VILLA_PUB_KEY to encrypt the secret, and VILLA_ID to log in to an
// unpublished bot's test villa.

fn env(name: &str) -> Result<String, String> {
    std::env::var(name).map_err(|_| format!("{name} is not set"))
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "{} [{:<5}] [{}] - {}",
                Utc::now().format("%H:%M:%S"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to build tokio runtime");

    rt.block_on(async {
        let settings = (|| -> Result<_, String> {
            let bot_id = env("VILLA_BOT_ID")?;
            let secret = env("VILLA_BOT_SECRET")?;
            let info = ConnectionInfo::from_json(&env("VILLA_WS_INFO")?)
                .map_err(|e| format!("VILLA_WS_INFO is invalid: {e}"))?;
            let villa_id = match std::env::var("VILLA_ID") {
                Ok(id) => id.parse().map_err(|e| format!("VILLA_ID is invalid: {e}"))?,
                Err(_) => 0,
            };
            let token = match std::env::var("VILLA_PUB_KEY") {
                Ok(pub_key) => LoginToken::with_pub_key(villa_id, &secret, &pub_key, bot_id.clone()),
                Err(_) => LoginToken::new(villa_id, secret, bot_id.clone()),
            };
            Ok((bot_id, info, token))
        })();
        let (bot_id, info, token) = match settings {
            Ok(settings) => settings,
            Err(e) => {
                error!("{e}");
                return;
            }
        };

        let bot = match Bot::builder()
            .with_config(ClientConfig::for_bot(bot_id))
            .with_credentials(StaticCredentials::new(info, &token))
            .on_event(|payload, _client| async move {
                info!("Received event: {} bytes", payload.len());
            })
            .on_connected(|connected, _client| async move {
                info!("Bot is online (connection {})", connected.connection_id);
            })
            .on_disconnected(|disconnected, _client| async move {
                info!(
                    "Bot went offline: {:?} (reconnecting: {})",
                    disconnected.reason, disconnected.will_reconnect
                );
            })
            .build()
        {
            Ok(bot) => bot,
            Err(e) => {
                error!("Failed to build bot: {e}");
                return;
            }
        };

        // Ctrl-C or SIGTERM logs the bot out before the process exits.
        let exits = Runner::new()
            .with_bot(bot)
            .on_shutdown(|| async { info!("All bots have closed.") })
            .run()
            .await;
        for exit in exits {
            match exit.result {
                Ok(reason) => info!("[{}] Bot closed: {reason:?}", exit.bot_id),
                Err(e) => error!("[{}] Bot failed: {e:#}", exit.bot_id),
            }
        }
    });
}
