// Re-export core modules
pub use villacore::{framing, package, protocol, proto, token};

pub mod types {
    pub use villacore::types::*;
}

pub mod bot;
pub mod client;
pub mod config;
pub mod credentials;
mod dispatch;
pub mod handshake;
mod keepalive;
pub mod runner;
pub mod socket;
pub mod transport;

pub use bot::{Bot, BotBuilder};
pub use client::{Client, ClientError};
pub use config::ClientConfig;
pub use credentials::StaticCredentials;
pub use runner::{BotExit, Runner};
