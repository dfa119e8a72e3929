//! Telegram surface for the relay.
//!
//! Connects a Bot API client via teloxide, polls for updates, and bridges
//! inbound messages into the transport-agnostic core: commands and link
//! intake in `handlers`, the delivery transport in `transport`.

pub mod bot;
pub mod config;
pub mod error;
pub mod handlers;
pub mod transport;

pub use {
    config::RelayConfig,
    error::{Error, Result},
    handlers::BotContext,
    transport::RelayTransport,
};
