//! Relay core: bounded concurrent work-queue, authorization, rate limiting
//! and the multi-strategy delivery pipeline.
//!
//! Everything in this crate is transport-agnostic: the Telegram client is an
//! external collaborator reached through the [`transport::Transport`] trait.

pub mod dedup;
pub mod delivery;
pub mod error;
pub mod inbound;
pub mod limits;
pub mod links;
pub mod queue;
pub mod roles;
pub mod service;
pub mod snapshot;
#[cfg(test)]
pub(crate) mod testutil;
pub mod transport;
pub mod types;
pub mod worker;

pub use {
    error::{Error, Result},
    service::{RelayService, RelayState, ServiceOptions},
    types::{ChannelRef, UserId},
};
