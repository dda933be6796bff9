//! VIP Relay: webhook-driven VIP role assignment for a Discord guild.
//!
//! A payment or membership system POSTs to the relay with a shared secret,
//! a Discord user id and a role label. The relay grants or revokes the
//! matching VIP role and posts an audit embed to a fixed channel.
//!
//! See `DESIGN.md` for the component breakdown.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod logging;

pub mod platform;
pub mod roles;
pub mod session;

pub mod audit;
pub mod membership;

pub mod relay;
pub mod server;
