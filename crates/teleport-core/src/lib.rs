//! Core domain + application logic for the teleport relay bot.
//!
//! This crate is intentionally framework-agnostic. The Telegram client lives
//! behind a port (trait) implemented in the adapter crate.

pub mod assembler;
pub mod config;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod logging;
pub mod ports;
pub mod scheduler;
pub mod store;
pub mod wizard;

pub use errors::{Error, Result};
