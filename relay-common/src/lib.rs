//! Relay Common - Shared types, configuration, and logging for the relay service.
//!
//! This crate provides:
//! - Configuration types and loading
//! - Error types and handling utilities
//! - Logging setup

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;

pub use config::{BotConfig, Config, LineConfig, ObservabilityConfig, OpenAiConfig, ServerConfig};
pub use error::{Error, Result};
pub use logging::init_logging;
