//! Core utilities shared by the kiln crates.
//!
//! This crate provides foundational types used across the renderer:
//! - Error types and result aliases
//! - Logging initialization
//! - Renderer configuration

pub mod config;
mod error;
mod logging;

pub use config::{MAX_FRAMES_IN_FLIGHT_LIMIT, RendererConfig};
pub use error::{Error, Result};
pub use logging::{LoggingConfig, init_logging};
