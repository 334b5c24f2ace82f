//! Errors raised outside the GPU layer: windowing, surface creation and
//! configuration validation.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The platform refused to create or query a window.
    #[error("Window error: {0}")]
    Window(String),

    /// A presentation surface could not be created for a window.
    #[error("Surface error: {0}")]
    Surface(String),

    /// A [`RendererConfig`](crate::RendererConfig) value is unusable.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
