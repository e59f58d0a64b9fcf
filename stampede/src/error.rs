use crate::executor::TransportError;
use stampede_core::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("setup register failed: {status} {body}")]
    Setup { status: u16, body: String },

    #[error("setup register failed: {0}")]
    SetupTransport(#[source] TransportError),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}
