pub mod runtime;
pub mod transport;

mod error;

pub use crate::error::RuntimeError;
pub use crate::runtime::{exit_status, StampedeRuntime, THRESHOLD_BREACH_EXIT};
pub use crate::transport::ReqwestTransport;
