//! Tokenizer inspection for text-conditioning models.
//!
//! Given a [`HostContext`] describing a loaded model, [`tokenize`] finds a compatible tokenizer on
//! one of the model's text encoders and renders either a prompt or an explicit id list as
//! highlighted token spans.  [`tab`] wraps the result in a page for display.
pub mod adapter;
pub mod config;
mod error;
pub mod host;
pub mod tab;
mod tokenize;

pub use error::{ErrorKind, Result, TokscopeError};
pub use host::{ConditioningModel, HostContext};
pub use tokenize::*;

#[cfg(test)]
pub mod test_helpers {
    use std::sync::OnceLock;
    use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};

    static TRACING: OnceLock<()> = OnceLock::new();

    /// Route tracing output through the test harness's captured writer.  Only the first call
    /// installs the subscriber.
    pub fn init_test_logging() {
        TRACING.get_or_init(|| {
            let filter = std::env::var("RUST_LOG")
                .map(EnvFilter::new)
                .unwrap_or_else(|_| EnvFilter::new("debug"));

            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_span_events(FmtSpan::CLOSE)
                .with_test_writer()
                .try_init()
                .ok();
        });
    }
}
