//! Integration test infrastructure for the EnChat gateway.
//!
//! Each test gets a gateway served on a random local port, with a
//! `wiremock` server standing in for the upstream origin. A network
//! switch on the context simulates going offline.
//!
//! # Usage
//!
//! ```ignore
//! use enchat_tests::TestContext;
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let ctx = TestContext::new().await.unwrap();
//!     let resp = ctx.client.get("/static/style.css").await.unwrap();
//! }
//! ```

pub mod context;
pub mod fixtures;
pub mod helpers;

pub use context::TestContext;
pub use fixtures::*;
pub use helpers::*;

/// Initialize test logging (call once per test binary).
pub fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,enchat_gateway=debug,enchat_tests=debug")),
        )
        .with_test_writer()
        .try_init();
}
