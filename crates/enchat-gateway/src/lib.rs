//! EnChat offline cache gateway.
//!
//! Sits between pages and their origin. Each intercepted request is
//! classified, routed to a caching strategy, and answered from the
//! network, a versioned cache partition or a synthesized fallback.
//! Versions are installed, activated and retired by the lifecycle
//! controller. The HTTP surface lives in [`routes`].

pub mod classifier;
pub mod clients;
pub mod control;
pub mod handlers;
pub mod lifecycle;
pub mod middleware;
pub mod network;
pub mod router;
pub mod routes;
pub mod state;
pub mod strategy;
pub mod sync;

#[cfg(test)]
pub(crate) mod test_support;

pub use classifier::{BypassReason, Classification, RequestClass, RequestClassifier};
pub use clients::ClientRegistry;
pub use control::{ControlMessage, ControlReply, VersionReply};
pub use lifecycle::{InstallOutcome, LifecycleController, LifecycleState, RegistrationInfo};
pub use network::UpstreamFetcher;
pub use router::{EventOutcome, FetchOutcome, FetchRoute, Gateway, GatewayEvent};
pub use routes::create_router;
pub use state::AppState;
pub use strategy::{Strategy, StrategyDispatcher, StrategyOutcome, WriteBehind};
pub use sync::{BackgroundSync, FileActionQueue, MemoryActionQueue, SyncReport};
