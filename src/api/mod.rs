//! HTTP API layer

pub mod server;
pub mod state;

pub use server::{build_router, serve, ApiServerConfig};
pub use state::{AppState, RetrieverRegistry};
