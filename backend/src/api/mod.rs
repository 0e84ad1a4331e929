//! HTTP API module.
//!
//! Dashboard endpoints, the shared server state and the log stream.

pub mod logs;
pub mod server;
pub mod types;

pub use logs::*;
pub use server::{router, start_server, AppState, SharedState};
pub use types::*;
