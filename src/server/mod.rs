#[allow(clippy::module_inception)]
pub mod server;
pub mod sse;

pub use server::{make_app, run_server, ApiError, ServerState};
