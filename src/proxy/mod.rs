//! HTTP proxy server

mod forwarder;
mod handler;
pub mod server;

pub use forwarder::{Forwarder, UpstreamError};
pub use handler::Dispatcher;
pub use server::{build_router, run_server, serve, ServerError};
