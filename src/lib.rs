//! rr-balance: round-robin HTTP reverse proxy
//!
//! Features:
//! - Static backend registry built once from YAML configuration
//! - Lock-free round-robin selection across all replicas
//! - Streaming request/response forwarding with 502 on upstream failure

pub mod backends;
pub mod config;
pub mod proxy;

pub use backends::{Backend, BackendRegistry, RegistryError, Strategy};
pub use config::AppConfig;
pub use proxy::{run_server, Dispatcher, ServerError};
