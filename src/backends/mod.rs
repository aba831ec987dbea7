//! Backend registry and selection strategies

mod node;
mod registry;
mod round_robin;
mod strategy;

pub use node::{parse_backend_url, Backend};
pub use registry::{BackendRegistry, RegistryError};
pub use strategy::Strategy;
