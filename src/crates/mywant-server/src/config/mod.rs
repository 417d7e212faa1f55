//! Server-level configuration: bind address and snapshot settings.

pub mod server;

pub use server::{ServerConfig, ServerConfigError};
