//! HTTP control plane for the MyWant orchestrator (spec §4.6): the axum
//! `Router`, its DTOs, and the server-level configuration that
//! `mywant-server`'s binary wires together with an
//! [`mywant_core::Orchestrator`] and a snapshot store.

pub mod api;
pub mod config;
pub mod server;

pub use api::{create_router, AppState};
pub use config::ServerConfig;
pub use server::serve;
