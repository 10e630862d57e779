//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: engine wiring (store, bus, external sources) and the blocking bridge
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use clinicrx_infra::{Settings, WorkflowError};

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
///
/// Opens the configured store, so call it off the async runtime.
pub fn build_app(settings: &Settings) -> Result<Router, WorkflowError> {
    let services = Arc::new(services::build_services(settings)?);
    Ok(router_with(services))
}

/// Router over already-built services.
pub fn router_with(services: Arc<services::AppServices>) -> Router {
    Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::router())
        .layer(ServiceBuilder::new().layer(Extension(services)))
}
