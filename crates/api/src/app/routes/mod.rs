use axum::Router;

pub mod bills;
pub mod stock;
pub mod suppliers;
pub mod system;

/// Router for all engine endpoints.
pub fn router() -> Router {
    Router::new()
        .nest("/suppliers", suppliers::router())
        .nest("/stock", stock::router())
        .nest("/bills", bills::router())
}
