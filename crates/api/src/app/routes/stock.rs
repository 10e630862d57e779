use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};

use crate::app::dto;
use crate::app::errors::ApiError;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/receipts", post(receive_stock))
        .route("/batches", get(list_batches))
}

pub async fn receive_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::ReceiveStockRequest>,
) -> Result<Response, ApiError> {
    let (descriptor, fields) = body.into_parts();
    let batch = services
        .run(move |s| Ok(s.workflow.receive_stock(&descriptor, fields)?))
        .await?;
    Ok((StatusCode::CREATED, Json(dto::batch_to_json(&batch))).into_response())
}

/// All batches, or those matching `?descriptor=` (free text, same matching as billing).
pub async fn list_batches(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::BatchQuery>,
) -> Response {
    let batches = match query.descriptor.as_deref().filter(|d| !d.trim().is_empty()) {
        Some(text) => services.workflow.match_batches(text),
        None => services.workflow.batches(),
    };
    let items = batches.iter().map(dto::batch_to_json).collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}
