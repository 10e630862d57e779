use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};

use crate::app::dto;
use crate::app::errors::ApiError;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new().route("/", post(register_supplier).get(list_suppliers))
}

pub async fn register_supplier(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::RegisterSupplierRequest>,
) -> Result<Response, ApiError> {
    let supplier = services
        .run(move |s| Ok(s.workflow.register_supplier(&body.name)?))
        .await?;
    Ok((StatusCode::CREATED, Json(dto::supplier_to_json(&supplier))).into_response())
}

pub async fn list_suppliers(Extension(services): Extension<Arc<AppServices>>) -> Response {
    let items = services
        .workflow
        .suppliers()
        .iter()
        .map(dto::supplier_to_json)
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}
