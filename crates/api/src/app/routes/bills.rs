use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};

use clinicrx_billing::BillId;
use clinicrx_core::{DomainError, DomainResult};
use clinicrx_infra::PlainTextReceipt;
use clinicrx_orders::{BillingDomain, Order, OrderBuilder, PrescriptionId};

use crate::app::dto;
use crate::app::errors::ApiError;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_bills))
        .route("/manual", post(create_manual_bill))
        .route("/prescriptions/:prescription_id", post(create_prescription_bill))
        .route("/:bill_id", get(get_bill))
        .route("/:bill_id/print", post(print_bill))
}

fn apply_edits(builder: &OrderBuilder<'_>, order: &mut Order, edits: &dto::OrderEdits) -> DomainResult<()> {
    for o in &edits.batch_overrides {
        builder.change_batch(order, o.line, o.batch_id)?;
    }
    for o in &edits.quantity_overrides {
        builder.change_quantity(order, o.line, o.quantity)?;
    }

    let mut removals = edits.remove_lines.clone();
    removals.sort_unstable_by(|a, b| b.cmp(a));
    removals.dedup();
    for index in removals {
        builder.remove_line(order, index)?;
    }
    Ok(())
}

fn parse_bill_id(raw: &str) -> Result<BillId, ApiError> {
    raw.parse::<BillId>().map_err(ApiError::from)
}

pub async fn create_manual_bill(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::ManualBillRequest>,
) -> Result<Response, ApiError> {
    let bill = services
        .run(move |s| {
            if !body.lines.is_empty() && !body.services.is_empty() {
                return Err(DomainError::validation("a bill takes either item lines or service lines, not both").into());
            }

            let builder = s.workflow.order_builder(s.catalog.as_ref());
            let mut order = if body.services.is_empty() {
                builder.from_manual_entry(&body.subject_name, &body.lines)?
            } else {
                let domain = body.domain.unwrap_or(BillingDomain::Consultation);
                if domain.deducts_stock() {
                    return Err(DomainError::validation("service lines cannot be billed in the pharmacy domain").into());
                }
                builder.service_order(domain, &body.subject_name, &body.services)?
            };
            apply_edits(&builder, &mut order, &body.edits)?;

            Ok(s.workflow.finalize(&order, body.discount_percent)?)
        })
        .await?;

    Ok((StatusCode::CREATED, Json(dto::bill_to_json(&bill))).into_response())
}

pub async fn create_prescription_bill(
    Extension(services): Extension<Arc<AppServices>>,
    Path(prescription_id): Path<String>,
    body: Option<Json<dto::PrescriptionBillRequest>>,
) -> Result<Response, ApiError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let bill = services
        .run(move |s| {
            let id = PrescriptionId::new(&prescription_id)?;
            let prescription = s
                .prescriptions
                .prescription(&id)
                .ok_or_else(|| DomainError::not_found(format!("prescription {id}")))?;

            let builder = s.workflow.order_builder(s.catalog.as_ref());
            let mut order = builder.from_prescription(&prescription)?;
            apply_edits(&builder, &mut order, &body.edits)?;

            Ok(s.workflow.finalize(&order, body.discount_percent)?)
        })
        .await?;

    Ok((StatusCode::CREATED, Json(dto::bill_to_json(&bill))).into_response())
}

pub async fn list_bills(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::BillQuery>,
) -> Response {
    let bills = match query.domain {
        Some(domain) => services.workflow.bills_in(domain),
        None => services.workflow.bills(),
    };
    let items = bills.iter().map(dto::bill_to_json).collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

pub async fn get_bill(
    Extension(services): Extension<Arc<AppServices>>,
    Path(bill_id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_bill_id(&bill_id)?;
    let bill = services
        .workflow
        .bill(id)
        .ok_or_else(|| DomainError::not_found(format!("bill {id}")))?;
    Ok((StatusCode::OK, Json(dto::bill_to_json(&bill))).into_response())
}

/// Render the receipt and mark the bill printed. Reprinting is allowed.
pub async fn print_bill(
    Extension(services): Extension<Arc<AppServices>>,
    Path(bill_id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_bill_id(&bill_id)?;
    let (bill, receipt) = services
        .run(move |s| {
            let receipt = s.workflow.print(id, &PlainTextReceipt::default())?;
            let bill = s
                .workflow
                .bill(id)
                .ok_or_else(|| DomainError::not_found(format!("bill {id}")))?;
            Ok((bill, receipt))
        })
        .await?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "bill": dto::bill_to_json(&bill),
            "receipt": receipt,
        })),
    )
        .into_response())
}
