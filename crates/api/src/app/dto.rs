use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};

use clinicrx_billing::Bill;
use clinicrx_core::money::format_amount;
use clinicrx_core::{BatchId, Money, Percent, SupplierId};
use clinicrx_inventory::{BatchFields, StockBatch, Supplier};
use clinicrx_orders::{BillingDomain, ManualLine, ServiceLine};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct RegisterSupplierRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ReceiveStockRequest {
    /// Operator text, e.g. "Tab. Paracetamol 500mg".
    pub descriptor: String,
    pub batch_number: String,
    pub expiry_date: NaiveDate,
    pub purchase_price: Money,
    pub sale_price: Money,
    #[serde(default)]
    pub tax_percent: Percent,
    pub quantity: u64,
    #[serde(default)]
    pub supplier_id: Option<SupplierId>,
}

impl ReceiveStockRequest {
    pub fn into_parts(self) -> (String, BatchFields) {
        (
            self.descriptor,
            BatchFields {
                batch_number: self.batch_number,
                expiry_date: self.expiry_date,
                purchase_price: self.purchase_price,
                sale_price: self.sale_price,
                tax_percent: self.tax_percent,
                quantity: self.quantity,
                supplier_id: self.supplier_id,
            },
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct BatchQuery {
    pub descriptor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BillQuery {
    pub domain: Option<BillingDomain>,
}

/// Operator edits applied to a built order before it is finalized.
#[derive(Debug, Default, Deserialize)]
pub struct OrderEdits {
    #[serde(default)]
    pub batch_overrides: Vec<BatchOverride>,
    #[serde(default)]
    pub quantity_overrides: Vec<QuantityOverride>,
    /// Line indexes to drop (applied last, highest first).
    #[serde(default)]
    pub remove_lines: Vec<usize>,
}

#[derive(Debug, Deserialize)]
pub struct BatchOverride {
    pub line: usize,
    pub batch_id: BatchId,
}

#[derive(Debug, Deserialize)]
pub struct QuantityOverride {
    pub line: usize,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct ManualBillRequest {
    #[serde(default)]
    pub subject_name: String,
    /// Bill domain for service-only bills (defaults to consultation).
    #[serde(default)]
    pub domain: Option<BillingDomain>,
    #[serde(default)]
    pub lines: Vec<ManualLine>,
    #[serde(default)]
    pub services: Vec<ServiceLine>,
    #[serde(default)]
    pub discount_percent: Percent,
    #[serde(default)]
    pub edits: OrderEdits,
}

#[derive(Debug, Default, Deserialize)]
pub struct PrescriptionBillRequest {
    #[serde(default)]
    pub discount_percent: Percent,
    #[serde(default)]
    pub edits: OrderEdits,
}

// -------------------------
// Response mapping
// -------------------------

pub fn supplier_to_json(supplier: &Supplier) -> JsonValue {
    json!({
        "id": supplier.id_typed().to_string(),
        "name": supplier.name(),
        "registered_at": supplier.registered_at().to_rfc3339(),
    })
}

pub fn batch_to_json(batch: &StockBatch) -> JsonValue {
    json!({
        "id": batch.id_typed().to_string(),
        "descriptor": batch.descriptor().label(),
        "key": batch.descriptor().key(),
        "batch_number": batch.batch_number(),
        "expiry_date": batch.expiry_date().to_string(),
        "supplier_id": batch.supplier_id().map(|id| id.to_string()),
        "purchase_price": format_amount(batch.purchase_price()),
        "sale_price": format_amount(batch.sale_price()),
        "tax_percent": batch.tax_percent().normalize().to_string(),
        "quantity_received": batch.quantity_received(),
        "quantity_available": batch.quantity_available(),
        "received_at": batch.received_at().to_rfc3339(),
    })
}

pub fn bill_to_json(bill: &Bill) -> JsonValue {
    let lines: Vec<JsonValue> = bill
        .lines()
        .iter()
        .map(|line| {
            json!({
                "kind": line.kind,
                "description": line.description,
                "batch_id": line.batch.as_ref().map(|b| b.batch_id.to_string()),
                "batch_number": line.batch.as_ref().map(|b| b.batch_number.clone()),
                "quantity": line.quantity,
                "unit_price": format_amount(line.unit_price),
                "tax_percent": line.tax_percent.normalize().to_string(),
                "line_amount": format_amount(line.line_amount),
            })
        })
        .collect();

    json!({
        "id": bill.id_typed().to_string(),
        "domain": bill.domain(),
        "status": bill.status(),
        "subject_name": bill.subject_name(),
        "source": bill.source().map(|s| s.as_str()),
        "lines": lines,
        "subtotal": format_amount(bill.subtotal()),
        "discount_percent": bill.discount_percent().normalize().to_string(),
        "tax_total": format_amount(bill.tax_total()),
        "total": format_amount(bill.total()),
        "issued_at": bill.issued_at().to_rfc3339(),
        "printed_at": bill.printed_at().map(|t| t.to_rfc3339()),
    })
}
