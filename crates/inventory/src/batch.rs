use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use clinicrx_core::money::ensure_percent;
use clinicrx_core::{BatchId, DomainError, DomainResult, Entity, Money, Percent, SupplierId};

use crate::descriptor::DrugDescriptor;

/// Fields captured when a batch is received from a supplier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchFields {
    pub batch_number: String,
    pub expiry_date: NaiveDate,
    pub purchase_price: Money,
    pub sale_price: Money,
    pub tax_percent: Percent,
    pub quantity: u64,
    #[serde(default)]
    pub supplier_id: Option<SupplierId>,
}

impl BatchFields {
    pub fn validate(&self) -> DomainResult<()> {
        if self.batch_number.trim().is_empty() {
            return Err(DomainError::validation("batch number cannot be empty"));
        }
        if self.purchase_price < Decimal::ZERO {
            return Err(DomainError::validation("purchase price cannot be negative"));
        }
        if self.sale_price < Decimal::ZERO {
            return Err(DomainError::validation("sale price cannot be negative"));
        }
        ensure_percent(self.tax_percent, "tax percent")?;
        if self.quantity == 0 {
            return Err(DomainError::validation("received quantity must be positive"));
        }
        Ok(())
    }
}

/// One stock receipt: a discrete batch with its own number, expiry, prices and quantity.
///
/// Invariant: `0 <= quantity_available <= quantity_received`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockBatch {
    id: BatchId,
    descriptor: DrugDescriptor,
    supplier_id: Option<SupplierId>,
    batch_number: String,
    expiry_date: NaiveDate,
    purchase_price: Money,
    sale_price: Money,
    tax_percent: Percent,
    quantity_received: u64,
    quantity_available: u64,
    received_at: DateTime<Utc>,
}

impl StockBatch {
    /// Build a fresh batch from a receipt (`quantity_available = quantity_received`).
    pub fn receive(
        id: BatchId,
        descriptor: DrugDescriptor,
        fields: BatchFields,
        received_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        fields.validate()?;
        Ok(Self {
            id,
            descriptor,
            supplier_id: fields.supplier_id,
            batch_number: fields.batch_number.trim().to_string(),
            expiry_date: fields.expiry_date,
            purchase_price: fields.purchase_price,
            sale_price: fields.sale_price,
            tax_percent: fields.tax_percent,
            quantity_received: fields.quantity,
            quantity_available: fields.quantity,
            received_at,
        })
    }

    pub fn id_typed(&self) -> BatchId {
        self.id
    }

    pub fn descriptor(&self) -> &DrugDescriptor {
        &self.descriptor
    }

    pub fn supplier_id(&self) -> Option<SupplierId> {
        self.supplier_id
    }

    pub fn batch_number(&self) -> &str {
        &self.batch_number
    }

    pub fn expiry_date(&self) -> NaiveDate {
        self.expiry_date
    }

    pub fn purchase_price(&self) -> Money {
        self.purchase_price
    }

    pub fn sale_price(&self) -> Money {
        self.sale_price
    }

    pub fn tax_percent(&self) -> Percent {
        self.tax_percent
    }

    pub fn quantity_received(&self) -> u64 {
        self.quantity_received
    }

    pub fn quantity_available(&self) -> u64 {
        self.quantity_available
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    pub fn has_stock(&self) -> bool {
        self.quantity_available > 0
    }

    pub fn is_expired_on(&self, date: NaiveDate) -> bool {
        self.expiry_date < date
    }

    /// True while nothing has been deducted from the receipt.
    pub fn is_untouched(&self) -> bool {
        self.quantity_available == self.quantity_received
    }

    pub fn check_invariants(&self) -> DomainResult<()> {
        if self.quantity_available > self.quantity_received {
            return Err(DomainError::invariant(format!(
                "batch {} has {} available out of {} received",
                self.id, self.quantity_available, self.quantity_received
            )));
        }
        Ok(())
    }

    pub(crate) fn take(&mut self, quantity: u64) -> DomainResult<()> {
        if quantity > self.quantity_available {
            return Err(DomainError::InsufficientStock {
                descriptor: self.descriptor.label().to_string(),
                batch_id: self.id,
                requested: quantity,
                available: self.quantity_available,
            });
        }
        self.quantity_available -= quantity;
        Ok(())
    }

    pub(crate) fn put_back(&mut self, quantity: u64) -> DomainResult<()> {
        let restored = self
            .quantity_available
            .checked_add(quantity)
            .filter(|q| *q <= self.quantity_received)
            .ok_or_else(|| {
                DomainError::invariant(format!(
                    "restoring {quantity} to batch {} would exceed the {} received",
                    self.id, self.quantity_received
                ))
            })?;
        self.quantity_available = restored;
        Ok(())
    }
}

impl Entity for StockBatch {
    type Id = BatchId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn fields(quantity: u64) -> BatchFields {
        BatchFields {
            batch_number: "B-01".to_string(),
            expiry_date: NaiveDate::from_ymd_opt(2030, 1, 31).unwrap(),
            purchase_price: dec!(7.5),
            sale_price: dec!(10),
            tax_percent: dec!(5),
            quantity,
            supplier_id: None,
        }
    }

    fn batch(quantity: u64) -> StockBatch {
        StockBatch::receive(
            BatchId::new(),
            DrugDescriptor::parse("Tab. Paracetamol 500mg").unwrap(),
            fields(quantity),
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn receipt_starts_fully_available() {
        let b = batch(100);
        assert_eq!(b.quantity_received(), 100);
        assert_eq!(b.quantity_available(), 100);
        assert!(b.is_untouched());
    }

    #[test]
    fn receipt_rejects_bad_fields() {
        let descriptor = DrugDescriptor::parse("Tab. Paracetamol 500mg").unwrap();

        let mut f = fields(0);
        assert!(StockBatch::receive(BatchId::new(), descriptor.clone(), f.clone(), Utc::now()).is_err());

        f.quantity = 10;
        f.tax_percent = dec!(120);
        assert!(StockBatch::receive(BatchId::new(), descriptor.clone(), f.clone(), Utc::now()).is_err());

        f.tax_percent = dec!(5);
        f.batch_number = "  ".to_string();
        assert!(StockBatch::receive(BatchId::new(), descriptor, f, Utc::now()).is_err());
    }

    #[test]
    fn take_more_than_available_reports_context() {
        let mut b = batch(70);
        let err = b.take(80).unwrap_err();
        match err {
            DomainError::InsufficientStock {
                descriptor,
                batch_id,
                requested,
                available,
            } => {
                assert_eq!(descriptor, "Tab. Paracetamol 500mg");
                assert_eq!(batch_id, b.id_typed());
                assert_eq!(requested, 80);
                assert_eq!(available, 70);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }
        assert_eq!(b.quantity_available(), 70);
    }

    #[test]
    fn put_back_cannot_exceed_received() {
        let mut b = batch(10);
        b.take(4).unwrap();
        b.put_back(4).unwrap();
        assert!(b.put_back(1).is_err());
        assert_eq!(b.quantity_available(), 10);
    }

    #[test]
    fn batch_survives_json_round_trip() {
        let b = batch(5);
        let json = serde_json::to_string(&b).unwrap();
        let back: StockBatch = serde_json::from_str(&json).unwrap();
        assert_eq!(back, b);
    }
}
