//! Resolve free-text medicine names to ledger batches.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::batch::StockBatch;
use crate::descriptor::{self, DrugDescriptor};
use crate::ledger::StockLedger;

/// Order in which batches are offered when a line is resolved.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationPolicy {
    /// Earliest expiry first; ties keep receipt order.
    #[default]
    EarliestExpiry,
    /// First received first.
    ReceiptOrder,
}

impl AllocationPolicy {
    pub fn sort(self, batches: &mut [StockBatch]) {
        match self {
            // Stable sort keeps receipt order between equal expiry dates.
            AllocationPolicy::EarliestExpiry => batches.sort_by_key(StockBatch::expiry_date),
            AllocationPolicy::ReceiptOrder => {}
        }
    }
}

/// Matches prescription text against the canonical descriptors held by a ledger.
#[derive(Debug, Clone, Copy)]
pub struct ItemMatcher<'a> {
    ledger: &'a StockLedger,
    policy: AllocationPolicy,
}

impl<'a> ItemMatcher<'a> {
    pub fn new(ledger: &'a StockLedger) -> Self {
        Self {
            ledger,
            policy: AllocationPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: AllocationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> AllocationPolicy {
        self.policy
    }

    /// Case-folded, whitespace-collapsed key.
    pub fn normalize(name: &str) -> String {
        descriptor::normalize(name)
    }

    /// All batches matching `text`, receipt order. Empty when nothing matches.
    ///
    /// Lookup order: the normalized text as a key, then the canonical form derived from
    /// the text, then a loose match on whichever of form/name/strength the text carries.
    pub fn resolve(&self, text: &str) -> Vec<StockBatch> {
        let key = Self::normalize(text);
        if key.is_empty() {
            return Vec::new();
        }

        let exact = self.ledger.batches_for_key(&key);
        if !exact.is_empty() {
            return exact;
        }

        let parsed = match DrugDescriptor::parse(text) {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::debug!(text, error = %err, "medicine text could not be tokenized");
                return Vec::new();
            }
        };

        let canonical = self.ledger.batches_for(&parsed);
        if !canonical.is_empty() {
            return canonical;
        }

        let loose = self
            .ledger
            .batches_where(|b| parsed.loosely_matches(b.descriptor()));
        if loose.is_empty() {
            tracing::debug!(text, key = %parsed.key(), "no ledger batches match medicine text");
        }
        loose
    }

    /// Batches matching `text` that still have stock and are not expired on `today`,
    /// in allocation order.
    pub fn resolve_with_stock(&self, text: &str, today: NaiveDate) -> Vec<StockBatch> {
        let mut batches: Vec<StockBatch> = self
            .resolve(text)
            .into_iter()
            .filter(|b| b.has_stock() && !b.is_expired_on(today))
            .collect();
        self.policy.sort(&mut batches);
        batches
    }

    /// The batch a new line defaults to.
    pub fn first_available(&self, text: &str, today: NaiveDate) -> Option<StockBatch> {
        self.resolve_with_stock(text, today).into_iter().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::BatchFields;
    use rust_decimal_macros::dec;

    fn receive(ledger: &StockLedger, text: &str, batch_number: &str, quantity: u64, expiry_month: u32) -> StockBatch {
        ledger
            .receive_stock(
                DrugDescriptor::parse(text).unwrap(),
                BatchFields {
                    batch_number: batch_number.to_string(),
                    expiry_date: NaiveDate::from_ymd_opt(2030, expiry_month, 1).unwrap(),
                    purchase_price: dec!(8),
                    sale_price: dec!(10),
                    tax_percent: dec!(5),
                    quantity,
                    supplier_id: None,
                },
            )
            .unwrap()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2029, 6, 1).unwrap()
    }

    #[test]
    fn lookup_ignores_case_and_whitespace() {
        let ledger = StockLedger::new();
        let b = receive(&ledger, "Tab. Paracetamol 500mg", "P1", 100, 1);
        let matcher = ItemMatcher::new(&ledger);

        let found = matcher.resolve("tab.  paracetamol 500mg");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id_typed(), b.id_typed());
    }

    #[test]
    fn free_text_is_canonicalized_before_lookup() {
        let ledger = StockLedger::new();
        receive(&ledger, "Tab. Paracetamol 500mg", "P1", 100, 1);
        let matcher = ItemMatcher::new(&ledger);

        assert_eq!(matcher.resolve("TABLET paracetamol 500 mg").len(), 1);
        assert_eq!(matcher.resolve("Paracetamol 500mg").len(), 1);
    }

    #[test]
    fn unknown_medicine_resolves_to_nothing() {
        let ledger = StockLedger::new();
        receive(&ledger, "Tab. Paracetamol 500mg", "P1", 100, 1);
        let matcher = ItemMatcher::new(&ledger);

        assert!(matcher.resolve("Tab. Ibuprofen 400mg").is_empty());
        assert!(matcher.resolve("   ").is_empty());
    }

    #[test]
    fn earliest_expiry_with_stock_is_offered_first() {
        let ledger = StockLedger::new();
        receive(&ledger, "Tab. Paracetamol 500mg", "LATE", 10, 9);
        let empty = receive(&ledger, "Tab. Paracetamol 500mg", "EMPTY", 5, 1);
        ledger.deduct(empty.id_typed(), 5).unwrap();
        receive(&ledger, "Tab. Paracetamol 500mg", "SOON", 10, 3);

        let matcher = ItemMatcher::new(&ledger);
        let first = matcher.first_available("Tab. Paracetamol 500mg", today()).unwrap();
        assert_eq!(first.batch_number(), "SOON");

        let by_receipt = matcher.with_policy(AllocationPolicy::ReceiptOrder);
        let first = by_receipt.first_available("Tab. Paracetamol 500mg", today()).unwrap();
        assert_eq!(first.batch_number(), "LATE");
    }

    #[test]
    fn expired_batches_are_not_offered() {
        let ledger = StockLedger::new();
        receive(&ledger, "Tab. Paracetamol 500mg", "OLD", 10, 1);
        let matcher = ItemMatcher::new(&ledger);

        let after_expiry = NaiveDate::from_ymd_opt(2030, 2, 1).unwrap();
        assert!(matcher.first_available("Tab. Paracetamol 500mg", after_expiry).is_none());
        assert_eq!(matcher.resolve("Tab. Paracetamol 500mg").len(), 1);
    }
}
