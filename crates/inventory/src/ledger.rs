//! Stock ledger: every batch ever received, in receipt order.
//!
//! The ledger is the only place batch quantities change. Each mutation takes the write
//! lock once and performs its whole read-decide-write step under it, so two deductions
//! against the same batch can never interleave.

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use clinicrx_core::{BatchId, DomainError, DomainResult};

use crate::batch::{BatchFields, StockBatch};
use crate::descriptor::DrugDescriptor;

/// One requested decrement of a batch.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deduction {
    pub batch_id: BatchId,
    pub quantity: u64,
}

#[derive(Debug, Default)]
struct LedgerState {
    batches: Vec<StockBatch>,
    by_id: HashMap<BatchId, usize>,
    by_key: HashMap<String, Vec<usize>>,
}

impl LedgerState {
    fn push(&mut self, batch: StockBatch) -> DomainResult<()> {
        let id = batch.id_typed();
        if self.by_id.contains_key(&id) {
            return Err(DomainError::invariant(format!("duplicate batch id {id}")));
        }
        let pos = self.batches.len();
        self.by_key
            .entry(batch.descriptor().key())
            .or_default()
            .push(pos);
        self.by_id.insert(id, pos);
        self.batches.push(batch);
        Ok(())
    }

    fn get_mut(&mut self, id: BatchId) -> DomainResult<&mut StockBatch> {
        let pos = *self
            .by_id
            .get(&id)
            .ok_or_else(|| DomainError::not_found(format!("batch {id}")))?;
        self.batches
            .get_mut(pos)
            .ok_or_else(|| DomainError::invariant(format!("ledger index out of sync for {id}")))
    }

    fn by_key(&self, key: &str) -> Vec<StockBatch> {
        self.by_key
            .get(key)
            .map(|positions| {
                positions
                    .iter()
                    .filter_map(|pos| self.batches.get(*pos).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// In-process ledger of stock batches.
#[derive(Debug, Default)]
pub struct StockLedger {
    inner: RwLock<LedgerState>,
}

impl StockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a ledger from persisted batches (receipt order preserved).
    pub fn from_batches(batches: Vec<StockBatch>) -> DomainResult<Self> {
        let mut state = LedgerState::default();
        for batch in batches {
            batch.check_invariants()?;
            state.push(batch)?;
        }
        Ok(Self {
            inner: RwLock::new(state),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, LedgerState> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, LedgerState> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a receipt as a new batch.
    ///
    /// Receipts are never merged: the same batch number received twice yields two entries.
    pub fn receive_stock(
        &self,
        descriptor: DrugDescriptor,
        fields: BatchFields,
    ) -> DomainResult<StockBatch> {
        let batch = StockBatch::receive(BatchId::new(), descriptor, fields, Utc::now())?;
        self.write().push(batch.clone())?;
        tracing::debug!(
            batch_id = %batch.id_typed(),
            descriptor = %batch.descriptor(),
            quantity = batch.quantity_received(),
            "stock received"
        );
        Ok(batch)
    }

    /// Drop a receipt that never made it to the store.
    ///
    /// Only the most recent receipt can be dropped, and only while untouched.
    pub fn rollback_receipt(&self, batch_id: BatchId) -> DomainResult<()> {
        let mut state = self.write();
        let last = state
            .batches
            .last()
            .ok_or_else(|| DomainError::not_found(format!("batch {batch_id}")))?;
        if last.id_typed() != batch_id || !last.is_untouched() {
            return Err(DomainError::conflict(format!(
                "batch {batch_id} is not the latest untouched receipt"
            )));
        }
        let key = last.descriptor().key();
        let pos = state.batches.len() - 1;
        state.batches.pop();
        state.by_id.remove(&batch_id);
        if let Some(positions) = state.by_key.get_mut(&key) {
            positions.retain(|p| *p != pos);
            if positions.is_empty() {
                state.by_key.remove(&key);
            }
        }
        Ok(())
    }

    /// Batches for a descriptor, in receipt order.
    pub fn batches_for(&self, descriptor: &DrugDescriptor) -> Vec<StockBatch> {
        self.batches_for_key(&descriptor.key())
    }

    /// Batches for an already-normalized descriptor key, in receipt order.
    pub fn batches_for_key(&self, key: &str) -> Vec<StockBatch> {
        self.read().by_key(key)
    }

    /// Batches satisfying a predicate, in receipt order.
    pub fn batches_where(&self, predicate: impl Fn(&StockBatch) -> bool) -> Vec<StockBatch> {
        self.read()
            .batches
            .iter()
            .filter(|b| predicate(b))
            .cloned()
            .collect()
    }

    pub fn batch(&self, batch_id: BatchId) -> Option<StockBatch> {
        let state = self.read();
        state
            .by_id
            .get(&batch_id)
            .and_then(|pos| state.batches.get(*pos))
            .cloned()
    }

    /// Total quantity left across every batch of a descriptor; saturates at `u64::MAX`.
    pub fn available_for(&self, descriptor: &DrugDescriptor) -> u64 {
        self.batches_for(descriptor)
            .iter()
            .map(StockBatch::quantity_available)
            .fold(0, u64::saturating_add)
    }

    /// Batches with stock left that expire before `date`, earliest first.
    pub fn expiring_before(&self, date: NaiveDate) -> Vec<StockBatch> {
        let mut batches = self.batches_where(|b| b.has_stock() && b.expiry_date() < date);
        batches.sort_by_key(StockBatch::expiry_date);
        batches
    }

    /// Decrement one batch. Fails with `InsufficientStock` when `quantity` exceeds what is left.
    pub fn deduct(&self, batch_id: BatchId, quantity: u64) -> DomainResult<StockBatch> {
        let mut state = self.write();
        let batch = state.get_mut(batch_id)?;
        batch.take(quantity)?;
        Ok(batch.clone())
    }

    /// Apply several deductions as one step.
    ///
    /// On the first failure every deduction already applied by this call is put back
    /// before the error is returned, so the ledger is left exactly as it was.
    pub fn deduct_all(&self, deductions: &[Deduction]) -> DomainResult<Vec<StockBatch>> {
        let mut state = self.write();
        let mut applied: Vec<Deduction> = Vec::with_capacity(deductions.len());

        for deduction in deductions {
            let outcome = state
                .get_mut(deduction.batch_id)
                .and_then(|batch| batch.take(deduction.quantity));

            if let Err(err) = outcome {
                for done in applied.iter().rev() {
                    state.get_mut(done.batch_id)?.put_back(done.quantity)?;
                }
                return Err(err);
            }
            applied.push(*deduction);
        }

        let touched: HashSet<BatchId> = deductions.iter().map(|d| d.batch_id).collect();
        let mut updated = Vec::with_capacity(touched.len());
        for id in touched {
            updated.push(state.get_mut(id)?.clone());
        }
        Ok(updated)
    }

    /// Put back deductions whose commit failed.
    pub fn restore(&self, deductions: &[Deduction]) -> DomainResult<()> {
        let mut state = self.write();
        for deduction in deductions.iter().rev() {
            state
                .get_mut(deduction.batch_id)?
                .put_back(deduction.quantity)?;
        }
        Ok(())
    }

    /// Copy of every batch, receipt order.
    pub fn snapshot(&self) -> Vec<StockBatch> {
        self.read().batches.clone()
    }

    pub fn len(&self) -> usize {
        self.read().batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn paracetamol() -> DrugDescriptor {
        DrugDescriptor::parse("Tab. Paracetamol 500mg").unwrap()
    }

    fn fields(batch_number: &str, quantity: u64, expiry_month: u32) -> BatchFields {
        BatchFields {
            batch_number: batch_number.to_string(),
            expiry_date: NaiveDate::from_ymd_opt(2030, expiry_month, 1).unwrap(),
            purchase_price: dec!(8),
            sale_price: dec!(10),
            tax_percent: dec!(5),
            quantity,
            supplier_id: None,
        }
    }

    #[test]
    fn repeated_batch_numbers_stay_distinct_entries() {
        let ledger = StockLedger::new();
        let a = ledger.receive_stock(paracetamol(), fields("P1", 10, 1)).unwrap();
        let b = ledger.receive_stock(paracetamol(), fields("P1", 20, 1)).unwrap();

        let batches = ledger.batches_for(&paracetamol());
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].id_typed(), a.id_typed());
        assert_eq!(batches[1].id_typed(), b.id_typed());
        assert_eq!(ledger.available_for(&paracetamol()), 30);
    }

    #[test]
    fn availability_saturates_on_huge_receipts() {
        let ledger = StockLedger::new();
        ledger.receive_stock(paracetamol(), fields("P1", u64::MAX, 1)).unwrap();
        ledger.receive_stock(paracetamol(), fields("P2", 5, 2)).unwrap();
        assert_eq!(ledger.available_for(&paracetamol()), u64::MAX);
    }

    #[test]
    fn deduct_decrements_and_returns_updated_batch() {
        let ledger = StockLedger::new();
        let b = ledger.receive_stock(paracetamol(), fields("P1", 100, 1)).unwrap();

        let updated = ledger.deduct(b.id_typed(), 30).unwrap();
        assert_eq!(updated.quantity_available(), 70);
        assert_eq!(ledger.batch(b.id_typed()).unwrap().quantity_available(), 70);
    }

    #[test]
    fn over_deduction_fails_and_leaves_quantity_unchanged() {
        let ledger = StockLedger::new();
        let b = ledger.receive_stock(paracetamol(), fields("P1", 70, 1)).unwrap();

        let err = ledger.deduct(b.id_typed(), 80).unwrap_err();
        assert!(matches!(err, DomainError::InsufficientStock { requested: 80, available: 70, .. }));
        assert_eq!(ledger.batch(b.id_typed()).unwrap().quantity_available(), 70);
    }

    #[test]
    fn unknown_batch_is_not_found() {
        let ledger = StockLedger::new();
        assert!(matches!(
            ledger.deduct(BatchId::new(), 1),
            Err(DomainError::NotFound(_))
        ));
    }

    #[test]
    fn deduct_all_rolls_back_earlier_deductions_on_failure() {
        let ledger = StockLedger::new();
        let a = ledger.receive_stock(paracetamol(), fields("P1", 50, 1)).unwrap();
        let b = ledger.receive_stock(paracetamol(), fields("P2", 5, 2)).unwrap();

        let err = ledger
            .deduct_all(&[
                Deduction { batch_id: a.id_typed(), quantity: 20 },
                Deduction { batch_id: b.id_typed(), quantity: 6 },
            ])
            .unwrap_err();

        assert!(matches!(err, DomainError::InsufficientStock { .. }));
        assert_eq!(ledger.batch(a.id_typed()).unwrap().quantity_available(), 50);
        assert_eq!(ledger.batch(b.id_typed()).unwrap().quantity_available(), 5);
    }

    #[test]
    fn deduct_all_accumulates_lines_on_the_same_batch() {
        let ledger = StockLedger::new();
        let a = ledger.receive_stock(paracetamol(), fields("P1", 10, 1)).unwrap();

        let err = ledger.deduct_all(&[
            Deduction { batch_id: a.id_typed(), quantity: 6 },
            Deduction { batch_id: a.id_typed(), quantity: 6 },
        ]);
        assert!(err.is_err());
        assert_eq!(ledger.batch(a.id_typed()).unwrap().quantity_available(), 10);

        let updated = ledger
            .deduct_all(&[
                Deduction { batch_id: a.id_typed(), quantity: 4 },
                Deduction { batch_id: a.id_typed(), quantity: 6 },
            ])
            .unwrap();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].quantity_available(), 0);
    }

    #[test]
    fn restore_undoes_a_committed_in_memory_deduction() {
        let ledger = StockLedger::new();
        let a = ledger.receive_stock(paracetamol(), fields("P1", 10, 1)).unwrap();
        let d = [Deduction { batch_id: a.id_typed(), quantity: 3 }];

        ledger.deduct_all(&d).unwrap();
        ledger.restore(&d).unwrap();

        assert_eq!(ledger.batch(a.id_typed()).unwrap().quantity_available(), 10);
        assert!(ledger.restore(&d).is_err());
    }

    #[test]
    fn rollback_receipt_only_drops_latest_untouched_batch() {
        let ledger = StockLedger::new();
        let a = ledger.receive_stock(paracetamol(), fields("P1", 10, 1)).unwrap();
        let b = ledger.receive_stock(paracetamol(), fields("P2", 10, 1)).unwrap();

        assert!(ledger.rollback_receipt(a.id_typed()).is_err());
        ledger.rollback_receipt(b.id_typed()).unwrap();

        assert_eq!(ledger.len(), 1);
        assert!(ledger.batch(b.id_typed()).is_none());
        assert_eq!(ledger.batches_for(&paracetamol()).len(), 1);
    }

    #[test]
    fn from_batches_rejects_duplicates() {
        let ledger = StockLedger::new();
        let a = ledger.receive_stock(paracetamol(), fields("P1", 10, 1)).unwrap();

        assert!(StockLedger::from_batches(vec![a.clone(), a]).is_err());
    }

    #[test]
    fn expiring_before_sorts_by_expiry() {
        let ledger = StockLedger::new();
        ledger.receive_stock(paracetamol(), fields("LATE", 10, 9)).unwrap();
        ledger.receive_stock(paracetamol(), fields("EARLY", 10, 2)).unwrap();

        let cutoff = NaiveDate::from_ymd_opt(2031, 1, 1).unwrap();
        let expiring = ledger.expiring_before(cutoff);
        assert_eq!(expiring[0].batch_number(), "EARLY");
        assert_eq!(expiring[1].batch_number(), "LATE");
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: whatever deductions are attempted, available stays within [0, received].
        #[test]
        fn available_never_leaves_bounds(
            received in 1u64..500,
            attempts in prop::collection::vec(0u64..200, 0..30)
        ) {
            let ledger = StockLedger::new();
            let b = ledger.receive_stock(paracetamol(), fields("P1", received, 1)).unwrap();

            let mut expected = received;
            for qty in attempts {
                match ledger.deduct(b.id_typed(), qty) {
                    Ok(updated) => {
                        expected -= qty;
                        prop_assert_eq!(updated.quantity_available(), expected);
                    }
                    Err(DomainError::InsufficientStock { available, .. }) => {
                        prop_assert!(qty > available);
                    }
                    Err(other) => prop_assert!(false, "unexpected error {other:?}"),
                }
                let current = ledger.batch(b.id_typed()).unwrap();
                prop_assert!(current.quantity_available() <= current.quantity_received());
            }
        }
    }
}
