use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use clinicrx_billing::Bill;
use clinicrx_inventory::{StockBatch, Supplier};

/// Current layout of a [`StoreSnapshot`] document.
pub const SNAPSHOT_FORMAT: u32 = 1;

fn default_format() -> u32 {
    SNAPSHOT_FORMAT
}

/// Everything the engine persists.
///
/// Batches and bills keep their order: batches in receipt order, bills in issue order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default = "default_format")]
    pub format: u32,
    #[serde(default)]
    pub batches: Vec<StockBatch>,
    #[serde(default)]
    pub bills: Vec<Bill>,
    #[serde(default)]
    pub suppliers: Vec<Supplier>,
}

impl Default for StoreSnapshot {
    fn default() -> Self {
        Self {
            format: SNAPSHOT_FORMAT,
            batches: Vec::new(),
            bills: Vec::new(),
            suppliers: Vec::new(),
        }
    }
}

impl StoreSnapshot {
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty() && self.bills.is_empty() && self.suppliers.is_empty()
    }

    /// Check a loaded snapshot before the engine trusts it.
    pub fn validate(&self) -> Result<(), PersistenceError> {
        if self.format != SNAPSHOT_FORMAT {
            return Err(PersistenceError::Corrupt(format!(
                "unsupported snapshot format {} (expected {SNAPSHOT_FORMAT})",
                self.format
            )));
        }

        let mut batch_ids = HashSet::with_capacity(self.batches.len());
        for batch in &self.batches {
            batch
                .check_invariants()
                .map_err(|e| PersistenceError::Corrupt(e.to_string()))?;
            if !batch_ids.insert(batch.id_typed()) {
                return Err(PersistenceError::Corrupt(format!(
                    "duplicate batch id {}",
                    batch.id_typed()
                )));
            }
        }

        let mut bill_ids = HashSet::with_capacity(self.bills.len());
        for bill in &self.bills {
            bill.check_invariants()
                .map_err(|e| PersistenceError::Corrupt(e.to_string()))?;
            if !bill_ids.insert(bill.id_typed()) {
                return Err(PersistenceError::Corrupt(format!(
                    "duplicate bill id {}",
                    bill.id_typed()
                )));
            }
        }

        let mut supplier_ids = HashSet::with_capacity(self.suppliers.len());
        for supplier in &self.suppliers {
            if !supplier_ids.insert(supplier.id_typed()) {
                return Err(PersistenceError::Corrupt(format!(
                    "duplicate supplier id {}",
                    supplier.id_typed()
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The stored document parsed but violates an engine invariant.
    #[error("corrupt store: {0}")]
    Corrupt(String),

    /// The backend refused the operation (e.g. offline); nothing was written.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Load/commit boundary.
///
/// `commit` must be atomic: after it returns, the store holds either the previous
/// snapshot or the new one, never a mix.
pub trait PersistenceGateway: Send + Sync {
    fn load(&self) -> Result<StoreSnapshot, PersistenceError>;

    fn commit(&self, snapshot: &StoreSnapshot) -> Result<(), PersistenceError>;
}

impl<G> PersistenceGateway for Arc<G>
where
    G: PersistenceGateway + ?Sized,
{
    fn load(&self) -> Result<StoreSnapshot, PersistenceError> {
        (**self).load()
    }

    fn commit(&self, snapshot: &StoreSnapshot) -> Result<(), PersistenceError> {
        (**self).commit(snapshot)
    }
}
