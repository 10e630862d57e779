//! Pharmacy inventory domain module.
//!
//! Stock is tracked per receipt (batch). This crate owns the ledger of batches, the
//! canonical drug descriptor produced at receipt time, and the matcher that reconciles
//! free-text medicine names against that ledger. No IO, no HTTP, no storage.

pub mod batch;
pub mod descriptor;
pub mod events;
pub mod ledger;
pub mod matcher;
pub mod supplier;

pub use batch::{BatchFields, StockBatch};
pub use descriptor::{DrugDescriptor, normalize};
pub use events::{InventoryEvent, StockDeducted, StockReceived};
pub use ledger::{Deduction, StockLedger};
pub use matcher::{AllocationPolicy, ItemMatcher};
pub use supplier::Supplier;
