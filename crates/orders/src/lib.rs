//! Order composition for pharmacy, lab and consultation bills.
//!
//! Orders are drafts: they live only while the operator composes a bill and are never
//! persisted. Lines are resolved against the stock ledger (medicines) or the external
//! diagnostic-test catalog (lab tests).

pub mod builder;
pub mod order;
pub mod sources;

pub use builder::{ManualLine, OrderBuilder, ServiceLine};
pub use order::{BatchRef, BillingDomain, LineKind, LinePricing, Order, OrderLine};
pub use sources::{
    DiagnosticTestCatalog, InMemoryPrescriptionSource, InMemoryTestCatalog, PrescribedMedication,
    Prescription, PrescriptionId, PrescriptionSource,
};
