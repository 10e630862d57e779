//! Billing domain module.
//!
//! Turns a composed order into an immutable bill: totals (`calculator`), sequential
//! per-domain ids (`sequence`) and the bill record with its status machine (`bill`).
//! Pure domain logic; stock deduction and persistence are orchestrated by the infra layer.

pub mod bill;
pub mod calculator;
pub mod events;
pub mod sequence;

pub use bill::{Bill, BillId, BillLine, BillStatus};
pub use calculator::{BillTotals, Priced, subtotal, summarize, tax_total, total};
pub use events::{BillFinalized, BillPrinted, BillingEvent};
pub use sequence::SequenceAllocator;
