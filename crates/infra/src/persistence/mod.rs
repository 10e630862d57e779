//! Store boundary for the billing engine.
//!
//! The whole engine state (batches, bills, suppliers) is committed as one snapshot, so a
//! finalize that deducts stock and records a bill is a single all-or-nothing write.

pub mod in_memory;
pub mod json_file;
pub mod r#trait;

pub use in_memory::InMemoryGateway;
pub use json_file::JsonFileGateway;
pub use r#trait::{PersistenceError, PersistenceGateway, StoreSnapshot};
