//! Infrastructure layer: configuration, persistence, the billing workflow and rendering.
//!
//! The domain crates stay free of IO; everything that touches files, clocks of record or
//! the event bus is composed here.

pub mod config;
pub mod persistence;
pub mod render;
pub mod sources;
pub mod workflow;


pub use config::{
    ApiSettings, BillingSettings, LoggingSettings, Settings, SourceSettings, StoreBackend,
    StoreSettings,
};
pub use persistence::{
    InMemoryGateway, JsonFileGateway, PersistenceError, PersistenceGateway, StoreSnapshot,
};
pub use render::{BillRenderer, PlainTextReceipt};
pub use workflow::{BillingWorkflow, WorkflowConfig, WorkflowError};
