use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use clinicrx_core::{BatchId, SupplierId};
use clinicrx_events::Event;

use crate::batch::StockBatch;

/// Event: StockReceived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReceived {
    pub batch_id: BatchId,
    pub descriptor: String,
    pub batch_number: String,
    pub supplier_id: Option<SupplierId>,
    pub quantity: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockDeducted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockDeducted {
    pub batch_id: BatchId,
    pub quantity: u64,
    pub remaining: u64,
    /// Bill the deduction was made for.
    pub reference: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryEvent {
    StockReceived(StockReceived),
    StockDeducted(StockDeducted),
}

impl InventoryEvent {
    pub fn received(batch: &StockBatch) -> Self {
        InventoryEvent::StockReceived(StockReceived {
            batch_id: batch.id_typed(),
            descriptor: batch.descriptor().label().to_string(),
            batch_number: batch.batch_number().to_string(),
            supplier_id: batch.supplier_id(),
            quantity: batch.quantity_received(),
            occurred_at: batch.received_at(),
        })
    }
}

impl Event for InventoryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InventoryEvent::StockReceived(_) => "inventory.stock.received",
            InventoryEvent::StockDeducted(_) => "inventory.stock.deducted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InventoryEvent::StockReceived(e) => e.occurred_at,
            InventoryEvent::StockDeducted(e) => e.occurred_at,
        }
    }
}
