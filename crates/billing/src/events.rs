use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use clinicrx_core::Money;
use clinicrx_events::Event;
use clinicrx_orders::BillingDomain;

use crate::bill::{Bill, BillId};

/// Event: BillFinalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillFinalized {
    pub bill_id: BillId,
    pub domain: BillingDomain,
    pub subject_name: String,
    pub line_count: usize,
    pub subtotal: Money,
    pub total: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Event: BillPrinted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillPrinted {
    pub bill_id: BillId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BillingEvent {
    BillFinalized(BillFinalized),
    BillPrinted(BillPrinted),
}

impl BillingEvent {
    pub fn finalized(bill: &Bill) -> Self {
        BillingEvent::BillFinalized(BillFinalized {
            bill_id: bill.id_typed(),
            domain: bill.domain(),
            subject_name: bill.subject_name().to_string(),
            line_count: bill.lines().len(),
            subtotal: bill.subtotal(),
            total: bill.total(),
            occurred_at: bill.issued_at(),
        })
    }

    pub fn printed(bill_id: BillId, occurred_at: DateTime<Utc>) -> Self {
        BillingEvent::BillPrinted(BillPrinted { bill_id, occurred_at })
    }
}

impl Event for BillingEvent {
    fn event_type(&self) -> &'static str {
        match self {
            BillingEvent::BillFinalized(_) => "billing.bill.finalized",
            BillingEvent::BillPrinted(_) => "billing.bill.printed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            BillingEvent::BillFinalized(e) => e.occurred_at,
            BillingEvent::BillPrinted(e) => e.occurred_at,
        }
    }
}
