//! Billing workflow: the only place that mutates engine state.
//!
//! ```text
//! receive_stock ─┐
//! finalize ──────┼─ writer lock → ledger / sequence → gateway commit → publish events
//! mark_printed ──┘
//! ```
//!
//! Every mutation runs under one writer lock and ends with a single gateway commit of the
//! full snapshot. When the commit fails, in-memory changes made by the call are undone
//! before the error is returned, so memory and store never diverge.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;

use clinicrx_billing::{Bill, BillId, BillingEvent, SequenceAllocator, calculator};
use clinicrx_core::{BatchId, DomainError, Percent, SupplierId};
use clinicrx_events::{Event, EventBus, EventEnvelope};
use clinicrx_inventory::{
    AllocationPolicy, BatchFields, Deduction, DrugDescriptor, InventoryEvent, ItemMatcher,
    StockBatch, StockDeducted, StockLedger, Supplier,
};
use clinicrx_orders::{BillingDomain, DiagnosticTestCatalog, Order, OrderBuilder};

use crate::persistence::{PersistenceError, PersistenceGateway, StoreSnapshot};
use crate::render::BillRenderer;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Nothing from the failed call was kept.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkflowConfig {
    pub allocation: AllocationPolicy,
}

#[derive(Debug, Default)]
struct WorkflowState {
    bills: Vec<Bill>,
    bill_index: HashMap<BillId, usize>,
    suppliers: Vec<Supplier>,
    sequence: SequenceAllocator,
}

impl WorkflowState {
    fn bill_position(&self, id: BillId) -> Result<usize, DomainError> {
        self.bill_index
            .get(&id)
            .copied()
            .ok_or_else(|| DomainError::not_found(format!("bill {id}")))
    }
}

/// Stock receipt, finalize and print orchestration over one ledger.
pub struct BillingWorkflow<G, B> {
    gateway: G,
    bus: B,
    config: WorkflowConfig,
    ledger: StockLedger,
    state: Mutex<WorkflowState>,
}

impl<G, B> BillingWorkflow<G, B>
where
    G: PersistenceGateway,
    B: EventBus<EventEnvelope>,
{
    /// Load the stored snapshot and rebuild ledger, bills, suppliers and sequences.
    pub fn open(gateway: G, bus: B, config: WorkflowConfig) -> Result<Self, WorkflowError> {
        let snapshot = gateway.load()?;
        let sequence = SequenceAllocator::from_bills(&snapshot.bills);
        let bill_index = snapshot
            .bills
            .iter()
            .enumerate()
            .map(|(pos, bill)| (bill.id_typed(), pos))
            .collect();

        tracing::info!(
            batches = snapshot.batches.len(),
            bills = snapshot.bills.len(),
            suppliers = snapshot.suppliers.len(),
            "billing workflow opened"
        );

        Ok(Self {
            ledger: StockLedger::from_batches(snapshot.batches)?,
            state: Mutex::new(WorkflowState {
                bills: snapshot.bills,
                bill_index,
                suppliers: snapshot.suppliers,
                sequence,
            }),
            gateway,
            bus,
            config,
        })
    }

    fn lock(&self) -> MutexGuard<'_, WorkflowState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot_of(&self, state: &WorkflowState) -> StoreSnapshot {
        StoreSnapshot {
            batches: self.ledger.snapshot(),
            bills: state.bills.clone(),
            suppliers: state.suppliers.clone(),
            ..StoreSnapshot::default()
        }
    }

    fn publish<E>(&self, event: &E)
    where
        E: Event + Serialize,
    {
        let envelope = match EventEnvelope::wrap(event) {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::warn!(event_type = event.event_type(), error = %err, "event could not be serialized");
                return;
            }
        };
        if let Err(err) = self.bus.publish(envelope) {
            tracing::warn!(event_type = event.event_type(), error = ?err, "event publish failed after commit");
        }
    }

    /// Record a stock receipt. `descriptor_text` is canonicalized once, here.
    pub fn receive_stock(&self, descriptor_text: &str, fields: BatchFields) -> Result<StockBatch, WorkflowError> {
        let descriptor = DrugDescriptor::parse(descriptor_text)?;

        let state = self.lock();
        if let Some(supplier_id) = fields.supplier_id {
            if !state.suppliers.iter().any(|s| s.id_typed() == supplier_id) {
                return Err(DomainError::not_found(format!("supplier {supplier_id}")).into());
            }
        }

        let batch = self.ledger.receive_stock(descriptor, fields)?;
        if let Err(err) = self.gateway.commit(&self.snapshot_of(&state)) {
            tracing::warn!(batch_id = %batch.id_typed(), error = %err, "stock receipt not persisted; rolling back");
            if let Err(rollback) = self.ledger.rollback_receipt(batch.id_typed()) {
                tracing::error!(batch_id = %batch.id_typed(), error = %rollback, "receipt rollback failed");
            }
            return Err(err.into());
        }
        drop(state);

        tracing::info!(
            batch_id = %batch.id_typed(),
            descriptor = %batch.descriptor(),
            batch_number = batch.batch_number(),
            quantity = batch.quantity_received(),
            "stock receipt committed"
        );
        self.publish(&InventoryEvent::received(&batch));
        Ok(batch)
    }

    pub fn register_supplier(&self, name: &str) -> Result<Supplier, WorkflowError> {
        let supplier = Supplier::register(SupplierId::new(), name, Utc::now())?;

        let mut state = self.lock();
        if state
            .suppliers
            .iter()
            .any(|s| s.name().eq_ignore_ascii_case(supplier.name()))
        {
            return Err(DomainError::conflict(format!("supplier '{}' already exists", supplier.name())).into());
        }

        let mut snapshot = self.snapshot_of(&state);
        snapshot.suppliers.push(supplier.clone());
        self.gateway.commit(&snapshot)?;
        state.suppliers.push(supplier.clone());

        tracing::info!(supplier_id = %supplier.id_typed(), name = supplier.name(), "supplier registered");
        Ok(supplier)
    }

    /// Turn a composed order into a saved bill.
    ///
    /// Validation and totals run before anything is touched. Pharmacy bills then deduct
    /// each line's batch; the bill and the updated ledger are committed together. On any
    /// failure the ledger is back where it started, no bill exists and the sequence
    /// number is not consumed.
    pub fn finalize(&self, order: &Order, discount_percent: Percent) -> Result<Bill, WorkflowError> {
        if let Err(err) = validate_order(order) {
            tracing::warn!(domain = %order.domain(), error = %err, "finalize rejected");
            return Err(err.into());
        }
        let totals = calculator::summarize(order.lines(), discount_percent)?;

        let mut state = self.lock();
        let mut sequence = state.sequence.clone();
        let bill = Bill::issue(sequence.next_id(order.domain())?, order, &totals, Utc::now())?;

        let deductions: Vec<Deduction> = if order.domain().deducts_stock() {
            order
                .lines()
                .iter()
                .filter_map(|line| {
                    line.batch().map(|batch| Deduction {
                        batch_id: batch.batch_id,
                        quantity: line.quantity(),
                    })
                })
                .collect()
        } else {
            Vec::new()
        };

        let updated = match self.ledger.deduct_all(&deductions) {
            Ok(updated) => updated,
            Err(err) => {
                tracing::warn!(bill_id = %bill.id_typed(), error = %err, "finalize rejected");
                return Err(err.into());
            }
        };

        let mut snapshot = self.snapshot_of(&state);
        snapshot.bills.push(bill.clone());
        if let Err(err) = self.gateway.commit(&snapshot) {
            tracing::warn!(bill_id = %bill.id_typed(), error = %err, "bill not persisted; restoring stock");
            if let Err(restore) = self.ledger.restore(&deductions) {
                tracing::error!(bill_id = %bill.id_typed(), error = %restore, "stock restore failed");
            }
            return Err(err.into());
        }

        let pos = state.bills.len();
        state.bill_index.insert(bill.id_typed(), pos);
        state.bills.push(bill.clone());
        state.sequence = sequence;
        drop(state);

        tracing::info!(
            bill_id = %bill.id_typed(),
            lines = bill.lines().len(),
            total = %bill.total(),
            "bill finalized"
        );

        let remaining: HashMap<BatchId, u64> = updated
            .iter()
            .map(|b| (b.id_typed(), b.quantity_available()))
            .collect();
        for deduction in &deductions {
            self.publish(&InventoryEvent::StockDeducted(StockDeducted {
                batch_id: deduction.batch_id,
                quantity: deduction.quantity,
                remaining: remaining.get(&deduction.batch_id).copied().unwrap_or(0),
                reference: bill.id_typed().to_string(),
                occurred_at: bill.issued_at(),
            }));
        }
        self.publish(&BillingEvent::finalized(&bill));
        Ok(bill)
    }

    /// Saved → printed. Printing an already printed bill changes nothing.
    pub fn mark_printed(&self, bill_id: BillId) -> Result<Bill, WorkflowError> {
        let mut state = self.lock();
        let pos = state.bill_position(bill_id)?;

        let mut bill = state.bills[pos].clone();
        let now = Utc::now();
        if !bill.mark_printed(now)? {
            return Ok(bill);
        }

        let mut snapshot = self.snapshot_of(&state);
        snapshot.bills[pos] = bill.clone();
        self.gateway.commit(&snapshot)?;
        state.bills[pos] = bill.clone();
        drop(state);

        tracing::info!(bill_id = %bill_id, "bill printed");
        self.publish(&BillingEvent::printed(bill_id, now));
        Ok(bill)
    }

    /// Render a bill, then mark it printed.
    pub fn print<R>(&self, bill_id: BillId, renderer: &R) -> Result<R::Output, WorkflowError>
    where
        R: BillRenderer + ?Sized,
    {
        let bill = self
            .bill(bill_id)
            .ok_or_else(|| DomainError::not_found(format!("bill {bill_id}")))?;
        let document = renderer.render(&bill);
        self.mark_printed(bill_id)?;
        Ok(document)
    }

    /// Order builder bound to this workflow's ledger and allocation policy.
    pub fn order_builder<'a>(&'a self, catalog: &'a dyn DiagnosticTestCatalog) -> OrderBuilder<'a> {
        OrderBuilder::new(&self.ledger, catalog).with_policy(self.config.allocation)
    }

    pub fn bill(&self, bill_id: BillId) -> Option<Bill> {
        let state = self.lock();
        state
            .bill_position(bill_id)
            .ok()
            .and_then(|pos| state.bills.get(pos).cloned())
    }

    /// Bills in issue order.
    pub fn bills(&self) -> Vec<Bill> {
        self.lock().bills.clone()
    }

    pub fn bills_in(&self, domain: BillingDomain) -> Vec<Bill> {
        self.lock()
            .bills
            .iter()
            .filter(|b| b.domain() == domain)
            .cloned()
            .collect()
    }

    /// Id the next bill in `domain` would get.
    pub fn next_bill_id(&self, domain: BillingDomain) -> Result<BillId, WorkflowError> {
        Ok(self.lock().sequence.peek(domain)?)
    }

    pub fn suppliers(&self) -> Vec<Supplier> {
        self.lock().suppliers.clone()
    }

    /// Every batch in receipt order.
    pub fn batches(&self) -> Vec<StockBatch> {
        self.ledger.snapshot()
    }

    pub fn batch(&self, batch_id: BatchId) -> Option<StockBatch> {
        self.ledger.batch(batch_id)
    }

    /// Batches matching free text, ordered by the configured allocation policy.
    pub fn match_batches(&self, text: &str) -> Vec<StockBatch> {
        ItemMatcher::new(&self.ledger)
            .with_policy(self.config.allocation)
            .resolve(text)
    }

    pub fn config(&self) -> WorkflowConfig {
        self.config
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }
}

/// Shape checks that must pass before any state is touched.
fn validate_order(order: &Order) -> Result<(), DomainError> {
    if order.is_empty() {
        return Err(DomainError::validation("order has no lines"));
    }

    let unresolved = order.unresolved_lines();
    if !unresolved.is_empty() {
        let names: Vec<&str> = unresolved
            .iter()
            .filter_map(|idx| order.lines().get(*idx).map(|l| l.description()))
            .collect();
        return Err(DomainError::validation(format!(
            "unresolved lines must be fixed or removed: {}",
            names.join(", ")
        )));
    }

    if let Some(line) = order.lines().iter().find(|l| l.quantity() == 0) {
        return Err(DomainError::validation(format!(
            "line '{}' has zero quantity",
            line.description()
        )));
    }

    if !order.domain().deducts_stock() {
        if let Some(line) = order.lines().iter().find(|l| l.batch().is_some()) {
            return Err(DomainError::validation(format!(
                "line '{}' draws on stock but this is a {} bill",
                line.description(),
                order.domain()
            )));
        }
    }
    Ok(())
}
