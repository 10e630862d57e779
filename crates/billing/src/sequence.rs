use std::collections::BTreeMap;

use clinicrx_core::{DomainError, DomainResult};
use clinicrx_orders::BillingDomain;

use crate::bill::{Bill, BillId};

/// Per-domain bill numbering.
///
/// Tracks the highest suffix issued in each domain; the next id is that value + 1.
/// Allocation is a plain value update, so a caller that may fail after allocating works
/// on a clone and keeps it only on success.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceAllocator {
    highest: BTreeMap<BillingDomain, u64>,
}

impl SequenceAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from persisted bills.
    pub fn from_bills<'a>(bills: impl IntoIterator<Item = &'a Bill>) -> Self {
        let mut allocator = Self::new();
        for bill in bills {
            allocator.observe(bill.id_typed());
        }
        allocator
    }

    fn observe(&mut self, id: BillId) {
        let highest = self.highest.entry(id.domain()).or_insert(0);
        *highest = (*highest).max(id.number());
    }

    /// The id `next_id` would return, without reserving it.
    pub fn peek(&self, domain: BillingDomain) -> DomainResult<BillId> {
        let highest = self.highest.get(&domain).copied().unwrap_or(0);
        let next = highest.checked_add(1).ok_or_else(|| DomainError::SequenceExhausted {
            domain: domain.to_string(),
        })?;
        BillId::new(domain, next)
    }

    pub fn next_id(&mut self, domain: BillingDomain) -> DomainResult<BillId> {
        let id = self.peek(domain)?;
        self.observe(id);
        Ok(id)
    }

    /// Highest suffix issued so far in `domain` (0 if none).
    pub fn highest(&self, domain: BillingDomain) -> u64 {
        self.highest.get(&domain).copied().unwrap_or(0)
    }
}
