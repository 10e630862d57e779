use core::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use clinicrx_core::{money, BatchId, DomainError, DomainResult, Money, Percent};
use clinicrx_inventory::StockBatch;

use crate::sources::PrescriptionId;

/// Billing domain. Each domain has its own bill sequence and fixed id prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingDomain {
    Pharmacy,
    Lab,
    Consultation,
}

impl BillingDomain {
    pub const ALL: [BillingDomain; 3] = [
        BillingDomain::Pharmacy,
        BillingDomain::Lab,
        BillingDomain::Consultation,
    ];

    /// ASCII prefix of bill ids in this domain.
    pub fn prefix(self) -> &'static str {
        match self {
            BillingDomain::Pharmacy => "PH",
            BillingDomain::Lab => "INV",
            BillingDomain::Consultation => "CN",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BillingDomain::Pharmacy => "pharmacy",
            BillingDomain::Lab => "lab",
            BillingDomain::Consultation => "consultation",
        }
    }

    /// Only pharmacy bills draw on the stock ledger.
    pub fn deducts_stock(self) -> bool {
        matches!(self, BillingDomain::Pharmacy)
    }
}

impl core::fmt::Display for BillingDomain {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BillingDomain {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pharmacy" => Ok(BillingDomain::Pharmacy),
            "lab" => Ok(BillingDomain::Lab),
            "consultation" => Ok(BillingDomain::Consultation),
            other => Err(DomainError::validation(format!(
                "unknown billing domain '{other}' (expected pharmacy, lab or consultation)"
            ))),
        }
    }
}

/// Snapshot of the batch a medicine line draws from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRef {
    pub batch_id: BatchId,
    pub descriptor: String,
    pub batch_number: String,
    pub expiry_date: NaiveDate,
    pub unit_price: Money,
    pub tax_percent: Percent,
}

impl From<&StockBatch> for BatchRef {
    fn from(batch: &StockBatch) -> Self {
        Self {
            batch_id: batch.id_typed(),
            descriptor: batch.descriptor().label().to_string(),
            batch_number: batch.batch_number().to_string(),
            expiry_date: batch.expiry_date(),
            unit_price: batch.sale_price(),
            tax_percent: batch.tax_percent(),
        }
    }
}

/// Where a line's price comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum LinePricing {
    /// Priced from a ledger batch (sale price + tax).
    Batch(BatchRef),
    /// Priced from a catalog or entered by the operator; untaxed.
    Catalog { unit_price: Money },
    /// Nothing matched; the line cannot be billed as is.
    Unresolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineKind {
    Medicine,
    LabTest,
    Service,
}

/// One entry of a draft order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    kind: LineKind,
    description: String,
    pricing: LinePricing,
    quantity: u64,
    line_amount: Money,
}

impl LinePricing {
    fn unit_price(&self) -> Option<Money> {
        match self {
            LinePricing::Batch(batch) => Some(batch.unit_price),
            LinePricing::Catalog { unit_price } => Some(*unit_price),
            LinePricing::Unresolved => None,
        }
    }

    /// `quantity × unit price`; zero while unresolved.
    fn amount_for(&self, quantity: u64) -> DomainResult<Money> {
        match self.unit_price() {
            Some(price) => money::line_amount(price, quantity),
            None => Ok(Decimal::ZERO),
        }
    }
}

impl OrderLine {
    pub(crate) fn medicine(
        description: &str,
        batch: Option<&StockBatch>,
        quantity: u64,
    ) -> DomainResult<Self> {
        let pricing = match batch {
            Some(batch) => LinePricing::Batch(BatchRef::from(batch)),
            None => LinePricing::Unresolved,
        };
        Self::priced(LineKind::Medicine, description, pricing, quantity)
    }

    pub(crate) fn lab_test(name: &str, price: Option<Money>) -> DomainResult<Self> {
        let pricing = match price {
            Some(unit_price) => LinePricing::Catalog { unit_price },
            None => LinePricing::Unresolved,
        };
        Self::priced(LineKind::LabTest, name, pricing, 1)
    }

    pub(crate) fn service(name: &str, price: Option<Money>, quantity: u64) -> DomainResult<Self> {
        let pricing = match price {
            Some(unit_price) => LinePricing::Catalog { unit_price },
            None => LinePricing::Unresolved,
        };
        Self::priced(LineKind::Service, name, pricing, quantity)
    }

    fn priced(
        kind: LineKind,
        description: &str,
        pricing: LinePricing,
        quantity: u64,
    ) -> DomainResult<Self> {
        let line_amount = pricing.amount_for(quantity)?;
        Ok(Self {
            kind,
            description: description.split_whitespace().collect::<Vec<_>>().join(" "),
            pricing,
            quantity,
            line_amount,
        })
    }

    /// Leaves the line untouched when the new amount is out of range.
    pub(crate) fn set_quantity(&mut self, quantity: u64) -> DomainResult<()> {
        self.line_amount = self.pricing.amount_for(quantity)?;
        self.quantity = quantity;
        Ok(())
    }

    /// Leaves the line untouched when the new amount is out of range.
    pub(crate) fn set_batch(&mut self, batch: &StockBatch) -> DomainResult<()> {
        let pricing = LinePricing::Batch(BatchRef::from(batch));
        self.line_amount = pricing.amount_for(self.quantity)?;
        self.pricing = pricing;
        Ok(())
    }

    pub fn kind(&self) -> LineKind {
        self.kind
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn pricing(&self) -> &LinePricing {
        &self.pricing
    }

    pub fn quantity(&self) -> u64 {
        self.quantity
    }

    /// `quantity × unit price`; zero while unresolved.
    pub fn line_amount(&self) -> Money {
        self.line_amount
    }

    pub fn unit_price(&self) -> Option<Money> {
        self.pricing.unit_price()
    }

    pub fn tax_percent(&self) -> Percent {
        match &self.pricing {
            LinePricing::Batch(batch) => batch.tax_percent,
            _ => Decimal::ZERO,
        }
    }

    pub fn batch(&self) -> Option<&BatchRef> {
        match &self.pricing {
            LinePricing::Batch(batch) => Some(batch),
            _ => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self.pricing, LinePricing::Unresolved)
    }
}

/// Draft order: lines being composed for one bill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    domain: BillingDomain,
    source: Option<PrescriptionId>,
    subject_name: String,
    lines: Vec<OrderLine>,
}

impl Order {
    pub fn new(domain: BillingDomain, subject_name: &str, source: Option<PrescriptionId>) -> Self {
        Self {
            domain,
            source,
            subject_name: subject_name.trim().to_string(),
            lines: Vec::new(),
        }
    }

    pub fn domain(&self) -> BillingDomain {
        self.domain
    }

    pub fn source(&self) -> Option<&PrescriptionId> {
        self.source.as_ref()
    }

    pub fn subject_name(&self) -> &str {
        &self.subject_name
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Indexes of lines that still have no price.
    pub fn unresolved_lines(&self) -> Vec<usize> {
        self.lines
            .iter()
            .enumerate()
            .filter(|(_, line)| !line.is_resolved())
            .map(|(idx, _)| idx)
            .collect()
    }

    pub(crate) fn push(&mut self, line: OrderLine) -> usize {
        self.lines.push(line);
        self.lines.len() - 1
    }

    pub(crate) fn line_mut(&mut self, index: usize) -> Result<&mut OrderLine, DomainError> {
        let count = self.lines.len();
        self.lines.get_mut(index).ok_or_else(|| {
            DomainError::validation(format!("line {index} does not exist (order has {count} lines)"))
        })
    }

    pub(crate) fn remove(&mut self, index: usize) -> Result<OrderLine, DomainError> {
        if index >= self.lines.len() {
            return Err(DomainError::validation(format!(
                "line {index} does not exist (order has {} lines)",
                self.lines.len()
            )));
        }
        Ok(self.lines.remove(index))
    }
}
