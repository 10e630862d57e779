use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use clinicrx_core::{money, DomainError, DomainResult, Entity, Money, Percent};
use clinicrx_orders::{BatchRef, BillingDomain, LineKind, Order, OrderLine, PrescriptionId};

use crate::calculator::{self, BillTotals};

/// Bill identifier: domain prefix + sequence number (`PH14`, `INV7`, `CN3`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BillId {
    domain: BillingDomain,
    number: u64,
}

impl BillId {
    pub fn new(domain: BillingDomain, number: u64) -> DomainResult<Self> {
        if number == 0 {
            return Err(DomainError::invalid_id("BillId: sequence numbers start at 1"));
        }
        Ok(Self { domain, number })
    }

    pub fn domain(&self) -> BillingDomain {
        self.domain
    }

    pub fn number(&self) -> u64 {
        self.number
    }
}

impl core::fmt::Display for BillId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}{}", self.domain.prefix(), self.number)
    }
}

impl FromStr for BillId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits_at = s
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(|| DomainError::invalid_id(format!("BillId: '{s}' has no number")))?;
        let (prefix, digits) = s.split_at(digits_at);

        let domain = BillingDomain::ALL
            .into_iter()
            .find(|d| d.prefix() == prefix)
            .ok_or_else(|| DomainError::invalid_id(format!("BillId: unknown prefix '{prefix}'")))?;

        if digits.starts_with('0') || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DomainError::invalid_id(format!("BillId: malformed number in '{s}'")));
        }
        let number = digits
            .parse::<u64>()
            .map_err(|e| DomainError::invalid_id(format!("BillId: {e}")))?;

        Self::new(domain, number)
    }
}

impl Serialize for BillId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BillId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Bill status lifecycle: draft → saved → printed, never backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillStatus {
    Draft,
    Saved,
    Printed,
}

impl BillStatus {
    pub fn can_transition_to(self, next: BillStatus) -> bool {
        matches!(
            (self, next),
            (BillStatus::Draft, BillStatus::Saved) | (BillStatus::Saved, BillStatus::Printed)
        )
    }
}

/// Line snapshot taken at finalize time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillLine {
    pub kind: LineKind,
    pub description: String,
    #[serde(default)]
    pub batch: Option<BatchRef>,
    pub quantity: u64,
    pub unit_price: Money,
    pub tax_percent: Percent,
    pub line_amount: Money,
}

impl TryFrom<&OrderLine> for BillLine {
    type Error = DomainError;

    fn try_from(line: &OrderLine) -> Result<Self, Self::Error> {
        let unit_price = line.unit_price().ok_or_else(|| {
            DomainError::validation(format!("line '{}' has no price", line.description()))
        })?;
        Ok(Self {
            kind: line.kind(),
            description: line.description().to_string(),
            batch: line.batch().cloned(),
            quantity: line.quantity(),
            unit_price,
            tax_percent: line.tax_percent(),
            line_amount: line.line_amount(),
        })
    }
}

/// A finalized bill. Immutable except for the saved → printed transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bill {
    id: BillId,
    source: Option<PrescriptionId>,
    subject_name: String,
    lines: Vec<BillLine>,
    subtotal: Money,
    discount_percent: Percent,
    tax_total: Money,
    total: Money,
    issued_at: DateTime<Utc>,
    status: BillStatus,
    #[serde(default)]
    printed_at: Option<DateTime<Utc>>,
}

impl Bill {
    /// Snapshot `order` into a saved bill. The order must be fully priced and `totals`
    /// must have been computed from it.
    pub fn issue(id: BillId, order: &Order, totals: &BillTotals, issued_at: DateTime<Utc>) -> DomainResult<Self> {
        if id.domain() != order.domain() {
            return Err(DomainError::invariant(format!(
                "bill id {id} does not belong to the {} domain",
                order.domain()
            )));
        }
        let lines = order
            .lines()
            .iter()
            .map(BillLine::try_from)
            .collect::<DomainResult<Vec<_>>>()?;

        let mut bill = Self {
            id,
            source: order.source().cloned(),
            subject_name: order.subject_name().to_string(),
            lines,
            subtotal: totals.subtotal,
            discount_percent: totals.discount_percent,
            tax_total: totals.tax_total,
            total: totals.total,
            issued_at,
            status: BillStatus::Draft,
            printed_at: None,
        };
        bill.check_invariants()?;
        bill.status = BillStatus::Saved;
        Ok(bill)
    }

    pub fn id_typed(&self) -> BillId {
        self.id
    }

    pub fn domain(&self) -> BillingDomain {
        self.id.domain()
    }

    pub fn source(&self) -> Option<&PrescriptionId> {
        self.source.as_ref()
    }

    pub fn subject_name(&self) -> &str {
        &self.subject_name
    }

    pub fn lines(&self) -> &[BillLine] {
        &self.lines
    }

    pub fn subtotal(&self) -> Money {
        self.subtotal
    }

    pub fn discount_percent(&self) -> Percent {
        self.discount_percent
    }

    pub fn tax_total(&self) -> Money {
        self.tax_total
    }

    pub fn total(&self) -> Money {
        self.total
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn status(&self) -> BillStatus {
        self.status
    }

    pub fn printed_at(&self) -> Option<DateTime<Utc>> {
        self.printed_at
    }

    /// Saved → printed. Returns `false` when the bill was already printed.
    pub fn mark_printed(&mut self, at: DateTime<Utc>) -> DomainResult<bool> {
        if self.status == BillStatus::Printed {
            return Ok(false);
        }
        if !self.status.can_transition_to(BillStatus::Printed) {
            return Err(DomainError::conflict(format!(
                "bill {} cannot be printed from status {:?}",
                self.id, self.status
            )));
        }
        self.status = BillStatus::Printed;
        self.printed_at = Some(at);
        Ok(true)
    }

    /// Amount and shape checks, run at issue time and on load.
    pub fn check_invariants(&self) -> DomainResult<()> {
        if self.lines.is_empty() {
            return Err(DomainError::invariant(format!("bill {} has no lines", self.id)));
        }
        for line in &self.lines {
            let expected = money::line_amount(line.unit_price, line.quantity)
                .map_err(|e| DomainError::invariant(format!("bill {}: {e}", self.id)))?;
            if line.line_amount != expected {
                return Err(DomainError::invariant(format!(
                    "bill {}: line '{}' amount does not match quantity × unit price",
                    self.id, line.description
                )));
            }
            if line.batch.is_some() && self.domain() != BillingDomain::Pharmacy {
                return Err(DomainError::invariant(format!(
                    "bill {}: only pharmacy bills carry batch lines",
                    self.id
                )));
            }
        }

        let totals = calculator::summarize(&self.lines, self.discount_percent)
            .map_err(|e| DomainError::invariant(format!("bill {}: {e}", self.id)))?;
        if totals.subtotal != self.subtotal || totals.total != self.total || totals.tax_total != self.tax_total {
            return Err(DomainError::invariant(format!(
                "bill {}: stored totals do not match its lines",
                self.id
            )));
        }
        Ok(())
    }
}

impl Entity for Bill {
    type Id = BillId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
