//! Bill arithmetic.
//!
//! Pure functions over anything [`Priced`]. Amounts are kept at full decimal precision;
//! rounding is a display concern (`clinicrx_core::money::round_for_display`).
//!
//! Tax is reported on the undiscounted line amounts and is not taken off by the discount:
//! sale prices are tax-inclusive, so `tax_total` is informational and
//! `total = subtotal × (1 − discount/100)`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use clinicrx_core::money::{checked_sum, percent_of};
use clinicrx_core::{DomainError, DomainResult, Money, Percent};
use clinicrx_orders::OrderLine;

use crate::bill::BillLine;

/// A line that can be totalled.
pub trait Priced {
    /// `quantity × unit price`, or `None` while the line has no price.
    fn priced_amount(&self) -> Option<Money>;

    fn tax_percent(&self) -> Percent;
}

impl Priced for OrderLine {
    fn priced_amount(&self) -> Option<Money> {
        self.is_resolved().then(|| self.line_amount())
    }

    fn tax_percent(&self) -> Percent {
        OrderLine::tax_percent(self)
    }
}

impl Priced for BillLine {
    fn priced_amount(&self) -> Option<Money> {
        Some(self.line_amount)
    }

    fn tax_percent(&self) -> Percent {
        self.tax_percent
    }
}

/// Totals of one bill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillTotals {
    pub subtotal: Money,
    pub discount_percent: Percent,
    pub tax_total: Money,
    pub total: Money,
    /// Indexes of lines without a price (they contributed zero).
    pub unresolved: Vec<usize>,
}

/// Sum of priced line amounts, plus the indexes of unpriced lines.
pub fn subtotal<L: Priced>(lines: &[L]) -> DomainResult<(Money, Vec<usize>)> {
    let mut unresolved = Vec::new();
    let sum = checked_sum(lines.iter().enumerate().filter_map(|(idx, line)| {
        let amount = line.priced_amount();
        if amount.is_none() {
            unresolved.push(idx);
        }
        amount
    }))?;
    Ok((sum, unresolved))
}

/// `Σ line_amount × tax_percent / 100` over priced lines.
pub fn tax_total<L: Priced>(lines: &[L]) -> DomainResult<Money> {
    let taxes = lines
        .iter()
        .filter_map(|line| line.priced_amount().map(|amount| percent_of(amount, line.tax_percent())))
        .collect::<DomainResult<Vec<_>>>()?;
    checked_sum(taxes)
}

/// `subtotal × (1 − discount_percent / 100)`.
pub fn total(subtotal: Money, discount_percent: Percent) -> DomainResult<Money> {
    if discount_percent < Decimal::ZERO || discount_percent > Decimal::ONE_HUNDRED {
        return Err(DomainError::InvalidDiscount(discount_percent));
    }
    let discount = percent_of(subtotal, discount_percent)?;
    subtotal
        .checked_sub(discount)
        .ok_or_else(|| DomainError::validation("bill total out of range"))
}

pub fn summarize<L: Priced>(lines: &[L], discount_percent: Percent) -> DomainResult<BillTotals> {
    let (subtotal, unresolved) = subtotal(lines)?;
    let total = total(subtotal, discount_percent)?;
    Ok(BillTotals {
        subtotal,
        discount_percent,
        tax_total: tax_total(lines)?,
        total,
        unresolved,
    })
}
