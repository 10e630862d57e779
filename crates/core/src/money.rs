//! Decimal money helpers.
//!
//! Amounts stay at full precision through every computation; rounding to two decimals
//! happens only when a value is shown to a person (`round_for_display` / `format_amount`).

use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{DomainError, DomainResult};

/// Monetary amount (currency-less; the clinic runs in a single currency).
pub type Money = Decimal;

/// Percentage expressed in points (`5` means 5%).
pub type Percent = Decimal;

const DISPLAY_DP: u32 = 2;

/// Round an amount to two decimals, half away from zero.
pub fn round_for_display(amount: Money) -> Money {
    amount.round_dp_with_strategy(DISPLAY_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// Render an amount with exactly two decimals (`350` -> `"350.00"`).
pub fn format_amount(amount: Money) -> String {
    format!("{:.2}", round_for_display(amount))
}

fn out_of_range(what: &str) -> DomainError {
    DomainError::validation(format!("{what} out of range"))
}

/// `unit_price × quantity`. Fails instead of overflowing.
pub fn line_amount(unit_price: Money, quantity: u64) -> DomainResult<Money> {
    unit_price
        .checked_mul(Decimal::from(quantity))
        .ok_or_else(|| out_of_range("line amount"))
}

/// `amount × percent / 100`, unrounded.
pub fn percent_of(amount: Money, percent: Percent) -> DomainResult<Money> {
    amount
        .checked_mul(percent)
        .and_then(|scaled| scaled.checked_div(Decimal::ONE_HUNDRED))
        .ok_or_else(|| out_of_range("percentage amount"))
}

/// Sum of amounts. Fails instead of overflowing.
pub fn checked_sum(amounts: impl IntoIterator<Item = Money>) -> DomainResult<Money> {
    amounts.into_iter().try_fold(Decimal::ZERO, |acc, amount| {
        acc.checked_add(amount)
            .ok_or_else(|| out_of_range("amount total"))
    })
}

/// Ensure a percentage lies in `[0, 100]`.
pub fn ensure_percent(value: Percent, what: &str) -> DomainResult<()> {
    if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED {
        return Err(DomainError::validation(format!(
            "{what} must be within [0, 100], got {value}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn display_rounding_is_half_away_from_zero() {
        assert_eq!(round_for_display(dec!(223.3311)), dec!(223.33));
        assert_eq!(round_for_display(dec!(0.125)), dec!(0.13));
        assert_eq!(round_for_display(dec!(-0.125)), dec!(-0.13));
    }

    #[test]
    fn format_always_shows_two_decimals() {
        assert_eq!(format_amount(dec!(350)), "350.00");
        assert_eq!(format_amount(dec!(15.5)), "15.50");
    }

    #[test]
    fn percent_of_keeps_full_precision() {
        assert_eq!(percent_of(dec!(333.33), dec!(33)).unwrap(), dec!(109.9989));
    }

    #[test]
    fn huge_amounts_fail_instead_of_overflowing() {
        assert_eq!(line_amount(dec!(10.25), 4).unwrap(), dec!(41));
        let err = line_amount(dec!(10000000000), u64::MAX).unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("line amount out of range"));
        assert!(percent_of(Decimal::MAX, dec!(100)).is_err());
        assert!(checked_sum([Decimal::MAX, Decimal::ONE]).is_err());
        assert_eq!(checked_sum([dec!(100), dec!(200), dec!(50)]).unwrap(), dec!(350));
    }

    #[test]
    fn percent_bounds_are_inclusive() {
        assert!(ensure_percent(dec!(0), "tax").is_ok());
        assert!(ensure_percent(dec!(100), "tax").is_ok());
        assert!(ensure_percent(dec!(100.01), "tax").is_err());
        assert!(ensure_percent(dec!(-1), "tax").is_err());
    }

    #[test]
    fn decimals_serialize_without_float_drift() {
        let json = serde_json::to_string(&dec!(223.3311)).unwrap();
        let back: Decimal = serde_json::from_str(&json).unwrap();
        assert_eq!(back, dec!(223.3311));
    }
}
