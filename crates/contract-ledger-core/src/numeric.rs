use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Read a stored numeric string, yielding zero for anything that is not a number.
///
/// Surrounding whitespace is ignored; plain (`"1500.75"`, `"-20"`) and scientific
/// (`"1e5"`) notation are accepted. Empty, non-numeric or out-of-range input is
/// zero, and so is anything written with digit separators (`"1_000"`). This
/// never fails.
#[must_use]
pub fn numeric_or_zero(value: &str) -> Decimal {
    let trimmed = value.trim();
    // Digit separators are accepted by the decimal parser but are not numbers here.
    if trimmed.is_empty() || trimmed.contains('_') {
        return Decimal::ZERO;
    }

    if let Ok(parsed) = Decimal::from_str(trimmed) {
        return parsed;
    }

    if trimmed.contains(['e', 'E']) {
        if let Ok(parsed) = Decimal::from_scientific(trimmed) {
            return parsed;
        }
    }

    Decimal::ZERO
}

/// `part / whole * 100`, with a zero `whole` replaced by one.
///
/// Overflow saturates toward the sign of the result instead of failing.
#[must_use]
pub fn ratio_percent(part: Decimal, whole: Decimal) -> Decimal {
    let divisor = if whole.is_zero() { Decimal::ONE } else { whole };
    part.checked_div(divisor).and_then(|ratio| ratio.checked_mul(HUNDRED)).unwrap_or_else(|| {
        if part.is_sign_negative() != divisor.is_sign_negative() {
            Decimal::MIN
        } else {
            Decimal::MAX
        }
    })
}

/// Clamp a percentage into `[0, 100]` for progress bars and status labels.
///
/// Stored values are never clamped; only presentation goes through here.
#[must_use]
pub fn display_percent(value: Decimal) -> Decimal {
    value.clamp(Decimal::ZERO, HUNDRED)
}

/// One-decimal label such as `"16.7"`.
#[must_use]
pub fn percent_label(value: Decimal) -> String {
    let rounded = value.round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero);
    format!("{rounded:.1}")
}

pub(crate) fn saturating_sum(values: impl Iterator<Item = Decimal>) -> Decimal {
    values.fold(Decimal::ZERO, Decimal::saturating_add)
}
