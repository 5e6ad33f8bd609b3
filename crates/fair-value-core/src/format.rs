//! Presentation helpers for monetary amounts, ratios and multiples.
//!
//! These never fail: the engine only hands them finite Decimals.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

use crate::types::{Currency, Money, Multiple, Rate};

const SCALES: [(Decimal, &str); 4] = [
    (dec!(1000000000000), "T"),
    (dec!(1000000000), "B"),
    (dec!(1000000), "M"),
    (dec!(1000), "K"),
];

fn round_half_up(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}

/// Scale an amount down to the largest suffix it reaches.
///
/// Returns the scaled (unrounded) magnitude and the suffix, which is empty
/// for amounts below one thousand.
pub fn scale_amount(amount: Money) -> (Decimal, &'static str) {
    let magnitude = amount.abs();
    for (threshold, suffix) in SCALES {
        if magnitude >= threshold {
            return (amount / threshold, suffix);
        }
    }
    (amount, "")
}

/// Scale and round a non-negative magnitude for display. When rounding
/// reaches 1000 the value moves up to the next suffix.
fn rounded_scale(magnitude: Decimal) -> (Decimal, &'static str) {
    let (scaled, suffix) = scale_amount(magnitude);
    let rounded = round_half_up(scaled, if suffix.is_empty() { 2 } else { 1 });
    if rounded < dec!(1000) {
        return (rounded, suffix);
    }
    match SCALES.iter().rev().find(|(threshold, _)| *threshold > magnitude) {
        Some(&(threshold, next)) => (round_half_up(magnitude / threshold, 1), next),
        None => (rounded, suffix),
    }
}

/// `$19.5M`, `-£1.2K`, `$950.00`.
pub fn format_currency(amount: Money, currency: &Currency) -> String {
    let (rounded, suffix) = rounded_scale(amount.abs());
    let sign = if amount.is_sign_negative() && !amount.is_zero() {
        "-"
    } else {
        ""
    };
    let body = if suffix.is_empty() {
        format!("{rounded:.2}")
    } else {
        format!("{rounded:.1}{suffix}")
    };
    format!("{sign}{}{body}", currency.symbol())
}

/// Render a ratio as a percentage: `-0.125` → `-12.5%`.
pub fn format_percent(rate: Rate, decimals: u32) -> String {
    let pct = round_half_up(rate * dec!(100), decimals);
    format!("{:.*}%", decimals as usize, pct)
}

/// `4.2x`
pub fn format_multiple(multiple: Multiple) -> String {
    format!("{:.1}x", round_half_up(multiple, 1))
}
