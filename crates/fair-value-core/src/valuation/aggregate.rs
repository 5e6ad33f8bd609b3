use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::FairValueError;
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::FairValueResult;

use super::methods::ValuationMethod;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// How much a single method moved the reconciled value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodContribution {
    pub name: String,
    pub result: Money,
    /// confidence × applicability
    pub weight: Decimal,
    /// weight / total weight
    pub weight_share: Rate,
}

/// Reconciled valuation across all methods.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateOutput {
    /// Confidence- and applicability-weighted mean of method results
    pub value: Money,
    pub method_count: usize,
    /// Simple mean of method confidences
    pub average_confidence: Rate,
    pub total_weight: Decimal,
    /// Lowest method result
    pub low: Money,
    /// Highest method result
    pub high: Money,
    pub contributions: Vec<MethodContribution>,
}

/// Methods carrying less than this share of total weight are flagged.
const MARGINAL_WEIGHT_SHARE: Decimal = dec!(0.05);

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Reconcile method results into a single value weighted by
/// `confidence × applicability`.
///
/// Low-confidence or poorly-suited methods are down-weighted, not dropped.
/// The result is a convex combination of the inputs, so it always lies in
/// `[low, high]`.
pub fn aggregate(
    methods: &[ValuationMethod],
) -> FairValueResult<ComputationOutput<AggregateOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if methods.is_empty() {
        return Err(FairValueError::NoApplicableMethods(
            "no valuation methods supplied".into(),
        ));
    }
    for method in methods {
        method.validate()?;
    }

    let total_weight: Decimal = methods.iter().map(|m| m.weight()).sum();
    if total_weight <= Decimal::ZERO {
        return Err(FairValueError::NoApplicableMethods(format!(
            "all {} methods carry zero confidence × applicability",
            methods.len()
        )));
    }

    let weighted_sum: Decimal = methods.iter().map(|m| m.result * m.weight()).sum();

    let low = methods.iter().map(|m| m.result).min().unwrap_or_default();
    let high = methods.iter().map(|m| m.result).max().unwrap_or_default();
    // Clamp absorbs the last-digit rounding of the 96-bit division.
    let value = (weighted_sum / total_weight).clamp(low, high);

    let contributions: Vec<MethodContribution> = methods
        .iter()
        .map(|m| {
            let weight = m.weight();
            let weight_share = weight / total_weight;
            if weight.is_zero() {
                tracing::warn!(method = %m.name, "method carries zero weight");
                warnings.push(format!(
                    "{}: zero weight, excluded from the reconciled value",
                    m.name
                ));
            } else if weight_share < MARGINAL_WEIGHT_SHARE {
                warnings.push(format!(
                    "{}: carries only {:.1}% of total weight",
                    m.name,
                    weight_share * dec!(100)
                ));
            }
            MethodContribution {
                name: m.name.clone(),
                result: m.result,
                weight,
                weight_share,
            }
        })
        .collect();

    let confidence_sum: Decimal = methods.iter().map(|m| m.confidence).sum();
    let average_confidence = confidence_sum / Decimal::from(methods.len() as u64);

    tracing::debug!(
        method_count = methods.len(),
        %total_weight,
        %value,
        "reconciled valuation methods"
    );

    let output = AggregateOutput {
        value,
        method_count: methods.len(),
        average_confidence,
        total_weight,
        low,
        high,
        contributions,
    };

    let elapsed = start.elapsed().as_micros() as u64;

    Ok(with_metadata(
        "Confidence × Applicability Weighted Reconciliation",
        &methods,
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
