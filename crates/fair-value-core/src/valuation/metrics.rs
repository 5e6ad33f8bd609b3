//! Benchmark comparison for informational valuation metrics.
//!
//! A metric is favorable when it beats its industry benchmark in the
//! direction that counts for it: growth-like metrics should be higher,
//! cost- and churn-like metrics lower. None of this feeds the monetary
//! aggregation.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::FairValueError;
use crate::types::{ensure_unit_interval, Rate};
use crate::FairValueResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Which side of the benchmark counts as an improvement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricPolarity {
    HigherIsBetter,
    LowerIsBetter,
}

/// Recent movement of the observed value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendDirection {
    Up,
    Down,
    #[default]
    Flat,
}

/// An observed business metric paired with its industry benchmark.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValuationMetric {
    pub name: String,
    /// Observed value
    pub value: Decimal,
    /// Industry benchmark for the same metric
    pub benchmark: Decimal,
    /// Relative importance in a scorecard (0-1)
    pub weight: Rate,
    #[serde(default)]
    pub trend: TrendDirection,
    /// Explicit polarity; inferred from the name when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polarity: Option<MetricPolarity>,
}

/// Verdict for a single metric.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricEvaluation {
    pub name: String,
    pub polarity: MetricPolarity,
    pub favorable: bool,
    /// Display progress in [0, 1]
    pub progress: Rate,
    /// observed / benchmark - 1
    pub variance_pct: Rate,
}

/// Evaluations across a set of metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricScorecard {
    pub evaluations: Vec<MetricEvaluation>,
    pub favorable_count: usize,
    /// Share of metric weight that is favorable; None when all weights are zero
    pub weighted_favorable_share: Option<Rate>,
}

/// Name fragments that mark a metric as lower-is-better.
const INVERTED_KEYWORDS: [&str; 7] = [
    "cost", "churn", "expense", "burn", "attrition", "cac", "payback",
];

const PROGRESS_HEADROOM: Decimal = dec!(1.5);

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Polarity implied by a metric name.
pub fn infer_polarity(name: &str) -> MetricPolarity {
    let lowered = name.to_lowercase();
    if INVERTED_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        MetricPolarity::LowerIsBetter
    } else {
        MetricPolarity::HigherIsBetter
    }
}

/// Compare one metric against its benchmark.
pub fn evaluate_metric(metric: &ValuationMetric) -> FairValueResult<MetricEvaluation> {
    if metric.benchmark.is_zero() {
        return Err(FairValueError::DegenerateMetric {
            metric: metric.name.clone(),
            reason: "benchmark is zero".into(),
        });
    }
    if metric.value.is_zero() {
        return Err(FairValueError::DegenerateMetric {
            metric: metric.name.clone(),
            reason: "observed value is zero".into(),
        });
    }
    ensure_unit_interval("weight", metric.weight)?;

    let polarity = metric.polarity.unwrap_or_else(|| infer_polarity(&metric.name));
    let favorable = match polarity {
        MetricPolarity::HigherIsBetter => metric.value > metric.benchmark,
        MetricPolarity::LowerIsBetter => metric.value < metric.benchmark,
    };

    let raw_progress = if favorable {
        metric.value / (metric.benchmark * PROGRESS_HEADROOM)
    } else {
        metric.benchmark / (metric.value * PROGRESS_HEADROOM)
    };
    let progress = raw_progress.clamp(Decimal::ZERO, Decimal::ONE);

    Ok(MetricEvaluation {
        name: metric.name.clone(),
        polarity,
        favorable,
        progress,
        variance_pct: metric.value / metric.benchmark - Decimal::ONE,
    })
}

/// Evaluate a set of metrics and summarise the weighted favorable share.
pub fn evaluate_metrics(metrics: &[ValuationMetric]) -> FairValueResult<MetricScorecard> {
    let evaluations = metrics
        .iter()
        .map(evaluate_metric)
        .collect::<FairValueResult<Vec<_>>>()?;

    let total_weight: Decimal = metrics.iter().map(|m| m.weight).sum();
    let favorable_weight: Decimal = metrics
        .iter()
        .zip(&evaluations)
        .filter(|(_, e)| e.favorable)
        .map(|(m, _)| m.weight)
        .sum();

    let weighted_favorable_share = if total_weight.is_zero() {
        None
    } else {
        Some(favorable_weight / total_weight)
    };

    Ok(MetricScorecard {
        favorable_count: evaluations.iter().filter(|e| e.favorable).count(),
        evaluations,
        weighted_favorable_share,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
