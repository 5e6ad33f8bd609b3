use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::entity::BusinessEntity;
use crate::error::FairValueError;
use crate::types::{with_metadata, ComputationOutput, Money, Multiple, Rate};
use crate::FairValueResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A peer company with its observed trading or transaction multiples.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparableCompany {
    /// Company name or ticker
    pub name: String,
    pub revenue: Money,
    /// Valuation / revenue
    pub revenue_multiple: Multiple,
    /// Valuation / EBITDA
    pub ebitda_multiple: Multiple,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pe_ratio: Option<Multiple>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ev_ebitda: Option<Multiple>,
    pub net_income: Money,
}

/// Input for comparing a reconciled valuation against a peer set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparablesInput {
    pub entity: BusinessEntity,
    /// Output of the weighted reconciliation
    pub reconciled_value: Money,
    pub comparables: Vec<ComparableCompany>,
    /// EBITDA margin assumed for the entity when deriving its EBITDA multiple
    pub assumed_ebitda_margin: Rate,
}

/// Arithmetic means of peer multiples.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerAverages {
    pub revenue_multiple: Multiple,
    pub ebitda_multiple: Multiple,
    /// Mean over peers reporting a P/E; None if none do
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pe_ratio: Option<Multiple>,
    /// Mean over peers reporting EV/EBITDA; None if none do
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ev_ebitda: Option<Multiple>,
}

/// Entity values implied by applying peer-average multiples to its own
/// financials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerImpliedValues {
    pub from_revenue_multiple: Money,
    pub from_ebitda_multiple: Money,
}

/// Output of the comparables analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparableAnalysis {
    pub peer_count: usize,
    /// Reconciled value / revenue
    pub implied_revenue_multiple: Multiple,
    /// Reconciled value / (revenue × assumed EBITDA margin)
    pub implied_ebitda_multiple: Multiple,
    /// None when there are no peers
    pub peer_averages: Option<PeerAverages>,
    /// implied / peer average - 1, revenue view
    pub revenue_premium_pct: Option<Rate>,
    /// implied / peer average - 1, EBITDA view
    pub ebitda_premium_pct: Option<Rate>,
    pub peer_implied: Option<PeerImpliedValues>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Compare the reconciled valuation against peer multiples.
///
/// An empty peer set is not an error: the peer-dependent fields come back as
/// `None` and a warning is attached.
pub fn compare_to_comparables(
    input: &ComparablesInput,
) -> FairValueResult<ComputationOutput<ComparableAnalysis>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    // --- Validate ---
    let revenue = input.entity.positive_revenue()?;
    if input.assumed_ebitda_margin <= Decimal::ZERO || input.assumed_ebitda_margin > Decimal::ONE {
        return Err(FairValueError::InvalidEntityFinancials {
            field: "assumed_ebitda_margin".into(),
            reason: format!(
                "EBITDA margin must be in (0, 1], got {}",
                input.assumed_ebitda_margin
            ),
        });
    }
    let entity_ebitda = revenue * input.assumed_ebitda_margin;

    // --- Entity's implied multiples ---
    let implied_revenue_multiple = input.reconciled_value / revenue;
    let implied_ebitda_multiple = input.reconciled_value / entity_ebitda;

    // --- Peer statistics ---
    let peer_averages = peer_averages(&input.comparables);
    if peer_averages.is_none() {
        tracing::warn!(entity = %input.entity.id, "no comparables supplied");
        warnings.push("No comparable companies supplied; peer comparison not applicable".into());
    } else if input.comparables.len() < 3 {
        warnings.push(format!(
            "Only {} comparables supplied; consider adding more for a meaningful average",
            input.comparables.len()
        ));
    }

    let (revenue_premium_pct, ebitda_premium_pct, peer_implied) = match &peer_averages {
        Some(avg) => (
            premium(implied_revenue_multiple, avg.revenue_multiple, "revenue", &mut warnings),
            premium(implied_ebitda_multiple, avg.ebitda_multiple, "EBITDA", &mut warnings),
            Some(PeerImpliedValues {
                from_revenue_multiple: avg.revenue_multiple * revenue,
                from_ebitda_multiple: avg.ebitda_multiple * entity_ebitda,
            }),
        ),
        None => (None, None, None),
    };

    if let Some(p) = revenue_premium_pct {
        if p.abs() > dec!(0.5) {
            warnings.push(format!(
                "Reconciled value sits {:.1}% from the peer revenue multiple; review method inputs",
                p * dec!(100)
            ));
        }
    }

    tracing::debug!(
        entity = %input.entity.id,
        peers = input.comparables.len(),
        %implied_revenue_multiple,
        "compared reconciled value to comparables"
    );

    let output = ComparableAnalysis {
        peer_count: input.comparables.len(),
        implied_revenue_multiple,
        implied_ebitda_multiple,
        peer_averages,
        revenue_premium_pct,
        ebitda_premium_pct,
        peer_implied,
    };

    let elapsed = start.elapsed().as_micros() as u64;

    Ok(with_metadata(
        "Comparable Company Multiples (peer mean)",
        input,
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn mean(values: impl Iterator<Item = Decimal>) -> Option<Decimal> {
    let (sum, count) = values.fold((Decimal::ZERO, 0u64), |(s, n), v| (s + v, n + 1));
    if count == 0 {
        None
    } else {
        Some(sum / Decimal::from(count))
    }
}

fn peer_averages(peers: &[ComparableCompany]) -> Option<PeerAverages> {
    Some(PeerAverages {
        revenue_multiple: mean(peers.iter().map(|p| p.revenue_multiple))?,
        ebitda_multiple: mean(peers.iter().map(|p| p.ebitda_multiple))?,
        pe_ratio: mean(peers.iter().filter_map(|p| p.pe_ratio)),
        ev_ebitda: mean(peers.iter().filter_map(|p| p.ev_ebitda)),
    })
}

fn premium(
    implied: Multiple,
    peer_average: Multiple,
    view: &str,
    warnings: &mut Vec<String>,
) -> Option<Rate> {
    if peer_average.is_zero() {
        warnings.push(format!("Peer average {view} multiple is zero; premium not applicable"));
        return None;
    }
    Some(implied / peer_average - Decimal::ONE)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
