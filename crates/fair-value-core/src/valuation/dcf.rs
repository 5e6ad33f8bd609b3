use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::entity::BusinessEntity;
use crate::error::FairValueError;
use crate::types::{ensure_unit_interval, with_metadata, ComputationOutput, Money, Rate};
use crate::FairValueResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

fn default_horizon_years() -> u32 {
    5
}

fn default_terminal_value_weight() -> Rate {
    dec!(0.5)
}

/// Longest explicit forecast accepted.
pub const MAX_HORIZON_YEARS: u32 = 50;

/// Assumptions for a decaying-growth DCF projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DcfAssumptions {
    /// Fiscal year of the entity's trailing revenue; year 1 is `base_year + 1`
    pub base_year: i32,
    /// Revenue growth applied in year 1
    pub starting_growth: Rate,
    /// Reduction in the growth rate per subsequent year
    pub growth_decay: Rate,
    /// Discount rate (WACC)
    pub wacc: Rate,
    /// Explicit forecast horizon (default: 5)
    #[serde(default = "default_horizon_years")]
    pub horizon_years: u32,
    /// Perpetuity growth rate, also the floor for explicit-period growth
    pub terminal_growth: Rate,
    /// EBITDA as a fraction of revenue
    pub ebitda_margin: Rate,
    /// Net income as a fraction of revenue (default: the entity's profit margin)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub net_margin: Option<Rate>,
    /// Free cash flow as a fraction of net income (default: FCF = net income)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cash_conversion: Option<Rate>,
    /// Scaling applied to the perpetuity terminal value (default: 0.5)
    #[serde(default = "default_terminal_value_weight")]
    pub terminal_value_weight: Rate,
    /// Debt minus cash, subtracted in the equity bridge
    #[serde(default)]
    pub net_debt: Money,
}

/// One forecast year.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialProjection {
    pub year: i32,
    pub revenue: Money,
    pub expenses: Money,
    pub ebitda: Money,
    pub net_income: Money,
    pub free_cash_flow: Money,
    /// Year-over-year revenue growth
    pub growth_rate: Rate,
    pub discount_factor: Rate,
    pub present_value: Money,
}

/// Output of the DCF projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DcfOutput {
    /// Contiguous ascending forecast years
    pub projections: Vec<FinancialProjection>,
    /// Sum of present values of explicit-period cash flows
    pub sum_pv_cash_flows: Money,
    /// Weighted perpetuity value at the end of the horizon (undiscounted)
    pub terminal_value: Money,
    /// Terminal value discounted by the final year's factor
    pub pv_terminal_value: Money,
    pub enterprise_value: Money,
    /// Enterprise value less net debt
    pub equity_value: Money,
    /// Share of enterprise value coming from the terminal value
    pub terminal_value_share: Rate,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Project cash flows with decaying growth and discount them at WACC.
pub fn project_dcf(
    entity: &BusinessEntity,
    assumptions: &DcfAssumptions,
) -> FairValueResult<ComputationOutput<DcfOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let output = compute_dcf(entity, assumptions, &mut warnings)?;

    tracing::debug!(
        entity = %entity.id,
        wacc = %assumptions.wacc,
        terminal_growth = %assumptions.terminal_growth,
        enterprise_value = %output.enterprise_value,
        "projected DCF"
    );

    let elapsed = start.elapsed().as_micros() as u64;

    Ok(with_metadata(
        "Decaying-Growth DCF (net income cash flow, weighted perpetuity terminal value)",
        assumptions,
        warnings,
        elapsed,
        output,
    ))
}

/// The DCF calculation without the output envelope. Shared with the
/// sensitivity grid, which re-runs it per cell.
pub(crate) fn compute_dcf(
    entity: &BusinessEntity,
    assumptions: &DcfAssumptions,
    warnings: &mut Vec<String>,
) -> FairValueResult<DcfOutput> {
    validate_assumptions(entity, assumptions)?;

    let projections = build_projections(entity, assumptions)?;
    let last = projections.last().ok_or_else(|| {
        FairValueError::InsufficientData("No projection years generated".into())
    })?;

    let sum_pv_cash_flows = projections
        .iter()
        .try_fold(Decimal::ZERO, |acc, p| acc.checked_add(p.present_value))
        .ok_or_else(|| overflow("sum of discounted cash flows"))?;

    // --- Terminal value ---
    let wacc = assumptions.wacc;
    let g = assumptions.terminal_growth;
    let terminal_value = Decimal::ONE
        .checked_add(g)
        .zip(wacc.checked_sub(g))
        .and_then(|(growth_factor, spread)| {
            last.free_cash_flow
                .checked_mul(growth_factor)?
                .checked_div(spread)
        })
        .and_then(|perpetuity| perpetuity.checked_mul(assumptions.terminal_value_weight))
        .ok_or_else(|| overflow("terminal value"))?;
    let pv_terminal_value = terminal_value
        .checked_mul(last.discount_factor)
        .ok_or_else(|| overflow("discounted terminal value"))?;

    if last.free_cash_flow < Decimal::ZERO {
        tracing::warn!(
            entity = %entity.id,
            free_cash_flow = %last.free_cash_flow,
            "negative final-year cash flow"
        );
        warnings.push(format!(
            "Final-year free cash flow is negative ({}); terminal value reduces enterprise value",
            last.free_cash_flow
        ));
    }

    // --- Enterprise and equity value ---
    let enterprise_value = sum_pv_cash_flows
        .checked_add(pv_terminal_value)
        .ok_or_else(|| overflow("enterprise value"))?;
    let equity_value = enterprise_value
        .checked_sub(assumptions.net_debt)
        .ok_or_else(|| overflow("equity value"))?;

    let terminal_value_share = pv_terminal_value
        .checked_div(enterprise_value)
        .unwrap_or(Decimal::ZERO);
    if terminal_value_share > dec!(0.75) {
        warnings.push(format!(
            "Terminal value represents {:.1}% of enterprise value; consider extending the explicit forecast period",
            terminal_value_share * dec!(100)
        ));
    }

    Ok(DcfOutput {
        projections,
        sum_pv_cash_flows,
        terminal_value,
        pv_terminal_value,
        enterprise_value,
        equity_value,
        terminal_value_share,
    })
}

/// Growth rate for forecast year `year_num` (1-based), floored at the
/// terminal rate.
pub fn growth_for_year(assumptions: &DcfAssumptions, year_num: u32) -> Rate {
    // A decay too large to represent is past the floor anyway.
    assumptions
        .growth_decay
        .checked_mul(Decimal::from(year_num.saturating_sub(1)))
        .and_then(|decay| assumptions.starting_growth.checked_sub(decay))
        .map_or(assumptions.terminal_growth, |decayed| {
            decayed.max(assumptions.terminal_growth)
        })
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn validate_assumptions(entity: &BusinessEntity, a: &DcfAssumptions) -> FairValueResult<()> {
    entity.positive_revenue()?;
    entity.validate()?;

    if a.wacc <= a.terminal_growth {
        return Err(FairValueError::InvalidDiscountAssumptions {
            wacc: a.wacc,
            terminal_growth: a.terminal_growth,
        });
    }
    if a.wacc <= Decimal::ZERO {
        return Err(FairValueError::InvalidInput {
            field: "wacc".into(),
            reason: "WACC must be positive".into(),
        });
    }
    if a.horizon_years == 0 || a.horizon_years > MAX_HORIZON_YEARS {
        return Err(FairValueError::InvalidInput {
            field: "horizon_years".into(),
            reason: format!(
                "Forecast horizon must be between 1 and {MAX_HORIZON_YEARS} years, got {}",
                a.horizon_years
            ),
        });
    }
    if a.growth_decay < Decimal::ZERO {
        return Err(FairValueError::InvalidInput {
            field: "growth_decay".into(),
            reason: "Growth decay cannot be negative".into(),
        });
    }
    if a.starting_growth <= -Decimal::ONE || a.terminal_growth <= -Decimal::ONE {
        return Err(FairValueError::InvalidInput {
            field: "starting_growth".into(),
            reason: "Growth rates must exceed -100%".into(),
        });
    }
    ensure_unit_interval("ebitda_margin", a.ebitda_margin)?;
    ensure_unit_interval("terminal_value_weight", a.terminal_value_weight)?;
    if let Some(m) = a.net_margin {
        ensure_unit_interval("net_margin", m)?;
    }
    if let Some(c) = a.cash_conversion {
        ensure_unit_interval("cash_conversion", c)?;
    }
    Ok(())
}

fn overflow(step: &str) -> FairValueError {
    FairValueError::InvalidInput {
        field: "assumptions".into(),
        reason: format!("{step} exceeds the representable decimal range"),
    }
}

fn build_projections(
    entity: &BusinessEntity,
    a: &DcfAssumptions,
) -> FairValueResult<Vec<FinancialProjection>> {
    let net_margin = a.net_margin.unwrap_or(entity.profit_margin);
    let cash_conversion = a.cash_conversion.unwrap_or(Decimal::ONE);
    let discount_base = Decimal::ONE
        .checked_add(a.wacc)
        .ok_or_else(|| overflow("discount rate"))?;

    let mut projections = Vec::with_capacity(a.horizon_years as usize);
    let mut prev_revenue = entity.revenue;

    for year_num in 1..=a.horizon_years {
        let growth_rate = growth_for_year(a, year_num);
        let revenue = Decimal::ONE
            .checked_add(growth_rate)
            .and_then(|factor| prev_revenue.checked_mul(factor))
            .ok_or_else(|| overflow(&format!("year {year_num} revenue")))?;
        // Margins and conversion are within [0, 1]; these cannot overflow.
        let ebitda = revenue * a.ebitda_margin;
        let expenses = revenue - ebitda;
        let net_income = revenue * net_margin;
        let free_cash_flow = net_income * cash_conversion;

        let discount_factor = discount_base
            .checked_powi(year_num as i64)
            .and_then(|compound| Decimal::ONE.checked_div(compound))
            .ok_or_else(|| overflow(&format!("year {year_num} discount factor")))?;
        let present_value = free_cash_flow * discount_factor;

        let year = i32::try_from(year_num)
            .ok()
            .and_then(|n| a.base_year.checked_add(n))
            .ok_or_else(|| overflow("forecast year"))?;

        projections.push(FinancialProjection {
            year,
            revenue,
            expenses,
            ebitda,
            net_income,
            free_cash_flow,
            growth_rate,
            discount_factor,
            present_value,
        });

        prev_revenue = revenue;
    }

    Ok(projections)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------


#[cfg(test)]
mod tests {
    use super::fixtures::sample_assumptions;
    use super::*;
    use crate::entity::fixtures::sample_entity;

    #[test]
    fn test_growth_decays_to_year_five() {
        let a = sample_assumptions();
        let out = project_dcf(&sample_entity(), &a).unwrap();
        let rates: Vec<Rate> = out.result.projections.iter().map(|p| p.growth_rate).collect();
        assert_eq!(
            rates,
            vec![dec!(0.32), dec!(0.28), dec!(0.24), dec!(0.20), dec!(0.16)]
        );
    }

    #[test]
    fn test_growth_floors_at_terminal_rate() {
        let mut a = sample_assumptions();
        a.horizon_years = 10;
        let out = project_dcf(&sample_entity(), &a).unwrap();
        for p in &out.result.projections {
            assert!(p.growth_rate >= a.terminal_growth);
        }
        // 0.32 - 9 × 0.04 = -0.04 -> floored
        assert_eq!(out.result.projections[9].growth_rate, dec!(0.03));
    }

    #[test]
    fn test_year_one_rows() {
        let out = project_dcf(&sample_entity(), &sample_assumptions()).unwrap();
        let y1 = &out.result.projections[0];

        assert_eq!(y1.year, 2025);
        // 4.75M × 1.32
        assert_eq!(y1.revenue, dec!(6270000));
        assert_eq!(y1.ebitda, dec!(1567500));
        assert_eq!(y1.expenses, dec!(4702500));
        // entity profit margin 18%
        assert_eq!(y1.net_income, dec!(1128600));
        assert_eq!(y1.free_cash_flow, y1.net_income);
        assert!((y1.discount_factor - Decimal::ONE / dec!(1.15)).abs() < dec!(0.0000000001));
    }

    #[test]
    fn test_years_contiguous_and_discount_factors_decreasing() {
        let out = project_dcf(&sample_entity(), &sample_assumptions()).unwrap();
        for pair in out.result.projections.windows(2) {
            assert_eq!(pair[1].year, pair[0].year + 1);
            assert!(pair[1].discount_factor < pair[0].discount_factor);
        }
    }

    #[test]
    fn test_terminal_value_and_equity_bridge() {
        let a = sample_assumptions();
        let out = project_dcf(&sample_entity(), &a).unwrap();
        let r = &out.result;
        let last = r.projections.last().unwrap();

        let expected_tv = last.free_cash_flow * dec!(1.03) / dec!(0.12) * dec!(0.5);
        assert_eq!(r.terminal_value, expected_tv);
        assert_eq!(r.pv_terminal_value, expected_tv * last.discount_factor);
        assert_eq!(r.enterprise_value, r.sum_pv_cash_flows + r.pv_terminal_value);
        assert_eq!(r.equity_value, r.enterprise_value - dec!(500000));
    }

    #[test]
    fn test_terminal_weight_scales_terminal_value() {
        let mut a = sample_assumptions();
        let half = project_dcf(&sample_entity(), &a).unwrap().result;
        a.terminal_value_weight = Decimal::ONE;
        let full = project_dcf(&sample_entity(), &a).unwrap().result;
        assert!((full.terminal_value - half.terminal_value * dec!(2)).abs() < dec!(0.0001));
        assert_eq!(full.sum_pv_cash_flows, half.sum_pv_cash_flows);
    }

    #[test]
    fn test_cash_conversion_reconciles_fcf() {
        let mut a = sample_assumptions();
        a.cash_conversion = Some(dec!(0.8));
        let out = project_dcf(&sample_entity(), &a).unwrap();
        let y1 = &out.result.projections[0];
        assert_eq!(y1.free_cash_flow, y1.net_income * dec!(0.8));
    }

    #[test]
    fn test_wacc_not_above_terminal_growth_rejected() {
        let mut a = sample_assumptions();
        a.terminal_growth = dec!(0.15);
        assert!(matches!(
            project_dcf(&sample_entity(), &a),
            Err(FairValueError::InvalidDiscountAssumptions { .. })
        ));
    }

    #[test]
    fn test_zero_revenue_rejected() {
        let mut entity = sample_entity();
        entity.revenue = Decimal::ZERO;
        assert!(matches!(
            project_dcf(&entity, &sample_assumptions()),
            Err(FairValueError::InvalidEntityFinancials { .. })
        ));
    }

    #[test]
    fn test_zero_horizon_rejected() {
        let mut a = sample_assumptions();
        a.horizon_years = 0;
        assert!(matches!(
            project_dcf(&sample_entity(), &a),
            Err(FairValueError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_horizon_above_cap_rejected() {
        let mut a = sample_assumptions();
        a.horizon_years = MAX_HORIZON_YEARS + 1;
        assert!(matches!(
            project_dcf(&sample_entity(), &a),
            Err(FairValueError::InvalidInput { .. })
        ));

        a.horizon_years = MAX_HORIZON_YEARS;
        let out = project_dcf(&sample_entity(), &a).unwrap();
        assert_eq!(out.result.projections.len(), MAX_HORIZON_YEARS as usize);
    }

    #[test]
    fn test_explosive_growth_is_an_error_not_a_panic() {
        // 6^40 × 4.75M is far outside the 96-bit range
        let mut a = sample_assumptions();
        a.starting_growth = dec!(5);
        a.growth_decay = Decimal::ZERO;
        a.horizon_years = 40;
        let result = std::panic::catch_unwind(|| project_dcf(&sample_entity(), &a));
        assert!(matches!(
            result.expect("overflow must not panic"),
            Err(FairValueError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_huge_decay_floors_growth() {
        let mut a = sample_assumptions();
        a.growth_decay = Decimal::MAX;
        assert_eq!(growth_for_year(&a, 1), dec!(0.32));
        assert_eq!(growth_for_year(&a, 2), a.terminal_growth);
    }

    #[test]
    fn test_defaults_from_json() {
        let a: DcfAssumptions = serde_json::from_value(serde_json::json!({
            "base_year": 2024,
            "starting_growth": "0.32",
            "growth_decay": "0.04",
            "wacc": "0.15",
            "terminal_growth": "0.03",
            "ebitda_margin": "0.25"
        }))
        .unwrap();
        assert_eq!(a.horizon_years, 5);
        assert_eq!(a.terminal_value_weight, dec!(0.5));
        assert_eq!(a.net_debt, Decimal::ZERO);
    }

    #[test]
    fn test_deterministic() {
        let a = sample_assumptions();
        let x = project_dcf(&sample_entity(), &a).unwrap().result.equity_value;
        let y = project_dcf(&sample_entity(), &a).unwrap().result.equity_value;
        assert_eq!(x, y);
    }
}
