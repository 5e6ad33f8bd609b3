use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::entity::BusinessEntity;
use crate::error::FairValueError;
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::FairValueResult;

use super::dcf::{compute_dcf, DcfAssumptions};

/// Input for a WACC × terminal growth sensitivity grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitivityInput {
    pub entity: BusinessEntity,
    /// Base case; `wacc` and `terminal_growth` are overridden per cell
    pub assumptions: DcfAssumptions,
    /// Row axis, strictly ascending
    pub discount_rates: Vec<Rate>,
    /// Column axis, strictly ascending
    pub terminal_growth_rates: Vec<Rate>,
}

/// Equity value across discount-rate and terminal-growth pairs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitivityGrid {
    pub discount_rates: Vec<Rate>,
    pub terminal_growth_rates: Vec<Rate>,
    /// cells[i][j] = equity value at (discount_rates[i], terminal_growth_rates[j]);
    /// None where WACC <= terminal growth
    pub cells: Vec<Vec<Option<Money>>>,
    /// Cell closest to the base-case assumptions (row, col)
    pub base_case_position: (usize, usize),
    pub base_case_value: Option<Money>,
    pub defined_cells: usize,
    pub undefined_cells: usize,
}

fn validate_axis(name: &str, values: &[Rate]) -> FairValueResult<()> {
    if values.is_empty() {
        return Err(FairValueError::InvalidInput {
            field: name.into(),
            reason: "At least one value is required".into(),
        });
    }
    if values.windows(2).any(|w| w[1] <= w[0]) {
        return Err(FairValueError::InvalidInput {
            field: name.into(),
            reason: "Values must be strictly ascending".into(),
        });
    }
    Ok(())
}

/// Find the closest index to a target value in a sorted list.
fn closest_index(values: &[Decimal], target: Decimal) -> usize {
    values
        .iter()
        .enumerate()
        .min_by_key(|(_, v)| (**v - target).abs())
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Re-run the full DCF for every (WACC, terminal growth) pair.
///
/// Cells where the perpetuity formula is undefined are left as `None`
/// without being computed. Any other failure aborts the whole grid, since
/// it would repeat in every cell.
pub fn sensitivity_grid(
    input: &SensitivityInput,
) -> FairValueResult<ComputationOutput<SensitivityGrid>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_axis("discount_rates", &input.discount_rates)?;
    validate_axis("terminal_growth_rates", &input.terminal_growth_rates)?;
    // Ascending, so the first rate is the smallest
    if input.discount_rates[0] <= Decimal::ZERO {
        return Err(FairValueError::InvalidInput {
            field: "discount_rates".into(),
            reason: format!(
                "Discount rates must be positive, got {}",
                input.discount_rates[0]
            ),
        });
    }

    let mut cells = Vec::with_capacity(input.discount_rates.len());
    let mut negative_cash_flow_cells = 0usize;
    let mut scratch: Vec<String> = Vec::new();

    for &wacc in &input.discount_rates {
        let mut row = Vec::with_capacity(input.terminal_growth_rates.len());
        for &terminal_growth in &input.terminal_growth_rates {
            if wacc <= terminal_growth {
                row.push(None);
                continue;
            }
            let assumptions = DcfAssumptions {
                wacc,
                terminal_growth,
                ..input.assumptions.clone()
            };
            let dcf = compute_dcf(&input.entity, &assumptions, &mut scratch)?;
            if dcf
                .projections
                .iter()
                .any(|p| p.free_cash_flow < Decimal::ZERO)
            {
                negative_cash_flow_cells += 1;
            }
            row.push(Some(dcf.equity_value));
        }
        cells.push(row);
    }

    let defined_cells = cells.iter().flatten().filter(|c| c.is_some()).count();
    let undefined_cells = cells.iter().flatten().count() - defined_cells;

    if undefined_cells > 0 {
        warnings.push(format!(
            "{undefined_cells} cells left undefined where WACC does not exceed terminal growth"
        ));
    }
    if negative_cash_flow_cells > 0 {
        warnings.push(format!(
            "{negative_cash_flow_cells} cells project negative cash flows; grid may not be monotonic"
        ));
    }

    let base_row = closest_index(&input.discount_rates, input.assumptions.wacc);
    let base_col = closest_index(&input.terminal_growth_rates, input.assumptions.terminal_growth);
    let base_case_value = cells[base_row][base_col];

    tracing::debug!(
        entity = %input.entity.id,
        rows = input.discount_rates.len(),
        cols = input.terminal_growth_rates.len(),
        defined_cells,
        "evaluated sensitivity grid"
    );

    let output = SensitivityGrid {
        discount_rates: input.discount_rates.clone(),
        terminal_growth_rates: input.terminal_growth_rates.clone(),
        cells,
        base_case_position: (base_row, base_col),
        base_case_value,
        defined_cells,
        undefined_cells,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "WACC × Terminal Growth Sensitivity (equity value)",
        &serde_json::json!({
            "entity": input.entity.id,
            "base_assumptions": input.assumptions,
            "discount_rates": input.discount_rates,
            "terminal_growth_rates": input.terminal_growth_rates,
        }),
        warnings,
        elapsed,
        output,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::fixtures::sample_entity;
    use crate::valuation::dcf::fixtures::sample_assumptions;
    use crate::valuation::dcf::project_dcf;
    use rust_decimal_macros::dec;

    fn sample_input() -> SensitivityInput {
        SensitivityInput {
            entity: sample_entity(),
            assumptions: sample_assumptions(),
            discount_rates: vec![dec!(0.03), dec!(0.10), dec!(0.12), dec!(0.15), dec!(0.18)],
            terminal_growth_rates: vec![dec!(0.01), dec!(0.02), dec!(0.03), dec!(0.04)],
        }
    }

    #[test]
    fn test_grid_dimensions_and_base_case() {
        let out = sensitivity_grid(&sample_input()).unwrap();
        let g = &out.result;

        assert_eq!(g.cells.len(), 5);
        assert!(g.cells.iter().all(|row| row.len() == 4));
        // Base: WACC 0.15, g 0.03
        assert_eq!(g.base_case_position, (3, 2));
        let base = project_dcf(&sample_entity(), &sample_assumptions()).unwrap();
        assert_eq!(g.base_case_value, Some(base.result.equity_value));
    }

    #[test]
    fn test_undefined_where_wacc_not_above_growth() {
        let out = sensitivity_grid(&sample_input()).unwrap();
        let g = &out.result;

        // WACC 0.03: g 0.01, 0.02 defined; 0.03, 0.04 undefined
        assert!(g.cells[0][0].is_some());
        assert!(g.cells[0][1].is_some());
        assert!(g.cells[0][2].is_none());
        assert!(g.cells[0][3].is_none());
        assert_eq!(g.undefined_cells, 2);
        assert_eq!(g.defined_cells, 18);
    }

    #[test]
    fn test_monotonic_along_both_axes() {
        let out = sensitivity_grid(&sample_input()).unwrap();
        let cells = &out.result.cells;

        for j in 0..cells[0].len() {
            let column: Vec<Money> = cells.iter().filter_map(|row| row[j]).collect();
            for w in column.windows(2) {
                assert!(w[1] <= w[0], "higher WACC must not raise value");
            }
        }
        for row in cells {
            let defined: Vec<Money> = row.iter().flatten().copied().collect();
            for w in defined.windows(2) {
                assert!(w[1] >= w[0], "higher terminal growth must not lower value");
            }
        }
    }

    #[test]
    fn test_unsorted_axis_rejected() {
        let mut input = sample_input();
        input.discount_rates = vec![dec!(0.12), dec!(0.10)];
        assert!(matches!(
            sensitivity_grid(&input),
            Err(FairValueError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_non_positive_discount_rate_rejected_up_front() {
        let mut input = sample_input();
        input.discount_rates = vec![Decimal::ZERO, dec!(0.10)];
        input.terminal_growth_rates = vec![dec!(-0.02), dec!(0.01)];
        let err = sensitivity_grid(&input).unwrap_err();
        assert!(matches!(
            err,
            FairValueError::InvalidInput { ref field, .. } if field == "discount_rates"
        ));
    }

    #[test]
    fn test_empty_axis_rejected() {
        let mut input = sample_input();
        input.terminal_growth_rates.clear();
        assert!(sensitivity_grid(&input).is_err());
    }

    #[test]
    fn test_entity_errors_propagate() {
        let mut input = sample_input();
        input.entity.revenue = Decimal::ZERO;
        assert!(matches!(
            sensitivity_grid(&input),
            Err(FairValueError::InvalidEntityFinancials { .. })
        ));
    }

    #[test]
    fn test_closest_index() {
        let values = vec![dec!(0.08), dec!(0.10), dec!(0.12)];
        assert_eq!(closest_index(&values, dec!(0.105)), 1);
        assert_eq!(closest_index(&values, dec!(0.20)), 2);
    }
}
