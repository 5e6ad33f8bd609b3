use clap::Args;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use fair_value_core::format::format_percent;
use fair_value_core::valuation::metrics::{self, MetricPolarity, TrendDirection, ValuationMetric};

use crate::input;

/// Arguments for benchmark metric evaluation
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct MetricArgs {
    /// Path to JSON/YAML file with one metric or a list of metrics
    #[arg(long)]
    pub input: Option<String>,

    /// Metric name (polarity is inferred from it unless --lower-is-better)
    #[arg(long)]
    pub name: Option<String>,

    /// Observed value
    #[arg(long)]
    pub value: Option<Decimal>,

    /// Industry benchmark
    #[arg(long)]
    pub benchmark: Option<Decimal>,

    /// Scorecard weight (0-1)
    #[arg(long, default_value = "1")]
    pub weight: Decimal,

    /// Treat lower observed values as better
    #[arg(long)]
    pub lower_is_better: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MetricInput {
    Many(Vec<ValuationMetric>),
    One(ValuationMetric),
}

fn metric_from_flags(args: &MetricArgs) -> Result<ValuationMetric, Box<dyn std::error::Error>> {
    Ok(ValuationMetric {
        name: args
            .name
            .clone()
            .ok_or("--name is required (or provide --input)")?,
        value: args.value.ok_or("--value is required (or provide --input)")?,
        benchmark: args
            .benchmark
            .ok_or("--benchmark is required (or provide --input)")?,
        weight: args.weight,
        trend: TrendDirection::Flat,
        polarity: args.lower_is_better.then_some(MetricPolarity::LowerIsBetter),
    })
}

pub fn run_metric(args: MetricArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let data = match input::read_input::<MetricInput>(args.input.as_deref())? {
        Some(data) => data,
        None => MetricInput::One(metric_from_flags(&args)?),
    };

    match data {
        MetricInput::One(metric) => {
            let evaluation = metrics::evaluate_metric(&metric)?;
            let mut output = serde_json::to_value(&evaluation)?;
            if let Some(map) = output.as_object_mut() {
                map.insert(
                    "variance".into(),
                    Value::String(format_percent(evaluation.variance_pct, 1)),
                );
            }
            Ok(serde_json::json!({ "result": output }))
        }
        MetricInput::Many(list) => {
            let scorecard = metrics::evaluate_metrics(&list)?;
            Ok(serde_json::json!({ "result": serde_json::to_value(scorecard)? }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn args() -> MetricArgs {
        MetricArgs {
            input: None,
            name: Some("Monthly churn".into()),
            value: Some(dec!(0.021)),
            benchmark: Some(dec!(0.03)),
            weight: Decimal::ONE,
            lower_is_better: false,
        }
    }

    #[test]
    fn test_flags_build_metric() {
        let metric = metric_from_flags(&args()).unwrap();
        assert_eq!(metric.name, "Monthly churn");
        assert!(metric.polarity.is_none());
    }

    #[test]
    fn test_missing_flag_reported() {
        let mut a = args();
        a.benchmark = None;
        let err = metric_from_flags(&a).unwrap_err();
        assert!(err.to_string().contains("--benchmark"));
    }

    #[test]
    fn test_input_accepts_single_or_list() {
        let one = serde_json::json!({
            "name": "Net revenue retention", "value": "1.12", "benchmark": "1.05", "weight": "0.4"
        });
        assert!(matches!(
            serde_json::from_value::<MetricInput>(one.clone()).unwrap(),
            MetricInput::One(_)
        ));
        let many = serde_json::json!([one]);
        assert!(matches!(
            serde_json::from_value::<MetricInput>(many).unwrap(),
            MetricInput::Many(_)
        ));
    }
}
