use clap::Args;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use fair_value_core::format::{format_currency, format_percent};
use fair_value_core::history::{HistoryTracker, TrendLabel, ValuationHistory};
use fair_value_core::Currency;

use super::attach_display;
use crate::input;

/// Arguments for the valuation trend
#[derive(Args)]
pub struct TrendArgs {
    /// Path to JSON/YAML file with `entity_id` and recorded `entries`
    #[arg(long)]
    pub input: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TrendInput {
    entity_id: String,
    #[serde(default)]
    currency: Currency,
    entries: Vec<ValuationHistory>,
}

#[derive(Debug, Serialize)]
struct TrendOutput {
    entity_id: String,
    entry_count: usize,
    previous: ValuationHistory,
    latest: ValuationHistory,
    percent_change: rust_decimal::Decimal,
    trend: TrendLabel,
}

pub fn run_trend(args: TrendArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let data: TrendInput = input::require_input(args.input.as_deref(), "trend")?;
    let tracker = HistoryTracker::from_entries(data.entity_id.clone(), data.entries)?;

    let percent_change = tracker.percent_change()?;
    // percent_change succeeded, so there are at least two entries
    let entries = tracker.entries();
    let (latest, previous) = match entries.as_slice() {
        [latest, previous, ..] => (latest.clone(), previous.clone()),
        _ => return Err("trend needs at least two recorded valuations".into()),
    };

    let display = vec![
        ("latest", format_currency(latest.value, &data.currency)),
        ("previous", format_currency(previous.value, &data.currency)),
        ("percent_change", format_percent(percent_change, 1)),
    ];

    let output = TrendOutput {
        entity_id: data.entity_id,
        entry_count: tracker.len(),
        previous,
        latest,
        percent_change,
        trend: TrendLabel::from_change(percent_change),
    };
    let mut value = serde_json::json!({ "result": serde_json::to_value(output)? });
    attach_display(&mut value, display);
    Ok(value)
}
