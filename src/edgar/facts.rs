//! Typed XBRL company facts.
//!
//! The facts endpoint tags every reported value with an XBRL concept name;
//! companies use different tags for the same economic metric, so friendly
//! metric names resolve through an alias table.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Friendly metric name -> candidate XBRL concept names, tried in order.
pub const FINANCIAL_CONCEPTS: [(&str, &[&str]); 14] = [
    (
        "revenue",
        &[
            "Revenues",
            "RevenueFromContractWithCustomerExcludingAssessedTax",
            "SalesRevenueNet",
        ],
    ),
    ("net_income", &["NetIncomeLoss", "ProfitLoss"]),
    ("operating_income", &["OperatingIncomeLoss"]),
    ("gross_profit", &["GrossProfit"]),
    ("total_assets", &["Assets"]),
    ("total_liabilities", &["Liabilities"]),
    (
        "stockholders_equity",
        &[
            "StockholdersEquity",
            "StockholdersEquityAttributableToParent",
        ],
    ),
    ("cash", &["CashAndCashEquivalentsAtCarryingValue", "Cash"]),
    ("total_debt", &["LongTermDebt", "LongTermDebtNoncurrent"]),
    (
        "operating_cash_flow",
        &["NetCashProvidedByUsedInOperatingActivities"],
    ),
    ("capex", &["PaymentsToAcquirePropertyPlantAndEquipment"]),
    ("eps_basic", &["EarningsPerShareBasic"]),
    ("eps_diluted", &["EarningsPerShareDiluted"]),
    ("shares_outstanding", &["CommonStockSharesOutstanding"]),
];

/// Known friendly metric names.
#[must_use]
pub fn known_metrics() -> Vec<&'static str> {
    FINANCIAL_CONCEPTS.iter().map(|(name, _)| *name).collect()
}

/// Parsed company facts: entity name plus concept -> observation series.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompanyFacts {
    /// Company display name.
    #[serde(default)]
    pub entity_name: String,
    /// us-gaap concept name -> series of observations grouped by unit.
    #[serde(default)]
    pub facts: HashMap<String, ConceptSeries>,
}

/// All observations reported under one concept, grouped by unit code.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConceptSeries {
    /// Unit code (e.g. "USD", "shares") -> observations.
    #[serde(default)]
    pub units: HashMap<String, Vec<Observation>>,
}

/// One reported value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Observation {
    /// Period end date, `YYYY-MM-DD`.
    #[serde(default)]
    pub end: String,
    /// Reported value; absent for some malformed rows.
    #[serde(default)]
    pub val: Option<f64>,
    /// Form the value was reported on (e.g. "10-K").
    #[serde(default)]
    pub form: String,
    /// Fiscal period tag ("FY", "Q1", ...).
    #[serde(default)]
    pub fp: String,
    /// Date the value was filed, `YYYY-MM-DD`.
    #[serde(default)]
    pub filed: String,
}

/// One extracted annual data point for a metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    /// Four-digit fiscal year (from the period end date).
    pub year: String,
    /// Reported value.
    pub value: f64,
    /// Period end date.
    pub period_end: String,
    /// Filing date.
    pub filed: String,
}

/// Raw wire shape: facts are nested one level deeper, per taxonomy.
#[derive(Debug, Deserialize)]
struct RawCompanyFacts {
    #[serde(default, rename = "entityName")]
    entity_name: String,
    #[serde(default)]
    facts: HashMap<String, HashMap<String, ConceptSeries>>,
}

impl CompanyFacts {
    /// Parses the raw facts JSON, keeping the us-gaap taxonomy.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON does not match the expected shape.
    pub fn from_json(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        let raw: RawCompanyFacts = serde_json::from_value(value)?;
        let facts = raw.facts.into_iter().find(|(taxonomy, _)| taxonomy == "us-gaap");
        Ok(Self {
            entity_name: raw.entity_name,
            facts: facts.map(|(_, concepts)| concepts).unwrap_or_default(),
        })
    }
}

/// Extracts a metric's annual series, newest first, up to `last_n_years`.
///
/// Tries each alias concept in order; for the first one present, keeps
/// annual observations (`form == "10-K"`, `fp == "FY"`), dedups by fiscal
/// year keeping the most recently filed value, and sorts newest first.
/// Unknown metric names fall through to a literal concept lookup.
#[must_use]
pub fn extract_metric(
    facts: &CompanyFacts,
    metric_name: &str,
    last_n_years: usize,
) -> Vec<MetricPoint> {
    let aliases: &[&str] = FINANCIAL_CONCEPTS
        .iter()
        .find(|(name, _)| *name == metric_name)
        .map_or(&[], |(_, concepts)| *concepts);

    let literal = [metric_name];
    let candidates: &[&str] = if aliases.is_empty() { &literal } else { aliases };

    for concept in candidates {
        let Some(series) = facts.facts.get(*concept) else {
            continue;
        };

        let values = series
            .units
            .get("USD")
            .or_else(|| series.units.get("shares"))
            .or_else(|| series.units.get("USD/shares"));
        let Some(values) = values else { continue };

        // Annual values only; quarterly rows restate the same concepts
        let annual = values
            .iter()
            .filter(|v| v.form == "10-K" && v.fp == "FY" && v.val.is_some());

        // Dedup by fiscal year, keeping the most recent filing per year
        let mut by_year: HashMap<String, &Observation> = HashMap::new();
        for obs in annual {
            let year = obs.end.get(..4).unwrap_or("").to_string();
            if year.is_empty() {
                continue;
            }
            match by_year.get(&year) {
                Some(existing) if existing.filed >= obs.filed => {}
                _ => {
                    by_year.insert(year, obs);
                }
            }
        }

        let mut points: Vec<MetricPoint> = by_year
            .into_values()
            .filter_map(|obs| {
                obs.val.map(|value| MetricPoint {
                    year: obs.end.get(..4).unwrap_or("").to_string(),
                    value,
                    period_end: obs.end.clone(),
                    filed: obs.filed.clone(),
                })
            })
            .collect();
        points.sort_by(|a, b| b.period_end.cmp(&a.period_end));
        points.truncate(last_n_years);

        if !points.is_empty() {
            return points;
        }
    }

    Vec::new()
}

/// Formats a raw value as a human-readable dollar string.
#[must_use]
pub fn format_value(value: f64, metric_name: &str) -> String {
    if metric_name.contains("eps") || metric_name.contains("per_share") {
        return format!("${value:.2}");
    }

    let abs = value.abs();
    let sign = if value < 0.0 { "-" } else { "" };

    if abs >= 1e9 {
        format!("{sign}${:.2}B", abs / 1e9)
    } else if abs >= 1e6 {
        format!("{sign}${:.2}M", abs / 1e6)
    } else if abs >= 1e3 {
        format!("{sign}${:.2}K", abs / 1e3)
    } else {
        format!("{sign}${abs:.2}")
    }
}
