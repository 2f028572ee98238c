//! Financial analysis over extracted metric series.
//!
//! Pure calculation - no I/O. Takes metric points produced by
//! [`crate::edgar::facts::extract_metric`] and derives year-over-year
//! changes, anomaly flags, and a composite risk score.

use crate::edgar::facts::MetricPoint;
use serde::Serialize;
use std::collections::BTreeMap;

/// Per-metric anomaly thresholds as absolute YoY percent change.
const ANOMALY_THRESHOLDS: [(&str, f64, f64); 8] = [
    // (metric, warning, critical)
    ("revenue", 20.0, 40.0),
    ("net_income", 30.0, 60.0),
    ("operating_income", 30.0, 60.0),
    ("total_debt", 30.0, 60.0),
    ("cash", 30.0, 50.0),
    ("operating_cash_flow", 30.0, 60.0),
    ("total_assets", 20.0, 40.0),
    ("capex", 40.0, 80.0),
];

/// Thresholds used for metrics absent from the table.
const DEFAULT_THRESHOLDS: (f64, f64) = (25.0, 50.0);

/// Contribution of each ratio to the composite risk score.
const RISK_WEIGHTS: [(&str, f64); 5] = [
    ("debt_to_equity", 0.25),
    ("cash_burn", 0.20),
    ("revenue_growth", 0.20),
    ("profit_margin", 0.20),
    ("cash_coverage", 0.15),
];

/// Weight for ratios outside the table.
const DEFAULT_RISK_WEIGHT: f64 = 0.1;

/// Direction of a year-over-year change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Value increased.
    Up,
    /// Value decreased.
    Down,
}

/// One year-over-year change.
#[derive(Debug, Clone, Serialize)]
pub struct YoyChange {
    /// Year of the newer value.
    pub year: String,
    /// Newer value.
    pub value: f64,
    /// Older value.
    pub previous_value: f64,
    /// Percent change, rounded to one decimal.
    pub pct_change: f64,
    /// Direction of the change.
    pub direction: Direction,
}

/// Severity of a flagged change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Large move in a favorable or neutral direction.
    Note,
    /// Very large move in a favorable or neutral direction.
    Notable,
    /// Large move in a concerning direction.
    Warning,
    /// Very large move in a concerning direction.
    Critical,
}

impl Severity {
    /// Display label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Note => "NOTE",
            Self::Notable => "NOTABLE",
            Self::Warning => "WARNING",
            Self::Critical => "CRITICAL",
        }
    }
}

/// A flagged year-over-year anomaly.
#[derive(Debug, Clone, Serialize)]
pub struct Anomaly {
    /// Year of the change.
    pub year: String,
    /// Metric name.
    pub metric: String,
    /// Severity classification.
    pub severity: Severity,
    /// Percent change that triggered the flag.
    pub change: f64,
    /// Human-readable summary.
    pub message: String,
}

/// Composite risk assessment.
#[derive(Debug, Clone, Serialize)]
pub struct RiskReport {
    /// Weighted score 0-10, `None` when no ratio could be computed.
    pub score: Option<f64>,
    /// Qualitative label.
    pub label: &'static str,
    /// Per-ratio contributions.
    pub breakdown: BTreeMap<String, f64>,
    /// Plain-language explanations of elevated ratios.
    pub explanations: Vec<String>,
}

/// Calculates year-over-year percent changes.
///
/// `points` must be sorted most recent first, as `extract_metric` returns
/// them. Pairs with a missing or zero base are skipped.
#[must_use]
pub fn yoy_changes(points: &[MetricPoint]) -> Vec<YoyChange> {
    if points.len() < 2 {
        return Vec::new();
    }

    let mut results = Vec::new();
    for pair in points.windows(2) {
        let (current, previous) = (&pair[0], &pair[1]);
        if previous.value == 0.0 {
            continue;
        }

        let pct_change = (current.value - previous.value) / previous.value.abs() * 100.0;
        results.push(YoyChange {
            year: current.year.clone(),
            value: current.value,
            previous_value: previous.value,
            pct_change: round1(pct_change),
            direction: if pct_change > 0.0 {
                Direction::Up
            } else {
                Direction::Down
            },
        });
    }
    results
}

/// Flags anomalous changes for one metric against its threshold pair.
#[must_use]
pub fn detect_anomalies(metric_name: &str, changes: &[YoyChange]) -> Vec<Anomaly> {
    let (warning, critical) = ANOMALY_THRESHOLDS
        .iter()
        .find(|(name, _, _)| *name == metric_name)
        .map_or(DEFAULT_THRESHOLDS, |(_, w, c)| (*w, *c));

    let mut anomalies = Vec::new();
    for change in changes {
        let magnitude = change.pct_change.abs();
        if magnitude < warning {
            continue;
        }

        let concerning = is_bad_direction(metric_name, change.pct_change);
        let severity = if magnitude >= critical {
            if concerning {
                Severity::Critical
            } else {
                Severity::Notable
            }
        } else if concerning {
            Severity::Warning
        } else {
            Severity::Note
        };

        let verb = match change.direction {
            Direction::Up => "increased",
            Direction::Down => "decreased",
        };
        anomalies.push(Anomaly {
            year: change.year.clone(),
            metric: metric_name.to_string(),
            severity,
            change: change.pct_change,
            message: format!(
                "{} {verb} {magnitude:.1}% in {}",
                metric_title(metric_name),
                change.year
            ),
        });
    }
    anomalies
}

/// Whether a change direction is financially concerning for this metric.
///
/// Declining revenue is bad; declining debt is good; some metrics are
/// neutral either way.
fn is_bad_direction(metric_name: &str, change: f64) -> bool {
    const BAD_IF_DECREASING: [&str; 7] = [
        "revenue",
        "net_income",
        "operating_income",
        "gross_profit",
        "cash",
        "operating_cash_flow",
        "stockholders_equity",
    ];
    const BAD_IF_INCREASING: [&str; 2] = ["total_debt", "total_liabilities"];

    if BAD_IF_DECREASING.contains(&metric_name) {
        change < 0.0
    } else if BAD_IF_INCREASING.contains(&metric_name) {
        change > 0.0
    } else {
        false
    }
}

/// Calculates the weighted 0-10 risk score.
///
/// 0 = very safe, 10 = very risky. `metrics` maps metric names to their
/// extracted annual series (most recent first).
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn risk_score(metrics: &BTreeMap<String, Vec<MetricPoint>>) -> RiskReport {
    let mut scores: BTreeMap<String, f64> = BTreeMap::new();
    let mut explanations = Vec::new();

    let latest = |name: &str| -> Option<f64> {
        metrics.get(name).and_then(|m| m.first()).map(|p| p.value)
    };

    // 1. Debt to equity
    if let (Some(debt), Some(equity)) = (latest("total_debt"), latest("stockholders_equity")) {
        if equity > 0.0 {
            let dte = debt / equity;
            scores.insert("debt_to_equity".to_string(), (dte * 2.0).min(10.0));
            if dte > 3.0 {
                explanations.push(format!("High debt-to-equity ratio of {dte:.1}x"));
            } else if dte > 1.5 {
                explanations.push(format!("Moderate debt-to-equity ratio of {dte:.1}x"));
            }
        }
    }

    // 2. Cash burn
    if let (Some(cash), Some(ocf)) = (latest("cash"), latest("operating_cash_flow")) {
        if ocf < 0.0 {
            let years_of_cash = if ocf.abs() > 0.0 { cash / ocf.abs() } else { 10.0 };
            scores.insert(
                "cash_burn".to_string(),
                (10.0 - years_of_cash * 2.0).max(0.0),
            );
            explanations.push(format!(
                "Negative operating cash flow - {years_of_cash:.1} years of cash remaining"
            ));
        } else {
            scores.insert("cash_burn".to_string(), 0.0);
        }
    }

    // 3. Revenue growth over the recent window
    if let Some(revenue) = metrics.get("revenue") {
        if revenue.len() >= 2 {
            let window = &revenue[..revenue.len().min(3)];
            let changes = yoy_changes(window);
            if !changes.is_empty() {
                #[allow(clippy::cast_precision_loss)]
                let avg_growth =
                    changes.iter().map(|c| c.pct_change).sum::<f64>() / changes.len() as f64;
                if avg_growth < -10.0 {
                    scores.insert(
                        "revenue_growth".to_string(),
                        (avg_growth.abs() / 5.0).min(10.0),
                    );
                    explanations.push(format!(
                        "Revenue declining at {:.1}% average per year",
                        avg_growth.abs()
                    ));
                } else if avg_growth < 0.0 {
                    scores.insert("revenue_growth".to_string(), 3.0);
                    explanations.push(format!(
                        "Slight revenue decline of {:.1}% average",
                        avg_growth.abs()
                    ));
                } else {
                    scores.insert(
                        "revenue_growth".to_string(),
                        (5.0 - avg_growth / 10.0).max(0.0),
                    );
                }
            }
        }
    }

    // 4. Profit margin
    if let (Some(revenue), Some(net_income)) = (latest("revenue"), latest("net_income")) {
        if revenue != 0.0 {
            let margin = net_income / revenue * 100.0;
            if margin < 0.0 {
                scores.insert("profit_margin".to_string(), 8.0);
                explanations.push(format!("Negative profit margin of {margin:.1}%"));
            } else if margin < 5.0 {
                scores.insert("profit_margin".to_string(), 5.0);
                explanations.push(format!("Thin profit margin of {margin:.1}%"));
            } else if margin > 20.0 {
                scores.insert("profit_margin".to_string(), 0.0);
            } else {
                scores.insert("profit_margin".to_string(), (5.0 - margin / 5.0).max(0.0));
            }
        }
    }

    // 5. Cash coverage of debt
    if let (Some(debt), Some(cash)) = (latest("total_debt"), latest("cash")) {
        if debt > 0.0 {
            let coverage = cash / debt;
            if coverage < 0.1 {
                scores.insert("cash_coverage".to_string(), 7.0);
                explanations.push(format!(
                    "Low cash coverage - only {:.1}% of debt covered by cash",
                    coverage * 100.0
                ));
            } else if coverage < 0.3 {
                scores.insert("cash_coverage".to_string(), 4.0);
            } else {
                scores.insert("cash_coverage".to_string(), (3.0 - coverage * 2.0).max(0.0));
            }
        }
    }

    if scores.is_empty() {
        return RiskReport {
            score: None,
            label: "Insufficient Data",
            breakdown: BTreeMap::new(),
            explanations: Vec::new(),
        };
    }

    let weight = |name: &str| -> f64 {
        RISK_WEIGHTS
            .iter()
            .find(|(n, _)| *n == name)
            .map_or(DEFAULT_RISK_WEIGHT, |(_, w)| *w)
    };
    let total_weight: f64 = scores.keys().map(|k| weight(k)).sum();
    let weighted: f64 = scores.iter().map(|(k, v)| v * weight(k)).sum();
    let final_score = round1((weighted / total_weight).clamp(0.0, 10.0));

    let label = if final_score <= 2.0 {
        "Low Risk"
    } else if final_score <= 4.0 {
        "Moderate Risk"
    } else if final_score <= 6.0 {
        "Elevated Risk"
    } else if final_score <= 8.0 {
        "High Risk"
    } else {
        "Very High Risk"
    };

    RiskReport {
        score: Some(final_score),
        label,
        breakdown: scores
            .into_iter()
            .map(|(k, v)| (k, round1(v)))
            .collect(),
        explanations,
    }
}

/// Title-cases a snake_case metric name for messages.
fn metric_title(metric_name: &str) -> String {
    metric_name
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().collect::<String>() + chars.as_str()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Rounds to one decimal place.
fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
