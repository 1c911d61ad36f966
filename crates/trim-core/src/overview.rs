use std::fmt;

use serde::de::Deserializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Currency used for totals when the payload does not name one, so the UI
/// never shows an unlabeled number.
pub const FALLBACK_CURRENCY: &str = "USD";

/// Resource counts for the current scope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Summary {
    #[serde(default)]
    pub total_resources: u64,
    #[serde(default)]
    pub waste_count: u64,
    #[serde(default)]
    pub with_metrics: u64,
    #[serde(default)]
    pub over_provisioned: u64,
    #[serde(default)]
    pub under_provisioned: u64,
}

/// Card values arrive either as numbers or as preformatted strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CardValue {
    Number(f64),
    Text(String),
}

impl fmt::Display for CardValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CardValue::Number(value) => write!(f, "{value}"),
            CardValue::Text(value) => write!(f, "{value}"),
        }
    }
}

/// One stat card in the dashboard's top row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryCard {
    pub id: String,
    pub label: String,
    pub value: CardValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sublabel: Option<String>,
}

/// Monetary estimate attached to a highlight or the billing block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Money {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub value: f64,
    #[serde(default = "fallback_currency")]
    pub currency: String,
}

fn fallback_currency() -> String {
    FALLBACK_CURRENCY.to_string()
}

/// One flagged waste/cost finding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Highlight {
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub resource_type: String,
    pub id: String,
    pub name: String,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommended_action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_savings: Option<Money>,
}

/// One row of the billing cost breakdown.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceCost {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_opt_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub cost: Option<f64>,
}

impl ServiceCost {
    /// Rows carrying neither a service name nor a cost are dropped from both
    /// display and totals.
    pub fn is_meaningful(&self) -> bool {
        self.service.as_deref().is_some_and(|name| !name.is_empty()) || self.cost.is_some()
    }
}

/// Billing block: the fields the dashboard understands, plus whatever else the
/// provider attached. Read the known fields through the accessors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Billing {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_account_display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub potential_savings: Option<Money>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub top_services: Vec<ServiceCost>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl Billing {
    pub fn account_name(&self) -> Option<&str> {
        self.billing_account_display_name
            .as_deref()
            .filter(|name| !name.is_empty())
    }

    /// Currency code for totals; [`FALLBACK_CURRENCY`] when absent.
    pub fn currency(&self) -> &str {
        self.currency_code
            .as_deref()
            .filter(|code| !code.is_empty())
            .unwrap_or(FALLBACK_CURRENCY)
    }

    pub fn potential_savings(&self) -> Option<&Money> {
        self.potential_savings.as_ref()
    }

    /// Cost rows worth showing, in payload order.
    pub fn services(&self) -> impl Iterator<Item = &ServiceCost> {
        self.top_services.iter().filter(|row| row.is_meaningful())
    }
}

/// One fetched, immutable view of aggregated cost/waste data for a given
/// scope and mode. Everything beyond `summary` and `summary_cards` is
/// optional and degrades to "not shown".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverviewSnapshot {
    pub summary: Summary,
    pub summary_cards: Vec<SummaryCard>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub highlights: Vec<Highlight>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub compute: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metrics: Vec<Value>,
    #[serde(default)]
    pub billing: Billing,
}

/// Totals recomputed from a snapshot on every use. Never cached on their own,
/// so they cannot drift from the data they were derived from.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedTotals {
    pub highlight_savings: f64,
    pub service_cost: f64,
    pub currency: String,
    pub needs_attention: bool,
}

impl DerivedTotals {
    pub fn from_snapshot(snapshot: &OverviewSnapshot) -> Self {
        let highlight_savings = snapshot
            .highlights
            .iter()
            .map(|highlight| {
                highlight
                    .estimated_savings
                    .as_ref()
                    .map(|savings| savings.value.max(0.0))
                    .unwrap_or(0.0)
            })
            .sum();
        let service_cost = snapshot
            .billing
            .services()
            .map(|row| row.cost.unwrap_or(0.0))
            .sum();

        Self {
            highlight_savings,
            service_cost,
            currency: snapshot.billing.currency().to_string(),
            needs_attention: snapshot.summary.waste_count > 0,
        }
    }

    /// Savings total as the UI renders it, to one decimal place.
    pub fn highlight_savings_rounded(&self) -> f64 {
        round_display(self.highlight_savings)
    }

    pub fn service_cost_rounded(&self) -> f64 {
        round_display(self.service_cost)
    }
}

fn round_display(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_number(&value).unwrap_or(0.0))
}

fn lenient_opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_number(&value))
}

/// Accepts JSON numbers and numeric strings; anything else reads as absent.
fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}
