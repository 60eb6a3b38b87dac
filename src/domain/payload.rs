use super::credential::Credential;
use serde::{Deserialize, Serialize};

/// Fractional digits of a gauge value on the wire.
pub const VALUE_PRECISION: usize = 5;

/// Display hints attached to a gauge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attributes {
    pub display_min: i64,
    pub display_units_long: String,
}

/// One gauge ready for the metrics API.
///
/// The credential travels with the payload for batching but is never
/// serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    pub name: String,
    #[serde(rename = "measure_time")]
    pub time: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub value: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source: String,
    #[serde(skip)]
    pub user: String,
    #[serde(skip)]
    pub pass: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Attributes>,
}

impl Payload {
    pub fn credential(&self) -> Credential {
        Credential::new(self.user.clone(), self.pass.clone())
    }
}

/// Gauge values go on the wire as decimal strings with five fractional digits.
pub fn format_value(value: f64) -> String {
    format!("{:.*}", VALUE_PRECISION, value)
}

pub fn format_count(count: usize) -> String {
    count.to_string()
}
