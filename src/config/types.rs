use std::time::Duration;

use serde::Deserialize;

use crate::args::OutputFormat;
use crate::args::parsers::parse_duration;
use crate::error::ValidationError;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub url: Option<String>,
    pub interval_ms: Option<u64>,
    pub lifetime_secs: Option<u64>,
    pub clients: Option<usize>,
    pub slow_start: Option<bool>,
    pub disable_compression: Option<bool>,
    pub report_interval: Option<DurationValue>,
    pub queue_capacity: Option<usize>,
    pub timeout: Option<DurationValue>,
    pub output_format: Option<OutputFormat>,
    pub output: Option<String>,
}

/// A duration given either as whole seconds or as text with a unit (`"500ms"`).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DurationValue {
    Seconds(u64),
    Text(String),
}

impl DurationValue {
    pub(crate) fn to_duration(&self) -> Result<Duration, ValidationError> {
        match self {
            DurationValue::Seconds(0) => Err(ValidationError::DurationZero),
            DurationValue::Seconds(secs) => Ok(Duration::from_secs(*secs)),
            DurationValue::Text(text) => parse_duration(text),
        }
    }
}
