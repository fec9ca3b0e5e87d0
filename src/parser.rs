use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;

use crate::error::ParseError;
use crate::record::{CommitInfo, Measurement, RunEntry};

/// Harness output schemas the parser understands. The payload itself is
/// opaque to the rest of the crate; only this module knows the shapes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum HarnessFormat {
    /// JMH `-rf json` report: an array of benchmark objects carrying a
    /// `primaryMetric` with score and unit.
    Jmh,
    /// Generic measurement list: `[{name, value, unit, extra?}, ...]`.
    Custom,
}

impl HarnessFormat {
    /// Group label used when the caller supplies none.
    pub const fn default_tool(&self) -> &'static str {
        match self {
            Self::Jmh => "jmh",
            Self::Custom => "custom",
        }
    }

    /// Probe an already-parsed payload for a known schema.
    fn detect(payload: &Value) -> Option<Self> {
        let items = payload.as_array()?;
        let probe = items.first()?;
        if probe.get("benchmark").is_some() && probe.get("primaryMetric").is_some() {
            Some(Self::Jmh)
        } else if probe.get("name").is_some() && probe.get("value").is_some() {
            Some(Self::Custom)
        } else {
            None
        }
    }
}

impl fmt::Display for HarnessFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.default_tool())
    }
}

impl FromStr for HarnessFormat {
    type Err = ParseError;

    fn from_str(rep: &str) -> Result<Self, Self::Err> {
        match rep.to_lowercase().as_str() {
            "jmh" => Ok(Self::Jmh),
            "custom" => Ok(Self::Custom),
            _ => Err(ParseError::UnsupportedFormat),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JmhBenchmark {
    benchmark: String,
    #[serde(default)]
    threads: u32,
    #[serde(default)]
    forks: u32,
    #[serde(default)]
    measurement_iterations: u32,
    primary_metric: JmhPrimaryMetric,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JmhPrimaryMetric {
    score: f64,
    score_unit: String,
}

#[derive(Debug, Deserialize)]
struct CustomMeasurement {
    name: String,
    value: f64,
    #[serde(default)]
    unit: String,
    #[serde(default)]
    extra: String,
}

/// Translate one harness payload plus the triggering commit's metadata into a
/// `RunEntry`, auto-detecting the payload schema. `date` is set to the
/// invocation instant; `tool` falls back to the detected format's label.
#[tracing::instrument(level = "debug", skip(payload, commit))]
pub fn parse_run(payload: &str, commit: CommitInfo, tool: Option<&str>) -> Result<RunEntry, ParseError> {
    let value: Value = serde_json::from_str(payload).map_err(|_| ParseError::UnsupportedFormat)?;
    if value.as_array().map_or(false, Vec::is_empty) {
        return Err(ParseError::EmptyRun);
    }

    let format = HarnessFormat::detect(&value).ok_or(ParseError::UnsupportedFormat)?;
    parse_value(format, value, commit, tool)
}

/// Like [`parse_run`] but with the schema fixed by the caller instead of
/// detected from the payload.
#[tracing::instrument(level = "debug", skip(payload, commit))]
pub fn parse_run_as(
    format: HarnessFormat, payload: &str, commit: CommitInfo, tool: Option<&str>,
) -> Result<RunEntry, ParseError> {
    let value: Value = serde_json::from_str(payload).map_err(|_| ParseError::UnsupportedFormat)?;
    parse_value(format, value, commit, tool)
}

fn parse_value(
    format: HarnessFormat, payload: Value, commit: CommitInfo, tool: Option<&str>,
) -> Result<RunEntry, ParseError> {
    let benches = match format {
        HarnessFormat::Jmh => extract_jmh(payload)?,
        HarnessFormat::Custom => extract_custom(payload)?,
    };

    if benches.is_empty() {
        return Err(ParseError::EmptyRun);
    }

    let tool = tool.unwrap_or_else(|| format.default_tool());
    let date = Utc::now().timestamp_millis();
    tracing::debug!(%format, tool, nr_measurements = benches.len(), "parsed harness run");
    Ok(RunEntry::new(commit, date, tool, benches)?)
}

fn extract_jmh(payload: Value) -> Result<Vec<Measurement>, ParseError> {
    let report: Vec<JmhBenchmark> =
        serde_json::from_value(payload).map_err(|_| ParseError::UnsupportedFormat)?;

    report
        .into_iter()
        .map(|b| {
            let extra = format!(
                "iterations: {}\nforks: {}\nthreads: {}",
                b.measurement_iterations, b.forks, b.threads
            );
            Measurement::new(b.benchmark, b.primary_metric.score, b.primary_metric.score_unit, extra)
                .map_err(ParseError::from)
        })
        .collect()
}

fn extract_custom(payload: Value) -> Result<Vec<Measurement>, ParseError> {
    let report: Vec<CustomMeasurement> =
        serde_json::from_value(payload).map_err(|_| ParseError::UnsupportedFormat)?;

    report
        .into_iter()
        .map(|m| Measurement::new(m.name, m.value, m.unit, m.extra).map_err(ParseError::from))
        .collect()
}
