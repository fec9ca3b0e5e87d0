use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RecordError;

/// Identity of a commit participant as the forge reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitUser {
    pub name: String,
    pub username: String,
}

impl GitUser {
    pub fn new(name: impl Into<String>, username: impl Into<String>) -> Self {
        Self { name: name.into(), username: username.into() }
    }
}

/// Identity of the source-control revision under test. Immutable once
/// recorded; `timestamp` is the revision creation time, not ingestion time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub author: GitUser,
    pub committer: GitUser,
    pub id: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub url: String,
}

impl CommitInfo {
    pub fn new(
        author: GitUser, committer: GitUser, id: impl Into<String>, message: impl Into<String>,
        timestamp: DateTime<Utc>, url: impl Into<String>,
    ) -> Result<Self, RecordError> {
        let id = id.into();
        if id.is_empty() {
            return Err(RecordError::EmptyCommitId);
        }

        Ok(Self {
            author,
            committer,
            id,
            message: message.into(),
            timestamp,
            url: url.into(),
        })
    }
}

/// One named metric from a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub name: String,
    pub value: f64,
    pub unit: String,
    /// Free-form auxiliary text (e.g., harness iteration/fork/thread counts).
    /// Opaque to the core; structured parsing belongs to harness adapters.
    #[serde(default)]
    pub extra: String,
}

impl Measurement {
    pub fn new(
        name: impl Into<String>, value: f64, unit: impl Into<String>, extra: impl Into<String>,
    ) -> Result<Self, RecordError> {
        let name = name.into();
        if name.is_empty() {
            return Err(RecordError::EmptyMeasurementName);
        }
        if !value.is_finite() {
            return Err(RecordError::NonFiniteValue { name, value });
        }

        Ok(Self { name, value, unit: unit.into(), extra: extra.into() })
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {} {}", self.name, self.value, self.unit)
    }
}

/// One benchmark run: the commit under test, the ingestion instant (epoch
/// milliseconds, distinct from the commit timestamp), the grouping label and
/// the measurements in harness emission order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEntry {
    pub commit: CommitInfo,
    pub date: i64,
    pub tool: String,
    pub benches: Vec<Measurement>,
}

impl RunEntry {
    pub fn new(
        commit: CommitInfo, date: i64, tool: impl Into<String>, benches: Vec<Measurement>,
    ) -> Result<Self, RecordError> {
        if date < 0 {
            return Err(RecordError::InvalidEpoch { field: "date", value: date });
        }
        let tool = tool.into();
        if tool.is_empty() {
            return Err(RecordError::EmptyTool);
        }

        Ok(Self { commit, date, tool, benches })
    }
}

/// The full persisted record: last merge instant, repository url and one
/// append-ordered series of runs per group label.
///
/// Group keys serialize in sorted order so an unchanged history re-serializes
/// byte-for-byte; the chart front end looks groups up by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct History {
    pub last_update: i64,
    pub repo_url: String,
    pub entries: BTreeMap<String, Vec<RunEntry>>,
}

impl History {
    /// An empty history for a repository seen for the first time.
    pub fn empty(repo_url: impl Into<String>) -> Self {
        Self { last_update: 0, repo_url: repo_url.into(), entries: BTreeMap::default() }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total run entries across all groups.
    pub fn nr_entries(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
}
