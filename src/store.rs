use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::Hasher;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use tempfile::NamedTempFile;

use crate::error::StoreError;
use crate::record::History;

/// Header the chart front end expects when the artifact is served as a
/// script (`data.js`). Artifacts with any other extension are plain JSON.
const DATA_JS_PREFIX: &str = "window.BENCHMARK_DATA = ";

static DATA_JS_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*window\.BENCHMARK_DATA\s*=\s*").expect("failed to create data.js header regex")
});

/// Fingerprint of the artifact captured at `load` time, checked again at
/// `save`. `absent` marks a load that found no artifact yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version(Option<u64>);

impl Version {
    pub const fn absent() -> Self {
        Self(None)
    }

    fn of(raw: &[u8]) -> Self {
        let mut hasher = DefaultHasher::new();
        hasher.write(raw);
        Self(Some(hasher.finish()))
    }

    pub const fn is_absent(&self) -> bool {
        self.0.is_none()
    }
}

/// Load/save boundary of the history aggregate. The merge engine's ingest
/// loop talks to this seam rather than a concrete store.
pub trait HistoryRepository {
    /// Current history plus its version; an absent artifact yields an empty
    /// history and the absent version.
    fn load(&self) -> Result<(History, Version), StoreError>;

    /// Persist the history, rejecting a write whose `expected` version has
    /// gone stale.
    fn save(&self, history: &History, expected: &Version) -> Result<Version, StoreError>;
}

/// Durable read-modify-write access to the history aggregate, one artifact
/// per repository. `save` replaces the whole artifact atomically and rejects
/// writes whose loaded version has gone stale.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn wraps_data_js(&self) -> bool {
        self.path.extension().map_or(false, |ext| ext == "js")
    }

    /// Sidecar whose OS lock serializes writers of this artifact.
    fn lock_path(&self) -> PathBuf {
        let mut rep = self.path.as_os_str().to_owned();
        rep.push(".lock");
        PathBuf::from(rep)
    }

    fn render(&self, history: &History) -> Result<String, StoreError> {
        let body = serde_json::to_string_pretty(history).map_err(StoreError::SerializationError)?;
        let rendered = if self.wraps_data_js() {
            format!("{}{}\n", DATA_JS_PREFIX, body)
        } else {
            format!("{}\n", body)
        };
        Ok(rendered)
    }

    fn strip_header(text: &str) -> &str {
        let body = match DATA_JS_HEADER.find(text) {
            Some(header) => &text[header.end()..],
            None => text,
        };
        body.trim_end().trim_end_matches(';').trim_end()
    }
}

impl HistoryRepository for HistoryStore {
    /// Current history plus its version, or an empty history when no artifact
    /// exists yet. First-run initialization never fails.
    #[tracing::instrument(level = "debug", skip(self), fields(path = %self.path.display()))]
    fn load(&self) -> Result<(History, Version), StoreError> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "no history artifact yet; starting empty");
                return Ok((History::default(), Version::absent()));
            }
            Err(err) => return Err(err.into()),
        };

        let version = Version::of(&raw);
        let text = std::str::from_utf8(&raw)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        let body = Self::strip_header(text);
        let history: History = serde_json::from_str(body).map_err(StoreError::MalformedArtifact)?;
        tracing::debug!(nr_groups = history.entries.len(), nr_entries = history.nr_entries(), "loaded history");
        Ok((history, version))
    }

    /// Persist the history atomically. The whole artifact is replaced via a
    /// temp file and rename in the target directory; a reader never observes
    /// a partial write. Fails with `ConcurrentModification` when the artifact
    /// on disk no longer matches `expected`, leaving it untouched. The version
    /// check and the rename happen under an exclusive lock on a sidecar file,
    /// so concurrent writers cannot both pass the check.
    #[tracing::instrument(level = "debug", skip(self, history), fields(path = %self.path.display()))]
    fn save(&self, history: &History, expected: &Version) -> Result<Version, StoreError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let guard = fs::OpenOptions::new().create(true).write(true).open(self.lock_path())?;
        guard.lock()?;
        // lock released when guard drops, on every exit path

        let current = match fs::read(&self.path) {
            Ok(raw) => Version::of(&raw),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Version::absent(),
            Err(err) => return Err(err.into()),
        };
        if current != *expected {
            return Err(StoreError::ConcurrentModification);
        }

        let rendered = self.render(history)?;
        let mut staged = NamedTempFile::new_in(dir)?;
        staged.write_all(rendered.as_bytes())?;
        staged.as_file().sync_all()?;
        staged.persist(&self.path)?;

        tracing::info!(nr_groups = history.entries.len(), nr_entries = history.nr_entries(), "persisted history");
        Ok(Version::of(rendered.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use claim::*;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::record::{CommitInfo, GitUser, RunEntry};

    fn entry(id: &str, date: i64) -> RunEntry {
        let user = GitUser::new("otis", "otis");
        let commit = assert_ok!(CommitInfo::new(
            user.clone(),
            user,
            id,
            "message",
            chrono::Utc::now(),
            "https://example.com",
        ));
        assert_ok!(RunEntry::new(commit, date, "Benchmark", Vec::default()))
    }

    fn populated() -> History {
        let mut history = History::empty("https://github.com/example/repo");
        history.last_update = 17;
        history.entries.insert("Benchmark".to_string(), vec![entry("abc", 17)]);
        history
    }

    #[test]
    fn test_load_missing_artifact_yields_empty_history() {
        let dir = assert_ok!(tempfile::tempdir());
        let store = HistoryStore::new(dir.path().join("data.js"));
        let (history, version) = assert_ok!(store.load());
        assert_eq!(history, History::default());
        assert_eq!(history.last_update, 0);
        assert!(version.is_absent());
    }

    #[test]
    fn test_save_then_load_round_trips_json() {
        let dir = assert_ok!(tempfile::tempdir());
        let store = HistoryStore::new(dir.path().join("history.json"));
        let history = populated();

        let (_, version) = assert_ok!(store.load());
        assert_ok!(store.save(&history, &version));

        let (actual, _) = assert_ok!(store.load());
        assert_eq!(actual, history);

        let raw = assert_ok!(fs::read_to_string(store.path()));
        assert!(!raw.starts_with(DATA_JS_PREFIX));
    }

    #[test]
    fn test_data_js_artifact_carries_window_header() {
        let dir = assert_ok!(tempfile::tempdir());
        let store = HistoryStore::new(dir.path().join("data.js"));
        let history = populated();

        assert_ok!(store.save(&history, &Version::absent()));
        let raw = assert_ok!(fs::read_to_string(store.path()));
        assert!(raw.starts_with(DATA_JS_PREFIX));

        let (actual, _) = assert_ok!(store.load());
        assert_eq!(actual, history);
    }

    #[test]
    fn test_load_accepts_trailing_semicolon() {
        let dir = assert_ok!(tempfile::tempdir());
        let path = dir.path().join("data.js");
        let expected = populated();
        let body = assert_ok!(serde_json::to_string_pretty(&expected));
        assert_ok!(fs::write(&path, format!("window.BENCHMARK_DATA = {};\n", body)));

        let (actual, _) = assert_ok!(HistoryStore::new(path).load());
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_stale_save_is_rejected_without_writing() {
        let dir = assert_ok!(tempfile::tempdir());
        let store = HistoryStore::new(dir.path().join("data.js"));

        let (_, stale) = assert_ok!(store.load());
        assert_ok!(store.save(&populated(), &stale));
        let on_disk = assert_ok!(fs::read(store.path()));

        let mut other = populated();
        other.entries.insert("Other".to_string(), vec![entry("def", 23)]);
        assert_matches!(store.save(&other, &stale), Err(StoreError::ConcurrentModification));
        assert_eq!(assert_ok!(fs::read(store.path())), on_disk);
    }

    #[test]
    fn test_save_takes_sidecar_lock() {
        let dir = assert_ok!(tempfile::tempdir());
        let store = HistoryStore::new(dir.path().join("data.js"));

        let version = assert_ok!(store.save(&populated(), &Version::absent()));
        assert!(dir.path().join("data.js.lock").exists());

        // a sidecar left behind by an earlier run does not wedge the next save
        assert_ok!(store.save(&populated(), &version));
    }

    #[test]
    fn test_corrupt_artifact_is_reported() {
        let dir = assert_ok!(tempfile::tempdir());
        let path = dir.path().join("data.js");
        assert_ok!(fs::write(&path, "window.BENCHMARK_DATA = {nope"));
        assert_matches!(HistoryStore::new(path).load(), Err(StoreError::MalformedArtifact(_)));
    }
}
