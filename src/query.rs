//! Read-only projections of the history for the visualization consumer.
//! Nothing here can mutate the persisted artifact.

use std::io::Write;

use crate::error::StoreError;
use crate::record::{History, RunEntry};

impl History {
    /// The run series for one group. An unknown name yields an empty slice,
    /// not an error: an unplotted or brand-new benchmark group is a normal
    /// state.
    pub fn group(&self, name: &str) -> &[RunEntry] {
        self.entries.get(name).map_or(&[], Vec::as_slice)
    }

    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

/// Write the full history as pretty JSON.
pub fn export_history(history: &History, mut out: impl Write) -> Result<(), StoreError> {
    serde_json::to_writer_pretty(&mut out, history).map_err(StoreError::SerializationError)?;
    writeln!(out)?;
    Ok(())
}

/// Write one group's series as pretty JSON. An unknown group exports as `[]`.
pub fn export_group(history: &History, name: &str, mut out: impl Write) -> Result<(), StoreError> {
    serde_json::to_writer_pretty(&mut out, history.group(name)).map_err(StoreError::SerializationError)?;
    writeln!(out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use claim::*;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::record::{CommitInfo, GitUser};

    fn history() -> History {
        let user = GitUser::new("otis", "otis");
        let commit = assert_ok!(CommitInfo::new(
            user.clone(),
            user,
            "abc",
            "message",
            chrono::Utc::now(),
            "https://example.com",
        ));
        let entry = assert_ok!(RunEntry::new(commit, 17, "Benchmark", Vec::default()));

        let mut history = History::empty("https://github.com/example/repo");
        history.last_update = 17;
        history.entries.insert("Benchmark".to_string(), vec![entry]);
        history
    }

    #[test]
    fn test_group_lookup() {
        let history = history();
        assert_eq!(history.group("Benchmark").len(), 1);
        assert_eq!(history.group("Benchmark")[0].commit.id, "abc");
    }

    #[test]
    fn test_unknown_group_is_empty_not_error() {
        let history = history();
        assert!(history.group("nope").is_empty());
    }

    #[test]
    fn test_group_names() {
        let history = history();
        let names: Vec<_> = history.group_names().collect();
        assert_eq!(names, vec!["Benchmark"]);
    }

    #[test]
    fn test_export_group_round_trips() {
        let history = history();
        let mut buf = Vec::new();
        assert_ok!(export_group(&history, "Benchmark", &mut buf));
        let actual: Vec<RunEntry> = assert_ok!(serde_json::from_slice(&buf));
        assert_eq!(actual, history.group("Benchmark"));
    }

    #[test]
    fn test_export_unknown_group_is_empty_list() {
        let mut buf = Vec::new();
        assert_ok!(export_group(&history(), "nope", &mut buf));
        assert_eq!(String::from_utf8(buf).unwrap().trim(), "[]");
    }

    #[test]
    fn test_export_history_matches_model() {
        let history = history();
        let mut buf = Vec::new();
        assert_ok!(export_history(&history, &mut buf));
        let actual: History = assert_ok!(serde_json::from_slice(&buf));
        assert_eq!(actual, history);
    }
}
