use crate::error::{IngestError, StoreError};
use crate::record::{History, RunEntry};
use crate::store::HistoryRepository;

/// What `merge_run` did with the incoming entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Appended to the tail of its group. `out_of_order` flags an entry whose
    /// `date` precedes the previous tail; legitimate for backfills, so it is
    /// a warning condition, not a failure.
    Appended { out_of_order: bool },
    /// An entry with the same `(tool, commit.id)` key is already present.
    /// The history is left unmodified: a CI re-run of the same commit must
    /// not inflate the series with duplicate points.
    Duplicate,
}

/// Summary of one completed ingestion, for the CI caller's log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub outcome: MergeOutcome,
    pub group: String,
    /// Entries in the target group after the merge.
    pub nr_entries: usize,
    pub last_update: i64,
    /// Load-merge-save cycles taken, >1 when a concurrent writer forced a retry.
    pub attempts: usize,
}

/// Fold one run into the history. Resolves (or creates) the group named by
/// `entry.tool`, drops exact `(tool, commit.id)` duplicates, otherwise
/// appends and raises `last_update` monotonically. Entries are never
/// reordered or mutated in place.
pub fn merge_run(history: &mut History, entry: RunEntry) -> MergeOutcome {
    let group = history.entries.entry(entry.tool.clone()).or_default();
    if group.iter().any(|prior| prior.commit.id == entry.commit.id) {
        return MergeOutcome::Duplicate;
    }

    let out_of_order = group.last().map_or(false, |tail| entry.date < tail.date);
    if history.last_update < entry.date {
        history.last_update = entry.date;
    }
    group.push(entry);
    MergeOutcome::Appended { out_of_order }
}

/// Run the full load-merge-save cycle against the store, retrying with a
/// fresh load when a concurrent ingestion lands first. After `max_retries`
/// rejected saves the conflict is surfaced as fatal. `repo_url` is stamped
/// onto a history that does not carry one yet.
///
/// A duplicate run short-circuits before `save`, so the persisted artifact is
/// untouched byte-for-byte.
#[tracing::instrument(
    level = "info",
    skip(store, entry),
    fields(tool = %entry.tool, commit = %entry.commit.id)
)]
pub fn ingest(
    store: &impl HistoryRepository, entry: RunEntry, repo_url: &str, max_retries: usize,
) -> Result<IngestReport, IngestError> {
    let mut attempts = 0;
    loop {
        attempts += 1;
        let (mut history, version) = store.load()?;
        if history.repo_url.is_empty() {
            history.repo_url = repo_url.to_string();
        }

        let group = entry.tool.clone();
        let outcome = merge_run(&mut history, entry.clone());
        match outcome {
            MergeOutcome::Duplicate => {
                tracing::info!(%group, "run already recorded for commit; ingestion is a no-op");
                return Ok(IngestReport {
                    outcome,
                    nr_entries: history.entries.get(&group).map_or(0, Vec::len),
                    last_update: history.last_update,
                    group,
                    attempts,
                });
            }
            MergeOutcome::Appended { out_of_order } => {
                if out_of_order {
                    tracing::warn!(
                        %group,
                        date = entry.date,
                        "out-of-order ingestion: entry predates group tail; appended without reordering"
                    );
                }

                match store.save(&history, &version) {
                    Ok(_) => {
                        return Ok(IngestReport {
                            outcome,
                            nr_entries: history.entries.get(&group).map_or(0, Vec::len),
                            last_update: history.last_update,
                            group,
                            attempts,
                        });
                    }
                    Err(StoreError::ConcurrentModification) if attempts <= max_retries => {
                        tracing::warn!(attempts, "history changed since load; retrying with a fresh load");
                    }
                    Err(err) => return Err(err.into()),
                }
            }
        }
    }
}
