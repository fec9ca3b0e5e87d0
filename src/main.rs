use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};

use benchtrail::error::RecordError;
use benchtrail::parser::{self, HarnessFormat};
use benchtrail::query;
use benchtrail::settings::{self, Settings};
use benchtrail::telemetry::{get_subscriber, init_subscriber};
use benchtrail::{ingest, CommitInfo, GitUser, HistoryRepository, HistoryStore, MergeOutcome};

#[derive(Parser, Debug)]
#[command(name = "benchtrail", version, about = "Benchmark trend history ingestion")]
struct Cli {
    /// override configuration file to load.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// override the history artifact path from configuration.
    #[arg(long)]
    history: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fold one harness run into the history artifact.
    Ingest {
        /// Harness output payload file; `-` reads stdin.
        #[arg(short, long, default_value = "-")]
        input: String,

        /// Payload schema (jmh, custom); detected from the payload when omitted.
        #[arg(short, long)]
        format: Option<HarnessFormat>,

        /// Group label; falls back to configuration, then the detected format.
        #[arg(short, long)]
        tool: Option<String>,

        #[command(flatten)]
        commit: CommitArgs,
    },

    /// Print the history, or one group's run series, as JSON.
    Show {
        /// Group to project; omit for the full history.
        group: Option<String>,
    },
}

/// Commit metadata is supplied by the CI caller, not derived from the payload.
#[derive(Args, Debug)]
struct CommitArgs {
    /// Revision identifier under test.
    #[arg(long)]
    commit_id: String,

    #[arg(long, default_value = "")]
    commit_message: String,

    /// Revision creation time, RFC 3339.
    #[arg(long)]
    commit_timestamp: DateTime<Utc>,

    /// Link to the revision or the CI job that produced the run.
    #[arg(long, default_value = "")]
    commit_url: String,

    #[arg(long)]
    author_name: String,

    /// Defaults to the author name.
    #[arg(long)]
    author_username: Option<String>,

    /// Defaults to the author.
    #[arg(long)]
    committer_name: Option<String>,

    #[arg(long)]
    committer_username: Option<String>,
}

impl TryFrom<CommitArgs> for CommitInfo {
    type Error = RecordError;

    fn try_from(args: CommitArgs) -> Result<Self, Self::Error> {
        let author_username = args.author_username.unwrap_or_else(|| args.author_name.clone());
        let author = GitUser::new(args.author_name, author_username);
        let committer = match args.committer_name {
            Some(name) => {
                let username = args.committer_username.unwrap_or_else(|| name.clone());
                GitUser::new(name, username)
            }
            None => author.clone(),
        };

        CommitInfo::new(
            author,
            committer,
            args.commit_id,
            args.commit_message,
            args.commit_timestamp,
            args.commit_url,
        )
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let subscriber = get_subscriber("benchtrail", "info");
    init_subscriber(subscriber);

    let main_span = tracing::info_span!("main");
    let _main_span_guard = main_span.enter();

    let mut settings: Settings = settings::load_settings(cli.config.as_deref())?;
    if let Some(history) = cli.history {
        settings.history_path = history;
    }
    let store = HistoryStore::new(&settings.history_path);

    match cli.command {
        Commands::Ingest { input, format, tool, commit } => {
            run_ingest(&store, &settings, &input, format, tool, commit)
        }
        Commands::Show { group } => run_show(&store, group.as_deref()),
    }
}

fn run_ingest(
    store: &HistoryStore, settings: &Settings, input: &str, format: Option<HarnessFormat>,
    tool: Option<String>, commit: CommitArgs,
) -> anyhow::Result<()> {
    let payload = read_payload(input)?;
    let commit = CommitInfo::try_from(commit)?;
    let tool = tool.or_else(|| settings.default_tool.clone());

    let entry = match format {
        Some(format) => parser::parse_run_as(format, &payload, commit, tool.as_deref())?,
        None => parser::parse_run(&payload, commit, tool.as_deref())?,
    };

    let report = ingest(store, entry, &settings.repo_url, settings.max_retries)?;
    match report.outcome {
        MergeOutcome::Duplicate => {
            println!("run already recorded under {:?}; history unchanged", report.group);
        }
        MergeOutcome::Appended { .. } => {
            println!(
                "recorded run under {:?} ({} entries) in {}",
                report.group,
                report.nr_entries,
                store.path().display()
            );
        }
    }
    Ok(())
}

fn run_show(store: &HistoryStore, group: Option<&str>) -> anyhow::Result<()> {
    let (history, _) = store.load()?;
    let stdout = io::stdout();
    match group {
        Some(name) => query::export_group(&history, name, stdout.lock())?,
        None => query::export_history(&history, stdout.lock())?,
    }
    Ok(())
}

fn read_payload(input: &str) -> anyhow::Result<String> {
    if input == "-" {
        let mut payload = String::new();
        io::stdin()
            .read_to_string(&mut payload)
            .context("failed to read harness payload from stdin")?;
        Ok(payload)
    } else {
        std::fs::read_to_string(input).with_context(|| format!("failed to read harness payload {}", input))
    }
}
