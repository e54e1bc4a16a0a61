//! Weft CLI - patience diffs and task orchestration
//!
//! Usage:
//!   weft init [PATH]                  Write a default .weft/config.toml
//!   weft diff <OLD> <NEW>             Line diff of two files
//!   weft orchestrate --snapshot FILE  Run the orchestrator against a snapshot file

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use weft_core::{DiffConfig, WeftConfig};
use weft_diff::{align, diff_lines, opcodes, LineNormalizer, MatchBlock, OpTag};
use weft_orchestrator::{
    LoggingTaskFactory, Orchestrator, OrchestratorConfig, SharedInsights, SnapshotFileWatcher,
    SnapshotWatcherConfig,
};

#[derive(Parser)]
#[command(name = "weft")]
#[command(author, version, about = "Patience diffs and task orchestration")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to .weft/config.toml in the current directory)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Repository path (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Show a line diff of two files
    Diff {
        old: PathBuf,
        new: PathBuf,

        /// Ignore all whitespace
        #[arg(short = 'w', long)]
        ignore_whitespace: bool,

        /// Ignore changes in the amount of whitespace
        #[arg(short = 'b', long)]
        ignore_whitespace_changes: bool,

        /// Ignore case differences
        #[arg(short = 'i', long)]
        ignore_case: bool,

        /// Treat all blank lines as equal
        #[arg(short = 'B', long)]
        ignore_blank_lines: bool,

        /// Ignore line terminator differences
        #[arg(long)]
        ignore_end_of_line: bool,

        /// Print the raw match blocks
        #[arg(long, conflicts_with = "side_by_side")]
        blocks: bool,

        /// Print aligned rows in two columns
        #[arg(long)]
        side_by_side: bool,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Run the orchestrator against a snapshot file until Ctrl-C
    Orchestrate {
        /// TOML file describing watched resources and namespaces
        #[arg(long, value_name = "FILE")]
        snapshot: PathBuf,

        /// Run without peering
        #[arg(long)]
        standalone: bool,

        /// Pause all work while the peering resource is missing
        #[arg(long)]
        mandatory: bool,

        /// Use cluster-wide peering
        #[arg(long)]
        clusterwide: bool,

        /// Identity announced to peers
        #[arg(long)]
        identity: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging; RUST_LOG wins over --verbose
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Init { path } => cmd_init(&path),
        Commands::Diff {
            old,
            new,
            ignore_whitespace,
            ignore_whitespace_changes,
            ignore_case,
            ignore_blank_lines,
            ignore_end_of_line,
            blocks,
            side_by_side,
            json,
        } => {
            let mut diff = load_config(cli.config.as_deref())?.diff;
            diff.ignore_whitespace |= ignore_whitespace;
            diff.ignore_whitespace_changes |= ignore_whitespace_changes;
            diff.ignore_case |= ignore_case;
            diff.ignore_blank_lines |= ignore_blank_lines;
            diff.ignore_end_of_line |= ignore_end_of_line;

            let output = if blocks {
                DiffOutput::Blocks
            } else if side_by_side {
                DiffOutput::SideBySide
            } else {
                DiffOutput::Lines
            };
            cmd_diff(&old, &new, diff, output, json).await
        }
        Commands::Orchestrate {
            snapshot,
            standalone,
            mandatory,
            clusterwide,
            identity,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            config.peering.standalone |= standalone;
            config.peering.mandatory |= mandatory;
            config.peering.clusterwide |= clusterwide;
            if identity.is_some() {
                config.orchestrator.identity = identity;
            }
            cmd_orchestrate(snapshot, config).await
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<WeftConfig> {
    match path {
        Some(path) => WeftConfig::load_from(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => {
            let cwd = std::env::current_dir().context("Failed to get current directory")?;
            WeftConfig::load_or_default(&cwd).context("Failed to load .weft/config.toml")
        }
    }
}

fn cmd_init(path: &Path) -> Result<()> {
    info!("Initializing Weft in {:?}", path);
    WeftConfig::write_default(path).context("Failed to write default config")?;
    println!("Initialized Weft in {:?}", path);
    println!("Created:");
    println!("  .weft/config.toml");
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DiffOutput {
    Lines,
    Blocks,
    SideBySide,
}

async fn read_lines(path: &Path) -> Result<Vec<String>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(split_lines(&content))
}

/// Split keeping line terminators, so end-of-line differences stay visible
fn split_lines(content: &str) -> Vec<String> {
    content.split_inclusive('\n').map(str::to_string).collect()
}

fn display(line: &str) -> &str {
    line.trim_end_matches(['\r', '\n'])
}

async fn cmd_diff(
    old: &Path,
    new: &Path,
    config: DiffConfig,
    output: DiffOutput,
    json: bool,
) -> Result<()> {
    let a = read_lines(old).await?;
    let b = read_lines(new).await?;
    let blocks = diff_lines(&a, &b, &LineNormalizer::new(config));
    debug!(
        "{} matching blocks between {} and {}",
        blocks.len() - 1,
        old.display(),
        new.display()
    );

    let text = match (output, json) {
        (DiffOutput::Blocks, true) => serde_json::to_string_pretty(&blocks)?,
        (DiffOutput::Blocks, false) => render_blocks(&blocks),
        (DiffOutput::SideBySide, true) => serde_json::to_string_pretty(&align(&blocks))?,
        (DiffOutput::SideBySide, false) => render_side_by_side(&a, &b, &blocks),
        (DiffOutput::Lines, true) => serde_json::to_string_pretty(&opcodes(&blocks))?,
        (DiffOutput::Lines, false) => render_lines(&a, &b, &blocks),
    };
    print!("{}", text);
    if json {
        println!();
    }
    Ok(())
}

fn render_blocks(blocks: &[MatchBlock]) -> String {
    blocks
        .iter()
        .map(|block| format!("{} {} {}\n", block.a, block.b, block.len))
        .collect()
}

fn render_lines(a: &[String], b: &[String], blocks: &[MatchBlock]) -> String {
    let mut out = String::new();
    for op in opcodes(blocks) {
        match op.tag {
            OpTag::Equal => {
                for line in &a[op.a.clone()] {
                    out.push_str(&format!("  {}\n", display(line)));
                }
            }
            OpTag::Delete | OpTag::Replace | OpTag::Insert => {
                for line in &a[op.a.clone()] {
                    out.push_str(&format!("- {}\n", display(line)));
                }
                for line in &b[op.b.clone()] {
                    out.push_str(&format!("+ {}\n", display(line)));
                }
            }
        }
    }
    out
}

fn render_side_by_side(a: &[String], b: &[String], blocks: &[MatchBlock]) -> String {
    let rows = align(blocks);
    let width = a.iter().map(|line| display(line).chars().count()).max().unwrap_or(0);
    let mut out = String::new();
    for row in rows {
        let left = row.a.map(|i| display(&a[i])).unwrap_or("");
        let right = row.b.map(|j| display(&b[j])).unwrap_or("");
        let marker = if row.matched { '|' } else { '*' };
        out.push_str(&format!("{:<width$} {} {}\n", left, marker, right, width = width));
    }
    out
}

async fn cmd_orchestrate(snapshot: PathBuf, config: WeftConfig) -> Result<()> {
    info!("Starting orchestrator with snapshot {}", snapshot.display());

    let insights = SharedInsights::default();
    let mut watcher = SnapshotFileWatcher::new(&snapshot, insights.clone()).with_config(
        SnapshotWatcherConfig {
            poll_interval: config.orchestrator.snapshot_poll_interval(),
            ..SnapshotWatcherConfig::default()
        },
    );
    watcher
        .check_once()
        .await
        .with_context(|| format!("Failed to load snapshot {}", watcher.path().display()))?;

    let shutdown = CancellationToken::new();
    let watcher_handle = watcher.spawn(shutdown.clone());

    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl-C, shutting down");
                signal.cancel();
            }
            Err(e) => warn!("Cannot listen for Ctrl-C: {}", e),
        }
    });

    let mut orchestrator = Orchestrator::new(
        OrchestratorConfig::from_settings(&config),
        insights.subscribe(),
        Arc::new(LoggingTaskFactory::default()),
    );
    println!("Orchestrating as {}", orchestrator.config().identity);

    let outcome = orchestrator.run(shutdown.clone()).await;
    shutdown.cancel();
    if let Err(e) = watcher_handle.await {
        warn!("Snapshot watcher failed: {}", e);
    }
    outcome.context("Orchestrator failed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_diff_flags() {
        let cli = Cli::try_parse_from(["weft", "diff", "-w", "--blocks", "a.txt", "b.txt"]).unwrap();
        match cli.command {
            Commands::Diff {
                ignore_whitespace,
                blocks,
                side_by_side,
                old,
                ..
            } => {
                assert!(ignore_whitespace);
                assert!(blocks);
                assert!(!side_by_side);
                assert_eq!(old, PathBuf::from("a.txt"));
            }
            _ => panic!("expected diff"),
        }
    }

    #[test]
    fn test_render_lines() {
        let a = split_lines("a\nb\nc\nd\n");
        let b = split_lines("a\nx\nc\nd\n");
        let blocks = diff_lines(&a, &b, &LineNormalizer::default());
        assert_eq!(render_lines(&a, &b, &blocks), "  a\n- b\n+ x\n  c\n  d\n");
    }

    #[test]
    fn test_render_blocks() {
        let blocks = vec![MatchBlock::new(0, 0, 1), MatchBlock::new(1, 1, 0)];
        assert_eq!(render_blocks(&blocks), "0 0 1\n1 1 0\n");
    }

    #[test]
    fn test_render_side_by_side_marks_changes() {
        let a = split_lines("same\nold\n");
        let b = split_lines("same\nnew\n");
        let blocks = diff_lines(&a, &b, &LineNormalizer::default());
        let text = render_side_by_side(&a, &b, &blocks);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "same | same");
        assert!(lines[1..].iter().all(|line| line.contains('*')));
    }

    #[tokio::test]
    async fn test_read_lines_keeps_terminators() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("f.txt");
        std::fs::write(&path, "one\r\ntwo").unwrap();
        assert_eq!(read_lines(&path).await.unwrap(), vec!["one\r\n", "two"]);
    }

    #[test]
    fn test_load_explicit_config() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("weft.toml");
        std::fs::write(&path, "[diff]\nignore_case = true\n").unwrap();
        let config = load_config(Some(path.as_path())).unwrap();
        assert!(config.diff.ignore_case);
    }
}
