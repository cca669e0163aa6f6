//! # Arbor CLI
//!
//! Command-line front end for the arbor version-control library.
//!
//! ## Usage
//! ```bash
//! # Start tracking the current directory
//! arbor init
//!
//! # Stage and commit a file
//! arbor add notes.txt
//! arbor commit "add notes"
//!
//! # Branch, switch and merge
//! arbor branch feature
//! arbor checkout feature
//! arbor checkout master
//! arbor merge feature
//!
//! # Restore one file from an older commit
//! arbor checkout --commit 3f2a91 --file notes.txt
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use humantime::format_duration;
use arbor::{ArborError, CompressionStrategy, MergeOutcome, Repository, RepositoryBuilder, Result};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// Arbor CLI - local version control for a directory of files
#[derive(Parser)]
#[command(name = "arbor")]
#[command(version)]
#[command(about = "Local version control with branches and three-way merge")]
#[command(long_about = None)]
struct Cli {
    /// Path to directory (defaults to current)
    #[arg(short, long, global = true)]
    path: Option<PathBuf>,

    /// Storage directory (defaults to <path>/.arbor)
    #[arg(short, long, global = true)]
    storage: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a repository
    Init {
        /// Compression strategy
        #[arg(long, value_enum, default_value = "fast")]
        compression: CompressionMode,

        /// Name of the initial branch
        #[arg(long, default_value = arbor::DEFAULT_BRANCH)]
        branch: String,
    },

    /// Stage a file for the next commit
    Add {
        /// File name
        file: String,
    },

    /// Stage a file for removal
    Rm {
        /// File name
        file: String,
    },

    /// Commit staged changes
    #[command(alias = "ci")]
    Commit {
        /// Commit message
        #[arg(default_value = "")]
        message: String,
    },

    /// Show history of the active branch
    Log,

    /// Show every commit ever made
    GlobalLog,

    /// Print ids of commits with the given message
    Find {
        /// Exact commit message
        message: String,
    },

    /// Show branches, staged changes and working-directory state
    Status,

    /// Create a branch at the active commit
    Branch {
        /// Branch name
        name: String,
    },

    /// Delete a branch pointer
    RmBranch {
        /// Branch name
        name: String,
    },

    /// Switch branches or restore a file
    #[command(alias = "co")]
    Checkout {
        /// Branch to switch to
        #[arg(required_unless_present = "file", conflicts_with_all = ["file", "commit"])]
        branch: Option<String>,

        /// Commit to restore the file from (defaults to the active commit)
        #[arg(short, long, requires = "file")]
        commit: Option<String>,

        /// File to restore
        #[arg(short, long)]
        file: Option<String>,
    },

    /// Move the active branch to a commit
    Reset {
        /// Commit id or unique prefix
        commit: String,
    },

    /// Merge a branch into the active branch
    Merge {
        /// Branch to merge
        branch: String,
    },

    /// Check stored objects and pointers for damage
    Verify,

    /// Show storage statistics
    Info,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum CompressionMode {
    None,
    Fast,
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("arbor=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if std::env::var("NO_COLOR").is_ok() {
        colored::control::set_override(false);
    }

    if let Err(e) = run(cli) {
        eprintln!("{}: {}", "Error".red().bold(), e.user_message());
        std::process::exit(1);
    }
}

/// Main command runner
fn run(cli: Cli) -> Result<()> {
    let root_path = cli.path.unwrap_or_else(|| PathBuf::from("."));
    let storage_path = cli.storage.unwrap_or_else(|| root_path.join(arbor::DEFAULT_STORAGE_DIR));

    if let Commands::Init { compression, branch } = &cli.command {
        return cmd_init(root_path, storage_path, *compression, branch);
    }

    let mut repo = open_repository(root_path, storage_path)?;
    match cli.command {
        Commands::Init { .. } => Ok(()),
        Commands::Add { file } => {
            repo.add(&file)?;
            Ok(())
        }
        Commands::Rm { file } => repo.rm(&file),
        Commands::Commit { message } => {
            let hash = repo.commit(&message)?;
            println!("{} {}", "Committed".green().bold(), hash[..10].yellow());
            Ok(())
        }
        Commands::Log => cmd_log(&repo, false),
        Commands::GlobalLog => cmd_log(&repo, true),
        Commands::Find { message } => cmd_find(&repo, &message),
        Commands::Status => cmd_status(&repo),
        Commands::Branch { name } => repo.create_branch(&name),
        Commands::RmBranch { name } => repo.delete_branch(&name),
        Commands::Checkout { branch, commit, file } => match (branch, file) {
            (_, Some(file)) => repo.checkout_file(commit.as_deref(), &file),
            (Some(branch), None) => repo.checkout_branch(&branch),
            (None, None) => Err(ArborError::internal("nothing to check out")),
        },
        Commands::Reset { commit } => {
            repo.reset(&commit)?;
            Ok(())
        }
        Commands::Merge { branch } => cmd_merge(&mut repo, &branch),
        Commands::Verify => cmd_verify(&repo),
        Commands::Info => cmd_info(&repo),
    }
}

/// Initialize a repository
///
/// The storage directory holds `config.json`, `HEAD`, `index.json`, the
/// branch pointers under `refs/heads/` and the objects under `objects/`.
fn cmd_init(root_path: PathBuf, storage_path: PathBuf, compression: CompressionMode, branch: &str) -> Result<()> {
    let strategy = match compression {
        CompressionMode::None => CompressionStrategy::None,
        CompressionMode::Fast => CompressionStrategy::Fast,
    };

    let repo = RepositoryBuilder::new()
        .compression_strategy(strategy)
        .default_branch(branch)
        .init_at(root_path, storage_path)?;

    println!("{} Initialized arbor repository", "✓".green().bold());
    println!("  Root: {}", repo.root_path().display().to_string().cyan());
    println!("  Storage: {}", repo.store().root().display().to_string().cyan());
    println!("  Branch: {}", repo.current_branch()?.cyan());
    Ok(())
}

fn cmd_log(repo: &Repository, global: bool) -> Result<()> {
    let commits = if global { repo.global_log()? } else { repo.log()? };
    for (hash, commit) in commits {
        println!("{}", commit.display_format(&hash));
    }
    Ok(())
}

fn cmd_find(repo: &Repository, message: &str) -> Result<()> {
    let hashes = repo.find(message)?;
    if hashes.is_empty() {
        println!("Found no commit with that message.");
        return Ok(());
    }
    for hash in hashes {
        println!("{}", hash);
    }
    Ok(())
}

/// Show the active branch, staged changes and working-directory state
fn cmd_status(repo: &Repository) -> Result<()> {
    let status = repo.status()?;

    println!("{}", "=== Branches ===".bold());
    for branch in &status.branches {
        if *branch == status.current_branch {
            println!("*{}", branch.green());
        } else {
            println!("{}", branch);
        }
    }

    println!("\n{}", "=== Staged Files ===".bold());
    for name in &status.staged {
        println!("{}", name.green());
    }

    println!("\n{}", "=== Removed Files ===".bold());
    for name in &status.removed {
        println!("{}", name.red());
    }

    println!("\n{}", "=== Modifications Not Staged For Commit ===".bold());
    let mut changes: Vec<(String, &str)> = status
        .modified
        .iter()
        .map(|n| (n.clone(), "modified"))
        .chain(status.deleted.iter().map(|n| (n.clone(), "deleted")))
        .collect();
    changes.sort();
    for (name, kind) in changes {
        println!("{} ({})", name.yellow(), kind);
    }

    println!("\n{}", "=== Untracked Files ===".bold());
    for name in &status.untracked {
        println!("{}", name.dimmed());
    }
    println!();
    Ok(())
}

fn cmd_merge(repo: &mut Repository, branch: &str) -> Result<()> {
    match repo.merge(branch)? {
        MergeOutcome::AlreadyMerged => {
            println!("Given branch is an ancestor of the current branch.");
        }
        MergeOutcome::FastForwarded { commit } => {
            println!("Current branch fast-forwarded to {}.", commit[..10].yellow());
        }
        MergeOutcome::Merged { commit, had_conflict } => {
            if had_conflict {
                println!("{}", "Encountered a merge conflict.".red().bold());
            }
            println!("{} {}", "Merge commit".green().bold(), commit[..10].yellow());
        }
    }
    Ok(())
}

/// Re-hash every stored object and check the commit graph
fn cmd_verify(repo: &Repository) -> Result<()> {
    println!("{}", "Verifying repository...".blue().bold());
    let report = repo.verify()?;

    println!("\n{}", "Verification Report:".bold());
    println!("  Objects checked: {}", report.objects_checked);
    println!("  Root commits: {}", report.root_commits);
    for issue in &report.corrupt_objects {
        println!("  {} {} {}: {}", "✗".red(), issue.kind, &issue.hash[..10], issue.reason);
    }
    for dangling in &report.dangling_references {
        println!("  {} {}", "✗".red(), dangling);
    }
    for error in &report.pointer_errors {
        println!("  {} {}", "✗".red(), error);
    }
    println!(
        "  Verification time: {}",
        format_duration(Duration::from_millis(report.verification_time_ms))
    );

    if report.is_valid() {
        println!("\n{} {}", "✓".green().bold(), report.summary());
        Ok(())
    } else {
        Err(ArborError::internal(report.summary()))
    }
}

/// Show storage configuration and object counts
fn cmd_info(repo: &Repository) -> Result<()> {
    let start = Instant::now();
    let stats = repo.store().stats()?;
    let config = repo.config();

    println!("{}", "Repository:".bold());
    println!("  Root: {}", config.root_path.display());
    println!("  Storage: {}", config.storage_path.display());
    println!("  Branch: {}", repo.current_branch()?.cyan());
    println!("  Compression: {}", config.compression_strategy);

    println!("\n{}", "Objects:".bold());
    println!("  Blobs: {}", stats.blobs);
    println!("  Snapshots: {}", stats.snapshots);
    println!("  Commits: {}", stats.commits);
    println!("  Size: {}", format_bytes(stats.total_size));

    println!("\n{}", format!("Scanned in {}", format_duration(start.elapsed())).dimmed());
    Ok(())
}

fn open_repository(root_path: PathBuf, storage_path: PathBuf) -> Result<Repository> {
    if !storage_path.exists() {
        return Err(ArborError::StorageNotInitialized(storage_path));
    }
    Repository::open(root_path, storage_path)
}

/// Format bytes in human-readable form
fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", size as u64, UNITS[unit_idx])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}
