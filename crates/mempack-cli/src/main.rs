//! `mempack` CLI: builds a context pack for a query against a repo and
//! prints it as JSON.
//!
//! Repo detection (walking up for a `.git` directory) and repo-id
//! derivation live here rather than in mempack-core, since they're the
//! caller's responsibility, not the retrieval engine's.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use mempack_core::config::Config;
use mempack_core::embedder::HashProjectionEmbedder;
use mempack_core::store::SqliteStore;
use mempack_core::{build_context_pack, BuildOptions, RepoContext};

#[derive(Parser)]
#[command(name = "mempack", version, about = "Local context-pack retrieval engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a context pack for a query.
    Pack {
        /// Search query text, possibly carrying `after:`/`recent:` directives.
        #[arg(long)]
        query: String,
        /// Workspace to scope the search to.
        #[arg(long)]
        workspace: Option<String>,
        /// Repo path to search from. Defaults to the current directory.
        #[arg(long)]
        repo: Option<PathBuf>,
        /// Include memories superseded by a newer one.
        #[arg(long)]
        include_superseded: bool,
        /// Include memories whose anchor commit is unreachable from HEAD.
        #[arg(long)]
        include_orphans: bool,
        /// Also print a per-candidate ranking trace.
        #[arg(long)]
        explain: bool,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Pack {
            query,
            workspace,
            repo,
            include_superseded,
            include_orphans,
            explain,
        } => run_pack(&query, workspace, repo, include_superseded, include_orphans, explain),
    }
}

#[allow(clippy::too_many_arguments)]
fn run_pack(
    query: &str,
    workspace: Option<String>,
    repo: Option<PathBuf>,
    include_superseded: bool,
    include_orphans: bool,
    explain: bool,
) -> anyhow::Result<()> {
    let cwd = repo.unwrap_or(std::env::current_dir()?);
    let repo_root = find_git_root(&cwd)
        .ok_or_else(|| anyhow::anyhow!("no .git directory found above {}", cwd.display()))?;

    let config = Config::load(&repo_root)?;
    let repo_id = repo_id_for(&repo_root);
    let head = mempack_core::git::head_commit(&repo_root)
        .map_err(|e| anyhow::anyhow!("failed to resolve HEAD: {e}"))?;

    let db_path = repo_root.join(".mempack").join("mempack.db");
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let store = SqliteStore::open(&db_path)?;
    let embedder = HashProjectionEmbedder::default();

    let repo_ctx = RepoContext {
        repo_id: &repo_id,
        repo_root: &repo_root,
        head: &head,
    };
    let opts = BuildOptions {
        workspace,
        include_superseded,
        include_orphans,
        explain,
    };

    let (pack, report) = build_context_pack(&config, &store, &embedder, &repo_ctx, query, &opts)?;

    println!("{}", serde_json::to_string_pretty(&pack)?);
    if let Some(report) = report {
        eprintln!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(())
}

/// Walk up from `start` looking for a `.git` entry.
fn find_git_root(start: &Path) -> Option<PathBuf> {
    let mut dir = start.canonicalize().ok()?;
    loop {
        if dir.join(".git").exists() {
            return Some(dir);
        }
        if !dir.pop() {
            return None;
        }
    }
}

/// Derive a stable repo id from the canonical repo root path.
fn repo_id_for(repo_root: &Path) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(repo_root.to_string_lossy().as_bytes());
    hex::encode(hasher.finalize())
}
