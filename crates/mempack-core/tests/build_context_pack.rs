//! End-to-end test of `build_context_pack` against a real `SqliteStore`
//! and a real git repository.

use std::collections::BTreeSet;
use std::process::Command;

use mempack_core::config::Config;
use mempack_core::embedder::HashProjectionEmbedder;
use mempack_core::store::{SqliteStore, StateRow, Store};
use mempack_core::types::{Chunk, Memory};
use mempack_core::{build_context_pack, BuildOptions, RepoContext};
use tempfile::TempDir;

/// A real, empty git repo with one commit, so HEAD and orphan checks work.
fn init_repo() -> TempDir {
    let dir = TempDir::new().expect("tempdir");
    let run = |args: &[&str]| {
        Command::new("git")
            .args(args)
            .current_dir(dir.path())
            .output()
            .expect("run git")
    };
    run(&["init", "-q"]);
    run(&["config", "user.email", "test@example.com"]);
    run(&["config", "user.name", "Test"]);
    std::fs::write(dir.path().join("README.md"), "hello\n").expect("write readme");
    run(&["add", "."]);
    run(&["commit", "-q", "-m", "initial"]);
    dir
}

fn head_commit(dir: &std::path::Path) -> String {
    mempack_core::git::head_commit(dir).expect("head commit")
}

#[test]
fn full_pipeline_returns_ranked_budgeted_pack() {
    let repo = init_repo();
    let head = head_commit(repo.path());
    let repo_id = "repo-1";
    let workspace = "default";

    let store = SqliteStore::open_in_memory().expect("open store");
    store
        .put_state(
            repo_id,
            workspace,
            &StateRow {
                raw: serde_json::json!({"focus": "auth"}),
                updated_at: "2026-07-01T00:00:00Z".into(),
            },
        )
        .expect("put state");

    let memory = Memory {
        id: "mem-1".into(),
        thread_id: "thread-auth".into(),
        title: "Auth token validation".into(),
        body: "Tokens are validated against the session store before use.".into(),
        tags: BTreeSet::new(),
        anchor_commit: Some(head.clone()),
        superseded_by: None,
        created_at: "2026-07-01T00:00:00Z".into(),
        updated_at: "2026-07-30T00:00:00Z".into(),
    };
    store.put_memory(repo_id, workspace, &memory).expect("put memory");

    let orphan_memory = Memory {
        id: "mem-2".into(),
        thread_id: "thread-auth".into(),
        title: "Stale auth note".into(),
        body: "Token validation used to call a removed legacy endpoint.".into(),
        tags: BTreeSet::new(),
        anchor_commit: Some("0000000000000000000000000000000000dead".into()),
        superseded_by: None,
        created_at: "2020-01-01T00:00:00Z".into(),
        updated_at: "2020-01-01T00:00:00Z".into(),
    };
    store
        .put_memory(repo_id, workspace, &orphan_memory)
        .expect("put orphan memory");

    let chunk = Chunk {
        id: "chunk-1".into(),
        thread_id: "thread-auth".into(),
        locator: "auth.py:1-10".into(),
        body: "def validate_token(token):\n    return token is not None\n".into(),
        symbol_name: "validate_token".into(),
        symbol_kind: "function".into(),
        chunk_type: "function".into(),
        start_line: 1,
        end_line: 10,
        token_count: 12,
    };
    store.put_chunk(repo_id, workspace, &chunk).expect("put chunk");

    let config = Config::default();
    let embedder = HashProjectionEmbedder::default();
    let repo_ctx = RepoContext {
        repo_id,
        repo_root: repo.path(),
        head: &head,
    };
    let opts = BuildOptions {
        explain: true,
        ..Default::default()
    };

    let (pack, report) = build_context_pack(&config, &store, &embedder, &repo_ctx, "auth token validation", &opts)
        .expect("build context pack");

    assert_eq!(pack.repo, repo_id);
    assert_eq!(pack.workspace, workspace);
    assert_eq!(pack.state_source, "db");
    assert!(pack.memories.iter().any(|m| m.id == "mem-1"));
    assert!(
        !pack.memories.iter().any(|m| m.id == "mem-2"),
        "orphaned memory should be excluded by default"
    );
    assert!(pack.chunks.iter().any(|c| c.id == "chunk-1"));
    assert!(pack.budget.used_total <= pack.budget.target_total);
    assert!(report.is_some());
}

#[test]
fn include_orphans_opts_in_unreachable_memories() {
    let repo = init_repo();
    let head = head_commit(repo.path());
    let repo_id = "repo-2";
    let workspace = "default";

    let store = SqliteStore::open_in_memory().expect("open store");
    let orphan_memory = Memory {
        id: "mem-orphan".into(),
        thread_id: "thread-x".into(),
        title: "Orphaned design note".into(),
        body: "Design note anchored to a commit nobody can reach anymore.".into(),
        tags: BTreeSet::new(),
        anchor_commit: Some("0000000000000000000000000000000000dead".into()),
        superseded_by: None,
        created_at: "2020-01-01T00:00:00Z".into(),
        updated_at: "2020-01-01T00:00:00Z".into(),
    };
    store
        .put_memory(repo_id, workspace, &orphan_memory)
        .expect("put memory");

    let config = Config::default();
    let embedder = HashProjectionEmbedder::default();
    let repo_ctx = RepoContext {
        repo_id,
        repo_root: repo.path(),
        head: &head,
    };

    let (pack_default, _) = build_context_pack(
        &config,
        &store,
        &embedder,
        &repo_ctx,
        "design note",
        &BuildOptions::default(),
    )
    .expect("build default");
    assert!(pack_default.memories.is_empty());

    let opts_include = BuildOptions {
        include_orphans: true,
        ..Default::default()
    };
    let (pack_included, _) =
        build_context_pack(&config, &store, &embedder, &repo_ctx, "design note", &opts_include)
            .expect("build with orphans included");
    assert!(pack_included.memories.iter().any(|m| m.id == "mem-orphan"));
}

#[test]
fn tiny_budget_still_reserves_state_and_degrades_gracefully() {
    let repo = init_repo();
    let head = head_commit(repo.path());
    let repo_id = "repo-3";
    let workspace = "default";

    let store = SqliteStore::open_in_memory().expect("open store");
    store
        .put_state(
            repo_id,
            workspace,
            &StateRow {
                raw: serde_json::json!({"focus": "payments"}),
                updated_at: "2026-07-01T00:00:00Z".into(),
            },
        )
        .expect("put state");

    let mut config = Config::default();
    config.token_budget = 1;

    let embedder = HashProjectionEmbedder::default();
    let repo_ctx = RepoContext {
        repo_id,
        repo_root: repo.path(),
        head: &head,
    };

    let (pack, _) = build_context_pack(&config, &store, &embedder, &repo_ctx, "payments", &BuildOptions::default())
        .expect("build under tiny budget");

    assert!(pack.memories.is_empty());
    assert!(pack.chunks.is_empty());
    assert!(pack.budget.used_total <= pack.budget.target_total);
}
