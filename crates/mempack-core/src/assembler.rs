//! Context-pack assembler: orchestrates query parsing, state
//! loading, hybrid ranking, and budgeting into one `ContextPack`.

use std::collections::HashSet;

use tracing::warn;

use crate::budget::pack_budget_default;
use crate::config::Config;
use crate::embedder::Embedder;
use crate::error::OmniResult;
use crate::git::is_commit_reachable;
use crate::query::parse_query;
use crate::ranker::{rank_chunks, rank_memories, RankInput};
use crate::state::load_state;
use crate::store::Store;
use crate::types::{Budget, Chunk, ContextPack, ExplainEntry, ExplainReport, Memory, VectorStatus};

/// Per-call overrides for `build_context_pack`.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Workspace override; falls back to config's `default_workspace`.
    pub workspace: Option<String>,
    /// Include memories whose `superseded_by` is set.
    pub include_superseded: bool,
    /// Include memories whose anchor commit is unreachable from HEAD.
    pub include_orphans: bool,
    /// When true, also emit a per-candidate `ExplainReport`.
    pub explain: bool,
}

/// Identity of the repo a build runs against.
pub struct RepoContext<'a> {
    /// Opaque store-assigned repo id.
    pub repo_id: &'a str,
    /// Absolute path to the repo's git root.
    pub repo_root: &'a std::path::Path,
    /// Current HEAD commit SHA.
    pub head: &'a str,
}

/// Assemble a context pack for `query` by running the orchestration
/// steps below in order.
#[allow(clippy::too_many_arguments)]
pub fn build_context_pack(
    config: &Config,
    store: &dyn Store,
    embedder: &dyn Embedder,
    repo: &RepoContext<'_>,
    raw_query: &str,
    opts: &BuildOptions,
) -> OmniResult<(ContextPack, Option<ExplainReport>)> {
    let mut warnings = Vec::new();

    // Step 1: resolve workspace.
    let workspace = config.resolve_workspace(opts.workspace.as_deref());

    // Step 2: parse the query into text + directives.
    let parsed = parse_query(raw_query);

    // Step 3: load state (three-tier fallback).
    let loaded_state = load_state(store, repo.repo_id, &workspace, repo.repo_root);
    warnings.extend(loaded_state.warnings.clone());

    // Step 4: lexical search for memories and chunks, over-retrieving 5x so
    // the ranker has room to work before the budgeter truncates.
    const OVER_RETRIEVE_FACTOR: usize = 5;
    let memories_fanout = config.memories_k * OVER_RETRIEVE_FACTOR;
    let chunks_fanout = config.chunks_k * OVER_RETRIEVE_FACTOR;
    let memory_hits = store.search_memories(repo.repo_id, &workspace, &parsed.text, memories_fanout)?;
    let chunk_hits = store.search_chunks(repo.repo_id, &workspace, &parsed.text, chunks_fanout)?;

    // Step 5: vector search, degrading to lexical-only on embedder/store failure.
    let mut vector_status = VectorStatus::default();
    let mut min_similarity = config.embedding_min_similarity;
    let (memory_vector_hits, chunk_vector_hits) = match embedder.embed(&parsed.text) {
        Ok(query_vec) => {
            let mem_v = store.vector_search_memories(repo.repo_id, &workspace, &query_vec, memories_fanout);
            let chunk_v = store.vector_search_chunks(repo.repo_id, &workspace, &query_vec, chunks_fanout);
            match (mem_v, chunk_v) {
                (Ok(m), Ok(c)) => {
                    vector_status.used = true;
                    (m, c)
                }
                (mem_res, chunk_res) => {
                    let err = mem_res.err().or(chunk_res.err());
                    let message = err.map(|e| e.to_string()).unwrap_or_default();
                    warnings.push(format!("vector_error:search failed: {message}"));
                    vector_status.error = Some(message);
                    (Vec::new(), Vec::new())
                }
            }
        }
        Err(e) => {
            warnings.push(format!("vector_error:embed failed: {e}"));
            vector_status.error = Some(e.to_string());
            (Vec::new(), Vec::new())
        }
    };

    // Low-recall boost: both lexical legs and the vector legs came back
    // empty, so rerun vector search with doubled limits and a lowered
    // similarity floor before giving up on the vector leg entirely.
    let (memory_vector_hits, chunk_vector_hits) =
        if memory_hits.is_empty() && chunk_hits.is_empty() && memory_vector_hits.is_empty() && chunk_vector_hits.is_empty() {
            min_similarity = (min_similarity - 0.1).max(0.0);
            match embedder.embed(&parsed.text) {
                Ok(query_vec) => {
                    let mem_v = store.vector_search_memories(
                        repo.repo_id,
                        &workspace,
                        &query_vec,
                        memories_fanout * 2,
                    );
                    let chunk_v = store.vector_search_chunks(
                        repo.repo_id,
                        &workspace,
                        &query_vec,
                        chunks_fanout * 2,
                    );
                    match (mem_v, chunk_v) {
                        (Ok(m), Ok(c)) => {
                            vector_status.used = true;
                            (m, c)
                        }
                        _ => (memory_vector_hits, chunk_vector_hits),
                    }
                }
                Err(_) => (memory_vector_hits, chunk_vector_hits),
            }
        } else {
            (memory_vector_hits, chunk_vector_hits)
        };

    // Step 6: fuse lexical memory hits into rank inputs, recording matched
    // threads for the chunk thread-bonus (step 7 uses this set).
    let matched_thread_ids: HashSet<String> =
        memory_hits.iter().map(|h| h.memory.thread_id.clone()).collect();

    let memory_vector_ranks: std::collections::HashMap<String, (f64, usize)> = memory_vector_hits
        .iter()
        .enumerate()
        .map(|(i, hit)| (hit.id.clone(), (hit.score, i + 1)))
        .filter(|(_, (score, _))| *score as f32 >= min_similarity)
        .collect();

    let mut memory_inputs = Vec::new();
    for hit in &memory_hits {
        let vector = memory_vector_ranks.get(&hit.memory.id);
        memory_inputs.push(RankInput {
            inner: hit.memory.clone(),
            bm25: Some(hit.bm25),
            fts_rank: Some(hit.fts_rank),
            vector_score: vector.map(|(s, _)| *s),
            vector_rank: vector.map(|(_, r)| *r),
        });
    }
    // Vector-only hits (no lexical match) still enter the candidate pool.
    for (id, (score, rank)) in &memory_vector_ranks {
        if memory_hits.iter().any(|h| &h.memory.id == id) {
            continue;
        }
        if let Some(memory) = store.get_memory(repo.repo_id, id)? {
            memory_inputs.push(RankInput {
                inner: memory,
                bm25: None,
                fts_rank: None,
                vector_score: Some(*score),
                vector_rank: Some(*rank),
            });
        }
    }

    // Step 7: supersedence and orphan detection.
    let superseded_ids: HashSet<String> = memory_inputs
        .iter()
        .filter(|m| m.inner.superseded_by.is_some())
        .map(|m| m.inner.id.clone())
        .collect();

    let mut orphaned_ids = HashSet::new();
    let mut orphan_check_failed = false;
    for input in &memory_inputs {
        if let Some(commit) = &input.inner.anchor_commit {
            match is_commit_reachable(repo.repo_root, commit, repo.head) {
                Ok(true) => {}
                Ok(false) => {
                    orphaned_ids.insert(input.inner.id.clone());
                }
                Err(e) => {
                    warn!(memory_id = %input.inner.id, error = %e, "orphan_check_failed");
                    orphan_check_failed = true;
                }
            }
        }
    }
    if orphan_check_failed {
        warnings.push("orphan_check_failed:git reachability check failed for one or more memories".to_string());
    }

    // Step 8: rank.
    let time_filter_after = parsed.time_hint.as_ref().map(|h| h.after.as_str());
    let ranked_memories = rank_memories(
        memory_inputs,
        |memory| age_days(&memory.updated_at),
        parsed.boost_recency,
        &superseded_ids,
        &orphaned_ids,
        &matched_thread_ids,
        opts.include_superseded,
        opts.include_orphans,
        time_filter_after,
    );

    let mut chunk_inputs = Vec::new();
    let chunk_vector_ranks: std::collections::HashMap<String, (f64, usize)> = chunk_vector_hits
        .iter()
        .enumerate()
        .map(|(i, hit)| (hit.id.clone(), (hit.score, i + 1)))
        .collect();
    for hit in &chunk_hits {
        let vector = chunk_vector_ranks.get(&hit.chunk.id);
        chunk_inputs.push(RankInput {
            inner: hit.chunk.clone(),
            bm25: Some(hit.bm25),
            fts_rank: Some(hit.fts_rank),
            vector_score: vector.map(|(s, _)| *s),
            vector_rank: vector.map(|(_, r)| *r),
        });
    }
    let ranked_chunks = rank_chunks(chunk_inputs, &matched_thread_ids);

    // Step 9: pack under the token budget (state reserved first).
    let state_text = loaded_state.raw.to_string();
    let counter_name = config.tokenizer.clone();
    let state_tokens = crate::tokenizer::build_counter(&counter_name)
        .map(|c| c.count(state_text.as_bytes()))
        .unwrap_or(0);

    let budget = pack_budget_default(
        config.token_budget,
        state_tokens,
        &ranked_memories,
        &ranked_chunks,
        counter_name,
    )?;

    // Step 10: materialize the pack (and explain report, if requested).
    let explain = opts.explain.then(|| build_explain_report(&ranked_memories, &ranked_chunks, &budget));

    let memories: Vec<Memory> = ranked_memories
        .iter()
        .filter(|m| budget.included_memory_ids.contains(&m.inner.id))
        .map(|m| m.inner.clone())
        .collect();
    let chunks: Vec<Chunk> = ranked_chunks
        .iter()
        .filter(|c| budget.included_chunk_ids.contains(&c.inner.id))
        .map(|c| c.inner.clone())
        .collect();

    let pack = ContextPack {
        repo: repo.repo_id.to_string(),
        workspace,
        state_raw: loaded_state.raw,
        state_source: loaded_state.source,
        state_updated_at: loaded_state.updated_at,
        memories,
        chunks,
        budget,
        vector_status,
        warnings,
    };

    Ok((pack, explain))
}

fn build_explain_report(
    memories: &[crate::types::RankedItem<Memory>],
    chunks: &[crate::types::RankedItem<Chunk>],
    budget: &Budget,
) -> ExplainReport {
    ExplainReport {
        memories: memories
            .iter()
            .map(|m| ExplainEntry {
                id: m.inner.id.clone(),
                kind: "memory".into(),
                bm25: m.bm25,
                fts_rank: (m.fts_rank != usize::MAX).then_some(m.fts_rank),
                vector_score: m.vector_score,
                vector_rank: (m.vector_rank != usize::MAX).then_some(m.vector_rank),
                rrf_score: m.rrf_score,
                recency_bonus: m.recency_bonus,
                thread_bonus: m.thread_bonus,
                safety_penalty: m.safety_penalty,
                final_score: m.final_score,
                superseded: m.superseded,
                orphaned: m.orphaned,
                budget_included: budget.included_memory_ids.contains(&m.inner.id),
            })
            .collect(),
        chunks: chunks
            .iter()
            .map(|c| ExplainEntry {
                id: c.inner.id.clone(),
                kind: "chunk".into(),
                bm25: c.bm25,
                fts_rank: (c.fts_rank != usize::MAX).then_some(c.fts_rank),
                vector_score: c.vector_score,
                vector_rank: (c.vector_rank != usize::MAX).then_some(c.vector_rank),
                rrf_score: c.rrf_score,
                recency_bonus: c.recency_bonus,
                thread_bonus: c.thread_bonus,
                safety_penalty: c.safety_penalty,
                final_score: c.final_score,
                superseded: c.superseded,
                orphaned: c.orphaned,
                budget_included: budget.included_chunk_ids.contains(&c.inner.id),
            })
            .collect(),
    }
}

/// Age in days between an RFC-3339 UTC timestamp and now. Falls back to
/// `0.0` (no recency bonus beyond baseline) when the timestamp can't be
/// parsed, rather than failing the whole build over a bad date.
fn age_days(updated_at: &str) -> f64 {
    let Ok(then) = chrono::DateTime::parse_from_rfc3339(updated_at) else {
        return 0.0;
    };
    let now = chrono::Utc::now();
    (now - then.with_timezone(&chrono::Utc))
        .num_seconds()
        .max(0) as f64
        / 86_400.0
}
