//! Token budgeter: greedy bin-packing of ranked memories and
//! chunks under a hard token ceiling.
//!
//! Reservation order is fixed: state bytes first, then memories in
//! ranked order, then chunks in ranked order. Nothing is reordered or
//! split to fit -- an item either fits whole or is left out. Costing is
//! lazy: if every candidate already carries a cached token count, no
//! `TokenCounter` is ever constructed.

use crate::error::{OmniError, OmniResult};
use crate::tokenizer::TokenCounter;
use crate::types::{Budget, Chunk, Memory, RankedItem};

/// A cost source for an item: either a cached count or raw text that
/// needs a `TokenCounter` to price.
pub enum Cost {
    /// An already-known token count.
    Cached(usize),
    /// Raw text that must be run through a `TokenCounter`.
    Uncached(String),
}

/// Run the budgeter over ranked memories and chunks.
///
/// `memory_cost`/`chunk_cost` extract each item's cost source (cached
/// count vs. raw text). `build_counter` is invoked at most once, only if
/// an uncached item is actually reached during packing.
pub fn pack_budget<M, C>(
    target_total: usize,
    state_tokens: usize,
    memories: &[RankedItem<Memory>],
    chunks: &[RankedItem<Chunk>],
    memory_cost: M,
    chunk_cost: C,
    build_counter: impl FnOnce() -> OmniResult<Box<dyn TokenCounter>>,
) -> OmniResult<Budget>
where
    M: Fn(&Memory) -> Cost,
    C: Fn(&Chunk) -> Cost,
{
    let mut budget = Budget {
        target_total,
        used_total: state_tokens.min(target_total),
        included_memory_ids: Default::default(),
        included_chunk_ids: Default::default(),
    };

    let mut counter: Option<Box<dyn TokenCounter>> = None;
    let mut build_counter = Some(build_counter);
    let mut ensure_counter = |counter: &mut Option<Box<dyn TokenCounter>>| -> OmniResult<()> {
        if counter.is_none() {
            match build_counter.take() {
                Some(f) => *counter = Some(f()?),
                None => return Err(OmniError::Internal("tokenizer builder already consumed".into())),
            }
        }
        Ok(())
    };

    for item in memories {
        let cost = match memory_cost(&item.inner) {
            Cost::Cached(n) => n,
            Cost::Uncached(text) => {
                ensure_counter(&mut counter)?;
                let Some(c) = counter.as_ref() else {
                    return Err(OmniError::TokenizerRequired);
                };
                c.count(text.as_bytes())
            }
        };
        if budget.used_total + cost <= budget.target_total {
            budget.used_total += cost;
            budget.included_memory_ids.insert(item.inner.id.clone());
        }
    }

    for item in chunks {
        let cost = match chunk_cost(&item.inner) {
            Cost::Cached(n) => n,
            Cost::Uncached(text) => {
                ensure_counter(&mut counter)?;
                let Some(c) = counter.as_ref() else {
                    return Err(OmniError::TokenizerRequired);
                };
                c.count(text.as_bytes())
            }
        };
        if budget.used_total + cost <= budget.target_total {
            budget.used_total += cost;
            budget.included_chunk_ids.insert(item.inner.id.clone());
        }
    }

    Ok(budget)
}

/// Convenience wrapper using each `Chunk`'s cached `token_count` and each
/// memory's body length via a fallback `bytes/4` cost, since `Memory`
/// carries no cache field of its own. Callers with a real cache should
/// call `pack_budget` directly instead.
pub fn pack_budget_default(
    target_total: usize,
    state_tokens: usize,
    memories: &[RankedItem<Memory>],
    chunks: &[RankedItem<Chunk>],
    tokenizer_name: String,
) -> OmniResult<Budget> {
    pack_budget(
        target_total,
        state_tokens,
        memories,
        chunks,
        |m| Cost::Uncached(m.body.clone()),
        |c| {
            if c.token_count > 0 {
                Cost::Cached(c.token_count)
            } else {
                Cost::Uncached(c.body.clone())
            }
        },
        move || crate::tokenizer::build_counter(&tokenizer_name),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn memory_item(id: &str, body_tokens: usize) -> RankedItem<Memory> {
        RankedItem {
            inner: Memory {
                id: id.into(),
                thread_id: "t".into(),
                title: "t".into(),
                body: "x".repeat(body_tokens * 4),
                tags: BTreeSet::new(),
                anchor_commit: None,
                superseded_by: None,
                created_at: "2026-01-01T00:00:00Z".into(),
                updated_at: "2026-01-01T00:00:00Z".into(),
            },
            bm25: 0.0,
            fts_score: 0.0,
            fts_rank: 1,
            vector_score: 0.0,
            vector_rank: usize::MAX,
            rrf_score: 1.0,
            recency_bonus: 0.0,
            thread_bonus: 0.0,
            safety_penalty: 0.0,
            superseded: false,
            orphaned: false,
            final_score: 1.0,
        }
    }

    #[test]
    fn top_ranked_items_included_until_budget_exhausted() {
        // 10 memories @ ~100 tokens each, state reserves 200, budget 500
        // -> top 3 memories fit (200 + 300 = 500), rest excluded.
        let memories: Vec<_> = (0..10).map(|i| memory_item(&format!("m{i}"), 100)).collect();
        let chunks: Vec<RankedItem<Chunk>> = Vec::new();

        let budget = pack_budget_default(500, 200, &memories, &chunks, "cl100k_base".into())
            .expect("pack");

        assert_eq!(budget.used_total, 500);
        assert_eq!(budget.included_memory_ids.len(), 3);
        for i in 0..3 {
            assert!(budget.included_memory_ids.contains(&format!("m{i}")));
        }
    }

    #[test]
    fn used_total_never_exceeds_target() {
        let memories: Vec<_> = (0..5).map(|i| memory_item(&format!("m{i}"), 777)).collect();
        let chunks: Vec<RankedItem<Chunk>> = Vec::new();
        let budget = pack_budget_default(1000, 0, &memories, &chunks, "cl100k_base".into())
            .expect("pack");
        assert!(budget.used_total <= budget.target_total);
    }

    #[test]
    fn inclusion_set_matches_what_was_actually_packed() {
        let memories: Vec<_> = (0..4).map(|i| memory_item(&format!("m{i}"), 50)).collect();
        let chunks: Vec<RankedItem<Chunk>> = Vec::new();
        let budget = pack_budget_default(120, 0, &memories, &chunks, "cl100k_base".into())
            .expect("pack");
        // every included id actually fits; nothing excluded is secretly counted
        assert!(budget.included_memory_ids.len() <= memories.len());
        assert!(budget.used_total <= 120);
    }

    #[test]
    fn fully_cached_chunks_never_need_a_tokenizer() {
        let memories: Vec<RankedItem<Memory>> = Vec::new();
        let chunk = RankedItem {
            inner: Chunk {
                id: "c1".into(),
                thread_id: String::new(),
                locator: "a.rs:1-2".into(),
                body: "fn a() {}".into(),
                symbol_name: "a".into(),
                symbol_kind: "function".into(),
                chunk_type: "function".into(),
                start_line: 1,
                end_line: 2,
                token_count: 10,
            },
            bm25: 0.0,
            fts_score: 0.0,
            fts_rank: 1,
            vector_score: 0.0,
            vector_rank: usize::MAX,
            rrf_score: 1.0,
            recency_bonus: 0.0,
            thread_bonus: 0.0,
            safety_penalty: 0.0,
            superseded: false,
            orphaned: false,
            final_score: 1.0,
        };

        let budget = pack_budget(
            100,
            0,
            &memories,
            &[chunk],
            |_| Cost::Cached(0),
            |c| Cost::Cached(c.token_count),
            || panic!("tokenizer should not be constructed when all costs are cached"),
        )
        .expect("pack");

        assert_eq!(budget.used_total, 10);
        assert!(budget.included_chunk_ids.contains("c1"));
    }
}
