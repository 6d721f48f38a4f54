//! Hybrid ranker: fuses lexical and vector result sets with
//! reciprocal rank fusion, then layers on recency, thread, and safety
//! adjustments before applying exclusion filters.

use std::collections::HashSet;

use crate::types::{Chunk, Memory, RankedItem};

/// RRF's rank-damping constant. A fixed, untuned value.
const RRF_K: f64 = 60.0;

/// Half-life-ish decay constant for `recency_bonus`, in days.
const RECENCY_DECAY_DAYS: f64 = 14.0;
const RECENCY_BONUS_MAX: f64 = 0.5;
const THREAD_BONUS: f64 = 0.1;
const SAFETY_PENALTY: f64 = -0.25;

/// Input bundle for ranking one item (memory or chunk).
pub struct RankInput<T> {
    /// The candidate itself.
    pub inner: T,
    /// BM25 score, if the item was a lexical hit.
    pub bm25: Option<f64>,
    /// 1-based lexical rank, if the item was a lexical hit.
    pub fts_rank: Option<usize>,
    /// Cosine similarity, if the item was a vector hit.
    pub vector_score: Option<f64>,
    /// 1-based vector rank, if the item was a vector hit.
    pub vector_rank: Option<usize>,
}

fn rrf_component(rank: Option<usize>) -> f64 {
    match rank {
        Some(r) => 1.0 / (RRF_K + r as f64),
        None => 0.0,
    }
}

/// Fuse lexical and vector legs into a single `RankedItem` via RRF,
/// without yet applying recency/thread/safety or exclusion filters.
fn fuse<T>(input: RankInput<T>) -> RankedItem<T> {
    let rrf_score = rrf_component(input.fts_rank) + rrf_component(input.vector_rank);
    let mut item = RankedItem {
        inner: input.inner,
        bm25: input.bm25.unwrap_or(0.0),
        fts_score: input.bm25.unwrap_or(0.0),
        fts_rank: input.fts_rank.unwrap_or(usize::MAX),
        vector_score: input.vector_score.unwrap_or(0.0),
        vector_rank: input.vector_rank.unwrap_or(usize::MAX),
        rrf_score,
        recency_bonus: 0.0,
        thread_bonus: 0.0,
        safety_penalty: 0.0,
        superseded: false,
        orphaned: false,
        final_score: 0.0,
    };
    item.recompute_final_score();
    item
}

/// `recency_multiplier * exp(-age_days / 14)`, clipped to `[0, 0.5]`.
#[must_use]
pub fn recency_bonus(age_days: f64, recency_multiplier: f64) -> f64 {
    let raw = recency_multiplier * (-age_days / RECENCY_DECAY_DAYS).exp();
    raw.clamp(0.0, RECENCY_BONUS_MAX)
}

/// True if `tags` carry ranking-significant safety tags.
#[must_use]
pub fn is_safety_tagged(tags: &std::collections::BTreeSet<String>) -> bool {
    tags.contains("session") || tags.contains("needs_summary")
}

/// Rank memory candidates: fuse, apply recency/safety, filter out
/// superseded and orphaned items (unless opted in), sort deterministically.
#[allow(clippy::too_many_arguments)]
pub fn rank_memories(
    inputs: Vec<RankInput<Memory>>,
    now_age_days: impl Fn(&Memory) -> f64,
    boost_recency: f64,
    superseded_ids: &HashSet<String>,
    orphaned_ids: &HashSet<String>,
    matched_thread_ids: &HashSet<String>,
    include_superseded: bool,
    include_orphans: bool,
    time_filter_after: Option<&str>,
) -> Vec<RankedItem<Memory>> {
    let mut ranked: Vec<RankedItem<Memory>> = inputs
        .into_iter()
        .map(fuse)
        .filter(|item| match time_filter_after {
            Some(after) => item.inner.updated_at.as_str() >= after,
            None => true,
        })
        .map(|mut item| {
            item.superseded = superseded_ids.contains(&item.inner.id);
            item.orphaned = orphaned_ids.contains(&item.inner.id);
            item.recency_bonus = recency_bonus(now_age_days(&item.inner), boost_recency);
            if matched_thread_ids.contains(&item.inner.thread_id) {
                item.thread_bonus = THREAD_BONUS;
            }
            if is_safety_tagged(&item.inner.tags) {
                item.safety_penalty = SAFETY_PENALTY;
            }
            item.recompute_final_score();
            item
        })
        .filter(|item| include_superseded || !item.superseded)
        .filter(|item| include_orphans || !item.orphaned)
        .collect();

    sort_ranked(&mut ranked, |item| &item.inner.id, |item| &item.inner.updated_at);
    ranked
}

/// Rank chunk candidates: fuse, apply recency and thread bonus, sort
/// deterministically. Chunks carry no supersedence/orphan state.
pub fn rank_chunks(
    inputs: Vec<RankInput<Chunk>>,
    matched_thread_ids: &HashSet<String>,
) -> Vec<RankedItem<Chunk>> {
    let mut ranked: Vec<RankedItem<Chunk>> = inputs
        .into_iter()
        .map(fuse)
        .map(|mut item| {
            if matched_thread_ids.contains(&item.inner.thread_id) {
                item.thread_bonus = THREAD_BONUS;
            }
            item.recompute_final_score();
            item
        })
        .collect();

    sort_ranked(&mut ranked, |item| &item.inner.id, |_| "");
    ranked
}

/// Sort by `final_score` descending, tie-broken by `updated_at` descending
/// then `id` ascending, for a total, deterministic order.
fn sort_ranked<T>(
    items: &mut [RankedItem<T>],
    id_of: impl Fn(&RankedItem<T>) -> &str,
    updated_at_of: impl Fn(&RankedItem<T>) -> &str,
) {
    items.sort_by(|a, b| {
        b.final_score
            .partial_cmp(&a.final_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| updated_at_of(b).cmp(updated_at_of(a)))
            .then_with(|| id_of(a).cmp(id_of(b)))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn memory(id: &str, updated_at: &str, tags: &[&str]) -> Memory {
        Memory {
            id: id.into(),
            thread_id: "t1".into(),
            title: "t".into(),
            body: "b".into(),
            tags: tags.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
            anchor_commit: None,
            superseded_by: None,
            created_at: updated_at.into(),
            updated_at: updated_at.into(),
        }
    }

    fn input(m: Memory, fts_rank: Option<usize>, vector_rank: Option<usize>) -> RankInput<Memory> {
        RankInput {
            inner: m,
            bm25: fts_rank.map(|_| 1.0),
            fts_rank,
            vector_score: vector_rank.map(|_| 0.9),
            vector_rank,
        }
    }

    #[test]
    fn rrf_rewards_items_ranked_well_on_both_legs() {
        let a = fuse(input(memory("a", "2026-01-01T00:00:00Z", &[]), Some(1), Some(1)));
        let b = fuse(input(memory("b", "2026-01-01T00:00:00Z", &[]), Some(1), None));
        assert!(a.rrf_score > b.rrf_score);
    }

    #[test]
    fn safety_tagged_memories_are_penalized_not_excluded() {
        let inputs = vec![input(memory("a", "2026-01-01T00:00:00Z", &["session"]), Some(1), None)];
        let ranked = rank_memories(
            inputs,
            |_| 0.0,
            1.0,
            &HashSet::new(),
            &HashSet::new(),
            &HashSet::new(),
            false,
            false,
            None,
        );
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].safety_penalty, -0.25);
    }

    #[test]
    fn superseded_items_excluded_unless_opted_in() {
        let inputs = vec![input(memory("a", "2026-01-01T00:00:00Z", &[]), Some(1), None)];
        let mut superseded = HashSet::new();
        superseded.insert("a".to_string());

        let excluded = rank_memories(
            inputs,
            |_| 0.0,
            1.0,
            &superseded,
            &HashSet::new(),
            &HashSet::new(),
            false,
            false,
            None,
        );
        assert!(excluded.is_empty());
    }

    #[test]
    fn sort_is_deterministic_on_ties() {
        let inputs = vec![
            input(memory("b", "2026-01-01T00:00:00Z", &[]), Some(1), None),
            input(memory("a", "2026-01-01T00:00:00Z", &[]), Some(1), None),
        ];
        let ranked = rank_memories(
            inputs,
            |_| 0.0,
            1.0,
            &HashSet::new(),
            &HashSet::new(),
            &HashSet::new(),
            false,
            false,
            None,
        );
        // equal final_score and updated_at -> id ascending
        assert_eq!(ranked[0].inner.id, "a");
        assert_eq!(ranked[1].inner.id, "b");
    }

    #[test]
    fn time_filter_excludes_items_updated_before_cutoff() {
        let inputs = vec![
            input(memory("old", "2025-01-01T00:00:00Z", &[]), Some(1), None),
            input(memory("new", "2026-06-01T00:00:00Z", &[]), Some(1), None),
        ];
        let ranked = rank_memories(
            inputs,
            |_| 0.0,
            1.0,
            &HashSet::new(),
            &HashSet::new(),
            &HashSet::new(),
            false,
            false,
            Some("2026-01-01T00:00:00Z"),
        );
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].inner.id, "new");
    }

    #[test]
    fn recency_bonus_is_clamped() {
        assert!((recency_bonus(0.0, 1.0) - 0.5).abs() < 1e-9);
        assert!(recency_bonus(10_000.0, 1.0) >= 0.0);
        assert!(recency_bonus(0.0, 10.0) <= 0.5);
    }
}
