//! Core domain types shared across mempack-core's subsystems.
//!
//! These types form the API contract between modules. Changing
//! them requires updating every consumer, so they should stay stable
//! and minimal.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Memory / Chunk
// ---------------------------------------------------------------------------

/// A durable note attached to a thread.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Memory {
    /// Opaque store-assigned identifier.
    pub id: String,
    /// Thread this memory belongs to.
    pub thread_id: String,
    /// Short title.
    pub title: String,
    /// Free-form body text.
    pub body: String,
    /// Tags. `session` and `needs_summary` carry ranking significance.
    pub tags: BTreeSet<String>,
    /// Git SHA this memory is anchored to, if any.
    pub anchor_commit: Option<String>,
    /// ID of the memory that superseded this one, if any.
    pub superseded_by: Option<String>,
    /// RFC-3339 UTC creation timestamp.
    pub created_at: String,
    /// RFC-3339 UTC last-update timestamp.
    pub updated_at: String,
}

/// A retrievable code fragment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Opaque store-assigned identifier.
    pub id: String,
    /// Thread this chunk is associated with, if any (may be empty).
    pub thread_id: String,
    /// `path:start-end` reference identifying the chunk's source span.
    pub locator: String,
    /// Chunk body bytes, as UTF-8 text.
    pub body: String,
    /// Declared symbol name, empty for line chunks.
    pub symbol_name: String,
    /// Declared symbol kind: `function`, `class`, `interface`, or empty.
    pub symbol_kind: String,
    /// `function`, `class`, `interface`, or `line`.
    pub chunk_type: String,
    /// 1-based inclusive start line.
    pub start_line: usize,
    /// 1-based inclusive end line.
    pub end_line: usize,
    /// Cached token count. Zero means uncached; the budgeter will
    /// require a counter to cost this chunk.
    pub token_count: usize,
}

// ---------------------------------------------------------------------------
// Chunker output
// ---------------------------------------------------------------------------

/// Kind of a chunk emitted by the semantic chunker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkType {
    /// A function or method, including `async` variants.
    Function,
    /// A class or class-like declaration.
    Class,
    /// An interface declaration (TypeScript only).
    Interface,
    /// A greedily token-packed span with no recognized symbol.
    Line,
}

impl ChunkType {
    /// The `symbol_kind` string a chunk of this type carries, or empty
    /// for line chunks.
    #[must_use]
    pub fn symbol_kind(self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Class => "class",
            Self::Interface => "interface",
            Self::Line => "",
        }
    }
}

/// A single unit produced by the semantic chunker.
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticChunk {
    /// Function, class, interface, or line.
    pub chunk_type: ChunkType,
    /// Declared identifier; empty for line chunks.
    pub symbol_name: String,
    /// 1-based inclusive start line.
    pub start_line: usize,
    /// 1-based inclusive end line.
    pub end_line: usize,
    /// Original bytes of the span, unmodified.
    pub body: String,
}

// ---------------------------------------------------------------------------
// Ranking
// ---------------------------------------------------------------------------

/// A scored, filtered wrapper around a `Memory` or `Chunk` produced by
/// the ranker.
#[derive(Debug, Clone)]
pub struct RankedItem<T> {
    /// The wrapped memory or chunk.
    pub inner: T,
    /// Raw BM25 score from the lexical search, 0.0 if absent.
    pub bm25: f64,
    /// Raw FTS score (alias of `bm25` in this implementation).
    pub fts_score: f64,
    /// 1-based rank in the lexical result set, `usize::MAX` if absent.
    pub fts_rank: usize,
    /// Cosine similarity from vector search, 0.0 if absent.
    pub vector_score: f64,
    /// 1-based rank in the vector result set, `usize::MAX` if absent.
    pub vector_rank: usize,
    /// Reciprocal-rank-fusion score.
    pub rrf_score: f64,
    /// Recency adjustment, clipped to `[0, 0.5]`.
    pub recency_bonus: f64,
    /// `0.1` if the item's thread was surfaced by a lexical memory match.
    pub thread_bonus: f64,
    /// `-0.25` for session/needs_summary-tagged memories, else `0.0`.
    pub safety_penalty: f64,
    /// Whether this item has been superseded by another.
    pub superseded: bool,
    /// Whether this memory's anchor commit is unreachable from HEAD.
    pub orphaned: bool,
    /// `rrf_score + recency_bonus + thread_bonus + safety_penalty`.
    pub final_score: f64,
}

impl<T> RankedItem<T> {
    /// Compute `final_score` from the additive components.
    pub fn recompute_final_score(&mut self) {
        self.final_score =
            self.rrf_score + self.recency_bonus + self.thread_bonus + self.safety_penalty;
    }
}

// ---------------------------------------------------------------------------
// Budget
// ---------------------------------------------------------------------------

/// Token-budget accounting produced by the budgeter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Budget {
    /// The ceiling passed in by the caller.
    pub target_total: usize,
    /// Tokens actually consumed by everything included.
    pub used_total: usize,
    /// IDs of memories included in the pack.
    pub included_memory_ids: BTreeSet<String>,
    /// IDs of chunks included in the pack.
    pub included_chunk_ids: BTreeSet<String>,
}

// ---------------------------------------------------------------------------
// Query
// ---------------------------------------------------------------------------

/// An optional temporal filter extracted from a raw query.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeHint {
    /// Only items updated at or after this RFC-3339 UTC timestamp pass.
    pub after: String,
}

/// The parsed form of a raw query string.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedQuery {
    /// Query text with directives stripped.
    pub text: String,
    /// Optional `after:` temporal hint.
    pub time_hint: Option<TimeHint>,
    /// Recency-boost multiplier, in `[1.0, 3.0]`.
    pub boost_recency: f64,
}

impl Default for ParsedQuery {
    fn default() -> Self {
        Self {
            text: String::new(),
            time_hint: None,
            boost_recency: 1.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Repo / store hits
// ---------------------------------------------------------------------------

/// Identity of the repository a build is scoped to.
#[derive(Debug, Clone, PartialEq)]
pub struct RepoInfo {
    /// Opaque store-assigned repo identifier.
    pub id: String,
    /// Absolute path to the repository's git root.
    pub root: PathBuf,
    /// Current HEAD commit SHA, used for orphan-reachability checks.
    pub head: String,
}

/// A lexical hit for a memory, as returned by `Store::search_memories`.
#[derive(Debug, Clone)]
pub struct MemoryHit {
    /// The matched memory.
    pub memory: Memory,
    /// Raw BM25 score.
    pub bm25: f64,
    /// 1-based rank in the result set.
    pub fts_rank: usize,
}

/// A lexical hit for a chunk, as returned by `Store::search_chunks`.
#[derive(Debug, Clone)]
pub struct ChunkHit {
    /// The matched chunk.
    pub chunk: Chunk,
    /// Raw BM25 score.
    pub bm25: f64,
    /// 1-based rank in the result set.
    pub fts_rank: usize,
}

/// A vector hit: an item id plus cosine similarity.
#[derive(Debug, Clone)]
pub struct VectorHit {
    /// ID of the matched memory or chunk.
    pub id: String,
    /// Cosine similarity score.
    pub score: f64,
}

/// The outcome of the vector-search leg of a build.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VectorStatus {
    /// Whether vector search results contributed to ranking.
    pub used: bool,
    /// Set when the embedder call failed or timed out.
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Context pack
// ---------------------------------------------------------------------------

/// The final bundle emitted to the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextPack {
    /// Repo id this pack was built for.
    pub repo: String,
    /// Workspace this pack was built for.
    pub workspace: String,
    /// Raw state JSON blob.
    pub state_raw: serde_json::Value,
    /// Provenance tag for `state_raw`: `db`, `.mempack/state.json`, `STATE.md`, or `empty`.
    pub state_source: String,
    /// RFC-3339 UTC timestamp the state was last updated, or empty.
    pub state_updated_at: String,
    /// Included memories, in final rank order.
    pub memories: Vec<Memory>,
    /// Included chunks, in final rank order.
    pub chunks: Vec<Chunk>,
    /// Token-budget accounting.
    pub budget: Budget,
    /// Outcome of the vector-search leg.
    pub vector_status: VectorStatus,
    /// Accumulated non-fatal warnings, in `<kind>:<message>` form.
    pub warnings: Vec<String>,
}

/// Per-candidate trace entry for the explain path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplainEntry {
    /// ID of the memory or chunk this entry describes.
    pub id: String,
    /// `"memory"` or `"chunk"`.
    pub kind: String,
    pub bm25: f64,
    pub fts_rank: Option<usize>,
    pub vector_score: f64,
    pub vector_rank: Option<usize>,
    pub rrf_score: f64,
    pub recency_bonus: f64,
    pub thread_bonus: f64,
    pub safety_penalty: f64,
    pub final_score: f64,
    pub superseded: bool,
    pub orphaned: bool,
    /// Whether the budgeter included this candidate in the final pack.
    pub budget_included: bool,
}

/// Full per-candidate trace for a build, emitted when tracing is requested.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExplainReport {
    /// One entry per candidate memory considered, included or not.
    pub memories: Vec<ExplainEntry>,
    /// One entry per candidate chunk considered, included or not.
    pub chunks: Vec<ExplainEntry>,
}
