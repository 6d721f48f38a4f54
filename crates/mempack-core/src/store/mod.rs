//! Storage interface and reference implementation.
//!
//! `Store` is a seam: schema design, FTS indexing strategy, and vector
//! storage belong to whatever system owns the repository's database.
//! `SqliteStore` is a minimal, fully-functional implementation so this
//! crate is runnable and testable standalone, built on the usual
//! open-then-`ensure_schema` pragma pattern.

use std::path::Path;

use rusqlite::Connection;

use crate::error::{OmniError, OmniResult};
use crate::types::{Chunk, ChunkHit, Memory, MemoryHit, VectorHit};

const SCHEMA: &str = include_str!("schema.sql");

/// A state row as persisted by a `Store`.
#[derive(Debug, Clone)]
pub struct StateRow {
    /// The raw state JSON blob.
    pub raw: serde_json::Value,
    /// RFC-3339 UTC timestamp of last update.
    pub updated_at: String,
}

/// Storage seam for memories, chunks, state, and their vector embeddings.
///
/// Implementations own indexing strategy (FTS engine, vector index) and
/// are expected to be cheap to clone behind an `Arc` -- the runtime
/// caches one handle per repo id.
pub trait Store: Send + Sync {
    /// Fetch the current state row for a repo's workspace, if one exists.
    fn get_state_current(&self, repo_id: &str, workspace: &str) -> OmniResult<Option<StateRow>>;

    /// Upsert the current state row for a repo's workspace.
    fn put_state(&self, repo_id: &str, workspace: &str, row: &StateRow) -> OmniResult<()>;

    /// Lexical search over memories in `workspace`, best `k` by BM25.
    fn search_memories(
        &self,
        repo_id: &str,
        workspace: &str,
        query: &str,
        k: usize,
    ) -> OmniResult<Vec<MemoryHit>>;

    /// Lexical search over chunks in `workspace`, best `k` by BM25.
    fn search_chunks(
        &self,
        repo_id: &str,
        workspace: &str,
        query: &str,
        k: usize,
    ) -> OmniResult<Vec<ChunkHit>>;

    /// Vector search over memory embeddings, best `k` by cosine similarity.
    fn vector_search_memories(
        &self,
        repo_id: &str,
        workspace: &str,
        query_vector: &[f32],
        k: usize,
    ) -> OmniResult<Vec<VectorHit>>;

    /// Vector search over chunk embeddings, best `k` by cosine similarity.
    fn vector_search_chunks(
        &self,
        repo_id: &str,
        workspace: &str,
        query_vector: &[f32],
        k: usize,
    ) -> OmniResult<Vec<VectorHit>>;

    /// Fetch a single memory by id.
    fn get_memory(&self, repo_id: &str, id: &str) -> OmniResult<Option<Memory>>;

    /// Fetch a single chunk by id.
    fn get_chunk(&self, repo_id: &str, id: &str) -> OmniResult<Option<Chunk>>;

    /// Insert or replace a memory.
    fn put_memory(&self, repo_id: &str, workspace: &str, memory: &Memory) -> OmniResult<()>;

    /// Insert or replace a chunk.
    fn put_chunk(&self, repo_id: &str, workspace: &str, chunk: &Chunk) -> OmniResult<()>;

    /// Insert or replace an embedding for a memory or chunk.
    fn put_vector(
        &self,
        repo_id: &str,
        workspace: &str,
        id: &str,
        kind: &str,
        embedding: &[f32],
    ) -> OmniResult<()>;
}

/// SQLite-backed reference `Store`.
pub struct SqliteStore {
    conn: parking_lot::Mutex<Connection>,
}

impl SqliteStore {
    /// Open (creating if absent) a database file at `path`.
    pub fn open(path: &Path) -> OmniResult<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database, primarily for tests.
    pub fn open_in_memory() -> OmniResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> OmniResult<Self> {
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: parking_lot::Mutex::new(conn),
        })
    }

    fn row_to_memory(row: &rusqlite::Row<'_>) -> rusqlite::Result<Memory> {
        let tags_json: String = row.get("tags")?;
        let tags: std::collections::BTreeSet<String> =
            serde_json::from_str(&tags_json).unwrap_or_default();
        Ok(Memory {
            id: row.get("id")?,
            thread_id: row.get("thread_id")?,
            title: row.get("title")?,
            body: row.get("body")?,
            tags,
            anchor_commit: row.get("anchor_commit")?,
            superseded_by: row.get("superseded_by")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn row_to_chunk(row: &rusqlite::Row<'_>) -> rusqlite::Result<Chunk> {
        Ok(Chunk {
            id: row.get("id")?,
            thread_id: row.get("thread_id")?,
            locator: row.get("locator")?,
            body: row.get("body")?,
            symbol_name: row.get("symbol_name")?,
            symbol_kind: row.get("symbol_kind")?,
            chunk_type: row.get("chunk_type")?,
            start_line: row.get::<_, i64>("start_line")? as usize,
            end_line: row.get::<_, i64>("end_line")? as usize,
            token_count: row.get::<_, i64>("token_count")? as usize,
        })
    }

    fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
        blob.chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum();
    let norm_a: f64 = a.iter().map(|x| f64::from(*x) * f64::from(*x)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| f64::from(*x) * f64::from(*x)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

impl Store for SqliteStore {
    fn get_state_current(&self, repo_id: &str, workspace: &str) -> OmniResult<Option<StateRow>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT raw, updated_at FROM state WHERE repo_id = ?1 AND workspace = ?2")?;
        let mut rows = stmt.query(rusqlite::params![repo_id, workspace])?;
        if let Some(row) = rows.next()? {
            let raw_text: String = row.get(0)?;
            let raw = serde_json::from_str(&raw_text)?;
            let updated_at: String = row.get(1)?;
            Ok(Some(StateRow { raw, updated_at }))
        } else {
            Ok(None)
        }
    }

    fn put_state(&self, repo_id: &str, workspace: &str, row: &StateRow) -> OmniResult<()> {
        let conn = self.conn.lock();
        let raw_text = serde_json::to_string(&row.raw)?;
        conn.execute(
            "INSERT INTO state (repo_id, workspace, raw, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(repo_id, workspace) DO UPDATE SET raw = excluded.raw, updated_at = excluded.updated_at",
            rusqlite::params![repo_id, workspace, raw_text, row.updated_at],
        )?;
        Ok(())
    }

    fn search_memories(
        &self,
        repo_id: &str,
        workspace: &str,
        query: &str,
        k: usize,
    ) -> OmniResult<Vec<MemoryHit>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT m.id, m.thread_id, m.title, m.body, m.tags, m.anchor_commit,
                    m.superseded_by, m.created_at, m.updated_at, bm25(memories_fts) AS score
             FROM memories_fts
             JOIN memories m ON m.id = memories_fts.id
             WHERE memories_fts MATCH ?1 AND m.repo_id = ?2 AND m.workspace = ?3
             ORDER BY score
             LIMIT ?4",
        )?;
        let rows = stmt.query_map(
            rusqlite::params![query, repo_id, workspace, k as i64],
            |row| {
                let memory = Self::row_to_memory(row)?;
                let score: f64 = row.get("score")?;
                Ok((memory, score))
            },
        )?;

        let mut hits = Vec::new();
        for (rank, entry) in rows.enumerate() {
            let (memory, score) = entry.map_err(OmniError::from)?;
            hits.push(MemoryHit {
                memory,
                bm25: -score,
                fts_rank: rank + 1,
            });
        }
        Ok(hits)
    }

    fn search_chunks(
        &self,
        repo_id: &str,
        workspace: &str,
        query: &str,
        k: usize,
    ) -> OmniResult<Vec<ChunkHit>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT c.id, c.thread_id, c.locator, c.body, c.symbol_name, c.symbol_kind,
                    c.chunk_type, c.start_line, c.end_line, c.token_count, bm25(chunks_fts) AS score
             FROM chunks_fts
             JOIN chunks c ON c.id = chunks_fts.id
             WHERE chunks_fts MATCH ?1 AND c.repo_id = ?2 AND c.workspace = ?3
             ORDER BY score
             LIMIT ?4",
        )?;
        let rows = stmt.query_map(
            rusqlite::params![query, repo_id, workspace, k as i64],
            |row| {
                let chunk = Self::row_to_chunk(row)?;
                let score: f64 = row.get("score")?;
                Ok((chunk, score))
            },
        )?;

        let mut hits = Vec::new();
        for (rank, entry) in rows.enumerate() {
            let (chunk, score) = entry.map_err(OmniError::from)?;
            hits.push(ChunkHit {
                chunk,
                bm25: -score,
                fts_rank: rank + 1,
            });
        }
        Ok(hits)
    }

    fn vector_search_memories(
        &self,
        repo_id: &str,
        workspace: &str,
        query_vector: &[f32],
        k: usize,
    ) -> OmniResult<Vec<VectorHit>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, embedding FROM vectors WHERE repo_id = ?1 AND workspace = ?2 AND kind = 'memory'",
        )?;
        let rows = stmt.query_map(rusqlite::params![repo_id, workspace], |row| {
            let id: String = row.get(0)?;
            let blob: Vec<u8> = row.get(1)?;
            Ok((id, blob))
        })?;

        let mut scored: Vec<VectorHit> = Vec::new();
        for entry in rows {
            let (id, blob) = entry.map_err(OmniError::from)?;
            let embedding = Self::blob_to_embedding(&blob);
            let score = cosine_similarity(query_vector, &embedding);
            scored.push(VectorHit { id, score });
        }
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    fn vector_search_chunks(
        &self,
        repo_id: &str,
        workspace: &str,
        query_vector: &[f32],
        k: usize,
    ) -> OmniResult<Vec<VectorHit>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, embedding FROM vectors WHERE repo_id = ?1 AND workspace = ?2 AND kind = 'chunk'",
        )?;
        let rows = stmt.query_map(rusqlite::params![repo_id, workspace], |row| {
            let id: String = row.get(0)?;
            let blob: Vec<u8> = row.get(1)?;
            Ok((id, blob))
        })?;

        let mut scored: Vec<VectorHit> = Vec::new();
        for entry in rows {
            let (id, blob) = entry.map_err(OmniError::from)?;
            let embedding = Self::blob_to_embedding(&blob);
            let score = cosine_similarity(query_vector, &embedding);
            scored.push(VectorHit { id, score });
        }
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    fn get_memory(&self, repo_id: &str, id: &str) -> OmniResult<Option<Memory>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT * FROM memories WHERE repo_id = ?1 AND id = ?2")?;
        let mut rows = stmt.query(rusqlite::params![repo_id, id])?;
        match rows.next()? {
            Some(row) => Ok(Some(Self::row_to_memory(row)?)),
            None => Ok(None),
        }
    }

    fn get_chunk(&self, repo_id: &str, id: &str) -> OmniResult<Option<Chunk>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT * FROM chunks WHERE repo_id = ?1 AND id = ?2")?;
        let mut rows = stmt.query(rusqlite::params![repo_id, id])?;
        match rows.next()? {
            Some(row) => Ok(Some(Self::row_to_chunk(row)?)),
            None => Ok(None),
        }
    }

    fn put_memory(&self, repo_id: &str, workspace: &str, memory: &Memory) -> OmniResult<()> {
        let conn = self.conn.lock();
        let tags_json = serde_json::to_string(&memory.tags)?;
        conn.execute(
            "INSERT INTO memories (id, repo_id, workspace, thread_id, title, body, tags,
                anchor_commit, superseded_by, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(id) DO UPDATE SET
                thread_id = excluded.thread_id, title = excluded.title, body = excluded.body,
                tags = excluded.tags, anchor_commit = excluded.anchor_commit,
                superseded_by = excluded.superseded_by, updated_at = excluded.updated_at",
            rusqlite::params![
                memory.id,
                repo_id,
                workspace,
                memory.thread_id,
                memory.title,
                memory.body,
                tags_json,
                memory.anchor_commit,
                memory.superseded_by,
                memory.created_at,
                memory.updated_at,
            ],
        )?;
        Ok(())
    }

    fn put_chunk(&self, repo_id: &str, workspace: &str, chunk: &Chunk) -> OmniResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO chunks (id, repo_id, workspace, thread_id, locator, body,
                symbol_name, symbol_kind, chunk_type, start_line, end_line, token_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT(id) DO UPDATE SET
                locator = excluded.locator, body = excluded.body, symbol_name = excluded.symbol_name,
                symbol_kind = excluded.symbol_kind, chunk_type = excluded.chunk_type,
                start_line = excluded.start_line, end_line = excluded.end_line,
                token_count = excluded.token_count",
            rusqlite::params![
                chunk.id,
                repo_id,
                workspace,
                chunk.thread_id,
                chunk.locator,
                chunk.body,
                chunk.symbol_name,
                chunk.symbol_kind,
                chunk.chunk_type,
                chunk.start_line as i64,
                chunk.end_line as i64,
                chunk.token_count as i64,
            ],
        )?;
        Ok(())
    }

    fn put_vector(
        &self,
        repo_id: &str,
        workspace: &str,
        id: &str,
        kind: &str,
        embedding: &[f32],
    ) -> OmniResult<()> {
        let conn = self.conn.lock();
        let blob = Self::embedding_to_blob(embedding);
        conn.execute(
            "INSERT INTO vectors (id, kind, repo_id, workspace, embedding) VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id, kind) DO UPDATE SET embedding = excluded.embedding",
            rusqlite::params![id, kind, repo_id, workspace, blob],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_memory(id: &str) -> Memory {
        Memory {
            id: id.into(),
            thread_id: "thread-1".into(),
            title: "Rate limiter design".into(),
            body: "Use a token bucket for the API gateway".into(),
            tags: std::collections::BTreeSet::new(),
            anchor_commit: None,
            superseded_by: None,
            created_at: "2026-01-01T00:00:00Z".into(),
            updated_at: "2026-01-01T00:00:00Z".into(),
        }
    }

    #[test]
    fn put_and_search_memories_round_trips() {
        let store = SqliteStore::open_in_memory().expect("open");
        store.put_memory("repo1", "default", &sample_memory("mem1")).expect("put");

        let hits = store.search_memories("repo1", "default", "token bucket", 10).expect("search");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].memory.id, "mem1");
        assert_eq!(hits[0].fts_rank, 1);
    }

    #[test]
    fn vector_search_orders_by_cosine_similarity() {
        let store = SqliteStore::open_in_memory().expect("open");
        store.put_vector("repo1", "default", "a", "memory", &[1.0, 0.0]).expect("put a");
        store.put_vector("repo1", "default", "b", "memory", &[0.0, 1.0]).expect("put b");

        let hits = store
            .vector_search_memories("repo1", "default", &[1.0, 0.0], 10)
            .expect("search");
        assert_eq!(hits[0].id, "a");
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn get_memory_returns_none_for_unknown_id() {
        let store = SqliteStore::open_in_memory().expect("open");
        assert!(store.get_memory("repo1", "nope").expect("get").is_none());
    }
}
