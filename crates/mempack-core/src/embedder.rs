//! Embedding interface and local stub implementation.
//!
//! `Embedder` is a seam: the real embedding provider (an HTTP call to a
//! local or remote model server) is out of scope here. `HashProjectionEmbedder`
//! exists so this crate
//! runs standalone and deterministically in tests, without a network
//! dependency.

use crate::error::OmniResult;

/// Produces a fixed-dimension embedding for a string of text.
pub trait Embedder: Send + Sync {
    /// Embed `text`, returning a vector of `dims()` length.
    fn embed(&self, text: &str) -> OmniResult<Vec<f32>>;

    /// The dimensionality of vectors this embedder produces.
    fn dims(&self) -> usize;
}

/// Deterministic local stand-in for a real embedding model: hashes
/// overlapping trigrams into a fixed-width vector and L2-normalizes it.
/// Not semantically meaningful, but stable and dependency-free, so the
/// rest of the pipeline (vector search, RRF fusion) is exercisable
/// without a model server.
pub struct HashProjectionEmbedder {
    dims: usize,
}

impl HashProjectionEmbedder {
    /// Build an embedder that projects into `dims` dimensions.
    #[must_use]
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }
}

impl Default for HashProjectionEmbedder {
    fn default() -> Self {
        Self::new(64)
    }
}

impl Embedder for HashProjectionEmbedder {
    fn embed(&self, text: &str) -> OmniResult<Vec<f32>> {
        let mut v = vec![0.0f32; self.dims];
        let bytes: Vec<u8> = text.to_lowercase().into_bytes();

        if bytes.is_empty() {
            return Ok(v);
        }

        let window = 3.min(bytes.len());
        for trigram in bytes.windows(window) {
            let bucket = fnv1a(trigram) as usize % self.dims;
            v[bucket] += 1.0;
        }

        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        Ok(v)
    }

    fn dims(&self) -> usize {
        self.dims
    }
}

/// FNV-1a hash, used only to bucket trigrams deterministically.
fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embed_is_deterministic() {
        let embedder = HashProjectionEmbedder::default();
        let a = embedder.embed("rate limiter design").expect("embed");
        let b = embedder.embed("rate limiter design").expect("embed");
        assert_eq!(a, b);
    }

    #[test]
    fn embed_of_empty_string_is_zero_vector() {
        let embedder = HashProjectionEmbedder::default();
        let v = embedder.embed("").expect("embed");
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn embed_is_l2_normalized_for_nonempty_input() {
        let embedder = HashProjectionEmbedder::default();
        let v = embedder.embed("hybrid search ranking").expect("embed");
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn similar_text_has_nonzero_overlap() {
        let embedder = HashProjectionEmbedder::default();
        let a = embedder.embed("token bucket rate limiter").expect("embed");
        let b = embedder.embed("token bucket throttling").expect("embed");
        let dot: f32 = a.iter().zip(&b).map(|(x, y)| x * y).sum();
        assert!(dot > 0.0);
    }
}
