use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::storage::{load_vectors, save_vectors};
use super::types::{l2_normalize_rows, LabeledVectors};
use super::Embedder;
use crate::error::ConfigError;
use crate::TARGET_EMBEDDING;

/// Vector cache addressed by the content of the label list.
///
/// A hit is only trusted when the stored label list is identical to the
/// requested one, in order; a matching row count alone is not enough.
pub struct EmbeddingCache {
    dir: PathBuf,
}

impl EmbeddingCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        EmbeddingCache { dir: dir.into() }
    }

    /// SHA-256 over length-prefixed labels, hex encoded.
    pub fn key_for(labels: &[String]) -> String {
        let mut hasher = Sha256::new();
        for label in labels {
            hasher.update((label.len() as u64).to_le_bytes());
            hasher.update(label.as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    pub fn load_or_compute(
        &self,
        labels: &[String],
        embedder: &dyn Embedder,
    ) -> Result<LabeledVectors> {
        let key = Self::key_for(labels);
        let path = self.path_for(&key);

        if path.exists() {
            let cached = load_vectors(&path)?;
            if cached.labels() != labels {
                return Err(ConfigError::CacheLabelMismatch { key }.into());
            }
            if cached.dim() != embedder.dimension() {
                warn!(
                    target: TARGET_EMBEDDING,
                    "Cached vectors under {} have {} dimensions, embedder has {}; recomputing",
                    key,
                    cached.dim(),
                    embedder.dimension()
                );
            } else {
                info!(
                    target: TARGET_EMBEDDING,
                    "Cache hit for {} labels ({})", labels.len(), key
                );
                return Ok(cached);
            }
        }

        info!(
            target: TARGET_EMBEDDING,
            "Cache miss for {} labels ({}), computing", labels.len(), key
        );
        let mut vectors = embedder.embed(labels)?;
        l2_normalize_rows(&mut vectors);
        let computed = LabeledVectors::new(labels.to_vec(), vectors)?;

        self.store(&path, &computed)?;
        Ok(computed)
    }

    fn store(&self, path: &Path, vectors: &LabeledVectors) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create cache directory {}", self.dir.display()))?;
        save_vectors(vectors, path)?;
        info!(target: TARGET_EMBEDDING, "Stored vectors in {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{LookupEmbedder, VectorFile};
    use ndarray::Array2;
    use std::cell::Cell;

    struct CountingEmbedder {
        calls: Cell<usize>,
    }

    impl Embedder for CountingEmbedder {
        fn dimension(&self) -> usize {
            2
        }

        fn embed(&self, texts: &[String]) -> Result<Array2<f32>> {
            self.calls.set(self.calls.get() + 1);
            Ok(Array2::from_elem((texts.len(), 2), 3.0))
        }
    }

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_key_depends_on_order_and_boundaries() {
        let a = EmbeddingCache::key_for(&labels(&["ab", "c"]));
        let b = EmbeddingCache::key_for(&labels(&["a", "bc"]));
        let c = EmbeddingCache::key_for(&labels(&["c", "ab"]));
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, EmbeddingCache::key_for(&labels(&["ab", "c"])));
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_second_call_is_served_from_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = EmbeddingCache::new(dir.path());
        let embedder = CountingEmbedder { calls: Cell::new(0) };
        let names = labels(&["产线自动化", "节能涂层"]);

        let first = cache.load_or_compute(&names, &embedder).unwrap();
        let second = cache.load_or_compute(&names, &embedder).unwrap();
        assert_eq!(embedder.calls.get(), 1);
        assert_eq!(first, second);
        // computed rows are normalised
        let row = first.row(0);
        assert!((row.dot(&row) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_tampered_cache_entry_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let cache = EmbeddingCache::new(dir.path());
        let names = labels(&["产线自动化"]);
        let key = EmbeddingCache::key_for(&names);

        let wrong = VectorFile {
            dimension: 2,
            labels: labels(&["别的标签"]),
            vectors: vec![vec![1.0, 0.0]],
        };
        fs::write(cache.path_for(&key), serde_json::to_string(&wrong).unwrap()).unwrap();

        let source = LabeledVectors::from_rows(names.clone(), vec![vec![1.0, 0.0]]).unwrap();
        let err = cache
            .load_or_compute(&names, &LookupEmbedder::new(source))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::CacheLabelMismatch { .. })
        ));
    }
}
