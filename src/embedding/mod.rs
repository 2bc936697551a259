// Embeddings are produced outside this crate; everything here only moves,
// validates and caches them.
pub mod cache;
pub mod storage;
pub mod types;

pub use cache::EmbeddingCache;
pub use storage::VectorFile;
pub use types::*;

use anyhow::Result;
use ndarray::Array2;

/// Text → vector source. Rows of the returned matrix follow `texts`.
pub trait Embedder {
    fn dimension(&self) -> usize;

    fn embed(&self, texts: &[String]) -> Result<Array2<f32>>;
}
