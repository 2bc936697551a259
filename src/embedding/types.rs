use anyhow::{anyhow, Result};
use ndarray::{Array2, ArrayView1, Axis};
use std::collections::HashMap;

use super::Embedder;
use crate::error::ConfigError;

/// Norms below this are treated as zero vectors and left untouched.
const MIN_NORM: f32 = 1e-12;

/// Text labels paired row-for-row with their vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledVectors {
    labels: Vec<String>,
    vectors: Array2<f32>,
}

impl LabeledVectors {
    pub fn new(labels: Vec<String>, vectors: Array2<f32>) -> Result<Self, ConfigError> {
        if labels.len() != vectors.nrows() {
            return Err(ConfigError::RowCountMismatch {
                expected: labels.len(),
                actual: vectors.nrows(),
            });
        }
        Ok(LabeledVectors { labels, vectors })
    }

    /// Builds from one `Vec` per label. All rows must share one length.
    pub fn from_rows(labels: Vec<String>, rows: Vec<Vec<f32>>) -> Result<Self> {
        if labels.len() != rows.len() {
            return Err(ConfigError::RowCountMismatch {
                expected: labels.len(),
                actual: rows.len(),
            }
            .into());
        }
        let dim = rows.first().map(Vec::len).unwrap_or(0);
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != dim) {
            return Err(anyhow!(
                "vector {} ({:?}) has {} dimensions, expected {}",
                i,
                labels[i],
                row.len(),
                dim
            ));
        }
        let flat: Vec<f32> = rows.into_iter().flatten().collect();
        let vectors = Array2::from_shape_vec((labels.len(), dim), flat)?;
        Ok(LabeledVectors::new(labels, vectors)?)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.vectors.ncols()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn vectors(&self) -> &Array2<f32> {
        &self.vectors
    }

    pub fn row(&self, index: usize) -> ArrayView1<'_, f32> {
        self.vectors.row(index)
    }

    /// Scales every row to unit length. Zero rows stay zero.
    pub fn normalized(mut self) -> Self {
        l2_normalize_rows(&mut self.vectors);
        self
    }
}

pub fn l2_normalize_rows(vectors: &mut Array2<f32>) {
    for mut row in vectors.axis_iter_mut(Axis(0)) {
        let norm = row.dot(&row).sqrt();
        if norm > MIN_NORM {
            row.mapv_inplace(|x| x / norm);
        }
    }
}

/// Serves vectors from a precomputed set, looking texts up by exact label.
pub struct LookupEmbedder {
    source: LabeledVectors,
    index: HashMap<String, usize>,
}

impl LookupEmbedder {
    pub fn new(source: LabeledVectors) -> Self {
        // first occurrence wins on duplicate labels
        let mut index = HashMap::with_capacity(source.len());
        for (i, label) in source.labels().iter().enumerate() {
            index.entry(label.clone()).or_insert(i);
        }
        LookupEmbedder { source, index }
    }
}

impl Embedder for LookupEmbedder {
    fn dimension(&self) -> usize {
        self.source.dim()
    }

    fn embed(&self, texts: &[String]) -> Result<Array2<f32>> {
        let mut out = Array2::<f32>::zeros((texts.len(), self.dimension()));
        for (i, text) in texts.iter().enumerate() {
            let row = self
                .index
                .get(text)
                .ok_or_else(|| anyhow!("no precomputed vector for {:?}", text))?;
            out.row_mut(i).assign(&self.source.row(*row));
        }
        Ok(out)
    }
}
