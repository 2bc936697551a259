use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

use super::types::LabeledVectors;
use crate::error::ConfigError;
use crate::TARGET_EMBEDDING;

/// On-disk form of a [`LabeledVectors`] set.
#[derive(Debug, Serialize, Deserialize)]
pub struct VectorFile {
    pub dimension: usize,
    pub labels: Vec<String>,
    pub vectors: Vec<Vec<f32>>,
}

impl VectorFile {
    pub fn from_vectors(set: &LabeledVectors) -> Self {
        VectorFile {
            dimension: set.dim(),
            labels: set.labels().to_vec(),
            vectors: set
                .vectors()
                .outer_iter()
                .map(|row| row.to_vec())
                .collect(),
        }
    }

    pub fn into_vectors(self) -> Result<LabeledVectors> {
        let set = LabeledVectors::from_rows(self.labels, self.vectors)?;
        if !set.is_empty() && set.dim() != self.dimension {
            return Err(anyhow::anyhow!(
                "vector file declares {} dimensions but rows have {}",
                self.dimension,
                set.dim()
            ));
        }
        Ok(set)
    }
}

pub fn load_vectors(path: &Path) -> Result<LabeledVectors> {
    if !path.exists() {
        return Err(ConfigError::InputNotFound {
            path: path.to_path_buf(),
        }
        .into());
    }
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read vector file {}", path.display()))?;
    let file: VectorFile = serde_json::from_str(&json)
        .with_context(|| format!("Failed to parse vector file {}", path.display()))?;
    let set = file.into_vectors()?;
    info!(
        target: TARGET_EMBEDDING,
        "Loaded {} vectors ({} dimensions) from {}",
        set.len(),
        set.dim(),
        path.display()
    );
    Ok(set)
}

pub fn save_vectors(set: &LabeledVectors, path: &Path) -> Result<()> {
    let json = serde_json::to_string(&VectorFile::from_vectors(set))?;
    fs::write(path, json)
        .with_context(|| format!("Failed to write vector file {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_dimension_must_match_rows() {
        let file = VectorFile {
            dimension: 3,
            labels: vec!["a".to_string()],
            vectors: vec![vec![1.0, 0.0]],
        };
        assert!(file.into_vectors().is_err());
    }

    #[test]
    fn test_missing_file_is_input_not_found() {
        let err = load_vectors(Path::new("/nonexistent/techmap/vectors.json")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::InputNotFound { .. })
        ));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectors.json");
        let set = LabeledVectors::from_rows(
            vec!["自动化技术".to_string(), "涂层材料".to_string()],
            vec![vec![1.0, 0.0], vec![0.0, 1.0]],
        )
        .unwrap();
        save_vectors(&set, &path).unwrap();
        assert_eq!(load_vectors(&path).unwrap(), set);
    }
}
