use anyhow::Result;
use ndarray::ArrayView1;
use std::cmp::Ordering;
use tracing::{debug, info};

use super::similarity::similarity_matrix;
use super::types::{MatchRow, RankedMatch};
use crate::config::PipelineConfig;
use crate::embedding::LabeledVectors;
use crate::{PROGRESS_EVERY, TARGET_MATCH};

/// Ranks external labels for every internal item by cosine similarity.
pub struct TopKMatcher {
    top_k: usize,
    min_score: f32,
}

impl TopKMatcher {
    pub fn new(config: &PipelineConfig) -> Self {
        TopKMatcher {
            top_k: config.top_k,
            min_score: config.min_score,
        }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// One [`MatchRow`] per internal item, in input order.
    ///
    /// Fails before producing any row if the two sets have different
    /// dimensions.
    pub fn match_all(
        &self,
        internal: &LabeledVectors,
        external: &LabeledVectors,
    ) -> Result<Vec<MatchRow>> {
        let similarity = similarity_matrix(internal, external)?;
        let labels = external.labels();

        let mut rows = Vec::with_capacity(internal.len());
        let mut below_threshold = 0usize;

        for (i, scores) in similarity.outer_iter().enumerate() {
            let matches: Vec<RankedMatch> = top_k_indices(scores, self.top_k)
                .into_iter()
                .map(|j| {
                    let score = scores[j];
                    if score >= self.min_score {
                        RankedMatch::new(&labels[j], score)
                    } else {
                        below_threshold += 1;
                        RankedMatch::below_threshold(&labels[j], score)
                    }
                })
                .collect();

            rows.push(MatchRow {
                label: internal.labels()[i].clone(),
                matches,
            });

            if (i + 1) % PROGRESS_EVERY == 0 {
                debug!(target: TARGET_MATCH, "Ranked {}/{} items", i + 1, internal.len());
            }
        }

        info!(
            target: TARGET_MATCH,
            "Matched {} items against {} labels (top {}, {} ranks below {:.2})",
            rows.len(),
            external.len(),
            self.top_k,
            below_threshold,
            self.min_score
        );
        Ok(rows)
    }
}

// Descending score, then ascending index. NaN ranks last.
fn rank_order(scores: &ArrayView1<'_, f32>, a: usize, b: usize) -> Ordering {
    let key = |i: usize| {
        let s = scores[i];
        if s.is_nan() {
            f32::NEG_INFINITY
        } else {
            s
        }
    };
    key(b).total_cmp(&key(a)).then(a.cmp(&b))
}

/// Indices of the `k` highest scores, best first. Equal scores keep their
/// original index order, so the result is the prefix of a stable descending
/// sort.
pub fn top_k_indices(scores: ArrayView1<'_, f32>, k: usize) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..scores.len()).collect();
    let k = k.min(indices.len());
    if k == 0 {
        return Vec::new();
    }
    if k < indices.len() {
        indices.select_nth_unstable_by(k - 1, |&a, &b| rank_order(&scores, a, b));
        indices.truncate(k);
    }
    indices.sort_by(|&a, &b| rank_order(&scores, a, b));
    indices
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;

    fn set(labels: &[&str], rows: Vec<Vec<f32>>) -> LabeledVectors {
        LabeledVectors::from_rows(labels.iter().map(|s| s.to_string()).collect(), rows).unwrap()
    }

    fn matcher(top_k: usize, min_score: f32) -> TopKMatcher {
        TopKMatcher::new(&PipelineConfig {
            top_k,
            min_score,
            ..Default::default()
        })
    }

    #[test]
    fn test_ties_prefer_lower_index() {
        let scores = arr1(&[0.5f32, 0.9, 0.5, 0.9, 0.1]);
        assert_eq!(top_k_indices(scores.view(), 3), vec![1, 3, 0]);
        assert_eq!(top_k_indices(scores.view(), 10), vec![1, 3, 0, 2, 4]);
        assert!(top_k_indices(scores.view(), 0).is_empty());
    }

    #[test]
    fn test_nan_ranks_last() {
        let scores = arr1(&[f32::NAN, 0.2, 0.3]);
        assert_eq!(top_k_indices(scores.view(), 3), vec![2, 1, 0]);
    }

    #[test]
    fn test_repeated_runs_are_identical() {
        let internal = set(&["a", "b"], vec![vec![1.0, 0.0], vec![0.6, 0.8]]);
        let external = set(
            &["x", "y", "z", "w"],
            vec![vec![1.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0], vec![0.6, 0.8]],
        );
        let m = matcher(3, 0.0);
        let first = m.match_all(&internal, &external).unwrap();
        for _ in 0..5 {
            assert_eq!(m.match_all(&internal, &external).unwrap(), first);
        }
        let labels: Vec<&str> = first[0].matches.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["x", "y", "w"]);
    }

    #[test]
    fn test_below_threshold_ranks_are_flagged_not_dropped() {
        let internal = set(&["a"], vec![vec![1.0, 0.0]]);
        let external = set(
            &["x", "y", "z"],
            vec![vec![1.0, 0.0], vec![0.6, 0.8], vec![0.0, 1.0]],
        );
        let rows = matcher(3, 0.5).match_all(&internal, &external).unwrap();
        let matches = &rows[0].matches;
        assert_eq!(matches.len(), 3);
        assert!(!matches[0].below_threshold);
        assert!(!matches[1].below_threshold);
        assert!(matches[2].below_threshold);
        assert_eq!(matches[2].label, "z");
    }

    #[test]
    fn test_fewer_labels_than_k() {
        let internal = set(&["a"], vec![vec![1.0, 0.0]]);
        let external = set(&["x"], vec![vec![1.0, 0.0]]);
        let rows = matcher(3, 0.0).match_all(&internal, &external).unwrap();
        assert_eq!(rows[0].matches.len(), 1);
    }

    #[test]
    fn test_end_to_end_example() {
        let internal = set(&["产线自动化", "节能涂层"], vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
        let external = set(&["自动化技术", "涂层材料"], vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
        let rows = matcher(1, 0.0).match_all(&internal, &external).unwrap();
        assert_eq!(rows[0].label, "产线自动化");
        assert_eq!(rows[0].matches, vec![RankedMatch::new("自动化技术", 1.0)]);
        assert_eq!(rows[1].label, "节能涂层");
        assert_eq!(rows[1].matches, vec![RankedMatch::new("涂层材料", 1.0)]);
    }
}
