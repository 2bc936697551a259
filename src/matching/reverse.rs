use std::collections::BTreeMap;
use tracing::{debug, info};

use super::types::{MatchRow, RankedMatch};
use crate::TARGET_MATCH;

/// Best internal owner observed for one external leaf label.
#[derive(Debug, Clone, PartialEq)]
pub struct ReverseIndexEntry {
    pub internal_path: String,
    pub score: f32,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReverseIndexStats {
    pub rows: usize,
    pub matches_seen: usize,
    /// Flagged or empty matches that produced no key.
    pub unusable_matches: usize,
    /// Times an existing entry was displaced by a strictly better score.
    pub replacements: usize,
}

/// External leaf key to the single highest-scoring internal path.
///
/// An entry is only replaced by a strictly greater score, so the stored score
/// for each key is the maximum seen regardless of input order. When two sources
/// tie exactly, the one seen first keeps the key.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReverseIndex {
    entries: BTreeMap<String, ReverseIndexEntry>,
}

impl ReverseIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the index from the label mapping table, where each row's label is
    /// the internal item's full path.
    pub fn from_match_rows(rows: &[MatchRow]) -> (Self, ReverseIndexStats) {
        Self::build(rows.iter().map(|row| (row.label.as_str(), row.matches.as_slice())))
    }

    /// Builds the index from `(source full path, ranked matches)` pairs.
    pub fn build<'a, I>(rows: I) -> (Self, ReverseIndexStats)
    where
        I: IntoIterator<Item = (&'a str, &'a [RankedMatch])>,
    {
        let mut index = Self::new();
        let mut stats = ReverseIndexStats::default();

        for (source, matches) in rows {
            stats.rows += 1;
            let source = source.trim();
            for ranked in matches {
                stats.matches_seen += 1;
                let key = ranked.leaf_key();
                if key.is_empty() {
                    stats.unusable_matches += 1;
                    continue;
                }
                if index.offer(key, source, ranked.score) {
                    stats.replacements += 1;
                }
            }
        }

        info!(
            target: TARGET_MATCH,
            "Reverse index holds {} keys from {} rows ({} matches, {} unusable, {} replacements)",
            index.len(),
            stats.rows,
            stats.matches_seen,
            stats.unusable_matches,
            stats.replacements
        );
        (index, stats)
    }

    /// Records `source` for `key` if `score` beats the stored one. Returns true
    /// when an existing entry was replaced.
    pub fn offer(&mut self, key: String, source: &str, score: f32) -> bool {
        let best = self
            .entries
            .get(&key)
            .map(|entry| entry.score)
            .unwrap_or(f32::NEG_INFINITY);
        // NaN never compares greater, so it never wins
        if score > best {
            let replaced = self.entries.contains_key(&key);
            if replaced {
                debug!(
                    target: TARGET_MATCH,
                    "{} now attributed to {} ({:.4} > {:.4})", key, source, score, best
                );
            }
            self.entries.insert(
                key,
                ReverseIndexEntry {
                    internal_path: source.to_string(),
                    score,
                },
            );
            replaced
        } else {
            false
        }
    }

    pub fn get(&self, key: &str) -> Option<&ReverseIndexEntry> {
        self.entries.get(key)
    }

    /// Internal path attributed to a leaf key, if any.
    pub fn lookup(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(|entry| entry.internal_path.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ReverseIndexEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::seq::SliceRandom;

    fn row(label: &str, matches: &[(&str, f32)]) -> MatchRow {
        MatchRow {
            label: label.to_string(),
            matches: matches
                .iter()
                .map(|(l, s)| RankedMatch::new(l, *s))
                .collect(),
        }
    }

    fn sample_rows() -> Vec<MatchRow> {
        vec![
            row("制造 > 产线自动化", &[("先进制造-自动化技术", 0.81), ("先进制造-机器人", 0.60)]),
            row("制造 > 机器人集成", &[("先进制造-机器人", 0.92), ("先进制造_自动化技术", 0.70)]),
            row("材料 > 节能涂层", &[("新材料—涂层材料", 0.88), ("先进制造-自动化技术", 0.40)]),
            row("材料 > 表面处理", &[("涂层材料", 0.75), ("新材料-功能薄膜", 0.55)]),
        ]
    }

    #[test]
    fn test_two_internal_labels_share_a_leaf() {
        let rows = vec![
            row("产线自动化", &[("自动化技术", 1.0)]),
            row("节能涂层", &[("涂层材料", 1.0)]),
        ];
        let (index, _) = ReverseIndex::from_match_rows(&rows);
        assert_eq!(index.lookup("自动化技术"), Some("产线自动化"));
        assert_eq!(index.lookup("涂层材料"), Some("节能涂层"));
        assert_eq!(index.get("自动化技术").unwrap().score, 1.0);
    }

    #[test]
    fn test_stored_score_is_the_maximum() {
        let rows = sample_rows();
        let (index, stats) = ReverseIndex::from_match_rows(&rows);

        let mut expected: BTreeMap<String, f32> = BTreeMap::new();
        for r in &rows {
            for m in &r.matches {
                let best = expected.entry(m.leaf_key()).or_insert(f32::NEG_INFINITY);
                *best = best.max(m.score);
            }
        }
        assert_eq!(index.len(), expected.len());
        for (key, score) in expected {
            assert_eq!(index.get(&key).unwrap().score, score, "{}", key);
        }
        assert_eq!(index.lookup("自动化技术"), Some("制造 > 产线自动化"));
        assert_eq!(index.lookup("机器人"), Some("制造 > 机器人集成"));
        assert_eq!(index.lookup("涂层材料"), Some("材料 > 节能涂层"));
        assert_eq!(stats.replacements, 1);
    }

    #[test]
    fn test_exact_tie_keeps_first() {
        let rows = vec![
            row("甲", &[("A-涂层材料", 0.9)]),
            row("乙", &[("涂层材料", 0.9)]),
        ];
        let (index, stats) = ReverseIndex::from_match_rows(&rows);
        assert_eq!(index.lookup("涂层材料"), Some("甲"));
        assert_eq!(stats.replacements, 0);
    }

    #[test]
    fn test_shuffled_input_keeps_scores() {
        let rows = sample_rows();
        let (reference, _) = ReverseIndex::from_match_rows(&rows);

        let mut rng = rand::rng();
        for _ in 0..20 {
            let mut shuffled = rows.clone();
            shuffled.shuffle(&mut rng);
            let (index, _) = ReverseIndex::from_match_rows(&shuffled);
            // no exact ties in the sample, so paths are stable too
            assert_eq!(index, reference);
        }
    }

    #[test]
    fn test_flagged_matches_produce_no_key() {
        let rows = vec![MatchRow {
            label: "甲".to_string(),
            matches: vec![
                RankedMatch::below_threshold("涂层材料", 0.1),
                RankedMatch::new("", 0.5),
            ],
        }];
        let (index, stats) = ReverseIndex::from_match_rows(&rows);
        assert!(index.is_empty());
        assert_eq!(stats.unusable_matches, 2);
    }
}
