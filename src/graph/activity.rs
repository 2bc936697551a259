use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use strsim::jaro_winkler;
use unicode_normalization::UnicodeNormalization;

use crate::normalize::canonical_path;
use crate::report::ProjectReportRow;

pub const DEFAULT_FUZZY_THRESHOLD: f64 = 0.92;

/// How an internal label from the mapping table is matched to the internal
/// paths counted in the report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActivityMatch {
    /// Canonical paths must be equal.
    Exact,
    /// One canonical path is a whole-segment suffix of the other. Every
    /// matching report path contributes its count.
    LeafSuffix,
    /// Closest report path by Jaro-Winkler similarity, if at or above the
    /// threshold.
    Fuzzy { threshold: f64 },
}

impl fmt::Display for ActivityMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivityMatch::Exact => write!(f, "exact"),
            ActivityMatch::LeafSuffix => write!(f, "leaf-suffix"),
            ActivityMatch::Fuzzy { threshold } => write!(f, "fuzzy:{}", threshold),
        }
    }
}

impl FromStr for ActivityMatch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        match s.as_str() {
            "exact" => Ok(ActivityMatch::Exact),
            "leaf-suffix" | "leaf_suffix" | "suffix" => Ok(ActivityMatch::LeafSuffix),
            "fuzzy" => Ok(ActivityMatch::Fuzzy {
                threshold: DEFAULT_FUZZY_THRESHOLD,
            }),
            other => match other.strip_prefix("fuzzy:") {
                Some(value) => value
                    .trim()
                    .parse::<f64>()
                    .map(|threshold| ActivityMatch::Fuzzy { threshold })
                    .map_err(|e| format!("invalid fuzzy threshold {:?}: {}", value, e)),
                None => Err(format!(
                    "unknown activity match {:?} (expected exact, leaf-suffix, fuzzy or fuzzy:<threshold>)",
                    other
                )),
            },
        }
    }
}

/// Number of report rows filed under each canonical internal path.
#[derive(Debug, Default, Clone)]
pub struct ActivityCounts {
    counts: BTreeMap<String, usize>,
}

impl ActivityCounts {
    pub fn from_report(rows: &[ProjectReportRow]) -> Self {
        let mut counts = BTreeMap::new();
        for row in rows {
            let path = canonical_path(&row.original_path);
            if !path.is_empty() {
                *counts.entry(path).or_insert(0) += 1;
            }
        }
        ActivityCounts { counts }
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Activity count for a mapping-table label under the given strategy.
    pub fn count_for(&self, label: &str, strategy: ActivityMatch) -> usize {
        let key = canonical_path(label);
        if key.is_empty() {
            return 0;
        }
        match strategy {
            ActivityMatch::Exact => self.counts.get(&key).copied().unwrap_or(0),
            ActivityMatch::LeafSuffix => self
                .counts
                .iter()
                .filter(|(path, _)| is_segment_suffix(&key, path) || is_segment_suffix(path, &key))
                .map(|(_, count)| *count)
                .sum(),
            ActivityMatch::Fuzzy { threshold } => {
                if let Some(count) = self.counts.get(&key) {
                    return *count;
                }
                let key = fold(&key);
                let mut best: Option<(f64, usize)> = None;
                for (path, count) in &self.counts {
                    let score = jaro_winkler(&key, &fold(path));
                    if score >= threshold && best.map_or(true, |(s, _)| score > s) {
                        best = Some((score, *count));
                    }
                }
                best.map(|(_, count)| count).unwrap_or(0)
            }
        }
    }
}

// `long` equals `short` or ends with `-short`.
fn is_segment_suffix(long: &str, short: &str) -> bool {
    long == short
        || long
            .strip_suffix(short)
            .map_or(false, |head| head.ends_with('-'))
}

fn fold(text: &str) -> String {
    text.nfkc().collect::<String>().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(paths: &[&str]) -> ActivityCounts {
        let rows: Vec<ProjectReportRow> = paths
            .iter()
            .map(|p| ProjectReportRow::new("项目", p))
            .collect();
        ActivityCounts::from_report(&rows)
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!("exact".parse::<ActivityMatch>(), Ok(ActivityMatch::Exact));
        assert_eq!("Leaf-Suffix".parse::<ActivityMatch>(), Ok(ActivityMatch::LeafSuffix));
        assert_eq!(
            "fuzzy".parse::<ActivityMatch>(),
            Ok(ActivityMatch::Fuzzy { threshold: 0.92 })
        );
        assert_eq!(
            "fuzzy:0.8".parse::<ActivityMatch>(),
            Ok(ActivityMatch::Fuzzy { threshold: 0.8 })
        );
        assert!("fuzzy:abc".parse::<ActivityMatch>().is_err());
        assert!("nearest".parse::<ActivityMatch>().is_err());
        assert_eq!(ActivityMatch::Fuzzy { threshold: 0.8 }.to_string(), "fuzzy:0.8");
        assert_eq!(ActivityMatch::LeafSuffix.to_string(), "leaf-suffix");
    }

    #[test]
    fn test_exact_uses_canonical_paths() {
        let c = counts(&["制造 > 工艺 > 其他", "制造 > 工艺 > 其他", "材料 > 涂层"]);
        assert_eq!(c.count_for("root > 制造 > 工艺 > 其他", ActivityMatch::Exact), 2);
        assert_eq!(c.count_for("制造--工艺--其他", ActivityMatch::Exact), 2);
        assert_eq!(c.count_for("工艺 > 其他", ActivityMatch::Exact), 0);
        assert_eq!(c.count_for("", ActivityMatch::Exact), 0);
    }

    #[test]
    fn test_leaf_suffix_matches_on_segment_boundaries() {
        let c = counts(&["制造 > 工艺", "材料 > 涂层", "涂层"]);
        // mapping path deeper than the report path
        assert_eq!(c.count_for("集团 > 制造 > 工艺", ActivityMatch::LeafSuffix), 1);
        // report path deeper than the mapping path, both rows match
        assert_eq!(c.count_for("涂层", ActivityMatch::LeafSuffix), 2);
        // partial segment is not a suffix
        assert_eq!(c.count_for("层", ActivityMatch::LeafSuffix), 0);
    }

    #[test]
    fn test_fuzzy_picks_closest_above_threshold() {
        let c = counts(&["先进制造-增材制造技术", "新材料-功能涂层"]);
        let strategy = ActivityMatch::Fuzzy { threshold: 0.85 };
        assert_eq!(c.count_for("先进制造-增材制造技", strategy), 1);
        assert_eq!(c.count_for("生物医药", strategy), 0);
    }
}
