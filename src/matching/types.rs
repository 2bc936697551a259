use serde::{Deserialize, Serialize};

use crate::normalize::leaf_key;

/// Label shown in place of a match that scored below the configured minimum.
pub const BELOW_THRESHOLD_LABEL: &str = "低于阈值";

/// One ranked external label for an internal item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedMatch {
    pub label: String,
    pub score: f32,
    // Kept in place so every row has the same number of ranks
    pub below_threshold: bool,
}

impl RankedMatch {
    pub fn new(label: &str, score: f32) -> Self {
        RankedMatch {
            label: label.to_string(),
            score,
            below_threshold: false,
        }
    }

    pub fn below_threshold(label: &str, score: f32) -> Self {
        RankedMatch {
            label: label.to_string(),
            score,
            below_threshold: true,
        }
    }

    /// The label, unless the match is flagged or empty.
    pub fn usable_label(&self) -> Option<&str> {
        if self.below_threshold || self.label.trim().is_empty() {
            None
        } else {
            Some(&self.label)
        }
    }

    /// Leaf key of the usable label, or an empty string.
    pub fn leaf_key(&self) -> String {
        self.usable_label().map(leaf_key).unwrap_or_default()
    }

    /// What goes in a label column: the label, or the below-threshold marker.
    pub fn display_label(&self) -> &str {
        if self.below_threshold {
            BELOW_THRESHOLD_LABEL
        } else {
            &self.label
        }
    }
}

/// An internal item and its top-K external matches, best first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRow {
    pub label: String,
    pub matches: Vec<RankedMatch>,
}

/// Forward matches for one project, with the taxonomy path it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectMatchRow {
    pub project: String,
    pub internal_path: String,
    pub matches: Vec<RankedMatch>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flagged_match_has_no_key() {
        let flagged = RankedMatch::below_threshold("先进制造-自动化技术", 0.1);
        assert_eq!(flagged.usable_label(), None);
        assert_eq!(flagged.leaf_key(), "");
        assert_eq!(flagged.display_label(), BELOW_THRESHOLD_LABEL);

        let ok = RankedMatch::new("先进制造-自动化技术", 0.9);
        assert_eq!(ok.leaf_key(), "自动化技术");
        assert_eq!(ok.display_label(), "先进制造-自动化技术");
    }
}
