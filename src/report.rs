//! Flattened project report.
//!
//! Joins each project's forward matches with the reverse index so a reader can
//! see, per matched technology, which internal entity owns it.

use tracing::{debug, info};

use crate::matching::{ProjectMatchRow, ReverseIndex, BELOW_THRESHOLD_LABEL};
use crate::normalize::{clean_display, is_placeholder, leaf_key};
use crate::TARGET_MATCH;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectReportRow {
    pub project: String,
    /// Cleaned internal path the project was filed under.
    pub original_path: String,
    /// Display labels of the top-K matches, in rank order.
    pub technologies: Vec<String>,
    /// Reverse-attributed internal path per technology, empty on a miss.
    pub attributions: Vec<String>,
    pub amount: Option<String>,
    pub start_time: Option<String>,
}

impl ProjectReportRow {
    pub fn new(project: &str, original_path: &str) -> Self {
        ProjectReportRow {
            project: project.to_string(),
            original_path: original_path.to_string(),
            ..Default::default()
        }
    }

    /// Leaf keys of the usable technologies, in rank order. Below-threshold
    /// markers and placeholders yield nothing.
    pub fn technology_keys(&self) -> Vec<String> {
        self.technologies
            .iter()
            .filter_map(|label| technology_key(label))
            .collect()
    }
}

/// Leaf key of a report technology cell, unless it is empty, a placeholder,
/// or the below-threshold marker.
pub fn technology_key(label: &str) -> Option<String> {
    let label = label.trim();
    if label == BELOW_THRESHOLD_LABEL || is_placeholder(label) {
        return None;
    }
    let key = leaf_key(label);
    if key.is_empty() || is_placeholder(&key) {
        None
    } else {
        Some(key)
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReportSummary {
    pub rows: usize,
    /// One per technology column whose key had no reverse entry.
    pub reverse_misses: usize,
    /// Technology columns that were empty or below threshold.
    pub empty_matches: usize,
}

/// Builds one report row per project, keeping match order.
pub fn generate_report(
    projects: &[ProjectMatchRow],
    index: &ReverseIndex,
) -> (Vec<ProjectReportRow>, ReportSummary) {
    let mut summary = ReportSummary::default();
    let mut rows = Vec::with_capacity(projects.len());

    for project in projects {
        let mut row = ProjectReportRow::new(
            &clean_display(&project.project),
            &clean_display(&project.internal_path),
        );

        for ranked in &project.matches {
            row.technologies.push(clean_display(ranked.display_label()));

            let key = ranked.leaf_key();
            if key.is_empty() {
                summary.empty_matches += 1;
                row.attributions.push(String::new());
                continue;
            }
            match index.lookup(&key) {
                Some(path) => row.attributions.push(clean_display(path)),
                None => {
                    debug!(
                        target: TARGET_MATCH,
                        "No reverse attribution for {} (project {})", key, row.project
                    );
                    summary.reverse_misses += 1;
                    row.attributions.push(String::new());
                }
            }
        }

        rows.push(row);
    }

    summary.rows = rows.len();
    info!(
        target: TARGET_MATCH,
        "Report built: {} rows, {} reverse misses, {} empty matches",
        summary.rows,
        summary.reverse_misses,
        summary.empty_matches
    );
    (rows, summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::{MatchRow, RankedMatch};

    fn index() -> ReverseIndex {
        let rows = vec![
            MatchRow {
                label: "root > 制造 > 产线自动化".to_string(),
                matches: vec![RankedMatch::new("先进制造-自动化技术", 0.9)],
            },
            MatchRow {
                label: "材料 > 节能涂层".to_string(),
                matches: vec![RankedMatch::new("涂层材料", 0.8)],
            },
        ];
        ReverseIndex::from_match_rows(&rows).0
    }

    #[test]
    fn test_report_joins_reverse_attribution() {
        let projects = vec![ProjectMatchRow {
            project: "智能产线\t改造".to_string(),
            internal_path: "root > 制造 > 产线自动化".to_string(),
            matches: vec![
                RankedMatch::new("自动化技术", 0.9),
                RankedMatch::new("新材料—涂层材料", 0.7),
            ],
        }];
        let (rows, summary) = generate_report(&projects, &index());
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.project, "智能产线 改造");
        assert_eq!(row.original_path, "制造 > 产线自动化");
        assert_eq!(row.technologies, vec!["自动化技术", "新材料—涂层材料"]);
        assert_eq!(row.attributions, vec!["制造 > 产线自动化", "材料 > 节能涂层"]);
        assert_eq!(summary.reverse_misses, 0);
    }

    #[test]
    fn test_each_missing_key_counts_once() {
        let projects = vec![ProjectMatchRow {
            project: "甲".to_string(),
            internal_path: "A".to_string(),
            matches: vec![
                RankedMatch::new("未知技术一", 0.5),
                RankedMatch::new("涂层材料", 0.5),
                RankedMatch::new("未知技术二", 0.5),
            ],
        }];
        let (rows, summary) = generate_report(&projects, &index());
        assert_eq!(rows[0].attributions, vec!["", "材料 > 节能涂层", ""]);
        assert_eq!(summary.reverse_misses, 2);
        assert_eq!(summary.rows, 1);
    }

    #[test]
    fn test_below_threshold_is_shown_but_not_looked_up() {
        let projects = vec![ProjectMatchRow {
            project: "甲".to_string(),
            internal_path: "A".to_string(),
            matches: vec![RankedMatch::below_threshold("涂层材料", 0.1)],
        }];
        let (rows, summary) = generate_report(&projects, &index());
        assert_eq!(rows[0].technologies, vec![BELOW_THRESHOLD_LABEL]);
        assert_eq!(rows[0].attributions, vec![""]);
        assert_eq!(summary.reverse_misses, 0);
        assert_eq!(summary.empty_matches, 1);
        assert!(rows[0].technology_keys().is_empty());
    }

    #[test]
    fn test_technology_key() {
        assert_eq!(technology_key("先进制造-自动化技术"), Some("自动化技术".to_string()));
        assert_eq!(technology_key(BELOW_THRESHOLD_LABEL), None);
        assert_eq!(technology_key("nan"), None);
        assert_eq!(technology_key("  "), None);
    }
}
