use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

use super::types::InternalPair;
use crate::normalize::leaf_key;
use crate::report::ProjectReportRow;
use crate::TARGET_GRAPH;

/// Counts how often two internal paths appear on the same report row, taking
/// the original path and every reverse attribution into account.
///
/// Rows without an original path are ignored. Output is sorted by count
/// descending, then by the two paths.
pub fn internal_cooccurrence(report: &[ProjectReportRow]) -> Vec<InternalPair> {
    let mut counts: BTreeMap<(String, String), usize> = BTreeMap::new();
    let mut valid_rows = 0usize;

    for row in report {
        let original = row.original_path.trim();
        if original.is_empty() {
            continue;
        }
        valid_rows += 1;

        let labels: BTreeSet<&str> = std::iter::once(original)
            .chain(row.attributions.iter().map(|a| a.trim()))
            .filter(|a| !a.is_empty())
            .collect();
        let labels: Vec<&str> = labels.into_iter().collect();
        for i in 0..labels.len() {
            for j in (i + 1)..labels.len() {
                *counts
                    .entry((labels[i].to_string(), labels[j].to_string()))
                    .or_insert(0) += 1;
            }
        }
    }

    let mut pairs: Vec<InternalPair> = counts
        .into_iter()
        .map(|((path_a, path_b), count)| InternalPair {
            combined: format!("{} & {}", leaf_key(&path_a), leaf_key(&path_b)),
            count,
            path_a,
            path_b,
        })
        .collect();
    // stable sort keeps the BTreeMap path order within equal counts
    pairs.sort_by(|a, b| b.count.cmp(&a.count));

    info!(
        target: TARGET_GRAPH,
        "Internal co-occurrence: {} pairs from {} of {} rows",
        pairs.len(),
        valid_rows,
        report.len()
    );
    pairs
}
