use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info};

use super::activity::{ActivityCounts, ActivityMatch};
use super::types::{Edge, GraphSummary};
use crate::config::PipelineConfig;
use crate::matching::MatchRow;
use crate::normalize::{hierarchy_levels, HierarchyLevels};
use crate::report::{technology_key, ProjectReportRow};
use crate::{PROGRESS_EVERY, TARGET_GRAPH};

type Pair = (String, String);

#[derive(Default)]
struct Weights {
    direct: f64,
    indirect: f64,
}

/// Builds the external technology graph from the flattened report (direct
/// co-occurrence) and the label mapping table (indirect co-occurrence).
pub struct CooccurrenceBuilder {
    direct_weight: f64,
    indirect_weight_factor: f64,
    activity_match: ActivityMatch,
}

impl CooccurrenceBuilder {
    pub fn new(config: &PipelineConfig) -> Self {
        CooccurrenceBuilder {
            direct_weight: config.direct_weight,
            indirect_weight_factor: config.indirect_weight_factor,
            activity_match: config.activity_match,
        }
    }

    /// Edges sorted by total weight descending, then by endpoint names.
    pub fn build(
        &self,
        report: &[ProjectReportRow],
        mapping: &[MatchRow],
    ) -> (Vec<Edge>, GraphSummary) {
        let mut summary = GraphSummary {
            projects: report.len(),
            ..Default::default()
        };
        let mut weights: BTreeMap<Pair, Weights> = BTreeMap::new();
        // first recorded full label per leaf decides its hierarchy
        let mut hierarchy: HashMap<String, HierarchyLevels> = HashMap::new();

        // direct pass
        for (i, row) in report.iter().enumerate() {
            let mut keys = BTreeSet::new();
            for label in &row.technologies {
                if let Some(key) = technology_key(label) {
                    hierarchy
                        .entry(key.clone())
                        .or_insert_with(|| hierarchy_levels(label));
                    keys.insert(key);
                }
            }
            for pair in pairs(&keys) {
                weights.entry(pair).or_default().direct += self.direct_weight;
                summary.direct_cooccurrences += 1;
            }
            if (i + 1) % PROGRESS_EVERY == 0 {
                debug!(target: TARGET_GRAPH, "Direct pass: {}/{} projects", i + 1, report.len());
            }
        }

        // indirect pass
        let activity = ActivityCounts::from_report(report);
        summary.active_internal_paths = activity.len();
        for row in mapping {
            let count = activity.count_for(&row.label, self.activity_match);
            if count == 0 {
                continue;
            }
            summary.active_mapping_rows += 1;

            let mut keys = BTreeSet::new();
            for ranked in &row.matches {
                if let Some(label) = ranked.usable_label() {
                    let key = ranked.leaf_key();
                    hierarchy
                        .entry(key.clone())
                        .or_insert_with(|| hierarchy_levels(label));
                    keys.insert(key);
                }
            }
            let add = count as f64 * self.indirect_weight_factor;
            for pair in pairs(&keys) {
                weights.entry(pair).or_default().indirect += add;
            }
        }

        let levels = |key: &str| {
            hierarchy
                .get(key)
                .cloned()
                .unwrap_or_else(HierarchyLevels::unknown)
        };
        let mut edges: Vec<Edge> = weights
            .into_iter()
            .map(|((source, target), w)| Edge {
                source_levels: levels(&source),
                target_levels: levels(&target),
                source,
                target,
                direct: w.direct,
                indirect: w.indirect,
            })
            .collect();
        edges.sort_by(|a, b| {
            b.total()
                .total_cmp(&a.total())
                .then_with(|| a.source.cmp(&b.source))
                .then_with(|| a.target.cmp(&b.target))
        });

        summary.edges = edges.len();
        info!(
            target: TARGET_GRAPH,
            "Graph built: {} edges from {} projects ({} direct co-occurrences, {} active internal paths, {} active mapping rows, matching {})",
            summary.edges,
            summary.projects,
            summary.direct_cooccurrences,
            summary.active_internal_paths,
            summary.active_mapping_rows,
            self.activity_match
        );
        (edges, summary)
    }
}

/// Every unordered pair of a sorted set, in lexicographic order.
fn pairs(keys: &BTreeSet<String>) -> Vec<Pair> {
    let keys: Vec<&String> = keys.iter().collect();
    let mut out = Vec::new();
    for i in 0..keys.len() {
        for j in (i + 1)..keys.len() {
            out.push((keys[i].clone(), keys[j].clone()));
        }
    }
    out
}
