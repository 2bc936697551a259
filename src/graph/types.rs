use crate::normalize::HierarchyLevels;

/// Weighted co-occurrence between two external leaf labels. `source` sorts
/// before `target`.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub direct: f64,
    pub indirect: f64,
    pub source_levels: HierarchyLevels,
    pub target_levels: HierarchyLevels,
}

impl Edge {
    pub fn total(&self) -> f64 {
        self.direct + self.indirect
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct GraphSummary {
    pub projects: usize,
    /// (project, pair) co-occurrences counted by the direct pass.
    pub direct_cooccurrences: usize,
    /// Distinct internal paths with at least one project.
    pub active_internal_paths: usize,
    /// Mapping rows whose internal label had a non-zero activity count.
    pub active_mapping_rows: usize,
    pub edges: usize,
}

/// Two internal paths that appear together on one report row.
#[derive(Debug, Clone, PartialEq)]
pub struct InternalPair {
    /// `"<leaf A> & <leaf B>"`.
    pub combined: String,
    pub count: usize,
    pub path_a: String,
    pub path_b: String,
}
