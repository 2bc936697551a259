//! Stage runners: read the stage's inputs, run it, write its outputs.
//!
//! Every runner validates all of its inputs and prepares every output
//! location before writing anything. A stage with two outputs removes the
//! first one again if the second write fails.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::config::PipelineConfig;
use crate::embedding::storage::load_vectors;
use crate::embedding::{Embedder, EmbeddingCache, LabeledVectors, LookupEmbedder};
use crate::error::ConfigError;
use crate::graph::{internal_cooccurrence, CooccurrenceBuilder, GraphSummary};
use crate::matching::{ProjectMatchRow, RankedMatch, ReverseIndex, ReverseIndexStats, TopKMatcher};
use crate::normalize::clean_display;
use crate::records::{enrich_report, parse_records};
use crate::report::{generate_report, ReportSummary};
use crate::series::{
    events_from_report, CorrelationSummary, EventSummary, LagAnalyzer, TimeSeriesMatrix,
};
use crate::table::{self, io::decode_text};
use crate::taxonomy::{extract_items, Taxonomy};
use crate::TARGET_SERIES;


#[derive(Debug, Default, Clone, PartialEq)]
pub struct TreeSummary {
    pub records: usize,
    pub dirty_lines: usize,
    pub projects_in_tree: usize,
    pub nodes: usize,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ExtractSummary {
    pub items: usize,
    pub skipped_empty: usize,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct MatchSummary {
    pub internal: usize,
    pub external: usize,
    pub dimension: usize,
    pub below_threshold: usize,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct EnrichSummary {
    pub rows: usize,
    pub matched: usize,
    pub records: usize,
    pub dirty_lines: usize,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct CorrelateSummary {
    pub edges: usize,
    pub events: EventSummary,
    pub periods: usize,
    /// First and last period label, e.g. `2021-01 .. 2022-12`.
    pub span: Option<String>,
    pub technologies: usize,
    pub correlation: CorrelationSummary,
}

fn read_text(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(ConfigError::InputNotFound {
            path: path.to_path_buf(),
        }
        .into());
    }
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(decode_text(&path.display().to_string(), &bytes))
}

/// Loads a vector file, optionally routing it through the embedding cache.
/// The result is always L2-normalised.
fn load_set(path: &Path, labels: Option<&[String]>, cache: Option<&EmbeddingCache>) -> Result<LabeledVectors> {
    let source = load_vectors(path)?;
    let labels: Vec<String> = match labels {
        Some(labels) => labels.to_vec(),
        None => source.labels().to_vec(),
    };
    let embedder = LookupEmbedder::new(source);
    match cache {
        Some(cache) => cache.load_or_compute(&labels, &embedder),
        None => {
            let vectors = embedder.embed(&labels)?;
            Ok(LabeledVectors::new(labels, vectors)?.normalized())
        }
    }
}

/// Runs the second write of a two-output stage; on failure the already
/// written `primary` is removed before the error is returned.
fn write_companion(primary: &Path, write: impl FnOnce() -> Result<()>) -> Result<()> {
    write().map_err(|e| {
        table::discard_output(primary);
        e
    })
}

fn count_below_threshold<'a>(rows: impl Iterator<Item = &'a [RankedMatch]>) -> usize {
    rows.flat_map(|m| m.iter()).filter(|m| m.below_threshold).count()
}

/// Raw `###` export to taxonomy JSON.
pub fn build_tree(records: &Path, output: &Path) -> Result<TreeSummary> {
    let set = parse_records(&read_text(records)?);
    if set.records.is_empty() {
        return Err(ConfigError::EmptyInput {
            what: "project records".to_string(),
        }
        .into());
    }
    let taxonomy = set.to_taxonomy();
    let summary = TreeSummary {
        records: set.records.len(),
        dirty_lines: set.dirty_lines,
        projects_in_tree: extract_items(&taxonomy).items.len(),
        nodes: taxonomy.root.node_count(),
    };
    taxonomy.save(output)?;
    Ok(summary)
}

/// Taxonomy JSON to the `(项目名称, 原内部路径)` item table.
pub fn extract(tree: &Path, output: &Path) -> Result<ExtractSummary> {
    let taxonomy = Taxonomy::load(tree)?;
    let extraction = extract_items(&taxonomy);
    table::write_items(output, &extraction.items)?;
    Ok(ExtractSummary {
        items: extraction.items.len(),
        skipped_empty: extraction.skipped_empty,
    })
}

/// Internal labels against the external vocabulary, producing the mapping
/// table and, optionally, the persisted reverse index.
pub fn match_labels(
    config: &PipelineConfig,
    internal: &Path,
    external: &Path,
    output: &Path,
    reverse_output: Option<&Path>,
    cache: Option<&EmbeddingCache>,
) -> Result<(MatchSummary, Option<ReverseIndexStats>)> {
    let internal = load_set(internal, None, cache)?;
    let external = load_set(external, None, cache)?;

    let rows = TopKMatcher::new(config).match_all(&internal, &external)?;
    let summary = MatchSummary {
        internal: internal.len(),
        external: external.len(),
        dimension: internal.dim(),
        below_threshold: count_below_threshold(rows.iter().map(|r| r.matches.as_slice())),
    };

    let reverse = reverse_output.map(|path| (path, ReverseIndex::from_match_rows(&rows)));
    if let Some((path, _)) = &reverse {
        table::prepare_output(path)?;
    }
    table::prepare_output(output)?;

    table::write_mapping(output, &rows)?;
    let stats = match reverse {
        Some((path, (index, stats))) => {
            write_companion(output, || table::write_reverse_index(path, &index))?;
            Some(stats)
        }
        None => None,
    };
    Ok((summary, stats))
}

/// Project names from the item table against the external vocabulary.
pub fn match_projects(
    config: &PipelineConfig,
    items: &Path,
    project_vectors: &Path,
    external: &Path,
    output: &Path,
    cache: Option<&EmbeddingCache>,
) -> Result<MatchSummary> {
    let items = table::read_items(items)?;
    if items.is_empty() {
        return Err(ConfigError::EmptyInput {
            what: "taxonomy items".to_string(),
        }
        .into());
    }
    let names: Vec<String> = items.iter().map(|i| i.item.clone()).collect();
    let projects = load_set(project_vectors, Some(&names), cache)?;
    let external = load_set(external, None, cache)?;

    let rows = TopKMatcher::new(config).match_all(&projects, &external)?;
    let project_rows: Vec<ProjectMatchRow> = items
        .iter()
        .zip(rows)
        .map(|(item, row)| ProjectMatchRow {
            project: clean_display(&item.item),
            internal_path: clean_display(&item.path),
            matches: row.matches,
        })
        .collect();

    let summary = MatchSummary {
        internal: projects.len(),
        external: external.len(),
        dimension: projects.dim(),
        below_threshold: count_below_threshold(project_rows.iter().map(|r| r.matches.as_slice())),
    };
    table::write_project_matches(output, &project_rows)?;
    Ok(summary)
}

/// Project matches joined with the reverse index built from the mapping table.
pub fn report(
    project_matches: &Path,
    mapping: &Path,
    output: &Path,
    reverse_output: Option<&Path>,
) -> Result<(ReportSummary, ReverseIndexStats)> {
    let projects = table::read_project_matches(project_matches)?;
    let mapping = table::read_mapping(mapping)?;

    let (index, stats) = ReverseIndex::from_match_rows(&mapping);
    let (rows, summary) = generate_report(&projects, &index);

    if let Some(path) = reverse_output {
        table::prepare_output(path)?;
    }
    table::prepare_output(output)?;

    table::write_report(output, &rows)?;
    if let Some(path) = reverse_output {
        write_companion(output, || table::write_reverse_index(path, &index))?;
    }
    Ok((summary, stats))
}

/// Adds amount and start time from the raw export to a report.
pub fn enrich(report: &Path, records: &Path, output: &Path) -> Result<EnrichSummary> {
    let mut rows = table::read_report(report, false)?;
    let set = parse_records(&read_text(records)?);
    let matched = enrich_report(&mut rows, &set);
    table::write_report(output, &rows)?;
    Ok(EnrichSummary {
        rows: rows.len(),
        matched,
        records: set.records.len(),
        dirty_lines: set.dirty_lines,
    })
}

/// Pairs of internal paths seen on the same report row. Returns the pair count.
pub fn internal_cooccur(report: &Path, output: &Path) -> Result<usize> {
    let rows = table::read_report(report, false)?;
    let pairs = internal_cooccurrence(&rows);
    table::write_internal_pairs(output, &pairs)?;
    Ok(pairs.len())
}

/// Weighted external technology graph.
pub fn graph(config: &PipelineConfig, report: &Path, mapping: &Path, output: &Path) -> Result<GraphSummary> {
    let rows = table::read_report(report, false)?;
    let mapping = table::read_mapping(mapping)?;
    let (edges, summary) = CooccurrenceBuilder::new(config).build(&rows, &mapping);
    table::write_edges(output, &edges)?;
    Ok(summary)
}

/// Lead/lag analysis of heavy graph edges over the report's timeline.
pub fn correlate(
    config: &PipelineConfig,
    report: &Path,
    edges: &Path,
    output: &Path,
) -> Result<CorrelateSummary> {
    let rows = table::read_report(report, true)?;
    let (candidates, edge_count) = table::read_candidates(edges, config.candidate_weight_threshold)?;

    let (events, event_summary) = events_from_report(&rows);
    let matrix = TimeSeriesMatrix::from_events(&events, config.granularity);
    if matrix.is_empty() {
        return Err(ConfigError::EmptyInput {
            what: "dated technology events".to_string(),
        }
        .into());
    }
    let granularity = matrix.granularity();
    let span = match (matrix.periods().first(), matrix.periods().last()) {
        (Some(first), Some(last)) => Some(format!(
            "{} .. {}",
            granularity.label(*first),
            granularity.label(*last)
        )),
        _ => None,
    };
    let (results, correlation) = LagAnalyzer::new(config).analyze(&matrix, &candidates);

    table::write_correlations(output, &results)?;
    info!(
        target: TARGET_SERIES,
        "Wrote {} correlation results to {}",
        results.len(),
        output.display()
    );
    Ok(CorrelateSummary {
        edges: edge_count,
        events: event_summary,
        periods: matrix.periods().len(),
        span,
        technologies: matrix.technologies().len(),
        correlation,
    })
}
