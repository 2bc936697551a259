//! Row codecs: domain values to and from [`Table`]s.

use anyhow::Result;
use std::path::Path;
use tracing::{debug, info};

use super::columns as col;
use super::io::{cell, read_table, write_table, Table};
use crate::error::ConfigError;
use crate::graph::{Edge, InternalPair};
use crate::matching::{
    MatchRow, ProjectMatchRow, RankedMatch, ReverseIndex, BELOW_THRESHOLD_LABEL,
};
use crate::report::ProjectReportRow;
use crate::series::{Candidate, CorrelationResult};
use crate::taxonomy::TaxonomyItem;
use crate::TARGET_IO;

fn headers(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn format_score(score: f32) -> String {
    format!("{:.6}", score)
}

fn rank_count<T>(rows: &[T], matches: impl Fn(&T) -> usize) -> usize {
    rows.iter().map(matches).max().unwrap_or(0)
}

fn push_matches(cells: &mut Vec<String>, matches: &[RankedMatch], ranks: usize) {
    for rank in 0..ranks {
        match matches.get(rank) {
            Some(m) => {
                cells.push(m.display_label().to_string());
                cells.push(format_score(m.score));
            }
            None => {
                cells.push(String::new());
                cells.push(String::new());
            }
        }
    }
}

/// Reads `(label, score)` column pairs. The below-threshold marker comes back
/// as a flagged match with an empty label; empty label cells end the row.
fn read_matches(table: &Table, row: &[String], label_cols: &[usize], score_cols: &[usize]) -> Vec<RankedMatch> {
    let mut matches = Vec::new();
    for (rank, &label_col) in label_cols.iter().enumerate() {
        let label = cell(row, label_col).trim();
        if label.is_empty() {
            break;
        }
        let score = score_cols
            .get(rank)
            .and_then(|&c| cell(row, c).trim().parse::<f32>().ok())
            .unwrap_or(0.0);
        if label == BELOW_THRESHOLD_LABEL {
            matches.push(RankedMatch::below_threshold("", score));
        } else {
            matches.push(RankedMatch::new(label, score));
        }
    }
    if matches.is_empty() && !label_cols.is_empty() {
        debug!(target: TARGET_IO, "{}: row without matches", table.name);
    }
    matches
}

// extracted taxonomy items

pub fn write_items(path: &Path, items: &[TaxonomyItem]) -> Result<()> {
    let rows: Vec<Vec<String>> = items
        .iter()
        .map(|i| vec![i.item.clone(), i.path.clone()])
        .collect();
    write_table(path, &headers(&[col::PROJECT_NAME, col::INTERNAL_PATH]), &rows)
}

pub fn read_items(path: &Path) -> Result<Vec<TaxonomyItem>> {
    let table = read_table(path)?;
    let name = table.column(col::PROJECT_NAME)?;
    let item_path = table.column(col::INTERNAL_PATH)?;
    Ok(table
        .rows
        .iter()
        .filter(|row| !cell(row, name).trim().is_empty())
        .map(|row| TaxonomyItem {
            item: cell(row, name).to_string(),
            path: cell(row, item_path).to_string(),
        })
        .collect())
}

// label mapping table

pub fn write_mapping(path: &Path, rows: &[MatchRow]) -> Result<()> {
    let ranks = rank_count(rows, |r| r.matches.len());
    let mut names = vec![col::INTERNAL_LABEL.to_string()];
    for rank in 1..=ranks {
        names.push(col::mapped_label(rank));
        names.push(col::similarity(rank));
    }
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|r| {
            let mut cells = vec![r.label.clone()];
            push_matches(&mut cells, &r.matches, ranks);
            cells
        })
        .collect();
    write_table(path, &names, &cells)
}

pub fn read_mapping(path: &Path) -> Result<Vec<MatchRow>> {
    let table = read_table(path)?;
    let label = table.column(col::INTERNAL_LABEL)?;
    let label_cols = table.ranked_columns(col::mapped_label);
    if label_cols.is_empty() {
        return Err(ConfigError::missing_column(&table.name, &col::mapped_label(1)).into());
    }
    let score_cols = table.ranked_columns(col::similarity);

    let rows: Vec<MatchRow> = table
        .rows
        .iter()
        .filter(|row| !cell(row, label).trim().is_empty())
        .map(|row| MatchRow {
            label: cell(row, label).trim().to_string(),
            matches: read_matches(&table, row, &label_cols, &score_cols),
        })
        .collect();
    info!(target: TARGET_IO, "Loaded {} mapping rows", rows.len());
    Ok(rows)
}

// project match table

pub fn write_project_matches(path: &Path, rows: &[ProjectMatchRow]) -> Result<()> {
    let ranks = rank_count(rows, |r| r.matches.len());
    let mut names = headers(&[col::PROJECT_NAME, col::INTERNAL_PATH]);
    for rank in 1..=ranks {
        names.push(col::external_label(rank));
        names.push(col::similarity(rank));
    }
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|r| {
            let mut cells = vec![r.project.clone(), r.internal_path.clone()];
            push_matches(&mut cells, &r.matches, ranks);
            cells
        })
        .collect();
    write_table(path, &names, &cells)
}

pub fn read_project_matches(path: &Path) -> Result<Vec<ProjectMatchRow>> {
    let table = read_table(path)?;
    let project = table.column(col::PROJECT_NAME)?;
    let internal_path = table.column(col::INTERNAL_PATH)?;
    let label_cols = table.ranked_columns(col::external_label);
    if label_cols.is_empty() {
        return Err(ConfigError::missing_column(&table.name, &col::external_label(1)).into());
    }
    let score_cols = table.ranked_columns(col::similarity);

    Ok(table
        .rows
        .iter()
        .filter(|row| !cell(row, project).trim().is_empty())
        .map(|row| ProjectMatchRow {
            project: cell(row, project).to_string(),
            internal_path: cell(row, internal_path).to_string(),
            matches: read_matches(&table, row, &label_cols, &score_cols),
        })
        .collect())
}

// reverse index

pub fn write_reverse_index(path: &Path, index: &ReverseIndex) -> Result<()> {
    let rows: Vec<Vec<String>> = index
        .iter()
        .map(|(key, entry)| {
            vec![
                key.to_string(),
                entry.internal_path.clone(),
                format_score(entry.score),
            ]
        })
        .collect();
    write_table(
        path,
        &headers(&[col::LEAF_KEY, col::ATTRIBUTED_PATH, col::SCORE]),
        &rows,
    )
}

// flattened report

pub fn write_report(path: &Path, rows: &[ProjectReportRow]) -> Result<()> {
    let ranks = rank_count(rows, |r| r.technologies.len().max(r.attributions.len()));
    let with_amount = rows.iter().any(|r| r.amount.is_some());
    let with_time = rows.iter().any(|r| r.start_time.is_some());

    let mut names = headers(&[col::PROJECT_NAME, col::ORIGINAL_ATTRIBUTION]);
    names.extend((1..=ranks).map(col::technology));
    names.extend((1..=ranks).map(col::attribution));
    if with_amount {
        names.push(col::AMOUNT.to_string());
    }
    if with_time {
        names.push(col::START_TIME.to_string());
    }

    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|r| {
            let mut cells = vec![r.project.clone(), r.original_path.clone()];
            for rank in 0..ranks {
                cells.push(r.technologies.get(rank).cloned().unwrap_or_default());
            }
            for rank in 0..ranks {
                cells.push(r.attributions.get(rank).cloned().unwrap_or_default());
            }
            if with_amount {
                cells.push(r.amount.clone().unwrap_or_default());
            }
            if with_time {
                cells.push(r.start_time.clone().unwrap_or_default());
            }
            cells
        })
        .collect();
    write_table(path, &names, &cells)
}

/// Reads a flattened report. With `require_start_time` the start-time column
/// must be present.
pub fn read_report(path: &Path, require_start_time: bool) -> Result<Vec<ProjectReportRow>> {
    let table = read_table(path)?;
    let project = table.column(col::PROJECT_NAME)?;
    let original = table.column(col::ORIGINAL_ATTRIBUTION)?;
    let technology_cols = table.ranked_columns(col::technology);
    if technology_cols.is_empty() {
        return Err(ConfigError::missing_column(&table.name, &col::technology(1)).into());
    }
    let attribution_cols = table.ranked_columns(col::attribution);
    let amount = table.optional_column(col::AMOUNT);
    let start_time = if require_start_time {
        Some(table.column(col::START_TIME)?)
    } else {
        table.optional_column(col::START_TIME)
    };

    let optional = |row: &[String], column: Option<usize>| {
        column
            .map(|c| cell(row, c).trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let rows: Vec<ProjectReportRow> = table
        .rows
        .iter()
        .map(|row| ProjectReportRow {
            project: cell(row, project).trim().to_string(),
            original_path: cell(row, original).trim().to_string(),
            technologies: technology_cols
                .iter()
                .map(|&c| cell(row, c).trim().to_string())
                .collect(),
            attributions: attribution_cols
                .iter()
                .map(|&c| cell(row, c).trim().to_string())
                .collect(),
            amount: optional(row.as_slice(), amount),
            start_time: optional(row.as_slice(), start_time),
        })
        .collect();
    info!(target: TARGET_IO, "Loaded {} report rows", rows.len());
    Ok(rows)
}

// internal co-occurrence

pub fn write_internal_pairs(path: &Path, pairs: &[InternalPair]) -> Result<()> {
    let rows: Vec<Vec<String>> = pairs
        .iter()
        .map(|p| {
            vec![
                p.combined.clone(),
                p.count.to_string(),
                p.path_a.clone(),
                p.path_b.clone(),
            ]
        })
        .collect();
    write_table(
        path,
        &headers(&[col::COMBINED, col::COUNT, col::PATH_A, col::PATH_B]),
        &rows,
    )
}

// graph edges

pub fn write_edges(path: &Path, edges: &[Edge]) -> Result<()> {
    let rows: Vec<Vec<String>> = edges
        .iter()
        .map(|e| {
            vec![
                e.source.clone(),
                e.target.clone(),
                format!("{:.2}", round_to(e.total(), 2)),
                format!("{:.2}", round_to(e.direct, 2)),
                format!("{:.2}", round_to(e.indirect, 2)),
                e.source_levels.l1.clone(),
                e.source_levels.l2.clone(),
                e.target_levels.l1.clone(),
                e.target_levels.l2.clone(),
            ]
        })
        .collect();
    write_table(
        path,
        &headers(&[
            col::SOURCE,
            col::TARGET,
            col::WEIGHT,
            col::DIRECT_SCORE,
            col::INDIRECT_SCORE,
            col::SOURCE_L1,
            col::SOURCE_L2,
            col::TARGET_L1,
            col::TARGET_L2,
        ]),
        &rows,
    )
}

/// Edges heavier than `threshold`, read from an edge list. Returns the
/// candidates and the total number of edge rows.
pub fn read_candidates(path: &Path, threshold: f64) -> Result<(Vec<Candidate>, usize)> {
    let table = read_table(path)?;
    let source = table.column(col::SOURCE)?;
    let target = table.column(col::TARGET)?;
    let weight = table.column(col::WEIGHT)?;

    let mut candidates = Vec::new();
    for row in &table.rows {
        let w = match cell(row, weight).trim().parse::<f64>() {
            Ok(w) => w,
            Err(_) => {
                debug!(target: TARGET_IO, "Unparseable weight {:?}", cell(row, weight));
                continue;
            }
        };
        if w > threshold {
            candidates.push(Candidate {
                source: cell(row, source).trim().to_string(),
                target: cell(row, target).trim().to_string(),
                weight: w,
            });
        }
    }
    info!(
        target: TARGET_IO,
        "{} of {} edges are heavier than {}",
        candidates.len(),
        table.len(),
        threshold
    );
    Ok((candidates, table.len()))
}

// correlation results

pub fn write_correlations(path: &Path, results: &[CorrelationResult]) -> Result<()> {
    let rows: Vec<Vec<String>> = results
        .iter()
        .map(|r| {
            vec![
                r.source.clone(),
                r.target.clone(),
                format!("{:.2}", r.weight),
                format!("{:.3}", round_to(r.correlation, 3)),
                r.lag.to_string(),
                r.direction_text(),
                r.granger_p
                    .map(|p| format!("{:.4}", round_to(p, 4)))
                    .unwrap_or_default(),
            ]
        })
        .collect();
    write_table(
        path,
        &headers(&[
            col::SOURCE,
            col::TARGET,
            col::WEIGHT,
            col::MAX_CORR,
            col::LAG,
            col::DIRECTION,
            col::GRANGER_P,
        ]),
        &rows,
    )
}
