//! Raw project records.
//!
//! Upstream exports are one project per line with `###` between fields and
//! stray double quotes around values:
//!
//! ```text
//! "产线自动化"###"120.5"###"..."###"2021-03-04"###...###"先进制造--工艺"
//! ```
//!
//! Field 0 is the project name, 1 the amount, 3 the start time and 8 (when
//! present) the category path.

use std::collections::HashMap;
use tracing::{debug, info};

use crate::report::ProjectReportRow;
use crate::taxonomy::{Taxonomy, TaxonomyBuilder};
use crate::TARGET_IO;

pub const FIELD_SEPARATOR: &str = "###";

const NAME_FIELD: usize = 0;
const AMOUNT_FIELD: usize = 1;
const START_TIME_FIELD: usize = 3;
const CATEGORY_FIELD: usize = 8;
const MIN_FIELDS: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectRecord {
    pub name: String,
    pub amount: String,
    pub start_time: String,
    pub category_path: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RecordSet {
    pub records: Vec<ProjectRecord>,
    /// Lines with too few fields or an empty project name.
    pub dirty_lines: usize,
}

impl RecordSet {
    /// Name → record lookup. On duplicate names the later record wins.
    pub fn index(&self) -> HashMap<&str, &ProjectRecord> {
        self.records
            .iter()
            .map(|record| (record.name.as_str(), record))
            .collect()
    }

    /// Builds the taxonomy tree from every record that carries a category field.
    pub fn to_taxonomy(&self) -> Taxonomy {
        let mut builder = TaxonomyBuilder::new();
        for record in &self.records {
            if let Some(category) = &record.category_path {
                builder.add(&record.name, category);
            }
        }
        builder.build()
    }
}

fn clean_field(field: &str) -> String {
    field.replace('"', "").trim().to_string()
}

/// Parses the whole text of a raw export. Blank lines are ignored silently.
pub fn parse_records(text: &str) -> RecordSet {
    let mut set = RecordSet::default();

    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let parts: Vec<&str> = line.split(FIELD_SEPARATOR).collect();
        if parts.len() < MIN_FIELDS {
            debug!(
                target: TARGET_IO,
                "Line {}: only {} fields, skipping", line_no + 1, parts.len()
            );
            set.dirty_lines += 1;
            continue;
        }

        let name = clean_field(parts[NAME_FIELD]);
        if name.is_empty() {
            debug!(target: TARGET_IO, "Line {}: empty project name, skipping", line_no + 1);
            set.dirty_lines += 1;
            continue;
        }

        set.records.push(ProjectRecord {
            name,
            amount: clean_field(parts[AMOUNT_FIELD]),
            start_time: clean_field(parts[START_TIME_FIELD]),
            category_path: parts.get(CATEGORY_FIELD).map(|f| clean_field(f)),
        });
    }

    info!(
        target: TARGET_IO,
        "Parsed {} project records ({} dirty lines skipped)",
        set.records.len(),
        set.dirty_lines
    );
    set
}

/// Copies amount and start time onto report rows by trimmed project name.
/// Returns how many rows found a record.
pub fn enrich_report(rows: &mut [ProjectReportRow], records: &RecordSet) -> usize {
    let index = records.index();
    let mut matched = 0;

    for row in rows.iter_mut() {
        if let Some(record) = index.get(row.project.trim()) {
            row.amount = Some(record.amount.clone());
            row.start_time = Some(record.start_time.clone());
            matched += 1;
        }
    }

    info!(
        target: TARGET_IO,
        "Enriched {}/{} report rows with amount and start time",
        matched,
        rows.len()
    );
    matched
}
