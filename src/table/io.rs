use anyhow::{anyhow, Context, Result};
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

use crate::error::ConfigError;
use crate::TARGET_IO;

const BOM: &str = "\u{feff}";

/// An in-memory CSV table addressed by column name.
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Index of a required column.
    pub fn column(&self, column: &str) -> Result<usize, ConfigError> {
        self.optional_column(column)
            .ok_or_else(|| ConfigError::missing_column(&self.name, column))
    }

    pub fn optional_column(&self, column: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == column)
    }

    /// Indices of `name(1)`, `name(2)`, ... up to the first one that is absent.
    pub fn ranked_columns(&self, name: impl Fn(usize) -> String) -> Vec<usize> {
        (1..)
            .map(|rank| self.optional_column(&name(rank)))
            .take_while(Option::is_some)
            .flatten()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Cell text, or `""` when the row is short.
pub fn cell(row: &[String], index: usize) -> &str {
    row.get(index).map(|s| s.as_str()).unwrap_or("")
}

/// Decodes bytes as UTF-8 (BOM stripped), falling back to GBK.
pub fn decode_text(name: &str, bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.strip_prefix(BOM).unwrap_or(text).to_string(),
        Err(_) => {
            let (decoded, _, had_errors) = encoding_rs::GBK.decode(bytes);
            if had_errors {
                warn!(
                    target: TARGET_IO,
                    "{} is neither valid UTF-8 nor GBK; undecodable bytes replaced", name
                );
            } else {
                warn!(target: TARGET_IO, "{} is not UTF-8, decoded as GBK", name);
            }
            decoded.into_owned()
        }
    }
}

pub fn parse_table(name: &str, text: &str) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .with_context(|| format!("Failed to read header of {}", name))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Failed to read row {} of {}", i + 1, name))?;
        rows.push(record.iter().map(|f| f.to_string()).collect());
    }

    Ok(Table {
        name: name.to_string(),
        headers,
        rows,
    })
}

pub fn read_table(path: &Path) -> Result<Table> {
    if !path.exists() {
        return Err(ConfigError::InputNotFound {
            path: path.to_path_buf(),
        }
        .into());
    }
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path.display().to_string();
    let table = parse_table(&name, &decode_text(&name, &bytes))?;
    info!(
        target: TARGET_IO,
        "Read {} rows ({} columns) from {}",
        table.len(),
        table.headers.len(),
        name
    );
    Ok(table)
}

/// Writes a BOM-prefixed UTF-8 CSV with every field quoted.
pub fn write_csv<W: Write>(mut writer: W, headers: &[String], rows: &[Vec<String>]) -> Result<()> {
    writer.write_all(BOM.as_bytes())?;
    let mut csv_writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .flexible(false)
        .from_writer(writer);
    csv_writer.write_record(headers)?;
    for row in rows {
        csv_writer.write_record(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Creates the parent directory of an output file and rejects a path that is
/// already a directory. Nothing is written to `path` itself.
pub fn prepare_output(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    if path.is_dir() {
        return Err(anyhow!("Output {} is a directory", path.display()));
    }
    Ok(())
}

/// Removes an output written earlier in a stage whose later write failed.
pub fn discard_output(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        warn!(
            target: TARGET_IO,
            "Could not remove partial output {}: {}",
            path.display(),
            e
        );
    }
}

pub fn write_table(path: &Path, headers: &[String], rows: &[Vec<String>]) -> Result<()> {
    prepare_output(path)?;
    let file = fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    write_csv(std::io::BufWriter::new(file), headers, rows)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!(
        target: TARGET_IO,
        "Wrote {} rows to {}",
        rows.len(),
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bom_and_header_whitespace() {
        let text = "\u{feff} 项目名称 ,原内部路径\n甲,制造 > 工艺\n乙\n";
        let table = parse_table("t", &decode_text("t", text.as_bytes())).unwrap();
        assert_eq!(table.headers, vec!["项目名称", "原内部路径"]);
        assert_eq!(table.column("项目名称").unwrap(), 0);
        assert_eq!(cell(&table.rows[1], 1), "");
    }

    #[test]
    fn test_gbk_fallback() {
        let (bytes, _, _) = encoding_rs::GBK.encode("项目名称\n产线自动化\n");
        let text = decode_text("gbk", &bytes);
        assert_eq!(text, "项目名称\n产线自动化\n");
    }

    #[test]
    fn test_missing_column_is_typed() {
        let table = parse_table("report", "a,b\n1,2\n").unwrap();
        assert!(matches!(
            table.column("c"),
            Err(ConfigError::MissingColumn { ref table, ref column }) if table == "report" && column == "c"
        ));
    }

    #[test]
    fn test_ranked_columns_stop_at_gap() {
        let table = parse_table("t", "x_1,y,x_2,x_4\n").unwrap();
        assert_eq!(table.ranked_columns(|k| format!("x_{}", k)), vec![0, 2]);
    }

    #[test]
    fn test_written_csv_is_quoted_with_bom() {
        let mut out = Vec::new();
        let headers = vec!["Source".to_string(), "Weight".to_string()];
        write_csv(&mut out, &headers, &[vec!["A".to_string(), "1.50".to_string()]]).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "\u{feff}\"Source\",\"Weight\"\n\"A\",\"1.50\"\n");
    }

    #[test]
    fn test_prepare_output_rejects_blocked_parent() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "x").unwrap();
        assert!(prepare_output(&blocker.join("out.csv")).is_err());
        assert!(prepare_output(dir.path()).is_err());

        let nested = dir.path().join("a").join("b.csv");
        prepare_output(&nested).unwrap();
        assert!(nested.parent().unwrap().is_dir());
        assert!(!nested.exists());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_table(&dir.path().join("nope.csv")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::InputNotFound { .. })
        ));
    }
}
