use chrono::{DateTime, NaiveDate, NaiveDateTime};
use ndarray::{Array2, ArrayView1};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info};

use super::period::Granularity;
use super::types::{Event, EventSummary};
use crate::report::{technology_key, ProjectReportRow};
use crate::TARGET_SERIES;

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
];
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d"];

/// Parses the timestamp spellings found in project records.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_local());
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    // year and month only
    NaiveDate::parse_from_str(&format!("{}-01", text), "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// One event per usable technology cell of every row with a parseable start
/// time.
pub fn events_from_report(rows: &[ProjectReportRow]) -> (Vec<Event>, EventSummary) {
    let mut summary = EventSummary {
        rows: rows.len(),
        ..Default::default()
    };
    let mut events = Vec::new();

    for row in rows {
        let time = match row.start_time.as_deref().and_then(parse_timestamp) {
            Some(time) => time,
            None => {
                debug!(
                    target: TARGET_SERIES,
                    "No usable start time for {} ({:?})", row.project, row.start_time
                );
                summary.rows_without_time += 1;
                continue;
            }
        };
        for label in &row.technologies {
            match technology_key(label) {
                Some(technology) => events.push(Event { time, technology }),
                None => summary.dropped_technologies += 1,
            }
        }
    }

    summary.events = events.len();
    info!(
        target: TARGET_SERIES,
        "Extracted {} events from {} rows ({} rows without a start time)",
        summary.events,
        summary.rows,
        summary.rows_without_time
    );
    (events, summary)
}

/// Relative mention frequency per (period, technology).
///
/// Rows are periods, contiguous from the first to the last observed one;
/// columns are technologies in name order. Each non-empty row sums to one.
#[derive(Debug, Clone)]
pub struct TimeSeriesMatrix {
    granularity: Granularity,
    periods: Vec<NaiveDate>,
    technologies: Vec<String>,
    column_of: HashMap<String, usize>,
    values: Array2<f64>,
}

impl TimeSeriesMatrix {
    pub fn from_events(events: &[Event], granularity: Granularity) -> Self {
        let technologies: Vec<String> = events
            .iter()
            .map(|e| e.technology.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let column_of: HashMap<String, usize> = technologies
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i))
            .collect();

        let starts: Vec<NaiveDate> = events
            .iter()
            .map(|e| granularity.period_start(e.time.date()))
            .collect();
        let periods = match (starts.iter().min(), starts.iter().max()) {
            (Some(first), Some(last)) => contiguous_periods(granularity, *first, *last),
            _ => Vec::new(),
        };
        let row_of: HashMap<NaiveDate, usize> =
            periods.iter().enumerate().map(|(i, p)| (*p, i)).collect();

        let mut values = Array2::<f64>::zeros((periods.len(), technologies.len()));
        for (event, start) in events.iter().zip(&starts) {
            if let (Some(&r), Some(&c)) = (row_of.get(start), column_of.get(&event.technology)) {
                values[[r, c]] += 1.0;
            }
        }
        for mut row in values.outer_iter_mut() {
            let total = row.sum();
            if total > 0.0 {
                row /= total;
            }
        }

        info!(
            target: TARGET_SERIES,
            "Time series matrix: {} periods x {} technologies ({})",
            periods.len(),
            technologies.len(),
            granularity
        );
        TimeSeriesMatrix {
            granularity,
            periods,
            technologies,
            column_of,
            values,
        }
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn periods(&self) -> &[NaiveDate] {
        &self.periods
    }

    pub fn technologies(&self) -> &[String] {
        &self.technologies
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    /// The frequency series of one technology, one value per period.
    pub fn series(&self, technology: &str) -> Option<ArrayView1<'_, f64>> {
        self.column_of
            .get(technology)
            .map(|&c| self.values.column(c))
    }
}

fn contiguous_periods(granularity: Granularity, first: NaiveDate, last: NaiveDate) -> Vec<NaiveDate> {
    let mut periods = vec![first];
    let mut current = first;
    while current < last {
        match granularity.next(current) {
            Some(next) => {
                periods.push(next);
                current = next;
            }
            None => break,
        }
    }
    periods
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(time: &str, tech: &str) -> Event {
        Event {
            time: parse_timestamp(time).unwrap(),
            technology: tech.to_string(),
        }
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = NaiveDate::from_ymd_opt(2023, 4, 5)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        for text in ["2023-04-05", "2023/04/05", "20230405", " 2023-04-05 00:00:00 "] {
            assert_eq!(parse_timestamp(text), Some(expected), "{}", text);
        }
        assert!(parse_timestamp("2023-04-05T10:00:00+08:00").is_some());
        assert_eq!(
            parse_timestamp("2023-04").map(|t| t.date()),
            NaiveDate::from_ymd_opt(2023, 4, 1)
        );
        assert_eq!(parse_timestamp("不详"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn test_rows_sum_to_one_and_gaps_are_zero() {
        let events = vec![
            event("2023-01-03", "A"),
            event("2023-01-20", "B"),
            event("2023-01-21", "B"),
            event("2023-03-02", "A"),
        ];
        let matrix = TimeSeriesMatrix::from_events(&events, Granularity::Month);
        assert_eq!(matrix.periods().len(), 3);
        assert_eq!(matrix.technologies(), &["A".to_string(), "B".to_string()]);

        for (i, row) in matrix.values().outer_iter().enumerate() {
            let sum = row.sum();
            if i == 1 {
                assert_eq!(sum, 0.0);
            } else {
                assert!((sum - 1.0).abs() < 1e-12);
            }
        }
        let a = matrix.series("A").unwrap();
        assert!((a[0] - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(a[2], 1.0);
        assert!(matrix.series("C").is_none());
    }

    #[test]
    fn test_events_from_report_skips_rows_without_time() {
        let mut dated = ProjectReportRow::new("甲", "制造");
        dated.start_time = Some("2023-05-01".to_string());
        dated.technologies = vec![
            "先进制造-自动化技术".to_string(),
            "低于阈值".to_string(),
            "".to_string(),
        ];
        let mut undated = ProjectReportRow::new("乙", "制造");
        undated.technologies = vec!["涂层材料".to_string()];

        let (events, summary) = events_from_report(&[dated, undated]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].technology, "自动化技术");
        assert_eq!(summary.rows_without_time, 1);
        assert_eq!(summary.dropped_technologies, 2);
    }

    #[test]
    fn test_empty_events_give_empty_matrix() {
        let matrix = TimeSeriesMatrix::from_events(&[], Granularity::Month);
        assert!(matrix.is_empty());
        assert!(matrix.technologies().is_empty());
    }
}
