use chrono::NaiveDateTime;
use std::fmt;

/// One technology mention at a point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub time: NaiveDateTime,
    pub technology: String,
}

/// A technology pair to test, usually a heavy graph edge.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub source: String,
    pub target: String,
    pub weight: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Weak,
    SourceLeads,
    TargetLeads,
    Synchronous,
}

impl Direction {
    pub fn from_lag(correlation: f64, lag: i64, weak_below: f64) -> Self {
        if correlation.abs() < weak_below {
            Direction::Weak
        } else if lag > 0 {
            Direction::SourceLeads
        } else if lag < 0 {
            Direction::TargetLeads
        } else {
            Direction::Synchronous
        }
    }

    /// Column text for a result row.
    pub fn describe(&self, source: &str, target: &str) -> String {
        match self {
            Direction::Weak => "弱相关".to_string(),
            Direction::SourceLeads => format!("{} -> {}", source, target),
            Direction::TargetLeads => format!("{} -> {}", target, source),
            Direction::Synchronous => "同步/不确定".to_string(),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::Weak => "weak",
            Direction::SourceLeads => "source-leads",
            Direction::TargetLeads => "target-leads",
            Direction::Synchronous => "synchronous",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationResult {
    pub source: String,
    pub target: String,
    pub weight: f64,
    /// Cross-correlation at the best lag.
    pub correlation: f64,
    /// Positive when the source leads the target.
    pub lag: i64,
    pub direction: Direction,
    pub granger_p: Option<f64>,
}

impl CorrelationResult {
    pub fn direction_text(&self) -> String {
        self.direction.describe(&self.source, &self.target)
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct CorrelationSummary {
    pub candidates: usize,
    pub analyzed: usize,
    /// Pairs naming a technology absent from the time series.
    pub name_mismatch: usize,
    pub too_short: usize,
    pub granger_attempted: usize,
    pub granger_failures: usize,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct EventSummary {
    pub rows: usize,
    pub rows_without_time: usize,
    pub events: usize,
    /// Technology cells that were empty, placeholders or below threshold.
    pub dropped_technologies: usize,
}
