//! Technology time series and lead/lag analysis.

pub mod granger;
pub mod lag;
pub mod matrix;
pub mod period;
pub mod types;

pub use granger::{granger_p_value, GrangerError};
pub use lag::{best_lag, cross_correlation, zscore, LagAnalyzer, PairStats};
pub use matrix::{events_from_report, parse_timestamp, TimeSeriesMatrix};
pub use period::Granularity;
pub use types::*;
