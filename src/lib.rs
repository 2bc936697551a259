pub mod config;
pub mod embedding;
pub mod environment;
pub mod error;
pub mod graph;
pub mod logging;
pub mod matching;
pub mod normalize;
pub mod pipeline;
pub mod records;
pub mod report;
pub mod series;
pub mod table;
pub mod taxonomy;

pub use config::PipelineConfig;
pub use series::Granularity;
pub use error::ConfigError;

pub const TARGET_MATCH: &str = "label_match";
pub const TARGET_GRAPH: &str = "cooccurrence";
pub const TARGET_SERIES: &str = "time_series";
pub const TARGET_IO: &str = "table_io";
pub const TARGET_TAXONOMY: &str = "taxonomy";
pub const TARGET_EMBEDDING: &str = "embedding";

/// Long loops log a progress line every this many rows.
pub const PROGRESS_EVERY: usize = 10_000;
