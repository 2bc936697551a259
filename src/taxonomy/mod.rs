pub mod builder;
pub mod extract;
pub mod types;

pub use builder::TaxonomyBuilder;
pub use extract::{extract_items, Extraction, TaxonomyItem};
pub use types::*;
