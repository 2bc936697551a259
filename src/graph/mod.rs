pub mod activity;
pub mod cooccurrence;
pub mod internal;
pub mod types;

pub use activity::{ActivityCounts, ActivityMatch, DEFAULT_FUZZY_THRESHOLD};
pub use cooccurrence::CooccurrenceBuilder;
pub use internal::internal_cooccurrence;
pub use types::*;
