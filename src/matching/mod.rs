pub mod reverse;
pub mod similarity;
pub mod topk;
pub mod types;

pub use reverse::{ReverseIndex, ReverseIndexEntry, ReverseIndexStats};
pub use similarity::similarity_matrix;
pub use topk::TopKMatcher;
pub use types::*;
