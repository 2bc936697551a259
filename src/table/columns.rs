//! Header names of every tabular artifact.
//!
//! Ranked columns are numbered from 1, e.g. `外部标签_1`, `相似度_1`.

pub const PROJECT_NAME: &str = "项目名称";
pub const INTERNAL_PATH: &str = "原内部路径";

// label mapping table
pub const INTERNAL_LABEL: &str = "内部标签";

pub fn mapped_label(rank: usize) -> String {
    format!("匹配外部标签_{}", rank)
}

pub fn similarity(rank: usize) -> String {
    format!("相似度_{}", rank)
}

// project match table
pub fn external_label(rank: usize) -> String {
    format!("外部标签_{}", rank)
}

// flattened report
pub const ORIGINAL_ATTRIBUTION: &str = "原内部归属(完整)";
pub const AMOUNT: &str = "金额";
pub const START_TIME: &str = "Start_Time_Extracted";

pub fn technology(rank: usize) -> String {
    format!("AI匹配技术_{}", rank)
}

pub fn attribution(rank: usize) -> String {
    format!("反查归属_{}(完整)", rank)
}

// reverse index
pub const LEAF_KEY: &str = "外部标签(叶子)";
pub const ATTRIBUTED_PATH: &str = "反查归属(完整)";
pub const SCORE: &str = "相似度";

// internal co-occurrence
pub const COMBINED: &str = "归属组合(简化)";
pub const COUNT: &str = "同时出现次数";
pub const PATH_A: &str = "标签_A(完整路径)";
pub const PATH_B: &str = "标签_B(完整路径)";

// graph edges and correlation results
pub const SOURCE: &str = "Source";
pub const TARGET: &str = "Target";
pub const WEIGHT: &str = "Weight";
pub const DIRECT_SCORE: &str = "Direct_Score";
pub const INDIRECT_SCORE: &str = "Indirect_Score";
pub const SOURCE_L1: &str = "Source_L1";
pub const SOURCE_L2: &str = "Source_L2";
pub const TARGET_L1: &str = "Target_L1";
pub const TARGET_L2: &str = "Target_L2";
pub const MAX_CORR: &str = "Max_Corr";
pub const LAG: &str = "Lag";
pub const DIRECTION: &str = "Direction";
pub const GRANGER_P: &str = "Granger_P";
