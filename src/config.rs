use crate::environment::get_env_var_or;
use crate::error::ConfigError;
use crate::graph::ActivityMatch;
use crate::series::Granularity;

pub const TOP_K_ENV: &str = "TECHMAP_TOP_K";
pub const MIN_SCORE_ENV: &str = "TECHMAP_MIN_SCORE";
pub const INDIRECT_WEIGHT_ENV: &str = "TECHMAP_INDIRECT_WEIGHT";
pub const GRANULARITY_ENV: &str = "TECHMAP_GRANULARITY";
pub const MAX_LAG_ENV: &str = "TECHMAP_MAX_LAG";
pub const WEIGHT_THRESHOLD_ENV: &str = "TECHMAP_WEIGHT_THRESHOLD";
pub const ACTIVITY_MATCH_ENV: &str = "TECHMAP_ACTIVITY_MATCH";

pub const DEFAULT_TOP_K: usize = 3;
pub const DEFAULT_MIN_SCORE: f32 = 0.0;
pub const DEFAULT_DIRECT_WEIGHT: f64 = 1.0;
pub const DEFAULT_INDIRECT_WEIGHT_FACTOR: f64 = 0.3;
pub const DEFAULT_MAX_LAG: usize = 12;
pub const DEFAULT_MIN_PERIODS: usize = 6;
pub const DEFAULT_GRANGER_MIN_PERIODS: usize = 15;
pub const DEFAULT_WEIGHT_THRESHOLD: f64 = 10.0;
pub const DEFAULT_WEAK_CORRELATION: f64 = 0.2;

/// Every tunable of the pipeline. Each stage is constructed from one of these.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Number of external matches kept per internal item.
    pub top_k: usize,
    /// Matches scoring below this are kept but flagged as below threshold.
    pub min_score: f32,
    /// Weight added per project for a direct co-occurrence.
    pub direct_weight: f64,
    /// Multiplier applied to an internal label's activity count in the indirect pass.
    pub indirect_weight_factor: f64,
    pub granularity: Granularity,
    /// Largest lag, in periods, searched by the cross-correlation.
    pub max_lag: usize,
    /// Series shorter than this are skipped.
    pub min_periods: usize,
    /// Series must be longer than this for the Granger test to run.
    pub granger_min_periods: usize,
    /// Only edges heavier than this become correlation candidates.
    pub candidate_weight_threshold: f64,
    /// |correlation| below this is reported as weak.
    pub weak_correlation: f64,
    pub activity_match: ActivityMatch,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            min_score: DEFAULT_MIN_SCORE,
            direct_weight: DEFAULT_DIRECT_WEIGHT,
            indirect_weight_factor: DEFAULT_INDIRECT_WEIGHT_FACTOR,
            granularity: Granularity::Month,
            max_lag: DEFAULT_MAX_LAG,
            min_periods: DEFAULT_MIN_PERIODS,
            granger_min_periods: DEFAULT_GRANGER_MIN_PERIODS,
            candidate_weight_threshold: DEFAULT_WEIGHT_THRESHOLD,
            weak_correlation: DEFAULT_WEAK_CORRELATION,
            activity_match: ActivityMatch::Exact,
        }
    }
}

impl PipelineConfig {
    /// Defaults overlaid with whatever `TECHMAP_*` variables are set.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            top_k: get_env_var_or(TOP_K_ENV, defaults.top_k),
            min_score: get_env_var_or(MIN_SCORE_ENV, defaults.min_score),
            indirect_weight_factor: get_env_var_or(
                INDIRECT_WEIGHT_ENV,
                defaults.indirect_weight_factor,
            ),
            granularity: get_env_var_or(GRANULARITY_ENV, defaults.granularity),
            max_lag: get_env_var_or(MAX_LAG_ENV, defaults.max_lag),
            candidate_weight_threshold: get_env_var_or(
                WEIGHT_THRESHOLD_ENV,
                defaults.candidate_weight_threshold,
            ),
            activity_match: get_env_var_or(ACTIVITY_MATCH_ENV, defaults.activity_match),
            ..defaults
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.top_k == 0 {
            return Err(ConfigError::invalid("top_k", "must be at least 1"));
        }
        if !self.min_score.is_finite() {
            return Err(ConfigError::invalid("min_score", "must be a finite number"));
        }
        let weight_ok = |w: f64| w.is_finite() && w >= 0.0;
        if !weight_ok(self.direct_weight) || !weight_ok(self.indirect_weight_factor) {
            return Err(ConfigError::invalid(
                "weights",
                "direct and indirect weights must be finite and not negative",
            ));
        }
        if !self.candidate_weight_threshold.is_finite() {
            return Err(ConfigError::invalid(
                "candidate_weight_threshold",
                "must be a finite number",
            ));
        }
        if !(0.0..=1.0).contains(&self.weak_correlation) {
            return Err(ConfigError::invalid(
                "weak_correlation",
                "must be within 0.0..=1.0",
            ));
        }
        if self.max_lag == 0 {
            return Err(ConfigError::invalid("max_lag", "must be at least 1"));
        }
        if self.min_periods < 3 {
            return Err(ConfigError::invalid("min_periods", "must be at least 3"));
        }
        if let ActivityMatch::Fuzzy { threshold } = self.activity_match {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(ConfigError::invalid(
                    "activity_match",
                    "fuzzy threshold must be within 0.0..=1.0",
                ));
            }
        }
        Ok(())
    }
}
