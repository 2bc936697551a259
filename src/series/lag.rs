use ndarray::ArrayView1;
use tracing::{debug, info};

use super::granger::granger_p_value;
use super::matrix::TimeSeriesMatrix;
use super::types::{Candidate, CorrelationResult, CorrelationSummary, Direction};
use crate::config::PipelineConfig;
use crate::TARGET_SERIES;

const ZSCORE_EPSILON: f64 = 1e-9;

/// `(x - mean) / (sample std + epsilon)`.
pub fn zscore(series: ArrayView1<'_, f64>) -> Vec<f64> {
    let n = series.len();
    if n == 0 {
        return Vec::new();
    }
    let mean = series.sum() / n as f64;
    let std = if n > 1 {
        (series.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64).sqrt()
    } else {
        0.0
    };
    series
        .iter()
        .map(|v| (v - mean) / (std + ZSCORE_EPSILON))
        .collect()
}

/// `(lag, corr)` for every lag in `-max_lag..=max_lag` shorter than the
/// series, where `corr(k) = (1/n) * sum_t a[t] * b[t + k]`.
pub fn cross_correlation(a: &[f64], b: &[f64], max_lag: usize) -> Vec<(i64, f64)> {
    let n = a.len().min(b.len());
    if n == 0 {
        return Vec::new();
    }
    let limit = max_lag.min(n - 1) as i64;
    (-limit..=limit)
        .map(|k| {
            let sum: f64 = (0..n as i64)
                .filter(|t| (0..n as i64).contains(&(t + k)))
                .map(|t| a[t as usize] * b[(t + k) as usize])
                .sum();
            (k, sum / n as f64)
        })
        .collect()
}

/// Lag with the largest |corr|. Ties go to the smallest |lag|, then to the
/// positive lag.
pub fn best_lag(correlations: &[(i64, f64)]) -> Option<(i64, f64)> {
    correlations.iter().copied().fold(None, |best, (lag, corr)| match best {
        None => Some((lag, corr)),
        Some((best_lag, best_corr)) => {
            let better = corr
                .abs()
                .total_cmp(&best_corr.abs())
                .then_with(|| best_lag.abs().cmp(&lag.abs()))
                .then_with(|| lag.cmp(&best_lag))
                .is_gt();
            if better {
                Some((lag, corr))
            } else {
                best
            }
        }
    })
}

/// Best-lag correlation of two raw frequency series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairStats {
    pub correlation: f64,
    pub lag: i64,
}

/// Searches candidate pairs for lead/lag relationships.
pub struct LagAnalyzer {
    max_lag: usize,
    min_periods: usize,
    granger_min_periods: usize,
    weak_correlation: f64,
}

impl LagAnalyzer {
    pub fn new(config: &PipelineConfig) -> Self {
        LagAnalyzer {
            max_lag: config.max_lag,
            min_periods: config.min_periods,
            granger_min_periods: config.granger_min_periods,
            weak_correlation: config.weak_correlation,
        }
    }

    /// `None` when the series are shorter than the configured minimum.
    pub fn analyze_pair(&self, source: ArrayView1<'_, f64>, target: ArrayView1<'_, f64>) -> Option<PairStats> {
        if source.len() < self.min_periods {
            return None;
        }
        let a = zscore(source);
        let b = zscore(target);
        best_lag(&cross_correlation(&a, &b, self.max_lag))
            .map(|(lag, correlation)| PairStats { correlation, lag })
    }

    /// Results sorted by |correlation| descending, then by source and target.
    pub fn analyze(
        &self,
        matrix: &TimeSeriesMatrix,
        candidates: &[Candidate],
    ) -> (Vec<CorrelationResult>, CorrelationSummary) {
        let mut summary = CorrelationSummary {
            candidates: candidates.len(),
            ..Default::default()
        };
        let mut results = Vec::new();

        for candidate in candidates {
            let (source, target) = match (
                matrix.series(&candidate.source),
                matrix.series(&candidate.target),
            ) {
                (Some(s), Some(t)) => (s, t),
                _ => {
                    debug!(
                        target: TARGET_SERIES,
                        "No series for {} / {}", candidate.source, candidate.target
                    );
                    summary.name_mismatch += 1;
                    continue;
                }
            };

            let stats = match self.analyze_pair(source, target) {
                Some(stats) => stats,
                None => {
                    summary.too_short += 1;
                    continue;
                }
            };

            let granger_p = if source.len() > self.granger_min_periods {
                summary.granger_attempted += 1;
                let y: Vec<f64> = target.to_vec();
                let x: Vec<f64> = source.to_vec();
                match granger_p_value(&y, &x) {
                    Ok(p) => Some(p),
                    Err(e) => {
                        debug!(
                            target: TARGET_SERIES,
                            "Granger test failed for {} -> {}: {}", candidate.source, candidate.target, e
                        );
                        summary.granger_failures += 1;
                        None
                    }
                }
            } else {
                None
            };

            results.push(CorrelationResult {
                source: candidate.source.clone(),
                target: candidate.target.clone(),
                weight: candidate.weight,
                correlation: stats.correlation,
                lag: stats.lag,
                direction: Direction::from_lag(stats.correlation, stats.lag, self.weak_correlation),
                granger_p,
            });
        }

        results.sort_by(|a, b| {
            b.correlation
                .abs()
                .total_cmp(&a.correlation.abs())
                .then_with(|| a.source.cmp(&b.source))
                .then_with(|| a.target.cmp(&b.target))
        });
        summary.analyzed = results.len();

        info!(
            target: TARGET_SERIES,
            "Analyzed {} of {} candidate pairs ({} name mismatches, {} too short, {} Granger failures of {})",
            summary.analyzed,
            summary.candidates,
            summary.name_mismatch,
            summary.too_short,
            summary.granger_failures,
            summary.granger_attempted
        );
        (results, summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::{Event, Granularity};
    use chrono::NaiveDate;
    use ndarray::Array1;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn analyzer() -> LagAnalyzer {
        LagAnalyzer::new(&PipelineConfig::default())
    }

    fn random_series(seed: u64, n: usize) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n).map(|_| rng.random::<f64>()).collect()
    }

    #[test]
    fn test_zscore_has_zero_mean() {
        let z = zscore(Array1::from(vec![1.0, 2.0, 3.0, 4.0]).view());
        assert!(z.iter().sum::<f64>().abs() < 1e-12);
        // constant series does not divide by zero
        let flat = zscore(Array1::from(vec![0.5; 6]).view());
        assert!(flat.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_source_leading_by_two_gives_positive_lag() {
        let a = random_series(42, 30);
        let mut b = vec![0.0; 30];
        for t in 2..30 {
            b[t] = a[t - 2];
        }
        let stats = analyzer()
            .analyze_pair(Array1::from(a).view(), Array1::from(b).view())
            .unwrap();
        assert_eq!(stats.lag, 2);
        assert!(stats.correlation > 0.5);
    }

    #[test]
    fn test_impulse_shifted_forward_peaks_at_positive_lag() {
        // target repeats the source's spike two periods later
        let a = [1.0, 0.0, 0.0, 0.0];
        let b = [0.0, 0.0, 1.0, 0.0];
        let corr = cross_correlation(&a, &b, 3);
        assert_eq!(corr.len(), 7);
        for (lag, value) in corr {
            let expected = if lag == 2 { 0.25 } else { 0.0 };
            assert_eq!(value, expected, "lag {}", lag);
        }
    }

    #[test]
    fn test_swapping_pair_negates_lag() {
        for seed in 0..10 {
            let a = Array1::from(random_series(seed, 24));
            let b = Array1::from(random_series(seed + 100, 24));
            let forward = analyzer().analyze_pair(a.view(), b.view()).unwrap();
            let backward = analyzer().analyze_pair(b.view(), a.view()).unwrap();
            assert_eq!(forward.lag, -backward.lag);
            assert!((forward.correlation.abs() - backward.correlation.abs()).abs() < 1e-12);
        }
    }

    #[test]
    fn test_equal_correlations_prefer_smallest_then_positive_lag() {
        assert_eq!(best_lag(&[(-1, 0.5), (0, -0.5), (1, 0.5)]), Some((0, -0.5)));
        assert_eq!(best_lag(&[(-2, 0.5), (2, -0.5)]), Some((2, -0.5)));
        assert_eq!(best_lag(&[]), None);
    }

    #[test]
    fn test_short_series_are_skipped() {
        let a = Array1::from(vec![0.1, 0.2, 0.3]);
        assert!(analyzer().analyze_pair(a.view(), a.view()).is_none());
    }

    #[test]
    fn test_analyze_counts_skips() {
        let start = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
        let mut events = Vec::new();
        for month in 0..20u32 {
            let date = start
                .checked_add_months(chrono::Months::new(month))
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap();
            for _ in 0..(1 + month % 3) {
                events.push(Event { time: date, technology: "A".to_string() });
            }
            for _ in 0..(1 + month % 4) {
                events.push(Event { time: date, technology: "B".to_string() });
            }
        }
        let matrix = TimeSeriesMatrix::from_events(&events, Granularity::Month);
        let candidates = vec![
            Candidate { source: "A".into(), target: "B".into(), weight: 12.0 },
            Candidate { source: "A".into(), target: "Z".into(), weight: 11.0 },
        ];
        let (results, summary) = analyzer().analyze(&matrix, &candidates);
        assert_eq!(results.len(), 1);
        assert_eq!(summary.name_mismatch, 1);
        assert_eq!(summary.granger_attempted, 1);
        assert_eq!(results[0].weight, 12.0);
        assert!(results[0].lag.abs() <= 12);
        if let Some(p) = results[0].granger_p {
            assert!((0.0..=1.0).contains(&p));
        }
    }
}
