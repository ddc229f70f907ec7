//! Calibration report: the statistical summary derived from resolved
//! [`PredictionRecord`]s.

use std::collections::HashMap;

use serde::Serialize;

use crate::core::domain::{Category, PredictionRecord, SignalTag};

/// Count/Brier/accuracy rollup shared by per-category, per-signal, and
/// rolling-window breakdowns.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SampleMetrics {
    pub count: usize,
    pub brier_score: f64,
    pub directional_accuracy: f64,
}

/// One bucket of the ten-bucket reliability curve.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ReliabilityBucket {
    pub range_start: f64,
    pub range_end: f64,
    pub count: usize,
    pub empirical_frequency: f64,
    pub calibration_error: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CalibrationReport {
    pub sample_count: usize,
    pub brier_score: f64,
    pub directional_accuracy: f64,
    pub reliability_curve: Vec<ReliabilityBucket>,
    pub overall_calibration_error: f64,
    pub overconfident: bool,
    pub per_category: HashMap<Category, SampleMetrics>,
    pub per_signal: HashMap<SignalTag, SampleMetrics>,
    pub rolling_7d: Option<SampleMetrics>,
    pub rolling_30d: Option<SampleMetrics>,
}

impl CalibrationReport {
    /// Computes the report over `resolved` — callers must already have
    /// filtered to records where `is_resolved()` holds.
    #[must_use]
    pub fn compute(resolved: &[&PredictionRecord]) -> Self {
        let sample_count = resolved.len();
        if sample_count == 0 {
            return Self {
                sample_count: 0,
                brier_score: 0.0,
                directional_accuracy: 0.0,
                reliability_curve: bucket_ranges().map(|(s, e)| ReliabilityBucket {
                    range_start: s,
                    range_end: e,
                    count: 0,
                    empirical_frequency: 0.0,
                    calibration_error: 0.0,
                }).collect(),
                overall_calibration_error: 0.0,
                overconfident: false,
                per_category: HashMap::new(),
                per_signal: HashMap::new(),
                rolling_7d: None,
                rolling_30d: None,
            };
        }

        let brier_score = mean(resolved.iter().filter_map(|r| r.brier_contribution));
        let directional_accuracy = fraction_true(resolved.iter().filter_map(|r| r.was_correct_direction));
        let mean_confidence = mean(resolved.iter().map(|r| r.confidence));
        let overconfident = mean_confidence > directional_accuracy + 0.1;

        let reliability_curve = build_reliability_curve(resolved);
        let overall_calibration_error = weighted_mean_error(&reliability_curve);

        let mut per_category: HashMap<Category, SampleMetrics> = HashMap::new();
        for category in [
            Category::Sports,
            Category::Weather,
            Category::Macro,
            Category::Politics,
            Category::Geopolitics,
            Category::Crypto,
            Category::Entertainment,
            Category::Tech,
            Category::Health,
            Category::Other,
        ] {
            let subset: Vec<&&PredictionRecord> = resolved.iter().filter(|r| r.category == category).collect();
            if subset.len() >= 5 {
                per_category.insert(category, metrics_for(subset.into_iter().map(|r| *r)));
            }
        }

        let mut per_signal: HashMap<SignalTag, SampleMetrics> = HashMap::new();
        for tag in SignalTag::ALL {
            let subset: Vec<&PredictionRecord> = resolved
                .iter()
                .filter(|r| r.signal_sources.contains(&tag))
                .map(|r| &**r)
                .collect();
            if subset.len() >= 5 {
                per_signal.insert(tag, metrics_for(subset.into_iter()));
            }
        }

        Self {
            sample_count,
            brier_score,
            directional_accuracy,
            reliability_curve,
            overall_calibration_error,
            overconfident,
            per_category,
            per_signal,
            rolling_7d: rolling_window(resolved, 7, 3),
            rolling_30d: rolling_window(resolved, 30, 10),
        }
    }
}

fn bucket_ranges() -> impl Iterator<Item = (f64, f64)> {
    (0..10).map(|i| (i as f64 / 10.0, (i + 1) as f64 / 10.0))
}

fn build_reliability_curve(resolved: &[&PredictionRecord]) -> Vec<ReliabilityBucket> {
    bucket_ranges()
        .map(|(start, end)| {
            let in_bucket: Vec<&&PredictionRecord> = resolved
                .iter()
                .filter(|r| r.estimate >= start && (r.estimate < end || (end >= 1.0 && r.estimate <= end)))
                .collect();
            let count = in_bucket.len();
            let empirical_frequency = fraction_true(in_bucket.iter().filter_map(|r| r.outcome));
            let midpoint = (start + end) / 2.0;
            ReliabilityBucket {
                range_start: start,
                range_end: end,
                count,
                empirical_frequency,
                calibration_error: (midpoint - empirical_frequency).abs(),
            }
        })
        .collect()
}

fn weighted_mean_error(buckets: &[ReliabilityBucket]) -> f64 {
    let total: usize = buckets.iter().map(|b| b.count).sum();
    if total == 0 {
        return 0.0;
    }
    buckets.iter().map(|b| b.calibration_error * b.count as f64).sum::<f64>() / total as f64
}

fn metrics_for<'a>(records: impl Iterator<Item = &'a PredictionRecord>) -> SampleMetrics {
    let records: Vec<&PredictionRecord> = records.collect();
    SampleMetrics {
        count: records.len(),
        brier_score: mean(records.iter().filter_map(|r| r.brier_contribution)),
        directional_accuracy: fraction_true(records.iter().filter_map(|r| r.was_correct_direction)),
    }
}

fn rolling_window(resolved: &[&PredictionRecord], days: i64, min_samples: usize) -> Option<SampleMetrics> {
    let cutoff = chrono::Utc::now() - chrono::Duration::days(days);
    let subset: Vec<&PredictionRecord> = resolved.iter().filter(|r| r.predicted_at >= cutoff).map(|r| &**r).collect();
    if subset.len() < min_samples {
        return None;
    }
    Some(metrics_for(subset.into_iter()))
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let values: Vec<f64> = values.collect();
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn fraction_true(values: impl Iterator<Item = bool>) -> f64 {
    let values: Vec<bool> = values.collect();
    if values.is_empty() {
        return 0.0;
    }
    values.iter().filter(|v| **v).count() as f64 / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use crate::core::domain::{MarketId, Platform};

    fn resolved_record(estimate: f64, outcome: bool) -> PredictionRecord {
        let mut r = PredictionRecord::new(
            Platform::new("kalshi"),
            MarketId::new("m"),
            Category::Crypto,
            Utc::now(),
            estimate,
            dec!(0.5),
            vec![SignalTag::Whale],
            0.8,
        );
        r.resolve(Utc::now(), outcome, None);
        r
    }

    #[test]
    fn empty_report_has_zeroed_fields() {
        let report = CalibrationReport::compute(&[]);
        assert_eq!(report.sample_count, 0);
        assert_eq!(report.reliability_curve.len(), 10);
    }

    #[test]
    fn brier_score_is_mean_of_contributions() {
        let a = resolved_record(0.8, true);
        let b = resolved_record(0.2, false);
        let refs = [&a, &b];
        let report = CalibrationReport::compute(&refs);
        assert!((report.brier_score - 0.04).abs() < 1e-9);
    }

    #[test]
    fn reliability_curve_covers_full_range_inclusive_of_one() {
        let a = resolved_record(1.0, true);
        let refs = [&a];
        let report = CalibrationReport::compute(&refs);
        let last = report.reliability_curve.last().unwrap();
        assert_eq!(last.count, 1);
    }

    #[test]
    fn per_category_requires_at_least_five_samples() {
        let records: Vec<PredictionRecord> = (0..4).map(|_| resolved_record(0.6, true)).collect();
        let refs: Vec<&PredictionRecord> = records.iter().collect();
        let report = CalibrationReport::compute(&refs);
        assert!(report.per_category.is_empty());
    }
}
