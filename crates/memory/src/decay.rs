//! Read-time decay of memory relevance.
//!
//! A record's effective score is `score * max(0.1, 1 - age_days / window)`:
//! a bounded linear ramp, floored so that old but strongly relevant
//! memories fade without ever vanishing. Records whose decayed score falls
//! below the threshold are dropped. Records without a timestamp are passed
//! through untouched.

use aru_core::memory::MemoryRecord;
use chrono::{DateTime, Utc};

/// Lowest factor decay can reach.
pub const DECAY_FLOOR: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecayPolicy {
    /// Days until a record reaches the floor
    pub window_days: f64,
    /// Decayed scores below this are excluded
    pub threshold: f32,
}

impl Default for DecayPolicy {
    fn default() -> Self {
        Self {
            window_days: 90.0,
            threshold: 0.3,
        }
    }
}

impl DecayPolicy {
    pub fn new(window_days: f64, threshold: f32) -> Self {
        Self { window_days, threshold }
    }

    /// Multiplier for a record of the given age.
    pub fn factor(&self, age_days: f64) -> f64 {
        if self.window_days <= 0.0 {
            return DECAY_FLOOR;
        }
        (1.0 - age_days.max(0.0) / self.window_days).max(DECAY_FLOOR)
    }

    /// Decay every record's score as of `now` and drop those under the threshold.
    pub fn apply(&self, records: Vec<MemoryRecord>, now: DateTime<Utc>) -> Vec<MemoryRecord> {
        records
            .into_iter()
            .filter_map(|mut record| {
                let Some(age) = record.age_days(now) else {
                    return Some(record);
                };
                record.score = (record.score as f64 * self.factor(age)) as f32;
                (record.score >= self.threshold).then_some(record)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aru_core::memory::MemoryType;
    use chrono::Duration;

    fn aged(days: i64, score: f32, now: DateTime<Utc>) -> MemoryRecord {
        let mut r = MemoryRecord::new("u", MemoryType::Semantic, format!("{days} days old"));
        r.created_at = Some(now - Duration::days(days));
        r.score = score;
        r
    }

    #[test]
    fn fresh_record_is_not_decayed() {
        let policy = DecayPolicy::default();
        assert!((policy.factor(0.0) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn factor_is_linear_within_window() {
        let policy = DecayPolicy::new(90.0, 0.3);
        assert!((policy.factor(45.0) - 0.5).abs() < 1e-9);
        assert!((policy.factor(9.0) - 0.9).abs() < 1e-9);
    }

    #[test]
    fn factor_is_floored() {
        let policy = DecayPolicy::new(90.0, 0.3);
        assert!((policy.factor(100.0) - DECAY_FLOOR).abs() < f64::EPSILON);
        assert!((policy.factor(10_000.0) - DECAY_FLOOR).abs() < f64::EPSILON);
    }

    #[test]
    fn decay_is_monotonic_and_bounded() {
        let policy = DecayPolicy::new(90.0, 0.0);
        let mut previous = f64::MAX;
        for day in 0..400 {
            let f = policy.factor(day as f64);
            assert!(f <= previous, "factor rose at day {day}");
            assert!(f >= DECAY_FLOOR);
            previous = f;
        }
    }

    #[test]
    fn hundred_day_old_record_is_excluded() {
        let now = Utc::now();
        let policy = DecayPolicy::new(90.0, 0.3);
        let kept = policy.apply(vec![aged(100, 1.0, now)], now);
        assert!(kept.is_empty());
    }

    #[test]
    fn floored_score_survives_zero_threshold() {
        let now = Utc::now();
        let policy = DecayPolicy::new(90.0, 0.0);
        let kept = policy.apply(vec![aged(100, 1.0, now)], now);
        assert_eq!(kept.len(), 1);
        assert!((kept[0].score - 0.1).abs() < 1e-6);
    }

    #[test]
    fn older_record_never_outranks_younger() {
        let now = Utc::now();
        let policy = DecayPolicy::new(90.0, 0.0);
        let kept = policy.apply(vec![aged(10, 0.8, now), aged(60, 0.8, now)], now);
        assert!(kept[0].score >= kept[1].score);
    }

    // Untimestamped records keep their full score, even below the threshold.
    #[test]
    fn record_without_timestamp_passes_through_undecayed() {
        let now = Utc::now();
        let policy = DecayPolicy::new(90.0, 0.3);
        let mut r = MemoryRecord::new("u", MemoryType::Episodic, "imported");
        r.created_at = None;
        r.score = 0.2;
        let kept = policy.apply(vec![r], now);
        assert_eq!(kept.len(), 1);
        assert!((kept[0].score - 0.2).abs() < f32::EPSILON);
    }
}
