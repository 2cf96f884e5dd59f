//! Actual-vs-estimate variance analysis.
//!
//! Classifies finalized step times against their estimates. The `Over`
//! boundary (20% past estimate) is what downstream consumers use to flag
//! at-risk work.

use serde::{Deserialize, Serialize};

/// Ratio above which work is worth watching
pub const WATCH_THRESHOLD: f64 = 1.0;

/// Ratio above which work is flagged as over estimate (actual exceeds
/// estimate by more than 20%)
pub const OVER_THRESHOLD: f64 = 1.2;

/// Classification of an actual-vs-estimate gap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapClass {
    /// Actual time at or under the estimate
    OnTrack,
    /// Up to 20% over the estimate
    Watch,
    /// More than 20% over the estimate
    Over,
    /// No usable estimate to compare against
    Unrated,
}

impl std::fmt::Display for GapClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GapClass::OnTrack => write!(f, "on_track"),
            GapClass::Watch => write!(f, "watch"),
            GapClass::Over => write!(f, "over"),
            GapClass::Unrated => write!(f, "unrated"),
        }
    }
}

/// A classified gap between actual and estimated time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gap {
    /// actual / estimate; absent when the estimate is zero or missing
    pub ratio: Option<f64>,
    pub class: GapClass,
}

impl Gap {
    /// The unrated gap, used when no estimate exists
    pub fn unrated() -> Self {
        Self {
            ratio: None,
            class: GapClass::Unrated,
        }
    }
}

/// Classify an actual time against its estimate.
///
/// A zero or negative estimate yields `Unrated` with no ratio.
pub fn classify(actual_seconds: i64, estimated_seconds: i64) -> Gap {
    if estimated_seconds <= 0 {
        return Gap::unrated();
    }

    let ratio = actual_seconds as f64 / estimated_seconds as f64;
    let class = if ratio <= WATCH_THRESHOLD {
        GapClass::OnTrack
    } else if ratio <= OVER_THRESHOLD {
        GapClass::Watch
    } else {
        GapClass::Over
    };

    Gap {
        ratio: Some(ratio),
        class,
    }
}

/// Classify the aggregate gap over finalized steps.
///
/// Takes `(actual_seconds, estimated_seconds)` pairs for every step that has
/// been finalized (completed or skipped); pending and in-progress steps are
/// excluded by the caller. The result is `Unrated` when no finalized step
/// carried an estimate.
pub fn aggregate(finalized: impl IntoIterator<Item = (i64, i64)>) -> Gap {
    let mut actual_total = 0;
    let mut estimate_total = 0;
    for (actual, estimate) in finalized {
        actual_total += actual;
        estimate_total += estimate.max(0);
    }

    classify(actual_total, estimate_total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_under_estimate_is_on_track() {
        let gap = classify(300, 600);
        assert_eq!(gap.class, GapClass::OnTrack);
        assert_eq!(gap.ratio, Some(0.5));
    }

    #[test]
    fn test_exactly_on_estimate_is_on_track() {
        // Boundary: ratio exactly 1.0
        let gap = classify(900, 900);
        assert_eq!(gap.class, GapClass::OnTrack);
        assert_eq!(gap.ratio, Some(1.0));
    }

    #[test]
    fn test_just_over_estimate_is_watch() {
        let gap = classify(650, 600);
        assert_eq!(gap.class, GapClass::Watch);
    }

    #[test]
    fn test_exactly_twenty_percent_over_is_watch() {
        // Boundary: ratio exactly 1.2
        let gap = classify(720, 600);
        assert_eq!(gap.class, GapClass::Watch);
    }

    #[test]
    fn test_past_twenty_percent_is_over() {
        // Ratio 1.2000001
        let gap = classify(12_000_001, 10_000_000);
        assert_eq!(gap.class, GapClass::Over);

        let gap = classify(1200, 600);
        assert_eq!(gap.class, GapClass::Over);
    }

    #[test]
    fn test_zero_estimate_is_unrated() {
        let gap = classify(500, 0);
        assert_eq!(gap.class, GapClass::Unrated);
        assert_eq!(gap.ratio, None);
    }

    #[test]
    fn test_aggregate_sums_before_classifying() {
        // 650 + 900 + 50 actual vs 600 + 900 + 300 estimated
        let gap = aggregate([(650, 600), (900, 900), (50, 300)]);
        assert_eq!(gap.class, GapClass::OnTrack);
        let ratio = gap.ratio.unwrap();
        assert!((ratio - 1600.0 / 1800.0).abs() < 1e-9);
    }

    #[test]
    fn test_aggregate_over() {
        let gap = aggregate([(900, 600), (900, 600)]);
        assert_eq!(gap.class, GapClass::Over);
    }

    #[test]
    fn test_aggregate_of_unrated_steps_is_unrated() {
        let gap = aggregate([(500, 0), (100, 0)]);
        assert_eq!(gap.class, GapClass::Unrated);
    }

    #[test]
    fn test_aggregate_empty_is_unrated() {
        let gap = aggregate([]);
        assert_eq!(gap.class, GapClass::Unrated);
    }

    #[test]
    fn test_gap_class_display() {
        assert_eq!(GapClass::OnTrack.to_string(), "on_track");
        assert_eq!(GapClass::Over.to_string(), "over");
    }
}
