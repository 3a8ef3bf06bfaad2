//! Predictive levels
//!
//! A predictor supplies a reference value for a metric at a point in time.
//! How the reference is obtained is the predictor's business; the levels
//! are always the reference shifted by the configured margin.

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Which side of the reference is bad
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Upper,
    Lower,
}

/// Distance of warn/crit from the predicted reference
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Margin {
    /// In value units
    Absolute(f64, f64),
    /// In percent of the reference
    Relative(f64, f64),
}

impl Default for Margin {
    fn default() -> Self {
        Margin::Relative(10.0, 20.0)
    }
}

/// Configuration of predictive levels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictiveParams {
    pub direction: Direction,
    pub margin: Margin,
    /// How far back the reference curve looks
    pub horizon_days: u32,
}

impl Default for PredictiveParams {
    fn default() -> Self {
        Self {
            direction: Direction::Upper,
            margin: Margin::default(),
            horizon_days: 90,
        }
    }
}

impl PredictiveParams {
    /// Warn and crit for a given reference
    pub fn levels_for(&self, reference: f64) -> PredictedLevels {
        let (warn_offset, crit_offset) = match self.margin {
            Margin::Absolute(warn, crit) => (warn, crit),
            Margin::Relative(warn, crit) => {
                (reference.abs() * warn / 100.0, reference.abs() * crit / 100.0)
            }
        };
        let (warn, crit) = match self.direction {
            Direction::Upper => (reference + warn_offset, reference + crit_offset),
            Direction::Lower => (reference - warn_offset, reference - crit_offset),
        };
        PredictedLevels {
            reference,
            warn,
            crit,
        }
    }
}

/// Effective levels for the current timestamp
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictedLevels {
    pub reference: f64,
    pub warn: f64,
    pub crit: f64,
}

/// Source of predicted levels
pub trait LevelsPredictor: fmt::Debug + Send + Sync {
    /// `None` when there is no reference for this metric yet
    fn predict(&self, metric: &str, now: f64, params: &PredictiveParams) -> Option<PredictedLevels>;
}

/// Predictor backed by a configured reference curve per metric
///
/// The curve is split evenly over the day; a 24 point curve gives one
/// reference value per hour (UTC).
#[derive(Debug, Clone, Default)]
pub struct BaselinePredictor {
    curves: HashMap<String, Vec<f64>>,
}

impl BaselinePredictor {
    pub fn new(curves: HashMap<String, Vec<f64>>) -> Self {
        Self { curves }
    }

    pub fn with_curve(mut self, metric: impl Into<String>, curve: Vec<f64>) -> Self {
        self.curves.insert(metric.into(), curve);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.curves.is_empty()
    }

    fn reference(&self, metric: &str, now: f64) -> Option<f64> {
        let curve = self.curves.get(metric).filter(|c| !c.is_empty())?;
        let time = DateTime::<Utc>::from_timestamp(now.floor() as i64, 0)?;
        let second_of_day = time.num_seconds_from_midnight() as usize;
        let index = second_of_day * curve.len() / 86_400;
        curve.get(index).copied()
    }
}

impl LevelsPredictor for BaselinePredictor {
    fn predict(&self, metric: &str, now: f64, params: &PredictiveParams) -> Option<PredictedLevels> {
        self.reference(metric, now)
            .map(|reference| params.levels_for(reference))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hourly_curve() -> Vec<f64> {
        (0..24).map(|hour| hour as f64 * 10.0).collect()
    }

    #[test]
    fn test_relative_margin_upper() {
        let params = PredictiveParams::default();
        let levels = params.levels_for(50.0);
        assert_eq!(levels.reference, 50.0);
        assert_eq!(levels.warn, 55.0);
        assert_eq!(levels.crit, 60.0);
    }

    #[test]
    fn test_absolute_margin_lower() {
        let params = PredictiveParams {
            direction: Direction::Lower,
            margin: Margin::Absolute(5.0, 8.0),
            ..Default::default()
        };
        let levels = params.levels_for(50.0);
        assert_eq!(levels.warn, 45.0);
        assert_eq!(levels.crit, 42.0);
    }

    #[test]
    fn test_baseline_picks_hour_of_day() {
        let predictor = BaselinePredictor::default().with_curve("util", hourly_curve());
        // 1970-01-02 03:30 UTC
        let now = 86_400.0 + 3.5 * 3_600.0;
        let levels = predictor
            .predict("util", now, &PredictiveParams::default())
            .unwrap();
        assert_eq!(levels.reference, 30.0);
    }

    #[test]
    fn test_baseline_unknown_metric() {
        let predictor = BaselinePredictor::default().with_curve("util", hourly_curve());
        assert!(predictor
            .predict("load1", 0.0, &PredictiveParams::default())
            .is_none());
    }

    #[test]
    fn test_params_deserialize_with_defaults() {
        let params: PredictiveParams =
            serde_json::from_value(serde_json::json!({"margin": {"absolute": [1.0, 2.0]}})).unwrap();
        assert_eq!(params.direction, Direction::Upper);
        assert_eq!(params.margin, Margin::Absolute(1.0, 2.0));
        assert_eq!(params.horizon_days, 90);
    }
}
