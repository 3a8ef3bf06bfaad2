//! Threshold evaluation
//!
//! Configured levels ([`LevelsParam`]) are resolved once per check into a
//! [`Levels`] value carrying absolute warn/crit figures (or a predictor),
//! which [`check_levels`] compares against a value. A value equal to a
//! threshold counts as having crossed it.

mod predictive;

pub use predictive::{
    BaselinePredictor, Direction, LevelsPredictor, Margin, PredictedLevels, PredictiveParams,
};

use crate::models::{CheckOutput, CheckResult, Metric, State};
use crate::render::{self, RenderFn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Levels as they appear in check parameters
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelsParam {
    #[default]
    Disabled,
    /// Upper levels in value units
    Upper(f64, f64),
    /// Lower levels in value units
    Lower(f64, f64),
    /// Upper levels in percent of a check-specific reference
    Percentage(f64, f64),
    Predictive(PredictiveParams),
}

/// Resolved levels
#[derive(Debug, Clone)]
pub enum Levels {
    Disabled,
    FixedUpper { warn: f64, crit: f64 },
    FixedLower { warn: f64, crit: f64 },
    PercentageRelative { warn: f64, crit: f64, reference: f64 },
    Predictive(PredictiveLevels),
}

/// Predictive levels bound to a metric and a predictor
#[derive(Debug, Clone)]
pub struct PredictiveLevels {
    pub metric: String,
    pub params: PredictiveParams,
    pub predictor: Option<Arc<dyn LevelsPredictor>>,
}

impl Levels {
    pub fn upper(warn: f64, crit: f64) -> Self {
        Levels::FixedUpper { warn, crit }
    }

    pub fn lower(warn: f64, crit: f64) -> Self {
        Levels::FixedLower { warn, crit }
    }

    /// Resolve configured levels
    ///
    /// Percentage levels need a reference; without one they are disabled.
    pub fn resolve(
        param: &LevelsParam,
        reference: Option<f64>,
        metric: &str,
        predictor: Option<Arc<dyn LevelsPredictor>>,
    ) -> Self {
        match param {
            LevelsParam::Disabled => Levels::Disabled,
            LevelsParam::Upper(warn, crit) => Levels::upper(*warn, *crit),
            LevelsParam::Lower(warn, crit) => Levels::lower(*warn, *crit),
            LevelsParam::Percentage(warn, crit) => match reference {
                Some(reference) => Levels::PercentageRelative {
                    warn: *warn,
                    crit: *crit,
                    reference,
                },
                None => {
                    debug!(metric, "No reference for percentage levels, disabling them");
                    Levels::Disabled
                }
            },
            LevelsParam::Predictive(params) => Levels::Predictive(PredictiveLevels {
                metric: metric.to_string(),
                params: params.clone(),
                predictor,
            }),
        }
    }

    /// Multiply fixed levels by a factor, e.g. a number of CPUs
    pub fn scaled(self, factor: f64) -> Self {
        match self {
            Levels::FixedUpper { warn, crit } => Levels::upper(warn * factor, crit * factor),
            Levels::FixedLower { warn, crit } => Levels::lower(warn * factor, crit * factor),
            other => other,
        }
    }
}

/// Rendering options of [`check_levels`]
#[derive(Debug, Clone, Copy)]
pub struct CheckLevels<'a> {
    render: RenderFn,
    label: Option<&'a str>,
    metric: Option<&'a str>,
    boundaries: Option<(f64, f64)>,
    now: f64,
}

impl<'a> CheckLevels<'a> {
    pub fn new(render: RenderFn) -> Self {
        Self {
            render,
            label: None,
            metric: None,
            boundaries: None,
            now: 0.0,
        }
    }

    /// Emit a metric under this name
    pub fn metric(mut self, name: &'a str) -> Self {
        self.metric = Some(name);
        self
    }

    pub fn label(mut self, label: &'a str) -> Self {
        self.label = Some(label);
        self
    }

    pub fn boundaries(mut self, min: f64, max: f64) -> Self {
        self.boundaries = Some((min, max));
        self
    }

    /// Timestamp handed to predictors
    pub fn at(mut self, now: f64) -> Self {
        self.now = now;
        self
    }

    fn summary(&self, text: String) -> String {
        match self.label {
            Some(label) => format!("{}: {}", label, text),
            None => text,
        }
    }
}

fn upper_state(value: f64, warn: f64, crit: f64) -> State {
    if value >= crit {
        State::Crit
    } else if value >= warn {
        State::Warn
    } else {
        State::Ok
    }
}

fn lower_state(value: f64, warn: f64, crit: f64) -> State {
    if value <= crit {
        State::Crit
    } else if value <= warn {
        State::Warn
    } else {
        State::Ok
    }
}

fn levels_text(state: State, direction: &str, warn: String, crit: String) -> String {
    if state == State::Ok {
        String::new()
    } else {
        format!(" (warn/crit {} {}/{})", direction, warn, crit)
    }
}

/// Compare a value against levels
///
/// Yields one result and, when a metric name is set, one metric.
pub fn check_levels(value: f64, levels: &Levels, options: &CheckLevels<'_>) -> Vec<CheckOutput> {
    let render = options.render;
    let mut boundaries = options.boundaries;
    let mut extra_metric = None;

    let (state, text, metric_levels) = match levels {
        Levels::Disabled => (State::Ok, render(value), None),
        Levels::FixedUpper { warn, crit } => {
            let state = upper_state(value, *warn, *crit);
            let text = format!(
                "{}{}",
                render(value),
                levels_text(state, "at", render(*warn), render(*crit))
            );
            (state, text, Some((*warn, *crit)))
        }
        Levels::FixedLower { warn, crit } => {
            let state = lower_state(value, *warn, *crit);
            let text = format!(
                "{}{}",
                render(value),
                levels_text(state, "below", render(*warn), render(*crit))
            );
            (state, text, None)
        }
        Levels::PercentageRelative {
            warn,
            crit,
            reference,
        } => {
            let abs_warn = reference * warn / 100.0;
            let abs_crit = reference * crit / 100.0;
            let percentage = if *reference == 0.0 {
                0.0
            } else {
                value / reference * 100.0
            };
            let state = upper_state(value, abs_warn, abs_crit);
            let text = format!(
                "{} - {} of {}{}",
                render::percent(percentage),
                render(value),
                render(*reference),
                levels_text(state, "at", render::percent(*warn), render::percent(*crit))
            );
            boundaries = boundaries.or(Some((0.0, *reference)));
            (state, text, Some((abs_warn, abs_crit)))
        }
        Levels::Predictive(predictive) => {
            let predicted = predictive.predictor.as_ref().and_then(|predictor| {
                predictor.predict(&predictive.metric, options.now, &predictive.params)
            });
            match predicted {
                Some(predicted) => {
                    let (state, direction) = match predictive.params.direction {
                        Direction::Upper => {
                            (upper_state(value, predicted.warn, predicted.crit), "at")
                        }
                        Direction::Lower => {
                            (lower_state(value, predicted.warn, predicted.crit), "below")
                        }
                    };
                    let text = format!(
                        "{} (predicted reference: {}){}",
                        render(value),
                        render(predicted.reference),
                        levels_text(state, direction, render(predicted.warn), render(predicted.crit))
                    );
                    if let Some(name) = options.metric {
                        extra_metric = Some(Metric::new(format!("predict_{}", name), predicted.reference));
                    }
                    let metric_levels = match predictive.params.direction {
                        Direction::Upper => Some((predicted.warn, predicted.crit)),
                        Direction::Lower => None,
                    };
                    (state, text, metric_levels)
                }
                None => (
                    State::Ok,
                    format!("{} (no reference for prediction yet)", render(value)),
                    None,
                ),
            }
        }
    };

    let mut outputs = vec![CheckOutput::Result(CheckResult::new(
        state,
        options.summary(text),
    ))];

    if let Some(name) = options.metric {
        let mut metric = Metric::new(name, value);
        metric.levels = metric_levels;
        metric.boundaries = boundaries;
        outputs.push(metric.into());
    }
    if let Some(metric) = extra_metric {
        outputs.push(metric.into());
    }

    outputs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{bytes, percent};

    fn result_of(outputs: &[CheckOutput]) -> &CheckResult {
        outputs.iter().find_map(CheckOutput::as_result).unwrap()
    }

    fn metric_of<'a>(outputs: &'a [CheckOutput], name: &str) -> &'a Metric {
        outputs
            .iter()
            .filter_map(CheckOutput::as_metric)
            .find(|m| m.name == name)
            .unwrap()
    }

    #[test]
    fn test_fixed_upper_warn() {
        let outputs = check_levels(85.0, &Levels::upper(80.0, 90.0), &CheckLevels::new(percent));
        let result = result_of(&outputs);
        assert_eq!(result.state, State::Warn);
        assert!(result.summary.contains("80"));
        assert!(result.summary.contains("90"));
        assert_eq!(result.summary, "85.00% (warn/crit at 80.00%/90.00%)");
    }

    #[test]
    fn test_fixed_upper_boundaries_inclusive() {
        let levels = Levels::upper(80.0, 90.0);
        let options = CheckLevels::new(percent);
        assert_eq!(result_of(&check_levels(90.0, &levels, &options)).state, State::Crit);
        assert_eq!(result_of(&check_levels(80.0, &levels, &options)).state, State::Warn);

        let ok = check_levels(79.999, &levels, &options);
        assert_eq!(result_of(&ok).state, State::Ok);
        assert_eq!(result_of(&ok).summary, "80.00%");
    }

    #[test]
    fn test_fixed_lower() {
        let levels = Levels::lower(20.0, 10.0);
        let options = CheckLevels::new(percent).label("Free");
        let warn = check_levels(20.0, &levels, &options);
        assert_eq!(result_of(&warn).state, State::Warn);
        assert_eq!(
            result_of(&warn).summary,
            "Free: 20.00% (warn/crit below 20.00%/10.00%)"
        );
        assert_eq!(result_of(&check_levels(10.0, &levels, &options)).state, State::Crit);
        assert_eq!(result_of(&check_levels(25.0, &levels, &options)).state, State::Ok);
    }

    #[test]
    fn test_disabled_still_emits_metric() {
        let outputs = check_levels(
            1234.0,
            &Levels::Disabled,
            &CheckLevels::new(bytes).metric("used"),
        );
        assert_eq!(result_of(&outputs).state, State::Ok);
        let metric = metric_of(&outputs, "used");
        assert_eq!(metric.value, 1234.0);
        assert!(metric.levels.is_none());
    }

    #[test]
    fn test_metric_carries_levels_and_boundaries() {
        let outputs = check_levels(
            50.0,
            &Levels::upper(80.0, 90.0),
            &CheckLevels::new(percent).metric("util").boundaries(0.0, 100.0),
        );
        let metric = metric_of(&outputs, "util");
        assert_eq!(metric.levels, Some((80.0, 90.0)));
        assert_eq!(metric.boundaries, Some((0.0, 100.0)));
    }

    #[test]
    fn test_percentage_relative() {
        let total = 8.0 * 1024.0 * 1024.0 * 1024.0;
        let levels = Levels::resolve(&LevelsParam::Percentage(80.0, 90.0), Some(total), "mem_used", None);
        let used = total * 0.85;
        let outputs = check_levels(used, &levels, &CheckLevels::new(bytes).label("Used").metric("mem_used"));

        let result = result_of(&outputs);
        assert_eq!(result.state, State::Warn);
        assert_eq!(
            result.summary,
            "Used: 85.00% - 6.80 GiB of 8.00 GiB (warn/crit at 80.00%/90.00%)"
        );

        let metric = metric_of(&outputs, "mem_used");
        assert_eq!(metric.value, used);
        assert_eq!(metric.levels, Some((total * 80.0 / 100.0, total * 90.0 / 100.0)));
        assert_eq!(metric.boundaries, Some((0.0, total)));
    }

    #[test]
    fn test_percentage_without_reference_is_disabled() {
        let levels = Levels::resolve(&LevelsParam::Percentage(80.0, 90.0), None, "x", None);
        assert!(matches!(levels, Levels::Disabled));
    }

    #[test]
    fn test_predictive_with_reference() {
        let predictor: Arc<dyn LevelsPredictor> =
            Arc::new(BaselinePredictor::default().with_curve("util", vec![50.0]));
        let levels = Levels::resolve(
            &LevelsParam::Predictive(PredictiveParams::default()),
            None,
            "util",
            Some(predictor),
        );
        let outputs = check_levels(57.0, &levels, &CheckLevels::new(percent).metric("util").at(1_000.0));

        let result = result_of(&outputs);
        assert_eq!(result.state, State::Warn);
        assert!(result.summary.contains("(predicted reference: 50.00%)"));
        assert!(result.summary.contains("(warn/crit at 55.00%/60.00%)"));
        assert_eq!(metric_of(&outputs, "predict_util").value, 50.0);
        assert_eq!(metric_of(&outputs, "util").levels, Some((55.0, 60.0)));
    }

    #[test]
    fn test_predictive_without_reference() {
        let levels = Levels::resolve(
            &LevelsParam::Predictive(PredictiveParams::default()),
            None,
            "util",
            None,
        );
        let outputs = check_levels(99.0, &levels, &CheckLevels::new(percent).metric("util"));
        let result = result_of(&outputs);
        assert_eq!(result.state, State::Ok);
        assert_eq!(result.summary, "99.00% (no reference for prediction yet)");
        assert!(metric_of(&outputs, "util").levels.is_none());
    }

    #[test]
    fn test_levels_param_serde() {
        let param: LevelsParam = serde_json::from_str(r#"{"upper": [80.0, 90.0]}"#).unwrap();
        assert_eq!(param, LevelsParam::Upper(80.0, 90.0));
        let param: LevelsParam = serde_json::from_str(r#""disabled""#).unwrap();
        assert_eq!(param, LevelsParam::Disabled);
        let param: LevelsParam =
            serde_json::from_str(r#"{"predictive": {"direction": "lower"}}"#).unwrap();
        assert!(matches!(param, LevelsParam::Predictive(p) if p.direction == Direction::Lower));
    }

    #[test]
    fn test_scaled_levels() {
        match Levels::upper(5.0, 10.0).scaled(4.0) {
            Levels::FixedUpper { warn, crit } => {
                assert_eq!(warn, 20.0);
                assert_eq!(crit, 40.0);
            }
            other => panic!("unexpected levels {:?}", other),
        }
    }
}
