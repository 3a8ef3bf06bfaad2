//! Counter rates and smoothed averages backed by the value store

use crate::error::CheckError;
use crate::value_store::ItemValueStore;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Why a rate could not be computed this cycle
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GetRateError {
    #[error("Initialized: '{key}'")]
    Initializing { key: String },

    #[error("Counter reset: '{key}' went from {previous} to {current}")]
    CounterReset {
        key: String,
        previous: f64,
        current: f64,
    },

    #[error("No time elapsed since last sample of '{key}'")]
    NoTimeElapsed { key: String },
}

impl From<GetRateError> for CheckError {
    fn from(err: GetRateError) -> Self {
        CheckError::IgnoreResults(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct CounterSample {
    time: f64,
    value: f64,
}

/// Per-second rate of a monotonically increasing counter
///
/// The stored `(now, value)` sample is replaced on every call, including
/// the ones that cannot produce a rate. Without `raise_overflow` those
/// cases return `0.0`.
pub fn get_rate(
    store: &mut ItemValueStore,
    key: &str,
    now: f64,
    value: f64,
    raise_overflow: bool,
) -> Result<f64, GetRateError> {
    let previous = store.get_as::<CounterSample>(key);
    store.set_as(key, &CounterSample { time: now, value });

    let outcome = match previous {
        None => Err(GetRateError::Initializing {
            key: key.to_string(),
        }),
        Some(previous) if value < previous.value => Err(GetRateError::CounterReset {
            key: key.to_string(),
            previous: previous.value,
            current: value,
        }),
        Some(previous) if now - previous.time <= 0.0 => Err(GetRateError::NoTimeElapsed {
            key: key.to_string(),
        }),
        Some(previous) => Ok((value - previous.value) / (now - previous.time)),
    };

    match outcome {
        Ok(rate) => Ok(rate),
        Err(err) => {
            debug!(key, reason = %err, "Rate not available");
            if raise_overflow {
                Err(err)
            } else {
                Ok(0.0)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct AverageState {
    time: f64,
    average: f64,
}

/// Exponentially weighted average of `value` over `backlog_minutes`
///
/// After one backlog period the previous average carries half of the
/// weight. The first sample seeds the average.
pub fn get_average(
    store: &mut ItemValueStore,
    key: &str,
    now: f64,
    value: f64,
    backlog_minutes: f64,
) -> f64 {
    let Some(state) = store.get_as::<AverageState>(key) else {
        store.set_as(key, &AverageState { time: now, average: value });
        return value;
    };

    let elapsed = now - state.time;
    if elapsed <= 0.0 {
        return state.average;
    }

    let average = if backlog_minutes <= 0.0 {
        value
    } else {
        let weight = 0.5_f64.powf(elapsed / (backlog_minutes * 60.0));
        state.average * weight + value * (1.0 - weight)
    };

    store.set_as(key, &AverageState { time: now, average });
    average
}
