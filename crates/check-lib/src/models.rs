//! Core data models for the check engine

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Raw rows-of-fields output of one agent section
pub type StringTable = Vec<Vec<String>>;

/// Agent output split by section header, keyed by raw section name
pub type RawSections = BTreeMap<String, StringTable>;

/// Check and discovery parameters (a JSON object)
pub type Params = serde_json::Value;

/// Monitoring state of a single result
///
/// The numeric codes follow the usual plugin convention (0..=3), but the
/// severity order is OK < WARN < UNKNOWN < CRIT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum State {
    Ok,
    Warn,
    Crit,
    Unknown,
}

impl State {
    /// Plugin exit code
    pub fn code(self) -> i32 {
        match self {
            State::Ok => 0,
            State::Warn => 1,
            State::Crit => 2,
            State::Unknown => 3,
        }
    }

    fn severity(self) -> u8 {
        match self {
            State::Ok => 0,
            State::Warn => 1,
            State::Unknown => 2,
            State::Crit => 3,
        }
    }

    /// The worse of two states
    pub fn worst(self, other: State) -> State {
        std::cmp::max(self, other)
    }

    /// Worst state of a sequence, OK for an empty one
    pub fn worst_of(states: impl IntoIterator<Item = State>) -> State {
        states.into_iter().fold(State::Ok, State::worst)
    }

    /// Marker appended to summaries of non-OK results
    pub fn marker(self) -> &'static str {
        match self {
            State::Ok => "",
            State::Warn => "(!)",
            State::Crit => "(!!)",
            State::Unknown => "(?)",
        }
    }
}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        self.severity().cmp(&other.severity())
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Ok => write!(f, "OK"),
            State::Warn => write!(f, "WARN"),
            State::Crit => write!(f, "CRIT"),
            State::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// One graded status line produced by a check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub state: State,
    pub summary: String,
}

impl CheckResult {
    pub fn new(state: State, summary: impl Into<String>) -> Self {
        Self {
            state,
            summary: summary.into(),
        }
    }

    pub fn ok(summary: impl Into<String>) -> Self {
        Self::new(State::Ok, summary)
    }
}

/// One named numeric sample produced by a check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub levels: Option<(f64, f64)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boundaries: Option<(f64, f64)>,
}

impl Metric {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
            levels: None,
            boundaries: None,
        }
    }

    pub fn with_levels(mut self, warn: f64, crit: f64) -> Self {
        self.levels = Some((warn, crit));
        self
    }

    pub fn with_boundaries(mut self, min: f64, max: f64) -> Self {
        self.boundaries = Some((min, max));
        self
    }
}

/// Output element of a check function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckOutput {
    Result(CheckResult),
    Metric(Metric),
}

impl CheckOutput {
    pub fn result(state: State, summary: impl Into<String>) -> Self {
        CheckOutput::Result(CheckResult::new(state, summary))
    }

    pub fn as_result(&self) -> Option<&CheckResult> {
        match self {
            CheckOutput::Result(result) => Some(result),
            CheckOutput::Metric(_) => None,
        }
    }

    pub fn as_metric(&self) -> Option<&Metric> {
        match self {
            CheckOutput::Metric(metric) => Some(metric),
            CheckOutput::Result(_) => None,
        }
    }
}

impl From<CheckResult> for CheckOutput {
    fn from(result: CheckResult) -> Self {
        CheckOutput::Result(result)
    }
}

impl From<Metric> for CheckOutput {
    fn from(metric: Metric) -> Self {
        CheckOutput::Metric(metric)
    }
}

/// A service yielded by a discovery function, before the driver names it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredService {
    pub item: Option<String>,
    pub parameters: Params,
}

impl DiscoveredService {
    /// Service without item
    pub fn single() -> Self {
        Self {
            item: None,
            parameters: Params::Object(Default::default()),
        }
    }

    pub fn with_item(item: impl Into<String>) -> Self {
        Self {
            item: Some(item.into()),
            parameters: Params::Object(Default::default()),
        }
    }

    pub fn with_parameters(mut self, parameters: Params) -> Self {
        self.parameters = parameters;
        self
    }
}

/// A discovered monitorable unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub check_name: String,
    pub item: Option<String>,
    pub description: String,
    pub parameters: Params,
}

impl Service {
    /// Identity of the service across discovery runs
    pub fn id(&self) -> (&str, Option<&str>) {
        (self.check_name.as_str(), self.item.as_deref())
    }
}
