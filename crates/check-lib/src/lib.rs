//! Check engine library for host monitoring
//!
//! This crate provides the core functionality for:
//! - Splitting agent output into raw sections
//! - Section parsing with supersede resolution
//! - Service discovery and check evaluation
//! - Counter rates, averages and the persisted value store
//! - Threshold evaluation with fixed, relative and predictive levels
//! - Built-in plugins and observability

pub mod agent_output;
pub mod context;
pub mod engine;
pub mod error;
pub mod levels;
pub mod models;
pub mod observability;
pub mod plugins;
pub mod rate;
pub mod registry;
pub mod render;
pub mod section;
pub mod value_store;

pub use context::CheckContext;
pub use engine::{merge_params, worst_state, Engine, ParsedSections, Rules, ServiceOutcome, ServiceReport};
pub use error::{CheckError, EngineError, RegistryError};
pub use levels::{check_levels, BaselinePredictor, CheckLevels, Levels, LevelsParam, LevelsPredictor};
pub use models::*;
pub use observability::{EngineMetrics, StructuredLogger};
pub use rate::{get_average, get_rate, GetRateError};
pub use registry::{CheckPlugin, Registry, SectionPlugin};
pub use section::{Section, SectionSet};
pub use value_store::{FileValueStore, ItemValueStore, MemoryValueStore, ValueStore, ValueStoreKey};
