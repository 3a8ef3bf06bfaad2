//! One-shot evaluation driver
//!
//! An [`Engine`] runs one evaluation cycle for one host: it parses the raw
//! agent sections, then either discovers services or checks them. The
//! value store is handed in per call; each service reads its scoped view
//! once before the check function runs and commits it once afterwards.

use crate::context::CheckContext;
use crate::error::{CheckError, EngineError};
use crate::levels::LevelsPredictor;
use crate::models::{CheckOutput, CheckResult, Metric, Params, RawSections, Service, State};
use crate::observability::{EngineMetrics, StructuredLogger};
use crate::registry::{CheckPlugin, Registry};
use crate::section::{Section, SectionSet};
use crate::value_store::{ItemValueStore, StoreScope, ValueStore};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Configured parameters keyed by ruleset name
pub type Rules = BTreeMap<String, Params>;

/// Parsed sections keyed by parsed section name
#[derive(Debug, Default)]
pub struct ParsedSections {
    sections: BTreeMap<&'static str, Section>,
}

impl ParsedSections {
    pub fn get(&self, name: &str) -> Option<&Section> {
        self.sections.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.sections.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// The sections a check declares, in declaration order
    pub fn section_set(&self, plugin: &CheckPlugin) -> SectionSet<'_> {
        SectionSet::new(
            plugin.sections,
            plugin.sections.iter().map(|name| self.get(name)).collect(),
        )
    }
}

/// What one check evaluation produced
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ServiceOutcome {
    Checked {
        state: State,
        summary: String,
        results: Vec<CheckResult>,
        metrics: Vec<Metric>,
    },
    /// No current data for the service's item
    NoData,
    /// A rate or average needs another cycle
    Pending { reason: String },
}

impl ServiceOutcome {
    /// State to report; pending evaluations report none
    pub fn state(&self) -> Option<State> {
        match self {
            ServiceOutcome::Checked { state, .. } => Some(*state),
            ServiceOutcome::NoData => Some(State::Unknown),
            ServiceOutcome::Pending { .. } => None,
        }
    }

    pub fn summary(&self) -> &str {
        match self {
            ServiceOutcome::Checked { summary, .. } => summary,
            ServiceOutcome::NoData => "Item not found in monitoring data",
            ServiceOutcome::Pending { reason } => reason,
        }
    }

    fn from_outputs(outputs: Vec<CheckOutput>) -> Self {
        let mut results = Vec::new();
        let mut metrics = Vec::new();
        for output in outputs {
            match output {
                CheckOutput::Result(result) => results.push(result),
                CheckOutput::Metric(metric) => metrics.push(metric),
            }
        }
        let state = State::worst_of(results.iter().map(|r| r.state));
        let summary = results
            .iter()
            .filter(|r| !r.summary.is_empty())
            .map(|r| format!("{}{}", r.summary, r.state.marker()))
            .collect::<Vec<_>>()
            .join(", ");
        ServiceOutcome::Checked {
            state,
            summary,
            results,
            metrics,
        }
    }
}

/// Outcome of one service within [`Engine::check_all`]
#[derive(Debug)]
pub struct ServiceReport {
    pub service: Service,
    pub outcome: Result<ServiceOutcome, EngineError>,
}

/// Shallow merge: keys of `overrides` replace keys of `base`
pub fn merge_params(base: &Params, overrides: &Params) -> Params {
    let mut merged = base.clone();
    match (merged.as_object_mut(), overrides.as_object()) {
        (Some(target), Some(source)) => {
            for (key, value) in source {
                target.insert(key.clone(), value.clone());
            }
            merged
        }
        (None, Some(_)) => overrides.clone(),
        _ => merged,
    }
}

/// Evaluation driver for one host
pub struct Engine<'r> {
    registry: &'r Registry,
    host: String,
    rules: Rules,
    discovery_rules: Rules,
    predictor: Option<Arc<dyn LevelsPredictor>>,
    metrics: EngineMetrics,
    logger: StructuredLogger,
}

impl<'r> Engine<'r> {
    pub fn new(registry: &'r Registry, host: impl Into<String>) -> Self {
        let host = host.into();
        Self {
            registry,
            logger: StructuredLogger::new(host.clone()),
            host,
            rules: Rules::new(),
            discovery_rules: Rules::new(),
            predictor: None,
            metrics: EngineMetrics::new(),
        }
    }

    /// Check parameters per check ruleset
    pub fn with_rules(mut self, rules: Rules) -> Self {
        self.rules = rules;
        self
    }

    /// Discovery parameters per discovery ruleset
    pub fn with_discovery_rules(mut self, rules: Rules) -> Self {
        self.discovery_rules = rules;
        self
    }

    pub fn with_predictor(mut self, predictor: Arc<dyn LevelsPredictor>) -> Self {
        self.predictor = Some(predictor);
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn registry(&self) -> &Registry {
        self.registry
    }

    /// Run the parse functions of all effective raw sections
    pub fn parse_sections(&self, raw: &RawSections) -> ParsedSections {
        let mut parsed = ParsedSections::default();
        for plugin in self.registry.effective_sections(raw.keys().map(String::as_str)) {
            let Some(table) = raw.get(plugin.name) else {
                continue;
            };
            let section = (plugin.parse_function)(table);
            self.metrics
                .inc_section_parsed(plugin.name, section.is_some());
            match section {
                Some(section) => {
                    debug!(
                        section = plugin.name,
                        parsed_as = plugin.parsed_section_name,
                        rows = table.len(),
                        "Parsed section"
                    );
                    parsed.sections.insert(plugin.parsed_section_name, section);
                }
                None => debug!(section = plugin.name, "Section absent after parsing"),
            }
        }
        parsed
    }

    /// Discover services of every check with at least one present section
    ///
    /// Services are sorted by check name and item; duplicates are dropped.
    pub fn discover(&self, parsed: &ParsedSections) -> Result<Vec<Service>, EngineError> {
        let mut services: Vec<Service> = Vec::new();

        for plugin in self.registry.checks() {
            let sections = parsed.section_set(plugin);
            if sections.all_absent() {
                continue;
            }
            let params = match plugin
                .discovery_ruleset_name
                .and_then(|name| self.discovery_rules.get(name))
            {
                Some(configured) => merge_params(&plugin.discovery_default_parameters, configured),
                None => plugin.discovery_default_parameters.clone(),
            };

            let discovered = (plugin.discovery_function)(&params, &sections).map_err(|source| {
                EngineError::DiscoveryFailed {
                    check: plugin.name.to_string(),
                    source,
                }
            })?;

            self.logger.log_discovery(plugin.name, discovered.len());
            self.metrics
                .add_services_discovered(plugin.name, discovered.len());

            services.extend(discovered.into_iter().map(|service| Service {
                check_name: plugin.name.to_string(),
                description: plugin.service_description(service.item.as_deref()),
                item: service.item,
                parameters: service.parameters,
            }));
        }

        services.sort_by(|a, b| a.id().cmp(&b.id()));
        services.dedup_by(|a, b| a.id() == b.id());
        info!(
            host = %self.host,
            services = services.len(),
            "Discovery complete"
        );
        Ok(services)
    }

    /// Effective check parameters: defaults, then ruleset, then service
    pub fn check_parameters(&self, plugin: &CheckPlugin, service: &Service) -> Params {
        let mut params = plugin.check_default_parameters.clone();
        if let Some(configured) = plugin
            .check_ruleset_name
            .and_then(|name| self.rules.get(name))
        {
            params = merge_params(&params, configured);
        }
        merge_params(&params, &service.parameters)
    }

    /// Evaluate one service
    ///
    /// Value-store writes are committed for completed and pending
    /// evaluations and discarded when the check function fails.
    pub fn check_service(
        &self,
        parsed: &ParsedSections,
        service: &Service,
        store: &mut dyn ValueStore,
        now: f64,
    ) -> Result<ServiceOutcome, EngineError> {
        let plugin = self
            .registry
            .check(&service.check_name)
            .ok_or_else(|| EngineError::UnknownCheck(service.check_name.clone()))?;
        let item = service.item.as_deref();

        let sections = parsed.section_set(plugin);
        if sections.all_absent() {
            self.logger.log_item_missing(plugin.name, item);
            self.metrics.inc_item_missing();
            return Ok(ServiceOutcome::NoData);
        }

        let params = self.check_parameters(plugin, service);
        let scope = StoreScope::new(self.host.as_str(), plugin.name, item);
        let mut ctx = CheckContext::new(self.host.as_str(), now, ItemValueStore::load(store, scope))
            .with_predictor(self.predictor.clone());

        let start = Instant::now();
        let result = (plugin.check_function)(item, &params, &sections, &mut ctx);
        self.metrics
            .observe_check_duration(start.elapsed().as_secs_f64());

        match result {
            Ok(outputs) if outputs.is_empty() => {
                self.logger.log_item_missing(plugin.name, item);
                self.metrics.inc_item_missing();
                Ok(ServiceOutcome::NoData)
            }
            Ok(outputs) => {
                let written = ctx.into_value_store().commit(store);
                let outcome = ServiceOutcome::from_outputs(outputs);
                if let ServiceOutcome::Checked { state, summary, .. } = &outcome {
                    self.logger
                        .log_check_result(plugin.name, item, *state, summary);
                    self.metrics.inc_check_result(plugin.name, *state);
                }
                debug!(check = plugin.name, item = ?item, written, "Committed value store");
                Ok(outcome)
            }
            Err(CheckError::IgnoreResults(reason)) => {
                ctx.into_value_store().commit(store);
                self.logger.log_pending(plugin.name, item, &reason);
                self.metrics.inc_check_pending(plugin.name);
                Ok(ServiceOutcome::Pending { reason })
            }
            Err(source) => {
                self.logger.log_check_crash(plugin.name, item, &source);
                self.metrics.inc_check_crash(plugin.name);
                Err(EngineError::CheckFailed {
                    check: plugin.name.to_string(),
                    item: service.item.clone(),
                    source,
                })
            }
        }
    }

    /// Evaluate every service; a failing service does not stop the others
    pub fn check_all(
        &self,
        parsed: &ParsedSections,
        services: &[Service],
        store: &mut dyn ValueStore,
        now: f64,
    ) -> Vec<ServiceReport> {
        services
            .iter()
            .map(|service| ServiceReport {
                service: service.clone(),
                outcome: self.check_service(parsed, service, store, now),
            })
            .collect()
    }
}

/// Worst reportable state over a set of reports; failures count as UNKNOWN
pub fn worst_state(reports: &[ServiceReport]) -> State {
    State::worst_of(reports.iter().filter_map(|report| match &report.outcome {
        Ok(outcome) => outcome.state(),
        Err(_) => Some(State::Unknown),
    }))
}
