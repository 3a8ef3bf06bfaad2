//! Section and check plugin registry
//!
//! The registry is built once at startup and handed to the evaluation
//! driver by reference. It maps raw section names to parse functions,
//! records which raw sections supersede others, and maps check names to
//! their discovery and check functions.

use crate::context::CheckContext;
use crate::error::{CheckError, RegistryError};
use crate::models::{CheckOutput, DiscoveredService, Params, StringTable};
use crate::section::{Section, SectionSet};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Parse one raw section into a typed section; `None` means "absent"
pub type ParseFunction = fn(&StringTable) -> Option<Section>;

/// Yield the services a check provides for the given sections
pub type DiscoveryFunction =
    fn(&Params, &SectionSet<'_>) -> Result<Vec<DiscoveredService>, CheckError>;

/// Evaluate one service
pub type CheckFunction = fn(
    Option<&str>,
    &Params,
    &SectionSet<'_>,
    &mut CheckContext,
) -> Result<Vec<CheckOutput>, CheckError>;

/// Registration of a raw agent section
#[derive(Debug, Clone)]
pub struct SectionPlugin {
    pub name: &'static str,
    pub parsed_section_name: &'static str,
    pub parse_function: ParseFunction,
    pub supersedes: &'static [&'static str],
}

impl SectionPlugin {
    pub fn new(name: &'static str, parse_function: ParseFunction) -> Self {
        Self {
            name,
            parsed_section_name: name,
            parse_function,
            supersedes: &[],
        }
    }

    /// Publish the parsed section under a different name
    pub fn parsed_as(mut self, parsed_section_name: &'static str) -> Self {
        self.parsed_section_name = parsed_section_name;
        self
    }

    pub fn supersedes(mut self, superseded: &'static [&'static str]) -> Self {
        self.supersedes = superseded;
        self
    }
}

/// Registration of a check
#[derive(Debug, Clone)]
pub struct CheckPlugin {
    pub name: &'static str,
    /// Service name template; `%s` is replaced by the item
    pub service_name: &'static str,
    /// Parsed section names, in the order the functions receive them
    pub sections: &'static [&'static str],
    pub discovery_function: DiscoveryFunction,
    pub discovery_default_parameters: Params,
    pub discovery_ruleset_name: Option<&'static str>,
    pub check_function: CheckFunction,
    pub check_default_parameters: Params,
    pub check_ruleset_name: Option<&'static str>,
}

impl CheckPlugin {
    pub fn new(
        name: &'static str,
        service_name: &'static str,
        sections: &'static [&'static str],
        discovery_function: DiscoveryFunction,
        check_function: CheckFunction,
    ) -> Self {
        Self {
            name,
            service_name,
            sections,
            discovery_function,
            discovery_default_parameters: empty_params(),
            discovery_ruleset_name: None,
            check_function,
            check_default_parameters: empty_params(),
            check_ruleset_name: None,
        }
    }

    pub fn check_defaults(mut self, parameters: Params) -> Self {
        self.check_default_parameters = parameters;
        self
    }

    pub fn check_ruleset(mut self, ruleset: &'static str) -> Self {
        self.check_ruleset_name = Some(ruleset);
        self
    }

    pub fn discovery_defaults(mut self, parameters: Params) -> Self {
        self.discovery_default_parameters = parameters;
        self
    }

    pub fn discovery_ruleset(mut self, ruleset: &'static str) -> Self {
        self.discovery_ruleset_name = Some(ruleset);
        self
    }

    /// Render the service description for an item
    pub fn service_description(&self, item: Option<&str>) -> String {
        match item {
            Some(item) if self.service_name.contains("%s") => {
                self.service_name.replacen("%s", item, 1)
            }
            Some(item) => format!("{} {}", self.service_name, item),
            None => self.service_name.to_string(),
        }
    }
}

/// An empty parameter object
pub fn empty_params() -> Params {
    Params::Object(Default::default())
}

/// Registry of all section and check plugins
#[derive(Debug, Default)]
pub struct Registry {
    sections: BTreeMap<&'static str, SectionPlugin>,
    checks: BTreeMap<&'static str, CheckPlugin>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry populated with every built-in plugin
    pub fn builtin() -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        crate::plugins::register_builtin(&mut registry)?;
        registry.validate()?;
        Ok(registry)
    }

    pub fn register_section(&mut self, plugin: SectionPlugin) -> Result<(), RegistryError> {
        if self.sections.contains_key(plugin.name) {
            return Err(RegistryError::DuplicateSection(plugin.name.to_string()));
        }
        debug!(
            section = plugin.name,
            parsed_as = plugin.parsed_section_name,
            "Registering section"
        );
        self.sections.insert(plugin.name, plugin);
        Ok(())
    }

    /// Register a check; its sections must already be registered
    pub fn register_check(&mut self, plugin: CheckPlugin) -> Result<(), RegistryError> {
        if self.checks.contains_key(plugin.name) {
            return Err(RegistryError::DuplicateCheck(plugin.name.to_string()));
        }
        for section in plugin.sections {
            if !self.is_parsed_section(section) {
                return Err(RegistryError::UnknownSection {
                    check: plugin.name.to_string(),
                    section: section.to_string(),
                });
            }
        }
        debug!(check = plugin.name, "Registering check");
        self.checks.insert(plugin.name, plugin);
        Ok(())
    }

    /// Verify that every superseded section is known
    pub fn validate(&self) -> Result<(), RegistryError> {
        for plugin in self.sections.values() {
            for superseded in plugin.supersedes {
                if !self.sections.contains_key(superseded) {
                    return Err(RegistryError::UnknownSuperseded {
                        section: plugin.name.to_string(),
                        superseded: superseded.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn section(&self, name: &str) -> Option<&SectionPlugin> {
        self.sections.get(name)
    }

    pub fn check(&self, name: &str) -> Option<&CheckPlugin> {
        self.checks.get(name)
    }

    pub fn sections(&self) -> impl Iterator<Item = &SectionPlugin> {
        self.sections.values()
    }

    pub fn checks(&self) -> impl Iterator<Item = &CheckPlugin> {
        self.checks.values()
    }

    fn is_parsed_section(&self, name: &str) -> bool {
        self.sections
            .values()
            .any(|plugin| plugin.parsed_section_name == name)
    }

    /// Select the raw sections that contribute to parsed sections
    ///
    /// Unknown names are ignored. A present section is dropped when another
    /// present section supersedes it. When two survivors still share a
    /// parsed section name the first one by name wins.
    pub fn effective_sections<'a, I>(&self, present: I) -> Vec<&SectionPlugin>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let known: BTreeSet<&str> = present
            .into_iter()
            .filter(|name| {
                let known = self.sections.contains_key(*name);
                if !known {
                    debug!(section = %name, "Ignoring unregistered section");
                }
                known
            })
            .collect();

        let superseded: BTreeSet<&str> = known
            .iter()
            .filter_map(|name| self.sections.get(*name))
            .flat_map(|plugin| plugin.supersedes.iter().copied())
            .collect();

        let mut selected: BTreeMap<&str, &SectionPlugin> = BTreeMap::new();
        for name in &known {
            if superseded.contains(*name) {
                debug!(section = %name, "Section superseded");
                continue;
            }
            let Some(plugin) = self.sections.get(*name) else {
                continue;
            };
            if let Some(winner) = selected.get(plugin.parsed_section_name) {
                warn!(
                    section = plugin.name,
                    kept = winner.name,
                    parsed_as = plugin.parsed_section_name,
                    "Two sections provide the same parsed section, ignoring one"
                );
                continue;
            }
            selected.insert(plugin.parsed_section_name, plugin);
        }

        selected.into_values().collect()
    }
}
