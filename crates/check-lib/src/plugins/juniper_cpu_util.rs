//! Juniper routing engine CPU utilization (SNMP)
//!
//! Rows are `[operating component name, cpu utilization]`.
//!
//! Components that report exactly 0 are not discovered: the devices report
//! 0 both for idle engines and for slots without an engine, and the two
//! cannot be told apart.

use super::{default_params, parse_number, parse_params};
use crate::context::CheckContext;
use crate::error::CheckError;
use crate::levels::{check_levels, CheckLevels, LevelsParam};
use crate::models::{CheckOutput, DiscoveredService, Params, StringTable};
use crate::registry::{CheckPlugin, SectionPlugin};
use crate::render;
use crate::section::{Section, SectionSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct JuniperCpuSection {
    /// Utilization in percent per component
    pub components: BTreeMap<String, f64>,
}

pub fn parse_juniper_cpu_util(table: &StringTable) -> Option<Section> {
    let components: BTreeMap<String, f64> = table
        .iter()
        .filter_map(|row| match row.as_slice() {
            [name, util] => Some((name.trim().to_string(), parse_number(util.trim())?)),
            _ => None,
        })
        .filter(|(name, _)| !name.is_empty())
        .collect();

    if components.is_empty() {
        return None;
    }
    Some(Section::JuniperCpu(JuniperCpuSection { components }))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JuniperCpuParams {
    pub levels: LevelsParam,
}

impl Default for JuniperCpuParams {
    fn default() -> Self {
        Self {
            levels: LevelsParam::Upper(80.0, 90.0),
        }
    }
}

fn discover_juniper_cpu_util(
    _params: &Params,
    sections: &SectionSet<'_>,
) -> Result<Vec<DiscoveredService>, CheckError> {
    let Some(section) = sections.typed::<JuniperCpuSection>(0)? else {
        return Ok(vec![]);
    };
    Ok(section
        .components
        .iter()
        .filter(|(_, util)| **util != 0.0)
        .map(|(name, _)| DiscoveredService::with_item(name.clone()))
        .collect())
}

fn check_juniper_cpu_util(
    item: Option<&str>,
    params: &Params,
    sections: &SectionSet<'_>,
    ctx: &mut CheckContext,
) -> Result<Vec<CheckOutput>, CheckError> {
    let params: JuniperCpuParams = parse_params(params)?;
    let Some(section) = sections.typed::<JuniperCpuSection>(0)? else {
        return Ok(vec![]);
    };
    let Some(util) = item.and_then(|item| section.components.get(item)) else {
        return Ok(vec![]);
    };

    Ok(check_levels(
        *util,
        &ctx.levels(&params.levels, "util", None),
        &CheckLevels::new(render::percent)
            .label("Utilization")
            .metric("util")
            .boundaries(0.0, 100.0)
            .at(ctx.now),
    ))
}

pub fn section_plugin() -> SectionPlugin {
    SectionPlugin::new("juniper_cpu_util", parse_juniper_cpu_util)
}

pub fn check_plugin() -> CheckPlugin {
    CheckPlugin::new(
        "juniper_cpu_util",
        "Routing Engine CPU %s",
        &["juniper_cpu_util"],
        discover_juniper_cpu_util,
        check_juniper_cpu_util,
    )
    .check_defaults(default_params::<JuniperCpuParams>())
    .check_ruleset("juniper_cpu_util")
}
