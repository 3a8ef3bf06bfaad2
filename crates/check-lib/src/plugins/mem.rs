//! Main memory and swap usage (`/proc/meminfo`)
//!
//! ```text
//! <<<mem>>>
//! MemTotal:       16307244 kB
//! MemFree:         1012304 kB
//! MemAvailable:    8231220 kB
//! ```

use super::{default_params, parse_number, parse_params};
use crate::context::CheckContext;
use crate::error::CheckError;
use crate::levels::{check_levels, CheckLevels, LevelsParam};
use crate::models::{CheckOutput, DiscoveredService, Metric, Params, StringTable};
use crate::registry::{CheckPlugin, SectionPlugin};
use crate::render;
use crate::section::{Section, SectionSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Meminfo entries in bytes, keyed without the trailing colon
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemSection {
    pub entries: BTreeMap<String, f64>,
}

impl MemSection {
    fn entry(&self, name: &str) -> Option<f64> {
        self.entries.get(name).copied()
    }

    pub fn total(&self) -> Option<f64> {
        self.entry("MemTotal")
    }

    /// `MemAvailable`, or free plus reclaimable caches on old kernels
    pub fn available(&self) -> Option<f64> {
        self.entry("MemAvailable").or_else(|| {
            Some(
                self.entry("MemFree")?
                    + self.entry("Buffers").unwrap_or(0.0)
                    + self.entry("Cached").unwrap_or(0.0),
            )
        })
    }

    /// Total and available RAM, when both are known and total is positive
    pub fn usage(&self) -> Option<(f64, f64)> {
        let total = self.total().filter(|total| *total > 0.0)?;
        Some((total, self.available()?))
    }

    pub fn swap(&self) -> Option<(f64, f64)> {
        Some((self.entry("SwapTotal")?, self.entry("SwapFree")?))
    }
}

fn unit_factor(unit: Option<&String>) -> Option<f64> {
    match unit.map(String::as_str) {
        None => Some(1.0),
        Some("kB") => Some(1024.0),
        Some("MB") => Some(1024.0 * 1024.0),
        Some(_) => None,
    }
}

pub fn parse_mem(table: &StringTable) -> Option<Section> {
    let entries: BTreeMap<String, f64> = table
        .iter()
        .filter_map(|row| {
            let name = row.first()?.strip_suffix(':')?;
            let value = parse_number(row.get(1)?)?;
            Some((name.to_string(), value * unit_factor(row.get(2))?))
        })
        .collect();

    if !entries.contains_key("MemTotal") {
        return None;
    }
    Some(Section::Mem(MemSection { entries }))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemParams {
    /// Levels on used RAM, percentages relative to total RAM
    pub levels: LevelsParam,
    pub swap: LevelsParam,
}

impl Default for MemParams {
    fn default() -> Self {
        Self {
            levels: LevelsParam::Percentage(80.0, 90.0),
            swap: LevelsParam::Disabled,
        }
    }
}

fn discover_mem_used(
    _params: &Params,
    sections: &SectionSet<'_>,
) -> Result<Vec<DiscoveredService>, CheckError> {
    Ok(match sections.typed::<MemSection>(0)?.and_then(MemSection::usage) {
        Some(_) => vec![DiscoveredService::single()],
        None => vec![],
    })
}

fn check_mem_used(
    _item: Option<&str>,
    params: &Params,
    sections: &SectionSet<'_>,
    ctx: &mut CheckContext,
) -> Result<Vec<CheckOutput>, CheckError> {
    let params: MemParams = parse_params(params)?;
    let Some(mem) = sections.typed::<MemSection>(0)? else {
        return Ok(vec![]);
    };
    let Some((total, available)) = mem.usage() else {
        return Ok(vec![]);
    };
    let used = (total - available).max(0.0);

    let mut outputs = check_levels(
        used,
        &ctx.levels(&params.levels, "mem_used", Some(total)),
        &CheckLevels::new(render::bytes)
            .label("RAM")
            .metric("mem_used")
            .at(ctx.now),
    );
    outputs.push(Metric::new("mem_total", total).into());

    if let Some((swap_total, swap_free)) = mem.swap().filter(|(total, _)| *total > 0.0) {
        let swap_used = (swap_total - swap_free).max(0.0);
        outputs.extend(check_levels(
            swap_used,
            &ctx.levels(&params.swap, "swap_used", Some(swap_total)),
            &CheckLevels::new(render::bytes)
                .label("Swap")
                .metric("swap_used")
                .boundaries(0.0, swap_total)
                .at(ctx.now),
        ));
    }

    Ok(outputs)
}

pub fn section_plugin() -> SectionPlugin {
    SectionPlugin::new("mem", parse_mem)
}

pub fn check_plugin() -> CheckPlugin {
    CheckPlugin::new("mem_used", "Memory", &["mem"], discover_mem_used, check_mem_used)
        .check_defaults(default_params::<MemParams>())
        .check_ruleset("memory_linux")
}
