//! CPU load averages (`/proc/loadavg`)
//!
//! ```text
//! 0.88 0.83 0.87 2/1748 21050 8
//! ```
//!
//! The last column is the number of CPUs and only present on newer agents.

use super::{default_params, parse_number, parse_params};
use crate::context::CheckContext;
use crate::error::CheckError;
use crate::levels::{check_levels, CheckLevels, LevelsParam};
use crate::models::{CheckOutput, CheckResult, DiscoveredService, Metric, Params, StringTable};
use crate::registry::{CheckPlugin, SectionPlugin};
use crate::render;
use crate::section::{Section, SectionSet};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CpuLoadSection {
    pub load1: f64,
    pub load5: f64,
    pub load15: f64,
    pub procs_running: u64,
    pub procs_total: u64,
    pub num_cpus: Option<u32>,
}

fn parse_procs(field: &str) -> Option<(u64, u64)> {
    let (running, total) = field.split_once('/')?;
    Some((running.parse().ok()?, total.parse().ok()?))
}

fn parse_row(row: &[String]) -> Option<CpuLoadSection> {
    let [load1, load5, load15, procs, ..] = row else {
        return None;
    };
    let (procs_running, procs_total) = parse_procs(procs)?;
    Some(CpuLoadSection {
        load1: parse_number(load1)?,
        load5: parse_number(load5)?,
        load15: parse_number(load15)?,
        procs_running,
        procs_total,
        num_cpus: row.get(5).and_then(|n| n.parse().ok()),
    })
}

pub fn parse_cpu(table: &StringTable) -> Option<Section> {
    table
        .iter()
        .find_map(|row| parse_row(row))
        .map(Section::CpuLoad)
}

/// Parameters of the CPU load check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuLoadParams {
    /// Levels on the 15 minute load per CPU
    pub levels: LevelsParam,
}

impl Default for CpuLoadParams {
    fn default() -> Self {
        Self {
            levels: LevelsParam::Upper(5.0, 10.0),
        }
    }
}

fn discover_cpu_loads(
    _params: &Params,
    sections: &SectionSet<'_>,
) -> Result<Vec<DiscoveredService>, CheckError> {
    Ok(match sections.typed::<CpuLoadSection>(0)? {
        Some(_) => vec![DiscoveredService::single()],
        None => vec![],
    })
}

fn check_cpu_loads(
    _item: Option<&str>,
    params: &Params,
    sections: &SectionSet<'_>,
    ctx: &mut CheckContext,
) -> Result<Vec<CheckOutput>, CheckError> {
    let params: CpuLoadParams = parse_params(params)?;
    let Some(load) = sections.typed::<CpuLoadSection>(0)? else {
        return Ok(vec![]);
    };
    let num_cpus = load.num_cpus.unwrap_or(1).max(1);

    let levels = ctx
        .levels(&params.levels, "load15", None)
        .scaled(num_cpus as f64);
    let mut outputs = check_levels(
        load.load15,
        &levels,
        &CheckLevels::new(render::float)
            .label("15 min load")
            .metric("load15")
            .at(ctx.now),
    );

    let mut load1 = Metric::new("load1", load.load1);
    let mut load5 = Metric::new("load5", load.load5);
    if let Some((_, Some(levels))) = outputs
        .iter()
        .filter_map(CheckOutput::as_metric)
        .map(|m| (m.name.as_str(), m.levels))
        .find(|(name, _)| *name == "load15")
    {
        load1.levels = Some(levels);
        load5.levels = Some(levels);
    }
    outputs.push(load1.into());
    outputs.push(load5.into());

    outputs.push(
        CheckResult::ok(format!(
            "15 min load per core: {} ({} cores)",
            render::float(load.load15 / num_cpus as f64),
            num_cpus
        ))
        .into(),
    );
    outputs.push(Metric::new("threads", load.procs_total as f64).into());

    Ok(outputs)
}

pub fn section_plugin() -> SectionPlugin {
    SectionPlugin::new("cpu", parse_cpu)
}

pub fn check_plugin() -> CheckPlugin {
    CheckPlugin::new("cpu_loads", "CPU load", &["cpu"], discover_cpu_loads, check_cpu_loads)
        .check_defaults(default_params::<CpuLoadParams>())
        .check_ruleset("cpu_load")
}
