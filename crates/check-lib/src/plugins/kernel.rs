//! Linux kernel statistics (`/proc/stat` and `/proc/vmstat`)
//!
//! The `kernel` section starts with the agent's timestamp, followed by
//! vmstat counters and the `cpu` lines of `/proc/stat`:
//!
//! ```text
//! 1700000000
//! nr_free_pages 198749
//! pgmajfault 1795031
//! cpu  424 0 240 9090 62 0 8 0 0 0
//! cpu0 212 0 120 4545 31 0 4 0 0 0
//! ctxt 539210403
//! processes 4700038
//! ```
//!
//! CPU lines carry jiffies spent in user, nice, system, idle, iowait, irq,
//! softirq, steal, guest and guest_nice. Older kernels report fewer
//! columns; the missing ones count as zero.

use super::cpu_loads::CpuLoadSection;
use super::{default_params, parse_number, parse_params};
use crate::context::CheckContext;
use crate::error::CheckError;
use crate::levels::{check_levels, CheckLevels, Levels, LevelsParam};
use crate::models::{CheckOutput, CheckResult, DiscoveredService, Metric, Params, State, StringTable};
use crate::rate::{get_average, get_rate, GetRateError};
use crate::registry::{CheckPlugin, SectionPlugin};
use crate::render;
use crate::section::{Section, SectionSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Jiffies since boot, per kind of work
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CpuTicks {
    pub user: f64,
    pub nice: f64,
    pub system: f64,
    pub idle: f64,
    pub iowait: f64,
    pub irq: f64,
    pub softirq: f64,
    pub steal: f64,
    pub guest: f64,
    pub guest_nice: f64,
}

impl CpuTicks {
    const FIELDS: [&'static str; 10] = [
        "user", "nice", "system", "idle", "iowait", "irq", "softirq", "steal", "guest",
        "guest_nice",
    ];

    /// Build from numeric columns; at least user, nice, system and idle are required
    pub fn from_fields(fields: &[String]) -> Option<Self> {
        let values: Vec<f64> = fields
            .iter()
            .map(|f| parse_number(f))
            .collect::<Option<Vec<_>>>()?;
        if values.len() < 4 {
            return None;
        }
        let at = |i: usize| values.get(i).copied().unwrap_or(0.0);
        Some(Self {
            user: at(0),
            nice: at(1),
            system: at(2),
            idle: at(3),
            iowait: at(4),
            irq: at(5),
            softirq: at(6),
            steal: at(7),
            guest: at(8),
            guest_nice: at(9),
        })
    }

    fn values(&self) -> [f64; 10] {
        [
            self.user,
            self.nice,
            self.system,
            self.idle,
            self.iowait,
            self.irq,
            self.softirq,
            self.steal,
            self.guest,
            self.guest_nice,
        ]
    }

    fn from_values(values: [f64; 10]) -> Self {
        let [user, nice, system, idle, iowait, irq, softirq, steal, guest, guest_nice] = values;
        Self {
            user,
            nice,
            system,
            idle,
            iowait,
            irq,
            softirq,
            steal,
            guest,
            guest_nice,
        }
    }

    /// All jiffies; guest time is already part of user time
    pub fn total(&self) -> f64 {
        self.user
            + self.nice
            + self.system
            + self.idle
            + self.iowait
            + self.irq
            + self.softirq
            + self.steal
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct KernelSection {
    /// Agent timestamp of the sample
    pub timestamp: Option<i64>,
    pub cpu_total: Option<CpuTicks>,
    pub cores: BTreeMap<String, CpuTicks>,
    /// Plain counters such as `ctxt`, `processes` or `pgmajfault`
    pub counters: BTreeMap<String, f64>,
}

pub fn parse_kernel(table: &StringTable) -> Option<Section> {
    let mut section = KernelSection::default();
    let mut rows = table.iter().peekable();

    if let Some(first) = rows.peek() {
        if let [single] = first.as_slice() {
            if let Ok(timestamp) = single.parse::<i64>() {
                section.timestamp = Some(timestamp);
                rows.next();
            }
        }
    }

    for row in rows {
        let Some((name, fields)) = row.split_first() else {
            continue;
        };
        if name == "cpu" {
            if let Some(ticks) = CpuTicks::from_fields(fields) {
                section.cpu_total = Some(ticks);
            }
        } else if name.starts_with("cpu") && name[3..].chars().all(|c| c.is_ascii_digit()) {
            if let Some(ticks) = CpuTicks::from_fields(fields) {
                section.cores.insert(name.clone(), ticks);
            }
        } else if let [value] = fields {
            if let Some(value) = parse_number(value) {
                section.counters.insert(name.clone(), value);
            }
        }
    }

    if section.cpu_total.is_none() && section.cores.is_empty() && section.counters.is_empty() {
        return None;
    }
    Some(Section::Kernel(section))
}

/// Parameters of the CPU utilization check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelUtilParams {
    /// Levels on total utilization in percent
    pub util: LevelsParam,
    pub iowait: LevelsParam,
    pub steal: LevelsParam,
    /// Apply the util levels to an average over this many minutes
    pub average: Option<f64>,
    /// Levels on the utilization of each single core
    pub levels_single: LevelsParam,
    /// Emit one utilization metric per core
    pub core_util_graph: bool,
}

impl Default for KernelUtilParams {
    fn default() -> Self {
        Self {
            util: LevelsParam::Upper(90.0, 95.0),
            iowait: LevelsParam::Disabled,
            steal: LevelsParam::Disabled,
            average: None,
            levels_single: LevelsParam::Disabled,
            core_util_graph: false,
        }
    }
}

fn discover_kernel_util(
    _params: &Params,
    sections: &SectionSet<'_>,
) -> Result<Vec<DiscoveredService>, CheckError> {
    let Some(kernel) = sections.typed::<KernelSection>(0)? else {
        return Ok(vec![]);
    };
    if kernel.cpu_total.is_some() {
        Ok(vec![DiscoveredService::single()])
    } else {
        Ok(vec![])
    }
}

/// Per-second tick rates of every field, keyed by `prefix.field`
///
/// Every field is sampled before the first error is returned so all
/// baselines move forward together.
fn tick_rates(
    ctx: &mut CheckContext,
    prefix: &str,
    ticks: &CpuTicks,
    now: f64,
) -> Result<CpuTicks, GetRateError> {
    let mut rates = [0.0; 10];
    let mut first_error = None;
    for ((name, value), rate) in CpuTicks::FIELDS
        .iter()
        .zip(ticks.values())
        .zip(rates.iter_mut())
    {
        let key = format!("{}.{}", prefix, name);
        match get_rate(&mut ctx.value_store, &key, now, value, true) {
            Ok(r) => *rate = r,
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }
    match first_error {
        Some(err) => Err(err),
        None => Ok(CpuTicks::from_values(rates)),
    }
}

fn percent_of(part: f64, total: f64) -> f64 {
    if total > 0.0 {
        (part / total * 100.0).clamp(0.0, 100.0)
    } else {
        0.0
    }
}

fn check_kernel_util(
    _item: Option<&str>,
    params: &Params,
    sections: &SectionSet<'_>,
    ctx: &mut CheckContext,
) -> Result<Vec<CheckOutput>, CheckError> {
    let params: KernelUtilParams = parse_params(params)?;
    let Some(kernel) = sections.typed::<KernelSection>(0)? else {
        return Ok(vec![]);
    };
    let Some(ticks) = kernel.cpu_total else {
        return Ok(vec![]);
    };
    let num_cpus = sections
        .typed::<CpuLoadSection>(1)?
        .and_then(|loads| loads.num_cpus)
        .map(|n| n as usize)
        .unwrap_or(kernel.cores.len());

    let now = kernel.timestamp.map(|t| t as f64).unwrap_or(ctx.now);
    let rates = tick_rates(ctx, "cpu", &ticks, now);
    // core baselines are sampled even when the total is not ready yet
    let core_outputs = if params.levels_single != LevelsParam::Disabled || params.core_util_graph {
        check_cores(kernel, &params, ctx, now)
    } else {
        Vec::new()
    };
    let rates = rates?;
    let total = rates.total();
    if total <= 0.0 {
        return Err(CheckError::IgnoreResults("No CPU time elapsed".to_string()));
    }

    let user = percent_of(rates.user + rates.nice - rates.guest - rates.guest_nice, total);
    let system = percent_of(rates.system + rates.irq + rates.softirq, total);
    let wait = percent_of(rates.iowait, total);
    let steal = percent_of(rates.steal, total);
    let guest = percent_of(rates.guest + rates.guest_nice, total);
    let util = (100.0 - percent_of(rates.idle, total)).clamp(0.0, 100.0);

    let mut outputs = Vec::new();
    outputs.extend(check_levels(
        user,
        &Levels::Disabled,
        &CheckLevels::new(render::percent).label("User").metric("user"),
    ));
    outputs.extend(check_levels(
        system,
        &Levels::Disabled,
        &CheckLevels::new(render::percent).label("System").metric("system"),
    ));
    outputs.extend(check_levels(
        wait,
        &ctx.levels(&params.iowait, "wait", None),
        &CheckLevels::new(render::percent)
            .label("Wait")
            .metric("wait")
            .at(now),
    ));
    if steal > 0.0 || params.steal != LevelsParam::Disabled {
        outputs.extend(check_levels(
            steal,
            &ctx.levels(&params.steal, "steal", None),
            &CheckLevels::new(render::percent)
                .label("Steal")
                .metric("steal")
                .at(now),
        ));
    }
    if guest > 0.0 {
        outputs.push(Metric::new("guest", guest).into());
    }

    let util_levels = ctx.levels(&params.util, "util", None);
    match params.average {
        Some(minutes) => {
            let average = get_average(&mut ctx.value_store, "util.avg", now, util, minutes);
            outputs.push(Metric::new("util", util).with_boundaries(0.0, 100.0).into());
            let label = format!("Total CPU ({} min average)", minutes);
            outputs.extend(check_levels(
                average,
                &util_levels,
                &CheckLevels::new(render::percent)
                    .label(&label)
                    .metric("util_average")
                    .boundaries(0.0, 100.0)
                    .at(now),
            ));
        }
        None => {
            outputs.extend(check_levels(
                util,
                &util_levels,
                &CheckLevels::new(render::percent)
                    .label("Total CPU")
                    .metric("util")
                    .boundaries(0.0, 100.0)
                    .at(now),
            ));
        }
    }

    if num_cpus > 0 {
        outputs.push(CheckResult::ok(format!("{} CPUs", num_cpus)).into());
    }

    outputs.extend(core_outputs);
    Ok(outputs)
}

/// Per-core utilization; only non-OK core results are reported
fn check_cores(
    kernel: &KernelSection,
    params: &KernelUtilParams,
    ctx: &mut CheckContext,
    now: f64,
) -> Vec<CheckOutput> {
    let mut outputs = Vec::new();
    for (name, ticks) in &kernel.cores {
        let total = get_rate(&mut ctx.value_store, &format!("{}.total", name), now, ticks.total(), true);
        let idle = get_rate(&mut ctx.value_store, &format!("{}.idle", name), now, ticks.idle, true);
        let (Ok(total), Ok(idle)) = (total, idle) else {
            continue;
        };
        if total <= 0.0 {
            continue;
        }
        let util = (100.0 - percent_of(idle, total)).clamp(0.0, 100.0);

        if params.core_util_graph {
            let index = name.trim_start_matches("cpu");
            outputs.push(
                Metric::new(format!("cpu_core_util_{}", index), util)
                    .with_boundaries(0.0, 100.0)
                    .into(),
            );
        }
        let label = format!("Core {}", name);
        let levels = ctx.levels(&params.levels_single, "util", None);
        let core_outputs = check_levels(util, &levels, &CheckLevels::new(render::percent).label(&label));
        outputs.extend(
            core_outputs
                .into_iter()
                .filter(|o| o.as_result().map_or(false, |r| r.state != State::Ok)),
        );
    }
    outputs
}

/// Parameters of the kernel performance check
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelPerformanceParams {
    pub ctxt: LevelsParam,
    pub processes: LevelsParam,
    pub pgmajfault: LevelsParam,
}

/// Counter name, metric name and label of the kernel performance counters
const PERFORMANCE_COUNTERS: [(&str, &str, &str); 3] = [
    ("ctxt", "context_switches", "Process context switches"),
    ("processes", "process_creations", "Process creations"),
    ("pgmajfault", "major_page_faults", "Major page faults"),
];

fn discover_kernel_performance(
    _params: &Params,
    sections: &SectionSet<'_>,
) -> Result<Vec<DiscoveredService>, CheckError> {
    let Some(kernel) = sections.typed::<KernelSection>(0)? else {
        return Ok(vec![]);
    };
    let any = PERFORMANCE_COUNTERS
        .iter()
        .any(|(counter, _, _)| kernel.counters.contains_key(*counter));
    Ok(if any {
        vec![DiscoveredService::single()]
    } else {
        vec![]
    })
}

fn check_kernel_performance(
    _item: Option<&str>,
    params: &Params,
    sections: &SectionSet<'_>,
    ctx: &mut CheckContext,
) -> Result<Vec<CheckOutput>, CheckError> {
    let params: KernelPerformanceParams = parse_params(params)?;
    let Some(kernel) = sections.typed::<KernelSection>(0)? else {
        return Ok(vec![]);
    };
    let now = kernel.timestamp.map(|t| t as f64).unwrap_or(ctx.now);

    let mut rates = Vec::new();
    let mut first_error = None;
    for (counter, metric, label) in PERFORMANCE_COUNTERS {
        let Some(value) = kernel.counters.get(counter) else {
            continue;
        };
        match get_rate(&mut ctx.value_store, counter, now, *value, true) {
            Ok(rate) => rates.push((counter, metric, label, rate)),
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }
    if let Some(err) = first_error {
        return Err(err.into());
    }

    let mut outputs = Vec::new();
    for (counter, metric, label, rate) in rates {
        let param = match counter {
            "ctxt" => &params.ctxt,
            "processes" => &params.processes,
            _ => &params.pgmajfault,
        };
        let levels = ctx.levels(param, metric, None);
        let label = format!("{}/s", label);
        outputs.extend(check_levels(
            rate,
            &levels,
            &CheckLevels::new(render::float).label(&label).metric(metric).at(now),
        ));
    }
    Ok(outputs)
}

pub fn section_plugin() -> SectionPlugin {
    SectionPlugin::new("kernel", parse_kernel)
}

pub fn check_plugins() -> Vec<CheckPlugin> {
    vec![
        CheckPlugin::new(
            "kernel_util",
            "CPU utilization",
            &["kernel", "cpu"],
            discover_kernel_util,
            check_kernel_util,
        )
        .check_defaults(default_params::<KernelUtilParams>())
        .check_ruleset("cpu_iowait"),
        CheckPlugin::new(
            "kernel_performance",
            "Kernel Performance",
            &["kernel"],
            discover_kernel_performance,
            check_kernel_performance,
        )
        .check_defaults(default_params::<KernelPerformanceParams>())
        .check_ruleset("kernel_performance"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::tests::table;
    use serde_json::json;

    const KERNEL_SECTIONS: &[&str] = &["kernel", "cpu"];

    fn parse(rows: &[&[&str]]) -> KernelSection {
        match parse_kernel(&table(rows)) {
            Some(Section::Kernel(section)) => section,
            other => panic!("unexpected parse result {:?}", other),
        }
    }

    fn run(section: &Section, params: Params, ctx: &mut CheckContext) -> Result<Vec<CheckOutput>, CheckError> {
        let sections = SectionSet::new(KERNEL_SECTIONS, vec![Some(section), None]);
        check_kernel_util(None, &params, &sections, ctx)
    }

    #[test]
    fn test_parse_with_timestamp_and_counters() {
        let section = parse(&[
            &["1700000000"],
            &["nr_free_pages", "198749"],
            &["cpu", "424", "0", "240", "9090", "62", "0", "8", "0", "0", "0"],
            &["cpu0", "212", "0", "120", "4545", "31", "0", "4", "0", "0", "0"],
            &["ctxt", "539210403"],
            &["intr", "1", "2", "3"],
        ]);
        assert_eq!(section.timestamp, Some(1_700_000_000));
        assert_eq!(section.cpu_total.unwrap().idle, 9090.0);
        assert_eq!(section.cores.len(), 1);
        assert_eq!(section.counters.get("ctxt"), Some(&539_210_403.0));
        assert!(!section.counters.contains_key("intr"));
    }

    #[test]
    fn test_parse_short_and_malformed_cpu_rows() {
        let section = parse(&[
            &["cpu", "1", "2", "3", "4"],
            &["cpu1", "1", "x", "3", "4"],
            &["cpu2", "1", "2"],
        ]);
        let total = section.cpu_total.unwrap();
        assert_eq!(total.idle, 4.0);
        assert_eq!(total.iowait, 0.0);
        assert!(section.cores.is_empty());
    }

    #[test]
    fn test_parse_rejects_non_finite_fields() {
        let section = parse(&[
            &["cpu", "nan", "0", "70", "810", "10", "0", "10", "0", "0", "0"],
            &["cpu0", "1", "0", "inf", "4", "0", "0", "0", "0", "0", "0"],
            &["ctxt", "infinity"],
            &["processes", "4711"],
        ]);
        assert!(section.cpu_total.is_none());
        assert!(section.cores.is_empty());
        assert!(!section.counters.contains_key("ctxt"));
        assert!(parse_kernel(&table(&[&["cpu", "NaN", "0", "70", "810"]])).is_none());
    }

    #[test]
    fn test_non_finite_sample_keeps_baseline() {
        let first = Section::Kernel(parse(&[&["cpu", "100", "0", "50", "800", "10", "0", "5", "0", "0", "0"]]));
        let third = Section::Kernel(parse(&[&["cpu", "160", "0", "70", "810", "10", "0", "10", "0", "0", "0"]]));
        let garbage = table(&[&["cpu", "nan", "0", "70", "810", "10", "0", "10", "0", "0", "0"]]);

        let mut ctx = CheckContext::detached("kernel_util", None, 100.0);
        assert!(run(&first, json!({}), &mut ctx).is_err());
        // The garbage row never becomes a section, so nothing is checked
        assert!(parse_kernel(&garbage).is_none());
        ctx.now = 102.0;
        let outputs = run(&third, json!({}), &mut ctx).unwrap();

        let total = outputs
            .iter()
            .filter_map(CheckOutput::as_result)
            .find(|r| r.summary.starts_with("Total CPU"))
            .unwrap();
        assert_eq!(total.state, State::Ok);
    }

    #[test]
    fn test_parse_empty() {
        assert!(parse_kernel(&vec![]).is_none());
        assert!(parse_kernel(&table(&[&["1700000000"]])).is_none());
    }

    #[test]
    fn test_first_check_is_pending() {
        let section = Section::Kernel(parse(&[&["cpu", "100", "0", "50", "800", "10", "0", "5", "0", "0", "0"]]));
        let mut ctx = CheckContext::detached("kernel_util", None, 100.0);
        let result = run(&section, json!({}), &mut ctx);
        assert!(matches!(result, Err(CheckError::IgnoreResults(_))));
    }

    #[test]
    fn test_utilization_between_two_samples() {
        let first = Section::Kernel(parse(&[&["cpu", "100", "0", "50", "800", "10", "0", "5", "0", "0", "0"]]));
        let second = Section::Kernel(parse(&[&["cpu", "160", "0", "70", "810", "10", "0", "10", "0", "0", "0"]]));

        let mut ctx = CheckContext::detached("kernel_util", None, 100.0);
        assert!(run(&first, json!({}), &mut ctx).is_err());
        ctx.now = 101.0;
        let outputs = run(&second, json!({}), &mut ctx).unwrap();

        // 95 ticks elapsed, 10 of them idle
        let util = outputs
            .iter()
            .filter_map(CheckOutput::as_metric)
            .find(|m| m.name == "util")
            .unwrap();
        assert!((util.value - 100.0 * 85.0 / 95.0).abs() < 1e-9);

        let total = outputs
            .iter()
            .filter_map(CheckOutput::as_result)
            .find(|r| r.summary.starts_with("Total CPU"))
            .unwrap();
        assert_eq!(total.state, State::Ok);
    }

    #[test]
    fn test_average_levels_apply_to_average() {
        let first = Section::Kernel(parse(&[&["cpu", "0", "0", "0", "100", "0"]]));
        let second = Section::Kernel(parse(&[&["cpu", "100", "0", "0", "100", "0"]]));
        let params = json!({"average": 5.0, "util": {"upper": [50.0, 60.0]}});

        let mut ctx = CheckContext::detached("kernel_util", None, 0.0);
        assert!(run(&first, params.clone(), &mut ctx).is_err());
        ctx.now = 60.0;
        let outputs = run(&second, params, &mut ctx).unwrap();

        let names: Vec<_> = outputs
            .iter()
            .filter_map(CheckOutput::as_metric)
            .map(|m| m.name.as_str())
            .collect();
        assert!(names.contains(&"util"));
        assert!(names.contains(&"util_average"));
        assert!(outputs
            .iter()
            .filter_map(CheckOutput::as_result)
            .any(|r| r.summary.starts_with("Total CPU (5 min average)")));
    }

    #[test]
    fn test_single_core_levels_only_report_problems() {
        let rows_a: &[&[&str]] = &[
            &["cpu", "0", "0", "0", "200"],
            &["cpu0", "0", "0", "0", "100"],
            &["cpu1", "0", "0", "0", "100"],
        ];
        let rows_b: &[&[&str]] = &[
            &["cpu", "100", "0", "0", "300"],
            &["cpu0", "95", "0", "0", "105"],
            &["cpu1", "5", "0", "0", "195"],
        ];
        let params = json!({"levels_single": {"upper": [80.0, 90.0]}, "core_util_graph": true});
        let mut ctx = CheckContext::detached("kernel_util", None, 0.0);
        assert!(run(&Section::Kernel(parse(rows_a)), params.clone(), &mut ctx).is_err());
        ctx.now = 10.0;
        let outputs = run(&Section::Kernel(parse(rows_b)), params, &mut ctx).unwrap();

        let core_results: Vec<_> = outputs
            .iter()
            .filter_map(CheckOutput::as_result)
            .filter(|r| r.summary.starts_with("Core"))
            .collect();
        assert_eq!(core_results.len(), 1);
        assert_eq!(core_results[0].state, State::Crit);
        assert!(core_results[0].summary.starts_with("Core cpu0"));
        assert!(outputs
            .iter()
            .filter_map(CheckOutput::as_metric)
            .any(|m| m.name == "cpu_core_util_1"));
    }

    #[test]
    fn test_num_cpus_from_cpu_section() {
        let kernel = Section::Kernel(parse(&[&["cpu", "0", "0", "0", "100"]]));
        let loads = Section::CpuLoad(CpuLoadSection {
            num_cpus: Some(8),
            ..Default::default()
        });
        let sections = SectionSet::new(KERNEL_SECTIONS, vec![Some(&kernel), Some(&loads)]);
        let mut ctx = CheckContext::detached("kernel_util", None, 0.0);
        assert!(check_kernel_util(None, &json!({}), &sections, &mut ctx).is_err());

        let kernel = Section::Kernel(parse(&[&["cpu", "10", "0", "0", "190"]]));
        let sections = SectionSet::new(KERNEL_SECTIONS, vec![Some(&kernel), Some(&loads)]);
        ctx.now = 1.0;
        let outputs = check_kernel_util(None, &json!({}), &sections, &mut ctx).unwrap();
        assert!(outputs
            .iter()
            .filter_map(CheckOutput::as_result)
            .any(|r| r.summary == "8 CPUs"));
    }

    #[test]
    fn test_kernel_performance_rates() {
        let first = Section::Kernel(parse(&[&["100"], &["ctxt", "1000"], &["processes", "50"]]));
        let second = Section::Kernel(parse(&[&["110"], &["ctxt", "2000"], &["processes", "70"]]));
        let mut ctx = CheckContext::detached("kernel_performance", None, 0.0);

        let sections = SectionSet::single(&["kernel"], &first);
        assert!(check_kernel_performance(None, &json!({}), &sections, &mut ctx).is_err());

        let sections = SectionSet::single(&["kernel"], &second);
        let outputs = check_kernel_performance(None, &json!({}), &sections, &mut ctx).unwrap();
        let ctxt = outputs
            .iter()
            .filter_map(CheckOutput::as_metric)
            .find(|m| m.name == "context_switches")
            .unwrap();
        assert_eq!(ctxt.value, 100.0);
        let forks = outputs
            .iter()
            .filter_map(CheckOutput::as_metric)
            .find(|m| m.name == "process_creations")
            .unwrap();
        assert_eq!(forks.value, 2.0);
    }
}
