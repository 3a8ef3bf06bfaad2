//! Block device IO statistics (`/proc/diskstats`)
//!
//! The section starts with the agent timestamp, followed by one row per
//! block device and, optionally, a `[dmsetup_info]` block mapping device
//! mapper minors to volume names:
//!
//! ```text
//! 1439297971
//! 8 0 sda 83421 32310 3426701 108964 24516 35933 639474 32372 0 18532 141496
//! [dmsetup_info]
//! ubuntu--vg-root 253:1 ubuntu-vg root
//! ```
//!
//! Device columns after the name: reads completed, reads merged, sectors
//! read, ms reading, writes completed, writes merged, sectors written, ms
//! writing, IOs in flight, ms doing IO. Sectors are always 512 bytes.

use super::{default_params, parse_number, parse_params};
use crate::context::CheckContext;
use crate::error::CheckError;
use crate::levels::{check_levels, CheckLevels, Levels, LevelsParam};
use crate::models::{CheckOutput, CheckResult, DiscoveredService, Params, StringTable};
use crate::rate::{get_average, get_rate};
use crate::registry::{CheckPlugin, SectionPlugin};
use crate::render::{self, RenderFn};
use crate::section::{Section, SectionSet};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

const SECTOR_SIZE: f64 = 512.0;

/// Item aggregating all physical disks
pub const SUMMARY_ITEM: &str = "SUMMARY";

/// Cumulative counters of one device
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DiskCounters {
    pub read_ios: f64,
    pub write_ios: f64,
    /// Bytes
    pub read_throughput: f64,
    pub write_throughput: f64,
    /// Seconds spent reading
    pub read_ticks: f64,
    pub write_ticks: f64,
    /// Seconds the device was busy
    pub utilization: f64,
    /// Requests currently in flight
    pub queue_length: f64,
}

impl DiskCounters {
    fn from_fields(fields: &[String]) -> Option<Self> {
        let value = |i: usize| fields.get(i).and_then(|f| parse_number(f));
        Some(Self {
            read_ios: value(0)?,
            read_throughput: value(2)? * SECTOR_SIZE,
            read_ticks: value(3)? / 1000.0,
            write_ios: value(4)?,
            write_throughput: value(6)? * SECTOR_SIZE,
            write_ticks: value(7)? / 1000.0,
            queue_length: value(8)?,
            utilization: value(9)? / 1000.0,
        })
    }

    fn add(&mut self, other: &DiskCounters) {
        self.read_ios += other.read_ios;
        self.write_ios += other.write_ios;
        self.read_throughput += other.read_throughput;
        self.write_throughput += other.write_throughput;
        self.read_ticks += other.read_ticks;
        self.write_ticks += other.write_ticks;
        self.utilization += other.utilization;
        self.queue_length += other.queue_length;
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiskstatSection {
    pub timestamp: Option<i64>,
    pub disks: BTreeMap<String, DiskCounters>,
}

fn is_ignored_device(name: &str) -> bool {
    name.starts_with("loop") || name.starts_with("ram")
}

fn is_logical_device(name: &str) -> bool {
    name.starts_with("DM ") || name.starts_with("LVM ") || name.starts_with("dm-")
}

pub fn parse_diskstat(table: &StringTable) -> Option<Section> {
    let mut timestamp = None;
    let mut devices: Vec<(String, String, DiskCounters)> = Vec::new();
    let mut mapper_names: HashMap<String, String> = HashMap::new();
    let mut in_dmsetup = false;

    for (index, row) in table.iter().enumerate() {
        match row.as_slice() {
            [single] if index == 0 => {
                timestamp = single.parse::<i64>().ok();
            }
            [marker] if marker.starts_with('[') => {
                in_dmsetup = marker == "[dmsetup_info]";
            }
            [name, dev, rest @ ..] if in_dmsetup => {
                if !dev.contains(':') {
                    continue;
                }
                let display = match rest {
                    [_vg, _lv, ..] => format!("LVM {}", name),
                    _ => format!("DM {}", name),
                };
                mapper_names.insert(dev.clone(), display);
            }
            [major, minor, name, fields @ ..] if !in_dmsetup => {
                if is_ignored_device(name) {
                    continue;
                }
                if let Some(counters) = DiskCounters::from_fields(fields) {
                    devices.push((format!("{}:{}", major, minor), name.clone(), counters));
                }
            }
            _ => {}
        }
    }

    let disks: BTreeMap<String, DiskCounters> = devices
        .into_iter()
        .map(|(dev, name, counters)| {
            let name = mapper_names.get(&dev).cloned().unwrap_or(name);
            (name, counters)
        })
        .collect();

    if disks.is_empty() {
        return None;
    }
    Some(Section::Diskstat(DiskstatSection { timestamp, disks }))
}

/// Which devices become services
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiskstatDiscoveryParams {
    /// One service per physical disk
    pub physical: bool,
    /// One service per device mapper / LVM volume
    pub lvm: bool,
    /// One service summing all physical disks
    pub summary: bool,
}

impl Default for DiskstatDiscoveryParams {
    fn default() -> Self {
        Self {
            physical: true,
            lvm: false,
            summary: false,
        }
    }
}

/// Parameters of the disk IO check; throughput levels are in bytes/s,
/// latency levels in seconds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiskstatParams {
    pub utilization: LevelsParam,
    pub read: LevelsParam,
    pub write: LevelsParam,
    pub read_ios: LevelsParam,
    pub write_ios: LevelsParam,
    pub latency: LevelsParam,
    /// Average every value over this many minutes
    pub average: Option<f64>,
}

fn discover_diskstat(
    params: &Params,
    sections: &SectionSet<'_>,
) -> Result<Vec<DiscoveredService>, CheckError> {
    let params: DiskstatDiscoveryParams = parse_params(params)?;
    let Some(section) = sections.typed::<DiskstatSection>(0)? else {
        return Ok(vec![]);
    };

    let mut services: Vec<DiscoveredService> = section
        .disks
        .keys()
        .filter(|name| {
            if is_logical_device(name) {
                params.lvm
            } else {
                params.physical
            }
        })
        .map(|name| DiscoveredService::with_item(name.clone()))
        .collect();

    if params.summary && section.disks.keys().any(|name| !is_logical_device(name)) {
        services.push(DiscoveredService::with_item(SUMMARY_ITEM));
    }
    Ok(services)
}

fn counters_for_item(section: &DiskstatSection, item: &str) -> Option<DiskCounters> {
    if item == SUMMARY_ITEM {
        let mut physical = section
            .disks
            .iter()
            .filter(|(name, _)| !is_logical_device(name))
            .map(|(_, counters)| counters)
            .peekable();
        physical.peek()?;
        let mut total = DiskCounters::default();
        physical.for_each(|counters| total.add(counters));
        return Some(total);
    }
    section.disks.get(item).copied()
}

struct DiskRates {
    read_ios: f64,
    write_ios: f64,
    read_throughput: f64,
    write_throughput: f64,
    read_ticks: f64,
    write_ticks: f64,
    utilization: f64,
}

fn disk_rates(ctx: &mut CheckContext, counters: &DiskCounters, now: f64) -> Result<DiskRates, CheckError> {
    let samples = [
        ("read_ios", counters.read_ios),
        ("write_ios", counters.write_ios),
        ("read_throughput", counters.read_throughput),
        ("write_throughput", counters.write_throughput),
        ("read_ticks", counters.read_ticks),
        ("write_ticks", counters.write_ticks),
        ("utilization", counters.utilization),
    ];
    let mut rates = [0.0; 7];
    let mut first_error = None;
    for ((key, value), rate) in samples.iter().zip(rates.iter_mut()) {
        match get_rate(&mut ctx.value_store, key, now, *value, true) {
            Ok(r) => *rate = r,
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }
    if let Some(err) = first_error {
        return Err(err.into());
    }
    let [read_ios, write_ios, read_throughput, write_throughput, read_ticks, write_ticks, utilization] =
        rates;
    Ok(DiskRates {
        read_ios,
        write_ios,
        read_throughput,
        write_throughput,
        read_ticks,
        write_ticks,
        utilization,
    })
}

fn check_diskstat(
    item: Option<&str>,
    params: &Params,
    sections: &SectionSet<'_>,
    ctx: &mut CheckContext,
) -> Result<Vec<CheckOutput>, CheckError> {
    let params: DiskstatParams = parse_params(params)?;
    let Some(section) = sections.typed::<DiskstatSection>(0)? else {
        return Ok(vec![]);
    };
    let Some(counters) = item.and_then(|item| counters_for_item(section, item)) else {
        return Ok(vec![]);
    };

    let now = section.timestamp.map(|t| t as f64).unwrap_or(ctx.now);
    let rates = disk_rates(ctx, &counters, now)?;

    let total_ios = rates.read_ios + rates.write_ios;
    let average_wait = if total_ios > 0.0 {
        (rates.read_ticks + rates.write_ticks) / total_ios
    } else {
        0.0
    };
    let utilization = (rates.utilization * 100.0).clamp(0.0, 100.0);

    let values: [(&str, &str, f64, &LevelsParam, RenderFn); 6] = [
        ("Utilization", "disk_utilization", utilization, &params.utilization, render::percent),
        ("Read", "disk_read_throughput", rates.read_throughput, &params.read, render::iobandwidth),
        ("Write", "disk_write_throughput", rates.write_throughput, &params.write, render::iobandwidth),
        ("Read operations", "disk_read_ios", rates.read_ios, &params.read_ios, render::count),
        ("Write operations", "disk_write_ios", rates.write_ios, &params.write_ios, render::count),
        ("Average wait", "disk_average_wait", average_wait, &params.latency, render::timespan),
    ];

    let mut outputs = Vec::new();
    if let Some(minutes) = params.average {
        outputs.push(
            CheckResult::ok(format!(
                "All values averaged over {}",
                render::timespan(minutes * 60.0)
            ))
            .into(),
        );
    }

    for (label, metric, value, param, render_fn) in values {
        let value = match params.average {
            Some(minutes) => get_average(
                &mut ctx.value_store,
                &format!("{}.avg", metric),
                now,
                value,
                minutes,
            ),
            None => value,
        };
        let levels = ctx.levels(param, metric, None);
        outputs.extend(check_levels(
            value,
            &levels,
            &CheckLevels::new(render_fn).label(label).metric(metric).at(now),
        ));
    }

    outputs.extend(check_levels(
        counters.queue_length,
        &Levels::Disabled,
        &CheckLevels::new(render::float)
            .label("Queue length")
            .metric("disk_queue_length"),
    ));

    Ok(outputs)
}

pub fn section_plugin() -> SectionPlugin {
    SectionPlugin::new("diskstat", parse_diskstat)
}

pub fn check_plugin() -> CheckPlugin {
    CheckPlugin::new(
        "diskstat",
        "Disk IO %s",
        &["diskstat"],
        discover_diskstat,
        check_diskstat,
    )
    .discovery_defaults(default_params::<DiskstatDiscoveryParams>())
    .discovery_ruleset("diskstat_inventory")
    .check_defaults(default_params::<DiskstatParams>())
    .check_ruleset("diskstat")
}
