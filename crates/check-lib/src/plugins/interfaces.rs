//! Network interfaces
//!
//! Two raw formats publish the same `interfaces` section:
//!
//! - `if`: generic table, one row per interface with index, description,
//!   type, speed (bit/s), operational status and in/out octet, unicast
//!   packet and error counters.
//! - `lnx_if`: Linux agents. `/proc/net/dev` counters followed by one
//!   `[name]` block per interface with ethtool style attributes. It
//!   supersedes `if` when both are present.
//!
//! ```text
//! <<<lnx_if>>>
//! eth0: 1093 12 0 0 0 0 0 0 2145 20 0 0 0 0 0 0
//! [eth0]
//!         Speed: 1000Mb/s
//!         Link detected: yes
//!         Address: 00:1a:4b:aa:bb:cc
//! ```

use super::{default_params, parse_number, parse_params};
use crate::context::CheckContext;
use crate::error::CheckError;
use crate::levels::{check_levels, CheckLevels, LevelsParam};
use crate::models::{
    CheckOutput, CheckResult, DiscoveredService, Metric, Params, State, StringTable,
};
use crate::rate::{get_average, get_rate};
use crate::registry::{CheckPlugin, SectionPlugin};
use crate::render;
use crate::section::{Section, SectionSet};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;

/// IANA ifType of software loopback interfaces
const IF_TYPE_LOOPBACK: u32 = 24;
const IF_TYPE_ETHERNET: u32 = 6;

const OPER_UP: u8 = 1;
const OPER_DOWN: u8 = 2;

pub fn oper_status_name(status: u8) -> &'static str {
    match status {
        1 => "up",
        2 => "down",
        3 => "testing",
        4 => "unknown",
        5 => "dormant",
        6 => "not present",
        7 => "lower layer down",
        _ => "invalid",
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Interface {
    pub index: Option<u32>,
    pub name: String,
    pub if_type: u32,
    /// Bit/s, 0 if unknown
    pub speed: f64,
    pub oper_status: u8,
    pub mac: Option<String>,
    pub in_octets: f64,
    pub in_ucast: f64,
    pub in_errors: f64,
    pub out_octets: f64,
    pub out_ucast: f64,
    pub out_errors: f64,
}

impl Interface {
    pub fn is_up(&self) -> bool {
        self.oper_status == OPER_UP
    }

    pub fn is_loopback(&self) -> bool {
        self.if_type == IF_TYPE_LOOPBACK
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InterfaceSection {
    /// Keyed by interface name
    pub interfaces: BTreeMap<String, Interface>,
}

fn parse_if_row(row: &[String]) -> Option<Interface> {
    let [index, descr, if_type, speed, oper_status, counters @ ..] = row else {
        return None;
    };
    let counter = |i: usize| counters.get(i).and_then(|c| parse_number(c));
    Some(Interface {
        index: index.parse().ok(),
        name: descr.clone(),
        if_type: if_type.parse().ok()?,
        speed: parse_number(speed).unwrap_or(0.0),
        oper_status: oper_status.parse().ok()?,
        mac: None,
        in_octets: counter(0)?,
        in_ucast: counter(1)?,
        in_errors: counter(2)?,
        out_octets: counter(3)?,
        out_ucast: counter(4)?,
        out_errors: counter(5)?,
    })
}

pub fn parse_if(table: &StringTable) -> Option<Section> {
    let mut interfaces = BTreeMap::new();
    for row in table {
        if let Some(interface) = parse_if_row(row) {
            interfaces
                .entry(interface.name.clone())
                .or_insert(interface);
        }
    }
    if interfaces.is_empty() {
        return None;
    }
    Some(Section::Interfaces(InterfaceSection { interfaces }))
}

/// Split `eth0:1093 12 ...` or `eth0: 1093 12 ...` into name and counters
fn split_proc_net_dev(row: &[String]) -> Option<(String, Vec<String>)> {
    let (first, rest) = row.split_first()?;
    let (name, glued) = first.split_once(':')?;
    let mut fields = Vec::with_capacity(16);
    if !glued.is_empty() {
        fields.push(glued.to_string());
    }
    fields.extend(rest.iter().cloned());
    Some((name.to_string(), fields))
}

fn parse_lnx_counters(index: u32, name: String, fields: &[String]) -> Option<Interface> {
    if fields.len() < 16 {
        return None;
    }
    let value = |i: usize| parse_number(&fields[i]);
    Some(Interface {
        index: Some(index),
        if_type: if name == "lo" {
            IF_TYPE_LOOPBACK
        } else {
            IF_TYPE_ETHERNET
        },
        name,
        speed: 0.0,
        oper_status: 0,
        mac: None,
        in_octets: value(0)?,
        in_ucast: value(1)?,
        in_errors: value(2)?,
        out_octets: value(8)?,
        out_ucast: value(9)?,
        out_errors: value(10)?,
    })
}

/// `1000Mb/s` → bit/s
fn parse_ethtool_speed(text: &str) -> Option<f64> {
    let mbits = parse_number(text.strip_suffix("Mb/s")?)?;
    Some(mbits * 1e6)
}

pub fn parse_lnx_if(table: &StringTable) -> Option<Section> {
    let mut interfaces: BTreeMap<String, Interface> = BTreeMap::new();
    let mut link_detected: BTreeMap<String, bool> = BTreeMap::new();
    let mut current_block: Option<String> = None;
    let mut next_index = 1;

    for row in table {
        if let [block] = row.as_slice() {
            if let Some(name) = block.strip_prefix('[').and_then(|b| b.strip_suffix(']')) {
                current_block = Some(name.to_string());
                continue;
            }
        }

        if let Some(name) = &current_block {
            let Some(interface) = interfaces.get_mut(name) else {
                continue;
            };
            match row.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
                ["Speed:", speed] => {
                    interface.speed = parse_ethtool_speed(speed).unwrap_or(0.0);
                }
                ["Link", "detected:", detected] => {
                    link_detected.insert(name.clone(), *detected == "yes");
                }
                ["Address:", mac] => interface.mac = Some(mac.to_string()),
                _ => {}
            }
            continue;
        }

        if let Some((name, fields)) = split_proc_net_dev(row) {
            if let Some(interface) = parse_lnx_counters(next_index, name.clone(), &fields) {
                next_index += 1;
                interfaces.entry(name).or_insert(interface);
            }
        }
    }

    if interfaces.is_empty() {
        return None;
    }

    for interface in interfaces.values_mut() {
        interface.oper_status = match link_detected.get(&interface.name) {
            Some(true) => OPER_UP,
            Some(false) => OPER_DOWN,
            // without ethtool data, traffic means up
            None if interface.in_octets > 0.0 || interface.out_octets > 0.0 => OPER_UP,
            None => OPER_DOWN,
        };
    }

    Some(Section::Interfaces(InterfaceSection { interfaces }))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterfaceDiscoveryParams {
    pub include_loopback: bool,
    /// Also discover interfaces that are not up
    pub discover_down: bool,
}

/// Parameters of the interface check
///
/// `discovered_*` entries are filled in by discovery; `speed` and `state`
/// override them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterfaceParams {
    /// Bandwidth levels; percentages are relative to the link speed
    pub traffic: LevelsParam,
    /// Levels on the error rate in percent of all packets
    pub errors: LevelsParam,
    /// Average traffic over this many minutes before applying levels
    pub average: Option<f64>,
    /// Expected speed in bit/s
    pub speed: Option<f64>,
    /// Acceptable operational states
    pub state: Option<Vec<u8>>,
    pub discovered_speed: Option<f64>,
    pub discovered_oper_status: Option<u8>,
}

impl Default for InterfaceParams {
    fn default() -> Self {
        Self {
            traffic: LevelsParam::Percentage(80.0, 90.0),
            errors: LevelsParam::Upper(0.01, 0.1),
            average: None,
            speed: None,
            state: None,
            discovered_speed: None,
            discovered_oper_status: None,
        }
    }
}

fn discover_interfaces(
    params: &Params,
    sections: &SectionSet<'_>,
) -> Result<Vec<DiscoveredService>, CheckError> {
    let params: InterfaceDiscoveryParams = parse_params(params)?;
    let Some(section) = sections.typed::<InterfaceSection>(0)? else {
        return Ok(vec![]);
    };

    Ok(section
        .interfaces
        .values()
        .filter(|iface| params.include_loopback || !iface.is_loopback())
        .filter(|iface| params.discover_down || iface.is_up())
        .map(|iface| {
            DiscoveredService::with_item(iface.name.clone()).with_parameters(json!({
                "discovered_speed": iface.speed,
                "discovered_oper_status": iface.oper_status,
            }))
        })
        .collect())
}

fn check_status(interface: &Interface, params: &InterfaceParams) -> CheckResult {
    let targets: Vec<u8> = match (&params.state, params.discovered_oper_status) {
        (Some(states), _) => states.clone(),
        (None, Some(discovered)) => vec![discovered],
        (None, None) => vec![OPER_UP],
    };
    let state = if targets.contains(&interface.oper_status) {
        State::Ok
    } else {
        State::Crit
    };
    CheckResult::new(
        state,
        format!(
            "Operational state: {}",
            oper_status_name(interface.oper_status)
        ),
    )
}

fn check_speed(interface: &Interface, expected: Option<f64>) -> CheckResult {
    match (interface.speed > 0.0, expected.filter(|s| *s > 0.0)) {
        (true, Some(expected)) if expected != interface.speed => CheckResult::new(
            State::Warn,
            format!(
                "Speed: {} (expected: {})",
                render::nic_speed(interface.speed),
                render::nic_speed(expected)
            ),
        ),
        (true, _) => CheckResult::ok(format!("Speed: {}", render::nic_speed(interface.speed))),
        (false, Some(expected)) => {
            CheckResult::ok(format!("Speed: {} (assumed)", render::nic_speed(expected)))
        }
        (false, None) => CheckResult::ok("Speed: unknown"),
    }
}

fn error_percentage(errors: f64, packets: f64) -> f64 {
    let total = errors + packets;
    if total > 0.0 {
        errors / total * 100.0
    } else {
        0.0
    }
}

fn check_interfaces(
    item: Option<&str>,
    params: &Params,
    sections: &SectionSet<'_>,
    ctx: &mut CheckContext,
) -> Result<Vec<CheckOutput>, CheckError> {
    let params: InterfaceParams = parse_params(params)?;
    let Some(section) = sections.typed::<InterfaceSection>(0)? else {
        return Ok(vec![]);
    };
    let Some(interface) = item.and_then(|item| section.interfaces.get(item)) else {
        return Ok(vec![]);
    };

    let mut outputs: Vec<CheckOutput> = Vec::new();
    if let Some(index) = interface.index {
        outputs.push(CheckResult::ok(format!("[{}]", index)).into());
    }
    outputs.push(check_status(interface, &params).into());
    if let Some(mac) = &interface.mac {
        outputs.push(CheckResult::ok(format!("MAC: {}", mac)).into());
    }
    let expected_speed = params.speed.or(params.discovered_speed);
    outputs.push(check_speed(interface, expected_speed).into());

    // down interfaces may report stale or reset counters
    if interface.oper_status == OPER_DOWN {
        return Ok(outputs);
    }

    let now = ctx.now;
    let counters = [
        ("in_octets", interface.in_octets),
        ("out_octets", interface.out_octets),
        ("in_ucast", interface.in_ucast),
        ("out_ucast", interface.out_ucast),
        ("in_errors", interface.in_errors),
        ("out_errors", interface.out_errors),
    ];
    let mut rates = [0.0; 6];
    let mut first_error = None;
    for ((key, value), rate) in counters.iter().zip(rates.iter_mut()) {
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
    let [in_octets, out_octets, in_ucast, out_ucast, in_errors, out_errors] = rates;

    // octets per second at full link speed
    let link_bytes = [interface.speed, expected_speed.unwrap_or(0.0)]
        .into_iter()
        .find(|speed| *speed > 0.0)
        .map(|speed| speed / 8.0);

    for (title, metric, rate) in [("In", "in", in_octets), ("Out", "out", out_octets)] {
        let levels = ctx.levels(&params.traffic, metric, link_bytes);
        match params.average {
            Some(minutes) => {
                let key = format!("{}.avg", metric);
                let average = get_average(&mut ctx.value_store, &key, now, rate, minutes);
                let label = format!("{} average {}min", title, minutes);
                outputs.extend(check_levels(
                    average,
                    &levels,
                    &CheckLevels::new(render::iobandwidth).label(&label).at(now),
                ));
                let mut metric = Metric::new(metric, rate);
                metric.boundaries = link_bytes.map(|max| (0.0, max));
                outputs.push(metric.into());
            }
            None => {
                let mut options = CheckLevels::new(render::iobandwidth)
                    .label(title)
                    .metric(metric)
                    .at(now);
                if let Some(max) = link_bytes {
                    options = options.boundaries(0.0, max);
                }
                outputs.extend(check_levels(rate, &levels, &options));
            }
        }
    }

    let error_levels = ctx.levels(&params.errors, "errors", None);
    for (title, errors, packets) in [
        ("Input error rate", in_errors, in_ucast),
        ("Output error rate", out_errors, out_ucast),
    ] {
        let percentage = error_percentage(errors, packets);
        outputs.extend(check_levels(
            percentage,
            &error_levels,
            &CheckLevels::new(render::percent).label(title),
        ));
    }
    outputs.push(Metric::new("inerr", in_errors).into());
    outputs.push(Metric::new("outerr", out_errors).into());
    outputs.push(Metric::new("inucast", in_ucast).into());
    outputs.push(Metric::new("outucast", out_ucast).into());

    if matches!(params.traffic, LevelsParam::Percentage(..)) && link_bytes.is_none() {
        outputs.push(CheckResult::ok("No speed known, bandwidth levels not applied").into());
    }

    Ok(outputs)
}

pub fn section_plugins() -> Vec<SectionPlugin> {
    vec![
        SectionPlugin::new("if", parse_if).parsed_as("interfaces"),
        SectionPlugin::new("lnx_if", parse_lnx_if)
            .parsed_as("interfaces")
            .supersedes(&["if"]),
    ]
}

pub fn check_plugin() -> CheckPlugin {
    CheckPlugin::new(
        "interfaces",
        "Interface %s",
        &["interfaces"],
        discover_interfaces,
        check_interfaces,
    )
    .discovery_defaults(default_params::<InterfaceDiscoveryParams>())
    .discovery_ruleset("inventory_if_rules")
    .check_defaults(default_params::<InterfaceParams>())
    .check_ruleset("if")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::tests::table;

    fn if_table() -> StringTable {
        table(&[
            &["1", "lo", "24", "0", "1", "100", "1", "0", "100", "1", "0"],
            &["2", "eth0", "6", "1000000000", "1", "1000", "10", "0", "2000", "20", "0"],
            &["3", "eth1", "6", "100000000", "2", "0", "0", "0", "0", "0", "0"],
            &["4", "broken", "x"],
        ])
    }

    fn if_section(in_octets: &str, in_ucast: &str, in_errors: &str) -> Section {
        parse_if(&table(&[&[
            "2", "eth0", "6", "1000000000", "1", in_octets, in_ucast, in_errors, "0", "0", "0",
        ]]))
        .unwrap()
    }

    fn interfaces(section: &Section) -> &InterfaceSection {
        match section {
            Section::Interfaces(interfaces) => interfaces,
            other => panic!("unexpected section {:?}", other),
        }
    }

    fn find_result<'a>(outputs: &'a [CheckOutput], prefix: &str) -> &'a CheckResult {
        outputs
            .iter()
            .filter_map(CheckOutput::as_result)
            .find(|r| r.summary.starts_with(prefix))
            .unwrap()
    }

    #[test]
    fn test_parse_if() {
        let section = parse_if(&if_table()).unwrap();
        let parsed = interfaces(&section);
        assert_eq!(parsed.interfaces.len(), 3);
        let eth0 = &parsed.interfaces["eth0"];
        assert_eq!(eth0.index, Some(2));
        assert_eq!(eth0.speed, 1e9);
        assert!(eth0.is_up());
        assert!(parsed.interfaces["lo"].is_loopback());
    }

    #[test]
    fn test_parse_skips_non_finite_counters() {
        let section = parse_if(&table(&[
            &["2", "eth0", "6", "1000000000", "1", "inf", "10", "0", "2000", "20", "0"],
            &["3", "eth1", "6", "nan", "1", "1000", "10", "0", "2000", "20", "0"],
        ]))
        .unwrap();
        let parsed = interfaces(&section);
        assert_eq!(parsed.interfaces.keys().collect::<Vec<_>>(), vec!["eth1"]);
        assert_eq!(parsed.interfaces["eth1"].speed, 0.0);

        assert!(parse_lnx_if(&table(&[&[
            "eth0:", "NaN", "12", "0", "0", "0", "0", "0", "0", "2145", "20", "0", "0", "0", "0", "0", "0",
        ]]))
        .is_none());
    }

    #[test]
    fn test_parse_lnx_if() {
        let section = parse_lnx_if(&table(&[
            &["lo:", "100", "1", "0", "0", "0", "0", "0", "0", "100", "1", "0", "0", "0", "0", "0", "0"],
            &["eth0:1093", "12", "1", "0", "0", "0", "0", "0", "2145", "20", "2", "0", "0", "0", "0", "0"],
            &["eth1:", "0", "0", "0", "0", "0", "0", "0", "0", "0", "0", "0", "0", "0", "0", "0", "0"],
            &["[eth0]"],
            &["Speed:", "1000Mb/s"],
            &["Link", "detected:", "yes"],
            &["Address:", "00:1a:4b:aa:bb:cc"],
            &["[eth1]"],
            &["Speed:", "Unknown!"],
            &["Link", "detected:", "no"],
        ]))
        .unwrap();
        let parsed = interfaces(&section);
        let eth0 = &parsed.interfaces["eth0"];
        assert_eq!(eth0.in_octets, 1093.0);
        assert_eq!(eth0.in_errors, 1.0);
        assert_eq!(eth0.out_octets, 2145.0);
        assert_eq!(eth0.out_errors, 2.0);
        assert_eq!(eth0.speed, 1e9);
        assert_eq!(eth0.mac.as_deref(), Some("00:1a:4b:aa:bb:cc"));
        assert!(eth0.is_up());
        assert_eq!(parsed.interfaces["eth1"].oper_status, OPER_DOWN);
        assert_eq!(parsed.interfaces["eth1"].speed, 0.0);
        // no ethtool block, but traffic
        assert!(parsed.interfaces["lo"].is_up());
        assert!(parsed.interfaces["lo"].is_loopback());
    }

    #[test]
    fn test_discovery_defaults_skip_loopback_and_down() {
        let section = parse_if(&if_table()).unwrap();
        let sections = SectionSet::single(&["interfaces"], &section);
        let services = discover_interfaces(&json!({}), &sections).unwrap();
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].item.as_deref(), Some("eth0"));
        assert_eq!(services[0].parameters["discovered_speed"], json!(1e9));
        assert_eq!(services[0].parameters["discovered_oper_status"], json!(1));

        let services = discover_interfaces(
            &json!({"include_loopback": true, "discover_down": true}),
            &sections,
        )
        .unwrap();
        assert_eq!(services.len(), 3);
    }

    #[test]
    fn test_traffic_relative_to_speed() {
        let mut ctx = CheckContext::detached("interfaces", Some("eth0"), 100.0);
        let params = json!({"discovered_speed": 1e9, "discovered_oper_status": 1});

        let first = if_section("0", "0", "0");
        let sections = SectionSet::single(&["interfaces"], &first);
        assert!(matches!(
            check_interfaces(Some("eth0"), &params, &sections, &mut ctx),
            Err(CheckError::IgnoreResults(_))
        ));

        // 1 GBit/s = 125 MB/s; 850 MB in 8 seconds is 85%
        ctx.now = 108.0;
        let second = if_section("850000000", "1000", "0");
        let sections = SectionSet::single(&["interfaces"], &second);
        let outputs = check_interfaces(Some("eth0"), &params, &sections, &mut ctx).unwrap();

        let traffic = find_result(&outputs, "In:");
        assert_eq!(traffic.state, State::Warn);
        assert!(traffic.summary.starts_with("In: 85.00% - 106.25 MB/s of 125.00 MB/s"));
        assert!(traffic.summary.ends_with("(warn/crit at 80.00%/90.00%)"));

        let metric = outputs
            .iter()
            .filter_map(CheckOutput::as_metric)
            .find(|m| m.name == "in")
            .unwrap();
        assert_eq!(metric.value, 106_250_000.0);
        assert_eq!(metric.boundaries, Some((0.0, 125_000_000.0)));
        assert_eq!(find_result(&outputs, "Operational state").state, State::Ok);
    }

    #[test]
    fn test_error_rate_levels() {
        let mut ctx = CheckContext::detached("interfaces", Some("eth0"), 0.0);
        let params = json!({});
        let first = if_section("0", "0", "0");
        let sections = SectionSet::single(&["interfaces"], &first);
        assert!(check_interfaces(Some("eth0"), &params, &sections, &mut ctx).is_err());

        ctx.now = 10.0;
        let second = if_section("1000", "900", "100");
        let sections = SectionSet::single(&["interfaces"], &second);
        let outputs = check_interfaces(Some("eth0"), &params, &sections, &mut ctx).unwrap();
        let errors = find_result(&outputs, "Input error rate");
        assert_eq!(errors.state, State::Crit);
        assert!(errors.summary.starts_with("Input error rate: 10.00%"));
    }

    #[test]
    fn test_down_interface_reports_state_only() {
        let section = parse_if(&if_table()).unwrap();
        let sections = SectionSet::single(&["interfaces"], &section);
        let mut ctx = CheckContext::detached("interfaces", Some("eth1"), 0.0);
        let params = json!({"discovered_oper_status": 1, "discovered_speed": 1e8});
        let outputs = check_interfaces(Some("eth1"), &params, &sections, &mut ctx).unwrap();

        assert_eq!(find_result(&outputs, "Operational state").state, State::Crit);
        assert_eq!(find_result(&outputs, "Speed").summary, "Speed: 100 MBit/s");
        assert!(outputs.iter().all(|o| o.as_metric().is_none()));
        assert_eq!(ctx.value_store.staged_len(), 0);
    }

    #[test]
    fn test_speed_mismatch_warns() {
        let interface = Interface {
            speed: 1e8,
            ..Default::default()
        };
        let result = check_speed(&interface, Some(1e9));
        assert_eq!(result.state, State::Warn);
        assert_eq!(result.summary, "Speed: 100 MBit/s (expected: 1 GBit/s)");
    }
}
