//! JVM instances reachable through Jolokia
//!
//! Rows are `[instance, product..., version, agent version]`. When the agent
//! fails to query an instance it writes `[instance, "ERROR", message...]`.

use super::{default_params, parse_params};
use crate::context::CheckContext;
use crate::error::CheckError;
use crate::models::{CheckOutput, CheckResult, DiscoveredService, Params, State, StringTable};
use crate::registry::{CheckPlugin, SectionPlugin};
use crate::section::{Section, SectionSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub enum JolokiaInstance {
    Info {
        product: String,
        version: String,
        agent_version: String,
    },
    Error(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct JolokiaInfoSection {
    pub instances: BTreeMap<String, JolokiaInstance>,
}

fn parse_row(row: &[String]) -> Option<(String, JolokiaInstance)> {
    let (instance, rest) = row.split_first()?;
    let parsed = match rest {
        [marker, message @ ..] if marker == "ERROR" => JolokiaInstance::Error(message.join(" ")),
        [product @ .., version, agent_version] if !product.is_empty() => JolokiaInstance::Info {
            product: product.join(" "),
            version: version.clone(),
            agent_version: agent_version.clone(),
        },
        _ => return None,
    };
    Some((instance.clone(), parsed))
}

pub fn parse_jolokia_info(table: &StringTable) -> Option<Section> {
    let instances: BTreeMap<String, JolokiaInstance> =
        table.iter().filter_map(|row| parse_row(row)).collect();
    if instances.is_empty() {
        return None;
    }
    Some(Section::JolokiaInfo(JolokiaInfoSection { instances }))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JolokiaInfoParams {
    /// State of a failed login, other agent errors are UNKNOWN
    pub login_failed_state: State,
}

impl Default for JolokiaInfoParams {
    fn default() -> Self {
        Self {
            login_failed_state: State::Crit,
        }
    }
}

fn is_login_failure(message: &str) -> bool {
    message.contains("401") || message.contains("Unauthorized") || message.contains("Login failed")
}

fn discover_jolokia_info(
    _params: &Params,
    sections: &SectionSet<'_>,
) -> Result<Vec<DiscoveredService>, CheckError> {
    let Some(section) = sections.typed::<JolokiaInfoSection>(0)? else {
        return Ok(vec![]);
    };
    Ok(section
        .instances
        .keys()
        .map(|instance| DiscoveredService::with_item(instance.clone()))
        .collect())
}

fn check_jolokia_info(
    item: Option<&str>,
    params: &Params,
    sections: &SectionSet<'_>,
    _ctx: &mut CheckContext,
) -> Result<Vec<CheckOutput>, CheckError> {
    let params: JolokiaInfoParams = parse_params(params)?;
    let Some(section) = sections.typed::<JolokiaInfoSection>(0)? else {
        return Ok(vec![]);
    };
    let Some(instance) = item.and_then(|item| section.instances.get(item)) else {
        return Ok(vec![]);
    };

    let result = match instance {
        JolokiaInstance::Info {
            product,
            version,
            agent_version,
        } => CheckResult::ok(format!(
            "{} {} (Jolokia version {})",
            product, version, agent_version
        )),
        JolokiaInstance::Error(message) if is_login_failure(message) => CheckResult::new(
            params.login_failed_state,
            format!("Login failed: {}", message),
        ),
        JolokiaInstance::Error(message) if message.is_empty() => {
            CheckResult::new(State::Unknown, "Unknown error in agent plugin")
        }
        JolokiaInstance::Error(message) => CheckResult::new(State::Unknown, message.clone()),
    };
    Ok(vec![result.into()])
}

pub fn section_plugin() -> SectionPlugin {
    SectionPlugin::new("jolokia_info", parse_jolokia_info)
}

pub fn check_plugin() -> CheckPlugin {
    CheckPlugin::new(
        "jolokia_info",
        "JVM %s",
        &["jolokia_info"],
        discover_jolokia_info,
        check_jolokia_info,
    )
    .check_defaults(default_params::<JolokiaInfoParams>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::tests::table;
    use serde_json::json;

    fn section() -> Section {
        parse_jolokia_info(&table(&[
            &["tomcat", "tomcat", "9.0.41", "1.6.2"],
            &["jboss", "JBoss", "EAP", "7.2", "1.3.7"],
            &["secured", "ERROR", "HTTP", "Error", "401", "Unauthorized"],
            &["broken", "ERROR", "Connection", "refused"],
            &["short", "x"],
        ]))
        .unwrap()
    }

    fn check(item: &str, params: Params) -> CheckResult {
        let section = section();
        let sections = SectionSet::single(&["jolokia_info"], &section);
        let mut ctx = CheckContext::detached("jolokia_info", Some(item), 0.0);
        let outputs = check_jolokia_info(Some(item), &params, &sections, &mut ctx).unwrap();
        outputs[0].as_result().unwrap().clone()
    }

    #[test]
    fn test_parse_product_with_spaces() {
        let Section::JolokiaInfo(parsed) = section() else {
            panic!("wrong section type");
        };
        assert_eq!(parsed.instances.len(), 4);
        assert_eq!(
            parsed.instances["jboss"],
            JolokiaInstance::Info {
                product: "JBoss EAP".to_string(),
                version: "7.2".to_string(),
                agent_version: "1.3.7".to_string(),
            }
        );
    }

    #[test]
    fn test_info_is_ok() {
        let result = check("tomcat", json!({}));
        assert_eq!(result.state, State::Ok);
        assert_eq!(result.summary, "tomcat 9.0.41 (Jolokia version 1.6.2)");
    }

    #[test]
    fn test_agent_errors() {
        let login = check("secured", json!({}));
        assert_eq!(login.state, State::Crit);
        assert_eq!(login.summary, "Login failed: HTTP Error 401 Unauthorized");

        let relaxed = check("secured", json!({"login_failed_state": "WARN"}));
        assert_eq!(relaxed.state, State::Warn);

        let broken = check("broken", json!({}));
        assert_eq!(broken.state, State::Unknown);
        assert_eq!(broken.summary, "Connection refused");
    }

    #[test]
    fn test_erroring_instances_are_discovered() {
        let section = section();
        let sections = SectionSet::single(&["jolokia_info"], &section);
        let services = discover_jolokia_info(&json!({}), &sections).unwrap();
        assert_eq!(services.len(), 4);
    }
}
