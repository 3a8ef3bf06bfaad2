//! Built-in section and check plugins
//!
//! Each plugin module exposes its parse function(s) as section plugins and
//! its discovery/check pair as check plugins. [`register_builtin`] adds all
//! of them to a registry, sections first so that checks can refer to their
//! parsed section names.

pub mod cpu_loads;
pub mod diskstat;
pub mod interfaces;
pub mod jolokia_info;
pub mod juniper_cpu_util;
pub mod kernel;
pub mod mem;


use crate::error::{CheckError, RegistryError};
use crate::models::Params;
use crate::registry::{empty_params, Registry};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Parse a numeric agent field; `nan` and `inf` are rejected like any other garbage
pub(crate) fn parse_number(field: &str) -> Option<f64> {
    field.parse::<f64>().ok().filter(|value| value.is_finite())
}

/// Serialize a parameter struct's defaults for registration
pub(crate) fn default_params<T: Default + Serialize>() -> Params {
    serde_json::to_value(T::default()).unwrap_or_else(|_| empty_params())
}

/// Deserialize merged check parameters; unknown keys are ignored
pub(crate) fn parse_params<T: DeserializeOwned>(params: &Params) -> Result<T, CheckError> {
    Ok(serde_json::from_value(params.clone())?)
}

/// Register every built-in plugin
pub fn register_builtin(registry: &mut Registry) -> Result<(), RegistryError> {
    registry.register_section(kernel::section_plugin())?;
    registry.register_section(cpu_loads::section_plugin())?;
    registry.register_section(juniper_cpu_util::section_plugin())?;
    registry.register_section(diskstat::section_plugin())?;
    for plugin in interfaces::section_plugins() {
        registry.register_section(plugin)?;
    }
    registry.register_section(mem::section_plugin())?;
    registry.register_section(jolokia_info::section_plugin())?;

    for plugin in kernel::check_plugins() {
        registry.register_check(plugin)?;
    }
    registry.register_check(cpu_loads::check_plugin())?;
    registry.register_check(juniper_cpu_util::check_plugin())?;
    registry.register_check(diskstat::check_plugin())?;
    registry.register_check(interfaces::check_plugin())?;
    registry.register_check(mem::check_plugin())?;
    registry.register_check(jolokia_info::check_plugin())?;

    Ok(())
}
