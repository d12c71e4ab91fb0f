//! Service configuration.
//!
//! Services are described in a YAML file (`services:` list). Without one the
//! built-in catalogue is used.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use wms_common::ServiceKind;

/// One map service endpoint. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub kind: ServiceKind,
    pub base_url: String,

    /// Path below the base URL for WMS requests
    #[serde(default)]
    pub path: String,

    /// How far behind real time the service publishes
    #[serde(default = "default_response_delay")]
    pub response_delay_secs: i64,

    /// Floor for time dimension periods (polling cadence)
    #[serde(default = "default_min_period")]
    pub min_period_secs: i64,

    /// Roll advertised future instants back to the newest past one
    #[serde(default)]
    pub prefer_current_time: bool,

    /// REST discovery filter
    #[serde(default = "default_search")]
    pub search: String,

    /// REST discovery time window
    #[serde(default = "default_timespan")]
    pub timespan: String,
}

fn default_response_delay() -> i64 {
    600
}

fn default_min_period() -> i64 {
    600
}

fn default_search() -> String {
    "global".to_string()
}

fn default_timespan() -> String {
    "-6h".to_string()
}

impl ServiceConfig {
    fn builtin(name: &str, kind: ServiceKind, base_url: &str, path: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            base_url: base_url.to_string(),
            path: path.to_string(),
            response_delay_secs: default_response_delay(),
            min_period_secs: default_min_period(),
            prefer_current_time: false,
            search: default_search(),
            timespan: default_timespan(),
        }
    }
}

/// Root of a services YAML file.
#[derive(Debug, Clone, Deserialize)]
pub struct ServicesFile {
    pub services: Vec<ServiceConfig>,
}

/// Services known without any configuration file.
pub fn builtin_services() -> Vec<ServiceConfig> {
    let mut eumetsat = ServiceConfig::builtin(
        "EUMETSAT",
        ServiceKind::Wms,
        "https://view.eumetsat.int",
        "geoserver/ows",
    );
    // EUMETView advertises instants ahead of what it can render
    eumetsat.prefer_current_time = true;

    vec![
        ServiceConfig::builtin(
            "RealEarth",
            ServiceKind::Rest,
            "https://realearth.ssec.wisc.edu/",
            "",
        ),
        ServiceConfig::builtin(
            "DeutscherWetterDienst",
            ServiceKind::Wms,
            "https://maps.dwd.de",
            "geoserver/ows",
        ),
        eumetsat,
    ]
}

/// Load services from a YAML file.
pub fn load_services_file(path: &Path) -> Result<Vec<ServiceConfig>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let file: ServicesFile = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

    debug!(path = %path.display(), count = file.services.len(), "Loaded services config");
    Ok(file.services)
}

/// Services from `path` if it exists, the built-in catalogue otherwise.
pub fn load_services(path: Option<&Path>) -> Result<Vec<ServiceConfig>> {
    match path {
        Some(path) if path.exists() => {
            let services = load_services_file(path)?;
            info!(count = services.len(), path = %path.display(), "Using configured services");
            Ok(services)
        }
        Some(path) => {
            warn!(path = %path.display(), "Config file not found, using built-in services");
            Ok(builtin_services())
        }
        None => Ok(builtin_services()),
    }
}

/// Pick a service by name, ignoring case.
pub fn select_service(services: &[ServiceConfig], name: &str) -> Result<ServiceConfig> {
    services
        .iter()
        .find(|s| s.name.eq_ignore_ascii_case(name))
        .cloned()
        .ok_or_else(|| {
            let known: Vec<&str> = services.iter().map(|s| s.name.as_str()).collect();
            anyhow!("Unknown service '{}', known: {}", name, known.join(", "))
        })
}
