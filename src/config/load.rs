use super::{ConfigError, EngineSettings};
use crate::security::SecurityGate;
use serde_json::Value;
use std::fs;
use std::path::Path;

pub fn load_engine_settings(path: &Path) -> Result<EngineSettings, ConfigError> {
    let settings = EngineSettings::from_path(path)?;
    settings.validate()?;
    Ok(settings)
}

/// Reads a workflow definition file into the closed data model. Tagged YAML
/// nodes are rejected as executable content.
pub fn load_workflow_definition(path: &Path, gate: &SecurityGate) -> Result<Value, ConfigError> {
    load_untrusted_yaml(path, gate, "Workflow")
}

pub fn load_request(path: &Path, gate: &SecurityGate) -> Result<Value, ConfigError> {
    load_untrusted_yaml(path, gate, "Request")
}

fn load_untrusted_yaml(path: &Path, gate: &SecurityGate, root: &str) -> Result<Value, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let document: serde_yaml::Value =
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
    gate.admit_yaml(document, root)
        .map_err(|source| ConfigError::Security {
            path: path.display().to_string(),
            source,
        })
}
