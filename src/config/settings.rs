use super::ConfigError;
use crate::capabilities::deprecation::DeprecationTable;
use crate::redaction::Redactor;
use crate::security::{SecurityGate, DEFAULT_MAX_DATA_DEPTH};
use crate::shared::logging::EngineLog;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RedactionSettings {
    #[serde(default)]
    pub additional_keys: Vec<String>,
}

/// Host-level engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EngineSettings {
    #[serde(default)]
    pub deprecated_capabilities: BTreeMap<String, String>,
    #[serde(default)]
    pub redaction: RedactionSettings,
    #[serde(default)]
    pub log_path: Option<PathBuf>,
    #[serde(default = "default_max_data_depth")]
    pub max_data_depth: usize,
}

fn default_max_data_depth() -> usize {
    DEFAULT_MAX_DATA_DEPTH
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            deprecated_capabilities: BTreeMap::new(),
            redaction: RedactionSettings::default(),
            log_path: None,
            max_data_depth: DEFAULT_MAX_DATA_DEPTH,
        }
    }
}

impl EngineSettings {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_data_depth == 0 {
            return Err(ConfigError::Settings(
                "`max_data_depth` must be at least 1".to_string(),
            ));
        }

        let mut keys = HashSet::new();
        for key in &self.redaction.additional_keys {
            if key.trim().is_empty() {
                return Err(ConfigError::Settings(
                    "`redaction.additional_keys` entries must be non-empty".to_string(),
                ));
            }
            if !keys.insert(key.trim().to_ascii_lowercase()) {
                return Err(ConfigError::Settings(format!(
                    "`redaction.additional_keys` lists `{key}` more than once"
                )));
            }
        }

        if let Some(log_path) = self.log_path.as_ref() {
            if log_path.as_os_str().is_empty() {
                return Err(ConfigError::Settings(
                    "`log_path` must be non-empty when set".to_string(),
                ));
            }
        }

        self.deprecation_table()?;
        Ok(())
    }

    pub fn deprecation_table(&self) -> Result<DeprecationTable, ConfigError> {
        DeprecationTable::builtin()
            .with_additional(&self.deprecated_capabilities)
            .map_err(|err| ConfigError::Settings(format!("`deprecated_capabilities`: {err}")))
    }

    pub fn redactor(&self) -> Redactor {
        Redactor::default().with_additional_keys(&self.redaction.additional_keys)
    }

    pub fn security_gate(&self) -> SecurityGate {
        SecurityGate::new(self.max_data_depth)
    }

    pub fn engine_log(&self) -> EngineLog {
        match self.log_path.as_ref() {
            Some(path) => EngineLog::to_file(path),
            None => EngineLog::disabled(),
        }
    }
}
