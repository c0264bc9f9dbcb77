use super::deprecation::DeprecationTable;
use crate::shared::ids::CapabilityId;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityGap {
    pub missing: Vec<String>,
    pub affected_steps: Vec<String>,
    pub available: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapabilityError {
    #[error("missing capabilities: {} (affected steps: {}; available: {})",
        .0.missing.join(", "), .0.affected_steps.join(", "), display_list(&.0.available))]
    MissingCapabilities(CapabilityGap),
    #[error("provider `{provider}` advertises invalid capability `{capability}`: {reason}")]
    InvalidAdvertisedCapability {
        provider: String,
        capability: String,
        reason: String,
    },
    #[error("provider `{provider}` advertises capability `{capability}` more than once")]
    DuplicateAdvertisedCapability { provider: String, capability: String },
}

fn display_list(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}

/// Capabilities one step needs in order to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRequirement {
    pub step_name: String,
    pub capabilities: Vec<CapabilityId>,
}

/// Raw advertisement of one provider, as returned by the provider itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderAdvertisement {
    pub provider: String,
    pub capabilities: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityRemap {
    pub deprecated: String,
    pub replacement: String,
    pub source: String,
}

/// Record of a successful validation, embedded in the plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityValidation {
    pub required: Vec<String>,
    pub available: Vec<String>,
    pub remapped: Vec<CapabilityRemap>,
}

/// Checks that every required capability is advertised by some provider.
/// Deprecated identifiers on both sides are remapped before the comparison.
pub fn validate_capabilities(
    requirements: &[StepRequirement],
    advertisements: &[ProviderAdvertisement],
    deprecations: &DeprecationTable,
) -> Result<CapabilityValidation, CapabilityError> {
    let mut remapped = Vec::new();

    let mut available = BTreeSet::new();
    for advertisement in advertisements {
        let mut seen = BTreeSet::new();
        for raw in &advertisement.capabilities {
            let id = CapabilityId::parse(raw.trim()).map_err(|reason| {
                CapabilityError::InvalidAdvertisedCapability {
                    provider: advertisement.provider.clone(),
                    capability: raw.clone(),
                    reason,
                }
            })?;
            if !seen.insert(id.clone()) {
                return Err(CapabilityError::DuplicateAdvertisedCapability {
                    provider: advertisement.provider.clone(),
                    capability: raw.clone(),
                });
            }
            let source = format!("provider:{}", advertisement.provider);
            available.insert(remap(id, deprecations, &source, &mut remapped));
        }
    }

    let mut required: BTreeMap<CapabilityId, BTreeSet<String>> = BTreeMap::new();
    for requirement in requirements {
        let source = format!("step:{}", requirement.step_name);
        for id in &requirement.capabilities {
            let current = remap(id.clone(), deprecations, &source, &mut remapped);
            required
                .entry(current)
                .or_default()
                .insert(requirement.step_name.clone());
        }
    }

    let mut missing = Vec::new();
    let mut affected_steps = BTreeSet::new();
    for (capability, steps) in &required {
        if !available.contains(capability) {
            missing.push(capability.to_string());
            affected_steps.extend(steps.iter().cloned());
        }
    }

    let available = available
        .into_iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        return Err(CapabilityError::MissingCapabilities(CapabilityGap {
            missing,
            affected_steps: affected_steps.into_iter().collect(),
            available,
        }));
    }

    Ok(CapabilityValidation {
        required: required.into_keys().map(|id| id.to_string()).collect(),
        available,
        remapped,
    })
}

fn remap(
    id: CapabilityId,
    deprecations: &DeprecationTable,
    source: &str,
    remapped: &mut Vec<CapabilityRemap>,
) -> CapabilityId {
    let Some(replacement) = deprecations.replacement(&id) else {
        return id;
    };
    let entry = CapabilityRemap {
        deprecated: id.to_string(),
        replacement: replacement.to_string(),
        source: source.to_string(),
    };
    if !remapped.contains(&entry) {
        remapped.push(entry);
    }
    replacement.clone()
}
