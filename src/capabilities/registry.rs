use crate::shared::ids::{CapabilityId, OwnerId, StepTypeId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Owner name reported when a host-level supplement collides with a catalog.
pub const HOST_SUPPLEMENT_OWNER: &str = "Host";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("step type `{step_type}` has no metadata owner (referenced by steps: {})", steps.join(", "))]
    MissingStepTypeMetadata {
        step_type: String,
        steps: Vec<String>,
    },
    #[error("step type `{step_type}` is claimed by more than one owner: {}", owners.join(", "))]
    DuplicateStepTypeMetadata {
        step_type: String,
        owners: Vec<String>,
    },
    #[error("owner `{owner}` declares invalid capability `{capability}` for step type `{step_type}`: {reason}")]
    InvalidCapability {
        owner: String,
        step_type: String,
        capability: String,
        reason: String,
    },
    #[error("invalid metadata owner `{owner}`: {reason}")]
    InvalidOwner { owner: String, reason: String },
    #[error("owner `{owner}` declares invalid step type `{step_type}`: {reason}")]
    InvalidStepType {
        owner: String,
        step_type: String,
        reason: String,
    },
    #[error("owner `{owner}` registered more than once")]
    DuplicateOwner { owner: String },
}

/// Metadata a step pack contributes for one step type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "PascalCase")]
pub struct StepMetadata {
    #[serde(default)]
    pub required_capabilities: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl StepMetadata {
    pub fn requiring<I, S>(capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            required_capabilities: capabilities.into_iter().map(Into::into).collect(),
            description: None,
        }
    }
}

/// Step type name to metadata, as contributed by one owner.
pub type StepMetadataCatalog = BTreeMap<String, StepMetadata>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedStepMetadata {
    pub owner: String,
    pub required_capabilities: Vec<CapabilityId>,
    pub description: Option<String>,
}

/// Explicitly registered step-pack catalogs. Nothing is discovered implicitly:
/// the host registers each pack it loads.
#[derive(Debug, Clone, Default)]
pub struct StepMetadataRegistry {
    catalogs: BTreeMap<OwnerId, BTreeMap<StepTypeId, ResolvedStepMetadata>>,
}

impl StepMetadataRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        owner: &str,
        catalog: StepMetadataCatalog,
    ) -> Result<&mut Self, RegistryError> {
        let owner_id = OwnerId::parse(owner).map_err(|reason| RegistryError::InvalidOwner {
            owner: owner.to_string(),
            reason,
        })?;
        if self.catalogs.contains_key(&owner_id) {
            return Err(RegistryError::DuplicateOwner {
                owner: owner.to_string(),
            });
        }
        let entries = validate_catalog(owner, catalog)?;
        self.catalogs.insert(owner_id, entries);
        Ok(self)
    }

    pub fn with_catalog(
        mut self,
        owner: &str,
        catalog: StepMetadataCatalog,
    ) -> Result<Self, RegistryError> {
        self.register(owner, catalog)?;
        Ok(self)
    }

    pub fn owners(&self) -> impl Iterator<Item = &str> {
        self.catalogs.keys().map(OwnerId::as_str)
    }

    /// Merges every catalog in ascending owner order, then layers the host
    /// supplement on top. The supplement may only add types no owner claims.
    pub fn merge(
        &self,
        supplement: Option<&StepMetadataCatalog>,
    ) -> Result<MergedStepMetadata, RegistryError> {
        let mut merged: BTreeMap<StepTypeId, ResolvedStepMetadata> = BTreeMap::new();
        for entries in self.catalogs.values() {
            for (step_type, metadata) in entries {
                if let Some(existing) = merged.get(step_type) {
                    return Err(RegistryError::DuplicateStepTypeMetadata {
                        step_type: step_type.to_string(),
                        owners: vec![existing.owner.clone(), metadata.owner.clone()],
                    });
                }
                merged.insert(step_type.clone(), metadata.clone());
            }
        }

        if let Some(supplement) = supplement {
            for (step_type, metadata) in validate_catalog(HOST_SUPPLEMENT_OWNER, supplement.clone())? {
                if let Some(existing) = merged.get(&step_type) {
                    return Err(RegistryError::DuplicateStepTypeMetadata {
                        step_type: step_type.to_string(),
                        owners: vec![existing.owner.clone(), HOST_SUPPLEMENT_OWNER.to_string()],
                    });
                }
                merged.insert(step_type, metadata);
            }
        }

        Ok(MergedStepMetadata { entries: merged })
    }
}

fn validate_catalog(
    owner: &str,
    catalog: StepMetadataCatalog,
) -> Result<BTreeMap<StepTypeId, ResolvedStepMetadata>, RegistryError> {
    let mut entries = BTreeMap::new();
    for (step_type, metadata) in catalog {
        let step_type_id =
            StepTypeId::parse(&step_type).map_err(|reason| RegistryError::InvalidStepType {
                owner: owner.to_string(),
                step_type: step_type.clone(),
                reason,
            })?;
        let mut required = Vec::with_capacity(metadata.required_capabilities.len());
        for capability in &metadata.required_capabilities {
            let id = CapabilityId::parse(capability.trim()).map_err(|reason| {
                RegistryError::InvalidCapability {
                    owner: owner.to_string(),
                    step_type: step_type.clone(),
                    capability: capability.clone(),
                    reason,
                }
            })?;
            if !required.contains(&id) {
                required.push(id);
            }
        }
        required.sort();
        entries.insert(
            step_type_id,
            ResolvedStepMetadata {
                owner: owner.to_string(),
                required_capabilities: required,
                description: metadata.description,
            },
        );
    }
    Ok(entries)
}

/// Result of a successful merge; answers step-type lookups for one build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergedStepMetadata {
    entries: BTreeMap<StepTypeId, ResolvedStepMetadata>,
}

impl MergedStepMetadata {
    pub fn get(&self, step_type: &str) -> Option<&ResolvedStepMetadata> {
        self.entries.get(step_type)
    }

    pub fn resolve<'a, I>(
        &self,
        step_type: &StepTypeId,
        referencing_steps: I,
    ) -> Result<&ResolvedStepMetadata, RegistryError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.entries
            .get(step_type)
            .ok_or_else(|| RegistryError::MissingStepTypeMetadata {
                step_type: step_type.to_string(),
                steps: referencing_steps.into_iter().map(str::to_string).collect(),
            })
    }

    pub fn step_types(&self) -> impl Iterator<Item = &StepTypeId> {
        self.entries.keys()
    }
}
