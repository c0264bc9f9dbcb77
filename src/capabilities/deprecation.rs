use crate::shared::ids::CapabilityId;
use std::collections::BTreeMap;

/// Deprecated identifiers shipped with the engine, mapped to their
/// replacement. Removal is scheduled for the next major version.
pub const BUILTIN_DEPRECATED_CAPABILITIES: &[(&str, &str)] = &[
    ("Mailbox.Read", "Mailbox.Info.Read"),
    ("Identity.Attribute.Set", "Identity.Attribute.Ensure"),
    ("Entitlement.Grant", "Entitlement.Write"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeprecationTable {
    remaps: BTreeMap<CapabilityId, CapabilityId>,
}

impl Default for DeprecationTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl DeprecationTable {
    pub fn builtin() -> Self {
        let remaps = BUILTIN_DEPRECATED_CAPABILITIES
            .iter()
            .filter_map(|(deprecated, current)| {
                Some((
                    CapabilityId::parse(deprecated).ok()?,
                    CapabilityId::parse(current).ok()?,
                ))
            })
            .collect();
        Self { remaps }
    }

    /// Layers host-configured remaps on top of the built-in table. Hosts can
    /// add entries but never change or remove a built-in one.
    pub fn with_additional(
        mut self,
        additional: &BTreeMap<String, String>,
    ) -> Result<Self, String> {
        for (deprecated, current) in additional {
            let deprecated_id = CapabilityId::parse(deprecated.trim())
                .map_err(|err| format!("deprecated capability `{deprecated}`: {err}"))?;
            let current_id = CapabilityId::parse(current.trim())
                .map_err(|err| format!("replacement capability `{current}`: {err}"))?;
            if deprecated_id == current_id {
                return Err(format!("capability `{deprecated}` cannot be remapped onto itself"));
            }
            if let Some(existing) = self.remaps.get(&deprecated_id) {
                if existing != &current_id {
                    return Err(format!(
                        "capability `{deprecated}` is already remapped to `{existing}`"
                    ));
                }
            }
            self.remaps.insert(deprecated_id, current_id);
        }

        for (deprecated, current) in &self.remaps {
            if self.remaps.contains_key(current) {
                return Err(format!(
                    "remap `{deprecated}` -> `{current}` points at another deprecated capability"
                ));
            }
        }
        Ok(self)
    }

    pub fn replacement(&self, capability: &CapabilityId) -> Option<&CapabilityId> {
        self.remaps.get(capability)
    }

    pub fn len(&self) -> usize {
        self.remaps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.remaps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chained_remaps_are_rejected() {
        let additional = BTreeMap::from([(
            "Mailbox.Legacy".to_string(),
            "Mailbox.Read".to_string(),
        )]);
        let err = DeprecationTable::builtin()
            .with_additional(&additional)
            .expect_err("chain");
        assert!(err.contains("another deprecated capability"));
    }

    #[test]
    fn builtin_entries_cannot_be_redirected() {
        let additional = BTreeMap::from([(
            "Mailbox.Read".to_string(),
            "Mailbox.Everything".to_string(),
        )]);
        assert!(DeprecationTable::builtin().with_additional(&additional).is_err());
    }
}
