use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

pub fn validate_identifier_value(kind: &str, value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err(format!("{kind} must be non-empty"));
    }
    if value
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '.' || ch == '-' || ch == '_')
    {
        return Ok(());
    }
    Err(format!(
        "{kind} must use only ASCII letters, digits, '.', '-' or '_'"
    ))
}

/// Capability identifiers are dot-separated ASCII alphanumeric segments with
/// at least two segments and a letter as the very first character.
pub fn validate_capability_value(value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err("capability id must be non-empty".to_string());
    }
    if !value.starts_with(|ch: char| ch.is_ascii_alphabetic()) {
        return Err("capability id must start with an ASCII letter".to_string());
    }
    let segments = value.split('.').collect::<Vec<_>>();
    if segments.len() < 2 {
        return Err("capability id must contain at least two dot-separated segments".to_string());
    }
    if segments
        .iter()
        .any(|segment| segment.is_empty() || !segment.chars().all(|ch| ch.is_ascii_alphanumeric()))
    {
        return Err("capability id segments must be non-empty ASCII alphanumerics".to_string());
    }
    Ok(())
}

pub fn validate_path_segment(value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err("path segment must be non-empty".to_string());
    }
    if value
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
    {
        return Ok(());
    }
    Err(format!(
        "path segment `{value}` must use only ASCII letters, digits, '-' or '_'"
    ))
}

macro_rules! define_id_type {
    ($name:ident, $kind:literal, $validate:path) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn parse(raw: &str) -> Result<Self, String> {
                $validate(raw)?;
                Ok(Self(raw.to_string()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                self.as_str()
            }
        }

        impl TryFrom<String> for $name {
            type Error = String;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(&value)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                let raw = String::deserialize(deserializer)?;
                Self::parse(&raw).map_err(|reason| {
                    D::Error::custom(format!("{} `{raw}` is invalid: {reason}", $kind))
                })
            }
        }
    };
}

fn validate_step_type(raw: &str) -> Result<(), String> {
    validate_identifier_value("step type", raw)
}

fn validate_owner(raw: &str) -> Result<(), String> {
    validate_identifier_value("owner id", raw)
}

define_id_type!(StepTypeId, "step type", validate_step_type);
define_id_type!(OwnerId, "owner id", validate_owner);
define_id_type!(CapabilityId, "capability id", validate_capability_value);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_ids_require_two_segments() {
        assert!(CapabilityId::parse("Identity.Disable").is_ok());
        assert!(CapabilityId::parse("X.Read").is_ok());
        assert!(CapabilityId::parse("Identity").is_err());
        assert!(CapabilityId::parse("Identity..Read").is_err());
        assert!(CapabilityId::parse("1Identity.Read").is_err());
        assert!(CapabilityId::parse("Identity.Re ad").is_err());
    }

    #[test]
    fn path_segments_reject_punctuation() {
        assert!(validate_path_segment("DesiredState").is_ok());
        assert!(validate_path_segment("given_name").is_ok());
        assert!(validate_path_segment("a.b").is_err());
        assert!(validate_path_segment("").is_err());
    }
}
