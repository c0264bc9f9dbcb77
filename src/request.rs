use crate::security::{SecurityError, SecurityGate};
use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("request schema invalid: {0}")]
    Schema(String),
    #[error("request rejected by security gate: {0}")]
    Security(#[from] SecurityError),
    #[error("invalid correlation id `{value}`: {reason}")]
    InvalidCorrelationId { value: String, reason: String },
    #[error("failed to generate correlation id: {0}")]
    CorrelationIdGeneration(String),
}

const MAX_CORRELATION_ID_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn parse(raw: &str) -> Result<Self, RequestError> {
        let invalid = |reason: &str| RequestError::InvalidCorrelationId {
            value: raw.to_string(),
            reason: reason.to_string(),
        };
        if raw.trim().is_empty() {
            return Err(invalid("must be non-empty"));
        }
        if raw.len() > MAX_CORRELATION_ID_LEN {
            return Err(invalid("must be at most 128 characters"));
        }
        if raw
            .chars()
            .any(|ch| ch.is_whitespace() || ch.is_control())
        {
            return Err(invalid("must not contain whitespace or control characters"));
        }
        Ok(Self(raw.to_string()))
    }

    /// `corr-` followed by 128 random bits as lowercase hex.
    pub fn generate() -> Result<Self, RequestError> {
        let mut bytes = [0_u8; 16];
        getrandom::getrandom(&mut bytes)
            .map_err(|err| RequestError::CorrelationIdGeneration(err.to_string()))?;
        let hex = bytes
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect::<String>();
        Ok(Self(format!("corr-{hex}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Business intent for one lifecycle operation. Read-only once built; the
/// correlation id in particular can only be chosen at construction time.
#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleRequest {
    lifecycle_event: String,
    identity_keys: Map<String, Value>,
    desired_state: Map<String, Value>,
    changes: Map<String, Value>,
    actor: Option<String>,
    correlation_id: CorrelationId,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "PascalCase")]
struct LifecycleRequestRaw {
    lifecycle_event: String,
    #[serde(default)]
    identity_keys: Map<String, Value>,
    #[serde(default)]
    desired_state: Map<String, Value>,
    #[serde(default)]
    changes: Map<String, Value>,
    #[serde(default)]
    actor: Option<String>,
    #[serde(default)]
    correlation_id: Option<String>,
}

impl LifecycleRequest {
    pub fn builder(lifecycle_event: impl Into<String>) -> LifecycleRequestBuilder {
        LifecycleRequestBuilder {
            lifecycle_event: lifecycle_event.into(),
            identity_keys: Map::new(),
            desired_state: Map::new(),
            changes: Map::new(),
            actor: None,
            correlation_id: None,
        }
    }

    /// Builds a request from untrusted data: the value must pass the security
    /// gate and carry only the known request keys.
    pub fn from_value(value: &Value, gate: &SecurityGate) -> Result<Self, RequestError> {
        gate.validate(value, "Request")?;
        let raw: LifecycleRequestRaw = serde_json::from_value(value.clone())
            .map_err(|err| RequestError::Schema(err.to_string()))?;
        let mut builder = Self::builder(raw.lifecycle_event)
            .identity_keys(raw.identity_keys)
            .desired_state(raw.desired_state)
            .changes(raw.changes);
        if let Some(actor) = raw.actor {
            builder = builder.actor(actor);
        }
        if let Some(correlation_id) = raw.correlation_id {
            builder = builder.correlation_id(correlation_id);
        }
        builder.build()
    }

    pub fn lifecycle_event(&self) -> &str {
        &self.lifecycle_event
    }

    pub fn identity_keys(&self) -> &Map<String, Value> {
        &self.identity_keys
    }

    pub fn desired_state(&self) -> &Map<String, Value> {
        &self.desired_state
    }

    pub fn changes(&self) -> &Map<String, Value> {
        &self.changes
    }

    pub fn actor(&self) -> Option<&str> {
        self.actor.as_deref()
    }

    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    /// Data exposed under the `Request` root to templates and conditions.
    /// `Input` is an alias of `DesiredState`.
    pub fn scope_value(&self) -> Value {
        let mut root = Map::from_iter([
            (
                "LifecycleEvent".to_string(),
                Value::String(self.lifecycle_event.clone()),
            ),
            (
                "CorrelationId".to_string(),
                Value::String(self.correlation_id.to_string()),
            ),
            (
                "IdentityKeys".to_string(),
                Value::Object(self.identity_keys.clone()),
            ),
            (
                "DesiredState".to_string(),
                Value::Object(self.desired_state.clone()),
            ),
            (
                "Input".to_string(),
                Value::Object(self.desired_state.clone()),
            ),
            ("Changes".to_string(), Value::Object(self.changes.clone())),
        ]);
        if let Some(actor) = self.actor.as_ref() {
            root.insert("Actor".to_string(), Value::String(actor.clone()));
        }
        Value::Object(root)
    }
}

#[derive(Debug, Clone)]
pub struct LifecycleRequestBuilder {
    lifecycle_event: String,
    identity_keys: Map<String, Value>,
    desired_state: Map<String, Value>,
    changes: Map<String, Value>,
    actor: Option<String>,
    correlation_id: Option<String>,
}

impl LifecycleRequestBuilder {
    pub fn identity_keys(mut self, identity_keys: Map<String, Value>) -> Self {
        self.identity_keys = identity_keys;
        self
    }

    pub fn identity_key(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.identity_keys.insert(key.into(), value.into());
        self
    }

    pub fn desired_state(mut self, desired_state: Map<String, Value>) -> Self {
        self.desired_state = desired_state;
        self
    }

    pub fn desired(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.desired_state.insert(key.into(), value.into());
        self
    }

    pub fn changes(mut self, changes: Map<String, Value>) -> Self {
        self.changes = changes;
        self
    }

    pub fn actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn build(self) -> Result<LifecycleRequest, RequestError> {
        let lifecycle_event = self.lifecycle_event.trim().to_string();
        if lifecycle_event.is_empty() {
            return Err(RequestError::Schema(
                "`LifecycleEvent` must be non-empty".to_string(),
            ));
        }
        let actor = match self.actor {
            Some(actor) if actor.trim().is_empty() => {
                return Err(RequestError::Schema(
                    "`Actor` must be non-empty when present".to_string(),
                ))
            }
            other => other,
        };
        let correlation_id = match self.correlation_id {
            Some(raw) => CorrelationId::parse(&raw)?,
            None => CorrelationId::generate()?,
        };
        Ok(LifecycleRequest {
            lifecycle_event,
            identity_keys: self.identity_keys,
            desired_state: self.desired_state,
            changes: self.changes,
            actor,
            correlation_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_correlation_ids_are_prefixed_hex() {
        let id = CorrelationId::generate().expect("generate");
        let hex = id.as_str().strip_prefix("corr-").expect("prefix");
        assert_eq!(hex.len(), 32);
        assert!(hex.chars().all(|ch| ch.is_ascii_hexdigit() && !ch.is_ascii_uppercase()));
        assert!(CorrelationId::parse(id.as_str()).is_ok());
        assert_ne!(id, CorrelationId::generate().expect("generate"));
    }
}
