use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

pub const REDACTED_PLACEHOLDER: &str = "[REDACTED]";

/// Key names treated as secret-bearing, compared case-insensitively.
pub const DEFAULT_SECRET_KEYS: &[&str] = &[
    "password",
    "passphrase",
    "secret",
    "token",
    "apikey",
    "api_key",
    "clientsecret",
    "client_secret",
    "accesstoken",
    "access_token",
    "refreshtoken",
    "refresh_token",
    "credential",
    "credentials",
    "privatekey",
    "private_key",
];

/// Produces sanitized copies of structured data for output boundaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redactor {
    secret_keys: BTreeSet<String>,
}

impl Default for Redactor {
    fn default() -> Self {
        Self {
            secret_keys: DEFAULT_SECRET_KEYS
                .iter()
                .map(|key| key.to_string())
                .collect(),
        }
    }
}

impl Redactor {
    pub fn with_additional_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for key in keys {
            let key = key.as_ref().trim();
            if !key.is_empty() {
                self.secret_keys.insert(key.to_ascii_lowercase());
            }
        }
        self
    }

    pub fn is_secret_key(&self, key: &str) -> bool {
        self.secret_keys.contains(&key.to_ascii_lowercase())
    }

    pub fn redact(&self, value: &Value) -> Value {
        match value {
            Value::Object(map) => Value::Object(self.redact_map(map)),
            Value::Array(items) => Value::Array(items.iter().map(|item| self.redact(item)).collect()),
            Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => value.clone(),
        }
    }

    pub fn redact_map(&self, map: &Map<String, Value>) -> Map<String, Value> {
        map.iter()
            .map(|(key, item)| {
                let item = if self.is_secret_key(key) {
                    Value::String(REDACTED_PLACEHOLDER.to_string())
                } else {
                    self.redact(item)
                };
                (key.clone(), item)
            })
            .collect()
    }

    /// Serializes `value` into the closed data model and redacts the result.
    /// Sensitive runtime types already serialize as the placeholder.
    pub fn redact_serialized<T: Serialize>(&self, value: &T) -> Value {
        match serde_json::to_value(value) {
            Ok(value) => self.redact(&value),
            Err(_) => Value::String(REDACTED_PLACEHOLDER.to_string()),
        }
    }
}

/// String that never leaves the process in clear text through `Debug`,
/// `Display` or serialization.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(REDACTED_PLACEHOLDER)
    }
}

impl std::fmt::Display for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(REDACTED_PLACEHOLDER)
    }
}

impl Serialize for SecretString {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(REDACTED_PLACEHOLDER)
    }
}
