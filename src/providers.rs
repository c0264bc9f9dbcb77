use crate::capabilities::registry::StepMetadataCatalog;
use crate::capabilities::validator::ProviderAdvertisement;
use crate::execution::handlers::StepHandlerRegistry;
use crate::shared::ids::validate_identifier_value;
use serde_json::{Map, Value};
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderSetError {
    #[error("invalid provider alias `{alias}`: {reason}")]
    InvalidAlias { alias: String, reason: String },
    #[error("provider alias `{alias}` is already registered")]
    DuplicateAlias { alias: String },
}

/// Adapter for one external system. Host code implements the operations its
/// own step handlers need and reaches them through `as_any`.
pub trait Provider: Send + Sync {
    /// Capability identifiers this provider advertises.
    fn capabilities(&self) -> Vec<String> {
        Vec::new()
    }

    /// Data-only configuration, checked by the security gate at plan time.
    fn configuration(&self) -> Option<Map<String, Value>> {
        None
    }

    fn as_any(&self) -> &dyn Any;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct AuthSessionError {
    pub message: String,
}

impl AuthSessionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Opaque credential or session handed out by the host broker. Its payload is
/// never printed.
pub struct AuthSession {
    name: String,
    payload: Box<dyn Any + Send + Sync>,
}

impl AuthSession {
    pub fn new<T>(name: impl Into<String>, payload: T) -> Self
    where
        T: Any + Send + Sync,
    {
        Self {
            name: name.into(),
            payload: Box::new(payload),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn payload<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("name", &self.name)
            .field("payload", &crate::redaction::REDACTED_PLACEHOLDER)
            .finish()
    }
}

/// Host-supplied credential broker, keyed by a routing name plus data-only
/// options. The engine passes its own deep copy of the options.
pub trait AuthSessionBroker: Send + Sync {
    fn acquire_session(
        &self,
        name: &str,
        options: Map<String, Value>,
    ) -> Result<AuthSession, AuthSessionError>;
}

/// Everything the host supplies for one build or execution. Providers, step
/// handlers, the metadata supplement and the broker are kept in separate slots,
/// so capability discovery only ever sees providers.
#[derive(Clone, Default)]
pub struct ProviderSet {
    providers: BTreeMap<String, Arc<dyn Provider>>,
    step_handlers: StepHandlerRegistry,
    step_metadata_supplement: Option<StepMetadataCatalog>,
    auth_session_broker: Option<Arc<dyn AuthSessionBroker>>,
}

impl ProviderSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_provider(
        &mut self,
        alias: &str,
        provider: Arc<dyn Provider>,
    ) -> Result<(), ProviderSetError> {
        validate_identifier_value("provider alias", alias).map_err(|reason| {
            ProviderSetError::InvalidAlias {
                alias: alias.to_string(),
                reason,
            }
        })?;
        if self.providers.contains_key(alias) {
            return Err(ProviderSetError::DuplicateAlias {
                alias: alias.to_string(),
            });
        }
        self.providers.insert(alias.to_string(), provider);
        Ok(())
    }

    pub fn with_provider(
        mut self,
        alias: &str,
        provider: Arc<dyn Provider>,
    ) -> Result<Self, ProviderSetError> {
        self.insert_provider(alias, provider)?;
        Ok(self)
    }

    pub fn with_step_handlers(mut self, step_handlers: StepHandlerRegistry) -> Self {
        self.step_handlers = step_handlers;
        self
    }

    pub fn with_step_metadata_supplement(mut self, supplement: StepMetadataCatalog) -> Self {
        self.step_metadata_supplement = Some(supplement);
        self
    }

    pub fn with_auth_session_broker(mut self, broker: Arc<dyn AuthSessionBroker>) -> Self {
        self.auth_session_broker = Some(broker);
        self
    }

    pub fn provider(&self, alias: &str) -> Option<&Arc<dyn Provider>> {
        self.providers.get(alias)
    }

    /// Downcasts the provider registered under `alias` to its concrete type.
    pub fn provider_as<T: Any>(&self, alias: &str) -> Option<&T> {
        self.providers
            .get(alias)
            .and_then(|provider| provider.as_any().downcast_ref::<T>())
    }

    pub fn providers(&self) -> impl Iterator<Item = (&str, &Arc<dyn Provider>)> {
        self.providers
            .iter()
            .map(|(alias, provider)| (alias.as_str(), provider))
    }

    pub fn step_handlers(&self) -> &StepHandlerRegistry {
        &self.step_handlers
    }

    pub fn step_handlers_mut(&mut self) -> &mut StepHandlerRegistry {
        &mut self.step_handlers
    }

    pub fn step_metadata_supplement(&self) -> Option<&StepMetadataCatalog> {
        self.step_metadata_supplement.as_ref()
    }

    pub fn auth_session_broker(&self) -> Option<&dyn AuthSessionBroker> {
        self.auth_session_broker.as_deref()
    }

    /// Advertised capabilities of every provider, in alias order.
    pub fn advertisements(&self) -> Vec<ProviderAdvertisement> {
        self.providers
            .iter()
            .map(|(alias, provider)| ProviderAdvertisement {
                provider: alias.clone(),
                capabilities: provider.capabilities(),
            })
            .collect()
    }
}

impl std::fmt::Debug for ProviderSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSet")
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .field("step_handlers", &self.step_handlers)
            .field("step_metadata_supplement", &self.step_metadata_supplement)
            .field("auth_session_broker", &self.auth_session_broker.is_some())
            .finish()
    }
}
