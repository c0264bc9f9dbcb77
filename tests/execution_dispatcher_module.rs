use lifecycle_engine::capabilities::registry::{StepMetadata, StepMetadataCatalog, StepMetadataRegistry};
use lifecycle_engine::execution::{
    ExecutionEngine, SessionAwareStepHandler, StepContext, StepError, StepHandler,
    StepHandlerRegistry, StepOutcome, StepStatus,
};
use lifecycle_engine::planning::{Plan, PlanBuilder, PlannedStep};
use lifecycle_engine::providers::{
    AuthSession, AuthSessionBroker, AuthSessionError, Provider, ProviderSet,
};
use lifecycle_engine::redaction::SecretString;
use lifecycle_engine::request::LifecycleRequest;
use serde_json::{json, Map, Value};
use std::any::Any;
use std::sync::{Arc, Mutex};

struct Credential {
    token: SecretString,
}

#[derive(Default)]
struct RecordingBroker {
    requests: Mutex<Vec<(String, Map<String, Value>)>>,
}

impl AuthSessionBroker for RecordingBroker {
    fn acquire_session(
        &self,
        name: &str,
        mut options: Map<String, Value>,
    ) -> Result<AuthSession, AuthSessionError> {
        self.requests
            .lock()
            .expect("requests")
            .push((name.to_string(), options.clone()));
        if name == "Denied" {
            return Err(AuthSessionError::new("consent required"));
        }
        options.insert("Mutated".to_string(), Value::Bool(true));
        Ok(AuthSession::new(
            name,
            Credential {
                token: SecretString::new(format!("token-for-{name}")),
            },
        ))
    }
}

/// Session-aware handler that checks the credential it was given.
#[derive(Default)]
struct DisableWithSession {
    seen: Mutex<Vec<Option<String>>>,
}

impl SessionAwareStepHandler for DisableWithSession {
    fn execute_with_session(
        &self,
        ctx: &mut StepContext<'_, '_>,
        _step: &PlannedStep,
        session: Option<&AuthSession>,
    ) -> Result<StepOutcome, StepError> {
        let token = session
            .and_then(|session| session.payload::<Credential>())
            .map(|credential| credential.token.expose().to_string());
        self.seen.lock().expect("seen").push(token);
        let directory = ctx
            .provider_as::<Directory>("Directory")
            .ok_or_else(|| StepError::new("directory provider missing"))?;
        directory.disabled.lock().expect("disabled").push(
            ctx.request().identity_keys()["Upn"]
                .as_str()
                .unwrap_or_default()
                .to_string(),
        );
        Ok(StepOutcome::changed())
    }
}

#[derive(Default)]
struct LegacyDisable {
    calls: Mutex<usize>,
}

impl StepHandler for LegacyDisable {
    fn execute(
        &self,
        _ctx: &mut StepContext<'_, '_>,
        _step: &PlannedStep,
    ) -> Result<StepOutcome, StepError> {
        *self.calls.lock().expect("calls") += 1;
        Ok(StepOutcome::unchanged())
    }
}

#[derive(Default)]
struct Directory {
    disabled: Mutex<Vec<String>>,
}

impl Provider for Directory {
    fn capabilities(&self) -> Vec<String> {
        vec!["Identity.Disable".to_string()]
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn build_plan(steps: Value) -> Plan {
    let registry = StepMetadataRegistry::new()
        .with_catalog(
            "Identity",
            StepMetadataCatalog::from([
                (
                    "DisableIdentity".to_string(),
                    StepMetadata::requiring(["Identity.Disable"]),
                ),
                (
                    "LegacyDisable".to_string(),
                    StepMetadata::requiring(["Identity.Disable"]),
                ),
            ]),
        )
        .expect("catalog");
    let request = LifecycleRequest::builder("Leaver")
        .identity_key("Upn", "ada@example.com")
        .actor("hr-sync")
        .correlation_id("c-session")
        .build()
        .expect("request");
    let workflow = json!({"Name": "Leaver", "LifecycleEvent": "Leaver", "Steps": steps});
    let providers = ProviderSet::new()
        .with_provider("Directory", Arc::new(Directory::default()))
        .expect("provider");
    PlanBuilder::with_registry(&registry)
        .build(&workflow, &request, &providers)
        .expect("plan")
}

struct Fixture {
    providers: ProviderSet,
    broker: Arc<RecordingBroker>,
    directory: Arc<Directory>,
    session_aware: Arc<DisableWithSession>,
    legacy: Arc<LegacyDisable>,
}

fn fixture(with_broker: bool) -> Fixture {
    let broker = Arc::new(RecordingBroker::default());
    let directory = Arc::new(Directory::default());
    let session_aware = Arc::new(DisableWithSession::default());
    let legacy = Arc::new(LegacyDisable::default());
    let mut handlers = StepHandlerRegistry::new();
    handlers
        .register_session_aware("DisableIdentity", session_aware.clone())
        .expect("session aware");
    handlers
        .register("LegacyDisable", legacy.clone())
        .expect("legacy");
    let mut providers = ProviderSet::new()
        .with_provider("Directory", directory.clone())
        .expect("provider")
        .with_step_handlers(handlers);
    if with_broker {
        providers = providers.with_auth_session_broker(broker.clone());
    }
    Fixture {
        providers,
        broker,
        directory,
        session_aware,
        legacy,
    }
}

#[test]
fn execution_dispatcher_module_passes_sessions_to_session_aware_handlers() {
    let fixture = fixture(true);
    let plan = build_plan(json!([{
        "Name": "Disable",
        "Type": "DisableIdentity",
        "With": {
            "AuthSessionName": "Directory.Admin",
            "AuthSessionOptions": {"Role": "Tier0", "Nested": {"Scope": "users"}}
        }
    }]));

    let result = ExecutionEngine::default()
        .execute(&plan, &fixture.providers, None)
        .expect("execution");
    assert_eq!(result.steps()[0].status, StepStatus::Completed);
    assert_eq!(
        *fixture.session_aware.seen.lock().expect("seen"),
        vec![Some("token-for-Directory.Admin".to_string())]
    );
    assert_eq!(
        *fixture.directory.disabled.lock().expect("disabled"),
        vec!["ada@example.com".to_string()]
    );

    let requests = fixture.broker.requests.lock().expect("requests");
    let (name, options) = &requests[0];
    assert_eq!(name, "Directory.Admin");
    assert_eq!(
        Value::Object(options.clone()),
        json!({
            "Role": "Tier0",
            "Nested": {"Scope": "users"},
            "CorrelationId": "c-session",
            "Actor": "hr-sync"
        })
    );
    assert_eq!(
        plan.steps()[0].param("AuthSessionOptions"),
        Some(&json!({"Role": "Tier0", "Nested": {"Scope": "users"}}))
    );
}

#[test]
fn execution_dispatcher_module_calls_legacy_handlers_without_a_session() {
    let fixture = fixture(true);
    let plan = build_plan(json!([{
        "Name": "Disable",
        "Type": "LegacyDisable",
        "With": {"AuthSessionName": "Directory.Admin"}
    }]));

    let result = ExecutionEngine::default()
        .execute(&plan, &fixture.providers, None)
        .expect("execution");
    assert_eq!(result.steps()[0].status, StepStatus::Completed);
    assert!(!result.steps()[0].changed);
    assert_eq!(*fixture.legacy.calls.lock().expect("calls"), 1);
    assert_eq!(fixture.broker.requests.lock().expect("requests").len(), 1);
}

#[test]
fn execution_dispatcher_module_fails_steps_when_no_session_is_available() {
    let without_broker = fixture(false);
    let plan = build_plan(json!([{
        "Name": "Disable",
        "Type": "DisableIdentity",
        "With": {"AuthSessionName": "Directory.Admin"}
    }]));
    let result = ExecutionEngine::default()
        .execute(&plan, &without_broker.providers, None)
        .expect("execution");
    assert_eq!(result.steps()[0].status, StepStatus::Failed);
    assert!(result.steps()[0]
        .error
        .as_deref()
        .unwrap_or_default()
        .contains("no auth session broker"));
    assert!(without_broker.session_aware.seen.lock().expect("seen").is_empty());

    let with_broker = fixture(true);
    let plan = build_plan(json!([{
        "Name": "Disable",
        "Type": "DisableIdentity",
        "With": {"AuthSessionName": "Denied"}
    }]));
    let result = ExecutionEngine::default()
        .execute(&plan, &with_broker.providers, None)
        .expect("execution");
    assert_eq!(
        result.steps()[0].error.as_deref(),
        Some("failed to acquire auth session `Denied`: consent required")
    );

    let plan = plan_with_bad_options();
    let result = ExecutionEngine::default()
        .execute(&plan, &with_broker.providers, None)
        .expect("execution");
    assert_eq!(
        result.steps()[0].error.as_deref(),
        Some("`With.AuthSessionOptions` must be a map")
    );
}

fn plan_with_bad_options() -> Plan {
    build_plan(json!([{
        "Name": "Disable",
        "Type": "DisableIdentity",
        "With": {"AuthSessionName": "Directory.Admin", "AuthSessionOptions": "not-a-map"}
    }]))
}
