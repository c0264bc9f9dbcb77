use super::error::PlanError;
use super::plan::{Plan, PlanWarning, PlannedStep, StepPlanStatus};
use crate::capabilities::deprecation::DeprecationTable;
use crate::capabilities::registry::{MergedStepMetadata, StepMetadataRegistry};
use crate::capabilities::validator::{validate_capabilities, StepRequirement};
use crate::config::{ConfigError, EngineSettings};
use crate::providers::ProviderSet;
use crate::redaction::Redactor;
use crate::request::LifecycleRequest;
use crate::security::{index_path, key_path, SecurityGate};
use crate::shared::logging::{log_fields, EngineLog};
use crate::shared::time::now_rfc3339;
use crate::workflow::condition::{Condition, ConditionScope};
use crate::workflow::definition::{StepDefinition, WorkflowDefinition, WORKFLOW_ROOT};
use crate::workflow::template::{resolve_map, resolve_value, TemplateScope, TEMPLATE_ROOTS};
use serde_json::{json, Value};

/// Turns a workflow definition, a request and a provider set into an
/// immutable [`Plan`]. Nothing is partially built: any failure aborts.
#[derive(Debug, Clone)]
pub struct PlanBuilder<'r> {
    registry: &'r StepMetadataRegistry,
    gate: SecurityGate,
    redactor: Redactor,
    deprecations: DeprecationTable,
    log: EngineLog,
}

struct BuildScope {
    templates: TemplateScope,
    conditions: ConditionScope,
}

impl<'r> PlanBuilder<'r> {
    pub fn new(
        settings: &EngineSettings,
        registry: &'r StepMetadataRegistry,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            registry,
            gate: settings.security_gate(),
            redactor: settings.redactor(),
            deprecations: settings.deprecation_table()?,
            log: settings.engine_log(),
        })
    }

    /// Builder with default settings.
    pub fn with_registry(registry: &'r StepMetadataRegistry) -> Self {
        Self {
            registry,
            gate: SecurityGate::default(),
            redactor: Redactor::default(),
            deprecations: DeprecationTable::builtin(),
            log: EngineLog::disabled(),
        }
    }

    pub fn build(
        &self,
        workflow: &Value,
        request: &LifecycleRequest,
        providers: &ProviderSet,
    ) -> Result<Plan, PlanError> {
        self.log.info(
            "plan.build.started",
            "plan build started",
            log_fields([
                ("correlation_id", json!(request.correlation_id().as_str())),
                ("lifecycle_event", json!(request.lifecycle_event())),
            ]),
        );
        match self.build_plan(workflow, request, providers) {
            Ok(plan) => {
                self.log.info(
                    "plan.build.completed",
                    "plan build completed",
                    log_fields([
                        ("correlation_id", json!(plan.correlation_id().as_str())),
                        ("workflow", json!(plan.workflow_name())),
                        ("steps", json!(plan.steps().len())),
                        ("on_failure_steps", json!(plan.on_failure_steps().len())),
                        ("warnings", json!(plan.warnings().len())),
                    ]),
                );
                Ok(plan)
            }
            Err(err) => {
                self.log.error(
                    "plan.build.failed",
                    &err.to_string(),
                    log_fields([
                        ("correlation_id", json!(request.correlation_id().as_str())),
                        ("kind", json!(err.kind())),
                    ]),
                );
                Err(err)
            }
        }
    }

    /// Same as [`PlanBuilder::build`] for a request that arrives as untrusted
    /// data.
    pub fn build_from_values(
        &self,
        workflow: &Value,
        request: &Value,
        providers: &ProviderSet,
    ) -> Result<Plan, PlanError> {
        let request = LifecycleRequest::from_value(request, &self.gate)?;
        self.build(workflow, &request, providers)
    }

    fn build_plan(
        &self,
        workflow: &Value,
        request: &LifecycleRequest,
        providers: &ProviderSet,
    ) -> Result<Plan, PlanError> {
        self.gate.validate(workflow, WORKFLOW_ROOT)?;
        let definition = WorkflowDefinition::from_value(workflow)?;

        self.gate
            .validate_map(request.identity_keys(), "Request.IdentityKeys")?;
        self.gate
            .validate_map(request.desired_state(), "Request.DesiredState")?;
        self.gate.validate_map(request.changes(), "Request.Changes")?;
        if !definition
            .lifecycle_event
            .eq_ignore_ascii_case(request.lifecycle_event())
        {
            return Err(PlanError::Schema {
                path: key_path(WORKFLOW_ROOT, "LifecycleEvent"),
                reason: format!(
                    "workflow handles `{}` but the request is for `{}`",
                    definition.lifecycle_event,
                    request.lifecycle_event()
                ),
            });
        }

        for (alias, provider) in providers.providers() {
            if let Some(configuration) = provider.configuration() {
                self.gate
                    .validate_map(&configuration, &format!("Providers.{alias}.Configuration"))?;
            }
        }

        let request_root = request.scope_value();
        let scope = BuildScope {
            templates: TemplateScope::new(TEMPLATE_ROOTS).bind("Request", request_root.clone()),
            conditions: ConditionScope::from([
                ("Request".to_string(), request_root),
                (
                    "Plan".to_string(),
                    json!({
                        "WorkflowName": definition.name,
                        "LifecycleEvent": definition.lifecycle_event,
                    }),
                ),
            ]),
        };
        let metadata = self
            .registry
            .merge(providers.step_metadata_supplement())?;

        let steps = self.plan_steps(&definition, &definition.steps, "Steps", true, &scope, &metadata)?;
        let on_failure_steps = self.plan_steps(
            &definition,
            &definition.on_failure_steps,
            "OnFailureSteps",
            false,
            &scope,
            &metadata,
        )?;

        let requirements = steps
            .iter()
            .chain(on_failure_steps.iter())
            .filter(|step| !step.required_capabilities.is_empty())
            .map(|step| StepRequirement {
                step_name: step.name.clone(),
                capabilities: step.required_capabilities.clone(),
            })
            .collect::<Vec<_>>();
        let capabilities =
            validate_capabilities(&requirements, &providers.advertisements(), &self.deprecations)?;

        let mut warnings = Vec::new();
        for remap in &capabilities.remapped {
            let message = format!(
                "capability `{}` is deprecated and was treated as `{}` ({})",
                remap.deprecated, remap.replacement, remap.source
            );
            self.log.warn(
                "plan.capability.remapped",
                &message,
                log_fields([
                    ("correlation_id", json!(request.correlation_id().as_str())),
                    ("deprecated", json!(remap.deprecated)),
                    ("replacement", json!(remap.replacement)),
                ]),
            );
            warnings.push(PlanWarning {
                code: "DeprecatedCapability".to_string(),
                message,
            });
        }

        Ok(Plan {
            workflow_name: definition.name,
            workflow_version: definition.version,
            workflow_description: definition.description,
            lifecycle_event: definition.lifecycle_event,
            steps,
            on_failure_steps,
            request: request.clone(),
            warnings,
            capabilities,
            redactor: self.redactor.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            created_at: now_rfc3339(),
        })
    }

    fn plan_steps(
        &self,
        definition: &WorkflowDefinition,
        steps: &[StepDefinition],
        list: &str,
        primary: bool,
        scope: &BuildScope,
        metadata: &MergedStepMetadata,
    ) -> Result<Vec<PlannedStep>, PlanError> {
        let list_path = key_path(WORKFLOW_ROOT, list);
        steps
            .iter()
            .enumerate()
            .map(|(index, step)| {
                let step_path = index_path(&list_path, index);
                self.plan_step(definition, step, &step_path, primary, scope, metadata)
            })
            .collect()
    }

    fn plan_step(
        &self,
        definition: &WorkflowDefinition,
        step: &StepDefinition,
        step_path: &str,
        primary: bool,
        scope: &BuildScope,
        metadata: &MergedStepMetadata,
    ) -> Result<PlannedStep, PlanError> {
        let with_path = key_path(step_path, "With");
        let with = resolve_map(&step.with, &scope.templates, &with_path)?;
        self.gate.validate_map(&with, &with_path)?;

        let condition = match step.condition.as_ref() {
            Some(raw) => {
                let condition_path = key_path(step_path, "Condition");
                let resolved = resolve_value(raw, &scope.templates, &condition_path)?;
                Some(Condition::parse(&resolved, &condition_path)?)
            }
            None => None,
        };
        let (status, reason) = match condition.as_ref() {
            None => (StepPlanStatus::Run, "no condition".to_string()),
            Some(condition) if condition.evaluate(&scope.conditions) => (
                StepPlanStatus::Run,
                format!("condition met: {}", condition.describe()),
            ),
            Some(condition) => (
                StepPlanStatus::Skip,
                format!("condition not met: {}", condition.describe()),
            ),
        };

        let referencing = definition
            .steps
            .iter()
            .chain(definition.on_failure_steps.iter())
            .filter(|candidate| candidate.step_type == step.step_type)
            .map(|candidate| candidate.name.as_str());
        let resolved = metadata.resolve(&step.step_type, referencing)?;

        // OnFailure steps keep their requirements even when skipped.
        let required_capabilities = if primary && status == StepPlanStatus::Skip {
            Vec::new()
        } else {
            resolved.required_capabilities.clone()
        };

        Ok(PlannedStep {
            name: step.name.clone(),
            step_type: step.step_type.clone(),
            description: step
                .description
                .clone()
                .or_else(|| resolved.description.clone()),
            with,
            condition,
            status,
            reason,
            required_capabilities,
        })
    }
}
