//! The engine dispatcher: jobs → actions → templates → primitives.

use crate::context::{ExecutionContext, Scope};
use crate::error::{EngineError, Result};
use crate::handlers::{self, PrimitiveKind};
use crate::resolver::{self, truthy};
use crate::scheduler;
use crate::verification::PlatformRegistry;
use futures::future::BoxFuture;
use rigger_core::{Action, EngineEvent, EventSink, Job, NullSink, Template, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Run-level options.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Re-evaluate skip conditions after execution and fail when they do
    /// not hold. On by default.
    pub post_check: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self { post_check: true }
    }
}

/// Executes jobs against an [`ExecutionContext`].
///
/// One job runs at a time on a single cooperative worker; actions are
/// strictly sequentialized in scheduler order so transaction nonces and
/// output writes stay deterministic.
pub struct Engine {
    templates: BTreeMap<String, Template>,
    platforms: PlatformRegistry,
    sink: Arc<dyn EventSink>,
    options: EngineOptions,
}

impl Engine {
    pub fn new(
        templates: BTreeMap<String, Template>,
        platforms: PlatformRegistry,
        sink: Arc<dyn EventSink>,
        options: EngineOptions,
    ) -> Self {
        Self {
            templates,
            platforms,
            sink,
            options,
        }
    }

    /// Engine with no verification platforms and a silent sink.
    pub fn with_templates(templates: BTreeMap<String, Template>) -> Self {
        Self::new(
            templates,
            PlatformRegistry::new(),
            Arc::new(NullSink),
            EngineOptions::default(),
        )
    }

    /// Runs one job to completion.
    ///
    /// The context path is set to the job's file for the duration and
    /// restored on every exit path; job-level constants are layered over
    /// the top-level tier the same way.
    pub async fn execute_job(&self, job: &Job, ctx: &mut ExecutionContext) -> Result<()> {
        self.sink.emit(EngineEvent::JobStarted {
            job: job.name.clone(),
        });

        let saved_path = std::mem::replace(&mut ctx.context_path, job.path.clone());
        ctx.constants.set_job_constants(job.constants.clone());
        let result = self.run_job(job, ctx).await;
        ctx.context_path = saved_path;
        ctx.constants.clear_job_constants();

        match result {
            Ok(()) => {
                self.sink.emit(EngineEvent::JobCompleted {
                    job: job.name.clone(),
                });
                Ok(())
            }
            Err(e) => {
                self.sink.emit(EngineEvent::ExecutionFailed {
                    action: job.name.clone(),
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn run_job(&self, job: &Job, ctx: &mut ExecutionContext) -> Result<()> {
        let order = scheduler::schedule(job)?;
        tracing::debug!(
            job = %job.name,
            order = ?order
                .iter()
                .map(|&i| scheduler::action_key(job.actions[i].name.as_deref(), i))
                .collect::<Vec<_>>(),
            "scheduled actions"
        );
        let scope = Scope::new();
        for index in order {
            self.execute_action(&job.actions[index], ctx, &scope).await?;
        }

        // Post-execution gate: every skip condition must hold now.
        if self.options.post_check {
            if let Some(conditions) = &job.skip_condition {
                for condition in conditions {
                    let value = resolver::resolve(condition, ctx, &scope).await?;
                    if !truthy(&value) {
                        return Err(EngineError::PostCheckFailed {
                            name: job.name.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Executes one action: a primitive or a template invocation.
    pub fn execute_action<'a>(
        &'a self,
        action: &'a Action,
        ctx: &'a mut ExecutionContext,
        scope: &'a Scope,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let label = handlers::action_label(action);
            let kind = action
                .kind()
                .ok_or_else(|| {
                    EngineError::Validation(format!(
                        "action '{}' has neither 'template' nor 'type'",
                        label
                    ))
                })?
                .to_string();
            self.sink.emit(EngineEvent::ActionStarted {
                action: label.clone(),
                kind: kind.clone(),
            });

            if self
                .evaluate_skip(action.skip_condition.as_deref(), ctx, scope)
                .await?
            {
                // A skipped action still publishes its custom outputs so
                // static values stay usable downstream.
                if let (Some(name), Some(output)) = (&action.name, &action.output) {
                    let name = name.clone();
                    for (key, value) in output {
                        let resolved = resolver::resolve(value, ctx, scope).await?;
                        handlers::store_output(
                            ctx,
                            self.sink.as_ref(),
                            format!("{}.{}", name, key),
                            resolved,
                        )?;
                    }
                }
                self.sink.emit(EngineEvent::ActionSkipped {
                    action: label,
                    reason: None,
                });
                return Ok(());
            }

            if let Some(primitive) = PrimitiveKind::parse(&kind) {
                let has_custom_output = action.output.is_some();
                handlers::execute(
                    primitive,
                    action,
                    ctx,
                    scope,
                    self.sink.as_ref(),
                    &self.platforms,
                    has_custom_output,
                )
                .await?;
                // The custom map fully replaces the primitive's defaults.
                if let (Some(name), Some(output)) = (&action.name, &action.output) {
                    let name = name.clone();
                    for (key, value) in output {
                        let resolved = resolver::resolve(value, ctx, scope).await?;
                        handlers::store_output(
                            ctx,
                            self.sink.as_ref(),
                            format!("{}.{}", name, key),
                            resolved,
                        )?;
                    }
                }
                Ok(())
            } else {
                self.execute_template(action, &kind, ctx).await
            }
        })
    }

    /// Invokes a template on behalf of a calling action.
    async fn execute_template(
        &self,
        calling: &Action,
        template_name: &str,
        ctx: &mut ExecutionContext,
    ) -> Result<()> {
        let template = self
            .templates
            .get(template_name)
            .ok_or_else(|| EngineError::UnknownTemplate(template_name.to_string()))?;

        // Arguments resolve in the caller's context with an empty scope, so
        // artifact references inside them are relative to the caller's
        // file, not the callee's.
        let empty = Scope::new();
        let mut scope = Scope::new();
        for (key, value) in &calling.arguments {
            scope.insert(key.clone(), resolver::resolve(value, ctx, &empty).await?);
        }

        self.sink.emit(EngineEvent::TemplateEntered {
            template: template.name.clone(),
            action: handlers::action_label(calling),
        });
        let saved_path = std::mem::replace(&mut ctx.context_path, template.path.clone());
        let result = self.run_template(template, calling, ctx, &scope).await;
        ctx.context_path = saved_path;
        self.sink.emit(EngineEvent::TemplateExited {
            template: template.name.clone(),
        });
        result
    }

    async fn run_template(
        &self,
        template: &Template,
        calling: &Action,
        ctx: &mut ExecutionContext,
        scope: &Scope,
    ) -> Result<()> {
        // 1. Setup block, gated by its own independent skip conditions.
        if let Some(setup) = &template.setup {
            if self
                .evaluate_skip(setup.skip_condition.as_deref(), ctx, scope)
                .await?
            {
                self.sink.emit(EngineEvent::TemplateSetupSkipped {
                    template: template.name.clone(),
                });
            } else {
                self.sink.emit(EngineEvent::TemplateSetupStarted {
                    template: template.name.clone(),
                });
                for action in &setup.actions {
                    self.execute_action(action, ctx, scope).await?;
                }
                self.sink.emit(EngineEvent::TemplateSetupCompleted {
                    template: template.name.clone(),
                });
            }
        }

        // 2. Main block. When skipped, outputs are still processed below:
        //    deterministic derivations stay meaningful without execution.
        let skipped = self
            .evaluate_skip(template.skip_condition.as_deref(), ctx, scope)
            .await?;
        if skipped {
            self.sink.emit(EngineEvent::TemplateSkipped {
                template: template.name.clone(),
            });
        } else {
            for action in &template.actions {
                self.execute_action(action, ctx, scope).await?;
            }

            // 3. Post-execution gate for the template's own conditions.
            let has_conditions = template
                .skip_condition
                .as_ref()
                .map(|c| !c.is_empty())
                .unwrap_or(false);
            if self.options.post_check && has_conditions {
                let holds = self
                    .evaluate_skip(template.skip_condition.as_deref(), ctx, scope)
                    .await?;
                if !holds {
                    return Err(EngineError::PostCheckFailed {
                        name: template.name.clone(),
                    });
                }
            }
        }

        // 4. Outputs: the caller's custom map fully replaces the
        //    template's.
        if let Some(name) = &calling.name {
            let outputs = calling.output.as_ref().or(template.outputs.as_ref());
            if let Some(outputs) = outputs {
                let name = name.clone();
                for (key, value) in outputs {
                    let resolved = resolver::resolve(value, ctx, scope).await?;
                    handlers::store_output(
                        ctx,
                        self.sink.as_ref(),
                        format!("{}.{}", name, key),
                        resolved,
                    )?;
                }
            }
        }
        Ok(())
    }

    /// OR-combined skip evaluation: true on the first truthy condition.
    pub async fn evaluate_skip(
        &self,
        conditions: Option<&[Value]>,
        ctx: &ExecutionContext,
        scope: &Scope,
    ) -> Result<bool> {
        let Some(conditions) = conditions else {
            return Ok(false);
        };
        for condition in conditions {
            let value = resolver::resolve(condition, ctx, scope).await?;
            if truthy(&value) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
