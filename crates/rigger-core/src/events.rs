//! The engine's observable event stream.
//!
//! The engine emits events in causal order through a single [`EventSink`]
//! capability. Sinks must not block: production sinks log, test sinks
//! collect into a vec to observe execution order.

use std::fmt;

/// Event severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Error => "error",
        };
        f.write_str(s)
    }
}

/// An event emitted during job execution.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    JobStarted { job: String },
    JobCompleted { job: String },

    ActionStarted { action: String, kind: String },
    ActionSkipped { action: String, reason: Option<String> },

    TemplateEntered { template: String, action: String },
    TemplateExited { template: String },
    TemplateSetupStarted { template: String },
    TemplateSetupCompleted { template: String },
    TemplateSetupSkipped { template: String },
    TemplateSkipped { template: String },

    PrimitiveAction { action: String, kind: String },
    TransactionSent { action: String, hash: String },
    TransactionConfirmed { action: String, hash: String, block: Option<u64> },

    VerificationStarted { action: String, platform: String, address: String },
    VerificationSubmitted { platform: String, guid: String },
    VerificationCompleted { platform: String, address: String },
    VerificationFailed { platform: String, message: String },

    OutputStored { key: String },

    ExecutionFailed { action: String, message: String },
}

impl EngineEvent {
    pub fn severity(&self) -> Severity {
        match self {
            EngineEvent::OutputStored { .. } | EngineEvent::PrimitiveAction { .. } => {
                Severity::Debug
            }
            // A skip with a stated reason is a domain condition worth
            // surfacing; an ordinary condition-driven skip is routine.
            EngineEvent::ActionSkipped { reason, .. } => {
                if reason.is_some() {
                    Severity::Warn
                } else {
                    Severity::Info
                }
            }
            EngineEvent::VerificationFailed { .. } => Severity::Warn,
            EngineEvent::ExecutionFailed { .. } => Severity::Error,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for EngineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineEvent::JobStarted { job } => write!(f, "job '{}' started", job),
            EngineEvent::JobCompleted { job } => write!(f, "job '{}' completed", job),
            EngineEvent::ActionStarted { action, kind } => {
                write!(f, "action '{}' started ({})", action, kind)
            }
            EngineEvent::ActionSkipped { action, reason } => match reason {
                Some(reason) => write!(f, "action '{}' skipped: {}", action, reason),
                None => write!(f, "action '{}' skipped", action),
            },
            EngineEvent::TemplateEntered { template, action } => {
                write!(f, "template '{}' entered by action '{}'", template, action)
            }
            EngineEvent::TemplateExited { template } => {
                write!(f, "template '{}' exited", template)
            }
            EngineEvent::TemplateSetupStarted { template } => {
                write!(f, "template '{}' setup started", template)
            }
            EngineEvent::TemplateSetupCompleted { template } => {
                write!(f, "template '{}' setup completed", template)
            }
            EngineEvent::TemplateSetupSkipped { template } => {
                write!(f, "template '{}' setup skipped", template)
            }
            EngineEvent::TemplateSkipped { template } => {
                write!(f, "template '{}' main actions skipped", template)
            }
            EngineEvent::PrimitiveAction { action, kind } => {
                write!(f, "primitive '{}' on action '{}'", kind, action)
            }
            EngineEvent::TransactionSent { action, hash } => {
                write!(f, "transaction sent for '{}': {}", action, hash)
            }
            EngineEvent::TransactionConfirmed { action, hash, block } => match block {
                Some(block) => write!(
                    f,
                    "transaction confirmed for '{}' in block {}: {}",
                    action, block, hash
                ),
                None => write!(f, "transaction confirmed for '{}': {}", action, hash),
            },
            EngineEvent::VerificationStarted {
                action,
                platform,
                address,
            } => write!(
                f,
                "verification of {} started on {} (action '{}')",
                address, platform, action
            ),
            EngineEvent::VerificationSubmitted { platform, guid } => {
                write!(f, "verification submitted to {}: guid {}", platform, guid)
            }
            EngineEvent::VerificationCompleted { platform, address } => {
                write!(f, "verification of {} completed on {}", address, platform)
            }
            EngineEvent::VerificationFailed { platform, message } => {
                write!(f, "verification failed on {}: {}", platform, message)
            }
            EngineEvent::OutputStored { key } => write!(f, "output stored: {}", key),
            EngineEvent::ExecutionFailed { action, message } => {
                write!(f, "action '{}' failed: {}", action, message)
            }
        }
    }
}

/// Receives engine events. Implementations must be cheap and non-blocking.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: EngineEvent) {}
}
