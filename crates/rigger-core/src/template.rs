//! Reusable templates: parameterized action sequences.

use crate::job::Action;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A reusable, parameterized action sequence.
///
/// Templates have no scheduler: `actions` execute strictly top-to-bottom.
/// Arguments supplied by the calling action become the template's local
/// scope; `outputs` are resolved after execution and stored under the
/// calling action's name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub name: String,

    /// Source file path, set by the loader. Becomes the context path while
    /// the template executes.
    #[serde(skip)]
    pub path: PathBuf,

    /// Setup actions that run before the skip decision for the main block.
    /// Setup has its own skip conditions, independent of the template's.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setup: Option<TemplateSetup>,

    /// OR-combined skip conditions for the main action block. Outputs are
    /// still resolved when the block is skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_condition: Option<Vec<Value>>,

    #[serde(default)]
    pub actions: Vec<Action>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<BTreeMap<String, Value>>,
}

/// A template's setup block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateSetup {
    #[serde(default)]
    pub actions: Vec<Action>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_condition: Option<Vec<Value>>,
}
