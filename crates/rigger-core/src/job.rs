//! Jobs and actions.

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A declarative job: an unordered collection of actions whose execution
/// order is derived from `depends_on` edges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Source file path, set by the loader. Becomes the context path while
    /// the job executes.
    #[serde(skip)]
    pub path: PathBuf,

    /// Other jobs that must run before this one. Interpreted by the CLI's
    /// `run-all`, not by the engine core.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    /// Job-level constants; override top-level constants during resolution.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub constants: BTreeMap<String, serde_json::Value>,

    #[serde(default)]
    pub actions: Vec<Action>,

    /// OR-combined skip conditions; also re-checked after execution as the
    /// post-execution gate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_condition: Option<Vec<Value>>,
}

/// A unit of work inside a job or template.
///
/// Two shapes share this struct: a template invocation names its target via
/// `template`, a primitive action via `type`. [`Action::kind`] resolves the
/// effective kind; whether it names a primitive or a template is decided by
/// the engine at dispatch time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Action {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,

    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub action_type: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub arguments: BTreeMap<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_condition: Option<Vec<Value>>,

    /// Custom output map. When present it fully replaces the default outputs
    /// of the invoked primitive or template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<BTreeMap<String, Value>>,
}

impl Action {
    /// The effective kind: `template` if present, else `type`.
    pub fn kind(&self) -> Option<&str> {
        self.template.as_deref().or(self.action_type.as_deref())
    }

    /// Dependencies as a slice; empty when absent.
    pub fn dependencies(&self) -> &[String] {
        self.depends_on.as_deref().unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_parses_from_yaml() {
        let yaml = r#"
name: deploy-token
version: "1"
constants:
  initialSupply: 1000000
actions:
  - name: token
    template: erc20-deploy
    arguments:
      supply: "{{initialSupply}}"
  - name: fund
    type: send-transaction
    depends_on: [token]
    arguments:
      to: "{{token.address}}"
"#;
        let job: Job = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(job.name, "deploy-token");
        assert_eq!(job.actions.len(), 2);
        assert_eq!(job.actions[0].kind(), Some("erc20-deploy"));
        assert_eq!(job.actions[1].kind(), Some("send-transaction"));
        assert_eq!(job.actions[1].dependencies(), ["token"]);
        assert_eq!(job.constants["initialSupply"], serde_json::json!(1000000));
    }

    #[test]
    fn test_template_field_wins_over_type() {
        let action: Action =
            serde_yaml::from_str("{ name: a, template: deploy, type: send-transaction }").unwrap();
        assert_eq!(action.kind(), Some("deploy"));
    }

    #[test]
    fn test_kind_absent() {
        let action: Action = serde_yaml::from_str("{ name: a }").unwrap();
        assert_eq!(action.kind(), None);
    }
}
