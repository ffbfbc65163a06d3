//! YAML project loader.
//!
//! A project directory holds jobs under `jobs/`, templates under
//! `templates/`, and two optional top-level files: `constants.yaml` (the
//! top-level constants tier) and `networks.yaml` (named network
//! descriptors, keyed by name). Each loaded job and template remembers its
//! file path; that path becomes the engine's context path during
//! execution.

use crate::scheduler::{self, TopoError};
use rigger_core::{Job, Network, Template};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Duplicate {kind} name '{name}' (second definition in {})", path.display())]
    Duplicate {
        kind: &'static str,
        name: String,
        path: PathBuf,
    },

    #[error("Invalid job dependency: '{job}' depends on unknown job '{dependency}'")]
    UnknownJobDependency { job: String, dependency: String },

    #[error("Circular dependency between jobs")]
    JobCycle,
}

/// A loaded project: the read-only inputs a run starts from.
#[derive(Default, Debug)]
pub struct Project {
    pub jobs: BTreeMap<String, Job>,
    pub templates: BTreeMap<String, Template>,
    pub constants: BTreeMap<String, serde_json::Value>,
    pub networks: BTreeMap<String, Network>,
}

impl Project {
    pub fn load(root: &Path) -> Result<Self, LoaderError> {
        let mut project = Project::default();

        for path in yaml_files(&root.join("jobs"))? {
            let mut job: Job = parse_file(&path)?;
            job.path = path.clone();
            if let Some(previous) = project.jobs.insert(job.name.clone(), job) {
                return Err(LoaderError::Duplicate {
                    kind: "job",
                    name: previous.name,
                    path,
                });
            }
        }

        for path in yaml_files(&root.join("templates"))? {
            let mut template: Template = parse_file(&path)?;
            template.path = path.clone();
            if let Some(previous) = project.templates.insert(template.name.clone(), template) {
                return Err(LoaderError::Duplicate {
                    kind: "template",
                    name: previous.name,
                    path,
                });
            }
        }

        let constants_path = root.join("constants.yaml");
        if constants_path.is_file() {
            project.constants = parse_file(&constants_path)?;
        }

        let networks_path = root.join("networks.yaml");
        if networks_path.is_file() {
            let raw: BTreeMap<String, serde_json::Value> = parse_file(&networks_path)?;
            for (name, mut entry) in raw {
                if let Some(map) = entry.as_object_mut() {
                    map.entry("name".to_string())
                        .or_insert_with(|| serde_json::Value::String(name.clone()));
                }
                let network: Network =
                    serde_json::from_value(entry).map_err(|e| LoaderError::Parse {
                        path: networks_path.clone(),
                        message: format!("network '{}': {}", name, e),
                    })?;
                project.networks.insert(name, network);
            }
        }

        Ok(project)
    }

    /// Job names in dependency order, for whole-project runs.
    pub fn job_order(&self) -> Result<Vec<String>, LoaderError> {
        let items: Vec<(String, Vec<String>)> = self
            .jobs
            .values()
            .map(|job| (job.name.clone(), job.depends_on.clone()))
            .collect();
        let order = scheduler::topo_order(&items).map_err(|e| match e {
            TopoError::UnknownDependency { item, dependency } => {
                LoaderError::UnknownJobDependency {
                    job: item,
                    dependency,
                }
            }
            TopoError::Cycle => LoaderError::JobCycle,
        })?;
        Ok(order.into_iter().map(|i| items[i].0.clone()).collect())
    }
}

fn parse_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, LoaderError> {
    let text = std::fs::read_to_string(path).map_err(|e| LoaderError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_yaml::from_str(&text).map_err(|e| LoaderError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Every `.yaml`/`.yml` under `dir`, recursively, sorted for determinism.
fn yaml_files(dir: &Path) -> Result<Vec<PathBuf>, LoaderError> {
    let mut files = Vec::new();
    if dir.is_dir() {
        walk(dir, &mut files)?;
    }
    files.sort();
    Ok(files)
}

fn walk(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), LoaderError> {
    let entries = std::fs::read_dir(dir).map_err(|e| LoaderError::Io {
        path: dir.to_path_buf(),
        source: e,
    })?;
    for entry in entries {
        let entry = entry.map_err(|e| LoaderError::Io {
            path: dir.to_path_buf(),
            source: e,
        })?;
        let path = entry.path();
        if path.is_dir() {
            walk(&path, out)?;
        } else if matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        ) {
            out.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "jobs/deploy.yaml",
            r#"
name: deploy
actions:
  - name: token
    template: erc20
    arguments:
      supply: "{{initialSupply}}"
"#,
        );
        write(
            dir.path(),
            "jobs/configure.yaml",
            r#"
name: configure
depends_on: [deploy]
actions:
  - name: set-owner
    type: send-transaction
    arguments:
      to: "{{token.address}}"
"#,
        );
        write(
            dir.path(),
            "templates/erc20.yaml",
            r#"
name: erc20
actions:
  - name: create
    type: send-transaction
    arguments:
      to: "0x0000000000000000000000000000000000000001"
outputs:
  address: "0x0000000000000000000000000000000000000002"
"#,
        );
        write(dir.path(), "constants.yaml", "initialSupply: 1000000\n");
        write(
            dir.path(),
            "networks.yaml",
            r#"
sepolia:
  chainId: 11155111
  rpcUrl: https://rpc.sepolia.org
  testnet: true
  supports: [etherscan, sourcify]
"#,
        );
        dir
    }

    #[test]
    fn test_load_project() {
        let dir = fixture();
        let project = Project::load(dir.path()).unwrap();

        assert_eq!(project.jobs.len(), 2);
        assert_eq!(project.templates.len(), 1);
        assert_eq!(project.constants["initialSupply"], serde_json::json!(1000000));

        let job = &project.jobs["deploy"];
        assert!(job.path.ends_with("jobs/deploy.yaml"));
        let template = &project.templates["erc20"];
        assert!(template.path.ends_with("templates/erc20.yaml"));

        let network = &project.networks["sepolia"];
        assert_eq!(network.name, "sepolia");
        assert_eq!(network.chain_id, 11155111);
    }

    #[test]
    fn test_job_order_respects_dependencies() {
        let dir = fixture();
        let project = Project::load(dir.path()).unwrap();
        assert_eq!(project.job_order().unwrap(), ["deploy", "configure"]);
    }

    #[test]
    fn test_duplicate_job_name_fails() {
        let dir = fixture();
        write(
            dir.path(),
            "jobs/deploy-again.yaml",
            "name: deploy\nactions: []\n",
        );
        let err = Project::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains("Duplicate job"));
    }

    #[test]
    fn test_parse_error_names_file() {
        let dir = fixture();
        write(dir.path(), "jobs/broken.yaml", "name: [not: valid\n");
        let err = Project::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains("broken.yaml"));
    }

    #[test]
    fn test_unknown_job_dependency() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "jobs/a.yaml",
            "name: a\ndepends_on: [ghost]\nactions: []\n",
        );
        let project = Project::load(dir.path()).unwrap();
        let err = project.job_order().unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn test_empty_project_loads() {
        let dir = tempfile::tempdir().unwrap();
        let project = Project::load(dir.path()).unwrap();
        assert!(project.jobs.is_empty());
        assert!(project.job_order().unwrap().is_empty());
    }
}
