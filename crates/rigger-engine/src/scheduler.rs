//! Dependency ordering: Kahn's algorithm with insertion-order tie-breaks.
//!
//! [`schedule`] orders a job's actions; the underlying [`topo_order`] is
//! shared with job-level ordering in the CLI. Pure functions, no I/O.

use crate::error::{EngineError, Result};
use rigger_core::Job;
use std::collections::BTreeMap;

/// A dependency-ordering failure, independent of what is being ordered.
#[derive(Debug, PartialEq, Eq)]
pub enum TopoError {
    UnknownDependency { item: String, dependency: String },
    Cycle,
}

/// Topologically orders items given `(name, dependencies)` pairs.
///
/// Kahn's algorithm; ties broken by the input order of items. Returns
/// indices into `items`.
pub fn topo_order(items: &[(String, Vec<String>)]) -> std::result::Result<Vec<usize>, TopoError> {
    let index_of: BTreeMap<&str, usize> = items
        .iter()
        .enumerate()
        .map(|(i, (name, _))| (name.as_str(), i))
        .collect();

    // Indegree per item, validating edges as we count them.
    let mut indegree = vec![0usize; items.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); items.len()];
    for (i, (name, deps)) in items.iter().enumerate() {
        for dep in deps {
            let Some(&d) = index_of.get(dep.as_str()) else {
                return Err(TopoError::UnknownDependency {
                    item: name.clone(),
                    dependency: dep.clone(),
                });
            };
            indegree[i] += 1;
            dependents[d].push(i);
        }
    }

    // Repeatedly emit the first (input-order) item with no remaining
    // dependencies. The linear scan keeps the tie-break deterministic.
    let mut emitted = vec![false; items.len()];
    let mut order = Vec::with_capacity(items.len());
    loop {
        let next = (0..items.len()).find(|&i| !emitted[i] && indegree[i] == 0);
        let Some(i) = next else { break };
        emitted[i] = true;
        order.push(i);
        for &dependent in &dependents[i] {
            indegree[dependent] -= 1;
        }
    }

    if order.len() < items.len() {
        return Err(TopoError::Cycle);
    }
    Ok(order)
}

/// Computes the execution order of a job's actions.
///
/// Fails with [`EngineError::InvalidDependency`] when an edge names an
/// action the job does not contain, and [`EngineError::CircularDependency`]
/// when a cycle prevents emitting every action.
pub fn schedule(job: &Job) -> Result<Vec<usize>> {
    let items: Vec<(String, Vec<String>)> = job
        .actions
        .iter()
        .enumerate()
        .map(|(i, a)| {
            (
                action_key(a.name.as_deref(), i),
                a.dependencies().to_vec(),
            )
        })
        .collect();

    topo_order(&items).map_err(|e| match e {
        TopoError::UnknownDependency { item, dependency } => EngineError::InvalidDependency {
            action: item,
            dependency,
        },
        TopoError::Cycle => EngineError::CircularDependency {
            job: job.name.clone(),
        },
    })
}

/// The scheduling key for an action: its name, or a positional fallback for
/// unnamed actions (which nothing can depend on).
pub fn action_key(name: Option<&str>, index: usize) -> String {
    match name {
        Some(name) => name.to_string(),
        None => format!("action-{}", index),
    }
}
