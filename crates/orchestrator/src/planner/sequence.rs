//! Dependency-aware ordering of plan actions.

use campaign_core::{Action, MAX_ACTION_PRIORITY};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::error::{OrchestratorError, Result};

/// Order actions so every action follows all of its dependencies.
///
/// Kahn's algorithm over the dependency graph; among actions that are ready
/// at the same time the one with the lower `(priority, estimated_duration)`
/// goes first. Afterwards each dependent's priority is raised above its
/// dependencies' so priorities read consistently with the order. The raise
/// stops at 10: a dependent of a priority-10 action ties with it, and only
/// the returned order tells them apart. Unknown dependency ids and cycles
/// are rejected.
pub fn sequence(actions: Vec<Action>) -> Result<Vec<Action>> {
    let ids: HashSet<Uuid> = actions.iter().map(|a| a.id).collect();
    if ids.len() != actions.len() {
        return Err(OrchestratorError::Planning(
            "duplicate action ids in plan".to_string(),
        ));
    }

    for action in &actions {
        if let Some(missing) = action.dependencies.iter().find(|d| !ids.contains(d)) {
            return Err(OrchestratorError::Planning(format!(
                "action {} depends on {} which is not part of the plan",
                action.action_type, missing
            )));
        }
    }

    let mut remaining_deps: HashMap<Uuid, usize> = actions
        .iter()
        .map(|a| {
            let distinct: HashSet<&Uuid> = a.dependencies.iter().collect();
            (a.id, distinct.len())
        })
        .collect();
    let mut dependents: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for action in &actions {
        let distinct: HashSet<&Uuid> = action.dependencies.iter().collect();
        for dep in distinct {
            dependents.entry(*dep).or_default().push(action.id);
        }
    }

    let total = actions.len();
    let mut pool: HashMap<Uuid, Action> = actions.into_iter().map(|a| (a.id, a)).collect();
    let mut ready: Vec<Uuid> = remaining_deps
        .iter()
        .filter(|(_, n)| **n == 0)
        .map(|(id, _)| *id)
        .collect();
    let mut ordered: Vec<Action> = Vec::with_capacity(total);

    while !ready.is_empty() {
        // Lowest (priority, duration) first; id breaks ties deterministically.
        ready.sort_by_key(|id| {
            let a = &pool[id];
            (a.priority, a.estimated_duration, a.id)
        });
        let next = ready.remove(0);
        let Some(action) = pool.remove(&next) else {
            continue;
        };

        if let Some(children) = dependents.get(&next) {
            for child in children {
                if let Some(count) = remaining_deps.get_mut(child) {
                    *count -= 1;
                    if *count == 0 {
                        ready.push(*child);
                    }
                }
            }
        }
        ordered.push(action);
    }

    if ordered.len() != total {
        let stuck: Vec<String> = pool.values().map(|a| a.action_type.to_string()).collect();
        return Err(OrchestratorError::Planning(format!(
            "dependency cycle between actions: {}",
            stuck.join(", ")
        )));
    }

    raise_dependent_priorities(&mut ordered);
    Ok(ordered)
}

fn raise_dependent_priorities(ordered: &mut [Action]) {
    let mut resolved: HashMap<Uuid, u8> = HashMap::new();
    for action in ordered.iter_mut() {
        let highest_dep = action
            .dependencies
            .iter()
            .filter_map(|d| resolved.get(d))
            .max()
            .copied();
        if let Some(dep_priority) = highest_dep {
            if action.priority <= dep_priority {
                action.priority = (dep_priority + 1).min(MAX_ACTION_PRIORITY);
            }
        }
        resolved.insert(action.id, action.priority);
    }
}
