//! Evaluation ordering for the calculations of a component
//!
//! Calculations form a dependency graph through their parameter
//! bindings: a calculation that reads a parameter another calculation
//! writes must run after it. The scheduler computes an evaluation
//! order over detached dependency views, so callers can also probe
//! hypothetical binding configurations without touching the live
//! list. Ordering is stable: among ready calculations the one listed
//! first is scheduled first, so unrelated calculations keep their
//! relative positions.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::engine::calculation::Calculation;
use crate::error::Result;
use crate::model::{ChangeEvent, CompId, EntityRef, ModelArena, ParamId};

/// Errors raised while ordering calculations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    /// No evaluation order exists. The payload lists the positions
    /// (indices into the input set) that block each other.
    #[error("calculations at positions {0:?} form a dependency cycle")]
    Cycle(Vec<usize>),
}

/// Producer/consumer view of one calculation.
#[derive(Debug, Clone, Default)]
pub struct CalcDeps {
    /// Parameters read by the calculation (bound input targets).
    pub inputs: Vec<ParamId>,

    /// Parameters written by the calculation (bound output targets).
    pub outputs: Vec<ParamId>,
}

impl CalcDeps {
    /// Capture the current dependency view of a calculation.
    pub fn of(calc: &Calculation) -> Self {
        Self {
            inputs: calc.inputs().targets().collect(),
            outputs: calc.outputs().targets().collect(),
        }
    }
}

/// Compute an evaluation order over dependency views.
///
/// # Arguments
///
/// * `deps` - One dependency view per calculation, in list order.
///
/// # Returns
///
/// * `Ok(Vec<usize>)` - Indices into `deps` in evaluation order.
/// * `Err(ScheduleError::Cycle)` - No order exists; the error lists
///   the positions that could not be scheduled.
pub fn schedule(deps: &[CalcDeps]) -> std::result::Result<Vec<usize>, ScheduleError> {
    // Producers of each parameter within this set.
    let mut producers: HashMap<ParamId, Vec<usize>> = HashMap::new();
    for (index, dep) in deps.iter().enumerate() {
        for &param in &dep.outputs {
            producers.entry(param).or_default().push(index);
        }
    }

    // Unresolved predecessors: every in-set producer of an input. A
    // calculation reading its own output ends up as its own
    // predecessor and is reported as a cycle.
    let mut pending: Vec<HashSet<usize>> = deps
        .iter()
        .map(|dep| {
            dep.inputs
                .iter()
                .filter_map(|param| producers.get(param))
                .flatten()
                .copied()
                .collect()
        })
        .collect();

    let mut remaining: Vec<usize> = (0..deps.len()).collect();
    let mut order = Vec::with_capacity(deps.len());

    while !remaining.is_empty() {
        // First list-order calculation whose predecessors are all
        // scheduled.
        match remaining.iter().position(|&index| pending[index].is_empty()) {
            Some(position) => {
                let scheduled = remaining.remove(position);
                order.push(scheduled);
                for &index in &remaining {
                    pending[index].remove(&scheduled);
                }
            }
            None => return Err(ScheduleError::Cycle(remaining)),
        }
    }

    Ok(order)
}

/// Capture dependency views for every calculation of a component.
pub fn component_deps(arena: &ModelArena, comp: CompId) -> Result<Vec<CalcDeps>> {
    let component = arena.component(comp)?;
    Ok(component.calculations().iter().map(CalcDeps::of).collect())
}

/// Compute and apply the evaluation order of a component's
/// calculations.
///
/// On success the calculation list is permuted into evaluation order
/// and the applied order (indices into the previous list) is
/// returned. On a cycle the list is left exactly as it was and the
/// error reports the blocked positions.
pub fn reorder_calculations(arena: &mut ModelArena, comp: CompId) -> Result<Vec<usize>> {
    let deps = component_deps(arena, comp)?;
    let order = schedule(&deps)?;
    arena.component_mut(comp)?.apply_order(&order);
    arena.emit(ChangeEvent::Replace(EntityRef::Component(comp)));
    Ok(order)
}
