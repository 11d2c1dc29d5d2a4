//! Binding validation
//!
//! Before a calculation's symbol → parameter maps are committed, the
//! proposed configuration is checked against the model. Outcomes are
//! plain values rather than errors: a host presents them as
//! remediation hints and retries with a corrected proposal. The checks
//! run in a fixed order and the first failure wins.

use crate::engine::calculation::{BindingSet, Calculation};
use crate::engine::scheduler::{self, CalcDeps};
use crate::error::{CalcError, Result};
use crate::model::{ChangeEvent, CompId, EntityRef, ModelArena, ParamId};

/// Outcome of checking a proposed binding configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingValidation {
    /// All checks passed; the proposal may be committed.
    Valid,

    /// A bound parameter lies outside the owning component's subtree.
    ParamsNotOfThisOrChildComp,

    /// An input reads a pure output, or an output writes a parameter
    /// that is not writable.
    ParamWrongInfoflow,

    /// The same parameter appears as both input and output.
    ParamsInOutSame,

    /// Another calculation in scope already produces an output.
    ParamsOutDuplicate,

    /// Committing would make the component's dependency graph cyclic.
    CausesCalculationLoop,
}

impl BindingValidation {
    /// Whether the proposal passed every check.
    pub fn is_valid(&self) -> bool {
        matches!(self, BindingValidation::Valid)
    }
}

/// Validate proposed input/output maps for the calculation at `index`
/// of `comp`. Nothing is mutated.
///
/// `index` may equal the current calculation count, standing for a
/// calculation about to be appended.
///
/// # Returns
///
/// * `Ok(BindingValidation)` - The verdict of the first failing
///   check, or [`BindingValidation::Valid`].
/// * `Err(CalcError)` - The component does not exist, or a bound
///   parameter vanished mid-check.
pub fn validate_binding(
    arena: &ModelArena,
    comp: CompId,
    index: usize,
    inputs: &BindingSet,
    outputs: &BindingSet,
) -> Result<BindingValidation> {
    arena.component(comp)?;

    let input_targets: Vec<ParamId> = inputs.targets().collect();
    let output_targets: Vec<ParamId> = outputs.targets().collect();

    // 1. Every bound parameter must come from this subtree.
    for &param in input_targets.iter().chain(&output_targets) {
        if !arena.param_in_subtree(comp, param) {
            return Ok(BindingValidation::ParamsNotOfThisOrChildComp);
        }
    }

    // 2. Inputs must be readable.
    for &param in &input_targets {
        if !arena.parameter(param)?.propagation().readable_as_input() {
            return Ok(BindingValidation::ParamWrongInfoflow);
        }
    }

    // 3. No parameter on both sides.
    for &param in &input_targets {
        if output_targets.contains(&param) {
            return Ok(BindingValidation::ParamsInOutSame);
        }
    }

    // 4. Outputs must be writable.
    for &param in &output_targets {
        if !arena.parameter(param)?.propagation().writable_as_output() {
            return Ok(BindingValidation::ParamWrongInfoflow);
        }
    }

    // 5. No output may already be produced by another calculation in
    //    scope: the owning component and every ancestor.
    for ancestor in arena.ancestors_inclusive(comp) {
        let holder = arena.component(ancestor)?;
        for (i, calc) in holder.calculations().iter().enumerate() {
            if ancestor == comp && i == index {
                continue;
            }
            if calc
                .outputs()
                .targets()
                .any(|param| output_targets.contains(&param))
            {
                return Ok(BindingValidation::ParamsOutDuplicate);
            }
        }
    }

    // 6. The component must still have an evaluation order with the
    //    proposal in place.
    let mut deps = scheduler::component_deps(arena, comp)?;
    let replacement = CalcDeps {
        inputs: input_targets,
        outputs: output_targets,
    };
    if index < deps.len() {
        deps[index] = replacement;
    } else {
        deps.push(replacement);
    }
    if scheduler::schedule(&deps).is_err() {
        return Ok(BindingValidation::CausesCalculationLoop);
    }

    Ok(BindingValidation::Valid)
}

/// Validate and, when valid, commit proposed maps.
///
/// On commit the maps replace the calculation's bindings, its state is
/// recomputed, a change event is emitted and the component is brought
/// into evaluation order. The verdict is returned either way; nothing
/// is mutated unless it is [`BindingValidation::Valid`].
pub fn commit_binding(
    arena: &mut ModelArena,
    comp: CompId,
    index: usize,
    inputs: BindingSet,
    outputs: BindingSet,
) -> Result<BindingValidation> {
    let verdict = validate_binding(arena, comp, index, &inputs, &outputs)?;
    if !verdict.is_valid() {
        return Ok(verdict);
    }

    apply_bindings(arena, comp, index, inputs, outputs)?;
    scheduler::reorder_calculations(arena, comp)?;
    Ok(BindingValidation::Valid)
}

/// Commit maps without consulting the validator.
///
/// Reserved for hosts that manage consistency themselves; the
/// propagation contract is still enforced, and violating it is a
/// programmer error reported as [`CalcError::InvalidState`]. The
/// component is not reordered.
pub fn commit_binding_unchecked(
    arena: &mut ModelArena,
    comp: CompId,
    index: usize,
    inputs: BindingSet,
    outputs: BindingSet,
) -> Result<()> {
    for param in inputs.targets() {
        if !arena.parameter(param)?.propagation().readable_as_input() {
            return Err(CalcError::InvalidState(format!(
                "parameter {} cannot be read as an input",
                param
            )));
        }
    }
    for param in outputs.targets() {
        if !arena.parameter(param)?.propagation().writable_as_output() {
            return Err(CalcError::InvalidState(format!(
                "parameter {} cannot be written as an output",
                param
            )));
        }
    }
    apply_bindings(arena, comp, index, inputs, outputs)
}

fn apply_bindings(
    arena: &mut ModelArena,
    comp: CompId,
    index: usize,
    inputs: BindingSet,
    outputs: BindingSet,
) -> Result<()> {
    let component = arena.component_mut(comp)?;
    let calc = component
        .calculation_mut(index)
        .ok_or_else(|| CalcError::CalculationNotFound(format!("{} index {}", comp, index)))?;
    calc.replace_bindings(inputs, outputs);
    arena.emit(ChangeEvent::Replace(EntityRef::Calculation(comp, index)));
    Ok(())
}

/// Validate-and-commit a single input binding.
///
/// The symbol must be one the expression mentions; binding an unknown
/// input symbol is a usage error.
pub fn bind_input(
    arena: &mut ModelArena,
    comp: CompId,
    index: usize,
    symbol: &str,
    target: Option<ParamId>,
) -> Result<BindingValidation> {
    let (mut inputs, outputs) = current_maps(arena, comp, index)?;
    if !inputs.set_target(symbol, target) {
        return Err(CalcError::InvalidArgument(format!(
            "calculation has no input symbol '{}'",
            symbol
        )));
    }
    commit_binding(arena, comp, index, inputs, outputs)
}

/// Validate-and-commit a single output binding. The symbol is declared
/// on the fly if the calculation does not carry it yet.
pub fn bind_output(
    arena: &mut ModelArena,
    comp: CompId,
    index: usize,
    symbol: &str,
    target: Option<ParamId>,
) -> Result<BindingValidation> {
    let (inputs, mut outputs) = current_maps(arena, comp, index)?;
    outputs.insert(symbol).set_target(target);
    commit_binding(arena, comp, index, inputs, outputs)
}

fn current_maps(arena: &ModelArena, comp: CompId, index: usize) -> Result<(BindingSet, BindingSet)> {
    let component = arena.component(comp)?;
    let calc: &Calculation = component
        .calculation(index)
        .ok_or_else(|| CalcError::CalculationNotFound(format!("{} index {}", comp, index)))?;
    Ok((calc.inputs().clone(), calc.outputs().clone()))
}
