//! Arena ownership of the component tree
//!
//! All components, parameters and result tables live in one arena and
//! refer to each other through integer ids. Cross-references such as
//! calculation bindings or table pointers never hold Rust references,
//! so removing an entity cannot dangle; lookups of a removed id fail
//! softly instead.
//!
//! Every mutation made through the arena is recorded on an internal
//! change-event queue that hosts drain via [`ModelArena::drain_events`].

use ndarray::Array2;
use std::collections::{HashMap, VecDeque};

use crate::engine::calculation::Calculation;
use crate::error::{CalcError, Result};

use super::component::{CompId, Component};
use super::event::{ChangeEvent, EntityRef};
use super::parameter::{ParamId, Parameter, Propagation, TablePointer};
use super::table::{ResultTable, TableId};

/// Owner of the whole data model.
#[derive(Debug, Default)]
pub struct ModelArena {
    components: HashMap<CompId, Component>,
    parameters: HashMap<ParamId, Parameter>,
    tables: HashMap<TableId, ResultTable>,
    roots: Vec<CompId>,
    next_component: u32,
    next_parameter: u32,
    next_table: u32,
    events: VecDeque<ChangeEvent>,
}

impl ModelArena {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove everything and record a reset event.
    pub fn clear(&mut self) {
        self.components.clear();
        self.parameters.clear();
        self.tables.clear();
        self.roots.clear();
        self.events.clear();
        self.events.push_back(ChangeEvent::Reset);
    }

    /// Drain the pending change events in emission order.
    pub fn drain_events(&mut self) -> Vec<ChangeEvent> {
        self.events.drain(..).collect()
    }

    pub(crate) fn emit(&mut self, event: ChangeEvent) {
        self.events.push_back(event);
    }

    // ---- components ----------------------------------------------------

    /// Create a component, optionally under a parent.
    pub fn add_component(&mut self, name: &str, parent: Option<CompId>) -> Result<CompId> {
        if let Some(parent_id) = parent {
            if !self.components.contains_key(&parent_id) {
                return Err(CalcError::ComponentNotFound(parent_id.to_string()));
            }
        }

        let id = CompId(self.next_component);
        self.next_component += 1;
        self.components.insert(id, Component::new(id, name, parent));

        match parent {
            Some(parent_id) => {
                if let Some(parent_comp) = self.components.get_mut(&parent_id) {
                    parent_comp.add_child(id);
                }
            }
            None => self.roots.push(id),
        }

        self.emit(ChangeEvent::Add(EntityRef::Component(id)));
        Ok(id)
    }

    /// Look up a component.
    pub fn component(&self, id: CompId) -> Result<&Component> {
        self.components
            .get(&id)
            .ok_or_else(|| CalcError::ComponentNotFound(id.to_string()))
    }

    /// Look up a component, mutable.
    pub fn component_mut(&mut self, id: CompId) -> Result<&mut Component> {
        self.components
            .get_mut(&id)
            .ok_or_else(|| CalcError::ComponentNotFound(id.to_string()))
    }

    /// Root components in creation order.
    pub fn roots(&self) -> &[CompId] {
        &self.roots
    }

    /// Number of live components.
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Remove a component and its whole subtree.
    ///
    /// All parameters of the subtree are removed first, which releases
    /// any calculation bindings to them across the arena.
    pub fn remove_component(&mut self, id: CompId) -> Result<()> {
        let subtree = self.subtree(id)?;

        for &comp_id in subtree.iter().rev() {
            let params: Vec<ParamId> = match self.components.get(&comp_id) {
                Some(comp) => comp.parameters().to_vec(),
                None => continue,
            };
            for param in params {
                let _ = self.remove_parameter(param);
            }
            if self.components.remove(&comp_id).is_some() {
                self.emit(ChangeEvent::Remove(EntityRef::Component(comp_id)));
            }
        }

        self.roots.retain(|&r| r != id);
        for comp in self.components.values_mut() {
            comp.remove_child(id);
        }
        Ok(())
    }

    /// Preorder walk of a component subtree, root first.
    pub fn subtree(&self, root: CompId) -> Result<Vec<CompId>> {
        if !self.components.contains_key(&root) {
            return Err(CalcError::ComponentNotFound(root.to_string()));
        }
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(comp_id) = stack.pop() {
            let comp = match self.components.get(&comp_id) {
                Some(c) => c,
                None => continue,
            };
            out.push(comp_id);
            for &child in comp.children().iter().rev() {
                stack.push(child);
            }
        }
        Ok(out)
    }

    /// Whether `comp` lies inside the subtree rooted at `root`.
    pub fn is_in_subtree(&self, root: CompId, comp: CompId) -> bool {
        let mut current = Some(comp);
        while let Some(id) = current {
            if id == root {
                return true;
            }
            current = self.components.get(&id).and_then(|c| c.parent());
        }
        false
    }

    /// The component and its ancestors, nearest first.
    pub fn ancestors_inclusive(&self, comp: CompId) -> Vec<CompId> {
        let mut out = Vec::new();
        let mut current = Some(comp);
        while let Some(id) = current {
            if !self.components.contains_key(&id) {
                break;
            }
            out.push(id);
            current = self.components.get(&id).and_then(|c| c.parent());
        }
        out
    }

    // ---- parameters -----------------------------------------------------

    /// Create a parameter owned by a component.
    pub fn add_parameter(
        &mut self,
        owner: CompId,
        name: &str,
        unit: &str,
        propagation: Propagation,
        value: f64,
    ) -> Result<ParamId> {
        if !self.components.contains_key(&owner) {
            return Err(CalcError::ComponentNotFound(owner.to_string()));
        }

        let id = ParamId(self.next_parameter);
        self.next_parameter += 1;
        self.parameters
            .insert(id, Parameter::new(id, owner, name, unit, propagation, value));
        if let Some(comp) = self.components.get_mut(&owner) {
            comp.add_parameter_id(id);
        }

        self.emit(ChangeEvent::Add(EntityRef::Parameter(id)));
        Ok(id)
    }

    /// Look up a parameter.
    pub fn parameter(&self, id: ParamId) -> Result<&Parameter> {
        self.parameters
            .get(&id)
            .ok_or_else(|| CalcError::ParameterNotFound(id.to_string()))
    }

    /// Look up a parameter, mutable.
    pub fn parameter_mut(&mut self, id: ParamId) -> Result<&mut Parameter> {
        self.parameters
            .get_mut(&id)
            .ok_or_else(|| CalcError::ParameterNotFound(id.to_string()))
    }

    /// Number of live parameters.
    pub fn parameter_count(&self) -> usize {
        self.parameters.len()
    }

    /// Set a parameter's scalar value.
    pub fn set_parameter_value(&mut self, id: ParamId, value: f64) -> Result<()> {
        self.parameter_mut(id)?.set_value(value);
        self.emit(ChangeEvent::Replace(EntityRef::Parameter(id)));
        Ok(())
    }

    /// Attach or clear a parameter's backing table pointer.
    pub fn set_parameter_table(&mut self, id: ParamId, pointer: Option<TablePointer>) -> Result<()> {
        self.parameter_mut(id)?.set_table(pointer);
        self.emit(ChangeEvent::Replace(EntityRef::Parameter(id)));
        Ok(())
    }

    /// Make a parameter alias another one.
    pub fn set_reference_target(&mut self, id: ParamId, target: Option<ParamId>) -> Result<()> {
        if let Some(target_id) = target {
            if !self.parameters.contains_key(&target_id) {
                return Err(CalcError::ParameterNotFound(target_id.to_string()));
            }
        }
        self.parameter_mut(id)?.set_reference_target(target);
        self.emit(ChangeEvent::Replace(EntityRef::Parameter(id)));
        Ok(())
    }

    /// Follow one level of reference indirection.
    ///
    /// A `FromReference` parameter with a live target resolves to the
    /// target; everything else resolves to itself.
    pub fn resolve_reference(&self, id: ParamId) -> Result<ParamId> {
        let param = self.parameter(id)?;
        if param.propagation() == Propagation::FromReference {
            if let Some(target) = param.reference_target() {
                if self.parameters.contains_key(&target) {
                    return Ok(target);
                }
            }
        }
        Ok(id)
    }

    /// A parameter's current scalar value after reference resolution.
    pub fn scalar_value(&self, id: ParamId) -> Result<f64> {
        let resolved = self.resolve_reference(id)?;
        Ok(self.parameter(resolved)?.value())
    }

    /// A parameter's current value as a matrix.
    ///
    /// Table-backed parameters yield their pointed sub-range; a stale
    /// pointer degrades to a 0x0 matrix. Plain parameters yield a 1x1
    /// matrix holding the scalar value.
    pub fn parameter_matrix(&self, id: ParamId) -> Result<Array2<f64>> {
        let resolved = self.resolve_reference(id)?;
        let param = self.parameter(resolved)?;
        match param.table() {
            Some(pointer) => match self.tables.get(&pointer.table) {
                Some(table) => Ok(table.value_range(&pointer.rows, &pointer.cols)),
                None => Ok(Array2::zeros((0, 0))),
            },
            None => Ok(Array2::from_elem((1, 1), param.value())),
        }
    }

    /// Whether a parameter's owner lies inside a component subtree.
    pub fn param_in_subtree(&self, root: CompId, param: ParamId) -> bool {
        match self.parameters.get(&param) {
            Some(p) => self.is_in_subtree(root, p.owner()),
            None => false,
        }
    }

    /// Find a parameter in a subtree by name, unit and propagation.
    ///
    /// The subtree is searched depth-first in child order; the first
    /// match wins. Used when relocating calculations between
    /// components.
    pub fn find_corresponding_parameter(
        &self,
        root: CompId,
        name: &str,
        unit: &str,
        propagation: Propagation,
    ) -> Option<ParamId> {
        let mut stack = vec![root];
        while let Some(comp_id) = stack.pop() {
            let comp = match self.components.get(&comp_id) {
                Some(c) => c,
                None => continue,
            };
            for &pid in comp.parameters() {
                if let Some(param) = self.parameters.get(&pid) {
                    if param.name == name
                        && param.unit == unit
                        && param.propagation() == propagation
                    {
                        return Some(pid);
                    }
                }
            }
            for &child in comp.children().iter().rev() {
                stack.push(child);
            }
        }
        None
    }

    /// Remove a parameter.
    ///
    /// Before the parameter disappears, every calculation binding that
    /// targets it is released and reference aliases to it are cleared,
    /// so nothing in the arena is left pointing at a dead id.
    pub fn remove_parameter(&mut self, id: ParamId) -> Result<Parameter> {
        if !self.parameters.contains_key(&id) {
            return Err(CalcError::ParameterNotFound(id.to_string()));
        }

        self.emit(ChangeEvent::Remove(EntityRef::Parameter(id)));

        // Auto-unbind across all calculations.
        for comp in self.components.values_mut() {
            for idx in 0..comp.calculations().len() {
                if let Some(calc) = comp.calculation_mut(idx) {
                    calc.release_param(id);
                }
            }
        }

        // Drop reference aliases.
        for param in self.parameters.values_mut() {
            if param.reference_target() == Some(id) {
                param.set_reference_target(None);
            }
        }

        let removed = self
            .parameters
            .remove(&id)
            .ok_or_else(|| CalcError::ParameterNotFound(id.to_string()))?;
        if let Some(comp) = self.components.get_mut(&removed.owner()) {
            comp.remove_parameter_id(id);
        }
        Ok(removed)
    }

    // ---- calculations ---------------------------------------------------

    /// Append a calculation to a component, returning its position.
    pub fn add_calculation(&mut self, comp: CompId, calc: Calculation) -> Result<usize> {
        let component = self.component_mut(comp)?;
        component.push_calculation(calc);
        let index = component.calculations().len() - 1;
        self.emit(ChangeEvent::Add(EntityRef::Calculation(comp, index)));
        Ok(index)
    }

    /// Remove a calculation, releasing all of its bindings.
    pub fn remove_calculation(&mut self, comp: CompId, index: usize) -> Result<Calculation> {
        let component = self.component_mut(comp)?;
        let mut calc = component.take_calculation(index).ok_or_else(|| {
            CalcError::CalculationNotFound(format!("{} index {}", comp, index))
        })?;
        calc.release_all_bindings();
        self.emit(ChangeEvent::Remove(EntityRef::Calculation(comp, index)));
        Ok(calc)
    }

    /// Move a calculation to another component.
    ///
    /// Bindings are re-targeted to corresponding parameters of the
    /// destination subtree, matched by name, unit and propagation;
    /// symbols without a correspondence become unbound.
    pub fn relocate_calculation(
        &mut self,
        from: CompId,
        index: usize,
        to: CompId,
    ) -> Result<usize> {
        if !self.components.contains_key(&to) {
            return Err(CalcError::ComponentNotFound(to.to_string()));
        }

        let component = self.component_mut(from)?;
        let mut calc = component.take_calculation(index).ok_or_else(|| {
            CalcError::CalculationNotFound(format!("{} index {}", from, index))
        })?;
        self.emit(ChangeEvent::Remove(EntityRef::Calculation(from, index)));

        // Plan the re-targeting against the destination subtree.
        let mut plan: Vec<(String, bool, Option<ParamId>)> = Vec::new();
        for (is_output, set) in [(false, calc.inputs()), (true, calc.outputs())] {
            for binding in set.iter() {
                if let Some(old_target) = binding.target() {
                    let replacement = self.parameter(old_target).ok().and_then(|param| {
                        self.find_corresponding_parameter(
                            to,
                            &param.name,
                            &param.unit,
                            param.propagation(),
                        )
                    });
                    plan.push((binding.symbol().to_string(), is_output, replacement));
                }
            }
        }
        for (symbol, is_output, replacement) in plan {
            if is_output {
                calc.outputs_mut().set_target(&symbol, replacement);
            } else {
                calc.inputs_mut().set_target(&symbol, replacement);
            }
        }
        calc.recompute_state();

        let destination = self.component_mut(to)?;
        destination.push_calculation(calc);
        let new_index = destination.calculations().len() - 1;
        self.emit(ChangeEvent::Add(EntityRef::Calculation(to, new_index)));
        Ok(new_index)
    }

    // ---- result tables --------------------------------------------------

    /// Create a result table with default headers.
    pub fn add_table(&mut self, name: &str, values: Array2<f64>) -> TableId {
        let id = TableId(self.next_table);
        self.next_table += 1;
        self.tables.insert(id, ResultTable::new(id, name, values));
        self.emit(ChangeEvent::Add(EntityRef::Table(id)));
        id
    }

    /// Create a result table with explicit headers.
    pub fn add_table_with_headers(
        &mut self,
        name: &str,
        values: Array2<f64>,
        row_headers: Vec<String>,
        col_headers: Vec<String>,
    ) -> TableId {
        let id = TableId(self.next_table);
        self.next_table += 1;
        self.tables.insert(
            id,
            ResultTable::with_headers(id, name, values, row_headers, col_headers),
        );
        self.emit(ChangeEvent::Add(EntityRef::Table(id)));
        id
    }

    /// Look up a table.
    pub fn table(&self, id: TableId) -> Result<&ResultTable> {
        self.tables
            .get(&id)
            .ok_or_else(|| CalcError::TableNotFound(id.to_string()))
    }

    /// Number of live tables.
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// Replace a table's values in place, keeping id and headers.
    ///
    /// Returns false when the new values have a different shape; the
    /// table is then left untouched.
    pub fn replace_table_values(&mut self, id: TableId, values: Array2<f64>) -> Result<bool> {
        let table = self
            .tables
            .get_mut(&id)
            .ok_or_else(|| CalcError::TableNotFound(id.to_string()))?;
        let replaced = table.replace_values(values);
        if replaced {
            self.emit(ChangeEvent::Replace(EntityRef::Table(id)));
        }
        Ok(replaced)
    }

    /// Remove a table, clearing any parameter pointers into it.
    pub fn remove_table(&mut self, id: TableId) -> Result<ResultTable> {
        let removed = self
            .tables
            .remove(&id)
            .ok_or_else(|| CalcError::TableNotFound(id.to_string()))?;

        let pointing: Vec<ParamId> = self
            .parameters
            .values()
            .filter(|p| p.table().map(|t| t.table) == Some(id))
            .map(|p| p.id())
            .collect();
        for param in pointing {
            if let Some(p) = self.parameters.get_mut(&param) {
                p.set_table(None);
            }
            self.emit(ChangeEvent::Replace(EntityRef::Parameter(param)));
        }

        self.emit(ChangeEvent::Remove(EntityRef::Table(id)));
        Ok(removed)
    }
}
