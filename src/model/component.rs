//! Components: the tree nodes that own parameters and calculations

use serde::{Deserialize, Serialize};
use std::fmt;

use super::parameter::ParamId;
use crate::engine::calculation::Calculation;

/// Identifier of a component within a [`crate::model::ModelArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CompId(pub u32);

impl fmt::Display for CompId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// A node of the component tree.
///
/// A component owns parameters and an ordered list of calculations.
/// Child and parent links are maintained by the arena; a calculation
/// of a component may only bind parameters from the component's own
/// subtree.
#[derive(Debug)]
pub struct Component {
    id: CompId,

    /// Display name of the component
    pub name: String,

    parent: Option<CompId>,
    children: Vec<CompId>,
    parameters: Vec<ParamId>,
    calculations: Vec<Calculation>,
}

impl Component {
    pub(crate) fn new(id: CompId, name: &str, parent: Option<CompId>) -> Self {
        Self {
            id,
            name: name.to_string(),
            parent,
            children: Vec::new(),
            parameters: Vec::new(),
            calculations: Vec::new(),
        }
    }

    /// The component's identifier.
    pub fn id(&self) -> CompId {
        self.id
    }

    /// The parent component, `None` for a root.
    pub fn parent(&self) -> Option<CompId> {
        self.parent
    }

    /// Child components in creation order.
    pub fn children(&self) -> &[CompId] {
        &self.children
    }

    /// Parameters owned by this component, in creation order.
    pub fn parameters(&self) -> &[ParamId] {
        &self.parameters
    }

    /// The ordered calculation list.
    pub fn calculations(&self) -> &[Calculation] {
        &self.calculations
    }

    /// A calculation by position.
    pub fn calculation(&self, index: usize) -> Option<&Calculation> {
        self.calculations.get(index)
    }

    /// A calculation by position, mutable.
    pub fn calculation_mut(&mut self, index: usize) -> Option<&mut Calculation> {
        self.calculations.get_mut(index)
    }

    pub(crate) fn add_child(&mut self, child: CompId) {
        self.children.push(child);
    }

    pub(crate) fn remove_child(&mut self, child: CompId) {
        self.children.retain(|&c| c != child);
    }

    pub(crate) fn add_parameter_id(&mut self, param: ParamId) {
        self.parameters.push(param);
    }

    pub(crate) fn remove_parameter_id(&mut self, param: ParamId) {
        self.parameters.retain(|&p| p != param);
    }

    pub(crate) fn push_calculation(&mut self, calc: Calculation) {
        self.calculations.push(calc);
    }

    pub(crate) fn take_calculation(&mut self, index: usize) -> Option<Calculation> {
        if index < self.calculations.len() {
            Some(self.calculations.remove(index))
        } else {
            None
        }
    }

    /// Reorder the calculation list by source indices.
    ///
    /// Indices missing from `order` keep their relative position at
    /// the end; out-of-range indices are ignored.
    pub(crate) fn apply_order(&mut self, order: &[usize]) {
        let mut taken: Vec<Option<Calculation>> = self.calculations.drain(..).map(Some).collect();
        let mut reordered = Vec::with_capacity(taken.len());
        for &idx in order {
            if let Some(slot) = taken.get_mut(idx) {
                if let Some(calc) = slot.take() {
                    reordered.push(calc);
                }
            }
        }
        for calc in taken.into_iter().flatten() {
            reordered.push(calc);
        }
        self.calculations = reordered;
    }
}
