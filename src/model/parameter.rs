//! Parameter definition and implementation
//!
//! This module provides the Parameter struct, the fundamental building
//! block of the data model. A parameter carries a scalar value, may be
//! backed by a sub-range of a result table, and declares through its
//! propagation direction how calculations are allowed to use it.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::component::CompId;
use super::table::TableId;

/// Identifier of a parameter within a [`crate::model::ModelArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParamId(pub u32);

impl fmt::Display for ParamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

/// Information flow direction of a parameter.
///
/// The direction decides which side of a calculation a parameter can
/// legally bind to: inputs may not be pure outputs, and outputs must
/// be writable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Propagation {
    /// Externally supplied value, read-only for calculations.
    Input,

    /// Produced by a calculation, read-only for everyone else.
    Output,

    /// Both readable and writable by calculations.
    Mixed,

    /// Aliases another parameter's value.
    FromReference,
}

impl Propagation {
    /// Whether a calculation may read this parameter as an input.
    pub fn readable_as_input(&self) -> bool {
        !matches!(self, Propagation::Output)
    }

    /// Whether a calculation may write this parameter as an output.
    pub fn writable_as_output(&self) -> bool {
        matches!(self, Propagation::Output | Propagation::Mixed)
    }
}

/// Half-open selection over one axis of a table.
///
/// `start` is a zero-based offset; `len` of `None` extends to the end
/// of the axis. Selections are clamped to the actual extent when
/// resolved, so a stale selector degrades to an empty range rather
/// than a panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RangeSel {
    pub start: usize,
    pub len: Option<usize>,
}

impl RangeSel {
    /// Select everything.
    pub fn full() -> Self {
        Self::default()
    }

    /// Select `len` entries starting at `start`.
    pub fn slice(start: usize, len: usize) -> Self {
        Self {
            start,
            len: Some(len),
        }
    }

    /// Whether the selection covers a whole axis regardless of extent.
    pub fn is_full(&self) -> bool {
        self.start == 0 && self.len.is_none()
    }

    /// Clamp to an axis of the given extent, returning `start..end`.
    pub fn resolve(&self, extent: usize) -> (usize, usize) {
        let start = self.start.min(extent);
        let end = match self.len {
            Some(len) => (start + len).min(extent),
            None => extent,
        };
        (start, end)
    }
}

/// Pointer from a parameter to a sub-range of a result table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TablePointer {
    /// The backing table.
    pub table: TableId,

    /// Row selection within the table.
    pub rows: RangeSel,

    /// Column selection within the table.
    pub cols: RangeSel,
}

impl TablePointer {
    /// Point at a whole table.
    pub fn full(table: TableId) -> Self {
        Self {
            table,
            rows: RangeSel::full(),
            cols: RangeSel::full(),
        }
    }
}

/// A parameter of a component.
///
/// Parameters hold a scalar value at all times. A parameter produced
/// by a multi-value calculation additionally points at a result table;
/// scalar evaluation clears that pointer again when it overwrites the
/// value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    id: ParamId,
    owner: CompId,

    /// Name of the parameter
    pub name: String,

    /// Unit label, matched verbatim when relocating calculations
    pub unit: String,

    propagation: Propagation,
    value: f64,
    table: Option<TablePointer>,
    reference_target: Option<ParamId>,
}

impl Parameter {
    /// Create a new parameter.
    ///
    /// Typically parameters are created through
    /// [`crate::model::ModelArena::add_parameter`], which assigns the
    /// identifiers.
    pub fn new(
        id: ParamId,
        owner: CompId,
        name: &str,
        unit: &str,
        propagation: Propagation,
        value: f64,
    ) -> Self {
        Self {
            id,
            owner,
            name: name.to_string(),
            unit: unit.to_string(),
            propagation,
            value,
            table: None,
            reference_target: None,
        }
    }

    /// The parameter's identifier.
    pub fn id(&self) -> ParamId {
        self.id
    }

    /// The component that owns this parameter.
    pub fn owner(&self) -> CompId {
        self.owner
    }

    /// The information flow direction.
    pub fn propagation(&self) -> Propagation {
        self.propagation
    }

    /// Get the current scalar value.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Set the scalar value. The table pointer, if any, is untouched.
    pub fn set_value(&mut self, value: f64) {
        self.value = value;
    }

    /// The backing table pointer, if the parameter is table-valued.
    pub fn table(&self) -> Option<&TablePointer> {
        self.table.as_ref()
    }

    /// Attach or clear the backing table pointer.
    pub fn set_table(&mut self, pointer: Option<TablePointer>) {
        self.table = pointer;
    }

    /// The aliased parameter for `Propagation::FromReference`.
    pub fn reference_target(&self) -> Option<ParamId> {
        self.reference_target
    }

    /// Point this parameter at another one.
    pub fn set_reference_target(&mut self, target: Option<ParamId>) {
        self.reference_target = target;
    }
}
