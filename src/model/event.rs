//! Change events recorded by the model arena
//!
//! Every structural or value mutation pushes an event onto the
//! arena's queue. Hosts drain the queue after a mutation or a batch
//! of mutations to refresh views or persist diffs; the engine itself
//! does not consume events.

use super::component::CompId;
use super::parameter::ParamId;
use super::table::TableId;

/// What an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityRef {
    Component(CompId),
    Parameter(ParamId),
    Table(TableId),
    /// A calculation, addressed by owning component and position.
    Calculation(CompId, usize),
}

/// A recorded model change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeEvent {
    /// An entity was created.
    Add(EntityRef),

    /// An entity was removed.
    Remove(EntityRef),

    /// An entity's value or content changed in place.
    Replace(EntityRef),

    /// The whole model was cleared.
    Reset,
}
