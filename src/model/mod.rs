//! The component/parameter data model
//!
//! Components form a tree; each owns parameters and an ordered list of
//! calculations. Everything lives in a [`ModelArena`] and is addressed
//! by integer ids, never by references, so the engine can rewire
//! bindings and delete entities without lifetime gymnastics. The arena
//! records every mutation as a [`ChangeEvent`] for hosts to drain.

pub mod arena;
pub mod component;
pub mod event;
pub mod parameter;
pub mod table;

pub use arena::ModelArena;
pub use component::{CompId, Component};
pub use event::{ChangeEvent, EntityRef};
pub use parameter::{ParamId, Parameter, Propagation, RangeSel, TablePointer};
pub use table::{ResultTable, TableId};
