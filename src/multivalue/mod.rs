//! Multi-value calculation support
//!
//! In multi-value mode a calculation's scalar expression is translated
//! into a matrix expression [`tree`], evaluated against table-backed
//! parameter values with optional perturbation ([`randomize`]), and
//! persisted through the flat [`record`] form.

pub mod randomize;
pub mod record;
pub mod tree;

pub use randomize::{
    randomize_matrix, randomize_value, DeviationMode, NormalRandomizer, ParameterMetaData,
    Randomizer,
};
pub use record::{LeafRecord, OpTag, TreeRecord};
pub use tree::{MatrixBinaryOp, MatrixExpr, MatrixUnaryOp, RefResolver};
