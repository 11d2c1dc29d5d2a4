//! Expression parsing and compilation for scalar calculations
//!
//! This module provides the text-to-tree-to-function pipeline used by
//! every calculation:
//!
//! - [`Expr::parse`] turns expression text into an immutable tree,
//! - [`Expr::substitute`] and [`std::fmt::Display`] support rewriting
//!   and reprinting expressions,
//! - [`Expr::compile`] lowers a tree into a reusable closure over an
//!   [`EvalScope`].
//!
//! The same trees feed the multi-value translation in
//! [`crate::multivalue`].

pub mod ast;
pub mod compile;
pub mod parser;

pub use ast::{named_constant, BinOp, Expr};
pub use compile::{CompileOptions, CompiledExpr, EvalScope};
pub use parser::ExprError;
