//! # paramcalc-rs
//!
//! `paramcalc-rs` is a calculation engine for parameters of
//! hierarchical component models: named expressions are parsed,
//! compiled and bound to parameters of a component tree, evaluated in
//! dependency order, and optionally iterated over whole matrices with
//! randomized inputs.
//!
//! The library provides:
//! - An expression parser and compiler for scalar arithmetic over
//!   named symbols
//! - A matrix operation catalog with padding, selection, grouping and
//!   extreme-value semantics
//! - A component/parameter model held in an arena, with change events
//! - Binding validation, dependency scheduling with cycle detection,
//!   and scalar/multi-value evaluation
//!
//! ## Basic Usage
//!
//! ```
//! use paramcalc_rs::engine::{self, Calculation};
//! use paramcalc_rs::model::{ModelArena, Propagation};
//!
//! let mut arena = ModelArena::new();
//! let plant = arena.add_component("plant", None).unwrap();
//! let input = arena
//!     .add_parameter(plant, "load", "kW", Propagation::Input, 4.0)
//!     .unwrap();
//! let output = arena
//!     .add_parameter(plant, "demand", "kW", Propagation::Output, 0.0)
//!     .unwrap();
//!
//! let index = arena
//!     .add_calculation(plant, Calculation::new("demand", "load * 2 + 1"))
//!     .unwrap();
//! engine::bind_input(&mut arena, plant, index, "load", Some(input)).unwrap();
//! engine::bind_output(&mut arena, plant, index, "value", Some(output)).unwrap();
//!
//! let value = engine::evaluate_scalar(&mut arena, plant, index, None).unwrap();
//! assert_eq!(value, 9.0);
//! assert_eq!(arena.parameter(output).unwrap().value(), 9.0);
//! ```

// Public modules
pub mod error;

// Expression parsing and compilation
pub mod expr;

// Matrix operation catalog
pub mod matrix;

// Component tree, parameters and result tables
pub mod model;

// Matrix expression trees, randomization and flat records
pub mod multivalue;

// Calculations, scheduling, validation and evaluation
pub mod engine;

// Re-exports for convenience
pub use error::{CalcError, Result};

pub use engine::{BindingValidation, Calculation};

pub use model::ModelArena;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
