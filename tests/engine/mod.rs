//! Engine tests
//!
//! This module organizes tests for the calculation engine: the
//! calculation lifecycle, dependency scheduling, binding validation
//! and evaluation.

// Calculation lifecycle tests
pub mod calculation_tests;



// Scalar and multi-value evaluation tests
pub mod evaluator_tests;
