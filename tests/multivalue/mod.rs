//! Tests for the multi-value translation layer
//!
//! This module organizes tests for matrix expression trees, their flat
//! records and per-binding randomization.

// Scalar-to-matrix tree translation tests
pub mod tree_tests;
