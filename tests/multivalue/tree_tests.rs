//! Integration tests for matrix expression trees.

use std::collections::HashMap;

use ndarray::{arr2, Array2};
use paramcalc_rs::expr::Expr;
use paramcalc_rs::multivalue::{MatrixBinaryOp, MatrixExpr, RefResolver};
use paramcalc_rs::Result;

use crate::test_helpers::matrix_approx_eq;

/// Map-backed resolver; unbound symbols resolve to the 0x0 marker.
struct MapResolver(HashMap<String, Array2<f64>>);

impl MapResolver {
    fn new(pairs: &[(&str, Array2<f64>)]) -> Self {
        Self(
            pairs
                .iter()
                .map(|(name, values)| (name.to_string(), values.clone()))
                .collect(),
        )
    }
}

impl RefResolver for MapResolver {
    fn resolve(&mut self, symbol: &str) -> Result<Array2<f64>> {
        Ok(self
            .0
            .get(symbol)
            .cloned()
            .unwrap_or_else(|| Array2::zeros((0, 0))))
    }
}

fn translate(text: &str) -> MatrixExpr {
    MatrixExpr::from_ast(&Expr::parse(text).unwrap())
}

#[test]
fn test_infix_operators_on_mixed_shapes() {
    let mut resolver = MapResolver::new(&[
        ("block", arr2(&[[1.0, 2.0], [3.0, 4.0]])),
        ("row", arr2(&[[10.0, 20.0]])),
    ]);

    // The padded sum covers the union shape; the missing row of `row`
    // reads as zero.
    let result = translate("block + row").evaluate(&mut resolver).unwrap();
    assert_eq!(result, arr2(&[[11.0, 22.0], [3.0, 4.0]]));

    // Subtraction is a padded sum against the negated right operand.
    let result = translate("block - row").evaluate(&mut resolver).unwrap();
    assert_eq!(result, arr2(&[[-9.0, -18.0], [3.0, 4.0]]));

    // The star is the padded element-wise product, identity one.
    let result = translate("block * row").evaluate(&mut resolver).unwrap();
    assert_eq!(result, arr2(&[[10.0, 40.0], [3.0, 4.0]]));
}

#[test]
fn test_operation_chain_through_call_names() {
    // Select two site columns, scale them, then add a base load.
    let mut resolver = MapResolver::new(&[
        ("data", arr2(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]])),
        ("picks", arr2(&[[3.0], [1.0]])),
        ("scale", arr2(&[[10.0]])),
        ("base", arr2(&[[0.5, 0.5], [0.5, 0.5]])),
    ]);

    let tree = translate("proda(selcol(data, picks), scale) + base");
    assert!(tree.is_complete());

    let result = tree.evaluate(&mut resolver).unwrap();
    assert_eq!(result, arr2(&[[30.5, 10.5], [60.5, 40.5]]));
}

#[test]
fn test_unary_translations() {
    let mut resolver = MapResolver::new(&[("m", arr2(&[[1.0, 2.0], [3.0, 4.0]]))]);

    let result = translate("-m").evaluate(&mut resolver).unwrap();
    assert_eq!(result, arr2(&[[-1.0, -2.0], [-3.0, -4.0]]));

    let result = translate("transpose(m)").evaluate(&mut resolver).unwrap();
    assert_eq!(result, arr2(&[[1.0, 3.0], [2.0, 4.0]]));
}

#[test]
fn test_literals_and_named_constants_are_scalars() {
    let mut resolver = MapResolver::new(&[("column", arr2(&[[1.0], [2.0], [3.0]]))]);

    // proda broadcasts the 1x1 over the column.
    let result = translate("proda(column, 2)").evaluate(&mut resolver).unwrap();
    assert_eq!(result, arr2(&[[2.0], [4.0], [6.0]]));

    let result = translate("proda(column, pi)").evaluate(&mut resolver).unwrap();
    let expected = arr2(&[
        [std::f64::consts::PI],
        [2.0 * std::f64::consts::PI],
        [3.0 * std::f64::consts::PI],
    ]);
    assert!(matrix_approx_eq(&result, &expected, 1e-12));
}

#[test]
fn test_untranslatable_nodes_become_incomplete() {
    assert!(!translate("a / b").is_complete());
    assert!(!translate("a ^ 2").is_complete());
    assert!(!translate("sqrt(a)").is_complete());
    assert!(!translate("inner(a)").is_complete());
    assert!(translate("inner(a, b)").is_complete());
}

#[test]
fn test_incomplete_short_circuits_to_empty_result() {
    // The division subtree is incomplete, so the whole expression
    // evaluates to the 0x0 marker even though `a` resolves.
    let mut resolver = MapResolver::new(&[
        ("a", arr2(&[[1.0]])),
        ("b", arr2(&[[2.0]])),
    ]);

    let result = translate("a + b / 2").evaluate(&mut resolver).unwrap();
    assert_eq!(result.dim(), (0, 0));
}

#[test]
fn test_unbound_symbol_marks_run_incomplete() {
    let mut resolver = MapResolver::new(&[("a", arr2(&[[1.0]]))]);

    let tree = translate("a + missing");
    // The tree itself is complete; only resolution reveals the gap.
    assert!(tree.is_complete());

    let result = tree.evaluate(&mut resolver).unwrap();
    assert_eq!(result.dim(), (0, 0));
}

#[test]
fn test_numeric_trouble_stays_nan() {
    // The inner shapes do not line up for matmul, which degrades to
    // the 1x1 NaN sentinel rather than an error or a 0x0.
    let mut resolver = MapResolver::new(&[
        ("a", arr2(&[[1.0, 2.0]])),
        ("b", arr2(&[[3.0, 4.0]])),
    ]);

    let result = translate("matmul(a, b)").evaluate(&mut resolver).unwrap();
    assert_eq!(result.dim(), (1, 1));
    assert!(result[[0, 0]].is_nan());
}

#[test]
fn test_group_then_extreme_pipeline() {
    // Group rows by category, then pick the largest group sum.
    let mut resolver = MapResolver::new(&[
        ("load", arr2(&[[10.0], [20.0], [5.0], [40.0]])),
        ("region", arr2(&[[1.0], [2.0], [1.0], [2.0]])),
    ]);

    let tree = translate("maxn(groupsum(load, region), 1)");
    let result = tree.evaluate(&mut resolver).unwrap();

    // Region 2 sums to 60, reported with its one-based position.
    assert_eq!(result.dim(), (1, 3));
    assert_eq!(result[[0, 0]], 60.0);
    assert_eq!(result[[0, 1]], 2.0);
    assert_eq!(result[[0, 2]], 1.0);
}

#[test]
fn test_precedence_carries_into_matrix_tree() {
    let tree = translate("a + b * c");
    match tree {
        MatrixExpr::Binary(MatrixBinaryOp::Sum, _, right) => match *right {
            MatrixExpr::Binary(MatrixBinaryOp::Product, _, _) => {}
            other => panic!("expected a product on the right, got {:?}", other),
        },
        other => panic!("expected a sum at the root, got {:?}", other),
    }
}
