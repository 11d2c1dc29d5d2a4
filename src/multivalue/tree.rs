//! Matrix-valued expression trees
//!
//! A scalar expression tree is translated node by node into a
//! [`MatrixExpr`], replacing scalar arithmetic with matrix operations.
//! Subtrees the translation cannot express become an *incomplete*
//! marker, encoded as a 0x0 constant; evaluation short-circuits any
//! incomplete operand to an incomplete result instead of erroring, so
//! a half-translated calculation degrades quietly.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::expr::{named_constant, BinOp, Expr};
use crate::matrix;

/// Unary matrix operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatrixUnaryOp {
    Negate,
    Transpose,
}

impl MatrixUnaryOp {
    /// Apply the operation to a non-empty operand.
    pub fn apply(&self, a: &Array2<f64>) -> Result<Array2<f64>> {
        match self {
            MatrixUnaryOp::Negate => matrix::negate(a),
            MatrixUnaryOp::Transpose => matrix::transpose(a),
        }
    }

    /// The function name that denotes this operation in expression text.
    pub fn call_name(&self) -> &'static str {
        match self {
            MatrixUnaryOp::Negate => "neg",
            MatrixUnaryOp::Transpose => "transpose",
        }
    }
}

/// Binary matrix operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatrixBinaryOp {
    Sum,
    SumRepeatRows,
    SumRepeatAll,
    Product,
    ProductRepeatRows,
    ProductRepeatAll,
    InnerProduct,
    OuterProduct,
    OuterProductFlat,
    MatMul,
    SelectColumns,
    SelectColumnsStacked,
    SelectColumnsDiagonal,
    GroupSum,
    GroupAverage,
    GroupMin,
    GroupMax,
    ExtremesMin,
    ExtremesMax,
}

impl MatrixBinaryOp {
    /// Apply the operation to non-empty operands.
    pub fn apply(&self, a: &Array2<f64>, b: &Array2<f64>) -> Result<Array2<f64>> {
        match self {
            MatrixBinaryOp::Sum => matrix::sum_padded(a, b),
            MatrixBinaryOp::SumRepeatRows => matrix::sum_repeat_rows(a, b),
            MatrixBinaryOp::SumRepeatAll => matrix::sum_repeat_all(a, b),
            MatrixBinaryOp::Product => matrix::product_padded(a, b),
            MatrixBinaryOp::ProductRepeatRows => matrix::product_repeat_rows(a, b),
            MatrixBinaryOp::ProductRepeatAll => matrix::product_repeat_all(a, b),
            MatrixBinaryOp::InnerProduct => matrix::inner_product(a, b),
            MatrixBinaryOp::OuterProduct => matrix::outer_product(a, b),
            MatrixBinaryOp::OuterProductFlat => matrix::outer_product_flat(a, b),
            MatrixBinaryOp::MatMul => matrix::mat_mul(a, b),
            MatrixBinaryOp::SelectColumns => matrix::select_columns(a, b),
            MatrixBinaryOp::SelectColumnsStacked => matrix::select_columns_stacked(a, b),
            MatrixBinaryOp::SelectColumnsDiagonal => matrix::select_columns_diagonal(a, b),
            MatrixBinaryOp::GroupSum => matrix::group_by_sum(a, b),
            MatrixBinaryOp::GroupAverage => matrix::group_by_average(a, b),
            MatrixBinaryOp::GroupMin => matrix::group_by_min(a, b),
            MatrixBinaryOp::GroupMax => matrix::group_by_max(a, b),
            MatrixBinaryOp::ExtremesMin => matrix::extremes_min(a, b),
            MatrixBinaryOp::ExtremesMax => matrix::extremes_max(a, b),
        }
    }

    /// The function name that denotes this operation in expression text.
    pub fn call_name(&self) -> &'static str {
        match self {
            MatrixBinaryOp::Sum => "sum",
            MatrixBinaryOp::SumRepeatRows => "sumr",
            MatrixBinaryOp::SumRepeatAll => "suma",
            MatrixBinaryOp::Product => "prod",
            MatrixBinaryOp::ProductRepeatRows => "prodr",
            MatrixBinaryOp::ProductRepeatAll => "proda",
            MatrixBinaryOp::InnerProduct => "inner",
            MatrixBinaryOp::OuterProduct => "outer",
            MatrixBinaryOp::OuterProductFlat => "outerflat",
            MatrixBinaryOp::MatMul => "matmul",
            MatrixBinaryOp::SelectColumns => "selcol",
            MatrixBinaryOp::SelectColumnsStacked => "selcolstack",
            MatrixBinaryOp::SelectColumnsDiagonal => "selcoldiag",
            MatrixBinaryOp::GroupSum => "groupsum",
            MatrixBinaryOp::GroupAverage => "groupavg",
            MatrixBinaryOp::GroupMin => "groupmin",
            MatrixBinaryOp::GroupMax => "groupmax",
            MatrixBinaryOp::ExtremesMin => "minn",
            MatrixBinaryOp::ExtremesMax => "maxn",
        }
    }

    /// Map an expression-text function name to its operation.
    pub fn from_call_name(name: &str) -> Option<Self> {
        let op = match name {
            "sum" => MatrixBinaryOp::Sum,
            "sumr" => MatrixBinaryOp::SumRepeatRows,
            "suma" => MatrixBinaryOp::SumRepeatAll,
            "prod" => MatrixBinaryOp::Product,
            "prodr" => MatrixBinaryOp::ProductRepeatRows,
            "proda" => MatrixBinaryOp::ProductRepeatAll,
            "inner" => MatrixBinaryOp::InnerProduct,
            "outer" => MatrixBinaryOp::OuterProduct,
            "outerflat" => MatrixBinaryOp::OuterProductFlat,
            "matmul" => MatrixBinaryOp::MatMul,
            "selcol" => MatrixBinaryOp::SelectColumns,
            "selcolstack" => MatrixBinaryOp::SelectColumnsStacked,
            "selcoldiag" => MatrixBinaryOp::SelectColumnsDiagonal,
            "groupsum" => MatrixBinaryOp::GroupSum,
            "groupavg" => MatrixBinaryOp::GroupAverage,
            "groupmin" => MatrixBinaryOp::GroupMin,
            "groupmax" => MatrixBinaryOp::GroupMax,
            "minn" => MatrixBinaryOp::ExtremesMin,
            "maxn" => MatrixBinaryOp::ExtremesMax,
            _ => return None,
        };
        Some(op)
    }

    /// Binding strength when a flat record is rebuilt into a tree.
    ///
    /// Operators that came from infix text keep their text precedence;
    /// operations named by function calls bind tightest.
    pub(crate) fn precedence(&self) -> u8 {
        match self {
            MatrixBinaryOp::Sum | MatrixBinaryOp::SumRepeatRows | MatrixBinaryOp::SumRepeatAll => 1,
            MatrixBinaryOp::Product
            | MatrixBinaryOp::ProductRepeatRows
            | MatrixBinaryOp::ProductRepeatAll => 2,
            _ => 3,
        }
    }
}

/// Source of a parameter's matrix value during evaluation.
///
/// Implemented by the engine over the model arena; tests use simple
/// map-backed resolvers. Unbound symbols resolve to a 0x0 matrix,
/// marking the subtree incomplete rather than failing the run.
pub trait RefResolver {
    fn resolve(&mut self, symbol: &str) -> Result<Array2<f64>>;
}

/// A matrix-valued expression tree.
#[derive(Debug, Clone)]
pub enum MatrixExpr {
    /// A constant matrix. 1x1 for translated literals; 0x0 marks an
    /// incomplete subtree.
    Constant(Array2<f64>),

    /// A parameter symbol, resolved at evaluation time.
    ParameterRef(String),

    /// A unary operation.
    Unary(MatrixUnaryOp, Box<MatrixExpr>),

    /// A binary operation.
    Binary(MatrixBinaryOp, Box<MatrixExpr>, Box<MatrixExpr>),
}

fn scalar(value: f64) -> Array2<f64> {
    Array2::from_elem((1, 1), value)
}

fn empty() -> Array2<f64> {
    Array2::zeros((0, 0))
}

fn is_empty(m: &Array2<f64>) -> bool {
    m.nrows() == 0 || m.ncols() == 0
}

impl MatrixExpr {
    /// The incomplete-subtree marker.
    pub fn incomplete() -> Self {
        MatrixExpr::Constant(empty())
    }

    /// Translate a scalar expression tree.
    ///
    /// Literals and named constants become 1x1 matrices; `+` becomes
    /// the padded sum, binary `-` a padded sum with negated right
    /// operand, and `*` the padded element-wise product. Function
    /// calls translate through the operation names (see
    /// [`MatrixBinaryOp::from_call_name`]). Division, power and
    /// unknown calls have no matrix counterpart and yield the
    /// incomplete marker.
    pub fn from_ast(expr: &Expr) -> Self {
        match expr {
            Expr::Constant(value) => MatrixExpr::Constant(scalar(*value)),

            Expr::NamedConstant(name) => {
                MatrixExpr::Constant(scalar(named_constant(name).unwrap_or(f64::NAN)))
            }

            Expr::Variable(symbol) => MatrixExpr::ParameterRef(symbol.clone()),

            Expr::Binary(BinOp::Add, left, right) => MatrixExpr::Binary(
                MatrixBinaryOp::Sum,
                Box::new(Self::from_ast(left)),
                Box::new(Self::from_ast(right)),
            ),

            Expr::Binary(BinOp::Sub, left, right) => MatrixExpr::Binary(
                MatrixBinaryOp::Sum,
                Box::new(Self::from_ast(left)),
                Box::new(MatrixExpr::Unary(
                    MatrixUnaryOp::Negate,
                    Box::new(Self::from_ast(right)),
                )),
            ),

            Expr::Binary(BinOp::Mul, left, right) => MatrixExpr::Binary(
                MatrixBinaryOp::Product,
                Box::new(Self::from_ast(left)),
                Box::new(Self::from_ast(right)),
            ),

            Expr::Binary(BinOp::Div, _, _) | Expr::Binary(BinOp::Pow, _, _) => Self::incomplete(),

            Expr::Call(name, args) if name == "neg" && args.len() == 1 => {
                MatrixExpr::Unary(MatrixUnaryOp::Negate, Box::new(Self::from_ast(&args[0])))
            }

            Expr::Call(name, args) if name == "transpose" && args.len() == 1 => {
                MatrixExpr::Unary(MatrixUnaryOp::Transpose, Box::new(Self::from_ast(&args[0])))
            }

            Expr::Call(name, args) if args.len() == 2 => {
                match MatrixBinaryOp::from_call_name(name) {
                    Some(op) => MatrixExpr::Binary(
                        op,
                        Box::new(Self::from_ast(&args[0])),
                        Box::new(Self::from_ast(&args[1])),
                    ),
                    None => Self::incomplete(),
                }
            }

            Expr::Call(_, _) => Self::incomplete(),
        }
    }

    /// Whether the tree contains no incomplete marker.
    pub fn is_complete(&self) -> bool {
        match self {
            MatrixExpr::Constant(m) => !is_empty(m),
            MatrixExpr::ParameterRef(_) => true,
            MatrixExpr::Unary(_, child) => child.is_complete(),
            MatrixExpr::Binary(_, left, right) => left.is_complete() && right.is_complete(),
        }
    }

    /// Evaluate the tree against a resolver.
    ///
    /// Any incomplete operand, including an unbound symbol, makes the
    /// result incomplete (0x0). Numeric trouble inside an operation
    /// surfaces as NaN cells, never as a panic.
    pub fn evaluate(&self, resolver: &mut dyn RefResolver) -> Result<Array2<f64>> {
        match self {
            MatrixExpr::Constant(m) => Ok(m.clone()),

            MatrixExpr::ParameterRef(symbol) => resolver.resolve(symbol),

            MatrixExpr::Unary(op, child) => {
                let operand = child.evaluate(resolver)?;
                if is_empty(&operand) {
                    return Ok(empty());
                }
                op.apply(&operand)
            }

            MatrixExpr::Binary(op, left, right) => {
                let a = left.evaluate(resolver)?;
                if is_empty(&a) {
                    return Ok(empty());
                }
                let b = right.evaluate(resolver)?;
                if is_empty(&b) {
                    return Ok(empty());
                }
                op.apply(&a, &b)
            }
        }
    }
}
