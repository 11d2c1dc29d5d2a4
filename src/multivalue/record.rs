//! Flat serialization of matrix expression trees
//!
//! A [`MatrixExpr`] flattens to two in-order sequences: the operation
//! tags and the leaves. Rebuilding replays them through the same
//! precedence rules the expression parser applies, with prefix unary
//! tags binding tightest, so any tree that parenthesis-free expression
//! text produces round-trips exactly. Groupings that only parentheses
//! or nested call arguments can express have no flat form and rebuild
//! in precedence shape instead.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use super::tree::{MatrixBinaryOp, MatrixExpr, MatrixUnaryOp};

/// One entry of the in-order operation sequence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum OpTag {
    Unary(MatrixUnaryOp),
    Binary(MatrixBinaryOp),
}

/// One entry of the in-order leaf sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LeafRecord {
    /// A parameter symbol.
    Symbol(String),

    /// An inline scalar constant (a 1x1 matrix).
    Scalar(f64),

    /// The incomplete-subtree marker. Constant matrices other than
    /// 1x1 have no record form and flatten to this as well.
    Empty,
}

/// Flat record of a [`MatrixExpr`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TreeRecord {
    /// Operation tags in in-order visit order.
    pub ops: Vec<OpTag>,

    /// Leaves in in-order visit order.
    pub leaves: Vec<LeafRecord>,
}

impl TreeRecord {
    /// Flatten a tree.
    pub fn from_tree(tree: &MatrixExpr) -> Self {
        let mut record = TreeRecord::default();
        record.visit(tree);
        record
    }

    fn visit(&mut self, node: &MatrixExpr) {
        match node {
            MatrixExpr::Constant(values) => {
                if values.nrows() == 1 && values.ncols() == 1 {
                    self.leaves.push(LeafRecord::Scalar(values[[0, 0]]));
                } else {
                    self.leaves.push(LeafRecord::Empty);
                }
            }
            MatrixExpr::ParameterRef(symbol) => {
                self.leaves.push(LeafRecord::Symbol(symbol.clone()));
            }
            MatrixExpr::Unary(op, child) => {
                self.ops.push(OpTag::Unary(*op));
                self.visit(child);
            }
            MatrixExpr::Binary(op, left, right) => {
                self.visit(left);
                self.ops.push(OpTag::Binary(*op));
                self.visit(right);
            }
        }
    }

    /// Rebuild a tree from the record.
    ///
    /// Binary tags claim operands by their precedence, left
    /// associatively; a unary tag applies to the operand that follows
    /// it. A record with too few leaves degrades to incomplete
    /// subtrees rather than failing, matching the evaluation-side
    /// policy for damaged input.
    pub fn build(&self) -> MatrixExpr {
        let mut replay = Replay {
            ops: &self.ops,
            leaves: &self.leaves,
            next_op: 0,
            next_leaf: 0,
        };
        replay.expression(0)
    }
}

struct Replay<'a> {
    ops: &'a [OpTag],
    leaves: &'a [LeafRecord],
    next_op: usize,
    next_leaf: usize,
}

impl Replay<'_> {
    fn expression(&mut self, min_precedence: u8) -> MatrixExpr {
        let mut left = self.operand();
        while let Some(OpTag::Binary(op)) = self.peek_op() {
            if op.precedence() < min_precedence {
                break;
            }
            self.next_op += 1;
            // Left associative: the right side only claims strictly
            // tighter operators.
            let right = self.expression(op.precedence() + 1);
            left = MatrixExpr::Binary(op, Box::new(left), Box::new(right));
        }
        left
    }

    fn operand(&mut self) -> MatrixExpr {
        if let Some(OpTag::Unary(op)) = self.peek_op() {
            self.next_op += 1;
            return MatrixExpr::Unary(op, Box::new(self.operand()));
        }
        self.leaf()
    }

    fn leaf(&mut self) -> MatrixExpr {
        let leaf = match self.leaves.get(self.next_leaf) {
            Some(leaf) => leaf,
            None => return MatrixExpr::incomplete(),
        };
        self.next_leaf += 1;
        match leaf {
            LeafRecord::Symbol(symbol) => MatrixExpr::ParameterRef(symbol.clone()),
            LeafRecord::Scalar(value) => MatrixExpr::Constant(Array2::from_elem((1, 1), *value)),
            LeafRecord::Empty => MatrixExpr::incomplete(),
        }
    }

    fn peek_op(&self) -> Option<OpTag> {
        self.ops.get(self.next_op).copied()
    }
}
