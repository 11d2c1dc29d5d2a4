//! Expression tree for scalar calculations
//!
//! An expression is an immutable tree of constants, named constants,
//! parameter symbols, function calls and binary operators. Trees are
//! produced by the parser, printed back to canonical text via `Display`,
//! and turned into callable functions by the compiler.

use std::fmt;

/// Look up a named mathematical constant.
///
/// Identifiers found in this table parse as `Expr::NamedConstant`
/// rather than as parameter symbols.
pub fn named_constant(name: &str) -> Option<f64> {
    match name {
        "pi" => Some(std::f64::consts::PI),
        "e" => Some(std::f64::consts::E),
        "tau" => Some(std::f64::consts::TAU),
        "inf" => Some(f64::INFINITY),
        _ => None,
    }
}

/// Expression AST node
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal number
    Constant(f64),

    /// Named mathematical constant (pi, e, ...)
    NamedConstant(String),

    /// Parameter symbol reference
    Variable(String),

    /// Function call with arguments
    Call(String, Vec<Expr>),

    /// Binary operation
    Binary(BinOp, Box<Expr>, Box<Expr>),
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    /// Addition (+)
    Add,

    /// Subtraction (-)
    Sub,

    /// Multiplication (*)
    Mul,

    /// Division (/)
    Div,

    /// Power (^)
    Pow,
}

impl BinOp {
    /// The operator's text symbol.
    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Pow => "^",
        }
    }

    /// Binding strength, higher binds tighter.
    pub(crate) fn precedence(&self) -> u8 {
        match self {
            BinOp::Add | BinOp::Sub => 1,
            BinOp::Mul | BinOp::Div => 2,
            BinOp::Pow => 3,
        }
    }
}

impl Expr {
    /// Find all parameter symbols used in the expression.
    ///
    /// Symbols are returned in first-occurrence order, without
    /// duplicates. Named constants and function names do not count
    /// as symbols.
    ///
    /// # Examples
    ///
    /// ```
    /// use paramcalc_rs::expr::Expr;
    ///
    /// let expr = Expr::parse("a + b * a").unwrap();
    /// assert_eq!(expr.variables(), vec!["a".to_string(), "b".to_string()]);
    /// ```
    pub fn variables(&self) -> Vec<String> {
        let mut vars = Vec::new();
        self.collect_variables(&mut vars);
        vars
    }

    /// Recursively collect symbols in visitation order
    fn collect_variables(&self, vars: &mut Vec<String>) {
        match self {
            Self::Constant(_) | Self::NamedConstant(_) => {}

            Self::Variable(name) => {
                if !vars.contains(name) {
                    vars.push(name.clone());
                }
            }

            Self::Binary(_, left, right) => {
                left.collect_variables(vars);
                right.collect_variables(vars);
            }

            Self::Call(_, args) => {
                for arg in args {
                    arg.collect_variables(vars);
                }
            }
        }
    }

    /// Replace every occurrence of a symbol with a literal constant.
    ///
    /// Returns a new tree; the receiver is left untouched. Printing
    /// the result yields text that no longer mentions the symbol.
    ///
    /// # Examples
    ///
    /// ```
    /// use paramcalc_rs::expr::Expr;
    ///
    /// let expr = Expr::parse("a + b * 2").unwrap();
    /// let fixed = expr.substitute("b", 4.0);
    /// assert_eq!(fixed.to_string(), "a + 4 * 2");
    /// ```
    pub fn substitute(&self, symbol: &str, value: f64) -> Expr {
        match self {
            Self::Variable(name) if name == symbol => Expr::Constant(value),

            Self::Constant(_) | Self::NamedConstant(_) | Self::Variable(_) => self.clone(),

            Self::Binary(op, left, right) => Expr::Binary(
                *op,
                Box::new(left.substitute(symbol, value)),
                Box::new(right.substitute(symbol, value)),
            ),

            Self::Call(name, args) => Expr::Call(
                name.clone(),
                args.iter()
                    .map(|arg| arg.substitute(symbol, value))
                    .collect(),
            ),
        }
    }

    /// Write the node, parenthesizing when the surrounding operator
    /// binds tighter than this node does.
    fn fmt_prec(&self, f: &mut fmt::Formatter<'_>, parent: u8) -> fmt::Result {
        match self {
            Self::Constant(value) => write!(f, "{}", value),

            Self::NamedConstant(name) | Self::Variable(name) => write!(f, "{}", name),

            Self::Call(name, args) if name == "neg" && args.len() == 1 => {
                write!(f, "-(")?;
                args[0].fmt_prec(f, 0)?;
                write!(f, ")")
            }

            Self::Call(name, args) => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    arg.fmt_prec(f, 0)?;
                }
                write!(f, ")")
            }

            Self::Binary(op, left, right) => {
                let prec = op.precedence();
                let needs_parens = prec < parent;
                if needs_parens {
                    write!(f, "(")?;
                }
                // For left-associative operators the right operand binds
                // one step tighter; power associates the other way.
                let (left_prec, right_prec) = match op {
                    BinOp::Pow => (prec + 1, prec),
                    _ => (prec, prec + 1),
                };
                left.fmt_prec(f, left_prec)?;
                write!(f, " {} ", op.symbol())?;
                right.fmt_prec(f, right_prec)?;
                if needs_parens {
                    write!(f, ")")?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_prec(f, 0)
    }
}
