//! Compilation of expression trees into callable functions
//!
//! A compiled expression is a closure from a symbol scope to a single
//! `f64`. Evaluation is total: missing symbols, unknown functions and
//! numeric edge cases all produce NaN instead of an error, so a batch
//! of calculations can always run to completion.

use std::collections::HashMap;
use std::fmt;

use super::ast::{named_constant, BinOp, Expr};

/// Scope providing symbol values during evaluation
#[derive(Debug, Clone, Default)]
pub struct EvalScope {
    /// Map of symbol names to values
    values: HashMap<String, f64>,
}

impl EvalScope {
    /// Create a new empty scope
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    /// Set a symbol value
    pub fn set(&mut self, name: &str, value: f64) {
        self.values.insert(name.to_string(), value);
    }

    /// Get a symbol value
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    /// Remove a symbol
    pub fn remove(&mut self, name: &str) -> Option<f64> {
        self.values.remove(name)
    }

    /// Create a scope from an existing map
    pub fn with_values(values: HashMap<String, f64>) -> Self {
        Self { values }
    }
}

impl From<HashMap<String, f64>> for EvalScope {
    fn from(values: HashMap<String, f64>) -> Self {
        Self { values }
    }
}

/// Compiled evaluation function
type EvalFn = Box<dyn Fn(&EvalScope) -> f64 + Send + Sync>;

/// Options controlling expression compilation
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Inline named constants as literals. When false, constants are
    /// resolved through the lookup table on every call, which keeps
    /// them visible to debugging hosts.
    pub inline_constants: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            inline_constants: true,
        }
    }
}

/// An expression compiled down to a callable function.
///
/// Carries the symbol list of the source tree so hosts can connect
/// scope entries to parameter bindings without keeping the tree
/// around.
pub struct CompiledExpr {
    func: EvalFn,
    symbols: Vec<String>,
}

impl CompiledExpr {
    /// Evaluate against a scope.
    ///
    /// Symbols missing from the scope evaluate to NaN.
    pub fn eval(&self, scope: &EvalScope) -> f64 {
        (self.func)(scope)
    }

    /// The symbols the expression reads, in first-occurrence order.
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }
}

impl fmt::Debug for CompiledExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledExpr")
            .field("symbols", &self.symbols)
            .finish()
    }
}

impl Expr {
    /// Compile the expression into a callable function.
    ///
    /// # Examples
    ///
    /// ```
    /// use paramcalc_rs::expr::{CompileOptions, EvalScope, Expr};
    ///
    /// let compiled = Expr::parse("a + b * 2")
    ///     .unwrap()
    ///     .compile(&CompileOptions::default());
    ///
    /// let mut scope = EvalScope::new();
    /// scope.set("a", 3.0);
    /// scope.set("b", 4.0);
    /// assert_eq!(compiled.eval(&scope), 11.0);
    /// ```
    pub fn compile(&self, options: &CompileOptions) -> CompiledExpr {
        CompiledExpr {
            func: compile_node(self, options),
            symbols: self.variables(),
        }
    }
}

fn compile_node(expr: &Expr, options: &CompileOptions) -> EvalFn {
    match expr {
        Expr::Constant(value) => {
            let value = *value;
            Box::new(move |_| value)
        }

        Expr::NamedConstant(name) => {
            if options.inline_constants {
                let value = named_constant(name).unwrap_or(f64::NAN);
                Box::new(move |_| value)
            } else {
                let name = name.clone();
                Box::new(move |_| named_constant(&name).unwrap_or(f64::NAN))
            }
        }

        Expr::Variable(name) => {
            let name = name.clone();
            Box::new(move |scope| scope.get(&name).unwrap_or(f64::NAN))
        }

        Expr::Binary(op, left, right) => {
            let lhs = compile_node(left, options);
            let rhs = compile_node(right, options);
            match op {
                BinOp::Add => Box::new(move |s| lhs(s) + rhs(s)),
                BinOp::Sub => Box::new(move |s| lhs(s) - rhs(s)),
                BinOp::Mul => Box::new(move |s| lhs(s) * rhs(s)),
                BinOp::Div => Box::new(move |s| lhs(s) / rhs(s)),
                BinOp::Pow => Box::new(move |s| lhs(s).powf(rhs(s))),
            }
        }

        Expr::Call(name, args) => compile_call(name, args, options),
    }
}

fn compile_call(name: &str, args: &[Expr], options: &CompileOptions) -> EvalFn {
    let compiled: Vec<EvalFn> = args.iter().map(|arg| compile_node(arg, options)).collect();

    match (name, compiled.len()) {
        ("neg", 1) => unary_fn(compiled, |v| -v),
        ("sin", 1) => unary_fn(compiled, f64::sin),
        ("cos", 1) => unary_fn(compiled, f64::cos),
        ("tan", 1) => unary_fn(compiled, f64::tan),
        ("asin", 1) => unary_fn(compiled, f64::asin),
        ("acos", 1) => unary_fn(compiled, f64::acos),
        ("atan", 1) => unary_fn(compiled, f64::atan),
        ("sinh", 1) => unary_fn(compiled, f64::sinh),
        ("cosh", 1) => unary_fn(compiled, f64::cosh),
        ("tanh", 1) => unary_fn(compiled, f64::tanh),
        ("exp", 1) => unary_fn(compiled, f64::exp),
        ("log", 1) | ("ln", 1) => unary_fn(compiled, f64::ln),
        ("log10", 1) => unary_fn(compiled, f64::log10),
        ("sqrt", 1) => unary_fn(compiled, f64::sqrt),
        ("abs", 1) => unary_fn(compiled, f64::abs),
        ("floor", 1) => unary_fn(compiled, f64::floor),
        ("ceil", 1) => unary_fn(compiled, f64::ceil),
        ("round", 1) => unary_fn(compiled, f64::round),
        ("sign", 1) => unary_fn(compiled, |v| {
            if v > 0.0 {
                1.0
            } else if v < 0.0 {
                -1.0
            } else {
                v
            }
        }),
        // A scalar is its own transpose; the matrix engine overrides
        // this for multi-value trees.
        ("transpose", 1) => unary_fn(compiled, |v| v),
        ("pow", 2) => binary_fn(compiled, f64::powf),
        ("min", n) if n >= 2 => Box::new(move |scope| {
            compiled
                .iter()
                .fold(f64::INFINITY, |acc, arg| acc.min(arg(scope)))
        }),
        ("max", n) if n >= 2 => Box::new(move |scope| {
            compiled
                .iter()
                .fold(f64::NEG_INFINITY, |acc, arg| acc.max(arg(scope)))
        }),
        // Unknown function or wrong arity: evaluation stays total and
        // reports NaN.
        _ => Box::new(|_| f64::NAN),
    }
}

fn unary_fn(mut args: Vec<EvalFn>, f: impl Fn(f64) -> f64 + Send + Sync + 'static) -> EvalFn {
    let arg = args.remove(0);
    Box::new(move |scope| f(arg(scope)))
}

fn binary_fn(mut args: Vec<EvalFn>, f: fn(f64, f64) -> f64) -> EvalFn {
    let a = args.remove(0);
    let b = args.remove(0);
    Box::new(move |scope| f(a(scope), b(scope)))
}
