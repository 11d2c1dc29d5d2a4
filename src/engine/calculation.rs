//! Calculations: named expressions bound to model parameters
//!
//! A [`Calculation`] owns an expression text, its parsed and compiled
//! forms, and two ordered symbol maps: inputs discovered from the
//! expression and outputs declared by the host. Setting new expression
//! text re-parses immediately and diffs the input map, so bindings of
//! surviving symbols are never lost to an edit. A validity state is
//! recomputed after every change unless a batch suppresses it.

use serde::{Deserialize, Serialize};

use crate::expr::{CompileOptions, CompiledExpr, Expr};
use crate::model::ParamId;
use crate::multivalue::{MatrixExpr, ParameterMetaData, TreeRecord};

/// How the results of a multi-value run are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregationMethod {
    /// Element-wise mean over all iterations, one result table.
    Average,

    /// One result table per iteration.
    Separate,
}

impl Default for AggregationMethod {
    fn default() -> Self {
        AggregationMethod::Average
    }
}

/// Validity flags of a calculation.
///
/// Flags are recomputed after every mutation (outside batches) and
/// never block evaluation; an invalid calculation simply evaluates to
/// NaN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CalcState {
    /// An input symbol is unbound, or no output symbol is bound.
    pub param_not_bound: bool,

    /// The expression text failed to parse.
    pub invalid_expression: bool,
}

impl CalcState {
    /// Whether the calculation can produce a meaningful result.
    pub fn is_valid(&self) -> bool {
        !self.param_not_bound && !self.invalid_expression
    }
}

/// One symbol of a calculation and its parameter target.
///
/// Multi-value runs read the per-binding metadata for sub-range
/// selection and randomization.
#[derive(Debug, Clone)]
pub struct ParameterBinding {
    symbol: String,
    target: Option<ParamId>,
    meta: ParameterMetaData,
}

impl ParameterBinding {
    /// Create an unbound binding for a symbol.
    pub fn new(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            target: None,
            meta: ParameterMetaData::default(),
        }
    }

    /// The symbol this binding belongs to.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// The bound parameter, if any.
    pub fn target(&self) -> Option<ParamId> {
        self.target
    }

    /// Bind or unbind the symbol.
    pub fn set_target(&mut self, target: Option<ParamId>) {
        self.target = target;
    }

    /// Range and randomization settings of this binding.
    pub fn meta(&self) -> &ParameterMetaData {
        &self.meta
    }

    /// Range and randomization settings, mutable.
    pub fn meta_mut(&mut self) -> &mut ParameterMetaData {
        &mut self.meta
    }
}

/// An ordered symbol → parameter map.
///
/// Order is first-occurrence order: expression order for inputs,
/// declaration order for outputs.
#[derive(Debug, Clone, Default)]
pub struct BindingSet {
    bindings: Vec<ParameterBinding>,
}

impl BindingSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of symbols in the set.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether the set has no symbols at all.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Iterate over the bindings in order.
    pub fn iter(&self) -> std::slice::Iter<'_, ParameterBinding> {
        self.bindings.iter()
    }

    /// Look up a binding by symbol.
    pub fn get(&self, symbol: &str) -> Option<&ParameterBinding> {
        self.bindings.iter().find(|b| b.symbol == symbol)
    }

    /// Look up a binding by symbol, mutable.
    pub fn get_mut(&mut self, symbol: &str) -> Option<&mut ParameterBinding> {
        self.bindings.iter_mut().find(|b| b.symbol == symbol)
    }

    /// Get or add a binding for a symbol.
    pub fn insert(&mut self, symbol: &str) -> &mut ParameterBinding {
        let position = match self.bindings.iter().position(|b| b.symbol == symbol) {
            Some(position) => position,
            None => {
                self.bindings.push(ParameterBinding::new(symbol));
                self.bindings.len() - 1
            }
        };
        &mut self.bindings[position]
    }

    /// Drop a symbol from the set.
    pub fn remove(&mut self, symbol: &str) -> Option<ParameterBinding> {
        let position = self.bindings.iter().position(|b| b.symbol == symbol)?;
        Some(self.bindings.remove(position))
    }

    /// The target bound to a symbol, if both exist.
    pub fn target(&self, symbol: &str) -> Option<ParamId> {
        self.get(symbol).and_then(|b| b.target)
    }

    /// Re-target an existing symbol. Returns false when the symbol is
    /// not in the set.
    pub fn set_target(&mut self, symbol: &str, target: Option<ParamId>) -> bool {
        match self.get_mut(symbol) {
            Some(binding) => {
                binding.set_target(target);
                true
            }
            None => false,
        }
    }

    /// All bound targets, in symbol order.
    pub fn targets(&self) -> impl Iterator<Item = ParamId> + '_ {
        self.bindings.iter().filter_map(|b| b.target)
    }

    /// Whether any symbol is bound to the parameter.
    pub fn contains_target(&self, param: ParamId) -> bool {
        self.bindings.iter().any(|b| b.target == Some(param))
    }

    /// Unbind every symbol currently bound to the parameter.
    pub fn release(&mut self, param: ParamId) {
        for binding in &mut self.bindings {
            if binding.target == Some(param) {
                binding.target = None;
            }
        }
    }

    /// Unbind all symbols, keeping the symbols themselves.
    pub fn clear_targets(&mut self) {
        for binding in &mut self.bindings {
            binding.target = None;
        }
    }

    /// Rebuild the set for a new symbol list.
    ///
    /// Surviving symbols keep their binding and metadata, new symbols
    /// start unbound, vanished symbols are dropped. The result follows
    /// the order of `symbols`.
    pub(crate) fn sync_symbols(&mut self, symbols: &[String]) {
        let mut old = std::mem::take(&mut self.bindings);
        for symbol in symbols {
            match old.iter().position(|b| &b.symbol == symbol) {
                Some(position) => self.bindings.push(old.remove(position)),
                None => self.bindings.push(ParameterBinding::new(symbol)),
            }
        }
    }
}

/// A named calculation of a component.
///
/// The expression text is parsed on construction and on every change;
/// the parsed tree is the single source of truth for reprinting and
/// for deriving the compiled scalar function and, in multi-value mode,
/// the matrix expression tree.
///
/// # Examples
///
/// ```
/// use paramcalc_rs::engine::Calculation;
///
/// let calc = Calculation::new("power", "voltage * current");
/// let symbols: Vec<&str> = calc.inputs().iter().map(|b| b.symbol()).collect();
/// assert_eq!(symbols, vec!["voltage", "current"]);
/// assert!(calc.state().param_not_bound);
/// ```
#[derive(Debug)]
pub struct Calculation {
    name: String,
    expression: String,
    ast: Option<Expr>,
    compiled: Option<CompiledExpr>,
    inputs: BindingSet,
    outputs: BindingSet,
    multi_value: bool,
    matrix_tree: Option<MatrixExpr>,
    iteration_count: usize,
    aggregation: AggregationMethod,
    override_result: bool,
    state: CalcState,
    suppress_depth: u32,
}

impl Calculation {
    /// Create a calculation from a name and expression text.
    ///
    /// The text is parsed immediately; symbols it mentions appear in
    /// the input map, unbound. Invalid text leaves the calculation in
    /// the `invalid_expression` state instead of failing.
    pub fn new(name: &str, expression: &str) -> Self {
        let mut calc = Self {
            name: name.to_string(),
            expression: String::new(),
            ast: None,
            compiled: None,
            inputs: BindingSet::new(),
            outputs: BindingSet::new(),
            multi_value: false,
            matrix_tree: None,
            iteration_count: 1,
            aggregation: AggregationMethod::default(),
            override_result: false,
            state: CalcState::default(),
            suppress_depth: 0,
        };
        calc.set_expression(expression);
        calc
    }

    /// The calculation's display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the calculation.
    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    /// The current expression text as given by the host.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// The parsed expression, `None` while the text is invalid.
    pub fn ast(&self) -> Option<&Expr> {
        self.ast.as_ref()
    }

    /// The compiled scalar function, `None` while the text is invalid.
    pub fn compiled(&self) -> Option<&CompiledExpr> {
        self.compiled.as_ref()
    }

    /// Replace the expression text.
    ///
    /// On a successful parse the input map is diffed against the new
    /// symbol list: surviving symbols keep their bindings, new ones
    /// start unbound, vanished ones are dropped. On a parse failure
    /// the previous bindings stay untouched and the calculation turns
    /// invalid until the text is fixed.
    pub fn set_expression(&mut self, text: &str) {
        self.expression = text.to_string();
        match Expr::parse(text) {
            Ok(ast) => {
                self.inputs.sync_symbols(&ast.variables());
                self.compiled = Some(ast.compile(&CompileOptions::default()));
                if self.multi_value || self.matrix_tree.is_some() {
                    self.matrix_tree = Some(MatrixExpr::from_ast(&ast));
                }
                self.ast = Some(ast);
            }
            Err(_) => {
                self.ast = None;
                self.compiled = None;
                self.matrix_tree = None;
            }
        }
        self.recompute_state();
    }

    /// The ordered input map (symbols discovered from the expression).
    pub fn inputs(&self) -> &BindingSet {
        &self.inputs
    }

    /// The input map, mutable. Callers that bypass
    /// [`crate::engine::validator`] must recompute the state
    /// themselves.
    pub fn inputs_mut(&mut self) -> &mut BindingSet {
        &mut self.inputs
    }

    /// The ordered output map (symbols declared by the host).
    pub fn outputs(&self) -> &BindingSet {
        &self.outputs
    }

    /// The output map, mutable. Callers that bypass
    /// [`crate::engine::validator`] must recompute the state
    /// themselves.
    pub fn outputs_mut(&mut self) -> &mut BindingSet {
        &mut self.outputs
    }

    /// Declare an output symbol, unbound at first.
    pub fn add_output_symbol(&mut self, symbol: &str) {
        self.outputs.insert(symbol);
        self.recompute_state();
    }

    /// Drop an output symbol and its binding.
    pub fn remove_output_symbol(&mut self, symbol: &str) {
        self.outputs.remove(symbol);
        self.recompute_state();
    }

    /// Replace both maps wholesale, as the validator does on commit.
    pub(crate) fn replace_bindings(&mut self, inputs: BindingSet, outputs: BindingSet) {
        self.inputs = inputs;
        self.outputs = outputs;
        self.recompute_state();
    }

    /// Whether the calculation evaluates matrices instead of scalars.
    pub fn multi_value(&self) -> bool {
        self.multi_value
    }

    /// Switch multi-value mode on or off.
    ///
    /// The matrix expression tree is built lazily the first time the
    /// mode is enabled and rebuilt whenever the expression changes
    /// while a tree exists.
    pub fn set_multi_value(&mut self, multi_value: bool) {
        self.multi_value = multi_value;
        if multi_value && self.matrix_tree.is_none() {
            self.matrix_tree = self.ast.as_ref().map(MatrixExpr::from_ast);
        }
    }

    /// The matrix expression tree, once built.
    pub fn matrix_tree(&self) -> Option<&MatrixExpr> {
        self.matrix_tree.as_ref()
    }

    /// Number of multi-value iterations, at least 1.
    pub fn iteration_count(&self) -> usize {
        self.iteration_count
    }

    /// Set the iteration count; values below 1 clamp to 1.
    pub fn set_iteration_count(&mut self, count: usize) {
        self.iteration_count = count.max(1);
    }

    /// How iteration results are combined.
    pub fn aggregation(&self) -> AggregationMethod {
        self.aggregation
    }

    /// Set the aggregation method.
    pub fn set_aggregation(&mut self, aggregation: AggregationMethod) {
        self.aggregation = aggregation;
    }

    /// Whether results overwrite the currently pointed table in place.
    pub fn override_result(&self) -> bool {
        self.override_result
    }

    /// Set the override-result flag.
    pub fn set_override_result(&mut self, override_result: bool) {
        self.override_result = override_result;
    }

    /// The current validity flags.
    pub fn state(&self) -> CalcState {
        self.state
    }

    /// Whether the calculation can produce a meaningful result.
    pub fn is_valid(&self) -> bool {
        self.state.is_valid()
    }

    /// Start a batch of edits: state recomputation is suppressed until
    /// the matching [`Calculation::end_batch`]. Batches nest.
    pub fn begin_batch(&mut self) {
        self.suppress_depth += 1;
    }

    /// End a batch. Leaving the outermost batch recomputes the state
    /// once.
    pub fn end_batch(&mut self) {
        if self.suppress_depth > 0 {
            self.suppress_depth -= 1;
            if self.suppress_depth == 0 {
                self.recompute_state();
            }
        }
    }

    /// Recompute the validity flags from the current maps and parse
    /// result. A no-op inside a batch.
    pub fn recompute_state(&mut self) {
        if self.suppress_depth > 0 {
            return;
        }
        self.state = CalcState {
            param_not_bound: self.inputs.iter().any(|b| b.target().is_none())
                || !self.outputs.iter().any(|b| b.target().is_some()),
            invalid_expression: self.ast.is_none(),
        };
    }

    /// Unbind every symbol bound to the parameter, in both maps.
    ///
    /// Called by the arena when the parameter is removed from the
    /// model, so calculations never hold dangling targets.
    pub fn release_param(&mut self, param: ParamId) {
        self.inputs.release(param);
        self.outputs.release(param);
        self.recompute_state();
    }

    /// Unbind all symbols in both maps.
    pub fn release_all_bindings(&mut self) {
        self.inputs.clear_targets();
        self.outputs.clear_targets();
        self.recompute_state();
    }

    /// Flatten to a serializable record.
    pub fn to_record(&self) -> CalculationRecord {
        CalculationRecord {
            name: self.name.clone(),
            expression: self.expression.clone(),
            inputs: self.inputs.iter().map(BindingRecord::of).collect(),
            outputs: self.outputs.iter().map(BindingRecord::of).collect(),
            multi_value: self.multi_value,
            iteration_count: self.iteration_count,
            aggregation: self.aggregation,
            override_result: self.override_result,
            tree: self.matrix_tree.as_ref().map(TreeRecord::from_tree),
        }
    }

    /// Rebuild a calculation from a record.
    ///
    /// The expression is re-parsed from the recorded text; recorded
    /// input bindings are matched by symbol, so entries for symbols the
    /// text no longer mentions are silently dropped. A recorded tree
    /// takes precedence over the tree derived from the text.
    pub fn from_record(record: &CalculationRecord) -> Self {
        let mut calc = Calculation::new(&record.name, &record.expression);
        for binding in &record.inputs {
            if let Some(existing) = calc.inputs.get_mut(&binding.symbol) {
                existing.set_target(binding.target);
                *existing.meta_mut() = binding.meta.clone();
            }
        }
        for binding in &record.outputs {
            let entry = calc.outputs.insert(&binding.symbol);
            entry.set_target(binding.target);
            *entry.meta_mut() = binding.meta.clone();
        }
        calc.iteration_count = record.iteration_count.max(1);
        calc.aggregation = record.aggregation;
        calc.override_result = record.override_result;
        calc.set_multi_value(record.multi_value);
        if let Some(tree) = &record.tree {
            calc.matrix_tree = Some(tree.build());
        }
        calc.recompute_state();
        calc
    }
}

/// Serialized form of one binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindingRecord {
    pub symbol: String,
    pub target: Option<ParamId>,
    #[serde(default)]
    pub meta: ParameterMetaData,
}

impl BindingRecord {
    fn of(binding: &ParameterBinding) -> Self {
        Self {
            symbol: binding.symbol.clone(),
            target: binding.target,
            meta: binding.meta.clone(),
        }
    }
}

/// Flat serializable record of a calculation.
///
/// Carries the expression text, both symbol maps with their metadata,
/// the multi-value settings and, when a matrix tree exists, its
/// in-order operation record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationRecord {
    pub name: String,
    pub expression: String,
    pub inputs: Vec<BindingRecord>,
    pub outputs: Vec<BindingRecord>,
    #[serde(default)]
    pub multi_value: bool,
    #[serde(default = "default_iteration_count")]
    pub iteration_count: usize,
    #[serde(default)]
    pub aggregation: AggregationMethod,
    #[serde(default)]
    pub override_result: bool,
    #[serde(default)]
    pub tree: Option<TreeRecord>,
}

fn default_iteration_count() -> usize {
    1
}
