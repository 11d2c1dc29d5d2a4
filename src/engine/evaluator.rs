//! Scalar and multi-value evaluation
//!
//! Scalar evaluation reads bound input parameters, runs the compiled
//! expression and writes the result to every bound output. Multi-value
//! evaluation runs the matrix expression tree once per iteration with
//! fresh randomization draws, aggregates the iteration results and
//! materializes them as named result tables.
//!
//! Evaluation is total: missing bindings, invalid expressions and
//! numeric trouble surface as NaN values or absent tables, never as
//! panics. Structural problems (a vanished component, shape conflicts
//! between iterations) are real errors.

use std::collections::HashMap;

use ndarray::Array2;

use crate::engine::calculation::AggregationMethod;
use crate::error::{CalcError, Result};
use crate::expr::EvalScope;
use crate::model::{CompId, ModelArena, ParamId, RangeSel, TableId, TablePointer};
use crate::multivalue::{
    randomize_matrix, MatrixExpr, NormalRandomizer, ParameterMetaData, Randomizer, RefResolver,
};

/// Marshals result-table mutation onto a host-chosen context.
///
/// Hosts that keep tables on a dedicated thread (a UI, a store)
/// implement this to move the mutation there; [`ImmediateContext`]
/// runs it inline.
pub trait ResultContext {
    fn run(&self, job: &mut dyn FnMut());
}

/// Runs jobs directly on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateContext;

impl ResultContext for ImmediateContext {
    fn run(&self, job: &mut dyn FnMut()) {
        job();
    }
}

/// Naming hook for the result tables of a multi-value run.
pub trait TableNamer {
    /// Name for table `index` out of `total` produced by `calc_name`.
    fn name(&self, calc_name: &str, index: usize, total: usize) -> String;
}

/// Default naming: the calculation's name, with a 1-based iteration
/// suffix when several tables are kept.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultNamer;

impl TableNamer for DefaultNamer {
    fn name(&self, calc_name: &str, index: usize, total: usize) -> String {
        if total > 1 {
            format!("{} [{}]", calc_name, index + 1)
        } else {
            calc_name.to_string()
        }
    }
}

/// Evaluate a calculation in scalar mode and write its outputs.
///
/// Each input symbol reads the bound parameter's current scalar value;
/// unbound symbols stay absent from the scope and evaluate to NaN. The
/// result is written to every bound output parameter, clearing any
/// pre-existing table pointer first. An invalid calculation writes
/// NaN.
///
/// `replacements` substitutes parameters per symbol for this run only,
/// on both sides: inputs read from the replacement, outputs write to
/// it. Symbols absent from the calculation's maps are ignored.
///
/// # Returns
///
/// * `Ok(f64)` - The computed value (possibly NaN).
/// * `Err(CalcError)` - The component or calculation does not exist,
///   or a replacement names a dead parameter.
pub fn evaluate_scalar(
    arena: &mut ModelArena,
    comp: CompId,
    index: usize,
    replacements: Option<&HashMap<String, ParamId>>,
) -> Result<f64> {
    let (value, targets) = {
        let component = arena.component(comp)?;
        let calc = component
            .calculation(index)
            .ok_or_else(|| CalcError::CalculationNotFound(format!("{} index {}", comp, index)))?;

        let mut scope = EvalScope::new();
        for binding in calc.inputs().iter() {
            let target = replacements
                .and_then(|map| map.get(binding.symbol()).copied())
                .or_else(|| binding.target());
            if let Some(param) = target {
                scope.set(binding.symbol(), arena.scalar_value(param)?);
            }
        }

        let value = match calc.compiled() {
            Some(compiled) => compiled.eval(&scope),
            None => f64::NAN,
        };

        let targets: Vec<ParamId> = calc
            .outputs()
            .iter()
            .filter_map(|binding| {
                replacements
                    .and_then(|map| map.get(binding.symbol()).copied())
                    .or_else(|| binding.target())
            })
            .collect();
        (value, targets)
    };

    for param in targets {
        if arena.parameter(param)?.table().is_some() {
            arena.set_parameter_table(param, None)?;
        }
        arena.set_parameter_value(param, value)?;
    }
    Ok(value)
}

/// Evaluate a multi-value calculation and materialize result tables.
///
/// The matrix tree runs once per iteration; every bound input resolves
/// to the parameter's matrix value, windowed by the binding's row and
/// column ranges and perturbed through `randomizer` when the binding
/// asks for it. Iterations that come back incomplete (0x0) are
/// discarded; if none remain, no tables are produced.
///
/// With [`AggregationMethod::Average`] and more than one iteration the
/// results are averaged element-wise into a single table; the
/// iterations must agree on dimensions. With
/// [`AggregationMethod::Separate`] each iteration keeps its own table.
///
/// Table creation and output attachment run through `context`. The
/// last kept table is attached to every bound output parameter: with
/// the calculation's override flag set, a currently pointed table of
/// matching shape is refreshed in place (keeping table identity and
/// the pointer's sub-range); otherwise the parameter is pointed at the
/// new table, carrying a previously selected sub-range over when the
/// shape still matches.
///
/// # Returns
///
/// * `Ok(Vec<TableId>)` - The created tables, in iteration order.
/// * `Err(CalcError)` - The calculation is missing or not in
///   multi-value mode, or iteration shapes conflict under averaging.
pub fn evaluate_multi_value(
    arena: &mut ModelArena,
    comp: CompId,
    index: usize,
    randomizer: &mut dyn Randomizer,
    context: &dyn ResultContext,
    namer: &dyn TableNamer,
) -> Result<Vec<TableId>> {
    let snapshot = {
        let component = arena.component(comp)?;
        let calc = component
            .calculation(index)
            .ok_or_else(|| CalcError::CalculationNotFound(format!("{} index {}", comp, index)))?;
        if !calc.multi_value() {
            return Err(CalcError::InvalidState(format!(
                "calculation '{}' is not in multi-value mode",
                calc.name()
            )));
        }
        Snapshot {
            name: calc.name().to_string(),
            tree: calc
                .matrix_tree()
                .cloned()
                .unwrap_or_else(MatrixExpr::incomplete),
            inputs: calc
                .inputs()
                .iter()
                .map(|b| (b.symbol().to_string(), b.target(), b.meta().clone()))
                .collect(),
            outputs: calc.outputs().targets().collect(),
            iterations: calc.iteration_count(),
            aggregation: calc.aggregation(),
            override_result: calc.override_result(),
        }
    };

    let mut draws: Vec<Array2<f64>> = Vec::with_capacity(snapshot.iterations);
    {
        let mut resolver = BindingResolver {
            arena: &*arena,
            bindings: &snapshot.inputs,
            randomizer,
        };
        for _ in 0..snapshot.iterations {
            let draw = snapshot.tree.evaluate(&mut resolver)?;
            if draw.nrows() > 0 && draw.ncols() > 0 {
                draws.push(draw);
            }
        }
    }
    if draws.is_empty() {
        return Ok(Vec::new());
    }

    let kept = aggregate(draws, snapshot.aggregation)?;

    let total = kept.len();
    let mut created: Vec<TableId> = Vec::new();
    let mut failure: Option<CalcError> = None;
    {
        let mut job = || {
            for (k, values) in kept.iter().enumerate() {
                let name = namer.name(&snapshot.name, k, total);
                created.push(arena.add_table(&name, values.clone()));
            }
            let (last_table, last_values) = match (created.last(), kept.last()) {
                (Some(&table), Some(values)) => (table, values),
                _ => return,
            };
            for &param in &snapshot.outputs {
                if let Err(error) =
                    attach_result(arena, param, last_table, last_values, snapshot.override_result)
                {
                    failure = Some(error);
                    return;
                }
            }
        };
        context.run(&mut job);
    }

    match failure {
        Some(error) => Err(error),
        None => Ok(created),
    }
}

/// [`evaluate_multi_value`] with entropy-seeded randomization, inline
/// table mutation and default table names.
pub fn evaluate_multi_value_default(
    arena: &mut ModelArena,
    comp: CompId,
    index: usize,
) -> Result<Vec<TableId>> {
    let mut randomizer = NormalRandomizer::new();
    evaluate_multi_value(
        arena,
        comp,
        index,
        &mut randomizer,
        &ImmediateContext,
        &DefaultNamer,
    )
}

/// Evaluate every calculation of a component in list order.
///
/// Scalar calculations run through [`evaluate_scalar`], multi-value
/// ones through [`evaluate_multi_value`] with the supplied hooks. A
/// calculation that cannot produce a value yields NaN outputs (scalar)
/// or no tables (multi-value) and the batch continues; only structural
/// errors abort.
pub fn evaluate_component(
    arena: &mut ModelArena,
    comp: CompId,
    randomizer: &mut dyn Randomizer,
    context: &dyn ResultContext,
    namer: &dyn TableNamer,
) -> Result<()> {
    let count = arena.component(comp)?.calculations().len();
    for index in 0..count {
        let multi_value = arena
            .component(comp)?
            .calculation(index)
            .map(|calc| calc.multi_value())
            .unwrap_or(false);
        if multi_value {
            evaluate_multi_value(arena, comp, index, randomizer, context, namer)?;
        } else {
            evaluate_scalar(arena, comp, index, None)?;
        }
    }
    Ok(())
}

struct Snapshot {
    name: String,
    tree: MatrixExpr,
    inputs: Vec<(String, Option<ParamId>, ParameterMetaData)>,
    outputs: Vec<ParamId>,
    iterations: usize,
    aggregation: AggregationMethod,
    override_result: bool,
}

fn aggregate(
    draws: Vec<Array2<f64>>,
    aggregation: AggregationMethod,
) -> Result<Vec<Array2<f64>>> {
    if aggregation != AggregationMethod::Average || draws.len() < 2 {
        return Ok(draws);
    }

    let dims = draws[0].dim();
    for draw in &draws[1..] {
        if draw.dim() != dims {
            return Err(CalcError::DimensionMismatch(format!(
                "iteration results vary in shape: {:?} vs {:?}",
                dims,
                draw.dim()
            )));
        }
    }

    let count = draws.len() as f64;
    let mut mean = Array2::<f64>::zeros(dims);
    for draw in &draws {
        mean += draw;
    }
    mean.mapv_inplace(|v| v / count);
    Ok(vec![mean])
}

/// Resolves symbols against the arena through a calculation's input
/// bindings, applying the per-binding window and randomization.
struct BindingResolver<'a> {
    arena: &'a ModelArena,
    bindings: &'a [(String, Option<ParamId>, ParameterMetaData)],
    randomizer: &'a mut dyn Randomizer,
}

impl RefResolver for BindingResolver<'_> {
    fn resolve(&mut self, symbol: &str) -> Result<Array2<f64>> {
        let entry = self.bindings.iter().find(|(s, _, _)| s == symbol);
        let (target, meta) = match entry {
            Some((_, Some(target), meta)) => (*target, meta),
            _ => return Ok(Array2::zeros((0, 0))),
        };
        // A dead target degrades like an unbound symbol.
        if arena_missing(self.arena, target) {
            return Ok(Array2::zeros((0, 0)));
        }
        let base = self.arena.parameter_matrix(target)?;
        let windowed = sub_range(&base, &meta.rows, &meta.cols);
        if meta.randomize {
            Ok(randomize_matrix(&windowed, meta, self.randomizer))
        } else {
            Ok(windowed)
        }
    }
}

fn arena_missing(arena: &ModelArena, param: ParamId) -> bool {
    arena.parameter(param).is_err()
}

fn sub_range(values: &Array2<f64>, rows: &RangeSel, cols: &RangeSel) -> Array2<f64> {
    if rows.is_full() && cols.is_full() {
        return values.clone();
    }
    let (r0, r1) = rows.resolve(values.nrows());
    let (c0, c1) = cols.resolve(values.ncols());
    Array2::from_shape_fn((r1 - r0, c1 - c0), |(i, j)| values[[r0 + i, c0 + j]])
}

fn attach_result(
    arena: &mut ModelArena,
    param: ParamId,
    table: TableId,
    values: &Array2<f64>,
    override_result: bool,
) -> Result<()> {
    let current = arena.parameter(param)?.table().copied();

    if override_result {
        if let Some(pointer) = current {
            if let Ok(existing) = arena.table(pointer.table) {
                if existing.dims() == values.dim() {
                    // Same shape: refresh in place, keeping table
                    // identity and the pointer's sub-range.
                    arena.replace_table_values(pointer.table, values.clone())?;
                    return Ok(());
                }
            }
        }
        arena.set_parameter_table(param, Some(TablePointer::full(table)))?;
        return Ok(());
    }

    let mut pointer = TablePointer::full(table);
    if let Some(previous) = current {
        if let Ok(existing) = arena.table(previous.table) {
            if existing.dims() == values.dim() {
                // Same kind of table: carry the selected sub-range over.
                pointer.rows = previous.rows;
                pointer.cols = previous.cols;
            }
        }
    }
    arena.set_parameter_table(param, Some(pointer))?;
    Ok(())
}
