//! Integration tests for scalar and multi-value evaluation.

use std::cell::Cell;
use std::collections::HashMap;

use ndarray::arr2;

use paramcalc_rs::engine::{
    bind_input, bind_output, evaluate_component, evaluate_multi_value, evaluate_scalar,
    AggregationMethod, Calculation, DefaultNamer, ImmediateContext, ResultContext, TableNamer,
};
use paramcalc_rs::model::{CompId, ModelArena, ParamId, Propagation, TablePointer};
use paramcalc_rs::multivalue::DeviationMode;

use crate::test_helpers::{matrix_approx_eq, ScriptedRandomizer, SeededRandomizer};

fn add_calc(arena: &mut ModelArena, comp: CompId, name: &str, expr: &str) -> usize {
    let mut calc = Calculation::new(name, expr);
    calc.add_output_symbol("result");
    arena.add_calculation(comp, calc).unwrap()
}

fn make_multi_value(arena: &mut ModelArena, comp: CompId, index: usize) {
    arena
        .component_mut(comp)
        .unwrap()
        .calculation_mut(index)
        .unwrap()
        .set_multi_value(true);
}

#[test]
fn test_bound_chain_evaluates_in_schedule_order() {
    let mut arena = ModelArena::new();
    let plant = arena.add_component("plant", None).unwrap();
    let feed = arena
        .add_parameter(plant, "feed", "t/h", Propagation::Input, 3.0)
        .unwrap();
    let mid = arena
        .add_parameter(plant, "mid", "t/h", Propagation::Mixed, 0.0)
        .unwrap();
    let net = arena
        .add_parameter(plant, "net", "t/h", Propagation::Output, 0.0)
        .unwrap();

    // Consumer first; the validator reorders on every valid commit.
    let finish = add_calc(&mut arena, plant, "finish", "m * 2");
    bind_input(&mut arena, plant, finish, "m", Some(mid)).unwrap();
    bind_output(&mut arena, plant, finish, "result", Some(net)).unwrap();

    // "finish" may have moved; locate "start" by name after adding.
    add_calc(&mut arena, plant, "start", "feed + 1");
    let start = arena
        .component(plant)
        .unwrap()
        .calculations()
        .iter()
        .position(|c| c.name() == "start")
        .unwrap();
    bind_input(&mut arena, plant, start, "feed", Some(feed)).unwrap();
    let start = arena
        .component(plant)
        .unwrap()
        .calculations()
        .iter()
        .position(|c| c.name() == "start")
        .unwrap();
    bind_output(&mut arena, plant, start, "result", Some(mid)).unwrap();

    let names: Vec<&str> = arena
        .component(plant)
        .unwrap()
        .calculations()
        .iter()
        .map(|c| c.name())
        .collect();
    assert_eq!(names, vec!["start", "finish"]);

    let mut rng = ScriptedRandomizer::new(&[0.0]);
    evaluate_component(&mut arena, plant, &mut rng, &ImmediateContext, &DefaultNamer).unwrap();
    assert_eq!(arena.parameter(mid).unwrap().value(), 4.0);
    assert_eq!(arena.parameter(net).unwrap().value(), 8.0);

    // Mutate the input and run again.
    arena.set_parameter_value(feed, 9.0).unwrap();
    evaluate_component(&mut arena, plant, &mut rng, &ImmediateContext, &DefaultNamer).unwrap();
    assert_eq!(arena.parameter(net).unwrap().value(), 20.0);
}

#[test]
fn test_what_if_replacement_reads_alternative_input() {
    let mut arena = ModelArena::new();
    let plant = arena.add_component("plant", None).unwrap();
    let base = arena
        .add_parameter(plant, "base", "", Propagation::Input, 4.0)
        .unwrap();
    let scenario = arena
        .add_parameter(plant, "scenario", "", Propagation::Input, 10.0)
        .unwrap();
    let net = arena
        .add_parameter(plant, "net", "", Propagation::Output, 0.0)
        .unwrap();

    let index = add_calc(&mut arena, plant, "double", "a * 2");
    bind_input(&mut arena, plant, index, "a", Some(base)).unwrap();
    bind_output(&mut arena, plant, index, "result", Some(net)).unwrap();

    let mut replacements = HashMap::new();
    replacements.insert("a".to_string(), scenario);
    let value = evaluate_scalar(&mut arena, plant, index, Some(&replacements)).unwrap();
    assert_eq!(value, 20.0);
    assert_eq!(arena.parameter(net).unwrap().value(), 20.0);
    assert_eq!(arena.parameter(base).unwrap().value(), 4.0);

    // Without replacements the regular binding is back in effect.
    let value = evaluate_scalar(&mut arena, plant, index, None).unwrap();
    assert_eq!(value, 8.0);
}

struct TaggedNamer;

impl TableNamer for TaggedNamer {
    fn name(&self, calc_name: &str, index: usize, total: usize) -> String {
        format!("{}#{} of {}", calc_name, index + 1, total)
    }
}

struct CountingContext {
    runs: Cell<usize>,
}

impl ResultContext for CountingContext {
    fn run(&self, job: &mut dyn FnMut()) {
        self.runs.set(self.runs.get() + 1);
        job();
    }
}

#[test]
fn test_custom_namer_and_context_hooks() {
    let mut arena = ModelArena::new();
    let plant = arena.add_component("plant", None).unwrap();
    let level = arena
        .add_parameter(plant, "level", "", Propagation::Input, 2.0)
        .unwrap();
    let out = arena
        .add_parameter(plant, "out", "", Propagation::Output, 0.0)
        .unwrap();

    let index = add_calc(&mut arena, plant, "trend", "a + 1");
    bind_input(&mut arena, plant, index, "a", Some(level)).unwrap();
    bind_output(&mut arena, plant, index, "result", Some(out)).unwrap();
    {
        let calc = arena
            .component_mut(plant)
            .unwrap()
            .calculation_mut(index)
            .unwrap();
        calc.set_multi_value(true);
        calc.set_iteration_count(2);
        calc.set_aggregation(AggregationMethod::Separate);
    }

    let context = CountingContext { runs: Cell::new(0) };
    let mut rng = ScriptedRandomizer::new(&[0.0]);
    let tables =
        evaluate_multi_value(&mut arena, plant, index, &mut rng, &context, &TaggedNamer)
            .unwrap();

    // All table work went through the context, in one job.
    assert_eq!(context.runs.get(), 1);
    assert_eq!(tables.len(), 2);
    assert_eq!(arena.table(tables[0]).unwrap().name, "trend#1 of 2");
    assert_eq!(arena.table(tables[1]).unwrap().name, "trend#2 of 2");
    assert_eq!(arena.table(tables[1]).unwrap().values(), &arr2(&[[3.0]]));
}

/// A plant whose "forecast" calculation perturbs a table-backed
/// column of demand figures.
fn randomized_fixture() -> (ModelArena, CompId, usize, ParamId) {
    let mut arena = ModelArena::new();
    let plant = arena.add_component("plant", None).unwrap();
    let demand = arena
        .add_parameter(plant, "demand", "MW", Propagation::Input, 0.0)
        .unwrap();
    let forecast = arena
        .add_parameter(plant, "forecast", "MW", Propagation::Output, 0.0)
        .unwrap();
    let data = arena.add_table("demand history", arr2(&[[10.0], [20.0], [30.0]]));
    arena
        .set_parameter_table(demand, Some(TablePointer::full(data)))
        .unwrap();

    let index = add_calc(&mut arena, plant, "forecast", "d");
    bind_input(&mut arena, plant, index, "d", Some(demand)).unwrap();
    bind_output(&mut arena, plant, index, "result", Some(forecast)).unwrap();
    {
        let calc = arena
            .component_mut(plant)
            .unwrap()
            .calculation_mut(index)
            .unwrap();
        calc.set_multi_value(true);
        let meta = calc.inputs_mut().get_mut("d").unwrap().meta_mut();
        meta.randomize = true;
        meta.deviation = 2.0;
    }
    (arena, plant, index, forecast)
}

#[test]
fn test_seeded_runs_are_reproducible() {
    let mut first = Vec::new();
    for _ in 0..2 {
        let (mut arena, plant, index, _) = randomized_fixture();
        let mut rng = SeededRandomizer::new(42);
        let tables = evaluate_multi_value(
            &mut arena,
            plant,
            index,
            &mut rng,
            &ImmediateContext,
            &DefaultNamer,
        )
        .unwrap();
        first.push(arena.table(tables[0]).unwrap().values().clone());
    }
    assert!(matrix_approx_eq(&first[0], &first[1], 1e-12));

    // A different seed draws a different stream.
    let (mut arena, plant, index, _) = randomized_fixture();
    let mut rng = SeededRandomizer::new(7);
    let tables = evaluate_multi_value(
        &mut arena,
        plant,
        index,
        &mut rng,
        &ImmediateContext,
        &DefaultNamer,
    )
    .unwrap();
    let other = arena.table(tables[0]).unwrap().values().clone();
    assert!(!matrix_approx_eq(&first[0], &other, 1e-9));
}

#[test]
fn test_unrandomized_binding_ignores_the_draw_stream() {
    let (mut arena, plant, index, _) = randomized_fixture();
    {
        let calc = arena
            .component_mut(plant)
            .unwrap()
            .calculation_mut(index)
            .unwrap();
        calc.inputs_mut().get_mut("d").unwrap().meta_mut().randomize = false;
    }

    let mut rng = ScriptedRandomizer::new(&[1000.0, -999.0, 314.0]);
    let tables = evaluate_multi_value(
        &mut arena,
        plant,
        index,
        &mut rng,
        &ImmediateContext,
        &DefaultNamer,
    )
    .unwrap();
    assert!(matrix_approx_eq(
        arena.table(tables[0]).unwrap().values(),
        &arr2(&[[10.0], [20.0], [30.0]]),
        1e-12
    ));
}

#[test]
fn test_relative_deviation_with_clamp_band() {
    let (mut arena, plant, index, _) = randomized_fixture();
    {
        let calc = arena
            .component_mut(plant)
            .unwrap()
            .calculation_mut(index)
            .unwrap();
        let meta = calc.inputs_mut().get_mut("d").unwrap().meta_mut();
        meta.deviation = 0.1;
        meta.deviation_mode = DeviationMode::Relative;
        meta.clamp = true;
        meta.clamp_factor = 1.5;
    }

    // Draw 4.0 overshoots every band; -1.0 stays inside.
    let mut rng = ScriptedRandomizer::new(&[4.0, -1.0, 4.0]);
    let tables = evaluate_multi_value(
        &mut arena,
        plant,
        index,
        &mut rng,
        &ImmediateContext,
        &DefaultNamer,
    )
    .unwrap();

    // Cell sigma is 10% of the value; the band is 1.5 sigma.
    assert!(matrix_approx_eq(
        arena.table(tables[0]).unwrap().values(),
        &arr2(&[[11.5], [18.0], [34.5]]),
        1e-9
    ));
}

#[test]
fn test_component_mixes_scalar_and_multi_value() {
    let (mut arena, plant, _, forecast) = randomized_fixture();
    let price = arena
        .add_parameter(plant, "price", "EUR", Propagation::Input, 25.0)
        .unwrap();
    let cost = arena
        .add_parameter(plant, "cost", "EUR", Propagation::Output, 0.0)
        .unwrap();

    let scalar = add_calc(&mut arena, plant, "cost", "p * 4");
    bind_input(&mut arena, plant, scalar, "p", Some(price)).unwrap();
    let scalar = arena
        .component(plant)
        .unwrap()
        .calculations()
        .iter()
        .position(|c| c.name() == "cost")
        .unwrap();
    bind_output(&mut arena, plant, scalar, "result", Some(cost)).unwrap();

    let mut rng = SeededRandomizer::new(1);
    evaluate_component(&mut arena, plant, &mut rng, &ImmediateContext, &DefaultNamer).unwrap();

    assert_eq!(arena.parameter(cost).unwrap().value(), 100.0);
    let pointer = arena.parameter(forecast).unwrap().table().copied();
    assert!(pointer.is_some());
    assert_eq!(
        arena.table(pointer.unwrap().table).unwrap().dims(),
        (3, 1)
    );
}
