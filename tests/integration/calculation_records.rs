//! Integration tests for saving and restoring calculations.
//!
//! Records are flat JSON-friendly snapshots; restoring one into an
//! identically built model must reproduce the same behavior, draws
//! included.

use ndarray::arr2;

use paramcalc_rs::engine::{
    bind_input, bind_output, evaluate_multi_value, evaluate_scalar, AggregationMethod,
    Calculation, CalculationRecord, DefaultNamer, ImmediateContext,
};
use paramcalc_rs::model::{CompId, ModelArena, ParamId, Propagation, TablePointer};

use crate::test_helpers::{matrix_approx_eq, ScriptedRandomizer};

/// A plant with a table-backed demand parameter and a forecast output.
/// Ids are deterministic, so two builds line up exactly.
fn build_plant() -> (ModelArena, CompId, ParamId, ParamId) {
    let mut arena = ModelArena::new();
    let plant = arena.add_component("plant", None).unwrap();
    let demand = arena
        .add_parameter(plant, "demand", "MW", Propagation::Input, 0.0)
        .unwrap();
    let forecast = arena
        .add_parameter(plant, "forecast", "MW", Propagation::Output, 0.0)
        .unwrap();
    let history = arena.add_table("history", arr2(&[[5.0], [8.0]]));
    arena
        .set_parameter_table(demand, Some(TablePointer::full(history)))
        .unwrap();
    (arena, plant, demand, forecast)
}

#[test]
fn test_record_restores_a_configured_forecast() {
    let (mut source, plant, demand, forecast) = build_plant();

    let index = source
        .add_calculation(plant, Calculation::new("forecast", "d"))
        .unwrap();
    bind_input(&mut source, plant, index, "d", Some(demand)).unwrap();
    bind_output(&mut source, plant, index, "result", Some(forecast)).unwrap();
    {
        let calc = source
            .component_mut(plant)
            .unwrap()
            .calculation_mut(index)
            .unwrap();
        calc.set_multi_value(true);
        calc.set_iteration_count(2);
        calc.set_aggregation(AggregationMethod::Separate);
        let meta = calc.inputs_mut().get_mut("d").unwrap().meta_mut();
        meta.randomize = true;
        meta.deviation = 1.0;
    }

    let record = source
        .component(plant)
        .unwrap()
        .calculation(index)
        .unwrap()
        .to_record();

    // Through JSON and back without loss.
    let json = serde_json::to_string(&record).unwrap();
    let parsed: CalculationRecord = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, record);

    // A restored calculation records identically again.
    let restored = Calculation::from_record(&parsed);
    assert_eq!(restored.to_record(), record);

    // Same model build, same draw script, same tables.
    let script = [1.0, 2.0, 3.0, 4.0];
    let mut rng = ScriptedRandomizer::new(&script);
    let source_tables = evaluate_multi_value(
        &mut source,
        plant,
        index,
        &mut rng,
        &ImmediateContext,
        &DefaultNamer,
    )
    .unwrap();

    let (mut target, plant_b, _, forecast_b) = build_plant();
    let restored_index = target.add_calculation(plant_b, restored).unwrap();
    let calc = target
        .component(plant_b)
        .unwrap()
        .calculation(restored_index)
        .unwrap();
    assert!(calc.is_valid());
    assert!(calc.multi_value());
    assert_eq!(calc.iteration_count(), 2);

    let mut rng = ScriptedRandomizer::new(&script);
    let target_tables = evaluate_multi_value(
        &mut target,
        plant_b,
        restored_index,
        &mut rng,
        &ImmediateContext,
        &DefaultNamer,
    )
    .unwrap();

    assert_eq!(source_tables.len(), 2);
    assert_eq!(target_tables.len(), 2);
    for (a, b) in source_tables.iter().zip(&target_tables) {
        assert!(matrix_approx_eq(
            source.table(*a).unwrap().values(),
            target.table(*b).unwrap().values(),
            1e-12
        ));
    }
    assert_eq!(target.table(target_tables[0]).unwrap().name, "forecast [1]");

    // The restored output points at the last produced table.
    let pointer = target.parameter(forecast_b).unwrap().table().copied().unwrap();
    assert_eq!(pointer.table, target_tables[1]);
}

#[test]
fn test_recorded_tree_takes_precedence_over_text() {
    let mut arena = ModelArena::new();
    let plant = arena.add_component("plant", None).unwrap();
    let a = arena
        .add_parameter(plant, "a", "", Propagation::Input, 4.0)
        .unwrap();
    let b = arena
        .add_parameter(plant, "b", "", Propagation::Input, 6.0)
        .unwrap();
    let out = arena
        .add_parameter(plant, "out", "", Propagation::Mixed, 0.0)
        .unwrap();

    let mut calc = Calculation::new("blend", "a + b");
    calc.inputs_mut().set_target("a", Some(a));
    calc.inputs_mut().set_target("b", Some(b));
    calc.add_output_symbol("result");
    calc.outputs_mut().set_target("result", Some(out));
    calc.set_multi_value(true);

    // Drift the text after recording: the record still carries the
    // sum tree.
    let mut record = calc.to_record();
    record.expression = "a * b".to_string();

    let restored = Calculation::from_record(&record);
    let index = arena.add_calculation(plant, restored).unwrap();

    // Scalar mode follows the text.
    let value = evaluate_scalar(&mut arena, plant, index, None).unwrap();
    assert_eq!(value, 24.0);

    // Multi-value mode replays the recorded tree.
    let mut rng = ScriptedRandomizer::new(&[0.0]);
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
        &arr2(&[[10.0]]),
        1e-12
    ));
}
