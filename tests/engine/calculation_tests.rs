//! Integration tests for the calculation lifecycle inside a model.

use paramcalc_rs::engine::{Calculation, CalculationRecord};
use paramcalc_rs::model::{ModelArena, ParamId, Propagation};
use paramcalc_rs::CalcError;

#[test]
fn test_calculation_lives_on_component() {
    let mut arena = ModelArena::new();
    let plant = arena.add_component("plant", None).unwrap();

    let index = arena
        .add_calculation(plant, Calculation::new("power", "voltage * current"))
        .unwrap();
    assert_eq!(index, 0);

    let calc = arena.component(plant).unwrap().calculation(0).unwrap();
    assert_eq!(calc.name(), "power");
    let symbols: Vec<&str> = calc.inputs().iter().map(|b| b.symbol()).collect();
    assert_eq!(symbols, vec!["voltage", "current"]);
}

#[test]
fn test_expression_edit_keeps_surviving_bindings() {
    let mut arena = ModelArena::new();
    let plant = arena.add_component("plant", None).unwrap();
    let load = arena
        .add_parameter(plant, "load", "kW", Propagation::Input, 5.0)
        .unwrap();

    let mut calc = Calculation::new("demand", "load + reserve");
    calc.inputs_mut().set_target("load", Some(load));
    let index = arena.add_calculation(plant, calc).unwrap();

    // Edit the text; load survives, reserve is gone, margin is new.
    let calc = arena
        .component_mut(plant)
        .unwrap()
        .calculation_mut(index)
        .unwrap();
    calc.set_expression("load * margin");

    let calc = arena.component(plant).unwrap().calculation(index).unwrap();
    assert_eq!(calc.inputs().target("load"), Some(load));
    assert!(calc.inputs().get("reserve").is_none());
    assert_eq!(calc.inputs().target("margin"), None);
}

#[test]
fn test_removing_parameter_releases_bindings_everywhere() {
    let mut arena = ModelArena::new();
    let plant = arena.add_component("plant", None).unwrap();
    let boiler = arena.add_component("boiler", Some(plant)).unwrap();
    let shared = arena
        .add_parameter(plant, "fuel_rate", "kg/s", Propagation::Input, 1.0)
        .unwrap();

    let mut top = Calculation::new("top", "fuel_rate * 2");
    top.inputs_mut().set_target("fuel_rate", Some(shared));
    arena.add_calculation(plant, top).unwrap();

    let mut nested = Calculation::new("nested", "fuel_rate + 1");
    nested.inputs_mut().set_target("fuel_rate", Some(shared));
    arena.add_calculation(boiler, nested).unwrap();

    arena.remove_parameter(shared).unwrap();

    // Both calculations dropped the dead target but kept the symbol.
    for comp in [plant, boiler] {
        let calc = arena.component(comp).unwrap().calculation(0).unwrap();
        assert_eq!(calc.inputs().target("fuel_rate"), None);
        assert!(calc.inputs().get("fuel_rate").is_some());
        assert!(calc.state().param_not_bound);
    }
}

#[test]
fn test_remove_calculation_returns_released_calc() {
    let mut arena = ModelArena::new();
    let plant = arena.add_component("plant", None).unwrap();
    let input = arena
        .add_parameter(plant, "x", "", Propagation::Input, 1.0)
        .unwrap();

    let mut calc = Calculation::new("calc", "x");
    calc.inputs_mut().set_target("x", Some(input));
    let index = arena.add_calculation(plant, calc).unwrap();

    let removed = arena.remove_calculation(plant, index).unwrap();
    assert_eq!(removed.name(), "calc");
    assert!(removed.inputs().targets().next().is_none());
    assert!(arena.component(plant).unwrap().calculations().is_empty());

    // Removing it again is an error.
    assert!(matches!(
        arena.remove_calculation(plant, index),
        Err(CalcError::CalculationNotFound(_))
    ));
}

#[test]
fn test_relocate_retargets_corresponding_parameters() {
    let mut arena = ModelArena::new();
    let plant = arena.add_component("plant", None).unwrap();
    let unit_a = arena.add_component("unit_a", Some(plant)).unwrap();
    let unit_b = arena.add_component("unit_b", Some(plant)).unwrap();

    let flow_a = arena
        .add_parameter(unit_a, "flow", "kg/s", Propagation::Input, 2.0)
        .unwrap();
    let out_a = arena
        .add_parameter(unit_a, "result", "kg/s", Propagation::Output, 0.0)
        .unwrap();
    let flow_b = arena
        .add_parameter(unit_b, "flow", "kg/s", Propagation::Input, 3.0)
        .unwrap();
    let out_b = arena
        .add_parameter(unit_b, "result", "kg/s", Propagation::Output, 0.0)
        .unwrap();

    let mut calc = Calculation::new("throughput", "flow * 60");
    calc.inputs_mut().set_target("flow", Some(flow_a));
    calc.add_output_symbol("result");
    calc.outputs_mut().set_target("result", Some(out_a));
    let index = arena.add_calculation(unit_a, calc).unwrap();

    let new_index = arena.relocate_calculation(unit_a, index, unit_b).unwrap();

    let moved = arena
        .component(unit_b)
        .unwrap()
        .calculation(new_index)
        .unwrap();
    // Bindings jumped to unit_b's parameters of the same name, unit
    // and propagation.
    assert_eq!(moved.inputs().target("flow"), Some(flow_b));
    assert_eq!(moved.outputs().target("result"), Some(out_b));
    assert!(arena.component(unit_a).unwrap().calculations().is_empty());
}

#[test]
fn test_relocate_without_correspondence_unbinds() {
    let mut arena = ModelArena::new();
    let plant = arena.add_component("plant", None).unwrap();
    let unit_a = arena.add_component("unit_a", Some(plant)).unwrap();
    let unit_b = arena.add_component("unit_b", Some(plant)).unwrap();

    let flow_a = arena
        .add_parameter(unit_a, "flow", "kg/s", Propagation::Input, 2.0)
        .unwrap();
    // unit_b has a flow parameter with a different unit only.
    arena
        .add_parameter(unit_b, "flow", "t/h", Propagation::Input, 0.0)
        .unwrap();

    let mut calc = Calculation::new("throughput", "flow");
    calc.inputs_mut().set_target("flow", Some(flow_a));
    let index = arena.add_calculation(unit_a, calc).unwrap();

    let new_index = arena.relocate_calculation(unit_a, index, unit_b).unwrap();
    let moved = arena
        .component(unit_b)
        .unwrap()
        .calculation(new_index)
        .unwrap();
    assert_eq!(moved.inputs().target("flow"), None);
    assert!(moved.state().param_not_bound);
}

#[test]
fn test_record_json_shape_is_stable() {
    let mut calc = Calculation::new("margin", "sales - costs");
    calc.add_output_symbol("profit");

    let json = serde_json::to_value(calc.to_record()).unwrap();
    assert_eq!(json["name"], "margin");
    assert_eq!(json["expression"], "sales - costs");
    assert_eq!(json["inputs"][0]["symbol"], "sales");
    assert_eq!(json["inputs"][1]["symbol"], "costs");
    assert_eq!(json["outputs"][0]["symbol"], "profit");
    assert_eq!(json["multi_value"], false);
    assert_eq!(json["iteration_count"], 1);
}

#[test]
fn test_record_with_missing_optional_fields_parses() {
    // Records written before the multi-value settings existed carry
    // only the maps; the missing fields take their defaults.
    let json = r#"{
        "name": "legacy",
        "expression": "a + b",
        "inputs": [
            {"symbol": "a", "target": null},
            {"symbol": "b", "target": 3}
        ],
        "outputs": []
    }"#;

    let record: CalculationRecord = serde_json::from_str(json).unwrap();
    let calc = Calculation::from_record(&record);

    assert_eq!(calc.name(), "legacy");
    assert!(!calc.multi_value());
    assert_eq!(calc.iteration_count(), 1);
    assert_eq!(calc.inputs().target("b"), Some(ParamId(3)));
}
