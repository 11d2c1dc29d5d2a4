//! The calculation engine
//!
//! Everything that turns bound expressions into values: the
//! [`Calculation`] type with its symbol maps and validity state, the
//! dependency [`scheduler`], the binding [`validator`] and the scalar
//! and multi-value [`evaluator`].

pub mod calculation;
pub mod evaluator;
pub mod scheduler;
pub mod validator;

pub use calculation::{
    AggregationMethod, BindingRecord, BindingSet, CalcState, Calculation, CalculationRecord,
    ParameterBinding,
};
pub use evaluator::{
    evaluate_component, evaluate_multi_value, evaluate_multi_value_default, evaluate_scalar,
    DefaultNamer, ImmediateContext, ResultContext, TableNamer,
};
pub use scheduler::{component_deps, reorder_calculations, schedule, CalcDeps, ScheduleError};
pub use validator::{
    bind_input, bind_output, commit_binding, commit_binding_unchecked, validate_binding,
    BindingValidation,
};
