// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use indoc::indoc;
use qkc_data_structures::{attrs::Attributes, span::Span};

use crate::{
    conversion::Error,
    kir::{Axis, Function, Gate, InstructionKind, Literal, Module, Ty},
};

use super::{PipelineConfig, run_pipeline};

fn module_with_failing_function() -> (Module, Function) {
    let mut module = Module::new();
    module.push(Function::build("measure_all", |b| {
        let q = b.qalloc();
        let v = b.qalloc_vec(Literal::Index(2));
        let bits = b.measure(Axis::Z, &[q, v]);
        b.ret(Some(bits.into()));
    }));
    let broken = Function::build("broken", |b| {
        let q = b.qalloc();
        let bit = b.measure(Axis::Z, &[q]);
        b.if_then(bit, |b| b.gate(Gate::X, q));
        let v = b.qalloc_vec(Literal::Index(2));
        let n = b.size(v);
        b.set_span(Span::new(10, 20));
        b.measure(Axis::X, &[v, n]);
    });
    module.push(broken.clone());
    module.push(Function::build("feedback", |b| {
        let q = b.qalloc();
        let bit = b.measure(Axis::Z, &[q]);
        b.if_then(bit, |b| b.reset(q));
    }));
    (module, broken)
}

fn measurements_are_individual(function: &Function) -> bool {
    let mut individual = true;
    function.body.walk(&mut |instr| {
        if let InstructionKind::Measure(_, _, _, result) = &instr.kind {
            individual &= result.ty == Ty::Boolean;
        }
    });
    individual
}

fn check_failing_function_is_isolated(parallel: bool) {
    let (mut module, broken) = module_with_failing_function();
    let config = PipelineConfig {
        parallel,
        ..Default::default()
    };

    let errors = run_pipeline(&mut module, &config).expect_err("pipeline should fail");

    assert_eq!(errors, vec![Error::TypeMismatch(Ty::Index, Span::new(10, 20))]);
    let measure_all = module.get_function(module.find_function("measure_all").expect("present"));
    assert!(measurements_are_individual(measure_all));
    assert!(measure_all.attrs.is_empty());
    let restored = module.get_function(module.find_function("broken").expect("present"));
    assert_eq!(restored, &broken);
    let feedback = module.get_function(module.find_function("feedback").expect("present"));
    assert_eq!(feedback.attrs, Attributes::MeasurementFeedback);
}

#[test]
fn failing_function_is_restored_when_run_in_parallel() {
    check_failing_function_is_isolated(true);
}

#[test]
fn failing_function_is_restored_when_run_sequentially() {
    check_failing_function_is_isolated(false);
}

#[test]
fn errors_are_reported_in_function_order() {
    let mut module = Module::new();
    for (lo, hi) in [(1, 2), (3, 4), (5, 6)] {
        module.push(Function::build("bad", |b| {
            let v = b.qalloc_vec(Literal::Index(1));
            let n = b.size(v);
            b.set_span(Span::new(lo, hi));
            b.measure(Axis::Y, &[n]);
        }));
    }

    let errors = run_pipeline(&mut module, &PipelineConfig::default())
        .expect_err("pipeline should fail");

    let spans: Vec<_> = errors
        .iter()
        .map(|err| match err {
            Error::TypeMismatch(_, span) => *span,
            _ => panic!("unexpected error {err}"),
        })
        .collect();
    assert_eq!(
        spans,
        vec![Span::new(1, 2), Span::new(3, 4), Span::new(5, 6)]
    );
}

#[test]
fn empty_module_succeeds() {
    let mut module = Module::new();
    assert_eq!(run_pipeline(&mut module, &PipelineConfig::default()), Ok(()));
}

#[test]
fn config_parses_nested_camel_case() {
    let config: PipelineConfig = serde_json::from_str(indoc! {r#"
        {
            "parallel": false,
            "expandMeasurements": {
                "reuseSizeQueries": false
            }
        }
    "#})
    .expect("config should parse");

    assert!(!config.parallel);
    assert!(!config.expand_measurements.reuse_size_queries);
    assert_eq!(
        config.expand_measurements.conversion,
        PipelineConfig::default().expand_measurements.conversion
    );
}
