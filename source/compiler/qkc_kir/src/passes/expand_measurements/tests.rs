// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![allow(clippy::too_many_lines)]

use expect_test::expect;
use qkc_data_structures::span::Span;

use crate::{
    conversion::Error,
    kir::{Axis, Function, InstructionKind, Literal, OpKind, Ty},
    utils::count_op_kind,
};

use super::{ExpandMeasurementsConfig, expand_measurements, uses_individual_qubit};

fn assert_all_measurements_individual(function: &Function) {
    function.body.walk(&mut |instr| {
        if let InstructionKind::Measure(_, targets, _, result) = &instr.kind {
            assert_eq!(targets.len(), 1);
            assert_eq!(targets[0].ty, Ty::Qubit);
            assert_eq!(result.ty, Ty::Boolean);
        }
    });
}

#[test]
fn oracle_accepts_only_boolean_results() {
    let function = Function::build("main", |b| {
        let q = b.qalloc();
        let v = b.qalloc_vec(Literal::Index(2));
        b.measure(Axis::Z, &[q]);
        b.measure(Axis::Z, &[v]);
        b.measure(Axis::Z, &[q, q]);
    });
    let legal: Vec<_> = function.body.0[2..]
        .iter()
        .map(uses_individual_qubit)
        .collect();
    assert_eq!(legal, vec![true, false, false]);
    assert!(!uses_individual_qubit(&function.body.0[0]));
}

#[test]
fn individual_measurement_is_left_unchanged() {
    let mut function = Function::build("main", |b| {
        let q = b.qalloc();
        let bit = b.measure(Axis::Z, &[q]);
        b.ret(Some(bit.into()));
    });
    let original = function.clone();

    let stats = expand_measurements(&mut function, &ExpandMeasurementsConfig::default())
        .expect("expansion should succeed");

    assert_eq!(stats.rewrites, 0);
    assert_eq!(function, original);
}

#[test]
fn mixed_targets_expand_in_order() {
    let mut function = Function::build("main", |b| {
        let q0 = b.qalloc();
        let v = b.qalloc_vec(Literal::Index(3));
        let q1 = b.qalloc();
        let bits = b.measure(Axis::Z, &[q0, v, q1]);
        b.ret(Some(bits.into()));
    });

    let stats = expand_measurements(&mut function, &ExpandMeasurementsConfig::default())
        .expect("expansion should succeed");

    assert_eq!(stats.rewrites, 1);
    assert_all_measurements_individual(&function);
    expect![[r#"
        Block:
            Variable(0, Qubit) = QAlloc
            Variable(1, QubitVec) = QAlloc Index(3)
            Variable(2, Qubit) = QAlloc
            Variable(4, Index) = Size Variable(1, QubitVec)
            Variable(5, Index) = Add Index(2), Variable(4, Index)
            Variable(6, Integer) = IndexCast Variable(5, Index)
            Variable(7, Pointer) = Alloca Variable(6, Integer)
            Variable(8, Boolean) = Mz Variable(0, Qubit)
            Variable(9, Pointer) = ElementPtr Variable(7, Pointer), Integer(0)
            Store Variable(8, Boolean), Variable(9, Pointer)
            Loop Variable(4, Index), iv=Variable(10, Index):
                Variable(11, Qubit) = Extract Variable(1, QubitVec), Variable(10, Index)
                Variable(12, Boolean) = Mz Variable(11, Qubit)
                Variable(13, Index) = Add Variable(10, Index), Index(1)
                Variable(14, Integer) = IndexCast Variable(13, Index)
                Variable(15, Pointer) = ElementPtr Variable(7, Pointer), Variable(14, Integer)
                Store Variable(12, Boolean), Variable(15, Pointer)
            Variable(16, Index) = Add Index(1), Variable(4, Index)
            Variable(17, Boolean) = Mz Variable(2, Qubit)
            Variable(18, Integer) = IndexCast Variable(16, Index)
            Variable(19, Pointer) = ElementPtr Variable(7, Pointer), Variable(18, Integer)
            Store Variable(17, Boolean), Variable(19, Pointer)
            Variable(20, Index) = Add Variable(16, Index), Index(1)
            Variable(21, BoolVec) = VecInit Variable(7, Pointer), Variable(6, Integer)
            Return Variable(21, BoolVec)"#]]
    .assert_eq(&function.body.to_string());
}

#[test]
fn vector_is_queried_again_when_reuse_is_disabled() {
    let mut function = Function::build("main", |b| {
        let v = b.qalloc_vec(Literal::Index(2));
        let bits = b.measure(Axis::X, &[v]);
        b.ret(Some(bits.into()));
    });
    let config = ExpandMeasurementsConfig {
        reuse_size_queries: false,
        ..Default::default()
    };

    expand_measurements(&mut function, &config).expect("expansion should succeed");

    assert_eq!(count_op_kind(&function.body, OpKind::Size), 2);
    expect![[r#"
        Block:
            Variable(0, QubitVec) = QAlloc Index(2)
            Variable(2, Index) = Size Variable(0, QubitVec)
            Variable(3, Integer) = IndexCast Variable(2, Index)
            Variable(4, Pointer) = Alloca Variable(3, Integer)
            Variable(5, Index) = Size Variable(0, QubitVec)
            Loop Variable(5, Index), iv=Variable(6, Index):
                Variable(7, Qubit) = Extract Variable(0, QubitVec), Variable(6, Index)
                Variable(8, Boolean) = Mx Variable(7, Qubit)
                Variable(9, Integer) = IndexCast Variable(6, Index)
                Variable(10, Pointer) = ElementPtr Variable(4, Pointer), Variable(9, Integer)
                Store Variable(8, Boolean), Variable(10, Pointer)
            Variable(11, BoolVec) = VecInit Variable(4, Pointer), Variable(3, Integer)
            Return Variable(11, BoolVec)"#]]
    .assert_eq(&function.body.to_string());
}

#[test]
fn qubits_only_fold_to_literal_length_and_keep_register() {
    let mut function = Function::build("main", |b| {
        let q0 = b.qalloc();
        let q1 = b.qalloc();
        let bits = b.measure_with_register(Axis::Y, &[q0, q1], Some("c".into()));
        b.ret(Some(bits.into()));
    });

    expand_measurements(&mut function, &ExpandMeasurementsConfig::default())
        .expect("expansion should succeed");

    assert_eq!(count_op_kind(&function.body, OpKind::Loop), 0);
    expect![[r#"
        Block:
            Variable(0, Qubit) = QAlloc
            Variable(1, Qubit) = QAlloc
            Variable(3, Pointer) = Alloca Integer(2)
            Variable(4, Boolean) = My Variable(0, Qubit) register=c
            Variable(5, Pointer) = ElementPtr Variable(3, Pointer), Integer(0)
            Store Variable(4, Boolean), Variable(5, Pointer)
            Variable(6, Boolean) = My Variable(1, Qubit) register=c
            Variable(7, Pointer) = ElementPtr Variable(3, Pointer), Integer(1)
            Store Variable(6, Boolean), Variable(7, Pointer)
            Variable(8, BoolVec) = VecInit Variable(3, Pointer), Integer(2)
            Return Variable(8, BoolVec)"#]]
    .assert_eq(&function.body.to_string());
}

#[test]
fn zero_targets_produce_empty_vector() {
    let mut function = Function::build("main", |b| {
        let bits = b.measure(Axis::Z, &[]);
        b.ret(Some(bits.into()));
    });

    expand_measurements(&mut function, &ExpandMeasurementsConfig::default())
        .expect("expansion should succeed");

    expect![[r#"
        Block:
            Variable(1, Pointer) = Alloca Integer(0)
            Variable(2, BoolVec) = VecInit Variable(1, Pointer), Integer(0)
            Return Variable(2, BoolVec)"#]]
    .assert_eq(&function.body.to_string());
}

#[test]
fn expansion_is_idempotent() {
    let mut function = Function::build("main", |b| {
        let q = b.qalloc();
        let v = b.qalloc_vec(Literal::Index(4));
        let bits = b.measure(Axis::X, &[v, q]);
        b.ret(Some(bits.into()));
    });
    let config = ExpandMeasurementsConfig::default();
    expand_measurements(&mut function, &config).expect("expansion should succeed");
    let expanded = function.clone();

    let stats = expand_measurements(&mut function, &config).expect("expansion should succeed");

    assert_eq!(stats.rewrites, 0);
    assert_eq!(function, expanded);
}

#[test]
fn measurements_in_nested_blocks_are_expanded() {
    let mut function = Function::build("main", |b| {
        let q = b.qalloc();
        let v = b.qalloc_vec(Literal::Index(2));
        let bit = b.measure(Axis::Z, &[q]);
        b.if_then(bit, |b| {
            b.measure(Axis::Z, &[v]);
        });
        b.counted_loop(Literal::Index(3), |b, _| {
            b.measure(Axis::Y, &[q, q]);
            Ok::<_, ()>(())
        })
        .expect("loop body should build");
        b.ret(None);
    });

    let stats = expand_measurements(&mut function, &ExpandMeasurementsConfig::default())
        .expect("expansion should succeed");

    assert_eq!(stats.rewrites, 2);
    assert_all_measurements_individual(&function);
    assert_eq!(count_op_kind(&function.body, OpKind::VecInit), 2);
    assert_eq!(count_op_kind(&function.body, OpKind::Loop), 2);
}

#[test]
fn non_qubit_target_is_rejected_and_function_restored() {
    let mut function = Function::build("main", |b| {
        let q = b.qalloc();
        let v = b.qalloc_vec(Literal::Index(2));
        let n = b.size(v);
        b.set_span(Span::new(5, 9));
        b.measure(Axis::Z, &[q, n]);
        b.ret(None);
    });
    let original = function.clone();

    let err = expand_measurements(&mut function, &ExpandMeasurementsConfig::default())
        .expect_err("expansion should fail");

    assert_eq!(err, Error::TypeMismatch(Ty::Index, Span::new(5, 9)));
    assert_eq!(function, original);
}

#[test]
fn config_parses_camel_case_with_defaults() {
    let config: ExpandMeasurementsConfig = serde_json::from_str(
        r#"{ "reuseSizeQueries": false, "conversion": { "maxIterations": 8 } }"#,
    )
    .expect("config should parse");
    assert!(!config.reuse_size_queries);
    assert_eq!(config.conversion.max_iterations, 8);

    let config: ExpandMeasurementsConfig =
        serde_json::from_str("{}").expect("config should parse");
    assert_eq!(config, ExpandMeasurementsConfig::default());
}
