// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use expect_test::expect;
use qkc_data_structures::span::Span;
use qkc_kir::kir::{Axis, Function, Gate, InstructionKind, Literal, Ty};

use crate::{Error, Value, backend::Scripted, eval_function};

#[test]
fn conditional_follows_measurement_outcome() {
    let function = Function::build("main", |b| {
        let q = b.qalloc();
        let bit = b.measure(Axis::Z, &[q]);
        b.if_then_else(bit, |b| b.gate(Gate::X, q), |b| b.reset(q));
        let negated = b.not(bit);
        b.ret(Some(negated.into()));
    });

    let mut backend = Scripted::new([(0, true)]);
    let value = eval_function(&function, &mut backend).expect("evaluation should succeed");

    assert_eq!(value, Some(Value::Bool(false)));
}

#[test]
fn multi_target_measurement_flattens_targets_in_order() {
    let function = Function::build("main", |b| {
        let q0 = b.qalloc();
        let v = b.qalloc_vec(Literal::Index(2));
        let q1 = b.qalloc();
        let bits = b.measure(Axis::Y, &[q0, v, q1]);
        b.ret(Some(bits.into()));
    });

    let mut backend = Scripted::new([(0, true), (2, true)]);
    let value = eval_function(&function, &mut backend)
        .expect("evaluation should succeed")
        .expect("function should return a value");

    assert_eq!(backend.measured, vec![0, 1, 2, 3]);
    expect!["[1, 0, 1, 0]"].assert_eq(&value.to_string());
}

#[test]
fn loop_measures_each_element_into_buffer() {
    let function = Function::build("main", |b| {
        let v = b.qalloc_vec(Literal::Index(3));
        let size = b.size(v);
        let len = b.index_cast(size).expect("cast should not overflow");
        let buffer = b.alloca(len);
        b.counted_loop(size, |b, iv| {
            let q = b.extract(v, iv);
            let bit = b.measure(Axis::Z, &[q]);
            let position = b.index_cast(iv).expect("cast should not overflow");
            let slot = b.element_ptr(buffer, position);
            b.store(bit, slot);
            Ok::<_, ()>(())
        })
        .expect("loop body should build");
        let bits = b.vec_init(buffer, len);
        b.ret(Some(bits.into()));
    });

    let mut backend = Scripted::new([(1, true)]);
    let value = eval_function(&function, &mut backend).expect("evaluation should succeed");

    assert_eq!(value, Some(Value::BoolVec(vec![false, true, false])));
}

#[test]
fn reading_unstored_element_fails() {
    let function = Function::build("main", |b| {
        let buffer = b.alloca(Literal::Integer(2));
        let slot = b.element_ptr(buffer, Literal::Integer(1));
        b.set_span(Span::new(4, 8));
        let bit = b.load(slot);
        b.ret(Some(bit.into()));
    });

    let err = eval_function(&function, &mut Scripted::default())
        .expect_err("evaluation should fail");

    assert_eq!(err, Error::UninitializedRead(1, Span::new(4, 8)));
    expect!["read of uninitialized buffer element 1"].assert_eq(&err.to_string());
}

#[test]
fn storing_past_the_end_fails() {
    let function = Function::build("main", |b| {
        let buffer = b.alloca(Literal::Integer(1));
        let slot = b.element_ptr(buffer, Literal::Integer(1));
        b.set_span(Span::new(1, 2));
        b.store(Literal::Bool(true), slot);
    });

    let err = eval_function(&function, &mut Scripted::default())
        .expect_err("evaluation should fail");

    assert_eq!(err, Error::IndexOutOfRange(1, 1, Span::new(1, 2)));
}

#[test]
fn function_without_return_value_yields_nothing() {
    let function = Function::build("main", |b| {
        let q = b.qalloc();
        b.gate(Gate::H, q);
    });
    assert_eq!(eval_function(&function, &mut Scripted::default()), Ok(None));
}

#[test]
fn index_cast_beyond_integer_range_fails() {
    let function = Function::build("main", |b| {
        let len = b.fresh(Ty::Integer);
        b.set_span(Span::new(2, 6));
        b.push(InstructionKind::IndexCast(Literal::Index(u64::MAX).into(), len));
        b.ret(Some(len.into()));
    });

    let err = eval_function(&function, &mut Scripted::default())
        .expect_err("evaluation should fail");

    assert_eq!(err, Error::ArithmeticOverflow(Span::new(2, 6)));
}
