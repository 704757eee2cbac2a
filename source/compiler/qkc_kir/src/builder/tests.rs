// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use expect_test::expect;

use crate::{
    fold::Overflow,
    kir::{Axis, Function, Literal, Operand, Ty, VariableId},
};

use super::{Builder, measure_result_type};

#[test]
fn literal_arithmetic_emits_nothing() {
    let mut next_variable_id = VariableId::default();
    let mut builder = Builder::new(&mut next_variable_id);
    let sum = builder
        .add(Literal::Index(2), Literal::Index(3))
        .expect("addition should not overflow");
    let len = builder.index_cast(sum).expect("cast should not overflow");
    assert_eq!(sum, Operand::Literal(Literal::Index(5)));
    assert_eq!(len, Operand::Literal(Literal::Integer(5)));
    assert!(builder.finish().is_empty());
    assert_eq!(next_variable_id, VariableId(0));
}

#[test]
fn counted_loop_nests_body_under_induction_variable() {
    let function = Function::build("main", |b| {
        let q = b.qalloc();
        let v = b.qalloc_vec(Literal::Index(2));
        let size = b.size(v);
        let total = b
            .add(Literal::Index(1), size)
            .expect("addition should not overflow");
        let len = b.index_cast(total).expect("cast should not overflow");
        let buffer = b.alloca(len);
        b.counted_loop(size, |b, iv| -> Result<(), Overflow> {
            let qubit = b.extract(v, iv);
            let bit = b.measure(Axis::Z, &[qubit]);
            let offset = b.add(iv, Literal::Index(1))?;
            let offset = b.index_cast(offset)?;
            let addr = b.element_ptr(buffer, offset);
            b.store(bit, addr);
            Ok(())
        })
        .expect("loop body should build");
        b.measure(Axis::X, &[q]);
    });

    expect![[r#"
        Block:
            Variable(0, Qubit) = QAlloc
            Variable(1, QubitVec) = QAlloc Index(2)
            Variable(2, Index) = Size Variable(1, QubitVec)
            Variable(3, Index) = Add Index(1), Variable(2, Index)
            Variable(4, Integer) = IndexCast Variable(3, Index)
            Variable(5, Pointer) = Alloca Variable(4, Integer)
            Loop Variable(2, Index), iv=Variable(6, Index):
                Variable(7, Qubit) = Extract Variable(1, QubitVec), Variable(6, Index)
                Variable(8, Boolean) = Mz Variable(7, Qubit)
                Variable(9, Index) = Add Variable(6, Index), Index(1)
                Variable(10, Integer) = IndexCast Variable(9, Index)
                Variable(11, Pointer) = ElementPtr Variable(5, Pointer), Variable(10, Integer)
                Store Variable(8, Boolean), Variable(11, Pointer)
            Variable(12, Boolean) = Mx Variable(0, Qubit)"#]]
    .assert_eq(&function.body.to_string());
    assert_eq!(function.next_variable_id, VariableId(13));
}

#[test]
fn failing_loop_body_emits_no_loop() {
    let mut next_variable_id = VariableId::default();
    let mut builder = Builder::new(&mut next_variable_id);
    let result = builder.counted_loop(Literal::Index(3), |b, _| {
        b.add(Literal::Index(u64::MAX), Literal::Index(1))?;
        Ok::<(), Overflow>(())
    });
    assert_eq!(result, Err(Overflow));
    assert!(builder.finish().is_empty());
}

#[test]
fn measurement_result_type_follows_targets() {
    let mut next_variable_id = VariableId::default();
    let mut builder = Builder::new(&mut next_variable_id);
    let q0 = builder.qalloc();
    let q1 = builder.qalloc();
    let v = builder.qalloc_vec(Literal::Index(1));

    assert_eq!(measure_result_type(&[q0]), Ty::Boolean);
    assert_eq!(measure_result_type(&[q0, q1]), Ty::BoolVec);
    assert_eq!(measure_result_type(&[v]), Ty::BoolVec);
    assert_eq!(measure_result_type(&[]), Ty::BoolVec);
}
