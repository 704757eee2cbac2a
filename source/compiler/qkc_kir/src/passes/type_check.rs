// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::{
    builder::measure_result_type,
    kir::{Block, Function, InstructionKind, Ty, Variable},
    utils::assert_single_assignment,
};


/// Asserts that every instruction in the function is well typed and that every variable is
/// defined exactly once.
pub fn check_types(function: &Function) {
    assert_single_assignment(&function.body);
    check_block_types(&function.body);
}

fn check_block_types(block: &Block) {
    for instr in &block.0 {
        check_instr_types(&instr.kind);
        for nested in instr.kind.nested_blocks() {
            check_block_types(nested);
        }
    }
}

fn check_instr_types(instr: &InstructionKind) {
    match instr {
        InstructionKind::QAlloc(None, var) => assert_eq!(var.ty, Ty::Qubit),
        InstructionKind::QAlloc(Some(size), var) => {
            assert_eq!(size.get_type(), Ty::Index);
            assert_eq!(var.ty, Ty::QubitVec);
        }

        InstructionKind::Gate(_, qubit) | InstructionKind::Reset(qubit) => {
            assert_eq!(qubit.ty, Ty::Qubit);
        }

        InstructionKind::Measure(_, targets, _, var) => check_measure_types(targets, *var),

        InstructionKind::Size(vec, var) => {
            assert_eq!(vec.ty, Ty::QubitVec);
            assert_eq!(var.ty, Ty::Index);
        }

        InstructionKind::Extract(vec, index, var) => {
            assert_eq!(vec.ty, Ty::QubitVec);
            assert_eq!(index.get_type(), Ty::Index);
            assert_eq!(var.ty, Ty::Qubit);
        }

        InstructionKind::Add(opr1, opr2, var) => {
            assert_eq!(opr1.get_type(), opr2.get_type());
            assert_eq!(opr1.get_type(), var.ty);
            assert!(
                matches!(var.ty, Ty::Index | Ty::Integer),
                "addition is only defined on integral types"
            );
        }

        InstructionKind::Not(opr, var) => {
            assert_eq!(opr.get_type(), Ty::Boolean);
            assert_eq!(var.ty, Ty::Boolean);
        }

        InstructionKind::IndexCast(opr, var) => {
            assert_eq!(opr.get_type(), Ty::Index);
            assert_eq!(var.ty, Ty::Integer);
        }

        InstructionKind::Alloca(len, var) => {
            assert_eq!(len.get_type(), Ty::Integer);
            assert_eq!(var.ty, Ty::Pointer);
        }

        InstructionKind::ElementPtr(base, offset, var) => {
            assert_eq!(base.ty, Ty::Pointer);
            assert_eq!(offset.get_type(), Ty::Integer);
            assert_eq!(var.ty, Ty::Pointer);
        }

        InstructionKind::Store(opr, ptr) => {
            assert_eq!(opr.get_type(), Ty::Boolean);
            assert_eq!(ptr.ty, Ty::Pointer);
        }

        InstructionKind::Load(ptr, var) => {
            assert_eq!(ptr.ty, Ty::Pointer);
            assert_eq!(var.ty, Ty::Boolean);
        }

        InstructionKind::VecInit(ptr, len, var) => {
            assert_eq!(ptr.ty, Ty::Pointer);
            assert_eq!(len.get_type(), Ty::Integer);
            assert_eq!(var.ty, Ty::BoolVec);
        }

        InstructionKind::Loop(count, iv, _) => {
            assert_eq!(count.get_type(), Ty::Index);
            assert_eq!(iv.ty, Ty::Index);
        }

        InstructionKind::If(cond, _, _) => assert_eq!(cond.ty, Ty::Boolean),

        InstructionKind::Return(_) => {}
    }
}

fn check_measure_types(targets: &[Variable], var: Variable) {
    for target in targets {
        assert!(
            matches!(target.ty, Ty::Qubit | Ty::QubitVec),
            "measurement target should be a qubit or qubit vector, found {}",
            target.ty
        );
    }
    assert_eq!(
        var.ty,
        measure_result_type(targets),
        "measurement result type should follow its targets"
    );
}
