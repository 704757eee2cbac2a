// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#[cfg(test)]
mod tests;

use crate::{
    fold::{self, Overflow},
    kir::{
        Axis, Block, Gate, Instruction, InstructionKind, Operand, Ty, Variable, VariableId,
    },
};
use qkc_data_structures::span::Span;
use std::sync::Arc;

/// Returns the result type a measurement of `targets` must have: a single boolean for exactly one
/// qubit, a boolean vector for anything else.
#[must_use]
pub fn measure_result_type(targets: &[Variable]) -> Ty {
    match targets {
        [target] if target.ty == Ty::Qubit => Ty::Boolean,
        _ => Ty::BoolVec,
    }
}

/// An insertion cursor that appends instructions to a block under construction. Fresh variable
/// ids are drawn from the owning function's counter, and every emitted instruction is tagged
/// with the builder's current span.
pub struct Builder<'a> {
    instrs: Vec<Instruction>,
    next_variable_id: &'a mut VariableId,
    span: Span,
}

impl<'a> Builder<'a> {
    pub fn new(next_variable_id: &'a mut VariableId) -> Self {
        Self::with_span(next_variable_id, Span::default())
    }

    pub fn with_span(next_variable_id: &'a mut VariableId, span: Span) -> Self {
        Self {
            instrs: Vec::new(),
            next_variable_id,
            span,
        }
    }

    #[must_use]
    pub fn span(&self) -> Span {
        self.span
    }

    pub fn set_span(&mut self, span: Span) {
        self.span = span;
    }

    #[must_use]
    pub fn finish(self) -> Vec<Instruction> {
        self.instrs
    }

    pub fn fresh(&mut self, ty: Ty) -> Variable {
        let var = Variable::new(*self.next_variable_id, ty);
        *self.next_variable_id = self.next_variable_id.successor();
        var
    }

    pub fn push(&mut self, kind: InstructionKind) {
        self.instrs.push(Instruction::new(kind, self.span));
    }

    pub fn qalloc(&mut self) -> Variable {
        let var = self.fresh(Ty::Qubit);
        self.push(InstructionKind::QAlloc(None, var));
        var
    }

    pub fn qalloc_vec(&mut self, size: impl Into<Operand>) -> Variable {
        let var = self.fresh(Ty::QubitVec);
        self.push(InstructionKind::QAlloc(Some(size.into()), var));
        var
    }

    pub fn gate(&mut self, gate: Gate, qubit: Variable) {
        self.push(InstructionKind::Gate(gate, qubit));
    }

    pub fn reset(&mut self, qubit: Variable) {
        self.push(InstructionKind::Reset(qubit));
    }

    pub fn measure(&mut self, axis: Axis, targets: &[Variable]) -> Variable {
        self.measure_with_register(axis, targets, None)
    }

    pub fn measure_with_register(
        &mut self,
        axis: Axis,
        targets: &[Variable],
        register: Option<Arc<str>>,
    ) -> Variable {
        let var = self.fresh(measure_result_type(targets));
        self.push(InstructionKind::Measure(axis, targets.to_vec(), register, var));
        var
    }

    pub fn size(&mut self, vec: Variable) -> Variable {
        let var = self.fresh(Ty::Index);
        self.push(InstructionKind::Size(vec, var));
        var
    }

    pub fn extract(&mut self, vec: Variable, index: impl Into<Operand>) -> Variable {
        let var = self.fresh(Ty::Qubit);
        self.push(InstructionKind::Extract(vec, index.into(), var));
        var
    }

    /// Adds two values of the same integral type, folding the addition away when the result is
    /// known at compile time.
    pub fn add(
        &mut self,
        lhs: impl Into<Operand>,
        rhs: impl Into<Operand>,
    ) -> Result<Operand, Overflow> {
        let (lhs, rhs) = (lhs.into(), rhs.into());
        if let Some(folded) = fold::add(lhs, rhs) {
            return folded;
        }
        let var = self.fresh(lhs.get_type());
        self.push(InstructionKind::Add(lhs, rhs, var));
        Ok(var.into())
    }

    pub fn not(&mut self, operand: impl Into<Operand>) -> Variable {
        let var = self.fresh(Ty::Boolean);
        self.push(InstructionKind::Not(operand.into(), var));
        var
    }

    /// Converts an index to the integer allocation width.
    pub fn index_cast(&mut self, operand: impl Into<Operand>) -> Result<Operand, Overflow> {
        let operand = operand.into();
        if let Some(folded) = fold::index_cast(operand) {
            return folded;
        }
        let var = self.fresh(Ty::Integer);
        self.push(InstructionKind::IndexCast(operand, var));
        Ok(var.into())
    }

    pub fn alloca(&mut self, len: impl Into<Operand>) -> Variable {
        let var = self.fresh(Ty::Pointer);
        self.push(InstructionKind::Alloca(len.into(), var));
        var
    }

    pub fn element_ptr(&mut self, base: Variable, offset: impl Into<Operand>) -> Variable {
        let var = self.fresh(Ty::Pointer);
        self.push(InstructionKind::ElementPtr(base, offset.into(), var));
        var
    }

    pub fn store(&mut self, value: impl Into<Operand>, ptr: Variable) {
        self.push(InstructionKind::Store(value.into(), ptr));
    }

    pub fn load(&mut self, ptr: Variable) -> Variable {
        let var = self.fresh(Ty::Boolean);
        self.push(InstructionKind::Load(ptr, var));
        var
    }

    pub fn vec_init(&mut self, ptr: Variable, len: impl Into<Operand>) -> Variable {
        let var = self.fresh(Ty::BoolVec);
        self.push(InstructionKind::VecInit(ptr, len.into(), var));
        var
    }

    /// Emits a loop that runs `count` times. `body` receives a builder for the loop body and the
    /// induction variable, which ranges over `[0, count)`.
    pub fn counted_loop<E>(
        &mut self,
        count: impl Into<Operand>,
        body: impl FnOnce(&mut Builder, Variable) -> Result<(), E>,
    ) -> Result<(), E> {
        let iv = self.fresh(Ty::Index);
        let mut body_builder = Builder::with_span(&mut *self.next_variable_id, self.span);
        body(&mut body_builder, iv)?;
        let body = Block(body_builder.finish());
        self.push(InstructionKind::Loop(count.into(), iv, body));
        Ok(())
    }

    pub fn if_then_else(
        &mut self,
        cond: Variable,
        then_block: impl FnOnce(&mut Builder),
        else_block: impl FnOnce(&mut Builder),
    ) {
        let mut then_builder = Builder::with_span(&mut *self.next_variable_id, self.span);
        then_block(&mut then_builder);
        let then_block = Block(then_builder.finish());
        let mut else_builder = Builder::with_span(&mut *self.next_variable_id, self.span);
        else_block(&mut else_builder);
        let else_block = Block(else_builder.finish());
        self.push(InstructionKind::If(cond, then_block, else_block));
    }

    pub fn if_then(&mut self, cond: Variable, then_block: impl FnOnce(&mut Builder)) {
        self.if_then_else(cond, then_block, |_| {});
    }

    pub fn ret(&mut self, value: Option<Operand>) {
        self.push(InstructionKind::Return(value));
    }
}
