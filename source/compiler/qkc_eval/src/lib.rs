// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! A reference interpreter for kernels. Quantum instructions are delegated to a [`Backend`];
//! everything else is evaluated directly.

pub mod backend;

#[cfg(test)]
mod tests;

pub use backend::Backend;

use log::trace;
use miette::Diagnostic;
use qkc_data_structures::{index_map::IndexMap, span::Span};
use qkc_kir::kir::{
    Axis, Block, Function, Gate, Instruction, InstructionKind, Literal, Operand, Ty, Variable,
    VariableId,
};
use std::fmt::{self, Display, Formatter};
use thiserror::Error;

#[derive(Clone, Debug, Diagnostic, Error, PartialEq, Eq)]
pub enum Error {
    #[error("index {0} out of range for length {1}")]
    #[diagnostic(code("Qkc.Eval.IndexOutOfRange"))]
    IndexOutOfRange(i64, usize, #[label("out of range")] Span),

    #[error("read of uninitialized buffer element {0}")]
    #[diagnostic(code("Qkc.Eval.UninitializedRead"))]
    UninitializedRead(usize, #[label("never stored")] Span),

    #[error("arithmetic overflow")]
    #[diagnostic(code("Qkc.Eval.ArithmeticOverflow"))]
    ArithmeticOverflow(#[label] Span),

    #[error("variable {0} is used before it is defined")]
    #[diagnostic(code("Qkc.Eval.UnboundVariable"))]
    UnboundVariable(u32, #[label] Span),

    #[error("expected a value of type {0}, found {1}")]
    #[diagnostic(code("Qkc.Eval.UnsupportedValue"))]
    UnsupportedValue(Ty, Value, #[label] Span),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Bool(bool),
    Index(u64),
    Integer(i64),
    Qubit(usize),
    QubitVec(Vec<usize>),
    Pointer(Pointer),
    BoolVec(Vec<bool>),
}

/// An element position in one of the buffers allocated during evaluation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pointer {
    pub buffer: usize,
    pub offset: i64,
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Index(i) => write!(f, "{i}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Qubit(q) => write!(f, "Qubit{q}"),
            Value::QubitVec(qs) => write!(f, "{qs:?}"),
            Value::Pointer(ptr) => write!(f, "Pointer({}, {})", ptr.buffer, ptr.offset),
            Value::BoolVec(bits) => {
                write!(f, "[")?;
                for (idx, bit) in bits.iter().enumerate() {
                    let sep = if idx == 0 { "" } else { ", " };
                    write!(f, "{sep}{}", u8::from(*bit))?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Executes `function` against `backend` and returns the value it returns, if any.
///
/// A measurement with several targets, or with qubit vector targets, is evaluated by measuring
/// the qubits one at a time in target order, with vectors flattened in element order.
pub fn eval_function(
    function: &Function,
    backend: &mut impl Backend,
) -> Result<Option<Value>, Error> {
    let mut interpreter = Interpreter {
        backend,
        env: IndexMap::default(),
        buffers: Vec::new(),
    };
    match interpreter.eval_block(&function.body)? {
        Flow::Continue => Ok(None),
        Flow::Return(value) => Ok(value),
    }
}

enum Flow {
    Continue,
    Return(Option<Value>),
}

struct Interpreter<'a, B: Backend> {
    backend: &'a mut B,
    env: IndexMap<VariableId, Value>,
    buffers: Vec<Vec<Option<bool>>>,
}

impl<B: Backend> Interpreter<'_, B> {
    fn eval_block(&mut self, block: &Block) -> Result<Flow, Error> {
        for instr in &block.0 {
            if let Flow::Return(value) = self.eval_instr(instr)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Continue)
    }

    #[allow(clippy::too_many_lines)]
    fn eval_instr(&mut self, instr: &Instruction) -> Result<Flow, Error> {
        let span = instr.span;
        match &instr.kind {
            InstructionKind::QAlloc(None, var) => {
                let q = self.backend.qubit_allocate();
                self.bind(*var, Value::Qubit(q));
            }
            InstructionKind::QAlloc(Some(size), var) => {
                let size = self.index(size, span)?;
                let qubits = (0..size).map(|_| self.backend.qubit_allocate()).collect();
                self.bind(*var, Value::QubitVec(qubits));
            }
            InstructionKind::Gate(gate, qubit) => {
                let q = self.qubit(*qubit, span)?;
                match gate {
                    Gate::H => self.backend.h(q),
                    Gate::X => self.backend.x(q),
                    Gate::Y => self.backend.y(q),
                    Gate::Z => self.backend.z(q),
                }
            }
            InstructionKind::Reset(qubit) => {
                let q = self.qubit(*qubit, span)?;
                self.backend.reset(q);
            }
            InstructionKind::Measure(axis, targets, _, var) => {
                let mut outcomes = Vec::new();
                for target in targets {
                    match self.get(*target, span)?.clone() {
                        Value::Qubit(q) => outcomes.push(self.measure(*axis, q)),
                        Value::QubitVec(qubits) => {
                            for q in qubits {
                                outcomes.push(self.measure(*axis, q));
                            }
                        }
                        other => return Err(Error::UnsupportedValue(Ty::Qubit, other, span)),
                    }
                }
                let value = match (var.ty, outcomes.as_slice()) {
                    (Ty::Boolean, [bit]) => Value::Bool(*bit),
                    _ => Value::BoolVec(outcomes),
                };
                self.bind(*var, value);
            }
            InstructionKind::Size(vec, var) => {
                let len = self.qubit_vec(*vec, span)?.len();
                self.bind(*var, Value::Index(len as u64));
            }
            InstructionKind::Extract(vec, index, var) => {
                let index = self.index(index, span)?;
                let qubits = self.qubit_vec(*vec, span)?;
                let q = usize::try_from(index)
                    .ok()
                    .and_then(|index| qubits.get(index).copied())
                    .ok_or_else(|| {
                        Error::IndexOutOfRange(
                            i64::try_from(index).unwrap_or(i64::MAX),
                            qubits.len(),
                            span,
                        )
                    })?;
                self.bind(*var, Value::Qubit(q));
            }
            InstructionKind::Add(lhs, rhs, var) => {
                let sum = match (self.operand(lhs, span)?, self.operand(rhs, span)?) {
                    (Value::Index(a), Value::Index(b)) => a.checked_add(b).map(Value::Index),
                    (Value::Integer(a), Value::Integer(b)) => a.checked_add(b).map(Value::Integer),
                    (Value::Index(_), other) | (Value::Integer(_), other) | (other, _) => {
                        return Err(Error::UnsupportedValue(var.ty, other, span));
                    }
                };
                self.bind(*var, sum.ok_or(Error::ArithmeticOverflow(span))?);
            }
            InstructionKind::Not(operand, var) => {
                let value = self.bool(operand, span)?;
                self.bind(*var, Value::Bool(!value));
            }
            InstructionKind::IndexCast(operand, var) => {
                let index = self.index(operand, span)?;
                let value = i64::try_from(index).map_err(|_| Error::ArithmeticOverflow(span))?;
                self.bind(*var, Value::Integer(value));
            }
            InstructionKind::Alloca(len, var) => {
                let len = self.integer(len, span)?;
                let len = usize::try_from(len).map_err(|_| Error::IndexOutOfRange(len, 0, span))?;
                self.buffers.push(vec![None; len]);
                let ptr = Pointer {
                    buffer: self.buffers.len() - 1,
                    offset: 0,
                };
                self.bind(*var, Value::Pointer(ptr));
            }
            InstructionKind::ElementPtr(base, offset, var) => {
                let base = self.pointer(*base, span)?;
                let offset = self.integer(offset, span)?;
                let offset = base
                    .offset
                    .checked_add(offset)
                    .ok_or(Error::ArithmeticOverflow(span))?;
                self.bind(
                    *var,
                    Value::Pointer(Pointer {
                        buffer: base.buffer,
                        offset,
                    }),
                );
            }
            InstructionKind::Store(value, ptr) => {
                let value = self.bool(value, span)?;
                let ptr = self.pointer(*ptr, span)?;
                *self.slot(ptr, span)? = Some(value);
            }
            InstructionKind::Load(ptr, var) => {
                let ptr = self.pointer(*ptr, span)?;
                let value = self.read(ptr, span)?;
                self.bind(*var, Value::Bool(value));
            }
            InstructionKind::VecInit(ptr, len, var) => {
                let ptr = self.pointer(*ptr, span)?;
                let len = self.integer(len, span)?;
                let bits = (0..len)
                    .map(|idx| {
                        self.read(
                            Pointer {
                                buffer: ptr.buffer,
                                offset: ptr.offset + idx,
                            },
                            span,
                        )
                    })
                    .collect::<Result<_, _>>()?;
                self.bind(*var, Value::BoolVec(bits));
            }
            InstructionKind::Loop(count, iv, body) => {
                let count = self.index(count, span)?;
                for idx in 0..count {
                    self.bind(*iv, Value::Index(idx));
                    if let Flow::Return(value) = self.eval_block(body)? {
                        return Ok(Flow::Return(value));
                    }
                }
            }
            InstructionKind::If(cond, then_block, else_block) => {
                let block = if self.bool(&Operand::Variable(*cond), span)? {
                    then_block
                } else {
                    else_block
                };
                return self.eval_block(block);
            }
            InstructionKind::Return(value) => {
                let value = value
                    .as_ref()
                    .map(|value| self.operand(value, span))
                    .transpose()?;
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Continue)
    }

    fn measure(&mut self, axis: Axis, q: usize) -> bool {
        let outcome = match axis {
            Axis::X => self.backend.mx(q),
            Axis::Y => self.backend.my(q),
            Axis::Z => self.backend.mz(q),
        };
        trace!("m{axis} qubit {q} = {outcome}");
        outcome
    }

    fn bind(&mut self, var: Variable, value: Value) {
        self.env.insert(var.variable_id, value);
    }

    fn get(&self, var: Variable, span: Span) -> Result<&Value, Error> {
        self.env
            .get(var.variable_id)
            .ok_or(Error::UnboundVariable(var.variable_id.0, span))
    }

    fn operand(&self, operand: &Operand, span: Span) -> Result<Value, Error> {
        match operand {
            Operand::Literal(Literal::Bool(b)) => Ok(Value::Bool(*b)),
            Operand::Literal(Literal::Index(i)) => Ok(Value::Index(*i)),
            Operand::Literal(Literal::Integer(i)) => Ok(Value::Integer(*i)),
            Operand::Variable(var) => self.get(*var, span).cloned(),
        }
    }

    fn bool(&self, operand: &Operand, span: Span) -> Result<bool, Error> {
        match self.operand(operand, span)? {
            Value::Bool(b) => Ok(b),
            other => Err(Error::UnsupportedValue(Ty::Boolean, other, span)),
        }
    }

    fn index(&self, operand: &Operand, span: Span) -> Result<u64, Error> {
        match self.operand(operand, span)? {
            Value::Index(i) => Ok(i),
            other => Err(Error::UnsupportedValue(Ty::Index, other, span)),
        }
    }

    fn integer(&self, operand: &Operand, span: Span) -> Result<i64, Error> {
        match self.operand(operand, span)? {
            Value::Integer(i) => Ok(i),
            other => Err(Error::UnsupportedValue(Ty::Integer, other, span)),
        }
    }

    fn qubit(&self, var: Variable, span: Span) -> Result<usize, Error> {
        match self.get(var, span)? {
            Value::Qubit(q) => Ok(*q),
            other => Err(Error::UnsupportedValue(Ty::Qubit, other.clone(), span)),
        }
    }

    fn qubit_vec(&self, var: Variable, span: Span) -> Result<&[usize], Error> {
        match self.get(var, span)? {
            Value::QubitVec(qubits) => Ok(qubits),
            other => Err(Error::UnsupportedValue(Ty::QubitVec, other.clone(), span)),
        }
    }

    fn pointer(&self, var: Variable, span: Span) -> Result<Pointer, Error> {
        match self.get(var, span)? {
            Value::Pointer(ptr) => Ok(*ptr),
            other => Err(Error::UnsupportedValue(Ty::Pointer, other.clone(), span)),
        }
    }

    fn slot(&mut self, ptr: Pointer, span: Span) -> Result<&mut Option<bool>, Error> {
        let buffer = &mut self.buffers[ptr.buffer];
        let len = buffer.len();
        usize::try_from(ptr.offset)
            .ok()
            .and_then(|offset| buffer.get_mut(offset))
            .ok_or(Error::IndexOutOfRange(ptr.offset, len, span))
    }

    fn read(&mut self, ptr: Pointer, span: Span) -> Result<bool, Error> {
        let offset = ptr.offset;
        self.slot(ptr, span)?.ok_or_else(|| {
            Error::UninitializedRead(usize::try_from(offset).unwrap_or_default(), span)
        })
    }
}
