// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The kernel intermediate representation.
//!
//! A kernel is a [`Function`] whose body is a structured [`Block`] of instructions in SSA form.
//! Counted loops and conditionals own nested blocks, so a function body is a tree of regions
//! rather than a control flow graph.


use crate::builder::Builder;
use enum_iterator::Sequence;
use indenter::{Indented, indented};
use qkc_data_structures::{attrs::Attributes, index_map::IndexMap, span::Span};
use std::{
    fmt::{self, Display, Formatter, Write},
    sync::Arc,
};

/// A collection of kernels. Each function is an independent region for the purpose of passes.
#[derive(Clone, Debug, Default)]
pub struct Module {
    pub functions: IndexMap<FunctionId, Function>,
}

impl Module {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, function: Function) -> FunctionId {
        let id = self
            .functions
            .iter()
            .next_back()
            .map_or(FunctionId::default(), |(id, _)| id.successor());
        self.functions.insert(id, function);
        id
    }

    #[must_use]
    pub fn get_function(&self, id: FunctionId) -> &Function {
        self.functions.get(id).expect("function should be present")
    }

    #[must_use]
    pub fn find_function(&self, name: &str) -> Option<FunctionId> {
        self.functions
            .iter()
            .find(|(_, function)| function.name.as_ref() == name)
            .map(|(id, _)| id)
    }
}

impl Display for Module {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let mut indent = set_indentation(indented(f), 0);
        write!(indent, "Module:")?;
        indent = set_indentation(indent, 1);
        for (id, function) in self.functions.iter() {
            write!(indent, "\n{}: {function}", id.0)?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionId(pub u32);

impl FunctionId {
    #[must_use]
    pub fn successor(self) -> Self {
        Self(self.0 + 1)
    }
}

impl From<FunctionId> for usize {
    fn from(id: FunctionId) -> usize {
        id.0 as usize
    }
}

impl From<usize> for FunctionId {
    fn from(id: usize) -> Self {
        FunctionId(id.try_into().expect("function id should fit into u32"))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Function {
    pub name: Arc<str>,
    pub attrs: Attributes,
    pub body: Block,
    /// The lowest variable id not yet defined in `body`.
    pub next_variable_id: VariableId,
    pub span: Span,
}

impl Function {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            attrs: Attributes::default(),
            body: Block::default(),
            next_variable_id: VariableId::default(),
            span: Span::default(),
        }
    }

    /// Creates a function whose body is produced by `build`.
    pub fn build(name: &str, build: impl FnOnce(&mut Builder)) -> Self {
        let mut function = Self::new(name);
        let mut builder = Builder::new(&mut function.next_variable_id);
        build(&mut builder);
        function.body = Block(builder.finish());
        function
    }
}

impl Display for Function {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let mut indent = set_indentation(indented(f), 0);
        write!(indent, "Function {}:", self.name)?;
        indent = set_indentation(indent, 1);
        if !self.attrs.is_empty() {
            write!(indent, "\nattributes: {}", self.attrs)?;
        }
        write!(indent, "\n{}", self.body)?;
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Block(pub Vec<Instruction>);

impl Block {
    /// Visits every instruction in the block in program order, entering nested blocks right
    /// after the instruction that owns them.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Instruction)) {
        for instr in &self.0 {
            f(instr);
            for block in instr.kind.nested_blocks() {
                block.walk(f);
            }
        }
    }
}

impl Display for Block {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let mut indent = set_indentation(indented(f), 0);
        write!(indent, "Block:")?;
        indent = set_indentation(indent, 1);
        for instr in &self.0 {
            write!(indent, "\n{instr}")?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Instruction {
    pub kind: InstructionKind,
    pub span: Span,
}

impl Instruction {
    #[must_use]
    pub fn new(kind: InstructionKind, span: Span) -> Self {
        Self { kind, span }
    }
}

impl From<InstructionKind> for Instruction {
    fn from(kind: InstructionKind) -> Self {
        Self {
            kind,
            span: Span::default(),
        }
    }
}

impl Display for Instruction {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum InstructionKind {
    /// Allocates a single qubit, or a vector of qubits when a size is given.
    QAlloc(Option<Operand>, Variable),
    Gate(Gate, Variable),
    Reset(Variable),
    /// Measures the targets along the axis. The result is a single boolean when there is exactly
    /// one qubit target, and a boolean vector otherwise.
    Measure(Axis, Vec<Variable>, Option<Arc<str>>, Variable),
    /// Queries the number of qubits in a qubit vector.
    Size(Variable, Variable),
    Extract(Variable, Operand, Variable),
    Add(Operand, Operand, Variable),
    Not(Operand, Variable),
    IndexCast(Operand, Variable),
    /// Reserves stack storage for the given number of booleans.
    Alloca(Operand, Variable),
    ElementPtr(Variable, Operand, Variable),
    Store(Operand, Variable),
    Load(Variable, Variable),
    /// Wraps a boolean buffer and its length into a boolean vector.
    VecInit(Variable, Operand, Variable),
    /// Runs the body once per value of the induction variable in `[0, count)`.
    Loop(Operand, Variable, Block),
    If(Variable, Block, Block),
    Return(Option<Operand>),
}

impl InstructionKind {
    #[must_use]
    pub fn op_kind(&self) -> OpKind {
        match self {
            InstructionKind::QAlloc(..) => OpKind::QAlloc,
            InstructionKind::Gate(..) => OpKind::Gate,
            InstructionKind::Reset(..) => OpKind::Reset,
            InstructionKind::Measure(Axis::X, ..) => OpKind::Mx,
            InstructionKind::Measure(Axis::Y, ..) => OpKind::My,
            InstructionKind::Measure(Axis::Z, ..) => OpKind::Mz,
            InstructionKind::Size(..) => OpKind::Size,
            InstructionKind::Extract(..) => OpKind::Extract,
            InstructionKind::Add(..) => OpKind::Add,
            InstructionKind::Not(..) => OpKind::Not,
            InstructionKind::IndexCast(..) => OpKind::IndexCast,
            InstructionKind::Alloca(..) => OpKind::Alloca,
            InstructionKind::ElementPtr(..) => OpKind::ElementPtr,
            InstructionKind::Store(..) => OpKind::Store,
            InstructionKind::Load(..) => OpKind::Load,
            InstructionKind::VecInit(..) => OpKind::VecInit,
            InstructionKind::Loop(..) => OpKind::Loop,
            InstructionKind::If(..) => OpKind::If,
            InstructionKind::Return(..) => OpKind::Return,
        }
    }

    /// The variable defined by this instruction, if any. Loop induction variables are scoped to
    /// the loop body and are not reported here.
    #[must_use]
    pub fn result(&self) -> Option<Variable> {
        match self {
            InstructionKind::QAlloc(_, var)
            | InstructionKind::Measure(_, _, _, var)
            | InstructionKind::Size(_, var)
            | InstructionKind::Extract(_, _, var)
            | InstructionKind::Add(_, _, var)
            | InstructionKind::Not(_, var)
            | InstructionKind::IndexCast(_, var)
            | InstructionKind::Alloca(_, var)
            | InstructionKind::ElementPtr(_, _, var)
            | InstructionKind::Load(_, var)
            | InstructionKind::VecInit(_, _, var) => Some(*var),
            InstructionKind::Gate(..)
            | InstructionKind::Reset(..)
            | InstructionKind::Store(..)
            | InstructionKind::Loop(..)
            | InstructionKind::If(..)
            | InstructionKind::Return(..) => None,
        }
    }

    #[must_use]
    pub fn nested_blocks(&self) -> Vec<&Block> {
        match self {
            InstructionKind::Loop(_, _, body) => vec![body],
            InstructionKind::If(_, then_block, else_block) => vec![then_block, else_block],
            _ => Vec::new(),
        }
    }

    /// Calls `f` on every variable this instruction reads, including reads made by instructions
    /// in nested blocks.
    pub fn for_each_use(&self, f: &mut impl FnMut(Variable)) {
        fn visit_operand(operand: &Operand, f: &mut impl FnMut(Variable)) {
            if let Operand::Variable(var) = operand {
                f(*var);
            }
        }
        match self {
            InstructionKind::QAlloc(size, _) => {
                if let Some(size) = size {
                    visit_operand(size, f);
                }
            }
            InstructionKind::Gate(_, var)
            | InstructionKind::Reset(var)
            | InstructionKind::Size(var, _)
            | InstructionKind::Load(var, _) => f(*var),
            InstructionKind::Measure(_, targets, _, _) => {
                for target in targets {
                    f(*target);
                }
            }
            InstructionKind::Extract(var, operand, _)
            | InstructionKind::ElementPtr(var, operand, _)
            | InstructionKind::VecInit(var, operand, _)
            | InstructionKind::Store(operand, var) => {
                f(*var);
                visit_operand(operand, f);
            }
            InstructionKind::Add(lhs, rhs, _) => {
                visit_operand(lhs, f);
                visit_operand(rhs, f);
            }
            InstructionKind::Not(operand, _)
            | InstructionKind::IndexCast(operand, _)
            | InstructionKind::Alloca(operand, _) => visit_operand(operand, f),
            InstructionKind::Loop(count, _, body) => {
                visit_operand(count, f);
                for instr in &body.0 {
                    instr.kind.for_each_use(f);
                }
            }
            InstructionKind::If(cond, then_block, else_block) => {
                f(*cond);
                for instr in then_block.0.iter().chain(&else_block.0) {
                    instr.kind.for_each_use(f);
                }
            }
            InstructionKind::Return(value) => {
                if let Some(value) = value {
                    visit_operand(value, f);
                }
            }
        }
    }

    /// Calls `f` on every variable this instruction reads so the use can be rewritten in place.
    /// Definitions are left untouched.
    pub fn map_uses(&mut self, f: &mut impl FnMut(&mut Variable)) {
        fn map_operand(operand: &mut Operand, f: &mut impl FnMut(&mut Variable)) {
            if let Operand::Variable(var) = operand {
                f(var);
            }
        }
        match self {
            InstructionKind::QAlloc(size, _) => {
                if let Some(size) = size {
                    map_operand(size, f);
                }
            }
            InstructionKind::Gate(_, var)
            | InstructionKind::Reset(var)
            | InstructionKind::Size(var, _)
            | InstructionKind::Load(var, _) => f(var),
            InstructionKind::Measure(_, targets, _, _) => targets.iter_mut().for_each(f),
            InstructionKind::Extract(var, operand, _)
            | InstructionKind::ElementPtr(var, operand, _)
            | InstructionKind::VecInit(var, operand, _)
            | InstructionKind::Store(operand, var) => {
                f(var);
                map_operand(operand, f);
            }
            InstructionKind::Add(lhs, rhs, _) => {
                map_operand(lhs, f);
                map_operand(rhs, f);
            }
            InstructionKind::Not(operand, _)
            | InstructionKind::IndexCast(operand, _)
            | InstructionKind::Alloca(operand, _) => map_operand(operand, f),
            InstructionKind::Loop(count, _, body) => {
                map_operand(count, f);
                for instr in &mut body.0 {
                    instr.kind.map_uses(f);
                }
            }
            InstructionKind::If(cond, then_block, else_block) => {
                f(cond);
                for instr in then_block.0.iter_mut().chain(&mut else_block.0) {
                    instr.kind.map_uses(f);
                }
            }
            InstructionKind::Return(value) => {
                if let Some(value) = value {
                    map_operand(value, f);
                }
            }
        }
    }
}

impl Display for InstructionKind {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            InstructionKind::QAlloc(None, var) => write!(f, "{var} = QAlloc"),
            InstructionKind::QAlloc(Some(size), var) => write!(f, "{var} = QAlloc {size}"),
            InstructionKind::Gate(gate, qubit) => write!(f, "{gate} {qubit}"),
            InstructionKind::Reset(qubit) => write!(f, "Reset {qubit}"),
            InstructionKind::Measure(axis, targets, register, var) => {
                write!(f, "{var} = M{axis}")?;
                for (idx, target) in targets.iter().enumerate() {
                    let sep = if idx == 0 { " " } else { ", " };
                    write!(f, "{sep}{target}")?;
                }
                if let Some(register) = register {
                    write!(f, " register={register}")?;
                }
                Ok(())
            }
            InstructionKind::Size(vec, var) => write!(f, "{var} = Size {vec}"),
            InstructionKind::Extract(vec, index, var) => {
                write!(f, "{var} = Extract {vec}, {index}")
            }
            InstructionKind::Add(lhs, rhs, var) => write!(f, "{var} = Add {lhs}, {rhs}"),
            InstructionKind::Not(operand, var) => write!(f, "{var} = Not {operand}"),
            InstructionKind::IndexCast(operand, var) => write!(f, "{var} = IndexCast {operand}"),
            InstructionKind::Alloca(len, var) => write!(f, "{var} = Alloca {len}"),
            InstructionKind::ElementPtr(base, offset, var) => {
                write!(f, "{var} = ElementPtr {base}, {offset}")
            }
            InstructionKind::Store(value, ptr) => write!(f, "Store {value}, {ptr}"),
            InstructionKind::Load(ptr, var) => write!(f, "{var} = Load {ptr}"),
            InstructionKind::VecInit(ptr, len, var) => write!(f, "{var} = VecInit {ptr}, {len}"),
            InstructionKind::Loop(count, iv, body) => {
                let mut indent = set_indentation(indented(f), 0);
                write!(indent, "Loop {count}, iv={iv}:")?;
                indent = set_indentation(indent, 1);
                for instr in &body.0 {
                    write!(indent, "\n{instr}")?;
                }
                Ok(())
            }
            InstructionKind::If(cond, then_block, else_block) => {
                let mut indent = set_indentation(indented(f), 0);
                write!(indent, "If {cond}:")?;
                for (label, block) in [("Then", then_block), ("Else", else_block)] {
                    if block.0.is_empty() {
                        continue;
                    }
                    indent = set_indentation(indent, 1);
                    write!(indent, "\n{label}:")?;
                    indent = set_indentation(indent, 2);
                    for instr in &block.0 {
                        write!(indent, "\n{instr}")?;
                    }
                }
                Ok(())
            }
            InstructionKind::Return(None) => write!(f, "Return"),
            InstructionKind::Return(Some(value)) => write!(f, "Return {value}"),
        }
    }
}

/// The operation kinds of the IR, without their operands. Conversion legality is declared per
/// kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Sequence)]
pub enum OpKind {
    QAlloc,
    Gate,
    Reset,
    Mx,
    My,
    Mz,
    Size,
    Extract,
    Add,
    Not,
    IndexCast,
    Alloca,
    ElementPtr,
    Store,
    Load,
    VecInit,
    Loop,
    If,
    Return,
}

impl Display for OpKind {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Sequence)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    #[must_use]
    pub fn op_kind(self) -> OpKind {
        match self {
            Axis::X => OpKind::Mx,
            Axis::Y => OpKind::My,
            Axis::Z => OpKind::Mz,
        }
    }
}

impl Display for Axis {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Axis::X => write!(f, "x"),
            Axis::Y => write!(f, "y"),
            Axis::Z => write!(f, "z"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Gate {
    H,
    X,
    Y,
    Z,
}

impl Display for Gate {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariableId(pub u32);

impl VariableId {
    #[must_use]
    pub fn successor(self) -> Self {
        Self(self.0 + 1)
    }
}

impl From<VariableId> for usize {
    fn from(id: VariableId) -> usize {
        id.0 as usize
    }
}

impl From<usize> for VariableId {
    fn from(id: usize) -> Self {
        VariableId(id.try_into().expect("variable id should fit into u32"))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Variable {
    pub variable_id: VariableId,
    pub ty: Ty,
}

impl Variable {
    #[must_use]
    pub fn new(variable_id: VariableId, ty: Ty) -> Self {
        Self { variable_id, ty }
    }

    #[must_use]
    pub fn new_boolean(variable_id: VariableId) -> Self {
        Self::new(variable_id, Ty::Boolean)
    }

    #[must_use]
    pub fn new_index(variable_id: VariableId) -> Self {
        Self::new(variable_id, Ty::Index)
    }

    #[must_use]
    pub fn new_qubit(variable_id: VariableId) -> Self {
        Self::new(variable_id, Ty::Qubit)
    }

    #[must_use]
    pub fn new_qubit_vec(variable_id: VariableId) -> Self {
        Self::new(variable_id, Ty::QubitVec)
    }
}

impl Display for Variable {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "Variable({}, {})", self.variable_id.0, self.ty)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Ty {
    Boolean,
    /// Unsigned machine index, used for sizes and loop induction variables.
    Index,
    /// Signed 64-bit integer, the width used for allocation lengths and buffer offsets.
    Integer,
    Qubit,
    QubitVec,
    Pointer,
    BoolVec,
}

impl Display for Ty {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Literal {
    Bool(bool),
    Index(u64),
    Integer(i64),
}

impl Literal {
    #[must_use]
    pub fn get_type(&self) -> Ty {
        match self {
            Literal::Bool(_) => Ty::Boolean,
            Literal::Index(_) => Ty::Index,
            Literal::Integer(_) => Ty::Integer,
        }
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Literal::Bool(b) => write!(f, "Bool({b})"),
            Literal::Index(i) => write!(f, "Index({i})"),
            Literal::Integer(i) => write!(f, "Integer({i})"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operand {
    Literal(Literal),
    Variable(Variable),
}

impl Operand {
    #[must_use]
    pub fn get_type(&self) -> Ty {
        match self {
            Operand::Literal(lit) => lit.get_type(),
            Operand::Variable(var) => var.ty,
        }
    }
}

impl From<Variable> for Operand {
    fn from(var: Variable) -> Self {
        Operand::Variable(var)
    }
}

impl From<Literal> for Operand {
    fn from(lit: Literal) -> Self {
        Operand::Literal(lit)
    }
}

impl Display for Operand {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Operand::Literal(lit) => write!(f, "{lit}"),
            Operand::Variable(var) => write!(f, "{var}"),
        }
    }
}

fn set_indentation<'a, 'b>(
    indent: Indented<'a, Formatter<'b>>,
    level: usize,
) -> Indented<'a, Formatter<'b>> {
    match level {
        0 => indent.with_str(""),
        1 => indent.with_str("    "),
        2 => indent.with_str("        "),
        _ => unimplemented!("indentation level not supported"),
    }
}
