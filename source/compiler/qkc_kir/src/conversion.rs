// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Legality-driven rewriting of kernel functions.
//!
//! A [`ConversionTarget`] declares which operation kinds are legal, illegal, or legal depending
//! on the individual occurrence. [`apply_partial_conversion`] rewrites every illegal occurrence
//! with the registered [`RewritePattern`]s until none remain. Operation kinds the target says
//! nothing about are left untouched.


use crate::{
    builder::Builder,
    kir::{Function, Instruction, InstructionKind, OpKind, Ty, Variable, VariableId},
    utils::map_variable_use,
};
use log::{debug, trace};
use miette::Diagnostic;
use qkc_data_structures::span::Span;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Deserialize;
use std::{collections::VecDeque, mem::take};
use thiserror::Error;

#[derive(Clone, Debug, Diagnostic, Error, PartialEq, Eq)]
pub enum Error {
    #[error("failed to legalize `{0}` operation")]
    #[diagnostic(code("Qkc.Conversion.UnresolvedLegality"))]
    #[diagnostic(help("no rewrite pattern could bring this operation into its final form"))]
    UnresolvedLegality(OpKind, #[label] Span),

    #[error("conversion did not reach a fixpoint within {0} iterations")]
    #[diagnostic(code("Qkc.Conversion.IterationLimit"))]
    IterationLimit(usize, #[label] Span),

    #[error("measurement target has type {0}, expected Qubit or QubitVec")]
    #[diagnostic(code("Qkc.Conversion.TypeMismatch"))]
    TypeMismatch(Ty, #[label] Span),

    #[error("measurement result length overflows the allocation width")]
    #[diagnostic(code("Qkc.Conversion.AllocationOverflow"))]
    AllocationOverflow(#[label] Span),
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct ConversionConfig {
    /// Upper bound on the number of operations the driver visits in one function, counting
    /// re-enqueued replacements.
    pub max_iterations: usize,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1 << 20,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConversionStats {
    /// Operations popped from the work-list.
    pub iterations: usize,
    /// Successful pattern applications.
    pub rewrites: usize,
}

type LegalityFn = Box<dyn Fn(&Instruction) -> bool + Send + Sync>;

#[derive(Default)]
pub struct ConversionTarget {
    legal: FxHashSet<OpKind>,
    illegal: FxHashSet<OpKind>,
    dynamic: FxHashMap<OpKind, LegalityFn>,
}

impl ConversionTarget {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_legal_op(&mut self, kind: OpKind) {
        self.illegal.remove(&kind);
        self.dynamic.remove(&kind);
        self.legal.insert(kind);
    }

    pub fn add_legal_ops(&mut self, kinds: impl IntoIterator<Item = OpKind>) {
        for kind in kinds {
            self.add_legal_op(kind);
        }
    }

    pub fn add_illegal_op(&mut self, kind: OpKind) {
        self.legal.remove(&kind);
        self.dynamic.remove(&kind);
        self.illegal.insert(kind);
    }

    /// Declares `kind` legal exactly for the occurrences `is_legal` accepts.
    pub fn add_dynamically_legal_op(
        &mut self,
        kind: OpKind,
        is_legal: impl Fn(&Instruction) -> bool + Send + Sync + 'static,
    ) {
        self.legal.remove(&kind);
        self.illegal.remove(&kind);
        self.dynamic.insert(kind, Box::new(is_legal));
    }

    /// Returns whether the occurrence is legal, or `None` when its kind was never declared.
    #[must_use]
    pub fn legality(&self, instr: &Instruction) -> Option<bool> {
        let kind = instr.kind.op_kind();
        if let Some(is_legal) = self.dynamic.get(&kind) {
            Some(is_legal(instr))
        } else if self.legal.contains(&kind) {
            Some(true)
        } else if self.illegal.contains(&kind) {
            Some(false)
        } else {
            None
        }
    }
}

pub trait RewritePattern: Send + Sync {
    /// The operation kind this pattern is tried on.
    fn root(&self) -> OpKind;

    /// Emits the replacement for `instr` through `rewriter`. Returns `Ok(false)` if the pattern
    /// does not apply, in which case anything emitted is discarded.
    fn match_and_rewrite(&self, instr: &Instruction, rewriter: &mut Rewriter)
    -> Result<bool, Error>;
}

#[derive(Default)]
pub struct RewritePatternSet {
    patterns: Vec<Box<dyn RewritePattern>>,
}

impl RewritePatternSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, pattern: impl RewritePattern + 'static) {
        self.patterns.push(Box::new(pattern));
    }

    fn for_kind(&self, kind: OpKind) -> impl Iterator<Item = &dyn RewritePattern> {
        self.patterns
            .iter()
            .map(AsRef::as_ref)
            .filter(move |pattern| pattern.root() == kind)
    }
}

/// The insertion point handed to a pattern. Everything emitted through [`Rewriter::builder`]
/// replaces the matched operation in place.
pub struct Rewriter<'a> {
    builder: Builder<'a>,
    replacement: Option<Variable>,
}

impl<'a> Rewriter<'a> {
    fn new(next_variable_id: &'a mut VariableId, span: Span) -> Self {
        Self {
            builder: Builder::with_span(next_variable_id, span),
            replacement: None,
        }
    }

    pub fn builder(&mut self) -> &mut Builder<'a> {
        &mut self.builder
    }

    /// Substitutes `value` for every later use of the matched operation's result.
    pub fn replace_op_with(&mut self, value: Variable) {
        self.replacement = Some(value);
    }

    fn finish(self) -> (Vec<Instruction>, Option<Variable>) {
        (self.builder.finish(), self.replacement)
    }
}

/// Rewrites every illegal operation in `function` until only legal or undeclared operations
/// remain.
///
/// The driver keeps an explicit work-list seeded with the function body. Replacements produced by
/// a pattern are pushed back onto the front of the work-list so they are checked for legality in
/// turn, and nested blocks are converted before their parent is checked. If the conversion fails,
/// the function is left exactly as it was.
pub fn apply_partial_conversion(
    function: &mut Function,
    target: &ConversionTarget,
    patterns: &RewritePatternSet,
    config: ConversionConfig,
) -> Result<ConversionStats, Error> {
    debug!("converting function `{}`", function.name);
    let original_next_variable_id = function.next_variable_id;
    let original_body = function.body.clone();
    let body = take(&mut function.body.0);

    let mut driver = Driver {
        target,
        patterns,
        config,
        next_variable_id: &mut function.next_variable_id,
        replacements: FxHashMap::default(),
        stats: ConversionStats::default(),
    };
    match driver.convert_block(body) {
        Ok(converted) => {
            let stats = driver.stats;
            function.body.0 = converted;
            debug!(
                "converted function `{}`: {} iterations, {} rewrites",
                function.name, stats.iterations, stats.rewrites
            );
            Ok(stats)
        }
        Err(err) => {
            function.body = original_body;
            function.next_variable_id = original_next_variable_id;
            Err(err)
        }
    }
}

struct Driver<'a> {
    target: &'a ConversionTarget,
    patterns: &'a RewritePatternSet,
    config: ConversionConfig,
    next_variable_id: &'a mut VariableId,
    replacements: FxHashMap<VariableId, Variable>,
    stats: ConversionStats,
}

impl Driver<'_> {
    fn convert_block(&mut self, instrs: Vec<Instruction>) -> Result<Vec<Instruction>, Error> {
        let mut worklist = VecDeque::from(instrs);
        let mut converted = Vec::with_capacity(worklist.len());
        while let Some(mut instr) = worklist.pop_front() {
            self.stats.iterations += 1;
            if self.stats.iterations > self.config.max_iterations {
                return Err(Error::IterationLimit(self.config.max_iterations, instr.span));
            }

            map_variable_use(&mut instr, &self.replacements);
            self.convert_nested_blocks(&mut instr)?;

            match self.target.legality(&instr) {
                Some(false) => {
                    let replacement = self.rewrite(&instr)?;
                    for new_instr in replacement.into_iter().rev() {
                        worklist.push_front(new_instr);
                    }
                }
                Some(true) | None => converted.push(instr),
            }
        }
        Ok(converted)
    }

    fn convert_nested_blocks(&mut self, instr: &mut Instruction) -> Result<(), Error> {
        match &mut instr.kind {
            InstructionKind::Loop(_, _, body) => {
                body.0 = self.convert_block(take(&mut body.0))?;
            }
            InstructionKind::If(_, then_block, else_block) => {
                then_block.0 = self.convert_block(take(&mut then_block.0))?;
                else_block.0 = self.convert_block(take(&mut else_block.0))?;
            }
            _ => {}
        }
        Ok(())
    }

    fn rewrite(&mut self, instr: &Instruction) -> Result<Vec<Instruction>, Error> {
        let kind = instr.kind.op_kind();
        for pattern in self.patterns.for_kind(kind) {
            let mut rewriter = Rewriter::new(&mut *self.next_variable_id, instr.span);
            if !pattern.match_and_rewrite(instr, &mut rewriter)? {
                continue;
            }

            let (instrs, replacement) = rewriter.finish();
            if let (Some(old), Some(new)) = (instr.kind.result(), replacement) {
                self.replacements.insert(old.variable_id, new);
            }
            self.stats.rewrites += 1;
            trace!(
                "rewrote `{kind}` at {} into {} operations",
                instr.span,
                instrs.len()
            );
            return Ok(instrs);
        }
        Err(Error::UnresolvedLegality(kind, instr.span))
    }
}
