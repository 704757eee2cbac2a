// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Expands measurements of several qubits, or of qubit vectors, into measurements of individual
//! qubits whose outcomes are collected into a boolean vector.
//!
//! For `%r = Mz %q0, %v` the replacement is, in order: the result length `1 + Size(%v)`, a buffer
//! of that many booleans, a measurement of `%q0` stored at offset 0, a loop measuring each qubit
//! of `%v` into offset `1 + i`, and finally a `VecInit` of the buffer that takes the place of `%r`.

#[cfg(test)]
mod tests;

use crate::{
    conversion::{
        ConversionConfig, ConversionStats, ConversionTarget, Error, RewritePattern,
        RewritePatternSet, Rewriter, apply_partial_conversion,
    },
    fold::Overflow,
    kir::{Axis, Function, Instruction, InstructionKind, Literal, OpKind, Operand, Ty},
};
use enum_iterator::all;
use log::{debug, error};
use serde::Deserialize;

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct ExpandMeasurementsConfig {
    /// Reuse the size queried while computing the result length for the loop over each qubit
    /// vector, instead of querying the vector again right before its loop.
    pub reuse_size_queries: bool,
    pub conversion: ConversionConfig,
}

impl Default for ExpandMeasurementsConfig {
    fn default() -> Self {
        Self {
            reuse_size_queries: true,
            conversion: ConversionConfig::default(),
        }
    }
}

/// A measurement is in its final form when it measures exactly one qubit, which is the case
/// exactly when its result is a single boolean.
#[must_use]
pub fn uses_individual_qubit(instr: &Instruction) -> bool {
    matches!(&instr.kind, InstructionKind::Measure(_, _, _, result) if result.ty == Ty::Boolean)
}

/// Rewrites every measurement in `function` that is not already a measurement of an individual
/// qubit. On failure the function is left unchanged.
pub fn expand_measurements(
    function: &mut Function,
    config: &ExpandMeasurementsConfig,
) -> Result<ConversionStats, Error> {
    let mut patterns = RewritePatternSet::new();
    for axis in all::<Axis>() {
        patterns.insert(ExpandMeasurement {
            axis,
            reuse_size_queries: config.reuse_size_queries,
        });
    }

    let mut target = ConversionTarget::new();
    target.add_legal_ops(all::<OpKind>());
    for axis in all::<Axis>() {
        target.add_dynamically_legal_op(axis.op_kind(), uses_individual_qubit);
    }

    match apply_partial_conversion(function, &target, &patterns, config.conversion) {
        Ok(stats) => {
            debug!(
                "expanded {} measurements in `{}`",
                stats.rewrites, function.name
            );
            Ok(stats)
        }
        Err(err) => {
            error!("failed to expand measurements in `{}`: {err}", function.name);
            Err(err)
        }
    }
}

pub struct ExpandMeasurement {
    pub axis: Axis,
    pub reuse_size_queries: bool,
}

impl RewritePattern for ExpandMeasurement {
    fn root(&self) -> OpKind {
        self.axis.op_kind()
    }

    fn match_and_rewrite(
        &self,
        instr: &Instruction,
        rewriter: &mut Rewriter,
    ) -> Result<bool, Error> {
        let InstructionKind::Measure(axis, targets, register, _) = &instr.kind else {
            return Ok(false);
        };
        if *axis != self.axis {
            return Ok(false);
        }
        let span = instr.span;
        let overflow = |_: Overflow| Error::AllocationOverflow(span);
        let b = rewriter.builder();

        // Determine the number of booleans in the result: one per qubit plus the size of every
        // qubit vector.
        let mut num_qubits = 0_u64;
        for target in targets {
            match target.ty {
                Ty::Qubit => num_qubits += 1,
                Ty::QubitVec => {}
                ty => return Err(Error::TypeMismatch(ty, span)),
            }
        }
        let mut total = Operand::from(Literal::Index(num_qubits));
        let mut sizes = Vec::new();
        for &target in targets.iter().filter(|target| target.ty == Ty::QubitVec) {
            let size = b.size(target);
            sizes.push(size);
            total = b.add(total, size).map_err(overflow)?;
        }

        let len = b.index_cast(total).map_err(overflow)?;
        let buffer = b.alloca(len);

        // Measure every qubit in target order, storing each outcome at the next free offset.
        let mut offset = Operand::from(Literal::Index(0));
        let mut sizes = sizes.into_iter();
        for &target in targets {
            if target.ty == Ty::Qubit {
                let bit = b.measure_with_register(self.axis, &[target], register.clone());
                let position = b.index_cast(offset).map_err(overflow)?;
                let addr = b.element_ptr(buffer, position);
                b.store(bit, addr);
                offset = b.add(offset, Literal::Index(1)).map_err(overflow)?;
                continue;
            }

            let queried = sizes
                .next()
                .expect("every qubit vector should have a queried size");
            let size = if self.reuse_size_queries {
                queried
            } else {
                b.size(target)
            };
            b.counted_loop(size, |b, iv| {
                let qubit = b.extract(target, iv);
                let bit = b.measure_with_register(self.axis, &[qubit], register.clone());
                let position = b.add(iv, offset).map_err(overflow)?;
                let position = b.index_cast(position).map_err(overflow)?;
                let addr = b.element_ptr(buffer, position);
                b.store(bit, addr);
                Ok::<_, Error>(())
            })?;
            offset = b.add(offset, size).map_err(overflow)?;
        }

        let result = b.vec_init(buffer, len);
        rewriter.replace_op_with(result);
        Ok(true)
    }
}
