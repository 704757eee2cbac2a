// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.


use crate::kir::{Block, Instruction, InstructionKind, OpKind, Variable, VariableId};
use rustc_hash::{FxHashMap, FxHashSet};

/// Replaces every use of a variable found in `var_map` with its mapped value, including uses in
/// nested blocks.
pub fn map_variable_use(instr: &mut Instruction, var_map: &FxHashMap<VariableId, Variable>) {
    if var_map.is_empty() {
        return;
    }
    instr.kind.map_uses(&mut |var| {
        if let Some(new_var) = var_map.get(&var.variable_id) {
            *var = *new_var;
        }
    });
}

/// Given a block, return a map from each variable to the instructions that read it, in program
/// order. Control flow instructions are reported for the uses made by their nested blocks as well.
#[must_use]
pub fn build_use_map(block: &Block) -> FxHashMap<VariableId, Vec<&Instruction>> {
    let mut uses: FxHashMap<VariableId, Vec<&Instruction>> = FxHashMap::default();
    block.walk(&mut |instr| {
        instr.kind.for_each_use(&mut |var| {
            let users = uses.entry(var.variable_id).or_default();
            if !users.last().is_some_and(|last| std::ptr::eq(*last, instr)) {
                users.push(instr);
            }
        });
    });
    uses
}

/// Asserts that every variable is assigned exactly once, counting loop induction variables and
/// definitions in nested blocks.
pub fn assert_single_assignment(block: &Block) {
    let mut defined = FxHashSet::default();
    block.walk(&mut |instr| {
        let iv = match &instr.kind {
            InstructionKind::Loop(_, iv, _) => Some(*iv),
            _ => None,
        };
        for var in iv.into_iter().chain(instr.kind.result()) {
            assert!(
                defined.insert(var.variable_id),
                "Duplicate assignment to {:?}",
                var.variable_id
            );
        }
    });
}

#[must_use]
pub fn count_op_kind(block: &Block, kind: OpKind) -> usize {
    let mut count = 0;
    block.walk(&mut |instr| {
        if instr.kind.op_kind() == kind {
            count += 1;
        }
    });
    count
}
