// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.


use crate::{
    kir::{Axis, Block, Function, Instruction, InstructionKind, Operand, Variable, VariableId},
    utils::build_use_map,
};
use log::debug;
use qkc_data_structures::attrs::Attributes;
use rustc_hash::{FxHashMap, FxHashSet};

/// Marks functions whose control flow depends on measurement outcomes with
/// [`Attributes::MeasurementFeedback`], so backends know they cannot sample the kernel in bulk.
pub fn add_metadata(function: &mut Function) {
    if has_measurement_feedback(&function.body) {
        debug!("function `{}` has measurement feedback", function.name);
        function.attrs |= Attributes::MeasurementFeedback;
    }
}

fn has_measurement_feedback(body: &Block) -> bool {
    let uses = build_use_map(body);
    let mut results = FxHashSet::default();
    let mut register_targets = Vec::new();
    body.walk(&mut |instr| {
        if let InstructionKind::Measure(Axis::Z, targets, register, result) = &instr.kind {
            results.insert(result.variable_id);
            if register.is_some() {
                register_targets.extend(targets.iter().copied());
            }
        }
    });

    if results.iter().any(|result| is_condition(&uses, *result)) {
        return true;
    }

    let roots = allocation_roots(body);
    let stored_to = allocations_storing(body, &roots, &results);
    if loads_from(body, &roots, &stored_to)
        .into_iter()
        .any(|loaded| feeds_condition(&uses, loaded))
    {
        return true;
    }

    // A measurement into a named register followed by a reset of the measured qubit also needs
    // shot-by-shot execution, even without any conditional.
    register_targets
        .into_iter()
        .any(|target| is_reset(&uses, target))
}

fn is_reset(uses: &FxHashMap<VariableId, Vec<&Instruction>>, qubit: Variable) -> bool {
    uses.get(&qubit.variable_id).is_some_and(|users| {
        users
            .iter()
            .any(|user| matches!(user.kind, InstructionKind::Reset(reset) if reset == qubit))
    })
}

fn is_condition(uses: &FxHashMap<VariableId, Vec<&Instruction>>, var: VariableId) -> bool {
    uses.get(&var).is_some_and(|users| {
        users.iter().any(|user| {
            matches!(&user.kind, InstructionKind::If(cond, ..) if cond.variable_id == var)
        })
    })
}

/// Follows a loaded value through boolean negations to see whether it ends up as a condition.
fn feeds_condition(uses: &FxHashMap<VariableId, Vec<&Instruction>>, var: VariableId) -> bool {
    if is_condition(uses, var) {
        return true;
    }
    uses.get(&var).is_some_and(|users| {
        users.iter().any(|user| match &user.kind {
            InstructionKind::Not(Operand::Variable(operand), result)
                if operand.variable_id == var =>
            {
                feeds_condition(uses, result.variable_id)
            }
            _ => false,
        })
    })
}

/// Returns the allocations, identified by the variable their `Alloca` defines, that receive one
/// of the given measurement results.
fn allocations_storing(
    body: &Block,
    roots: &FxHashMap<VariableId, VariableId>,
    results: &FxHashSet<VariableId>,
) -> FxHashSet<VariableId> {
    let mut stored_to = FxHashSet::default();
    body.walk(&mut |instr| {
        if let InstructionKind::Store(Operand::Variable(value), ptr) = &instr.kind
            && results.contains(&value.variable_id)
            && let Some(root) = roots.get(&ptr.variable_id)
        {
            stored_to.insert(*root);
        }
    });
    stored_to
}

/// Returns the variables defined by loads from any of the given allocations.
fn loads_from(
    body: &Block,
    roots: &FxHashMap<VariableId, VariableId>,
    allocations: &FxHashSet<VariableId>,
) -> Vec<VariableId> {
    if allocations.is_empty() {
        return Vec::new();
    }
    let mut loaded = Vec::new();
    body.walk(&mut |instr| {
        if let InstructionKind::Load(ptr, var) = &instr.kind
            && roots
                .get(&ptr.variable_id)
                .is_some_and(|root| allocations.contains(root))
        {
            loaded.push(var.variable_id);
        }
    });
    loaded
}

/// Maps every pointer derived from an `Alloca` to the variable that allocation defines.
fn allocation_roots(body: &Block) -> FxHashMap<VariableId, VariableId> {
    let mut roots = FxHashMap::default();
    body.walk(&mut |instr| match &instr.kind {
        InstructionKind::Alloca(_, ptr) => {
            roots.insert(ptr.variable_id, ptr.variable_id);
        }
        InstructionKind::ElementPtr(base, _, ptr) => {
            if let Some(root) = roots.get(&base.variable_id).copied() {
                roots.insert(ptr.variable_id, root);
            }
        }
        _ => {}
    });
    roots
}
