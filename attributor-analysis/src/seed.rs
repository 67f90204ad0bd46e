//! §4.5 seeding: the initial set of records created for a function the
//! moment it is admitted to the engine. Seeding never itself drives the
//! worklist to fixpoint; it only calls `get_or_create`, which both
//! initializes and enqueues each record, so the first `run_to_fixpoint`
//! drain picks every one of them up.
//!
//! Every record here is cheap to create eagerly: the catalogue's own
//! `update` methods already call `get_or_create` on demand for anything not
//! listed below (a callee's `Returned` record, a peer `Float` record, and so
//! on), so under-seeding only costs an extra worklist round-trip, never
//! correctness. What *is* seeded eagerly is chosen to match the positions
//! §4.4 actually manifests attributes at.

use attributor_ir::FuncId;

use crate::{
    attributes::{
        Alignment, Dereferenceable, HeapToStack, LivenessFunction, LivenessValue, MemoryBehavior, MemoryLocation,
        NoAlias, NoCapture, NoFree, NoRecurse, NoReturn, NoSync, NoUnwind, NonNull, PrivatizablePointer, Reachability,
        ReturnedValues, UndefinedBehavior, ValueRange, ValueSimplify, WillReturn,
    },
    engine::Engine,
    position::Position,
};

/// Seeds every record §4.5 lists for `func`'s function/argument/returned
/// positions, then walks its call-like instructions to seed the
/// corresponding call-site/call-site-argument positions.
pub fn seed_function(engine: &mut Engine, func: FuncId) {
    seed_function_position(engine, func);
    seed_return_position(engine, func);
    seed_argument_positions(engine, func);
    seed_call_site_positions(engine, func);
}

fn seed_function_position(engine: &mut Engine, func: FuncId) {
    let position = Position::Function(func);
    engine.get_or_create::<LivenessFunction>(position);
    engine.get_or_create::<Reachability>(position);
    engine.get_or_create::<WillReturn>(position);
    engine.get_or_create::<UndefinedBehavior>(position);
    engine.get_or_create::<NoUnwind>(position);
    engine.get_or_create::<NoSync>(position);
    engine.get_or_create::<NoFree>(position);
    engine.get_or_create::<NoReturn>(position);
    engine.get_or_create::<NoRecurse>(position);
    engine.get_or_create::<MemoryBehavior>(position);
    engine.get_or_create::<MemoryLocation>(position);
    if engine.config().heap_to_stack_enabled() {
        seed_heap_to_stack_sites(engine, func);
    }
}

/// `heap-to-stack` is seeded per allocation site rather than once per
/// function (it is a `Float` position naming the allocating instruction's
/// result, per its own module doc comment), so this walks the function's
/// instructions looking for `malloc`-like results.
fn seed_heap_to_stack_sites(engine: &mut Engine, func: FuncId) {
    let allocations: Vec<attributor_ir::ValueId> = engine.module().functions[func]
        .instructions()
        .filter(|(_, inst)| matches!(inst.opcode, attributor_ir::Opcode::MallocLike { .. }))
        .filter_map(|(_, inst)| inst.result)
        .collect();
    for value in allocations {
        engine.get_or_create::<HeapToStack>(Position::Float(func, value));
    }
}

fn seed_return_position(engine: &mut Engine, func: FuncId) {
    let Some(ret_ty) = engine.module().functions[func].ret_ty else { return };
    if ret_ty == attributor_ir::Type::Void {
        return;
    }
    let position = Position::Returned(func);
    engine.get_or_create::<ReturnedValues>(position);
    engine.get_or_create::<LivenessValue>(position);
    engine.get_or_create::<ValueSimplify>(position);
    if ret_ty.is_pointer() {
        engine.get_or_create::<Alignment>(position);
        engine.get_or_create::<NonNull>(position);
        engine.get_or_create::<NoAlias>(position);
        engine.get_or_create::<Dereferenceable>(position);
    }
}

fn seed_argument_positions(engine: &mut Engine, func: FuncId) {
    let param_types = engine.module().functions[func].param_types.clone();
    for (idx, ty) in param_types.into_iter().enumerate() {
        let idx = idx as u32;
        let position = Position::Argument(func, idx);
        engine.get_or_create::<ValueSimplify>(position);
        engine.get_or_create::<LivenessValue>(position);
        if ty.is_pointer() {
            engine.get_or_create::<NonNull>(position);
            engine.get_or_create::<NoAlias>(position);
            engine.get_or_create::<Dereferenceable>(position);
            engine.get_or_create::<Alignment>(position);
            engine.get_or_create::<NoCapture>(position);
            engine.get_or_create::<NoFree>(position);
            engine.get_or_create::<PrivatizablePointer>(position);
        }
    }
}

/// Call-site mirrors are only worth seeding eagerly in interprocedural mode;
/// in the intraprocedural mode each function's own facts still get seeded
/// above, `update`'s `callee_mirror_position` dispatch just never gets a
/// chance to run since nothing ever calls `get_or_create` on the mirror
/// first.
fn seed_call_site_positions(engine: &mut Engine, func: FuncId) {
    if !engine.config().is_interprocedural() {
        return;
    }
    let calls: Vec<(attributor_ir::InstId, Option<attributor_ir::Type>, usize)> = engine.module().functions[func]
        .call_sites()
        .map(|(id, inst)| (id, inst.result.map(|r| engine.module().functions[func].value_type(r)), inst.operands.len()))
        .collect();

    for (call, result_ty, arg_count) in calls {
        if let Some(result_ty) = result_ty {
            let returned = Position::CallSiteReturned(func, call);
            engine.get_or_create::<ValueSimplify>(returned);
            engine.get_or_create::<LivenessValue>(returned);
            engine.get_or_create::<ValueRange>(returned);
            if result_ty.is_pointer() {
                engine.get_or_create::<NonNull>(returned);
                engine.get_or_create::<NoAlias>(returned);
                engine.get_or_create::<Dereferenceable>(returned);
                engine.get_or_create::<Alignment>(returned);
            }
        }

        for idx in 0..arg_count as u32 {
            let operand = engine.module().functions[func].insts[call].operands[idx as usize];
            let ty = engine.module().functions[func].value_type(operand);
            let position = Position::CallSiteArgument(func, call, idx);
            engine.get_or_create::<ValueSimplify>(position);
            if ty.is_pointer() {
                engine.get_or_create::<NonNull>(position);
                engine.get_or_create::<NoAlias>(position);
                engine.get_or_create::<Dereferenceable>(position);
                engine.get_or_create::<Alignment>(position);
                engine.get_or_create::<NoCapture>(position);
                engine.get_or_create::<NoFree>(position);
            }
        }
    }
}
