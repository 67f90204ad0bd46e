//! The fixpoint engine and abstract-attribute catalogue (§3-§6.3, §9): given
//! a module built against the `attributor-ir` façade, deduces and manifests
//! facts about its functions, arguments, returns, call sites, call-site
//! arguments and free-floating SSA values.
//!
//! `attributor` (the workspace's entry-point crate) is the only expected
//! caller of [`engine::Engine`] directly; everything else in this crate is
//! either the generic machinery (`lattice`, `graph`, `record`, `position`,
//! `combinators`, `rewriter`) or one member of the `attributes` catalogue.

pub mod attributes;
pub mod combinators;
pub mod engine;
pub mod graph;
pub mod lattice;
pub mod position;
pub mod record;
pub mod rewriter;
pub mod seed;

pub use engine::Engine;
pub use position::Position;
pub use record::{AbstractAttribute, AnalysisKind, DependenceKind, NewAt, RecordHandle};
pub use rewriter::{AttrTarget, EditQueue};

/// Runs the engine to completion on every non-declaration function of
/// `module`, returning whether any IR edit was manifested.
///
/// This is the library-level counterpart of §6.5 `run-on-functions` applied
/// to the whole module; see [`run_on_functions`] for the function-subset
/// form. The `attributor` crate's pass-manager shims build on these two,
/// additionally notifying a [`attributor_ir::CallGraphUpdater`] per-SCC and
/// recomputing the caller's function set between rounds.
pub fn run_on_module(
    module: &mut attributor_ir::Module,
    config: attributor_session::Config,
    cg: &mut dyn attributor_ir::CallGraphUpdater,
) -> Result<bool, attributor_session::Report> {
    let funcs: Vec<attributor_ir::FuncId> = module.functions().map(|(id, _)| id).collect();
    run_on_functions(module, &funcs, config, cg)
}

/// §6.5 `run-on-functions`: seeds and solves only the positions reachable
/// from `funcs` (declarations among them are skipped, same as
/// [`run_on_module`]), then replays the staged edits against `module`.
///
/// Restricting the seeded set is what lets a pass manager re-run the solver
/// on just the functions a prior transform invalidated, or scope a run to a
/// single call-graph SCC, without re-seeding (and re-converging) the rest of
/// the module.
pub fn run_on_functions(
    module: &mut attributor_ir::Module,
    funcs: &[attributor_ir::FuncId],
    config: attributor_session::Config,
    cg: &mut dyn attributor_ir::CallGraphUpdater,
) -> Result<bool, attributor_session::Report> {
    let analysis = attributor_ir::BasicAnalysisCache::new();
    for &func in funcs {
        analysis.prime(module, func);
    }
    let mut engine = Engine::new(&*module, &analysis, config);
    let (edits, result) = engine.run_on(funcs);
    result?;
    let changed = !edits.is_empty();
    edits.apply(module, cg);
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use attributor_ir::{
        CallTarget, Function, Instruction, IrAttribute, MallocKind, Module, NullCallGraphUpdater, Opcode, Type,
        ValueKind,
    };
    use attributor_session::Config;

    use super::*;
    use crate::rewriter::has_attribute;

    /// `fn f() -> i32 { 42 }` called by `fn g() -> i32 { f() }`: the leaf
    /// should come out `nounwind willreturn readnone`, and the call in `g`
    /// should constant-fold to the literal `f` always returns.
    #[test]
    fn leaf_callee_attributes_and_call_site_folds_to_constant() {
        let mut module = Module::new();

        let mut f = Function::new("f", vec![], Some(Type::I32));
        let entry = f.create_block();
        let forty_two = f.make_const_int(Type::I32, 42);
        f.push_inst(entry, Instruction::new(entry, Opcode::Return, [forty_two]), None);
        let f_id = module.declare_function(f);

        let mut g = Function::new("g", vec![], Some(Type::I32));
        let entry = g.create_block();
        let (_, call_result) =
            g.push_inst(entry, Instruction::new(entry, Opcode::Call { callee: CallTarget::Direct(f_id) }, []), Some(Type::I32));
        g.push_inst(entry, Instruction::new(entry, Opcode::Return, [call_result.unwrap()]), None);
        let g_id = module.declare_function(g);

        let mut cg = NullCallGraphUpdater;
        let changed = run_on_module(&mut module, Config::new(), &mut cg).unwrap();
        assert!(changed);

        assert!(has_attribute(&module.functions[f_id], IrAttribute::NoUnwind));
        assert!(has_attribute(&module.functions[f_id], IrAttribute::WillReturn));
        assert!(has_attribute(&module.functions[f_id], IrAttribute::ReadNone));

        let g_func = &module.functions[g_id];
        let (_, ret_value) = g_func.returned_values()[0];
        assert_eq!(g_func.values[ret_value].kind, ValueKind::ConstInt(42));
    }

    /// A function that calls itself and then jumps back to its own entry
    /// never reaches a live `ret`, so it should be proven `noreturn`.
    #[test]
    fn self_recursive_infinite_loop_is_no_return() {
        let mut module = Module::new();
        let rec_id = module.functions.next_key();

        let mut rec = Function::new("rec", vec![], None);
        let entry = rec.create_block();
        rec.push_inst(entry, Instruction::new(entry, Opcode::Call { callee: CallTarget::Direct(rec_id) }, []), None);
        rec.push_inst(entry, Instruction::new(entry, Opcode::Jump(entry), []), None);
        let declared_id = module.declare_function(rec);
        assert_eq!(rec_id, declared_id);

        let mut cg = NullCallGraphUpdater;
        run_on_module(&mut module, Config::new(), &mut cg).unwrap();

        assert!(has_attribute(&module.functions[rec_id], IrAttribute::NoReturn));
    }

    /// `malloc`/`store`/`free` on a pointer that never escapes its defining
    /// function should be promoted to a stack allocation, with the matched
    /// `free` deleted.
    #[test]
    fn non_escaping_malloc_is_promoted_to_alloca() {
        let mut module = Module::new();

        let mut h = Function::new("h", vec![], None);
        let entry = h.create_block();
        let (_, ptr) = h.push_inst(
            entry,
            Instruction::new(entry, Opcode::MallocLike { kind: MallocKind::Malloc, size: Some(8) }, []),
            Some(Type::Ptr),
        );
        let ptr = ptr.unwrap();
        let zero = h.make_const_int(Type::I32, 0);
        h.push_inst(entry, Instruction::new(entry, Opcode::Store, [ptr, zero]), None);
        h.push_inst(entry, Instruction::new(entry, Opcode::FreeLike, [ptr]), None);
        h.push_inst(entry, Instruction::new(entry, Opcode::Return, []), None);
        let h_id = module.declare_function(h);

        let mut cg = NullCallGraphUpdater;
        let changed = run_on_module(&mut module, Config::new(), &mut cg).unwrap();
        assert!(changed);

        let h_func = &module.functions[h_id];
        assert!(h_func.instructions().any(|(_, inst)| matches!(inst.opcode, Opcode::Alloca { size: 8 })));
        assert!(!h_func.instructions().any(|(_, inst)| matches!(inst.opcode, Opcode::MallocLike { .. } | Opcode::FreeLike)));
    }

    /// `fn callee(p: ptr) { %v = load i32, p; store i32 %v, p; ret }` called
    /// as `fn caller(q: ptr) { call callee(q); ret }`: `q` never arrives as
    /// an existing stack allocation, so privatizable-pointer's manifest
    /// should splice in a fresh scratch allocation (load the old value,
    /// store it into the new slot) and redirect the call to pass that
    /// instead of `q` directly.
    #[test]
    fn privatizable_pointer_splices_scratch_allocation_at_call_site() {
        let mut module = Module::new();

        let mut callee = Function::new("callee", vec![Type::Ptr], None);
        let entry = callee.create_block();
        let p = callee.arg_value(0);
        let (_, loaded) = callee.push_inst(entry, Instruction::new(entry, Opcode::Load, [p]), Some(Type::I32));
        let loaded = loaded.unwrap();
        callee.push_inst(entry, Instruction::new(entry, Opcode::Store, [p, loaded]), None);
        callee.push_inst(entry, Instruction::new(entry, Opcode::Return, []), None);
        let callee_id = module.declare_function(callee);

        let mut caller = Function::new("caller", vec![Type::Ptr], None);
        let entry = caller.create_block();
        let q = caller.arg_value(0);
        caller.push_inst(entry, Instruction::new(entry, Opcode::Call { callee: CallTarget::Direct(callee_id) }, [q]), None);
        caller.push_inst(entry, Instruction::new(entry, Opcode::Return, []), None);
        let caller_id = module.declare_function(caller);

        let mut cg = NullCallGraphUpdater;
        let changed = run_on_module(&mut module, Config::new(), &mut cg).unwrap();
        assert!(changed);

        let caller_func = &module.functions[caller_id];
        let (call_inst, call) = caller_func
            .call_sites()
            .find(|(_, inst)| matches!(inst.call_target(), Some(CallTarget::Direct(id)) if id == callee_id))
            .expect("call to callee survives");
        let operand = call.operands[0];
        assert_ne!(operand, q, "the call site argument should no longer be the shared pointer");

        let ValueKind::InstResult(alloca_inst) = caller_func.values[operand].kind else {
            panic!("expected the rewritten operand to be a freshly inserted instruction result");
        };
        assert!(matches!(caller_func.insts[alloca_inst].opcode, Opcode::Alloca { .. }));

        let stored_through_scratch = caller_func.instructions().any(|(id, inst)| {
            id != call_inst
                && matches!(inst.opcode, Opcode::Store)
                && inst.operands[0] == operand
        });
        assert!(stored_through_scratch, "the scratch allocation should be initialized before the call");
    }
}
