//! End-to-end coverage for the worked examples a single run of the solver
//! should reproduce. Scenarios 1, 3 and 5 already have inline coverage in
//! `attributor-analysis`'s own test module; this file covers the remaining
//! three, each exercised through this crate's own pass-manager shim rather
//! than the engine directly.

use attributor_ir::{
    CallTarget, Function, ICmpPredicate, Instruction, IrAttribute, Module, NullCallGraphUpdater, Opcode, Type,
    ValueKind,
};
use attributor_session::Config;

use attributor::run_module_pass;

fn has_attribute(func: &Function, attr: IrAttribute) -> bool {
    func.attrs.has_flag(attr)
}

/// `h(i8* nonnull dereferenceable(16) %p) { %q = getelementptr i8, i8* %p, i64 4; ret i8* %q }`:
/// `%p` should end up marked `returned`, and the return should pick up
/// `nonnull dereferenceable(12)` (16 bytes minus the 4-byte offset).
#[test]
fn getelementptr_of_a_dereferenceable_argument_propagates_to_the_return() {
    let mut module = Module::new();

    let mut h = Function::new("h", vec![Type::Ptr], Some(Type::Ptr));
    h.arg_attrs[0].insert(IrAttribute::NonNull);
    h.arg_attrs[0].insert(IrAttribute::Dereferenceable(16));
    let entry = h.create_block();
    let p = h.arg_value(0);
    let (_, q) = h.push_inst(entry, Instruction::new(entry, Opcode::GetElementPtr { offset: 4 }, [p]), Some(Type::Ptr));
    let q = q.unwrap();
    h.push_inst(entry, Instruction::new(entry, Opcode::Return, [q]), None);
    let h_id = module.declare_function(h);

    let mut cg = NullCallGraphUpdater;
    let changed = run_module_pass(&mut module, Config::new(), &mut cg).unwrap();
    assert!(changed);

    let h_func = &module.functions[h_id];
    assert!(
        h_func.arg_attrs[0].has_flag(IrAttribute::Returned),
        "the sole argument feeding the return should be marked returned"
    );
    assert!(h_func.ret_attrs.has_flag(IrAttribute::NonNull));
    assert_eq!(h_func.ret_attrs.dereferenceable_bytes(), 12);
}

/// `cmp(i32 %x) { %c = icmp ult i32 %x, 10; ret i1 %c }` called only with
/// arguments in `[0, 5]`: every call's result should fold to the constant
/// `i1 true` (the comparison can never be false for that input range).
#[test]
fn icmp_always_true_over_bounded_callers_folds_call_sites_to_true() {
    let mut module = Module::new();

    let mut cmp = Function::new("cmp", vec![Type::I32], Some(Type::I1));
    let entry = cmp.create_block();
    let x = cmp.arg_value(0);
    let ten = cmp.make_const_int(Type::I32, 10);
    let (_, c) = cmp.push_inst(entry, Instruction::new(entry, Opcode::ICmp(ICmpPredicate::Ult), [x, ten]), Some(Type::I1));
    let c = c.unwrap();
    cmp.push_inst(entry, Instruction::new(entry, Opcode::Return, [c]), None);
    let cmp_id = module.declare_function(cmp);

    let mut caller_lo = Function::new("caller_lo", vec![], Some(Type::I1));
    let entry = caller_lo.create_block();
    let zero = caller_lo.make_const_int(Type::I32, 0);
    let (_, r_lo) =
        caller_lo.push_inst(entry, Instruction::new(entry, Opcode::Call { callee: CallTarget::Direct(cmp_id) }, [zero]), Some(Type::I1));
    let r_lo = r_lo.unwrap();
    caller_lo.push_inst(entry, Instruction::new(entry, Opcode::Return, [r_lo]), None);
    let caller_lo_id = module.declare_function(caller_lo);

    let mut caller_hi = Function::new("caller_hi", vec![], Some(Type::I1));
    let entry = caller_hi.create_block();
    let five = caller_hi.make_const_int(Type::I32, 5);
    let (_, r_hi) =
        caller_hi.push_inst(entry, Instruction::new(entry, Opcode::Call { callee: CallTarget::Direct(cmp_id) }, [five]), Some(Type::I1));
    let r_hi = r_hi.unwrap();
    caller_hi.push_inst(entry, Instruction::new(entry, Opcode::Return, [r_hi]), None);
    let caller_hi_id = module.declare_function(caller_hi);

    let mut cg = NullCallGraphUpdater;
    let changed = run_module_pass(&mut module, Config::new(), &mut cg).unwrap();
    assert!(changed);

    for caller_id in [caller_lo_id, caller_hi_id] {
        let caller_func = &module.functions[caller_id];
        let (_, ret_value) = caller_func.returned_values()[0];
        assert_eq!(caller_func.values[ret_value].kind, ValueKind::ConstInt(1), "{} should fold its call to true", caller_func.name);
    }
}

/// A function whose only block jumps back to itself can never return, so
/// `willreturn` must never be added, even though it still qualifies for
/// facts unrelated to termination such as `nounwind`.
#[test]
fn unbounded_self_loop_is_never_willreturn_but_still_nounwind() {
    let mut module = Module::new();

    let mut spin = Function::new("spin", vec![], None);
    let entry = spin.create_block();
    spin.push_inst(entry, Instruction::new(entry, Opcode::Jump(entry), []), None);
    let spin_id = module.declare_function(spin);

    let mut cg = NullCallGraphUpdater;
    run_module_pass(&mut module, Config::new(), &mut cg).unwrap();

    let spin_func = &module.functions[spin_id];
    assert!(!has_attribute(spin_func, IrAttribute::WillReturn));
    assert!(has_attribute(spin_func, IrAttribute::NoUnwind));
}
