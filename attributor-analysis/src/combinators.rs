//! Reusable query helpers shared by several concrete attributes (§4.3, C4).
//!
//! The source organizes these as higher-order constructors that return new
//! trait implementations; a closed, one-level trait (§9) makes that
//! indirection unnecessary here; instead each combinator is a small function
//! an attribute's `update` calls directly, keeping the composition explicit
//! at the call site rather than hidden behind another layer of dispatch.

use attributor_ir::{CallTarget, FuncId, InstId, Module};
use smallvec::SmallVec;

use crate::position::Position;

/// **ReturnedFromReturnedValues**: the positions feeding a function's return,
/// one per `ret` instruction's operand. `None` in the list marks a `ret`
/// whose value could not be resolved to a position (there is none in this
/// IR — every `ret` either carries a value or is void — kept for parity with
/// the combinator's documented "if any returned call cannot be resolved,
/// pessimize" escape hatch).
pub fn returned_value_positions(module: &Module, func: FuncId) -> SmallVec<[Position; 4]> {
    module.functions[func]
        .returned_values()
        .into_iter()
        .map(|(_, value)| Position::Float(func, value))
        .collect()
}

/// **ArgumentFromCallSiteArguments**: every call site across the whole
/// module that calls `callee` directly, paired with the argument index's
/// call-site-argument position. Callback (indirect) call sites cannot be
/// mapped and are reported separately so the caller can pessimize.
pub fn call_site_argument_positions(module: &Module, callee: FuncId, arg_index: u32) -> (SmallVec<[Position; 4]>, bool) {
    let mut positions = SmallVec::new();
    let mut saw_unmappable_callback = false;
    for (caller, f) in module.functions() {
        for (call_inst, inst) in f.call_sites() {
            match inst.call_target() {
                Some(CallTarget::Direct(target)) if target == callee => {
                    if (arg_index as usize) < inst.operands.len() {
                        positions.push(Position::CallSiteArgument(caller, call_inst, arg_index));
                    } else {
                        saw_unmappable_callback = true;
                    }
                }
                Some(CallTarget::Indirect(_)) => {
                    // Cannot tell whether this indirect call targets
                    // `callee`; a sound analysis cannot assume it doesn't.
                    saw_unmappable_callback = true;
                }
                _ => {}
            }
        }
    }
    (positions, saw_unmappable_callback)
}

/// All direct call sites anywhere in the module, with their call instruction
/// and direct callee.
pub fn all_direct_call_sites(module: &Module) -> Vec<(FuncId, InstId, FuncId)> {
    let mut out = Vec::new();
    for (caller, f) in module.functions() {
        for (call_inst, inst) in f.call_sites() {
            if let Some(CallTarget::Direct(callee)) = inst.call_target() {
                out.push((caller, call_inst, callee));
            }
        }
    }
    out
}

/// **CallSiteReturnedFromReturned**: the callee's return position, or `None`
/// for an indirect call site (the call-site-return position then has no
/// single peer to copy and must be handled some other way by the caller).
pub fn callee_returned_position(module: &Module, caller: FuncId, call: InstId) -> Option<Position> {
    match module.functions[caller].insts[call].call_target()? {
        CallTarget::Direct(callee) => Some(Position::Returned(callee)),
        CallTarget::Indirect(_) => None,
    }
}

/// The position a call-site mirror (`CallSite`/`CallSiteReturned`/
/// `CallSiteArgument`) defers to by default (§4.4 "mirrors defer to the
/// callee position unless they have call-site-specific reasoning") — `None`
/// for an indirect call site, since there is no callee position to defer to.
pub fn callee_mirror_position(position: Position, module: &Module) -> Option<Position> {
    match position {
        Position::CallSiteArgument(_, _, idx) => position.callee(module).map(|c| Position::Argument(c, idx)),
        Position::CallSiteReturned(_, _) => position.callee(module).map(Position::Returned),
        Position::CallSite(_, _) => position.callee(module).map(Position::Function),
        _ => None,
    }
}

/// A single step of a pointer's flow, yielded by [`transitive_pointer_flow`]:
/// either a use by some instruction (which may itself produce a further
/// value to keep following), or the value escaping as the function's return.
#[derive(Debug, Clone, Copy)]
pub enum FlowStep {
    Use(attributor_ir::Use),
    Returned(InstId),
}

/// Follows a pointer value through the propagating instructions several
/// attributes care about (`GetElementPtr`/`BitCast`/`Phi`/`Select`, per
/// `no-free`'s and `no-capture`'s documented "follows uses through
/// GEP/bitcast/phi/select/return" rule), yielding every use along the way —
/// including the ones at which the pointer escapes into a new SSA value, so
/// callers can inspect the consuming instruction itself (a `free` call, a
/// call-site argument, a `store` of the pointer) as well as keep following.
///
/// This is a plain worklist over `uses_of`, not a fixpoint of its own: it
/// terminates because each step only ever follows a definition to its own
/// (later, well-formed-SSA) uses, and a visited-set guards against revisiting
/// a value through a phi/select cycle.
pub fn transitive_pointer_flow(module: &Module, func: FuncId, root: attributor_ir::ValueId) -> Vec<FlowStep> {
    use attributor_ir::Opcode;

    let mut steps = Vec::new();
    let mut worklist = vec![root];
    let mut seen = SmallVec::<[attributor_ir::ValueId; 8]>::new();
    seen.push(root);

    while let Some(value) = worklist.pop() {
        let f = &module.functions[func];
        for u in f.uses_of(value) {
            let inst = &f.insts[u.inst];
            steps.push(FlowStep::Use(u));
            if matches!(inst.opcode, Opcode::Return) {
                steps.push(FlowStep::Returned(u.inst));
                continue;
            }
            let propagates = matches!(
                inst.opcode,
                Opcode::GetElementPtr { .. } | Opcode::BitCast | Opcode::Phi { .. } | Opcode::Select
            );
            if propagates {
                if let Some(result) = inst.result {
                    if !seen.contains(&result) {
                        seen.push(result);
                        worklist.push(result);
                    }
                }
            }
        }
    }
    steps
}
