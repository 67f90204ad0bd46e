//! **no-recurse** (§4.4): a function position. Initialized pessimistic if the
//! function participates in a non-trivial call-graph SCC (including direct
//! self-recursion); otherwise proven by showing either that every call-like
//! instruction in the function targets a different, assumed no-recurse
//! callee, or that every caller of the function is itself assumed
//! no-recurse.

use attributor_ir::{CallTarget, FuncId, InstId};

use crate::{
    attributes::reachability::Reachability,
    engine::Engine,
    lattice::{ChangeResult, KnownAssumed},
    position::Position,
    record::{AbstractAttribute, AnalysisKind, NewAt},
    rewriter::{AttrTarget, EditQueue},
};

#[derive(Debug)]
pub struct NoRecurse {
    position: Position,
    state: KnownAssumed<bool>,
}

impl NewAt for NoRecurse {
    const KIND: AnalysisKind = AnalysisKind::NoRecurse;

    fn new_at(position: Position) -> Self {
        Self { position, state: KnownAssumed::new(true) }
    }
}

impl NoRecurse {
    fn func(&self) -> FuncId {
        self.position.anchor_function().expect("no-recurse is only seeded at function positions")
    }

    pub fn is_known_no_recurse(&self) -> bool {
        *self.state.known()
    }

    fn callees_all_no_recurse(&self, engine: &mut Engine, func: FuncId) -> bool {
        let calls: Vec<InstId> = engine.module().functions[func].call_sites().map(|(id, _)| id).collect();
        for call in calls {
            if engine.is_assumed_dead_instruction(func, call) {
                continue;
            }
            match engine.module().functions[func].insts[call].call_target() {
                Some(CallTarget::Direct(callee)) if callee != func => {
                    let handle = engine.get_or_create::<NoRecurse>(Position::Function(callee));
                    if !engine.is_valid(handle)
                        || !engine.downcast::<NoRecurse>(handle).is_some_and(NoRecurse::is_known_no_recurse)
                    {
                        return false;
                    }
                }
                _ => return false,
            }
        }
        true
    }

    fn callers_all_no_recurse(&self, engine: &mut Engine, func: FuncId) -> bool {
        let callers: Vec<FuncId> = engine
            .module()
            .functions()
            .filter(|(_, f)| f.call_sites().any(|(_, inst)| inst.call_target() == Some(CallTarget::Direct(func))))
            .map(|(id, _)| id)
            .collect();
        if callers.is_empty() {
            // No known caller: could be an external entry point (sound to
            // treat as never recursively re-entered) or dead code (the
            // liveness-filtered callee check above already covers that case
            // for calls this module can see).
            return true;
        }
        for caller in callers {
            let handle = engine.get_or_create::<NoRecurse>(Position::Function(caller));
            if !engine.is_valid(handle) || !engine.downcast::<NoRecurse>(handle).is_some_and(NoRecurse::is_known_no_recurse) {
                return false;
            }
        }
        true
    }

    /// Refines the raw call-graph SCC check with intra-function
    /// reachability: a function whose only direct self-call sits in a block
    /// dead from entry is not actually capable of recursing through it. Only
    /// narrows the direct-self-recursion case; mutual recursion through
    /// another SCC member falls back to the conservative call-graph answer,
    /// since `reachability` is intentionally intra-function only.
    fn self_recursive_call_is_reachable(&self, engine: &mut Engine, func: FuncId) -> bool {
        let self_calls: Vec<_> = engine.module().functions[func]
            .call_sites()
            .filter(|(_, inst)| inst.call_target() == Some(CallTarget::Direct(func)))
            .map(|(id, _)| engine.module().functions[func].insts[id].block)
            .collect();
        if self_calls.is_empty() {
            return true;
        }
        let Some(entry) = engine.module().functions[func].entry else { return true };
        let handle = engine.get_or_create::<Reachability>(Position::Function(func));
        if !engine.is_valid(handle) {
            return true;
        }
        let Some(reach) = engine.downcast::<Reachability>(handle) else { return true };
        self_calls.iter().any(|&block| reach.can_reach(entry, block))
    }
}

impl AbstractAttribute for NoRecurse {
    fn kind(&self) -> AnalysisKind {
        Self::KIND
    }

    fn position(&self) -> Position {
        self.position
    }

    fn initialize(&mut self, engine: &mut Engine) {
        let func = self.func();
        if engine.module().is_in_nontrivial_scc(func) && self.self_recursive_call_is_reachable(engine, func) {
            self.state.indicate_pessimistic_fixpoint();
        }
    }

    fn update(&mut self, engine: &mut Engine) -> ChangeResult {
        let func = self.func();
        if self.callees_all_no_recurse(engine, func) || self.callers_all_no_recurse(engine, func) {
            self.state.indicate_optimistic_fixpoint();
            ChangeResult::Changed
        } else {
            self.state.indicate_pessimistic_fixpoint()
        }
    }

    fn manifest(&self, _engine: &Engine, edits: &mut EditQueue) {
        if *self.state.known() {
            edits.add_attribute(AttrTarget::Function(self.func()), attributor_ir::IrAttribute::NoRecurse);
        }
    }

    fn is_valid(&self) -> bool {
        self.state.is_valid()
    }

    fn is_fixed(&self) -> bool {
        self.state.is_fixed()
    }

    fn force_optimistic_fixpoint(&mut self) {
        self.state.indicate_optimistic_fixpoint();
    }

    fn force_pessimistic_fixpoint(&mut self) {
        self.state.indicate_pessimistic_fixpoint();
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
