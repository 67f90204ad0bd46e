//! **will-return** (§4.4): a function position. Pessimistic if the function
//! contains a cycle that may be unbounded (this reference IR has no trip-count
//! reasoning, so any detected natural loop counts as unbounded); otherwise
//! checks that every callee is either known will-return, or assumed
//! will-return *and* assumed no-recurse (a bounded-recursion callee still
//! terminates if it cannot recurse).

use attributor_ir::{CallTarget, FuncId, InstId};

use crate::{
    attributes::{no_recurse::NoRecurse, reachability::Reachability},
    engine::Engine,
    lattice::{ChangeResult, KnownAssumed},
    position::Position,
    record::{AbstractAttribute, AnalysisKind, NewAt},
    rewriter::{AttrTarget, EditQueue},
};

#[derive(Debug)]
pub struct WillReturn {
    position: Position,
    state: KnownAssumed<bool>,
}

impl NewAt for WillReturn {
    const KIND: AnalysisKind = AnalysisKind::WillReturn;

    fn new_at(position: Position) -> Self {
        Self { position, state: KnownAssumed::new(true) }
    }
}

impl WillReturn {
    fn func(&self) -> FuncId {
        self.position.anchor_function().expect("will-return is only seeded at function positions")
    }

    pub fn is_known_will_return(&self) -> bool {
        *self.state.known()
    }

    fn callee_will_return(engine: &mut Engine, callee: FuncId) -> bool {
        let wr_handle = engine.get_or_create::<WillReturn>(Position::Function(callee));
        if engine.is_valid(wr_handle) && engine.downcast::<WillReturn>(wr_handle).is_some_and(WillReturn::is_known_will_return) {
            return true;
        }
        let assumed_will_return =
            engine.downcast::<WillReturn>(wr_handle).is_some_and(|wr| *wr.state.assumed());
        if !assumed_will_return {
            return false;
        }
        let nr_handle = engine.get_or_create::<NoRecurse>(Position::Function(callee));
        engine.is_valid(nr_handle) && engine.downcast::<NoRecurse>(nr_handle).is_some_and(NoRecurse::is_known_no_recurse)
    }
}

impl AbstractAttribute for WillReturn {
    fn kind(&self) -> AnalysisKind {
        Self::KIND
    }

    fn position(&self) -> Position {
        self.position
    }

    fn initialize(&mut self, engine: &mut Engine) {
        let func = self.func();
        let handle = engine.get_or_create::<Reachability>(Position::Function(func));
        let has_cycle = if engine.is_valid(handle) {
            engine.downcast::<Reachability>(handle).is_some_and(Reachability::has_cycle)
        } else {
            // Reachability only ever goes invalid for a malformed position;
            // fall back to the dominator-based loop check rather than guess.
            engine.analysis().loop_info(func).has_loop()
        };
        if has_cycle {
            self.state.indicate_pessimistic_fixpoint();
        }
    }

    fn update(&mut self, engine: &mut Engine) -> ChangeResult {
        let func = self.func();
        let calls: Vec<InstId> = engine.module().functions[func].call_sites().map(|(id, _)| id).collect();

        let mut terminates = true;
        for call in calls {
            if engine.is_assumed_dead_instruction(func, call) {
                continue;
            }
            match engine.module().functions[func].insts[call].call_target() {
                Some(CallTarget::Direct(callee)) => {
                    if !Self::callee_will_return(engine, callee) {
                        terminates = false;
                        break;
                    }
                }
                _ => {
                    terminates = false;
                    break;
                }
            }
        }

        if terminates {
            self.state.indicate_optimistic_fixpoint();
            ChangeResult::Changed
        } else {
            self.state.indicate_pessimistic_fixpoint()
        }
    }

    fn manifest(&self, _engine: &Engine, edits: &mut EditQueue) {
        if *self.state.known() {
            edits.add_attribute(AttrTarget::Function(self.func()), attributor_ir::IrAttribute::WillReturn);
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
