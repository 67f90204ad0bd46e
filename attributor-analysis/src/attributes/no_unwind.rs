//! **no-unwind** (§4.4): a function position only. Pessimistic if any
//! instruction in the function may throw and isn't a call whose callee is
//! assumed no-unwind.

use attributor_ir::{CallTarget, FuncId, InstId};

use crate::{
    engine::Engine,
    lattice::{ChangeResult, KnownAssumed},
    position::Position,
    record::{AbstractAttribute, AnalysisKind, NewAt},
    rewriter::{AttrTarget, EditQueue},
};

#[derive(Debug)]
pub struct NoUnwind {
    position: Position,
    state: KnownAssumed<bool>,
}

impl NewAt for NoUnwind {
    const KIND: AnalysisKind = AnalysisKind::NoUnwind;

    fn new_at(position: Position) -> Self {
        Self { position, state: KnownAssumed::new(true) }
    }
}

impl NoUnwind {
    fn func(&self) -> FuncId {
        self.position.anchor_function().expect("no-unwind is only seeded at function positions")
    }

    pub fn is_known_no_unwind(&self) -> bool {
        *self.state.known()
    }

    /// `true` if the call (or invoke) at `call` may unwind: its callee isn't
    /// known direct and assumed no-unwind. Indirect callees are
    /// conservatively assumed capable of unwinding (§1 "indirect calls with
    /// unknown callees are conservatively abstained on").
    fn call_may_unwind(&self, engine: &mut Engine, caller: FuncId, call: InstId) -> bool {
        match engine.module().functions[caller].insts[call].call_target() {
            Some(CallTarget::Direct(callee)) => {
                let handle = engine.get_or_create::<NoUnwind>(Position::Function(callee));
                if !engine.is_valid(handle) {
                    return true;
                }
                !engine.downcast::<NoUnwind>(handle).is_some_and(NoUnwind::is_known_no_unwind)
            }
            _ => true,
        }
    }
}

impl AbstractAttribute for NoUnwind {
    fn kind(&self) -> AnalysisKind {
        Self::KIND
    }

    fn position(&self) -> Position {
        self.position
    }

    fn initialize(&mut self, _engine: &mut Engine) {}

    fn update(&mut self, engine: &mut Engine) -> ChangeResult {
        let func = self.func();
        let calls: Vec<InstId> = engine.module().functions[func].call_sites().map(|(id, _)| id).collect();

        let mut may_unwind = false;
        for call in calls {
            if engine.is_assumed_dead_instruction(func, call) {
                continue;
            }
            if self.call_may_unwind(engine, func, call) {
                may_unwind = true;
            }
        }

        if may_unwind {
            self.state.indicate_pessimistic_fixpoint()
        } else {
            self.state.indicate_optimistic_fixpoint();
            ChangeResult::Changed
        }
    }

    fn manifest(&self, _engine: &Engine, edits: &mut EditQueue) {
        if *self.state.known() {
            edits.add_attribute(AttrTarget::Function(self.func()), attributor_ir::IrAttribute::NoUnwind);
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
