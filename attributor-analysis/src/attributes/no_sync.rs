//! **no-sync** (§4.4): a function position. Pessimistic if any call-like
//! instruction targets a callee that isn't itself assumed no-sync.
//!
//! The full catalogue entry also pessimizes on a volatile load/store or a
//! non-relaxed atomic, and special-cases element-wise unordered atomic
//! intrinsics and non-volatile mem-intrinsics as no-sync regardless; this
//! reference IR has no volatile/atomic memory instructions to classify (§7
//! "missing analysis" degrades gracefully to the call-graph-only bound,
//! which is still sound, just less precise).

use attributor_ir::{CallTarget, FuncId, InstId};

use crate::{
    engine::Engine,
    lattice::{ChangeResult, KnownAssumed},
    position::Position,
    record::{AbstractAttribute, AnalysisKind, NewAt},
    rewriter::{AttrTarget, EditQueue},
};

#[derive(Debug)]
pub struct NoSync {
    position: Position,
    state: KnownAssumed<bool>,
}

impl NewAt for NoSync {
    const KIND: AnalysisKind = AnalysisKind::NoSync;

    fn new_at(position: Position) -> Self {
        Self { position, state: KnownAssumed::new(true) }
    }
}

impl NoSync {
    fn func(&self) -> FuncId {
        self.position.anchor_function().expect("no-sync is only seeded at function positions")
    }

    pub fn is_known_no_sync(&self) -> bool {
        *self.state.known()
    }
}

impl AbstractAttribute for NoSync {
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

        let mut may_sync = false;
        for call in calls {
            if engine.is_assumed_dead_instruction(func, call) {
                continue;
            }
            match engine.module().functions[func].insts[call].call_target() {
                Some(CallTarget::Direct(callee)) => {
                    let handle = engine.get_or_create::<NoSync>(Position::Function(callee));
                    if !engine.is_valid(handle)
                        || !engine.downcast::<NoSync>(handle).is_some_and(NoSync::is_known_no_sync)
                    {
                        may_sync = true;
                    }
                }
                _ => may_sync = true,
            }
        }

        if may_sync {
            self.state.indicate_pessimistic_fixpoint()
        } else {
            self.state.indicate_optimistic_fixpoint();
            ChangeResult::Changed
        }
    }

    fn manifest(&self, _engine: &Engine, edits: &mut EditQueue) {
        if *self.state.known() {
            edits.add_attribute(AttrTarget::Function(self.func()), attributor_ir::IrAttribute::NoSync);
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
