//! **no-return** (§4.4): a function position. Pessimistic (meaning: the
//! function *can* return) if any `ret` instruction is live; optimistic only
//! once every `ret` in the function has been proven dead by the liveness
//! attribute (an infinite loop, or a path that always ends in `unreachable`).

use attributor_ir::Opcode;

use crate::{
    engine::Engine,
    lattice::{ChangeResult, KnownAssumed},
    position::Position,
    record::{AbstractAttribute, AnalysisKind, NewAt},
    rewriter::{AttrTarget, EditQueue},
};

#[derive(Debug)]
pub struct NoReturn {
    position: Position,
    state: KnownAssumed<bool>,
}

impl NewAt for NoReturn {
    const KIND: AnalysisKind = AnalysisKind::NoReturn;

    fn new_at(position: Position) -> Self {
        Self { position, state: KnownAssumed::new(true) }
    }
}

impl NoReturn {
    pub fn is_known_no_return(&self) -> bool {
        *self.state.known()
    }

    /// The optimistic upper bound: used by liveness, which must treat a call
    /// as possibly-no-return *before* that becomes a known fact, or a
    /// self-recursive function with no other exit (scenario 5: `@rec` calling
    /// itself with nothing past the call but `ret`) could never bootstrap its
    /// way to proving either fact — liveness needs no-return to prune the
    /// trailing `ret` before no-return's own update can see that `ret` is
    /// dead and promote itself to known.
    pub fn is_assumed_no_return(&self) -> bool {
        *self.state.assumed()
    }
}

impl AbstractAttribute for NoReturn {
    fn kind(&self) -> AnalysisKind {
        Self::KIND
    }

    fn position(&self) -> Position {
        self.position
    }

    fn initialize(&mut self, _engine: &mut Engine) {}

    fn update(&mut self, engine: &mut Engine) -> ChangeResult {
        let func = self.position.anchor_function().expect("no-return is only seeded at function positions");
        let no_live_return = engine.check_for_all_instructions(func, |module, inst| {
            !matches!(module.functions[func].insts[inst].opcode, Opcode::Return)
        });

        if no_live_return {
            self.state.indicate_optimistic_fixpoint();
            ChangeResult::Changed
        } else {
            self.state.indicate_pessimistic_fixpoint()
        }
    }

    fn manifest(&self, _engine: &Engine, edits: &mut EditQueue) {
        if let Some(func) = self.position.anchor_function() {
            if *self.state.known() {
                edits.add_attribute(AttrTarget::Function(func), attributor_ir::IrAttribute::NoReturn);
            }
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
