//! **liveness**, value form (§4.4): a value is dead if its defining
//! instruction is side-effect-free and every user is itself dead (or already
//! proven control-flow unreachable by the function form of liveness).
//!
//! Seeded at `Argument`/`Returned`/`CallSiteArgument` positions too (§4.5),
//! where it settles immediately: this reference rewriter only ever deletes a
//! dead *instruction*, never shrinks a signature or a return, so those
//! positions have nothing further to prove.

use attributor_ir::{FuncId, Opcode, ValueId, ValueKind};

use crate::{
    engine::Engine,
    lattice::{ChangeResult, KnownAssumed},
    position::Position,
    record::{AbstractAttribute, AnalysisKind, NewAt},
    rewriter::EditQueue,
};

#[derive(Debug)]
pub struct LivenessValue {
    position: Position,
    state: KnownAssumed<bool>,
}

impl NewAt for LivenessValue {
    const KIND: AnalysisKind = AnalysisKind::LivenessValue;

    fn new_at(position: Position) -> Self {
        Self { position, state: KnownAssumed::new(true) }
    }
}

impl LivenessValue {
    pub fn is_known_dead(&self) -> bool {
        *self.state.known()
    }

    fn is_side_effect_free(opcode: &Opcode) -> bool {
        matches!(
            opcode,
            Opcode::Add
                | Opcode::Sub
                | Opcode::Mul
                | Opcode::ICmp(_)
                | Opcode::Load
                | Opcode::Alloca { .. }
                | Opcode::GetElementPtr { .. }
                | Opcode::BitCast
                | Opcode::Phi { .. }
                | Opcode::Select
        )
    }

    fn update_float(&mut self, engine: &mut Engine, func: FuncId, value: ValueId) -> ChangeResult {
        let data = engine.module().functions[func].values[value];
        let ValueKind::InstResult(inst_id) = data.kind else {
            return self.state.indicate_pessimistic_fixpoint();
        };
        let opcode = engine.module().functions[func].insts[inst_id].opcode.clone();
        if !Self::is_side_effect_free(&opcode) {
            return self.state.indicate_pessimistic_fixpoint();
        }
        if engine.is_assumed_dead_instruction(func, inst_id) {
            self.state.indicate_optimistic_fixpoint();
            return ChangeResult::Changed;
        }

        let uses: Vec<attributor_ir::Use> = engine.module().functions[func].uses_of(value).into_iter().collect();
        let mut all_dead = true;
        for u in uses {
            if engine.is_assumed_dead_instruction(func, u.inst) {
                continue;
            }
            let result = engine.module().functions[func].insts[u.inst].result;
            match result {
                Some(result) => {
                    let handle = engine.get_or_create::<LivenessValue>(Position::Float(func, result));
                    if !engine.is_valid(handle) || !engine.downcast::<LivenessValue>(handle).is_some_and(LivenessValue::is_known_dead) {
                        all_dead = false;
                    }
                }
                None => all_dead = false,
            }
            if !all_dead {
                break;
            }
        }

        if all_dead {
            self.state.indicate_optimistic_fixpoint();
            ChangeResult::Changed
        } else {
            self.state.indicate_pessimistic_fixpoint()
        }
    }
}

impl AbstractAttribute for LivenessValue {
    fn kind(&self) -> AnalysisKind {
        Self::KIND
    }

    fn position(&self) -> Position {
        self.position
    }

    fn initialize(&mut self, _engine: &mut Engine) {}

    fn update(&mut self, engine: &mut Engine) -> ChangeResult {
        match self.position {
            Position::Float(func, value) => self.update_float(engine, func, value),
            _ => self.state.indicate_pessimistic_fixpoint(),
        }
    }

    fn manifest(&self, engine: &Engine, edits: &mut EditQueue) {
        let Position::Float(func, value) = self.position else { return };
        if !*self.state.known() {
            return;
        }
        if let ValueKind::InstResult(inst_id) = engine.module().functions[func].values[value].kind {
            edits.delete_instruction(func, inst_id);
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
