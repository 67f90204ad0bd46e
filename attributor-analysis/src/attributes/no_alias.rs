//! **no-alias** (§4.4): a pointer is provably distinct from every other
//! object in the program. Implemented for the positions where that's cheap
//! to establish soundly: a fresh allocation (`alloca`/`malloc`-like) traced
//! through `getelementptr`/`bitcast`, a function's return (meet over its
//! `ret` operands), and a call-site-returned mirror of the callee's return.
//!
//! Argument and call-site-argument positions pessimize immediately: a full
//! treatment needs the cross-analysis with `no-capture`/`no-sync` the source
//! framework describes (whether *this* call is the pointer's only capturing
//! use anywhere in the program) which this catalogue does not attempt —
//! missing analysis degrades gracefully to "no fact" rather than an unsound
//! guess.

use attributor_ir::{FuncId, Opcode, ValueId, ValueKind};

use crate::{
    combinators,
    engine::Engine,
    lattice::{ChangeResult, KnownAssumed},
    position::Position,
    record::{AbstractAttribute, AnalysisKind, NewAt},
    rewriter::{AttrTarget, EditQueue},
};

#[derive(Debug)]
pub struct NoAlias {
    position: Position,
    state: KnownAssumed<bool>,
}

impl NewAt for NoAlias {
    const KIND: AnalysisKind = AnalysisKind::NoAlias;

    fn new_at(position: Position) -> Self {
        Self { position, state: KnownAssumed::new(true) }
    }
}

impl NoAlias {
    pub fn is_known_no_alias(&self) -> bool {
        *self.state.known()
    }

    fn update_float(&mut self, engine: &mut Engine, func: FuncId, value: ValueId) -> ChangeResult {
        let ValueKind::InstResult(inst_id) = engine.module().functions[func].values[value].kind else {
            return self.state.indicate_pessimistic_fixpoint();
        };
        let opcode = engine.module().functions[func].insts[inst_id].opcode.clone();
        match opcode {
            Opcode::Alloca { .. } | Opcode::MallocLike { .. } => {
                self.state.indicate_optimistic_fixpoint();
                ChangeResult::Changed
            }
            Opcode::GetElementPtr { .. } | Opcode::BitCast => {
                let base = engine.module().functions[func].insts[inst_id].operands[0];
                let handle = engine.get_or_create::<NoAlias>(Position::Float(func, base));
                if engine.is_valid(handle) && engine.downcast::<NoAlias>(handle).is_some_and(NoAlias::is_known_no_alias) {
                    self.state.indicate_optimistic_fixpoint();
                    ChangeResult::Changed
                } else {
                    self.state.indicate_pessimistic_fixpoint()
                }
            }
            _ => self.state.indicate_pessimistic_fixpoint(),
        }
    }

    fn update_returned(&mut self, engine: &mut Engine, func: FuncId) -> ChangeResult {
        let returns = engine.module().functions[func].returned_values();
        if returns.is_empty() {
            return ChangeResult::Unchanged;
        }
        let mut all_no_alias = true;
        for (ret_inst, value) in returns {
            if engine.is_assumed_dead_instruction(func, ret_inst) {
                continue;
            }
            let handle = engine.get_or_create::<NoAlias>(Position::Float(func, value));
            if !engine.is_valid(handle) || !engine.downcast::<NoAlias>(handle).is_some_and(NoAlias::is_known_no_alias) {
                all_no_alias = false;
                break;
            }
        }
        if all_no_alias {
            self.state.indicate_optimistic_fixpoint();
            ChangeResult::Changed
        } else {
            self.state.indicate_pessimistic_fixpoint()
        }
    }
}

impl AbstractAttribute for NoAlias {
    fn kind(&self) -> AnalysisKind {
        Self::KIND
    }

    fn position(&self) -> Position {
        self.position
    }

    fn initialize(&mut self, _engine: &mut Engine) {}

    fn update(&mut self, engine: &mut Engine) -> ChangeResult {
        if let Some(mirror) = combinators::callee_mirror_position(self.position, engine.module()) {
            let handle = engine.get_or_create::<NoAlias>(mirror);
            return if engine.is_valid(handle) && engine.downcast::<NoAlias>(handle).is_some_and(NoAlias::is_known_no_alias) {
                self.state.indicate_optimistic_fixpoint();
                ChangeResult::Changed
            } else {
                self.state.indicate_pessimistic_fixpoint()
            };
        }

        match self.position {
            Position::Float(func, value) => self.update_float(engine, func, value),
            Position::Returned(func) => self.update_returned(engine, func),
            _ => self.state.indicate_pessimistic_fixpoint(),
        }
    }

    fn manifest(&self, _engine: &Engine, edits: &mut EditQueue) {
        if !*self.state.known() {
            return;
        }
        let target = match self.position {
            Position::Returned(f) => AttrTarget::Return(f),
            Position::CallSiteArgument(f, call, idx) => AttrTarget::CallSiteArgument(f, call, idx),
            _ => return,
        };
        edits.add_attribute(target, attributor_ir::IrAttribute::NoAlias);
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
