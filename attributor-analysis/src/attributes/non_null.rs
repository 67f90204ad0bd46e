//! **non-null** (§4.4): boolean, pointer positions only. Pessimistic
//! immediately for a literal null constant; optimistic immediately if the IR
//! already carries a `nonnull`/`dereferenceable` attribute at this position.
//! Otherwise walks the must-be-executed context from the position's natural
//! entry point, looking for a load or store through the value that would
//! already have trapped had the pointer been null.

use attributor_ir::{FuncId, InstId, Opcode, ValueKind};

use crate::{
    combinators,
    engine::Engine,
    lattice::{ChangeResult, KnownAssumed},
    position::Position,
    record::{AbstractAttribute, AnalysisKind, NewAt},
    rewriter::{AttrTarget, EditQueue},
};

#[derive(Debug)]
pub struct NonNull {
    position: Position,
    state: KnownAssumed<bool>,
}

impl NewAt for NonNull {
    const KIND: AnalysisKind = AnalysisKind::NonNull;

    fn new_at(position: Position) -> Self {
        Self { position, state: KnownAssumed::new(true) }
    }
}

impl NonNull {
    pub fn is_known_non_null(&self) -> bool {
        *self.state.known()
    }

    /// Meet over every live `ret` operand's own non-null fact: a function's
    /// return is only provably non-null if every path out of it is.
    fn update_returned(&mut self, engine: &mut Engine, func: FuncId) -> ChangeResult {
        let returns = engine.module().functions[func].returned_values();
        if returns.is_empty() {
            return ChangeResult::Unchanged;
        }
        let mut all_non_null = true;
        for (ret_inst, value) in returns {
            if engine.is_assumed_dead_instruction(func, ret_inst) {
                continue;
            }
            let handle = engine.get_or_create::<NonNull>(Position::Float(func, value));
            if !engine.is_valid(handle) || !engine.downcast::<NonNull>(handle).is_some_and(NonNull::is_known_non_null) {
                all_non_null = false;
                break;
            }
        }
        if all_non_null {
            self.state.indicate_optimistic_fixpoint();
            ChangeResult::Changed
        } else {
            self.state.indicate_pessimistic_fixpoint()
        }
    }

    fn context_instruction(engine: &Engine, func: FuncId, position: Position) -> Option<InstId> {
        match position.associated_value(engine.module()) {
            Some(value) => match engine.module().functions[func].values[value].kind {
                ValueKind::InstResult(inst) => Some(inst),
                _ => engine.module().functions[func].entry.and_then(|b| engine.module().functions[func].blocks[b].insts.first().copied()),
            },
            None => None,
        }
    }
}

impl AbstractAttribute for NonNull {
    fn kind(&self) -> AnalysisKind {
        Self::KIND
    }

    fn position(&self) -> Position {
        self.position
    }

    fn initialize(&mut self, engine: &mut Engine) {
        let Some(func) = self.position.anchor_function() else {
            self.state.indicate_pessimistic_fixpoint();
            return;
        };
        if let Some(value) = self.position.associated_value(engine.module()) {
            if engine.module().functions[func].values[value].is_null_constant() {
                self.state.indicate_pessimistic_fixpoint();
                return;
            }
        }
        if let Some(declared) = self.position.declared_attrs(engine.module()) {
            let already_nonnull = declared.has_flag(attributor_ir::IrAttribute::NonNull)
                || declared.has(|a| matches!(a, attributor_ir::IrAttribute::Dereferenceable(n) if *n > 0));
            if already_nonnull {
                self.state.indicate_optimistic_fixpoint();
            }
        }
    }

    fn update(&mut self, engine: &mut Engine) -> ChangeResult {
        let Some(func) = self.position.anchor_function() else {
            return self.state.indicate_pessimistic_fixpoint();
        };

        if let Some(mirror) = combinators::callee_mirror_position(self.position, engine.module()) {
            let handle = engine.get_or_create::<NonNull>(mirror);
            return if engine.is_valid(handle) && engine.downcast::<NonNull>(handle).is_some_and(NonNull::is_known_non_null) {
                self.state.indicate_optimistic_fixpoint();
                ChangeResult::Changed
            } else {
                self.state.indicate_pessimistic_fixpoint()
            };
        }

        if let Position::Returned(func) = self.position {
            return self.update_returned(engine, func);
        }

        let Some(value) = self.position.associated_value(engine.module()) else {
            return self.state.indicate_pessimistic_fixpoint();
        };
        if engine.module().functions[func].values[value].is_null_constant() {
            return self.state.indicate_pessimistic_fixpoint();
        }

        let null_defined = attributor_ir::facade::null_pointer_is_defined(&engine.module().functions[func]);
        if null_defined {
            return self.state.indicate_pessimistic_fixpoint();
        }

        let Some(from) = Self::context_instruction(engine, func, self.position) else {
            return ChangeResult::Unchanged;
        };
        let steps = attributor_ir::analysis_getter::walk_must_be_executed_context(&engine.module().functions[func], from);
        for step in steps {
            let inst = &engine.module().functions[func].insts[step.inst];
            let derefs = matches!(inst.opcode, Opcode::Load | Opcode::Store) && inst.operands.first() == Some(&value);
            if derefs {
                self.state.indicate_optimistic_fixpoint();
                return ChangeResult::Changed;
            }
        }
        ChangeResult::Unchanged
    }

    fn manifest(&self, _engine: &Engine, edits: &mut EditQueue) {
        if !*self.state.known() {
            return;
        }
        let target = match self.position {
            Position::Argument(f, idx) => AttrTarget::Argument(f, idx),
            Position::Returned(f) => AttrTarget::Return(f),
            Position::CallSiteArgument(f, call, idx) => AttrTarget::CallSiteArgument(f, call, idx),
            _ => return,
        };
        edits.add_attribute(target, attributor_ir::IrAttribute::NonNull);
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
