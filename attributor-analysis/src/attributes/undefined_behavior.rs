//! **undefined-behavior** (§4.4): a function position, growing a monotone
//! set of instructions known to invoke undefined behavior on every path that
//! reaches them. Two shapes are classified: a `load`/`store` through a
//! pointer that `value-simplify` has settled to the null constant (and the
//! target doesn't define null as readable, per
//! [`attributor_ir::facade::null_pointer_is_defined`]), and a conditional
//! branch whose condition is the `undef` token (branching on an
//! indeterminate value is itself UB, independent of which edge is taken).
//!
//! Manifest inserts an `unreachable` marker immediately before each known-UB
//! instruction, which `liveness` then uses to prune everything the marker
//! makes dead on a later run.

use attributor_ir::{FuncId, InstId, Opcode, ValueKind};
use rustc_hash::FxHashSet;

use crate::{
    attributes::value_simplify::ValueSimplify,
    engine::Engine,
    lattice::ChangeResult,
    position::Position,
    record::{AbstractAttribute, AnalysisKind, NewAt},
    rewriter::EditQueue,
};

#[derive(Debug)]
pub struct UndefinedBehavior {
    position: Position,
    known_ub: FxHashSet<InstId>,
    valid: bool,
    fixed: bool,
}

impl NewAt for UndefinedBehavior {
    const KIND: AnalysisKind = AnalysisKind::UndefinedBehavior;

    fn new_at(position: Position) -> Self {
        Self { position, known_ub: FxHashSet::default(), valid: true, fixed: false }
    }
}

impl UndefinedBehavior {
    fn func(&self) -> FuncId {
        self.position.anchor_function().expect("undefined-behavior is only ever seeded at a Function position")
    }

    /// `true` if `pointer` has settled to the null constant, directly or via
    /// its own `value-simplify` record.
    fn is_known_null(engine: &mut Engine, func: FuncId, pointer: attributor_ir::ValueId) -> bool {
        if engine.module().functions[func].values[pointer].is_null_constant() {
            return true;
        }
        let handle = engine.get_or_create::<ValueSimplify>(Position::Float(func, pointer));
        engine.is_valid(handle)
            && engine
                .downcast::<ValueSimplify>(handle)
                .and_then(|vs| vs.replacement())
                .is_some_and(|desc| desc.is_null())
    }

    fn classify(&mut self, engine: &mut Engine, func: FuncId, inst_id: InstId) -> bool {
        let opcode = engine.module().functions[func].insts[inst_id].opcode.clone();
        match opcode {
            Opcode::Load | Opcode::Store => {
                let pointer = engine.module().functions[func].insts[inst_id].operands[0];
                let null_defined = attributor_ir::facade::null_pointer_is_defined(&engine.module().functions[func]);
                !null_defined && Self::is_known_null(engine, func, pointer)
            }
            Opcode::CondBranch { .. } => {
                let cond = engine.module().functions[func].insts[inst_id].operands[0];
                matches!(engine.module().functions[func].values[cond].kind, ValueKind::Undef)
            }
            _ => false,
        }
    }
}

impl AbstractAttribute for UndefinedBehavior {
    fn kind(&self) -> AnalysisKind {
        Self::KIND
    }

    fn position(&self) -> Position {
        self.position
    }

    fn initialize(&mut self, _engine: &mut Engine) {}

    fn update(&mut self, engine: &mut Engine) -> ChangeResult {
        let func = self.func();
        let insts: Vec<InstId> = engine.module().functions[func].instructions().map(|(id, _)| id).collect();
        let before = self.known_ub.len();
        for inst_id in insts {
            if self.known_ub.contains(&inst_id) || engine.is_assumed_dead_instruction(func, inst_id) {
                continue;
            }
            if self.classify(engine, func, inst_id) {
                self.known_ub.insert(inst_id);
            }
        }
        ChangeResult::from_bool(self.known_ub.len() != before)
    }

    fn manifest(&self, _engine: &Engine, edits: &mut EditQueue) {
        let func = self.func();
        for &inst_id in &self.known_ub {
            edits.insert_unreachable_before(func, inst_id);
        }
    }

    fn is_valid(&self) -> bool {
        self.valid
    }

    fn is_fixed(&self) -> bool {
        self.fixed
    }

    fn force_optimistic_fixpoint(&mut self) {
        self.fixed = true;
    }

    fn force_pessimistic_fixpoint(&mut self) {
        self.valid = false;
        self.fixed = true;
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
