//! **liveness**, function form (§4.4): explores forward from the entry
//! instruction, growing a monotone set of live instructions. A call's
//! successor is alive unless the callee is assumed `no-return`; a
//! conditional branch or switch whose scrutinee has settled to a known
//! constant (via `value-simplify`) prunes the non-taken edges.
//!
//! This is the one record [`crate::engine::Engine::is_assumed_dead_instruction`]
//! consults directly (via [`crate::record::AbstractAttribute::is_instruction_dead`])
//! rather than downcasting, since liveness filtering sits on the hot path of
//! nearly every other attribute's `update`.

use std::collections::VecDeque;

use attributor_ir::{BlockId, FuncId, InstId, Opcode};
use rustc_hash::FxHashSet;

use crate::{
    attributes::{no_return::NoReturn, value_simplify::ValueSimplify},
    engine::Engine,
    lattice::ChangeResult,
    position::Position,
    record::{AbstractAttribute, AnalysisKind, NewAt},
    rewriter::EditQueue,
};

#[derive(Debug)]
pub struct LivenessFunction {
    position: Position,
    live: FxHashSet<InstId>,
    valid: bool,
    fixed: bool,
}

impl NewAt for LivenessFunction {
    const KIND: AnalysisKind = AnalysisKind::LivenessFunction;

    fn new_at(position: Position) -> Self {
        Self { position, live: FxHashSet::default(), valid: true, fixed: false }
    }
}

impl LivenessFunction {
    fn func(&self) -> FuncId {
        self.position.anchor_function().expect("liveness is only seeded at function positions")
    }

    fn callee_is_no_return(engine: &mut Engine, func: FuncId, inst: InstId) -> bool {
        let callee = match engine.module().functions[func].insts[inst].call_target() {
            Some(attributor_ir::CallTarget::Direct(callee)) => callee,
            _ => return false,
        };
        let handle = engine.get_or_create::<NoReturn>(Position::Function(callee));
        engine.is_valid(handle) && engine.downcast::<NoReturn>(handle).is_some_and(NoReturn::is_assumed_no_return)
    }

    fn branch_successors(engine: &mut Engine, func: FuncId, inst: InstId) -> Vec<BlockId> {
        let opcode = engine.module().functions[func].insts[inst].opcode.clone();
        match opcode {
            Opcode::CondBranch { then_blk, else_blk } => {
                let cond = engine.module().functions[func].insts[inst].operands[0];
                let handle = engine.get_or_create::<ValueSimplify>(Position::Float(func, cond));
                if engine.is_valid(handle) {
                    let known = engine.downcast::<ValueSimplify>(handle).and_then(ValueSimplify::known_constant_int);
                    if let Some(value) = known {
                        return vec![if value != 0 { then_blk } else { else_blk }];
                    }
                }
                vec![then_blk, else_blk]
            }
            Opcode::Switch { default, cases } => {
                let mut out = vec![default];
                out.extend(cases.iter().map(|(_, target)| *target));
                out
            }
            _ => engine.module().functions[func].insts[inst].successors().to_vec(),
        }
    }

    fn recompute(&mut self, engine: &mut Engine) -> ChangeResult {
        let func = self.func();
        let Some(entry) = engine.module().functions[func].entry else {
            return ChangeResult::Unchanged;
        };
        let Some(&first) = engine.module().functions[func].blocks[entry].insts.first() else {
            return ChangeResult::Unchanged;
        };

        let mut worklist = VecDeque::new();
        if self.live.insert(first) {
            worklist.push_back(first);
        } else {
            worklist.extend(self.live.iter().copied());
        }

        let before = self.live.len();
        while let Some(inst_id) = worklist.pop_front() {
            let (block, idx, is_call, is_terminator) = {
                let f = &engine.module().functions[func];
                let inst = &f.insts[inst_id];
                let block = inst.block;
                let idx = f.blocks[block].insts.iter().position(|&i| i == inst_id).expect("instruction belongs to its block");
                (block, idx, matches!(inst.opcode, Opcode::Call { .. }), inst.is_terminator())
            };

            if is_call && Self::callee_is_no_return(engine, func, inst_id) {
                continue;
            }

            if !is_terminator {
                let next = engine.module().functions[func].blocks[block].insts.get(idx + 1).copied();
                if let Some(next) = next {
                    if self.live.insert(next) {
                        worklist.push_back(next);
                    }
                }
                continue;
            }

            for succ in Self::branch_successors(engine, func, inst_id) {
                if let Some(&succ_first) = engine.module().functions[func].blocks[succ].insts.first() {
                    if self.live.insert(succ_first) {
                        worklist.push_back(succ_first);
                    }
                }
            }
        }

        ChangeResult::from_bool(self.live.len() != before)
    }
}

impl AbstractAttribute for LivenessFunction {
    fn kind(&self) -> AnalysisKind {
        Self::KIND
    }

    fn position(&self) -> Position {
        self.position
    }

    fn initialize(&mut self, engine: &mut Engine) {
        // Eagerly populate the entry-reachable closure so a record queried
        // synchronously (via `is_assumed_dead_instruction`) right after
        // creation, before its first worklist visit, never reports every
        // instruction dead for want of having run once.
        self.recompute(engine);
    }

    fn update(&mut self, engine: &mut Engine) -> ChangeResult {
        let result = self.recompute(engine);
        if result == ChangeResult::Unchanged && !self.live.is_empty() {
            self.fixed = true;
        }
        result
    }

    fn manifest(&self, engine: &Engine, edits: &mut EditQueue) {
        let func = self.func();
        let entry = engine.module().functions[func].entry;
        for &block_id in &engine.module().functions[func].layout {
            if Some(block_id) == entry {
                continue;
            }
            let Some(&first) = engine.module().functions[func].blocks[block_id].insts.first() else { continue };
            if !self.live.contains(&first) {
                edits.delete_block(func, block_id);
            }
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

    /// Once this record has been forced pessimistic (e.g. by a required
    /// dependency's invalidation cascade), the set of instructions explored
    /// so far may be incomplete: further exploration that would have reached
    /// more instructions never ran. Reporting `self.live` as the whole truth
    /// at that point could mark a genuinely live instruction dead, violating
    /// the "no live instruction is ever deleted" property (§8) — so an
    /// invalid record conservatively claims nothing is dead instead.
    fn is_instruction_dead(&self, inst: InstId) -> bool {
        self.valid && !self.live.contains(&inst)
    }
}
