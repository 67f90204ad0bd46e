//! `AAIntraFnReachability` (§4.4, supplemented per `SPEC_FULL.md` §2):
//! block-to-block reachability within a single function. Computed once, from
//! the static CFG alone (no pruning from `liveness`/`value-simplify` — that
//! refinement is exactly the interprocedural generalization the spec reserves
//! as a documented future direction), via the worklist in
//! [`attributor_ir::analysis_getter::blocks_reachable_from`] run from every
//! block. The CFG shape cannot change mid-solve (the engine never mutates the
//! IR before manifest), so this settles to a fixpoint in `initialize` and
//! `update` is never meaningfully re-run.
//!
//! Kept deliberately narrow: `no-recurse`'s SCC triviality check and
//! `will-return`'s cycle check are its only two consumers.

use attributor_ir::BlockId;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::{
    engine::Engine,
    lattice::ChangeResult,
    position::Position,
    record::{AbstractAttribute, AnalysisKind, NewAt},
    rewriter::EditQueue,
};

#[derive(Debug)]
pub struct Reachability {
    position: Position,
    reachable: FxHashMap<BlockId, SmallVec<[BlockId; 8]>>,
    cycle: bool,
    valid: bool,
    fixed: bool,
}

impl NewAt for Reachability {
    const KIND: AnalysisKind = AnalysisKind::Reachability;

    fn new_at(position: Position) -> Self {
        Self { position, reachable: FxHashMap::default(), cycle: false, valid: true, fixed: false }
    }
}

impl Reachability {
    /// `true` if control can flow from `from` to `to` within the function
    /// (reflexive: every block reaches itself, since the underlying walk
    /// always seeds its own root).
    pub fn can_reach(&self, from: BlockId, to: BlockId) -> bool {
        from == to || self.reachable.get(&from).is_some_and(|succs| succs.contains(&to))
    }

    /// `true` if the CFG contains an edge `block -> succ` where `succ`
    /// already reaches `block`, i.e. a real (non-trivial) cycle.
    pub fn has_cycle(&self) -> bool {
        self.cycle
    }
}

impl AbstractAttribute for Reachability {
    fn kind(&self) -> AnalysisKind {
        Self::KIND
    }

    fn position(&self) -> Position {
        self.position
    }

    fn initialize(&mut self, engine: &mut Engine) {
        let Some(func) = self.position.anchor_function() else {
            self.valid = false;
            self.fixed = true;
            return;
        };
        let f = &engine.module().functions[func];
        for &block in &f.layout {
            let succs = attributor_ir::analysis_getter::blocks_reachable_from(f, block);
            self.reachable.insert(block, succs);
        }
        for &block in &f.layout {
            let Some(&term) = f.blocks[block].insts.last() else { continue };
            for succ in f.insts[term].successors() {
                let closes_a_cycle = succ == block || self.reachable.get(&succ).is_some_and(|s| s.contains(&block));
                if closes_a_cycle {
                    self.cycle = true;
                }
            }
        }
        self.fixed = true;
    }

    fn update(&mut self, _engine: &mut Engine) -> ChangeResult {
        ChangeResult::Unchanged
    }

    fn manifest(&self, _engine: &Engine, _edits: &mut EditQueue) {}

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
