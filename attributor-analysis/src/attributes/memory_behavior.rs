//! **memory-behavior** (§4.4): which of read/write a function (transitively)
//! performs, as a two-bit [`BitSet`] pair — `known` grows as effects are
//! observed, `assumed` shrinks from "reads and writes anything" down to
//! whatever the scan actually finds. Function position only; this catalogue
//! does not attempt the source framework's per-argument refinement
//! (`argmemonly`-style reasoning lives in `memory-location` instead).

use attributor_ir::{FuncId, InstId, Opcode};

use crate::{
    engine::Engine,
    lattice::{BitSet, BoundedLattice, ChangeResult, KnownAssumed},
    position::Position,
    record::{AbstractAttribute, AnalysisKind, NewAt},
    rewriter::{AttrTarget, EditQueue},
};

pub const READS: BitSet = BitSet::from_bits_retain(1 << 0);
pub const WRITES: BitSet = BitSet::from_bits_retain(1 << 1);

#[derive(Debug)]
pub struct MemoryBehavior {
    position: Position,
    state: KnownAssumed<BitSet>,
}

impl NewAt for MemoryBehavior {
    const KIND: AnalysisKind = AnalysisKind::MemoryBehavior;

    fn new_at(position: Position) -> Self {
        Self { position, state: KnownAssumed::new(READS | WRITES) }
    }
}

impl MemoryBehavior {
    pub fn assumed_bits(&self) -> BitSet {
        *self.state.assumed()
    }

    fn func(&self) -> FuncId {
        self.position.anchor_function().expect("memory-behavior is only seeded at function positions")
    }

    fn local_effect(opcode: &Opcode) -> BitSet {
        match opcode {
            Opcode::Load => READS,
            Opcode::Store | Opcode::MallocLike { .. } | Opcode::FreeLike => WRITES,
            _ => BitSet::EMPTY,
        }
    }

    fn callee_effect(engine: &mut Engine, func: FuncId, call: InstId) -> BitSet {
        match engine.module().functions[func].insts[call].call_target() {
            Some(attributor_ir::CallTarget::Direct(callee)) => {
                let handle = engine.get_or_create::<MemoryBehavior>(Position::Function(callee));
                if engine.is_valid(handle) {
                    engine.downcast::<MemoryBehavior>(handle).map(MemoryBehavior::assumed_bits).unwrap_or(READS | WRITES)
                } else {
                    READS | WRITES
                }
            }
            _ => READS | WRITES,
        }
    }
}

impl AbstractAttribute for MemoryBehavior {
    fn kind(&self) -> AnalysisKind {
        Self::KIND
    }

    fn position(&self) -> Position {
        self.position
    }

    fn initialize(&mut self, engine: &mut Engine) {
        let Some(declared) = self.position.declared_attrs(engine.module()) else { return };
        if declared.has_flag(attributor_ir::IrAttribute::ReadNone) {
            self.state.intersect_assumed(&BitSet::EMPTY);
        } else if declared.has_flag(attributor_ir::IrAttribute::ReadOnly) {
            self.state.intersect_assumed(&READS);
        } else if declared.has_flag(attributor_ir::IrAttribute::WriteOnly) {
            self.state.intersect_assumed(&WRITES);
        }
    }

    fn update(&mut self, engine: &mut Engine) -> ChangeResult {
        let func = self.func();
        let insts: Vec<InstId> = engine.module().functions[func].instructions().map(|(id, _)| id).collect();

        let mut observed = BitSet::EMPTY;
        for inst_id in insts {
            if engine.is_assumed_dead_instruction(func, inst_id) {
                continue;
            }
            let opcode = engine.module().functions[func].insts[inst_id].opcode.clone();
            let effect = if matches!(opcode, Opcode::Call { .. } | Opcode::Invoke { .. }) {
                Self::callee_effect(engine, func, inst_id)
            } else {
                Self::local_effect(&opcode)
            };
            observed = observed.join(&effect);
        }

        let changed = self.state.add_known(&observed);
        changed | self.state.intersect_assumed(&observed)
    }

    fn manifest(&self, _engine: &Engine, edits: &mut EditQueue) {
        let bits = self.assumed_bits();
        let attr = if !bits.contains(READS) && !bits.contains(WRITES) {
            attributor_ir::IrAttribute::ReadNone
        } else if !bits.contains(WRITES) {
            attributor_ir::IrAttribute::ReadOnly
        } else if !bits.contains(READS) {
            attributor_ir::IrAttribute::WriteOnly
        } else {
            return;
        };
        edits.add_attribute(AttrTarget::Function(self.func()), attr);
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
