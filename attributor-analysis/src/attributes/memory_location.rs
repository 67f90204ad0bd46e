//! **memory-location** (§4.4): *which* memory a function's effects (per
//! `memory-behavior`) touch, as location-class bits — argument memory
//! (reachable from one of the function's own parameters) versus other
//! memory (anything else: heap allocations not traced to an argument,
//! globals, inaccessible memory). Coarser than the source framework's full
//! location lattice (no separate "inaccessible" or "global" class), but
//! enough to let a caller decide whether a callee's effects are confined to
//! the pointers it was handed.

use attributor_ir::{FuncId, InstId, Opcode, ValueId, ValueKind};

use crate::{
    engine::Engine,
    lattice::{BitSet, BoundedLattice, ChangeResult, KnownAssumed},
    position::Position,
    record::{AbstractAttribute, AnalysisKind, NewAt},
    rewriter::EditQueue,
};

pub const ARG_MEM: BitSet = BitSet::from_bits_retain(1 << 0);
pub const OTHER_MEM: BitSet = BitSet::from_bits_retain(1 << 1);

#[derive(Debug)]
pub struct MemoryLocation {
    position: Position,
    state: KnownAssumed<BitSet>,
}

impl NewAt for MemoryLocation {
    const KIND: AnalysisKind = AnalysisKind::MemoryLocation;

    fn new_at(position: Position) -> Self {
        Self { position, state: KnownAssumed::new(ARG_MEM | OTHER_MEM) }
    }
}

impl MemoryLocation {
    pub fn assumed_bits(&self) -> BitSet {
        *self.state.assumed()
    }

    fn func(&self) -> FuncId {
        self.position.anchor_function().expect("memory-location is only seeded at function positions")
    }

    /// Classifies a pointer operand's class by tracing through
    /// `getelementptr`/`bitcast` to its origin: an `Argument` origin is
    /// `ARG_MEM`, anything else (allocas, mallocs, unresolved) is `OTHER_MEM`.
    fn classify(func: &attributor_ir::Function, mut value: ValueId) -> BitSet {
        let mut guard = 0;
        loop {
            guard += 1;
            if guard > 64 {
                return OTHER_MEM;
            }
            match func.values[value].kind {
                ValueKind::Argument(_) => return ARG_MEM,
                ValueKind::InstResult(inst_id) => match &func.insts[inst_id].opcode {
                    Opcode::GetElementPtr { .. } | Opcode::BitCast => {
                        value = func.insts[inst_id].operands[0];
                        continue;
                    }
                    _ => return OTHER_MEM,
                },
                _ => return OTHER_MEM,
            }
        }
    }

    fn callee_effect(engine: &mut Engine, func: FuncId, call: InstId) -> BitSet {
        match engine.module().functions[func].insts[call].call_target() {
            Some(attributor_ir::CallTarget::Direct(callee)) => {
                let handle = engine.get_or_create::<MemoryLocation>(Position::Function(callee));
                if engine.is_valid(handle) {
                    engine.downcast::<MemoryLocation>(handle).map(MemoryLocation::assumed_bits).unwrap_or(ARG_MEM | OTHER_MEM)
                } else {
                    ARG_MEM | OTHER_MEM
                }
            }
            _ => ARG_MEM | OTHER_MEM,
        }
    }
}

impl AbstractAttribute for MemoryLocation {
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

        let mut observed = BitSet::EMPTY;
        for inst_id in insts {
            if engine.is_assumed_dead_instruction(func, inst_id) {
                continue;
            }
            let opcode = engine.module().functions[func].insts[inst_id].opcode.clone();
            match &opcode {
                Opcode::Load | Opcode::Store => {
                    let ptr = engine.module().functions[func].insts[inst_id].operands[0];
                    observed = observed.join(&Self::classify(&engine.module().functions[func], ptr));
                }
                Opcode::MallocLike { .. } | Opcode::FreeLike => {
                    observed = observed.join(&OTHER_MEM);
                }
                Opcode::Call { .. } | Opcode::Invoke { .. } => {
                    observed = observed.join(&Self::callee_effect(engine, func, inst_id));
                }
                _ => {}
            }
        }

        let changed = self.state.add_known(&observed);
        changed | self.state.intersect_assumed(&observed)
    }

    fn manifest(&self, _engine: &Engine, _edits: &mut EditQueue) {
        // No dedicated IR attribute models `argmemonly`; this fact is
        // consumed in-solve by `no-alias`/`memory-behavior` queries rather
        // than written back.
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
