//! **alignment** (§4.4): the known-guaranteed alignment, in bytes, of a
//! pointer position — a single `u32` monotone *lower* bound that can only
//! grow as more-specific origins resolve (alignment is a divisor-refinement
//! lattice in the source framework; this reference IR only ever deals in
//! power-of-two byte counts, so plain `u32` `max` stands in for "coarser
//! divides finer" refinement).

use attributor_ir::{FuncId, Opcode, ValueId, ValueKind};

use crate::{
    combinators,
    engine::Engine,
    lattice::{BoundedLattice, ChangeResult, KnownAssumed},
    position::Position,
    record::{AbstractAttribute, AnalysisKind, NewAt},
    rewriter::{AttrTarget, EditQueue},
};

/// The IR has no declared natural alignment for `alloca`/`malloc`, so a fresh
/// allocation is only ever assumed word-aligned.
const DEFAULT_ALLOC_ALIGN: u32 = 8;

/// Starting optimistic assumption: "could turn out to be this well aligned",
/// narrowed down by `intersect_assumed` as real constraints arrive. Plays the
/// role a true top element would in a divisor lattice without this reference
/// IR needing one.
const TOP_ALIGN: u32 = 1 << 30;

#[derive(Debug)]
pub struct Alignment {
    position: Position,
    state: KnownAssumed<u32>,
}

impl NewAt for Alignment {
    const KIND: AnalysisKind = AnalysisKind::Alignment;

    fn new_at(position: Position) -> Self {
        Self { position, state: KnownAssumed::new(TOP_ALIGN) }
    }
}

impl Alignment {
    pub fn known_align(&self) -> u32 {
        (*self.state.known()).max(1)
    }

    fn align_of(engine: &mut Engine, func: FuncId, value: ValueId) -> Option<u32> {
        let handle = engine.get_or_create::<Alignment>(Position::Float(func, value));
        if !engine.is_valid(handle) {
            return None;
        }
        engine.downcast::<Alignment>(handle).map(Alignment::known_align)
    }

    fn update_float(&mut self, engine: &mut Engine, func: FuncId, value: ValueId) -> ChangeResult {
        let ValueKind::InstResult(inst_id) = engine.module().functions[func].values[value].kind else {
            return self.state.indicate_pessimistic_fixpoint();
        };
        let opcode = engine.module().functions[func].insts[inst_id].opcode.clone();
        match opcode {
            Opcode::Alloca { .. } | Opcode::MallocLike { .. } => {
                self.state.add_known(&DEFAULT_ALLOC_ALIGN);
                self.state.intersect_assumed(&DEFAULT_ALLOC_ALIGN);
                self.state.indicate_optimistic_fixpoint();
                ChangeResult::Changed
            }
            Opcode::BitCast => {
                let base = engine.module().functions[func].insts[inst_id].operands[0];
                match Self::align_of(engine, func, base) {
                    Some(align) => {
                        let changed = self.state.add_known(&align);
                        changed | self.state.intersect_assumed(&align)
                    }
                    None => self.state.indicate_pessimistic_fixpoint(),
                }
            }
            Opcode::GetElementPtr { offset } => {
                let base = engine.module().functions[func].insts[inst_id].operands[0];
                match Self::align_of(engine, func, base) {
                    Some(base_align) => {
                        let residual = gcd(base_align as u64, offset.unsigned_abs()).max(1) as u32;
                        let new_align = if offset == 0 { base_align } else { residual.min(base_align) };
                        let changed = self.state.add_known(&new_align);
                        changed | self.state.intersect_assumed(&new_align)
                    }
                    None => self.state.indicate_pessimistic_fixpoint(),
                }
            }
            _ => self.state.indicate_pessimistic_fixpoint(),
        }
    }
}

/// Largest power-of-two (or general) divisor shared by `a` and a nonzero
/// byte offset, used to derive the alignment a constant-offset GEP preserves.
fn gcd(mut a: u64, mut b: u64) -> u64 {
    if b == 0 {
        return a.max(1);
    }
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a.max(1)
}

impl AbstractAttribute for Alignment {
    fn kind(&self) -> AnalysisKind {
        Self::KIND
    }

    fn position(&self) -> Position {
        self.position
    }

    fn initialize(&mut self, engine: &mut Engine) {
        let Some(declared) = self.position.declared_attrs(engine.module()) else { return };
        if let Some(align) = declared.align() {
            self.state.add_known(&align);
            self.state.intersect_assumed(&align);
        }
    }

    fn update(&mut self, engine: &mut Engine) -> ChangeResult {
        if let Some(mirror) = combinators::callee_mirror_position(self.position, engine.module()) {
            let handle = engine.get_or_create::<Alignment>(mirror);
            return if engine.is_valid(handle) {
                match engine.downcast::<Alignment>(handle).map(Alignment::known_align) {
                    Some(align) => {
                        let changed = self.state.add_known(&align);
                        changed | self.state.intersect_assumed(&align)
                    }
                    None => self.state.indicate_pessimistic_fixpoint(),
                }
            } else {
                self.state.indicate_pessimistic_fixpoint()
            };
        }

        match self.position {
            Position::Float(func, value) => self.update_float(engine, func, value),
            _ => self.state.indicate_pessimistic_fixpoint(),
        }
    }

    fn manifest(&self, _engine: &Engine, edits: &mut EditQueue) {
        let align = self.known_align();
        if align <= 1 {
            return;
        }
        let target = match self.position {
            Position::Argument(f, idx) => AttrTarget::Argument(f, idx),
            Position::CallSiteArgument(f, call, idx) => AttrTarget::CallSiteArgument(f, call, idx),
            _ => return,
        };
        edits.add_attribute(target, attributor_ir::IrAttribute::Align(align));
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
