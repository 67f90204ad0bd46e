//! **dereferenceable** (§4.4): a `(knownMin, assumedMax)` byte-count pair
//! per pointer position, not a plain `KnownAssumed<bool>` — the fact this
//! attribute tracks is itself a bound that narrows on one side and grows on
//! the other, so it is modeled as its own small monotone pair rather than
//! forced through the generic boolean lattice.
//!
//! A fresh stack (`alloca`) or heap (`malloc`-like, constant size) allocation
//! is exactly that many bytes dereferenceable; a `getelementptr` with a
//! constant offset subtracts that offset from its base's bound; arguments and
//! call-site-returned positions take the minimum bound any caller/callee can
//! actually guarantee.

use attributor_ir::{FuncId, Opcode, ValueId, ValueKind};

use crate::{
    combinators,
    engine::Engine,
    lattice::{ChangeResult, DereferenceableBytes},
    position::Position,
    record::{AbstractAttribute, AnalysisKind, NewAt},
    rewriter::{AttrTarget, EditQueue},
};

#[derive(Debug)]
pub struct Dereferenceable {
    position: Position,
    bytes: DereferenceableBytes,
    valid: bool,
    fixed: bool,
}

impl NewAt for Dereferenceable {
    const KIND: AnalysisKind = AnalysisKind::Dereferenceable;

    fn new_at(position: Position) -> Self {
        Self {
            position,
            bytes: DereferenceableBytes::new(DereferenceableBytes::UNBOUNDED, true),
            valid: true,
            fixed: false,
        }
    }
}

impl Dereferenceable {
    pub fn known_min(&self) -> u64 {
        self.bytes.known_min
    }

    fn settle(&mut self, known_min: u64, assumed_max: u64) -> ChangeResult {
        let changed = known_min != self.bytes.known_min || assumed_max != self.bytes.assumed_max;
        self.bytes.known_min = known_min;
        self.bytes.assumed_max = assumed_max.max(known_min);
        ChangeResult::from_bool(changed)
    }

    fn pessimize_to_current_known(&mut self) -> ChangeResult {
        let known = self.bytes.known_min;
        self.bytes.assumed_max = known;
        self.valid = known > 0;
        self.fixed = true;
        ChangeResult::Changed
    }

    fn bound_of(engine: &mut Engine, func: FuncId, value: ValueId) -> Option<(u64, u64)> {
        let position = match engine.module().functions[func].values[value].kind {
            ValueKind::Argument(idx) => Position::Argument(func, idx),
            _ => Position::Float(func, value),
        };
        let handle = engine.get_or_create::<Dereferenceable>(position);
        if !engine.is_valid(handle) {
            return None;
        }
        engine.downcast::<Dereferenceable>(handle).map(|d| (d.bytes.known_min, d.bytes.assumed_max))
    }

    fn update_float(&mut self, engine: &mut Engine, func: FuncId, value: ValueId) -> ChangeResult {
        let ValueKind::InstResult(inst_id) = engine.module().functions[func].values[value].kind else {
            return self.pessimize_to_current_known();
        };
        let opcode = engine.module().functions[func].insts[inst_id].opcode.clone();
        match opcode {
            Opcode::Alloca { size } => self.settle(size, size),
            Opcode::MallocLike { size: Some(size), .. } => self.settle(size, size),
            Opcode::MallocLike { size: None, .. } => self.pessimize_to_current_known(),
            Opcode::GetElementPtr { offset } if offset >= 0 => {
                let base = engine.module().functions[func].insts[inst_id].operands[0];
                match Self::bound_of(engine, func, base) {
                    Some((min, max)) => {
                        let offset = offset as u64;
                        self.settle(min.saturating_sub(offset), max.saturating_sub(offset))
                    }
                    None => self.pessimize_to_current_known(),
                }
            }
            Opcode::BitCast => {
                let base = engine.module().functions[func].insts[inst_id].operands[0];
                match Self::bound_of(engine, func, base) {
                    Some((min, max)) => self.settle(min, max),
                    None => self.pessimize_to_current_known(),
                }
            }
            _ => self.pessimize_to_current_known(),
        }
    }

    fn update_argument(&mut self, engine: &mut Engine, func: FuncId, arg_index: u32) -> ChangeResult {
        let (positions, saw_unmappable) = combinators::call_site_argument_positions(engine.module(), func, arg_index);
        if saw_unmappable || positions.is_empty() {
            return self.pessimize_to_current_known();
        }
        let mut min_bound = DereferenceableBytes::UNBOUNDED;
        for position in positions {
            let Position::CallSiteArgument(caller, call, idx) = position else { continue };
            if engine.is_assumed_dead_instruction(caller, call) {
                continue;
            }
            let operand = engine.module().functions[caller].insts[call].operands[idx as usize];
            match Self::bound_of(engine, caller, operand) {
                Some((min, _)) => min_bound = min_bound.min(min),
                None => {
                    min_bound = 0;
                    break;
                }
            }
        }
        self.settle(min_bound, min_bound)
    }

    /// Meets over every live `ret` operand's own bound: a function's return
    /// is only provably dereferenceable for `N` bytes if every path out of it
    /// is (mirrors `non-null`'s `update_returned`).
    fn update_returned(&mut self, engine: &mut Engine, func: FuncId) -> ChangeResult {
        let returns = engine.module().functions[func].returned_values();
        if returns.is_empty() {
            return ChangeResult::Unchanged;
        }
        let mut min_bound = DereferenceableBytes::UNBOUNDED;
        let mut max_bound = DereferenceableBytes::UNBOUNDED;
        for (ret_inst, value) in returns {
            if engine.is_assumed_dead_instruction(func, ret_inst) {
                continue;
            }
            match Self::bound_of(engine, func, value) {
                Some((min, max)) => {
                    min_bound = min_bound.min(min);
                    max_bound = max_bound.min(max);
                }
                None => {
                    min_bound = 0;
                    max_bound = 0;
                }
            }
        }
        self.settle(min_bound, max_bound)
    }
}

impl AbstractAttribute for Dereferenceable {
    fn kind(&self) -> AnalysisKind {
        Self::KIND
    }

    fn position(&self) -> Position {
        self.position
    }

    fn initialize(&mut self, engine: &mut Engine) {
        let Some(declared) = self.position.declared_attrs(engine.module()) else { return };
        let known_min = declared.dereferenceable_bytes();
        if known_min > 0 {
            self.settle(known_min, DereferenceableBytes::UNBOUNDED);
        }
    }

    fn update(&mut self, engine: &mut Engine) -> ChangeResult {
        if let Some(mirror) = combinators::callee_mirror_position(self.position, engine.module()) {
            let handle = engine.get_or_create::<Dereferenceable>(mirror);
            return if engine.is_valid(handle) {
                match engine.downcast::<Dereferenceable>(handle) {
                    Some(d) => {
                        let (min, max) = (d.bytes.known_min, d.bytes.assumed_max);
                        self.settle(min, max)
                    }
                    None => self.pessimize_to_current_known(),
                }
            } else {
                self.pessimize_to_current_known()
            };
        }

        match self.position {
            Position::Float(func, value) => self.update_float(engine, func, value),
            Position::Argument(func, idx) => self.update_argument(engine, func, idx),
            Position::Returned(func) => self.update_returned(engine, func),
            _ => self.pessimize_to_current_known(),
        }
    }

    fn manifest(&self, _engine: &Engine, edits: &mut EditQueue) {
        if self.bytes.known_min == 0 {
            return;
        }
        let target = match self.position {
            Position::Argument(f, idx) => AttrTarget::Argument(f, idx),
            Position::CallSiteArgument(f, call, idx) => AttrTarget::CallSiteArgument(f, call, idx),
            Position::Returned(f) => AttrTarget::Return(f),
            _ => return,
        };
        edits.add_attribute(target, attributor_ir::IrAttribute::Dereferenceable(self.bytes.known_min));
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
        self.bytes.assumed_max = self.bytes.known_min;
        self.valid = self.bytes.known_min > 0;
        self.fixed = true;
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
