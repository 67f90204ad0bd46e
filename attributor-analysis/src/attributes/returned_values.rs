//! **returned-values** (§4.4): `Returned` positions only. Resolves every
//! live `ret`'s operand down through `bitcast`/`getelementptr`/`phi`/`select`
//! to the set of leaf values that could actually reach the return, growing
//! monotonically as more leaves are discovered.
//!
//! Manifest: when that set ever collapses to a single leaf that is one of
//! `func`'s own arguments, marks the argument `returned` (scenario 2 of the
//! worked examples). Folding a leaf that settles to a constant into callers
//! is `value-simplify`'s job via its `CallSiteReturned` mirror, not this
//! attribute's — this one only tracks the shape of what comes back, not
//! whether any particular leaf is itself a known constant.

use attributor_ir::{Opcode, ValueId, ValueKind};
use rustc_hash::FxHashSet;

use crate::{
    combinators,
    engine::Engine,
    lattice::ChangeResult,
    position::Position,
    record::{AbstractAttribute, AnalysisKind, NewAt},
    rewriter::{AttrTarget, EditQueue},
};

#[derive(Debug)]
pub struct ReturnedValues {
    position: Position,
    leaves: FxHashSet<ValueId>,
    valid: bool,
    fixed: bool,
}

impl NewAt for ReturnedValues {
    const KIND: AnalysisKind = AnalysisKind::ReturnedValues;

    fn new_at(position: Position) -> Self {
        Self { position, leaves: FxHashSet::default(), valid: true, fixed: false }
    }
}

impl ReturnedValues {
    fn func(&self) -> attributor_ir::FuncId {
        self.position.anchor_function().expect("returned-values is only ever seeded at a Returned position")
    }

    fn resolve(module: &attributor_ir::Module, func: attributor_ir::FuncId, value: ValueId, seen: &mut FxHashSet<ValueId>, out: &mut FxHashSet<ValueId>) {
        if !seen.insert(value) {
            return;
        }
        if let ValueKind::InstResult(inst_id) = module.functions[func].values[value].kind {
            let inst = &module.functions[func].insts[inst_id];
            match inst.opcode {
                Opcode::BitCast | Opcode::GetElementPtr { .. } => {
                    Self::resolve(module, func, inst.operands[0], seen, out);
                    return;
                }
                Opcode::Phi { .. } => {
                    for &operand in &inst.operands {
                        Self::resolve(module, func, operand, seen, out);
                    }
                    return;
                }
                Opcode::Select => {
                    for &operand in &inst.operands[1..] {
                        Self::resolve(module, func, operand, seen, out);
                    }
                    return;
                }
                _ => {}
            }
        }
        out.insert(value);
    }
}

impl AbstractAttribute for ReturnedValues {
    fn kind(&self) -> AnalysisKind {
        Self::KIND
    }

    fn position(&self) -> Position {
        self.position
    }

    fn initialize(&mut self, _engine: &mut Engine) {}

    fn update(&mut self, engine: &mut Engine) -> ChangeResult {
        let func = self.func();
        let before = self.leaves.len();
        for position in combinators::returned_value_positions(engine.module(), func) {
            let Position::Float(_, value) = position else { continue };
            let mut seen = FxHashSet::default();
            let mut out = FxHashSet::default();
            Self::resolve(engine.module(), func, value, &mut seen, &mut out);
            self.leaves.extend(out);
        }
        ChangeResult::from_bool(self.leaves.len() != before)
    }

    fn manifest(&self, engine: &Engine, edits: &mut EditQueue) {
        let func = self.func();
        let mut it = self.leaves.iter();
        let (Some(&leaf), None) = (it.next(), it.next()) else { return };
        if let ValueKind::Argument(idx) = engine.module().functions[func].values[leaf].kind {
            edits.add_attribute(AttrTarget::Argument(func, idx), attributor_ir::IrAttribute::Returned);
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
