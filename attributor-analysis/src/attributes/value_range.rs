//! **value-range** (§4.4): a `ConstantRange` per pointer-or-integer
//! position, narrowed by interval arithmetic over `add`/`sub`, joined across
//! `phi`/`select` incoming values, and aggregated across call sites for
//! arguments the same way `dereferenceable` aggregates its byte bound.
//!
//! `icmp ult`/`icmp slt` against a range that is provably entirely below or
//! at-or-above the other operand settles to the singleton range for the
//! resulting `i1` (scenario 4 of the worked examples); every other predicate
//! degrades to the full boolean range rather than guess. Manifest writes
//! `range` metadata at `Argument`/`Returned`/`CallSiteArgument` positions,
//! and directly folds a `Float` position whose range has narrowed to a
//! single value into a materialized constant.

use attributor_ir::{FuncId, ICmpPredicate, Opcode, ValueId};

use crate::{
    combinators,
    engine::Engine,
    lattice::{ChangeResult, ConstantRange, KnownAssumed},
    position::Position,
    record::{AbstractAttribute, AnalysisKind, NewAt},
    rewriter::{AttrTarget, EditQueue},
};

#[derive(Debug)]
pub struct ValueRange {
    position: Position,
    state: KnownAssumed<ConstantRange>,
}

impl NewAt for ValueRange {
    const KIND: AnalysisKind = AnalysisKind::ValueRange;

    fn new_at(position: Position) -> Self {
        Self { position, state: KnownAssumed::new(ConstantRange::Full) }
    }
}

impl ValueRange {
    pub fn known_range(&self) -> ConstantRange {
        *self.state.known()
    }

    fn narrow(&mut self, range: ConstantRange) -> ChangeResult {
        self.state.add_known(&range) | self.state.intersect_assumed(&range)
    }

    fn range_of(engine: &mut Engine, func: FuncId, value: ValueId) -> ConstantRange {
        if let Some(c) = engine.module().functions[func].values[value].as_const_int() {
            return ConstantRange::single(c);
        }
        let position = match engine.module().functions[func].values[value].kind {
            attributor_ir::ValueKind::Argument(idx) => Position::Argument(func, idx),
            _ => Position::Float(func, value),
        };
        let handle = engine.get_or_create::<ValueRange>(position);
        if !engine.is_valid(handle) {
            return ConstantRange::Full;
        }
        engine.downcast::<ValueRange>(handle).map(ValueRange::known_range).unwrap_or(ConstantRange::Full)
    }

    fn update_float(&mut self, engine: &mut Engine, func: FuncId, value: ValueId) -> ChangeResult {
        let attributor_ir::ValueKind::InstResult(inst_id) = engine.module().functions[func].values[value].kind else {
            return ChangeResult::Unchanged;
        };
        let opcode = engine.module().functions[func].insts[inst_id].opcode.clone();
        let operands: Vec<ValueId> = engine.module().functions[func].insts[inst_id].operands.to_vec();
        match opcode {
            Opcode::Add => match (Self::range_of(engine, func, operands[0]).as_pair(), Self::range_of(engine, func, operands[1]).as_pair()) {
                (Some((l1, h1)), Some((l2, h2))) => self.narrow(ConstantRange::bounded(l1 + l2, (h1 - 1) + (h2 - 1) + 1)),
                _ => ChangeResult::Unchanged,
            },
            Opcode::Sub => match (Self::range_of(engine, func, operands[0]).as_pair(), Self::range_of(engine, func, operands[1]).as_pair()) {
                (Some((l1, h1)), Some((l2, h2))) => self.narrow(ConstantRange::bounded(l1 - (h2 - 1), (h1 - 1) - l2 + 1)),
                _ => ChangeResult::Unchanged,
            },
            Opcode::BitCast => self.narrow(Self::range_of(engine, func, operands[0])),
            Opcode::Phi { .. } => {
                let mut acc = ConstantRange::Empty;
                for &operand in &operands {
                    acc = acc.join(&Self::range_of(engine, func, operand));
                }
                self.narrow(acc)
            }
            Opcode::Select => {
                let mut acc = ConstantRange::Empty;
                for &operand in &operands[1..] {
                    acc = acc.join(&Self::range_of(engine, func, operand));
                }
                self.narrow(acc)
            }
            Opcode::ICmp(ICmpPredicate::Ult | ICmpPredicate::Slt) => {
                let lhs = Self::range_of(engine, func, operands[0]);
                let rhs = Self::range_of(engine, func, operands[1]);
                let result = match lhs.always_lt(&rhs) {
                    Some(true) => ConstantRange::single(1),
                    Some(false) => ConstantRange::single(0),
                    None => ConstantRange::bounded(0, 2),
                };
                self.narrow(result)
            }
            Opcode::ICmp(_) => self.narrow(ConstantRange::bounded(0, 2)),
            _ => ChangeResult::Unchanged,
        }
    }

    fn update_argument(&mut self, engine: &mut Engine, func: FuncId, arg_index: u32) -> ChangeResult {
        let (positions, saw_unmappable) = combinators::call_site_argument_positions(engine.module(), func, arg_index);
        if saw_unmappable {
            return self.state.indicate_pessimistic_fixpoint();
        }
        if positions.is_empty() {
            return ChangeResult::Unchanged;
        }
        let mut acc = ConstantRange::Empty;
        for position in positions {
            let Position::CallSiteArgument(caller, call, idx) = position else { continue };
            if engine.is_assumed_dead_instruction(caller, call) {
                continue;
            }
            let operand = engine.module().functions[caller].insts[call].operands[idx as usize];
            acc = acc.join(&Self::range_of(engine, caller, operand));
        }
        self.narrow(acc)
    }

    fn update_returned(&mut self, engine: &mut Engine, func: FuncId) -> ChangeResult {
        let returns = engine.module().functions[func].returned_values();
        if returns.is_empty() {
            return ChangeResult::Unchanged;
        }
        let mut acc = ConstantRange::Empty;
        let mut any_live = false;
        for (ret_inst, value) in returns {
            if engine.is_assumed_dead_instruction(func, ret_inst) {
                continue;
            }
            any_live = true;
            acc = acc.join(&Self::range_of(engine, func, value));
        }
        if !any_live {
            return ChangeResult::Unchanged;
        }
        self.narrow(acc)
    }
}

impl AbstractAttribute for ValueRange {
    fn kind(&self) -> AnalysisKind {
        Self::KIND
    }

    fn position(&self) -> Position {
        self.position
    }

    fn initialize(&mut self, _engine: &mut Engine) {}

    fn update(&mut self, engine: &mut Engine) -> ChangeResult {
        if let Some(mirror) = combinators::callee_mirror_position(self.position, engine.module()) {
            let handle = engine.get_or_create::<ValueRange>(mirror);
            return if engine.is_valid(handle) {
                let range = engine.downcast::<ValueRange>(handle).map(ValueRange::known_range).unwrap_or(ConstantRange::Full);
                self.narrow(range)
            } else {
                self.state.indicate_pessimistic_fixpoint()
            };
        }

        match self.position {
            Position::Float(func, value) => self.update_float(engine, func, value),
            Position::Argument(func, idx) => self.update_argument(engine, func, idx),
            Position::Returned(func) => self.update_returned(engine, func),
            _ => self.state.indicate_pessimistic_fixpoint(),
        }
    }

    fn manifest(&self, engine: &Engine, edits: &mut EditQueue) {
        let ConstantRange::Bounded { lo, hi } = *self.state.known() else { return };
        match self.position {
            Position::Float(func, value) if self.state.known().contains_only(lo) => {
                edits.fold_to_constant(func, value, lo);
            }
            Position::Argument(func, idx) => {
                edits.add_attribute(AttrTarget::Argument(func, idx), attributor_ir::IrAttribute::Range { lo, hi });
            }
            Position::Returned(func) => {
                edits.add_attribute(AttrTarget::Return(func), attributor_ir::IrAttribute::Range { lo, hi });
            }
            Position::CallSiteArgument(func, call, idx) => {
                edits.add_attribute(AttrTarget::CallSiteArgument(func, call, idx), attributor_ir::IrAttribute::Range { lo, hi });
            }
            // A call-site return has no attribute target of its own (it is
            // not a declaration site); a singleton range there is only worth
            // keeping if it can be folded straight into the call's result.
            Position::CallSiteReturned(func, call) if self.state.known().contains_only(lo) => {
                if let Some(result) = engine.module().functions[func].insts[call].result {
                    edits.fold_to_constant(func, result, lo);
                }
            }
            _ => {}
        }
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
