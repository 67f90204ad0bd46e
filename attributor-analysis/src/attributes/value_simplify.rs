//! **value-simplify** (§4.4): an optional single value per position. Three
//! states rather than the usual known/assumed pair: no candidate seen yet,
//! exactly one candidate seen (the simplification), or two *different*
//! candidates seen (permanently unsimplifiable — once contradicted, this
//! never un-contradicts, which is the monotonicity this attribute actually
//! needs).
//!
//! Implemented at `Argument` (all call sites must agree), `Float` (casts,
//! phis, selects, and a call instruction's own result, which defers to that
//! call's `CallSiteReturned` position), and `CallSiteReturned` (mirrors the
//! callee's `Returned` position, the shape scenario 1 and scenario 4 of the
//! worked examples exercise) positions. Other positions settle immediately to
//! "not simplified" — this reference catalogue does not attempt a
//! `Returned`-form all-returns-agree computation independent of its callers,
//! since every observable effect of that computation happens through the
//! `CallSiteReturned` mirror anyway.

use attributor_ir::{CallTarget, FuncId, Opcode, ValueId, ValueKind};

use crate::{
    combinators,
    engine::Engine,
    lattice::ChangeResult,
    position::Position,
    record::{AbstractAttribute, AnalysisKind, NewAt},
    rewriter::{ConstDescriptor, EditQueue},
};

#[derive(Debug)]
pub struct ValueSimplify {
    position: Position,
    /// The settled simplification, carried as a self-contained
    /// [`ConstDescriptor`] rather than a [`ValueId`]: this record resolves
    /// simplifications across call edges (argument positions draw on every
    /// call site's operand, `CallSiteReturned` on the callee's `ret`s), so
    /// the value most often actually lives in a *different* function's
    /// arena than `self.position`'s. A raw `ValueId` would silently index
    /// the wrong arena once manifested; see [`ConstDescriptor`]'s doc
    /// comment.
    replacement: Option<ConstDescriptor>,
    candidate_seen: bool,
    valid: bool,
    fixed: bool,
}

impl NewAt for ValueSimplify {
    const KIND: AnalysisKind = AnalysisKind::ValueSimplify;

    fn new_at(position: Position) -> Self {
        Self { position, replacement: None, candidate_seen: false, valid: true, fixed: false }
    }
}

impl ValueSimplify {
    pub fn replacement(&self) -> Option<ConstDescriptor> {
        self.replacement
    }

    pub fn known_constant_int(&self) -> Option<i64> {
        self.replacement?.as_const_int()
    }

    fn merge_candidate(&mut self, candidate: ConstDescriptor) -> ChangeResult {
        if self.fixed {
            return ChangeResult::Unchanged;
        }
        if !self.candidate_seen {
            self.candidate_seen = true;
            self.replacement = Some(candidate);
            return ChangeResult::Changed;
        }
        match self.replacement {
            Some(existing) if existing == candidate => ChangeResult::Unchanged,
            Some(_) => {
                self.replacement = None;
                ChangeResult::Changed
            }
            None => ChangeResult::Unchanged,
        }
    }

    /// Resolves `value` to a constant descriptor, either because it already
    /// is one, or because its own `Float` value-simplify record has settled
    /// on one.
    fn constant_of(engine: &mut Engine, func: FuncId, value: ValueId) -> Option<ConstDescriptor> {
        let data = engine.module().functions[func].values[value];
        if let Some(desc) = ConstDescriptor::of(data.ty, data.kind) {
            return Some(desc);
        }
        let handle = engine.get_or_create::<ValueSimplify>(Position::Float(func, value));
        if !engine.is_valid(handle) {
            return None;
        }
        engine.downcast::<ValueSimplify>(handle).and_then(ValueSimplify::replacement)
    }

    fn update_argument(&mut self, engine: &mut Engine, func: FuncId, arg_index: u32) -> ChangeResult {
        let (positions, saw_unmappable) = combinators::call_site_argument_positions(engine.module(), func, arg_index);
        if saw_unmappable {
            self.valid = false;
            self.fixed = true;
            return ChangeResult::from_bool(self.replacement.take().is_some());
        }

        let mut change = ChangeResult::Unchanged;
        for position in positions {
            let Position::CallSiteArgument(caller, call, idx) = position else { continue };
            if engine.is_assumed_dead_instruction(caller, call) {
                continue;
            }
            let operand = engine.module().functions[caller].insts[call].operands[idx as usize];
            if let Some(constant) = Self::constant_of(engine, caller, operand) {
                change |= self.merge_candidate(constant);
            } else {
                self.replacement = None;
                change = ChangeResult::Changed;
            }
        }
        change
    }

    fn update_float(&mut self, engine: &mut Engine, func: FuncId, value: ValueId) -> ChangeResult {
        let data = engine.module().functions[func].values[value];
        if let Some(desc) = ConstDescriptor::of(data.ty, data.kind) {
            self.merge_candidate(desc)
        } else if let ValueKind::InstResult(inst_id) = data.kind {
            let opcode = engine.module().functions[func].insts[inst_id].opcode.clone();
            match opcode {
                Opcode::BitCast => {
                    let operand = engine.module().functions[func].insts[inst_id].operands[0];
                    match Self::constant_of(engine, func, operand) {
                        Some(c) => self.merge_candidate(c),
                        None => ChangeResult::Unchanged,
                    }
                }
                Opcode::Phi { .. } => {
                    let operands: Vec<ValueId> = engine.module().functions[func].insts[inst_id].operands.to_vec();
                    let mut change = ChangeResult::Unchanged;
                    for operand in operands {
                        match Self::constant_of(engine, func, operand) {
                            Some(c) => change |= self.merge_candidate(c),
                            None => {
                                self.replacement = None;
                                change = ChangeResult::Changed;
                            }
                        }
                    }
                    change
                }
                Opcode::Select => {
                    let operands: Vec<ValueId> = engine.module().functions[func].insts[inst_id].operands.to_vec();
                    let cond_handle = engine.get_or_create::<ValueSimplify>(Position::Float(func, operands[0]));
                    let cond_const = engine.is_valid(cond_handle).then(|| {
                        engine.downcast::<ValueSimplify>(cond_handle).and_then(ValueSimplify::known_constant_int)
                    }).flatten();
                    match cond_const {
                        Some(0) => match Self::constant_of(engine, func, operands[2]) {
                            Some(c) => self.merge_candidate(c),
                            None => ChangeResult::Unchanged,
                        },
                        Some(_) => match Self::constant_of(engine, func, operands[1]) {
                            Some(c) => self.merge_candidate(c),
                            None => ChangeResult::Unchanged,
                        },
                        None => {
                            let t = Self::constant_of(engine, func, operands[1]);
                            let f = Self::constant_of(engine, func, operands[2]);
                            match (t, f) {
                                (Some(a), Some(b)) if a == b => self.merge_candidate(a),
                                _ => ChangeResult::Unchanged,
                            }
                        }
                    }
                }
                Opcode::Call { .. } | Opcode::Invoke { .. } => {
                    let handle = engine.get_or_create::<ValueSimplify>(Position::CallSiteReturned(func, inst_id));
                    if !engine.is_valid(handle) {
                        return ChangeResult::Unchanged;
                    }
                    match engine.downcast::<ValueSimplify>(handle).and_then(ValueSimplify::replacement) {
                        Some(c) => self.merge_candidate(c),
                        None => ChangeResult::Unchanged,
                    }
                }
                _ => ChangeResult::Unchanged,
            }
        } else {
            ChangeResult::Unchanged
        }
    }

    fn update_call_site_returned(&mut self, engine: &mut Engine, func: FuncId, call: attributor_ir::InstId) -> ChangeResult {
        let Some(callee_position) = combinators::callee_returned_position(engine.module(), func, call) else {
            self.valid = false;
            self.fixed = true;
            return ChangeResult::from_bool(self.replacement.take().is_some());
        };
        let Position::Returned(callee) = callee_position else { return ChangeResult::Unchanged };

        let returns = engine.module().functions[callee].returned_values();
        if returns.is_empty() {
            return ChangeResult::Unchanged;
        }

        let mut change = ChangeResult::Unchanged;
        for (ret_inst, value) in returns {
            if engine.is_assumed_dead_instruction(callee, ret_inst) {
                continue;
            }
            match Self::constant_of(engine, callee, value) {
                Some(c) => change |= self.merge_candidate(c),
                None => {
                    self.replacement = None;
                    change = ChangeResult::Changed;
                }
            }
        }
        change
    }
}

impl AbstractAttribute for ValueSimplify {
    fn kind(&self) -> AnalysisKind {
        Self::KIND
    }

    fn position(&self) -> Position {
        self.position
    }

    fn initialize(&mut self, _engine: &mut Engine) {}

    fn update(&mut self, engine: &mut Engine) -> ChangeResult {
        match self.position {
            Position::Argument(func, idx) => self.update_argument(engine, func, idx),
            Position::Float(func, value) => self.update_float(engine, func, value),
            Position::CallSiteReturned(func, call) => self.update_call_site_returned(engine, func, call),
            _ => {
                self.fixed = true;
                ChangeResult::Unchanged
            }
        }
    }

    fn manifest(&self, engine: &Engine, edits: &mut EditQueue) {
        let Some(replacement) = self.replacement else { return };
        let already_is = |func: FuncId, value: ValueId| {
            let data = engine.module().functions[func].values[value];
            ConstDescriptor::of(data.ty, data.kind) == Some(replacement)
        };
        match self.position {
            Position::Argument(func, idx) => {
                let value = engine.module().functions[func].arg_value(idx as usize);
                edits.replace_uses_with_constant(func, value, replacement);
            }
            Position::Float(func, value) => {
                if !already_is(func, value) {
                    edits.replace_uses_with_constant(func, value, replacement);
                }
            }
            Position::CallSiteReturned(func, call) => {
                if let Some(result) = engine.module().functions[func].insts[call].result {
                    edits.replace_uses_with_constant(func, result, replacement);
                }
            }
            _ => {}
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
        self.replacement = None;
        self.valid = false;
        self.fixed = true;
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
