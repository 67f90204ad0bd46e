//! **no-capture** (§4.4): a pointer argument (or call-site argument) does not
//! escape the callee beyond the call itself, tracked as a three-bit set
//! rather than a single boolean — `NOT_CAPTURED_IN_MEM` (no copy survives
//! reachable through a store), `NOT_CAPTURED_IN_RET` (no copy survives
//! reachable through the return value), and `NOT_CAPTURED_IN_INT` (no copy
//! survives reachable through a pointer-to-integer cast). This reference IR's
//! [`attributor_ir::Opcode::BitCast`] is pointer-to-pointer only — there is no
//! integer cast opcode at all — so `NOT_CAPTURED_IN_INT` is vacuously always
//! known true here and is never independently stripped below.
//!
//! Follows [`combinators::transitive_pointer_flow`] from the argument's own
//! value: any `store` of the pointer itself (not merely a store *through*
//! it) strips `NOT_CAPTURED_IN_MEM`, any appearance as a `ret` operand strips
//! `NOT_CAPTURED_IN_RET`, and a call-site-argument position mirrors whatever
//! bits the callee's own no-capture record for that argument has settled.

use attributor_ir::Opcode;

use crate::{
    combinators::{self, FlowStep},
    engine::Engine,
    lattice::{BitSet, BoundedLattice, ChangeResult, KnownAssumed},
    position::Position,
    record::{AbstractAttribute, AnalysisKind, NewAt},
    rewriter::{AttrTarget, EditQueue},
};

pub const NOT_CAPTURED_IN_MEM: BitSet = BitSet::from_bits_retain(1 << 0);
pub const NOT_CAPTURED_IN_INT: BitSet = BitSet::from_bits_retain(1 << 1);
pub const NOT_CAPTURED_IN_RET: BitSet = BitSet::from_bits_retain(1 << 2);
pub const ALL: BitSet = BitSet::from_bits_retain(0b111);

#[derive(Debug)]
pub struct NoCapture {
    position: Position,
    state: KnownAssumed<BitSet>,
}

impl NewAt for NoCapture {
    const KIND: AnalysisKind = AnalysisKind::NoCapture;

    fn new_at(position: Position) -> Self {
        Self { position, state: KnownAssumed::new(ALL) }
    }
}

impl NoCapture {
    pub fn is_known_no_capture(&self) -> bool {
        self.state.known().contains(ALL)
    }

    pub fn known_bits(&self) -> BitSet {
        *self.state.known()
    }

    fn value_for(&self, engine: &Engine) -> Option<attributor_ir::ValueId> {
        self.position.associated_value(engine.module())
    }
}

impl AbstractAttribute for NoCapture {
    fn kind(&self) -> AnalysisKind {
        Self::KIND
    }

    fn position(&self) -> Position {
        self.position
    }

    fn initialize(&mut self, _engine: &mut Engine) {}

    fn update(&mut self, engine: &mut Engine) -> ChangeResult {
        if let Some(mirror) = combinators::callee_mirror_position(self.position, engine.module()) {
            let handle = engine.get_or_create::<NoCapture>(mirror);
            let mirror_bits = if engine.is_valid(handle) {
                engine.downcast::<NoCapture>(handle).map(NoCapture::known_bits).unwrap_or(BitSet::EMPTY)
            } else {
                BitSet::EMPTY
            };
            let changed = self.state.add_known(&mirror_bits);
            return changed | self.state.intersect_assumed(&mirror_bits);
        }

        let Some(func) = self.position.anchor_function() else {
            return self.state.indicate_pessimistic_fixpoint();
        };
        let Some(value) = self.value_for(engine) else {
            return self.state.indicate_pessimistic_fixpoint();
        };

        let mut still_not_captured = ALL;
        let steps = combinators::transitive_pointer_flow(engine.module(), func, value);
        for step in steps {
            match step {
                FlowStep::Returned(_) => {
                    still_not_captured.remove(NOT_CAPTURED_IN_RET);
                }
                FlowStep::Use(u) => {
                    if engine.is_assumed_dead_instruction(func, u.inst) {
                        continue;
                    }
                    let inst = &engine.module().functions[func].insts[u.inst];
                    match &inst.opcode {
                        Opcode::Store if u.index == 1 => {
                            still_not_captured.remove(NOT_CAPTURED_IN_MEM);
                        }
                        Opcode::Call { .. } | Opcode::Invoke { .. } => {
                            let arg_idx = u.index;
                            match inst.call_target() {
                                Some(attributor_ir::CallTarget::Direct(callee)) => {
                                    let handle = engine
                                        .get_or_create::<NoCapture>(Position::Argument(callee, arg_idx));
                                    let callee_bits = if engine.is_valid(handle) {
                                        engine.downcast::<NoCapture>(handle).map(NoCapture::known_bits).unwrap_or(BitSet::EMPTY)
                                    } else {
                                        BitSet::EMPTY
                                    };
                                    still_not_captured = still_not_captured.intersection(callee_bits);
                                }
                                _ => still_not_captured = BitSet::EMPTY,
                            }
                        }
                        _ => {}
                    }
                }
            }
        }

        let changed = self.state.add_known(&still_not_captured);
        changed | self.state.intersect_assumed(&still_not_captured)
    }

    fn manifest(&self, _engine: &Engine, edits: &mut EditQueue) {
        if !self.is_known_no_capture() {
            return;
        }
        let target = match self.position {
            Position::Argument(f, idx) => AttrTarget::Argument(f, idx),
            Position::CallSiteArgument(f, call, idx) => AttrTarget::CallSiteArgument(f, call, idx),
            _ => return,
        };
        edits.add_attribute(target, attributor_ir::IrAttribute::NoCapture);
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
