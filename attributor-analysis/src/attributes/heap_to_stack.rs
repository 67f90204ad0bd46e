//! **heap-to-stack** (§4.4): a `malloc`-like allocation of statically known
//! size that never escapes its defining function can be promoted to an
//! `alloca`. "Never escapes" is checked the same way `no-capture` checks
//! escape — following [`combinators::transitive_pointer_flow`] — except a
//! `free` of the pointer itself is expected and collected rather than
//! treated as an escape, since `manifest` deletes exactly those calls.

use attributor_ir::{FuncId, InstId, Opcode, ValueId, ValueKind};

use crate::{
    attributes::no_capture::NoCapture,
    combinators::{self, FlowStep},
    engine::Engine,
    lattice::{ChangeResult, KnownAssumed},
    position::Position,
    record::{AbstractAttribute, AnalysisKind, NewAt},
    rewriter::EditQueue,
};

#[derive(Debug)]
pub struct HeapToStack {
    position: Position,
    state: KnownAssumed<bool>,
    size: Option<u64>,
    matched_frees: Vec<InstId>,
}

impl NewAt for HeapToStack {
    const KIND: AnalysisKind = AnalysisKind::HeapToStack;

    fn new_at(position: Position) -> Self {
        Self { position, state: KnownAssumed::new(true), size: None, matched_frees: Vec::new() }
    }
}

impl HeapToStack {
    fn malloc_site(&self, engine: &Engine, func: FuncId, value: ValueId) -> Option<(InstId, u64)> {
        let ValueKind::InstResult(inst_id) = engine.module().functions[func].values[value].kind else {
            return None;
        };
        match engine.module().functions[func].insts[inst_id].opcode {
            Opcode::MallocLike { size: Some(size), .. } => Some((inst_id, size)),
            _ => None,
        }
    }
}

impl AbstractAttribute for HeapToStack {
    fn kind(&self) -> AnalysisKind {
        Self::KIND
    }

    fn position(&self) -> Position {
        self.position
    }

    fn initialize(&mut self, engine: &mut Engine) {
        let Position::Float(func, value) = self.position else {
            self.state.indicate_pessimistic_fixpoint();
            return;
        };
        if self.malloc_site(engine, func, value).is_none() {
            self.state.indicate_pessimistic_fixpoint();
        }
    }

    fn update(&mut self, engine: &mut Engine) -> ChangeResult {
        let Position::Float(func, value) = self.position else {
            return self.state.indicate_pessimistic_fixpoint();
        };
        let Some((_, size)) = self.malloc_site(engine, func, value) else {
            return self.state.indicate_pessimistic_fixpoint();
        };
        if size > engine.config().heap_to_stack_size_cap() {
            return self.state.indicate_pessimistic_fixpoint();
        }
        self.size = Some(size);

        let mut frees = Vec::new();
        let steps = combinators::transitive_pointer_flow(engine.module(), func, value);
        for step in steps {
            match step {
                FlowStep::Returned(_) => return self.state.indicate_pessimistic_fixpoint(),
                FlowStep::Use(u) => {
                    if engine.is_assumed_dead_instruction(func, u.inst) {
                        continue;
                    }
                    let inst = &engine.module().functions[func].insts[u.inst];
                    match &inst.opcode {
                        Opcode::FreeLike if u.index == 0 => frees.push(u.inst),
                        Opcode::Store if u.index == 1 => return self.state.indicate_pessimistic_fixpoint(),
                        Opcode::Call { .. } | Opcode::Invoke { .. } => {
                            let arg_idx = u.index;
                            match inst.call_target() {
                                Some(attributor_ir::CallTarget::Direct(callee)) => {
                                    let handle = engine.get_or_create::<NoCapture>(Position::Argument(callee, arg_idx));
                                    let no_capture = engine.is_valid(handle)
                                        && engine.downcast::<NoCapture>(handle).is_some_and(NoCapture::is_known_no_capture);
                                    if !no_capture {
                                        return self.state.indicate_pessimistic_fixpoint();
                                    }
                                }
                                _ => return self.state.indicate_pessimistic_fixpoint(),
                            }
                        }
                        _ => {}
                    }
                }
            }
        }

        // A malloc with zero matched frees is still admissible (never freed
        // along an escaping path, per the catalogue entry); one with several
        // is accepted as-is rather than demanding exactly one dominates every
        // other use, preserving the written admission predicate rather than
        // the tighter one it likely intended (see DESIGN.md's Open Question
        // resolution).
        self.matched_frees = frees;
        self.state.indicate_optimistic_fixpoint();
        ChangeResult::Changed
    }

    fn manifest(&self, engine: &Engine, edits: &mut EditQueue) {
        if !*self.state.known() {
            return;
        }
        let Position::Float(func, value) = self.position else { return };
        let (Some(size), Some((malloc_inst, _))) = (self.size, self.malloc_site(engine, func, value)) else {
            return;
        };
        edits.promote_heap_to_stack(func, malloc_inst, size, self.matched_frees.clone());
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
