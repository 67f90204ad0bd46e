//! **no-free** (§4.4): function and pointer-argument positions. A function is
//! no-free if it calls no `free`-like instruction and every call-like
//! instruction it contains targets an assumed no-free callee. A pointer
//! argument is no-free if the pointer never reaches a `free`-like call or a
//! callee argument that isn't itself assumed no-free, following it through
//! `GetElementPtr`/`BitCast`/`Phi`/`Select` (§4.3's documented pointer-flow
//! rule, shared with `no-capture`).

use attributor_ir::{CallTarget, FuncId, InstId, Opcode};

use crate::{
    combinators::{transitive_pointer_flow, FlowStep},
    engine::Engine,
    lattice::{ChangeResult, KnownAssumed},
    position::Position,
    record::{AbstractAttribute, AnalysisKind, NewAt},
    rewriter::{AttrTarget, EditQueue},
};

#[derive(Debug)]
pub struct NoFree {
    position: Position,
    state: KnownAssumed<bool>,
}

impl NewAt for NoFree {
    const KIND: AnalysisKind = AnalysisKind::NoFree;

    fn new_at(position: Position) -> Self {
        Self { position, state: KnownAssumed::new(true) }
    }
}

impl NoFree {
    pub fn is_known_no_free(&self) -> bool {
        *self.state.known()
    }

    fn update_function(&mut self, engine: &mut Engine, func: FuncId) -> ChangeResult {
        let calls: Vec<InstId> = engine.module().functions[func].call_sites().map(|(id, _)| id).collect();
        let has_local_free = engine
            .module()
            .functions[func]
            .instructions()
            .any(|(_, inst)| matches!(inst.opcode, Opcode::FreeLike));

        let mut frees = has_local_free;
        for call in calls {
            if engine.is_assumed_dead_instruction(func, call) {
                continue;
            }
            match engine.module().functions[func].insts[call].call_target() {
                Some(CallTarget::Direct(callee)) => {
                    let handle = engine.get_or_create::<NoFree>(Position::Function(callee));
                    if !engine.is_valid(handle)
                        || !engine.downcast::<NoFree>(handle).is_some_and(NoFree::is_known_no_free)
                    {
                        frees = true;
                    }
                }
                _ => frees = true,
            }
        }

        if frees {
            self.state.indicate_pessimistic_fixpoint()
        } else {
            self.state.indicate_optimistic_fixpoint();
            ChangeResult::Changed
        }
    }

    fn update_argument(&mut self, engine: &mut Engine, func: FuncId, arg_index: u32) -> ChangeResult {
        let value = engine.module().functions[func].arg_value(arg_index as usize);
        let flow = transitive_pointer_flow(engine.module(), func, value);

        let mut frees = false;
        for step in flow {
            let FlowStep::Use(u) = step else { continue };
            if engine.is_assumed_dead_instruction(func, u.inst) {
                continue;
            }
            let inst = &engine.module().functions[func].insts[u.inst];
            match inst.opcode {
                Opcode::FreeLike if u.index == 0 => {
                    frees = true;
                }
                Opcode::Call { callee } | Opcode::Invoke { callee, .. } => match callee {
                    CallTarget::Direct(callee) => {
                        let handle = engine.get_or_create::<NoFree>(Position::Argument(callee, u.index));
                        if !engine.is_valid(handle)
                            || !engine.downcast::<NoFree>(handle).is_some_and(NoFree::is_known_no_free)
                        {
                            frees = true;
                        }
                    }
                    CallTarget::Indirect(_) => frees = true,
                },
                _ => {}
            }
            if frees {
                break;
            }
        }

        if frees {
            self.state.indicate_pessimistic_fixpoint()
        } else {
            self.state.indicate_optimistic_fixpoint();
            ChangeResult::Changed
        }
    }
}

impl AbstractAttribute for NoFree {
    fn kind(&self) -> AnalysisKind {
        Self::KIND
    }

    fn position(&self) -> Position {
        self.position
    }

    fn initialize(&mut self, _engine: &mut Engine) {}

    fn update(&mut self, engine: &mut Engine) -> ChangeResult {
        match self.position {
            Position::Function(func) => self.update_function(engine, func),
            Position::Argument(func, idx) => self.update_argument(engine, func, idx),
            _ => self.state.indicate_pessimistic_fixpoint(),
        }
    }

    fn manifest(&self, _engine: &Engine, edits: &mut EditQueue) {
        if !*self.state.known() {
            return;
        }
        match self.position {
            Position::Function(func) => {
                edits.add_attribute(AttrTarget::Function(func), attributor_ir::IrAttribute::NoFree)
            }
            Position::Argument(func, idx) => {
                edits.add_attribute(AttrTarget::Argument(func, idx), attributor_ir::IrAttribute::NoFree)
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
