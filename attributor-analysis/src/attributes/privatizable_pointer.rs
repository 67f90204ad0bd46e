//! **privatizable-pointer** (§4.4): a pointer argument that only ever loads
//! or stores a single scalar type, and never escapes (proven by
//! `no-capture`), can have its backing storage privatized per call site — the
//! caller passes a fresh stack slot instead of sharing one.
//!
//! This reference catalogue proves only the single-scalar-field shape the
//! rewriter (C6) actually knows how to splice (see
//! [`crate::rewriter::EditQueue::rewrite_privatized_argument`]'s own doc
//! comment): every load/store through the argument must agree on exactly one
//! [`Type`], and the argument must be `no-capture`.

use attributor_ir::{FuncId, Opcode, Type, ValueKind};

use crate::{
    attributes::no_capture::NoCapture,
    engine::Engine,
    lattice::{ChangeResult, KnownAssumed},
    position::Position,
    record::{AbstractAttribute, AnalysisKind, NewAt},
    rewriter::EditQueue,
};

#[derive(Debug)]
pub struct PrivatizablePointer {
    position: Position,
    state: KnownAssumed<bool>,
    field_ty: Option<Type>,
}

impl NewAt for PrivatizablePointer {
    const KIND: AnalysisKind = AnalysisKind::PrivatizablePointer;

    fn new_at(position: Position) -> Self {
        Self { position, state: KnownAssumed::new(true), field_ty: None }
    }
}

impl PrivatizablePointer {
    fn func_and_index(&self) -> Option<(FuncId, u32)> {
        match self.position {
            Position::Argument(f, idx) => Some((f, idx)),
            _ => None,
        }
    }
}

/// This reference IR's fixed set of scalar sizes, in bytes — matches
/// [`crate::rewriter::EditQueue::rewrite_privatized_argument`]'s own.
fn scalar_byte_size(ty: Type) -> u64 {
    match ty {
        Type::I1 => 1,
        Type::I32 => 4,
        Type::I64 => 8,
        Type::Ptr => 8,
        Type::Void => 0,
    }
}

impl AbstractAttribute for PrivatizablePointer {
    fn kind(&self) -> AnalysisKind {
        Self::KIND
    }

    fn position(&self) -> Position {
        self.position
    }

    fn initialize(&mut self, engine: &mut Engine) {
        let Some((func, idx)) = self.func_and_index() else {
            self.state.indicate_pessimistic_fixpoint();
            return;
        };
        let value = engine.module().functions[func].arg_value(idx as usize);
        if !engine.module().functions[func].value_type(value).is_pointer() {
            self.state.indicate_pessimistic_fixpoint();
        }
    }

    fn update(&mut self, engine: &mut Engine) -> ChangeResult {
        let Some((func, idx)) = self.func_and_index() else {
            return self.state.indicate_pessimistic_fixpoint();
        };
        let value = engine.module().functions[func].arg_value(idx as usize);

        let nc_handle = engine.get_or_create::<NoCapture>(self.position);
        let no_capture = engine.is_valid(nc_handle) && engine.downcast::<NoCapture>(nc_handle).is_some_and(NoCapture::is_known_no_capture);
        if !no_capture {
            return self.state.indicate_pessimistic_fixpoint();
        }

        let uses: Vec<attributor_ir::Use> = engine.module().functions[func].uses_of(value).into_iter().collect();
        let mut field_ty = self.field_ty;
        for u in uses {
            if engine.is_assumed_dead_instruction(func, u.inst) {
                continue;
            }
            let inst = &engine.module().functions[func].insts[u.inst];
            let observed = match (&inst.opcode, u.index) {
                (Opcode::Load, 0) => inst.result.map(|r| engine.module().functions[func].value_type(r)),
                (Opcode::Store, 0) => Some(engine.module().functions[func].value_type(inst.operands[1])),
                _ => return self.state.indicate_pessimistic_fixpoint(),
            };
            match (field_ty, observed) {
                (None, Some(ty)) => field_ty = Some(ty),
                (Some(existing), Some(ty)) if existing == ty => {}
                (Some(_), Some(_)) => return self.state.indicate_pessimistic_fixpoint(),
                (_, None) => return self.state.indicate_pessimistic_fixpoint(),
            }
        }

        let Some(settled_ty) = field_ty else {
            self.field_ty = None;
            return ChangeResult::Unchanged;
        };

        // §4.4's call-site precondition: wherever a caller already passes a
        // stack allocation at this argument index, it must allocate exactly
        // one `settled_ty`-sized field, matching the single type every
        // load/store inside the callee agreed on; a mismatched allocation
        // disqualifies the whole argument rather than only that call site.
        for (caller, f) in engine.module().functions() {
            for (call_inst, inst) in f.call_sites() {
                if engine.is_assumed_dead_instruction(caller, call_inst) {
                    continue;
                }
                if !matches!(inst.call_target(), Some(attributor_ir::CallTarget::Direct(callee)) if callee == func) {
                    continue;
                }
                let operand = inst.operands[idx as usize];
                if let ValueKind::InstResult(alloca_inst) = f.values[operand].kind {
                    if let Opcode::Alloca { size } = f.insts[alloca_inst].opcode {
                        if size != scalar_byte_size(settled_ty) {
                            return self.state.indicate_pessimistic_fixpoint();
                        }
                    }
                }
            }
        }

        self.field_ty = Some(settled_ty);
        self.state.indicate_optimistic_fixpoint();
        ChangeResult::Changed
    }

    fn manifest(&self, engine: &Engine, edits: &mut EditQueue) {
        if !*self.state.known() {
            return;
        }
        let Some((func, idx)) = self.func_and_index() else { return };
        let Some(field_ty) = self.field_ty else { return };

        let mut call_sites = Vec::new();
        for (caller, f) in engine.module().functions() {
            for (call_inst, inst) in f.call_sites() {
                if matches!(inst.call_target(), Some(attributor_ir::CallTarget::Direct(callee)) if callee == func) {
                    call_sites.push((caller, call_inst));
                }
            }
        }
        edits.rewrite_privatized_argument(func, idx, call_sites, field_ty);
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
