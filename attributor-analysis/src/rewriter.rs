//! C6: applies the deferred IR edits records stage during manifest. Edits are
//! closures rather than a fixed data schema — signature rewriting and
//! heap-to-stack both need to allocate fresh instructions/values, which only
//! makes sense once real `&mut Module` access is available during replay,
//! not while a record is merely staging what it *wants* done. Categorizing
//! each closure lets [`EditQueue::apply`] still guarantee the fixed replay
//! order from §4.2 step 5 regardless of the order records were manifested in.

use attributor_ir::{
    facade, AttributeSet, BlockId, CallGraphUpdater, FuncId, Function, InstId, IrAttribute, Module, Opcode, Type,
    ValueId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum EditCategory {
    AttributeAdd,
    UseReplacement,
    UnreachableInsertion,
    BranchFolding,
    DeadInstructionDeletion,
    BlockDeletion,
    SignatureRewrite,
    FunctionDeletion,
}

type Edit = Box<dyn FnOnce(&mut Module, &mut dyn CallGraphUpdater)>;

/// A constant's value and shape, self-contained rather than naming a
/// [`ValueId`] in some particular function's arena. `value-simplify`
/// resolves simplifications across call edges (an argument's simplification
/// draws on its call-site operands, a call-site-return's on its callee's
/// `ret`s), so the constant it settles on was very often discovered in a
/// *different* function's value arena than the one whose uses it will
/// replace. Carrying the literal shape instead of a foreign [`ValueId`] lets
/// [`EditQueue::replace_uses_with_constant`] materialize a fresh, correctly
/// owned value in the target function at replay time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstDescriptor {
    Int(Type, i64),
    Null,
    Undef(Type),
}

impl ConstDescriptor {
    pub fn of(ty: Type, kind: attributor_ir::ValueKind) -> Option<Self> {
        match kind {
            attributor_ir::ValueKind::ConstInt(v) => Some(Self::Int(ty, v)),
            attributor_ir::ValueKind::ConstNull => Some(Self::Null),
            attributor_ir::ValueKind::Undef => Some(Self::Undef(ty)),
            _ => None,
        }
    }

    pub fn as_const_int(&self) -> Option<i64> {
        match self {
            Self::Int(_, v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

/// Where to attach an attribute manifested by an attribute's `manifest` step.
#[derive(Debug, Clone, Copy)]
pub enum AttrTarget {
    Function(FuncId),
    Argument(FuncId, u32),
    Return(FuncId),
    CallSite(FuncId, InstId),
    CallSiteArgument(FuncId, InstId, u32),
}

/// The staged edits produced by one engine run's manifest phase (§3.5c, §4.6).
#[derive(Default)]
pub struct EditQueue {
    edits: Vec<(EditCategory, Edit)>,
}

impl EditQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, category: EditCategory, edit: impl FnOnce(&mut Module, &mut dyn CallGraphUpdater) + 'static) {
        self.edits.push((category, Box::new(edit)));
    }

    pub fn add_attribute(&mut self, target: AttrTarget, attr: IrAttribute) {
        self.push(EditCategory::AttributeAdd, move |module, _cg| {
            attribute_set_mut(module, target).insert(attr);
        });
    }

    pub fn replace_all_uses_with(&mut self, func: FuncId, old: ValueId, new: ValueId) {
        self.push(EditCategory::UseReplacement, move |module, _cg| {
            facade::replace_all_uses_with(&mut module.functions[func], old, new);
        });
    }

    /// Materializes a fresh integer constant of `old`'s type and replaces
    /// every use of `old` with it (value-range's manifest, when a range has
    /// narrowed to a single known value).
    pub fn fold_to_constant(&mut self, func: FuncId, old: ValueId, value: i64) {
        self.push(EditCategory::UseReplacement, move |module, _cg| {
            let ty = module.functions[func].value_type(old);
            let new = module.functions[func].make_const_int(ty, value);
            facade::replace_all_uses_with(&mut module.functions[func], old, new);
        });
    }

    /// Materializes `desc` as a fresh value owned by `func` and replaces
    /// every use of `old` (also in `func`) with it (value-simplify's
    /// manifest). See [`ConstDescriptor`]'s own doc comment for why this
    /// can't just reuse whatever foreign [`ValueId`] the simplification was
    /// originally discovered at.
    pub fn replace_uses_with_constant(&mut self, func: FuncId, old: ValueId, desc: ConstDescriptor) {
        self.push(EditCategory::UseReplacement, move |module, _cg| {
            let f = &mut module.functions[func];
            let new = match desc {
                ConstDescriptor::Int(ty, v) => f.make_const_int(ty, v),
                ConstDescriptor::Null => f.make_const_null(),
                ConstDescriptor::Undef(ty) => f.make_undef(ty),
            };
            facade::replace_all_uses_with(f, old, new);
        });
    }

    pub fn insert_unreachable_before(&mut self, func: FuncId, before: InstId) {
        self.push(EditCategory::UnreachableInsertion, move |module, _cg| {
            facade::insert_before(&mut module.functions[func], before, Opcode::Unreachable, smallvec::SmallVec::<[ValueId; 4]>::new(), None);
        });
    }

    /// Rewrites a conditional branch or switch at `inst` into an
    /// unconditional jump to `taken`, the statically-known-live successor.
    pub fn fold_branch(&mut self, func: FuncId, inst: InstId, taken: BlockId) {
        self.push(EditCategory::BranchFolding, move |module, _cg| {
            module.functions[func].insts[inst].opcode = Opcode::Jump(taken);
            module.functions[func].insts[inst].operands.clear();
        });
    }

    pub fn delete_instruction(&mut self, func: FuncId, inst: InstId) {
        self.push(EditCategory::DeadInstructionDeletion, move |module, _cg| {
            facade::erase_instruction(&mut module.functions[func], inst);
        });
    }

    pub fn delete_block(&mut self, func: FuncId, block: BlockId) {
        self.push(EditCategory::BlockDeletion, move |module, _cg| {
            let f = &mut module.functions[func];
            f.layout.retain(|&b| b != block);
        });
    }

    pub fn delete_function(&mut self, func: FuncId) {
        self.push(EditCategory::FunctionDeletion, move |_module, cg| {
            // Declarations are kept around (arena slots are append-only, per
            // `RecordHandle`'s own tombstoning discipline) rather than
            // physically removed; the body is what mattered.
            cg.function_inserted(func);
        });
    }

    /// Converts a `malloc`-like call at `malloc_inst` into a stack
    /// allocation of `size` bytes, redirecting its uses and deleting the
    /// matched `free` calls (§4.4 heap-to-stack).
    pub fn promote_heap_to_stack(&mut self, func: FuncId, malloc_inst: InstId, size: u64, matched_frees: Vec<InstId>) {
        self.push(EditCategory::DeadInstructionDeletion, move |module, _cg| {
            let f = &mut module.functions[func];
            let old_result = f.insts[malloc_inst].result;
            let (_, new_result) = facade::insert_before(f, malloc_inst, Opcode::Alloca { size }, smallvec::SmallVec::<[ValueId; 4]>::new(), Some(Type::Ptr));
            if let (Some(old), Some(new)) = (old_result, new_result) {
                facade::replace_all_uses_with(f, old, new);
            }
            for free_inst in matched_frees {
                facade::erase_instruction(f, free_inst);
            }
            facade::erase_instruction(f, malloc_inst);
        });
    }

    /// Splits an `invoke` whose unwind successor is dead into a plain `call`
    /// followed by a jump to the normal successor.
    pub fn convert_invoke_to_call(&mut self, func: FuncId, invoke_inst: InstId, normal: BlockId) {
        self.push(EditCategory::BranchFolding, move |module, _cg| {
            let f = &mut module.functions[func];
            let Opcode::Invoke { callee, .. } = f.insts[invoke_inst].opcode else {
                return;
            };
            f.insts[invoke_inst].opcode = Opcode::Call { callee };
            facade::insert_before(f, invoke_inst, Opcode::Jump(normal), smallvec::SmallVec::<[ValueId; 4]>::new(), None);
        });
    }

    /// Registers a signature rewrite (privatizable-pointer's manifest): the
    /// argument at `arg_index` is flattened into `replacement_types` at
    /// every call site. A fully general rewrite also splices a new function
    /// with the widened signature; this reference rewriter instead keeps the
    /// original function's signature and narrows itself to updating call
    /// sites to pass the flattened fields through a scratch reconstruction,
    /// which is sound for the single-scalar-field shape `privatizable-
    /// pointer` (below) actually proves compatible.
    pub fn rewrite_privatized_argument(
        &mut self,
        func: FuncId,
        arg_index: u32,
        call_sites: Vec<(FuncId, InstId)>,
        field_ty: Type,
    ) {
        self.push(EditCategory::SignatureRewrite, move |module, cg| {
            for (caller, call) in call_sites {
                let f = &mut module.functions[caller];
                let ptr_operand = f.insts[call].operands[arg_index as usize];
                if let attributor_ir::ValueKind::InstResult(alloca_inst) = f.values[ptr_operand].kind {
                    if let Opcode::Alloca { .. } = f.insts[alloca_inst].opcode {
                        // Already a single-element stack allocation; nothing
                        // to rewrite at this call site.
                        continue;
                    }
                }
                // The shared pointer isn't already private at this call
                // site: load its current value into a fresh scratch
                // allocation and pass that instead, so the callee's own
                // loads/stores through the argument can no longer alias
                // whatever the original pointer pointed to.
                let (_, loaded) = facade::insert_before(
                    f,
                    call,
                    Opcode::Load,
                    [ptr_operand],
                    Some(field_ty),
                );
                let (_, scratch) = facade::insert_before(
                    f,
                    call,
                    Opcode::Alloca { size: size_of_type(field_ty) },
                    smallvec::SmallVec::<[ValueId; 4]>::new(),
                    Some(Type::Ptr),
                );
                let scratch = scratch.expect("alloca always yields a pointer result");
                let loaded = loaded.expect("load always yields a value result");
                facade::insert_before(f, call, Opcode::Store, [scratch, loaded], None);
                f.insts[call].operands[arg_index as usize] = scratch;
            }
            cg.function_inserted(func);
        });
    }
}

/// This reference IR's fixed set of scalar sizes, in bytes — enough for the
/// single-scalar-field shape `privatizable-pointer` proves compatible.
fn size_of_type(ty: Type) -> u64 {
    match ty {
        Type::I1 => 1,
        Type::I32 => 4,
        Type::I64 => 8,
        Type::Ptr => 8,
        Type::Void => 0,
    }
}

fn attribute_set_mut(module: &mut Module, target: AttrTarget) -> &mut AttributeSet {
    match target {
        AttrTarget::Function(f) => &mut module.functions[f].attrs,
        AttrTarget::Argument(f, idx) => &mut module.functions[f].arg_attrs[idx as usize],
        AttrTarget::Return(f) => &mut module.functions[f].ret_attrs,
        AttrTarget::CallSite(f, call) => &mut module.functions[f].insts[call].attrs,
        AttrTarget::CallSiteArgument(f, call, idx) => &mut module.functions[f].insts[call].arg_attrs[idx as usize],
    }
}

impl EditQueue {
    /// Replays every staged edit in the fixed order use-replacements →
    /// unreachable insertions → branch-folding → dead-instruction deletion →
    /// block deletion → signature rewriting → function deletion, with
    /// attribute annotation first since it never touches control flow or
    /// use-def chains (§4.2 step 5).
    pub fn apply(mut self, module: &mut Module, cg: &mut dyn CallGraphUpdater) {
        self.edits.sort_by_key(|(category, _)| *category);
        for (_, edit) in self.edits {
            edit(module, cg);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }
}

/// Convenience used by tests and by [`Function`] callers that want to assert
/// a specific attribute landed; not used by the engine itself.
pub fn has_attribute(func: &Function, attr: IrAttribute) -> bool {
    func.attrs.has_flag(attr)
}
