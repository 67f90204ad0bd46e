use cranelift_entity::PrimaryMap;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::{
    attribute::AttributeSet,
    block::BasicBlock,
    entities::{BlockId, FuncId, InstId, Use, ValueId},
    inst::{Instruction, Opcode},
    types::Type,
    value::{ValueData, ValueKind},
};

/// A function definition: a set of basic blocks in layout order, plus the
/// value and instruction arenas backing them.
///
/// Per-position attributes (§3.1 `Function`/`Argument`/`Returned`) live here
/// directly rather than in a side table, since every position but the call
/// site ones is scoped to exactly one function.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub param_types: Vec<Type>,
    pub ret_ty: Option<Type>,
    /// `None` for a declaration with no body.
    pub entry: Option<BlockId>,
    pub layout: Vec<BlockId>,
    pub blocks: PrimaryMap<BlockId, BasicBlock>,
    pub insts: PrimaryMap<InstId, Instruction>,
    pub values: PrimaryMap<ValueId, ValueData>,
    pub params: Vec<ValueId>,
    pub attrs: AttributeSet,
    pub arg_attrs: Vec<AttributeSet>,
    pub ret_attrs: AttributeSet,
}

impl Function {
    pub fn new(name: impl Into<String>, param_types: Vec<Type>, ret_ty: Option<Type>) -> Self {
        let mut values = PrimaryMap::new();
        let params = param_types
            .iter()
            .enumerate()
            .map(|(idx, ty)| values.push(ValueData::new(*ty, ValueKind::Argument(idx as u32))))
            .collect::<Vec<_>>();
        let arg_attrs = vec![AttributeSet::new(); param_types.len()];
        Self {
            name: name.into(),
            param_types,
            ret_ty,
            entry: None,
            layout: Vec::new(),
            blocks: PrimaryMap::new(),
            insts: PrimaryMap::new(),
            values,
            params,
            attrs: AttributeSet::new(),
            arg_attrs,
            ret_attrs: AttributeSet::new(),
        }
    }

    #[inline]
    pub fn is_declaration(&self) -> bool {
        self.entry.is_none()
    }

    #[inline]
    pub fn num_args(&self) -> usize {
        self.params.len()
    }

    pub fn create_block(&mut self) -> BlockId {
        let id = self.blocks.push(BasicBlock::default());
        self.layout.push(id);
        if self.entry.is_none() {
            self.entry = Some(id);
        }
        id
    }

    pub fn make_const_int(&mut self, ty: Type, value: i64) -> ValueId {
        self.values.push(ValueData::new(ty, ValueKind::ConstInt(value)))
    }

    pub fn make_const_null(&mut self) -> ValueId {
        self.values.push(ValueData::new(Type::Ptr, ValueKind::ConstNull))
    }

    pub fn make_undef(&mut self, ty: Type) -> ValueId {
        self.values.push(ValueData::new(ty, ValueKind::Undef))
    }

    /// Append `inst` to `block`, allocating a result value of type `ty` (if
    /// given) and returning `(inst_id, result_value)`.
    pub fn push_inst(&mut self, block: BlockId, inst: Instruction, result_ty: Option<Type>) -> (InstId, Option<ValueId>) {
        let id = self.insts.next_key();
        let result = result_ty.map(|ty| self.values.push(ValueData::new(ty, ValueKind::InstResult(id))));
        let mut inst = inst;
        inst.result = result;
        let id = self.insts.push(inst);
        self.blocks[block].push(id);
        (id, result)
    }

    pub fn value_type(&self, value: ValueId) -> Type {
        self.values[value].ty
    }

    pub fn arg_value(&self, index: usize) -> ValueId {
        self.params[index]
    }

    /// All uses of `value` within this function, found by scanning every
    /// instruction's operand list. Acceptable for this reference IR's scale;
    /// a production façade would maintain incremental use-def chains instead.
    pub fn uses_of(&self, value: ValueId) -> SmallVec<[Use; 4]> {
        let mut uses = SmallVec::new();
        for (inst_id, inst) in self.insts.iter() {
            for (index, operand) in inst.operands.iter().enumerate() {
                if *operand == value {
                    uses.push(Use::new(inst_id, index as u32));
                }
            }
        }
        uses
    }

    pub fn returned_values(&self) -> SmallVec<[(InstId, ValueId); 4]> {
        let mut out = SmallVec::new();
        for (inst_id, inst) in self.insts.iter() {
            if matches!(inst.opcode, Opcode::Return) {
                if let Some(value) = inst.operands.first() {
                    out.push((inst_id, *value));
                }
            }
        }
        out
    }

    pub fn instructions(&self) -> impl Iterator<Item = (InstId, &Instruction)> {
        self.layout.iter().flat_map(move |block| {
            self.blocks[*block]
                .insts
                .iter()
                .map(move |inst_id| (*inst_id, &self.insts[*inst_id]))
        })
    }

    pub fn call_sites(&self) -> impl Iterator<Item = (InstId, &Instruction)> {
        self.instructions().filter(|(_, inst)| inst.is_call_like())
    }

    pub fn predecessors(&self) -> FxHashMap<BlockId, SmallVec<[BlockId; 4]>> {
        let mut preds: FxHashMap<BlockId, SmallVec<[BlockId; 4]>> = FxHashMap::default();
        for block in &self.layout {
            preds.entry(*block).or_default();
        }
        for block in &self.layout {
            if let Some(term) = self.blocks[*block].insts.last() {
                for succ in self.insts[*term].successors() {
                    preds.entry(succ).or_default().push(*block);
                }
            }
        }
        preds
    }
}
