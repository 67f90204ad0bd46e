use smallvec::SmallVec;

use crate::{
    attribute::AttributeSet,
    entities::{BlockId, FuncId, InstId, ValueId},
};

/// The callee of a [`Opcode::Call`]/[`Opcode::Invoke`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallTarget {
    Direct(FuncId),
    /// The callee is itself a value (a function pointer); the "indirect call
    /// with unknown callee" case the framework conservatively abstains on
    /// (§1 Non-goals).
    Indirect(ValueId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ICmpPredicate {
    Eq,
    Ne,
    Ult,
    Ule,
    Ugt,
    Uge,
    Slt,
    Sle,
    Sgt,
    Sge,
}

/// The operation an [`Instruction`] performs.
///
/// Operand-carrying variants reference their operands by position in
/// [`Instruction::operands`] rather than embedding [`ValueId`]s directly,
/// keeping a clean separation between the opcode tag and its operand list;
/// variants only embed data that is *not* itself a use (block targets,
/// immediate predicates, call target).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Opcode {
    /// operand 0, operand 1
    Add,
    Sub,
    Mul,
    /// operand 0 `cmp` operand 1
    ICmp(ICmpPredicate),
    /// operand 0 = pointer
    Load,
    /// operand 0 = pointer, operand 1 = stored value
    Store,
    /// A stack allocation of `size` bytes (`heap-to-stack` manifest target).
    Alloca { size: u64 },
    /// operand 0 = base pointer; `offset` is a compile-time-constant byte
    /// offset (keeps dereferenceable/alignment reasoning in this minimal IR
    /// a closed-form GCD/subtraction instead of full symbolic GEP indexing).
    GetElementPtr { offset: i64 },
    /// operand 0 = value being cast (pointer bit casts only, in this IR).
    BitCast,
    /// A heap allocation recognized by name (`malloc`, `calloc`,
    /// `aligned_alloc`); `size` is `None` when the size is not a compile-time
    /// constant.
    MallocLike { kind: MallocKind, size: Option<u64> },
    /// operand 0 = pointer being freed.
    FreeLike,
    Call { callee: CallTarget },
    /// Like `Call`, but has `normal`/`unwind` successors.
    Invoke {
        callee: CallTarget,
        normal: BlockId,
        unwind: BlockId,
    },
    /// operand 0 = return value, if any (void returns carry no operand).
    Return,
    Jump(BlockId),
    /// operand 0 = condition.
    CondBranch { then_blk: BlockId, else_blk: BlockId },
    /// operand 0 = scrutinee.
    Switch {
        default: BlockId,
        cases: SmallVec<[(i64, BlockId); 4]>,
    },
    /// `incoming[i] = (predecessor, operands[i])`.
    Phi { incoming: SmallVec<[BlockId; 4]> },
    /// operand 0 = condition, operand 1 = true value, operand 2 = false value.
    Select,
    Unreachable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MallocKind {
    Malloc,
    Calloc,
    AlignedAlloc,
}

#[derive(Debug, Clone)]
pub struct Instruction {
    pub block: BlockId,
    pub opcode: Opcode,
    pub operands: SmallVec<[ValueId; 4]>,
    /// `None` for void-typed instructions (`store`, `ret`, branches, ...).
    pub result: Option<ValueId>,
    /// Attributes attached directly to this instruction: for a call site,
    /// this is the call's own attribute set (§3.1 `CallSite`); for the
    /// return-carrying variants, attributes of the returned value live on
    /// `result`'s position instead.
    pub attrs: AttributeSet,
    /// Per-call-argument attribute overrides, parallel to `operands` for
    /// `Call`/`Invoke`; empty for all other opcodes.
    pub arg_attrs: SmallVec<[AttributeSet; 4]>,
}

impl Instruction {
    pub fn new(block: BlockId, opcode: Opcode, operands: impl IntoIterator<Item = ValueId>) -> Self {
        Self {
            block,
            opcode,
            operands: operands.into_iter().collect(),
            result: None,
            attrs: AttributeSet::new(),
            arg_attrs: SmallVec::new(),
        }
    }

    pub fn with_result(mut self, result: ValueId) -> Self {
        self.result = Some(result);
        self
    }

    #[inline]
    pub fn is_call_like(&self) -> bool {
        matches!(self.opcode, Opcode::Call { .. } | Opcode::Invoke { .. })
    }

    #[inline]
    pub fn is_terminator(&self) -> bool {
        matches!(
            self.opcode,
            Opcode::Return
                | Opcode::Jump(_)
                | Opcode::CondBranch { .. }
                | Opcode::Switch { .. }
                | Opcode::Invoke { .. }
                | Opcode::Unreachable
        )
    }

    pub fn call_target(&self) -> Option<CallTarget> {
        match self.opcode {
            Opcode::Call { callee } | Opcode::Invoke { callee, .. } => Some(callee),
            _ => None,
        }
    }

    /// Successor blocks of this instruction if it is a terminator, in the
    /// order the IR rewriter processes them.
    pub fn successors(&self) -> SmallVec<[BlockId; 4]> {
        match &self.opcode {
            Opcode::Jump(target) => SmallVec::from_slice(&[*target]),
            Opcode::CondBranch { then_blk, else_blk } => SmallVec::from_slice(&[*then_blk, *else_blk]),
            Opcode::Switch { default, cases } => {
                let mut succs = SmallVec::from_slice(&[*default]);
                succs.extend(cases.iter().map(|(_, target)| *target));
                succs
            }
            Opcode::Invoke { normal, unwind, .. } => SmallVec::from_slice(&[*normal, *unwind]),
            _ => SmallVec::new(),
        }
    }
}
