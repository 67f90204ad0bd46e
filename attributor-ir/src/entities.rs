use cranelift_entity::entity_impl;

/// A function defined (or declared) in a [`crate::Module`].
///
/// Identity is by arena index rather than by pointer, per the "arena + index,
/// never owning pointer chains" guidance for cyclic/graph-shaped IR data: a
/// `FuncId` is `Copy`, hashable, and stable for the lifetime of the owning
/// [`crate::Module`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FuncId(u32);
entity_impl!(FuncId, "fn");

/// A basic block within a function's body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(u32);
entity_impl!(BlockId, "block");

/// An instruction within a basic block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstId(u32);
entity_impl!(InstId, "inst");

/// An SSA value: a function argument, an instruction result, or a constant.
///
/// Every [`crate::value::ValueData`] lives in the arena of the function that
/// defines it, so a `ValueId` is only meaningful alongside the [`FuncId`] of
/// its owning [`crate::function::Function`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ValueId(u32);
entity_impl!(ValueId, "v");

/// Identifies a specific use operand of an instruction: the `index`th operand
/// of `inst`. Distinct from a [`ValueId`] because the same value can be used
/// by many instructions (and the same instruction more than once).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Use {
    pub inst: InstId,
    pub index: u32,
}

impl Use {
    pub const fn new(inst: InstId, index: u32) -> Self {
        Self { inst, index }
    }
}
