//! Mutating operations the rewriter (C6) needs from the IR: replacing uses,
//! erasing dead instructions, and splitting blocks to host a manifested
//! allocation. These sit alongside the read-only helpers already exposed
//! directly on [`Function`] (§6.1's façade is this crate's public surface as
//! a whole, not a single trait — `attributor-analysis` depends on these
//! types the same way a concrete pass depends on a concrete IR crate).

use smallvec::SmallVec;

use crate::{
    entities::{BlockId, InstId, ValueId},
    function::Function,
    inst::Opcode,
};

/// `true` if dereferencing a null pointer is undefined behavior for this IR.
/// Some source languages (famously, parts of the Linux kernel, compiled with
/// `-fno-delete-null-pointer-checks`) define it instead; since this reference
/// IR doesn't model that knob, it is always undefined here.
pub fn null_pointer_is_defined(_func: &Function) -> bool {
    false
}

/// Replaces every use of `old` with `new` across `func`, including `old`
/// itself as a return value. Returns the number of operands rewritten.
pub fn replace_all_uses_with(func: &mut Function, old: ValueId, new: ValueId) -> usize {
    let mut count = 0;
    for (_, inst) in func.insts.iter_mut() {
        for operand in inst.operands.iter_mut() {
            if *operand == old {
                *operand = new;
                count += 1;
            }
        }
    }
    count
}

/// Removes `inst` from its block's layout and from the instruction arena's
/// logical membership. The slot in the arena is left tombstoned (its key is
/// never reused) rather than compacted, since [`crate::entities::InstId`]s
/// may still be held by in-flight dependency-graph edges.
pub fn erase_instruction(func: &mut Function, inst: InstId) {
    let block = func.insts[inst].block;
    func.blocks[block].insts.retain(|&i| i != inst);
}

/// Inserts `inst` immediately before `before` in `before`'s block, returning
/// the new instruction's id (and result value, if any).
pub fn insert_before(
    func: &mut Function,
    before: InstId,
    opcode: Opcode,
    operands: impl IntoIterator<Item = ValueId>,
    result_ty: Option<crate::types::Type>,
) -> (InstId, Option<ValueId>) {
    let block = func.insts[before].block;
    let id = func.insts.next_key();
    let result = result_ty.map(|ty| {
        func.values
            .push(crate::value::ValueData::new(ty, crate::value::ValueKind::InstResult(id)))
    });
    let mut inst = crate::inst::Instruction::new(block, opcode, operands);
    inst.result = result;
    let id = func.insts.push(inst);

    let bb = &mut func.blocks[block];
    let pos = bb.insts.iter().position(|&i| i == before).expect("before belongs to its block");
    bb.insts.insert(pos, id);
    (id, result)
}

/// Splits `block` right before `at`, moving `at` and everything after it
/// into a freshly created successor block, and leaving an unconditional
/// jump from `block` to that successor. Used by the `heap-to-stack`
/// manifest step to carve out room for a stack allocation ahead of a
/// `malloc`-like call (§4.4).
pub fn split_block(func: &mut Function, block: BlockId, at: InstId) -> BlockId {
    let pos = func.blocks[block]
        .insts
        .iter()
        .position(|&i| i == at)
        .expect("split point belongs to the given block");
    let tail: SmallVec<[InstId; 8]> = func.blocks[block].insts[pos..].iter().copied().collect();
    func.blocks[block].insts.truncate(pos);

    let new_block = func.blocks.push(crate::block::BasicBlock::default());
    for &inst in &tail {
        func.insts[inst].block = new_block;
        func.blocks[new_block].insts.push(inst);
    }
    let insert_at = func
        .layout
        .iter()
        .position(|&b| b == block)
        .expect("block belongs to the function layout");
    func.layout.insert(insert_at + 1, new_block);

    let (_, _) = func.push_inst(
        block,
        crate::inst::Instruction::new(block, Opcode::Jump(new_block), SmallVec::<[ValueId; 4]>::new()),
        None,
    );
    new_block
}
