use smallvec::SmallVec;

use crate::entities::InstId;

#[derive(Debug, Clone, Default)]
pub struct BasicBlock {
    /// Instructions in program order; the last one is the terminator once the
    /// block is well-formed.
    pub insts: SmallVec<[InstId; 8]>,
}

impl BasicBlock {
    pub fn push(&mut self, inst: InstId) {
        self.insts.push(inst);
    }
}
