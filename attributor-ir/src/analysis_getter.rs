//! The pre-existing, host-computed analyses the engine consults but never
//! computes itself (§6.2). These are genuinely external collaborators: a real
//! host compiler already has a dominator tree, a loop analysis, an alias
//! analysis, etc., computed and cached for other passes. `AnalysisGetter` is
//! the interface boundary; [`BasicAnalysisCache`] is a minimal, from-scratch
//! implementation good enough to drive this workspace's own tests, the way
//! `attributor-ir`'s [`crate::Module`] stands in for a production IR.

use std::collections::VecDeque;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::{
    entities::{BlockId, FuncId, InstId, ValueId},
    function::Function,
    inst::Opcode,
    module::Module,
};

/// Per-function dominator relation, computed by the standard iterative
/// data-flow algorithm (Cooper, Harvey & Kennedy) rather than the
/// Lengauer-Tarjan algorithm a production compiler would use — this is a
/// reference implementation, not a performance-sensitive one.
#[derive(Debug, Clone, Default)]
pub struct DominatorTree {
    idom: FxHashMap<BlockId, BlockId>,
}

impl DominatorTree {
    pub fn compute(func: &Function) -> Self {
        let Some(entry) = func.entry else {
            return Self::default();
        };
        let preds = func.predecessors();
        let order = &func.layout;
        let index_of: FxHashMap<BlockId, usize> =
            order.iter().enumerate().map(|(i, b)| (*b, i)).collect();

        let mut idom: FxHashMap<BlockId, BlockId> = FxHashMap::default();
        idom.insert(entry, entry);

        let mut changed = true;
        while changed {
            changed = false;
            for &block in order.iter() {
                if block == entry {
                    continue;
                }
                let mut new_idom: Option<BlockId> = None;
                for pred in preds.get(&block).into_iter().flatten() {
                    if !idom.contains_key(pred) {
                        continue;
                    }
                    new_idom = Some(match new_idom {
                        None => *pred,
                        Some(cur) => intersect(&idom, &index_of, order, cur, *pred),
                    });
                }
                if let Some(new_idom) = new_idom {
                    if idom.get(&block) != Some(&new_idom) {
                        idom.insert(block, new_idom);
                        changed = true;
                    }
                }
            }
        }

        Self { idom }
    }

    /// `true` if `a` dominates `b` (reflexive: a block dominates itself).
    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        let mut cur = b;
        loop {
            if cur == a {
                return true;
            }
            match self.idom.get(&cur) {
                Some(&idom) if idom != cur => cur = idom,
                _ => return cur == a,
            }
        }
    }
}

fn intersect(
    idom: &FxHashMap<BlockId, BlockId>,
    index_of: &FxHashMap<BlockId, usize>,
    order: &[BlockId],
    mut a: BlockId,
    mut b: BlockId,
) -> BlockId {
    while a != b {
        while index_of[&a] > index_of[&b] {
            a = idom[&a];
        }
        while index_of[&b] > index_of[&a] {
            b = idom[&b];
        }
    }
    let _ = order;
    a
}

/// Natural loops, detected from CFG back-edges (an edge `n -> h` where `h`
/// dominates `n`). No trip-count reasoning is attempted: any detected loop is
/// conservatively "possibly unbounded", which is sufficient for the
/// `will-return` attribute's needs (§4.4).
#[derive(Debug, Clone, Default)]
pub struct LoopInfo {
    pub headers: SmallVec<[BlockId; 4]>,
}

impl LoopInfo {
    pub fn compute(func: &Function, doms: &DominatorTree) -> Self {
        let mut headers = SmallVec::new();
        let preds = func.predecessors();
        for (&block, block_preds) in preds.iter() {
            for &pred in block_preds {
                if doms.dominates(block, pred) && !headers.contains(&block) {
                    headers.push(block);
                }
            }
        }
        Self { headers }
    }

    #[inline]
    pub fn has_loop(&self) -> bool {
        !self.headers.is_empty()
    }
}

/// A single instruction proven to execute whenever `from` does, yielded by
/// [`walk_must_be_executed_context`].
pub struct MustExecuteStep {
    pub inst: InstId,
}

/// Returns the instructions that provably execute whenever `from` does,
/// walking forward along the unique-successor chain.
///
/// This is deliberately conservative relative to a production
/// must-be-executed-context analysis (which also reasons about explicit
/// branches whose condition is statically known, and about loop bodies known
/// to run at least once): as soon as a block has more than one live
/// successor, or ends in a call to a function not known `willreturn`, the
/// walk stops. That is always a sound (if less precise) approximation, per
/// §7's "missing analysis" degrade-gracefully rule.
pub fn walk_must_be_executed_context(func: &Function, from: InstId) -> Vec<MustExecuteStep> {
    let mut steps = Vec::new();
    let inst = &func.insts[from];
    let block = inst.block;
    let idx_in_block = func.blocks[block]
        .insts
        .iter()
        .position(|i| *i == from)
        .expect("instruction belongs to its recorded block");

    let mut cursor_block = block;
    let mut cursor_idx = idx_in_block + 1;
    loop {
        let bb = &func.blocks[cursor_block];
        if cursor_idx < bb.insts.len() {
            let next = bb.insts[cursor_idx];
            steps.push(MustExecuteStep { inst: next });
            if matches!(func.insts[next].opcode, Opcode::Call { .. }) {
                // Conservative: do not walk past a call without knowing it
                // always returns; the caller re-derives this via no-return.
                break;
            }
            cursor_idx += 1;
            continue;
        }

        // End of block: only continue if there is exactly one successor.
        let Some(term) = bb.insts.last() else { break };
        let succs = func.insts[*term].successors();
        if succs.len() != 1 {
            break;
        }
        cursor_block = succs[0];
        cursor_idx = 0;
    }

    steps
}

/// Conservative pointer-origin tracing used by alias-analysis queries (no
/// attempt at field sensitivity or escape analysis beyond what `no-alias`
/// and `no-capture` already do themselves).
pub fn may_alias(func: &Function, a: ValueId, b: ValueId) -> bool {
    if a == b {
        return true;
    }
    match (trace_origin(func, a), trace_origin(func, b)) {
        (Some(oa), Some(ob)) => oa == ob,
        _ => true,
    }
}

fn trace_origin(func: &Function, mut value: ValueId) -> Option<ValueId> {
    let mut guard = 0usize;
    loop {
        guard += 1;
        if guard > 64 {
            return None;
        }
        let data = &func.values[value];
        match data.kind {
            crate::value::ValueKind::InstResult(inst) => {
                let inst = &func.insts[inst];
                match inst.opcode {
                    Opcode::GetElementPtr { .. } | Opcode::BitCast => {
                        value = inst.operands[0];
                        continue;
                    }
                    Opcode::Alloca { .. } | Opcode::MallocLike { .. } => return Some(value),
                    _ => return None,
                }
            }
            crate::value::ValueKind::Argument(_) => return Some(value),
            crate::value::ValueKind::ConstNull => return None,
            _ => return None,
        }
    }
}

/// A simple worklist of `(start, end)` pairs still reachable from a root;
/// exposed mainly so `attributor-analysis`'s reachability attribute (§4.4,
/// supplemented per `SPEC_FULL.md` §2) has something concrete to call.
pub fn blocks_reachable_from(func: &Function, root: BlockId) -> SmallVec<[BlockId; 8]> {
    let mut seen = SmallVec::<[BlockId; 8]>::new();
    let mut queue = VecDeque::new();
    queue.push_back(root);
    seen.push(root);
    while let Some(block) = queue.pop_front() {
        if let Some(term) = func.blocks[block].insts.last() {
            for succ in func.insts[*term].successors() {
                if !seen.contains(&succ) {
                    seen.push(succ);
                    queue.push_back(succ);
                }
            }
        }
    }
    seen
}

/// The `§6.2` interface boundary: per-function lazy access to pre-existing
/// analyses. `attributor-analysis` depends only on this trait, never on
/// [`BasicAnalysisCache`] directly, so a host embedder can substitute its own
/// (presumably much faster, and much more precise) implementations.
pub trait AnalysisGetter {
    fn dominator_tree(&self, func: FuncId) -> &DominatorTree;
    fn loop_info(&self, func: FuncId) -> &LoopInfo;
}

/// A from-scratch implementation of [`AnalysisGetter`] that computes
/// everything on first request and caches it for the lifetime of the run.
///
/// Entries are boxed so a cached reference stays valid even as the backing
/// map rehashes: `dominator_tree`/`loop_info` hand back a reference borrowed
/// from `&self`, not from the short-lived `RefCell` guard.
#[derive(Default)]
pub struct BasicAnalysisCache {
    doms: std::cell::RefCell<FxHashMap<FuncId, Box<DominatorTree>>>,
    loops: std::cell::RefCell<FxHashMap<FuncId, Box<LoopInfo>>>,
}

impl BasicAnalysisCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prime(&self, module: &Module, func: FuncId) {
        let f = &module.functions[func];
        if f.is_declaration() {
            return;
        }
        if self.doms.borrow().contains_key(&func) {
            return;
        }
        let doms = Box::new(DominatorTree::compute(f));
        let loops = Box::new(LoopInfo::compute(f, &doms));
        self.doms.borrow_mut().insert(func, doms);
        self.loops.borrow_mut().insert(func, loops);
    }
}

impl AnalysisGetter for BasicAnalysisCache {
    fn dominator_tree(&self, func: FuncId) -> &DominatorTree {
        let guard = self.doms.borrow();
        match guard.get(&func) {
            Some(boxed) => {
                let ptr: *const DominatorTree = &**boxed;
                // SAFETY: the box's heap allocation never moves, so the
                // reference stays valid for as long as `self` does, even
                // though `guard` itself is dropped at the end of this scope.
                unsafe { &*ptr }
            }
            None => {
                drop(guard);
                self.doms.borrow_mut().insert(func, Box::new(DominatorTree::default()));
                self.dominator_tree(func)
            }
        }
    }

    fn loop_info(&self, func: FuncId) -> &LoopInfo {
        let guard = self.loops.borrow();
        match guard.get(&func) {
            Some(boxed) => {
                let ptr: *const LoopInfo = &**boxed;
                // SAFETY: see `dominator_tree` above.
                unsafe { &*ptr }
            }
            None => {
                drop(guard);
                self.loops.borrow_mut().insert(func, Box::new(LoopInfo::default()));
                self.loop_info(func)
            }
        }
    }
}
