use cranelift_entity::PrimaryMap;
use petgraph::{algo::tarjan_scc, graphmap::DiGraphMap};
use rustc_hash::FxHashMap;

use crate::{
    entities::FuncId,
    function::Function,
    inst::{CallTarget, Opcode},
};

/// A collection of functions, the unit the attributor runs over.
#[derive(Debug, Clone, Default)]
pub struct Module {
    pub functions: PrimaryMap<FuncId, Function>,
    by_name: FxHashMap<String, FuncId>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare_function(&mut self, function: Function) -> FuncId {
        let name = function.name.clone();
        let id = self.functions.push(function);
        self.by_name.insert(name, id);
        id
    }

    pub fn function_by_name(&self, name: &str) -> Option<FuncId> {
        self.by_name.get(name).copied()
    }

    pub fn functions(&self) -> impl Iterator<Item = (FuncId, &Function)> {
        self.functions.iter()
    }

    /// Direct call edges between function *definitions* (declarations have no
    /// callers of interest here, and indirect calls cannot contribute an
    /// edge, per §1's abstention on opaque native boundaries).
    pub fn call_graph(&self) -> DiGraphMap<FuncId, ()> {
        let mut graph = DiGraphMap::new();
        for (id, _) in self.functions.iter() {
            graph.add_node(id);
        }
        for (caller, func) in self.functions.iter() {
            for (_, inst) in func.call_sites() {
                if let Some(CallTarget::Direct(callee)) = inst.call_target() {
                    graph.add_edge(caller, callee, ());
                }
            }
        }
        graph
    }

    /// `true` if `func` participates in a call-graph SCC of size greater
    /// than one, i.e. it may be (mutually) recursive. Used by `no-recurse`'s
    /// initialization (§4.4) to seed the pessimistic starting state.
    pub fn is_in_nontrivial_scc(&self, func: FuncId) -> bool {
        let graph = self.call_graph();
        for scc in tarjan_scc(&graph) {
            if scc.contains(&func) {
                // A single-node SCC is still "non-trivial" if the node calls
                // itself directly (self-recursion).
                return scc.len() > 1 || graph.contains_edge(func, func);
            }
        }
        false
    }

    pub fn is_recognized_malloc_callee(&self, target: CallTarget) -> Option<crate::inst::MallocKind> {
        match target {
            CallTarget::Direct(id) => match self.functions[id].name.as_str() {
                "malloc" => Some(crate::inst::MallocKind::Malloc),
                "calloc" => Some(crate::inst::MallocKind::Calloc),
                "aligned_alloc" => Some(crate::inst::MallocKind::AlignedAlloc),
                _ => None,
            },
            CallTarget::Indirect(_) => None,
        }
    }

    pub fn is_free_callee(&self, target: CallTarget) -> bool {
        matches!(target, CallTarget::Direct(id) if self.functions[id].name == "free")
    }
}

/// Returns `true` if `opcode` is a recognized heap allocation
/// (`isMallocLikeFn`/`isCallocLikeFn`/`isAlignedAllocLikeFn` collapsed into
/// one check, since this IR already tags malloc-likeness on the opcode
/// itself rather than recovering it from a callee name at every use).
pub fn is_malloc_like(opcode: &Opcode) -> bool {
    matches!(opcode, Opcode::MallocLike { .. })
}
