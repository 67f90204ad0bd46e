//! §6.3: the host's call-graph-updater hook. A real embedder's pass manager
//! keeps its own call-graph nodes and SCC structure in sync as the rewriter
//! edits calls (adds a call, deletes one, or points an existing one at a
//! clone); this crate's own [`crate::Module::call_graph`] is cheap enough to
//! just recompute, but `attributor-analysis` talks to this trait instead of
//! assuming that, so a production embedder can plug in incremental updates.

use crate::entities::FuncId;

pub trait CallGraphUpdater {
    /// A direct call edge `caller -> callee` was added.
    fn call_edge_inserted(&mut self, caller: FuncId, callee: FuncId);
    /// A direct call edge `caller -> callee` was removed (the call site was
    /// deleted, or rewritten to a different callee).
    fn call_edge_removed(&mut self, caller: FuncId, callee: FuncId);
    /// A new function was spliced into the module (a shallow wrapper, or a
    /// clone produced by argument privatization).
    fn function_inserted(&mut self, func: FuncId);
}

/// A no-op updater for callers that don't maintain a separate call-graph
/// structure and are happy to recompute [`crate::Module::call_graph`] from
/// scratch after a run.
#[derive(Debug, Default)]
pub struct NullCallGraphUpdater;

impl CallGraphUpdater for NullCallGraphUpdater {
    fn call_edge_inserted(&mut self, _caller: FuncId, _callee: FuncId) {}
    fn call_edge_removed(&mut self, _caller: FuncId, _callee: FuncId) {}
    fn function_inserted(&mut self, _func: FuncId) {}
}
