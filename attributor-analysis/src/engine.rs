//! C5: owns the worklist, the dependency graph, the iteration loop, the
//! invalidation cascade, and the manifest pass (§4.2).

use std::collections::VecDeque;

use attributor_ir::{AnalysisGetter, FuncId, InstId, Module};
use cranelift_entity::EntityRef;
use log::{debug, trace};
use rustc_hash::FxHashMap;

use attributor_session::{Config, Report, SolverStatistics};

use crate::{
    graph::DependencyGraph,
    lattice::ChangeResult,
    position::Position,
    record::{AbstractAttribute, AnalysisKind, DependenceKind, NewAt, RecordHandle},
    rewriter::EditQueue,
};

/// The fixpoint engine. Borrows the IR read-only for the whole run — per the
/// resource model (§5), the IR is only ever mutated during the post-fixpoint
/// replay, which happens outside `Engine` entirely (see
/// [`Engine::run`]'s returned [`EditQueue`]).
pub struct Engine<'m> {
    module: &'m Module,
    analysis: &'m dyn AnalysisGetter,
    config: Config,
    stats: SolverStatistics,
    records: Vec<Option<Box<dyn AbstractAttribute>>>,
    index: FxHashMap<(Position, AnalysisKind), RecordHandle>,
    worklist: VecDeque<RecordHandle>,
    in_worklist: FxHashMap<RecordHandle, bool>,
    graph: DependencyGraph,
    /// The record currently being updated or initialized, if any; new
    /// `get_or_create` calls record a dependency edge from this record.
    current: Option<RecordHandle>,
    iteration: u32,
}

impl<'m> Engine<'m> {
    pub fn new(module: &'m Module, analysis: &'m dyn AnalysisGetter, config: Config) -> Self {
        Self {
            module,
            analysis,
            config,
            stats: SolverStatistics::default(),
            records: Vec::new(),
            index: FxHashMap::default(),
            worklist: VecDeque::new(),
            in_worklist: FxHashMap::default(),
            graph: DependencyGraph::new(),
            current: None,
            iteration: 0,
        }
    }

    pub fn module(&self) -> &Module {
        self.module
    }

    /// The §6.2 analysis-getter boundary: dominator trees, loop info, and
    /// (via the free functions in `attributor_ir::analysis_getter`) the
    /// must-be-executed-context walk and pointer-origin tracing.
    pub fn analysis(&self) -> &'m dyn AnalysisGetter {
        self.analysis
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn stats(&self) -> &SolverStatistics {
        &self.stats
    }

    fn slot(&self, handle: RecordHandle) -> usize {
        handle.index()
    }

    fn enqueue(&mut self, handle: RecordHandle) {
        if !*self.in_worklist.entry(handle).or_insert(false) {
            self.in_worklist.insert(handle, true);
            self.worklist.push_back(handle);
        }
    }

    fn dequeue(&mut self) -> Option<RecordHandle> {
        let handle = self.worklist.pop_front()?;
        self.in_worklist.insert(handle, false);
        Some(handle)
    }

    /// `get-or-create<AA>(position)` (§4.2): returns the unique record of
    /// analysis `A` at `position`, creating and initializing it if this is
    /// the first lookup. Records a `required` dependency edge from whichever
    /// record is currently updating (if any) to the returned one.
    pub fn get_or_create<A: NewAt>(&mut self, position: Position) -> RecordHandle {
        let key = (position, A::KIND);
        if let Some(&handle) = self.index.get(&key) {
            self.record_current_dependence(handle, DependenceKind::Required);
            return handle;
        }

        let handle = RecordHandle::new(self.records.len());
        self.records.push(None);
        self.index.insert(key, handle);
        self.stats.record_created();

        let mut aa: Box<dyn AbstractAttribute> = Box::new(A::new_at(position));
        let previous = self.current.replace(handle);
        aa.initialize(self);
        self.current = previous;
        self.records[self.slot(handle)] = Some(aa);

        self.record_current_dependence(handle, DependenceKind::Required);
        self.enqueue(handle);
        handle
    }

    /// `lookup<AA>(position)`: returns the record if it already exists,
    /// without creating one and without recording a dependence.
    pub fn lookup<A: NewAt>(&self, position: Position) -> Option<RecordHandle> {
        self.index.get(&(position, A::KIND)).copied()
    }

    fn record_current_dependence(&mut self, to: RecordHandle, kind: DependenceKind) {
        if let Some(from) = self.current {
            if from != to {
                self.graph.add_edge(from, to, kind);
            }
        }
    }

    /// `record-dependence(from, to, class)`: an explicit edge, for the rare
    /// case a combinator wants a dependency other than the implicit one
    /// `get_or_create` would record.
    pub fn record_dependence(&mut self, from: RecordHandle, to: RecordHandle, kind: DependenceKind) {
        self.graph.add_edge(from, to, kind);
    }

    pub fn is_valid(&self, handle: RecordHandle) -> bool {
        self.records[self.slot(handle)].as_ref().is_some_and(|aa| aa.is_valid())
    }

    pub fn is_fixed(&self, handle: RecordHandle) -> bool {
        self.records[self.slot(handle)].as_ref().is_some_and(|aa| aa.is_fixed())
    }

    /// Recovers the concrete record type behind `handle`, if it matches `A`
    /// and the record isn't the one currently being updated (which is
    /// temporarily `None` while its own `update` runs, see [`Self::visit`]).
    pub fn downcast<A: NewAt>(&self, handle: RecordHandle) -> Option<&A> {
        self.records[self.slot(handle)].as_ref().and_then(|aa| aa.as_any().downcast_ref::<A>())
    }

    pub fn debug_name(&self, handle: RecordHandle) -> String {
        self.records[self.slot(handle)].as_ref().map(|aa| aa.debug_name()).unwrap_or_else(|| "<reentrant>".to_string())
    }

    /// `is-assumed-dead(instruction)`: consults `func`'s `LivenessFunction`
    /// record (creating it if needed) and records an optional dependence,
    /// since callers of this helper degrade gracefully rather than require
    /// liveness to be settled.
    pub fn is_assumed_dead_instruction(&mut self, func: FuncId, inst: InstId) -> bool {
        let handle = self.get_or_create::<crate::attributes::liveness_function::LivenessFunction>(Position::Function(func));
        // `get_or_create` already recorded a `required` edge; liveness
        // queries are meant to be optional, so soften it back down.
        if let Some(current) = self.current {
            self.graph.add_edge(current, handle, DependenceKind::Optional);
        }
        let slot = self.slot(handle);
        self.records[slot].as_ref().is_some_and(|aa| aa.is_instruction_dead(inst))
    }

    /// `check-for-all-instructions(predicate)`: iterates every instruction
    /// of `func` under liveness filtering, returning `true` iff `predicate`
    /// held for every surviving instruction.
    pub fn check_for_all_instructions(&mut self, func: FuncId, mut predicate: impl FnMut(&Module, InstId) -> bool) -> bool {
        let insts: Vec<InstId> = self.module.functions[func].instructions().map(|(id, _)| id).collect();
        for inst in insts {
            if self.is_assumed_dead_instruction(func, inst) {
                continue;
            }
            if !predicate(self.module, inst) {
                return false;
            }
        }
        true
    }

    /// `check-for-all-call-sites(predicate)`: as above, restricted to
    /// call-like instructions.
    pub fn check_for_all_call_sites(&mut self, func: FuncId, mut predicate: impl FnMut(&Module, InstId) -> bool) -> bool {
        let calls: Vec<InstId> = self.module.functions[func].call_sites().map(|(id, _)| id).collect();
        for call in calls {
            if self.is_assumed_dead_instruction(func, call) {
                continue;
            }
            if !predicate(self.module, call) {
                return false;
            }
        }
        true
    }

    /// `check-for-all-uses(predicate)`: as above, over every use of `value`
    /// within `func`.
    pub fn check_for_all_uses(
        &mut self,
        func: FuncId,
        value: attributor_ir::ValueId,
        mut predicate: impl FnMut(&Module, attributor_ir::Use) -> bool,
    ) -> bool {
        let uses: Vec<attributor_ir::Use> = self.module.functions[func].uses_of(value).into_iter().collect();
        for u in uses {
            if self.is_assumed_dead_instruction(func, u.inst) {
                continue;
            }
            if !predicate(self.module, u) {
                return false;
            }
        }
        true
    }

    /// Seeds the engine with the records listed in §4.5 for every
    /// non-declaration function in the module, then runs the fixpoint loop
    /// to completion and returns the staged edit queue plus whether a
    /// convergence failure should be reported.
    ///
    /// Takes `&mut self` rather than consuming the engine so a caller that
    /// wants [`Self::stats`] afterward (the `attributor` crate's
    /// `--dump-attributor-stats`) still has it; the engine is simply left in
    /// its post-fixpoint state and dropped by the caller once the edits are
    /// applied.
    pub fn run(&mut self) -> (EditQueue, Result<(), Report>) {
        let funcs: Vec<FuncId> = self.module.functions().map(|(id, _)| id).filter(|&f| !self.module.functions[f].is_declaration()).collect();
        self.run_on(&funcs)
    }

    /// §6.5 `run-on-functions`: as [`Self::run`], but seeds only the
    /// functions named in `funcs` rather than the whole module. Used by a
    /// pass manager re-running the solver on just the functions a prior
    /// transform touched, or by call-graph-SCC-scoped passes that only ever
    /// want to seed one SCC at a time.
    pub fn run_on(&mut self, funcs: &[FuncId]) -> (EditQueue, Result<(), Report>) {
        for &func in funcs {
            if self.module.functions[func].is_declaration() {
                continue;
            }
            crate::seed::seed_function(self, func);
        }

        let result = self.run_to_fixpoint();
        let mut edits = EditQueue::new();
        if result.is_ok() {
            self.manifest(&mut edits);
        }
        (edits, result)
    }

    /// The main loop (§4.2 steps 2-3).
    fn run_to_fixpoint(&mut self) -> Result<(), Report> {
        let cap = self.config.iteration_cap();
        let interval = self.config.dependency_recompute_interval();

        while !self.worklist.is_empty() {
            if self.iteration >= cap {
                if self.config.verify_max_iterations() {
                    let unsettled = self.worklist.len();
                    let records = self.worklist.iter().map(|&h| self.debug_name(h)).collect();
                    return Err(Report::ConvergenceFailure { iterations: self.iteration, unsettled, records });
                }
                break;
            }
            self.iteration += 1;

            if interval > 0 && self.iteration % interval == 0 {
                debug!(target: "attributor::engine", "rebuilding dependency graph at iteration {}", self.iteration);
                self.graph.clear();
                self.stats.dependency_graph_rebuilt();
                for idx in 0..self.records.len() {
                    self.enqueue(RecordHandle::new(idx));
                }
            }

            let drained: Vec<RecordHandle> = std::iter::from_fn(|| self.dequeue()).collect();
            for handle in drained {
                self.visit(handle);
            }
        }

        self.finalize_unfixed_records();
        Ok(())
    }

    /// Step 3: anything left not at fixpoint is promoted optimistically,
    /// then pessimism is cascaded transitively from any invalid record onto
    /// its `required` dependents.
    fn finalize_unfixed_records(&mut self) {
        for idx in 0..self.records.len() {
            let handle = RecordHandle::new(idx);
            if self.is_fixed(handle) {
                continue;
            }
            if let Some(aa) = &mut self.records[idx] {
                aa.force_optimistic_fixpoint();
            }
        }

        let mut queue: VecDeque<RecordHandle> =
            (0..self.records.len()).map(RecordHandle::new).filter(|&h| !self.is_valid(h)).collect();
        while let Some(invalid) = queue.pop_front() {
            let dependents: Vec<(RecordHandle, DependenceKind)> = self.graph.dependents_of(invalid).collect();
            for (dependent, kind) in dependents {
                if kind == DependenceKind::Required && self.is_valid(dependent) {
                    self.pessimize(dependent);
                    queue.push_back(dependent);
                }
            }
        }
    }

    fn pessimize(&mut self, handle: RecordHandle) {
        if let Some(aa) = &mut self.records[self.slot(handle)] {
            aa.force_pessimistic_fixpoint();
        }
    }

    /// Visits one record: runs `update`, and either re-enqueues dependents
    /// or leaves it to be picked up again only if a future change reaches it
    /// (promotion to fixpoint when nothing unfixed was consulted is left to
    /// each attribute's own `update`, which calls `force_optimistic_fixpoint`
    /// once it notices it only ever reads already-fixed peers).
    fn visit(&mut self, handle: RecordHandle) {
        if self.is_fixed(handle) || !self.is_valid(handle) {
            return;
        }

        let mut aa = match self.records[self.slot(handle)].take() {
            Some(aa) => aa,
            None => return, // reentrant visit of a record currently updating; skip
        };

        let previous = self.current.replace(handle);
        let was_valid = aa.is_valid();
        self.stats.update_run();
        let result = aa.update(self);
        self.current = previous;

        let became_invalid = was_valid && !aa.is_valid();
        self.records[self.slot(handle)] = Some(aa);

        if became_invalid {
            self.stats.pessimized();
            self.cascade_invalidate(handle);
        }

        if result == ChangeResult::Changed {
            let dependents: Vec<RecordHandle> = self.graph.dependents_of(handle).map(|(r, _)| r).collect();
            for dependent in dependents {
                self.enqueue(dependent);
            }
        }
    }

    /// Invalidation cascade (§4.2 step 2a): for every `required` edge into a
    /// newly invalid record, force the dependent pessimistic too (cascading
    /// further if that makes it invalid); for `optional` edges, just
    /// re-enqueue.
    fn cascade_invalidate(&mut self, invalid: RecordHandle) {
        let mut queue = VecDeque::from([invalid]);
        while let Some(current) = queue.pop_front() {
            let dependents: Vec<(RecordHandle, DependenceKind)> = self.graph.dependents_of(current).collect();
            for (dependent, kind) in dependents {
                match kind {
                    DependenceKind::Required => {
                        if self.is_valid(dependent) {
                            self.pessimize(dependent);
                            self.stats.pessimized();
                            queue.push_back(dependent);
                        }
                    }
                    DependenceKind::Optional => {
                        self.enqueue(dependent);
                    }
                }
            }
        }
    }

    /// Step 4: every valid record stages its IR edits.
    fn manifest(&mut self, edits: &mut EditQueue) {
        for idx in 0..self.records.len() {
            let handle = RecordHandle::new(idx);
            if !self.is_valid(handle) {
                continue;
            }
            let aa = match self.records[idx].take() {
                Some(aa) => aa,
                None => continue,
            };
            aa.manifest(self, edits);
            self.stats.edit_manifested();
            self.records[idx] = Some(aa);
        }
        trace!(target: "attributor::engine", "manifested {} edits", edits.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_constructs_empty() {
        let module = Module::new();
        let analysis = attributor_ir::BasicAnalysisCache::new();
        let engine = Engine::new(&module, &analysis, Config::new());
        assert_eq!(engine.records.len(), 0);
    }
}
