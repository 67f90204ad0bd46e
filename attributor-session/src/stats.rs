use core::cell::Cell;

/// Observability side-channel for a single solver run.
///
/// The engine updates these counters as it works, but never reads them back —
/// they exist purely so that callers (tests, `--dump-attributor-stats`
/// tooling) can see how much work a run performed. Kept as plain `Cell`s
/// rather than atomics since the solver is single-threaded (see the
/// concurrency model).
#[derive(Debug, Default, Clone)]
pub struct SolverStatistics {
    pub records_created: Cell<u64>,
    pub updates_run: Cell<u64>,
    pub pessimizations: Cell<u64>,
    pub edits_manifested: Cell<u64>,
    pub dependency_graph_rebuilds: Cell<u64>,
}

impl SolverStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_created(&self) {
        self.records_created.set(self.records_created.get() + 1);
    }

    #[inline]
    pub fn update_run(&self) {
        self.updates_run.set(self.updates_run.get() + 1);
    }

    #[inline]
    pub fn pessimized(&self) {
        self.pessimizations.set(self.pessimizations.get() + 1);
    }

    #[inline]
    pub fn edit_manifested(&self) {
        self.edits_manifested.set(self.edits_manifested.get() + 1);
    }

    #[inline]
    pub fn dependency_graph_rebuilt(&self) {
        self.dependency_graph_rebuilds
            .set(self.dependency_graph_rebuilds.get() + 1);
    }
}
