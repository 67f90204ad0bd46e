/// Flat configuration record threaded through the solver at construction time:
/// a small `Clone + Debug` struct rather than a hierarchy of option objects,
/// so it is cheap to pass by value into every analysis that needs to consult
/// it.
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether the solver is permitted to cross call edges (enter callees) when
    /// resolving call-site/argument positions. Interprocedural analysis is more
    /// precise but costs more iterations to converge.
    interprocedural: bool,
    /// Upper bound on the number of times the fixpoint loop may drain the
    /// worklist before remaining records are forcibly collapsed to their
    /// pessimistic value.
    iteration_cap: u32,
    /// Number of iterations between dependency-graph rebuilds; `0` disables
    /// the periodic rebuild entirely.
    dependency_recompute_interval: u32,
    /// Largest malloc-like allocation (in bytes) the heap-to-stack attribute
    /// is willing to promote to a stack allocation.
    heap_to_stack_size_cap: u64,
    /// Whether the rewriter may synthesize shallow wrapper functions for
    /// callees that cannot be amended in place.
    enable_shallow_wrappers: bool,
    /// Whether declaration-only call sites (no definition available) should
    /// still be annotated with facts inferred from the declaration's own
    /// attributes.
    annotate_declaration_call_sites: bool,
    /// Whether the heap-to-stack attribute runs at all.
    heap_to_stack_enabled: bool,
    /// If `true`, hitting `iteration_cap` without reaching fixpoint is a
    /// [`Report::ConvergenceFailure`](crate::Report) rather than a silent
    /// pessimistic collapse.
    verify_max_iterations: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interprocedural: true,
            iteration_cap: 32,
            dependency_recompute_interval: 4,
            heap_to_stack_size_cap: 128,
            enable_shallow_wrappers: false,
            annotate_declaration_call_sites: false,
            heap_to_stack_enabled: true,
            verify_max_iterations: false,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub const fn is_interprocedural(&self) -> bool {
        self.interprocedural
    }

    pub fn set_interprocedural(&mut self, yes: bool) -> &mut Self {
        self.interprocedural = yes;
        self
    }

    #[inline(always)]
    pub const fn iteration_cap(&self) -> u32 {
        self.iteration_cap
    }

    pub fn set_iteration_cap(&mut self, cap: u32) -> &mut Self {
        self.iteration_cap = cap;
        self
    }

    #[inline(always)]
    pub const fn dependency_recompute_interval(&self) -> u32 {
        self.dependency_recompute_interval
    }

    pub fn set_dependency_recompute_interval(&mut self, interval: u32) -> &mut Self {
        self.dependency_recompute_interval = interval;
        self
    }

    #[inline(always)]
    pub const fn heap_to_stack_size_cap(&self) -> u64 {
        self.heap_to_stack_size_cap
    }

    pub fn set_heap_to_stack_size_cap(&mut self, cap: u64) -> &mut Self {
        self.heap_to_stack_size_cap = cap;
        self
    }

    #[inline(always)]
    pub const fn shallow_wrappers_enabled(&self) -> bool {
        self.enable_shallow_wrappers
    }

    pub fn set_enable_shallow_wrappers(&mut self, yes: bool) -> &mut Self {
        self.enable_shallow_wrappers = yes;
        self
    }

    #[inline(always)]
    pub const fn annotate_declaration_call_sites(&self) -> bool {
        self.annotate_declaration_call_sites
    }

    pub fn set_annotate_declaration_call_sites(&mut self, yes: bool) -> &mut Self {
        self.annotate_declaration_call_sites = yes;
        self
    }

    #[inline(always)]
    pub const fn heap_to_stack_enabled(&self) -> bool {
        self.heap_to_stack_enabled
    }

    pub fn set_heap_to_stack_enabled(&mut self, yes: bool) -> &mut Self {
        self.heap_to_stack_enabled = yes;
        self
    }

    #[inline(always)]
    pub const fn verify_max_iterations(&self) -> bool {
        self.verify_max_iterations
    }

    pub fn set_verify_max_iterations(&mut self, yes: bool) -> &mut Self {
        self.verify_max_iterations = yes;
        self
    }
}
