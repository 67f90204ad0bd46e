/// Errors the solver surfaces to its caller.
///
/// Per the error taxonomy of the framework, most failure modes (unsupported
/// IR constructs, a missing side analysis) are handled locally by pessimizing
/// the affected record and are never represented here. Only one fatal case
/// currently reaches the caller this way: hitting the iteration cap while
/// [`verify_max_iterations`](crate::Config::verify_max_iterations) is set.
/// A monotonicity violation (`known` no longer bounded by `assumed` after an
/// update) is instead caught by `debug_assert!`s in
/// `attributor_analysis::lattice::KnownAssumed`, which panic rather than
/// return a `Report` — continuing to solve past a broken invariant is not
/// safe, so this is not treated as a recoverable error. `InvariantViolation`
/// is kept as the typed shape a caller could construct if it ever needs to
/// downgrade that class of bug into a `Result` instead of a panic (e.g. in a
/// release build where `debug_assert!` compiles out).
#[derive(Debug, thiserror::Error)]
pub enum Report {
    /// The fixpoint loop reached the configured iteration cap without
    /// reaching quiescence, and strict verification was requested.
    #[error(
        "dataflow solver did not converge within {iterations} iterations; {unsettled} record(s) \
         were still unsettled: {records:?}"
    )]
    ConvergenceFailure {
        iterations: u32,
        unsettled: usize,
        records: Vec<String>,
    },

    /// An attribute implementation violated the monotonicity invariant, or
    /// the arena was accessed after being torn down. This is always a bug.
    #[error("invariant violation in analysis `{analysis}`: {detail}")]
    InvariantViolation { analysis: &'static str, detail: String },
}
