//! Ambient configuration, diagnostics and error types shared by the
//! `attributor-ir` and `attributor-analysis` crates: a small,
//! dependency-light crate that every other crate in the workspace can depend
//! on without pulling in the rest of the framework.

mod config;
mod report;
mod stats;

pub use self::{config::Config, report::Report, stats::SolverStatistics};
