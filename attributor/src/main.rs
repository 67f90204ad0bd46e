//! A thin CLI front end over the fixpoint engine.
//!
//! There is no textual IR format here to parse a real program from (the
//! façade in `attributor-ir` is meant to be embedded by a host compiler that
//! already has its own IR), so this binary's job is to expose every solver
//! knob as a flag, wire up logging the way a real embedder would, and run one
//! module-pass round over a small built-in smoke-test program so the
//! resulting wiring (config parsing, logging, stats reporting) can be
//! exercised end to end without a host compiler present.

use attributor_ir::{Function, Instruction, Module, NullCallGraphUpdater, Opcode, Type};
use attributor_session::Config;
use clap::Parser;

/// Interprocedural abstract-interpretation fixpoint framework.
#[derive(Debug, Parser)]
#[command(name = "attributor", author, version, about, long_about = None)]
struct Cli {
    /// Disable interprocedural reasoning (argument/call-site positions never
    /// cross a call edge).
    #[arg(long, help_heading = "Solver")]
    no_interprocedural: bool,

    /// Upper bound on worklist drain rounds before unsettled records are
    /// forced to a pessimistic fixpoint.
    #[arg(long, value_name = "N", default_value_t = Config::new().iteration_cap(), help_heading = "Solver")]
    iteration_cap: u32,

    /// Rounds between dependency-graph rebuilds; 0 disables the rebuild.
    #[arg(long, value_name = "N", default_value_t = Config::new().dependency_recompute_interval(), help_heading = "Solver")]
    dependency_recompute_interval: u32,

    /// Treat hitting the iteration cap without convergence as an error
    /// instead of silently collapsing to pessimistic.
    #[arg(long, help_heading = "Solver")]
    verify_max_iterations: bool,

    /// Disable the heap-to-stack attribute.
    #[arg(long, help_heading = "Rewriter")]
    no_heap_to_stack: bool,

    /// Largest malloc-like allocation, in bytes, heap-to-stack will promote.
    #[arg(long, value_name = "BYTES", default_value_t = Config::new().heap_to_stack_size_cap(), help_heading = "Rewriter")]
    heap_to_stack_size_cap: u64,

    /// Allow the rewriter to synthesize shallow wrapper functions.
    #[arg(long, help_heading = "Rewriter")]
    enable_shallow_wrappers: bool,

    /// Annotate declaration-only call sites from the declaration's own
    /// attributes.
    #[arg(long, help_heading = "Rewriter")]
    annotate_declaration_call_sites: bool,

    /// Print solver statistics (records created, updates run, pessimizations,
    /// edits manifested, dependency-graph rebuilds) after the run.
    #[arg(long, help_heading = "Diagnostics")]
    dump_attributor_stats: bool,

    /// Logging verbosity for the `attributor::*` targets.
    #[arg(long, value_name = "LEVEL", default_value = "warn", help_heading = "Diagnostics")]
    log_level: log::LevelFilter,
}

impl Cli {
    fn into_config(self) -> Config {
        let mut config = Config::new();
        config
            .set_interprocedural(!self.no_interprocedural)
            .set_iteration_cap(self.iteration_cap)
            .set_dependency_recompute_interval(self.dependency_recompute_interval)
            .set_verify_max_iterations(self.verify_max_iterations)
            .set_heap_to_stack_enabled(!self.no_heap_to_stack)
            .set_heap_to_stack_size_cap(self.heap_to_stack_size_cap)
            .set_enable_shallow_wrappers(self.enable_shallow_wrappers)
            .set_annotate_declaration_call_sites(self.annotate_declaration_call_sites);
        config
    }
}

/// A single identity function, `fn id(ptr %p) -> ptr { ret %p }` — just
/// enough IR to watch every solver phase run once.
fn smoke_test_module() -> Module {
    let mut module = Module::new();
    let mut f = Function::new("id", vec![Type::Ptr], Some(Type::Ptr));
    let entry = f.create_block();
    let p = f.arg_value(0);
    f.push_inst(entry, Instruction::new(entry, Opcode::Return, [p]), None);
    module.declare_function(f);
    module
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    attributor::init_logger(cli.log_level);

    let dump_stats = cli.dump_attributor_stats;
    let config = cli.into_config();
    let mut module = smoke_test_module();
    let mut cg = NullCallGraphUpdater;

    if dump_stats {
        let (changed, stats) = attributor::run_module_with_stats(&mut module, config, &mut cg)?;
        println!("changed: {changed}");
        println!("records created: {}", stats.records_created.get());
        println!("updates run: {}", stats.updates_run.get());
        println!("pessimizations: {}", stats.pessimizations.get());
        println!("edits manifested: {}", stats.edits_manifested.get());
        println!("dependency graph rebuilds: {}", stats.dependency_graph_rebuilds.get());
    } else {
        let changed = attributor::run_module_pass(&mut module, config, &mut cg)?;
        println!("changed: {changed}");
    }

    Ok(())
}
