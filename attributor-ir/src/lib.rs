//! A small, real SSA intermediate representation: functions, basic blocks,
//! instructions and values, plus the handful of façade operations the
//! fixpoint engine in `attributor-analysis` needs from a host IR (§6).
//!
//! Per the framework's own boundary, the IR itself is not the point of this
//! workspace; it exists to give the engine something concrete to run on and
//! to let this workspace's own tests build and inspect programs end to end.

pub mod analysis_getter;
pub mod attribute;
pub mod block;
pub mod call_graph_updater;
pub mod entities;
pub mod facade;
pub mod function;
pub mod inst;
pub mod module;
pub mod types;
pub mod value;

pub use analysis_getter::{AnalysisGetter, BasicAnalysisCache, DominatorTree, LoopInfo};
pub use attribute::{AttributeSet, IrAttribute};
pub use block::BasicBlock;
pub use call_graph_updater::{CallGraphUpdater, NullCallGraphUpdater};
pub use entities::{BlockId, FuncId, InstId, Use, ValueId};
pub use function::Function;
pub use inst::{CallTarget, ICmpPredicate, Instruction, MallocKind, Opcode};
pub use module::Module;
pub use types::Type;
pub use value::{ValueData, ValueKind};

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::SmallVec;

    /// Builds:
    /// ```text
    /// fn id(ptr %p) -> ptr {
    ///   entry:
    ///     ret %p
    /// }
    /// ```
    fn build_identity(module: &mut Module) -> FuncId {
        let mut f = Function::new("id", vec![Type::Ptr], Some(Type::Ptr));
        let entry = f.create_block();
        let p = f.arg_value(0);
        f.push_inst(entry, Instruction::new(entry, Opcode::Return, [p]), None);
        module.declare_function(f)
    }

    #[test]
    fn function_construction_wires_params_and_entry() {
        let f = Function::new("f", vec![Type::I32, Type::Ptr], Some(Type::I32));
        assert_eq!(f.num_args(), 2);
        assert_eq!(f.value_type(f.arg_value(0)), Type::I32);
        assert_eq!(f.value_type(f.arg_value(1)), Type::Ptr);
        assert!(f.is_declaration());
    }

    #[test]
    fn module_call_graph_has_direct_edges_only() {
        let mut module = Module::new();
        let callee = build_identity(&mut module);

        let mut caller = Function::new("caller", vec![Type::Ptr], Some(Type::Ptr));
        let entry = caller.create_block();
        let p = caller.arg_value(0);
        let (_, result) = caller.push_inst(
            entry,
            Instruction::new(entry, Opcode::Call { callee: CallTarget::Direct(callee) }, [p]),
            Some(Type::Ptr),
        );
        caller.push_inst(entry, Instruction::new(entry, Opcode::Return, [result.unwrap()]), None);
        let caller_id = module.declare_function(caller);

        let graph = module.call_graph();
        assert!(graph.contains_edge(caller_id, callee));
        assert!(!module.is_in_nontrivial_scc(caller_id));
    }

    #[test]
    fn self_recursive_function_is_a_nontrivial_scc() {
        let mut module = Module::new();
        let id = module.functions.next_key();
        let mut f = Function::new("rec", vec![Type::I32], Some(Type::I32));
        let entry = f.create_block();
        let a = f.arg_value(0);
        let (_, result) = f.push_inst(
            entry,
            Instruction::new(entry, Opcode::Call { callee: CallTarget::Direct(id) }, [a]),
            Some(Type::I32),
        );
        f.push_inst(entry, Instruction::new(entry, Opcode::Return, [result.unwrap()]), None);
        let id2 = module.declare_function(f);
        assert_eq!(id, id2);
        assert!(module.is_in_nontrivial_scc(id));
    }

    #[test]
    fn uses_of_finds_every_operand_occurrence() {
        let mut f = Function::new("double_use", vec![Type::I32], Some(Type::I32));
        let entry = f.create_block();
        let a = f.arg_value(0);
        let (add_id, sum) = f.push_inst(entry, Instruction::new(entry, Opcode::Add, [a, a]), Some(Type::I32));
        f.push_inst(entry, Instruction::new(entry, Opcode::Return, [sum.unwrap()]), None);

        let uses = f.uses_of(a);
        assert_eq!(uses.len(), 2);
        assert!(uses.iter().all(|u| u.inst == add_id));
    }

    #[test]
    fn dominator_tree_on_diamond_cfg() {
        let mut f = Function::new("diamond", vec![Type::I1], Some(Type::I32));
        let entry = f.create_block();
        let then_blk = f.create_block();
        let else_blk = f.create_block();
        let join = f.create_block();

        let cond = f.arg_value(0);
        f.push_inst(entry, Instruction::new(entry, Opcode::CondBranch { then_blk, else_blk }, [cond]), None);
        f.push_inst(then_blk, Instruction::new(then_blk, Opcode::Jump(join), SmallVec::<[ValueId; 4]>::new()), None);
        f.push_inst(else_blk, Instruction::new(else_blk, Opcode::Jump(join), SmallVec::<[ValueId; 4]>::new()), None);
        let zero = f.make_const_int(Type::I32, 0);
        f.push_inst(join, Instruction::new(join, Opcode::Return, [zero]), None);

        let doms = analysis_getter::DominatorTree::compute(&f);
        assert!(doms.dominates(entry, join));
        assert!(!doms.dominates(then_blk, join));
        assert!(!doms.dominates(else_blk, join));
    }

    #[test]
    fn loop_info_detects_back_edge() {
        let mut f = Function::new("loop", vec![], Some(Type::Void));
        let entry = f.create_block();
        let header = f.create_block();
        let exit = f.create_block();

        f.push_inst(entry, Instruction::new(entry, Opcode::Jump(header), SmallVec::<[ValueId; 4]>::new()), None);
        let one = f.make_const_int(Type::I1, 1);
        f.push_inst(header, Instruction::new(header, Opcode::CondBranch { then_blk: header, else_blk: exit }, [one]), None);
        f.push_inst(exit, Instruction::new(exit, Opcode::Return, SmallVec::<[ValueId; 4]>::new()), None);

        let doms = analysis_getter::DominatorTree::compute(&f);
        let loops = analysis_getter::LoopInfo::compute(&f, &doms);
        assert!(loops.has_loop());
        assert!(loops.headers.contains(&header));
    }

    #[test]
    fn replace_all_uses_with_rewrites_every_operand() {
        let mut f = Function::new("f", vec![Type::I32, Type::I32], Some(Type::I32));
        let entry = f.create_block();
        let a = f.arg_value(0);
        let b = f.arg_value(1);
        f.push_inst(entry, Instruction::new(entry, Opcode::Return, [a]), None);

        let replaced = facade::replace_all_uses_with(&mut f, a, b);
        assert_eq!(replaced, 1);
        let ret = f.instructions().next().unwrap().1;
        assert_eq!(ret.operands[0], b);
    }
}
