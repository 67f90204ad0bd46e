//! The abstract-attribute record (§3.3): a position, a lattice state, and the
//! `initialize`/`update`/`manifest` capability trait every concrete analysis
//! in `attributes/` implements (§9's "re-architect as a trait, not a deep
//! hierarchy" note).

use attributor_ir::InstId;
use cranelift_entity::entity_impl;

use crate::{engine::Engine, lattice::ChangeResult, position::Position, rewriter::EditQueue};

/// Discriminates which concrete analysis a record belongs to; paired with a
/// [`Position`] this is the interning key the engine deduplicates records by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AnalysisKind {
    NoUnwind,
    NoSync,
    NoFree,
    NoRecurse,
    WillReturn,
    NoReturn,
    NoAlias,
    NonNull,
    Dereferenceable,
    Alignment,
    NoCapture,
    ValueSimplify,
    HeapToStack,
    PrivatizablePointer,
    ReturnedValues,
    MemoryBehavior,
    MemoryLocation,
    ValueRange,
    LivenessValue,
    LivenessFunction,
    UndefinedBehavior,
    Reachability,
}

impl AnalysisKind {
    pub const ALL: [AnalysisKind; 22] = [
        Self::NoUnwind,
        Self::NoSync,
        Self::NoFree,
        Self::NoRecurse,
        Self::WillReturn,
        Self::NoReturn,
        Self::NoAlias,
        Self::NonNull,
        Self::Dereferenceable,
        Self::Alignment,
        Self::NoCapture,
        Self::ValueSimplify,
        Self::HeapToStack,
        Self::PrivatizablePointer,
        Self::ReturnedValues,
        Self::MemoryBehavior,
        Self::MemoryLocation,
        Self::ValueRange,
        Self::LivenessValue,
        Self::LivenessFunction,
        Self::UndefinedBehavior,
        Self::Reachability,
    ];
}

/// A non-owning arena handle to a [`Record`], stable for the lifetime of an
/// [`Engine`] run. Never dereferenced without going back through the engine's
/// arena, so it can never dangle or alias a record's own `&mut` borrow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordHandle(u32);
entity_impl!(RecordHandle, "aa");

/// Edge class in the dependency graph (§3.4). `Required` propagates
/// invalidation transitively; `Optional` only re-enqueues on change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependenceKind {
    Required,
    Optional,
}

/// The capability set every concrete attribute implements (§9). `initialize`
/// seeds known bits from the IR before the record ever joins the worklist;
/// `update` runs once per worklist visit and must only call monotonic
/// lattice operators; `manifest` runs once, after fixpoint, and stages IR
/// edits rather than applying them directly.
pub trait AbstractAttribute: std::fmt::Debug {
    fn kind(&self) -> AnalysisKind;
    fn position(&self) -> Position;

    fn initialize(&mut self, engine: &mut Engine);

    /// Runs one update step. Must use `engine` only to query peer records
    /// (which records a dependency edge from this record to the peer) and
    /// never to mutate IR.
    fn update(&mut self, engine: &mut Engine) -> ChangeResult;

    /// Stages IR edits for a record whose state is valid at the end of the
    /// run. Never called for an invalid (pessimized-to-bottom) record: a
    /// bottom fact implies nothing, so there is nothing sound to write back.
    fn manifest(&self, engine: &Engine, edits: &mut EditQueue);

    fn is_valid(&self) -> bool;
    fn is_fixed(&self) -> bool;

    /// Lets [`Engine::downcast`] recover the concrete type behind a
    /// [`RecordHandle`] so an attribute's `update` can read a peer's lattice
    /// state directly instead of through a narrower trait-object interface.
    fn as_any(&self) -> &dyn std::any::Any;

    /// `indicate-optimistic-fixpoint` (§3.2): freeze at the current assumed
    /// value. Called by the engine at the end of a run for every record that
    /// never reached fixpoint on its own.
    fn force_optimistic_fixpoint(&mut self);

    /// `indicate-pessimistic-fixpoint` (§3.2): collapse to the known
    /// (sound) lower bound and mark invalid. Called by the engine's
    /// invalidation cascade.
    fn force_pessimistic_fixpoint(&mut self);

    /// A short, human-readable rendering of the current state, used in
    /// convergence-failure diagnostics.
    fn debug_name(&self) -> String {
        format!("{:?}@{:?}", self.kind(), self.position())
    }

    /// Overridden only by the `LivenessFunction` record: the liveness-
    /// filtering helpers on [`Engine`] consult this (rather than downcasting)
    /// to decide whether an instruction is assumed dead.
    fn is_instruction_dead(&self, _inst: InstId) -> bool {
        false
    }
}

/// Type-level counterpart of [`AnalysisKind`]: lets [`Engine::get_or_create`]
/// construct the right concrete record for a position without a runtime
/// factory table.
pub trait NewAt: AbstractAttribute + Sized + 'static {
    const KIND: AnalysisKind;
    fn new_at(position: Position) -> Self;
}
