//! The dependency graph between in-flight records (§3.4): whenever a record
//! `A` queries a record `B` during its own update, an edge `A → B` is
//! recorded with a class of `required` or `optional`. The engine walks the
//! *reverse* direction — "who depends on B" — both to cascade invalidation
//! and to re-enqueue dependents when B changes, so this stores both
//! directions rather than re-deriving one from the other on every query.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::record::{DependenceKind, RecordHandle};

#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// `to -> [(from, kind), ...]`: the records that depend on `to`.
    dependents: FxHashMap<RecordHandle, SmallVec<[(RecordHandle, DependenceKind); 4]>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `from` depends on `to` with the given class. Idempotent:
    /// re-recording the same edge (even with a different class) keeps only
    /// the most recent class, matching how a record's update naturally
    /// re-derives its dependencies each time it runs.
    pub fn add_edge(&mut self, from: RecordHandle, to: RecordHandle, kind: DependenceKind) {
        let slot = self.dependents.entry(to).or_default();
        if let Some(existing) = slot.iter_mut().find(|(r, _)| *r == from) {
            existing.1 = kind;
        } else {
            slot.push((from, kind));
        }
    }

    /// Every record that depends on `to`, with the class of its dependence.
    pub fn dependents_of(&self, to: RecordHandle) -> impl Iterator<Item = (RecordHandle, DependenceKind)> + '_ {
        self.dependents.get(&to).into_iter().flatten().copied()
    }

    /// Discards every edge. Used for the periodic "recompute stale
    /// dependencies" step (§4.2 step 2b): the next full drain of the
    /// worklist re-derives a fresh graph as each record re-runs `update`.
    pub fn clear(&mut self) {
        self.dependents.clear();
    }
}
