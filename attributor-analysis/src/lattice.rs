//! The reusable monotone lattices (§3.2, C2) and the generic known/assumed
//! pairing every concrete attribute state is built from.
//!
//! A state has two parts: a **known** value, a monotone lower bound that can
//! only grow, and an **assumed** value, an optimistic upper bound that can
//! only shrink. The invariant `known ⊑ assumed` must hold after every
//! mutation; `KnownAssumed::indicate_pessimistic_fixpoint` is the only
//! operation allowed to break it loose from the current assumed value, and it
//! does so by collapsing assumed down onto known rather than by cheating the
//! ordering.

use std::fmt;

/// Whether a lattice operation actually moved the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeResult {
    Changed,
    Unchanged,
}

impl ChangeResult {
    #[inline]
    pub fn from_bool(changed: bool) -> Self {
        if changed {
            Self::Changed
        } else {
            Self::Unchanged
        }
    }

    #[inline]
    pub fn is_changed(self) -> bool {
        matches!(self, Self::Changed)
    }
}

impl std::ops::BitOr for ChangeResult {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self::from_bool(self.is_changed() || rhs.is_changed())
    }
}

impl std::ops::BitOrAssign for ChangeResult {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = *self | rhs;
    }
}

/// A value type usable as either half of a [`KnownAssumed`] pair.
///
/// `meet` is the direction used to shrink `assumed` (an intersection in the
/// set-theoretic lattices, a min/max in the scalar ones); `join` is the
/// direction used to grow `known`. `bottom` is the safe, "nothing proven"
/// starting point for `known`; callers of [`KnownAssumed::new`] supply the
/// starting `assumed` separately since its optimistic value is attribute
/// specific (`true` for most booleans, the full range for `ConstantRange`,
/// and so on).
pub trait BoundedLattice: Clone + PartialEq + fmt::Debug {
    fn bottom() -> Self;
    fn meet(&self, other: &Self) -> Self;
    fn join(&self, other: &Self) -> Self;
}

impl BoundedLattice for bool {
    fn bottom() -> Self {
        false
    }
    fn meet(&self, other: &Self) -> Self {
        *self && *other
    }
    fn join(&self, other: &Self) -> Self {
        *self || *other
    }
}

impl BoundedLattice for u64 {
    fn bottom() -> Self {
        0
    }
    fn meet(&self, other: &Self) -> Self {
        (*self).min(*other)
    }
    fn join(&self, other: &Self) -> Self {
        (*self).max(*other)
    }
}

impl BoundedLattice for u32 {
    fn bottom() -> Self {
        0
    }
    fn meet(&self, other: &Self) -> Self {
        (*self).min(*other)
    }
    fn join(&self, other: &Self) -> Self {
        (*self).max(*other)
    }
}

/// The generic known/assumed pair (§3.2). `T` supplies the direction of
/// `meet`/`join`; this wrapper enforces the `known ⊑ assumed` invariant and
/// the optimistic/pessimistic fixpoint operations uniformly across every
/// concrete attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct KnownAssumed<T: BoundedLattice> {
    known: T,
    assumed: T,
    valid: bool,
    fixed: bool,
}

impl<T: BoundedLattice> KnownAssumed<T> {
    /// Starts with nothing known and the given optimistic assumed value.
    pub fn new(initial_assumed: T) -> Self {
        Self {
            known: T::bottom(),
            assumed: initial_assumed,
            valid: true,
            fixed: false,
        }
    }

    pub fn known(&self) -> &T {
        &self.known
    }

    pub fn assumed(&self) -> &T {
        &self.assumed
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn is_fixed(&self) -> bool {
        self.fixed
    }

    /// `assumed ← assumed ⊓ other`.
    pub fn intersect_assumed(&mut self, other: &T) -> ChangeResult {
        if self.fixed {
            return ChangeResult::Unchanged;
        }
        let narrowed = self.assumed.meet(other);
        debug_assert!(
            self.known.meet(&narrowed) == self.known,
            "monotonicity violation: known {:?} no longer bounded by narrowed assumed {narrowed:?}",
            self.known,
        );
        let changed = ChangeResult::from_bool(narrowed != self.assumed);
        self.assumed = narrowed;
        changed
    }

    /// `known ← known ⊔ bits`.
    pub fn add_known(&mut self, bits: &T) -> ChangeResult {
        if self.fixed {
            return ChangeResult::Unchanged;
        }
        let widened = self.known.join(bits);
        debug_assert!(
            widened.meet(&self.assumed) == widened,
            "monotonicity violation: known grew to {widened:?}, past assumed {:?}",
            self.assumed,
        );
        let changed = ChangeResult::from_bool(widened != self.known);
        self.known = widened;
        changed
    }

    /// Freezes the state at its current assumed value: no further update can
    /// change it (it provably won't, because only fixed information was
    /// consulted to reach this point).
    pub fn indicate_optimistic_fixpoint(&mut self) {
        self.known = self.assumed.clone();
        self.fixed = true;
    }

    /// Collapses `assumed` onto the current `known` (the only value still
    /// guaranteed sound) and marks the state invalid and fixed.
    pub fn indicate_pessimistic_fixpoint(&mut self) -> ChangeResult {
        let changed = ChangeResult::from_bool(self.assumed != self.known || self.valid);
        self.assumed = self.known.clone();
        self.valid = false;
        self.fixed = true;
        changed
    }
}

bitflags::bitflags! {
    /// A fixed-width subset of a finite set: `no-capture`'s bit flags,
    /// `memory-behavior`'s read/write bits, and `memory-location`'s
    /// location-class bits. Meet (shrinking `assumed`) is intersection;
    /// join (growing `known`) is union. Each attribute module defines its
    /// own named flag constants (`READS`/`WRITES`, `ARG_MEM`/`OTHER_MEM`,
    /// `NOT_CAPTURED_IN_MEM`/...) rather than this type enumerating them
    /// up front, so the catch-all marks every bit position representable.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct BitSet: u32 {
        const _ = !0;
    }
}

impl BitSet {
    pub const EMPTY: Self = Self::empty();
}

impl BoundedLattice for BitSet {
    fn bottom() -> Self {
        Self::empty()
    }
    fn meet(&self, other: &Self) -> Self {
        self.intersection(*other)
    }
    fn join(&self, other: &Self) -> Self {
        self.union(*other)
    }
}

/// An inclusive-exclusive `[lo, hi)` integer range with wraparound allowed
/// (`lo >= hi` is a valid "wrapped" range spanning the complement, not an
/// empty one) plus a distinguished `Empty`/`Full` pair of sentinels for the
/// lattice extremes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstantRange {
    /// No value satisfies this range (the bottom of the "known" side).
    Empty,
    /// Every value satisfies this range (the top of the "assumed" side).
    Full,
    Bounded { lo: i64, hi: i64 },
}

impl ConstantRange {
    pub fn single(value: i64) -> Self {
        Self::Bounded { lo: value, hi: value.wrapping_add(1) }
    }

    pub fn bounded(lo: i64, hi: i64) -> Self {
        if lo == hi {
            Self::Full
        } else {
            Self::Bounded { lo, hi }
        }
    }

    /// Smallest closed range containing the value known to be produced by an
    /// unsigned-less-than comparison against `bound` when the comparison is
    /// known true (`[0, bound)`) or known false (`[bound, u64::MAX]`,
    /// approximated here as `[bound, i64::MAX]`).
    pub fn as_pair(&self) -> Option<(i64, i64)> {
        match self {
            Self::Bounded { lo, hi } => Some((*lo, *hi)),
            _ => None,
        }
    }

    pub fn contains_only(&self, value: i64) -> bool {
        matches!(self, Self::Bounded { lo, hi } if *lo == value && hi.wrapping_sub(1) == value)
    }

    /// `true` if every value in this range compares `predicate` true against
    /// every value in `other` — used by value-range's manifest step to
    /// decide whether an `icmp` result can be folded to a constant boolean.
    pub fn always_lt(&self, other: &Self) -> Option<bool> {
        match (self, other) {
            (Self::Bounded { hi: self_hi, .. }, Self::Bounded { lo: other_lo, .. }) if self_hi <= other_lo => {
                Some(true)
            }
            (Self::Bounded { lo: self_lo, .. }, Self::Bounded { hi: other_hi, .. }) if self_lo >= other_hi => {
                Some(false)
            }
            _ => None,
        }
    }
}

impl BoundedLattice for ConstantRange {
    fn bottom() -> Self {
        Self::Empty
    }

    /// Intersection, used to narrow `assumed` as more constraints arrive.
    fn meet(&self, other: &Self) -> Self {
        match (self, other) {
            (Self::Empty, _) | (_, Self::Empty) => Self::Empty,
            (Self::Full, x) | (x, Self::Full) => *x,
            (Self::Bounded { lo: l1, hi: h1 }, Self::Bounded { lo: l2, hi: h2 }) => {
                let lo = (*l1).max(*l2);
                let hi = (*h1).min(*h2);
                if lo >= hi {
                    Self::Empty
                } else {
                    Self::bounded(lo, hi)
                }
            }
        }
    }

    /// Smallest contiguous range containing both inputs, used to grow
    /// `known` as more call sites (or loop back-edges) contribute a range.
    fn join(&self, other: &Self) -> Self {
        match (self, other) {
            (Self::Empty, x) | (x, Self::Empty) => *x,
            (Self::Full, _) | (_, Self::Full) => Self::Full,
            (Self::Bounded { lo: l1, hi: h1 }, Self::Bounded { lo: l2, hi: h2 }) => {
                Self::bounded((*l1).min(*l2), (*h1).max(*h2))
            }
        }
    }
}

/// `(knownMin, assumedMax)` of a non-negative byte count, plus a "globally"
/// flag recording whether the bound holds for every execution of the
/// program, not merely the positions already observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DereferenceableBytes {
    pub known_min: u64,
    pub assumed_max: u64,
    pub globally: bool,
}

impl DereferenceableBytes {
    pub const UNBOUNDED: u64 = u64::MAX;

    pub fn new(assumed_max: u64, globally: bool) -> Self {
        Self { known_min: 0, assumed_max, globally }
    }
}
