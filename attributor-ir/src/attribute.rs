use core::fmt;

use smallvec::SmallVec;

/// A single fact attached directly to the IR, either because a front-end
/// declared it, or because the attributor manifested it after reaching
/// fixpoint (see [`crate::facade`]).
///
/// This is deliberately a flat enum rather than a trait object hierarchy: the
/// framework only ever needs to get/add/remove attributes of these kinds at a
/// handful of IR positions (§6.1), so a closed set keeps `AttributeSet`
/// trivially `Clone`/`PartialEq` without dynamic dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrAttribute {
    NoUnwind,
    NoSync,
    NoFree,
    NoRecurse,
    WillReturn,
    NoReturn,
    /// This position is the unique value returned by the enclosing function.
    Returned,
    NonNull,
    Dereferenceable(u64),
    DereferenceableOrNull(u64),
    Align(u32),
    NoCapture,
    NoAlias,
    ReadNone,
    ReadOnly,
    WriteOnly,
    /// Inclusive-exclusive range `[lo, hi)`, wrapping allowed (`lo >= hi` is a
    /// valid "wrapped" range, not an empty one) to match `ConstantRange`.
    Range { lo: i64, hi: i64 },
}

impl IrAttribute {
    /// Two attributes occupy the "same slot" if adding one should replace the
    /// other (e.g. a new `Range` supersedes an old one) rather than the set
    /// accumulating duplicates.
    fn same_kind(&self, other: &Self) -> bool {
        core::mem::discriminant(self) == core::mem::discriminant(other)
    }
}

impl fmt::Display for IrAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoUnwind => f.write_str("nounwind"),
            Self::NoSync => f.write_str("nosync"),
            Self::NoFree => f.write_str("nofree"),
            Self::NoRecurse => f.write_str("norecurse"),
            Self::WillReturn => f.write_str("willreturn"),
            Self::NoReturn => f.write_str("noreturn"),
            Self::Returned => f.write_str("returned"),
            Self::NonNull => f.write_str("nonnull"),
            Self::Dereferenceable(n) => write!(f, "dereferenceable({n})"),
            Self::DereferenceableOrNull(n) => write!(f, "dereferenceable_or_null({n})"),
            Self::Align(n) => write!(f, "align({n})"),
            Self::NoCapture => f.write_str("nocapture"),
            Self::NoAlias => f.write_str("noalias"),
            Self::ReadNone => f.write_str("readnone"),
            Self::ReadOnly => f.write_str("readonly"),
            Self::WriteOnly => f.write_str("writeonly"),
            Self::Range { lo, hi } => write!(f, "range({lo}, {hi})"),
        }
    }
}

/// An unordered set of [`IrAttribute`]s attached to one IR position.
///
/// Backed by a `SmallVec` since most positions carry at most a handful of
/// attributes; small inline storage beats a full `HashSet` for the common
/// case of zero to three attributes per position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeSet(SmallVec<[IrAttribute; 4]>);

impl AttributeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn iter(&self) -> impl Iterator<Item = &IrAttribute> {
        self.0.iter()
    }

    pub fn has(&self, pred: impl Fn(&IrAttribute) -> bool) -> bool {
        self.0.iter().any(pred)
    }

    pub fn has_flag(&self, flag: IrAttribute) -> bool {
        self.0.iter().any(|a| *a == flag)
    }

    pub fn get(&self, pred: impl Fn(&IrAttribute) -> bool) -> Option<&IrAttribute> {
        self.0.iter().find(|a| pred(a))
    }

    /// Insert `attr`, replacing any existing attribute of the same kind.
    pub fn insert(&mut self, attr: IrAttribute) {
        if let Some(slot) = self.0.iter_mut().find(|a| a.same_kind(&attr)) {
            *slot = attr;
        } else {
            self.0.push(attr);
        }
    }

    pub fn remove(&mut self, pred: impl Fn(&IrAttribute) -> bool) {
        self.0.retain(|a| !pred(a));
    }

    pub fn dereferenceable_bytes(&self) -> u64 {
        self.get(|a| matches!(a, IrAttribute::Dereferenceable(_)))
            .map(|a| match a {
                IrAttribute::Dereferenceable(n) => *n,
                _ => unreachable!(),
            })
            .unwrap_or(0)
    }

    pub fn align(&self) -> Option<u32> {
        self.get(|a| matches!(a, IrAttribute::Align(_))).map(|a| match a {
            IrAttribute::Align(n) => *n,
            _ => unreachable!(),
        })
    }

    pub fn range(&self) -> Option<(i64, i64)> {
        self.get(|a| matches!(a, IrAttribute::Range { .. })).map(|a| match a {
            IrAttribute::Range { lo, hi } => (*lo, *hi),
            _ => unreachable!(),
        })
    }
}

impl fmt::Display for AttributeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for attr in self.iter() {
            if !first {
                f.write_str(" ")?;
            }
            first = false;
            write!(f, "{attr}")?;
        }
        Ok(())
    }
}
