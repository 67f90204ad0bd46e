use core::fmt;

use crate::{entities::InstId, types::Type};

/// What an SSA value actually *is*: one of a function's formal parameters, the
/// result of an instruction, or a literal constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Argument(u32),
    InstResult(InstId),
    ConstInt(i64),
    ConstNull,
    /// The `undef` token substituted in by liveness/value-simplify manifest
    /// when a dead value's uses are replaced (§4.4 liveness, value form).
    Undef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueData {
    pub ty: Type,
    pub kind: ValueKind,
}

impl ValueData {
    pub const fn new(ty: Type, kind: ValueKind) -> Self {
        Self { ty, kind }
    }

    #[inline]
    pub const fn is_constant(&self) -> bool {
        matches!(
            self.kind,
            ValueKind::ConstInt(_) | ValueKind::ConstNull | ValueKind::Undef
        )
    }

    #[inline]
    pub const fn is_null_constant(&self) -> bool {
        matches!(self.kind, ValueKind::ConstNull)
    }

    #[inline]
    pub fn as_const_int(&self) -> Option<i64> {
        match self.kind {
            ValueKind::ConstInt(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for ValueData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ValueKind::Argument(idx) => write!(f, "%arg{idx}"),
            ValueKind::InstResult(inst) => write!(f, "%{inst}"),
            ValueKind::ConstInt(v) => write!(f, "{v}"),
            ValueKind::ConstNull => f.write_str("null"),
            ValueKind::Undef => f.write_str("undef"),
        }
    }
}
