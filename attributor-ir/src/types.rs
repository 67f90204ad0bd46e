use core::fmt;

/// The handful of types this minimal IR needs to express the catalogue of
/// attributes in the spec; not a general-purpose type system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    I1,
    I32,
    I64,
    Ptr,
    Void,
}

impl Type {
    #[inline]
    pub const fn is_pointer(&self) -> bool {
        matches!(self, Self::Ptr)
    }

    #[inline]
    pub const fn is_integer(&self) -> bool {
        matches!(self, Self::I1 | Self::I32 | Self::I64)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::I1 => "i1",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::Ptr => "ptr",
            Self::Void => "void",
        })
    }
}
