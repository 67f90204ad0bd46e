//! Names a location at which a fact may hold (§3.1, C1): a function, one of
//! its arguments, its return, a call site, a call site's return, or one of
//! the call site's arguments — or a free-floating value not yet tied to any
//! of those (`Float`).

use smallvec::SmallVec;

use attributor_ir::{AttributeSet, CallTarget, FuncId, InstId, Module, ValueId};

/// A tagged IR location. Value-typed, `Copy`, hashable and totally ordered
/// (derived `Ord` walks the variants in declaration order, then their
/// payload — arbitrary but stable, which is all equality-based interning and
/// the subsuming walk require).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Position {
    Invalid,
    Float(FuncId, ValueId),
    Function(FuncId),
    Returned(FuncId),
    CallSite(FuncId, InstId),
    CallSiteReturned(FuncId, InstId),
    Argument(FuncId, u32),
    CallSiteArgument(FuncId, InstId, u32),
}

impl Position {
    /// The function this position lives in (its anchor function), if any.
    pub fn anchor_function(&self) -> Option<FuncId> {
        match *self {
            Self::Invalid => None,
            Self::Float(f, _)
            | Self::Function(f)
            | Self::Returned(f)
            | Self::CallSite(f, _)
            | Self::CallSiteReturned(f, _)
            | Self::Argument(f, _)
            | Self::CallSiteArgument(f, _, _) => Some(f),
        }
    }

    /// The single SSA value this position names, when it names exactly one
    /// (arguments and call-site arguments only; `Function`/`Returned`/call
    /// positions describe a *set* of values or none at all).
    pub fn associated_value(&self, module: &Module) -> Option<ValueId> {
        match *self {
            Self::Argument(f, idx) => Some(module.functions[f].arg_value(idx as usize)),
            Self::CallSiteArgument(f, call, idx) => {
                Some(module.functions[f].insts[call].operands[idx as usize])
            }
            Self::Float(_, v) => Some(v),
            Self::CallSiteReturned(f, call) => module.functions[f].insts[call].result,
            _ => None,
        }
    }

    /// The direct callee of a call-site position, if known and direct.
    pub fn callee(&self, module: &Module) -> Option<FuncId> {
        match *self {
            Self::CallSite(f, call) | Self::CallSiteReturned(f, call) | Self::CallSiteArgument(f, call, _) => {
                match module.functions[f].insts[call].call_target() {
                    Some(CallTarget::Direct(callee)) => Some(callee),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// The canonical sequence of coarser positions implied by this one (§3.1
    /// "subsuming iterator"), used by both attribute lookup and query
    /// propagation. Always terminates since every chain strictly decreases
    /// in specificity.
    pub fn subsuming(&self, module: &Module) -> SmallVec<[Position; 4]> {
        let mut out = SmallVec::new();
        match *self {
            Self::Invalid => {}
            Self::Float(f, _) => out.push(Self::Function(f)),
            Self::Function(_) => {}
            Self::Returned(f) => out.push(Self::Function(f)),
            Self::Argument(f, _) => out.push(Self::Function(f)),
            Self::CallSite(f, call) => {
                out.push(Self::Function(f));
                if let Some(callee) = self.callee(module) {
                    out.push(Self::Function(callee));
                }
                let _ = call;
            }
            Self::CallSiteReturned(f, call) => {
                if let Some(callee) = self.callee(module) {
                    out.push(Self::Returned(callee));
                    out.push(Self::Function(callee));
                }
                out.push(Self::CallSite(f, call));
            }
            Self::CallSiteArgument(f, call, idx) => {
                if let Some(callee) = self.callee(module) {
                    out.push(Self::Argument(callee, idx));
                }
                out.push(Self::CallSite(f, call));
            }
        }
        out
    }

    /// The `AttributeSet` the host IR already declares at this position, for
    /// the positions that are themselves a declaration site. `Float` and
    /// `CallSiteReturned` name a value rather than a declaration and so have
    /// no attribute slot of their own to seed from.
    pub fn declared_attrs<'m>(&self, module: &'m Module) -> Option<&'m AttributeSet> {
        match *self {
            Self::Function(f) => Some(&module.functions[f].attrs),
            Self::Returned(f) => Some(&module.functions[f].ret_attrs),
            Self::Argument(f, idx) => module.functions[f].arg_attrs.get(idx as usize),
            Self::CallSite(f, call) => Some(&module.functions[f].insts[call].attrs),
            Self::CallSiteArgument(f, call, idx) => module.functions[f].insts[call].arg_attrs.get(idx as usize),
            Self::Float(_, _) | Self::CallSiteReturned(_, _) | Self::Invalid => None,
        }
    }

    pub fn is_pointer_like(&self, module: &Module) -> bool {
        self.associated_value(module)
            .map(|v| module.functions[self.anchor_function().unwrap()].value_type(v).is_pointer())
            .unwrap_or(false)
    }
}
