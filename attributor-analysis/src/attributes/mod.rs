//! The ~20 concrete analyses of §4.4 (C3). Each module owns one
//! [`crate::record::AnalysisKind`] and implements it as a single
//! position-generic record (§9: "a family of small records per position"
//! rather than a class hierarchy) — the same struct serves a function,
//! argument, returned, or call-site-mirror position, branching on
//! `self.position` where a mirror needs call-site-specific reasoning.

pub mod alignment;
pub mod dereferenceable;
pub mod heap_to_stack;
pub mod liveness_function;
pub mod liveness_value;
pub mod memory_behavior;
pub mod memory_location;
pub mod no_alias;
pub mod no_capture;
pub mod no_free;
pub mod no_recurse;
pub mod no_return;
pub mod no_sync;
pub mod no_unwind;
pub mod non_null;
pub mod privatizable_pointer;
pub mod reachability;
pub mod returned_values;
pub mod undefined_behavior;
pub mod value_range;
pub mod value_simplify;
pub mod will_return;

pub use alignment::Alignment;
pub use dereferenceable::Dereferenceable;
pub use heap_to_stack::HeapToStack;
pub use liveness_function::LivenessFunction;
pub use liveness_value::LivenessValue;
pub use memory_behavior::MemoryBehavior;
pub use memory_location::MemoryLocation;
pub use no_alias::NoAlias;
pub use no_capture::NoCapture;
pub use no_free::NoFree;
pub use no_recurse::NoRecurse;
pub use no_return::NoReturn;
pub use no_sync::NoSync;
pub use no_unwind::NoUnwind;
pub use non_null::NonNull;
pub use privatizable_pointer::PrivatizablePointer;
pub use reachability::Reachability;
pub use returned_values::ReturnedValues;
pub use undefined_behavior::UndefinedBehavior;
pub use value_range::ValueRange;
pub use value_simplify::ValueSimplify;
pub use will_return::WillReturn;
