//! Memory objects, per-state contents, and the copy-on-write address space.
//!
//! An `AddressSpace` is the per-execution-state view of all allocations. It
//! maps `MemoryObject`s (allocation descriptors, shared across states) to
//! `ObjectState`s (the bytes a particular state sees). Both maps inside it
//! are persistent, so forking a state shares everything and a write forks
//! only the object it touches.
//!
//! The pointer resolvers also live here: given a `Pointer` whose segment
//! and offset expressions may be symbolic, they enumerate the objects the
//! pointer may refer to, using a `solver::Solver` as the oracle.

pub mod address_space;
pub mod object;
pub mod object_state;
pub mod pointer;
pub mod shadow;

pub use self::address_space::{AddressSpace, ObjectPair, ResolutionList};
pub use self::object::{MemoryObject, MemoryObjectRef};
pub use self::object_state::{ObjectState, ObjectStateRef};
pub use self::pointer::Pointer;
pub use self::shadow::ShadowMemory;
