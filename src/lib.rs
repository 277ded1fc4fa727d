//! Symspace: segmented symbolic address spaces for a symbolic execution VM.
//!
//! A symbolic executor needs to answer one question constantly: given a
//! pointer whose segment and offset may both be symbolic, which allocated
//! objects can it refer to under the current path constraints? Symspace
//! implements the address-space side of that question. A quick synopsis of
//! the modules:
//!
//! * **il** - A small bit-vector expression language. Pointers, object
//!   sizes and solver predicates are all `il::Expression`s.
//! * **map** - A persistent ordered map with floor lookups and seeded
//!   bidirectional iteration. Forking an address space is an O(1) clone.
//! * **memory** - Memory objects, their per-state contents, the
//!   copy-on-write `AddressSpace` and the pointer resolvers.
//! * **solver** - The oracle interface the resolvers query, an SMT-LIB2
//!   process solver, and an exhaustive solver for small problems.
//!
//! ```
//! use symspace::il;
//! use symspace::memory::{AddressSpace, MemoryObject, ObjectState, Pointer};
//! use symspace::solver::{Constraints, ExhaustiveSolver};
//!
//! # fn example() -> Result<(), symspace::Error> {
//! let mut space = AddressSpace::new();
//! let buf = MemoryObject::new(0x1000, il::expr_const(16, 16), 0, false);
//! space.bind_object(buf.clone(), ObjectState::new(16));
//!
//! let pointer = Pointer::flat(il::expr_const(0x1004, 16));
//! let mut solver = ExhaustiveSolver::new();
//! let hit = space.resolve_one(&Constraints::new(), &mut solver, &pointer)?;
//! assert!(hit.is_some());
//! # Ok(())
//! # }
//! ```

use std::rc::Rc;
use thiserror::Error;

pub mod il;
pub mod map;
pub mod memory;
pub mod solver;

/// Reference-counting wrapper used for all shared, immutable-by-sharing
/// structures in the crate.
pub type RC<T> = Rc<T>;

/// Symspace error types.
#[derive(Clone, Debug, Error)]
pub enum Error {
    /// Invalid bitness between expressions.
    #[error("sort error, invalid bitness between expressions")]
    Sort,
    /// Error in evaluation of an arithmetic expression.
    #[error("arithmetic expression evaluation error: {0}")]
    Arithmetic(String),
    /// A free scalar was found while evaluating an expression concretely.
    #[error("scalar \"{0}\" found while evaluating expression concretely")]
    EvalScalar(String),
    /// The solver failed to produce a definite answer.
    #[error("solver failure: {0}")]
    Solver(String),
    #[error("i/o error: {0}")]
    Io(String),
    #[error("{0}")]
    Custom(String),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Error {
        Error::Io(e.to_string())
    }
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(e: std::string::FromUtf8Error) -> Error {
        Error::Io(e.to_string())
    }
}

impl From<std::num::ParseIntError> for Error {
    fn from(e: std::num::ParseIntError) -> Error {
        Error::Custom(e.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Error {
        Error::Custom(s)
    }
}

impl<'a> From<&'a str> for Error {
    fn from(s: &'a str) -> Error {
        Error::Custom(s.to_string())
    }
}
