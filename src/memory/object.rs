//! An allocation descriptor.

use std::fmt;

use crate::il::{self, Expression};
use crate::memory::Pointer;
use crate::{Error, RC};

/// Reference-counted handle to a `MemoryObject`.
///
/// Objects are shared across every address space that still references
/// them; identity is the allocation, not its contents.
pub type MemoryObjectRef = RC<MemoryObject>;

/// An allocated region of memory.
///
/// The base address is always concrete and orders objects within an address
/// space. The size is an expression: usually a constant, but objects with a
/// symbolic size are allowed and are reachable only through their segment
/// id, never through flat addressing.
#[derive(Clone, Debug)]
pub struct MemoryObject {
    address: u64,
    size: Expression,
    segment: u64,
    user_specified: bool,
}

impl MemoryObject {
    /// Create a new object handle.
    ///
    /// `segment` is a non-zero segment id, or 0 for an address-only object.
    pub fn new(
        address: u64,
        size: Expression,
        segment: u64,
        user_specified: bool,
    ) -> MemoryObjectRef {
        assert!(
            segment != 0 || size.as_constant().is_some(),
            "object with symbolic size must have a segment id"
        );
        RC::new(MemoryObject {
            address,
            size,
            segment,
            user_specified,
        })
    }

    /// The concrete base address.
    pub fn address(&self) -> u64 {
        self.address
    }

    /// The size expression of this object.
    pub fn size(&self) -> &Expression {
        &self.size
    }

    /// The size as a concrete byte count, if the size is constant.
    pub fn concrete_size(&self) -> Option<u64> {
        self.size.as_constant().map(|c| c.value())
    }

    /// The segment id, or 0 for an address-only object.
    pub fn segment(&self) -> u64 {
        self.segment
    }

    /// User-specified objects are excluded from concrete-shadow traffic.
    pub fn is_user_specified(&self) -> bool {
        self.user_specified
    }

    /// The base address as a constant expression at this object's width.
    pub fn base_expr(&self) -> Expression {
        il::expr_const(self.address, self.size.bits())
    }

    /// A 1-bit expression which is true iff the pointer's offset lies within
    /// `[base, base + size)`, or exactly at the base for a zero-sized
    /// object.
    pub fn bounds_check_pointer(&self, pointer: &Pointer) -> Result<Expression, Error> {
        let offset = pointer.offset().clone();
        if self.concrete_size() == Some(0) {
            Expression::cmpeq(offset, self.base_expr())
        } else {
            Expression::cmpltu(
                Expression::sub(offset, self.base_expr())?,
                self.size.clone(),
            )
        }
    }
}

impl fmt::Display for MemoryObject {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "object(0x{:x}, size={}, segment={})",
            self.address, self.size, self.segment
        )
    }
}
