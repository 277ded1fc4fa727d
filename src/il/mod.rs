//! A small bit-vector expression language.
//!
//! Pointers, object sizes, path constraints and solver predicates are all
//! `Expression`s. Construction is checked: binary operators require both
//! operands to share a sort (bit-width) and return `Result`.

pub mod constant;
pub mod eval;
pub mod expression;
pub mod scalar;

pub use self::constant::Constant;
pub use self::eval::{eval, substitute};
pub use self::expression::{BinOp, Expression};
pub use self::scalar::Scalar;

/// A convenience function to create a new constant.
///
/// This is the preferred way to create a `Constant`.
pub fn const_(value: u64, bits: usize) -> Constant {
    Constant::new(value, bits)
}

/// A convenience function to create a new expression constant.
///
/// This is the preferred way to create an `Expression::Constant`.
pub fn expr_const(value: u64, bits: usize) -> Expression {
    Expression::constant(Constant::new(value, bits))
}

/// A convenience function to create a new scalar.
///
/// This is the preferred way to create a `Scalar`.
pub fn scalar<S>(name: S, bits: usize) -> Scalar
where
    S: Into<String>,
{
    Scalar::new(name, bits)
}

/// A convenience function to create a new expression scalar.
///
/// This is the preferred way to create an `Expression::Scalar`.
pub fn expr_scalar<S>(name: S, bits: usize) -> Expression
where
    S: Into<String>,
{
    Expression::scalar(Scalar::new(name, bits))
}
