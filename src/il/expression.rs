use serde::{Deserialize, Serialize};
use std::fmt;

use crate::il::{Constant, Scalar};
use crate::Error;

/// Binary operators over bit-vectors.
///
/// Comparison operators produce 1-bit results; all other operators produce
/// results at the width of their operands.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Divu,
    Modu,
    Divs,
    Mods,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Cmpeq,
    Cmpneq,
    Cmpltu,
    Cmplts,
}

impl BinOp {
    /// True for operators which produce a 1-bit truth value.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Cmpeq | BinOp::Cmpneq | BinOp::Cmpltu | BinOp::Cmplts
        )
    }

    fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Divu => "/u",
            BinOp::Modu => "%u",
            BinOp::Divs => "/s",
            BinOp::Mods => "%s",
            BinOp::And => "&",
            BinOp::Or => "|",
            BinOp::Xor => "^",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::Cmpeq => "==",
            BinOp::Cmpneq => "!=",
            BinOp::Cmpltu => "<u",
            BinOp::Cmplts => "<s",
        }
    }
}

/// An expression over bit-vectors.
///
/// Expressions are trees of operators over `Constant` and `Scalar` leaves.
/// The constructors check sorts and are the only way to build compound
/// expressions, so a well-typed `Expression` stays well-typed.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Expression {
    Constant(Constant),
    Scalar(Scalar),
    Binary(BinOp, Box<Expression>, Box<Expression>),
    Zext(usize, Box<Expression>),
    Sext(usize, Box<Expression>),
    Trun(usize, Box<Expression>),
}

impl Expression {
    /// Return the bit-sort of this expression.
    pub fn bits(&self) -> usize {
        match self {
            Expression::Constant(constant) => constant.bits(),
            Expression::Scalar(scalar) => scalar.bits(),
            Expression::Binary(op, lhs, _) => {
                if op.is_comparison() {
                    1
                } else {
                    lhs.bits()
                }
            }
            Expression::Zext(bits, _) | Expression::Sext(bits, _) | Expression::Trun(bits, _) => {
                *bits
            }
        }
    }

    /// Create a new expression from a constant.
    pub fn constant(constant: Constant) -> Expression {
        Expression::Constant(constant)
    }

    /// Create a new expression from a scalar.
    pub fn scalar(scalar: Scalar) -> Expression {
        Expression::Scalar(scalar)
    }

    /// If this expression is a constant leaf, return it.
    ///
    /// This is a structural test. A compound expression over constants does
    /// not count; fold it with `il::eval` first if that is what you mean.
    pub fn as_constant(&self) -> Option<&Constant> {
        match self {
            Expression::Constant(constant) => Some(constant),
            _ => None,
        }
    }

    /// True if this expression contains no scalars.
    pub fn all_constants(&self) -> bool {
        match self {
            Expression::Constant(_) => true,
            Expression::Scalar(_) => false,
            Expression::Binary(_, lhs, rhs) => lhs.all_constants() && rhs.all_constants(),
            Expression::Zext(_, src) | Expression::Sext(_, src) | Expression::Trun(_, src) => {
                src.all_constants()
            }
        }
    }

    /// Returns all scalars used in this expression.
    pub fn collect_scalars(&self) -> Vec<&Scalar> {
        let mut scalars = Vec::new();
        self.collect_scalars_into(&mut scalars);
        scalars
    }

    fn collect_scalars_into<'a>(&'a self, scalars: &mut Vec<&'a Scalar>) {
        match self {
            Expression::Constant(_) => {}
            Expression::Scalar(scalar) => scalars.push(scalar),
            Expression::Binary(_, lhs, rhs) => {
                lhs.collect_scalars_into(scalars);
                rhs.collect_scalars_into(scalars);
            }
            Expression::Zext(_, src) | Expression::Sext(_, src) | Expression::Trun(_, src) => {
                src.collect_scalars_into(scalars)
            }
        }
    }

    /// Ensures the sorts of both lhs and rhs are the same. If `no_flags` is
    /// true, also ensures the operands are not 0-width.
    fn ensure_sort(lhs: &Expression, rhs: &Expression, no_flags: bool) -> Result<(), Error> {
        if lhs.bits() != rhs.bits() || (no_flags && lhs.bits() == 0) {
            Err(Error::Sort)
        } else {
            Ok(())
        }
    }

    /// Create a binary expression over the given operands.
    /// # Error
    /// The sorts of the lhs and rhs differ.
    pub fn binary(op: BinOp, lhs: Expression, rhs: Expression) -> Result<Expression, Error> {
        Expression::ensure_sort(&lhs, &rhs, !op.is_comparison())?;
        Ok(Expression::Binary(op, Box::new(lhs), Box::new(rhs)))
    }

    pub fn add(lhs: Expression, rhs: Expression) -> Result<Expression, Error> {
        Expression::binary(BinOp::Add, lhs, rhs)
    }

    pub fn sub(lhs: Expression, rhs: Expression) -> Result<Expression, Error> {
        Expression::binary(BinOp::Sub, lhs, rhs)
    }

    pub fn mul(lhs: Expression, rhs: Expression) -> Result<Expression, Error> {
        Expression::binary(BinOp::Mul, lhs, rhs)
    }

    pub fn divu(lhs: Expression, rhs: Expression) -> Result<Expression, Error> {
        Expression::binary(BinOp::Divu, lhs, rhs)
    }

    pub fn modu(lhs: Expression, rhs: Expression) -> Result<Expression, Error> {
        Expression::binary(BinOp::Modu, lhs, rhs)
    }

    pub fn divs(lhs: Expression, rhs: Expression) -> Result<Expression, Error> {
        Expression::binary(BinOp::Divs, lhs, rhs)
    }

    pub fn mods(lhs: Expression, rhs: Expression) -> Result<Expression, Error> {
        Expression::binary(BinOp::Mods, lhs, rhs)
    }

    pub fn and(lhs: Expression, rhs: Expression) -> Result<Expression, Error> {
        Expression::binary(BinOp::And, lhs, rhs)
    }

    pub fn or(lhs: Expression, rhs: Expression) -> Result<Expression, Error> {
        Expression::binary(BinOp::Or, lhs, rhs)
    }

    pub fn xor(lhs: Expression, rhs: Expression) -> Result<Expression, Error> {
        Expression::binary(BinOp::Xor, lhs, rhs)
    }

    pub fn shl(lhs: Expression, rhs: Expression) -> Result<Expression, Error> {
        Expression::binary(BinOp::Shl, lhs, rhs)
    }

    pub fn shr(lhs: Expression, rhs: Expression) -> Result<Expression, Error> {
        Expression::binary(BinOp::Shr, lhs, rhs)
    }

    /// Create an equality comparison expression.
    pub fn cmpeq(lhs: Expression, rhs: Expression) -> Result<Expression, Error> {
        Expression::binary(BinOp::Cmpeq, lhs, rhs)
    }

    /// Create an inequality comparison expression.
    pub fn cmpneq(lhs: Expression, rhs: Expression) -> Result<Expression, Error> {
        Expression::binary(BinOp::Cmpneq, lhs, rhs)
    }

    /// Create an unsigned less-than comparison expression.
    pub fn cmpltu(lhs: Expression, rhs: Expression) -> Result<Expression, Error> {
        Expression::binary(BinOp::Cmpltu, lhs, rhs)
    }

    /// Create a signed less-than comparison expression.
    pub fn cmplts(lhs: Expression, rhs: Expression) -> Result<Expression, Error> {
        Expression::binary(BinOp::Cmplts, lhs, rhs)
    }

    /// Create an unsigned greater-or-equal comparison expression,
    /// synthesized as `(lhs <u rhs) == 0`.
    pub fn cmpgeu(lhs: Expression, rhs: Expression) -> Result<Expression, Error> {
        Expression::is_zero(Expression::cmpltu(lhs, rhs)?)
    }

    /// Create a 1-bit expression which is true iff `expr` is zero.
    pub fn is_zero(expr: Expression) -> Result<Expression, Error> {
        let bits = expr.bits();
        Expression::cmpeq(expr, Expression::constant(Constant::new(0, bits)))
    }

    /// Create an expression to zero-extend src to the number of bits
    /// specified.
    /// # Error
    /// src has more than or equal to the number of bits specified.
    pub fn zext(bits: usize, src: Expression) -> Result<Expression, Error> {
        if src.bits() >= bits || src.bits() == 0 {
            return Err(Error::Sort);
        }
        Ok(Expression::Zext(bits, Box::new(src)))
    }

    /// Create an expression to sign-extend src to the number of bits
    /// specified.
    /// # Error
    /// src has more than or equal to the number of bits specified.
    pub fn sext(bits: usize, src: Expression) -> Result<Expression, Error> {
        if src.bits() >= bits || src.bits() == 0 {
            return Err(Error::Sort);
        }
        Ok(Expression::Sext(bits, Box::new(src)))
    }

    /// Create an expression to truncate src to the number of bits specified.
    /// # Error
    /// src has less than or equal to the number of bits specified.
    pub fn trun(bits: usize, src: Expression) -> Result<Expression, Error> {
        if src.bits() <= bits || bits == 0 {
            return Err(Error::Sort);
        }
        Ok(Expression::Trun(bits, Box::new(src)))
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Expression::Constant(c) => c.fmt(f),
            Expression::Scalar(s) => s.fmt(f),
            Expression::Binary(op, lhs, rhs) => write!(f, "({} {} {})", lhs, op.symbol(), rhs),
            Expression::Zext(bits, src) => write!(f, "zext.{}({})", bits, src),
            Expression::Sext(bits, src) => write!(f, "sext.{}({})", bits, src),
            Expression::Trun(bits, src) => write!(f, "trun.{}({})", bits, src),
        }
    }
}
