//! Concrete evaluation of expressions.

use std::collections::BTreeMap;

use crate::il::{BinOp, Constant, Expression};
use crate::Error;

fn sign_extend(constant: &Constant) -> i64 {
    let value = constant.value();
    if constant.bits() >= 64 {
        return value as i64;
    }
    let mask: u64 = !0 << constant.bits();
    if value & (1 << (constant.bits() - 1)) != 0 {
        (value | mask) as i64
    } else {
        value as i64
    }
}

/// Evaluate an expression with no free scalars down to a constant.
///
/// # Error
/// The expression contains a scalar, or an arithmetic error such as division
/// by zero occurs.
pub fn eval(expr: &Expression) -> Result<Constant, Error> {
    match expr {
        Expression::Scalar(scalar) => Err(Error::EvalScalar(scalar.name().to_string())),
        Expression::Constant(constant) => Ok(constant.clone()),
        Expression::Binary(op, lhs_, rhs_) => {
            let lhs = eval(lhs_)?;
            let rhs = eval(rhs_)?;
            let bits = lhs.bits();
            let truth = |t: bool| Constant::new(t as u64, 1);
            match op {
                BinOp::Add => Ok(Constant::new(lhs.value().wrapping_add(rhs.value()), bits)),
                BinOp::Sub => Ok(Constant::new(lhs.value().wrapping_sub(rhs.value()), bits)),
                BinOp::Mul => Ok(Constant::new(lhs.value().wrapping_mul(rhs.value()), bits)),
                BinOp::Divu => {
                    if rhs.value() == 0 {
                        return Err(Error::Arithmetic("division by zero".to_string()));
                    }
                    Ok(Constant::new(lhs.value() / rhs.value(), bits))
                }
                BinOp::Modu => {
                    if rhs.value() == 0 {
                        return Err(Error::Arithmetic("division by zero".to_string()));
                    }
                    Ok(Constant::new(lhs.value() % rhs.value(), bits))
                }
                BinOp::Divs => {
                    if rhs.value() == 0 {
                        return Err(Error::Arithmetic("division by zero".to_string()));
                    }
                    let r = sign_extend(&lhs).wrapping_div(sign_extend(&rhs));
                    Ok(Constant::new(r as u64, bits))
                }
                BinOp::Mods => {
                    if rhs.value() == 0 {
                        return Err(Error::Arithmetic("division by zero".to_string()));
                    }
                    let r = sign_extend(&lhs).wrapping_rem(sign_extend(&rhs));
                    Ok(Constant::new(r as u64, bits))
                }
                BinOp::And => Ok(Constant::new(lhs.value() & rhs.value(), bits)),
                BinOp::Or => Ok(Constant::new(lhs.value() | rhs.value(), bits)),
                BinOp::Xor => Ok(Constant::new(lhs.value() ^ rhs.value(), bits)),
                BinOp::Shl => {
                    let r = if rhs.value() >= bits as u64 {
                        0
                    } else {
                        lhs.value() << rhs.value()
                    };
                    Ok(Constant::new(r, bits))
                }
                BinOp::Shr => {
                    let r = if rhs.value() >= bits as u64 {
                        0
                    } else {
                        lhs.value() >> rhs.value()
                    };
                    Ok(Constant::new(r, bits))
                }
                BinOp::Cmpeq => Ok(truth(lhs.value() == rhs.value())),
                BinOp::Cmpneq => Ok(truth(lhs.value() != rhs.value())),
                BinOp::Cmpltu => Ok(truth(lhs.value() < rhs.value())),
                BinOp::Cmplts => Ok(truth(sign_extend(&lhs) < sign_extend(&rhs))),
            }
        }
        Expression::Zext(bits, src) | Expression::Trun(bits, src) => {
            Ok(Constant::new(eval(src)?.value(), *bits))
        }
        Expression::Sext(bits, src) => {
            let src = eval(src)?;
            Ok(Constant::new(sign_extend(&src) as u64, *bits))
        }
    }
}

/// Replace scalars in the expression with constants from the given binding.
///
/// Scalars absent from the binding are left in place.
pub fn substitute(
    expr: &Expression,
    bindings: &BTreeMap<String, Constant>,
) -> Result<Expression, Error> {
    Ok(match expr {
        Expression::Scalar(scalar) => match bindings.get(scalar.name()) {
            Some(constant) => constant.clone().into(),
            None => expr.clone(),
        },
        Expression::Constant(_) => expr.clone(),
        Expression::Binary(op, lhs, rhs) => Expression::binary(
            *op,
            substitute(lhs, bindings)?,
            substitute(rhs, bindings)?,
        )?,
        Expression::Zext(bits, src) => Expression::zext(*bits, substitute(src, bindings)?)?,
        Expression::Sext(bits, src) => Expression::sext(*bits, substitute(src, bindings)?)?,
        Expression::Trun(bits, src) => Expression::trun(*bits, substitute(src, bindings)?)?,
    })
}
