//! Rendering expressions as SMT-LIB2 text.

use std::collections::BTreeSet;

use crate::il::{BinOp, Expression};

/// Convert an expression to its smtlib2 equivalent.
pub fn expr_to_smtlib2(expr: &Expression) -> String {
    match expr {
        Expression::Constant(c) => {
            if c.bits() == 1 {
                format!("#b{}", c.value())
            } else if c.bits() % 4 == 0 {
                format!("#x{:01$x}", c.value(), c.bits() / 4)
            } else {
                format!("(_ bv{} {})", c.value(), c.bits())
            }
        }
        Expression::Scalar(s) => s.name().to_string(),
        Expression::Binary(op, lhs, rhs) => {
            let lhs = expr_to_smtlib2(lhs);
            let rhs = expr_to_smtlib2(rhs);
            match op {
                BinOp::Add => format!("(bvadd {} {})", lhs, rhs),
                BinOp::Sub => format!("(bvsub {} {})", lhs, rhs),
                BinOp::Mul => format!("(bvmul {} {})", lhs, rhs),
                BinOp::Divu => format!("(bvudiv {} {})", lhs, rhs),
                BinOp::Modu => format!("(bvurem {} {})", lhs, rhs),
                BinOp::Divs => format!("(bvsdiv {} {})", lhs, rhs),
                BinOp::Mods => format!("(bvsrem {} {})", lhs, rhs),
                BinOp::And => format!("(bvand {} {})", lhs, rhs),
                BinOp::Or => format!("(bvor {} {})", lhs, rhs),
                BinOp::Xor => format!("(bvxor {} {})", lhs, rhs),
                BinOp::Shl => format!("(bvshl {} {})", lhs, rhs),
                BinOp::Shr => format!("(bvlshr {} {})", lhs, rhs),
                BinOp::Cmpeq => format!("(ite (= {} {}) #b1 #b0)", lhs, rhs),
                BinOp::Cmpneq => format!("(ite (distinct {} {}) #b1 #b0)", lhs, rhs),
                BinOp::Cmpltu => format!("(ite (bvult {} {}) #b1 #b0)", lhs, rhs),
                BinOp::Cmplts => format!("(ite (bvslt {} {}) #b1 #b0)", lhs, rhs),
            }
        }
        Expression::Zext(bits, src) => format!(
            "(concat (_ bv0 {}) {})",
            bits - src.bits(),
            expr_to_smtlib2(src)
        ),
        Expression::Sext(bits, src) => format!(
            "((_ sign_extend {}) {})",
            bits - src.bits(),
            expr_to_smtlib2(src)
        ),
        Expression::Trun(bits, src) => {
            format!("((_ extract {} 0) {})", bits - 1, expr_to_smtlib2(src))
        }
    }
}

/// `declare-fun` lines for every scalar appearing in the given expressions,
/// sorted and deduplicated.
pub fn declarations<'a, I>(exprs: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a Expression>,
{
    let mut scalars: BTreeSet<(String, usize)> = BTreeSet::new();
    for expr in exprs {
        for scalar in expr.collect_scalars() {
            scalars.insert((scalar.name().to_string(), scalar.bits()));
        }
    }
    scalars
        .into_iter()
        .map(|(name, bits)| format!("(declare-fun {} () (_ BitVec {}))", name, bits))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::il;

    #[test]
    fn constants_render_by_width() {
        assert_eq!(expr_to_smtlib2(&il::expr_const(1, 1)), "#b1");
        assert_eq!(expr_to_smtlib2(&il::expr_const(0xff, 16)), "#x00ff");
        assert_eq!(expr_to_smtlib2(&il::expr_const(5, 3)), "(_ bv5 3)");
    }

    #[test]
    fn comparison_renders_as_ite() {
        let expr = il::Expression::cmpltu(il::expr_scalar("x", 8), il::expr_const(4, 8)).unwrap();
        assert_eq!(expr_to_smtlib2(&expr), "(ite (bvult x #x04) #b1 #b0)");
    }

    #[test]
    fn declarations_dedupe() {
        let a = il::Expression::add(il::expr_scalar("x", 8), il::expr_scalar("x", 8)).unwrap();
        let b = il::expr_scalar("y", 16);
        let decls = declarations([&a, &b]);
        assert_eq!(
            decls,
            vec![
                "(declare-fun x () (_ BitVec 8))".to_string(),
                "(declare-fun y () (_ BitVec 16))".to_string(),
            ]
        );
    }
}
