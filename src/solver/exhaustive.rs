//! A complete oracle for small model spaces.

use std::collections::BTreeMap;

use crate::il::{self, Constant, Expression};
use crate::solver::{Constraints, Solver};
use crate::Error;

/// A solver that enumerates every assignment to the free scalars.
///
/// Decision by enumeration is exact: `may_be_true` finds a witness,
/// `must_be_true` finds no counterexample, `get_value` returns the value of
/// the numerically smallest satisfying model. Model spaces wider than the
/// configured limit are refused as a solver failure.
#[derive(Clone, Debug)]
pub struct ExhaustiveSolver {
    max_model_bits: usize,
}

impl ExhaustiveSolver {
    pub fn new() -> ExhaustiveSolver {
        ExhaustiveSolver { max_model_bits: 20 }
    }

    pub fn with_max_model_bits(max_model_bits: usize) -> ExhaustiveSolver {
        ExhaustiveSolver { max_model_bits }
    }

    /// The scalars of the constraints and the query, in name order.
    fn scalars(
        &self,
        constraints: &Constraints,
        expr: &Expression,
    ) -> Result<Vec<(String, usize)>, Error> {
        let mut scalars: BTreeMap<String, usize> = BTreeMap::new();
        for expr in constraints.iter().chain(std::iter::once(expr)) {
            for scalar in expr.collect_scalars() {
                scalars.insert(scalar.name().to_string(), scalar.bits());
            }
        }

        let total_bits: usize = scalars.values().sum();
        if total_bits > self.max_model_bits {
            return Err(Error::Solver(format!(
                "model space of {} bits exceeds exhaustive limit of {}",
                total_bits, self.max_model_bits
            )));
        }
        Ok(scalars.into_iter().collect())
    }

    fn bindings(scalars: &[(String, usize)], mut model: u64) -> BTreeMap<String, Constant> {
        let mut bindings = BTreeMap::new();
        for (name, bits) in scalars {
            bindings.insert(name.clone(), il::const_(model, *bits));
            model >>= bits;
        }
        bindings
    }

    fn holds(expr: &Expression, bindings: &BTreeMap<String, Constant>) -> Result<bool, Error> {
        Ok(il::eval(&il::substitute(expr, bindings)?)?.is_one())
    }

    fn satisfies(
        constraints: &Constraints,
        bindings: &BTreeMap<String, Constant>,
    ) -> Result<bool, Error> {
        for constraint in constraints.iter() {
            if !Self::holds(constraint, bindings)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Run `f` over every model of the constraints until it returns
    /// `Some`.
    fn search<T>(
        &self,
        constraints: &Constraints,
        expr: &Expression,
        mut f: impl FnMut(&BTreeMap<String, Constant>) -> Result<Option<T>, Error>,
    ) -> Result<Option<T>, Error> {
        let scalars = self.scalars(constraints, expr)?;
        let total_bits: usize = scalars.iter().map(|(_, bits)| bits).sum();
        let models: u64 = 1 << total_bits;

        for model in 0..models {
            let bindings = Self::bindings(&scalars, model);
            if !Self::satisfies(constraints, &bindings)? {
                continue;
            }
            if let Some(result) = f(&bindings)? {
                return Ok(Some(result));
            }
        }
        Ok(None)
    }
}

impl Default for ExhaustiveSolver {
    fn default() -> ExhaustiveSolver {
        ExhaustiveSolver::new()
    }
}

impl Solver for ExhaustiveSolver {
    fn get_value(
        &mut self,
        constraints: &Constraints,
        expr: &Expression,
    ) -> Result<Constant, Error> {
        let value = self.search(constraints, expr, |bindings| {
            Ok(Some(il::eval(&il::substitute(expr, bindings)?)?))
        })?;
        value.ok_or_else(|| Error::Solver("constraints are unsatisfiable".to_string()))
    }

    fn may_be_true(
        &mut self,
        constraints: &Constraints,
        expr: &Expression,
    ) -> Result<bool, Error> {
        let witness = self.search(constraints, expr, |bindings| {
            if Self::holds(expr, bindings)? {
                Ok(Some(()))
            } else {
                Ok(None)
            }
        })?;
        Ok(witness.is_some())
    }

    fn must_be_true(
        &mut self,
        constraints: &Constraints,
        expr: &Expression,
    ) -> Result<bool, Error> {
        let counterexample = self.search(constraints, expr, |bindings| {
            if Self::holds(expr, bindings)? {
                Ok(None)
            } else {
                Ok(Some(()))
            }
        })?;
        Ok(counterexample.is_none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constrain_to_one_or_two(x: &Expression) -> Constraints {
        let mut constraints = Constraints::new();
        constraints
            .add(
                Expression::or(
                    Expression::cmpeq(x.clone(), il::expr_const(1, 8)).unwrap(),
                    Expression::cmpeq(x.clone(), il::expr_const(2, 8)).unwrap(),
                )
                .unwrap(),
            )
            .unwrap();
        constraints
    }

    #[test]
    fn oracle_answers() {
        let x = il::expr_scalar("x", 8);
        let constraints = constrain_to_one_or_two(&x);
        let mut solver = ExhaustiveSolver::new();

        let one = Expression::cmpeq(x.clone(), il::expr_const(1, 8)).unwrap();
        let three = Expression::cmpeq(x.clone(), il::expr_const(3, 8)).unwrap();
        let below_ten = Expression::cmpltu(x.clone(), il::expr_const(10, 8)).unwrap();

        assert!(solver.may_be_true(&constraints, &one).unwrap());
        assert!(!solver.may_be_true(&constraints, &three).unwrap());
        assert!(solver.must_be_true(&constraints, &below_ten).unwrap());
        assert!(!solver.must_be_true(&constraints, &one).unwrap());
    }

    #[test]
    fn get_value_returns_smallest_model() {
        let x = il::expr_scalar("x", 8);
        let constraints = constrain_to_one_or_two(&x);
        let mut solver = ExhaustiveSolver::new();

        assert_eq!(solver.get_value(&constraints, &x).unwrap().value(), 1);
    }

    #[test]
    fn unsat_constraints_fail_get_value() {
        let x = il::expr_scalar("x", 8);
        let mut constraints = Constraints::new();
        constraints
            .add(Expression::cmpltu(x.clone(), il::expr_const(0, 8)).unwrap())
            .unwrap();

        let mut solver = ExhaustiveSolver::new();
        assert!(solver.get_value(&constraints, &x).is_err());
        // vacuous validity under unsatisfiable constraints
        assert!(solver
            .must_be_true(&constraints, &Expression::is_zero(x).unwrap())
            .unwrap());
    }

    #[test]
    fn oversized_model_space_is_a_solver_failure() {
        let x = il::expr_scalar("x", 64);
        let mut solver = ExhaustiveSolver::new();
        assert!(solver.get_value(&Constraints::new(), &x).is_err());
    }
}
