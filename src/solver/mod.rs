//! The oracle interface the pointer resolvers query, and two
//! implementations of it.
//!
//! `SmtSolver` hands queries to a `z3` child process over SMT-LIB2 text.
//! `ExhaustiveSolver` decides queries by enumerating every assignment to
//! the free scalars, which is complete for small model spaces and needs no
//! external binary.

pub mod exhaustive;
pub mod smt;
pub mod smtlib;

pub use self::exhaustive::ExhaustiveSolver;
pub use self::smt::SmtSolver;

use crate::il::{self, Expression};
use crate::Error;

/// The path constraints of one execution state.
///
/// Constraints are 1-bit expressions which must all be true. Adding a
/// constraint that folds to a constant false records a canonical
/// contradiction, so an unsatisfiable state stays visibly unsatisfiable.
#[derive(Clone, Debug, Default)]
pub struct Constraints {
    constraints: Vec<Expression>,
}

impl Constraints {
    pub fn new() -> Constraints {
        Constraints {
            constraints: Vec::new(),
        }
    }

    /// Add a constraint to this set.
    pub fn add(&mut self, constraint: Expression) -> Result<(), Error> {
        if constraint.all_constants() {
            if !il::eval(&constraint)?.is_one() {
                self.constraints.push(Expression::cmpeq(
                    il::expr_const(0, 1),
                    il::expr_const(1, 1),
                )?);
            }
        } else {
            self.constraints.push(constraint);
        }
        Ok(())
    }

    pub fn iter(&self) -> std::slice::Iter<Expression> {
        self.constraints.iter()
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }
}

/// The oracle consulted during pointer resolution.
///
/// Every operation may fail; the resolvers propagate failure unchanged
/// (single resolution) or report the enumeration as incomplete (multi
/// resolution). No operation retries.
pub trait Solver {
    /// Sample any value of `expr` satisfying the constraints.
    fn get_value(&mut self, constraints: &Constraints, expr: &Expression)
        -> Result<il::Constant, Error>;

    /// Is `expr` satisfiable together with the constraints?
    fn may_be_true(&mut self, constraints: &Constraints, expr: &Expression)
        -> Result<bool, Error>;

    /// Does `expr` hold in every model of the constraints?
    fn must_be_true(
        &mut self,
        constraints: &Constraints,
        expr: &Expression,
    ) -> Result<bool, Error> {
        // valid iff the negation is unsatisfiable
        let negated = Expression::is_zero(expr.clone())?;
        Ok(!self.may_be_true(constraints, &negated)?)
    }
}
