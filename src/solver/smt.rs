//! A solver backed by a `z3` child process.

use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use std::io::Write;
use std::process::{Command, Stdio};

use crate::il::{self, Expression};
use crate::solver::smtlib::{declarations, expr_to_smtlib2};
use crate::solver::{Constraints, Solver};
use crate::Error;

/// A solver which runs one `z3 -in` process per query.
///
/// Queries are rendered as SMT-LIB2 text; constraints are asserted as 1-bit
/// values equal to `#b1`. Any process, parse or unsat-on-`get_value`
/// condition surfaces as `Error::Solver`, which the resolvers treat as
/// oracle failure.
#[derive(Clone, Debug)]
pub struct SmtSolver {
    z3: String,
}

impl SmtSolver {
    pub fn new() -> SmtSolver {
        SmtSolver {
            z3: "z3".to_string(),
        }
    }

    /// Use a specific solver binary instead of `z3` from the path.
    pub fn with_binary<S: Into<String>>(z3: S) -> SmtSolver {
        SmtSolver { z3: z3.into() }
    }

    fn query(&self, lines: &[String]) -> Result<String, Error> {
        let input = lines.join("\n");
        debug!("smt query:\n{}", input);

        let mut child = Command::new(&self.z3)
            .arg("-in")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        match child.stdin.take() {
            Some(mut stdin) => {
                stdin.write_all(input.as_bytes())?;
                stdin.write_all(b"\n")?;
            }
            None => {
                let _ = child.kill();
                return Err(Error::Solver("failed to open solver stdin".to_string()));
            }
        }

        let output = child.wait_with_output()?;
        let output = String::from_utf8(output.stdout)?;
        debug!("smt reply: {}", output.trim_end());
        Ok(output)
    }

    fn preamble(&self, constraints: &Constraints, exprs: &[&Expression]) -> Vec<String> {
        let mut lines = vec![
            "(set-option :produce-models true)".to_string(),
            "(set-logic QF_BV)".to_string(),
        ];
        lines.extend(declarations(
            constraints.iter().chain(exprs.iter().copied()),
        ));
        for constraint in constraints.iter() {
            lines.push(format!("(assert (= #b1 {}))", expr_to_smtlib2(constraint)));
        }
        lines
    }

    fn check_sat(&self, constraints: &Constraints, expr: &Expression) -> Result<bool, Error> {
        let mut lines = self.preamble(constraints, &[expr]);
        lines.push(format!("(assert (= #b1 {}))", expr_to_smtlib2(expr)));
        lines.push("(check-sat)".to_string());

        let output = self.query(&lines)?;
        if output.contains("unsat") {
            Ok(false)
        } else if output.contains("sat") {
            Ok(true)
        } else {
            Err(Error::Solver(format!("unexpected solver reply: {}", output)))
        }
    }
}

impl Default for SmtSolver {
    fn default() -> SmtSolver {
        SmtSolver::new()
    }
}

impl Solver for SmtSolver {
    fn get_value(
        &mut self,
        constraints: &Constraints,
        expr: &Expression,
    ) -> Result<il::Constant, Error> {
        lazy_static! {
            static ref RE16: Regex = Regex::new("EVAL_RESULT #x([0-9a-f]+)").unwrap();
            static ref RE2: Regex = Regex::new("EVAL_RESULT #b([0-1]+)").unwrap();
        }

        let mut lines = self.preamble(constraints, &[expr]);
        lines.push(format!(
            "(declare-fun EVAL_RESULT () (_ BitVec {}))",
            expr.bits()
        ));
        lines.push(format!(
            "(assert (= EVAL_RESULT {}))",
            expr_to_smtlib2(expr)
        ));
        lines.push("(check-sat)".to_string());
        lines.push("(get-value (EVAL_RESULT))".to_string());

        let output = self.query(&lines)?;
        if output.contains("unsat") {
            return Err(Error::Solver(
                "get_value query is unsatisfiable".to_string(),
            ));
        }

        if let Some(caps) = RE16.captures(&output) {
            let value = u64::from_str_radix(&caps[1], 16)?;
            return Ok(il::const_(value, expr.bits()));
        }
        if let Some(caps) = RE2.captures(&output) {
            let value = u64::from_str_radix(&caps[1], 2)?;
            return Ok(il::const_(value, expr.bits()));
        }

        Err(Error::Solver(format!(
            "no value in solver reply: {}",
            output
        )))
    }

    fn may_be_true(
        &mut self,
        constraints: &Constraints,
        expr: &Expression,
    ) -> Result<bool, Error> {
        self.check_sat(constraints, expr)
    }

    fn must_be_true(
        &mut self,
        constraints: &Constraints,
        expr: &Expression,
    ) -> Result<bool, Error> {
        let negated = Expression::is_zero(expr.clone())?;
        Ok(!self.check_sat(constraints, &negated)?)
    }
}
