//! Assertion expression language: lex, parse, evaluate.
//!
//! Assertions are small boolean expressions over extracted values and
//! execution metadata (`cov >= 80 && exit_code == 0`). Expressions are parsed
//! once at config load time; evaluation is total — undefined identifiers
//! resolve to the empty value and division by zero yields 0, so a valid
//! expression always produces a boolean.

mod lexer;
mod parser;
mod value;

pub use parser::{Ast, BinaryOp, UnaryOp};
pub use value::{format_number, Value};

use std::cmp::Ordering;
use std::collections::HashMap;

/// Parse diagnostic with a caret pointing at the offender.
///
/// Renders as three lines: the message, the source expression, and a caret
/// positioned under the offending character ((1-based position − 1) spaces
/// before the `^`).
#[derive(Debug, Clone)]
pub struct ExprError {
    pub message: String,
    pub input: String,
    /// Byte offset of the offending position (0-based).
    pub pos: usize,
}

impl ExprError {
    pub(crate) fn at(input: &str, pos: usize, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            input: input.to_string(),
            pos,
        }
    }
}

impl std::fmt::Display for ExprError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}\n{}\n{}^",
            self.message,
            self.input,
            " ".repeat(self.pos)
        )
    }
}

impl std::error::Error for ExprError {}

/// A compiled assertion expression.
///
/// Holds the AST plus the original source for diagnostics and round-trip
/// serialization of the config.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    source: String,
    ast: Ast,
}

impl Program {
    /// Compile an assertion, rejecting syntax errors with caret diagnostics.
    pub fn parse(input: &str) -> Result<Self, ExprError> {
        let ast = parser::parse(input)?;
        Ok(Self {
            source: input.to_string(),
            ast,
        })
    }

    /// The original expression text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate against a string-keyed environment.
    pub fn eval(&self, env: &HashMap<String, String>) -> Value {
        eval_ast(&self.ast, env)
    }

    /// Evaluate and collapse to a boolean via truthiness.
    pub fn eval_bool(&self, env: &HashMap<String, String>) -> bool {
        self.eval(env).truthy()
    }
}

impl serde::Serialize for Program {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

fn eval_ast(ast: &Ast, env: &HashMap<String, String>) -> Value {
    match ast {
        Ast::Number(n) => Value::Number(*n),
        Ast::Str(s) => Value::Str(s.clone()),
        Ast::Bool(b) => Value::Bool(*b),
        // Undefined identifiers are the empty value; this keeps
        // short-circuit guards like `cov && cov >= 80` usable when an
        // extraction produced nothing.
        Ast::Ident(name) => Value::Str(env.get(name).cloned().unwrap_or_default()),
        Ast::Unary { op, operand } => {
            let v = eval_ast(operand, env);
            match op {
                UnaryOp::Not => Value::Bool(!v.truthy()),
                UnaryOp::Neg => Value::Number(-v.number_or_zero()),
            }
        }
        Ast::Binary { op, lhs, rhs } => match op {
            BinaryOp::Or => {
                let l = eval_ast(lhs, env);
                if l.truthy() {
                    Value::Bool(true)
                } else {
                    Value::Bool(eval_ast(rhs, env).truthy())
                }
            }
            BinaryOp::And => {
                let l = eval_ast(lhs, env);
                if !l.truthy() {
                    Value::Bool(false)
                } else {
                    Value::Bool(eval_ast(rhs, env).truthy())
                }
            }
            BinaryOp::Eq => Value::Bool(eval_ast(lhs, env).loose_eq(&eval_ast(rhs, env))),
            BinaryOp::Ne => Value::Bool(!eval_ast(lhs, env).loose_eq(&eval_ast(rhs, env))),
            BinaryOp::Lt => cmp_bool(lhs, rhs, env, |o| o == Ordering::Less),
            BinaryOp::Le => cmp_bool(lhs, rhs, env, |o| o != Ordering::Greater),
            BinaryOp::Gt => cmp_bool(lhs, rhs, env, |o| o == Ordering::Greater),
            BinaryOp::Ge => cmp_bool(lhs, rhs, env, |o| o != Ordering::Less),
            BinaryOp::Add => arith(lhs, rhs, env, |a, b| a + b),
            BinaryOp::Sub => arith(lhs, rhs, env, |a, b| a - b),
            BinaryOp::Mul => arith(lhs, rhs, env, |a, b| a * b),
            BinaryOp::Div => {
                let a = eval_ast(lhs, env).number_or_zero();
                let b = eval_ast(rhs, env).number_or_zero();
                // Division by zero yields 0 rather than an error.
                if b == 0.0 {
                    Value::Number(0.0)
                } else {
                    Value::Number(a / b)
                }
            }
        },
    }
}

fn cmp_bool(
    lhs: &Ast,
    rhs: &Ast,
    env: &HashMap<String, String>,
    accept: impl Fn(Ordering) -> bool,
) -> Value {
    let l = eval_ast(lhs, env);
    let r = eval_ast(rhs, env);
    Value::Bool(accept(l.loose_cmp(&r)))
}

fn arith(
    lhs: &Ast,
    rhs: &Ast,
    env: &HashMap<String, String>,
    f: impl Fn(f64, f64) -> f64,
) -> Value {
    let a = eval_ast(lhs, env).number_or_zero();
    let b = eval_ast(rhs, env).number_or_zero();
    Value::Number(f(a, b))
}
