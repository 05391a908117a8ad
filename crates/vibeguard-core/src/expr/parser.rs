//! Precedence-climbing parser for assertion expressions.
//!
//! Grammar (lowest to highest precedence):
//!
//! ```text
//! or    := and ( "||" and )*
//! and   := cmp ( "&&" cmp )*
//! cmp   := add ( ("==" | "!=" | "<" | "<=" | ">" | ">=") add )*
//! add   := mul ( ("+" | "-") mul )*
//! mul   := unary ( ("*" | "/") unary )*
//! unary := ("!" | "-") unary | primary
//! primary := number | string | boolean | identifier | "(" or ")"
//! ```
//!
//! All binary operators, comparisons included, are left-associative:
//! `a < b < c` parses as `(a < b) < c`, where the inner comparison's
//! boolean coerces to 1/0 on the outer one.

use super::lexer::{tokenize, Token, TokenKind};
use super::ExprError;

/// Parsed assertion AST.
#[derive(Debug, Clone, PartialEq)]
pub enum Ast {
    Number(f64),
    Str(String),
    Bool(bool),
    Ident(String),
    Unary {
        op: UnaryOp,
        operand: Box<Ast>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Ast>,
        rhs: Box<Ast>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    /// Left binding power; higher binds tighter.
    fn precedence(self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => 3,
            BinaryOp::Add | BinaryOp::Sub => 4,
            BinaryOp::Mul | BinaryOp::Div => 5,
        }
    }

    fn from_token(kind: &TokenKind) -> Option<BinaryOp> {
        match kind {
            TokenKind::OrOr => Some(BinaryOp::Or),
            TokenKind::AndAnd => Some(BinaryOp::And),
            TokenKind::EqEq => Some(BinaryOp::Eq),
            TokenKind::NotEq => Some(BinaryOp::Ne),
            TokenKind::Lt => Some(BinaryOp::Lt),
            TokenKind::Le => Some(BinaryOp::Le),
            TokenKind::Gt => Some(BinaryOp::Gt),
            TokenKind::Ge => Some(BinaryOp::Ge),
            TokenKind::Plus => Some(BinaryOp::Add),
            TokenKind::Minus => Some(BinaryOp::Sub),
            TokenKind::Star => Some(BinaryOp::Mul),
            TokenKind::Slash => Some(BinaryOp::Div),
            _ => None,
        }
    }
}

/// Parse `input` into an [`Ast`], consuming the entire string.
pub fn parse(input: &str) -> Result<Ast, ExprError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        input,
        tokens,
        cursor: 0,
    };
    let ast = parser.parse_expr(0)?;
    let trailing = parser.peek();
    if trailing.kind != TokenKind::Eof {
        return Err(ExprError::at(
            input,
            trailing.pos,
            format!("unexpected {}", trailing.kind.describe()),
        ));
    }
    Ok(ast)
}

struct Parser<'a> {
    input: &'a str,
    tokens: Vec<Token>,
    cursor: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> &Token {
        &self.tokens[self.cursor]
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.cursor].clone();
        if self.cursor < self.tokens.len() - 1 {
            self.cursor += 1;
        }
        tok
    }

    /// Precedence climbing over binary operators.
    fn parse_expr(&mut self, min_prec: u8) -> Result<Ast, ExprError> {
        let mut lhs = self.parse_unary()?;

        while let Some(op) = BinaryOp::from_token(&self.peek().kind) {
            let prec = op.precedence();
            if prec < min_prec {
                break;
            }
            self.advance();
            // All operators are left-associative: the right subexpression
            // only admits strictly tighter operators.
            let rhs = self.parse_expr(prec + 1)?;
            lhs = Ast::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }

        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Ast, ExprError> {
        match self.peek().kind {
            TokenKind::Not => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(Ast::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                })
            }
            TokenKind::Minus => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(Ast::Unary {
                    op: UnaryOp::Neg,
                    operand: Box::new(operand),
                })
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Ast, ExprError> {
        let tok = self.advance();
        match tok.kind {
            TokenKind::Number(n) => Ok(Ast::Number(n)),
            TokenKind::Str(s) => Ok(Ast::Str(s)),
            TokenKind::Bool(b) => Ok(Ast::Bool(b)),
            TokenKind::Ident(name) => Ok(Ast::Ident(name)),
            TokenKind::LParen => {
                let inner = self.parse_expr(0)?;
                let close = self.advance();
                if close.kind != TokenKind::RParen {
                    return Err(ExprError::at(
                        self.input,
                        close.pos,
                        format!("expected ')', found {}", close.kind.describe()),
                    ));
                }
                Ok(inner)
            }
            other => Err(ExprError::at(
                self.input,
                tok.pos,
                format!("expected expression, found {}", other.describe()),
            )),
        }
    }
}
