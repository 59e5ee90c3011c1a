use super::lexer::Token;
use super::{BinOp, Expr};
use crate::diagnostic::Diagnostic;
use crate::span::{Span, Spanned};

/// Recursive-descent parser over constraint tokens.
///
/// Precedence, loosest first: `||`, `&&`, comparisons, `+ -`, `* /`,
/// unary `! -`.
pub(crate) struct Parser {
    tokens: Vec<Spanned<Token>>,
    pos: usize,
}

impl Parser {
    pub(crate) fn new(tokens: Vec<Spanned<Token>>) -> Self {
        Self { tokens, pos: 0 }
    }

    pub(crate) fn parse_expression(mut self) -> Result<Expr, Diagnostic> {
        let expr = self.parse_or()?;
        self.expect_eof()?;
        Ok(expr)
    }

    /// `Name (-> Name)+ within <duration>`
    pub(crate) fn parse_latency_chain(mut self) -> Result<(Vec<Spanned<String>>, f64), Diagnostic> {
        let mut chain = vec![self.expect_ident()?];
        while self.eat(&Token::Arrow) {
            chain.push(self.expect_ident()?);
        }
        if chain.len() < 2 {
            return Err(Diagnostic::error(
                "latency chain needs at least two components".to_string(),
                self.peek_span(),
            )
            .with_help("write it as 'A -> B within 100ms'".to_string()));
        }
        let kw = self.advance();
        if kw.node != Token::Ident("within".to_string()) {
            return Err(Diagnostic::error(
                format!("expected 'within', found {}", kw.node.describe()),
                kw.span,
            ));
        }
        let bound = match self.advance() {
            Spanned {
                node: Token::Number(n),
                ..
            } => n,
            other => {
                return Err(Diagnostic::error(
                    format!("expected a duration, found {}", other.node.describe()),
                    other.span,
                ))
            }
        };
        self.expect_eof()?;
        Ok((chain, bound))
    }

    fn parse_or(&mut self) -> Result<Expr, Diagnostic> {
        let mut lhs = self.parse_and()?;
        while self.eat(&Token::OrOr) {
            let rhs = self.parse_and()?;
            lhs = Expr::binary(BinOp::Or, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, Diagnostic> {
        let mut lhs = self.parse_comparison()?;
        while self.eat(&Token::AndAnd) {
            let rhs = self.parse_comparison()?;
            lhs = Expr::binary(BinOp::And, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_comparison(&mut self) -> Result<Expr, Diagnostic> {
        let lhs = self.parse_additive()?;
        let op = match self.peek() {
            Token::EqEq => BinOp::Eq,
            Token::BangEq => BinOp::Ne,
            Token::Lt => BinOp::Lt,
            Token::LtEq => BinOp::Le,
            Token::Gt => BinOp::Gt,
            Token::GtEq => BinOp::Ge,
            _ => return Ok(lhs),
        };
        self.pos += 1;
        let rhs = self.parse_additive()?;
        if matches!(
            self.peek(),
            Token::EqEq | Token::BangEq | Token::Lt | Token::LtEq | Token::Gt | Token::GtEq
        ) {
            return Err(Diagnostic::error(
                "comparison operators cannot be chained".to_string(),
                self.peek_span(),
            )
            .with_help("combine comparisons with '&&'".to_string()));
        }
        Ok(Expr::binary(op, lhs, rhs))
    }

    fn parse_additive(&mut self) -> Result<Expr, Diagnostic> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::binary(op, lhs, rhs);
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, Diagnostic> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.parse_unary()?;
            lhs = Expr::binary(op, lhs, rhs);
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, Diagnostic> {
        if self.eat(&Token::Bang) {
            return Ok(Expr::Not(Box::new(self.parse_unary()?)));
        }
        if self.eat(&Token::Minus) {
            return Ok(Expr::Neg(Box::new(self.parse_unary()?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, Diagnostic> {
        let tok = self.advance();
        match tok.node {
            Token::Number(n) => Ok(Expr::Number(n)),
            Token::Ident(name) => match name.as_str() {
                "true" => Ok(Expr::Bool(true)),
                "false" => Ok(Expr::Bool(false)),
                _ => Ok(Expr::Name(Spanned::new(name, tok.span))),
            },
            Token::LParen => {
                let inner = self.parse_or()?;
                if !self.eat(&Token::RParen) {
                    return Err(Diagnostic::error(
                        format!("expected ')', found {}", self.peek().describe()),
                        self.peek_span(),
                    )
                    .with_note("parenthesis opened here".to_string()));
                }
                Ok(inner)
            }
            other => Err(Diagnostic::error(
                format!("expected an expression, found {}", other.describe()),
                tok.span,
            )),
        }
    }

    // ─── Token helpers ─────────────────────────────────────────────

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].node
    }

    fn peek_span(&self) -> Span {
        self.tokens[self.pos.min(self.tokens.len() - 1)].span
    }

    fn advance(&mut self) -> Spanned<Token> {
        let idx = self.pos.min(self.tokens.len() - 1);
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        self.tokens[idx].clone()
    }

    fn eat(&mut self, tok: &Token) -> bool {
        if self.peek() == tok {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_ident(&mut self) -> Result<Spanned<String>, Diagnostic> {
        let tok = self.advance();
        match tok.node {
            Token::Ident(name) => Ok(Spanned::new(name, tok.span)),
            other => Err(Diagnostic::error(
                format!("expected a name, found {}", other.describe()),
                tok.span,
            )),
        }
    }

    fn expect_eof(&self) -> Result<(), Diagnostic> {
        match self.peek() {
            Token::Eof => Ok(()),
            other => Err(Diagnostic::error(
                format!("unexpected {} after expression", other.describe()),
                self.peek_span(),
            )),
        }
    }
}
