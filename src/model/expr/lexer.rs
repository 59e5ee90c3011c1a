use crate::diagnostic::Diagnostic;
use crate::span::{Span, Spanned};

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Token {
    Ident(String),
    /// Numeric literal, already scaled to milliseconds when a unit was given.
    Number(f64),
    AndAnd,
    OrOr,
    Bang,
    EqEq,
    BangEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Plus,
    Minus,
    Star,
    Slash,
    Arrow,
    LParen,
    RParen,
    Eof,
}

impl Token {
    pub(crate) fn describe(&self) -> String {
        match self {
            Token::Ident(name) => format!("'{}'", name),
            Token::Number(n) => format!("number {}", n),
            Token::AndAnd => "'&&'".into(),
            Token::OrOr => "'||'".into(),
            Token::Bang => "'!'".into(),
            Token::EqEq => "'=='".into(),
            Token::BangEq => "'!='".into(),
            Token::Lt => "'<'".into(),
            Token::LtEq => "'<='".into(),
            Token::Gt => "'>'".into(),
            Token::GtEq => "'>='".into(),
            Token::Plus => "'+'".into(),
            Token::Minus => "'-'".into(),
            Token::Star => "'*'".into(),
            Token::Slash => "'/'".into(),
            Token::Arrow => "'->'".into(),
            Token::LParen => "'('".into(),
            Token::RParen => "')'".into(),
            Token::Eof => "end of input".into(),
        }
    }
}

pub(crate) struct Lexer<'src> {
    source: &'src [u8],
    pos: usize,
    diagnostics: Vec<Diagnostic>,
}

impl<'src> Lexer<'src> {
    pub(crate) fn new(source: &'src str) -> Self {
        Self {
            source: source.as_bytes(),
            pos: 0,
            diagnostics: Vec::new(),
        }
    }

    pub(crate) fn tokenize(mut self) -> (Vec<Spanned<Token>>, Vec<Diagnostic>) {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token();
            let is_eof = tok.node == Token::Eof;
            tokens.push(tok);
            if is_eof {
                break;
            }
        }
        (tokens, self.diagnostics)
    }

    fn next_token(&mut self) -> Spanned<Token> {
        loop {
            while self.pos < self.source.len() && self.source[self.pos].is_ascii_whitespace() {
                self.pos += 1;
            }

            if self.pos >= self.source.len() {
                return self.make_token(Token::Eof, self.pos, self.pos);
            }

            let start = self.pos;
            let ch = self.source[self.pos];

            if is_ident_start(ch) {
                return self.scan_ident(start);
            }

            if ch.is_ascii_digit() {
                return self.scan_number(start);
            }

            if let Some(tok) = self.scan_symbol(start) {
                return tok;
            }
            // scan_symbol recorded an error and skipped the byte
        }
    }

    fn scan_ident(&mut self, start: usize) -> Spanned<Token> {
        while self.pos < self.source.len() && is_ident_continue(self.source[self.pos]) {
            self.pos += 1;
        }
        // identifiers may be dotted paths, but never end in a dot
        while self.pos > start && self.source[self.pos - 1] == b'.' {
            self.pos -= 1;
        }
        let text = String::from_utf8_lossy(&self.source[start..self.pos]).into_owned();
        self.make_token(Token::Ident(text), start, self.pos)
    }

    fn scan_number(&mut self, start: usize) -> Spanned<Token> {
        while self.pos < self.source.len()
            && (self.source[self.pos].is_ascii_digit() || self.source[self.pos] == b'.')
        {
            self.pos += 1;
        }
        let digits_end = self.pos;
        while self.pos < self.source.len() && self.source[self.pos].is_ascii_alphabetic() {
            self.pos += 1;
        }

        let digits = String::from_utf8_lossy(&self.source[start..digits_end]);
        let unit = String::from_utf8_lossy(&self.source[digits_end..self.pos]);
        let value = match digits.parse::<f64>() {
            Ok(v) => v,
            Err(_) => {
                self.error(format!("malformed number '{}'", digits), start, digits_end);
                0.0
            }
        };
        let scale = match crate::model::unit_scale(&unit) {
            Some(s) => s,
            None => {
                self.error(
                    format!("unknown time unit '{}'", unit),
                    digits_end,
                    self.pos,
                );
                1.0
            }
        };
        self.make_token(Token::Number(value * scale), start, self.pos)
    }

    fn scan_symbol(&mut self, start: usize) -> Option<Spanned<Token>> {
        let ch = self.source[self.pos];
        let next = self.source.get(self.pos + 1).copied();
        let (tok, len) = match (ch, next) {
            (b'&', Some(b'&')) => (Token::AndAnd, 2),
            (b'|', Some(b'|')) => (Token::OrOr, 2),
            (b'=', Some(b'=')) => (Token::EqEq, 2),
            (b'!', Some(b'=')) => (Token::BangEq, 2),
            (b'<', Some(b'=')) => (Token::LtEq, 2),
            (b'>', Some(b'=')) => (Token::GtEq, 2),
            (b'-', Some(b'>')) => (Token::Arrow, 2),
            (b'!', _) => (Token::Bang, 1),
            (b'<', _) => (Token::Lt, 1),
            (b'>', _) => (Token::Gt, 1),
            (b'+', _) => (Token::Plus, 1),
            (b'-', _) => (Token::Minus, 1),
            (b'*', _) => (Token::Star, 1),
            (b'/', _) => (Token::Slash, 1),
            (b'(', _) => (Token::LParen, 1),
            (b')', _) => (Token::RParen, 1),
            _ => {
                self.pos += 1;
                let msg = match ch {
                    b'&' => "unexpected '&' (did you mean '&&'?)".to_string(),
                    b'|' => "unexpected '|' (did you mean '||'?)".to_string(),
                    b'=' => "unexpected '=' (did you mean '=='?)".to_string(),
                    _ => format!("unexpected character '{}'", ch as char),
                };
                self.error(msg, start, self.pos);
                return None;
            }
        };
        self.pos += len;
        Some(self.make_token(tok, start, self.pos))
    }

    fn make_token(&self, tok: Token, start: usize, end: usize) -> Spanned<Token> {
        Spanned::new(tok, Span::new(start as u32, end as u32))
    }

    fn error(&mut self, msg: String, start: usize, end: usize) {
        self.diagnostics
            .push(Diagnostic::error(msg, Span::new(start as u32, end as u32)));
    }
}

fn is_ident_start(ch: u8) -> bool {
    ch.is_ascii_alphabetic() || ch == b'_'
}

fn is_ident_continue(ch: u8) -> bool {
    ch.is_ascii_alphanumeric() || ch == b'_' || ch == b'.'
}
