//! The formula lexer.
//!
//! Produces one token per call over a byte cursor. Whitespace, `;` line
//! comments and backslash line continuations are consumed transparently;
//! everything is lowercased on the way in. A malformed token comes back as
//! `TokenKind::Bad` with a specific reason, and scanning can continue past
//! it — the prescanner relies on that to report several errors at once.

use frm_core::{
    Complex, FuncId, JumpKind, LexErrorKind, OpId, ParenKind, Pos, PredefVar, Span, Token,
    TokenKind,
};

/// Longest accepted variable or constant spelling.
pub const MAX_TOKEN_CHARS: usize = 32;

/// End-of-file marker byte kept for old DOS formula files.
const SUB: u8 = 0x1a;

/// Longest valid numeric prefix of `s`, the way C `atof` reads one.
pub(crate) fn parse_f64_prefix(s: &str) -> f64 {
    let mut end = s.len();
    while end > 0 {
        if let Ok(v) = s[..end].parse::<f64>() {
            return v;
        }
        end -= 1;
    }
    0.0
}

pub struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    /// Start lexing `src` at byte offset `start`.
    pub fn new(src: &'a str, start: usize) -> Self {
        Self {
            src: src.as_bytes(),
            pos: start.min(src.len()),
        }
    }

    /// Current byte offset; the next token begins at or after it.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Rewind to an earlier offset.
    pub fn seek(&mut self, pos: usize) {
        self.pos = pos.min(self.src.len());
    }

    fn next_byte(&mut self) -> Option<u8> {
        let b = *self.src.get(self.pos)?;
        if b == SUB {
            return None;
        }
        self.pos += 1;
        Some(b)
    }

    /// One significant character: lowercased, with spaces, comments and
    /// line continuations skipped.
    fn getch(&mut self) -> Option<u8> {
        let mut linewrap = false;
        loop {
            let c = self.next_byte()?;
            match c {
                b'\r' | b' ' | b'\t' => {}
                b'\\' => linewrap = true,
                b';' => {
                    loop {
                        match self.next_byte() {
                            None => return None,
                            Some(b'\n') => break,
                            Some(_) => {}
                        }
                    }
                    if !linewrap {
                        return Some(b'\n');
                    }
                    linewrap = false;
                }
                b'\n' => {
                    if !linewrap {
                        return Some(b'\n');
                    }
                    linewrap = false;
                }
                _ => return Some(c.to_ascii_lowercase()),
            }
        }
    }

    fn token(&self, text: String, kind: TokenKind, start: usize) -> Token {
        Token {
            text,
            kind,
            span: Span::new(Pos::new(start as u32), Pos::new(self.pos as u32)),
        }
    }

    /// Scan the next token. At end of input an `EndOfFile` bad token is
    /// returned (the formula must close with `}` before that).
    pub fn next_token(&mut self) -> Token {
        let start = self.pos;
        let c = match self.getch() {
            Some(c) => c,
            None => return self.token(String::new(), TokenKind::Bad(LexErrorKind::EndOfFile), start),
        };
        match c {
            b'0'..=b'9' | b'.' => self.scan_constant(c, start),
            b'a'..=b'z' | b'_' => self.scan_alpha(c, start),
            b'(' => self.scan_complex_constant(start),
            b')' => self.token(")".into(), TokenKind::Paren(ParenKind::Close), start),
            b'}' => self.token("}".into(), TokenKind::EndOfFormula, start),
            b',' | b'\n' | b':' => self.scan_statement_end(c, start),
            b'<' | b'>' | b'=' => {
                let mark = self.pos;
                let (one, two) = match c {
                    b'<' => (OpId::Lt, OpId::Lte),
                    b'>' => (OpId::Gt, OpId::Gte),
                    _ => (OpId::Assign, OpId::Eq),
                };
                if self.getch() == Some(b'=') {
                    let text = format!("{}=", c as char);
                    self.token(text, TokenKind::Operator(two), start)
                } else {
                    self.seek(mark);
                    self.token((c as char).to_string(), TokenKind::Operator(one), start)
                }
            }
            b'!' => {
                let mark = self.pos;
                if self.getch() == Some(b'=') {
                    self.token("!=".into(), TokenKind::Operator(OpId::Ne), start)
                } else {
                    self.seek(mark);
                    self.token("!".into(), TokenKind::Bad(LexErrorKind::IllegalOperator), start)
                }
            }
            b'&' => {
                let mark = self.pos;
                if self.getch() == Some(b'&') {
                    self.token("&&".into(), TokenKind::Operator(OpId::And), start)
                } else {
                    self.seek(mark);
                    self.token("&".into(), TokenKind::Bad(LexErrorKind::IllegalOperator), start)
                }
            }
            b'|' => {
                let mark = self.pos;
                if self.getch() == Some(b'|') {
                    self.token("||".into(), TokenKind::Operator(OpId::Or), start)
                } else {
                    self.seek(mark);
                    self.token("|".into(), TokenKind::Operator(OpId::Mod), start)
                }
            }
            b'+' => self.token("+".into(), TokenKind::Operator(OpId::Plus), start),
            b'-' => self.token("-".into(), TokenKind::Operator(OpId::Minus), start),
            b'*' => self.token("*".into(), TokenKind::Operator(OpId::Mul), start),
            b'/' => self.token("/".into(), TokenKind::Operator(OpId::Div), start),
            b'^' => self.token("^".into(), TokenKind::Operator(OpId::Pow), start),
            _ => self.token(
                (c as char).to_string(),
                TokenKind::Bad(LexErrorKind::IllegalCharacter),
                start,
            ),
        }
    }

    /// Numeric constant: decimal digits, at most one dot in the mantissa,
    /// and an optional exponent with an optional sign.
    fn scan_constant(&mut self, first: u8, start: usize) -> Token {
        let mut text = String::new();
        text.push(first as char);
        let mut getting_base = true;
        let mut got_decimal = first == b'.';
        let mut mark = self.pos;
        loop {
            let c = match self.getch() {
                Some(c) => c,
                None => {
                    return self.token(text, TokenKind::Bad(LexErrorKind::EndOfFile), start);
                }
            };
            match c {
                b'0'..=b'9' => {
                    text.push(c as char);
                    mark = self.pos;
                }
                b'.' => {
                    if got_decimal || !getting_base {
                        text.push('.');
                        return self
                            .token(text, TokenKind::Bad(LexErrorKind::IllFormedConstant), start);
                    }
                    text.push('.');
                    got_decimal = true;
                    mark = self.pos;
                }
                _ => {
                    let last = text.as_bytes()[text.len() - 1];
                    if c == b'e'
                        && getting_base
                        && (last.is_ascii_digit() || (last == b'.' && text.len() > 1))
                    {
                        text.push('e');
                        getting_base = false;
                        got_decimal = false;
                        mark = self.pos;
                        match self.getch() {
                            Some(s @ (b'-' | b'+')) => {
                                text.push(s as char);
                                mark = self.pos;
                            }
                            _ => self.seek(mark),
                        }
                    } else if c.is_ascii_alphabetic() || c == b'_' {
                        text.push(c as char);
                        return self
                            .token(text, TokenKind::Bad(LexErrorKind::IllFormedConstant), start);
                    } else if matches!(last, b'e' | b'+' | b'-')
                        || (last == b'.' && text.len() == 1)
                    {
                        text.push(c as char);
                        return self
                            .token(text, TokenKind::Bad(LexErrorKind::IllFormedConstant), start);
                    } else {
                        self.seek(mark);
                        break;
                    }
                }
            }
            if text.len() > MAX_TOKEN_CHARS {
                return self.token(text, TokenKind::Bad(LexErrorKind::TokenTooLong), start);
            }
        }
        let value = parse_f64_prefix(&text);
        self.token(text, TokenKind::RealConstant(value), start)
    }

    /// After an opening paren, look ahead for a `(re,im)` literal. Falls
    /// back to a plain paren when the contents do not match.
    fn scan_complex_constant(&mut self, start: usize) -> Token {
        let mark = self.pos;
        let mut text = String::from("(");
        let mut re = 0.0f64;
        let mut getting_real = true;
        loop {
            let mut sign = 1.0f64;
            let mut first = match self.getch() {
                Some(c) => c,
                None => break,
            };
            if first == b'-' {
                sign = -1.0;
                match self.getch() {
                    Some(c @ (b'0'..=b'9' | b'.')) => first = c,
                    _ => break,
                }
            }
            if !(first.is_ascii_digit() || first == b'.') {
                break;
            }
            let part = self.scan_constant(first, self.pos);
            let value = match part.kind {
                TokenKind::RealConstant(v) => v,
                _ => break,
            };
            let after = self.getch();
            if getting_real && after == Some(b',') {
                if sign < 0.0 {
                    text.push('-');
                }
                text.push_str(&part.text);
                text.push(',');
                re = value * sign;
                getting_real = false;
            } else if !getting_real && after == Some(b')') {
                if sign < 0.0 {
                    text.push('-');
                }
                text.push_str(&part.text);
                text.push(')');
                let im = value * sign;
                let kind = if im != 0.0 {
                    TokenKind::ComplexConstant(Complex::new(re, im))
                } else {
                    TokenKind::RealConstant(re)
                };
                return self.token(text, kind, start);
            } else {
                break;
            }
        }
        self.seek(mark);
        self.token("(".into(), TokenKind::Paren(ParenKind::Open), start)
    }

    /// Identifier: resolve against the function table, the flow-control
    /// keywords and the predefined-variable table, in that order.
    fn scan_alpha(&mut self, first: u8, start: usize) -> Token {
        let mut text = String::new();
        text.push(first as char);
        let mut too_long = false;
        let mut mark = self.pos;
        loop {
            let c = match self.getch() {
                Some(c) => c,
                None => {
                    return self.token(
                        String::new(),
                        TokenKind::Bad(LexErrorKind::EndOfFile),
                        start,
                    );
                }
            };
            match c {
                b'a'..=b'z' | b'0'..=b'9' | b'_' => {
                    if text.len() < 79 {
                        text.push(c as char);
                    }
                    if text.len() > MAX_TOKEN_CHARS {
                        too_long = true;
                    }
                    mark = self.pos;
                }
                b'.' => {
                    text.push('.');
                    return self
                        .token(text, TokenKind::Bad(LexErrorKind::IllegalVariableName), start);
                }
                _ => {
                    self.seek(mark);
                    if too_long {
                        return self.token(text, TokenKind::Bad(LexErrorKind::TokenTooLong), start);
                    }
                    return self.classify_alpha(text, c, start);
                }
            }
        }
    }

    /// Classify a complete identifier given the (unconsumed) character
    /// that follows it.
    fn classify_alpha(&mut self, text: String, next: u8, start: usize) -> Token {
        let func = Self::function_kind(&text);
        let flow = JumpKind::from_name(&text);

        if next == b'(' {
            return match (func, flow) {
                (Some(kind), _) => self.token(text, kind, start),
                (None, Some(JumpKind::Else | JumpKind::EndIf)) => {
                    self.token(text, TokenKind::Bad(LexErrorKind::JumpWithIllegalChar), start)
                }
                (None, Some(jump)) => self.token(text, TokenKind::FlowControl(jump), start),
                (None, None) => {
                    self.token(text, TokenKind::Bad(LexErrorKind::UndefinedFunction), start)
                }
            };
        }
        if func.is_some() {
            return self.token(text, TokenKind::Bad(LexErrorKind::FuncUsedAsVar), start);
        }
        match flow {
            Some(JumpKind::If | JumpKind::ElseIf) => {
                self.token(text, TokenKind::Bad(LexErrorKind::JumpMissingBoolean), start)
            }
            Some(jump) => {
                if matches!(next, b',' | b'\n' | b':' | b'}') {
                    self.token(text, TokenKind::FlowControl(jump), start)
                } else {
                    self.token(text, TokenKind::Bad(LexErrorKind::JumpWithIllegalChar), start)
                }
            }
            None => match PredefVar::lookup(&text) {
                Some(var) if var.is_param() => {
                    self.token(text, TokenKind::ParamVariable(var), start)
                }
                Some(var) => self.token(text, TokenKind::PredefVariable(var), start),
                None => self.token(text, TokenKind::UserVariable, start),
            },
        }
    }

    /// Function-table lookup, including the fn1..fn4 trig slots.
    fn function_kind(name: &str) -> Option<TokenKind> {
        if let Some(n) = Self::which_fn(name) {
            return Some(TokenKind::ParamFunction(n - 1));
        }
        FuncId::lookup(name).map(TokenKind::Function)
    }

    /// 1..=4 when `name` is one of the fn1..fn4 slots.
    fn which_fn(name: &str) -> Option<u8> {
        let rest = name.strip_prefix("fn")?;
        match rest {
            "1" => Some(1),
            "2" => Some(2),
            "3" => Some(3),
            "4" => Some(4),
            _ => None,
        }
    }

    /// Statement separators collapse into one token: a run containing `:`
    /// becomes `:`, a run ending at `}` becomes end-of-formula.
    fn scan_statement_end(&mut self, first: u8, start: usize) -> Token {
        let mut ch = if first == b':' { b':' } else { b',' };
        let mut mark = self.pos;
        loop {
            match self.getch() {
                Some(c @ (b'\n' | b',' | b':')) => {
                    if c == b':' {
                        ch = b':';
                    }
                    mark = self.pos;
                }
                Some(b'}') => {
                    return self.token("}".into(), TokenKind::EndOfFormula, start);
                }
                _ => {
                    self.seek(mark);
                    break;
                }
            }
        }
        let op = if ch == b':' { OpId::Colon } else { OpId::Comma };
        self.token((ch as char).to_string(), TokenKind::Operator(op), start)
    }
}
