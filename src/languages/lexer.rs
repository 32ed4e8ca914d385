//! A small hand-rolled tokenizer shared by the `.hdl` parser and the
//! `.gate` recipe loader. Neither format needs more than identifiers,
//! numbers, a handful of punctuation marks and `//` line comments, so one
//! scanner covers both rather than pulling in a grammar engine for it.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Identifier(String),
    Number(u64),
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Comma,
    Semicolon,
    Equals,
    Dot,
    DotDot,
    Colon,
    Str(String),
    Eof,
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
}

pub struct Lexer<'a> {
    source: &'a [u8],
    pos: usize,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source: source.as_bytes(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.source.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.source.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;
        if c == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(b' ') | Some(b'\t') | Some(b'\r') | Some(b'\n') => {
                    self.advance();
                }
                Some(b'/') if self.peek_at(1) == Some(b'/') => {
                    while self.peek().map(|c| c != b'\n').unwrap_or(false) {
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    pub fn next_token(&mut self) -> Token {
        self.skip_trivia();
        let (line, column) = (self.line, self.column);
        let Some(c) = self.peek() else {
            return Token { kind: TokenKind::Eof, line, column };
        };

        let kind = match c {
            b'{' => { self.advance(); TokenKind::LBrace }
            b'}' => { self.advance(); TokenKind::RBrace }
            b'[' => { self.advance(); TokenKind::LBracket }
            b']' => { self.advance(); TokenKind::RBracket }
            b'(' => { self.advance(); TokenKind::LParen }
            b')' => { self.advance(); TokenKind::RParen }
            b',' => { self.advance(); TokenKind::Comma }
            b';' => { self.advance(); TokenKind::Semicolon }
            b'=' => { self.advance(); TokenKind::Equals }
            b':' => { self.advance(); TokenKind::Colon }
            b'.' if self.peek_at(1) == Some(b'.') => {
                self.advance();
                self.advance();
                TokenKind::DotDot
            }
            b'.' => { self.advance(); TokenKind::Dot }
            b'"' => self.scan_string(),
            b'0'..=b'9' => self.scan_number(),
            c if c.is_ascii_alphabetic() || c == b'_' => self.scan_identifier(),
            other => {
                self.advance();
                TokenKind::Error(format!("unexpected character '{}'", other as char))
            }
        };

        Token { kind, line, column }
    }

    fn scan_number(&mut self) -> TokenKind {
        let start = self.pos;
        while self.peek().map(|c| c.is_ascii_digit()).unwrap_or(false) {
            self.advance();
        }
        let text = std::str::from_utf8(&self.source[start..self.pos]).unwrap();
        match text.parse::<u64>() {
            Ok(n) => TokenKind::Number(n),
            Err(_) => TokenKind::Error(format!("invalid number literal '{text}'")),
        }
    }

    fn scan_string(&mut self) -> TokenKind {
        self.advance(); // opening quote
        let start = self.pos;
        while self.peek().map(|c| c != b'"' && c != b'\n').unwrap_or(false) {
            self.advance();
        }
        let text = std::str::from_utf8(&self.source[start..self.pos]).unwrap().to_string();
        if self.peek() == Some(b'"') {
            self.advance();
            TokenKind::Str(text)
        } else {
            TokenKind::Error(format!("unterminated string literal '{text}'"))
        }
    }

    fn scan_identifier(&mut self) -> TokenKind {
        let start = self.pos;
        while self
            .peek()
            .map(|c| c.is_ascii_alphanumeric() || c == b'_')
            .unwrap_or(false)
        {
            self.advance();
        }
        let text = std::str::from_utf8(&self.source[start..self.pos]).unwrap().to_string();
        TokenKind::Identifier(text)
    }

    pub fn tokenize(mut self) -> Vec<Token> {
        let mut out = Vec::new();
        loop {
            let tok = self.next_token();
            let done = tok.kind == TokenKind::Eof;
            out.push(tok);
            if done {
                break;
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_a_chip_header() {
        let tokens = Lexer::new("CHIP And16 { IN a[16], b[16]; OUT out[16];").tokenize();
        let idents: Vec<String> = tokens
            .iter()
            .filter_map(|t| match &t.kind {
                TokenKind::Identifier(s) => Some(s.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(idents, vec!["CHIP", "And16", "IN", "a", "b", "OUT", "out"]);
    }

    #[test]
    fn skips_line_comments() {
        let tokens = Lexer::new("need nand // builtin\ncreate foo").tokenize();
        assert!(!tokens.iter().any(|t| matches!(&t.kind, TokenKind::Error(_))));
    }

    #[test]
    fn numbers_parse_as_u64() {
        let tokens = Lexer::new("16").tokenize();
        assert_eq!(tokens[0].kind, TokenKind::Number(16));
    }
}
