//! The Jack compiler (component I): tokenizes and parses Jack source
//! directly into VM command text, with no separate parse-tree pass. A
//! class-scoped symbol table tracks `static`/`field` declarations and a
//! subroutine-scoped one tracks `argument`/`local`, each kind with its own
//! monotonic index, mirroring how the VM segments the same names.

use std::collections::HashMap;

use crate::error::{Result, SimulatorError};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Tok {
    Keyword(String),
    Symbol(char),
    IntConst(i32),
    StringConst(String),
    Identifier(String),
}

struct Tokenizer {
    tokens: Vec<Tok>,
    pos: usize,
}

const KEYWORDS: &[&str] = &[
    "class", "constructor", "function", "method", "field", "static", "var", "int", "char",
    "boolean", "void", "true", "false", "null", "this", "let", "do", "if", "else", "while",
    "return",
];

impl Tokenizer {
    fn new(source: &str) -> Result<Self> {
        Ok(Self { tokens: tokenize(source)?, pos: 0 })
    }

    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Result<Tok> {
        let tok = self.tokens.get(self.pos).cloned().ok_or_else(|| {
            SimulatorError::Compilation { message: "unexpected end of input".into(), span: None }
        })?;
        self.pos += 1;
        Ok(tok)
    }

    fn expect_symbol(&mut self, c: char) -> Result<()> {
        match self.advance()? {
            Tok::Symbol(s) if s == c => Ok(()),
            other => Err(compile_err(format!("expected '{c}', found {other:?}"))),
        }
    }

    fn expect_keyword(&mut self, kw: &str) -> Result<()> {
        match self.advance()? {
            Tok::Keyword(k) if k == kw => Ok(()),
            other => Err(compile_err(format!("expected keyword '{kw}', found {other:?}"))),
        }
    }

    fn expect_identifier(&mut self) -> Result<String> {
        match self.advance()? {
            Tok::Identifier(name) => Ok(name),
            other => Err(compile_err(format!("expected identifier, found {other:?}"))),
        }
    }

    fn at_symbol(&self, c: char) -> bool {
        matches!(self.peek(), Some(Tok::Symbol(s)) if *s == c)
    }

    fn at_keyword(&self, kw: &str) -> bool {
        matches!(self.peek(), Some(Tok::Keyword(k)) if k == kw)
    }
}

fn compile_err(message: String) -> SimulatorError {
    SimulatorError::Compilation { message, span: None }
}

fn tokenize(source: &str) -> Result<Vec<Tok>> {
    let stripped = strip_comments(source);
    let bytes = stripped.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i] as char;
        if c.is_whitespace() {
            i += 1;
        } else if c == '"' {
            let start = i + 1;
            let mut j = start;
            while j < bytes.len() && bytes[j] as char != '"' {
                j += 1;
            }
            if j >= bytes.len() {
                return Err(compile_err("unterminated string constant".into()));
            }
            tokens.push(Tok::StringConst(stripped[start..j].to_string()));
            i = j + 1;
        } else if c.is_ascii_digit() {
            let start = i;
            while i < bytes.len() && (bytes[i] as char).is_ascii_digit() {
                i += 1;
            }
            let text = &stripped[start..i];
            let value: i32 = text
                .parse()
                .map_err(|_| compile_err(format!("invalid integer constant '{text}'")))?;
            tokens.push(Tok::IntConst(value));
        } else if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < bytes.len() && ((bytes[i] as char).is_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            let text = &stripped[start..i];
            if KEYWORDS.contains(&text) {
                tokens.push(Tok::Keyword(text.to_string()));
            } else {
                tokens.push(Tok::Identifier(text.to_string()));
            }
        } else if "{}()[].,;+-*/&|<>=~".contains(c) {
            tokens.push(Tok::Symbol(c));
            i += 1;
        } else {
            return Err(compile_err(format!("unexpected character '{c}'")));
        }
    }
    Ok(tokens)
}

fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let chars: Vec<char> = source.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '/' && chars.get(i + 1) == Some(&'/') {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
        } else if chars[i] == '/' && chars.get(i + 1) == Some(&'*') {
            i += 2;
            while i + 1 < chars.len() && !(chars[i] == '*' && chars[i + 1] == '/') {
                i += 1;
            }
            i += 2;
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Static,
    Field,
    Argument,
    Local,
}

impl Kind {
    fn segment(self) -> &'static str {
        match self {
            Kind::Static => "static",
            Kind::Field => "this",
            Kind::Argument => "argument",
            Kind::Local => "local",
        }
    }
}

#[derive(Default)]
struct SymbolTable {
    entries: HashMap<String, (Kind, u16)>,
    counts: HashMap<&'static str, u16>,
}

impl SymbolTable {
    fn define(&mut self, name: &str, kind: Kind) {
        let key = match kind {
            Kind::Static => "static",
            Kind::Field => "field",
            Kind::Argument => "argument",
            Kind::Local => "local",
        };
        let index = *self.counts.get(key).unwrap_or(&0);
        self.counts.insert(key, index + 1);
        self.entries.insert(name.to_string(), (kind, index));
    }

    fn lookup(&self, name: &str) -> Option<(Kind, u16)> {
        self.entries.get(name).copied()
    }
}

/// Compiles one Jack class into VM command text. A Jack program is usually
/// many classes across many files; callers concatenate each class's output
/// (or feed them separately to the translator, which only cares about
/// function boundaries).
pub struct JackCompiler {
    class_name: String,
    class_scope: SymbolTable,
    subroutine_scope: SymbolTable,
    label_counter: u32,
    out: Vec<String>,
}

impl JackCompiler {
    pub fn compile_class(source: &str) -> Result<String> {
        let mut tokenizer = Tokenizer::new(source)?;
        let mut compiler = Self {
            class_name: String::new(),
            class_scope: SymbolTable::default(),
            subroutine_scope: SymbolTable::default(),
            label_counter: 0,
            out: Vec::new(),
        };
        compiler.compile(&mut tokenizer)?;
        Ok(compiler.out.join("\n") + "\n")
    }

    fn emit(&mut self, line: impl Into<String>) {
        self.out.push(line.into());
    }

    fn fresh_label(&mut self, tag: &str) -> String {
        let id = self.label_counter;
        self.label_counter += 1;
        format!("{}_{tag}_{id}", self.class_name)
    }

    fn compile(&mut self, t: &mut Tokenizer) -> Result<()> {
        t.expect_keyword("class")?;
        self.class_name = t.expect_identifier()?;
        t.expect_symbol('{')?;

        while t.at_keyword("static") || t.at_keyword("field") {
            self.compile_class_var_dec(t)?;
        }
        while t.at_keyword("constructor") || t.at_keyword("function") || t.at_keyword("method") {
            self.compile_subroutine(t)?;
        }
        t.expect_symbol('}')?;
        Ok(())
    }

    fn compile_class_var_dec(&mut self, t: &mut Tokenizer) -> Result<()> {
        let kind = match t.advance()? {
            Tok::Keyword(k) if k == "static" => Kind::Static,
            Tok::Keyword(k) if k == "field" => Kind::Field,
            other => return Err(compile_err(format!("expected 'static' or 'field', found {other:?}"))),
        };
        self.skip_type(t)?;
        loop {
            let name = t.expect_identifier()?;
            self.class_scope.define(&name, kind);
            if t.at_symbol(',') {
                t.expect_symbol(',')?;
            } else {
                break;
            }
        }
        t.expect_symbol(';')?;
        Ok(())
    }

    fn skip_type(&mut self, t: &mut Tokenizer) -> Result<()> {
        t.advance()?;
        Ok(())
    }

    fn compile_subroutine(&mut self, t: &mut Tokenizer) -> Result<()> {
        self.subroutine_scope = SymbolTable::default();
        let kind_tok = t.advance()?;
        let is_method = matches!(&kind_tok, Tok::Keyword(k) if k == "method");
        let is_constructor = matches!(&kind_tok, Tok::Keyword(k) if k == "constructor");

        self.skip_type(t)?; // return type
        let name = t.expect_identifier()?;

        if is_method {
            self.subroutine_scope.define("this", Kind::Argument);
        }

        t.expect_symbol('(')?;
        self.compile_parameter_list(t)?;
        t.expect_symbol(')')?;

        t.expect_symbol('{')?;
        let mut local_count = 0u16;
        while t.at_keyword("var") {
            local_count += self.compile_var_dec(t)?;
        }

        self.emit(format!("function {}.{} {}", self.class_name, name, local_count));
        if is_constructor {
            let field_count = *self.class_scope.counts.get("field").unwrap_or(&0);
            self.emit(format!("push constant {field_count}"));
            self.emit("call Memory.alloc 1");
            self.emit("pop pointer 0");
        } else if is_method {
            self.emit("push argument 0");
            self.emit("pop pointer 0");
        }

        self.compile_statements(t)?;
        t.expect_symbol('}')?;
        Ok(())
    }

    fn compile_parameter_list(&mut self, t: &mut Tokenizer) -> Result<()> {
        if t.at_symbol(')') {
            return Ok(());
        }
        loop {
            self.skip_type(t)?;
            let name = t.expect_identifier()?;
            self.subroutine_scope.define(&name, Kind::Argument);
            if t.at_symbol(',') {
                t.expect_symbol(',')?;
            } else {
                break;
            }
        }
        Ok(())
    }

    fn compile_var_dec(&mut self, t: &mut Tokenizer) -> Result<u16> {
        t.expect_keyword("var")?;
        self.skip_type(t)?;
        let mut count = 0u16;
        loop {
            let name = t.expect_identifier()?;
            self.subroutine_scope.define(&name, Kind::Local);
            count += 1;
            if t.at_symbol(',') {
                t.expect_symbol(',')?;
            } else {
                break;
            }
        }
        t.expect_symbol(';')?;
        Ok(count)
    }

    fn compile_statements(&mut self, t: &mut Tokenizer) -> Result<()> {
        loop {
            if t.at_keyword("let") {
                self.compile_let(t)?;
            } else if t.at_keyword("if") {
                self.compile_if(t)?;
            } else if t.at_keyword("while") {
                self.compile_while(t)?;
            } else if t.at_keyword("do") {
                self.compile_do(t)?;
            } else if t.at_keyword("return") {
                self.compile_return(t)?;
            } else {
                break;
            }
        }
        Ok(())
    }

    fn resolve(&self, name: &str) -> Option<(Kind, u16)> {
        self.subroutine_scope.lookup(name).or_else(|| self.class_scope.lookup(name))
    }

    fn compile_let(&mut self, t: &mut Tokenizer) -> Result<()> {
        t.expect_keyword("let")?;
        let name = t.expect_identifier()?;
        let (kind, index) = self
            .resolve(&name)
            .ok_or_else(|| compile_err(format!("undeclared variable '{name}'")))?;

        if t.at_symbol('[') {
            t.expect_symbol('[')?;
            self.emit(format!("push {} {}", kind.segment(), index));
            self.compile_expression(t)?;
            t.expect_symbol(']')?;
            self.emit("add");
            t.expect_symbol('=')?;
            self.compile_expression(t)?;
            t.expect_symbol(';')?;
            self.emit("pop temp 0");
            self.emit("pop pointer 1");
            self.emit("push temp 0");
            self.emit("pop that 0");
        } else {
            t.expect_symbol('=')?;
            self.compile_expression(t)?;
            t.expect_symbol(';')?;
            self.emit(format!("pop {} {}", kind.segment(), index));
        }
        Ok(())
    }

    fn compile_if(&mut self, t: &mut Tokenizer) -> Result<()> {
        t.expect_keyword("if")?;
        t.expect_symbol('(')?;
        self.compile_expression(t)?;
        t.expect_symbol(')')?;

        let else_label = self.fresh_label("ELSE");
        let end_label = self.fresh_label("ENDIF");
        self.emit("not");
        self.emit(format!("if-goto {else_label}"));

        t.expect_symbol('{')?;
        self.compile_statements(t)?;
        t.expect_symbol('}')?;
        self.emit(format!("goto {end_label}"));
        self.emit(format!("label {else_label}"));

        if t.at_keyword("else") {
            t.expect_keyword("else")?;
            t.expect_symbol('{')?;
            self.compile_statements(t)?;
            t.expect_symbol('}')?;
        }
        self.emit(format!("label {end_label}"));
        Ok(())
    }

    fn compile_while(&mut self, t: &mut Tokenizer) -> Result<()> {
        t.expect_keyword("while")?;
        let top_label = self.fresh_label("WHILE");
        let end_label = self.fresh_label("ENDWHILE");
        self.emit(format!("label {top_label}"));

        t.expect_symbol('(')?;
        self.compile_expression(t)?;
        t.expect_symbol(')')?;
        self.emit("not");
        self.emit(format!("if-goto {end_label}"));

        t.expect_symbol('{')?;
        self.compile_statements(t)?;
        t.expect_symbol('}')?;
        self.emit(format!("goto {top_label}"));
        self.emit(format!("label {end_label}"));
        Ok(())
    }

    fn compile_do(&mut self, t: &mut Tokenizer) -> Result<()> {
        t.expect_keyword("do")?;
        self.compile_subroutine_call(t)?;
        t.expect_symbol(';')?;
        self.emit("pop temp 0");
        Ok(())
    }

    fn compile_return(&mut self, t: &mut Tokenizer) -> Result<()> {
        t.expect_keyword("return")?;
        if t.at_symbol(';') {
            self.emit("push constant 0");
        } else {
            self.compile_expression(t)?;
        }
        t.expect_symbol(';')?;
        self.emit("return");
        Ok(())
    }

    fn compile_subroutine_call(&mut self, t: &mut Tokenizer) -> Result<()> {
        let first = t.expect_identifier()?;
        self.compile_call_from_term(t, first)
    }

    fn compile_expression_list(&mut self, t: &mut Tokenizer) -> Result<u16> {
        t.expect_symbol('(')?;
        self.compile_expression_list_inner(t)
    }

    fn compile_expression_list_inner(&mut self, t: &mut Tokenizer) -> Result<u16> {
        let mut count = 0u16;
        if !t.at_symbol(')') {
            self.compile_expression(t)?;
            count += 1;
            while t.at_symbol(',') {
                t.expect_symbol(',')?;
                self.compile_expression(t)?;
                count += 1;
            }
        }
        t.expect_symbol(')')?;
        Ok(count)
    }

    fn compile_expression(&mut self, t: &mut Tokenizer) -> Result<()> {
        self.compile_term(t)?;
        loop {
            let op = match t.peek() {
                Some(Tok::Symbol(c)) if "+-*/&|<>=".contains(*c) => *c,
                _ => break,
            };
            t.advance()?;
            self.compile_term(t)?;
            match op {
                '+' => self.emit("add"),
                '-' => self.emit("sub"),
                '*' => self.emit("call Math.multiply 2"),
                '/' => self.emit("call Math.divide 2"),
                '&' => self.emit("and"),
                '|' => self.emit("or"),
                '<' => self.emit("lt"),
                '>' => self.emit("gt"),
                '=' => self.emit("eq"),
                _ => unreachable!(),
            }
        }
        Ok(())
    }

    fn compile_term(&mut self, t: &mut Tokenizer) -> Result<()> {
        match t.advance()? {
            Tok::IntConst(n) => self.emit(format!("push constant {n}")),
            Tok::StringConst(s) => {
                self.emit(format!("push constant {}", s.len()));
                self.emit("call String.new 1");
                for byte in s.bytes() {
                    self.emit(format!("push constant {byte}"));
                    self.emit("call String.appendChar 2");
                }
            }
            Tok::Keyword(k) if k == "true" => {
                self.emit("push constant 0");
                self.emit("not");
            }
            Tok::Keyword(k) if k == "false" || k == "null" => self.emit("push constant 0"),
            Tok::Keyword(k) if k == "this" => self.emit("push pointer 0"),
            Tok::Symbol('(') => {
                self.compile_expression(t)?;
                t.expect_symbol(')')?;
            }
            Tok::Symbol('-') => {
                self.compile_term(t)?;
                self.emit("neg");
            }
            Tok::Symbol('~') => {
                self.compile_term(t)?;
                self.emit("not");
            }
            Tok::Identifier(name) => {
                if t.at_symbol('[') {
                    let (kind, index) = self
                        .resolve(&name)
                        .ok_or_else(|| compile_err(format!("undeclared variable '{name}'")))?;
                    t.expect_symbol('[')?;
                    self.compile_expression(t)?;
                    t.expect_symbol(']')?;
                    self.emit(format!("push {} {}", kind.segment(), index));
                    self.emit("add");
                    self.emit("pop pointer 1");
                    self.emit("push that 0");
                } else if t.at_symbol('(') || t.at_symbol('.') {
                    self.compile_call_from_term(t, name)?;
                } else if let Some((kind, index)) = self.resolve(&name) {
                    self.emit(format!("push {} {}", kind.segment(), index));
                } else {
                    return Err(compile_err(format!("undeclared variable '{name}'")));
                }
            }
            other => return Err(compile_err(format!("unexpected token in expression: {other:?}"))),
        }
        Ok(())
    }

    fn compile_call_from_term(&mut self, t: &mut Tokenizer, first: String) -> Result<()> {
        if t.at_symbol('.') {
            t.expect_symbol('.')?;
            let method_name = t.expect_identifier()?;
            if let Some((kind, index)) = self.resolve(&first) {
                self.emit(format!("push {} {}", kind.segment(), index));
                let arg_count = 1 + self.compile_expression_list(t)?;
                self.emit(format!("call {first}.{method_name} {arg_count}"));
            } else {
                let arg_count = self.compile_expression_list(t)?;
                self.emit(format!("call {first}.{method_name} {arg_count}"));
            }
        } else {
            self.emit("push pointer 0");
            let arg_count = 1 + self.compile_expression_list(t)?;
            self.emit(format!("call {}.{first} {arg_count}", self.class_name));
        }
        Ok(())
    }
}
