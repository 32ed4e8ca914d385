//! The HDL front end (component F): recursive-descent parser over the
//! `CHIP ... { IN ...; OUT ...; PARTS: ...; }` grammar, lowering straight
//! into a [`Gate`] template plus its [`Meta`] sidecar. There is no
//! intermediate AST handed back to callers - `compile` drives the whole
//! pipeline because the parser needs `Board` lookups (a part's metadata)
//! interleaved with parsing, exactly like the reference implementation's
//! `RecipeBuilder` did.
//!
//! Internal (undeclared) signal names are resolved in a second pass: every
//! `formal=actual` connection whose `actual` isn't one of the chip's own
//! declared pins is recorded per-bit into a net table, keyed by name, and
//! wired directly from its producing subgate pin to its consuming pins once
//! every part has been seen. This sidesteps giving internal nets any
//! backing storage of their own - a wire always connects two real pins.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::chip::board::Board;
use crate::chip::gate::Gate;
use crate::chip::pin::INPUT_PIN_LIMIT;
use crate::config::Config;
use crate::error::{Diagnostics, Result, SimulatorError};
use crate::languages::lexer::{Lexer, Token, TokenKind};
use crate::languages::meta::{BusEntry, Meta, PinEntry};
use crate::languages::recipe;

pub struct Built {
    pub gate: Gate,
    pub metadata: Meta,
}

// ---- parsed AST -----------------------------------------------------------

#[derive(Debug, Clone)]
struct PinDecl {
    name: String,
    width: usize,
}

#[derive(Debug, Clone, Copy)]
enum Access {
    Const(bool),
    Ref { index: Option<(usize, usize)> },
}

#[derive(Debug, Clone)]
struct Connection {
    formal: String,
    formal_index: Option<(usize, usize)>,
    actual_name: Option<String>,
    actual: Access,
}

#[derive(Debug, Clone)]
struct PartInst {
    chip: String,
    connections: Vec<Connection>,
}

#[derive(Debug, Clone)]
struct ParsedChip {
    name: String,
    inputs: Vec<PinDecl>,
    outputs: Vec<PinDecl>,
    parts: Vec<PartInst>,
}

// ---- tokenizing/parsing -----------------------------------------------------

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    diagnostics: Diagnostics,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0, diagnostics: Diagnostics::default() }
    }

    /// Records a diagnostic at the current token's position without
    /// aborting the parse.
    fn record(&mut self, message: impl Into<String>) {
        let tok = self.peek();
        self.diagnostics.push(tok.line, tok.column, message);
    }

    /// Skips tokens until the next `IN`/`OUT`/`PARTS` keyword or the
    /// chip's closing brace, so a bad declaration doesn't prevent the
    /// remaining sections from being parsed and reported on.
    fn sync_to_section(&mut self) {
        loop {
            match &self.peek().kind {
                TokenKind::RBrace | TokenKind::Eof => return,
                TokenKind::Identifier(word) if matches!(word.as_str(), "IN" | "OUT" | "PARTS") => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    /// Skips tokens through the next `;`, so one malformed part
    /// declaration doesn't prevent the rest of `PARTS` from being parsed.
    /// Stops (without consuming) at the chip's closing brace or EOF.
    fn sync_to_semicolon(&mut self) {
        loop {
            match &self.peek().kind {
                TokenKind::RBrace | TokenKind::Eof => return,
                TokenKind::Semicolon => {
                    self.advance();
                    return;
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn peek(&self) -> &'a Token {
        self.tokens.get(self.pos).unwrap_or_else(|| self.tokens.last().unwrap())
    }

    fn advance(&mut self) -> &'a Token {
        let tok = self.peek();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn ident(&mut self) -> Result<String> {
        match &self.advance().kind {
            TokenKind::Identifier(s) => Ok(s.clone()),
            other => Err(SimulatorError::Parse(format!("expected identifier, found {other:?}"))),
        }
    }

    fn expect_ident(&mut self, word: &str) -> Result<()> {
        let got = self.ident()?;
        if got != word {
            return Err(SimulatorError::Parse(format!("expected '{word}', found '{got}'")));
        }
        Ok(())
    }

    fn eat(&mut self, kind: TokenKind) -> Result<()> {
        let tok = self.advance();
        if tok.kind != kind {
            return Err(SimulatorError::Parse(format!("expected {kind:?}, found {:?}", tok.kind)));
        }
        Ok(())
    }

    fn at(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn number(&mut self) -> Result<usize> {
        match &self.advance().kind {
            TokenKind::Number(n) => Ok(*n as usize),
            other => Err(SimulatorError::Parse(format!("expected a number, found {other:?}"))),
        }
    }

    /// `name` or `name[n]`, used in `IN`/`OUT` declarations.
    fn pin_decl(&mut self) -> Result<PinDecl> {
        let name = self.ident()?;
        let width = if self.at(&TokenKind::LBracket) {
            self.advance();
            let n = self.number()?;
            self.eat(TokenKind::RBracket)?;
            n
        } else {
            1
        };
        Ok(PinDecl { name, width })
    }

    fn pin_decl_list(&mut self) -> Result<Vec<PinDecl>> {
        let mut out = vec![self.pin_decl()?];
        while self.at(&TokenKind::Comma) {
            self.advance();
            out.push(self.pin_decl()?);
        }
        self.eat(TokenKind::Semicolon)?;
        Ok(out)
    }

    /// `name`, `name[i]`, `name[lo..hi]`, or a boolean literal.
    fn access(&mut self) -> Result<(Option<String>, Access)> {
        match &self.advance().kind {
            TokenKind::Number(0) => Ok((None, Access::Const(false))),
            TokenKind::Number(1) => Ok((None, Access::Const(true))),
            TokenKind::Identifier(s) if s == "true" => Ok((None, Access::Const(true))),
            TokenKind::Identifier(s) if s == "false" => Ok((None, Access::Const(false))),
            TokenKind::Identifier(name) => {
                let name = name.clone();
                if self.at(&TokenKind::LBracket) {
                    self.advance();
                    let lo = self.number()?;
                    let index = if self.at(&TokenKind::DotDot) {
                        self.advance();
                        let hi = self.number()?;
                        (lo, hi)
                    } else {
                        (lo, lo)
                    };
                    self.eat(TokenKind::RBracket)?;
                    Ok((Some(name), Access::Ref { index: Some(index) }))
                } else {
                    Ok((Some(name), Access::Ref { index: None }))
                }
            }
            other => Err(SimulatorError::Parse(format!("expected a pin reference, found {other:?}"))),
        }
    }

    fn part(&mut self) -> Result<PartInst> {
        let chip = self.ident()?;
        self.eat(TokenKind::LParen)?;
        let mut connections = Vec::new();
        if !self.at(&TokenKind::RParen) {
            loop {
                let (formal_name, formal_access) = self.access()?;
                let formal = formal_name.ok_or_else(|| {
                    SimulatorError::Parse("part connection's formal side must be a pin name".into())
                })?;
                let formal_index = match formal_access {
                    Access::Ref { index } => index,
                    Access::Const(_) => {
                        return Err(SimulatorError::Parse("constant on the formal side of a connection".into()))
                    }
                };
                self.eat(TokenKind::Equals)?;
                let (actual_name, actual) = self.access()?;
                connections.push(Connection { formal, formal_index, actual_name, actual });
                if self.at(&TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.eat(TokenKind::RParen)?;
        self.eat(TokenKind::Semicolon)?;
        Ok(PartInst { chip, connections })
    }

    fn chip(&mut self) -> Result<ParsedChip> {
        self.expect_ident("CHIP")?;
        let name = self.ident()?;
        self.eat(TokenKind::LBrace)?;

        let mut inputs = Vec::new();
        let mut outputs = Vec::new();
        let mut parts = Vec::new();

        loop {
            if self.at(&TokenKind::RBrace) {
                self.advance();
                break;
            }
            if self.at(&TokenKind::Eof) {
                self.record("unexpected end of input inside CHIP body");
                break;
            }
            let word = match self.ident() {
                Ok(w) => w,
                Err(e) => {
                    self.record(e.to_string());
                    self.sync_to_section();
                    continue;
                }
            };
            match word.as_str() {
                "IN" => match self.pin_decl_list() {
                    Ok(decls) => inputs = decls,
                    Err(e) => {
                        self.record(e.to_string());
                        self.sync_to_section();
                    }
                },
                "OUT" => match self.pin_decl_list() {
                    Ok(decls) => outputs = decls,
                    Err(e) => {
                        self.record(e.to_string());
                        self.sync_to_section();
                    }
                },
                "PARTS" => {
                    if let Err(e) = self.eat(TokenKind::Colon) {
                        self.record(e.to_string());
                        self.sync_to_section();
                        continue;
                    }
                    while !self.at(&TokenKind::RBrace) && !self.at(&TokenKind::Eof) {
                        match self.part() {
                            Ok(p) => parts.push(p),
                            Err(e) => {
                                self.record(e.to_string());
                                self.sync_to_semicolon();
                            }
                        }
                    }
                }
                other => {
                    self.record(format!("unexpected chip section '{other}'"));
                    self.sync_to_section();
                }
            }
        }

        if !self.diagnostics.is_empty() {
            return Err(std::mem::take(&mut self.diagnostics).into_error());
        }

        Ok(ParsedChip { name, inputs, outputs, parts })
    }
}

fn parse(source: &str) -> Result<ParsedChip> {
    let tokens = Lexer::new(source).tokenize();
    let mut parser = Parser::new(&tokens);
    parser.chip()
}

// ---- directories ------------------------------------------------------------

/// name -> (start offset within the declared space, width).
struct Directory(HashMap<String, (usize, usize)>);

impl Directory {
    fn from_decls(decls: &[PinDecl]) -> (Self, usize) {
        let mut map = HashMap::new();
        let mut offset = 0;
        for d in decls {
            map.insert(d.name.clone(), (offset, d.width));
            offset += d.width;
        }
        (Self(map), offset)
    }

    fn from_meta(entries: &[PinEntry], buses: &[BusEntry]) -> Self {
        let mut map = HashMap::new();
        for e in entries {
            let width = buses.iter().find(|b| b.name == e.name).map(|b| b.size).unwrap_or(1);
            map.insert(e.name.clone(), (e.start, width));
        }
        Self(map)
    }

    fn get(&self, name: &str) -> Option<(usize, usize)> {
        self.0.get(name).copied()
    }
}

/// ids for a bus access, MSB-first. `index` is in `lo..=hi` with `0` = LSB,
/// matching the convention the built-in variants already assume (the first
/// id in a declared range is the MSB).
fn access_ids(start: usize, width: usize, index: Option<(usize, usize)>) -> Result<Vec<usize>> {
    let (lo, hi) = index.unwrap_or((0, width.saturating_sub(1)));
    if hi >= width || lo > hi {
        return Err(SimulatorError::BusSizeMismatch { lhs: width, rhs: hi + 1 });
    }
    Ok((lo..=hi).rev().map(|idx| start + (width - 1 - idx)).collect())
}

#[derive(Default)]
struct Net {
    /// bit index (0 = LSB) -> driving global pin id.
    producer: HashMap<usize, usize>,
    /// (consumer global pin id, net bit index) pairs.
    consumers: Vec<(usize, usize)>,
}

// ---- compile ------------------------------------------------------------

pub fn compile(board: &mut Board, config: &Config, source: &str) -> Result<Built> {
    let parsed = parse(source)?;

    for part in &parsed.parts {
        recipe::ensure_loaded(board, config, &part.chip)?;
    }

    let (own_inputs, own_input_width) = Directory::from_decls(&parsed.inputs);
    let (own_outputs, own_output_width) = Directory::from_decls(&parsed.outputs);

    let mut gate = Gate::new_custom(parsed.name.clone(), 0, 0);
    gate.add_input_pin(own_input_width);
    gate.add_output_pin(own_output_width);

    let mut nets: HashMap<String, Net> = HashMap::new();
    let mut input_running = gate.input_pins.len();
    let mut output_running = gate.output_pins.len();

    // A `true` constant is backed by a hidden `nand` subgate whose two
    // inputs are left permanently unwired (default low), so its output is
    // permanently high - no dedicated "forced" pin state is needed, and the
    // resulting recipe round-trips through plain `add`/`wire` commands.
    let needs_true = parsed
        .parts
        .iter()
        .any(|p| p.connections.iter().any(|c| matches!(c.actual, Access::Const(true))));
    let true_pin = if needs_true {
        let base = output_running;
        gate.add_subgate(Gate::new_nand());
        input_running += 2;
        output_running += 1;
        Some(INPUT_PIN_LIMIT + base)
    } else {
        None
    };

    for part in &parsed.parts {
        let meta = board
            .get_meta(&part.chip)
            .cloned()
            .ok_or_else(|| SimulatorError::UnknownChip(part.chip.clone()))?;
        let sub_inputs = Directory::from_meta(&meta.inputs, &meta.buses);
        let sub_outputs = Directory::from_meta(&meta.outputs, &meta.buses);

        let subgate = board
            .instantiate(&part.chip)
            .ok_or_else(|| SimulatorError::UnknownChip(part.chip.clone()))?;
        let sub_in_n = subgate.input_pins.len();
        let sub_out_n = subgate.output_pins.len();
        let sub_input_base = input_running;
        let sub_output_base = output_running;
        input_running += sub_in_n;
        output_running += sub_out_n;
        let sub_idx = gate.subgates.len();
        gate.add_subgate(subgate);

        for conn in &part.connections {
            let (is_output, local_start, local_width) = if let Some((start, width)) = sub_outputs.get(&conn.formal) {
                (true, start, width)
            } else if let Some((start, width)) = sub_inputs.get(&conn.formal) {
                (false, start, width)
            } else {
                return Err(SimulatorError::UnknownPin {
                    chip: part.chip.clone(),
                    pin: conn.formal.clone(),
                });
            };
            let local_ids = access_ids(local_start, local_width, conn.formal_index)?;
            let global_ids: Vec<usize> = if is_output {
                local_ids.iter().map(|&i| INPUT_PIN_LIMIT + sub_output_base + i).collect()
            } else {
                local_ids.iter().map(|&i| sub_input_base + i).collect()
            };
            let _ = sub_idx;

            match conn.actual {
                Access::Const(true) => {
                    let src = true_pin.expect("true-constant pin reserved during scan");
                    for &d in &global_ids {
                        gate.wire_pins(src, d)?;
                    }
                }
                Access::Const(false) => { /* default LOW already - nothing to wire */ }
                Access::Ref { index } => {
                    let name = conn.actual_name.as_ref().expect("non-const access carries a name");
                    if let Some((start, width)) = own_inputs.get(name) {
                        let ids = access_ids(start, width, index)?;
                        if ids.len() != global_ids.len() {
                            return Err(SimulatorError::BusSizeMismatch { lhs: ids.len(), rhs: global_ids.len() });
                        }
                        if is_output {
                            return Err(SimulatorError::UnknownPin { chip: parsed.name.clone(), pin: name.clone() });
                        }
                        for (s, d) in ids.iter().zip(global_ids.iter()) {
                            gate.wire_pins(*s, *d)?;
                        }
                    } else if let Some((start, width)) = own_outputs.get(name) {
                        let ids = access_ids(start, width, index)?;
                        if ids.len() != global_ids.len() {
                            return Err(SimulatorError::BusSizeMismatch { lhs: ids.len(), rhs: global_ids.len() });
                        }
                        if !is_output {
                            return Err(SimulatorError::UnknownPin { chip: parsed.name.clone(), pin: name.clone() });
                        }
                        let ids: Vec<usize> = ids.iter().map(|&i| INPUT_PIN_LIMIT + i).collect();
                        for (s, d) in global_ids.iter().zip(ids.iter()) {
                            gate.wire_pins(*s, *d)?;
                        }
                    } else {
                        // internal net
                        let width = global_ids.len();
                        let (lo, hi) = index.unwrap_or((0, width.saturating_sub(1)));
                        let net_bits: Vec<usize> = (lo..=hi).rev().collect();
                        let net = nets.entry(name.clone()).or_default();
                        if is_output {
                            for (&bit, &gid) in net_bits.iter().zip(global_ids.iter()) {
                                net.producer.insert(bit, gid);
                            }
                        } else {
                            for (&bit, &gid) in net_bits.iter().zip(global_ids.iter()) {
                                net.consumers.push((gid, bit));
                            }
                        }
                    }
                }
            }
        }
    }

    for (name, net) in &nets {
        for &(consumer, bit) in &net.consumers {
            let source = net.producer.get(&bit).ok_or_else(|| SimulatorError::UnknownPin {
                chip: parsed.name.clone(),
                pin: format!("{name}[{bit}] (undriven internal signal)"),
            })?;
            gate.wire_pins(*source, consumer)?;
        }
    }

    let buses = parsed
        .inputs
        .iter()
        .chain(parsed.outputs.iter())
        .filter(|d| d.width > 1)
        .map(|d| {
            let (start, size) = own_inputs.get(&d.name).or_else(|| own_outputs.get(&d.name)).unwrap();
            BusEntry { name: d.name.clone(), start, size }
        })
        .collect();
    let metadata = Meta {
        chip_name: parsed.name.clone(),
        buses,
        inputs: entries_for(&parsed.inputs),
        outputs: entries_for(&parsed.outputs),
    };

    Ok(Built { gate, metadata })
}

fn entries_for(decls: &[PinDecl]) -> Vec<PinEntry> {
    let mut offset = 0;
    let mut out = Vec::new();
    for d in decls {
        out.push(PinEntry { name: d.name.clone(), start: offset });
        offset += d.width;
    }
    out
}

/// Emits the `.gate` recipe text that would rebuild `gate` from scratch via
/// [`recipe::load_gate_source`]: a `create`, the input/output pin counts, an
/// `add` per subgate (in order), every recorded wire, and `x` to commit.
/// Subgates added by the HDL compiler are already resolved dependencies (or
/// builtins) so no `need` lines are required - the loader/`need` path is
/// what populated them here in the first place.
pub fn to_recipe_text(gate: &Gate) -> String {
    let mut out = String::new();
    out.push_str(&format!("create {}\n", gate.name));
    out.push_str(&format!("input {}\n", gate.input_pins.len()));
    out.push_str(&format!("output {}\n", gate.output_pins.len()));
    for sub in &gate.subgates {
        out.push_str(&format!("add {}\n", sub.name));
    }
    for (a, b) in &gate.recipe {
        out.push_str(&format!("wire {a} {b}\n"));
    }
    if gate.serialized {
        out.push_str("e\n");
    }
    out.push_str("x\n");
    out
}

pub fn compile_file(board: &mut Board, config: &Config, path: &Path) -> Result<Built> {
    let source = fs::read_to_string(path).map_err(|_| SimulatorError::FileNotFound(path.display().to_string()))?;
    compile(board, config, &source)
}
