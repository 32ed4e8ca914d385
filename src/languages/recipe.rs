//! The `.gate` recipe format: a flat, token-driven build script for a
//! single chip, using the pin-id convention directly rather than symbolic
//! names. This is the "compiled" form an `.hdl` file is lowered to; the
//! loader below is also what a hand-written recipe file goes through.
//!
//! Command vocabulary (one command, possibly with arguments, per
//! statement): `need <name>`, `create <name>`, `input <n>`, `output <n>`,
//! `add <name>`, `wire <a> <b>`, `e` (precompute/serialize the current
//! context), `x` (leave the current context).

use std::fs;
use std::path::Path;

use crate::chip::board::Board;
use crate::config::Config;
use crate::error::{Result, SimulatorError};
use crate::languages::hdl;
use crate::languages::lexer::{Lexer, Token, TokenKind};
use crate::languages::meta;

pub fn load_gate_file(board: &mut Board, config: &Config, chip_name: &str) -> Result<bool> {
    let path = config.gate_path(chip_name);
    if !path.exists() {
        return Ok(false);
    }
    let source = fs::read_to_string(&path)?;
    load_gate_source(board, config, &source)
}

pub fn load_gate_path(board: &mut Board, config: &Config, path: &Path) -> Result<bool> {
    let source = fs::read_to_string(path)
        .map_err(|_| SimulatorError::FileNotFound(path.display().to_string()))?;
    load_gate_source(board, config, &source)
}

pub fn load_gate_source(board: &mut Board, config: &Config, source: &str) -> Result<bool> {
    let tokens = Lexer::new(source).tokenize();
    let mut cursor = Cursor::new(&tokens);

    loop {
        let token = cursor.advance();
        match &token.kind {
            TokenKind::Eof => return Ok(true),
            TokenKind::Identifier(word) => match word.as_str() {
                "need" => {
                    let name = cursor.expect_identifier("need")?;
                    ensure_loaded(board, config, &name)?;
                }
                "create" => {
                    let name = cursor.expect_identifier("create")?;
                    board.create_new(&name);
                    board.set_context(&name);
                }
                "input" => {
                    let n = cursor.expect_number("input")?;
                    current_mut(board)?.add_input_pin(n as usize);
                }
                "output" => {
                    let n = cursor.expect_number("output")?;
                    current_mut(board)?.add_output_pin(n as usize);
                }
                "add" => {
                    let name = cursor.expect_identifier("add")?;
                    let subgate = board
                        .instantiate(&name)
                        .ok_or_else(|| SimulatorError::UnknownChip(name.clone()))?;
                    current_mut(board)?.add_subgate(subgate);
                }
                "wire" => {
                    let a = cursor.expect_number("wire")?;
                    let b = cursor.expect_number("wire")?;
                    current_mut(board)?.wire_pins(a as usize, b as usize)?;
                }
                "e" => {
                    current_mut(board)?.serialize()?;
                }
                "x" => {
                    board.reset_context();
                }
                other => return Err(SimulatorError::Parse(format!("unknown recipe command '{other}'"))),
            },
            other => return Err(SimulatorError::Parse(format!("unexpected token {other:?} in recipe"))),
        }
    }
}

fn current_mut(board: &mut Board) -> Result<&mut crate::chip::gate::Gate> {
    board
        .context_mut()
        .ok_or_else(|| SimulatorError::Parse("no active context: issue `create` first".into()))
}

/// Makes sure `name` is registered on `board`, pulling it in from a cached
/// `.gate` recipe or, failing that, compiling it fresh from `.hdl` source.
/// Shared by the recipe loader's `need` command and the HDL front end's
/// part resolution, both of which hit the same "not loaded yet" case.
pub fn ensure_loaded(board: &mut Board, config: &Config, name: &str) -> Result<()> {
    if board.found(name) {
        return Ok(());
    }
    if load_gate_file(board, config, name)? {
        return Ok(());
    }
    compile_needed_chip(board, config, name)
}

/// A `need` for a chip that isn't registered and has no `.gate` file on
/// disk falls back to compiling its `.hdl` source, then persists the
/// result as both a `.gate` recipe and a `.meta` sidecar so future runs
/// skip straight to the cached recipe.
fn compile_needed_chip(board: &mut Board, config: &Config, name: &str) -> Result<()> {
    let hdl_path = config.hdl_path(name);
    let source = fs::read_to_string(&hdl_path)
        .map_err(|_| SimulatorError::FileNotFound(hdl_path.display().to_string()))?;
    let built = hdl::compile(board, config, &source)?;

    fs::create_dir_all(config.sketches_dir())?;
    fs::write(config.gate_path(name), hdl::to_recipe_text(&built.gate))?;

    fs::create_dir_all(config.scripts_dir())?;
    fs::write(config.meta_path(name), meta::to_meta_text(&built.metadata))?;

    board.save_sketch(built.gate);
    Ok(())
}

struct Cursor<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn advance(&mut self) -> &'a Token {
        let tok = self.tokens.get(self.pos).unwrap_or_else(|| self.tokens.last().unwrap());
        self.pos += 1;
        tok
    }

    fn expect_identifier(&mut self, ctx: &str) -> Result<String> {
        match &self.advance().kind {
            TokenKind::Identifier(s) => Ok(s.clone()),
            other => Err(SimulatorError::Parse(format!("`{ctx}` expects an identifier, found {other:?}"))),
        }
    }

    fn expect_number(&mut self, ctx: &str) -> Result<u64> {
        match &self.advance().kind {
            TokenKind::Number(n) => Ok(*n),
            other => Err(SimulatorError::Parse(format!("`{ctx}` expects a number, found {other:?}"))),
        }
    }
}
