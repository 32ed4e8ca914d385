//! The chip registry. Holds one named template [`Gate`] per known chip,
//! case-insensitively, plus a "current context" used while a recipe or HDL
//! file is being built up incrementally.
//!
//! The reference implementation keeps this behind a process-wide
//! `Board::instance()` singleton so every call site can reach it without
//! threading a parameter through. We don't: callers (the recipe loader, the
//! REPL, the test interpreter) take `&mut Board` explicitly. It costs one
//! extra parameter at a handful of call sites and buys back testability -
//! two boards can coexist in the same process, which the old design ruled
//! out entirely.

use std::collections::HashMap;

use crate::chip::gate::Gate;
use crate::chip::trie::Trie;
use crate::languages::meta::{BusEntry, Meta, PinEntry};

pub struct Board {
    components: HashMap<String, Gate>,
    metadata: HashMap<String, Meta>,
    search_trie: Trie,
    context: Option<String>,
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    pub fn new() -> Self {
        let mut board = Self {
            components: HashMap::new(),
            metadata: HashMap::new(),
            search_trie: Trie::new(),
            context: None,
        };
        board.register_builtin("nand", Gate::new_nand(), crate::languages::meta::nand_meta());
        board.register_builtin("dff", Gate::new_dff(), named_meta("dff", &["in", "clock"], &["out"], &[]));
        board.register_builtin(
            "register",
            Gate::new_register(),
            named_meta("register", &["in[16]", "load", "clock"], &["out[16]"], &[("in", 0, 16), ("out", 0, 16)]),
        );
        board.register_builtin(
            "pc",
            Gate::new_pc(),
            named_meta(
                "pc",
                &["in[16]", "load", "inc", "reset", "clock"],
                &["out[16]"],
                &[("in", 0, 16), ("out", 0, 16)],
            ),
        );
        board.register_builtin(
            "ram16k",
            Gate::new_ram16k(),
            named_meta(
                "ram16k",
                &["in[16]", "address[14]", "load", "clock"],
                &["out[16]"],
                &[("in", 0, 16), ("address", 16, 14), ("out", 0, 16)],
            ),
        );
        board.register_builtin(
            "rom32k",
            Gate::new_rom32k(),
            named_meta(
                "rom32k",
                &["in[16]", "address[15]", "write_address[15]", "load", "clock"],
                &["out[16]"],
                &[("in", 0, 16), ("address", 16, 15), ("write_address", 31, 15), ("out", 0, 16)],
            ),
        );
        board.register_builtin(
            "mux16",
            Gate::new_mux16(),
            named_meta("mux16", &["a[16]", "b[16]", "sel"], &["out[16]"], &[("a", 0, 16), ("b", 16, 16), ("out", 0, 16)]),
        );
        board
    }

    fn register_builtin(&mut self, name: &str, gate: Gate, meta: Meta) {
        self.components.insert(name.to_string(), gate);
        self.metadata.insert(name.to_string(), meta);
        self.search_trie.insert(name);
    }

    pub fn get_meta(&self, name: &str) -> Option<&Meta> {
        self.metadata.get(&name.to_ascii_lowercase())
    }

    pub fn save_meta(&mut self, name: &str, meta: Meta) {
        self.metadata.insert(name.to_ascii_lowercase(), meta);
    }

    /// Starts a fresh, empty custom chip under `name` and makes it the
    /// current context.
    pub fn create_new(&mut self, name: &str) {
        let key = name.to_ascii_lowercase();
        self.components.insert(key.clone(), Gate::new_custom(name, 0, 0));
        self.context = Some(key);
    }

    /// Leaves the current context, making the in-progress chip (if any)
    /// searchable under its name from now on.
    pub fn reset_context(&mut self) {
        if let Some(name) = self.context.take() {
            self.search_trie.insert(&name);
        }
    }

    pub fn set_context(&mut self, name: &str) {
        let key = name.to_ascii_lowercase();
        self.context = if self.found(&key) { Some(key) } else { None };
    }

    pub fn found(&self, name: &str) -> bool {
        self.components.contains_key(&name.to_ascii_lowercase())
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    pub fn context_mut(&mut self) -> Option<&mut Gate> {
        let key = self.context.clone()?;
        self.components.get_mut(&key)
    }

    pub fn get_component(&self, name: &str) -> Option<&Gate> {
        self.components.get(&name.to_ascii_lowercase())
    }

    pub fn get_component_mut(&mut self, name: &str) -> Option<&mut Gate> {
        self.components.get_mut(&name.to_ascii_lowercase())
    }

    /// Saves an already-built gate template directly, without going
    /// through the create/in/out/add/wire incremental path. Used by the
    /// HDL front end, which builds a whole chip before handing it over.
    pub fn save_sketch(&mut self, gate: Gate) {
        let key = gate.name.to_ascii_lowercase();
        self.search_trie.insert(&key);
        self.components.insert(key, gate);
    }

    pub fn get_names(&self) -> Vec<&str> {
        self.components.keys().map(|s| s.as_str()).collect()
    }

    /// Case-insensitive prefix search over every registered chip name.
    pub fn search(&self, query: &str) -> Vec<&Gate> {
        self.search_trie
            .fuzzy(query)
            .into_iter()
            .filter_map(|name| self.components.get(&name))
            .collect()
    }

    /// Looks a chip up by name and hands back a fresh, wired duplicate
    /// ready to be dropped in as a subgate.
    pub fn instantiate(&self, name: &str) -> Option<Gate> {
        self.get_component(name).map(Gate::duplicate)
    }
}

/// Builds a [`Meta`] for a hardcoded builtin from `name[width]`-style
/// declaration strings plus an explicit bus table, since builtins have no
/// `.meta` file on disk to parse one from.
fn named_meta(chip_name: &str, inputs: &[&str], outputs: &[&str], buses: &[(&str, usize, usize)]) -> Meta {
    let strip = |decl: &str| decl.split('[').next().unwrap_or(decl).to_string();
    Meta {
        chip_name: chip_name.to_string(),
        buses: buses
            .iter()
            .map(|&(name, start, size)| BusEntry { name: name.to_string(), start, size })
            .collect(),
        inputs: running_offsets(inputs).into_iter().map(|(decl, start)| PinEntry { name: strip(decl), start }).collect(),
        outputs: running_offsets(outputs).into_iter().map(|(decl, start)| PinEntry { name: strip(decl), start }).collect(),
    }
}

fn running_offsets<'a>(decls: &[&'a str]) -> Vec<(&'a str, usize)> {
    let mut offset = 0;
    let mut out = Vec::new();
    for decl in decls {
        out.push((*decl, offset));
        let width = decl
            .split_once('[')
            .and_then(|(_, rest)| rest.strip_suffix(']'))
            .and_then(|n| n.parse::<usize>().ok())
            .unwrap_or(1);
        offset += width;
    }
    out
}
