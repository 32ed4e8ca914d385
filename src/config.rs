//! Directory layout and runtime configuration.
//!
//! The reference implementation hardcodes its working directories as
//! preprocessor string constants (`GATE_RECIPE_DIRECTORY`, `SCRIPTS_DIR`,
//! ...). We keep the same layout and extensions but make the root
//! overridable, since a real checkout of this crate runs from whatever
//! directory `cargo run`/`cargo test` happens to be invoked from, and a
//! single process-wide hardcoded path would make the test suite depend on
//! the current working directory.

use std::path::{Path, PathBuf};

pub const GATE_EXTENSION: &str = ".gate";
pub const META_EXTENSION: &str = ".meta";
pub const HDL_EXTENSION: &str = ".hdl";
pub const TEST_EXTENSION: &str = ".tst";

pub const GATES_SUBDIR: &str = "gates";
pub const SKETCHES_SUBDIR: &str = "gates/sketches";
pub const SCRIPTS_SUBDIR: &str = "scripts";

/// Resolved filesystem locations for one simulator run. `root` defaults to
/// the current directory, but can be pointed anywhere - at a fixture
/// directory in tests, or at a user-chosen project directory from the CLI.
#[derive(Debug, Clone)]
pub struct Config {
    pub root: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self::new(".")
    }
}

impl Config {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Honors `N2T_HOME` if set, otherwise falls back to the current
    /// directory. This is the only environment variable the simulator
    /// reads; everything else is explicit CLI arguments.
    pub fn from_env() -> Self {
        match std::env::var("N2T_HOME") {
            Ok(path) if !path.is_empty() => Self::new(path),
            _ => Self::default(),
        }
    }

    pub fn gates_dir(&self) -> PathBuf {
        self.root.join(GATES_SUBDIR)
    }

    pub fn sketches_dir(&self) -> PathBuf {
        self.root.join(SKETCHES_SUBDIR)
    }

    pub fn scripts_dir(&self) -> PathBuf {
        self.root.join(SCRIPTS_SUBDIR)
    }

    /// `.gate` recipes live under `gates/sketches/`, one per compiled chip.
    pub fn gate_path(&self, chip_name: &str) -> PathBuf {
        self.sketches_dir().join(format!("{chip_name}{GATE_EXTENSION}"))
    }

    /// `.hdl` sources live under `scripts/`, alongside `.meta` and `.tst`.
    pub fn hdl_path(&self, chip_name: &str) -> PathBuf {
        self.scripts_dir().join(format!("{chip_name}{HDL_EXTENSION}"))
    }

    pub fn meta_path(&self, chip_name: &str) -> PathBuf {
        self.scripts_dir().join(format!("{chip_name}{META_EXTENSION}"))
    }
}

pub fn strip_known_extension(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}
