//! Drives a `.tst` script file end to end: loads the chip it names (falling
//! back to HDL compilation the same way a `need` recipe command does),
//! parses the script, and executes every `TEST` block against the board.

use std::fs;
use std::path::Path;

use crate::chip::board::Board;
use crate::config::Config;
use crate::error::{Result, SimulatorError};
use crate::languages::{recipe, tst};
use crate::test::chiptst::{ChipTest, Outcome};

pub struct TestRunner<'a> {
    board: &'a mut Board,
    config: &'a Config,
}

impl<'a> TestRunner<'a> {
    pub fn new(board: &'a mut Board, config: &'a Config) -> Self {
        Self { board, config }
    }

    pub fn run_source(&mut self, source: &str) -> Result<Vec<Outcome>> {
        let script = tst::parse(source)?;
        recipe::ensure_loaded(self.board, self.config, &script.load)?;
        ChipTest::new(self.board).run(&script)
    }

    pub fn run_file(&mut self, path: &Path) -> Result<Vec<Outcome>> {
        let source = fs::read_to_string(path)
            .map_err(|_| SimulatorError::FileNotFound(path.display().to_string()))?;
        self.run_source(&source)
    }

    pub fn run_named(&mut self, test_name: &str) -> Result<Vec<Outcome>> {
        let path = self.config.scripts_dir().join(format!("{test_name}.tst"));
        self.run_file(&path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_a_script_against_a_builtin_without_touching_disk() {
        let mut board = Board::new();
        let config = Config::new(".");
        let mut runner = TestRunner::new(&mut board, &config);
        let outcomes = runner
            .run_source(
                r#"
                LOAD nand;
                TEST "sanity" {
                    VAR g: nand;
                    SET g.a = 0;
                    SET g.b = 0;
                    EVAL;
                    REQUIRE g.out IS 1;
                }
                "#,
            )
            .unwrap();
        assert!(outcomes[0].passed);
    }

    #[test]
    fn missing_file_reports_file_not_found() {
        let mut board = Board::new();
        let config = Config::new(".");
        let mut runner = TestRunner::new(&mut board, &config);
        let err = runner.run_file(Path::new("/nonexistent/path.tst")).unwrap_err();
        assert!(matches!(err, SimulatorError::FileNotFound(_)));
    }
}
