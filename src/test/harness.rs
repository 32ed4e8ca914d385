//! Formats `TestRunner` output into the pass/fail report the CLI prints for
//! `test <name>` and `test all`.

use std::path::Path;

use crate::chip::board::Board;
use crate::config::Config;
use crate::error::Result;
use crate::test::chiptst::Outcome;
use crate::test::runner::TestRunner;

pub struct TestHarness;

impl TestHarness {
    pub fn run_file(board: &mut Board, config: &Config, path: &Path) -> Result<String> {
        let outcomes = TestRunner::new(board, config).run_file(path)?;
        Ok(Self::report(&outcomes))
    }

    pub fn run_named(board: &mut Board, config: &Config, name: &str) -> Result<String> {
        let outcomes = TestRunner::new(board, config).run_named(name)?;
        Ok(Self::report(&outcomes))
    }

    fn report(outcomes: &[Outcome]) -> String {
        let mut lines = Vec::new();
        let mut passed = 0;
        for outcome in outcomes {
            if outcome.passed {
                passed += 1;
                lines.push(format!("ok   {}", outcome.name));
            } else {
                lines.push(format!("FAIL {}", outcome.name));
                for failure in &outcome.failures {
                    lines.push(format!("       {failure}"));
                }
            }
        }
        lines.push(format!("{passed}/{} tests passed", outcomes.len()));
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_summarizes_pass_and_fail_counts() {
        let outcomes = vec![
            Outcome { name: "a".into(), passed: true, failures: vec![] },
            Outcome { name: "b".into(), passed: false, failures: vec!["b.out: expected IS 1, got 0".into()] },
        ];
        let report = TestHarness::report(&outcomes);
        assert!(report.contains("ok   a"));
        assert!(report.contains("FAIL b"));
        assert!(report.contains("1/2 tests passed"));
    }
}
