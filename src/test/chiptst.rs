//! Execution of a parsed `.tst` script (component H, back half) against a
//! `Board`: each `TEST` block gets its own fresh set of `VAR` instances, so
//! one script's tests never leak state into each other.

use std::collections::HashMap;

use crate::chip::board::Board;
use crate::chip::gate::{pack_msb, unpack_msb, Gate};
use crate::error::{Result, SimulatorError};
use crate::languages::meta::Meta;
use crate::languages::tst::{ParsedTest, Script, Statement, TestCase};
use crate::test::comparator::TestComparator;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub name: String,
    pub passed: bool,
    pub failures: Vec<String>,
}

pub struct ChipTest<'a> {
    board: &'a mut Board,
}

impl<'a> ChipTest<'a> {
    pub fn new(board: &'a mut Board) -> Self {
        Self { board }
    }

    /// A `TEST` block that failed to parse surfaces as a failing `Outcome`
    /// instead of aborting the whole script - a bad block never prevents
    /// the other blocks in the same `.tst` file from running.
    pub fn run(&mut self, script: &Script) -> Result<Vec<Outcome>> {
        script
            .tests
            .iter()
            .map(|test| match test {
                ParsedTest::Case(case) => self.run_case(case),
                ParsedTest::Failed { name, message } => {
                    Ok(Outcome { name: name.clone(), passed: false, failures: vec![message.clone()] })
                }
            })
            .collect()
    }

    fn run_case(&mut self, case: &TestCase) -> Result<Outcome> {
        let mut vars: HashMap<String, Gate> = HashMap::new();
        let mut metas: HashMap<String, Meta> = HashMap::new();
        let mut failures = Vec::new();

        for statement in &case.statements {
            match statement {
                Statement::Var { name, chip } => {
                    let gate = self
                        .board
                        .instantiate(chip)
                        .ok_or_else(|| SimulatorError::UnknownChip(chip.clone()))?;
                    let meta = self.board.get_meta(chip).cloned().unwrap_or(Meta {
                        chip_name: chip.clone(),
                        ..Meta::default()
                    });
                    vars.insert(name.clone(), gate);
                    metas.insert(name.clone(), meta);
                }
                Statement::Set { var, pin, value } => {
                    let gate = vars
                        .get_mut(var)
                        .ok_or_else(|| SimulatorError::Test(format!("undeclared variable '{var}'")))?;
                    let meta = metas
                        .get(var)
                        .ok_or_else(|| SimulatorError::Test(format!("undeclared variable '{var}'")))?;
                    write_pin(gate, meta, pin, *value)?;
                }
                Statement::Eval => {
                    for gate in vars.values_mut() {
                        gate.simulate();
                    }
                }
                Statement::Require(requirements) => {
                    for req in requirements {
                        let gate = vars
                            .get(&req.var)
                            .ok_or_else(|| SimulatorError::Test(format!("undeclared variable '{}'", req.var)))?;
                        let meta = metas
                            .get(&req.var)
                            .ok_or_else(|| SimulatorError::Test(format!("undeclared variable '{}'", req.var)))?;
                        let actual = read_pin(gate, meta, &req.pin)?;
                        if !TestComparator::evaluate(req.comparison.clone(), actual, req.value) {
                            failures.push(format!(
                                "{}.{}: expected {} {}, got {}",
                                req.var,
                                req.pin,
                                TestComparator::describe(req.comparison.clone()),
                                req.value,
                                actual
                            ));
                        }
                    }
                }
            }
        }

        Ok(Outcome {
            name: case.name.clone(),
            passed: failures.is_empty(),
            failures,
        })
    }
}

fn resolve(meta: &Meta, pin: &str) -> Result<(usize, usize, bool)> {
    if let Some(entry) = meta.find_input(pin) {
        return Ok((entry.start, meta.width_of(pin), false));
    }
    if let Some(entry) = meta.find_output(pin) {
        return Ok((entry.start, meta.width_of(pin), true));
    }
    Err(SimulatorError::PinNotFound { pin: pin.to_string(), chip: meta.chip_name.clone() })
}

fn write_pin(gate: &mut Gate, meta: &Meta, pin: &str, value: u64) -> Result<()> {
    let (start, width, is_output) = resolve(meta, pin)?;
    if is_output {
        return Err(SimulatorError::Test(format!("cannot SET output pin '{pin}'")));
    }
    if value >= (1u64 << width) {
        return Err(SimulatorError::BusOverflow { value: value as u32, width });
    }
    for (pin, bit) in gate.input_pins[start..start + width].iter_mut().zip(unpack_msb(value, width)) {
        pin.state = bit;
    }
    Ok(())
}

fn read_pin(gate: &Gate, meta: &Meta, pin: &str) -> Result<u64> {
    let (start, width, is_output) = resolve(meta, pin)?;
    let slice = if is_output {
        &gate.output_pins[start..start + width]
    } else {
        &gate.input_pins[start..start + width]
    };
    Ok(pack_msb(slice.iter().map(|p| p.state)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::languages::tst;

    #[test]
    fn nand_truth_table_via_a_parsed_script() {
        let mut board = Board::new();
        let script = tst::parse(
            r#"
            LOAD nand;
            TEST "both high" {
                VAR g: nand;
                SET g.a = 1;
                SET g.b = 1;
                EVAL;
                REQUIRE g.out IS 0;
            }
            TEST "both low" {
                VAR g: nand;
                SET g.a = 0;
                SET g.b = 0;
                EVAL;
                REQUIRE g.out IS 1;
            }
            "#,
        )
        .unwrap();

        let outcomes = ChipTest::new(&mut board).run(&script).unwrap();
        assert!(outcomes.iter().all(|o| o.passed), "{outcomes:?}");
    }

    #[test]
    fn a_failing_require_is_reported_with_the_actual_value() {
        let mut board = Board::new();
        let script = tst::parse(
            r#"
            LOAD nand;
            TEST "wrong expectation" {
                VAR g: nand;
                SET g.a = 1;
                SET g.b = 1;
                EVAL;
                REQUIRE g.out IS 1;
            }
            "#,
        )
        .unwrap();

        let outcomes = ChipTest::new(&mut board).run(&script).unwrap();
        assert!(!outcomes[0].passed);
        assert!(outcomes[0].failures[0].contains("got 0"));
    }

    #[test]
    fn unknown_pin_name_is_an_error() {
        let mut board = Board::new();
        let script = tst::parse(
            r#"
            LOAD nand;
            TEST "bad pin" {
                VAR g: nand;
                SET g.nonexistent = 1;
                EVAL;
                REQUIRE g.out IS 1;
            }
            "#,
        )
        .unwrap();

        let err = ChipTest::new(&mut board).run(&script).unwrap_err();
        assert!(matches!(err, SimulatorError::PinNotFound { .. }));
    }

    #[test]
    fn setting_a_single_bit_pin_to_its_max_value_succeeds_but_overflow_fails() {
        let mut board = Board::new();
        let ok_script = tst::parse(
            r#"
            LOAD nand;
            TEST "max fits" {
                VAR g: nand;
                SET g.a = 1;
                SET g.b = 0;
                EVAL;
                REQUIRE g.out IS 1;
            }
            "#,
        )
        .unwrap();
        assert!(ChipTest::new(&mut board).run(&ok_script).unwrap()[0].passed);

        let overflow_script = tst::parse(
            r#"
            LOAD nand;
            TEST "overflow" {
                VAR g: nand;
                SET g.a = 2;
                EVAL;
                REQUIRE g.out IS 1;
            }
            "#,
        )
        .unwrap();
        let err = ChipTest::new(&mut board).run(&overflow_script).unwrap_err();
        assert!(matches!(err, SimulatorError::BusOverflow { value: 2, width: 1 }));
    }

    #[test]
    fn a_malformed_test_block_reports_as_a_failing_outcome_not_a_sunk_script() {
        let mut board = Board::new();
        let script = tst::parse(
            r#"
            LOAD nand;
            TEST "one" {
                VAR g: nand;
                SET g.a = 1;
                SET g.b = 1;
                EVAL;
                REQUIRE g.out IS 0;
            }
            TEST "broken" { EVAL REQUIRE g.out IS 0; }
            TEST "three" {
                VAR g: nand;
                SET g.a = 0;
                SET g.b = 0;
                EVAL;
                REQUIRE g.out IS 1;
            }
            "#,
        )
        .unwrap();

        let outcomes = ChipTest::new(&mut board).run(&script).unwrap();
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].passed, "{:?}", outcomes[0]);
        assert!(!outcomes[1].passed);
        assert!(!outcomes[1].failures.is_empty());
        assert!(outcomes[2].passed, "{:?}", outcomes[2]);
    }

    #[test]
    fn outcome_list_matches_expected_pass_fail_shape() {
        use pretty_assertions::assert_eq;

        let mut board = Board::new();
        let script = tst::parse(
            r#"
            LOAD nand;
            TEST "both high" {
                VAR g: nand;
                SET g.a = 1;
                SET g.b = 1;
                EVAL;
                REQUIRE g.out IS 0;
            }
            "#,
        )
        .unwrap();

        let outcomes = ChipTest::new(&mut board).run(&script).unwrap();
        let expected = vec![Outcome { name: "both high".to_string(), passed: true, failures: vec![] }];
        assert_eq!(outcomes, expected);
    }
}
