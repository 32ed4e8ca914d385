//! The `.tst` test script grammar (component H, front half):
//!
//! ```text
//! LOAD chip_name;
//! TEST "name" {
//!     VAR g: Chip;
//!     SET g.pin = value;
//!     EVAL;
//!     REQUIRE g.pin IS value (AND g.pin IS value)*;
//! }
//! ```
//!
//! one or more `TEST` blocks follow a single `LOAD`. `REQUIRE` supports `IS`
//! (equal) and `NOT` (not equal) comparisons, conjoined with `AND`.

use crate::error::{Result, SimulatorError};
use crate::languages::lexer::{Lexer, Token, TokenKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Comparison {
    Is,
    Not,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub var: String,
    pub pin: String,
    pub comparison: Comparison,
    pub value: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Var { name: String, chip: String },
    Set { var: String, pin: String, value: u64 },
    Eval,
    Require(Vec<Requirement>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    pub name: String,
    pub statements: Vec<Statement>,
}

/// A `TEST` block that parsed cleanly, or one whose body failed to parse -
/// kept around (rather than dropped) so the block still shows up as a
/// failing result instead of sinking every other block in the script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedTest {
    Case(TestCase),
    Failed { name: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    pub load: String,
    pub tests: Vec<ParsedTest>,
}

struct Cursor<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> &'a Token {
        self.tokens.get(self.pos).unwrap_or_else(|| self.tokens.last().unwrap())
    }

    fn advance(&mut self) -> &'a Token {
        let tok = self.peek();
        self.pos += 1;
        tok
    }

    fn expect_identifier(&mut self) -> Result<String> {
        match &self.advance().kind {
            TokenKind::Identifier(s) => Ok(s.clone()),
            other => Err(SimulatorError::Parse(format!("expected an identifier, found {other:?}"))),
        }
    }

    fn expect_keyword(&mut self, word: &str) -> Result<()> {
        match &self.advance().kind {
            TokenKind::Identifier(s) if s == word => Ok(()),
            other => Err(SimulatorError::Parse(format!("expected '{word}', found {other:?}"))),
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<()> {
        let tok = self.advance();
        if &tok.kind == kind {
            Ok(())
        } else {
            Err(SimulatorError::Parse(format!("expected {kind:?}, found {:?}", tok.kind)))
        }
    }

    fn expect_number(&mut self) -> Result<u64> {
        match &self.advance().kind {
            TokenKind::Number(n) => Ok(*n),
            other => Err(SimulatorError::Parse(format!("expected a number, found {other:?}"))),
        }
    }

    fn expect_string(&mut self) -> Result<String> {
        match &self.advance().kind {
            TokenKind::Str(s) => Ok(s.clone()),
            other => Err(SimulatorError::Parse(format!("expected a quoted string, found {other:?}"))),
        }
    }

    fn at_identifier(&self, word: &str) -> bool {
        matches!(&self.peek().kind, TokenKind::Identifier(s) if s == word)
    }

    /// Skips tokens until the next `TEST` keyword or end of input, without
    /// consuming it - restabilizes after one block's parse failure so the
    /// remaining `TEST` blocks in the script still get parsed and run.
    fn sync_to_test(&mut self) {
        loop {
            match &self.peek().kind {
                TokenKind::Eof => return,
                TokenKind::Identifier(s) if s == "TEST" => return,
                _ => {
                    self.advance();
                }
            }
        }
    }
}

pub fn parse(source: &str) -> Result<Script> {
    let tokens = Lexer::new(source).tokenize();
    let mut cursor = Cursor { tokens: &tokens, pos: 0 };

    cursor.expect_keyword("LOAD")?;
    let load = cursor.expect_identifier()?;
    cursor.expect(&TokenKind::Semicolon)?;

    let mut tests = Vec::new();
    let mut index = 0usize;
    while cursor.at_identifier("TEST") {
        index += 1;
        match parse_test(&mut cursor) {
            Ok(case) => tests.push(ParsedTest::Case(case)),
            Err(e) => {
                tests.push(ParsedTest::Failed { name: format!("test #{index}"), message: e.to_string() });
                cursor.sync_to_test();
            }
        }
    }
    if !matches!(cursor.peek().kind, TokenKind::Eof) {
        return Err(SimulatorError::Parse(format!(
            "unexpected trailing token {:?} after last TEST block",
            cursor.peek().kind
        )));
    }
    if tests.is_empty() {
        return Err(SimulatorError::Parse("script has no TEST blocks".into()));
    }
    Ok(Script { load, tests })
}

fn parse_test(cursor: &mut Cursor) -> Result<TestCase> {
    cursor.expect_keyword("TEST")?;
    let name = cursor.expect_string()?;
    cursor.expect(&TokenKind::LBrace)?;

    let mut statements = Vec::new();
    while !matches!(cursor.peek().kind, TokenKind::RBrace) {
        statements.push(parse_statement(cursor)?);
    }
    cursor.expect(&TokenKind::RBrace)?;
    Ok(TestCase { name, statements })
}

fn parse_statement(cursor: &mut Cursor) -> Result<Statement> {
    if cursor.at_identifier("VAR") {
        cursor.expect_keyword("VAR")?;
        let name = cursor.expect_identifier()?;
        cursor.expect(&TokenKind::Colon)?;
        let chip = cursor.expect_identifier()?;
        cursor.expect(&TokenKind::Semicolon)?;
        Ok(Statement::Var { name, chip })
    } else if cursor.at_identifier("SET") {
        cursor.expect_keyword("SET")?;
        let (var, pin) = parse_dotted(cursor)?;
        cursor.expect(&TokenKind::Equals)?;
        let value = cursor.expect_number()?;
        cursor.expect(&TokenKind::Semicolon)?;
        Ok(Statement::Set { var, pin, value })
    } else if cursor.at_identifier("EVAL") {
        cursor.expect_keyword("EVAL")?;
        cursor.expect(&TokenKind::Semicolon)?;
        Ok(Statement::Eval)
    } else if cursor.at_identifier("REQUIRE") {
        cursor.expect_keyword("REQUIRE")?;
        let mut requirements = vec![parse_requirement(cursor)?];
        while cursor.at_identifier("AND") {
            cursor.expect_keyword("AND")?;
            requirements.push(parse_requirement(cursor)?);
        }
        cursor.expect(&TokenKind::Semicolon)?;
        Ok(Statement::Require(requirements))
    } else {
        Err(SimulatorError::Parse(format!(
            "expected VAR, SET, EVAL or REQUIRE, found {:?}",
            cursor.peek().kind
        )))
    }
}

fn parse_requirement(cursor: &mut Cursor) -> Result<Requirement> {
    let (var, pin) = parse_dotted(cursor)?;
    let comparison = if cursor.at_identifier("IS") {
        cursor.expect_keyword("IS")?;
        Comparison::Is
    } else if cursor.at_identifier("NOT") {
        cursor.expect_keyword("NOT")?;
        Comparison::Not
    } else {
        return Err(SimulatorError::Parse(format!(
            "expected IS or NOT, found {:?}",
            cursor.peek().kind
        )));
    };
    let value = cursor.expect_number()?;
    Ok(Requirement { var, pin, comparison, value })
}

fn parse_dotted(cursor: &mut Cursor) -> Result<(String, String)> {
    let var = cursor.expect_identifier()?;
    cursor.expect(&TokenKind::Dot)?;
    let pin = cursor.expect_identifier()?;
    Ok((var, pin))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_minimal_nand_test() {
        let src = r#"
            LOAD nand;
            TEST "truth table" {
                VAR g: nand;
                SET g.a = 1;
                SET g.b = 1;
                EVAL;
                REQUIRE g.out IS 0;
            }
        "#;
        let script = parse(src).unwrap();
        assert_eq!(script.load, "nand");
        assert_eq!(script.tests.len(), 1);
        match &script.tests[0] {
            ParsedTest::Case(case) => {
                assert_eq!(case.name, "truth table");
                assert_eq!(case.statements.len(), 5);
            }
            other => panic!("expected a parsed TestCase, got {other:?}"),
        }
    }

    #[test]
    fn require_supports_a_conjunction_of_conditions() {
        let src = r#"
            LOAD mux16;
            TEST "b wins" {
                VAR g: mux16;
                EVAL;
                REQUIRE g.out IS 1 AND g.sel NOT 0;
            }
        "#;
        let script = parse(src).unwrap();
        let ParsedTest::Case(case) = &script.tests[0] else {
            panic!("expected a parsed TestCase, got {:?}", script.tests[0]);
        };
        match &case.statements[1] {
            Statement::Require(reqs) => {
                assert_eq!(reqs.len(), 2);
                assert_eq!(reqs[0].comparison, Comparison::Is);
                assert_eq!(reqs[1].comparison, Comparison::Not);
            }
            other => panic!("expected a Require statement, got {other:?}"),
        }
    }

    #[test]
    fn multiple_test_blocks_share_one_load() {
        let src = r#"
            LOAD nand;
            TEST "one" { EVAL; REQUIRE g.out IS 1; }
            TEST "two" { EVAL; REQUIRE g.out IS 0; }
        "#;
        let script = parse(src).unwrap();
        assert_eq!(script.tests.len(), 2);
    }

    #[test]
    fn missing_load_is_a_parse_error() {
        let err = parse("TEST \"x\" { EVAL; }").unwrap_err();
        assert!(matches!(err, SimulatorError::Parse(_)));
    }

    #[test]
    fn a_malformed_test_block_does_not_sink_the_blocks_around_it() {
        let src = r#"
            LOAD nand;
            TEST "one" { EVAL; REQUIRE g.out IS 1; }
            TEST "broken" { EVAL REQUIRE g.out IS 0; }
            TEST "three" { EVAL; REQUIRE g.out IS 0; }
        "#;
        let script = parse(src).unwrap();
        assert_eq!(script.tests.len(), 3);
        assert!(matches!(&script.tests[0], ParsedTest::Case(c) if c.name == "one"));
        assert!(matches!(&script.tests[1], ParsedTest::Failed { name, .. } if name == "test #2"));
        assert!(matches!(&script.tests[2], ParsedTest::Case(c) if c.name == "three"));
    }
}
