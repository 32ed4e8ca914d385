//! The VM intermediate language (component J, front half): parses a line of
//! stack-machine text into a `VmCommand`. Translation to assembly lives in
//! `crate::vm`, which consumes this module's output.

use crate::error::{Result, SimulatorError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Constant,
    Local,
    Argument,
    This,
    That,
    Static,
    Pointer,
    Temp,
}

impl Segment {
    fn parse(text: &str) -> Option<Self> {
        Some(match text {
            "constant" => Segment::Constant,
            "local" => Segment::Local,
            "argument" => Segment::Argument,
            "this" => Segment::This,
            "that" => Segment::That,
            "static" => Segment::Static,
            "pointer" => Segment::Pointer,
            "temp" => Segment::Temp,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VmCommand {
    Push(Segment, u16),
    Pop(Segment, u16),
    Add,
    Sub,
    Neg,
    Eq,
    Gt,
    Lt,
    And,
    Or,
    Not,
    Label(String),
    Goto(String),
    IfGoto(String),
    Function(String, u16),
    Call(String, u16),
    Return,
}

pub fn strip_comment(line: &str) -> &str {
    match line.find("//") {
        Some(idx) => &line[..idx],
        None => line,
    }
}

/// Parses every non-blank, non-comment line of a `.vm` file into commands,
/// in source order.
pub fn parse(source: &str) -> Result<Vec<VmCommand>> {
    source
        .lines()
        .map(strip_comment)
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(parse_line)
        .collect()
}

fn parse_line(line: &str) -> Result<VmCommand> {
    let words: Vec<&str> = line.split_whitespace().collect();
    match words.as_slice() {
        ["add"] => Ok(VmCommand::Add),
        ["sub"] => Ok(VmCommand::Sub),
        ["neg"] => Ok(VmCommand::Neg),
        ["eq"] => Ok(VmCommand::Eq),
        ["gt"] => Ok(VmCommand::Gt),
        ["lt"] => Ok(VmCommand::Lt),
        ["and"] => Ok(VmCommand::And),
        ["or"] => Ok(VmCommand::Or),
        ["not"] => Ok(VmCommand::Not),
        ["return"] => Ok(VmCommand::Return),
        ["push", segment, index] => {
            let seg = parse_segment(segment)?;
            let idx = parse_index(index)?;
            Ok(VmCommand::Push(seg, idx))
        }
        ["pop", segment, index] => {
            let seg = parse_segment(segment)?;
            let idx = parse_index(index)?;
            Ok(VmCommand::Pop(seg, idx))
        }
        ["label", name] => Ok(VmCommand::Label(name.to_string())),
        ["goto", name] => Ok(VmCommand::Goto(name.to_string())),
        ["if-goto", name] => Ok(VmCommand::IfGoto(name.to_string())),
        ["function", name, locals] => {
            let n = parse_index(locals)?;
            Ok(VmCommand::Function(name.to_string(), n))
        }
        ["call", name, args] => {
            let n = parse_index(args)?;
            Ok(VmCommand::Call(name.to_string(), n))
        }
        _ => Err(SimulatorError::Vm(format!("unrecognized vm instruction '{line}'"))),
    }
}

fn parse_segment(text: &str) -> Result<Segment> {
    Segment::parse(text).ok_or_else(|| SimulatorError::Vm(format!("unknown segment '{text}'")))
}

fn parse_index(text: &str) -> Result<u16> {
    text.parse::<u16>()
        .map_err(|_| SimulatorError::Vm(format!("expected a numeric index, found '{text}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_push_and_pop() {
        let cmds = parse("push constant 7\npop local 2\n").unwrap();
        assert_eq!(cmds, vec![
            VmCommand::Push(Segment::Constant, 7),
            VmCommand::Pop(Segment::Local, 2),
        ]);
    }

    #[test]
    fn parses_arithmetic_and_logic_with_no_operands() {
        let cmds = parse("add\nsub\nneg\neq\ngt\nlt\nand\nor\nnot\n").unwrap();
        assert_eq!(cmds.len(), 9);
    }

    #[test]
    fn parses_branching_and_call_frame_commands() {
        let cmds = parse("label LOOP\ngoto LOOP\nif-goto LOOP\nfunction Foo.bar 2\ncall Foo.bar 1\nreturn\n").unwrap();
        assert_eq!(cmds[3], VmCommand::Function("Foo.bar".into(), 2));
        assert_eq!(cmds[4], VmCommand::Call("Foo.bar".into(), 1));
    }

    #[test]
    fn rejects_unknown_segment() {
        let err = parse("push nowhere 0\n").unwrap_err();
        assert!(matches!(err, SimulatorError::Vm(_)));
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let cmds = parse("// header\npush constant 1 // a\n\n").unwrap();
        assert_eq!(cmds.len(), 1);
    }
}
