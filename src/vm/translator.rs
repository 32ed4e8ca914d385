//! VM-to-assembly translation (component J). Each stack-machine command
//! lowers to a fixed template of Hack assembly; the only state carried
//! across commands is the enclosing function's name (for label scoping)
//! and a monotonic counter for the comparison operators' unique labels.

use crate::error::{Result, SimulatorError};
use crate::languages::vm_lang::{Segment, VmCommand};

pub struct Translator {
    file_name: String,
    current_function: String,
    label_counter: u32,
    call_counter: u32,
    out: Vec<String>,
}

impl Translator {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            current_function: String::from("Global"),
            label_counter: 0,
            call_counter: 0,
            out: Vec::new(),
        }
    }

    fn emit(&mut self, line: impl Into<String>) {
        self.out.push(line.into());
    }

    /// Assembly that sets `SP = 256` and jumps into `Sys.init`, the entry
    /// point a multi-file VM program needs before any class's code runs.
    pub fn bootstrap() -> String {
        vec![
            "@256".to_string(),
            "D=A".to_string(),
            "@SP".to_string(),
            "M=D".to_string(),
        ]
        .join("\n")
            + "\n"
            + &Translator::new("Bootstrap").emit_call("Sys.init", 0)
    }

    pub fn translate(&mut self, commands: &[VmCommand]) -> Result<String> {
        for command in commands {
            self.translate_one(command)?;
        }
        Ok(self.out.join("\n") + "\n")
    }

    fn translate_one(&mut self, command: &VmCommand) -> Result<()> {
        match command {
            VmCommand::Push(segment, index) => self.push(*segment, *index)?,
            VmCommand::Pop(segment, index) => self.pop(*segment, *index)?,
            VmCommand::Add => self.binary("M=M+D"),
            VmCommand::Sub => self.binary("M=M-D"),
            VmCommand::And => self.binary("M=M&D"),
            VmCommand::Or => self.binary("M=M|D"),
            VmCommand::Neg => self.unary("M=-M"),
            VmCommand::Not => self.unary("M=!M"),
            VmCommand::Eq => self.comparison("JEQ"),
            VmCommand::Gt => self.comparison("JGT"),
            VmCommand::Lt => self.comparison("JLT"),
            VmCommand::Label(name) => self.emit(format!("({}${name})", self.current_function)),
            VmCommand::Goto(name) => {
                self.emit(format!("@{}${name}", self.current_function));
                self.emit("0;JMP");
            }
            VmCommand::IfGoto(name) => {
                self.emit("@SP");
                self.emit("AM=M-1");
                self.emit("D=M");
                self.emit(format!("@{}${name}", self.current_function));
                self.emit("D;JNE");
            }
            VmCommand::Function(name, locals) => {
                self.current_function = name.clone();
                self.emit(format!("({name})"));
                for _ in 0..*locals {
                    self.push(Segment::Constant, 0)?;
                }
            }
            VmCommand::Call(name, args) => {
                let text = self.emit_call(name, *args);
                self.out.push(text.trim_end().to_string());
            }
            VmCommand::Return => self.emit_return(),
        }
        Ok(())
    }

    fn push(&mut self, segment: Segment, index: u16) -> Result<()> {
        match segment {
            Segment::Constant => {
                self.emit(format!("@{index}"));
                self.emit("D=A");
            }
            Segment::Local | Segment::Argument | Segment::This | Segment::That => {
                self.emit(format!("@{}", segment_symbol(segment)));
                self.emit("D=M");
                self.emit(format!("@{index}"));
                self.emit("A=D+A");
                self.emit("D=M");
            }
            Segment::Temp => {
                self.emit(format!("@{}", 5 + index));
                self.emit("D=M");
            }
            Segment::Pointer => {
                let symbol = if index == 0 { "THIS" } else { "THAT" };
                self.emit(format!("@{symbol}"));
                self.emit("D=M");
            }
            Segment::Static => {
                self.emit(format!("@{}.{index}", self.file_name));
                self.emit("D=M");
            }
        }
        self.emit("@SP");
        self.emit("A=M");
        self.emit("M=D");
        self.emit("@SP");
        self.emit("M=M+1");
        Ok(())
    }

    fn pop(&mut self, segment: Segment, index: u16) -> Result<()> {
        match segment {
            Segment::Constant => {
                return Err(SimulatorError::Vm("cannot pop into the constant segment".into()));
            }
            Segment::Local | Segment::Argument | Segment::This | Segment::That => {
                self.emit(format!("@{}", segment_symbol(segment)));
                self.emit("D=M");
                self.emit(format!("@{index}"));
                self.emit("D=D+A");
                self.emit("@R13");
                self.emit("M=D");
                self.emit("@SP");
                self.emit("AM=M-1");
                self.emit("D=M");
                self.emit("@R13");
                self.emit("A=M");
                self.emit("M=D");
            }
            Segment::Temp => {
                self.emit("@SP");
                self.emit("AM=M-1");
                self.emit("D=M");
                self.emit(format!("@{}", 5 + index));
                self.emit("M=D");
            }
            Segment::Pointer => {
                let symbol = if index == 0 { "THIS" } else { "THAT" };
                self.emit("@SP");
                self.emit("AM=M-1");
                self.emit("D=M");
                self.emit(format!("@{symbol}"));
                self.emit("M=D");
            }
            Segment::Static => {
                self.emit("@SP");
                self.emit("AM=M-1");
                self.emit("D=M");
                self.emit(format!("@{}.{index}", self.file_name));
                self.emit("M=D");
            }
        }
        Ok(())
    }

    fn binary(&mut self, op: &str) {
        self.emit("@SP");
        self.emit("AM=M-1");
        self.emit("D=M");
        self.emit("A=A-1");
        self.emit(op);
    }

    fn unary(&mut self, op: &str) {
        self.emit("@SP");
        self.emit("A=M-1");
        self.emit(op);
    }

    fn comparison(&mut self, jump: &str) {
        let id = self.label_counter;
        self.label_counter += 1;
        let true_label = format!("{}$CMP_TRUE_{id}", self.current_function);
        let end_label = format!("{}$CMP_END_{id}", self.current_function);

        self.emit("@SP");
        self.emit("AM=M-1");
        self.emit("D=M");
        self.emit("A=A-1");
        self.emit("D=M-D");
        self.emit(format!("@{true_label}"));
        self.emit(format!("D;{jump}"));
        self.emit("@SP");
        self.emit("A=M-1");
        self.emit("M=0");
        self.emit(format!("@{end_label}"));
        self.emit("0;JMP");
        self.emit(format!("({true_label})"));
        self.emit("@SP");
        self.emit("A=M-1");
        self.emit("M=-1");
        self.emit(format!("({end_label})"));
    }

    fn emit_call(&mut self, name: &str, args: u16) -> String {
        let id = self.call_counter;
        self.call_counter += 1;
        let return_label = format!("{}$RET_{id}", self.current_function);

        let mut lines = Vec::new();
        lines.push(format!("@{return_label}"));
        lines.push("D=A".into());
        lines.push("@SP".into());
        lines.push("A=M".into());
        lines.push("M=D".into());
        lines.push("@SP".into());
        lines.push("M=M+1".into());
        for symbol in ["LCL", "ARG", "THIS", "THAT"] {
            lines.push(format!("@{symbol}"));
            lines.push("D=M".into());
            lines.push("@SP".into());
            lines.push("A=M".into());
            lines.push("M=D".into());
            lines.push("@SP".into());
            lines.push("M=M+1".into());
        }
        lines.push("@SP".into());
        lines.push("D=M".into());
        lines.push(format!("@{}", args as u32 + 5));
        lines.push("D=D-A".into());
        lines.push("@ARG".into());
        lines.push("M=D".into());
        lines.push("@SP".into());
        lines.push("D=M".into());
        lines.push("@LCL".into());
        lines.push("M=D".into());
        lines.push(format!("@{name}"));
        lines.push("0;JMP".into());
        lines.push(format!("({return_label})"));
        lines.join("\n")
    }

    fn emit_return(&mut self) {
        // R13 = FRAME, R14 = return address, saved before ARG is overwritten
        // by the return value so a zero-argument call doesn't clobber it.
        self.emit("@LCL");
        self.emit("D=M");
        self.emit("@R13");
        self.emit("M=D");
        self.emit("@5");
        self.emit("A=D-A");
        self.emit("D=M");
        self.emit("@R14");
        self.emit("M=D");

        self.emit("@SP");
        self.emit("AM=M-1");
        self.emit("D=M");
        self.emit("@ARG");
        self.emit("A=M");
        self.emit("M=D");

        self.emit("@ARG");
        self.emit("D=M+1");
        self.emit("@SP");
        self.emit("M=D");

        for (offset, symbol) in [(1, "THAT"), (2, "THIS"), (3, "ARG"), (4, "LCL")] {
            self.emit("@R13");
            self.emit("D=M");
            self.emit(format!("@{offset}"));
            self.emit("A=D-A");
            self.emit("D=M");
            self.emit(format!("@{symbol}"));
            self.emit("M=D");
        }

        self.emit("@R14");
        self.emit("A=M");
        self.emit("0;JMP");
    }
}

fn segment_symbol(segment: Segment) -> &'static str {
    match segment {
        Segment::Local => "LCL",
        Segment::Argument => "ARG",
        Segment::This => "THIS",
        Segment::That => "THAT",
        _ => unreachable!("segment_symbol only covers pointer-backed segments"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::languages::vm_lang::parse;

    #[test]
    fn push_constant_then_add_balances_the_stack() {
        let commands = parse("push constant 7\npush constant 8\nadd\n").unwrap();
        let mut translator = Translator::new("Test");
        let asm = translator.translate(&commands).unwrap();
        assert!(asm.contains("@7"));
        assert!(asm.contains("@8"));
        assert!(asm.contains("M=M+D"));
    }

    #[test]
    fn comparisons_get_unique_labels_per_call() {
        let commands = parse("eq\neq\n").unwrap();
        let mut translator = Translator::new("Test");
        let asm = translator.translate(&commands).unwrap();
        assert!(asm.contains("CMP_TRUE_0"));
        assert!(asm.contains("CMP_TRUE_1"));
    }

    #[test]
    fn labels_are_scoped_to_the_enclosing_function() {
        let commands = parse("function Main.run 0\nlabel LOOP\ngoto LOOP\n").unwrap();
        let mut translator = Translator::new("Main");
        let asm = translator.translate(&commands).unwrap();
        assert!(asm.contains("(Main.run$LOOP)"));
        assert!(asm.contains("@Main.run$LOOP"));
    }

    #[test]
    fn pop_into_constant_is_rejected() {
        let commands = parse("pop constant 0\n").unwrap();
        let mut translator = Translator::new("Test");
        let err = translator.translate(&commands).unwrap_err();
        assert!(matches!(err, SimulatorError::Vm(_)));
    }

    #[test]
    fn call_and_return_save_and_restore_all_four_segment_pointers() {
        let commands = parse("call Foo.bar 2\n").unwrap();
        let mut translator = Translator::new("Test");
        let asm = translator.translate(&commands).unwrap();
        for symbol in ["LCL", "ARG", "THIS", "THAT"] {
            assert!(asm.contains(&format!("@{symbol}")));
        }

        let mut ret_translator = Translator::new("Test");
        let ret_asm = ret_translator.translate(&parse("return\n").unwrap()).unwrap();
        assert!(ret_asm.contains("@R13"));
        assert!(ret_asm.contains("@R14"));
    }

    #[test]
    fn bootstrap_initializes_the_stack_pointer_and_calls_sys_init() {
        let boot = Translator::bootstrap();
        assert!(boot.starts_with("@256"));
        assert!(boot.contains("@Sys.init"));
    }
}
