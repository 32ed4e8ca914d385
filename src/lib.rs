pub mod chip;
pub mod config;
pub mod cpu;
pub mod error;
pub mod languages;
pub mod test;
pub mod vm;

pub use error::{Result, SimulatorError};

pub mod prelude {
    pub use crate::chip::{Board, Gate, GateVariant};
    pub use crate::config::Config;
    pub use crate::error::{Result, SimulatorError};
    pub use crate::languages::{hdl, recipe};
}

#[cfg(test)]
mod integration_tests {
    use super::prelude::*;
    use crate::chip::pin::{HIGH, LOW};
    use crate::cpu::Cpu;
    use crate::languages::assembly::Assembler;
    use crate::languages::vm_lang::parse as parse_vm;
    use crate::vm::Translator;

    #[test]
    fn hdl_to_simulation_pipeline_builds_and_not_from_scratch() {
        let mut board = Board::new();
        let config = Config::new(".");
        let source = "CHIP And { IN a, b; OUT out; PARTS: Nand(a=a,b=b,out=w); Nand(a=w,b=w,out=out); }";
        let built = hdl::compile(&mut board, &config, source).unwrap();
        board.save_sketch(built.gate);

        let mut and_gate = board.instantiate("And").unwrap();
        and_gate.input_pins[0].state = HIGH;
        and_gate.input_pins[1].state = HIGH;
        and_gate.simulate();
        assert_eq!(and_gate.output_pins[0].state, HIGH);

        and_gate.input_pins[1].state = LOW;
        and_gate.simulate();
        assert_eq!(and_gate.output_pins[0].state, LOW);
    }

    #[test]
    fn assembler_round_trip_matches_the_literal_scenario() {
        let mut assembler = Assembler::new();
        let words = assembler.assemble("@21\nD=A\n@16\nM=D").unwrap();
        assert_eq!(words, vec![0x0015, 0xEC10, 0x0010, 0xE308]);
    }

    #[test]
    fn vm_to_assembly_to_cpu_pipeline_adds_two_constants() {
        let commands = parse_vm("push constant 7\npush constant 8\nadd\n").unwrap();
        let mut translator = Translator::new("Main");
        let body = translator.translate(&commands).unwrap();
        let source = format!("@256\nD=A\n@SP\nM=D\n{body}");

        let mut assembler = Assembler::new();
        let words = assembler.assemble(&source).unwrap();
        let mut cpu = Cpu::new();
        cpu.load_instructions(&words).unwrap();
        cpu.process(words.len() as u32).unwrap();

        assert_eq!(cpu.memory.read(0).unwrap(), 257);
        assert_eq!(cpu.memory.read(256).unwrap(), 15);
    }

    #[test]
    fn board_search_finds_every_registered_builtin_by_prefix() {
        let board = Board::new();
        let names = board.search("r");
        assert!(names.iter().any(|g| g.name == "register"));
        assert!(names.iter().any(|g| g.name == "rom32k"));
    }
}
