//! The CPU emulator (component L): decodes and executes one 16-bit Hack
//! instruction per tick against a 32K-word ROM and the shared RAM/screen/
//! keyboard address space.

use crate::cpu::alu::{comp_bits, Alu};
use crate::cpu::memory::{Memory, SCREEN_BASE};
use crate::error::{Result, SimulatorError};
use crate::languages::assembly::disassemble;

const ROM_SIZE: usize = 32768;

pub struct Cpu {
    rom: Vec<u16>,
    program_len: usize,
    pub memory: Memory,
    pub a: u16,
    pub d: u16,
    pub pc: u16,
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu {
    pub fn new() -> Self {
        Self {
            rom: vec![0; ROM_SIZE],
            program_len: 0,
            memory: Memory::new(),
            a: 0,
            d: 0,
            pc: 0,
        }
    }

    pub fn load_instructions(&mut self, words: &[u16]) -> Result<()> {
        if words.len() > ROM_SIZE {
            return Err(SimulatorError::Cpu(format!(
                "program has {} words, exceeds the {ROM_SIZE}-word ROM",
                words.len()
            )));
        }
        self.rom = vec![0; ROM_SIZE];
        self.rom[..words.len()].copy_from_slice(words);
        self.program_len = words.len();
        self.pc = 0;
        Ok(())
    }

    /// Runs up to `cycles` fetch-decode-execute ticks, stopping early if the
    /// program counter runs past the loaded instructions.
    pub fn process(&mut self, cycles: u32) -> Result<()> {
        for _ in 0..cycles {
            if self.pc as usize >= self.program_len {
                return Err(SimulatorError::EmulatorHalt);
            }
            self.tick()?;
        }
        Ok(())
    }

    fn tick(&mut self) -> Result<()> {
        let word = self.rom[self.pc as usize];
        if word & 0x8000 == 0 {
            self.a = word;
            self.pc += 1;
            return Ok(());
        }

        let a_selects_m = word & 0b0001_0000_0000_0000 != 0;
        let comp = (word >> 6) & 0x3F;
        let dest = (word >> 3) & 0x7;
        let jump = word & 0x7;

        let y = if a_selects_m { self.memory.read(self.a)? } else { self.a };
        let (zx, nx, zy, ny, f, no) = comp_bits(comp);
        let (out, zr, ng) = Alu::compute(self.d, y, zx, nx, zy, ny, f, no);

        if dest & 0b100 != 0 {
            self.a = out;
        }
        if dest & 0b010 != 0 {
            self.d = out;
        }
        if dest & 0b001 != 0 {
            self.memory.write(self.a, out)?;
        }

        let jump_taken = match jump {
            0b000 => false,
            0b001 => !zr && !ng,
            0b010 => zr,
            0b011 => !ng,
            0b100 => ng,
            0b101 => !zr,
            0b110 => ng || zr,
            0b111 => true,
            _ => unreachable!("jump field is only 3 bits"),
        };

        self.pc = if jump_taken { self.a } else { self.pc + 1 };
        Ok(())
    }

    /// Dumps registers, the top-of-stack window, the static/local segments,
    /// and a screen window, as a multi-line debug report. Static/local/
    /// screen windows are a fixed eight words each - there's no frame-size
    /// tracking here to bound them more precisely.
    pub fn print_state(&self) -> String {
        const WINDOW: u16 = 8;

        let sp = self.memory.read(0).unwrap_or(0);
        let lcl = self.memory.read(1).unwrap_or(0);
        let next_instruction = self.rom.get(self.pc as usize).copied().unwrap_or(0);

        let mut out = format!(
            "PC={} [{}]  A={}  D={}\n",
            self.pc,
            disassemble(next_instruction),
            self.a,
            self.d
        );
        out.push_str(&format!("SP={sp}  stack: {}\n", Self::window(&self.memory, sp.saturating_sub(WINDOW), sp)));
        out.push_str(&format!("statics: {}\n", Self::window(&self.memory, 16, 16 + WINDOW)));
        out.push_str(&format!("LCL={lcl}  locals: {}\n", Self::window(&self.memory, lcl, lcl.saturating_add(WINDOW))));
        out.push_str(&format!("screen: {}", Self::window(&self.memory, SCREEN_BASE, SCREEN_BASE + WINDOW)));
        out
    }

    fn window(memory: &Memory, start: u16, end: u16) -> String {
        (start..end)
            .map(|addr| memory.read(addr).unwrap_or(0).to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::languages::assembly::Assembler;

    #[test]
    fn add_scenario_stores_fifteen_at_ram_256() {
        // sets RAM[0] = 2, RAM[1] = 3, then RAM[256] = RAM[0] + RAM[1], per
        // the canonical "simple add" CPU-level test program.
        let source = "\
            @0\nM=2\n\
            @1\nM=3\n\
            @0\nD=M\n\
            @1\nD=D+M\n\
            @256\nM=D\n\
        ";
        let mut assembler = Assembler::new();
        let words = assembler.assemble(source).unwrap();
        let mut cpu = Cpu::new();
        cpu.load_instructions(&words).unwrap();
        cpu.process(words.len() as u32).unwrap();
        assert_eq!(cpu.memory.read(256).unwrap(), 5);
    }

    #[test]
    fn literal_push_constant_add_scenario_from_the_vm_pipeline() {
        use crate::languages::vm_lang::parse;
        use crate::vm::Translator;

        let commands = parse("push constant 7\npush constant 8\nadd\n").unwrap();
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
    fn unconditional_jump_loops_forever_until_the_cycle_budget_runs_out() {
        let source = "(LOOP)\n@LOOP\n0;JMP\n";
        let mut assembler = Assembler::new();
        let words = assembler.assemble(source).unwrap();
        let mut cpu = Cpu::new();
        cpu.load_instructions(&words).unwrap();
        cpu.process(10).unwrap();
        assert_eq!(cpu.pc, 0);
    }

    #[test]
    fn running_past_the_loaded_program_halts() {
        let mut cpu = Cpu::new();
        cpu.load_instructions(&[0xE030]).unwrap(); // D=A, no jump
        let err = cpu.process(5).unwrap_err();
        assert!(matches!(err, SimulatorError::EmulatorHalt));
    }

    #[test]
    fn print_state_reports_registers_stack_statics_locals_and_screen() {
        let source = "\
            @0\nM=2\n\
            @1\nM=3\n\
            @0\nD=M\n\
            @1\nD=D+M\n\
            @256\nM=D\n\
        ";
        let mut assembler = Assembler::new();
        let words = assembler.assemble(source).unwrap();
        let mut cpu = Cpu::new();
        cpu.load_instructions(&words).unwrap();
        cpu.process(words.len() as u32).unwrap();

        let state = cpu.print_state();
        assert!(state.contains("PC="));
        assert!(state.contains("A="));
        assert!(state.contains("D="));
        assert!(state.contains("SP="));
        assert!(state.contains("stack:"));
        assert!(state.contains("statics:"));
        assert!(state.contains("LCL="));
        assert!(state.contains("locals:"));
        assert!(state.contains("screen:"));
    }
}
