pub mod alu;
pub mod cpu;
pub mod memory;

pub use alu::Alu;
pub use cpu::Cpu;
pub use memory::Memory;
