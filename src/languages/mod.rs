pub mod assembly;
pub mod hdl;
pub mod jack;
pub mod lexer;
pub mod meta;
pub mod recipe;
pub mod tst;
pub mod vm_lang;

pub use assembly::{disassemble, Assembler};
pub use jack::JackCompiler;
pub use vm_lang::{parse as parse_vm, Segment, VmCommand};
