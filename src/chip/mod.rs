pub mod board;
pub mod builtins;
pub mod gate;
pub mod pin;
pub mod trie;

pub use board::Board;
pub use gate::{Gate, GateVariant, SequentialState};
pub use pin::{Pin, PinLocation, Voltage, HIGH, INPUT_PIN_LIMIT, LOW};
pub use trie::Trie;

#[cfg(test)]
mod tests;
