//! `step_*` methods for the seven primitive gate variants. Each one reads
//! its input pins, updates any internal state, and writes its output pins;
//! none of them recurse into [`Gate::simulate`] since they have no subgates.
//!
//! The sequential primitives (`Dff`, `Register`, `Pc`, `Ram16k`, `Rom32k`)
//! all share one quirk carried over from the reference implementation: the
//! clock input is edge-triggered from the caller's perspective but
//! level-cleared from the gate's - each of them zeroes its own clock pin
//! after acting, so a caller only has to pulse the clock high once per
//! cycle rather than explicitly drive it back low again.

use crate::chip::gate::{pack_msb, unpack_msb, Gate, SequentialState};
use crate::chip::pin::{HIGH, LOW};

impl Gate {
    pub(crate) fn step_nand(&mut self) {
        let a = self.input_pins[0].state;
        let b = self.input_pins[1].state;
        self.output_pins[0].state = !(a && b);
    }

    pub(crate) fn step_mux16(&mut self) {
        let sel = self.input_pins[32].state;
        let base = if sel { 16 } else { 0 };
        for i in 0..16 {
            self.output_pins[i].state = self.input_pins[base + i].state;
        }
    }

    pub(crate) fn step_dff(&mut self) {
        let data = self.input_pins[0].state;
        let clock = self.input_pins[1].state;
        if clock == HIGH {
            if let SequentialState::Dff { out } = &mut self.state {
                *out = data;
            }
            self.input_pins[1].state = LOW;
        }
        if let SequentialState::Dff { out } = self.state {
            self.output_pins[0].state = out;
        }
    }

    pub(crate) fn step_register(&mut self) {
        let load = self.input_pins[16].state;
        let clock = self.input_pins[17].state;
        if clock == HIGH {
            if load == HIGH {
                let value = pack_msb(self.input_pins[0..16].iter().map(|p| p.state));
                if let SequentialState::Register { data } = &mut self.state {
                    *data = value as u16;
                }
            }
            self.input_pins[17].state = LOW;
        }
        if let SequentialState::Register { data } = self.state {
            for (pin, bit) in self.output_pins.iter_mut().zip(unpack_msb(data as u64, 16)) {
                pin.state = bit;
            }
        }
    }

    pub(crate) fn step_pc(&mut self) {
        let load = self.input_pins[16].state;
        let inc = self.input_pins[17].state;
        let reset = self.input_pins[18].state;
        let clock = self.input_pins[19].state;
        if clock == HIGH {
            if let SequentialState::Pc { value } = &mut self.state {
                if reset == HIGH {
                    *value = 0;
                } else if inc == HIGH {
                    *value = value.wrapping_add(1);
                } else if load == HIGH {
                    *value = pack_msb(self.input_pins[0..16].iter().map(|p| p.state)) as u16;
                }
            }
            self.input_pins[19].state = LOW;
        }
        if let SequentialState::Pc { value } = self.state {
            for (pin, bit) in self.output_pins.iter_mut().zip(unpack_msb(value as u64, 16)) {
                pin.state = bit;
            }
        }
    }

    pub(crate) fn step_ram16k(&mut self) {
        let address = pack_msb(self.input_pins[16..30].iter().map(|p| p.state)) as usize;
        let load = self.input_pins[30].state;
        let clock = self.input_pins[31].state;
        if clock == HIGH {
            if load == HIGH {
                let value = pack_msb(self.input_pins[0..16].iter().map(|p| p.state)) as u16;
                if let SequentialState::Ram16k { data } = &mut self.state {
                    data[address] = value;
                }
            }
            self.input_pins[31].state = LOW;
        }
        if let SequentialState::Ram16k { data } = &self.state {
            let value = data[address];
            for (pin, bit) in self.output_pins.iter_mut().zip(unpack_msb(value as u64, 16)) {
                pin.state = bit;
            }
        }
    }

    pub(crate) fn step_rom32k(&mut self) {
        let read_address = pack_msb(self.input_pins[16..31].iter().map(|p| p.state)) as usize;
        let write_address = pack_msb(self.input_pins[31..46].iter().map(|p| p.state)) as usize;
        let load = self.input_pins[46].state;
        let clock = self.input_pins[47].state;
        if clock == HIGH {
            if load == HIGH {
                let value = pack_msb(self.input_pins[0..16].iter().map(|p| p.state)) as u16;
                if let SequentialState::Rom32k { data } = &mut self.state {
                    data[write_address] = value;
                }
            }
            self.input_pins[47].state = LOW;
        }
        if let SequentialState::Rom32k { data } = &self.state {
            let value = data[read_address];
            for (pin, bit) in self.output_pins.iter_mut().zip(unpack_msb(value as u64, 16)) {
                pin.state = bit;
            }
        }
    }

    /// Directly loads `words` into a `Rom32k`'s backing storage, bypassing
    /// the clocked write port. Used by the assembler/loader pipeline and by
    /// tests that need to seed program memory without pulsing `load`/`clock`.
    pub fn load_rom(&mut self, words: &[u16]) {
        if let SequentialState::Rom32k { data } = &mut self.state {
            let n = words.len().min(data.len());
            data[..n].copy_from_slice(&words[..n]);
        }
    }

    /// Reads a single word out of a `Ram16k`'s backing storage without
    /// going through the pin interface. Used by test harnesses that assert
    /// on memory contents after a run.
    pub fn peek_ram(&self, address: usize) -> Option<u16> {
        match &self.state {
            SequentialState::Ram16k { data } => data.get(address).copied(),
            SequentialState::Rom32k { data } => data.get(address).copied(),
            _ => None,
        }
    }
}
