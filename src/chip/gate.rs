//! The simulated unit of hardware: a flat, handle-addressed replacement for
//! the old `Rc<RefCell<dyn ChipInterface>>` tree. A `Gate` is either one of
//! the seven built-in primitives or a `Custom` gate assembled from a recipe
//! of subgates and wires, exactly the way a `.gate` file or an `HDL` `CHIP`
//! describes one.

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::chip::pin::{Pin, PinLocation, Voltage, INPUT_PIN_LIMIT, LOW};
use crate::error::{Result, SimulatorError};

static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

fn next_instance_id() -> u64 {
    NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateVariant {
    Nand,
    Dff,
    Register,
    Pc,
    Ram16k,
    Rom32k,
    Mux16,
    Custom,
}

impl GateVariant {
    pub fn is_stateful(self) -> bool {
        matches!(
            self,
            GateVariant::Dff
                | GateVariant::Register
                | GateVariant::Pc
                | GateVariant::Ram16k
                | GateVariant::Rom32k
        )
    }
}

/// Per-variant sequential state. Combinational builtins (`Nand`, `Mux16`)
/// and `Custom` gates carry `None`.
#[derive(Debug, Clone)]
pub enum SequentialState {
    None,
    Dff { out: Voltage },
    Register { data: u16 },
    Pc { value: u16 },
    Ram16k { data: Vec<u16> },
    Rom32k { data: Vec<u16> },
}

#[derive(Debug, Clone)]
pub struct Gate {
    pub name: String,
    pub variant: GateVariant,
    pub input_pins: Vec<Pin>,
    pub output_pins: Vec<Pin>,
    pub subgates: Vec<Gate>,
    /// Persisted `(src_id, dst_id)` wiring recipe, in the public pin-id space.
    pub recipe: Vec<(usize, usize)>,
    /// Live wires derived from `recipe`: source id -> destination ids.
    outgoing: HashMap<usize, Vec<usize>>,
    pub serialized: bool,
    pub truth_table: Option<Rc<Vec<u64>>>,
    pub(crate) state: SequentialState,
    instance_id: u64,
}

impl Gate {
    fn blank(name: impl Into<String>, variant: GateVariant, inputs: usize, outputs: usize) -> Self {
        Self {
            name: name.into(),
            variant,
            input_pins: vec![Pin::new(); inputs],
            output_pins: vec![Pin::new(); outputs],
            subgates: Vec::new(),
            recipe: Vec::new(),
            outgoing: HashMap::new(),
            serialized: false,
            truth_table: None,
            state: SequentialState::None,
            instance_id: next_instance_id(),
        }
    }

    pub fn new_nand() -> Self {
        let mut g = Self::blank("nand", GateVariant::Nand, 2, 1);
        g.serialized = true;
        g
    }

    pub fn new_dff() -> Self {
        Self {
            state: SequentialState::Dff { out: LOW },
            ..Self::blank("dff", GateVariant::Dff, 2, 1)
        }
    }

    pub fn new_register() -> Self {
        Self {
            state: SequentialState::Register { data: 0 },
            ..Self::blank("register", GateVariant::Register, 18, 16)
        }
    }

    pub fn new_pc() -> Self {
        Self {
            state: SequentialState::Pc { value: 0 },
            ..Self::blank("pc", GateVariant::Pc, 20, 16)
        }
    }

    pub fn new_ram16k() -> Self {
        Self {
            state: SequentialState::Ram16k {
                data: vec![0; 16384],
            },
            ..Self::blank("ram16k", GateVariant::Ram16k, 32, 16)
        }
    }

    pub fn new_rom32k() -> Self {
        Self {
            state: SequentialState::Rom32k {
                data: vec![0; 32768],
            },
            ..Self::blank("rom32k", GateVariant::Rom32k, 48, 16)
        }
    }

    pub fn new_mux16() -> Self {
        let mut g = Self::blank("mux16", GateVariant::Mux16, 33, 16);
        g.serialized = false; // combinational, but width makes a 2^33 table absurd - always live-simulated
        g
    }

    pub fn new_custom(name: impl Into<String>, inputs: usize, outputs: usize) -> Self {
        Self::blank(name, GateVariant::Custom, inputs, outputs)
    }

    // ---- addressing -----------------------------------------------------

    pub fn classify(&self, id: usize) -> Option<PinLocation> {
        if id < INPUT_PIN_LIMIT {
            if id < self.input_pins.len() {
                return Some(PinLocation::SelfInput(id));
            }
            let mut offset = self.input_pins.len();
            for (idx, sub) in self.subgates.iter().enumerate() {
                let n = sub.input_pins.len();
                if id < offset + n {
                    return Some(PinLocation::SubInput(idx, id - offset));
                }
                offset += n;
            }
            None
        } else {
            let oid = id - INPUT_PIN_LIMIT;
            if oid < self.output_pins.len() {
                return Some(PinLocation::SelfOutput(oid));
            }
            let mut offset = self.output_pins.len();
            for (idx, sub) in self.subgates.iter().enumerate() {
                let n = sub.output_pins.len();
                if oid < offset + n {
                    return Some(PinLocation::SubOutput(idx, oid - offset));
                }
                offset += n;
            }
            None
        }
    }

    pub fn get_pin(&self, id: usize) -> Option<&Pin> {
        match self.classify(id)? {
            PinLocation::SelfInput(i) => self.input_pins.get(i),
            PinLocation::SelfOutput(i) => self.output_pins.get(i),
            PinLocation::SubInput(g, i) => self.subgates.get(g)?.input_pins.get(i),
            PinLocation::SubOutput(g, i) => self.subgates.get(g)?.output_pins.get(i),
        }
    }

    pub fn get_pin_mut(&mut self, id: usize) -> Option<&mut Pin> {
        match self.classify(id)? {
            PinLocation::SelfInput(i) => self.input_pins.get_mut(i),
            PinLocation::SelfOutput(i) => self.output_pins.get_mut(i),
            PinLocation::SubInput(g, i) => self.subgates.get_mut(g)?.input_pins.get_mut(i),
            PinLocation::SubOutput(g, i) => self.subgates.get_mut(g)?.output_pins.get_mut(i),
        }
    }

    fn output_offset_for_subgate(&self, sub_idx: usize) -> usize {
        self.output_pins.len()
            + self.subgates[..sub_idx]
                .iter()
                .map(|g| g.output_pins.len())
                .sum::<usize>()
    }

    // ---- construction -----------------------------------------------------

    /// Appends `n` fresh input pins, shifting every recipe entry that
    /// addressed an existing input-space id at or beyond the insertion
    /// point. Mirrors the original recipe format's incremental-build model,
    /// where `input N` may be issued more than once while wiring proceeds.
    pub fn add_input_pin(&mut self, n: usize) {
        let insertion_point = self.input_pins.len();
        self.input_pins.extend(std::iter::repeat(Pin::new()).take(n));
        for (a, b) in self.recipe.iter_mut() {
            if *a < INPUT_PIN_LIMIT && *a >= insertion_point {
                *a += n;
            }
            if *b < INPUT_PIN_LIMIT && *b >= insertion_point {
                *b += n;
            }
        }
        self.rebuild_outgoing();
    }

    pub fn add_output_pin(&mut self, n: usize) {
        let insertion_point = INPUT_PIN_LIMIT + self.output_pins.len();
        self.output_pins.extend(std::iter::repeat(Pin::new()).take(n));
        for (a, b) in self.recipe.iter_mut() {
            if *a >= insertion_point {
                *a += n;
            }
            if *b >= insertion_point {
                *b += n;
            }
        }
        self.rebuild_outgoing();
    }

    pub fn add_subgate(&mut self, subgate: Gate) {
        self.subgates.push(subgate);
    }

    pub fn wire_pins(&mut self, a: usize, b: usize) -> Result<()> {
        if self.get_pin(a).is_none() || self.get_pin(b).is_none() {
            return Err(SimulatorError::InvalidPinId { a, b });
        }
        self.recipe.push((a, b));
        self.outgoing.entry(a).or_default().push(b);
        Ok(())
    }

    fn rebuild_outgoing(&mut self) {
        self.outgoing.clear();
        for &(a, b) in &self.recipe {
            self.outgoing.entry(a).or_default().push(b);
        }
    }

    // ---- simulation -----------------------------------------------------

    pub fn simulate(&mut self) {
        let mut visited = std::collections::HashSet::new();
        self.simulate_with(&mut visited);
    }

    fn simulate_with(&mut self, visited: &mut std::collections::HashSet<u64>) {
        match self.variant {
            GateVariant::Nand => self.step_nand(),
            GateVariant::Dff => self.step_dff(),
            GateVariant::Register => self.step_register(),
            GateVariant::Pc => self.step_pc(),
            GateVariant::Ram16k => self.step_ram16k(),
            GateVariant::Rom32k => self.step_rom32k(),
            GateVariant::Mux16 => self.step_mux16(),
            GateVariant::Custom => self.simulate_custom(visited),
        }
    }

    fn simulate_custom(&mut self, visited: &mut std::collections::HashSet<u64>) {
        if self.serialized {
            self.simulate_serialized();
            return;
        }

        visited.insert(self.instance_id);

        let mut frontier: Vec<usize> = (0..self.input_pins.len()).collect();

        while !frontier.is_empty() {
            let exploring = std::mem::take(&mut frontier);
            let mut to_simulate: Vec<usize> = Vec::new();

            for pin_id in exploring {
                let dsts = match self.outgoing.get(&pin_id) {
                    Some(d) => d.clone(),
                    None => continue,
                };
                let src_state = self.get_pin(pin_id).map(|p| p.state).unwrap_or(LOW);

                for dst_id in dsts {
                    let before = self.get_pin(dst_id).map(|p| p.state);
                    if let Some(p) = self.get_pin_mut(dst_id) {
                        p.state = src_state;
                    }
                    let after = self.get_pin(dst_id).map(|p| p.state);
                    let changed = before != after;

                    match self.classify(dst_id) {
                        Some(PinLocation::SubInput(sub_idx, _)) => {
                            let sub_id = self.subgates[sub_idx].instance_id;
                            if changed {
                                visited.remove(&sub_id);
                            }
                            if !visited.contains(&sub_id) && !to_simulate.contains(&sub_idx) {
                                to_simulate.push(sub_idx);
                            }
                        }
                        _ => frontier.push(dst_id),
                    }
                }
            }

            for sub_idx in to_simulate {
                let sub_id = self.subgates[sub_idx].instance_id;
                if visited.contains(&sub_id) {
                    continue;
                }
                visited.insert(sub_id);
                self.subgates[sub_idx].simulate_with(visited);

                let out_base = INPUT_PIN_LIMIT + self.output_offset_for_subgate(sub_idx);
                for k in 0..self.subgates[sub_idx].output_pins.len() {
                    frontier.push(out_base + k);
                }
            }
        }
    }

    // ---- serialization ----------------------------------------------------

    fn contains_stateful(&self) -> bool {
        if self.variant.is_stateful() {
            return true;
        }
        if self.variant == GateVariant::Custom {
            return self.subgates.iter().any(|g| g.contains_stateful());
        }
        false
    }

    /// Precomputes the full truth table of a purely combinational custom
    /// chip so future simulation is a single table lookup. Fails with
    /// [`SimulatorError::NotCombinational`] if any descendant is stateful.
    pub fn serialize(&mut self) -> Result<()> {
        if self.variant != GateVariant::Custom {
            return Ok(());
        }
        if self.contains_stateful() {
            return Err(SimulatorError::NotCombinational);
        }
        let n = self.input_pins.len();
        if n > 20 {
            return Err(SimulatorError::NotCombinational);
        }
        let table_size = 1usize << n;
        let mut table = Vec::with_capacity(table_size);
        let saved_inputs: Vec<Voltage> = self.input_pins.iter().map(|p| p.state).collect();

        for i in 0..table_size {
            self.apply_input(i as u64);
            self.simulate();
            table.push(self.pack_outputs());
        }

        for (pin, state) in self.input_pins.iter_mut().zip(saved_inputs) {
            pin.state = state;
        }

        self.truth_table = Some(Rc::new(table));
        self.serialized = true;
        Ok(())
    }

    fn apply_input(&mut self, mask: u64) {
        let n = self.input_pins.len();
        for (idx, pin) in self.input_pins.iter_mut().enumerate() {
            let shift = n - 1 - idx;
            pin.state = (mask >> shift) & 1 == 1;
        }
    }

    fn pack_outputs(&self) -> u64 {
        pack_msb(self.output_pins.iter().map(|p| p.state))
    }

    fn simulate_serialized(&mut self) {
        let table = match &self.truth_table {
            Some(t) => t.clone(),
            None => return,
        };
        let index = pack_msb(self.input_pins.iter().map(|p| p.state)) as usize;
        if let Some(&row) = table.get(index) {
            let n = self.output_pins.len();
            for (idx, pin) in self.output_pins.iter_mut().enumerate() {
                let shift = n - 1 - idx;
                pin.state = (row >> shift) & 1 == 1;
            }
        }
    }

    // ---- duplication ------------------------------------------------------

    /// Builds a fresh instance of this gate: a built-in variant is
    /// reconstructed from scratch, a serialized custom chip is a shallow
    /// clone sharing the truth table, and an unserialized custom chip is
    /// rebuilt by recursively duplicating its subgates and replaying the
    /// wiring recipe.
    pub fn duplicate(&self) -> Gate {
        match self.variant {
            GateVariant::Nand => Gate::new_nand(),
            GateVariant::Dff => Gate::new_dff(),
            GateVariant::Register => Gate::new_register(),
            GateVariant::Pc => Gate::new_pc(),
            GateVariant::Ram16k => Gate::new_ram16k(),
            GateVariant::Rom32k => Gate::new_rom32k(),
            GateVariant::Mux16 => Gate::new_mux16(),
            GateVariant::Custom => {
                let mut g = Gate::new_custom(self.name.clone(), self.input_pins.len(), self.output_pins.len());
                g.recipe = self.recipe.clone();
                if self.serialized {
                    g.serialized = true;
                    g.truth_table = self.truth_table.clone();
                } else {
                    g.subgates = self.subgates.iter().map(Gate::duplicate).collect();
                }
                g.rebuild_outgoing();
                g
            }
        }
    }
}

pub(crate) fn pack_msb(bits: impl Iterator<Item = Voltage>) -> u64 {
    bits.fold(0u64, |acc, b| (acc << 1) | (b as u64))
}

pub(crate) fn unpack_msb(value: u64, width: usize) -> impl Iterator<Item = Voltage> {
    (0..width).map(move |idx| (value >> (width - 1 - idx)) & 1 == 1)
}
