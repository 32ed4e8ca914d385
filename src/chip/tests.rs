use crate::chip::board::Board;
use crate::chip::gate::Gate;
use crate::chip::pin::{HIGH, LOW};

#[test]
fn nand_truth_table() {
    let mut nand = Gate::new_nand();
    let cases = [(LOW, LOW, HIGH), (LOW, HIGH, HIGH), (HIGH, LOW, HIGH), (HIGH, HIGH, LOW)];
    for (a, b, expected) in cases {
        nand.input_pins[0].state = a;
        nand.input_pins[1].state = b;
        nand.simulate();
        assert_eq!(nand.output_pins[0].state, expected, "nand({a}, {b})");
    }
}

/// Builds `not(in) = nand(in, in)` as a two-pin custom chip wired over a
/// single subgate, the same shape the HDL front end produces for `Not`.
fn build_not(board: &Board) -> Gate {
    let mut not_gate = Gate::new_custom("not", 1, 1);
    not_gate.add_subgate(board.instantiate("nand").unwrap());
    // self-input 0 (id 0) -> subgate(0) inputs 0 and 1 (ids 1, 2: input space
    // continues past this gate's own single input)
    not_gate.wire_pins(0, 1).unwrap();
    not_gate.wire_pins(0, 2).unwrap();
    // subgate(0) output 0 (id 1000 + own-output-count 1 = 1001) -> self-output 0 (id 1000)
    not_gate.wire_pins(1001, 1000).unwrap();
    not_gate
}

#[test]
fn not_via_nand_truth_table() {
    let board = Board::new();
    let mut not_gate = build_not(&board);
    for &input in &[LOW, HIGH] {
        not_gate.input_pins[0].state = input;
        not_gate.simulate();
        assert_eq!(not_gate.output_pins[0].state, !input);
    }
}

#[test]
fn serialize_then_simulate_matches_live_simulation() {
    let board = Board::new();
    let mut live = build_not(&board);
    let mut serialized = build_not(&board);
    serialized.serialize().unwrap();
    assert!(serialized.serialized);

    for &input in &[LOW, HIGH] {
        live.input_pins[0].state = input;
        live.simulate();
        serialized.input_pins[0].state = input;
        serialized.simulate();
        assert_eq!(live.output_pins[0].state, serialized.output_pins[0].state);
    }
}

#[test]
fn serializing_a_stateful_chip_is_rejected() {
    let mut wrapper = Gate::new_custom("wraps_register", 18, 16);
    wrapper.add_subgate(Gate::new_register());
    let err = wrapper.serialize().unwrap_err();
    assert!(matches!(err, crate::error::SimulatorError::NotCombinational));
}

#[test]
fn duplicate_of_serialized_chip_shares_truth_table_pointer() {
    let board = Board::new();
    let mut original = build_not(&board);
    original.serialize().unwrap();
    let copy = original.duplicate();
    assert!(copy.serialized);
    assert!(std::rc::Rc::ptr_eq(
        original.truth_table.as_ref().unwrap(),
        copy.truth_table.as_ref().unwrap()
    ));
}

#[test]
fn mux16_selects_b_when_sel_high() {
    let mut mux = Gate::new_mux16();
    for i in 0..16 {
        mux.input_pins[i].state = false;
        mux.input_pins[16 + i].state = true;
    }
    mux.input_pins[32].state = HIGH;
    mux.simulate();
    assert!(mux.output_pins.iter().all(|p| p.state));

    mux.input_pins[32].state = LOW;
    mux.simulate();
    assert!(mux.output_pins.iter().all(|p| !p.state));
}

#[test]
fn pc_priority_is_reset_then_inc_then_load() {
    let mut pc = Gate::new_pc();
    set_u16(&mut pc.input_pins[0..16], 21);
    pc.input_pins[16].state = HIGH; // load
    pc.input_pins[19].state = HIGH; // clock
    pc.simulate();
    assert_eq!(read_u16(&pc.output_pins), 21);

    // inc takes priority over load
    pc.input_pins[17].state = HIGH; // inc
    pc.input_pins[19].state = HIGH;
    pc.simulate();
    assert_eq!(read_u16(&pc.output_pins), 22);

    // reset takes priority over inc and load
    pc.input_pins[18].state = HIGH; // reset
    pc.input_pins[19].state = HIGH;
    pc.simulate();
    assert_eq!(read_u16(&pc.output_pins), 0);
}

fn set_u16(pins: &mut [crate::chip::pin::Pin], value: u16) {
    for (idx, pin) in pins.iter_mut().enumerate() {
        let shift = 15 - idx;
        pin.state = (value >> shift) & 1 == 1;
    }
}

fn read_u16(pins: &[crate::chip::pin::Pin]) -> u16 {
    pins.iter().fold(0u16, |acc, p| (acc << 1) | (p.state as u16))
}
