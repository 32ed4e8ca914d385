//! The `.meta` sidecar format: symbolic pin/bus names for a compiled chip,
//! kept alongside its `.gate` recipe (which only knows numeric pin ids).
//! Grammar:
//!
//! ```text
//! <chip_name>
//! [BUSES <n> (<bus_name> <start> <size>)*]
//! INPUTS <n> (<pin_name>)*
//! OUTPUTS <n> (<pin_name>)*
//! ```

use crate::chip::trie;
use crate::error::{Result, SimulatorError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinEntry {
    pub name: String,
    pub start: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusEntry {
    pub name: String,
    pub start: usize,
    pub size: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Meta {
    pub chip_name: String,
    pub buses: Vec<BusEntry>,
    pub inputs: Vec<PinEntry>,
    pub outputs: Vec<PinEntry>,
}

impl Meta {
    pub fn width_of(&self, name: &str) -> usize {
        self.buses
            .iter()
            .find(|b| b.name == name)
            .map(|b| b.size)
            .unwrap_or(1)
    }

    pub fn find_input(&self, name: &str) -> Option<&PinEntry> {
        self.inputs.iter().find(|p| trie::matches(&p.name, name) && p.name == name)
    }

    pub fn find_output(&self, name: &str) -> Option<&PinEntry> {
        self.outputs.iter().find(|p| trie::matches(&p.name, name) && p.name == name)
    }
}

pub fn to_meta_text(meta: &Meta) -> String {
    let mut out = String::new();
    out.push_str(&meta.chip_name);
    out.push('\n');
    if !meta.buses.is_empty() {
        out.push_str(&format!("BUSES {}\n", meta.buses.len()));
        for bus in &meta.buses {
            out.push_str(&format!("{} {} {}\n", bus.name, bus.start, bus.size));
        }
    }
    out.push_str(&format!("INPUTS {}\n", meta.inputs.len()));
    for pin in &meta.inputs {
        out.push_str(&format!("{} {}\n", pin.name, pin.start));
    }
    out.push_str(&format!("OUTPUTS {}\n", meta.outputs.len()));
    for pin in &meta.outputs {
        out.push_str(&format!("{} {}\n", pin.name, pin.start));
    }
    out
}

pub fn parse_meta_text(text: &str) -> Result<Meta> {
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let chip_name = lines
        .next()
        .ok_or_else(|| SimulatorError::Parse("empty .meta file".into()))?
        .trim()
        .to_string();

    let mut meta = Meta {
        chip_name,
        ..Meta::default()
    };

    let mut next_line = lines.next();

    if let Some(line) = next_line {
        if let Some(rest) = line.trim().strip_prefix("BUSES ") {
            let n: usize = rest
                .trim()
                .parse()
                .map_err(|_| SimulatorError::Parse(format!("invalid BUSES count: {rest}")))?;
            for _ in 0..n {
                let entry = lines
                    .next()
                    .ok_or_else(|| SimulatorError::Parse("truncated BUSES section".into()))?;
                meta.buses.push(parse_bus_line(entry)?);
            }
            next_line = lines.next();
        }
    }

    let line = next_line.ok_or_else(|| SimulatorError::Parse("missing INPUTS section".into()))?;
    let rest = line
        .trim()
        .strip_prefix("INPUTS ")
        .ok_or_else(|| SimulatorError::Parse(format!("expected INPUTS, found '{line}'")))?;
    let n: usize = rest
        .trim()
        .parse()
        .map_err(|_| SimulatorError::Parse(format!("invalid INPUTS count: {rest}")))?;
    for _ in 0..n {
        let entry = lines.next().ok_or_else(|| SimulatorError::Parse("truncated INPUTS section".into()))?;
        meta.inputs.push(parse_pin_line(entry)?);
    }

    let line = lines.next().ok_or_else(|| SimulatorError::Parse("missing OUTPUTS section".into()))?;
    let rest = line
        .trim()
        .strip_prefix("OUTPUTS ")
        .ok_or_else(|| SimulatorError::Parse(format!("expected OUTPUTS, found '{line}'")))?;
    let n: usize = rest
        .trim()
        .parse()
        .map_err(|_| SimulatorError::Parse(format!("invalid OUTPUTS count: {rest}")))?;
    for _ in 0..n {
        let entry = lines.next().ok_or_else(|| SimulatorError::Parse("truncated OUTPUTS section".into()))?;
        meta.outputs.push(parse_pin_line(entry)?);
    }

    Ok(meta)
}

fn parse_bus_line(line: &str) -> Result<BusEntry> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() != 3 {
        return Err(SimulatorError::Parse(format!("malformed BUSES entry '{line}'")));
    }
    Ok(BusEntry {
        name: parts[0].to_string(),
        start: parts[1].parse().map_err(|_| SimulatorError::Parse(format!("bad start in '{line}'")))?,
        size: parts[2].parse().map_err(|_| SimulatorError::Parse(format!("bad size in '{line}'")))?,
    })
}

fn parse_pin_line(line: &str) -> Result<PinEntry> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() != 2 {
        return Err(SimulatorError::Parse(format!("malformed pin entry '{line}'")));
    }
    Ok(PinEntry {
        name: parts[0].to_string(),
        start: parts[1].parse().map_err(|_| SimulatorError::Parse(format!("bad start in '{line}'")))?,
    })
}

/// The hardcoded metadata for `nand`, the one builtin with no `.meta` file
/// of its own to load - mirrors the original's special-cased bootstrap.
pub fn nand_meta() -> Meta {
    Meta {
        chip_name: "nand".to_string(),
        buses: Vec::new(),
        inputs: vec![
            PinEntry { name: "a".to_string(), start: 0 },
            PinEntry { name: "b".to_string(), start: 1 },
        ],
        outputs: vec![PinEntry { name: "out".to_string(), start: 0 }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_text() {
        let meta = Meta {
            chip_name: "and16".to_string(),
            buses: vec![BusEntry { name: "a".to_string(), start: 0, size: 16 }],
            inputs: vec![
                PinEntry { name: "a".to_string(), start: 0 },
                PinEntry { name: "b".to_string(), start: 16 },
            ],
            outputs: vec![PinEntry { name: "out".to_string(), start: 0 }],
        };
        let text = to_meta_text(&meta);
        let parsed = parse_meta_text(&text).unwrap();
        assert_eq!(meta, parsed);
    }

    #[test]
    fn buses_section_is_optional() {
        let text = "not\nINPUTS 1\nin 0\nOUTPUTS 1\nout 0\n";
        let meta = parse_meta_text(text).unwrap();
        assert!(meta.buses.is_empty());
        assert_eq!(meta.inputs[0].name, "in");
    }
}
