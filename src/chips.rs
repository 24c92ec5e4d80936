//
// chips.rs: GAL chip parameterisation data
//
// This file provides an abstraction layer over the two supported GALs,
// in those cases where they can be handled uniformly. Anything that
// additionally depends on the GAL16V8 operating mode (notably the
// pin-to-column tables) lives in gal.rs instead.
//

use std::fmt;

use crate::errors::ErrorCode;

// 'Bounds' encodes the range of rows that can be used to encode a
// particular term within the fuse grid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub start_row: usize,
    pub max_row: usize,
    pub row_offset: usize,
}

// 'Chip' is the main enum that can be matched on for chip-specific
// behaviour, or method calls made on it to extract per-chip parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Chip {
    GAL16V8,
    GAL22V10,
}

// The GAL16V8 interprets its fuse array in one of three modes,
// selected by the SYN and AC0 fuses.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Mode {
    // Combinatorial outputs, no feedback through the OLMCs.
    Simple,
    // Tristate outputs with per-OLMC enable terms.
    Complex,
    // Tristate or registered outputs.
    Registered,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::Simple => "simple",
            Mode::Complex => "complex",
            Mode::Registered => "registered",
        })
    }
}

// 'ChipData' stores the per-chip-type parameters, so that the queries
// can be data-driven.
struct ChipData {
    name: &'static str,
    num_pins: usize,
    // Size of the main fuse array: each row is one product term, each
    // column pair one (input, complement) of an input signal.
    num_rows: usize,
    num_cols: usize,
    // Total size of the bitstream, including the config fuse sections.
    total_size: usize,
    // Range of pins that are backed by OLMCs.
    min_olmc_pin: usize,
    max_olmc_pin: usize,
    // Mapping from OLMC number to starting row number in the fuse grid.
    olmc_row_starts: &'static [usize],
}

const GAL16V8_DATA: ChipData = ChipData {
    name: "GAL16V8",
    num_pins: 20,
    num_rows: 64,
    num_cols: 32,
    total_size: 2194,
    min_olmc_pin: 12,
    max_olmc_pin: 19,
    olmc_row_starts: &[56, 48, 40, 32, 24, 16, 8, 0],
};

const GAL22V10_DATA: ChipData = ChipData {
    name: "GAL22V10",
    num_pins: 24,
    num_rows: 132,
    num_cols: 44,
    total_size: 5892,
    min_olmc_pin: 14,
    max_olmc_pin: 23,
    olmc_row_starts: &[122, 111, 98, 83, 66, 49, 34, 21, 10, 1],
};

// Per-OLMC row counts. Only the 22V10 is non-uniform; its blocks run
// 9..17..9 from the top OLMC (pin 23) down, here indexed from pin 14 up.
const OLMC_SIZE_22V10: [usize; 10] = [9, 11, 13, 15, 17, 17, 15, 13, 11, 9];
const OLMC_SIZE_16V8: usize = 8;

// Global single-row blocks on the 22V10.
pub const ROW_22V10_AR: usize = 0;
pub const ROW_22V10_SP: usize = 131;

impl Chip {
    // Parse a CUPL device mnemonic ("g16v8as", "GAL22V10", ...) into a
    // chip and an optional forced 16V8 mode. Case-insensitive; only
    // letters and digits are significant; a leading G expands to GAL.
    pub fn from_device(device: &str) -> Result<(Chip, Option<Mode>), ErrorCode> {
        let mut norm: String = device
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_uppercase())
            .collect();
        if norm.starts_with('G') && !norm.starts_with("GAL") {
            norm = format!("GAL{}", &norm[1..]);
        }

        if norm.contains("22V10") {
            return Ok((Chip::GAL22V10, None));
        }
        if norm.contains("16V8") {
            let mode = if norm.ends_with("AS") {
                Some(Mode::Simple)
            } else if norm.ends_with("MA") {
                Some(Mode::Complex)
            } else if norm.ends_with("MS") {
                Some(Mode::Registered)
            } else {
                None
            };
            return Ok((Chip::GAL16V8, mode));
        }

        Err(ErrorCode::BadDeviceType {
            name: device.to_string(),
        })
    }

    fn get_chip_data(&self) -> &'static ChipData {
        match self {
            Chip::GAL16V8 => &GAL16V8_DATA,
            Chip::GAL22V10 => &GAL22V10_DATA,
        }
    }

    pub fn name(&self) -> &'static str {
        self.get_chip_data().name
    }

    pub fn num_pins(&self) -> usize {
        self.get_chip_data().num_pins
    }

    pub fn num_rows(&self) -> usize {
        self.get_chip_data().num_rows
    }

    pub fn num_cols(&self) -> usize {
        self.get_chip_data().num_cols
    }

    pub fn logic_size(&self) -> usize {
        let data = self.get_chip_data();
        data.num_rows * data.num_cols
    }

    pub fn total_size(&self) -> usize {
        self.get_chip_data().total_size
    }

    pub fn pin_to_olmc(&self, pin: usize) -> Option<usize> {
        let data = self.get_chip_data();
        if data.min_olmc_pin <= pin && pin <= data.max_olmc_pin {
            Some(pin - data.min_olmc_pin)
        } else {
            None
        }
    }

    pub fn min_olmc_pin(&self) -> usize {
        self.get_chip_data().min_olmc_pin
    }

    pub fn num_olmcs(&self) -> usize {
        let data = self.get_chip_data();
        data.max_olmc_pin - data.min_olmc_pin + 1
    }

    // First fuse-grid row of the block associated with an OLMC.
    pub fn start_row_for_olmc(&self, olmc_num: usize) -> usize {
        self.get_chip_data().olmc_row_starts[olmc_num]
    }

    pub fn num_rows_for_olmc(&self, olmc_num: usize) -> usize {
        match self {
            Chip::GAL22V10 => OLMC_SIZE_22V10[olmc_num],
            Chip::GAL16V8 => OLMC_SIZE_16V8,
        }
    }

    pub fn get_bounds(&self, olmc_num: usize) -> Bounds {
        Bounds {
            start_row: self.start_row_for_olmc(olmc_num),
            max_row: self.num_rows_for_olmc(olmc_num),
            row_offset: 0,
        }
    }
}
