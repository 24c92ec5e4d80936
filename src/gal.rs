//
// gal.rs: Fuse state
//
// The GAL structure holds the fuse state for the device being
// programmed. Helper methods program whole product terms into row
// ranges; the discrete config bit groups (XOR, AC1, SIG, PT, SYN, AC0)
// are manipulated directly by the placement engine.
//

use crate::chips::{Bounds, Chip, Mode};
use crate::errors::{at_line, Error, ErrorCode};

// A 'Pin' is an input to a product term: a potentially negated pin,
// identified by pin number.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pin {
    pub pin: usize,
    pub neg: bool,
}

// A 'Term' is a set of OR'd together rows, each row the AND of its
// inputs. The empty row is TRUE (the AND of nothing); no rows at all
// is FALSE (the OR of nothing). See 'true_term' and 'false_term'.
#[derive(Clone, Debug, PartialEq)]
pub struct Term {
    pub line_num: u32,
    pub rows: Vec<Vec<Pin>>,
}

// The fuse state of the GAL we're going to program. All logic fuses
// start out 1 (link intact); placing terms clears the fuses selecting
// each input, and unused rows are cleared wholesale so they drop out
// of the OR.
pub struct GAL {
    pub chip: Chip,
    pub fuses: Vec<bool>,
    pub xor: Vec<bool>,
    pub sig: Vec<bool>,
    pub ac1: Vec<bool>,
    pub pt: Vec<bool>,
    pub syn: bool,
    pub ac0: bool,
}

// Map input pin number to column within the fuse row. Column pairs
// encode (true, complement); the un-negated input is the even column.
// The 16V8 tables depend on the operating mode: simple mode has no
// input path for pins 15/16, complex mode loses pins 12/19, and
// registered mode reserves pins 1 and 11 for Clock and /OE.

const SIMPLE15: Result<usize, ErrorCode> = Err(ErrorCode::NotAnInputSimple { pin: 15 });
const SIMPLE16: Result<usize, ErrorCode> = Err(ErrorCode::NotAnInputSimple { pin: 16 });
const COMPLEX12: Result<usize, ErrorCode> = Err(ErrorCode::NotAnInputComplex { pin: 12 });
const COMPLEX19: Result<usize, ErrorCode> = Err(ErrorCode::NotAnInputComplex { pin: 19 });
const REG1: Result<usize, ErrorCode> = Err(ErrorCode::ReservedRegisteredInput {
    pin: 1,
    name: "Clock",
});
const REG11: Result<usize, ErrorCode> = Err(ErrorCode::ReservedRegisteredInput {
    pin: 11,
    name: "/OE",
});
const PWR: Result<usize, ErrorCode> = Err(ErrorCode::BadPower);

#[rustfmt::skip]
const PIN_TO_COL_16_SIMPLE: [Result<usize, ErrorCode>; 20] = [
    Ok(2),  Ok(0),  Ok(4),  Ok(8),  Ok(12),   Ok(16),   Ok(20), Ok(24), Ok(28), PWR,
    Ok(30), Ok(26), Ok(22), Ok(18), SIMPLE15, SIMPLE16, Ok(14), Ok(10), Ok(6),  PWR,
];
#[rustfmt::skip]
const PIN_TO_COL_16_COMPLEX: [Result<usize, ErrorCode>; 20] = [
    Ok(2),  Ok(0),     Ok(4),  Ok(8),  Ok(12), Ok(16), Ok(20), Ok(24), Ok(28),    PWR,
    Ok(30), COMPLEX12, Ok(26), Ok(22), Ok(18), Ok(14), Ok(10), Ok(6),  COMPLEX19, PWR,
];
#[rustfmt::skip]
const PIN_TO_COL_16_REGISTERED: [Result<usize, ErrorCode>; 20] = [
    REG1,  Ok(0),  Ok(4),  Ok(8),  Ok(12), Ok(16), Ok(20), Ok(24), Ok(28), PWR,
    REG11, Ok(30), Ok(26), Ok(22), Ok(18), Ok(14), Ok(10), Ok(6),  Ok(2),  PWR,
];

#[rustfmt::skip]
const PIN_TO_COL_22V10: [Result<usize, ErrorCode>; 24] = [
    Ok(0),  Ok(4),  Ok(8),  Ok(12), Ok(16), Ok(20), Ok(24), Ok(28), Ok(32), Ok(36), Ok(40), PWR,
    Ok(42), Ok(38), Ok(34), Ok(30), Ok(26), Ok(22), Ok(18), Ok(14), Ok(10), Ok(6),  Ok(2),  PWR,
];

impl GAL {
    // Generate an empty fuse structure: logic fuses all 1, config
    // sections all 0.
    pub fn new(chip: Chip) -> GAL {
        let fuse_size = chip.logic_size();
        let num_olmcs = chip.num_olmcs();

        GAL {
            chip,
            fuses: vec![true; fuse_size],
            // One xor bit per OLMC.
            xor: vec![false; num_olmcs],
            sig: vec![false; 64],
            ac1: vec![false; num_olmcs],
            pt: vec![false; 64],
            syn: false,
            ac0: false,
        }
    }

    // Set the mode fuses for the GAL16V8.
    pub fn set_mode(&mut self, mode: Mode) {
        assert!(self.chip == Chip::GAL16V8);
        match mode {
            Mode::Simple => {
                self.syn = true;
                self.ac0 = false;
            }
            Mode::Complex => {
                self.syn = true;
                self.ac0 = true;
            }
            Mode::Registered => {
                self.syn = false;
                self.ac0 = true;
            }
        }
    }

    // Retrieve the mode from the mode fuses.
    pub fn get_mode(&self) -> Mode {
        assert!(self.chip == Chip::GAL16V8);
        match (self.syn, self.ac0) {
            (true, false) => Mode::Simple,
            (true, true) => Mode::Complex,
            (false, true) => Mode::Registered,
            _ => panic!("bad syn/ac0 mode"),
        }
    }

    // Enter a term into the given set of rows of the main logic array.
    // Any rows of the range left unused are cleared, so they contribute
    // nothing to the OR.
    pub fn add_term(&mut self, term: &Term, bounds: &Bounds) -> Result<(), Error> {
        let mut bounds = *bounds;
        let capacity = bounds.max_row - bounds.row_offset;
        for row in term.rows.iter() {
            if bounds.row_offset == bounds.max_row {
                // Too many ORs for the space available.
                return at_line(
                    term.line_num,
                    Err(if capacity == 1 {
                        ErrorCode::MoreThanOneProduct
                    } else {
                        ErrorCode::TooManyProducts { max: capacity }
                    }),
                );
            }

            for input in row.iter() {
                at_line(
                    term.line_num,
                    self.set_and(bounds.start_row + bounds.row_offset, input.pin, input.neg),
                )?;
            }

            bounds.row_offset += 1;
        }

        self.clear_rows(&bounds);

        Ok(())
    }

    // Like add_term, but programming FALSE if no term is provided.
    pub fn add_term_opt(&mut self, term: &Option<Term>, bounds: &Bounds) -> Result<(), Error> {
        match term {
            Some(term) => self.add_term(term, bounds),
            None => self.add_term(&false_term(0), bounds),
        }
    }

    // Clear out a set of rows, so they don't contribute to the term.
    fn clear_rows(&mut self, bounds: &Bounds) {
        let num_cols = self.chip.num_cols();
        let start = (bounds.start_row + bounds.row_offset) * num_cols;
        let end = (bounds.start_row + bounds.max_row) * num_cols;
        for fuse in self.fuses[start..end].iter_mut() {
            *fuse = false;
        }
    }

    // Map an input pin number to its fuse column.
    pub fn pin_to_column(&self, pin_num: usize) -> Result<usize, ErrorCode> {
        let column_lookup: &[Result<usize, ErrorCode>] = match self.chip {
            Chip::GAL16V8 => match self.get_mode() {
                Mode::Simple => &PIN_TO_COL_16_SIMPLE,
                Mode::Complex => &PIN_TO_COL_16_COMPLEX,
                Mode::Registered => &PIN_TO_COL_16_REGISTERED,
            },
            Chip::GAL22V10 => &PIN_TO_COL_22V10,
        };

        column_lookup[pin_num - 1].clone()
    }

    // Clear the fuse selecting an AND-array input.
    fn set_and(&mut self, row: usize, pin_num: usize, negation: bool) -> Result<(), ErrorCode> {
        let row_len = self.chip.num_cols();
        let column = self.pin_to_column(pin_num)?;
        let neg_off = if negation { 1 } else { 0 };
        self.fuses[row * row_len + column + neg_off] = false;
        Ok(())
    }
}

// Basic terms.
pub fn true_term(line_num: u32) -> Term {
    // Empty row is always true (being the AND of nothing).
    Term {
        line_num,
        rows: vec![Vec::new()],
    }
}

pub fn false_term(line_num: u32) -> Term {
    // No rows is always false (being the OR of nothing).
    Term {
        line_num,
        rows: Vec::new(),
    }
}
