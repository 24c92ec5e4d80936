//
// olmc.rs: Output Logic MacroCell configuration
//
// Each OLMC-backed pin accumulates an output function, polarity, and
// optionally an output-enable term. The analysis here decides the
// GAL16V8 operating mode and translates OLMC state into the per-cell
// config fuses (XOR, AC1) and the 16V8 global fuses (SYN, AC0, PT).
//

use crate::chips::{Chip, Mode};
use crate::errors::{at_line, Error, ErrorCode};
use crate::gal::{Term, GAL};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PinMode {
    ComOut,
    TriOut,
    RegOut,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Active {
    Low,
    High,
}

#[derive(Clone, Debug)]
pub struct OLMC {
    pub active: Active,
    pub output: Option<(PinMode, Term)>,
    pub oe: Option<Term>,
    pub feedback: bool,
}

impl OLMC {
    pub fn new() -> OLMC {
        OLMC {
            active: Active::Low,
            output: None,
            oe: None,
            feedback: false,
        }
    }

    pub fn is_registered(&self) -> bool {
        matches!(self.output, Some((PinMode::RegOut, _)))
    }

    // An output only drives anything once at least one product term
    // has been placed for it; a termless output is constantly off.
    pub fn is_driven(&self) -> bool {
        matches!(self.output, Some((_, ref term)) if !term.rows.is_empty())
    }
}

impl Default for OLMC {
    fn default() -> Self {
        OLMC::new()
    }
}

////////////////////////////////////////////////////////////////////////
// GAL16V8 mode selection
//

// Decide the operating mode, honouring a mnemonic-forced mode when one
// was given. Auto-detection prefers the least capable mode that still
// fits: registered beats complex beats simple.
pub fn get_mode_16v8(olmcs: &[OLMC], mode_hint: Option<Mode>) -> Result<Mode, Error> {
    // Tristate enables on registered outputs never work on this chip.
    for olmc in olmcs.iter() {
        if olmc.is_registered() {
            if let Some(oe) = &olmc.oe {
                return at_line(oe.line_num, Err(ErrorCode::TristateReg));
            }
        }
    }

    if let Some(mode) = mode_hint {
        check_forced_mode(olmcs, mode)?;
        return Ok(mode);
    }

    for olmc in olmcs.iter() {
        if olmc.is_registered() {
            return Ok(Mode::Registered);
        }
    }
    for olmc in olmcs.iter() {
        if olmc.oe.is_some() {
            return Ok(Mode::Complex);
        }
    }
    // Pins 15 and 16 have no input path in simple mode.
    for olmc in olmcs.iter() {
        for term in olmc
            .output
            .iter()
            .map(|(_, term)| term)
            .chain(olmc.oe.iter())
        {
            for row in term.rows.iter() {
                if row.iter().any(|pin| pin.pin == 15 || pin.pin == 16) {
                    return Ok(Mode::Complex);
                }
            }
        }
    }
    // Simple mode cannot feed an OLMC output back into the array.
    for olmc in olmcs.iter() {
        if olmc.feedback && olmc.output.is_some() {
            return Ok(Mode::Complex);
        }
    }
    Ok(Mode::Simple)
}

// A forced mode must still be able to express the design.
fn check_forced_mode(olmcs: &[OLMC], mode: Mode) -> Result<(), Error> {
    for olmc in olmcs.iter() {
        if olmc.is_registered() && mode != Mode::Registered {
            let line = match &olmc.output {
                Some((_, term)) => term.line_num,
                None => 0,
            };
            return at_line(line, Err(ErrorCode::RegisteredNotAvailable { mode }));
        }
        if mode == Mode::Simple {
            if let Some(oe) = &olmc.oe {
                return at_line(oe.line_num, Err(ErrorCode::OutputEnableNotAvailable));
            }
        }
    }
    Ok(())
}

////////////////////////////////////////////////////////////////////////
// Config fuse assignment
//

// Translate OLMC state into XOR/AC1 (and PT on the 16V8). The mode
// fuses must already be set on a 16V8.
pub fn set_config_fuses(gal: &mut GAL, olmcs: &[OLMC]) {
    let num_olmcs = olmcs.len();

    // The XOR fuse selects active-high, and only matters once the
    // output drives something.
    for (n, olmc) in olmcs.iter().enumerate() {
        if olmc.is_driven() && olmc.active == Active::High {
            gal.xor[num_olmcs - 1 - n] = true;
        }
    }

    match gal.chip {
        Chip::GAL16V8 => {
            // Product term mux: every row participates.
            for pt in gal.pt.iter_mut() {
                *pt = true;
            }

            let simple = gal.get_mode() == Mode::Simple;
            for (n, olmc) in olmcs.iter().enumerate() {
                let tristate = match &olmc.output {
                    // In simple mode an unused OLMC is wired as an
                    // input; otherwise only feedback keeps it alive.
                    None => simple || olmc.feedback,
                    Some((PinMode::RegOut, _)) => false,
                    // Combinatorial outputs outside simple mode run
                    // as tristate with OE asserted.
                    Some(_) => !simple,
                };
                if tristate {
                    gal.ac1[num_olmcs - 1 - n] = true;
                }
            }
        }
        Chip::GAL22V10 => {
            for (n, olmc) in olmcs.iter().enumerate() {
                let tristate = match &olmc.output {
                    None => olmc.feedback,
                    Some((PinMode::RegOut, _)) => false,
                    Some(_) => true,
                };
                if tristate {
                    gal.ac1[num_olmcs - 1 - n] = true;
                }
            }
        }
    }
}
