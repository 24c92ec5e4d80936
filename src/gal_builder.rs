//
// gal_builder.rs: Fuse placement
//
// Turns a Blueprint into a programmed GAL: picks and sets the 16V8
// mode fuses, lays the per-OLMC product terms into their row blocks
// (reserving the output-enable row where the device/mode has one),
// programs the 22V10 global AR/SP rows, and packs the signature.
//

use slog::{info, o, Drain};

use crate::blueprint::Blueprint;
use crate::chips::{Bounds, Chip, Mode, ROW_22V10_AR, ROW_22V10_SP};
use crate::errors::Error;
use crate::gal::{false_term, GAL};
use crate::olmc::{self, PinMode};

pub fn build<L: Into<Option<slog::Logger>>>(
    blueprint: &Blueprint,
    logger: L,
) -> Result<GAL, Error> {
    let logger = logger
        .into()
        .unwrap_or_else(|| slog::Logger::root(slog::Discard.fuse(), o!()));

    let mut gal = GAL::new(blueprint.chip);

    if blueprint.chip == Chip::GAL16V8 {
        let mode = olmc::get_mode_16v8(&blueprint.olmcs, blueprint.mode_hint)?;
        gal.set_mode(mode);
        info!(logger, "operating mode selected";
              "device" => blueprint.chip.name(), "mode" => %mode);
    } else {
        info!(logger, "operating mode selected"; "device" => blueprint.chip.name());
    }

    olmc::set_config_fuses(&mut gal, &blueprint.olmcs);
    set_signature(&mut gal, &blueprint.sig);

    match blueprint.chip {
        Chip::GAL16V8 => build_16v8(&mut gal, blueprint)?,
        Chip::GAL22V10 => build_22v10(&mut gal, blueprint)?,
    }

    Ok(gal)
}

// Signature bits come from the Partno metadata, MSB-first, packed into
// the first 64 signature fuses.
fn set_signature(gal: &mut GAL, sig: &[u8]) {
    for (i, byte) in sig.iter().take(8).enumerate() {
        for j in 0..8 {
            gal.sig[i * 8 + j] = (byte << j) & 0x80 != 0;
        }
    }
}

// Whether row 0 of this OLMC's block is reserved for the output-enable
// term. On the 22V10 every macrocell has an OE row; on the 16V8 only
// the tristate configurations (everything outside simple mode except
// registered outputs) do.
fn reserves_oe_row(chip: Chip, mode: Option<Mode>, pin_mode: PinMode) -> bool {
    match chip {
        Chip::GAL22V10 => true,
        Chip::GAL16V8 => mode != Some(Mode::Simple) && pin_mode != PinMode::RegOut,
    }
}

fn build_logic_rows(gal: &mut GAL, blueprint: &Blueprint) -> Result<(), Error> {
    let mode = match gal.chip {
        Chip::GAL16V8 => Some(gal.get_mode()),
        Chip::GAL22V10 => None,
    };

    for (i, olmc) in blueprint.olmcs.iter().enumerate() {
        let bounds = gal.chip.get_bounds(i);

        match &olmc.output {
            None => {
                // Unused cell: clear the whole block, OE row included.
                gal.add_term(&false_term(0), &bounds)?;
            }
            Some((pin_mode, term)) => {
                let bounds = if reserves_oe_row(gal.chip, mode, *pin_mode) {
                    // Row 0 carries the enable term. Left untouched it
                    // stays all-1s: output enabled unconditionally.
                    if let Some(oe) = &olmc.oe {
                        let oe_bounds = Bounds {
                            max_row: 1,
                            ..bounds
                        };
                        gal.add_term(oe, &oe_bounds)?;
                    }
                    Bounds {
                        row_offset: 1,
                        ..bounds
                    }
                } else {
                    bounds
                };
                gal.add_term(term, &bounds)?;
            }
        }
    }

    Ok(())
}

fn build_16v8(gal: &mut GAL, blueprint: &Blueprint) -> Result<(), Error> {
    build_logic_rows(gal, blueprint)
}

fn build_22v10(gal: &mut GAL, blueprint: &Blueprint) -> Result<(), Error> {
    build_logic_rows(gal, blueprint)?;

    // The global reset/preset rows default to disabled (all cleared)
    // unless an equation drives them.
    let ar_bounds = Bounds {
        start_row: ROW_22V10_AR,
        max_row: 1,
        row_offset: 0,
    };
    gal.add_term_opt(&blueprint.ar, &ar_bounds)?;

    let sp_bounds = Bounds {
        start_row: ROW_22V10_SP,
        max_row: 1,
        row_offset: 0,
    };
    gal.add_term_opt(&blueprint.sp, &sp_bounds)?;

    Ok(())
}
