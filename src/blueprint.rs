//
// blueprint.rs: From parsed design to placement plan
//
// The Blueprint stores everything the placement engine needs: per-OLMC
// output functions (minimized, pin-mapped, polarity resolved), the
// 22V10 global AR/SP terms, the signature bytes and the 16V8 mode
// hint. Building it from a Content runs the whole logic compiler:
// set/bus desugaring, alias resolution, NNF + DNF lowering,
// Quine-McCluskey minimization, and the registered-feedback fixup.
//

use std::collections::{BTreeMap, HashMap};

use slog::debug;

use crate::ast::{is_global_signal, Content, Equation, Expr, Lhs, Suffix};
use crate::chips::{Chip, Mode};
use crate::dnf;
use crate::errors::{at_line, Error, ErrorCode};
use crate::gal::{self, Pin, Term};
use crate::lower;
use crate::minimize::minimize_terms;
use crate::olmc::{Active, PinMode, OLMC};

// A name in an equation resolves to a pin and its declared polarity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Symbol {
    pub pin: usize,
    pub active_low: bool,
}

pub struct Blueprint {
    pub chip: Chip,
    pub sig: Vec<u8>,
    pub mode_hint: Option<Mode>,
    pub olmcs: Vec<OLMC>,
    // GAL22V10 only:
    pub ar: Option<Term>,
    pub sp: Option<Term>,
}

// Output (and OE) term lists accumulate across APPEND equations before
// being minimized, so they are buffered per OLMC first.
struct OutputAccum {
    name: String,
    terms: Vec<dnf::Term>,
    active_low: bool,
    pin_mode: PinMode,
    line_num: u32,
}

impl Blueprint {
    pub fn new(chip: Chip) -> Self {
        Blueprint {
            chip,
            sig: Vec::new(),
            mode_hint: None,
            olmcs: vec![OLMC::new(); chip.num_olmcs()],
            ar: None,
            sp: None,
        }
    }

    pub fn from_content(content: &Content, logger: &slog::Logger) -> Result<Self, Error> {
        let (chip, mode_hint) = at_line(0, Chip::from_device(&content.device))?;
        let mut blueprint = Blueprint::new(chip);
        blueprint.mode_hint = mode_hint;

        if let Some(partno) = content.meta.get("Partno") {
            blueprint.sig = partno.trim().as_bytes().to_vec();
        }

        let symbols = build_symbols(content, chip)?;
        let eqns = lower::desugar_set_equations(content)?;
        let aliases = collect_aliases(&eqns, &symbols)?;

        let mut outputs: BTreeMap<usize, OutputAccum> = BTreeMap::new();
        let mut enables: BTreeMap<usize, OutputAccum> = BTreeMap::new();

        for eqn in eqns.iter() {
            blueprint.add_equation(content, eqn, &symbols, &aliases, &mut outputs, &mut enables)?;
        }

        for (olmc_num, accum) in outputs {
            let before = accum.terms.len();
            let terms = minimize_terms(accum.terms);
            debug!(logger, "minimized output";
                   "output" => %accum.name, "terms_in" => before, "terms_out" => terms.len());

            let term = map_terms_to_pins(&terms, &symbols, chip, accum.line_num)?;
            let olmc = &mut blueprint.olmcs[olmc_num];
            olmc.output = Some((accum.pin_mode, term));
            olmc.active = if accum.active_low {
                Active::Low
            } else {
                Active::High
            };
        }

        for (olmc_num, accum) in enables {
            let terms = minimize_terms(accum.terms);
            let term = map_terms_to_pins(&terms, &symbols, chip, accum.line_num)?;
            blueprint.olmcs[olmc_num].oe = Some(term);
        }

        blueprint.flip_registered_feedback();

        Ok(blueprint)
    }

    // Steer one equation into the structure it drives: a global AR/SP
    // row, an output-enable slot, or an output accumulator.
    fn add_equation(
        &mut self,
        content: &Content,
        eqn: &Equation,
        symbols: &HashMap<String, Symbol>,
        aliases: &HashMap<String, Expr>,
        outputs: &mut BTreeMap<usize, OutputAccum>,
        enables: &mut BTreeMap<usize, OutputAccum>,
    ) -> Result<(), Error> {
        let line = eqn.line_num;
        let lhs = at_line(line, Lhs::parse(&eqn.lhs))?;

        // Global AR/SP rows. These bypass the polarity hoist and the
        // minimizer; each is a single row in the fuse grid.
        if is_global_signal(&lhs.name) && !symbols.contains_key(&lhs.name) {
            let name = if lhs.name.eq_ignore_ascii_case("AR") {
                "AR"
            } else {
                "SP"
            };
            if self.chip != Chip::GAL22V10 {
                return at_line(line, Err(ErrorCode::GlobalNotAvailable { name }));
            }
            let terms = at_line(line, dnf::expr_to_terms(&eqn.expr, &content.fields, aliases))?;
            let term = map_terms_to_pins(&terms, symbols, self.chip, line)?;
            let slot = if name == "AR" {
                &mut self.ar
            } else {
                &mut self.sp
            };
            if slot.is_some() {
                return at_line(line, Err(ErrorCode::RepeatedGlobal { name }));
            }
            *slot = Some(term);
            return Ok(());
        }

        let symbol = match symbols.get(&lhs.name) {
            Some(symbol) => *symbol,
            // Not a pin: alias equation, already collected.
            None => return Ok(()),
        };

        // Polarity optimization: a top-level negation is absorbed into
        // the output polarity instead of being distributed over the
        // expression. Never for APPEND (the negation would have to
        // distribute into an existing OR), output enables, or
        // registered outputs.
        let mut compile_expr = &eqn.expr;
        let mut polarity_flipped = false;
        if let Expr::Not(inner) = &eqn.expr {
            if !eqn.append && lhs.suffix != Suffix::E && lhs.suffix != Suffix::R {
                compile_expr = inner;
                polarity_flipped = true;
            }
        }

        let terms = at_line(
            line,
            dnf::expr_to_terms(compile_expr, &content.fields, aliases),
        )?;

        // Any OLMC pin referenced by the compiled terms provides
        // feedback into the array.
        for term in terms.iter() {
            for lit in term.lits.iter() {
                if let Some(sym) = symbols.get(&lit.name) {
                    if let Some(olmc_num) = self.chip.pin_to_olmc(sym.pin) {
                        self.olmcs[olmc_num].feedback = true;
                    }
                }
            }
        }

        let olmc_num = match self.chip.pin_to_olmc(symbol.pin) {
            Some(i) => i,
            None => {
                return at_line(
                    line,
                    Err(ErrorCode::NotAnOutput {
                        name: lhs.name.clone(),
                    }),
                )
            }
        };

        if lhs.suffix == Suffix::E {
            if enables.contains_key(&olmc_num) {
                return at_line(
                    line,
                    Err(ErrorCode::RepeatedOutputEnable {
                        name: lhs.name.clone(),
                    }),
                );
            }
            enables.insert(
                olmc_num,
                OutputAccum {
                    name: lhs.name.clone(),
                    terms,
                    active_low: false,
                    pin_mode: PinMode::ComOut,
                    line_num: line,
                },
            );
            return Ok(());
        }

        match outputs.get_mut(&olmc_num) {
            Some(accum) => {
                if !eqn.append {
                    return at_line(
                        line,
                        Err(ErrorCode::RepeatedOutput {
                            name: lhs.name.clone(),
                        }),
                    );
                }
                accum.terms.extend(terms);
            }
            None => {
                outputs.insert(
                    olmc_num,
                    OutputAccum {
                        name: lhs.name.clone(),
                        terms,
                        active_low: (lhs.neg != polarity_flipped) || symbol.active_low,
                        pin_mode: match lhs.suffix {
                            Suffix::R => PinMode::RegOut,
                            Suffix::T => PinMode::TriOut,
                            _ => PinMode::ComOut,
                        },
                        line_num: line,
                    },
                );
            }
        }
        Ok(())
    }

    // On the GAL22V10 a registered active-high output feeds back from
    // before the XOR gate, i.e. inverted with respect to the pin. Any
    // reference to such a pin, anywhere in the device, must flip its
    // negation to compensate. Applies uniformly to output, OE, AR and
    // SP terms.
    fn flip_registered_feedback(&mut self) {
        if self.chip != Chip::GAL22V10 {
            return;
        }
        let min_pin = self.chip.min_olmc_pin();
        let flip_pins: Vec<usize> = self
            .olmcs
            .iter()
            .enumerate()
            .filter(|(_, olmc)| {
                olmc.is_registered() && olmc.is_driven() && olmc.active == Active::High
            })
            .map(|(i, _)| min_pin + i)
            .collect();
        if flip_pins.is_empty() {
            return;
        }

        let flip_term = |term: &mut Term| {
            for row in term.rows.iter_mut() {
                for pin in row.iter_mut() {
                    if flip_pins.contains(&pin.pin) {
                        pin.neg = !pin.neg;
                    }
                }
            }
        };

        for olmc in self.olmcs.iter_mut() {
            if let Some((_, term)) = &mut olmc.output {
                flip_term(term);
            }
            if let Some(term) = &mut olmc.oe {
                flip_term(term);
            }
        }
        if let Some(term) = &mut self.ar {
            flip_term(term);
        }
        if let Some(term) = &mut self.sp {
            flip_term(term);
        }
    }
}

////////////////////////////////////////////////////////////////////////
// Symbol handling
//

fn build_symbols(content: &Content, chip: Chip) -> Result<HashMap<String, Symbol>, Error> {
    let mut symbols = HashMap::new();

    let mut pins: Vec<(&usize, &crate::ast::PinDef)> = content.pins.iter().collect();
    pins.sort_by_key(|(pin, _)| **pin);

    for (&pin, def) in pins {
        if pin < 1 || pin > chip.num_pins() {
            return at_line(
                0,
                Err(ErrorCode::PinOutOfRange {
                    pin,
                    device: chip.name(),
                }),
            );
        }
        symbols.insert(
            def.name.clone(),
            Symbol {
                pin,
                active_low: def.active_low,
            },
        );
    }

    // Supply rails double as the constant functions.
    symbols.insert(
        "VCC".to_string(),
        Symbol {
            pin: chip.num_pins(),
            active_low: false,
        },
    );
    symbols.insert(
        "GND".to_string(),
        Symbol {
            pin: chip.num_pins() / 2,
            active_low: false,
        },
    );

    Ok(symbols)
}

// An equation whose LHS is neither a declared pin nor a global signal
// (and has no suffix, and isn't APPEND) defines an alias, substituted
// wherever its name appears in later expressions.
fn collect_aliases(
    eqns: &[Equation],
    symbols: &HashMap<String, Symbol>,
) -> Result<HashMap<String, Expr>, Error> {
    let mut aliases = HashMap::new();
    for eqn in eqns.iter() {
        let lhs = at_line(eqn.line_num, Lhs::parse(&eqn.lhs))?;
        if symbols.contains_key(&lhs.name) || is_global_signal(&lhs.name) {
            continue;
        }
        if lhs.neg {
            return at_line(
                eqn.line_num,
                Err(ErrorCode::ActiveLowNonPin {
                    name: lhs.name.clone(),
                }),
            );
        }
        if lhs.suffix == Suffix::None && !eqn.append {
            aliases.insert(lhs.name, eqn.expr.clone());
        }
    }
    Ok(aliases)
}

// Resolve symbolic terms into pin references, folding declared
// polarities in. A lone VCC or GND literal stands for the constant
// TRUE/FALSE function; supply rails are not otherwise usable.
fn map_terms_to_pins(
    terms: &[dnf::Term],
    symbols: &HashMap<String, Symbol>,
    chip: Chip,
    line_num: u32,
) -> Result<Term, Error> {
    let vcc_pin = chip.num_pins();
    let gnd_pin = chip.num_pins() / 2;

    if terms.len() == 1 && terms[0].lits.len() == 1 {
        let lit = &terms[0].lits[0];
        if let Some(sym) = symbols.get(&lit.name) {
            if sym.pin == vcc_pin || sym.pin == gnd_pin {
                if lit.neg {
                    return at_line(line_num, Err(ErrorCode::InvertedPower));
                }
                return Ok(if sym.pin == vcc_pin {
                    gal::true_term(line_num)
                } else {
                    gal::false_term(line_num)
                });
            }
        }
    }

    let mut rows = Vec::with_capacity(terms.len());
    for term in terms.iter() {
        let mut row = Vec::with_capacity(term.lits.len());
        for lit in term.lits.iter() {
            let sym = match symbols.get(&lit.name) {
                Some(sym) => sym,
                None => {
                    return at_line(
                        line_num,
                        Err(ErrorCode::UnknownSymbol {
                            name: lit.name.clone(),
                        }),
                    )
                }
            };
            if sym.pin == vcc_pin || sym.pin == gnd_pin {
                return at_line(line_num, Err(ErrorCode::BadPowerUsage));
            }
            row.push(Pin {
                pin: sym.pin,
                neg: lit.neg != sym.active_low,
            });
        }
        rows.push(row);
    }

    Ok(Term { line_num, rows })
}
