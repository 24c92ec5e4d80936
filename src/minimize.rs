//
// minimize.rs: Quine-McCluskey term minimization
//
// Reduces a sum of product terms to a minimum cover of the same
// function: expand to minterms, generate prime implicants by iterated
// one-bit merging, pick essential primes, then greedily cover the
// rest. The result replaces the input only when it is strictly
// smaller; either way the output order is fully determined.
//

use std::collections::BTreeSet;

use crate::dnf::{Literal, Term};

// A product term over indexed variables: mask bit 1 marks a care
// position, and value holds the polarity of each care position.
// 64 bits is the contract; no in-scope design references more
// variables in a single sum.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Implicant {
    value: u64,
    mask: u64,
}

// Expanding a term with many don't-care positions is exponential, so
// terms past this bound are kept as-is and simply skip merging.
const MAX_DONT_CARE_EXPANSION: usize = 20;

pub fn minimize_terms(terms: Vec<Term>) -> Vec<Term> {
    if terms.len() <= 1 {
        return terms;
    }
    // A TRUE term makes the whole sum TRUE; nothing to minimize.
    if terms.iter().any(|t| t.lits.is_empty()) {
        return terms;
    }

    let vars = collect_vars(&terms);
    if vars.is_empty() || vars.len() > 64 {
        return terms;
    }
    let num_vars = vars.len();

    let input_imps: Vec<Implicant> = terms.iter().map(|t| term_to_implicant(t, &vars)).collect();

    let mut minterm_set = BTreeSet::new();
    for imp in input_imps.iter() {
        expand_minterms(*imp, num_vars, &mut minterm_set);
    }
    if minterm_set.is_empty() {
        return terms;
    }
    let minterms: Vec<u64> = minterm_set.into_iter().collect();

    let primes = find_prime_implicants(&minterms, num_vars);
    let selected = minimum_cover(&primes, &minterms, num_vars);

    if selected.len() < terms.len() {
        // The cover is smaller; use it, largest implicants first.
        let mut selected = selected;
        selected.sort_by(|a, b| b.value.cmp(&a.value).then(b.mask.cmp(&a.mask)));
        implicants_to_terms(&selected, &vars)
    } else {
        // No reduction; keep the original terms in ascending order.
        let mut input_imps = input_imps;
        input_imps.sort();
        implicants_to_terms(&input_imps, &vars)
    }
}

// Sorted unique variable names across all terms. Implicant bit i
// corresponds to vars[i].
fn collect_vars(terms: &[Term]) -> Vec<String> {
    let names: BTreeSet<&str> = terms
        .iter()
        .flat_map(|t| t.lits.iter().map(|l| l.name.as_str()))
        .collect();
    names.into_iter().map(str::to_string).collect()
}

fn term_to_implicant(term: &Term, vars: &[String]) -> Implicant {
    let mut value = 0u64;
    let mut mask = 0u64;
    for lit in term.lits.iter() {
        let idx = vars.binary_search(&lit.name).unwrap();
        let bit = 1u64 << idx;
        mask |= bit;
        if !lit.neg {
            value |= bit;
        }
    }
    Implicant { value, mask }
}

// Expand an implicant into the minterms it represents, iterating over
// its don't-care positions. Past the safety cap, collapse to the
// single minterm at the base value instead of blowing up.
fn expand_minterms(imp: Implicant, num_vars: usize, out: &mut BTreeSet<u64>) {
    let dc_bits: Vec<usize> = (0..num_vars)
        .filter(|b| imp.mask & (1u64 << b) == 0)
        .collect();

    let base = imp.value & imp.mask;
    if dc_bits.len() > MAX_DONT_CARE_EXPANSION {
        out.insert(base);
        return;
    }

    for i in 0..(1usize << dc_bits.len()) {
        let mut minterm = base;
        for (j, bit) in dc_bits.iter().enumerate() {
            if i & (1 << j) != 0 {
                minterm |= 1u64 << bit;
            }
        }
        out.insert(minterm);
    }
}

// The merge phase: starting from fully-specified minterms, repeatedly
// pair implicants with identical masks differing in exactly one care
// bit; anything that never merges in a round is prime.
fn find_prime_implicants(minterms: &[u64], num_vars: usize) -> Vec<Implicant> {
    let full_mask = if num_vars >= 64 {
        !0
    } else {
        (1u64 << num_vars) - 1
    };

    let mut current: BTreeSet<Implicant> = minterms
        .iter()
        .map(|m| Implicant {
            value: m & full_mask,
            mask: full_mask,
        })
        .collect();

    let mut prime_set = BTreeSet::new();

    while !current.is_empty() {
        let imp_list: Vec<Implicant> = current.iter().cloned().collect();
        let mut merged = BTreeSet::new();
        let mut used = vec![false; imp_list.len()];

        for i in 0..imp_list.len() {
            for j in i + 1..imp_list.len() {
                if let Some(m) = try_merge(imp_list[i], imp_list[j]) {
                    merged.insert(m);
                    used[i] = true;
                    used[j] = true;
                }
            }
        }

        for (imp, used) in imp_list.iter().zip(used) {
            if !used {
                prime_set.insert(*imp);
            }
        }

        current = merged;
    }

    // Cover selection walks primes in this order, so fix it: widest
    // mask first, then highest value.
    let mut primes: Vec<Implicant> = prime_set.into_iter().collect();
    primes.sort_by(|a, b| b.mask.cmp(&a.mask).then(b.value.cmp(&a.value)));
    primes
}

// Merge two implicants covering the same variables and differing in
// exactly one polarity, dropping that variable to don't-care.
fn try_merge(a: Implicant, b: Implicant) -> Option<Implicant> {
    if a.mask != b.mask {
        return None;
    }
    let diff = (a.value ^ b.value) & a.mask;
    if diff == 0 || diff & (diff - 1) != 0 {
        return None;
    }
    Some(Implicant {
        value: a.value & !diff,
        mask: a.mask & !diff,
    })
}

// Select a minimum set of primes covering every minterm: essential
// primes first (sole coverer of some minterm), then greedy selection
// by uncovered count, earliest prime winning ties.
fn minimum_cover(primes: &[Implicant], minterms: &[u64], num_vars: usize) -> Vec<Implicant> {
    if primes.is_empty() {
        return Vec::new();
    }

    // covers[p] = indices of minterms covered by primes[p]; None once
    // the prime has been selected.
    let mut covers: Vec<Option<Vec<usize>>> = primes
        .iter()
        .map(|p| {
            let mut expanded = BTreeSet::new();
            expand_minterms(*p, num_vars, &mut expanded);
            Some(
                minterms
                    .iter()
                    .enumerate()
                    .filter(|(_, m)| expanded.contains(m))
                    .map(|(i, _)| i)
                    .collect(),
            )
        })
        .collect();

    let mut uncovered = vec![true; minterms.len()];
    let mut uncovered_count = minterms.len();
    let mut selected = Vec::new();

    let take = |pi: usize,
                    covers: &mut Vec<Option<Vec<usize>>>,
                    uncovered: &mut Vec<bool>,
                    uncovered_count: &mut usize,
                    selected: &mut Vec<Implicant>| {
        for &mi in covers[pi].as_ref().unwrap().iter() {
            if uncovered[mi] {
                uncovered[mi] = false;
                *uncovered_count -= 1;
            }
        }
        selected.push(primes[pi]);
        covers[pi] = None;
    };

    // Phase 1: essential primes. Newly-covered minterms can make other
    // primes essential, so iterate to a fixed point.
    let mut changed = true;
    while changed {
        changed = false;
        for mi in 0..minterms.len() {
            if !uncovered[mi] {
                continue;
            }
            let mut sole = None;
            for (pi, cover) in covers.iter().enumerate() {
                if let Some(cover) = cover {
                    if cover.contains(&mi) {
                        if sole.is_some() {
                            sole = None;
                            break;
                        }
                        sole = Some(pi);
                    }
                }
            }
            if let Some(pi) = sole {
                take(
                    pi,
                    &mut covers,
                    &mut uncovered,
                    &mut uncovered_count,
                    &mut selected,
                );
                changed = true;
            }
        }
    }

    // Phase 2: greedy cover of the residue.
    while uncovered_count > 0 {
        let mut best_pi = None;
        let mut best_count = 0;
        for (pi, cover) in covers.iter().enumerate() {
            if let Some(cover) = cover {
                let count = cover.iter().filter(|&&mi| uncovered[mi]).count();
                if count > best_count {
                    best_count = count;
                    best_pi = Some(pi);
                }
            }
        }
        match best_pi {
            Some(pi) => take(
                pi,
                &mut covers,
                &mut uncovered,
                &mut uncovered_count,
                &mut selected,
            ),
            None => break,
        }
    }

    selected
}

fn implicants_to_terms(imps: &[Implicant], vars: &[String]) -> Vec<Term> {
    imps.iter()
        .map(|imp| Term {
            lits: vars
                .iter()
                .enumerate()
                .filter(|(i, _)| imp.mask & (1u64 << i) != 0)
                .map(|(i, name)| Literal {
                    name: name.clone(),
                    neg: imp.value & (1u64 << i) == 0,
                })
                .collect(),
        })
        .collect()
}
