//
// lower.rs: Expression lowering
//
// Normalizes the parsed expression tree ahead of DNF synthesis: alias
// substitution (with cycle detection), negation pushdown to NNF via
// De Morgan, XOR/XNOR rewriting, expansion of field equality and field
// ranges into product terms, and the set/bus desugaring that turns a
// field-valued equation into one equation per bit.
//

use std::collections::{HashMap, HashSet};

use crate::ast::{Content, Equation, Expr, Field};
use crate::dnf::{Literal, Term};
use crate::errors::{at_line, Error, ErrorCode};

////////////////////////////////////////////////////////////////////////
// NNF conversion
//

// Rewrite an expression to negation normal form, substituting aliases
// at their use sites. 'neg' tracks a pending negation being pushed
// down; 'visiting' holds the alias names on the current substitution
// path so that cycles are reported rather than recursed into.
pub fn to_nnf(
    expr: &Expr,
    neg: bool,
    aliases: &HashMap<String, Expr>,
    visiting: &mut HashSet<String>,
) -> Result<Expr, ErrorCode> {
    match expr {
        Expr::Const(value) => Ok(Expr::Const(*value != neg)),
        Expr::Ident(name) => {
            if let Some(alias) = aliases.get(name) {
                if !visiting.insert(name.clone()) {
                    return Err(ErrorCode::CyclicAlias { name: name.clone() });
                }
                let out = to_nnf(alias, neg, aliases, visiting);
                visiting.remove(name);
                return out;
            }
            if neg {
                Ok(Expr::Not(Box::new(expr.clone())))
            } else {
                Ok(expr.clone())
            }
        }
        // Field selectors stay as leaves; DNF synthesis expands them,
        // honouring any remaining negation.
        Expr::FieldEquality { .. } | Expr::FieldRange { .. } => {
            if neg {
                Ok(Expr::Not(Box::new(expr.clone())))
            } else {
                Ok(expr.clone())
            }
        }
        Expr::Not(inner) => to_nnf(inner, !neg, aliases, visiting),
        Expr::And(a, b) => {
            let left = to_nnf(a, neg, aliases, visiting)?;
            let right = to_nnf(b, neg, aliases, visiting)?;
            if neg {
                Ok(Expr::Or(Box::new(left), Box::new(right)))
            } else {
                Ok(Expr::And(Box::new(left), Box::new(right)))
            }
        }
        Expr::Or(a, b) => {
            let left = to_nnf(a, neg, aliases, visiting)?;
            let right = to_nnf(b, neg, aliases, visiting)?;
            if neg {
                Ok(Expr::And(Box::new(left), Box::new(right)))
            } else {
                Ok(Expr::Or(Box::new(left), Box::new(right)))
            }
        }
        Expr::Xor(a, b) => {
            // XOR(a,b)  -> (a & !b) # (!a & b)
            // XNOR(a,b) -> (a & b)  # (!a & !b)
            let (left, right) = if neg {
                (
                    Expr::And(a.clone(), b.clone()),
                    Expr::And(
                        Box::new(Expr::Not(a.clone())),
                        Box::new(Expr::Not(b.clone())),
                    ),
                )
            } else {
                (
                    Expr::And(a.clone(), Box::new(Expr::Not(b.clone()))),
                    Expr::And(Box::new(Expr::Not(a.clone())), b.clone()),
                )
            };
            let left = to_nnf(&left, false, aliases, visiting)?;
            let right = to_nnf(&right, false, aliases, visiting)?;
            Ok(Expr::Or(Box::new(left), Box::new(right)))
        }
        // Bracket sets only make sense on the RHS of a set equation,
        // where desugaring has already consumed them.
        Expr::IdentList(_) => Err(ErrorCode::UnsupportedExpression),
    }
}

////////////////////////////////////////////////////////////////////////
// Field projection
//

// Project a user-space value through the field's bit numbering. Fields
// whose bits all carry numeric positions reorder user-space bits into
// the on-chip (declaration) order, MSB first; unnumbered fields use
// the natural order, clamped to the field width.
pub fn project_value(field: &Field, value: u64) -> u64 {
    let width = field.bits.len();
    if width == 0 {
        return 0;
    }
    if !field.bits.iter().all(|bit| bit.bit_number.is_some()) {
        return value & width_mask(width);
    }
    let mut out = 0u64;
    for bit in field.bits.iter() {
        out <<= 1;
        if (value >> bit.bit_number.unwrap()) & 1 == 1 {
            out |= 1;
        }
    }
    out
}

pub fn width_mask(width: usize) -> u64 {
    if width >= 64 {
        !0
    } else {
        (1u64 << width) - 1
    }
}

////////////////////////////////////////////////////////////////////////
// Field equality expansion
//

// F:value is a single product term: one literal per care bit, negated
// where the value bit is 0.
pub fn field_equality_terms(
    field: &Field,
    value: u64,
    mask: u64,
) -> Result<Vec<Term>, ErrorCode> {
    let width = check_width(field)?;
    let proj_value = project_value(field, value);
    let proj_mask = project_value(field, mask);

    let mut lits = Vec::new();
    for (i, bit) in field.bits.iter().enumerate() {
        let bit_pos = width - 1 - i; // declaration order is MSB first
        if (proj_mask >> bit_pos) & 1 == 0 {
            continue;
        }
        lits.push(Literal {
            name: bit.name.clone(),
            neg: (proj_value >> bit_pos) & 1 == 0,
        });
    }
    Ok(vec![Term { lits }])
}

// !(F:value): De Morgan over the single AND term gives an OR of
// single-literal terms, one per care bit, each with the bit flipped.
pub fn field_equality_terms_neg(
    field: &Field,
    value: u64,
    mask: u64,
) -> Result<Vec<Term>, ErrorCode> {
    let width = check_width(field)?;
    let proj_value = project_value(field, value);
    let proj_mask = project_value(field, mask);

    let mut terms = Vec::new();
    for (i, bit) in field.bits.iter().enumerate() {
        let bit_pos = width - 1 - i;
        if (proj_mask >> bit_pos) & 1 == 0 {
            continue;
        }
        terms.push(Term {
            lits: vec![Literal {
                name: bit.name.clone(),
                neg: (proj_value >> bit_pos) & 1 == 1,
            }],
        });
    }
    Ok(terms)
}

////////////////////////////////////////////////////////////////////////
// Field range expansion
//

// F:[lo..hi] covers the inclusive integer interval. The interval is
// projected through the field's bit numbering and decomposed into
// cubes; negation instead covers the complement ranges around it.
pub fn field_range_terms(
    field: &Field,
    lo: u64,
    hi: u64,
    negated: bool,
) -> Result<Vec<Term>, ErrorCode> {
    let width = check_width(field)?;
    let mut proj_lo = project_value(field, lo);
    let mut proj_hi = project_value(field, hi);
    if proj_lo > proj_hi {
        std::mem::swap(&mut proj_lo, &mut proj_hi);
    }
    let max_value = width_mask(width);

    let mut ranges = Vec::new();
    if !negated {
        ranges.push((proj_lo, proj_hi));
    } else {
        if proj_lo > 0 {
            ranges.push((0, proj_lo - 1));
        }
        if proj_hi < max_value {
            ranges.push((proj_hi + 1, max_value));
        }
    }

    let mut out = Vec::new();
    for (range_lo, range_hi) in ranges {
        for cube in range_to_cubes(range_lo, range_hi, width) {
            let mut lits = Vec::new();
            for bit in 0..width {
                if (cube.mask >> bit) & 1 == 0 {
                    continue;
                }
                // Cube bit 0 is the field's LSB, i.e. the last
                // declared bit.
                let idx = width - 1 - bit;
                lits.push(Literal {
                    name: field.bits[idx].name.clone(),
                    neg: (cube.value >> bit) & 1 == 0,
                });
            }
            out.push(Term { lits });
        }
    }
    Ok(out)
}

fn check_width(field: &Field) -> Result<usize, ErrorCode> {
    if field.bits.is_empty() {
        return Err(ErrorCode::EmptyField {
            name: field.name.clone(),
        });
    }
    Ok(field.bits.len())
}

// A contiguous run of integers expressed as (mask, value): mask bits
// are care, the rest range over all combinations.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cube {
    pub mask: u64,
    pub value: u64,
}

// Decompose [lo, hi] into a minimal cube list by repeatedly taking the
// largest naturally-aligned power-of-two block at lo: block size is
// the smaller of the largest power of two <= the remaining count and,
// when lo is non-zero, lo's lowest set bit.
pub fn range_to_cubes(lo: u64, hi: u64, width: usize) -> Vec<Cube> {
    let mut lo = lo;
    let mut out = Vec::new();
    while lo <= hi {
        let block_size = max_block_size(lo, hi);
        let k = block_size.trailing_zeros();
        let mut mask = width_mask(width);
        if k > 0 {
            mask &= !((1u64 << k) - 1);
        }
        out.push(Cube { mask, value: lo });
        match lo.checked_add(block_size) {
            Some(next) if next <= hi => lo = next,
            _ => break,
        }
    }
    out
}

fn max_block_size(lo: u64, hi: u64) -> u64 {
    // The remaining count hi - lo + 1 can overflow when the range
    // spans the whole 64-bit space, so work with the span.
    let span = hi - lo;
    let max_pow = if span == u64::MAX {
        1u64 << 63
    } else {
        // Largest power of two <= span + 1.
        1u64 << (63 - (span + 1).leading_zeros())
    };
    if lo == 0 {
        return max_pow;
    }
    let lsb = lo & lo.wrapping_neg();
    lsb.min(max_pow)
}

////////////////////////////////////////////////////////////////////////
// Set/bus desugaring
//

// Expand equations whose LHS is a field name (or a bracket vector)
// into one equation per bit, broadcasting the RHS bitwise.
pub fn desugar_set_equations(content: &Content) -> Result<Vec<Equation>, Error> {
    let mut out = Vec::new();
    for eqn in content.eqns.iter() {
        let mut lhs = eqn.lhs.trim();
        let mut neg_prefix = "";
        if let Some(rest) = lhs.strip_prefix('!') {
            neg_prefix = "!";
            lhs = rest.trim();
        }

        let target = if let Some(field) = content.fields.get(lhs) {
            Some(field.clone())
        } else if lhs.starts_with('[') {
            // An anonymous vector LHS acts as an unnumbered field.
            let bits = at_line(eqn.line_num, crate::parser::parse_ident_vector(lhs))?
                .into_iter()
                .map(|name| crate::ast::FieldBit {
                    name,
                    bit_number: None,
                })
                .collect();
            Some(Field {
                name: lhs.to_string(),
                bits,
            })
        } else {
            None
        };

        match target {
            None => out.push(eqn.clone()),
            Some(field) => {
                let width = field.bits.len();
                let bit_exprs = expr_to_bit_exprs(&eqn.expr, width, &content.fields);
                for (bit, expr) in field.bits.iter().zip(bit_exprs) {
                    out.push(Equation {
                        line_num: eqn.line_num,
                        lhs: format!("{}{}", neg_prefix, bit.name),
                        expr,
                        append: eqn.append,
                    });
                }
            }
        }
    }
    Ok(out)
}

// Break an expression into per-bit expressions for a field of the
// given width: the logic operators recurse bitwise, a field or vector
// of matching width expands positionally, and anything else is a
// scalar broadcast to every bit.
fn expr_to_bit_exprs(expr: &Expr, width: usize, fields: &HashMap<String, Field>) -> Vec<Expr> {
    match expr {
        Expr::And(a, b) => zip_bitwise(a, b, width, fields, |l, r| {
            Expr::And(Box::new(l), Box::new(r))
        }),
        Expr::Or(a, b) => zip_bitwise(a, b, width, fields, |l, r| {
            Expr::Or(Box::new(l), Box::new(r))
        }),
        Expr::Xor(a, b) => zip_bitwise(a, b, width, fields, |l, r| {
            Expr::Xor(Box::new(l), Box::new(r))
        }),
        Expr::Not(inner) => expr_to_bit_exprs(inner, width, fields)
            .into_iter()
            .map(|e| Expr::Not(Box::new(e)))
            .collect(),
        Expr::Ident(name) => {
            if let Some(field) = fields.get(name) {
                if field.bits.len() == width {
                    return field
                        .bits
                        .iter()
                        .map(|bit| Expr::Ident(bit.name.clone()))
                        .collect();
                }
            }
            vec![expr.clone(); width]
        }
        Expr::IdentList(names) => {
            if names.len() == width {
                names.iter().map(|name| Expr::Ident(name.clone())).collect()
            } else {
                vec![expr.clone(); width]
            }
        }
        _ => vec![expr.clone(); width],
    }
}

fn zip_bitwise<F>(
    a: &Expr,
    b: &Expr,
    width: usize,
    fields: &HashMap<String, Field>,
    combine: F,
) -> Vec<Expr>
where
    F: Fn(Expr, Expr) -> Expr,
{
    let left = expr_to_bit_exprs(a, width, fields);
    let right = expr_to_bit_exprs(b, width, fields);
    left.into_iter()
        .zip(right)
        .map(|(l, r)| combine(l, r))
        .collect()
}
