//
// dnf.rs: Sum-of-products synthesis
//
// Converts an NNF expression into a list of product terms whose OR is
// equivalent to it. Terms are symbolic (named literals); mapping to
// pins happens later in the blueprint.
//

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::ast::{Expr, Field};
use crate::errors::ErrorCode;
use crate::lower;

// A possibly-negated reference to a named signal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Literal {
    pub name: String,
    pub neg: bool,
}

// A conjunction of literals. The empty term is TRUE.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Term {
    pub lits: Vec<Literal>,
}

// Lower an expression all the way to product terms: NNF first, then
// DNF expansion. An empty result is the FALSE function.
pub fn expr_to_terms(
    expr: &Expr,
    fields: &HashMap<String, Field>,
    aliases: &HashMap<String, Expr>,
) -> Result<Vec<Term>, ErrorCode> {
    let nnf = lower::to_nnf(expr, false, aliases, &mut HashSet::new())?;
    dnf(&nnf, fields)
}

fn dnf(expr: &Expr, fields: &HashMap<String, Field>) -> Result<Vec<Term>, ErrorCode> {
    match expr {
        Expr::Const(true) => Ok(vec![Term::default()]),
        Expr::Const(false) => Ok(Vec::new()),
        Expr::Ident(name) => Ok(vec![Term {
            lits: vec![Literal {
                name: name.clone(),
                neg: false,
            }],
        }]),
        // NNF leaves negation only directly over leaves.
        Expr::Not(inner) => match inner.as_ref() {
            Expr::Ident(name) => Ok(vec![Term {
                lits: vec![Literal {
                    name: name.clone(),
                    neg: true,
                }],
            }]),
            Expr::FieldRange { field, lo, hi } => {
                lower::field_range_terms(lookup_field(fields, field)?, *lo, *hi, true)
            }
            Expr::FieldEquality { field, value, mask } => {
                lower::field_equality_terms_neg(lookup_field(fields, field)?, *value, *mask)
            }
            _ => Err(ErrorCode::BadNegation),
        },
        Expr::FieldRange { field, lo, hi } => {
            lower::field_range_terms(lookup_field(fields, field)?, *lo, *hi, false)
        }
        Expr::FieldEquality { field, value, mask } => {
            lower::field_equality_terms(lookup_field(fields, field)?, *value, *mask)
        }
        Expr::And(a, b) => {
            let left = dnf(a, fields)?;
            let right = dnf(b, fields)?;
            Ok(and_dnf(&left, &right))
        }
        Expr::Or(a, b) => {
            let mut left = dnf(a, fields)?;
            let mut right = dnf(b, fields)?;
            left.append(&mut right);
            Ok(left)
        }
        _ => Err(ErrorCode::UnsupportedExpression),
    }
}

fn lookup_field<'a>(
    fields: &'a HashMap<String, Field>,
    name: &str,
) -> Result<&'a Field, ErrorCode> {
    fields.get(name).ok_or_else(|| ErrorCode::UnknownField {
        name: name.to_string(),
    })
}

// Cross-product of two sums: AND distributes over OR, with
// contradictory pairings dropped.
fn and_dnf(a: &[Term], b: &[Term]) -> Vec<Term> {
    let mut out = Vec::new();
    for term_b in b.iter() {
        for term_a in a.iter() {
            if let Some(merged) = merge_terms(term_a, term_b) {
                out.push(merged);
            }
        }
    }
    out
}

// Union of the two literal sets, keyed by name. A variable appearing
// with both polarities makes the conjunction FALSE, so the merged term
// is dropped. Literals come out sorted by name for determinism.
pub fn merge_terms(a: &Term, b: &Term) -> Option<Term> {
    let mut by_name: BTreeMap<&str, bool> = BTreeMap::new();
    for lit in a.lits.iter().chain(b.lits.iter()) {
        match by_name.insert(lit.name.as_str(), lit.neg) {
            Some(prev) if prev != lit.neg => return None,
            _ => {}
        }
    }
    Some(Term {
        lits: by_name
            .into_iter()
            .map(|(name, neg)| Literal {
                name: name.to_string(),
                neg,
            })
            .collect(),
    })
}
