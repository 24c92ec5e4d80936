//
// ast.rs: Parsed design representation
//
// 'Content' is the output of the surface parser and the input to the
// compiler: device string, metadata, pin assignments, bit fields and
// the equation list. Expressions are a closed sum type; every later
// pass pattern-matches on it.
//

use std::collections::HashMap;

use crate::errors::ErrorCode;

#[derive(Debug)]
pub struct Content {
    pub device: String,
    // Header metadata (Name, Partno, Revision, ...), keyed by
    // canonical capitalised key.
    pub meta: HashMap<String, String>,
    pub pins: HashMap<usize, PinDef>,
    pub fields: HashMap<String, Field>,
    pub eqns: Vec<Equation>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PinDef {
    pub name: String,
    pub active_low: bool,
}

// A named, ordered list of bits. The declaration order is user-space
// MSB-first; bits whose names carry a numeric suffix also record it,
// which defines the projection from user-space integer values to the
// on-chip bit ordering.
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    pub name: String,
    pub bits: Vec<FieldBit>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldBit {
    pub name: String,
    pub bit_number: Option<u32>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Equation {
    pub line_num: u32,
    pub lhs: String,
    pub expr: Expr,
    pub append: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Const(bool),
    Ident(String),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Xor(Box<Expr>, Box<Expr>),
    // F:value with a care mask; mask bit 0 makes the value bit
    // don't-care (an 'X' digit in the source).
    FieldEquality {
        field: String,
        value: u64,
        mask: u64,
    },
    // F:[lo..hi], inclusive on both ends.
    FieldRange {
        field: String,
        lo: u64,
        hi: u64,
    },
    // A bracket set like [a3..a0]; expands positionally in set/bus
    // operations.
    IdentList(Vec<String>),
}

// Equation left-hand sides: optional '!' for active-low, optional
// suffix selecting the OLMC path the equation drives.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Suffix {
    None,
    // .T: tristate data.
    T,
    // .R (or .D): registered.
    R,
    // .E (or .OE): output enable.
    E,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Lhs {
    pub name: String,
    pub neg: bool,
    pub suffix: Suffix,
}

impl Lhs {
    pub fn parse(lhs: &str) -> Result<Lhs, ErrorCode> {
        let mut s = lhs.trim();
        let mut neg = false;
        if let Some(rest) = s.strip_prefix('!') {
            neg = true;
            s = rest.trim();
        }
        if s.is_empty() {
            return Err(ErrorCode::BadToken {
                text: lhs.to_string(),
            });
        }

        let mut suffix = Suffix::None;
        if let Some(idx) = s.find('.') {
            let ext = s[idx + 1..].to_ascii_uppercase();
            suffix = match ext.as_str() {
                "T" => Suffix::T,
                "R" | "D" => Suffix::R,
                "E" | "OE" => Suffix::E,
                _ => return Err(ErrorCode::BadSuffix { text: ext }),
            };
            s = &s[..idx];
        }

        Ok(Lhs {
            name: s.to_string(),
            neg,
            suffix,
        })
    }
}

// AR and SP are global signals on the 22V10, not pins.
pub fn is_global_signal(name: &str) -> bool {
    name.eq_ignore_ascii_case("AR") || name.eq_ignore_ascii_case("SP")
}
