//
// parser.rs: Input parser
//
// Read WinCUPL-style source and convert it to a 'Content' structure
// which feeds the rest of the pipeline. Statements are ';'-separated;
// comments are stripped up front with newlines preserved so that
// reported line numbers match the original text. We try to leave all
// semantic checks to later stages.
//

use std::collections::HashMap;

use crate::ast::{Content, Equation, Expr, Field, FieldBit, PinDef};
use crate::errors::{at_line, Error, ErrorCode};

////////////////////////////////////////////////////////////////////////
// Top-level entry point
//

pub fn parse(src: &str) -> Result<Content, Error> {
    let text = strip_comments(src);
    let line_starts = line_starts(&text);

    let mut content = Content {
        device: String::new(),
        meta: HashMap::new(),
        pins: HashMap::new(),
        fields: HashMap::new(),
        eqns: Vec::new(),
    };

    for stmt in split_statements(&text) {
        let body = stmt.text.trim();
        if body.is_empty() {
            continue;
        }
        // Report the line of the first non-blank character.
        let skip = stmt.text.len() - stmt.text.trim_start().len();
        let line = line_of_offset(&line_starts, stmt.offset + skip);
        at_line(line, parse_statement(&mut content, body, line))?;
    }

    Ok(content)
}

const META_KEYS: [&str; 9] = [
    "NAME", "PARTNO", "REVISION", "DATE", "DESIGNER", "COMPANY", "LOCATION", "ASSEMBLY", "DEVICE",
];

fn parse_statement(content: &mut Content, stmt: &str, line: u32) -> Result<(), ErrorCode> {
    let upper = stmt.to_ascii_uppercase();
    let first_word = upper.split_whitespace().next().unwrap_or("");

    if let Some(key) = META_KEYS.iter().find(|k| **k == first_word) {
        let value = stmt[key.len()..].trim().to_string();
        if *key == "DEVICE" {
            content.device = value;
        } else {
            // Canonical form: leading capital, rest lowercase.
            let canonical = format!("{}{}", &key[..1], key[1..].to_ascii_lowercase());
            content.meta.insert(canonical, value);
        }
        return Ok(());
    }

    match first_word {
        "PIN" => parse_pin(content, stmt["PIN".len()..].trim()),
        "FIELD" => parse_field(content, stmt["FIELD".len()..].trim()),
        "APPEND" => parse_equation(content, stmt["APPEND".len()..].trim(), line, true),
        _ => parse_equation(content, stmt, line, false),
    }
}

////////////////////////////////////////////////////////////////////////
// Pin and field declarations
//

// Two forms:
//   PIN 1 = !csel
//   PIN [1,2,3] = [a2..a0]
fn parse_pin(content: &mut Content, body: &str) -> Result<(), ErrorCode> {
    let (lhs, rhs) = split_equals(body)?;

    if lhs.starts_with('[') {
        let pins = parse_int_list(lhs)?;
        let names = parse_ident_vector(rhs)?;
        if pins.len() != names.len() {
            return Err(ErrorCode::BadPinList {
                pins: pins.len(),
                sigs: names.len(),
            });
        }
        for (pin, name) in pins.into_iter().zip(names) {
            declare_pin(content, pin, name, false)?;
        }
        return Ok(());
    }

    let pin = lhs.parse::<usize>().map_err(|_| ErrorCode::BadPin)?;
    let mut name = rhs.trim();
    let mut active_low = false;
    if let Some(rest) = name.strip_prefix('!') {
        active_low = true;
        name = rest.trim();
    }
    if name.is_empty() || !name.chars().next().unwrap().is_ascii_alphabetic() {
        return Err(ErrorCode::BadPin);
    }
    declare_pin(content, pin, name.to_string(), active_low)
}

fn declare_pin(
    content: &mut Content,
    pin: usize,
    name: String,
    active_low: bool,
) -> Result<(), ErrorCode> {
    if content.pins.values().any(|def| def.name == name) {
        return Err(ErrorCode::RepeatedPinName { name });
    }
    content.pins.insert(pin, PinDef { name, active_low });
    Ok(())
}

// FIELD addr = [a15..a0]
fn parse_field(content: &mut Content, body: &str) -> Result<(), ErrorCode> {
    let (lhs, rhs) = split_equals(body)?;
    let name = lhs.trim();
    if name.is_empty() {
        return Err(ErrorCode::BadToken {
            text: body.to_string(),
        });
    }
    let bits = parse_ident_vector(rhs)?
        .into_iter()
        .map(|bit_name| {
            let bit_number = split_ident_number(&bit_name).map(|(_, n)| n);
            FieldBit {
                name: bit_name,
                bit_number,
            }
        })
        .collect();
    content.fields.insert(
        name.to_string(),
        Field {
            name: name.to_string(),
            bits,
        },
    );
    Ok(())
}

fn parse_equation(
    content: &mut Content,
    stmt: &str,
    line: u32,
    append: bool,
) -> Result<(), ErrorCode> {
    let (lhs, rhs) = split_equals(stmt)?;
    if lhs.is_empty() || rhs.is_empty() {
        return Err(ErrorCode::BadEOL);
    }
    let mut lexer = Lexer::new(rhs);
    let expr = parse_expr(&mut lexer)?;
    let trailing = lexer.next()?;
    if trailing.kind != TokenKind::Eof {
        return Err(ErrorCode::BadToken {
            text: trailing.text,
        });
    }
    content.eqns.push(Equation {
        line_num: line,
        lhs: lhs.to_string(),
        expr,
        append,
    });
    Ok(())
}

fn split_equals(s: &str) -> Result<(&str, &str), ErrorCode> {
    match s.find('=') {
        Some(idx) => Ok((s[..idx].trim(), s[idx + 1..].trim())),
        None => Err(ErrorCode::NoEquals),
    }
}

////////////////////////////////////////////////////////////////////////
// Bracket vectors: [a3..a0], [a0..3], [x, y, z], [1, 2, 3]
//

pub fn parse_int_list(s: &str) -> Result<Vec<usize>, ErrorCode> {
    let inner = bracket_inner(s)?;
    inner
        .split(',')
        .map(|part| {
            part.trim().parse::<usize>().map_err(|_| ErrorCode::BadToken {
                text: part.trim().to_string(),
            })
        })
        .collect()
}

pub fn parse_ident_vector(s: &str) -> Result<Vec<String>, ErrorCode> {
    let inner = bracket_inner(s)?;
    if let Some(idx) = inner.find("..") {
        return expand_ident_range(inner[..idx].trim(), inner[idx + 2..].trim());
    }
    let names: Vec<String> = inner
        .split(',')
        .map(|part| part.trim().to_string())
        .collect();
    if names.iter().any(|n| n.is_empty()) {
        return Err(ErrorCode::BadToken {
            text: inner.to_string(),
        });
    }
    Ok(names)
}

fn bracket_inner(s: &str) -> Result<&str, ErrorCode> {
    let s = s.trim();
    if !s.starts_with('[') || !s.ends_with(']') {
        return Err(ErrorCode::BadBrackets);
    }
    Ok(s[1..s.len() - 1].trim())
}

// Expand "a15..a0" (or the short form "a15..0") into the individual
// bit names, preserving the declared direction.
fn expand_ident_range(start: &str, end: &str) -> Result<Vec<String>, ErrorCode> {
    let (prefix, lo) = split_ident_number(start).ok_or_else(|| ErrorCode::BadToken {
        text: start.to_string(),
    })?;
    let hi = match split_ident_number(end) {
        Some((end_prefix, n)) => {
            if end_prefix != prefix {
                return Err(ErrorCode::BadToken {
                    text: end.to_string(),
                });
            }
            n
        }
        None => end.parse::<u32>().map_err(|_| ErrorCode::BadToken {
            text: end.to_string(),
        })?,
    };

    let mut names = Vec::new();
    if lo <= hi {
        for i in lo..=hi {
            names.push(format!("{}{}", prefix, i));
        }
    } else {
        for i in (hi..=lo).rev() {
            names.push(format!("{}{}", prefix, i));
        }
    }
    Ok(names)
}

// Split a trailing decimal suffix off an identifier: "a15" -> ("a", 15).
pub fn split_ident_number(s: &str) -> Option<(&str, u32)> {
    let idx = s.find(|c: char| c.is_ascii_digit())?;
    let n = s[idx..].parse::<u32>().ok()?;
    Some((&s[..idx], n))
}

////////////////////////////////////////////////////////////////////////
// Number literals
//
// CUPL base-quoted form 'b'01X1, 'o'77, 'd'12, 'h'FA, where X marks a
// don't-care digit (zero mask for that digit's bits) and underscores
// are ignored. Bare digit strings default to decimal, or hexadecimal
// when they contain hex letters.

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Number {
    pub value: u64,
    pub mask: u64,
}

pub fn parse_number(text: &str) -> Result<Number, ErrorCode> {
    let bad = || ErrorCode::BadNumber {
        text: text.to_string(),
    };
    let cleaned: String = text.chars().filter(|c| *c != '_').collect();

    let (digits, base) = if let Some(rest) = cleaned.strip_prefix('\'') {
        let mut chars = rest.chars();
        let base = match chars.next().map(|c| c.to_ascii_lowercase()) {
            Some('b') => 2,
            Some('o') => 8,
            Some('d') => 10,
            Some('h') => 16,
            _ => return Err(bad()),
        };
        let rest = chars.as_str();
        let digits = rest.strip_prefix('\'').ok_or_else(bad)?;
        (digits.to_string(), base)
    } else if let Some(rest) = cleaned
        .strip_prefix("0x")
        .or_else(|| cleaned.strip_prefix("0X"))
    {
        (rest.to_string(), 16)
    } else if cleaned.chars().any(|c| c.is_ascii_hexdigit() && !c.is_ascii_digit()) {
        (cleaned.clone(), 16)
    } else {
        (cleaned.clone(), 10)
    };

    if digits.is_empty() {
        return Err(bad());
    }

    // Decimal carries no per-digit bit width, so X digits are only
    // meaningful in the power-of-two bases.
    if base == 10 {
        let value = digits.parse::<u64>().map_err(|_| bad())?;
        return Ok(Number { value, mask: !0 });
    }

    let bits_per_digit = match base {
        2 => 1,
        8 => 3,
        16 => 4,
        _ => unreachable!(),
    };

    let mut value: u64 = 0;
    let mut mask: u64 = !0;
    for c in digits.chars() {
        let digit_mask;
        let digit_value;
        if c == 'X' || c == 'x' {
            digit_value = 0;
            digit_mask = 0;
        } else {
            digit_value = c.to_digit(base).ok_or_else(bad)? as u64;
            digit_mask = (1 << bits_per_digit) - 1;
        }
        value = (value << bits_per_digit) | digit_value;
        mask = (mask << bits_per_digit) | digit_mask;
    }

    Ok(Number { value, mask })
}

////////////////////////////////////////////////////////////////////////
// Expression lexer
//

#[derive(Clone, Copy, Debug, PartialEq)]
enum TokenKind {
    Eof,
    Ident,
    Number,
    Not,
    And,
    Or,
    Xor,
    LParen,
    RParen,
    Colon,
    LBrack,
    RBrack,
    DotDot,
    Comma,
}

#[derive(Clone, Debug)]
struct Token {
    kind: TokenKind,
    text: String,
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    peeked: Option<Token>,
}

impl<'a> Lexer<'a> {
    fn new(s: &'a str) -> Lexer<'a> {
        Lexer {
            chars: s.chars().peekable(),
            peeked: None,
        }
    }

    fn peek(&mut self) -> Result<Token, ErrorCode> {
        if self.peeked.is_none() {
            self.peeked = Some(self.lex()?);
        }
        Ok(self.peeked.clone().unwrap())
    }

    fn next(&mut self) -> Result<Token, ErrorCode> {
        match self.peeked.take() {
            Some(tok) => Ok(tok),
            None => self.lex(),
        }
    }

    fn lex(&mut self) -> Result<Token, ErrorCode> {
        while matches!(self.chars.peek(), Some(c) if c.is_whitespace()) {
            self.chars.next();
        }

        let c = match self.chars.peek().cloned() {
            None => return Ok(self.simple(TokenKind::Eof, "")),
            Some(c) => c,
        };

        match c {
            '!' => self.take(TokenKind::Not),
            '&' => self.take(TokenKind::And),
            '#' | '|' => self.take(TokenKind::Or),
            '$' => self.take(TokenKind::Xor),
            '(' => self.take(TokenKind::LParen),
            ')' => self.take(TokenKind::RParen),
            ':' => self.take(TokenKind::Colon),
            '[' => self.take(TokenKind::LBrack),
            ']' => self.take(TokenKind::RBrack),
            ',' => self.take(TokenKind::Comma),
            '.' => {
                self.chars.next();
                if self.chars.peek() == Some(&'.') {
                    self.chars.next();
                    Ok(self.simple(TokenKind::DotDot, ".."))
                } else {
                    Err(ErrorCode::BadChar { c: '.' })
                }
            }
            '\'' => self.lex_quoted_number(),
            c if c.is_ascii_alphabetic() || c == '_' => Ok(self.lex_ident()),
            c if c.is_ascii_digit() => Ok(self.lex_number()),
            c => Err(ErrorCode::BadChar { c }),
        }
    }

    fn simple(&self, kind: TokenKind, text: &str) -> Token {
        Token {
            kind,
            text: text.to_string(),
        }
    }

    fn take(&mut self, kind: TokenKind) -> Result<Token, ErrorCode> {
        let c = self.chars.next().unwrap();
        Ok(Token {
            kind,
            text: c.to_string(),
        })
    }

    fn lex_ident(&mut self) -> Token {
        let mut text = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                text.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        Token {
            kind: TokenKind::Ident,
            text,
        }
    }

    fn lex_number(&mut self) -> Token {
        let mut text = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_hexdigit() || c == 'x' || c == 'X' || c == '_' {
                text.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        Token {
            kind: TokenKind::Number,
            text,
        }
    }

    // 'b'0101 and friends: lex the whole literal as one Number token,
    // to be decoded by parse_number.
    fn lex_quoted_number(&mut self) -> Result<Token, ErrorCode> {
        let mut text = String::new();
        text.push(self.chars.next().unwrap());
        match self.chars.next() {
            Some(c) if c.is_ascii_alphabetic() => text.push(c),
            _ => return Err(ErrorCode::BadNumber { text }),
        }
        match self.chars.next() {
            Some('\'') => text.push('\''),
            _ => return Err(ErrorCode::BadNumber { text }),
        }
        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_hexdigit() || c == 'x' || c == 'X' || c == '_' {
                text.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        Ok(Token {
            kind: TokenKind::Number,
            text,
        })
    }
}

////////////////////////////////////////////////////////////////////////
// Expression parser
//
// Precedence, tightest first: ! & $ #

fn parse_expr(lexer: &mut Lexer) -> Result<Expr, ErrorCode> {
    parse_or(lexer)
}

fn parse_or(lexer: &mut Lexer) -> Result<Expr, ErrorCode> {
    let mut left = parse_xor(lexer)?;
    while lexer.peek()?.kind == TokenKind::Or {
        lexer.next()?;
        let right = parse_xor(lexer)?;
        left = Expr::Or(Box::new(left), Box::new(right));
    }
    Ok(left)
}

fn parse_xor(lexer: &mut Lexer) -> Result<Expr, ErrorCode> {
    let mut left = parse_and(lexer)?;
    while lexer.peek()?.kind == TokenKind::Xor {
        lexer.next()?;
        let right = parse_and(lexer)?;
        left = Expr::Xor(Box::new(left), Box::new(right));
    }
    Ok(left)
}

fn parse_and(lexer: &mut Lexer) -> Result<Expr, ErrorCode> {
    let mut left = parse_unary(lexer)?;
    while lexer.peek()?.kind == TokenKind::And {
        lexer.next()?;
        let right = parse_unary(lexer)?;
        left = Expr::And(Box::new(left), Box::new(right));
    }
    Ok(left)
}

fn parse_unary(lexer: &mut Lexer) -> Result<Expr, ErrorCode> {
    if lexer.peek()?.kind == TokenKind::Not {
        lexer.next()?;
        let inner = parse_unary(lexer)?;
        return Ok(Expr::Not(Box::new(inner)));
    }
    parse_primary(lexer)
}

fn parse_primary(lexer: &mut Lexer) -> Result<Expr, ErrorCode> {
    let tok = lexer.next()?;
    match tok.kind {
        TokenKind::Ident => {
            if lexer.peek()?.kind == TokenKind::Colon {
                lexer.next()?;
                return parse_field_selector(lexer, tok.text);
            }
            Ok(Expr::Ident(tok.text))
        }
        TokenKind::Number => {
            let num = parse_number(&tok.text)?;
            Ok(Expr::Const(num.value != 0))
        }
        TokenKind::LParen => {
            let inner = parse_expr(lexer)?;
            expect(lexer, TokenKind::RParen)?;
            Ok(inner)
        }
        TokenKind::LBrack => parse_bracket_set(lexer),
        _ => Err(ErrorCode::BadToken { text: tok.text }),
    }
}

// After "F:": either a single (possibly don't-care-masked) value, or
// a [lo..hi] range.
fn parse_field_selector(lexer: &mut Lexer, field: String) -> Result<Expr, ErrorCode> {
    if lexer.peek()?.kind == TokenKind::LBrack {
        lexer.next()?;
        let lo_tok = expect_numeric(lexer)?;
        expect(lexer, TokenKind::DotDot)?;
        let hi_tok = expect_numeric(lexer)?;
        expect(lexer, TokenKind::RBrack)?;
        let lo = parse_number(&lo_tok.text)?;
        let hi = parse_number(&hi_tok.text)?;
        return Ok(Expr::FieldRange {
            field,
            lo: lo.value,
            hi: hi.value,
        });
    }

    let tok = expect_numeric(lexer)?;
    let num = parse_number(&tok.text)?;
    Ok(Expr::FieldEquality {
        field,
        value: num.value,
        mask: num.mask,
    })
}

// A bracket set in expression position: [a3..a0] or [a, b, c].
fn parse_bracket_set(lexer: &mut Lexer) -> Result<Expr, ErrorCode> {
    let first = expect(lexer, TokenKind::Ident)?;

    if lexer.peek()?.kind == TokenKind::DotDot {
        lexer.next()?;
        let end = lexer.next()?;
        if end.kind != TokenKind::Ident && end.kind != TokenKind::Number {
            return Err(ErrorCode::BadToken { text: end.text });
        }
        expect(lexer, TokenKind::RBrack)?;
        return Ok(Expr::IdentList(expand_ident_range(&first.text, &end.text)?));
    }

    let mut names = vec![first.text];
    loop {
        let tok = lexer.next()?;
        match tok.kind {
            TokenKind::RBrack => break,
            TokenKind::Comma => {
                let name = expect(lexer, TokenKind::Ident)?;
                names.push(name.text);
            }
            _ => return Err(ErrorCode::BadToken { text: tok.text }),
        }
    }
    Ok(Expr::IdentList(names))
}

fn expect(lexer: &mut Lexer, kind: TokenKind) -> Result<Token, ErrorCode> {
    let tok = lexer.next()?;
    if tok.kind != kind {
        if tok.kind == TokenKind::Eof {
            return Err(ErrorCode::BadEOL);
        }
        return Err(ErrorCode::BadToken { text: tok.text });
    }
    Ok(tok)
}

// Hex values like A000 lex as identifiers, so number positions accept
// both token kinds and let parse_number decide.
fn expect_numeric(lexer: &mut Lexer) -> Result<Token, ErrorCode> {
    let tok = lexer.next()?;
    match tok.kind {
        TokenKind::Number | TokenKind::Ident => Ok(tok),
        TokenKind::Eof => Err(ErrorCode::BadEOL),
        _ => Err(ErrorCode::BadToken { text: tok.text }),
    }
}

////////////////////////////////////////////////////////////////////////
// Statement splitting
//

// Strip /* */ and // comments, keeping newlines so that offsets still
// map to the original line numbering.
fn strip_comments(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '/' && chars.peek() == Some(&'*') {
            chars.next();
            let mut prev = ' ';
            while let Some(c) = chars.next() {
                if prev == '*' && c == '/' {
                    break;
                }
                if c == '\n' {
                    out.push('\n');
                }
                prev = c;
            }
            continue;
        }
        if c == '/' && chars.peek() == Some(&'/') {
            while let Some(&c) = chars.peek() {
                if c == '\n' {
                    break;
                }
                chars.next();
            }
            continue;
        }
        out.push(c);
    }
    out
}

struct Statement<'a> {
    text: &'a str,
    offset: usize,
}

fn split_statements(s: &str) -> Vec<Statement> {
    let mut stmts = Vec::new();
    let mut start = 0;
    for (i, c) in s.char_indices() {
        if c == ';' {
            stmts.push(Statement {
                text: &s[start..i],
                offset: start,
            });
            start = i + 1;
        }
    }
    if start < s.len() {
        stmts.push(Statement {
            text: &s[start..],
            offset: start,
        });
    }
    stmts
}

fn line_starts(s: &str) -> Vec<usize> {
    let mut starts = vec![0];
    for (i, c) in s.char_indices() {
        if c == '\n' {
            starts.push(i + 1);
        }
    }
    starts
}

fn line_of_offset(line_starts: &[usize], offset: usize) -> u32 {
    match line_starts.binary_search(&offset) {
        Ok(idx) => (idx + 1) as u32,
        Err(idx) => idx as u32,
    }
}
