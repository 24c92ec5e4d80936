//
// scenario_test.rs: End-to-end compile checks at the fuse level.
//
// Each test assembles a small design and asserts against the parsed
// JEDEC output: specific fuses cleared, config sections set, and the
// checksums self-consistent.
//

use anyhow::{bail, Result};

use cuprum::assemble;

////////////////////////////////////////////////////////////////////////
// A small JEDEC reader for assertions.
//

struct Jedec {
    qf: usize,
    fuses: Vec<bool>,
    csum: u16,
}

fn parse_jedec(text: &str) -> Result<Jedec> {
    let body = text.trim_start_matches('\x02');
    let body = match body.find('\x03') {
        Some(idx) => &body[..idx],
        None => body,
    };

    let mut qf = 0usize;
    let mut csum = 0u16;
    let mut sparse: Vec<(usize, Vec<bool>)> = Vec::new();

    for line in body.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("*QF") {
            qf = rest.trim().parse()?;
        } else if let Some(rest) = line.strip_prefix("*C") {
            csum = u16::from_str_radix(rest.trim(), 16)?;
        } else if let Some(rest) = line.strip_prefix("*L") {
            let mut parts = rest.splitn(2, ' ');
            let offset: usize = parts.next().unwrap().parse()?;
            let bits = match parts.next() {
                Some(bits) => bits.trim(),
                None => bail!("L record without bits: {:?}", line),
            };
            let mut row = Vec::with_capacity(bits.len());
            for c in bits.chars() {
                match c {
                    '0' => row.push(false),
                    '1' => row.push(true),
                    _ => bail!("bad fuse digit {:?}", c),
                }
            }
            sparse.push((offset, row));
        }
    }

    if qf == 0 {
        bail!("missing *QF record");
    }
    let mut fuses = vec![false; qf];
    for (offset, row) in sparse {
        for (i, bit) in row.into_iter().enumerate() {
            fuses[offset + i] = bit;
        }
    }
    Ok(Jedec { qf, fuses, csum })
}

fn fuse_checksum(bits: &[bool]) -> u16 {
    let mut sum = 0u16;
    let mut byte = 0u8;
    let mut bit_num = 0;
    for &bit in bits {
        if bit {
            byte |= 1 << bit_num;
        }
        bit_num += 1;
        if bit_num == 8 {
            sum = sum.wrapping_add(byte as u16);
            byte = 0;
            bit_num = 0;
        }
    }
    sum.wrapping_add(byte as u16)
}

fn file_checksum_ok(text: &str) -> bool {
    let etx = match text.find('\x03') {
        Some(idx) => idx,
        None => return false,
    };
    let counted = &text.as_bytes()[..etx + 1];
    let sum = counted
        .iter()
        .fold(0u16, |sum, b| sum.wrapping_add(*b as u16));
    text[etx + 1..].trim() == format!("{:04x}", sum)
}

fn compile_jedec(src: &str) -> Result<(String, Jedec)> {
    let text = assemble(src, false, None)?;
    let jed = parse_jedec(&text)?;
    // Every emission must satisfy both checksum properties.
    assert_eq!(jed.csum, fuse_checksum(&jed.fuses), "fuse checksum");
    assert!(file_checksum_ok(&text), "file checksum");
    Ok((text, jed))
}

fn assert_row(jed: &Jedec, row: usize, cols: usize, cleared: &[usize]) {
    for col in 0..cols {
        let expected = !cleared.contains(&col);
        assert_eq!(
            jed.fuses[row * cols + col],
            expected,
            "row {} col {}",
            row,
            col
        );
    }
}

fn assert_rows_clear(jed: &Jedec, rows: std::ops::Range<usize>, cols: usize) {
    for row in rows {
        for col in 0..cols {
            assert!(!jed.fuses[row * cols + col], "row {} col {}", row, col);
        }
    }
}

// 16V8 section offsets.
const XOR16: usize = 2048;
const SIG16: usize = 2056;
const AC1_16: usize = 2120;
const PT16: usize = 2128;
const SYN16: usize = 2192;
const AC0_16: usize = 2193;

// 22V10 section offsets (XOR/AC1 interleaved).
const XORAC22: usize = 5808;
const SIG22: usize = 5828;

////////////////////////////////////////////////////////////////////////
// Scenarios
//

#[test]
fn simple_combinational_output_16v8() -> Result<()> {
    let src = "
        Device g16v8as ;
        Pin 1 = a ;
        Pin 2 = b ;
        Pin 12 = !y ;
        y = a & b ;
    ";
    let (_, jed) = compile_jedec(src)?;
    assert_eq!(jed.qf, 2194);

    // Mode fuses: simple.
    assert!(jed.fuses[SYN16]);
    assert!(!jed.fuses[AC0_16]);

    // OLMC 0 (pin 12): one product row; a is pin 1 (column 2), b is
    // pin 2 (column 0). Declared active-low, so no XOR; a used output
    // keeps AC1 low.
    assert_row(&jed, 56, 32, &[0, 2]);
    assert_rows_clear(&jed, 57..64, 32);
    assert!(!jed.fuses[XOR16 + 7]);
    assert!(!jed.fuses[AC1_16 + 7]);

    // Remaining OLMC blocks are unused and fully cleared; in simple
    // mode their cells revert to inputs (AC1 high).
    assert_rows_clear(&jed, 0..56, 32);
    for i in 0..7 {
        assert!(jed.fuses[AC1_16 + i], "AC1[{}]", i);
    }

    // Product-term mux all enabled; no signature.
    for i in 0..64 {
        assert!(jed.fuses[PT16 + i]);
        assert!(!jed.fuses[SIG16 + i]);
    }
    Ok(())
}

#[test]
fn complex_mode_polarity_hoist_16v8() -> Result<()> {
    let src = "
        Device g16v8ma ;
        Pin 15 = a ;
        Pin 12 = y ;
        y = !a ;
    ";
    let (_, jed) = compile_jedec(src)?;

    // Forced complex mode.
    assert!(jed.fuses[SYN16]);
    assert!(jed.fuses[AC0_16]);

    // The top-level negation is hoisted into polarity: the placed term
    // is plain 'a', read through pin 15's complex-mode column (18).
    // Row 56 is the OE row, left all-1s.
    assert_row(&jed, 56, 32, &[]);
    assert_row(&jed, 57, 32, &[18]);
    assert_rows_clear(&jed, 58..64, 32);

    // Hoist turned the output active-low: XOR stays 0. Combinational
    // output in complex mode is tristate: AC1 set.
    assert!(!jed.fuses[XOR16 + 7]);
    assert!(jed.fuses[AC1_16 + 7]);
    Ok(())
}

#[test]
fn field_range_on_22v10() -> Result<()> {
    let src = "
        Device g22v10 ;
        Pin 1 = a15 ;
        Pin 2 = a14 ;
        Pin 3 = a13 ;
        Pin 4 = a12 ;
        Pin 23 = cs ;
        FIELD addr = [a15..a0] ;
        cs = addr:[A000..AFFF] ;
    ";
    let (_, jed) = compile_jedec(src)?;
    assert_eq!(jed.qf, 5892);

    // A000..AFFF is the single cube 1010_XXXX_XXXX_XXXX: a15 & !a14 &
    // a13 & !a12. Pin 23's block starts at row 1; row 1 is the OE row
    // (all-1s by default), the cube lands in row 2.
    assert_row(&jed, 1, 44, &[]);
    // a15=pin1 col 0, a14=pin2 col 4 (+1 negated), a13=pin3 col 8,
    // a12=pin4 col 12 (+1 negated).
    assert_row(&jed, 2, 44, &[0, 5, 8, 13]);
    assert_rows_clear(&jed, 3..10, 44);

    // Everything else is unused, including the AR (row 0) and SP
    // (row 131) defaults.
    assert_rows_clear(&jed, 0..1, 44);
    assert_rows_clear(&jed, 10..132, 44);

    // cs is active-high and combinational: XOR=1, AC1=1 for the top
    // OLMC; every other XOR/AC1 bit stays low.
    assert!(jed.fuses[XORAC22]);
    assert!(jed.fuses[XORAC22 + 1]);
    for i in 2..20 {
        assert!(!jed.fuses[XORAC22 + i], "xor/ac1 bit {}", i);
    }

    // No Partno: signature stays blank.
    for i in 0..64 {
        assert!(!jed.fuses[SIG22 + i]);
    }
    Ok(())
}

#[test]
fn registered_active_high_feedback_flip_22v10() -> Result<()> {
    let src = "
        Device g22v10 ;
        Pin 2 = s ;
        Pin 23 = q ;
        q.D = q & s ;
    ";
    let (_, jed) = compile_jedec(src)?;

    // Registered active-high: XOR=1, AC1=0.
    assert!(jed.fuses[XORAC22]);
    assert!(!jed.fuses[XORAC22 + 1]);

    // Feedback is read pre-XOR, so the un-negated reference to q is
    // placed on its complement column: pin 23 maps to column 2, the
    // flip moves it to column 3. s is pin 2, column 4.
    assert_row(&jed, 1, 44, &[]);
    assert_row(&jed, 2, 44, &[3, 4]);
    assert_rows_clear(&jed, 3..10, 44);
    Ok(())
}

#[test]
fn global_async_reset_22v10() -> Result<()> {
    let src = "
        Device g22v10 ;
        Pin 2 = reset ;
        Pin 23 = q ;
        q.D = reset ;
        AR = reset ;
    ";
    let (_, jed) = compile_jedec(src)?;

    // AR occupies row 0: the single literal 'reset' on pin 2 (col 4).
    assert_row(&jed, 0, 44, &[4]);
    // SP (row 131) is undriven: cleared to disabled.
    assert_rows_clear(&jed, 131..132, 44);
    Ok(())
}

#[test]
fn append_ors_terms() -> Result<()> {
    let src = "
        Device g16v8as ;
        Pin 1 = a ;
        Pin 2 = b ;
        Pin 12 = y ;
        y = a ;
        APPEND y = b ;
    ";
    let (text, jed) = compile_jedec(src)?;

    // Two rows, one per appended term; 'a' and 'b' cannot merge, and
    // the no-reduction path keeps them in ascending implicant order.
    assert_row(&jed, 56, 32, &[2]);
    assert_row(&jed, 57, 32, &[0]);
    assert_rows_clear(&jed, 58..64, 32);

    // Active-high output.
    assert!(jed.fuses[XOR16 + 7]);

    // Byte-identical on recompile.
    let (text2, _) = compile_jedec(src)?;
    assert_eq!(text, text2);
    Ok(())
}

#[test]
fn quine_mccluskey_collapses_cover() -> Result<()> {
    let src = "
        Device g16v8as ;
        Pin 1 = a ;
        Pin 2 = b ;
        Pin 3 = c ;
        Pin 12 = y ;
        y = a&!b&!c # a&b&!c # a&!b&c # a&b&c ;
    ";
    let (_, jed) = compile_jedec(src)?;

    // The four minterms reduce to the single literal 'a' (pin 1,
    // column 2).
    assert_row(&jed, 56, 32, &[2]);
    assert_rows_clear(&jed, 57..64, 32);
    Ok(())
}

#[test]
fn set_equation_expands_per_bit() -> Result<()> {
    let src = "
        Device g22v10 ;
        Pin 1 = a ;
        Pin 2 = b ;
        Pin [22,23] = [q1..q0] ;
        FIELD outbus = [q1..q0] ;
        FIELD inbus = [a, b] ;
        outbus = inbus ;
    ";
    let (_, jed) = compile_jedec(src)?;

    // The field equation broadcasts bitwise: q1 = a, q0 = b.
    // q1 is pin 22 (block rows 10..20): OE row 10, data row 11 with
    // a = pin 1 (column 0).
    assert_row(&jed, 10, 44, &[]);
    assert_row(&jed, 11, 44, &[0]);
    assert_rows_clear(&jed, 12..21, 44);
    // q0 is pin 23 (block rows 1..9): OE row 1, data row 2 with
    // b = pin 2 (column 4).
    assert_row(&jed, 1, 44, &[]);
    assert_row(&jed, 2, 44, &[4]);
    assert_rows_clear(&jed, 3..10, 44);
    Ok(())
}

#[test]
fn registered_mode_autodetected_16v8() -> Result<()> {
    let src = "
        Device g16v8 ;
        Pin 2 = d ;
        Pin 12 = q ;
        q.R = d & q ;
    ";
    let (_, jed) = compile_jedec(src)?;

    // A .R equation selects registered mode: SYN=0, AC0=1.
    assert!(!jed.fuses[SYN16]);
    assert!(jed.fuses[AC0_16]);

    // Registered outputs have no OE row; the term sits in the block's
    // first row. d is pin 2 (column 0); q reads its own feedback
    // through the registered-mode column for pin 12 (column 30), with
    // no polarity flip on this device.
    assert_row(&jed, 56, 32, &[0, 30]);
    assert_rows_clear(&jed, 57..64, 32);

    // Active-high registered output: XOR=1, AC1=0.
    assert!(jed.fuses[XOR16 + 7]);
    assert!(!jed.fuses[AC1_16 + 7]);
    Ok(())
}

////////////////////////////////////////////////////////////////////////
// General properties
//

#[test]
fn compilation_is_deterministic() -> Result<()> {
    let src = "
        Device g22v10 ;
        Pin 1 = clk ;
        Pin 2 = a ;
        Pin 3 = b ;
        Pin 4 = c ;
        Pin 21 = x ;
        Pin 22 = w ;
        Pin 23 = q ;
        sel = a & b # !c ;
        q.D = sel # q & a ;
        w = a $ b ;
        x = c # w ;
        AR = a & !b ;
    ";
    let first = assemble(src, false, None)?;
    let second = assemble(src, false, None)?;
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn signature_packs_partno() -> Result<()> {
    let src = "
        Partno AB ;
        Device g16v8as ;
        Pin 1 = a ;
        Pin 12 = y ;
        y = a ;
    ";
    let (_, jed) = compile_jedec(src)?;

    // 'A' = 0x41, 'B' = 0x42, MSB first.
    let expect = [
        false, true, false, false, false, false, false, true, // 0x41
        false, true, false, false, false, false, true, false, // 0x42
    ];
    for (i, bit) in expect.iter().enumerate() {
        assert_eq!(jed.fuses[SIG16 + i], *bit, "sig bit {}", i);
    }
    for i in expect.len()..64 {
        assert!(!jed.fuses[SIG16 + i]);
    }
    Ok(())
}

#[test]
fn security_fuse_flag() -> Result<()> {
    let src = "
        Device g16v8as ;
        Pin 1 = a ;
        Pin 12 = y ;
        y = a ;
    ";
    let open = assemble(src, false, None)?;
    let secured = assemble(src, true, None)?;
    assert!(open.contains("*G0\n"));
    assert!(secured.contains("*G1\n"));
    Ok(())
}

#[test]
fn true_output_is_all_ones_row() -> Result<()> {
    let src = "
        Device g16v8as ;
        Pin 1 = a ;
        Pin 12 = y ;
        y = VCC ;
    ";
    let (_, jed) = compile_jedec(src)?;
    // TRUE is the AND of nothing: a row with every input left
    // don't-care.
    assert_row(&jed, 56, 32, &[]);
    assert_rows_clear(&jed, 57..64, 32);
    Ok(())
}

#[test]
fn explicit_output_enable_22v10() -> Result<()> {
    let src = "
        Device g22v10 ;
        Pin 1 = a ;
        Pin 2 = en ;
        Pin 23 = y ;
        y = a ;
        y.OE = en ;
    ";
    let (_, jed) = compile_jedec(src)?;

    // The OE term occupies row 1 (en = pin 2, column 4); data in
    // row 2 (a = pin 1, column 0).
    assert_row(&jed, 1, 44, &[4]);
    assert_row(&jed, 2, 44, &[0]);
    Ok(())
}

////////////////////////////////////////////////////////////////////////
// Errors
//

#[test]
fn error_cases() {
    let cases: &[(&str, &str)] = &[
        (
            "Device g99v9 ; Pin 1 = a ;",
            "unexpected device type",
        ),
        (
            "Device g16v8 ; Pin 1 = a ; Pin 2 = a ;",
            "defined twice",
        ),
        (
            "Device g16v8 ; Pin 1 = a ; Pin 12 = y ; y = a ; y = !a ;",
            "defined twice",
        ),
        (
            "Device g16v8 ; Pin 1 = a ; Pin 12 = y ; y = q ;",
            "unknown symbol",
        ),
        (
            "Device g16v8 ; Pin 1 = a ; Pin 12 = y ; x = y0 ; y0 = x ; y = x ;",
            "cyclic alias",
        ),
        (
            "Device g16v8as ; Pin 1 = a ; Pin 12 = y ; y.R = a ;",
            "registered output is not available",
        ),
        (
            "Device g16v8 ; Pin 1 = a ; Pin 2 = y ; y = a ;",
            "not an output pin",
        ),
        (
            "Device g16v8 ; Pin 1 = a ; Pin 12 = y ; y = a & GND ;",
            "VCC and GND",
        ),
        (
            "Device g16v8 ; Pin 1 = a ; Pin 12 = y ; AR = a ;",
            "only available on the GAL22V10",
        ),
        (
            "Device g22v10 ; Pin 1 = a ; Pin 23 = q ; AR = a ; AR = !a ;",
            "AR is defined twice",
        ),
        (
            "Device g16v8 ; Pin 25 = a ; Pin 12 = y ; y = a ;",
            "out of range",
        ),
    ];

    for (src, needle) in cases {
        match assemble(src, false, None) {
            Ok(_) => panic!("expected failure for {:?}", src),
            Err(e) => {
                let msg = e.to_string();
                assert!(
                    msg.contains(needle),
                    "error {:?} does not mention {:?}",
                    msg,
                    needle
                );
            }
        }
    }
}

#[test]
fn too_many_products_is_reported() {
    // AR is a single fuse row, so any OR there overflows its budget.
    let src = "
        Device g22v10 ;
        Pin 1 = a ;
        Pin 2 = b ;
        Pin 23 = q ;
        q = a ;
        AR = a # b ;
    ";
    let err = assemble(src, false, None).unwrap_err();
    assert!(err.to_string().contains("one product term"));
}
