//
// jedec_writer.rs: JEDEC serialization
//
// Emits the programmed fuse state as a JEDEC byte stream: STX, header,
// flag and size records, '*L' fuse lines, the running fuse checksum,
// and the trailing file checksum after ETX. The emitter is pure over a
// valid fuse map and cannot fail.
//

use itertools::Itertools;

use crate::chips::Chip;
use crate::gal::GAL;

pub struct Config {
    pub sec_bit: bool,
    // Free-form header lines placed between STX and the first record.
    pub header: Vec<String>,
}

////////////////////////////////////////////////////////////////////////
// Fuse checksum tracking
//
// The '*C' checksum is a 16-bit sum over the fuse bits packed
// LSB-first into bytes; a trailing partial byte is added as-is.

struct CheckSummer {
    bit_num: u8,
    byte: u8,
    sum: u16,
}

impl CheckSummer {
    fn new() -> Self {
        CheckSummer {
            bit_num: 0,
            byte: 0,
            sum: 0,
        }
    }

    fn add(&mut self, bit: bool) {
        if bit {
            self.byte |= 1 << self.bit_num;
        }
        self.bit_num += 1;
        if self.bit_num == 8 {
            self.sum = self.sum.wrapping_add(self.byte as u16);
            self.byte = 0;
            self.bit_num = 0;
        }
    }

    fn get(&self) -> u16 {
        self.sum.wrapping_add(self.byte as u16)
    }
}

////////////////////////////////////////////////////////////////////////
// A helper to write fuse entries into the buffer for the given bits,
// updating the offset and the checksum as we go.

struct FuseBuilder<'a> {
    buf: &'a mut String,
    checksum: CheckSummer,
    idx: usize,
}

impl<'a> FuseBuilder<'a> {
    fn new(buf: &mut String) -> FuseBuilder {
        FuseBuilder {
            buf,
            checksum: CheckSummer::new(),
            idx: 0,
        }
    }

    fn add(&mut self, data: &[bool]) {
        self.add_iter(data.iter());
    }

    fn add_iter<'b, I>(&mut self, data: I)
    where
        I: Iterator<Item = &'b bool>,
    {
        self.buf.push_str(&format!("*L{:05} ", self.idx));
        for bit in data {
            self.buf.push(if *bit { '1' } else { '0' });
            self.checksum.add(*bit);
            self.idx += 1;
        }
        self.buf.push('\n');
    }

    // Skip over all-zero rows, still accounting for them in the
    // offset and the checksum.
    fn skip_iter<'b, I>(&mut self, data: I)
    where
        I: Iterator<Item = &'b bool>,
    {
        for bit in data {
            self.checksum.add(*bit);
            self.idx += 1;
        }
    }

    fn checksum(&mut self) {
        self.buf.push_str(&format!("*C{:04x}\n", self.checksum.get()));
    }
}

////////////////////////////////////////////////////////////////////////
// Core function to generate the JEDEC file as a string.

pub fn make_jedec(config: &Config, gal: &GAL) -> String {
    let row_len = gal.chip.num_cols();

    let mut buf = String::new();

    buf.push_str("\x02\n");

    for line in config.header.iter() {
        buf.push_str(line);
        if !line.ends_with('\n') {
            buf.push('\n');
        }
    }

    // Default fuse state.
    buf.push_str("*F0\n");

    // Security bit state.
    buf.push_str(if config.sec_bit { "*G1\n" } else { "*G0\n" });

    // Number of fuses.
    buf.push_str(&format!("*QF{}\n", gal.chip.total_size()));

    {
        let mut fuse_builder = FuseBuilder::new(&mut buf);

        // The logic array, one '*L' line per row, with all-zero rows
        // elided (their bits still count toward the checksum).
        for row in &gal.fuses.iter().chunks(row_len) {
            let (mut check_iter, print_iter) = row.tee();

            if check_iter.any(|bit| *bit) {
                fuse_builder.add_iter(print_iter);
            } else {
                fuse_builder.skip_iter(print_iter);
            }
        }

        // XOR bits; interleaved bit-by-bit with AC1 on the 22V10.
        match gal.chip {
            Chip::GAL16V8 => {
                fuse_builder.add(&gal.xor);
                fuse_builder.add(&gal.sig);
                fuse_builder.add(&gal.ac1);
                fuse_builder.add(&gal.pt);
                fuse_builder.add(&[gal.syn]);
                fuse_builder.add(&[gal.ac0]);
            }
            Chip::GAL22V10 => {
                let bits = itertools::interleave(gal.xor.iter(), gal.ac1.iter());
                fuse_builder.add_iter(bits);
                fuse_builder.add(&gal.sig);
            }
        }

        fuse_builder.checksum();
    }

    buf.push_str("*\n");
    buf.push('\x03');

    // File checksum: 16-bit sum of every byte so far, four hex digits.
    let file_checksum = buf
        .bytes()
        .fold(0u16, |sum, byte| sum.wrapping_add(byte as u16));
    buf.push_str(&format!("{:04x}\n", file_checksum));

    buf
}
