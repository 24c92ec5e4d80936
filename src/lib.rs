//
// cuprum: a WinCUPL-compatible compiler for small programmable logic.
//
// The pipeline runs in stages, each handing an owned value to the
// next: parser -> Content -> blueprint (lowering, DNF,
// Quine-McCluskey, polarity/feedback resolution) -> gal_builder (fuse
// placement) -> jedec_writer. No I/O happens inside the pipeline;
// bytes come in and go out as in-memory buffers.
//

use slog::{o, Drain};

pub mod ast;
pub mod blueprint;
pub mod chips;
pub mod dnf;
pub mod errors;
pub mod gal;
pub mod gal_builder;
pub mod jedec_writer;
pub mod lower;
pub mod minimize;
pub mod olmc;
pub mod parser;

use blueprint::Blueprint;
use errors::Error;
use gal::GAL;

// Compile parsed content down to a programmed fuse map.
pub fn compile<L: Into<Option<slog::Logger>>>(
    content: &ast::Content,
    logger: L,
) -> Result<GAL, Error> {
    let logger = logger
        .into()
        .unwrap_or_else(|| slog::Logger::root(slog::Discard.fuse(), o!()));

    let blueprint = Blueprint::from_content(content, &logger)?;
    gal_builder::build(&blueprint, logger)
}

// Assemble CUPL source text into a JEDEC stream.
pub fn assemble<L: Into<Option<slog::Logger>>>(
    source: &str,
    sec_bit: bool,
    logger: L,
) -> Result<String, Error> {
    let logger = logger
        .into()
        .unwrap_or_else(|| slog::Logger::root(slog::Discard.fuse(), o!()));

    let content = parser::parse(source)?;
    let gal = compile(&content, logger)?;
    let config = jedec_writer::Config {
        sec_bit,
        header: header_lines(&content, gal.chip),
    };
    Ok(jedec_writer::make_jedec(&config, &gal))
}

// JEDEC header block: tool identification, device, then whichever
// metadata keys the source provided, in a fixed order.
pub fn header_lines(content: &ast::Content, chip: chips::Chip) -> Vec<String> {
    let mut lines = vec![
        format!("{:<15} {}", "cuprum", env!("CARGO_PKG_VERSION")),
        format!(
            "{:<15} {}",
            "Device",
            chip.name().trim_start_matches("GAL").to_ascii_lowercase()
        ),
    ];
    for key in [
        "Name", "Partno", "Revision", "Date", "Designer", "Company", "Assembly", "Location",
    ]
    .iter()
    {
        if let Some(value) = content.meta.get(*key) {
            let value = value.trim();
            if !value.is_empty() {
                lines.push(format!("{:<15} {}", key, value));
            }
        }
    }
    lines
}
