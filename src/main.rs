use std::fs;
use std::path::PathBuf;
use std::process;

use clap::{App, Arg};
use slog::{o, Drain};

fn main() {
    let matches = App::new("cuprum")
        .version(env!("CARGO_PKG_VERSION"))
        .about("WinCUPL-compatible PLD compiler for GAL16V8/GAL22V10")
        .arg(
            Arg::with_name("INPUT.pld")
                .help("Input file")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::with_name("output")
                .help("Output JEDEC file (defaults to the input name with .jed)")
                .short("o")
                .long("output")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("secure")
                .help("Enable security fuse")
                .short("s")
                .long("secure"),
        )
        .arg(
            Arg::with_name("verbose")
                .help("Increase logging verbosity")
                .short("v")
                .multiple(true),
        )
        .get_matches();

    let decorator = slog_term::TermDecorator::new().stderr().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let logger = match matches.occurrences_of("verbose") {
        0 => {
            let drain = drain.filter(|record| record.level().is_at_least(slog::Level::Warning));
            slog::Logger::root(std::sync::Mutex::new(drain).fuse(), o!())
        }
        1 => {
            let drain = drain.filter(|record| record.level().is_at_least(slog::Level::Info));
            slog::Logger::root(std::sync::Mutex::new(drain).fuse(), o!())
        }
        _ => slog::Logger::root(std::sync::Mutex::new(drain).fuse(), o!()),
    };

    let file_name = matches.value_of("INPUT.pld").unwrap();

    let source = match fs::read_to_string(file_name) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("{}: {}", file_name, e);
            process::exit(1);
        }
    };

    let jedec = match cuprum::assemble(&source, matches.is_present("secure"), logger) {
        Ok(jedec) => jedec,
        Err(e) => {
            eprintln!("{}: {}", file_name, e);
            process::exit(1);
        }
    };

    let out_path = match matches.value_of("output") {
        Some(path) => PathBuf::from(path),
        None => PathBuf::from(file_name).with_extension("jed"),
    };

    if let Err(e) = fs::write(&out_path, jedec.as_bytes()) {
        eprintln!("{}: {}", out_path.display(), e);
        process::exit(1);
    }
}
