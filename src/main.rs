//! Command-line front end: assemble a source file and run it over stdio.

use std::process::ExitCode;

use lmcp::asm::assemble;
use lmcp::err::{report, Error};
use lmcp::parse::parse_lines;
use lmcp::sim::io::{BiChannelIO, IoDevice};
use lmcp::sim::Simulator;

fn main() -> ExitCode {
    let mut args = std::env::args();
    let program = args.next().unwrap_or_else(|| "lmcp".to_string());
    let Some(path) = args.next() else {
        eprintln!("usage: {program} <source file>");
        return ExitCode::FAILURE;
    };

    let src = match std::fs::read_to_string(&path) {
        Ok(src) => src,
        Err(e) => {
            eprintln!("error: {path}: {e}");
            return ExitCode::FAILURE;
        },
    };

    let lines = match parse_lines(&src) {
        Ok(lines) => lines,
        Err(e) => return fail(&e),
    };
    let image = match assemble(&lines) {
        Ok(image) => image,
        Err(e) => return fail(&e),
    };

    let mut sim = Simulator::new(image, BiChannelIO::stdio().into());
    let result = sim.run();
    // joins the writer thread, so pending output lands before the process exits
    std::mem::take(&mut sim.io).close();

    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => fail(&e),
    }
}

fn fail(e: &dyn Error) -> ExitCode {
    eprintln!("{}", report(e));
    ExitCode::FAILURE
}
