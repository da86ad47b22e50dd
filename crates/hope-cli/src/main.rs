//! The `hope` binary.
//!
//! Reads commands from a file (`-f`) or standard input, interactively
//! when the terminal allows it. `HOPEPATH` is a colon-separated list of
//! module directories searched in order; empty entries stand for the
//! built-in library.

use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use hope_runtime::{Options, ReadSource, Session};
use hope_source::Reporter;

/// An interpreter for a lazy, statically typed functional language
#[derive(Parser, Debug)]
#[clap(version, about, long_about = None)]
struct Args {
    /// Read source from FILE instead of standard input
    #[clap(short = 'f', value_name = "FILE")]
    file: Option<PathBuf>,

    /// Emit a listing with errors annotated
    #[clap(short = 'l')]
    listing: bool,

    /// Restricted mode: disable file I/O, save and edit
    #[clap(short = 'r')]
    restricted: bool,

    /// Abort evaluation after SECS wall-clock seconds
    #[clap(short = 't', value_name = "SECS", default_value_t = 0)]
    time_limit: u64,

    /// Arguments exposed to programs as argv
    #[clap(trailing_var_arg = true)]
    args: Vec<String>,
}

/// `HOPEPATH`, with empty entries standing for the built-in library.
fn module_path() -> Vec<Option<PathBuf>> {
    match std::env::var("HOPEPATH") {
        Ok(path) => path
            .split(':')
            .map(|entry| if entry.is_empty() { None } else { Some(PathBuf::from(entry)) })
            .collect(),
        Err(_) => vec![Some(PathBuf::from(".")), None],
    }
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    match run(args) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("hope: {err}");
            std::process::exit(1);
        }
    }
}

fn run(args: Args) -> Result<i32> {
    let options = Options {
        restricted: args.restricted,
        listing: args.listing,
        time_limit: args.time_limit,
        path: module_path(),
        argv: args.args.clone(),
    };

    if let Some(file) = &args.file {
        let source = std::fs::File::open(file)
            .with_context(|| format!("can't read file '{}'", file.display()))?;
        let mut session = session(options, args.listing)?;
        return Ok(session.run(
            Box::new(ReadSource(std::io::BufReader::new(source))),
            false,
        ));
    }

    if std::io::stdin().is_terminal() {
        let mut session = session(options, args.listing)?;
        return hope_repl::run(&mut session);
    }

    let mut session = session(options, args.listing)?;
    Ok(session.run(
        Box::new(ReadSource(std::io::BufReader::new(std::io::stdin()))),
        false,
    ))
}

fn session(options: Options, listing: bool) -> Result<Session> {
    let mut session =
        Session::new(options, Box::new(std::io::stdout()), Reporter::stderr(listing));
    let flag = session.interrupt.flag();
    signal_hook::flag::register(signal_hook::consts::SIGINT, flag)
        .context("can't install the interrupt handler")?;
    log::debug!("session ready");
    Ok(session)
}
