//! # asp-solver
//!
//! `asp-solver` is a command-line answer-set solver for ground logic programs given as
//! nogoods. It enumerates answer sets with a conflict-driven nogood learning (CDNL) search.
//!
//! ## Input format
//!
//! ```text
//! c comment
//! p asp <max_atom> <nogood_count>
//! n 1 -2 0        plain nogood {+1, -2}
//! h -3 1 2 0      head-first nogood, the first literal is the (negative) head
//! s -3 1 0        support nogood, derives its head only as must-be-true
//! ```
//!
//! ## Usage
//!
//! ```sh
//! # first answer set of a program
//! asp-solver program.asp
//!
//! # all answer sets, printed, with VSIDS and geometric restarts
//! asp-solver file --path program.asp -n 0 -p --heuristic vsids --restart-strategy geometric
//!
//! # a program given inline
//! asp-solver text --input "n 1 2 0
//! n -1 -2 0" -n 0 -p
//!
//! # every .asp file below a directory, with a 10 second limit each
//! asp-solver dir --path benchmarks/ --timeout 10
//!
//! # shell completions
//! asp-solver completions bash
//! ```
//!
//! Logging goes to stderr; `-v`, `-vv` and `-vvv` select info, debug and trace output.

use crate::command_line::cli::{Cli, run};
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod command_line;

#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

fn init_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.common().verbose);

    if let Err(e) = run(&cli) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
