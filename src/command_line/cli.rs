#![allow(clippy::cast_precision_loss)]

use asp_solver::asp::grounding::{NoGoodSource, StaticProgram};
use asp_solver::asp::handler::Timeout;
use asp_solver::asp::heuristic::{HeuristicImpls, HeuristicType};
use asp_solver::asp::input::{parse_file, parse_str};
use asp_solver::asp::restarter::{RestarterImpls, RestarterType};
use asp_solver::asp::solver::{AnswerSet, SearchState, SearchStats, Solver};
use asp_solver::asp::stability::{StabilityImpls, StabilityType};
use clap::{ArgAction, Args, CommandFactory, Parser, Subcommand};
use itertools::Itertools;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tikv_jemalloc_ctl::{epoch, stats};
use tracing::{info, warn};

/// A solver whose strategies are chosen at runtime.
pub(crate) type DynamicSolver =
    Solver<HeuristicImpls, RestarterImpls<100>, StaticProgram, StabilityImpls, Option<Timeout>>;

/// Defines the command-line interface of the answer-set solver.
#[derive(Parser, Debug)]
#[command(
    name = "asp-solver",
    version,
    about = "A conflict-driven answer-set search engine"
)]
pub(crate) struct Cli {
    /// If provided without a subcommand, the program file (or directory of `.asp` files)
    /// to solve.
    pub path: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub common: CommonOptions,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// Solve a ground nogood program stored in a file.
    File {
        #[arg(long)]
        path: PathBuf,

        #[command(flatten)]
        common: CommonOptions,
    },

    /// Solve a ground nogood program given as text (e.g. "n 1 2 0\nh -1 0").
    Text {
        #[arg(short, long)]
        input: String,

        #[command(flatten)]
        common: CommonOptions,
    },

    /// Solve every `.asp` file below a directory.
    Dir {
        #[arg(long)]
        path: PathBuf,

        #[command(flatten)]
        common: CommonOptions,
    },

    /// Generate shell completion scripts.
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Options shared by every solving command.
#[derive(Args, Debug, Clone)]
pub(crate) struct CommonOptions {
    /// Increase logging verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count)]
    pub(crate) verbose: u8,

    /// Check every answer set against the program's nogoods.
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub(crate) verify: bool,

    /// Print search statistics after solving.
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub(crate) stats: bool,

    /// Print the answer sets found.
    #[arg(short, long, default_value_t = false)]
    pub(crate) print_models: bool,

    /// Number of answer sets to compute; 0 computes all of them.
    #[arg(short = 'n', long, default_value_t = 1)]
    pub(crate) models: usize,

    /// Stop the search after this many seconds.
    #[arg(long)]
    pub(crate) timeout: Option<u64>,

    #[arg(long, default_value_t = HeuristicType::BerkMin)]
    pub(crate) heuristic: HeuristicType,

    #[arg(long, default_value_t = RestarterType::Luby)]
    pub(crate) restart_strategy: RestarterType,

    #[arg(long, default_value_t = StabilityType::TrustMbt)]
    pub(crate) stability: StabilityType,
}

impl Default for CommonOptions {
    fn default() -> Self {
        Self {
            verbose: 0,
            verify: true,
            stats: true,
            print_models: false,
            models: 1,
            timeout: None,
            heuristic: HeuristicType::default(),
            restart_strategy: RestarterType::default(),
            stability: StabilityType::default(),
        }
    }
}

impl Cli {
    /// The options of the selected subcommand, or the global ones.
    pub(crate) fn common(&self) -> &CommonOptions {
        match &self.command {
            Some(
                Commands::File { common, .. }
                | Commands::Text { common, .. }
                | Commands::Dir { common, .. },
            ) => common,
            Some(Commands::Completions { .. }) | None => &self.common,
        }
    }
}

/// What a search produced.
#[derive(Debug, Clone)]
pub(crate) struct Outcome {
    pub(crate) answer_sets: Vec<AnswerSet>,
    pub(crate) state: SearchState,
    pub(crate) elapsed: Duration,
    pub(crate) stats: SearchStats,
}

impl Outcome {
    pub(crate) fn verdict(&self) -> &'static str {
        if !self.answer_sets.is_empty() {
            "SATISFIABLE"
        } else if self.state == SearchState::Unsat {
            "UNSATISFIABLE"
        } else {
            "UNKNOWN"
        }
    }

    /// `true` if the search ended before proving that no further answer set exists.
    pub(crate) fn incomplete(&self) -> bool {
        self.state != SearchState::Unsat
    }
}

/// Builds a solver for `program` from the command-line options.
pub(crate) fn get_solver(program: StaticProgram, common: &CommonOptions) -> DynamicSolver {
    let max_atom_id = program.max_atom_id();
    Solver::from_parts(
        program,
        common.heuristic.to_impl(max_atom_id),
        common.restart_strategy.to_impl(),
        common.stability.to_impl(),
        common
            .timeout
            .map(|secs| Timeout::after(Duration::from_secs(secs))),
    )
}

pub(crate) fn solve(program: &StaticProgram, common: &CommonOptions) -> Outcome {
    let time = Instant::now();

    let mut solver = get_solver(program.clone(), common);
    let limit = if common.models == 0 {
        usize::MAX
    } else {
        common.models
    };
    let answer_sets = solver.answer_sets().take(limit).collect_vec();

    Outcome {
        answer_sets,
        state: solver.state(),
        elapsed: time.elapsed(),
        stats: solver.stats(),
    }
}

/// Checks every answer set against the program.
///
/// # Errors
///
/// If an answer set violates one of the program's nogoods.
pub(crate) fn verify_answer_sets(
    program: &StaticProgram,
    answer_sets: &[AnswerSet],
) -> Result<(), String> {
    if let Some((index, bad)) = answer_sets
        .iter()
        .enumerate()
        .find(|(_, answer_set)| !program.verify(answer_set))
    {
        return Err(format!("answer {} {bad} violates a nogood", index + 1));
    }
    println!("Verified: true");
    Ok(())
}

fn memory_usage() -> Result<(f64, f64), tikv_jemalloc_ctl::Error> {
    epoch::advance()?;
    let allocated = stats::allocated::mib()?.read()?;
    let resident = stats::resident::mib()?.read()?;
    Ok((
        allocated as f64 / (1024.0 * 1024.0),
        resident as f64 / (1024.0 * 1024.0),
    ))
}

/// Solves a parsed program and reports answer sets, verification and statistics.
///
/// # Errors
///
/// If verification is enabled and fails.
pub(crate) fn solve_and_report(
    program: &StaticProgram,
    common: &CommonOptions,
    label: Option<&Path>,
    parse_time: Duration,
) -> Result<(), String> {
    if let Some(name) = label {
        println!("Solving: {}", name.display());
    }
    info!(
        atoms = program.max_atom_id(),
        no_goods = program.no_goods().len(),
        heuristic = %common.heuristic,
        restarts = %common.restart_strategy,
        "starting search"
    );

    let outcome = solve(program, common);

    if common.print_models {
        for (index, answer_set) in outcome.answer_sets.iter().enumerate() {
            println!("Answer: {}", index + 1);
            println!("{answer_set}");
        }
    }

    if common.verify {
        verify_answer_sets(program, &outcome.answer_sets)?;
    }

    if common.stats {
        let (allocated, resident) = memory_usage().unwrap_or_else(|e| {
            warn!("could not read allocator statistics: {e}");
            (0.0, 0.0)
        });
        print_stats(parse_time, program, &outcome, allocated, resident);
    }

    println!("\n{}", outcome.verdict());
    Ok(())
}

/// Parses and solves a single file.
///
/// # Errors
///
/// If the file cannot be read or parsed, or verification fails.
pub(crate) fn solve_file(path: &Path, common: &CommonOptions) -> Result<(), String> {
    let time = Instant::now();
    let program = parse_file(path).map_err(|e| format!("{}: {e}", path.display()))?;
    solve_and_report(&program, common, Some(path), time.elapsed())
}

/// Solves a program given as text.
///
/// # Errors
///
/// If the text is malformed or verification fails.
pub(crate) fn solve_text(input: &str, common: &CommonOptions) -> Result<(), String> {
    let time = Instant::now();
    let program = parse_str(input).map_err(|e| e.to_string())?;
    solve_and_report(&program, common, None, time.elapsed())
}

/// Solves every `.asp` file below `path`.
///
/// # Errors
///
/// If `path` is not a directory, or any program fails to parse or verify.
pub(crate) fn solve_dir(path: &Path, common: &CommonOptions) -> Result<(), String> {
    if !path.is_dir() {
        return Err(format!("not a directory: {}", path.display()));
    }

    for entry in walkdir::WalkDir::new(path)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
    {
        let file_path = entry.path();
        if !file_path.is_file() {
            continue;
        }
        if file_path.extension().is_none_or(|ext| ext != "asp") {
            info!("skipping {}", file_path.display());
            continue;
        }
        solve_file(file_path, common)?;
    }

    Ok(())
}

/// Writes completion scripts for `shell` to stdout.
pub(crate) fn print_completions(shell: clap_complete::Shell) {
    let mut command = Cli::command();
    let name = command.get_name().to_string();
    clap_complete::generate(shell, &mut command, name, &mut std::io::stdout());
}

/// Dispatches the parsed command line.
///
/// # Errors
///
/// Whatever the selected command reports.
pub(crate) fn run(cli: &Cli) -> Result<(), String> {
    match &cli.command {
        Some(Commands::File { path, common }) => solve_file(path, common),
        Some(Commands::Text { input, common }) => solve_text(input, common),
        Some(Commands::Dir { path, common }) => solve_dir(path, common),
        Some(Commands::Completions { shell }) => {
            print_completions(*shell);
            Ok(())
        }
        None => match &cli.path {
            Some(path) if path.is_dir() => solve_dir(path, &cli.common),
            Some(path) => solve_file(path, &cli.common),
            None => Err("no command provided, use --help for more information".to_string()),
        },
    }
}

pub(crate) fn stat_line(label: &str, value: impl std::fmt::Display) {
    println!("|  {label:<28} {value:>18}  |");
}

pub(crate) fn stat_line_with_rate(label: &str, value: usize, elapsed: f64) {
    let rate = if elapsed > 0.0 {
        value as f64 / elapsed
    } else {
        0.0
    };
    println!("|  {label:<20} {value:>12} ({rate:>9.0}/sec)  |");
}

/// Prints a summary of problem and search statistics.
pub(crate) fn print_stats(
    parse_time: Duration,
    program: &StaticProgram,
    outcome: &Outcome,
    allocated: f64,
    resident: f64,
) {
    let elapsed_secs = outcome.elapsed.as_secs_f64();
    let s = &outcome.stats;

    println!("\n=======================[ Problem Statistics ]=========================");
    stat_line("Parse time (s)", format!("{:.3}", parse_time.as_secs_f64()));
    stat_line("Atoms", program.max_atom_id());
    stat_line("Nogoods (original)", program.no_goods().len());
    stat_line(
        "Literals (original)",
        program.no_goods().iter().map(|ng| ng.len()).sum::<usize>(),
    );

    println!("========================[ Search Statistics ]========================");
    stat_line("Learnt nogoods", s.learned_no_goods);
    stat_line("Total nogoods (incl. learnt)", s.no_goods);
    stat_line_with_rate("Conflicts", s.conflicts, elapsed_secs);
    stat_line_with_rate("Decisions", s.decisions, elapsed_secs);
    stat_line_with_rate("Propagations", s.propagations, elapsed_secs);
    stat_line_with_rate("Restarts", s.restarts, elapsed_secs);
    stat_line(
        "Answer sets",
        format!(
            "{}{}",
            outcome.answer_sets.len(),
            if outcome.incomplete() { "+" } else { "" }
        ),
    );
    stat_line("Rejected candidates", s.rejected_candidates);
    stat_line("Memory usage (MiB)", format!("{allocated:.2}"));
    stat_line("Resident memory (MiB)", format!("{resident:.2}"));
    stat_line("CPU time (s)", format!("{elapsed_secs:.3}"));
    println!("=====================================================================");
}
