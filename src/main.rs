//! # sls
//!
//! `sls` is the command-line front end of the local-search engine. It builds
//! a formula from one of the bundled encodings, runs the repair loop on it
//! and reports the verdict together with search and memory statistics.
//!
//! The engine never proves unsatisfiability: a run ends either with a model
//! (`SAT`) or with the limit that stopped it (`UNKNOWN (...)`).
//!
//! ## Usage
//!
//! ```sh
//! sls [SUBCOMMAND] [OPTIONS]
//! ```
//!
//! ### Subcommands
//!
//! 1.  **`queens`**: Place N queens on an N x N board.
//!     ```sh
//!     sls queens -n 16
//!     ```
//!
//! 2.  **`ksat`**: Solve a random k-SAT instance.
//!     ```sh
//!     sls ksat --vars 200 --clauses 800 --planted
//!     ```
//!
//! 3.  **`demo`**: Run one of the built-in formulas
//!     (`linear`, `contradiction`, `bitvector`, `datatype`, `string`).
//!     ```sh
//!     sls demo string --print-solution
//!     ```
//!
//! 4.  **`completions`**: Print a shell completion script.
//!
//! ### Common Options
//!
//! -   `-d, --debug`: Log engine decisions at `debug` level (`RUST_LOG` overrides).
//! -   `-P, --param <KEY=VALUE>`: Override a search parameter. Repeatable.
//! -   `--config <FILE>`: Read parameter overrides from a JSON object.
//! -   `--seed <N>`, `--max-repairs <N>`, `--timeout <SECS>`: Shortcuts for common limits.
//! -   `-p, --print-solution`: Print the model.
//! -   `--no-verify`, `--no-stats`: Skip the model re-check or the statistics table.
//!
//! ## Example Invocations
//!
//! ```sh
//! # 64 queens with a fixed seed and a larger repair budget
//! sls queens -n 64 --seed 7 --max-repairs 1000000
//!
//! # Plain walksat without UCB, with a higher random walk probability
//! sls ksat --planted -P walksat_ucb=false -P wp=200
//!
//! # Show why a contradiction is never satisfied
//! sls demo contradiction -P track_unsat=true
//! ```

mod command_line;

use crate::command_line::cli::{Cli, Commands};
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Global allocator using `tikv-jemallocator` for potentially better performance
/// and memory usage tracking.
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

/// Installs the log subscriber. `RUST_LOG` wins over `--debug`.
fn init_logging(debug: bool) {
    let default = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Main entry point.
///
/// Parses command-line arguments and dispatches to the appropriate command handler.
fn main() {
    let cli = Cli::parse();

    let debug = match &cli.command {
        Commands::Queens { common, .. }
        | Commands::Ksat { common, .. }
        | Commands::Demo { common, .. } => common.debug,
        Commands::Completions { .. } => false,
    };
    init_logging(debug);

    let result = match cli.command {
        Commands::Queens { size, common } => command_line::cli::solve_queens(size, &common),
        Commands::Ksat {
            vars,
            clauses,
            k,
            instance_seed,
            planted,
            common,
        } => command_line::cli::solve_ksat(vars, clauses, k, instance_seed, planted, &common),
        Commands::Demo { scenario, common } => command_line::cli::run_demo(scenario, &common),
        Commands::Completions { shell } => {
            command_line::cli::print_completions(shell);
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
