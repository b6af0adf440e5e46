#![allow(clippy::cast_precision_loss)]

use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use sls_solver::ksat::generator::KSat;
use sls_solver::queens::solver::Queens;
use sls_solver::sls::config::{SearchConfig, SearchOverrides};
use sls_solver::sls::engine::Engine;
use sls_solver::sls::eval::Evaluator;
use sls_solver::sls::formula::{Formula, FormulaBuilder, FormulaResult};
use sls_solver::sls::sort::{ConstructorDecl, DatatypeDecl, Sort};
use sls_solver::sls::solver::{Model, SearchOutcome, SearchStats, Verdict};
use sls_solver::sls::trace::TraceContext;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tikv_jemalloc_ctl::{epoch, stats};
use tracing::{debug, info, warn};

/// Defines the command-line interface for the local-search solver.
///
/// Uses `clap` for parsing arguments.
#[derive(Parser, Debug)]
#[command(name = "sls", version, about = "A stochastic local-search constraint solver")]
pub(crate) struct Cli {
    /// Specifies the subcommand to execute (e.g. `queens`, `ksat`, `demo`).
    #[clap(subcommand)]
    pub command: Commands,
}

/// Enumerates the available subcommands.
#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// Place N non-attacking queens on an N x N board.
    Queens {
        /// The board size.
        #[arg(short = 'n', long, default_value_t = 8)]
        size: usize,

        /// Common options for this subcommand.
        #[command(flatten)]
        common: CommonOptions,
    },

    /// Solve a randomly generated k-SAT instance.
    Ksat {
        /// Number of boolean variables.
        #[arg(long, default_value_t = 100)]
        vars: usize,

        /// Number of clauses.
        #[arg(long, default_value_t = 420)]
        clauses: usize,

        /// Literals per clause.
        #[arg(short, long, default_value_t = 3)]
        k: usize,

        /// Seed of the instance generator (independent of the search seed).
        #[arg(long, default_value_t = 0)]
        instance_seed: u64,

        /// Plant a hidden solution so the instance is satisfiable.
        #[arg(long, default_value_t = false)]
        planted: bool,

        /// Common options for this subcommand.
        #[command(flatten)]
        common: CommonOptions,
    },

    /// Run one of the built-in example formulas.
    Demo {
        /// Which formula to run.
        #[arg(value_enum)]
        scenario: Scenario,

        /// Common options for this subcommand.
        #[command(flatten)]
        common: CommonOptions,
    },

    /// Generate shell completion scripts.
    Completions {
        /// The shell to generate completions for.
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// The built-in example formulas, one per theory.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Scenario {
    /// `x + y = 10` over the integers with strict lower bounds.
    Linear,
    /// `x = 1 and x = 2`, which the search can never satisfy.
    Contradiction,
    /// `3x + 1 = 22` over 8-bit vectors with `x < 100`.
    Bitvector,
    /// A list whose head is 7 and whose tail is a non-empty list.
    Datatype,
    /// A string with a fixed prefix, a given length and a required substring.
    String,
}

/// Defines common command-line options shared across different subcommands.
#[derive(Args, Debug, Default, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub(crate) struct CommonOptions {
    /// Enable debug output: engine decisions are logged at `debug` level.
    /// `RUST_LOG` takes precedence.
    #[arg(short, long, default_value_t = false)]
    pub(crate) debug: bool,

    /// Skip re-checking the model against the formula.
    #[arg(long, default_value_t = false)]
    pub(crate) no_verify: bool,

    /// Skip the statistics table.
    #[arg(long, default_value_t = false)]
    pub(crate) no_stats: bool,

    /// Enable printing of the satisfying assignment (model) if one is found.
    #[arg(short, long, default_value_t = false)]
    pub(crate) print_solution: bool,

    /// Override a search parameter, e.g. `--param wp=50` or
    /// `--param sls.walksat_ucb=false`. Repeatable.
    #[arg(short = 'P', long = "param", value_name = "KEY=VALUE")]
    pub(crate) params: Vec<String>,

    /// Read parameter overrides from a JSON object. `--param` values are applied on top.
    #[arg(long, value_name = "FILE")]
    pub(crate) config: Option<PathBuf>,

    /// Seed of the search.
    #[arg(long)]
    pub(crate) seed: Option<u32>,

    /// Maximum number of repair steps.
    #[arg(long)]
    pub(crate) max_repairs: Option<u32>,

    /// Wall-clock limit in seconds.
    #[arg(long)]
    pub(crate) timeout: Option<f64>,
}

/// Layers the JSON file, the `--param` pairs and the dedicated flags over the defaults.
///
/// # Errors
///
/// If the file cannot be read or any override is rejected.
pub(crate) fn resolve_config(common: &CommonOptions) -> Result<SearchConfig, String> {
    let mut overrides = match &common.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .map_err(|e| format!("Unable to read {}: {e}", path.display()))?;
            SearchOverrides::from_json(&json).map_err(|e| format!("{}: {e}", path.display()))?
        }
        None => SearchOverrides::default(),
    };
    for pair in &common.params {
        overrides.set_pair(pair).map_err(|e| e.to_string())?;
    }
    if let Some(seed) = common.seed {
        overrides.random_seed = Some(seed);
    }
    if let Some(max_repairs) = common.max_repairs {
        overrides.max_repairs = Some(max_repairs);
    }
    SearchConfig::resolve(&overrides).map_err(|e| e.to_string())
}

/// Whether every assertion holds under `model`.
pub(crate) fn verify_model(formula: &Formula, model: &Model) -> bool {
    let eval = Evaluator::new(formula, model.values());
    formula.assertions().iter().all(|a| eval.satisfied(a.id))
}

/// Runs the engine on `formula` and reports the outcome.
///
/// # Arguments
/// * `formula` - The formula to search.
/// * `common` - Common options (parameters, limits, verification, statistics).
/// * `label` - A short description of the problem, printed before solving.
/// * `build_time` - The time taken to build the formula.
///
/// # Errors
///
/// If the configuration is invalid or a found model fails verification.
pub(crate) fn solve_and_report(
    formula: &Formula,
    common: &CommonOptions,
    label: &str,
    build_time: Duration,
) -> Result<SearchOutcome, String> {
    let config = resolve_config(common)?;
    println!("Solving: {label}");
    info!(
        variables = formula.num_vars(),
        assertions = formula.len(),
        seed = config.random_seed,
        "starting search"
    );

    let trace = TraceContext::new(common.debug);
    let timeout = common
        .timeout
        .map(Duration::try_from_secs_f64)
        .transpose()
        .map_err(|e| format!("Invalid timeout: {e}"))?;

    if common.debug {
        match config.to_json() {
            Ok(json) => debug!("resolved configuration:\n{json}"),
            Err(e) => warn!("could not print the configuration: {e}"),
        }
    }

    let time = Instant::now();
    let mut engine = Engine::new(formula, config, &trace);
    if let Some(timeout) = timeout {
        engine = engine.with_timeout(timeout);
    }
    let outcome = engine.run();
    let elapsed = time.elapsed();

    if let Err(e) = epoch::advance() {
        warn!("could not refresh allocator statistics: {e}");
    }
    let allocated_mib = stats::allocated::read().unwrap_or(0) as f64 / (1024.0 * 1024.0);
    let resident_mib = stats::resident::read().unwrap_or(0) as f64 / (1024.0 * 1024.0);

    if let Verdict::Sat(model) = &outcome.verdict {
        if !common.no_verify {
            let ok = verify_model(formula, model);
            println!("Verified: {ok:?}");
            if !ok {
                return Err("Model failed verification".to_string());
            }
        }
    }

    if !common.no_stats {
        print_stats(build_time, elapsed, formula, &outcome.stats, allocated_mib, resident_mib);
    }

    if common.print_solution {
        if let Some(model) = outcome.verdict.model() {
            for (name, value) in model.named(formula) {
                println!("{name} = {value}");
            }
        }
    }

    if !outcome.stats.unsat_assertions.is_empty() {
        let ids: Vec<u32> = outcome.stats.unsat_assertions.iter().map(|a| a.0).collect();
        println!("Violated assertions: {ids:?}");
    }

    println!("\n{}", outcome.verdict.to_string().to_uppercase());
    Ok(outcome)
}

/// Helper function to print a single statistic line in a formatted table row.
///
/// # Arguments
/// * `label` - The description of the statistic.
/// * `value` - The value of the statistic, implementing `std::fmt::Display`.
pub(crate) fn stat_line(label: &str, value: impl std::fmt::Display) {
    println!("|  {label:<28} {value:>18}  |");
}

/// Helper function to print a statistic line that includes a rate (value/second).
///
/// # Arguments
/// * `label` - The description of the statistic.
/// * `value` - The raw count for the statistic.
/// * `elapsed` - The elapsed time in seconds, used to calculate the rate.
pub(crate) fn stat_line_with_rate(label: &str, value: u64, elapsed: f64) {
    let rate = if elapsed > 0.0 {
        value as f64 / elapsed
    } else {
        0.0
    };
    println!("|  {label:<20} {value:>12} ({rate:>9.0}/sec)  |");
}

/// Prints a summary of problem and search statistics.
pub(crate) fn print_stats(
    build_time: Duration,
    elapsed: Duration,
    formula: &Formula,
    s: &SearchStats,
    allocated: f64,
    resident: f64,
) {
    let elapsed_secs = elapsed.as_secs_f64();

    println!("\n=======================[ Problem Statistics ]=========================");
    stat_line("Build time (s)", format!("{:.3}", build_time.as_secs_f64()));
    stat_line("Variables", formula.num_vars());
    stat_line("Assertions", formula.len());

    println!("========================[ Search Statistics ]========================");
    stat_line_with_rate("Repairs", s.repairs, elapsed_secs);
    stat_line_with_rate("Moves", s.moves, elapsed_secs);
    stat_line_with_rate("Restarts", u64::from(s.restarts), elapsed_secs);
    stat_line("Random walks", s.random_walks);
    stat_line("Repicks", s.repicks);
    stat_line("VNS moves", s.vns_moves);
    stat_line("Smoothings", s.smoothings);
    stat_line("Rescores", s.rescores);
    stat_line("Final score", s.final_score);
    stat_line("Violated assertions", s.final_unsat);
    stat_line("Memory usage (MiB)", format!("{allocated:.2}"));
    stat_line("Resident memory (MiB)", format!("{resident:.2}"));
    stat_line("CPU time (s)", format!("{elapsed_secs:.3}"));
    println!("=====================================================================");
}

/// Solve the N-queens puzzle.
///
/// # Errors
///
/// If the board is empty or the search options are invalid.
pub(crate) fn solve_queens(size: usize, common: &CommonOptions) -> Result<(), String> {
    if size == 0 {
        return Err("Board size must be positive".to_string());
    }
    let time = Instant::now();
    let queens = Queens::new(size);
    let formula = queens.to_formula().map_err(|e| e.to_string())?;
    let build_time = time.elapsed();

    let outcome = solve_and_report(&formula, common, &format!("{size}-queens"), build_time)?;
    if let Some(model) = outcome.verdict.model() {
        match queens.decode(model) {
            Some(placement) => println!("Solution:\n{placement}"),
            None => return Err("Model places a queen off the board".to_string()),
        }
    } else {
        println!("No solution found");
    }
    Ok(())
}

/// Solve a random k-SAT instance.
///
/// # Errors
///
/// If the instance is empty or the search options are invalid.
pub(crate) fn solve_ksat(
    vars: usize,
    clauses: usize,
    k: usize,
    instance_seed: u64,
    planted: bool,
    common: &CommonOptions,
) -> Result<(), String> {
    if vars == 0 || k == 0 {
        return Err(
            "An instance needs at least one variable and one literal per clause".to_string(),
        );
    }
    let time = Instant::now();
    let ksat = if planted {
        KSat::planted(vars, clauses, k, instance_seed)
    } else {
        KSat::uniform(vars, clauses, k, instance_seed)
    };
    let formula = ksat.to_formula().map_err(|e| e.to_string())?;
    let build_time = time.elapsed();

    let label = format!("{k}-SAT, {vars} variables, {clauses} clauses");
    let outcome = solve_and_report(&formula, common, &label, build_time)?;
    if let Some(model) = outcome.verdict.model() {
        let ok = ksat.decode(model).is_some_and(|values| ksat.verify(&values));
        if !ok {
            return Err("Model does not satisfy the clauses".to_string());
        }
    }
    Ok(())
}

/// Run a built-in scenario.
///
/// # Errors
///
/// If the search options are invalid.
pub(crate) fn run_demo(scenario: Scenario, common: &CommonOptions) -> Result<(), String> {
    let time = Instant::now();
    let formula = scenario_formula(scenario).map_err(|e| e.to_string())?;
    let build_time = time.elapsed();
    solve_and_report(&formula, common, &format!("{scenario:?}"), build_time)?;
    Ok(())
}

pub(crate) fn scenario_formula(scenario: Scenario) -> FormulaResult<Formula> {
    let mut b = FormulaBuilder::new();
    match scenario {
        Scenario::Linear => {
            let x = b.int_var("x")?;
            let y = b.int_var("y")?;
            let sum = b.add(&[x, y])?;
            let ten = b.int(10);
            let three = b.int(3);
            let two = b.int(2);
            let eq = b.eq(sum, ten)?;
            let gx = b.gt(x, three)?;
            let gy = b.gt(y, two)?;
            for t in [eq, gx, gy] {
                b.assert(t)?;
            }
        }
        Scenario::Contradiction => {
            let x = b.int_var("x")?;
            let one = b.int(1);
            let two = b.int(2);
            let a = b.eq(x, one)?;
            let c = b.eq(x, two)?;
            b.assert(a)?;
            b.assert(c)?;
        }
        Scenario::Bitvector => {
            let x = b.bv_var("x", 8)?;
            let three = b.bv(8, 3)?;
            let one = b.bv(8, 1)?;
            let target = b.bv(8, 22)?;
            let limit = b.bv(8, 100)?;
            let scaled = b.bv_mul(three, x)?;
            let lhs = b.bv_add(scaled, one)?;
            let eq = b.eq(lhs, target)?;
            let below = b.bv_ult(x, limit)?;
            b.assert(eq)?;
            b.assert(below)?;
        }
        Scenario::Datatype => {
            let id = b.next_datatype_id();
            b.declare_datatype(DatatypeDecl::new(
                "List",
                vec![
                    ConstructorDecl::new("nil", vec![]),
                    ConstructorDecl::new(
                        "cons",
                        vec![
                            ("head".to_string(), Sort::Int),
                            ("tail".to_string(), Sort::Datatype(id)),
                        ],
                    ),
                ],
            ))?;
            let l = b.dt_var("l", id)?;
            let is_cons = b.test(id, "cons", l)?;
            let head = b.select(id, "cons", "head", l)?;
            let seven = b.int(7);
            let head_is_seven = b.eq(head, seven)?;
            let tail = b.select(id, "cons", "tail", l)?;
            let tail_is_cons = b.test(id, "cons", tail)?;
            for t in [is_cons, head_is_seven, tail_is_cons] {
                b.assert(t)?;
            }
        }
        Scenario::String => {
            let s = b.str_var("s")?;
            let prefix = b.string("ab");
            let needle = b.string("z");
            let has_prefix = b.str_prefix_of(prefix, s)?;
            let len = b.str_len(s)?;
            let five = b.int(5);
            let len_is_five = b.eq(len, five)?;
            let has_needle = b.str_contains(s, needle)?;
            for t in [has_prefix, len_is_five, has_needle] {
                b.assert(t)?;
            }
        }
    }
    Ok(b.build())
}

/// Writes a completion script for `shell` to stdout.
pub(crate) fn print_completions(shell: clap_complete::Shell) {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "sls", &mut std::io::stdout());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn common(params: &[&str]) -> CommonOptions {
        CommonOptions {
            params: params.iter().map(ToString::to_string).collect(),
            ..CommonOptions::default()
        }
    }

    #[test]
    fn test_params_and_flags_layer() {
        let mut options = common(&["wp=7", "sls.walksat_ucb=false"]);
        options.seed = Some(3);
        options.max_repairs = Some(50);
        let config = resolve_config(&options).unwrap();
        assert_eq!(config.wp, 7);
        assert!(!config.walksat_ucb);
        assert_eq!(config.random_seed, 3);
        assert_eq!(config.max_repairs, 50);
    }

    #[test]
    fn test_bad_param_is_reported() {
        assert!(resolve_config(&common(&["no_such_key=1"])).is_err());
        assert!(resolve_config(&common(&["wp=2000"])).is_err());
        assert!(resolve_config(&common(&["wp"])).is_err());
    }

    #[test]
    fn test_scenarios_build() {
        for scenario in Scenario::value_variants() {
            let f = scenario_formula(*scenario).unwrap();
            assert!(!f.is_empty());
        }
    }

    #[test]
    fn test_debug_run_reports() {
        let f = scenario_formula(Scenario::Linear).unwrap();
        let mut options = common(&["wp=0"]);
        options.debug = true;
        options.max_repairs = Some(10_000);
        let outcome = solve_and_report(&f, &options, "linear", Duration::ZERO).unwrap();
        assert!(outcome.verdict.is_sat());
    }

    #[test]
    fn test_cli_parses() {
        let args = ["sls", "queens", "-n", "6", "-P", "wp=10", "--seed", "2"];
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Commands::Queens { size, common } => {
                assert_eq!(size, 6);
                assert_eq!(common.params, vec!["wp=10".to_string()]);
                assert_eq!(common.seed, Some(2));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
