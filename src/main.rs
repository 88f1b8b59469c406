use mutaswift::coverage::SwiftCoverage;
use mutaswift::error::MutationError;
use mutaswift::operators::OperatorKind;
use mutaswift::output;
use mutaswift::pipeline::{self, Dependencies};
use mutaswift::runner::SystemProcessRunner;
use mutaswift::state::{RunMode, RunOptions, RunState};

use std::io;
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "mutaswift", version, about = "Mutation testing for Swift projects")]
struct Cli {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mutate the project and run its test suite against every mutant
    Run {
        /// Project directory
        #[arg(default_value = ".")]
        project_dir: PathBuf,
        /// Only mutate these files (paths or glob patterns)
        #[arg(long, num_args = 1..)]
        files: Vec<String>,
        /// Only apply these operators (see `mutaswift operators`)
        #[arg(long, num_args = 1.., value_parser = parse_operator)]
        operators: Vec<OperatorKind>,
        /// Do not measure code coverage before mutating
        #[arg(long)]
        skip_coverage: bool,
        /// Do not look for a newer release
        #[arg(long)]
        skip_update_check: bool,
        /// Configuration file (default: muter.conf.yml in the project)
        #[arg(long)]
        configuration: Option<PathBuf>,
        /// Mutate and write a test plan without building or testing
        #[arg(long, conflicts_with = "test_plan")]
        create_test_plan: bool,
        /// Build and test a project from a previously written test plan
        /// (default: muter-mappings.json in the project)
        #[arg(long, value_name = "PATH")]
        test_plan: Option<Option<PathBuf>>,
        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the available mutation operators
    Operators,
}

fn parse_operator(s: &str) -> Result<OperatorKind, String> {
    OperatorKind::from_id(s).ok_or_else(|| {
        let known: Vec<_> = OperatorKind::ALL.iter().map(|op| op.id()).collect();
        format!("unknown operator '{}', expected one of: {}", s, known.join(", "))
    })
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let exit_code = match cli.command {
        Commands::Operators => {
            output::print_operators();
            0
        }
        Commands::Run {
            project_dir,
            files,
            operators,
            skip_coverage,
            skip_update_check,
            configuration,
            create_test_plan,
            test_plan,
            json,
        } => {
            let mode = if test_plan.is_some() {
                RunMode::TestPlan
            } else if create_test_plan {
                RunMode::MutateOnly
            } else {
                RunMode::MutateAndTest
            };
            let options = RunOptions {
                project_dir,
                mode,
                files_to_mutate: files,
                operators,
                skip_coverage,
                skip_update_check,
                configuration_path: configuration,
                test_plan_path: test_plan.flatten(),
            };
            cmd_run(options, json)
        }
    };

    process::exit(exit_code);
}

fn cmd_run(options: RunOptions, json_mode: bool) -> i32 {
    let runner = SystemProcessRunner;
    let coverage = SwiftCoverage::new(&runner);
    let on_event = |event: &mutaswift::events::Event| {
        if !json_mode {
            output::log_event(event);
        }
    };
    let deps = Dependencies::new(&runner, &coverage).with_event_handler(&on_event);

    match pipeline::run(options, &deps) {
        Ok(state) => report(&state, json_mode),
        Err(err) => report_error(&err),
    }
}

fn report(state: &RunState, json_mode: bool) -> i32 {
    let Some(outcome) = &state.outcome else {
        if let Some(path) = &state.test_plan_path {
            output::print_success(&format!(
                "Mutated project at {}. Test plan written to {}",
                state.working_dir.display(),
                path.display()
            ));
        }
        return 0;
    };

    if json_mode {
        match serde_json::to_string_pretty(outcome) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                output::print_error(&format!("Failed to serialize the outcome: {e}"));
                return 3;
            }
        }
    } else {
        output::print_outcome(outcome, &state.project_dir);
    }

    if outcome.survivors().next().is_some() { 1 } else { 0 }
}

fn report_error(err: &MutationError) -> i32 {
    output::print_error(&err.to_string());
    if let Some(log) = err.log().filter(|log| !log.trim().is_empty()) {
        eprintln!("{log}");
    }
    err.exit_code()
}
