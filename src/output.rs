use console::Style;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::events::Event;
use crate::operators::OperatorKind;
use crate::outcome::{Mutation, MutationTestOutcome, TestSuiteOutcome};

pub fn print_error(msg: &str) {
    let style = Style::new().red().bold();
    eprintln!("{} {}", style.apply_to("✗"), msg);
}

pub fn print_success(msg: &str) {
    let style = Style::new().green().bold();
    println!("{} {}", style.apply_to("✓"), msg);
}

pub fn generate_diff(original: &str, mutated: &str) -> String {
    use similar::TextDiff;
    let diff = TextDiff::from_lines(original, mutated);
    let mut output = String::new();
    for change in diff.iter_all_changes() {
        match change.tag() {
            similar::ChangeTag::Delete => output.push_str(&format!("- {}", change)),
            similar::ChangeTag::Insert => output.push_str(&format!("+ {}", change)),
            _ => {}
        }
    }
    output
}

/// Run progress as log lines. Checkpoints the run already logs itself
/// (discovered files, written plan, new version) are left out.
pub fn log_event(event: &Event) {
    match event {
        Event::BaselineStarted => info!("running the test suite once unmutated"),
        Event::BaselineFinished { outcome, duration } => match outcome {
            TestSuiteOutcome::Passed => {
                info!("baseline passed in {:.1}s", duration.as_secs_f64())
            }
            _ => warn!(?outcome, "baseline did not pass after {:.1}s", duration.as_secs_f64()),
        },
        Event::MutantStarted { index, total, id } => debug!("[{index}/{total}] {id}"),
        Event::MutantFinished { index, total, outcome } => {
            info!("[{index}/{total}] {}", outcome.mutant_label())
        }
        Event::MutationTestingFinished { mutants } => info!("tested {mutants} mutants"),
        _ => {}
    }
}

pub fn print_outcome(outcome: &MutationTestOutcome, project_dir: &Path) {
    let survived = outcome.count(TestSuiteOutcome::Passed);
    let killed = outcome.count(TestSuiteOutcome::Failed);
    let build_errors = outcome.count(TestSuiteOutcome::BuildError);
    let runtime_errors = outcome.count(TestSuiteOutcome::RuntimeError);
    let seconds = outcome.duration.as_secs_f64();

    if survived == 0 {
        let style = Style::new().green().bold();
        println!(
            "{} {} mutants, all killed in {:.1}s",
            style.apply_to("✓"),
            outcome.mutations.len(),
            seconds,
        );
    } else {
        let style = Style::new().yellow().bold();
        println!(
            "{} {} survived / {} mutants ({} killed) in {:.1}s",
            style.apply_to("!"),
            survived,
            outcome.mutations.len(),
            killed,
            seconds,
        );
    }

    let dim = Style::new().dim();
    if build_errors > 0 {
        println!("  {} {} mutants did not compile", dim.apply_to("·"), build_errors);
    }
    if runtime_errors > 0 {
        println!("  {} {} mutants crashed the test run", dim.apply_to("·"), runtime_errors);
    }
    if !outcome.coverage.is_null() {
        println!("  {} project coverage {}%", dim.apply_to("·"), outcome.coverage.percent);
    }

    if survived == 0 {
        return;
    }
    println!();
    for mutation in outcome.survivors() {
        print_survivor(mutation, project_dir);
    }
}

fn print_survivor(mutation: &Mutation, project_dir: &Path) {
    let loc_style = Style::new().cyan().bold();
    let op_style = Style::new().magenta();

    println!(
        "  {} {} {}",
        loc_style.apply_to(format!(
            "{}:{}",
            mutation.relative_path(project_dir).display(),
            mutation.point.position
        )),
        op_style.apply_to(format!("[{}]", mutation.point.operator)),
        mutation.snapshot.description,
    );

    let snapshot = &mutation.snapshot;
    for line in generate_diff(&format!("{}\n", snapshot.before), &format!("{}\n", snapshot.after)).lines() {
        if line.starts_with('-') {
            println!("      {}", Style::new().red().apply_to(line));
        } else if line.starts_with('+') {
            println!("      {}", Style::new().green().apply_to(line));
        }
    }
}

pub fn print_operators() {
    let id_style = Style::new().cyan().bold();
    for operator in OperatorKind::ALL {
        let summary = match operator {
            OperatorKind::RelationalOperatorReplacement => "swaps ==, !=, <, >, <= and >= for their opposites",
            OperatorKind::ChangeLogicalConnector => "swaps && and ||",
            OperatorKind::RemoveSideEffects => "deletes statements whose result is discarded",
            OperatorKind::SwapTernary => "swaps the branches of a ternary expression",
        };
        println!("{} {}", id_style.apply_to(format!("{:<31}", operator.id())), summary);
    }
}
