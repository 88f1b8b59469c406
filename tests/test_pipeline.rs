mod common;

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

use common::{Call, FakeRunner};
use mutaswift::coverage::{Coverage, CoverageError, CoverageProvider};
use mutaswift::config::MuterConfiguration;
use mutaswift::error::MutationError;
use mutaswift::events::Event;
use mutaswift::outcome::TestSuiteOutcome;
use mutaswift::pipeline::{self, Dependencies, Pipeline, VersionSource, is_newer, steps_for};
use mutaswift::plan::{TEST_PLAN_FILE_NAME, TestPlan};
use mutaswift::rewriter::schemata_condition;
use mutaswift::runner::ProcessOutput;
use mutaswift::state::{RunMode, RunOptions};
use mutaswift::steps::Step;
use tempfile::TempDir;

const CALC: &str = "func isFive(a: Int) -> Bool {\n    if a == 5 {\n        return true\n    }\n    return false\n}\n";

/// `<tmp>/Calculator` with a configuration, a manifest and one source file.
fn calculator() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let project = dir.path().join("Calculator");
    fs::create_dir_all(project.join("Sources/Calc")).unwrap();
    fs::write(project.join("muter.conf.yml"), "executable: swift\narguments:\n  - test\n").unwrap();
    fs::write(project.join("Package.swift"), "// swift-tools-version:5.9\n").unwrap();
    fs::write(project.join("Sources/Calc/Calc.swift"), CALC).unwrap();
    (dir, project)
}

fn options(project: &Path, mode: RunMode) -> RunOptions {
    RunOptions {
        mode,
        skip_coverage: true,
        skip_update_check: true,
        ..RunOptions::new(project)
    }
}

/// Builds succeed; tests pass without a mutant and fail with one.
fn toolchain(call: &Call) -> ProcessOutput {
    if call.arguments.iter().any(|a| a == "--build-tests") {
        return ProcessOutput::new(0, "Build complete!");
    }
    match call.active_mutant() {
        None => common::passed(),
        Some(_) => common::failed(),
    }
}

struct NoCoverage;

impl CoverageProvider for NoCoverage {
    fn coverage(&self, _: &MuterConfiguration, _: &Path) -> Result<Coverage, CoverageError> {
        Err(CoverageError::Process("not measured".to_string()))
    }
}

struct FixedVersion(&'static str);

impl VersionSource for FixedVersion {
    fn latest_version(&self) -> Option<String> {
        Some(self.0.to_string())
    }
}

// --- Step lists ---

#[test]
fn mutate_and_test_runs_every_stage() {
    let steps = steps_for(&RunOptions::new("."));
    assert_eq!(steps.first(), Some(&Step::UpdateCheck));
    assert_eq!(steps.last(), Some(&Step::ExecuteMutationTests));
    assert!(steps.contains(&Step::DiscoverCoverage));
    assert!(steps.contains(&Step::GenerateSwapFilePaths));
    assert!(!steps.contains(&Step::WriteTestPlan));
    assert!(!steps.contains(&Step::LoadTestPlan));
    let rewrite = steps.iter().position(|s| *s == Step::ApplySchemataRewrite).unwrap();
    let build = steps.iter().position(|s| *s == Step::BuildOnce).unwrap();
    assert!(rewrite < build);
}

#[test]
fn mutate_only_stops_at_the_test_plan() {
    let options = RunOptions {
        mode: RunMode::MutateOnly,
        ..RunOptions::new(".")
    };
    let steps = steps_for(&options);
    assert_eq!(steps.last(), Some(&Step::WriteTestPlan));
    assert!(!steps.contains(&Step::BuildOnce));
    assert!(!steps.contains(&Step::ExecuteMutationTests));
}

#[test]
fn test_plan_mode_skips_discovery() {
    let options = RunOptions {
        mode: RunMode::TestPlan,
        ..RunOptions::new(".")
    };
    assert_eq!(
        steps_for(&options),
        [
            Step::UpdateCheck,
            Step::LoadConfiguration,
            Step::LoadTestPlan,
            Step::BuildOnce,
            Step::ExecuteMutationTests,
        ]
    );
}

#[test]
fn flags_remove_optional_steps() {
    let steps = steps_for(&options(Path::new("."), RunMode::MutateAndTest));
    assert!(!steps.contains(&Step::DiscoverCoverage));
    assert!(!steps.contains(&Step::UpdateCheck));
    assert_eq!(steps[0], Step::LoadConfiguration);
}

#[test]
fn every_step_declares_what_it_emits() {
    assert!(Step::PreviousRunCleanup.emits().is_empty());
    assert_eq!(Step::LoadTestPlan.emits().len(), 3);
    assert_eq!(Step::DiscoverMutationCandidates.emits().len(), 2);
}

#[test]
fn version_comparison() {
    assert!(is_newer("1.2.0", "1.1.9"));
    assert!(is_newer("v2.0", "1.9.9"));
    assert!(!is_newer("1.2.0", "1.2.0"));
    assert!(!is_newer("1.2", "1.2.0"));
    assert!(!is_newer("0.9.0", "1.0.0"));
}

// --- Full runs ---

#[test]
fn full_run_mutates_a_copy_and_tests_every_mutant() {
    let (_dir, project) = calculator();
    let runner = FakeRunner::new(toolchain);
    let deps = Dependencies::new(&runner, &NoCoverage);

    let state = pipeline::run(options(&project, RunMode::MutateAndTest), &deps).unwrap();

    let project = fs::canonicalize(&project).unwrap();
    let working = project.parent().unwrap().join("Calculator_mutated");
    assert_eq!(state.project_dir, project);
    assert_eq!(state.working_dir, working);

    let outcome = state.outcome.as_ref().unwrap();
    assert_eq!(outcome.mutations.len(), 1);
    assert_eq!(outcome.count(TestSuiteOutcome::Failed), 1);
    assert!(outcome.coverage.is_null());

    let schema = state.mappings[0].all_schemata().next().unwrap();
    let mutated = fs::read_to_string(working.join("Sources/Calc/Calc.swift")).unwrap();
    assert!(mutated.contains(&schemata_condition(&schema.id)));
    assert!(mutated.contains("import Foundation"));
    assert_eq!(
        fs::read_to_string(working.join("muter_tmp/Calc.swift")).unwrap(),
        CALC
    );
    assert_eq!(
        fs::read_to_string(project.join("Sources/Calc/Calc.swift")).unwrap(),
        CALC
    );

    let calls = runner.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[0].arguments, ["build", "--build-tests"]);
    assert_eq!(calls[1].arguments, ["test", "--skip-build"]);
    assert_eq!(calls[2].active_mutant(), Some(schema.id.as_str()));
    assert!(calls.iter().all(|c| c.working_dir == working));
}

#[test]
fn rerun_replaces_the_previous_working_copy() {
    let (_dir, project) = calculator();
    let runner = FakeRunner::new(toolchain);
    let deps = Dependencies::new(&runner, &NoCoverage);
    let working = pipeline::run(options(&project, RunMode::MutateAndTest), &deps)
        .unwrap()
        .working_dir;
    fs::write(working.join("stale.txt"), "left over").unwrap();

    pipeline::run(options(&project, RunMode::MutateAndTest), &deps).unwrap();
    assert!(!working.join("stale.txt").exists());
}

#[test]
fn coverage_failure_falls_back_to_null_coverage() {
    let (_dir, project) = calculator();
    let runner = FakeRunner::new(toolchain);
    let deps = Dependencies::new(&runner, &NoCoverage);
    let options = RunOptions {
        skip_coverage: false,
        ..options(&project, RunMode::MutateAndTest)
    };
    let state = pipeline::run(options, &deps).unwrap();
    assert!(state.coverage.is_null());
    assert_eq!(state.outcome.unwrap().mutations.len(), 1);
}

#[test]
fn mutate_only_then_test_plan() {
    let (_dir, project) = calculator();
    let runner = FakeRunner::new(toolchain);
    let deps = Dependencies::new(&runner, &NoCoverage);

    let mutated = pipeline::run(options(&project, RunMode::MutateOnly), &deps).unwrap();
    assert!(mutated.outcome.is_none());
    assert!(runner.calls().is_empty());
    let plan_path = mutated.test_plan_path.clone().unwrap();
    assert_eq!(plan_path, mutated.project_dir.join(TEST_PLAN_FILE_NAME));
    let plan = TestPlan::load(&plan_path).unwrap();
    assert_eq!(plan.mutated_project_path, mutated.working_dir);
    assert_eq!(plan.mappings, mutated.mappings);

    let tested = pipeline::run(options(&project, RunMode::TestPlan), &deps).unwrap();
    assert_eq!(tested.working_dir, mutated.working_dir);
    assert_eq!(tested.mappings, mutated.mappings);
    let outcome = tested.outcome.unwrap();
    assert_eq!(outcome.mutations.len(), 1);
    assert_eq!(outcome.count(TestSuiteOutcome::Failed), 1);
}

#[test]
fn test_plan_mode_without_a_plan_fails() {
    let (_dir, project) = calculator();
    let runner = FakeRunner::new(toolchain);
    let deps = Dependencies::new(&runner, &NoCoverage);
    let err = pipeline::run(options(&project, RunMode::TestPlan), &deps).unwrap_err();
    assert!(matches!(err, MutationError::TestPlan { .. }));
}

#[test]
fn failing_build_stops_the_run() {
    let (_dir, project) = calculator();
    let runner = FakeRunner::new(|_: &Call| common::build_error());
    let deps = Dependencies::new(&runner, &NoCoverage);
    let err = pipeline::run(options(&project, RunMode::MutateAndTest), &deps).unwrap_err();
    assert!(matches!(err, MutationError::BuildFailure { .. }));
    assert_eq!(err.exit_code(), 6);
    assert_eq!(runner.calls().len(), 1);
}

#[test]
fn failing_baseline_stops_the_run() {
    let (_dir, project) = calculator();
    let runner = FakeRunner::new(|call: &Call| {
        if call.arguments.iter().any(|a| a == "--build-tests") {
            ProcessOutput::new(0, "Build complete!")
        } else {
            common::failed()
        }
    });
    let deps = Dependencies::new(&runner, &NoCoverage);
    let err = pipeline::run(options(&project, RunMode::MutateAndTest), &deps).unwrap_err();
    assert!(matches!(err, MutationError::BaselineTestFailed { .. }));
    assert_eq!(runner.calls().len(), 2);
}

#[test]
fn missing_configuration_fails_first() {
    let dir = TempDir::new().unwrap();
    let runner = FakeRunner::new(toolchain);
    let deps = Dependencies::new(&runner, &NoCoverage);
    let err = pipeline::run(options(dir.path(), RunMode::MutateAndTest), &deps).unwrap_err();
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn newer_version_is_recorded_and_announced() {
    let (_dir, project) = calculator();
    let runner = FakeRunner::new(toolchain);
    let versions = FixedVersion("999.0.0");
    let events = RefCell::new(Vec::new());
    let record = |event: &Event| events.borrow_mut().push(event.clone());
    let deps = Dependencies::new(&runner, &NoCoverage)
        .with_versions(&versions)
        .with_event_handler(&record);
    let options = RunOptions {
        skip_update_check: false,
        ..options(&project, RunMode::MutateOnly)
    };

    let state = pipeline::run(options, &deps).unwrap();
    assert_eq!(state.new_version.as_deref(), Some("999.0.0"));
    let events = events.borrow();
    assert!(events.contains(&Event::NewVersionAvailable {
        version: "999.0.0".to_string()
    }));
    assert_eq!(events[0], Event::StepStarted { step: "UpdateCheck" });
    assert!(events.contains(&Event::MutationCandidatesDiscovered { count: 1 }));
}

#[test]
fn pipeline_runs_only_its_steps() {
    let (_dir, project) = calculator();
    let runner = FakeRunner::new(toolchain);
    let deps = Dependencies::new(&runner, &NoCoverage);
    let pipeline = Pipeline::new(vec![Step::LoadConfiguration, Step::CreateWorkingDirectory]);
    let state = pipeline
        .run(mutaswift::state::RunState::new(RunOptions::new(&project)), &deps)
        .unwrap();
    assert_eq!(state.configuration.executable, "swift");
    assert!(state.working_dir.ends_with("Calculator_mutated"));
    assert!(!state.working_dir.exists());
    assert!(state.mappings.is_empty());
}
