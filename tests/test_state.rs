use std::collections::BTreeMap;
use std::path::PathBuf;

use mutaswift::config::MuterConfiguration;
use mutaswift::coverage::Coverage;
use mutaswift::mapping::{CodeBlock, MutationSchema, MutationSnapshot, SchemataMutationMapping};
use mutaswift::operators::OperatorKind;
use mutaswift::plan::TestPlan;
use mutaswift::position::MutationPosition;
use mutaswift::state::{Change, ChangeKind, RunOptions, RunState};
use tempfile::TempDir;

fn mapping() -> SchemataMutationMapping {
    let block = CodeBlock::new(60, 90, false);
    let mut mapping = SchemataMutationMapping::new("/work/App_mutated/Sources/Calc.swift");
    mapping.add(MutationSchema {
        id: "Calc_RelationalOperatorReplacement_4_13_70".to_string(),
        file_path: "/work/App_mutated/Sources/Calc.swift".into(),
        operator: OperatorKind::RelationalOperatorReplacement,
        position: MutationPosition::new(70, 4, 13),
        block,
        replacement: "if a != 5 {}".to_string(),
        snapshot: MutationSnapshot::new("==", "!=", "changed == to !="),
    });
    mapping
}

// --- Reducer ---

#[test]
fn new_state_starts_from_options() {
    let state = RunState::new(RunOptions::new("/work/App"));
    assert_eq!(state.project_dir, PathBuf::from("/work/App"));
    assert!(state.coverage.is_null());
    assert!(state.mappings.is_empty());
    assert!(state.outcome.is_none());
}

#[test]
fn each_change_sets_its_field() {
    let configuration = MuterConfiguration {
        executable: "swift".to_string(),
        ..MuterConfiguration::default()
    };
    let swap = BTreeMap::from([(
        PathBuf::from("/work/App_mutated/Sources/Calc.swift"),
        PathBuf::from("/work/App_mutated/muter_tmp/Calc.swift"),
    )]);
    let state = RunState::new(RunOptions::new("App")).apply(vec![
        Change::ConfigurationParsed(configuration.clone()),
        Change::ProjectDirectoryDiscovered("/work/App".into()),
        Change::WorkingDirectoryCreated("/work/App_mutated".into()),
        Change::CoverageDiscovered(Coverage::with_percent(80)),
        Change::SourceFilesDiscovered(vec!["/work/App_mutated/Sources/Calc.swift".into()]),
        Change::MappingsDiscovered(vec![mapping()]),
        Change::SwapFilePathsGenerated(swap.clone()),
        Change::NewVersionAvailable("9.9.9".to_string()),
    ]);

    assert_eq!(state.configuration, configuration);
    assert_eq!(state.project_dir, PathBuf::from("/work/App"));
    assert_eq!(state.working_dir, PathBuf::from("/work/App_mutated"));
    assert_eq!(state.coverage.percent, 80);
    assert_eq!(state.source_files.len(), 1);
    assert_eq!(state.mappings, vec![mapping()]);
    assert_eq!(state.swap_file_paths, swap);
    assert_eq!(state.new_version.as_deref(), Some("9.9.9"));
}

#[test]
fn later_changes_win() {
    let state = RunState::default().apply(vec![
        Change::CoverageDiscovered(Coverage::with_percent(10)),
        Change::CoverageDiscovered(Coverage::with_percent(20)),
    ]);
    assert_eq!(state.coverage.percent, 20);
}

#[test]
fn applying_nothing_changes_nothing() {
    let state = RunState::new(RunOptions::new("/work/App"))
        .apply(vec![Change::MappingsDiscovered(vec![mapping()])]);
    assert_eq!(state.clone().apply(vec![]), state);
}

#[test]
fn change_kinds_match_variants() {
    assert_eq!(
        Change::TestPlanWritten("plan.json".into()).kind(),
        ChangeKind::TestPlanWritten
    );
    assert_eq!(
        Change::CoverageDiscovered(Coverage::null()).kind(),
        ChangeKind::CoverageDiscovered
    );
}

#[test]
fn empty_operator_selection_means_all() {
    let mut options = RunOptions::new(".");
    assert_eq!(options.operators(), OperatorKind::ALL.to_vec());
    options.operators = vec![OperatorKind::SwapTernary];
    assert_eq!(options.operators(), [OperatorKind::SwapTernary]);
}

// --- Test plan ---

#[test]
fn test_plan_survives_a_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("muter-mappings.json");
    let plan = TestPlan {
        mutated_project_path: "/work/App_mutated".into(),
        project_coverage: 73,
        mappings: vec![mapping()],
    };
    plan.write(&path).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("\"mutatedProjectPath\""));
    assert!(text.contains("\"projectCoverage\": 73"));
    assert_eq!(TestPlan::load(&path).unwrap(), plan);
}

#[test]
fn unreadable_test_plan_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("muter-mappings.json");
    assert!(TestPlan::load(&path).is_err());
    std::fs::write(&path, "{\"mappings\": 3}").unwrap();
    let err = TestPlan::load(&path).unwrap_err();
    assert_eq!(err.exit_code(), 2);
}
