//! Pipeline steps. Each reads the committed state and returns the changes it
//! wants applied; none of them mutate the state directly.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::{BuildSystem, MuterConfiguration};
use crate::copy_tree;
use crate::coverage::Coverage;
use crate::discovery;
use crate::error::{MutationError, SetupStage};
use crate::events::Event;
use crate::execution::{BuildDescriptor, ExecutionEngine, RUNNING_FLAG};
use crate::pipeline::{Dependencies, is_newer};
use crate::plan::{TEST_PLAN_FILE_NAME, TestPlan};
use crate::rewriter;
use crate::sources;
use crate::state::{Change, ChangeKind, RunState};

/// Directory inside the working copy holding untouched copies of rewritten
/// files.
pub const SWAP_DIRECTORY: &str = "muter_tmp";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    UpdateCheck,
    LoadConfiguration,
    LoadTestPlan,
    CreateWorkingDirectory,
    PreviousRunCleanup,
    CopyProjectToWorkingDirectory,
    DiscoverCoverage,
    DiscoverSourceFiles,
    DiscoverMutationCandidates,
    GenerateSwapFilePaths,
    ApplySchemataRewrite,
    WriteTestPlan,
    BuildOnce,
    ExecuteMutationTests,
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::UpdateCheck => "UpdateCheck",
            Step::LoadConfiguration => "LoadConfiguration",
            Step::LoadTestPlan => "LoadTestPlan",
            Step::CreateWorkingDirectory => "CreateWorkingDirectory",
            Step::PreviousRunCleanup => "PreviousRunCleanup",
            Step::CopyProjectToWorkingDirectory => "CopyProjectToWorkingDirectory",
            Step::DiscoverCoverage => "DiscoverCoverage",
            Step::DiscoverSourceFiles => "DiscoverSourceFiles",
            Step::DiscoverMutationCandidates => "DiscoverMutationCandidates",
            Step::GenerateSwapFilePaths => "GenerateSwapFilePaths",
            Step::ApplySchemataRewrite => "ApplySchemataRewrite",
            Step::WriteTestPlan => "WriteTestPlan",
            Step::BuildOnce => "BuildOnce",
            Step::ExecuteMutationTests => "ExecuteMutationTests",
        }
    }

    /// Change kinds this step may emit.
    pub fn emits(&self) -> &'static [ChangeKind] {
        match self {
            Step::UpdateCheck => &[ChangeKind::NewVersionAvailable],
            Step::LoadConfiguration => &[
                ChangeKind::ConfigurationParsed,
                ChangeKind::ProjectDirectoryDiscovered,
            ],
            Step::LoadTestPlan => &[
                ChangeKind::WorkingDirectoryCreated,
                ChangeKind::CoverageDiscovered,
                ChangeKind::MappingsDiscovered,
            ],
            Step::CreateWorkingDirectory => &[ChangeKind::WorkingDirectoryCreated],
            Step::PreviousRunCleanup => &[],
            Step::CopyProjectToWorkingDirectory => &[],
            Step::DiscoverCoverage => &[ChangeKind::CoverageDiscovered],
            Step::DiscoverSourceFiles => &[ChangeKind::SourceFilesDiscovered],
            Step::DiscoverMutationCandidates => &[
                ChangeKind::MappingsDiscovered,
                ChangeKind::SourceCodePrepared,
            ],
            Step::GenerateSwapFilePaths => &[ChangeKind::SwapFilePathsGenerated],
            Step::ApplySchemataRewrite => &[],
            Step::WriteTestPlan => &[ChangeKind::TestPlanWritten],
            Step::BuildOnce => &[ChangeKind::BuildDescriptorCreated],
            Step::ExecuteMutationTests => &[ChangeKind::OutcomeGenerated],
        }
    }

    pub fn run(&self, state: &RunState, deps: &Dependencies) -> Result<Vec<Change>, MutationError> {
        match self {
            Step::UpdateCheck => Ok(update_check(deps)),
            Step::LoadConfiguration => load_configuration(state),
            Step::LoadTestPlan => load_test_plan(state),
            Step::CreateWorkingDirectory => Ok(vec![Change::WorkingDirectoryCreated(
                copy_tree::working_directory_for(&state.project_dir),
            )]),
            Step::PreviousRunCleanup => previous_run_cleanup(state),
            Step::CopyProjectToWorkingDirectory => {
                copy_tree::copy_project(&state.project_dir, &state.working_dir)
                    .map_err(|e| MutationError::setup(SetupStage::CopyProject, e))?;
                info!(to = %state.working_dir.display(), "copied project");
                Ok(vec![])
            }
            Step::DiscoverCoverage => Ok(discover_coverage(state, deps)),
            Step::DiscoverSourceFiles => discover_source_files(state, deps),
            Step::DiscoverMutationCandidates => discover_mutation_candidates(state, deps),
            Step::GenerateSwapFilePaths => generate_swap_file_paths(state),
            Step::ApplySchemataRewrite => apply_schemata_rewrite(state),
            Step::WriteTestPlan => write_test_plan(state, deps),
            Step::BuildOnce => build_once(state, deps),
            Step::ExecuteMutationTests => execute_mutation_tests(state, deps),
        }
    }
}

fn update_check(deps: &Dependencies) -> Vec<Change> {
    let Some(latest) = deps.versions.latest_version() else {
        return vec![];
    };
    if !is_newer(&latest, env!("CARGO_PKG_VERSION")) {
        return vec![];
    }
    info!(version = %latest, "a newer version is available");
    deps.notify(Event::NewVersionAvailable {
        version: latest.clone(),
    });
    vec![Change::NewVersionAvailable(latest)]
}

fn load_configuration(state: &RunState) -> Result<Vec<Change>, MutationError> {
    let project_dir = fs::canonicalize(&state.options.project_dir).map_err(|e| {
        MutationError::configuration(format!(
            "project directory {}: {e}",
            state.options.project_dir.display()
        ))
    })?;
    let path = MuterConfiguration::locate(&project_dir, state.options.configuration_path.as_deref())?;
    let configuration = MuterConfiguration::load(&path)?;
    info!(file = %path.display(), executable = %configuration.executable, "loaded configuration");
    Ok(vec![
        Change::ConfigurationParsed(configuration),
        Change::ProjectDirectoryDiscovered(project_dir),
    ])
}

fn test_plan_path(state: &RunState) -> PathBuf {
    state
        .options
        .test_plan_path
        .clone()
        .unwrap_or_else(|| state.project_dir.join(TEST_PLAN_FILE_NAME))
}

fn load_test_plan(state: &RunState) -> Result<Vec<Change>, MutationError> {
    let path = test_plan_path(state);
    let plan = TestPlan::load(&path)?;
    if !plan.mutated_project_path.is_dir() {
        return Err(MutationError::TestPlan {
            path,
            reason: format!(
                "mutated project {} does not exist",
                plan.mutated_project_path.display()
            ),
        });
    }
    info!(file = %path.display(), mappings = plan.mappings.len(), "loaded test plan");
    Ok(vec![
        Change::WorkingDirectoryCreated(plan.mutated_project_path),
        Change::CoverageDiscovered(Coverage::with_percent(plan.project_coverage)),
        Change::MappingsDiscovered(plan.mappings),
    ])
}

fn previous_run_cleanup(state: &RunState) -> Result<Vec<Change>, MutationError> {
    if state.working_dir.exists() {
        debug!(dir = %state.working_dir.display(), "removing previous working copy");
        fs::remove_dir_all(&state.working_dir)
            .map_err(|e| MutationError::setup(SetupStage::CleanPreviousRun, e))?;
    }
    Ok(vec![])
}

fn discover_coverage(state: &RunState, deps: &Dependencies) -> Vec<Change> {
    let coverage = match deps.coverage.coverage(&state.configuration, &state.working_dir) {
        Ok(coverage) => {
            info!(percent = coverage.percent, "project coverage");
            coverage
        }
        Err(e) => {
            warn!(error = %e, "continuing without coverage");
            Coverage::null()
        }
    };
    vec![Change::CoverageDiscovered(coverage)]
}

fn discover_source_files(state: &RunState, deps: &Dependencies) -> Result<Vec<Change>, MutationError> {
    let files = sources::discover_source_files(
        &state.working_dir,
        &state.configuration.excluded_files,
        &state.coverage,
        &state.options.files_to_mutate,
    )?;
    info!(count = files.len(), "discovered source files");
    deps.notify(Event::SourceFilesDiscovered { count: files.len() });
    Ok(vec![Change::SourceFilesDiscovered(files)])
}

fn discover_mutation_candidates(
    state: &RunState,
    deps: &Dependencies,
) -> Result<Vec<Change>, MutationError> {
    let found = discovery::discover_mutation_candidates(
        &state.source_files,
        &state.options.operators(),
        &state.configuration.excluded_calls,
        &state.coverage,
    )?;
    info!(
        candidates = found.count(),
        files = found.mappings.len(),
        "discovered mutation candidates"
    );
    deps.notify(Event::MutationCandidatesDiscovered {
        count: found.count(),
    });
    Ok(vec![
        Change::MappingsDiscovered(found.mappings),
        Change::SourceCodePrepared(found.prepared),
    ])
}

fn generate_swap_file_paths(state: &RunState) -> Result<Vec<Change>, MutationError> {
    let swap_dir = state.working_dir.join(SWAP_DIRECTORY);
    fs::create_dir_all(&swap_dir)
        .map_err(|e| MutationError::setup(SetupStage::CreateSwapDirectory, e))?;

    let mut used = HashSet::new();
    let mut paths = BTreeMap::new();
    for mapping in &state.mappings {
        let mut name = mapping.file_name().to_string();
        if !used.insert(name.clone()) {
            name = flattened_name(&state.working_dir, &mapping.file_path);
            used.insert(name.clone());
        }
        paths.insert(mapping.file_path.clone(), swap_dir.join(name));
    }
    Ok(vec![Change::SwapFilePathsGenerated(paths)])
}

/// `Sources/App/Model.swift` becomes `Sources_App_Model.swift`.
fn flattened_name(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("_")
}

fn apply_schemata_rewrite(state: &RunState) -> Result<Vec<Change>, MutationError> {
    for mapping in &state.mappings {
        let path = &mapping.file_path;
        let prepared = state.prepared_sources.get(path).ok_or_else(|| {
            MutationError::setup(
                SetupStage::WriteMutatedSource,
                format!("no prepared source for {}", path.display()),
            )
        })?;
        if let Some(swap) = state.swap_file_paths.get(path) {
            fs::copy(path, swap).map_err(|e| MutationError::setup(SetupStage::WriteMutatedSource, e))?;
        }
        let rewritten = rewriter::format_code(&rewriter::rewrite(&prepared.source, mapping));
        fs::write(path, rewritten)
            .map_err(|e| MutationError::setup(SetupStage::WriteMutatedSource, e))?;
        debug!(file = %path.display(), schemata = mapping.count(), "embedded schemata");
    }
    Ok(vec![])
}

fn write_test_plan(state: &RunState, deps: &Dependencies) -> Result<Vec<Change>, MutationError> {
    let path = test_plan_path(state);
    let plan = TestPlan {
        mutated_project_path: state.working_dir.clone(),
        project_coverage: state.coverage.percent,
        mappings: state.mappings.clone(),
    };
    plan.write(&path)?;
    info!(file = %path.display(), "wrote test plan");
    deps.notify(Event::TestPlanWritten { path: path.clone() });
    Ok(vec![Change::TestPlanWritten(path)])
}

fn build_once(state: &RunState, deps: &Dependencies) -> Result<Vec<Change>, MutationError> {
    let configuration = &state.configuration;
    let working_dir = state.working_dir.clone();

    if let Some(arguments) = configuration.build_for_testing_arguments() {
        info!(executable = %configuration.executable, "building for testing");
        let environment = [(RUNNING_FLAG.to_string(), "YES".to_string())];
        let run = deps
            .runner
            .run(&configuration.executable, &arguments, &environment, &working_dir)
            .map_err(|e| MutationError::BuildFailure {
                reason: format!("could not run {}: {e}", configuration.executable),
                log: String::new(),
            })?;
        if !run.success() {
            return Err(MutationError::BuildFailure {
                reason: format!(
                    "{} exited with status {}",
                    configuration.executable, run.exit_code
                ),
                log: run.output,
            });
        }
    }

    let build_system = configuration.build_system();
    let test_arguments = match build_system {
        BuildSystem::Xcodebuild => xcodebuild_test_arguments(configuration, &working_dir)?,
        _ => configuration.test_without_building_arguments(),
    };
    Ok(vec![Change::BuildDescriptorCreated(BuildDescriptor {
        build_system,
        executable: configuration.executable.clone(),
        test_arguments,
        working_dir,
    })])
}

/// With `-derivedDataPath`, run the tests from the `.xctestrun` file the
/// build produced; otherwise fall back to `test-without-building`.
fn xcodebuild_test_arguments(
    configuration: &MuterConfiguration,
    working_dir: &Path,
) -> Result<Vec<String>, MutationError> {
    let Some(derived_data) = configuration.argument_value("-derivedDataPath") else {
        return Ok(configuration.test_without_building_arguments());
    };
    let products = working_dir.join(derived_data).join("Build").join("Products");
    let newest = WalkDir::new(&products)
        .max_depth(2)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "xctestrun"))
        .filter_map(|e| {
            let modified = e.metadata().ok()?.modified().ok()?;
            Some((modified, e.into_path()))
        })
        .max_by_key(|(modified, _)| *modified)
        .map(|(_, path)| path);
    let Some(xctestrun) = newest else {
        return Err(MutationError::BuildFailure {
            reason: format!("no .xctestrun file under {}", products.display()),
            log: String::new(),
        });
    };

    let mut arguments = vec![
        "test-without-building".to_string(),
        "-xctestrun".to_string(),
        xctestrun.to_string_lossy().to_string(),
    ];
    if let Some(destination) = configuration.argument_value("-destination") {
        arguments.push("-destination".to_string());
        arguments.push(destination.to_string());
    }
    Ok(arguments)
}

fn execute_mutation_tests(state: &RunState, deps: &Dependencies) -> Result<Vec<Change>, MutationError> {
    let descriptor = state
        .build_descriptor
        .as_ref()
        .ok_or_else(|| MutationError::BuildFailure {
            reason: "tests were not built".to_string(),
            log: String::new(),
        })?;
    let engine = ExecutionEngine::new(deps.runner)
        .with_build_error_threshold(deps.build_error_threshold)
        .with_event_handler(deps.on_event);
    let outcome = engine.execute(
        descriptor,
        &state.mappings,
        &state.project_dir,
        state.coverage.clone(),
    )?;
    info!(
        mutants = outcome.mutations.len(),
        elapsed = ?outcome.duration,
        "mutation testing finished"
    );
    Ok(vec![Change::OutcomeGenerated(outcome)])
}
