//! Run state threaded through the pipeline and the reducer that updates it.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::config::MuterConfiguration;
use crate::coverage::Coverage;
use crate::execution::BuildDescriptor;
use crate::mapping::SchemataMutationMapping;
use crate::operators::OperatorKind;
use crate::outcome::MutationTestOutcome;
use crate::prepare::PreparedSource;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunMode {
    /// Mutate, build and test in one go.
    #[default]
    MutateAndTest,
    /// Mutate and write a test plan, without building or testing.
    MutateOnly,
    /// Build and test a project prepared by an earlier mutate-only run.
    TestPlan,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunOptions {
    pub project_dir: PathBuf,
    pub mode: RunMode,
    pub files_to_mutate: Vec<String>,
    /// Empty means every operator.
    pub operators: Vec<OperatorKind>,
    pub skip_coverage: bool,
    pub skip_update_check: bool,
    pub configuration_path: Option<PathBuf>,
    pub test_plan_path: Option<PathBuf>,
}

impl RunOptions {
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        RunOptions {
            project_dir: project_dir.into(),
            ..RunOptions::default()
        }
    }

    pub fn operators(&self) -> Vec<OperatorKind> {
        if self.operators.is_empty() {
            OperatorKind::ALL.to_vec()
        } else {
            self.operators.clone()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunState {
    pub options: RunOptions,
    pub new_version: Option<String>,
    pub configuration: MuterConfiguration,
    pub project_dir: PathBuf,
    pub working_dir: PathBuf,
    pub coverage: Coverage,
    pub source_files: Vec<PathBuf>,
    pub prepared_sources: BTreeMap<PathBuf, PreparedSource>,
    pub mappings: Vec<SchemataMutationMapping>,
    pub swap_file_paths: BTreeMap<PathBuf, PathBuf>,
    pub test_plan_path: Option<PathBuf>,
    pub build_descriptor: Option<BuildDescriptor>,
    pub outcome: Option<MutationTestOutcome>,
}

/// A committed result of one step. Each variant sets exactly one field.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    NewVersionAvailable(String),
    ConfigurationParsed(MuterConfiguration),
    ProjectDirectoryDiscovered(PathBuf),
    WorkingDirectoryCreated(PathBuf),
    CoverageDiscovered(Coverage),
    SourceFilesDiscovered(Vec<PathBuf>),
    SourceCodePrepared(BTreeMap<PathBuf, PreparedSource>),
    MappingsDiscovered(Vec<SchemataMutationMapping>),
    SwapFilePathsGenerated(BTreeMap<PathBuf, PathBuf>),
    TestPlanWritten(PathBuf),
    BuildDescriptorCreated(BuildDescriptor),
    OutcomeGenerated(MutationTestOutcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    NewVersionAvailable,
    ConfigurationParsed,
    ProjectDirectoryDiscovered,
    WorkingDirectoryCreated,
    CoverageDiscovered,
    SourceFilesDiscovered,
    SourceCodePrepared,
    MappingsDiscovered,
    SwapFilePathsGenerated,
    TestPlanWritten,
    BuildDescriptorCreated,
    OutcomeGenerated,
}

impl Change {
    pub fn kind(&self) -> ChangeKind {
        match self {
            Change::NewVersionAvailable(_) => ChangeKind::NewVersionAvailable,
            Change::ConfigurationParsed(_) => ChangeKind::ConfigurationParsed,
            Change::ProjectDirectoryDiscovered(_) => ChangeKind::ProjectDirectoryDiscovered,
            Change::WorkingDirectoryCreated(_) => ChangeKind::WorkingDirectoryCreated,
            Change::CoverageDiscovered(_) => ChangeKind::CoverageDiscovered,
            Change::SourceFilesDiscovered(_) => ChangeKind::SourceFilesDiscovered,
            Change::SourceCodePrepared(_) => ChangeKind::SourceCodePrepared,
            Change::MappingsDiscovered(_) => ChangeKind::MappingsDiscovered,
            Change::SwapFilePathsGenerated(_) => ChangeKind::SwapFilePathsGenerated,
            Change::TestPlanWritten(_) => ChangeKind::TestPlanWritten,
            Change::BuildDescriptorCreated(_) => ChangeKind::BuildDescriptorCreated,
            Change::OutcomeGenerated(_) => ChangeKind::OutcomeGenerated,
        }
    }
}

impl RunState {
    pub fn new(options: RunOptions) -> Self {
        RunState {
            project_dir: options.project_dir.clone(),
            options,
            ..RunState::default()
        }
    }

    /// Apply committed changes in order.
    pub fn apply(mut self, changes: Vec<Change>) -> Self {
        for change in changes {
            match change {
                Change::NewVersionAvailable(version) => self.new_version = Some(version),
                Change::ConfigurationParsed(configuration) => self.configuration = configuration,
                Change::ProjectDirectoryDiscovered(dir) => self.project_dir = dir,
                Change::WorkingDirectoryCreated(dir) => self.working_dir = dir,
                Change::CoverageDiscovered(coverage) => self.coverage = coverage,
                Change::SourceFilesDiscovered(files) => self.source_files = files,
                Change::SourceCodePrepared(sources) => self.prepared_sources = sources,
                Change::MappingsDiscovered(mappings) => self.mappings = mappings,
                Change::SwapFilePathsGenerated(paths) => self.swap_file_paths = paths,
                Change::TestPlanWritten(path) => self.test_plan_path = Some(path),
                Change::BuildDescriptorCreated(descriptor) => {
                    self.build_descriptor = Some(descriptor)
                }
                Change::OutcomeGenerated(outcome) => self.outcome = Some(outcome),
            }
        }
        self
    }
}
