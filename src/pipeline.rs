//! Ordered step lists per run mode and the loop that runs them.

use tracing::{debug, info};

use crate::coverage::CoverageProvider;
use crate::error::MutationError;
use crate::events::{Event, EventHandler};
use crate::execution::DEFAULT_BUILD_ERROR_THRESHOLD;
use crate::runner::ProcessRunner;
use crate::state::{RunMode, RunOptions, RunState};
use crate::steps::Step;

/// Where the update check learns about released versions.
pub trait VersionSource {
    fn latest_version(&self) -> Option<String>;
}

/// Never reports a newer version.
pub struct NoVersionSource;

impl VersionSource for NoVersionSource {
    fn latest_version(&self) -> Option<String> {
        None
    }
}

/// Whether dotted version `candidate` is newer than `current`. Non-numeric
/// components compare as zero.
pub fn is_newer(candidate: &str, current: &str) -> bool {
    let parse = |v: &str| -> Vec<u64> {
        v.trim_start_matches('v')
            .split('.')
            .map(|part| part.parse().unwrap_or(0))
            .collect()
    };
    let (a, b) = (parse(candidate), parse(current));
    let len = a.len().max(b.len());
    for i in 0..len {
        let (x, y) = (a.get(i).copied().unwrap_or(0), b.get(i).copied().unwrap_or(0));
        if x != y {
            return x > y;
        }
    }
    false
}

/// External collaborators the steps talk to.
pub struct Dependencies<'a> {
    pub runner: &'a dyn ProcessRunner,
    pub coverage: &'a dyn CoverageProvider,
    pub versions: &'a dyn VersionSource,
    pub build_error_threshold: usize,
    pub on_event: Option<EventHandler<'a>>,
}

impl<'a> Dependencies<'a> {
    pub fn new(runner: &'a dyn ProcessRunner, coverage: &'a dyn CoverageProvider) -> Self {
        Dependencies {
            runner,
            coverage,
            versions: &NoVersionSource,
            build_error_threshold: DEFAULT_BUILD_ERROR_THRESHOLD,
            on_event: None,
        }
    }

    pub fn with_versions(mut self, versions: &'a dyn VersionSource) -> Self {
        self.versions = versions;
        self
    }

    pub fn with_build_error_threshold(mut self, threshold: usize) -> Self {
        self.build_error_threshold = threshold;
        self
    }

    pub fn with_event_handler(mut self, handler: EventHandler<'a>) -> Self {
        self.on_event = Some(handler);
        self
    }

    pub fn notify(&self, event: Event) {
        if let Some(handler) = self.on_event {
            handler(&event);
        }
    }
}

/// Steps for the mode in `options`, minus those switched off by flags.
pub fn steps_for(options: &RunOptions) -> Vec<Step> {
    use Step::*;
    let steps: &[Step] = match options.mode {
        RunMode::MutateAndTest => &[
            UpdateCheck,
            LoadConfiguration,
            CreateWorkingDirectory,
            PreviousRunCleanup,
            CopyProjectToWorkingDirectory,
            DiscoverCoverage,
            DiscoverSourceFiles,
            DiscoverMutationCandidates,
            GenerateSwapFilePaths,
            ApplySchemataRewrite,
            BuildOnce,
            ExecuteMutationTests,
        ],
        RunMode::MutateOnly => &[
            UpdateCheck,
            LoadConfiguration,
            CreateWorkingDirectory,
            PreviousRunCleanup,
            CopyProjectToWorkingDirectory,
            DiscoverCoverage,
            DiscoverSourceFiles,
            DiscoverMutationCandidates,
            ApplySchemataRewrite,
            WriteTestPlan,
        ],
        RunMode::TestPlan => &[
            UpdateCheck,
            LoadConfiguration,
            LoadTestPlan,
            BuildOnce,
            ExecuteMutationTests,
        ],
    };
    steps
        .iter()
        .copied()
        .filter(|step| !(options.skip_coverage && *step == DiscoverCoverage))
        .filter(|step| !(options.skip_update_check && *step == UpdateCheck))
        .collect()
}

pub struct Pipeline {
    steps: Vec<Step>,
}

impl Pipeline {
    pub fn new(steps: Vec<Step>) -> Self {
        Pipeline { steps }
    }

    pub fn for_options(options: &RunOptions) -> Self {
        Pipeline::new(steps_for(options))
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Run every step in order, committing each step's changes before the
    /// next one starts. The first error ends the run.
    pub fn run(&self, mut state: RunState, deps: &Dependencies) -> Result<RunState, MutationError> {
        for step in &self.steps {
            deps.notify(Event::StepStarted { step: step.name() });
            debug!(step = step.name(), "starting step");
            let changes = step.run(&state, deps)?;
            debug_assert!(
                changes.iter().all(|c| step.emits().contains(&c.kind())),
                "{} emitted an undeclared change",
                step.name()
            );
            state = state.apply(changes);
        }
        info!(steps = self.steps.len(), "run finished");
        Ok(state)
    }
}

/// Run the pipeline selected by `options`.
pub fn run(options: RunOptions, deps: &Dependencies) -> Result<RunState, MutationError> {
    let pipeline = Pipeline::for_options(&options);
    pipeline.run(RunState::new(options), deps)
}
