//! Runs the test suite once without mutants, then once per mutant with that
//! mutant switched on through its environment variable.

use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::BuildSystem;
use crate::coverage::Coverage;
use crate::error::MutationError;
use crate::events::{Event, EventHandler};
use crate::mapping::SchemataMutationMapping;
use crate::outcome::{Mutation, MutationPoint, MutationTestOutcome, TestSuiteOutcome};
use crate::runner::{ProcessOutput, ProcessRunner};

pub const DEFAULT_BUILD_ERROR_THRESHOLD: usize = 5;

/// Set for every test process so test code can tell it runs under mutation.
pub const RUNNING_FLAG: &str = "IS_MUTER_RUNNING";

/// xcodebuild only forwards variables with this prefix to the test host.
const TEST_RUNNER_PREFIX: &str = "TEST_RUNNER_";

/// How to run the already built tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildDescriptor {
    pub build_system: BuildSystem,
    pub executable: String,
    pub test_arguments: Vec<String>,
    pub working_dir: PathBuf,
}

/// The single active mutant and the environment that selects it.
#[derive(Debug, Clone)]
pub struct MutantToggle {
    build_system: BuildSystem,
    active: Option<String>,
}

impl MutantToggle {
    pub fn new(build_system: BuildSystem) -> Self {
        MutantToggle {
            build_system,
            active: None,
        }
    }

    pub fn switch_on(&mut self, id: &str) {
        self.active = Some(id.to_string());
    }

    pub fn switch_off(&mut self) {
        self.active = None;
    }

    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn environment(&self) -> Vec<(String, String)> {
        let mut environment = vec![(RUNNING_FLAG.to_string(), "YES".to_string())];
        if let Some(id) = &self.active {
            environment.push((id.clone(), "YES".to_string()));
            if self.build_system == BuildSystem::Xcodebuild {
                environment.push((format!("{TEST_RUNNER_PREFIX}{id}"), "YES".to_string()));
            }
        }
        environment
    }
}

pub struct ExecutionEngine<'a> {
    runner: &'a dyn ProcessRunner,
    build_error_threshold: usize,
    on_event: Option<EventHandler<'a>>,
}

impl<'a> ExecutionEngine<'a> {
    pub fn new(runner: &'a dyn ProcessRunner) -> Self {
        ExecutionEngine {
            runner,
            build_error_threshold: DEFAULT_BUILD_ERROR_THRESHOLD,
            on_event: None,
        }
    }

    pub fn with_build_error_threshold(mut self, threshold: usize) -> Self {
        self.build_error_threshold = threshold.max(1);
        self
    }

    pub fn with_event_handler(mut self, handler: Option<EventHandler<'a>>) -> Self {
        self.on_event = handler;
        self
    }

    /// Baseline, then every schema in mapping order. Fails without testing
    /// any mutant when the baseline does not pass, and stops early after
    /// `build_error_threshold` build errors in a row.
    pub fn execute(
        &self,
        descriptor: &BuildDescriptor,
        mappings: &[SchemataMutationMapping],
        project_dir: &Path,
        coverage: Coverage,
    ) -> Result<MutationTestOutcome, MutationError> {
        let started = Instant::now();
        let mut toggle = MutantToggle::new(descriptor.build_system);

        self.notify(Event::BaselineStarted);
        let baseline = self.run_tests(descriptor, &toggle);
        let baseline_outcome = TestSuiteOutcome::from_process(&baseline);
        self.notify(Event::BaselineFinished {
            outcome: baseline_outcome,
            duration: started.elapsed(),
        });
        if baseline_outcome != TestSuiteOutcome::Passed {
            warn!(outcome = ?baseline_outcome, "baseline test run did not pass");
            return Err(MutationError::BaselineTestFailed {
                log: baseline.output,
            });
        }
        debug!(elapsed = ?started.elapsed(), "baseline passed");

        let total: usize = mappings.iter().map(|m| m.count()).sum();
        let mut mutations = Vec::with_capacity(total);
        let mut consecutive_build_errors = 0;

        for (index, schema) in mappings.iter().flat_map(|m| m.all_schemata()).enumerate() {
            let index = index + 1;
            self.notify(Event::MutantStarted {
                index,
                total,
                id: schema.id.clone(),
            });

            toggle.switch_on(&schema.id);
            let run = self.run_tests(descriptor, &toggle);
            toggle.switch_off();

            let outcome = TestSuiteOutcome::from_process(&run);
            debug!(id = %schema.id, outcome = ?outcome, "mutant tested");
            self.notify(Event::MutantFinished {
                index,
                total,
                outcome,
            });

            mutations.push(Mutation {
                test_suite_outcome: outcome,
                point: MutationPoint {
                    operator: schema.operator,
                    file_path: schema.file_path.clone(),
                    position: schema.position,
                },
                snapshot: schema.snapshot.clone(),
                original_project_dir: project_dir.to_path_buf(),
                mutated_project_dir: descriptor.working_dir.clone(),
            });

            if outcome == TestSuiteOutcome::BuildError {
                consecutive_build_errors += 1;
                if consecutive_build_errors >= self.build_error_threshold {
                    warn!(count = consecutive_build_errors, "too many build errors in a row");
                    return Err(MutationError::TooManyBuildErrors {
                        count: consecutive_build_errors,
                    });
                }
            } else {
                consecutive_build_errors = 0;
            }
        }

        self.notify(Event::MutationTestingFinished {
            mutants: mutations.len(),
        });
        Ok(MutationTestOutcome {
            mutations,
            coverage,
            duration: started.elapsed(),
        })
    }

    /// A process that cannot be started is reported as a build error.
    fn run_tests(&self, descriptor: &BuildDescriptor, toggle: &MutantToggle) -> ProcessOutput {
        let result = self.runner.run(
            &descriptor.executable,
            &descriptor.test_arguments,
            &toggle.environment(),
            &descriptor.working_dir,
        );
        match result {
            Ok(output) => output,
            Err(e) => ProcessOutput::new(
                -1,
                format!("error: terminated: could not run {}: {e}", descriptor.executable),
            ),
        }
    }

    fn notify(&self, event: Event) {
        if let Some(handler) = self.on_event {
            handler(&event);
        }
    }
}
