use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::coverage::Coverage;
use crate::mapping::MutationSnapshot;
use crate::operators::OperatorKind;
use crate::position::MutationPosition;
use crate::runner::ProcessOutput;

const BUILD_ERROR_MARKERS: &[&str] = &[
    "xcodebuild: error:",
    "error: terminated",
    "failed with a nonzero exit code",
    "Testing cancelled because the build failed",
    "Command failed with exit code 1.",
];

const TEST_FAILURE_MARKERS: &[&str] = &["** TEST FAILED **", "TESTS FAILED: "];

static FAILURE_COUNT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"with ([1-9][0-9]*) failure").ok());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TestSuiteOutcome {
    Passed,
    Failed,
    BuildError,
    RuntimeError,
}

impl TestSuiteOutcome {
    pub fn from_process(output: &ProcessOutput) -> Self {
        Self::from_log(&output.output, output.exit_code)
    }

    pub fn from_log(log: &str, exit_code: i32) -> Self {
        if BUILD_ERROR_MARKERS.iter().any(|m| log.contains(m)) {
            return TestSuiteOutcome::BuildError;
        }
        let failure_count = FAILURE_COUNT.as_ref().is_some_and(|re| re.is_match(log));
        if failure_count || TEST_FAILURE_MARKERS.iter().any(|m| log.contains(m)) {
            return TestSuiteOutcome::Failed;
        }
        if exit_code != 0 {
            return TestSuiteOutcome::RuntimeError;
        }
        TestSuiteOutcome::Passed
    }

    /// How the outcome reads for a mutant: a passing suite means it survived.
    pub fn mutant_label(&self) -> &'static str {
        match self {
            TestSuiteOutcome::Passed => "survived",
            TestSuiteOutcome::Failed => "killed",
            TestSuiteOutcome::BuildError => "build error",
            TestSuiteOutcome::RuntimeError => "runtime error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationPoint {
    pub operator: OperatorKind,
    pub file_path: PathBuf,
    pub position: MutationPosition,
}

impl MutationPoint {
    pub fn file_name(&self) -> &str {
        self.file_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }
}

/// The result of testing one mutant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mutation {
    pub test_suite_outcome: TestSuiteOutcome,
    pub point: MutationPoint,
    pub snapshot: MutationSnapshot,
    pub original_project_dir: PathBuf,
    pub mutated_project_dir: PathBuf,
}

impl Mutation {
    /// Path of the mutated file inside the user's project.
    pub fn original_file_path(&self) -> PathBuf {
        match self.point.file_path.strip_prefix(&self.mutated_project_dir) {
            Ok(relative) => self.original_project_dir.join(relative),
            Err(_) => self.point.file_path.clone(),
        }
    }

    pub fn survived(&self) -> bool {
        self.test_suite_outcome == TestSuiteOutcome::Passed
    }

    pub fn relative_path(&self, base: &Path) -> PathBuf {
        let original = self.original_file_path();
        original
            .strip_prefix(base)
            .map(Path::to_path_buf)
            .unwrap_or(original)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationTestOutcome {
    pub mutations: Vec<Mutation>,
    pub coverage: Coverage,
    pub duration: Duration,
}

impl MutationTestOutcome {
    pub fn count(&self, outcome: TestSuiteOutcome) -> usize {
        self.mutations
            .iter()
            .filter(|m| m.test_suite_outcome == outcome)
            .count()
    }

    pub fn survivors(&self) -> impl Iterator<Item = &Mutation> {
        self.mutations.iter().filter(|m| m.survived())
    }
}
