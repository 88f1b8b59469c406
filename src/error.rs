//! Error type for a mutation testing run.
//!
//! Every pipeline step returns either its changes or exactly one
//! `MutationError`. The orchestrator never retries; the CLI maps each variant
//! to a stable exit code via [`MutationError::exit_code`].

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Which part of working-copy setup failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStage {
    CleanPreviousRun,
    CopyProject,
    CreateSwapDirectory,
    WriteMutatedSource,
}

impl fmt::Display for SetupStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SetupStage::CleanPreviousRun => "could not remove the previous working copy",
            SetupStage::CopyProject => "could not copy the project",
            SetupStage::CreateSwapDirectory => "could not create the swap file directory",
            SetupStage::WriteMutatedSource => "could not write mutated source",
        };
        f.write_str(text)
    }
}

/// Distinguishes a misconfigured run from a project with nothing to mutate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoCandidatesKind {
    /// Discovery found no Swift source files at all.
    NoSourceFiles,
    /// An explicit file list was given but none of its entries exist.
    NoFilesOnExclusiveList { requested: Vec<String> },
    /// Source files were found but no operator matched anywhere.
    NoMutationCandidates,
}

impl fmt::Display for NoCandidatesKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoCandidatesKind::NoSourceFiles => {
                write!(f, "no source files found; check the exclude list in the configuration")
            }
            NoCandidatesKind::NoFilesOnExclusiveList { requested } => write!(
                f,
                "none of the requested files could be found: {}",
                requested.join(", ")
            ),
            NoCandidatesKind::NoMutationCandidates => {
                write!(f, "no mutation candidates found in the discovered source files")
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum MutationError {
    #[error("invalid configuration: {reason}")]
    Configuration { reason: String },

    #[error("project setup failed ({stage}): {reason}")]
    ProjectSetup { stage: SetupStage, reason: String },

    #[error("{0}")]
    NoCandidates(NoCandidatesKind),

    /// The unmutated build did not pass its own tests.
    #[error("the test suite did not pass without any mutant active")]
    BaselineTestFailed { log: String },

    #[error("aborted after {count} consecutive build errors")]
    TooManyBuildErrors { count: usize },

    #[error("build for testing failed: {reason}")]
    BuildFailure { reason: String, log: String },

    #[error("test plan {}: {reason}", path.display())]
    TestPlan { path: PathBuf, reason: String },
}

impl MutationError {
    pub fn configuration(reason: impl Into<String>) -> Self {
        MutationError::Configuration {
            reason: reason.into(),
        }
    }

    pub fn setup(stage: SetupStage, err: impl fmt::Display) -> Self {
        MutationError::ProjectSetup {
            stage,
            reason: err.to_string(),
        }
    }

    /// Process exit code for this error. 1 is reserved for surviving mutants.
    pub fn exit_code(&self) -> i32 {
        match self {
            MutationError::Configuration { .. } => 2,
            MutationError::TestPlan { .. } => 2,
            MutationError::ProjectSetup { .. } => 3,
            MutationError::NoCandidates(_) => 4,
            MutationError::BaselineTestFailed { .. } => 5,
            MutationError::BuildFailure { .. } => 6,
            MutationError::TooManyBuildErrors { .. } => 7,
        }
    }

    /// Captured build or test output, when the error carries one.
    pub fn log(&self) -> Option<&str> {
        match self {
            MutationError::BaselineTestFailed { log } | MutationError::BuildFailure { log, .. } => {
                Some(log)
            }
            _ => None,
        }
    }
}
