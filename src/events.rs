use std::path::PathBuf;
use std::time::Duration;

use crate::outcome::TestSuiteOutcome;

/// Progress checkpoints reported to an optional observer. Nothing in the run
/// depends on how, or whether, they are handled.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    StepStarted { step: &'static str },
    NewVersionAvailable { version: String },
    SourceFilesDiscovered { count: usize },
    MutationCandidatesDiscovered { count: usize },
    TestPlanWritten { path: PathBuf },
    BaselineStarted,
    BaselineFinished { outcome: TestSuiteOutcome, duration: Duration },
    MutantStarted { index: usize, total: usize, id: String },
    MutantFinished { index: usize, total: usize, outcome: TestSuiteOutcome },
    MutationTestingFinished { mutants: usize },
}

pub type EventHandler<'a> = &'a dyn Fn(&Event);
