#![allow(dead_code)]

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use mutaswift::runner::{ProcessOutput, ProcessRunner};

pub const PASSING_LOG: &str = "Test Suite 'All tests' passed.\nExecuted 3 tests, with 0 failures (0 unexpected)";
pub const FAILING_LOG: &str = "Test Suite 'All tests' failed.\nExecuted 3 tests, with 1 failure (0 unexpected)";
pub const BUILD_ERROR_LOG: &str = "error: terminated(1): swift-build failed with a nonzero exit code";

/// One recorded invocation.
#[derive(Debug, Clone)]
pub struct Call {
    pub executable: String,
    pub arguments: Vec<String>,
    pub environment: Vec<(String, String)>,
    pub working_dir: PathBuf,
}

impl Call {
    /// The mutant switched on for this call, if any.
    pub fn active_mutant(&self) -> Option<&str> {
        self.environment
            .iter()
            .find(|(k, _)| k != "IS_MUTER_RUNNING" && !k.starts_with("TEST_RUNNER_"))
            .map(|(k, _)| k.as_str())
    }
}

/// Records every call and answers with whatever `respond` returns.
pub struct FakeRunner<F: Fn(&Call) -> ProcessOutput> {
    pub calls: RefCell<Vec<Call>>,
    respond: F,
}

impl<F: Fn(&Call) -> ProcessOutput> FakeRunner<F> {
    pub fn new(respond: F) -> Self {
        FakeRunner {
            calls: RefCell::new(Vec::new()),
            respond,
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }
}

impl<F: Fn(&Call) -> ProcessOutput> ProcessRunner for FakeRunner<F> {
    fn run(
        &self,
        executable: &str,
        arguments: &[String],
        environment: &[(String, String)],
        working_dir: &Path,
    ) -> std::io::Result<ProcessOutput> {
        let call = Call {
            executable: executable.to_string(),
            arguments: arguments.to_vec(),
            environment: environment.to_vec(),
            working_dir: working_dir.to_path_buf(),
        };
        let output = (self.respond)(&call);
        self.calls.borrow_mut().push(call);
        Ok(output)
    }
}

pub fn passed() -> ProcessOutput {
    ProcessOutput::new(0, PASSING_LOG)
}

pub fn failed() -> ProcessOutput {
    ProcessOutput::new(1, FAILING_LOG)
}

pub fn build_error() -> ProcessOutput {
    ProcessOutput::new(1, BUILD_ERROR_LOG)
}
