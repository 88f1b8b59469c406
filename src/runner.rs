use std::path::Path;
use std::process::Command;

use tracing::debug;

/// Exit status and interleaved stdout/stderr of a finished process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub exit_code: i32,
    pub output: String,
}

impl ProcessOutput {
    pub fn new(exit_code: i32, output: impl Into<String>) -> Self {
        ProcessOutput {
            exit_code,
            output: output.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs external commands to completion. Build, test and coverage runs all go
/// through this, so a fake can stand in for the toolchain.
pub trait ProcessRunner {
    fn run(
        &self,
        executable: &str,
        arguments: &[String],
        environment: &[(String, String)],
        working_dir: &Path,
    ) -> std::io::Result<ProcessOutput>;
}

pub struct SystemProcessRunner;

impl ProcessRunner for SystemProcessRunner {
    fn run(
        &self,
        executable: &str,
        arguments: &[String],
        environment: &[(String, String)],
        working_dir: &Path,
    ) -> std::io::Result<ProcessOutput> {
        let program = resolve_executable(executable, working_dir);
        debug!(program = %program, ?arguments, "spawning");
        let output = Command::new(&program)
            .args(arguments)
            .envs(environment.iter().map(|(k, v)| (k, v)))
            .current_dir(working_dir)
            .output()?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        Ok(ProcessOutput {
            exit_code: output.status.code().unwrap_or(-1),
            output: format!("{}\n{}", stdout, stderr),
        })
    }
}

/// Make a relative executable path (e.g. `scripts/test.sh`) absolute against
/// the working directory. Bare names are left for PATH lookup.
pub fn resolve_executable(executable: &str, working_dir: &Path) -> String {
    let p = Path::new(executable);
    if p.is_absolute() || !executable.contains('/') {
        return executable.to_string();
    }
    let candidate = working_dir.join(p);
    if candidate.exists() {
        return candidate.to_string_lossy().to_string();
    }
    executable.to_string()
}
