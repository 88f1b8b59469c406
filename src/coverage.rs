//! Code coverage used to filter out mutants no test can reach.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::{BuildSystem, MuterConfiguration};
use crate::runner::ProcessRunner;

/// A source range with its execution count, in the file's own coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Region {
    pub line_start: usize,
    pub column_start: usize,
    pub line_end: usize,
    pub column_end: usize,
    pub execution_count: u64,
}

impl Region {
    pub fn contains(&self, line: usize, column: usize) -> bool {
        (line, column) >= (self.line_start, self.column_start)
            && (line, column) <= (self.line_end, self.column_end)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coverage {
    /// Project line coverage, or -1 when unknown.
    pub percent: i32,
    pub files_without_coverage: Vec<PathBuf>,
    pub uncovered_regions: BTreeMap<PathBuf, Vec<Region>>,
}

impl Default for Coverage {
    fn default() -> Self {
        Coverage::null()
    }
}

impl Coverage {
    pub fn null() -> Self {
        Coverage {
            percent: -1,
            files_without_coverage: Vec::new(),
            uncovered_regions: BTreeMap::new(),
        }
    }

    pub fn with_percent(percent: i32) -> Self {
        Coverage {
            percent,
            ..Coverage::null()
        }
    }

    pub fn is_null(&self) -> bool {
        self.percent < 0
    }

    /// Uncovered regions for `path`. Report paths may be relative to the
    /// project, so a suffix match is accepted.
    pub fn uncovered_regions_for(&self, path: &Path) -> &[Region] {
        if let Some(regions) = self.uncovered_regions.get(path) {
            return regions;
        }
        self.uncovered_regions
            .iter()
            .find(|(file, _)| path.ends_with(file) || file.ends_with(path))
            .map(|(_, regions)| regions.as_slice())
            .unwrap_or_default()
    }

    pub fn lacks_coverage(&self, path: &Path) -> bool {
        self.files_without_coverage
            .iter()
            .any(|file| file == path || path.ends_with(file) || file.ends_with(path))
    }

    /// Build from an `llvm-cov export` JSON document.
    pub fn from_llvm_export(json: &str) -> Result<Coverage, CoverageError> {
        let export: LlvmExport =
            serde_json::from_str(json).map_err(|e| CoverageError::Report(e.to_string()))?;
        let Some(data) = export.data.into_iter().next() else {
            return Err(CoverageError::Report("export contains no data".to_string()));
        };

        let files_without_coverage = data
            .files
            .iter()
            .filter(|f| f.summary.lines.count > 0 && f.summary.lines.percent <= 0.0)
            .map(|f| PathBuf::from(&f.filename))
            .collect();

        let mut uncovered_regions: BTreeMap<PathBuf, Vec<Region>> = BTreeMap::new();
        for function in &data.functions {
            let Some(file) = function.filenames.first() else {
                continue;
            };
            for raw in &function.regions {
                if let Some(region) = uncovered_region(raw) {
                    uncovered_regions
                        .entry(PathBuf::from(file))
                        .or_default()
                        .push(region);
                }
            }
        }

        Ok(Coverage {
            percent: data.totals.lines.percent.round() as i32,
            files_without_coverage,
            uncovered_regions,
        })
    }
}

/// `[lineStart, colStart, lineEnd, colEnd, count, fileId, expandedFileId, kind]`.
/// Only code regions of the function's own file with a zero count qualify.
fn uncovered_region(raw: &[u64]) -> Option<Region> {
    let [line_start, column_start, line_end, column_end, execution_count, rest @ ..] = raw else {
        return None;
    };
    let file_id = rest.first().copied().unwrap_or(0);
    let kind = rest.get(2).copied().unwrap_or(0);
    if *execution_count != 0 || file_id != 0 || kind != 0 {
        return None;
    }
    Some(Region {
        line_start: *line_start as usize,
        column_start: *column_start as usize,
        line_end: *line_end as usize,
        column_end: *column_end as usize,
        execution_count: 0,
    })
}

#[derive(Deserialize)]
struct LlvmExport {
    data: Vec<LlvmData>,
}

#[derive(Deserialize)]
struct LlvmData {
    #[serde(default)]
    files: Vec<LlvmFile>,
    #[serde(default)]
    functions: Vec<LlvmFunction>,
    totals: LlvmSummary,
}

#[derive(Deserialize)]
struct LlvmFile {
    filename: String,
    summary: LlvmSummary,
}

#[derive(Deserialize)]
struct LlvmFunction {
    #[serde(default)]
    filenames: Vec<String>,
    #[serde(default)]
    regions: Vec<Vec<u64>>,
}

#[derive(Deserialize)]
struct LlvmSummary {
    lines: LlvmCount,
}

#[derive(Deserialize)]
struct LlvmCount {
    #[serde(default)]
    count: u64,
    #[serde(default)]
    percent: f64,
}

#[derive(Debug, Error)]
pub enum CoverageError {
    #[error("coverage is not supported for {0:?} projects")]
    Unsupported(BuildSystem),
    #[error("coverage run failed: {0}")]
    Process(String),
    #[error("could not read coverage report: {0}")]
    Report(String),
}

/// Produces coverage for the project in `project_dir`.
pub trait CoverageProvider {
    fn coverage(
        &self,
        configuration: &MuterConfiguration,
        project_dir: &Path,
    ) -> Result<Coverage, CoverageError>;
}

/// Coverage through `swift test --enable-code-coverage`.
pub struct SwiftCoverage<'a> {
    runner: &'a dyn ProcessRunner,
}

impl<'a> SwiftCoverage<'a> {
    pub fn new(runner: &'a dyn ProcessRunner) -> Self {
        SwiftCoverage { runner }
    }
}

impl CoverageProvider for SwiftCoverage<'_> {
    fn coverage(
        &self,
        configuration: &MuterConfiguration,
        project_dir: &Path,
    ) -> Result<Coverage, CoverageError> {
        let build_system = configuration.build_system();
        if build_system != BuildSystem::Swift {
            return Err(CoverageError::Unsupported(build_system));
        }

        let run = self
            .runner
            .run(
                &configuration.executable,
                &configuration.coverage_arguments(),
                &[],
                project_dir,
            )
            .map_err(|e| CoverageError::Process(e.to_string()))?;
        if !run.success() {
            return Err(CoverageError::Process(format!(
                "tests exited with status {}",
                run.exit_code
            )));
        }

        let arguments = vec!["test".to_string(), "--show-codecov-path".to_string()];
        let located = self
            .runner
            .run(&configuration.executable, &arguments, &[], project_dir)
            .map_err(|e| CoverageError::Process(e.to_string()))?;
        let report = located
            .output
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| line.ends_with(".json"))
            .ok_or_else(|| CoverageError::Report("no coverage report path".to_string()))?;
        debug!(report, "reading coverage report");

        let json =
            std::fs::read_to_string(report).map_err(|e| CoverageError::Report(e.to_string()))?;
        Coverage::from_llvm_export(&json)
    }
}
