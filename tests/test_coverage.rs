mod common;

use std::path::{Path, PathBuf};

use common::{Call, FakeRunner};
use mutaswift::config::MuterConfiguration;
use mutaswift::coverage::{Coverage, CoverageError, CoverageProvider, Region, SwiftCoverage};
use mutaswift::runner::ProcessOutput;
use tempfile::TempDir;

const EXPORT: &str = r#"{
  "type": "llvm.coverage.json.export",
  "version": "2.0.1",
  "data": [{
    "files": [
      {"filename": "/p/Sources/Calc/Calc.swift", "summary": {"lines": {"count": 40, "covered": 30, "percent": 75.0}}},
      {"filename": "/p/Sources/Calc/Unused.swift", "summary": {"lines": {"count": 12, "covered": 0, "percent": 0.0}}},
      {"filename": "/p/Sources/Calc/Empty.swift", "summary": {"lines": {"count": 0, "covered": 0, "percent": 0.0}}}
    ],
    "functions": [
      {
        "name": "add",
        "filenames": ["/p/Sources/Calc/Calc.swift"],
        "regions": [
          [3, 30, 9, 2, 4, 0, 0, 0],
          [5, 9, 7, 6, 0, 0, 0, 0],
          [6, 1, 6, 20, 0, 1, 0, 0],
          [8, 1, 8, 10, 0, 0, 0, 2]
        ]
      }
    ],
    "totals": {"lines": {"count": 52, "covered": 30, "percent": 57.69}}
  }]
}"#;

#[test]
fn export_percent_is_rounded() {
    let coverage = Coverage::from_llvm_export(EXPORT).unwrap();
    assert_eq!(coverage.percent, 58);
    assert!(!coverage.is_null());
}

#[test]
fn files_with_lines_but_no_coverage_are_listed() {
    let coverage = Coverage::from_llvm_export(EXPORT).unwrap();
    assert_eq!(
        coverage.files_without_coverage,
        vec![PathBuf::from("/p/Sources/Calc/Unused.swift")]
    );
    assert!(coverage.lacks_coverage(Path::new("/p/Sources/Calc/Unused.swift")));
    assert!(!coverage.lacks_coverage(Path::new("/p/Sources/Calc/Calc.swift")));
}

#[test]
fn only_unexecuted_code_regions_of_the_own_file_count() {
    let coverage = Coverage::from_llvm_export(EXPORT).unwrap();
    let regions = coverage.uncovered_regions_for(Path::new("/p/Sources/Calc/Calc.swift"));
    assert_eq!(
        regions,
        [Region {
            line_start: 5,
            column_start: 9,
            line_end: 7,
            column_end: 6,
            execution_count: 0,
        }]
    );
}

#[test]
fn region_lookup_accepts_path_suffixes() {
    let coverage = Coverage::from_llvm_export(EXPORT).unwrap();
    assert_eq!(coverage.uncovered_regions_for(Path::new("Sources/Calc/Calc.swift")).len(), 1);
    assert!(coverage.uncovered_regions_for(Path::new("Other.swift")).is_empty());
}

#[test]
fn region_containment_is_inclusive() {
    let region = Region {
        line_start: 5,
        column_start: 9,
        line_end: 7,
        column_end: 6,
        execution_count: 0,
    };
    assert!(region.contains(5, 9));
    assert!(region.contains(6, 1));
    assert!(region.contains(7, 6));
    assert!(!region.contains(5, 8));
    assert!(!region.contains(7, 7));
}

#[test]
fn malformed_export_is_a_report_error() {
    assert!(matches!(
        Coverage::from_llvm_export("{\"data\": []}"),
        Err(CoverageError::Report(_))
    ));
    assert!(matches!(Coverage::from_llvm_export("nope"), Err(CoverageError::Report(_))));
}

#[test]
fn null_coverage_filters_nothing() {
    let coverage = Coverage::null();
    assert!(coverage.is_null());
    assert_eq!(coverage.percent, -1);
    assert!(!coverage.lacks_coverage(Path::new("A.swift")));
    assert!(coverage.uncovered_regions_for(Path::new("A.swift")).is_empty());
    assert_eq!(Coverage::default(), coverage);
}

// --- Provider ---

fn swift_configuration() -> MuterConfiguration {
    MuterConfiguration {
        executable: "swift".to_string(),
        arguments: vec!["test".to_string()],
        ..MuterConfiguration::default()
    }
}

#[test]
fn swift_coverage_reads_the_reported_file() {
    let dir = TempDir::new().unwrap();
    let report = dir.path().join("codecov.json");
    std::fs::write(&report, EXPORT).unwrap();
    let report_path = report.to_string_lossy().to_string();

    let runner = FakeRunner::new(|call: &Call| {
        if call.arguments.iter().any(|a| a == "--show-codecov-path") {
            ProcessOutput::new(0, format!("Building...\n{report_path}\n"))
        } else {
            common::passed()
        }
    });
    let coverage = SwiftCoverage::new(&runner)
        .coverage(&swift_configuration(), dir.path())
        .unwrap();
    assert_eq!(coverage.percent, 58);

    let calls = runner.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].arguments, ["test", "--enable-code-coverage"]);
    assert_eq!(calls[1].arguments, ["test", "--show-codecov-path"]);
}

#[test]
fn failing_coverage_run_is_reported() {
    let runner = FakeRunner::new(|_: &Call| common::failed());
    let result = SwiftCoverage::new(&runner).coverage(&swift_configuration(), Path::new("."));
    assert!(matches!(result, Err(CoverageError::Process(_))));
}

#[test]
fn xcodebuild_coverage_is_unsupported() {
    let runner = FakeRunner::new(|_: &Call| common::passed());
    let configuration = MuterConfiguration {
        executable: "/usr/bin/xcodebuild".to_string(),
        ..MuterConfiguration::default()
    };
    let result = SwiftCoverage::new(&runner).coverage(&configuration, Path::new("."));
    assert!(matches!(result, Err(CoverageError::Unsupported(_))));
    assert!(runner.calls().is_empty());
}
