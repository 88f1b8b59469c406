//! Which Swift files of the working copy get mutated.

use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::debug;
use walkdir::WalkDir;

use crate::coverage::Coverage;
use crate::error::{MutationError, NoCandidatesKind};

/// Path fragments (matched against the project-relative path with a leading
/// `/`) that never contain production code.
pub const DEFAULT_EXCLUSIONS: &[&str] = &[
    "/.swiftpm/",
    "/.build/",
    "/Build/",
    "/Carthage/",
    "/muter_tmp/",
    "/Pods/",
    "/Spec/",
    "/Tests/",
    "Tests.swift",
    "/fastlane/",
    "/Package.swift",
];

/// Sorted list of files to mutate under `root`.
///
/// With an explicit `files_to_mutate` list only those entries are used (globs
/// allowed) and exclusions do not apply. Otherwise every `.swift` file is a
/// candidate unless excluded by default, by `excluded` or for lack of coverage.
pub fn discover_source_files(
    root: &Path,
    excluded: &[String],
    coverage: &Coverage,
    files_to_mutate: &[String],
) -> Result<Vec<PathBuf>, MutationError> {
    if !files_to_mutate.is_empty() {
        let files = exclusive_list(root, files_to_mutate)?;
        if files.is_empty() {
            return Err(MutationError::NoCandidates(
                NoCandidatesKind::NoFilesOnExclusiveList {
                    requested: files_to_mutate.to_vec(),
                },
            ));
        }
        return Ok(files);
    }

    let (fragments, globs) = split_patterns(excluded)?;
    let mut files: Vec<PathBuf> = swift_files(root)
        .into_iter()
        .filter(|path| {
            let relative = relative_path(root, path);
            let rooted = format!("/{relative}");
            let skip = DEFAULT_EXCLUSIONS.iter().any(|f| rooted.contains(f))
                || fragments.iter().any(|f| rooted.contains(f.as_str()))
                || globs.is_match(&relative)
                || coverage.lacks_coverage(path);
            if skip {
                debug!(file = %relative, "excluded from mutation");
            }
            !skip
        })
        .collect();
    files.sort();

    if files.is_empty() {
        return Err(MutationError::NoCandidates(NoCandidatesKind::NoSourceFiles));
    }
    Ok(files)
}

fn exclusive_list(root: &Path, requested: &[String]) -> Result<Vec<PathBuf>, MutationError> {
    let (plain, globs) = split_patterns(requested)?;
    let mut files: Vec<PathBuf> = plain
        .iter()
        .map(|entry| root.join(entry.trim_start_matches('/')))
        .filter(|path| path.is_file())
        .collect();
    if !globs.is_empty() {
        files.extend(
            swift_files(root)
                .into_iter()
                .filter(|path| globs.is_match(relative_path(root, path))),
        );
    }
    files.sort();
    files.dedup();
    Ok(files)
}

fn swift_files(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "swift"))
        .collect()
}

fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn is_glob(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

/// Separate plain path fragments from glob patterns.
fn split_patterns(patterns: &[String]) -> Result<(Vec<String>, GlobSet), MutationError> {
    let mut builder = GlobSetBuilder::new();
    let mut plain = Vec::new();
    for pattern in patterns {
        if is_glob(pattern) {
            let glob = Glob::new(pattern.trim_start_matches('/')).map_err(|e| {
                MutationError::configuration(format!("invalid pattern `{pattern}`: {e}"))
            })?;
            builder.add(glob);
        } else {
            plain.push(pattern.clone());
        }
    }
    let globs = builder
        .build()
        .map_err(|e| MutationError::configuration(e.to_string()))?;
    Ok((plain, globs))
}
