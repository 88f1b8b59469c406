use std::fs;
use std::path::{Path, PathBuf};

const SKIP_NAMES: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    ".build",
    ".swiftpm",
    "DerivedData",
    "muter_tmp",
    "muter-mappings.json",
];

const SKIP_SUFFIXES: &[&str] = &[".xcresult", ".profraw"];

/// Suffix of the sibling directory the project is mutated in.
pub const WORKING_DIRECTORY_SUFFIX: &str = "_mutated";

fn should_skip(name: &str) -> bool {
    SKIP_NAMES.iter().any(|s| *s == name)
        || SKIP_SUFFIXES.iter().any(|s| name.ends_with(s))
}

fn copy_dir_filtered(src: &Path, dst: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let name = entry.file_name();
        let name_str = name.to_string_lossy();
        if should_skip(&name_str) {
            continue;
        }
        let src_path = entry.path();
        let dst_path = dst.join(&name);
        let ft = entry.file_type()?;
        if ft.is_dir() {
            copy_dir_filtered(&src_path, &dst_path)?;
        } else if ft.is_file() {
            fs::copy(&src_path, &dst_path)?;
        }
        // Skip symlinks and other special files
    }
    Ok(())
}

/// `<parent>/<project>_mutated` for a project at `<parent>/<project>`.
pub fn working_directory_for(project_dir: &Path) -> PathBuf {
    let name = project_dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "project".to_string());
    let parent = project_dir.parent().unwrap_or(project_dir);
    parent.join(format!("{name}{WORKING_DIRECTORY_SUFFIX}"))
}

/// Copy the project tree into `dest_root`, leaving out VCS metadata and
/// build products.
pub fn copy_project(project_root: &Path, dest_root: &Path) -> std::io::Result<()> {
    if dest_root.starts_with(project_root) {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "destination lies inside the project",
        ));
    }
    copy_dir_filtered(project_root, dest_root)
}
