use serde::{Deserialize, Serialize};

/// Keeps formatters and linters away from the generated switches.
pub const FORMATTER_HEADER: &str = "// swiftformat:disable all\n// swiftlint:disable all\n\n";

const FOUNDATION_IMPORT: &str = "import Foundation\n\n";

/// Source text as it will be rewritten, plus how many lines were added in
/// front of the original file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparedSource {
    pub source: String,
    pub added_lines: usize,
}

impl PreparedSource {
    /// Add the formatter header and, when the file does not already import
    /// it, `import Foundation` so the environment probe resolves.
    pub fn prepare(original: &str) -> Self {
        let mut source = String::with_capacity(original.len() + 96);
        source.push_str(FORMATTER_HEADER);
        if !imports_foundation(original) {
            source.push_str(FOUNDATION_IMPORT);
        }
        let added_lines = line_count(&source);
        source.push_str(original);
        PreparedSource {
            source,
            added_lines,
        }
    }

    pub fn unprepared(original: &str) -> Self {
        PreparedSource {
            source: original.to_string(),
            added_lines: 0,
        }
    }

    /// Line shift taking a position in the prepared text back to the file.
    pub fn line_shift(&self) -> isize {
        -(self.added_lines as isize)
    }
}

fn imports_foundation(source: &str) -> bool {
    source.lines().any(|line| {
        let line = line.trim_start();
        let line = line.strip_prefix("@testable ").unwrap_or(line);
        line.starts_with("import ") && line.contains("Foundation")
    })
}

fn line_count(text: &str) -> usize {
    text.bytes().filter(|&b| b == b'\n').count()
}
