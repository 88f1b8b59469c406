use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// A location in a source file. Lines and columns are 1-based, columns count
/// UTF-8 bytes.
///
/// Ordering and equality look at the byte offset only, so a position taken
/// from a tree node compares equal to one computed from the same offset even
/// after its line was shifted with [`MutationPosition::adjusted`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationPosition {
    pub utf8_offset: usize,
    pub line: usize,
    pub column: usize,
}

impl MutationPosition {
    pub fn new(utf8_offset: usize, line: usize, column: usize) -> Self {
        MutationPosition {
            utf8_offset,
            line,
            column,
        }
    }

    /// Position of `offset` in `source`. Offsets past the end clamp to it.
    pub fn from_offset(source: &str, offset: usize) -> Self {
        let offset = offset.min(source.len());
        let before = &source.as_bytes()[..offset];
        let line = before.iter().filter(|&&b| b == b'\n').count() + 1;
        let line_start = before
            .iter()
            .rposition(|&b| b == b'\n')
            .map(|i| i + 1)
            .unwrap_or(0);
        MutationPosition {
            utf8_offset: offset,
            line,
            column: offset - line_start + 1,
        }
    }

    /// Shift the line by `lines`, keeping offset and column. Used to move
    /// positions between a prepared source and the file on disk.
    pub fn adjusted(&self, lines: isize) -> Self {
        let line = (self.line as isize + lines).max(1) as usize;
        MutationPosition { line, ..*self }
    }

    pub fn same_location(&self, other: &MutationPosition) -> bool {
        self.utf8_offset == other.utf8_offset
            && self.line == other.line
            && self.column == other.column
    }
}

impl PartialEq for MutationPosition {
    fn eq(&self, other: &Self) -> bool {
        self.utf8_offset == other.utf8_offset
    }
}

impl Eq for MutationPosition {}

impl PartialOrd for MutationPosition {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MutationPosition {
    fn cmp(&self, other: &Self) -> Ordering {
        self.utf8_offset.cmp(&other.utf8_offset)
    }
}

impl std::fmt::Display for MutationPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}
