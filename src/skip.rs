use std::ops::Range;

use tree_sitter::Node;

use crate::syntax::{self, node_text};

pub const SKIP_MARKER: &str = "muter:skip";
pub const DISABLE_MARKER: &str = "muter:disable";
pub const ENABLE_MARKER: &str = "muter:enable";

/// Byte ranges of a file that must not be mutated.
///
/// `// muter:skip` on a line of its own covers the statement that starts on
/// the next line; after code it covers the statement it trails.
/// `// muter:disable` and `// muter:enable` bracket whole regions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkipSet {
    ranges: Vec<Range<usize>>,
}

impl SkipSet {
    pub fn collect(root: Node, source: &str) -> Self {
        let comments: Vec<Node> = syntax::preorder(root)
            .into_iter()
            .filter(|n| syntax::is_comment(*n))
            .collect();

        let mut ranges = Vec::new();
        let mut disabled_from: Option<usize> = None;
        for comment in &comments {
            let text = node_text(*comment, source);
            if text.contains(SKIP_MARKER) {
                if let Some(range) = skipped_statement(root, *comment, source) {
                    ranges.push(range);
                }
            } else if text.contains(DISABLE_MARKER) {
                disabled_from.get_or_insert(comment.end_byte());
            } else if text.contains(ENABLE_MARKER) {
                if let Some(start) = disabled_from.take() {
                    ranges.push(start..comment.start_byte());
                }
            }
        }
        if let Some(start) = disabled_from {
            ranges.push(start..source.len());
        }
        SkipSet { ranges }
    }

    pub fn contains(&self, offset: usize) -> bool {
        self.ranges.iter().any(|r| r.contains(&offset))
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

fn skipped_statement(root: Node, comment: Node, source: &str) -> Option<Range<usize>> {
    let line_start = source[..comment.start_byte()]
        .rfind('\n')
        .map(|i| i + 1)
        .unwrap_or(0);
    let trailing = !source[line_start..comment.start_byte()].trim().is_empty();
    let target = if trailing {
        line_start + leading_whitespace(&source[line_start..])
    } else {
        let after = &source[comment.end_byte()..];
        let mut offset = comment.end_byte();
        for line in after.split_inclusive('\n') {
            let content = line.trim();
            if !content.is_empty() && !content.starts_with("//") {
                offset += leading_whitespace(line);
                break;
            }
            offset += line.len();
        }
        offset
    };
    statement_at(root, target).map(|n| n.start_byte()..n.end_byte())
}

fn leading_whitespace(text: &str) -> usize {
    text.len() - text.trim_start_matches([' ', '\t']).len()
}

/// The outermost node starting at `offset` that is still below a block.
fn statement_at(root: Node<'_>, offset: usize) -> Option<Node<'_>> {
    let mut node = root.descendant_for_byte_range(offset, offset)?;
    if node.start_byte() != offset {
        return None;
    }
    while let Some(parent) = node.parent() {
        if parent.start_byte() != offset
            || matches!(parent.kind(), "statements" | "source_file" | "class_body")
        {
            break;
        }
        node = parent;
    }
    Some(node)
}
