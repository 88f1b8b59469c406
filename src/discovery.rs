//! Mutation candidate discovery over a set of Swift files.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::coverage::{Coverage, Region};
use crate::error::{MutationError, NoCandidatesKind};
use crate::mapping::{CodeBlock, MutationSchema, SchemataMutationMapping, merge_by_file_name};
use crate::operators::{DiscoveryContext, OperatorKind};
use crate::position::MutationPosition;
use crate::prepare::PreparedSource;
use crate::skip::SkipSet;
use crate::syntax;

/// Hands out schema ids, keeping them unique across a whole discovery run.
/// Ids double as environment variable names, so only `[A-Za-z0-9_]` is used.
#[derive(Debug, Default)]
pub struct SchemaIds {
    used: HashSet<String>,
}

impl SchemaIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, file: &Path, operator: OperatorKind, position: &MutationPosition) -> String {
        let stem = file
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("file");
        let base = sanitize(&format!(
            "{stem}_{}_{}_{}_{}",
            operator.id(),
            position.line,
            position.column,
            position.utf8_offset
        ));
        let mut id = base.clone();
        let mut n = 2;
        while !self.used.insert(id.clone()) {
            id = format!("{base}_{n}");
            n += 1;
        }
        id
    }
}

fn sanitize(raw: &str) -> String {
    let mut id: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if id.starts_with(|c: char| c.is_ascii_digit()) {
        id.insert(0, '_');
    }
    id
}

/// Everything discovery produced: merged mappings and the prepared text each
/// mapping's offsets refer to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Discovery {
    pub mappings: Vec<SchemataMutationMapping>,
    pub prepared: BTreeMap<PathBuf, PreparedSource>,
}

impl Discovery {
    pub fn count(&self) -> usize {
        self.mappings.iter().map(|m| m.count()).sum()
    }
}

/// Discover candidates in every file. Files that cannot be read or parsed
/// are skipped; finding nothing at all is an error.
pub fn discover_mutation_candidates(
    files: &[PathBuf],
    operators: &[OperatorKind],
    excluded_calls: &[String],
    coverage: &Coverage,
) -> Result<Discovery, MutationError> {
    let mut ids = SchemaIds::new();
    let mut mappings = Vec::new();
    let mut prepared = BTreeMap::new();

    for path in files {
        let original = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "skipping unreadable file");
                continue;
            }
        };
        let source = PreparedSource::prepare(&original);
        let found = discover_in_source(
            path,
            &source,
            operators,
            excluded_calls,
            coverage.uncovered_regions_for(path),
            &mut ids,
        );
        if found.is_empty() {
            continue;
        }
        debug!(file = %path.display(), mappings = found.len(), "discovered candidates");
        mappings.extend(found);
        prepared.insert(path.clone(), source);
    }

    let discovery = Discovery {
        mappings: merge_by_file_name(mappings),
        prepared,
    };
    if discovery.count() == 0 {
        return Err(MutationError::NoCandidates(
            NoCandidatesKind::NoMutationCandidates,
        ));
    }
    Ok(discovery)
}

/// One mapping per operator that found something in `prepared`. Reported
/// positions are shifted back to the unprepared file; byte offsets stay in
/// prepared coordinates.
pub fn discover_in_source(
    path: &Path,
    prepared: &PreparedSource,
    operators: &[OperatorKind],
    excluded_calls: &[String],
    uncovered: &[Region],
    ids: &mut SchemaIds,
) -> Vec<SchemataMutationMapping> {
    let source = prepared.source.as_str();
    let Some(tree) = syntax::parse(source) else {
        warn!(file = %path.display(), "skipping file that failed to parse");
        return Vec::new();
    };
    let root = tree.root_node();
    let skipped = SkipSet::collect(root, source);
    let shift = prepared.line_shift();
    let ctx = DiscoveryContext {
        source,
        excluded_calls,
    };

    let mut mappings = Vec::new();
    for operator in operators {
        let mut mapping = SchemataMutationMapping::new(path);
        for node in operator.discover(root, &ctx) {
            if skipped.contains(node.start_byte()) {
                continue;
            }
            let start = MutationPosition::from_offset(source, node.start_byte()).adjusted(shift);
            if uncovered.iter().any(|r| r.contains(start.line, start.column)) {
                continue;
            }
            let Some(block_node) = syntax::enclosing_block(node) else {
                continue;
            };
            let Some(edit) = operator.transform(node, source) else {
                continue;
            };
            let block = CodeBlock::new(
                block_node.start_byte(),
                block_node.end_byte(),
                syntax::has_implicit_return(block_node, source),
            );
            if edit.start < block.start {
                continue;
            }
            let replacement = syntax::splice(
                &source[block.start..block.end],
                edit.start - block.start,
                edit.end.min(block.end) - block.start,
                &edit.replacement,
            );
            let anchor = syntax::end_after_trailing_trivia(source, node.end_byte());
            let position = MutationPosition::from_offset(source, anchor).adjusted(shift);
            mapping.add(MutationSchema {
                id: ids.allocate(path, *operator, &position),
                file_path: path.to_path_buf(),
                operator: *operator,
                position,
                block,
                replacement,
                snapshot: edit.snapshot,
            });
        }
        if !mapping.is_empty() {
            mappings.push(mapping);
        }
    }
    mappings
}
