//! Per-file grouping of mutation schemata by enclosing block.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::operators::OperatorKind;
use crate::position::MutationPosition;

/// Byte range of a statement list in the prepared source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeBlock {
    pub start: usize,
    pub end: usize,
    /// The block is a single expression returned implicitly.
    pub implicit_return: bool,
}

impl CodeBlock {
    pub fn new(start: usize, end: usize, implicit_return: bool) -> Self {
        CodeBlock {
            start,
            end,
            implicit_return,
        }
    }

    /// Strictly encloses `other`.
    pub fn encloses(&self, other: &CodeBlock) -> bool {
        self.start <= other.start && other.end <= self.end && self != other
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationSnapshot {
    pub before: String,
    pub after: String,
    pub description: String,
}

impl MutationSnapshot {
    pub fn new(
        before: impl Into<String>,
        after: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        MutationSnapshot {
            before: before.into(),
            after: after.into(),
            description: description.into(),
        }
    }
}

/// One mutant, ready to be embedded. `replacement` is the full text of
/// `block` with the mutation applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationSchema {
    pub id: String,
    pub file_path: PathBuf,
    pub operator: OperatorKind,
    pub position: MutationPosition,
    pub block: CodeBlock,
    pub replacement: String,
    pub snapshot: MutationSnapshot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSchemata {
    pub block: CodeBlock,
    pub schemata: Vec<MutationSchema>,
}

/// Schemata of one file keyed by block. Blocks and the schemata inside them
/// keep insertion order, which is the order mutants are tested in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemataMutationMapping {
    pub file_path: PathBuf,
    blocks: Vec<BlockSchemata>,
}

impl SchemataMutationMapping {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        SchemataMutationMapping {
            file_path: file_path.into(),
            blocks: Vec::new(),
        }
    }

    pub fn file_name(&self) -> &str {
        self.file_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }

    pub fn add(&mut self, schema: MutationSchema) {
        match self.blocks.iter_mut().find(|b| b.block == schema.block) {
            Some(entry) => entry.schemata.push(schema),
            None => self.blocks.push(BlockSchemata {
                block: schema.block,
                schemata: vec![schema],
            }),
        }
    }

    pub fn blocks(&self) -> &[BlockSchemata] {
        &self.blocks
    }

    pub fn schemata(&self, block: &CodeBlock) -> &[MutationSchema] {
        self.blocks
            .iter()
            .find(|b| b.block == *block)
            .map(|b| b.schemata.as_slice())
            .unwrap_or_default()
    }

    pub fn all_schemata(&self) -> impl Iterator<Item = &MutationSchema> {
        self.blocks.iter().flat_map(|b| b.schemata.iter())
    }

    pub fn count(&self) -> usize {
        self.blocks.iter().map(|b| b.schemata.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Union the block lists of two mappings of the same file. Schemata of a
    /// block already present are appended after the existing ones.
    pub fn merge(&mut self, other: SchemataMutationMapping) {
        for entry in other.blocks {
            match self.blocks.iter_mut().find(|b| b.block == entry.block) {
                Some(existing) => existing.schemata.extend(entry.schemata),
                None => self.blocks.push(entry),
            }
        }
    }
}

/// Merge mappings that refer to the same file. The result is ordered by path.
pub fn merge_by_file_name(
    mappings: impl IntoIterator<Item = SchemataMutationMapping>,
) -> Vec<SchemataMutationMapping> {
    let mut by_file: BTreeMap<PathBuf, SchemataMutationMapping> = BTreeMap::new();
    for mapping in mappings {
        match by_file.get_mut(&mapping.file_path) {
            Some(existing) => existing.merge(mapping),
            None => {
                by_file.insert(mapping.file_path.clone(), mapping);
            }
        }
    }
    by_file.into_values().filter(|m| !m.is_empty()).collect()
}
