//! Embeds every schema of a file into one compilable source.
//!
//! Each block with schemata becomes
//!
//! ```text
//! if ProcessInfo.processInfo.environment["id_1"] != nil {
//! <mutant 1>
//! } else if ProcessInfo.processInfo.environment["id_2"] != nil {
//! <mutant 2>
//! } else {
//! <original>
//! }
//! ```
//!
//! Nested blocks are rendered first and embedded in the original branch of
//! their parent, so any single mutant can be selected at run time.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use tree_sitter::Node;

use crate::mapping::{BlockSchemata, MutationSchema, SchemataMutationMapping};
use crate::syntax::{self, node_text};

static PROBE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"^ProcessInfo\.processInfo\.environment\["([^"]+)"\] != nil$"#).ok()
});

/// Condition that is true when the mutant `id` is switched on.
pub fn schemata_condition(id: &str) -> String {
    format!("ProcessInfo.processInfo.environment[\"{id}\"] != nil")
}

/// The switch for one block. `original` already contains the rendered
/// switches of nested blocks.
pub fn mutation_switch(original: &str, schemata: &[MutationSchema], implicit_return: bool) -> String {
    if schemata.is_empty() {
        return original.to_string();
    }
    let body = |text: &str| {
        if implicit_return {
            with_explicit_return(text)
        } else {
            text.to_string()
        }
    };
    let mut out = String::new();
    for (i, schema) in schemata.iter().enumerate() {
        if i > 0 {
            out.push_str(" else ");
        }
        out.push_str("if ");
        out.push_str(&schemata_condition(&schema.id));
        out.push_str(" {\n");
        out.push_str(&body(&schema.replacement));
        out.push_str("\n}");
    }
    out.push_str(" else {\n");
    out.push_str(&body(original));
    out.push_str("\n}");
    out
}

fn with_explicit_return(expression: &str) -> String {
    let trimmed = expression.trim_start();
    if trimmed.is_empty() || trimmed.starts_with("return") {
        return expression.to_string();
    }
    format!("return {trimmed}")
}

/// Source text of `source` with every block of `mapping` replaced by its
/// schemata switch. Offsets in the mapping refer to `source`.
pub fn rewrite(source: &str, mapping: &SchemataMutationMapping) -> String {
    let blocks = mapping.blocks();
    let outermost: Vec<&BlockSchemata> = blocks
        .iter()
        .filter(|b| !blocks.iter().any(|other| other.block.encloses(&b.block)))
        .collect();
    splice_blocks(source, 0..source.len(), outermost, blocks)
}

fn splice_blocks(
    source: &str,
    range: Range<usize>,
    mut targets: Vec<&BlockSchemata>,
    all: &[BlockSchemata],
) -> String {
    targets.sort_by_key(|b| b.block.start);
    let mut out = String::with_capacity(range.len());
    let mut cursor = range.start;
    for target in targets {
        out.push_str(&source[cursor..target.block.start]);
        out.push_str(&render_block(source, target, all));
        cursor = target.block.end;
    }
    out.push_str(&source[cursor..range.end]);
    out
}

fn render_block(source: &str, target: &BlockSchemata, all: &[BlockSchemata]) -> String {
    let nested: Vec<&BlockSchemata> = all
        .iter()
        .filter(|b| target.block.encloses(&b.block))
        .filter(|b| {
            !all.iter()
                .any(|mid| target.block.encloses(&mid.block) && mid.block.encloses(&b.block))
        })
        .collect();
    let original = splice_blocks(source, target.block.start..target.block.end, nested, all);
    mutation_switch(&original, &target.schemata, target.block.implicit_return)
}

/// Light normalisation applied before rewritten sources are written out:
/// whitespace-only lines are emptied and the file ends with one newline.
/// Lines inside string literals are program text and stay as they are, so
/// nothing is emptied when the source does not parse.
pub fn format_code(source: &str) -> String {
    let literals = string_literal_ranges(source);
    let mut offset = 0;
    let mut lines = Vec::new();
    for line in source.split('\n') {
        let in_literal = |range: &Range<usize>| range.start < offset && offset < range.end;
        let blank = line.trim().is_empty()
            && literals
                .as_ref()
                .is_some_and(|ranges| !ranges.iter().any(in_literal));
        lines.push(if blank { "" } else { line });
        offset += line.len() + 1;
    }
    let mut out = lines.join("\n");
    let trimmed_len = out.trim_end_matches('\n').len();
    out.truncate(trimmed_len);
    out.push('\n');
    out
}

fn string_literal_ranges(source: &str) -> Option<Vec<Range<usize>>> {
    let tree = syntax::parse(source)?;
    Some(
        syntax::preorder(tree.root_node())
            .into_iter()
            .filter(|n| n.kind().ends_with("string_literal"))
            .map(|n| n.start_byte()..n.end_byte())
            .collect(),
    )
}

struct Switch {
    start: usize,
    end: usize,
    branches: Vec<(Option<String>, Range<usize>)>,
}

impl Switch {
    fn branch_for(&self, active: Option<&str>) -> Range<usize> {
        let chosen = self
            .branches
            .iter()
            .find(|(id, _)| active.is_some() && id.as_deref() == active)
            .or_else(|| self.branches.iter().find(|(id, _)| id.is_none()));
        chosen
            .map(|(_, range)| range.clone())
            .unwrap_or(self.start..self.start)
    }
}

/// Collapse every schemata switch in `rewritten` to the branch taken when
/// only `active` is switched on (or none, for `None`). Returns `None` when
/// the text does not parse.
pub fn select(rewritten: &str, active: Option<&str>) -> Option<String> {
    let tree = syntax::parse(rewritten)?;
    let switches: Vec<Switch> = syntax::preorder(tree.root_node())
        .into_iter()
        .filter(|n| n.kind() == "if_statement")
        .filter_map(|n| parse_switch(n, rewritten))
        .collect();
    Some(collapse(rewritten, 0..rewritten.len(), &switches, active))
}

fn collapse(source: &str, range: Range<usize>, switches: &[Switch], active: Option<&str>) -> String {
    let mut out = String::new();
    let mut cursor = range.start;
    for switch in switches {
        if switch.start < cursor || switch.end > range.end {
            continue;
        }
        out.push_str(&source[cursor..switch.start]);
        out.push_str(&collapse(source, switch.branch_for(active), switches, active));
        cursor = switch.end;
    }
    out.push_str(&source[cursor..range.end]);
    out
}

fn parse_switch(node: Node, source: &str) -> Option<Switch> {
    let mut branches = Vec::new();
    let mut current = node;
    loop {
        let children = syntax::children(current);
        let open = children.iter().position(|c| c.kind() == "{")?;
        let close = open + children[open..].iter().position(|c| c.kind() == "}")?;
        let condition = source[children.first()?.end_byte()..children[open].start_byte()].trim();
        let id = PROBE.as_ref()?.captures(condition)?.get(1)?.as_str().to_string();
        branches.push((Some(id), body_range(source, children[open], children[close])));

        let rest = &children[close + 1..];
        if let Some(next) = rest.iter().find(|c| c.kind() == "if_statement") {
            current = *next;
            continue;
        }
        let else_open = rest.iter().position(|c| c.kind() == "{")?;
        let else_close = else_open + rest[else_open..].iter().position(|c| c.kind() == "}")?;
        branches.push((None, body_range(source, rest[else_open], rest[else_close])));
        break;
    }
    Some(Switch {
        start: node.start_byte(),
        end: node.end_byte(),
        branches,
    })
}

/// Text between `{` and `}`, minus the newlines the switch adds around it.
fn body_range(source: &str, open: Node, close: Node) -> Range<usize> {
    let mut start = open.end_byte();
    let mut end = close.start_byte();
    if node_text(open, source) == "{" && source[start..end].starts_with('\n') {
        start += 1;
    }
    if end > start && source[start..end].ends_with('\n') {
        end -= 1;
    }
    start..end
}
