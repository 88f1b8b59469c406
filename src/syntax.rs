//! Thin layer over tree-sitter-swift: parsing, node text, block lookup and
//! the trivia rules used to place mutation positions.

use tree_sitter::{Node, Parser, Tree};

/// Node kind of a statement list. Every lexical block the rewriter can turn
/// into a schemata switch is one of these.
pub const BLOCK_KIND: &str = "statements";

const COMMENT_KINDS: &[&str] = &["comment", "multiline_comment"];

/// Single statements that cannot be returned as a value.
const NON_EXPRESSION_KINDS: &[&str] = &[
    "property_declaration",
    "typealias_declaration",
    "function_declaration",
    "class_declaration",
    "protocol_declaration",
    "control_transfer_statement",
    "for_statement",
    "while_statement",
    "repeat_while_statement",
    "do_statement",
    "if_statement",
    "guard_statement",
    "switch_statement",
    "assignment",
    "statement_label",
];

/// Parse Swift source. Returns `None` when the grammar cannot be loaded or
/// the tree contains syntax errors; such files are skipped by discovery.
pub fn parse(source: &str) -> Option<Tree> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_swift::LANGUAGE.into())
        .ok()?;
    let tree = parser.parse(source, None)?;
    if tree.root_node().has_error() {
        return None;
    }
    Some(tree)
}

pub fn node_text<'s>(node: Node, source: &'s str) -> &'s str {
    &source[node.start_byte()..node.end_byte()]
}

pub fn is_comment(node: Node) -> bool {
    COMMENT_KINDS.contains(&node.kind())
}

/// All nodes below `root` (inclusive) in document order.
pub fn preorder(root: Node<'_>) -> Vec<Node<'_>> {
    let mut nodes = Vec::new();
    let mut cursor = root.walk();
    loop {
        nodes.push(cursor.node());
        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() || cursor.node() == root {
                return nodes;
            }
        }
    }
}

pub fn named_children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    let nodes = node.named_children(&mut cursor).collect();
    nodes
}

pub fn children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    let nodes = node.children(&mut cursor).collect();
    nodes
}

pub fn has_ancestor(node: Node, kinds: &[&str]) -> bool {
    let mut current = node.parent();
    while let Some(parent) = current {
        if kinds.contains(&parent.kind()) {
            return true;
        }
        current = parent.parent();
    }
    false
}

pub fn contains_kind(node: Node, kind: &str) -> bool {
    preorder(node).iter().any(|n| n.kind() == kind)
}

/// The nearest statement list containing `node`.
pub fn enclosing_block(node: Node<'_>) -> Option<Node<'_>> {
    let mut current = node.parent();
    while let Some(parent) = current {
        if parent.kind() == BLOCK_KIND {
            return Some(parent);
        }
        current = parent.parent();
    }
    None
}

/// Offset just past `end` and any spaces, tabs or comments that follow it on
/// the same line.
pub fn end_after_trailing_trivia(source: &str, end: usize) -> usize {
    let bytes = source.as_bytes();
    let mut offset = end.min(bytes.len());
    loop {
        while offset < bytes.len() && (bytes[offset] == b' ' || bytes[offset] == b'\t') {
            offset += 1;
        }
        let rest = &source[offset..];
        if rest.starts_with("//") {
            return offset + rest.find('\n').unwrap_or(rest.len());
        }
        if rest.starts_with("/*") {
            let line = &rest[..rest.find('\n').unwrap_or(rest.len())];
            if let Some(close) = line.find("*/") {
                offset += close + 2;
                continue;
            }
        }
        return offset;
    }
}

/// Whether a statement list relies on Swift's implicit return: a single
/// expression forming the body of a closure, a getter, or a function that
/// declares a return type.
pub fn has_implicit_return(block: Node, source: &str) -> bool {
    let Some(parent) = block.parent() else {
        return false;
    };
    let returns_value = match parent.kind() {
        "lambda_literal" | "computed_property" | "computed_getter" => true,
        "function_body" => parent
            .parent()
            .is_some_and(|decl| declares_return_type(decl, parent, source)),
        _ => false,
    };
    if !returns_value {
        return false;
    }
    let statements: Vec<Node> = named_children(block)
        .into_iter()
        .filter(|n| !is_comment(*n))
        .collect();
    match statements.as_slice() {
        [only] => !NON_EXPRESSION_KINDS.contains(&only.kind()),
        _ => false,
    }
}

fn declares_return_type(decl: Node, body: Node, source: &str) -> bool {
    if decl.kind() != "function_declaration" {
        return false;
    }
    if decl.child_by_field_name("return_type").is_some() {
        return true;
    }
    let signature = &source[decl.start_byte()..body.start_byte()];
    match signature.rfind(')') {
        Some(close) => signature[close..].contains("->"),
        None => false,
    }
}

/// Replace `source[start..end]` with `replacement`.
pub fn splice(source: &str, start: usize, end: usize, replacement: &str) -> String {
    let mut result = String::with_capacity(source.len() + replacement.len());
    result.push_str(&source[..start]);
    result.push_str(replacement);
    result.push_str(&source[end..]);
    result
}

/// Collapse runs of whitespace (including newlines) into single spaces.
pub fn inline(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
