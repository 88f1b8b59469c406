//! The mutation operator catalog for Swift.
//! Each operator pairs a discoverer (which nodes it applies to) with a
//! transformer (what the node becomes).

use serde::{Deserialize, Serialize};
use tree_sitter::Node;

use crate::mapping::MutationSnapshot;
use crate::side_effects;
use crate::syntax::{self, node_text};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OperatorKind {
    RelationalOperatorReplacement,
    ChangeLogicalConnector,
    RemoveSideEffects,
    SwapTernary,
}

/// What an operator needs to know about the file besides its tree.
pub struct DiscoveryContext<'a> {
    pub source: &'a str,
    /// Calls RemoveSideEffects must leave alone, on top of the built-in list.
    pub excluded_calls: &'a [String],
}

/// A single edit: `source[start..end]` becomes `replacement`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transformation {
    pub start: usize,
    pub end: usize,
    pub replacement: String,
    pub snapshot: MutationSnapshot,
}

const RELATIONAL_KINDS: &[&str] = &["equality_expression", "comparison_expression"];
const LOGICAL_KINDS: &[&str] = &["conjunction_expression", "disjunction_expression"];

/// Contexts where an operator belongs to a declaration rather than to code.
const DECLARATION_CONTEXTS: &[&str] = &[
    "where_clause",
    "type_constraints",
    "type_constraint",
    "equality_constraint",
    "inheritance_constraint",
];

impl OperatorKind {
    pub const ALL: [OperatorKind; 4] = [
        OperatorKind::RelationalOperatorReplacement,
        OperatorKind::ChangeLogicalConnector,
        OperatorKind::RemoveSideEffects,
        OperatorKind::SwapTernary,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            OperatorKind::RelationalOperatorReplacement => "RelationalOperatorReplacement",
            OperatorKind::ChangeLogicalConnector => "ChangeLogicalConnector",
            OperatorKind::RemoveSideEffects => "RemoveSideEffects",
            OperatorKind::SwapTernary => "SwapTernary",
        }
    }

    pub fn from_id(id: &str) -> Option<OperatorKind> {
        OperatorKind::ALL.into_iter().find(|op| op.id() == id)
    }

    /// Nodes this operator applies to, in document order.
    pub fn discover<'t>(&self, root: Node<'t>, ctx: &DiscoveryContext) -> Vec<Node<'t>> {
        match self {
            OperatorKind::RelationalOperatorReplacement => {
                operator_tokens(root, ctx.source, RELATIONAL_KINDS, opposite_relational)
            }
            OperatorKind::ChangeLogicalConnector => {
                operator_tokens(root, ctx.source, LOGICAL_KINDS, opposite_logical)
            }
            OperatorKind::RemoveSideEffects => side_effects::discover(root, ctx),
            OperatorKind::SwapTernary => ternaries(root),
        }
    }

    /// The edit for a node returned by [`OperatorKind::discover`].
    pub fn transform(&self, node: Node, source: &str) -> Option<Transformation> {
        match self {
            OperatorKind::RelationalOperatorReplacement => {
                swap_operator(node, source, opposite_relational)
            }
            OperatorKind::ChangeLogicalConnector => swap_operator(node, source, opposite_logical),
            OperatorKind::RemoveSideEffects => side_effects::transform(node, source),
            OperatorKind::SwapTernary => swap_ternary(node, source),
        }
    }
}

impl std::fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

pub fn opposite_relational(op: &str) -> Option<&'static str> {
    match op {
        "==" => Some("!="),
        "!=" => Some("=="),
        ">=" => Some("<="),
        "<=" => Some(">="),
        ">" => Some("<"),
        "<" => Some(">"),
        _ => None,
    }
}

pub fn opposite_logical(op: &str) -> Option<&'static str> {
    match op {
        "&&" => Some("||"),
        "||" => Some("&&"),
        _ => None,
    }
}

/// Operator tokens of binary expressions of the given kinds that sit inside
/// a code block and outside any declaration context.
fn operator_tokens<'t>(
    root: Node<'t>,
    source: &str,
    kinds: &[&str],
    table: fn(&str) -> Option<&'static str>,
) -> Vec<Node<'t>> {
    syntax::preorder(root)
        .into_iter()
        .filter(|n| kinds.contains(&n.kind()))
        .filter(|n| !syntax::has_ancestor(*n, DECLARATION_CONTEXTS))
        .filter(|n| syntax::enclosing_block(*n).is_some())
        .filter_map(|n| operator_token(n, source, table))
        .collect()
}

fn operator_token<'t>(
    expression: Node<'t>,
    source: &str,
    table: fn(&str) -> Option<&'static str>,
) -> Option<Node<'t>> {
    if let Some(op) = expression.child_by_field_name("op") {
        if table(node_text(op, source)).is_some() {
            return Some(op);
        }
    }
    syntax::children(expression)
        .into_iter()
        .find(|c| !c.is_named() && table(node_text(*c, source)).is_some())
}

fn swap_operator(
    token: Node,
    source: &str,
    table: fn(&str) -> Option<&'static str>,
) -> Option<Transformation> {
    let before = node_text(token, source);
    let after = table(before)?;
    Some(Transformation {
        start: token.start_byte(),
        end: token.end_byte(),
        replacement: after.to_string(),
        snapshot: MutationSnapshot::new(before, after, format!("changed {before} to {after}")),
    })
}

fn ternaries(root: Node<'_>) -> Vec<Node<'_>> {
    syntax::preorder(root)
        .into_iter()
        .filter(|n| n.kind() == "ternary_expression")
        .filter(|n| syntax::enclosing_block(*n).is_some())
        .filter(|n| match ternary_branches(*n) {
            Some((if_true, if_false)) => !has_type_cast(if_true) && !has_type_cast(if_false),
            None => false,
        })
        .collect()
}

fn ternary_branches(node: Node<'_>) -> Option<(Node<'_>, Node<'_>)> {
    let if_true = node.child_by_field_name("if_true");
    let if_false = node.child_by_field_name("if_false");
    match (if_true, if_false) {
        (Some(t), Some(f)) => Some((t, f)),
        _ => {
            let named = syntax::named_children(node);
            match named.as_slice() {
                [_, t, f] => Some((*t, *f)),
                _ => None,
            }
        }
    }
}

fn has_type_cast(branch: Node) -> bool {
    branch.kind() == "as_expression" || syntax::contains_kind(branch, "as_expression")
}

fn swap_ternary(node: Node, source: &str) -> Option<Transformation> {
    let (if_true, if_false) = ternary_branches(node)?;
    let swapped = format!(
        "{}{}{}",
        node_text(if_false, source),
        &source[if_true.end_byte()..if_false.start_byte()],
        node_text(if_true, source),
    );
    let before = node_text(node, source);
    let after = syntax::splice(
        before,
        if_true.start_byte() - node.start_byte(),
        if_false.end_byte() - node.start_byte(),
        &swapped,
    );
    Some(Transformation {
        start: if_true.start_byte(),
        end: if_false.end_byte(),
        replacement: swapped,
        snapshot: MutationSnapshot::new(
            syntax::inline(before),
            syntax::inline(&after),
            "swapped ternary operator",
        ),
    })
}
