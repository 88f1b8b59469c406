//! RemoveSideEffects: deletes statements that only exist for their effect.
//!
//! A statement qualifies when it is a bare call (optionally behind `try` or
//! `await`) or discards a call result with `_ = ...`, and the call is not on
//! the allow-list. Calls on properties holding locks or semaphores are left
//! alone because removing them tends to deadlock the test run instead of
//! failing it.

use std::collections::HashSet;

use tree_sitter::Node;

use crate::mapping::MutationSnapshot;
use crate::operators::{DiscoveryContext, Transformation};
use crate::syntax::{self, node_text};

/// Calls whose removal no test can observe.
pub const UNTESTED_CALLS: &[&str] = &["print", "fatalError", "exit", "abort"];

pub const CONCURRENCY_TYPES: &[&str] = &[
    "DispatchSemaphore",
    "DispatchGroup",
    "NSLock",
    "NSRecursiveLock",
    "NSCondition",
    "NSConditionLock",
];

/// Block owners whose statements may be removed.
const ELIGIBLE_BLOCK_PARENTS: &[&str] = &[
    "function_body",
    "for_statement",
    "while_statement",
    "repeat_while_statement",
    "guard_statement",
];

pub fn discover<'t>(root: Node<'t>, ctx: &DiscoveryContext) -> Vec<Node<'t>> {
    let concurrency_properties = concurrency_properties(root, ctx.source);
    let mut found = Vec::new();
    for block in syntax::preorder(root) {
        if block.kind() != syntax::BLOCK_KIND || !is_eligible_block(block, ctx.source) {
            continue;
        }
        for statement in syntax::named_children(block) {
            if removable(statement, ctx, &concurrency_properties) {
                found.push(statement);
            }
        }
    }
    found
}

pub fn transform(statement: Node, source: &str) -> Option<Transformation> {
    let start = statement.start_byte();
    let mut end = statement.end_byte();
    let rest = &source[end..];
    let padding = rest.len() - rest.trim_start_matches([' ', '\t']).len();
    if rest[padding..].starts_with(';') {
        end += padding + 1;
    }
    let before = syntax::inline(node_text(statement, source));
    Some(Transformation {
        start,
        end,
        replacement: String::new(),
        snapshot: MutationSnapshot::new(before, "removed line", "removed line"),
    })
}

fn is_eligible_block(block: Node, source: &str) -> bool {
    block
        .parent()
        .is_some_and(|p| ELIGIBLE_BLOCK_PARENTS.contains(&p.kind()))
        && !syntax::has_implicit_return(block, source)
}

fn removable(statement: Node, ctx: &DiscoveryContext, tracked: &HashSet<String>) -> bool {
    if statement.kind() == "property_declaration" || syntax::is_comment(statement) {
        return false;
    }
    let call = if statement.kind() == "assignment" {
        discarded_call(statement, ctx.source)
    } else {
        unwrap_call(statement)
    };
    let Some(call) = call else {
        return false;
    };
    let Some(callee) = call.named_child(0) else {
        return false;
    };
    !is_excluded_call(callee, ctx) && !targets_tracked_property(callee, ctx.source, tracked)
}

/// `try f()`, `await f()` and `f()` all resolve to the call node.
fn unwrap_call(node: Node<'_>) -> Option<Node<'_>> {
    match node.kind() {
        "call_expression" => Some(node),
        "try_expression" | "await_expression" => {
            let inner = syntax::named_children(node).into_iter().last()?;
            unwrap_call(inner)
        }
        _ => None,
    }
}

/// The call in `_ = call()`.
fn discarded_call<'t>(assignment: Node<'t>, source: &str) -> Option<Node<'t>> {
    let target = assignment
        .child_by_field_name("target")
        .or_else(|| assignment.named_child(0))?;
    if node_text(target, source).trim() != "_" {
        return None;
    }
    let value = assignment
        .child_by_field_name("result")
        .or_else(|| syntax::named_children(assignment).into_iter().last())?;
    unwrap_call(value)
}

fn callee_name<'s>(callee: Node, source: &'s str) -> &'s str {
    let text = node_text(callee, source);
    text.rsplit('.').next().unwrap_or(text).trim()
}

fn is_excluded_call(callee: Node, ctx: &DiscoveryContext) -> bool {
    let name = callee_name(callee, ctx.source);
    let full = node_text(callee, ctx.source).trim();
    UNTESTED_CALLS.contains(&name)
        || ctx
            .excluded_calls
            .iter()
            .any(|excluded| excluded == name || excluded == full)
}

fn targets_tracked_property(callee: Node, source: &str, tracked: &HashSet<String>) -> bool {
    if tracked.is_empty() || callee.kind() != "navigation_expression" {
        return false;
    }
    let text = node_text(callee, source);
    let Some((target, _)) = text.rsplit_once('.') else {
        return false;
    };
    let target = target.trim();
    let target = target.strip_prefix("self.").unwrap_or(target);
    tracked.contains(target)
}

/// Names of properties initialised with, or typed as, a concurrency
/// primitive anywhere in the file.
fn concurrency_properties(root: Node, source: &str) -> HashSet<String> {
    syntax::preorder(root)
        .into_iter()
        .filter(|n| n.kind() == "property_declaration")
        .filter(|decl| {
            syntax::preorder(*decl).iter().any(|n| {
                matches!(n.kind(), "simple_identifier" | "type_identifier")
                    && CONCURRENCY_TYPES.contains(&node_text(*n, source))
            })
        })
        .filter_map(|decl| property_name(decl, source))
        .collect()
}

fn property_name(decl: Node, source: &str) -> Option<String> {
    let name = decl.child_by_field_name("name").or_else(|| {
        syntax::preorder(decl)
            .into_iter()
            .find(|n| n.kind() == "pattern" || n.kind() == "simple_identifier")
    })?;
    let text = node_text(name, source).trim();
    let text = text.strip_prefix("self.").unwrap_or(text);
    Some(text.to_string())
}
