//! Per-function complexity scoring.
//!
//! Scores are keyed by function name and merged into extracted symbols after
//! extraction, so a measurer never sees symbol ids.

use std::collections::HashMap;
use std::path::Path;

use tree_sitter::{Node, Tree};

use super::c::{function_name, is_function_definition};

/// A parsed file handed to a measurer.
pub struct MeasuredFile<'a> {
    pub path: &'a Path,
    pub code: &'a str,
    pub tree: &'a Tree,
}

/// Produces a name-keyed complexity score map for one file.
pub trait ComplexityMeasurer: Send + Sync {
    fn name(&self) -> &'static str;

    fn measure(&self, file: &MeasuredFile<'_>) -> HashMap<String, u32>;
}

/// Used when no measurer is available. Every function scores 0.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullMeasurer;

impl ComplexityMeasurer for NullMeasurer {
    fn name(&self) -> &'static str {
        "none"
    }

    fn measure(&self, _file: &MeasuredFile<'_>) -> HashMap<String, u32> {
        HashMap::new()
    }
}

/// McCabe cyclomatic complexity computed from the syntax tree:
/// one plus the number of decision points in the function body.
#[derive(Debug, Default, Clone, Copy)]
pub struct CyclomaticMeasurer;

impl ComplexityMeasurer for CyclomaticMeasurer {
    fn name(&self) -> &'static str {
        "cyclomatic"
    }

    fn measure(&self, file: &MeasuredFile<'_>) -> HashMap<String, u32> {
        let mut scores = HashMap::new();
        collect_functions(file.tree.root_node(), file.code, &mut scores);
        scores
    }
}

fn collect_functions(node: Node, code: &str, scores: &mut HashMap<String, u32>) {
    if is_function_definition(&node) {
        if let (Some(name), Some(body)) = (function_name(&node, code), node.child_by_field_name("body")) {
            let score = 1 + decision_points(body, code);
            // Same name defined twice (e.g. #ifdef branches): keep the worst
            scores
                .entry(name)
                .and_modify(|existing: &mut u32| *existing = (*existing).max(score))
                .or_insert(score);
        }
    }

    for child in node.children(&mut node.walk()) {
        collect_functions(child, code, scores);
    }
}

fn decision_points(node: Node, code: &str) -> u32 {
    let own = match node.kind() {
        "if_statement" | "for_statement" | "for_range_loop" | "while_statement" | "do_statement"
        | "conditional_expression" | "catch_clause" => 1,
        // `default:` has no value and is not a branch of its own
        "case_statement" => u32::from(node.child_by_field_name("value").is_some()),
        "binary_expression" => node
            .child_by_field_name("operator")
            .map(|op| u32::from(matches!(&code[op.byte_range()], "&&" | "||" | "and" | "or")))
            .unwrap_or(0),
        _ => 0,
    };

    let mut total = own;
    for child in node.children(&mut node.walk()) {
        // Nested lambdas and local classes are scored with their parent
        total += decision_points(child, code);
    }
    total
}
