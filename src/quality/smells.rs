//! Threshold-based code smells.

use lazy_static::lazy_static;
use regex::Regex;
use tree_sitter::Node;

use crate::config::SmellThresholds;
use crate::model::{CodeSmell, FileRecord, SmellKind};

use super::Syntax;

lazy_static! {
    static ref NESTING_TOKEN: Regex =
        Regex::new(r"\b(?:if|else|for|foreach|while|do)\b|[{}();]").unwrap();
}

/// Check every function and class in `record`, then nesting depth over
/// the whole file. Findings are ordered by line.
pub fn detect_smells(record: &FileRecord, syntax: &Syntax, limits: &SmellThresholds) -> Vec<CodeSmell> {
    let mut smells = Vec::new();

    for function in record.all_functions() {
        let length = function.location.end_line - function.location.start_line;
        if length > limits.max_function_length {
            smells.push(CodeSmell {
                kind: SmellKind::LongMethod,
                line: function.location.start_line,
                message: format!(
                    "Method is {} lines long (max {})",
                    length, limits.max_function_length
                ),
            });
        }

        let params = function.explicit_params().count();
        if params > limits.max_parameters {
            smells.push(CodeSmell {
                kind: SmellKind::TooManyParameters,
                line: function.location.start_line,
                message: format!(
                    "Method has {} parameters (max {})",
                    params, limits.max_parameters
                ),
            });
        }
    }

    for class in &record.classes {
        let length = class.location.end_line - class.location.start_line;
        if length > limits.max_class_length {
            smells.push(CodeSmell {
                kind: SmellKind::LargeClass,
                line: class.location.start_line,
                message: format!(
                    "Class is {} lines long (max {})",
                    length, limits.max_class_length
                ),
            });
        }
    }

    match syntax {
        Syntax::Tree(parsed) => {
            tree_nesting(parsed.tree.root_node(), 0, limits.max_nesting_depth, &mut smells)
        }
        Syntax::Code(code) => scanned_nesting(code, limits.max_nesting_depth, &mut smells),
        Syntax::None => {}
    }

    smells.sort_by_key(|s| s.line);
    smells
}

fn deep_nesting(line: usize, depth: usize, max: usize) -> CodeSmell {
    CodeSmell {
        kind: SmellKind::DeepNesting,
        line,
        message: format!("Code is nested {} levels deep (max {})", depth, max),
    }
}

fn tree_nesting(node: Node, depth: usize, max: usize, out: &mut Vec<CodeSmell>) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        let nested = matches!(
            child.kind(),
            "if_statement" | "for_statement" | "while_statement"
        );
        let depth = if nested { depth + 1 } else { depth };
        if nested && depth > max {
            out.push(deep_nesting(child.start_position().row + 1, depth, max));
        }
        tree_nesting(child, depth, max, out);
    }
}

/// Nesting over braces: a `{` that follows a control keyword opens a
/// nested level, closed by its matching `}`. Braceless bodies do not nest.
fn scanned_nesting(code: &[String], max: usize, out: &mut Vec<CodeSmell>) {
    let mut braces = 0usize;
    let mut parens = 0usize;
    let mut levels: Vec<usize> = Vec::new();
    let mut pending: Option<usize> = None;

    for (i, line) in code.iter().enumerate() {
        for token in NESTING_TOKEN.find_iter(line) {
            match token.as_str() {
                "{" => {
                    braces += 1;
                    if let Some(keyword_line) = pending.take() {
                        levels.push(braces);
                        if levels.len() > max {
                            out.push(deep_nesting(keyword_line, levels.len(), max));
                        }
                    }
                }
                "}" => {
                    if levels.last() == Some(&braces) {
                        levels.pop();
                    }
                    braces = braces.saturating_sub(1);
                }
                "(" => parens += 1,
                ")" => parens = parens.saturating_sub(1),
                ";" => {
                    if parens == 0 {
                        pending = None;
                    }
                }
                _ => pending = Some(i + 1),
            }
        }
    }
}
