//! Design-pattern recognition by class shape.
//!
//! Each rule looks at one class at a time. A file is tagged with a pattern
//! when any of its classes satisfies that pattern's rule; rules are
//! independent, so several tags may apply to one file.

use std::collections::BTreeSet;

use lazy_static::lazy_static;
use regex::Regex;

use crate::model::{Class, DesignPattern, FileRecord, Function, TypeKind};

lazy_static! {
    static ref RETURN_CALL: Regex =
        Regex::new(r"\breturn\s+(?:new\s+)?([A-Za-z_$][\w$]*)\s*(?:<[^>]*>)?\s*\(").unwrap();
}

type Rule = fn(&Class, &[String]) -> bool;

/// Ordered rule table.
const RULES: &[(DesignPattern, Rule)] = &[
    (DesignPattern::Singleton, is_singleton),
    (DesignPattern::Factory, is_factory),
    (DesignPattern::Observer, is_observer),
    (DesignPattern::Strategy, is_strategy),
    (DesignPattern::Decorator, is_decorator),
];

/// Patterns matched by any class in `record`, in rule order. `lines` is
/// the file's source text split into lines.
pub fn detect_patterns(record: &FileRecord, lines: &[String]) -> Vec<DesignPattern> {
    let mut found = BTreeSet::new();
    for class in &record.classes {
        for (pattern, rule) in RULES {
            if rule(class, lines) {
                found.insert(*pattern);
            }
        }
    }
    found.into_iter().collect()
}

fn contains_ci(name: &str, needle: &str) -> bool {
    name.to_lowercase().contains(needle)
}

fn is_constructor(class: &Class, method: &Function) -> bool {
    matches!(method.name.as_str(), "__init__" | "constructor") || method.name == class.name
}

/// An `_instance`-like class attribute AND a private constructor.
fn is_singleton(class: &Class, _lines: &[String]) -> bool {
    let has_instance = class
        .class_variables
        .iter()
        .any(|v| v.name.trim_start_matches('_').eq_ignore_ascii_case("instance"));
    let private_ctor = class.methods.iter().any(|m| {
        is_constructor(class, m)
            && (m.has_modifier("private") || m.decorators.iter().any(|d| d == "private"))
    });
    has_instance && private_ctor
}

/// A create/factory method whose returns call more than one distinct target.
fn is_factory(class: &Class, lines: &[String]) -> bool {
    class.methods.iter().any(|m| {
        (contains_ci(&m.name, "create") || contains_ci(&m.name, "factory"))
            && return_targets(m, lines).len() > 1
    })
}

fn is_observer(class: &Class, _lines: &[String]) -> bool {
    class
        .class_variables
        .iter()
        .chain(class.instance_variables.iter())
        .any(|v| contains_ci(&v.name, "observer"))
        || class.methods.iter().any(|m| contains_ci(&m.name, "notify"))
}

/// An abstract base with a strategy- or algorithm-named method.
fn is_strategy(class: &Class, _lines: &[String]) -> bool {
    let is_abstract = class.kind == TypeKind::Interface
        || class.modifiers.iter().any(|m| m == "abstract")
        || class
            .bases
            .iter()
            .any(|b| b == "ABC" || contains_ci(b, "abstract"));
    is_abstract
        && class
            .methods
            .iter()
            .any(|m| contains_ci(&m.name, "strategy") || contains_ci(&m.name, "algorithm"))
}

fn is_decorator(class: &Class, _lines: &[String]) -> bool {
    contains_ci(&class.name, "decorator")
        || contains_ci(&class.name, "wrapper")
        || class
            .bases
            .iter()
            .any(|b| contains_ci(b, "component") || contains_ci(b, "interface"))
}

/// Distinct callees of the method's `return f(...)` statements.
fn return_targets(method: &Function, lines: &[String]) -> BTreeSet<String> {
    if let Some(ref behavior) = method.behavior {
        return behavior.exit_points.iter().cloned().collect();
    }
    let start = method.location.start_line.saturating_sub(1);
    let end = method.location.end_line.min(lines.len());
    lines
        .get(start..end)
        .unwrap_or(&[])
        .iter()
        .flat_map(|line| RETURN_CALL.captures_iter(line))
        .map(|caps| caps[1].to_string())
        .collect()
}
