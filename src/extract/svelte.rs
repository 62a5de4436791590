//! Svelte component extraction.
//!
//! `<script>` blocks go through [`ScriptExtractor`] (typed mode when the
//! block declares `lang="ts"`), with every location shifted to the block's
//! position in the component. A template pass over the remaining markup
//! picks up event handlers and `{#each}` sources.

use std::ops::Range;

use lazy_static::lazy_static;
use regex::Regex;

use crate::extract::scan::{blank_ranges, line_of_offset};
use crate::extract::{Extraction, LanguageExtractor, ScriptExtractor};
use crate::language::Language;
use crate::model::{merge_variable, Function, SourceLocation, Variable, VariableScope};

lazy_static! {
    static ref SCRIPT: Regex = Regex::new(r"(?s)<script([^>]*)>(.*?)</script>").unwrap();
    static ref STYLE: Regex = Regex::new(r"(?s)<style[^>]*>.*?</style>").unwrap();
    static ref TYPED: Regex = Regex::new(r#"\blang\s*=\s*["'](?:ts|typescript)["']"#).unwrap();
    static ref EVENT_HANDLER: Regex = Regex::new(r"on:(\w+)=\{([^}]+)\}").unwrap();
    static ref EACH: Regex = Regex::new(r"\{#each\s+([A-Za-z_$][\w$.]*)").unwrap();
    static ref REACTIVE: Regex = Regex::new(r"^\s*\$:\s*([A-Za-z_$][\w$]*)\s*=").unwrap();
    static ref COMPONENT_IMPORT: Regex =
        Regex::new(r#"import\s+(\w+)\s+from\s+['"]([^'"]+)['"]"#).unwrap();
}

/// A `<script>` block located within the component.
struct ScriptBlock<'a> {
    body: &'a str,
    typescript: bool,
    /// Lines before the block body starts.
    offset: usize,
    span: Range<usize>,
}

fn script_blocks(content: &str) -> Vec<ScriptBlock<'_>> {
    SCRIPT
        .captures_iter(content)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let body = caps.get(2)?;
            Some(ScriptBlock {
                body: body.as_str(),
                typescript: TYPED.is_match(&caps[1]),
                offset: line_of_offset(content, body.start()) - 1,
                span: whole.range(),
            })
        })
        .collect()
}

/// Extractor for `.svelte` components.
pub struct SvelteExtractor;

impl SvelteExtractor {
    fn template(&self, path: &str, content: &str, blocks: &[ScriptBlock], out: &mut Extraction) {
        let mut hidden: Vec<Range<usize>> = blocks.iter().map(|b| b.span.clone()).collect();
        hidden.extend(STYLE.find_iter(content).map(|m| m.range()));
        let markup = blank_ranges(content, &hidden);

        for (i, line) in markup.lines().enumerate() {
            for caps in EVENT_HANDLER.captures_iter(line) {
                let mut handler = Function::new(
                    format!("on_{}", &caps[1]),
                    SourceLocation::line(path, i + 1),
                );
                handler.docstring = Some(format!("Event handler for {}", &caps[1]));
                out.functions.push(handler);
            }
            for caps in EACH.captures_iter(line) {
                merge_variable(
                    &mut out.variables,
                    Variable::new(&caps[1], VariableScope::Template, SourceLocation::line(path, i + 1)),
                );
            }
        }
    }
}

impl LanguageExtractor for SvelteExtractor {
    fn language(&self) -> Language {
        Language::Svelte
    }

    fn extract(&self, path: &str, content: &str) -> Extraction {
        let blocks = script_blocks(content);
        let mut out = Extraction::default();

        for block in &blocks {
            let mut script = ScriptExtractor::new(block.typescript).extract(path, block.body);
            for var in &mut script.variables {
                if var.value.as_deref().map_or(false, |v| v.starts_with("$derived")) {
                    var.scope = VariableScope::Component;
                }
            }
            for (i, line) in block.body.lines().enumerate() {
                if let Some(caps) = REACTIVE.captures(line) {
                    merge_variable(
                        &mut script.variables,
                        Variable::new(
                            &caps[1],
                            VariableScope::Component,
                            SourceLocation::line(path, i + 1),
                        ),
                    );
                }
            }
            script.shift(block.offset);
            out.extend(script);
        }

        self.template(path, content, &blocks, &mut out);
        out
    }

    fn dependencies(&self, content: &str) -> Vec<String> {
        let mut deps: Vec<String> = Vec::new();
        for block in script_blocks(content) {
            for dep in ScriptExtractor::new(block.typescript).dependencies(block.body) {
                if !deps.contains(&dep) {
                    deps.push(dep);
                }
            }
        }
        for caps in COMPONENT_IMPORT.captures_iter(content) {
            let module = &caps[2];
            if module.starts_with('.') && !deps.iter().any(|d| d == module) {
                deps.push(module.to_string());
            }
        }
        deps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMPONENT: &str = r#"<script lang="ts">
  import Button from './Button.svelte';
  import { store } from '$lib/stores';

  export let items: string[] = [];
  let count = $derived(items.length);
  $: doubled = count * 2;

  function handleClick(event: MouseEvent): void {
    count += 1;
  }
</script>

<h1>{count}</h1>
{#each items as item}
  <Button on:click={handleClick}>{item}</Button>
{/each}

<style>
  h1 { color: red; }
</style>
"#;

    #[test]
    fn test_script_block_is_shifted() {
        let out = SvelteExtractor.extract("src/App.svelte", COMPONENT);
        let handle = out.functions.iter().find(|f| f.name == "handleClick").unwrap();
        assert_eq!(handle.location.start_line, 9);
        assert_eq!(handle.location.end_line, 11);
        assert_eq!(handle.params[0].type_hint.as_deref(), Some("MouseEvent"));

        let button = out.imports.iter().find(|i| i.module == "./Button.svelte").unwrap();
        assert_eq!(button.location.start_line, 2);
        assert!(out.imports.iter().any(|i| i.module == "$lib/stores"));
    }

    #[test]
    fn test_component_and_template_variables() {
        let out = SvelteExtractor.extract("src/App.svelte", COMPONENT);
        let count = out.variables.iter().find(|v| v.name == "count").unwrap();
        assert_eq!(count.scope, VariableScope::Component);
        let doubled = out.variables.iter().find(|v| v.name == "doubled").unwrap();
        assert_eq!(doubled.scope, VariableScope::Component);
        assert_eq!(doubled.location().start_line, 7);
        let items = out
            .variables
            .iter()
            .find(|v| v.name == "items" && v.scope == VariableScope::Template)
            .unwrap();
        assert_eq!(items.location().start_line, 15);

        let handler = out.functions.iter().find(|f| f.name == "on_click").unwrap();
        assert_eq!(handler.location.start_line, 16);
    }

    #[test]
    fn test_dependencies() {
        let deps = SvelteExtractor.dependencies(COMPONENT);
        assert_eq!(deps, vec!["./Button.svelte"]);
    }

    #[test]
    fn test_markup_only_component() {
        let out = SvelteExtractor.extract("src/Static.svelte", "<p>hello</p>\n");
        assert!(out.is_empty());
    }
}
