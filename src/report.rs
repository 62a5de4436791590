//! Output formatting for analysis results.
//!
//! Supports two output formats:
//! - Pretty: colored terminal summary for human readability
//! - JSON: the full `ProjectAnalysis` for programmatic consumption

use std::io::{self, Write};

use colored::*;

use crate::model::{Function, ProjectAnalysis, SmellKind};

/// How many functions the pretty report lists under "Most complex".
const TOP_COMPLEX: usize = 10;

/// Write the full analysis as pretty-printed JSON.
pub fn write_json<W: Write>(out: &mut W, analysis: &ProjectAnalysis) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(analysis)?;
    writeln!(out, "{}", json)?;
    Ok(())
}

/// Write a colored summary.
pub fn write_pretty<W: Write>(out: &mut W, analysis: &ProjectAnalysis) -> io::Result<()> {
    writeln!(out)?;
    writeln!(
        out,
        "  {} v{}",
        "codeatlas".cyan().bold(),
        env!("CARGO_PKG_VERSION")
    )?;
    writeln!(out)?;
    writeln!(out, "  {}{}", "Project:  ".dimmed(), analysis.name)?;
    writeln!(out, "  {}{}", "Root:     ".dimmed(), analysis.root)?;
    writeln!(
        out,
        "  {}{} files, {} lines, {} bytes",
        "Scanned:  ".dimmed(),
        analysis.total_files,
        analysis.total_lines,
        analysis.total_size
    )?;
    writeln!(out)?;

    write_languages(out, analysis)?;
    write_dependencies(out, analysis)?;
    write_entry_points(out, analysis)?;
    write_patterns(out, analysis)?;
    write_smells(out, analysis)?;
    write_complexity(out, analysis)?;
    write_skipped(out, analysis)?;
    Ok(())
}

fn write_languages<W: Write>(out: &mut W, analysis: &ProjectAnalysis) -> io::Result<()> {
    writeln!(out, "  {}:", "Languages".bold())?;
    for (language, count) in &analysis.languages {
        writeln!(out, "    {:<14}{}", language, count)?;
    }
    writeln!(out)
}

fn write_dependencies<W: Write>(out: &mut W, analysis: &ProjectAnalysis) -> io::Result<()> {
    let graph = &analysis.dependency_graph;
    writeln!(
        out,
        "  {}: {} internal edges",
        "Dependencies".bold(),
        graph.edge_count()
    )?;
    let cycles = graph.cycles();
    if cycles.is_empty() {
        writeln!(out, "    {}", "no cycles".green())?;
    } else {
        for cycle in cycles {
            writeln!(out, "    {} {}", "cycle".yellow(), cycle.join(" -> "))?;
        }
    }
    writeln!(out)
}

fn write_entry_points<W: Write>(out: &mut W, analysis: &ProjectAnalysis) -> io::Result<()> {
    if analysis.entry_points.is_empty() {
        return Ok(());
    }
    writeln!(out, "  {}:", "Entry points".bold())?;
    for path in &analysis.entry_points {
        writeln!(out, "    {}", path.blue())?;
    }
    writeln!(out)
}

fn write_patterns<W: Write>(out: &mut W, analysis: &ProjectAnalysis) -> io::Result<()> {
    let tagged: Vec<_> = analysis
        .files
        .values()
        .filter(|f| !f.patterns.is_empty())
        .collect();
    if tagged.is_empty() {
        return Ok(());
    }
    writeln!(out, "  {}:", "Design patterns".bold())?;
    for file in tagged {
        let names: Vec<&str> = file.patterns.iter().map(|p| p.as_str()).collect();
        writeln!(out, "    {:<40}{}", file.path.blue(), names.join(", "))?;
    }
    writeln!(out)
}

fn write_smells<W: Write>(out: &mut W, analysis: &ProjectAnalysis) -> io::Result<()> {
    let count: usize = analysis.files.values().map(|f| f.smells.len()).sum();
    if count == 0 {
        return Ok(());
    }
    writeln!(out, "  {} ({}):", "Code smells".bold(), count)?;
    writeln!(out)?;
    for file in analysis.files.values() {
        for smell in &file.smells {
            let tag = match smell.kind {
                SmellKind::DeepNesting | SmellKind::TooManyParameters => smell.kind.as_str().yellow(),
                SmellKind::LongMethod | SmellKind::LargeClass => smell.kind.as_str().red(),
            };
            write!(out, "    {:<22}", tag)?;
            write!(out, "{}", file.path.blue())?;
            writeln!(out, "{}", format!(":{}", smell.line).dimmed())?;
            writeln!(out, "            {}", smell.message)?;
        }
    }
    writeln!(out)
}

fn write_complexity<W: Write>(out: &mut W, analysis: &ProjectAnalysis) -> io::Result<()> {
    let mut scored: Vec<(&str, &Function, u32)> = analysis
        .files
        .values()
        .flat_map(|file| {
            file.all_functions()
                .filter_map(move |f| f.complexity.map(|c| (file.path.as_str(), f, c)))
        })
        .filter(|(_, _, c)| *c > 1)
        .collect();
    if scored.is_empty() {
        return Ok(());
    }
    scored.sort_by(|a, b| b.2.cmp(&a.2).then_with(|| a.0.cmp(b.0)));

    writeln!(out, "  {}:", "Most complex".bold())?;
    for (path, function, score) in scored.into_iter().take(TOP_COMPLEX) {
        let score_text = match score {
            s if s <= 5 => s.to_string().green(),
            s if s <= 10 => s.to_string().yellow(),
            s => s.to_string().red(),
        };
        writeln!(
            out,
            "    {:>4}  {}{}",
            score_text,
            function.qualified_name(),
            format!("  {}:{}", path, function.location.start_line).dimmed()
        )?;
    }
    writeln!(out)
}

fn write_skipped<W: Write>(out: &mut W, analysis: &ProjectAnalysis) -> io::Result<()> {
    if analysis.skipped.is_empty() {
        return Ok(());
    }
    writeln!(out, "  {} ({}):", "Skipped".bold(), analysis.skipped.len())?;
    for skipped in &analysis.skipped {
        writeln!(out, "    {}  {}", skipped.path, skipped.reason.dimmed())?;
    }
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::discover::SourceFile;
    use crate::engine::Engine;
    use std::path::Path;

    fn sample() -> ProjectAnalysis {
        let files = vec![
            SourceFile::new("app.py", "from util import helper\n\ndef main():\n    if helper():\n        return 1\n    return 0\n"),
            SourceFile::new("util.py", "def helper():\n    return True\n"),
            SourceFile::new("data.bin", vec![0u8, 1, 2]),
        ];
        Engine::new(Config::default()).analyze(Path::new("sample"), files)
    }

    #[test]
    fn test_json_is_the_full_model() {
        let analysis = sample();
        let mut buf = Vec::new();
        write_json(&mut buf, &analysis).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();

        assert_eq!(value["total_files"], 2);
        assert_eq!(value["files"]["app.py"]["dependencies"][0], "util.py");
        assert_eq!(value["dependency_graph"]["backward"]["util.py"][0], "app.py");
        assert_eq!(value["skipped"][0]["path"], "data.bin");
        assert_eq!(value["entry_points"][0], "app.py");
    }

    #[test]
    fn test_pretty_summary() {
        colored::control::set_override(false);
        let analysis = sample();
        let mut buf = Vec::new();
        write_pretty(&mut buf, &analysis).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert!(text.contains("2 files, 8 lines"));
        assert!(text.contains("python        2"));
        assert!(text.contains("Dependencies: 1 internal edges"));
        assert!(text.contains("no cycles"));
        assert!(text.contains("main  app.py:3"));
        assert!(text.contains("data.bin  binary content"));
    }
}
