//! Command-line interface for codeatlas.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::*;

use crate::config::{Config, CONFIG_FILE_NAMES};
use crate::discover::discover;
use crate::engine::Engine;
use crate::model::ProjectAnalysis;
use crate::report;

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_ERROR: i32 = 2;

/// Multi-language source tree analyzer.
///
/// Codeatlas extracts functions, types, variables and imports from Python,
/// JavaScript, TypeScript, C++, C# and Svelte sources, resolves internal
/// imports into a dependency graph, and reports behavior, complexity,
/// design patterns and code smells.
#[derive(Parser)]
#[command(name = "codeatlas")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze a source tree
    Analyze(AnalyzeArgs),
    /// Write a default codeatlas.yaml
    Init(InitArgs),
}

impl Commands {
    /// Whether debug logging was requested.
    pub fn verbose(&self) -> bool {
        match self {
            Commands::Analyze(args) => args.verbose,
            Commands::Init(_) => false,
        }
    }
}

/// Arguments for the analyze command.
#[derive(Parser)]
pub struct AnalyzeArgs {
    /// Project root to analyze
    pub path: PathBuf,

    /// Path to config YAML file (default: auto-discover)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output format: pretty or json
    #[arg(short, long, default_value = "pretty")]
    pub format: String,

    /// Write the report to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Worker threads (overrides the config file)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Arguments for the init command.
#[derive(Parser)]
pub struct InitArgs {
    /// Output file path
    #[arg(short, long, default_value = "codeatlas.yaml")]
    pub output: PathBuf,
}

/// Run the analyze command.
pub fn run_analyze(args: &AnalyzeArgs) -> anyhow::Result<i32> {
    if !matches!(args.format.as_str(), "pretty" | "json") {
        anyhow::bail!("unknown format '{}' (expected pretty or json)", args.format);
    }
    if args.jobs == Some(0) {
        anyhow::bail!("--jobs must be at least 1");
    }

    let cwd = std::env::current_dir()?;
    let mut config = Config::load(args.config.as_deref(), &cwd)?;
    if args.jobs.is_some() {
        config.jobs = args.jobs;
    }

    let files = discover(&args.path, &config)?;
    let analysis = Engine::new(config).analyze(&args.path, files);

    match args.output {
        Some(ref path) => {
            // No escape codes in files.
            colored::control::set_override(false);
            let mut out = BufWriter::new(File::create(path)?);
            write_report(&mut out, &args.format, &analysis)?;
            out.flush()?;
            eprintln!("{} {}", "Wrote".green(), path.display());
        }
        None => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            write_report(&mut out, &args.format, &analysis)?;
        }
    }

    Ok(EXIT_SUCCESS)
}

fn write_report<W: Write>(out: &mut W, format: &str, analysis: &ProjectAnalysis) -> anyhow::Result<()> {
    match format {
        "json" => report::write_json(out, analysis),
        _ => Ok(report::write_pretty(out, analysis)?),
    }
}

/// Run the init command.
pub fn run_init(args: &InitArgs) -> anyhow::Result<i32> {
    Config::write_template(&args.output)?;

    println!("{} {}", "Created".green().bold(), args.output.display());
    println!();
    println!("Next steps:");
    println!("  1. Edit {} to tune the smell thresholds", args.output.display());
    println!("  2. Run: codeatlas analyze <path>");
    if !CONFIG_FILE_NAMES.iter().any(|n| args.output.ends_with(n)) {
        println!(
            "     (pass {} since it is not auto-discovered)",
            format!("--config {}", args.output.display()).dimmed()
        );
    }

    Ok(EXIT_SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_analyze_args() {
        let cli = Cli::try_parse_from([
            "codeatlas", "analyze", "src", "--format", "json", "--jobs", "4", "-v",
        ])
        .unwrap();
        let Commands::Analyze(args) = cli.command else {
            panic!("expected analyze");
        };
        assert_eq!(args.path, PathBuf::from("src"));
        assert_eq!(args.format, "json");
        assert_eq!(args.jobs, Some(4));
        assert!(args.verbose);
        assert!(args.output.is_none());
    }

    #[test]
    fn test_init_default_output() {
        let cli = Cli::try_parse_from(["codeatlas", "init"]).unwrap();
        assert!(!cli.command.verbose());
        let Commands::Init(args) = cli.command else {
            panic!("expected init");
        };
        assert_eq!(args.output, PathBuf::from("codeatlas.yaml"));
    }

    #[test]
    fn test_analyze_writes_json_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("main.py"), "def main():\n    return 0\n").unwrap();
        let output = dir.path().join("out.json");

        let args = AnalyzeArgs {
            path: dir.path().to_path_buf(),
            config: None,
            format: "json".to_string(),
            output: Some(output.clone()),
            jobs: Some(1),
            verbose: false,
        };
        assert_eq!(run_analyze(&args).unwrap(), EXIT_SUCCESS);

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(output).unwrap()).unwrap();
        assert_eq!(value["files"]["main.py"]["functions"][0]["name"], "main");
    }

    #[test]
    fn test_analyze_rejects_bad_format() {
        let args = AnalyzeArgs {
            path: PathBuf::from("."),
            config: None,
            format: "sarif".to_string(),
            output: None,
            jobs: None,
            verbose: false,
        };
        assert!(run_analyze(&args).is_err());
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let args = InitArgs {
            output: dir.path().join("codeatlas.yaml"),
        };
        assert_eq!(run_init(&args).unwrap(), EXIT_SUCCESS);
        assert!(run_init(&args).is_err());
    }
}
