//! Nori compiler CLI.
//!
//! Command-line interface for compiling .nori programs to Udon Assembly and
//! for running front-end checks.

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use noric::{Catalog, ExternCatalog, format_diagnostics};
use std::io;
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser)]
#[command(name = "noric")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Nori compiler - compile .nori programs to Udon Assembly", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a .nori file to a .uasm assembly file
    Build {
        /// Input .nori source file
        input: PathBuf,

        /// Output path (defaults to the input with a .uasm extension)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Extern catalog JSON document (defaults to the built-in catalog)
        #[arg(long, value_name = "PATH")]
        catalog: Option<PathBuf>,
    },

    /// Run front-end checks without producing assembly
    Check {
        /// Input .nori source files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Extern catalog JSON document (defaults to the built-in catalog)
        #[arg(long, value_name = "PATH")]
        catalog: Option<PathBuf>,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            input,
            output,
            catalog,
        } => {
            let output = output.unwrap_or_else(|| input.with_extension("uasm"));
            run_build(&input, &output, catalog.as_deref());
        }
        Commands::Check { inputs, catalog } => {
            run_check(&inputs, catalog.as_deref());
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "noric", &mut io::stdout());
        }
    }
}

fn load_catalog(path: Option<&Path>) -> Option<Catalog> {
    match path {
        Some(path) => match Catalog::from_file(path) {
            Ok(catalog) => Some(catalog),
            Err(e) => {
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        },
        None => None,
    }
}

fn read_source(path: &Path) -> String {
    match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error reading {}: {}", path.display(), e);
            process::exit(1);
        }
    }
}

fn run_build(input: &Path, output: &Path, catalog_path: Option<&Path>) {
    let catalog = load_catalog(catalog_path);
    let source = read_source(input);
    let result = noric::compile(
        &source,
        input,
        catalog.as_ref().map(|c| c as &dyn ExternCatalog),
    );

    if !result.diagnostics.is_empty() {
        eprint!("{}", format_diagnostics(&result.diagnostics));
    }
    if !result.success {
        process::exit(1);
    }

    let assembly = result.assembly.unwrap_or_default();
    if let Err(e) = std::fs::write(output, assembly) {
        eprintln!("Error writing {}: {}", output.display(), e);
        process::exit(1);
    }

    println!("Compiled {} -> {}", input.display(), output.display());
    if let Some(meta) = &result.metadata {
        println!(
            "  {} cell(s), {} block(s), entry points: {}",
            meta.heap_cells,
            meta.blocks,
            if meta.entry_points.is_empty() {
                "none".to_string()
            } else {
                meta.entry_points.join(", ")
            }
        );
    }
}

fn run_check(inputs: &[PathBuf], catalog_path: Option<&Path>) {
    let catalog = load_catalog(catalog_path);
    let mut total = 0usize;
    let mut failed = false;

    for input in inputs {
        let source = read_source(input);
        let analysis = noric::analyze(
            &source,
            input,
            catalog.as_ref().map(|c| c as &dyn ExternCatalog),
        );
        total += analysis.diagnostics.len();
        if !analysis.diagnostics.is_empty() {
            eprint!("{}", format_diagnostics(&analysis.diagnostics));
        }
        failed |= analysis.diagnostics.has_errors();
    }

    if total == 0 {
        println!("No issues found in {} file(s)", inputs.len());
    } else {
        println!("{} issue(s) in {} file(s)", total, inputs.len());
    }
    if failed {
        process::exit(1);
    }
}
