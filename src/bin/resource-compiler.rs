//! Resource Compiler CLI
//!
//! Command-line interface for building resource models and linting override files.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use resource_compiler::{
    lint_overrides, load_overrides, load_schema, BuildOptions, OverrideStore, Resource, Severity,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "resource-compiler")]
#[command(about = "Compile API schemas and overrides into provider resource models")]
#[command(version)]
struct Cli {
    /// Log per-field decisions to stderr (repeat for trace output)
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a resource model and print it as JSON
    Build {
        /// Schema document (JSON or YAML)
        schema: PathBuf,

        /// Name of the resource schema under components.schemas
        #[arg(long, short)]
        resource: String,

        /// Override file (JSON or YAML)
        #[arg(long)]
        overrides: Option<PathBuf>,

        /// Product name used in the provider type name
        #[arg(long)]
        product: String,

        /// Provider prefix used in the provider type name
        #[arg(long, default_value = "google")]
        provider: String,

        /// Location variant to build (e.g., zone, region)
        #[arg(long, default_value = "")]
        location: String,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Lint an override file against a resource schema
    Lint {
        /// Override file to lint
        overrides: PathBuf,

        /// Schema document the overrides apply to
        #[arg(long)]
        schema: PathBuf,

        /// Name of the resource schema under components.schemas
        #[arg(long, short)]
        resource: String,

        /// Output format: text (default) or json
        #[arg(long, default_value = "text")]
        format: String,

        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Build {
            schema,
            resource,
            overrides,
            product,
            provider,
            location,
            output,
            pretty,
        } => {
            let options = BuildOptions::new(product)
                .provider(provider)
                .location(location);
            run_build(&schema, &resource, overrides.as_deref(), &options, output, pretty)
        }

        Commands::Lint {
            overrides,
            schema,
            resource,
            format,
            strict,
        } => run_lint(&overrides, &schema, &resource, &format, strict),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

/// Log to stderr. `RUST_LOG` wins over `-v`.
fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run_build(
    schema_path: &Path,
    resource: &str,
    overrides_path: Option<&Path>,
    options: &BuildOptions,
    output: Option<PathBuf>,
    pretty: bool,
) -> Result<(), u8> {
    let document = load_schema(schema_path).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    let overrides = match overrides_path {
        Some(path) => load_overrides(path).map_err(|e| {
            eprintln!("Error: {}", e);
            e.exit_code() as u8
        })?,
        None => OverrideStore::default(),
    };

    let built = Resource::build(&document, resource, &overrides, options).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    let json_output = if pretty {
        serde_json::to_string_pretty(&built)
    } else {
        serde_json::to_string(&built)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;

    match output {
        Some(path) => {
            std::fs::write(&path, &json_output).map_err(|e| {
                eprintln!("Error writing to {}: {}", path.display(), e);
                3u8
            })?;
        }
        None => {
            println!("{}", json_output);
        }
    }

    Ok(())
}

fn run_lint(
    overrides_path: &Path,
    schema_path: &Path,
    resource: &str,
    format: &str,
    strict: bool,
) -> Result<(), u8> {
    let document = load_schema(schema_path).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;
    let overrides = load_overrides(overrides_path).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    let result = lint_overrides(&document, resource, &overrides);
    let passed = result.is_ok() && (!strict || result.warnings == 0);

    if format == "json" {
        let json = serde_json::to_string_pretty(&result).map_err(|e| {
            eprintln!("Error serializing output: {}", e);
            2u8
        })?;
        println!("{}", json);
    } else {
        println!(
            "Linting {} against {} ...\n",
            overrides_path.display(),
            resource
        );

        for diag in &result.diagnostics {
            let (color, label) = match diag.severity {
                Severity::Error => ("\x1b[31m", "error"),
                Severity::Warning => ("\x1b[33m", "warning"),
            };
            println!(
                "  {}{}[{}]\x1b[0m: {} - {}",
                color, label, diag.code, diag.path, diag.message
            );
        }

        println!();
        if passed {
            println!(
                "\x1b[32m✓ {} overrides checked, all passed\x1b[0m",
                result.directives_checked
            );
        } else {
            println!(
                "\x1b[31m✗ {} overrides checked ({} errors, {} warnings)\x1b[0m",
                result.directives_checked, result.errors, result.warnings
            );
        }
    }

    if passed {
        Ok(())
    } else {
        Err(1)
    }
}
