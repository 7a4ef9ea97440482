//! propconf CLI - Command-line interface for property resolution
//!
//! Usage:
//!   propconf get app.properties '${app.version:0.0.0}'
//!   propconf get app.yaml timeout --type int
//!   propconf dump app.properties override.yaml --no-env
//!   propconf check app.properties

use clap::{Parser, Subcommand};
use colored::Colorize;
use propconf_core::{loader, PropertyResolver, PropertyStore, SourceFormat, TypedValue, ValueType};
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;

/// propconf - Property lookup with placeholder defaults and typed values
#[derive(Parser)]
#[command(name = "propconf")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a lookup expression
    Get {
        /// Property file(s), later files override earlier ones
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Lookup expression (e.g., app.version, ${app.version}, ${app.version:1.0})
        expr: String,

        /// Convert the value: int, bool, string, date, time, datetime, zoned
        #[arg(short, long = "type")]
        value_type: Option<String>,

        /// Output format: text, json
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Don't include environment variables
        #[arg(long)]
        no_env: bool,

        /// Value to print if the expression cannot be resolved
        #[arg(short, long)]
        default: Option<String>,
    },

    /// Print the merged property table
    Dump {
        /// Property file(s), later files override earlier ones
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output format: text, json
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Don't include environment variables
        #[arg(long)]
        no_env: bool,

        /// Show the source of each key instead of its value
        #[arg(long)]
        sources: bool,
    },

    /// Quick syntax check of property files
    Check {
        /// Property file(s) to check
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

/// Run the CLI with the given arguments
pub fn run() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Get {
            files,
            expr,
            value_type,
            format,
            no_env,
            default,
        } => cmd_get(files, &expr, value_type.as_deref(), &format, no_env, default),

        Commands::Dump {
            files,
            format,
            no_env,
            sources,
        } => cmd_dump(files, &format, no_env, sources),

        Commands::Check { files } => cmd_check(files),
    }
}

fn load_store(files: &[PathBuf], no_env: bool) -> Result<PropertyStore, String> {
    if files.is_empty() {
        return Err("No property files specified".to_string());
    }

    let mut builder = PropertyStore::builder();
    if !no_env {
        builder = builder.with_env();
    }
    files
        .iter()
        .fold(builder, |builder, file| builder.with_file(file))
        .try_build()
        .map_err(|e| format!("Failed to load properties: {}", e))
}

fn parse_value_type(name: &str) -> ValueType {
    ValueType::from_str(name).unwrap_or_else(|never| match never {})
}

fn typed_to_json(value: &TypedValue) -> serde_json::Value {
    match value {
        TypedValue::Integer(i) => serde_json::Value::from(*i),
        TypedValue::Boolean(b) => serde_json::Value::from(*b),
        other => other
            .to_property_string()
            .map(serde_json::Value::from)
            .unwrap_or(serde_json::Value::Null),
    }
}

fn typed_to_text(value: &TypedValue) -> String {
    value
        .to_property_string()
        .unwrap_or_else(|| format!("<{} value>", value.type_name()))
}

fn cmd_get(
    files: Vec<PathBuf>,
    expr: &str,
    value_type: Option<&str>,
    format: &str,
    no_env: bool,
    default: Option<String>,
) -> ExitCode {
    // Load properties
    let store = match load_store(&files, no_env) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{}", e.red());
            return ExitCode::from(2);
        }
    };
    let resolver = PropertyResolver::new(store);

    // Resolve, converting if a type was requested
    let result = match value_type {
        Some(name) => resolver.get_typed(expr, &parse_value_type(name)),
        None => resolver
            .get_string(expr)
            .map(|v| v.map(TypedValue::String)),
    };

    match result {
        Ok(Some(value)) => {
            if format == "json" {
                let json = serde_json::json!({
                    "expression": expr,
                    "type": value.type_name(),
                    "value": typed_to_json(&value),
                });
                println!(
                    "{}",
                    serde_json::to_string_pretty(&json).unwrap_or_else(|_| "{}".to_string())
                );
            } else {
                println!("{}", typed_to_text(&value));
            }
            ExitCode::SUCCESS
        }
        Ok(None) => {
            if let Some(default_val) = default {
                println!("{}", default_val);
                ExitCode::SUCCESS
            } else {
                eprintln!("{}: Property '{}' not found", "Error".red(), expr);
                ExitCode::from(1)
            }
        }
        Err(e) => {
            if let Some(default_val) = default {
                println!("{}", default_val);
                ExitCode::SUCCESS
            } else {
                eprintln!("{}: {}", "Error".red(), e);
                ExitCode::from(1)
            }
        }
    }
}

fn cmd_dump(files: Vec<PathBuf>, format: &str, no_env: bool, sources: bool) -> ExitCode {
    // Load properties
    let store = match load_store(&files, no_env) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{}", e.red());
            return ExitCode::from(2);
        }
    };

    let entries: Vec<(&str, &str)> = store
        .keys()
        .into_iter()
        .map(|key| {
            let shown = if sources {
                store.source_of(key)
            } else {
                store.get(key)
            };
            (key, shown.unwrap_or_default())
        })
        .collect();

    let content = if format == "json" {
        let map: serde_json::Map<String, serde_json::Value> = entries
            .iter()
            .map(|(k, v)| (k.to_string(), serde_json::Value::from(*v)))
            .collect();
        serde_json::to_string_pretty(&map).unwrap_or_else(|_| "{}".to_string())
    } else {
        entries
            .iter()
            .map(|(k, v)| {
                if sources {
                    format!("{}: {}", k, v)
                } else {
                    format!("{}={}", k, v)
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    println!("{}", content);
    ExitCode::SUCCESS
}

fn cmd_check(files: Vec<PathBuf>) -> ExitCode {
    let mut all_valid = true;

    for file in files {
        let format = SourceFormat::from_path(&file);

        match loader::load_file(&file) {
            Ok(props) => {
                println!(
                    "{} {}: valid {} ({} keys)",
                    "✓".green(),
                    file.display(),
                    match format {
                        SourceFormat::Yaml => "YAML",
                        SourceFormat::Properties => "properties",
                    },
                    props.len()
                );
            }
            Err(e) => {
                eprintln!("{} {}: {}", "✗".red(), file.display(), e);
                all_valid = false;
            }
        }
    }

    if all_valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}
