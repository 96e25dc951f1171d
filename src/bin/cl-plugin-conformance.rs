//! Purpose: Check a plugin shared object against the libcollections plugin ABI.
//! Exports: None (binary entry point).
//! Role: Loads the plugin, runs the conformance harness, prints or writes the report.
//! Invariants: Exit code is 0 only when every check passed.
//! Invariants: Logs go to stderr; stdout carries only the summary or the JSON report.
use std::fs;
use std::io::{self, IsTerminal};
use std::path::PathBuf;

use clap::error::ErrorKind as ClapErrorKind;
use clap::{Parser, ValueHint};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use cl_plugin::abi::exported_symbols;
use cl_plugin::core::error::{Error, ErrorKind, to_status_code};
use cl_plugin::host::{ConformanceReport, DynamicLibrary, Outcome, run_conformance};

#[derive(Parser)]
#[command(
    name = "cl-plugin-conformance",
    version,
    about = "Check a plugin shared object against the libcollections plugin ABI",
    after_help = r#"EXAMPLES
  $ cl-plugin-conformance target/release/libcl_plugin.so
  $ cl-plugin-conformance --builtin --json --output report.json"#
)]
struct Cli {
    #[arg(
        help = "Path to the plugin shared object",
        value_hint = ValueHint::FilePath,
        required_unless_present = "builtin"
    )]
    plugin: Option<PathBuf>,
    #[arg(
        long,
        conflicts_with = "plugin",
        help = "Check the plugin compiled into this binary"
    )]
    builtin: bool,
    #[arg(long, help = "Print the JSON report instead of a summary")]
    json: bool,
    #[arg(long, value_hint = ValueHint::FilePath, help = "Also write the JSON report to PATH")]
    output: Option<PathBuf>,
}

fn main() {
    init_tracing();
    let exit_code = match run() {
        Ok(code) => code,
        Err(err) => {
            emit_error(&err);
            to_status_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn run() -> Result<i32, Error> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp | ClapErrorKind::DisplayVersion => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                return Ok(0);
            }
            _ => {
                return Err(Error::new(ErrorKind::Usage).with_message(err.to_string()));
            }
        },
    };

    let report = match (&cli.plugin, cli.builtin) {
        (Some(path), false) => {
            // SAFETY: the operator chose this library; loading it is the point of the tool.
            let library = unsafe { DynamicLibrary::open(path) }?;
            run_conformance(library)
        }
        _ => run_conformance(exported_symbols()),
    };

    let rendered = serde_json::to_string_pretty(&report).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to encode report")
            .with_source(err)
    })?;
    if let Some(path) = &cli.output {
        fs::write(path, format!("{rendered}\n")).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message(format!("failed to write {}", path.display()))
                .with_source(err)
        })?;
    }
    if cli.json {
        println!("{rendered}");
    } else {
        print_summary(&report);
    }
    Ok(report.exit_code())
}

fn print_summary(report: &ConformanceReport) {
    if let Some(plugin) = &report.plugin {
        println!(
            "{} {} ({}): {}",
            plugin.name, plugin.version, plugin.author, plugin.description
        );
    }
    for check in &report.checks {
        match &check.outcome {
            Outcome::Passed => println!("  ok    {}", check.name),
            Outcome::Returned { ty, value } => println!("  ok    {} -> {ty} {value}", check.name),
            Outcome::Survived => println!("  ok    {} (malformed input survived)", check.name),
            Outcome::Resolved => println!("  skip  {} (needs an argument bag)", check.name),
            Outcome::Failed { message, .. } => println!("  FAIL  {}: {message}", check.name),
        }
    }
    let verdict = if report.passed { "passed" } else { "failed" };
    println!("{verdict}: {} checks", report.checks.len());
}

fn emit_error(err: &Error) {
    if io::stderr().is_terminal() {
        eprintln!("error: {err}");
        return;
    }
    let value = json!({
        "error": {
            "kind": format!("{:?}", err.kind()),
            "message": err.to_string(),
        }
    });
    let text = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{text}");
}
