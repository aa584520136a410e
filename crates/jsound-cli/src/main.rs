#![allow(clippy::print_stdout)]
use std::{
    fmt, fs,
    path::{Path, PathBuf},
    process::ExitCode,
};

use clap::{Parser, ValueEnum};
use jsound_core::{check, explain, Config, ReferenceResolution, Schema};
use serde_json::Value;

/// Decides whether every instance a producer schema accepts is also accepted by
/// a consumer schema.
#[derive(Parser)]
#[command(name = "jsound", version)]
struct Cli {
    /// The schema whose accepted instances are being checked.
    producer: PathBuf,

    /// The schema the producer must be a subset of.
    consumer: PathBuf,

    /// Solver wall-clock timeout, in seconds.
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    /// Bound on array length used to unroll array-indexed quantifiers.
    #[arg(long = "max-array-length", default_value_t = 8)]
    max_array_length: usize,

    /// How `$ref` is handled before compilation. `simulation` is reserved and
    /// not yet implemented.
    #[arg(long = "ref-resolution-strategy", value_enum, default_value = "unfold")]
    ref_resolution_strategy: RefResolutionArg,

    /// How the result is printed to stdout.
    #[arg(long = "output-format", value_enum, default_value = "pretty")]
    output_format: OutputFormat,

    /// Write the counterexample (if any) to this file, as JSON.
    #[arg(long = "counterexample-file")]
    counterexample_file: Option<PathBuf>,

    /// Raise the log level; repeat for more detail (-v, -vv, -vvv).
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum RefResolutionArg {
    Unfold,
    Simulation,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum OutputFormat {
    Pretty,
    Json,
    Minimal,
}

#[derive(Debug)]
enum CliError {
    Io { path: PathBuf, source: std::io::Error },
    Json { path: PathBuf, source: serde_json::Error },
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Io { path, source } => {
                write!(f, "could not read {}: {source}", path.display())
            }
            CliError::Json { path, source } => {
                write!(f, "{} is not valid JSON: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for CliError {}

fn read_schema(path: &Path) -> Result<Value, CliError> {
    let text = fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| CliError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn init_tracing(verbose: u8) {
    use tracing_subscriber::EnvFilter;

    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if matches!(cli.ref_resolution_strategy, RefResolutionArg::Simulation) {
        eprintln!(
            "error: --ref-resolution-strategy simulation is reserved but not yet implemented"
        );
        return ExitCode::from(2);
    }

    match run(&cli) {
        Ok(exit_code) => exit_code,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(2)
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode, CliError> {
    let producer_doc = read_schema(&cli.producer)?;
    let consumer_doc = read_schema(&cli.consumer)?;

    let cfg = Config::new()
        .timeout_seconds(cli.timeout)
        .max_array_length(cli.max_array_length)
        .reference_resolution(ReferenceResolution::Unfold);

    let result = check(&producer_doc, &consumer_doc, &cfg);

    if let Some(path) = &cli.counterexample_file {
        if let Some(counterexample) = &result.counterexample {
            let rendered = serde_json::to_string_pretty(counterexample)
                .expect("a decoded counterexample always serializes");
            fs::write(path, rendered).map_err(|source| CliError::Io {
                path: path.clone(),
                source,
            })?;
        }
    }

    render(cli.output_format, &producer_doc, &consumer_doc, &result);
    Ok(exit_code_for(&result))
}

fn exit_code_for(result: &jsound_core::CheckResult) -> ExitCode {
    if result.error_kind.is_some() {
        ExitCode::from(2)
    } else if result.compatible {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn render(format: OutputFormat, producer_doc: &Value, consumer_doc: &Value, result: &jsound_core::CheckResult) {
    match format {
        OutputFormat::Json => render_json(result),
        OutputFormat::Minimal => render_minimal(result),
        OutputFormat::Pretty => render_pretty(producer_doc, consumer_doc, result),
    }
}

fn render_json(result: &jsound_core::CheckResult) {
    let doc = serde_json::json!({
        "compatible": result.compatible,
        "counterexample": result.counterexample,
        "solver_time": result.solver_time_ms as f64 / 1000.0,
        "error": result.error_message,
    });
    println!("{doc}");
}

fn render_minimal(result: &jsound_core::CheckResult) {
    if result.error_kind.is_some() {
        println!("unknown");
    } else if result.compatible {
        println!("compatible");
    } else {
        println!("incompatible");
    }
}

fn render_pretty(producer_doc: &Value, consumer_doc: &Value, result: &jsound_core::CheckResult) {
    if let Some(kind) = result.error_kind {
        println!(
            "error ({kind}): {}",
            result.error_message.as_deref().unwrap_or("unknown error")
        );
        return;
    }

    if result.compatible {
        println!("compatible - every instance the producer schema accepts is accepted by the consumer schema");
        return;
    }

    println!("incompatible - the producer schema accepts instances the consumer schema rejects");
    let Some(witness) = &result.counterexample else {
        return;
    };
    println!(
        "counterexample:\n{}",
        serde_json::to_string_pretty(witness).unwrap_or_default()
    );

    if let (Ok(producer_schema), Ok(consumer_schema)) =
        (Schema::parse(producer_doc), Schema::parse(consumer_doc))
    {
        let explanation = explain(&producer_schema, &consumer_schema, witness);
        for failed in &explanation.failed_constraints {
            println!("  - {} at {}: {}", failed.keyword, failed.path, failed.hint);
        }
        println!("recommendation: {}", explanation.recommendation);
    }

    println!("solver time: {}ms", result.solver_time_ms);
}
