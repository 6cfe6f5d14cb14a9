use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use conductor_bridge::{check, translate, EmitterConfig, TranslateError};

/// Translate a Conductor workflow definition into a Temporal Python project.
#[derive(Debug, Parser)]
#[command(name = "conductor-bridge", version)]
struct Cli {
    /// Conductor workflow definition (JSON).
    input: PathBuf,

    /// Directory the generated project is written to.
    #[arg(short, long, default_value = "generated")]
    out: PathBuf,

    /// Emitter configuration file (JSON).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Validate and classify only; write nothing.
    #[arg(long)]
    check: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let json = fs::read_to_string(&cli.input)
        .with_context(|| format!("failed to read {}", cli.input.display()))?;

    let config = match &cli.config {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_str::<EmitterConfig>(&raw)
                .with_context(|| format!("invalid emitter config {}", path.display()))?
        }
        None => EmitterConfig::default(),
    };

    if cli.check {
        let warnings = check(&json).map_err(report_errors)?;
        for warning in &warnings {
            eprintln!("warning[{}]: {}", warning.code, warning.message);
        }
        println!("{}: OK", cli.input.display());
        return Ok(());
    }

    let output = translate(&json, &config).map_err(report_errors)?;

    for warning in &output.ir.warnings {
        eprintln!("warning[{}]: {}", warning.code, warning.message);
    }

    fs::create_dir_all(&cli.out)
        .with_context(|| format!("failed to create {}", cli.out.display()))?;
    for file in &output.files {
        let path = cli.out.join(&file.path);
        fs::write(&path, &file.contents)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("wrote {}", path.display());
    }

    Ok(())
}

fn report_errors(errors: Vec<TranslateError>) -> anyhow::Error {
    for error in &errors {
        eprintln!("error: {}", error);
    }
    anyhow::anyhow!("translation failed with {} error(s)", errors.len())
}
