//! Translates Netflix Conductor workflow definitions into replay-safe
//! Temporal Python projects.
//!
//! The pipeline is five pure stages. Each consumes the previous stage's
//! output and either succeeds completely or returns every error it found;
//! there is no partial output.
//!
//! 1. parse    — Conductor JSON → typed `WorkflowGraph`
//! 2. validate — structural rules over the tree
//! 3. resolve  — `${...}` references → typed refs + dependency graph
//! 4. lower    — tree → canonical operations, then IR consistency checks
//! 5. classify + codegen — determinism kinds, interaction modes, and the
//!    generated Python project

pub mod classify;
pub mod codegen;
pub mod config;
pub mod error;
pub mod ir;
pub mod lower;
pub mod parse;
pub mod resolve;
pub mod validate;

pub use classify::{Classification, InteractionContract, InteractionMode, StepKind};
pub use codegen::GeneratedFile;
pub use config::EmitterConfig;
pub use error::{ErrorKind, Phase, TranslateError};
pub use ir::TranslationIr;

/// Everything a successful translation produces.
#[derive(Debug)]
pub struct TranslationOutput {
    pub ir: TranslationIr,
    pub classification: Classification,
    pub files: Vec<GeneratedFile>,
}

/// Run the full pipeline on a Conductor workflow JSON document.
pub fn translate(
    json: &str,
    config: &EmitterConfig,
) -> Result<TranslationOutput, Vec<TranslateError>> {
    let ir = analyze(json)?;
    let classification = classify::classify(&ir)?;
    let generated = codegen::codegen(&ir, &classification, config)?;

    tracing::info!(
        workflow = %ir.metadata.name,
        files = generated.files.len(),
        warnings = ir.warnings.len(),
        "translation complete"
    );

    Ok(TranslationOutput {
        ir,
        classification,
        files: generated.files,
    })
}

/// Run every stage up to and including IR validation, without emitting code.
pub fn analyze(json: &str) -> Result<TranslationIr, Vec<TranslateError>> {
    let workflow = parse::parse_and_build(json)?;
    tracing::debug!(workflow = %workflow.name, tasks = workflow.tasks.len(), "parsed");

    validate::validate(&workflow)?;
    let resolution = resolve::resolve(&workflow)?;
    tracing::debug!(
        edges = resolution.dependencies.edges().len(),
        "references resolved"
    );

    let ir = lower::lower(&workflow, &resolution)?;
    ir::validate_ir(&ir)
        .map_err(|errors| errors.into_iter().map(TranslateError::from).collect::<Vec<_>>())?;
    Ok(ir)
}

/// Validate and classify without generating code. Used by `--check`.
pub fn check(json: &str) -> Result<Vec<ir::TranslateWarning>, Vec<TranslateError>> {
    let ir = analyze(json)?;
    classify::classify(&ir)?;
    Ok(ir.warnings)
}
