//! Codegen phase: canonical operations → a runnable Temporal Python project.

pub mod files;
pub mod value_expr;
pub mod workflow_file;
pub mod writer;

use serde::Serialize;

use crate::classify::Classification;
use crate::config::EmitterConfig;
use crate::error::{ErrorKind, TranslateError};
use crate::ir::TranslationIr;

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedFile {
    pub path: String,
    pub contents: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CodegenOutput {
    pub files: Vec<GeneratedFile>,
}

pub fn codegen(
    ir: &TranslationIr,
    classification: &Classification,
    config: &EmitterConfig,
) -> Result<CodegenOutput, Vec<TranslateError>> {
    let workflow_py = workflow_file::emit_workflow(ir, classification, config)?;
    let contract = serde_json::to_string_pretty(&classification.contract()).map_err(|e| {
        vec![TranslateError::codegen(
            ErrorKind::Schema,
            format!("Failed to serialize interaction contract: {}", e),
            None,
        )]
    })?;

    Ok(CodegenOutput {
        files: vec![
            GeneratedFile {
                path: "workflow.py".to_string(),
                contents: workflow_py,
            },
            GeneratedFile {
                path: "activities.py".to_string(),
                contents: files::emit_activities(ir, classification),
            },
            GeneratedFile {
                path: "worker.py".to_string(),
                contents: files::emit_worker(ir, classification, config),
            },
            GeneratedFile {
                path: "starter.py".to_string(),
                contents: files::emit_starter(ir, classification, config),
            },
            GeneratedFile {
                path: "contract.json".to_string(),
                contents: contract + "\n",
            },
        ],
    })
}

/// Sanitize a reference name into a Python identifier.
pub fn py_ident(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            out.push(c);
        } else {
            out.push('_');
        }
    }
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

/// Workflow class name from the Conductor workflow name.
pub fn pascal_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if upper_next {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c);
            }
            upper_next = false;
        } else {
            upper_next = true;
        }
    }
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert_str(0, "Workflow");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_sanitized() {
        assert_eq!(py_ident("charge-card"), "charge_card");
        assert_eq!(py_ident("2fa_check"), "_2fa_check");
        assert_eq!(py_ident("ok_name"), "ok_name");
    }

    #[test]
    fn class_names() {
        assert_eq!(pascal_case("order_flow"), "OrderFlow");
        assert_eq!(pascal_case("schema-approval"), "SchemaApproval");
        assert_eq!(pascal_case("2phase"), "Workflow2phase");
    }
}
