//! Unified translator error type used across all phases.

use crate::ir::validate::IrValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Parse,
    Validate,
    Resolve,
    Lower,
    IrValidate,
    Classify,
    Codegen,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Parse => write!(f, "Parse"),
            Phase::Validate => write!(f, "Validate"),
            Phase::Resolve => write!(f, "Resolve"),
            Phase::Lower => write!(f, "Lower"),
            Phase::IrValidate => write!(f, "IR Validate"),
            Phase::Classify => write!(f, "Classify"),
            Phase::Codegen => write!(f, "Codegen"),
        }
    }
}

/// The fixed translation-failure taxonomy. Every pipeline error is one of
/// these; none are recoverable and none produce partial output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MalformedInput,
    Schema,
    DuplicateReference,
    UnresolvedReference,
    ForwardReference,
    CyclicDependency,
    UnsupportedConstruct,
    AmbiguousInteractionMode,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::MalformedInput => write!(f, "MalformedInputError"),
            ErrorKind::Schema => write!(f, "SchemaError"),
            ErrorKind::DuplicateReference => write!(f, "DuplicateReferenceError"),
            ErrorKind::UnresolvedReference => write!(f, "UnresolvedReferenceError"),
            ErrorKind::ForwardReference => write!(f, "ForwardReferenceError"),
            ErrorKind::CyclicDependency => write!(f, "CyclicDependencyError"),
            ErrorKind::UnsupportedConstruct => write!(f, "UnsupportedConstructError"),
            ErrorKind::AmbiguousInteractionMode => write!(f, "AmbiguousInteractionModeError"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TranslateError {
    pub kind: ErrorKind,
    pub phase: Phase,
    pub message: String,
    /// Reference name of the offending task, when one exists.
    pub task_ref: Option<String>,
    /// JSON path into the source document, e.g. `tasks[2].decisionCases.A[0]`.
    pub json_path: Option<String>,
}

impl std::fmt::Display for TranslateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}:{}] {}", self.phase, self.kind, self.message)?;
        if let Some(task_ref) = &self.task_ref {
            write!(f, " (task '{}')", task_ref)?;
        }
        if let Some(path) = &self.json_path {
            write!(f, " at {}", path)?;
        }
        Ok(())
    }
}

impl std::error::Error for TranslateError {}

impl From<IrValidationError> for TranslateError {
    fn from(e: IrValidationError) -> Self {
        TranslateError {
            kind: e.kind,
            phase: Phase::IrValidate,
            message: e.message,
            task_ref: e.op_id,
            json_path: None,
        }
    }
}

impl TranslateError {
    fn new(
        kind: ErrorKind,
        phase: Phase,
        message: impl Into<String>,
        task_ref: Option<String>,
        json_path: Option<String>,
    ) -> Self {
        TranslateError {
            kind,
            phase,
            message: message.into(),
            task_ref,
            json_path,
        }
    }

    pub fn parse(kind: ErrorKind, message: impl Into<String>, json_path: Option<String>) -> Self {
        Self::new(kind, Phase::Parse, message, None, json_path)
    }

    pub fn validate(kind: ErrorKind, message: impl Into<String>, task_ref: Option<String>) -> Self {
        Self::new(kind, Phase::Validate, message, task_ref, None)
    }

    pub fn resolve(
        kind: ErrorKind,
        message: impl Into<String>,
        task_ref: Option<String>,
        json_path: Option<String>,
    ) -> Self {
        Self::new(kind, Phase::Resolve, message, task_ref, json_path)
    }

    pub fn lower(kind: ErrorKind, message: impl Into<String>, task_ref: Option<String>) -> Self {
        Self::new(kind, Phase::Lower, message, task_ref, None)
    }

    pub fn classify(kind: ErrorKind, message: impl Into<String>, task_ref: Option<String>) -> Self {
        Self::new(kind, Phase::Classify, message, task_ref, None)
    }

    pub fn codegen(kind: ErrorKind, message: impl Into<String>, task_ref: Option<String>) -> Self {
        Self::new(kind, Phase::Codegen, message, task_ref, None)
    }
}
