//! Internal consistency checks over lowered programs.
//!
//! Lowering should never produce an IR that fails here; these checks guard
//! the emitter's assumptions rather than user input.

use std::collections::HashSet;

use thiserror::Error;

use crate::error::ErrorKind;
use crate::ir::types::{walk_ops, CanonicalOp, JoinPolicy, ParallelBranches, TranslationIr};

#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct IrValidationError {
    pub kind: ErrorKind,
    pub message: String,
    pub op_id: Option<String>,
}

impl IrValidationError {
    fn schema(message: String, op_id: &str) -> Self {
        IrValidationError {
            kind: ErrorKind::Schema,
            message,
            op_id: Some(op_id.to_string()),
        }
    }
}

pub fn validate_ir(ir: &TranslationIr) -> Result<(), Vec<IrValidationError>> {
    let mut errors = Vec::new();

    check_unique_op_ids(ir, &mut errors);
    check_unique_signal_names(ir, &mut errors);
    check_join_targets(ir, &mut errors);
    check_branch_shapes(ir, &mut errors);

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

fn check_unique_op_ids(ir: &TranslationIr, errors: &mut Vec<IrValidationError>) {
    let mut seen = HashSet::new();
    walk_ops(&ir.program, &mut |op| {
        if !seen.insert(op.id().to_string()) {
            errors.push(IrValidationError::schema(
                format!("Duplicate operation id '{}'", op.id()),
                op.id(),
            ));
        }
    });
}

fn check_unique_signal_names(ir: &TranslationIr, errors: &mut Vec<IrValidationError>) {
    let mut seen = HashSet::new();
    walk_ops(&ir.program, &mut |op| {
        if let CanonicalOp::Suspend(s) = op {
            if !seen.insert(s.signal_name.clone()) {
                errors.push(IrValidationError::schema(
                    format!("Duplicate suspend signal name '{}'", s.signal_name),
                    &s.id,
                ));
            }
        }
    });
}

fn check_join_targets(ir: &TranslationIr, errors: &mut Vec<IrValidationError>) {
    walk_ops(&ir.program, &mut |op| {
        let CanonicalOp::Parallel(p) = op else { return };
        let JoinPolicy::On { branches: targets } = &p.join else {
            return;
        };
        let ParallelBranches::Static { branches } = &p.branches else {
            errors.push(IrValidationError::schema(
                "Selective join on a dynamic parallel".to_string(),
                &p.id,
            ));
            return;
        };
        let names: HashSet<&str> = branches.iter().map(|b| b.name.as_str()).collect();
        for target in targets {
            if !names.contains(target.as_str()) {
                errors.push(IrValidationError::schema(
                    format!("Join targets unknown branch '{}'", target),
                    &p.id,
                ));
            }
        }
    });
}

fn check_branch_shapes(ir: &TranslationIr, errors: &mut Vec<IrValidationError>) {
    walk_ops(&ir.program, &mut |op| match op {
        CanonicalOp::Branch(b) => {
            let mut labels = HashSet::new();
            for case in &b.cases {
                if !labels.insert(case.label.as_str()) {
                    errors.push(IrValidationError::schema(
                        format!("Duplicate branch case label '{}'", case.label),
                        &b.id,
                    ));
                }
            }
        }
        CanonicalOp::Loop(l) => {
            if l.body.is_empty() {
                errors.push(IrValidationError::schema(
                    "Loop has an empty body".to_string(),
                    &l.id,
                ));
            }
        }
        _ => {}
    });
}
