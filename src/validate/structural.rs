//! Individual structural validation rules.

use std::collections::HashMap;

use crate::error::{ErrorKind, TranslateError};
use crate::parse::{TaskNode, WorkflowGraph};

/// Depth-first walk over every task in the tree, including nested bodies.
fn walk<'a>(tasks: &'a [TaskNode], visit: &mut impl FnMut(&'a TaskNode)) {
    for task in tasks {
        visit(task);
        for (_, children) in task.child_lists() {
            walk(children, visit);
        }
    }
}

/// V001: task reference names are unique across the entire tree, nested
/// bodies included.
pub fn v001_unique_reference_names(graph: &WorkflowGraph, errors: &mut Vec<TranslateError>) {
    let mut seen: HashMap<&str, u32> = HashMap::new();
    walk(&graph.tasks, &mut |task| {
        *seen.entry(task.reference_name()).or_insert(0) += 1;
    });

    for (reference, count) in seen {
        if count > 1 {
            errors.push(TranslateError::validate(
                ErrorKind::DuplicateReference,
                format!(
                    "Task reference name '{}' is declared {} times; reference names must be unique",
                    reference, count
                ),
                Some(reference.to_string()),
            ));
        }
    }
}

/// V002: the workflow has a non-empty name.
pub fn v002_nonempty_workflow_name(graph: &WorkflowGraph, errors: &mut Vec<TranslateError>) {
    if graph.name.trim().is_empty() {
        errors.push(TranslateError::validate(
            ErrorKind::Schema,
            "Workflow name must not be empty",
            None,
        ));
    }
}

/// V003: a SWITCH declares at least one case or a default.
pub fn v003_switch_has_arms(graph: &WorkflowGraph, errors: &mut Vec<TranslateError>) {
    walk(&graph.tasks, &mut |task| {
        if let TaskNode::Switch(t) = task {
            if t.spec.cases.is_empty() && t.spec.default_case.is_none() {
                errors.push(TranslateError::validate(
                    ErrorKind::Schema,
                    format!(
                        "SWITCH task '{}' has no decisionCases and no defaultCase",
                        t.reference_name
                    ),
                    Some(t.reference_name.clone()),
                ));
            }
        }
    });
}

/// V004: every name in a fork's joinOn list is a task reference declared in
/// one of that fork's branches.
pub fn v004_join_on_targets_exist(graph: &WorkflowGraph, errors: &mut Vec<TranslateError>) {
    walk(&graph.tasks, &mut |task| {
        let TaskNode::ForkJoin(t) = task else { return };
        let Some(join_on) = &t.spec.join_on else { return };

        let mut branch_refs = Vec::new();
        for branch in &t.spec.branches {
            walk(branch, &mut |child| branch_refs.push(child.reference_name()));
        }

        for target in join_on {
            if !branch_refs.contains(&target.as_str()) {
                errors.push(TranslateError::validate(
                    ErrorKind::Schema,
                    format!(
                        "joinOn names task '{}' which does not exist in any branch of fork '{}'",
                        target, t.reference_name
                    ),
                    Some(t.reference_name.clone()),
                ));
            }
        }
    });
}

/// V005: a dynamic fork is followed by a JOIN. Without one the fan-in point
/// is undefined.
pub fn v005_dynamic_fork_has_join(graph: &WorkflowGraph, errors: &mut Vec<TranslateError>) {
    walk(&graph.tasks, &mut |task| {
        if let TaskNode::DynamicFork(t) = task {
            if t.spec.join_reference_name.is_none() {
                errors.push(TranslateError::validate(
                    ErrorKind::Schema,
                    format!(
                        "FORK_JOIN_DYNAMIC task '{}' is not followed by a JOIN",
                        t.reference_name
                    ),
                    Some(t.reference_name.clone()),
                ));
            }
        }
    });
}

/// V006: suspending tasks have a usable reference name, since it becomes the
/// externally visible signal name.
pub fn v006_suspend_has_name(graph: &WorkflowGraph, errors: &mut Vec<TranslateError>) {
    walk(&graph.tasks, &mut |task| {
        if task.is_suspend() && task.reference_name().trim().is_empty() {
            errors.push(TranslateError::validate(
                ErrorKind::Schema,
                format!("{} task has an empty taskReferenceName", task.task_type()),
                None,
            ));
        }
    });
}
