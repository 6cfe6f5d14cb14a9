//! Parse phase: Conductor JSON → typed `WorkflowGraph`.
//!
//! Deserializes the raw definition, then builds the typed task tree: known
//! task types get their variant, trailing `JOIN` tasks are folded into the
//! preceding fork as its join specification, and unknown types become
//! `Opaque` nodes for the normalizer to reject with a specific error.

pub mod types;

pub use types::*;

use serde_json::Value;

use crate::error::{ErrorKind, TranslateError};

/// Deserialize a Conductor workflow JSON string.
pub fn parse(json: &str) -> Result<WorkflowDef, Vec<TranslateError>> {
    serde_json::from_str::<WorkflowDef>(json).map_err(|e| {
        let kind = if e.is_syntax() || e.is_eof() {
            ErrorKind::MalformedInput
        } else {
            ErrorKind::Schema
        };
        vec![TranslateError::parse(
            kind,
            format!("Failed to parse workflow JSON: {}", e),
            None,
        )]
    })
}

/// Parse JSON and build the typed tree in one step.
pub fn parse_and_build(json: &str) -> Result<WorkflowGraph, Vec<TranslateError>> {
    let def = parse(json)?;
    build(&def)
}

/// Build the typed, immutable `WorkflowGraph` from a raw definition.
pub fn build(def: &WorkflowDef) -> Result<WorkflowGraph, Vec<TranslateError>> {
    let mut errors = Vec::new();
    let tasks = build_task_list(&def.tasks, "tasks", &mut errors);

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(WorkflowGraph {
        name: def.name.clone(),
        version: def.version,
        description: def.description.clone(),
        input_parameters: def.input_parameters.clone(),
        variables: def.variables.clone(),
        output_parameters: def.output_parameters.clone(),
        tasks,
    })
}

fn build_task_list(defs: &[TaskDef], path: &str, errors: &mut Vec<TranslateError>) -> Vec<TaskNode> {
    let mut nodes = Vec::new();
    let mut i = 0;

    while i < defs.len() {
        let def = &defs[i];
        let task_path = format!("{}[{}]", path, i);

        match def.task_type.as_str() {
            "FORK_JOIN" | "FORK_JOIN_DYNAMIC" => {
                // A JOIN immediately after a fork is the fork's join spec.
                let join = defs.get(i + 1).filter(|next| next.task_type == "JOIN");
                let node = if def.task_type == "FORK_JOIN" {
                    build_fork_join(def, join, &task_path, errors)
                } else {
                    build_dynamic_fork(def, join, &task_path, errors)
                };
                nodes.push(node);
                if join.is_some() {
                    i += 1;
                }
            }
            "JOIN" => {
                errors.push(TranslateError::parse(
                    ErrorKind::Schema,
                    format!(
                        "JOIN task '{}' is not preceded by a FORK_JOIN or FORK_JOIN_DYNAMIC",
                        def.task_reference_name
                    ),
                    Some(task_path.clone()),
                ));
            }
            _ => nodes.push(build_task(def, &task_path, errors)),
        }

        i += 1;
    }

    nodes
}

fn build_task(def: &TaskDef, path: &str, errors: &mut Vec<TranslateError>) -> TaskNode {
    match def.task_type.as_str() {
        "SIMPLE" => TaskNode::Simple(base(def, SimpleSpec)),
        "HTTP" => build_http(def, path, errors),
        "SWITCH" => build_switch(def, path, errors),
        "DO_WHILE" => build_do_while(def, path, errors),
        "HUMAN" => TaskNode::Human(base(
            def,
            SuspendSpec {
                timeout_seconds: def.task_definition.as_ref().and_then(|d| d.timeout_seconds),
            },
        )),
        "WAIT" => build_wait(def, path, errors),
        "SUB_WORKFLOW" => build_sub_workflow(def, path, errors),
        other => TaskNode::Opaque(base(
            def,
            OpaqueSpec {
                task_type: other.to_string(),
                raw: def.extra.clone(),
            },
        )),
    }
}

fn base<S>(def: &TaskDef, spec: S) -> TaskBase<S> {
    TaskBase {
        name: def.name.clone(),
        reference_name: def.task_reference_name.clone(),
        input_parameters: def.input_parameters.clone(),
        definition: def.task_definition.clone(),
        spec,
    }
}

fn build_http(def: &TaskDef, path: &str, errors: &mut Vec<TranslateError>) -> TaskNode {
    let Some(Value::Object(request)) = def.input_parameters.get("http_request") else {
        errors.push(TranslateError::parse(
            ErrorKind::Schema,
            format!(
                "HTTP task '{}' is missing the inputParameters.http_request object",
                def.task_reference_name
            ),
            Some(format!("{}.inputParameters", path)),
        ));
        return TaskNode::Simple(base(def, SimpleSpec));
    };

    if request.get("uri").is_none_or(Value::is_null) {
        errors.push(TranslateError::parse(
            ErrorKind::Schema,
            format!("HTTP task '{}' has no uri", def.task_reference_name),
            Some(format!("{}.inputParameters.http_request", path)),
        ));
    }

    TaskNode::Http(base(def, HttpSpec))
}

fn build_switch(def: &TaskDef, path: &str, errors: &mut Vec<TranslateError>) -> TaskNode {
    let expression = def.expression.clone().unwrap_or_default();
    if expression.is_empty() {
        errors.push(TranslateError::parse(
            ErrorKind::Schema,
            format!("SWITCH task '{}' has no expression", def.task_reference_name),
            Some(path.to_string()),
        ));
    }

    let mut cases = Vec::new();
    if let Some(raw_cases) = &def.decision_cases {
        for (label, case_defs) in raw_cases {
            let case_path = format!("{}.decisionCases.{}", path, label);
            cases.push((label.clone(), build_task_list(case_defs, &case_path, errors)));
        }
    }

    let default_case = def
        .default_case
        .as_ref()
        .filter(|defs| !defs.is_empty())
        .map(|defs| build_task_list(defs, &format!("{}.defaultCase", path), errors));

    TaskNode::Switch(base(
        def,
        SwitchSpec {
            evaluator_type: def
                .evaluator_type
                .clone()
                .unwrap_or_else(|| "value-param".to_string()),
            expression,
            cases,
            default_case,
        },
    ))
}

fn build_fork_join(
    def: &TaskDef,
    join: Option<&TaskDef>,
    path: &str,
    errors: &mut Vec<TranslateError>,
) -> TaskNode {
    let branches = match &def.fork_tasks {
        Some(branches) if !branches.is_empty() => branches
            .iter()
            .enumerate()
            .map(|(i, branch)| build_task_list(branch, &format!("{}.forkTasks[{}]", path, i), errors))
            .collect(),
        _ => {
            errors.push(TranslateError::parse(
                ErrorKind::Schema,
                format!(
                    "FORK_JOIN task '{}' declares no forkTasks branches",
                    def.task_reference_name
                ),
                Some(path.to_string()),
            ));
            Vec::new()
        }
    };

    TaskNode::ForkJoin(base(
        def,
        ForkJoinSpec {
            branches,
            join_reference_name: join.map(|j| j.task_reference_name.clone()),
            join_on: join.and_then(|j| j.join_on.clone()).filter(|on| !on.is_empty()),
        },
    ))
}

fn build_dynamic_fork(
    def: &TaskDef,
    join: Option<&TaskDef>,
    path: &str,
    errors: &mut Vec<TranslateError>,
) -> TaskNode {
    let tasks_param = def.dynamic_fork_tasks_param.clone().unwrap_or_default();
    if tasks_param.is_empty() {
        errors.push(TranslateError::parse(
            ErrorKind::Schema,
            format!(
                "FORK_JOIN_DYNAMIC task '{}' has no dynamicForkTasksParam",
                def.task_reference_name
            ),
            Some(path.to_string()),
        ));
    }

    TaskNode::DynamicFork(base(
        def,
        DynamicForkSpec {
            tasks_param,
            tasks_input_param_name: def.dynamic_fork_tasks_input_param_name.clone(),
            join_reference_name: join.map(|j| j.task_reference_name.clone()),
        },
    ))
}

fn build_do_while(def: &TaskDef, path: &str, errors: &mut Vec<TranslateError>) -> TaskNode {
    let condition = def.loop_condition.clone().unwrap_or_default();
    if condition.is_empty() {
        errors.push(TranslateError::parse(
            ErrorKind::Schema,
            format!(
                "DO_WHILE task '{}' has no loopCondition",
                def.task_reference_name
            ),
            Some(path.to_string()),
        ));
    }

    let body = match &def.loop_over {
        Some(body) if !body.is_empty() => {
            build_task_list(body, &format!("{}.loopOver", path), errors)
        }
        _ => {
            errors.push(TranslateError::parse(
                ErrorKind::Schema,
                format!("DO_WHILE task '{}' has an empty loopOver body", def.task_reference_name),
                Some(path.to_string()),
            ));
            Vec::new()
        }
    };

    TaskNode::DoWhile(base(def, DoWhileSpec { condition, body }))
}

fn build_wait(def: &TaskDef, path: &str, errors: &mut Vec<TranslateError>) -> TaskNode {
    if def.input_parameters.contains_key("until") {
        errors.push(TranslateError::parse(
            ErrorKind::UnsupportedConstruct,
            format!(
                "WAIT task '{}' uses an absolute 'until' timestamp, which has no \
                 deterministic translation; use a relative duration",
                def.task_reference_name
            ),
            Some(format!("{}.inputParameters.until", path)),
        ));
    }

    let timeout_seconds = match def.input_parameters.get("duration") {
        Some(Value::String(duration)) => match parse_duration_secs(duration) {
            Some(secs) => Some(secs),
            None => {
                errors.push(TranslateError::parse(
                    ErrorKind::Schema,
                    format!(
                        "WAIT task '{}' has unparseable duration '{}'",
                        def.task_reference_name, duration
                    ),
                    Some(format!("{}.inputParameters.duration", path)),
                ));
                None
            }
        },
        Some(Value::Number(n)) => n.as_u64(),
        _ => def.task_definition.as_ref().and_then(|d| d.timeout_seconds),
    };

    TaskNode::Wait(base(def, SuspendSpec { timeout_seconds }))
}

fn build_sub_workflow(def: &TaskDef, path: &str, errors: &mut Vec<TranslateError>) -> TaskNode {
    let Some(param) = &def.sub_workflow_param else {
        errors.push(TranslateError::parse(
            ErrorKind::Schema,
            format!(
                "SUB_WORKFLOW task '{}' has no subWorkflowParam",
                def.task_reference_name
            ),
            Some(path.to_string()),
        ));
        return TaskNode::Simple(base(def, SimpleSpec));
    };

    TaskNode::SubWorkflow(base(
        def,
        SubWorkflowSpec {
            workflow_name: param.name.clone(),
            workflow_version: param.version,
        },
    ))
}

/// Parse Conductor wait durations: `90`, `90s`, `5m`, `2h`, `1d`.
pub fn parse_duration_secs(s: &str) -> Option<u64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(secs) = s.parse::<u64>() {
        return Some(secs);
    }
    if !s.is_char_boundary(s.len() - 1) {
        return None;
    }
    let (value, unit) = s.split_at(s.len() - 1);
    let value: u64 = value.trim().parse().ok()?;
    match unit {
        "s" => Some(value),
        "m" => Some(value * 60),
        "h" => Some(value * 3600),
        "d" => Some(value * 86_400),
        _ => None,
    }
}
