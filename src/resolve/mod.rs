//! Resolve phase: turn `${...}` placeholders into typed references and build
//! the data-dependency graph.
//!
//! Resolution walks the task tree in execution order with a visibility set:
//! a task may only reference outputs of tasks that have already completed on
//! every path reaching it. Sibling branches of a fork or switch get cloned
//! scopes, so cross-branch references fail as forward references. Once a
//! construct completes, everything it contains becomes visible downstream.

pub mod graph;
pub mod reference;

pub use graph::{DependencyEdge, DependencyGraph};
pub use reference::{collect_refs, DataRef, ResolvedValue, TemplatePart};

use std::collections::{BTreeMap, HashSet};

use crate::error::{ErrorKind, TranslateError};
use crate::parse::{TaskNode, WorkflowGraph};

/// Output of the resolve phase.
#[derive(Debug, Default)]
pub struct Resolution {
    /// Per task (by reference name), the resolved input parameters in
    /// declared order.
    pub task_inputs: BTreeMap<String, Vec<(String, ResolvedValue)>>,
    /// Per DO_WHILE task, the references its loop condition reads.
    pub loop_conditions: BTreeMap<String, Vec<DataRef>>,
    pub dependencies: DependencyGraph,
}

impl Resolution {
    pub fn inputs_of(&self, reference: &str) -> &[(String, ResolvedValue)] {
        self.task_inputs.get(reference).map_or(&[], Vec::as_slice)
    }
}

/// Every reference name a `${...}` placeholder could legally target,
/// including folded JOIN names.
pub fn declared_references(workflow: &WorkflowGraph) -> HashSet<String> {
    let mut out = HashSet::new();
    collect_declared(&workflow.tasks, &mut out);
    out
}

pub fn resolve(workflow: &WorkflowGraph) -> Result<Resolution, Vec<TranslateError>> {
    let declared = declared_references(workflow);

    let mut resolver = Resolver {
        declared,
        resolution: Resolution::default(),
        errors: Vec::new(),
    };

    let mut visible = HashSet::new();
    resolver.walk_list(&workflow.tasks, &mut visible);

    if !resolver.errors.is_empty() {
        return Err(resolver.errors);
    }
    if let Err(e) = resolver.resolution.dependencies.check_acyclic() {
        return Err(vec![e]);
    }
    Ok(resolver.resolution)
}

fn collect_declared(tasks: &[TaskNode], out: &mut HashSet<String>) {
    for task in tasks {
        out.insert(task.reference_name().to_string());
        let join_ref = match task {
            TaskNode::ForkJoin(t) => t.spec.join_reference_name.as_ref(),
            TaskNode::DynamicFork(t) => t.spec.join_reference_name.as_ref(),
            _ => None,
        };
        if let Some(join_ref) = join_ref {
            out.insert(join_ref.clone());
        }
        for (_, children) in task.child_lists() {
            collect_declared(children, out);
        }
    }
}

struct Resolver {
    declared: HashSet<String>,
    resolution: Resolution,
    errors: Vec<TranslateError>,
}

impl Resolver {
    fn walk_list(&mut self, tasks: &[TaskNode], visible: &mut HashSet<String>) {
        for task in tasks {
            self.visit(task, visible);
        }
    }

    fn visit(&mut self, task: &TaskNode, visible: &mut HashSet<String>) {
        let reference = task.reference_name().to_string();

        self.resolve_inputs(task, visible);

        match task {
            TaskNode::Switch(t) => {
                for (_, body) in &t.spec.cases {
                    let mut scope = visible.clone();
                    self.walk_list(body, &mut scope);
                }
                if let Some(default) = &t.spec.default_case {
                    let mut scope = visible.clone();
                    self.walk_list(default, &mut scope);
                }
                expose_nested(task, visible);
            }
            TaskNode::ForkJoin(t) => {
                for branch in &t.spec.branches {
                    let mut scope = visible.clone();
                    self.walk_list(branch, &mut scope);
                }
                expose_nested(task, visible);
                if let Some(join_ref) = &t.spec.join_reference_name {
                    visible.insert(join_ref.clone());
                }
            }
            TaskNode::DynamicFork(t) => {
                if let Some(join_ref) = &t.spec.join_reference_name {
                    visible.insert(join_ref.clone());
                }
            }
            TaskNode::DoWhile(t) => {
                // The body may read the loop's own iteration counter.
                let mut scope = visible.clone();
                scope.insert(reference.clone());
                self.walk_list(&t.spec.body, &mut scope);

                match reference::parse_condition_refs(&t.spec.condition) {
                    Ok(refs) => {
                        // Visibility only; loop conditions are iterative by
                        // nature and do not participate in the dependency DAG.
                        for data_ref in &refs {
                            self.check_ref(data_ref, &reference, &scope, false);
                        }
                        self.resolution.loop_conditions.insert(reference.clone(), refs);
                    }
                    Err(message) => self.errors.push(TranslateError::resolve(
                        ErrorKind::MalformedInput,
                        format!("Invalid loopCondition: {}", message),
                        Some(reference.clone()),
                        None,
                    )),
                }
                expose_nested(task, visible);
            }
            _ => {}
        }

        visible.insert(reference);
    }

    fn resolve_inputs(&mut self, task: &TaskNode, visible: &HashSet<String>) {
        let reference = task.reference_name();
        let mut resolved = Vec::new();

        for (key, raw) in task.input_parameters() {
            match reference::resolve_value(raw) {
                Ok(value) => {
                    let mut refs = Vec::new();
                    collect_refs(&value, &mut refs);
                    for data_ref in refs {
                        self.check_ref(data_ref, reference, visible, true);
                    }
                    resolved.push((key.clone(), value));
                }
                Err(message) => self.errors.push(TranslateError::resolve(
                    ErrorKind::MalformedInput,
                    format!("Invalid data reference in inputParameters.{}: {}", key, message),
                    Some(reference.to_string()),
                    None,
                )),
            }
        }

        self.resolution
            .task_inputs
            .insert(reference.to_string(), resolved);
    }

    fn check_ref(
        &mut self,
        data_ref: &DataRef,
        consumer: &str,
        visible: &HashSet<String>,
        record_edge: bool,
    ) {
        let Some(producer) = data_ref.producer() else {
            return;
        };

        if producer == consumer {
            // A loop condition reading the loop's own state is the one legal
            // self-reference; by then the loop ref is already in scope.
            if visible.contains(producer) {
                return;
            }
            self.errors.push(TranslateError::resolve(
                ErrorKind::CyclicDependency,
                format!("Task '{}' references its own output", consumer),
                Some(consumer.to_string()),
                None,
            ));
            return;
        }

        if visible.contains(producer) {
            if record_edge {
                self.resolution.dependencies.add_edge(
                    producer,
                    consumer,
                    data_ref.field_path().join("."),
                );
            }
        } else if self.declared.contains(producer) {
            self.errors.push(TranslateError::resolve(
                ErrorKind::ForwardReference,
                format!(
                    "Task '{}' references '{}', which has not completed on every path reaching it",
                    consumer, producer
                ),
                Some(consumer.to_string()),
                None,
            ));
        } else {
            self.errors.push(TranslateError::resolve(
                ErrorKind::UnresolvedReference,
                format!(
                    "Task '{}' references unknown task '{}'",
                    consumer, producer
                ),
                Some(consumer.to_string()),
                None,
            ));
        }
    }
}

/// After a construct completes, everything nested in it has run (or been
/// skipped) and its outputs are addressable downstream.
fn expose_nested(task: &TaskNode, visible: &mut HashSet<String>) {
    for (_, children) in task.child_lists() {
        for child in children {
            visible.insert(child.reference_name().to_string());
            expose_nested(child, visible);
        }
    }
}
