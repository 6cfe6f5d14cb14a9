//! Lower phase: typed task tree → canonical operations.
//!
//! Every Conductor construct collapses into one of six canonical ops. Task
//! types with no canonical counterpart fail here with a specific error
//! rather than leaking into the emitter.

use crate::error::{ErrorKind, TranslateError};
use crate::ir::{
    BranchCase, BranchOp, CanonicalOp, InvokeOp, JoinPolicy, LoopOp, ParallelBranch,
    ParallelBranches, ParallelOp, StepOp, StepTaskType, SuspendOp, TranslateWarning,
    TranslationIr, WorkflowMetadata,
};
use crate::parse::{TaskBase, TaskNode, WorkflowGraph};
use crate::parse::{DoWhileSpec, DynamicForkSpec, ForkJoinSpec, HttpSpec, SubWorkflowSpec, SwitchSpec};
use crate::resolve::{declared_references, reference, Resolution, ResolvedValue};

pub fn lower(
    workflow: &WorkflowGraph,
    resolution: &Resolution,
) -> Result<TranslationIr, Vec<TranslateError>> {
    let mut lowerer = Lowerer {
        resolution,
        errors: Vec::new(),
        warnings: Vec::new(),
    };

    let program = lowerer.lower_list(&workflow.tasks);
    let output_parameters = lowerer.lower_outputs(workflow);

    if !lowerer.errors.is_empty() {
        return Err(lowerer.errors);
    }

    Ok(TranslationIr {
        metadata: WorkflowMetadata {
            name: workflow.name.clone(),
            version: workflow.version,
            description: workflow.description.clone(),
        },
        input_parameters: workflow.input_parameters.clone(),
        variables: workflow.variables.clone(),
        output_parameters,
        program,
        warnings: lowerer.warnings,
    })
}

struct Lowerer<'a> {
    resolution: &'a Resolution,
    errors: Vec<TranslateError>,
    warnings: Vec<TranslateWarning>,
}

impl Lowerer<'_> {
    fn lower_list(&mut self, tasks: &[TaskNode]) -> Vec<CanonicalOp> {
        tasks.iter().filter_map(|task| self.lower_task(task)).collect()
    }

    fn lower_task(&mut self, task: &TaskNode) -> Option<CanonicalOp> {
        match task {
            TaskNode::Simple(t) => Some(self.lower_step(
                &t.reference_name,
                &t.name,
                t.definition.as_ref(),
                StepTaskType::Simple,
            )),
            TaskNode::Http(t) => Some(self.lower_http(t)),
            TaskNode::Switch(t) => self.lower_switch(t),
            TaskNode::ForkJoin(t) => self.lower_fork_join(t),
            TaskNode::DynamicFork(t) => self.lower_dynamic_fork(t),
            TaskNode::DoWhile(t) => Some(self.lower_do_while(t)),
            TaskNode::Human(t) | TaskNode::Wait(t) => Some(CanonicalOp::Suspend(SuspendOp {
                id: t.reference_name.clone(),
                signal_name: t.reference_name.clone(),
                timeout_seconds: t.spec.timeout_seconds,
            })),
            TaskNode::SubWorkflow(t) => Some(self.lower_sub_workflow(t)),
            TaskNode::Opaque(t) => {
                self.errors.push(TranslateError::lower(
                    ErrorKind::UnsupportedConstruct,
                    format!(
                        "Task type '{}' has no canonical form and cannot be translated",
                        t.spec.task_type
                    ),
                    Some(t.reference_name.clone()),
                ));
                None
            }
        }
    }

    fn lower_step(
        &mut self,
        reference: &str,
        name: &str,
        definition: Option<&crate::parse::TaskDefinition>,
        task_type: StepTaskType,
    ) -> CanonicalOp {
        CanonicalOp::Step(StepOp {
            id: reference.to_string(),
            activity: name.to_string(),
            inputs: self.resolution.inputs_of(reference).to_vec(),
            timeout_seconds: definition.and_then(|d| d.timeout_seconds),
            retry_attempts: definition.and_then(|d| d.retry_count),
            task_type,
            deterministic_hint: definition.and_then(|d| d.deterministic).unwrap_or(false),
        })
    }

    fn lower_http(&mut self, t: &TaskBase<HttpSpec>) -> CanonicalOp {
        // The http_request envelope's own fields are the step inputs.
        let inputs = self
            .resolution
            .inputs_of(&t.reference_name)
            .iter()
            .find(|(key, _)| key == "http_request")
            .and_then(|(_, value)| match value {
                ResolvedValue::Object { fields } => Some(fields.clone()),
                _ => None,
            })
            .unwrap_or_else(|| self.resolution.inputs_of(&t.reference_name).to_vec());

        CanonicalOp::Step(StepOp {
            id: t.reference_name.clone(),
            activity: t.name.clone(),
            inputs,
            timeout_seconds: t.definition.as_ref().and_then(|d| d.timeout_seconds),
            retry_attempts: t.definition.as_ref().and_then(|d| d.retry_count),
            task_type: StepTaskType::Http,
            deterministic_hint: false,
        })
    }

    fn lower_switch(&mut self, t: &TaskBase<SwitchSpec>) -> Option<CanonicalOp> {
        if t.spec.evaluator_type != "value-param" {
            self.errors.push(TranslateError::lower(
                ErrorKind::UnsupportedConstruct,
                format!(
                    "SWITCH evaluatorType '{}' is not supported; only value-param is",
                    t.spec.evaluator_type
                ),
                Some(t.reference_name.clone()),
            ));
            return None;
        }

        // value-param: the expression names an input parameter whose resolved
        // value selects the case.
        let selector = self
            .resolution
            .inputs_of(&t.reference_name)
            .iter()
            .find(|(key, _)| *key == t.spec.expression)
            .map(|(_, value)| value.clone());
        let Some(selector) = selector else {
            self.errors.push(TranslateError::lower(
                ErrorKind::Schema,
                format!(
                    "SWITCH expression '{}' does not name an input parameter",
                    t.spec.expression
                ),
                Some(t.reference_name.clone()),
            ));
            return None;
        };

        let cases = t
            .spec
            .cases
            .iter()
            .map(|(label, body)| BranchCase {
                label: label.clone(),
                body: self.lower_list(body),
            })
            .collect();
        let default = t.spec.default_case.as_ref().map(|body| self.lower_list(body));

        if default.is_none() {
            tracing::warn!(task = %t.reference_name, "SWITCH has no defaultCase");
            self.warnings.push(TranslateWarning {
                code: "W001",
                message: format!(
                    "SWITCH '{}' has no defaultCase; an unmatched value is a no-op",
                    t.reference_name
                ),
                op_id: Some(t.reference_name.clone()),
            });
        }

        Some(CanonicalOp::Branch(BranchOp {
            id: t.reference_name.clone(),
            selector,
            cases,
            default,
        }))
    }

    fn lower_fork_join(&mut self, t: &TaskBase<ForkJoinSpec>) -> Option<CanonicalOp> {
        let mut branches = Vec::with_capacity(t.spec.branches.len());
        for (i, branch) in t.spec.branches.iter().enumerate() {
            let Some(terminal) = branch.last() else {
                self.errors.push(TranslateError::lower(
                    ErrorKind::Schema,
                    format!(
                        "FORK_JOIN '{}' branch {} is empty",
                        t.reference_name, i
                    ),
                    Some(t.reference_name.clone()),
                ));
                continue;
            };
            branches.push(ParallelBranch {
                name: terminal.reference_name().to_string(),
                body: self.lower_list(branch),
            });
        }

        let join = match &t.spec.join_on {
            Some(targets) => JoinPolicy::On {
                branches: targets.clone(),
            },
            None => JoinPolicy::All,
        };

        Some(CanonicalOp::Parallel(ParallelOp {
            id: t.reference_name.clone(),
            branches: ParallelBranches::Static { branches },
            join,
            join_ref: t.spec.join_reference_name.clone(),
        }))
    }

    fn lower_dynamic_fork(&mut self, t: &TaskBase<DynamicForkSpec>) -> Option<CanonicalOp> {
        let items = self
            .resolution
            .inputs_of(&t.reference_name)
            .iter()
            .find(|(key, _)| *key == t.spec.tasks_param)
            .map(|(_, value)| value.clone());
        let Some(items) = items else {
            self.errors.push(TranslateError::lower(
                ErrorKind::Schema,
                format!(
                    "FORK_JOIN_DYNAMIC '{}' names input parameter '{}', which is not present",
                    t.reference_name, t.spec.tasks_param
                ),
                Some(t.reference_name.clone()),
            ));
            return None;
        };

        let inputs = t.spec.tasks_input_param_name.as_ref().and_then(|param| {
            self.resolution
                .inputs_of(&t.reference_name)
                .iter()
                .find(|(key, _)| key == param)
                .map(|(_, value)| value.clone())
        });

        Some(CanonicalOp::Parallel(ParallelOp {
            id: t.reference_name.clone(),
            branches: ParallelBranches::Dynamic { items, inputs },
            join: JoinPolicy::All,
            join_ref: t.spec.join_reference_name.clone(),
        }))
    }

    fn lower_do_while(&mut self, t: &TaskBase<DoWhileSpec>) -> CanonicalOp {
        CanonicalOp::Loop(LoopOp {
            id: t.reference_name.clone(),
            condition: t.spec.condition.clone(),
            condition_reads: self
                .resolution
                .loop_conditions
                .get(&t.reference_name)
                .cloned()
                .unwrap_or_default(),
            body: self.lower_list(&t.spec.body),
        })
    }

    fn lower_sub_workflow(&mut self, t: &TaskBase<SubWorkflowSpec>) -> CanonicalOp {
        CanonicalOp::Invoke(InvokeOp {
            id: t.reference_name.clone(),
            workflow_name: t.spec.workflow_name.clone(),
            workflow_version: t.spec.workflow_version,
            inputs: self.resolution.inputs_of(&t.reference_name).to_vec(),
        })
    }

    /// Resolve the workflow-level output mapping. All tasks have completed
    /// by the time outputs are computed, so any declared name is in scope.
    fn lower_outputs(&mut self, workflow: &WorkflowGraph) -> Vec<(String, ResolvedValue)> {
        let declared = declared_references(workflow);
        let mut outputs = Vec::new();

        for (key, raw) in &workflow.output_parameters {
            match reference::resolve_value(raw) {
                Ok(value) => {
                    let mut refs = Vec::new();
                    reference::collect_refs(&value, &mut refs);
                    for data_ref in refs {
                        if let Some(producer) = data_ref.producer() {
                            if !declared.contains(producer) {
                                self.errors.push(TranslateError::lower(
                                    ErrorKind::UnresolvedReference,
                                    format!(
                                        "outputParameters.{} references unknown task '{}'",
                                        key, producer
                                    ),
                                    None,
                                ));
                            }
                        }
                    }
                    outputs.push((key.clone(), value));
                }
                Err(message) => self.errors.push(TranslateError::lower(
                    ErrorKind::MalformedInput,
                    format!("Invalid data reference in outputParameters.{}: {}", key, message),
                    None,
                )),
            }
        }

        outputs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_and_build;
    use crate::resolve::resolve;

    fn lower_json(json: &str) -> Result<TranslationIr, Vec<TranslateError>> {
        let workflow = parse_and_build(json).unwrap();
        let resolution = resolve(&workflow).unwrap();
        lower(&workflow, &resolution)
    }

    #[test]
    fn simple_task_becomes_step() {
        let ir = lower_json(
            r#"{
            "name": "wf",
            "tasks": [
                {"name": "charge_card", "taskReferenceName": "t1", "type": "SIMPLE",
                 "taskDefinition": {"retryCount": 3, "timeoutSeconds": 60}}
            ]
        }"#,
        )
        .unwrap();

        let CanonicalOp::Step(step) = &ir.program[0] else {
            panic!("expected step");
        };
        assert_eq!(step.id, "t1");
        assert_eq!(step.activity, "charge_card");
        assert_eq!(step.retry_attempts, Some(3));
        assert_eq!(step.timeout_seconds, Some(60));
        assert!(!step.deterministic_hint);
    }

    #[test]
    fn switch_without_default_warns() {
        let ir = lower_json(
            r#"{
            "name": "wf",
            "tasks": [
                {"name": "route", "taskReferenceName": "s1", "type": "SWITCH",
                 "evaluatorType": "value-param",
                 "expression": "plan",
                 "inputParameters": {"plan": "${workflow.input.plan}"},
                 "decisionCases": {
                    "gold": [{"name": "a", "taskReferenceName": "a1", "type": "SIMPLE"}]
                 }}
            ]
        }"#,
        )
        .unwrap();

        assert_eq!(ir.warnings.len(), 1);
        assert_eq!(ir.warnings[0].code, "W001");
        let CanonicalOp::Branch(branch) = &ir.program[0] else {
            panic!("expected branch");
        };
        assert!(branch.default.is_none());
        assert_eq!(branch.cases[0].label, "gold");
    }

    #[test]
    fn javascript_evaluator_unsupported() {
        let errors = lower_json(
            r#"{
            "name": "wf",
            "tasks": [
                {"name": "route", "taskReferenceName": "s1", "type": "SWITCH",
                 "evaluatorType": "javascript",
                 "expression": "$.plan === 'gold'",
                 "decisionCases": {
                    "true": [{"name": "a", "taskReferenceName": "a1", "type": "SIMPLE"}]
                 }}
            ]
        }"#,
        )
        .unwrap_err();
        assert_eq!(errors[0].kind, ErrorKind::UnsupportedConstruct);
    }

    #[test]
    fn fork_branch_names_are_terminal_refs() {
        let ir = lower_json(
            r#"{
            "name": "wf",
            "tasks": [
                {"name": "fork", "taskReferenceName": "f1", "type": "FORK_JOIN",
                 "forkTasks": [
                    [{"name": "a", "taskReferenceName": "a1", "type": "SIMPLE"},
                     {"name": "b", "taskReferenceName": "b1", "type": "SIMPLE"}],
                    [{"name": "c", "taskReferenceName": "c1", "type": "SIMPLE"}]
                 ]},
                {"name": "join", "taskReferenceName": "j1", "type": "JOIN",
                 "joinOn": ["b1"]}
            ]
        }"#,
        )
        .unwrap();

        let CanonicalOp::Parallel(p) = &ir.program[0] else {
            panic!("expected parallel");
        };
        let ParallelBranches::Static { branches } = &p.branches else {
            panic!("expected static branches");
        };
        assert_eq!(branches[0].name, "b1");
        assert_eq!(branches[1].name, "c1");
        assert_eq!(
            p.join,
            JoinPolicy::On {
                branches: vec!["b1".to_string()]
            }
        );
    }

    #[test]
    fn unknown_task_type_fails_lowering() {
        let errors = lower_json(
            r#"{
            "name": "wf",
            "tasks": [
                {"name": "jq", "taskReferenceName": "jq1", "type": "JSON_JQ_TRANSFORM"}
            ]
        }"#,
        )
        .unwrap_err();
        assert_eq!(errors[0].kind, ErrorKind::UnsupportedConstruct);
        assert!(errors[0].message.contains("JSON_JQ_TRANSFORM"));
    }
}
