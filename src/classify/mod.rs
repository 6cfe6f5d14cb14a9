//! Classify phase: determinism kinds for steps, interaction modes for
//! suspends.
//!
//! Step kinds decide whether work runs as an activity or inline in workflow
//! code. Interaction modes decide whether a suspend's external input arrives
//! as a fire-and-forget signal or a request-response update; when the
//! program's data flow supports neither reading, classification fails rather
//! than guessing.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::error::{ErrorKind, TranslateError};
use crate::ir::{walk_ops, CanonicalOp, ParallelBranches, TranslationIr};
use crate::resolve::{collect_refs, DataRef, ResolvedValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Deterministic computation; safe to run inline in workflow code.
    PureCompute,
    /// Touches the outside world; must run as an activity.
    ExternalIo,
    /// Waits for a human or external system.
    HumanInteraction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionMode {
    /// Caller needs an acknowledgement; emitted as a workflow update.
    RequestResponse,
    /// Input is delivered and forgotten; emitted as a workflow signal.
    FireAndForget,
}

#[derive(Debug, Default)]
pub struct Classification {
    pub kinds: BTreeMap<String, StepKind>,
    pub modes: BTreeMap<String, InteractionMode>,
}

/// The externally visible interaction surface of the generated workflow.
#[derive(Debug, Clone, Serialize)]
pub struct InteractionContract {
    pub signals: Vec<String>,
    pub updates: Vec<String>,
    pub queries: Vec<String>,
}

impl Classification {
    pub fn kind_of(&self, op_id: &str) -> StepKind {
        self.kinds.get(op_id).copied().unwrap_or(StepKind::ExternalIo)
    }

    pub fn contract(&self) -> InteractionContract {
        let mut signals = Vec::new();
        let mut updates = Vec::new();
        for (id, mode) in &self.modes {
            match mode {
                InteractionMode::FireAndForget => signals.push(id.clone()),
                InteractionMode::RequestResponse => updates.push(id.clone()),
            }
        }
        InteractionContract {
            signals,
            updates,
            queries: vec!["status".to_string()],
        }
    }
}

pub fn classify(ir: &TranslationIr) -> Result<Classification, Vec<TranslateError>> {
    let mut condition_readers: HashSet<String> = HashSet::new();
    let mut input_readers: HashSet<String> = HashSet::new();

    walk_ops(&ir.program, &mut |op| match op {
        CanonicalOp::Branch(b) => note_producers(&b.selector, &mut condition_readers),
        CanonicalOp::Loop(l) => {
            for data_ref in &l.condition_reads {
                if let Some(producer) = data_ref.producer() {
                    condition_readers.insert(producer.to_string());
                }
            }
        }
        CanonicalOp::Step(s) => {
            for (_, value) in &s.inputs {
                note_producers(value, &mut input_readers);
            }
        }
        CanonicalOp::Invoke(i) => {
            for (_, value) in &i.inputs {
                note_producers(value, &mut input_readers);
            }
        }
        CanonicalOp::Parallel(p) => {
            if let ParallelBranches::Dynamic { items, .. } = &p.branches {
                note_producers(items, &mut input_readers);
            }
        }
        CanonicalOp::Suspend(_) => {}
    });
    for (_, value) in &ir.output_parameters {
        note_producers(value, &mut input_readers);
    }

    let mut classification = Classification::default();
    let mut errors = Vec::new();

    walk_ops(&ir.program, &mut |op| match op {
        CanonicalOp::Step(s) => {
            let kind = match s.task_type {
                crate::ir::StepTaskType::Http => StepKind::ExternalIo,
                crate::ir::StepTaskType::Simple if s.deterministic_hint => StepKind::PureCompute,
                crate::ir::StepTaskType::Simple => StepKind::ExternalIo,
            };
            classification.kinds.insert(s.id.clone(), kind);
        }
        CanonicalOp::Suspend(s) => {
            classification
                .kinds
                .insert(s.id.clone(), StepKind::HumanInteraction);

            let mode = if condition_readers.contains(&s.id) {
                InteractionMode::RequestResponse
            } else if input_readers.contains(&s.id) {
                errors.push(TranslateError::classify(
                    ErrorKind::AmbiguousInteractionMode,
                    format!(
                        "Input for '{}' is consumed by downstream tasks but never decides \
                         control flow; neither signal nor update semantics can be inferred",
                        s.id
                    ),
                    Some(s.id.clone()),
                ));
                return;
            } else {
                InteractionMode::FireAndForget
            };
            classification.modes.insert(s.id.clone(), mode);
        }
        _ => {}
    });

    if errors.is_empty() {
        Ok(classification)
    } else {
        Err(errors)
    }
}

fn note_producers(value: &ResolvedValue, out: &mut HashSet<String>) {
    let mut refs: Vec<&DataRef> = Vec::new();
    collect_refs(value, &mut refs);
    for data_ref in refs {
        if let Some(producer) = data_ref.producer() {
            out.insert(producer.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lower::lower;
    use crate::parse::parse_and_build;
    use crate::resolve::resolve;

    fn classify_json(json: &str) -> Result<Classification, Vec<TranslateError>> {
        let workflow = parse_and_build(json).unwrap();
        let resolution = resolve(&workflow).unwrap();
        classify(&lower(&workflow, &resolution).unwrap())
    }

    #[test]
    fn deterministic_hint_makes_pure_compute() {
        let c = classify_json(
            r#"{
            "name": "wf",
            "tasks": [
                {"name": "total", "taskReferenceName": "t1", "type": "SIMPLE",
                 "taskDefinition": {"deterministic": true}},
                {"name": "send", "taskReferenceName": "t2", "type": "SIMPLE"}
            ]
        }"#,
        )
        .unwrap();
        assert_eq!(c.kind_of("t1"), StepKind::PureCompute);
        assert_eq!(c.kind_of("t2"), StepKind::ExternalIo);
    }

    #[test]
    fn suspend_read_by_branch_is_request_response() {
        let c = classify_json(
            r#"{
            "name": "wf",
            "tasks": [
                {"name": "approval", "taskReferenceName": "approve", "type": "HUMAN"},
                {"name": "route", "taskReferenceName": "s1", "type": "SWITCH",
                 "evaluatorType": "value-param",
                 "expression": "decision",
                 "inputParameters": {"decision": "${approve.output.decision}"},
                 "decisionCases": {
                    "yes": [{"name": "ship", "taskReferenceName": "ship", "type": "SIMPLE"}]
                 },
                 "defaultCase": [{"name": "halt", "taskReferenceName": "halt", "type": "SIMPLE"}]}
            ]
        }"#,
        )
        .unwrap();
        assert_eq!(c.modes["approve"], InteractionMode::RequestResponse);
        let contract = c.contract();
        assert_eq!(contract.updates, vec!["approve"]);
        assert!(contract.signals.is_empty());
    }

    #[test]
    fn unread_suspend_is_fire_and_forget() {
        let c = classify_json(
            r#"{
            "name": "wf",
            "tasks": [
                {"name": "ack", "taskReferenceName": "ack", "type": "WAIT"},
                {"name": "next", "taskReferenceName": "t1", "type": "SIMPLE"}
            ]
        }"#,
        )
        .unwrap();
        assert_eq!(c.modes["ack"], InteractionMode::FireAndForget);
    }

    #[test]
    fn suspend_read_only_as_plain_input_is_ambiguous() {
        let errors = classify_json(
            r#"{
            "name": "wf",
            "tasks": [
                {"name": "form", "taskReferenceName": "form", "type": "HUMAN"},
                {"name": "store", "taskReferenceName": "t1", "type": "SIMPLE",
                 "inputParameters": {"payload": "${form.output.fields}"}}
            ]
        }"#,
        )
        .unwrap_err();
        assert_eq!(errors[0].kind, ErrorKind::AmbiguousInteractionMode);
        assert_eq!(errors[0].task_ref.as_deref(), Some("form"));
    }

    #[test]
    fn condition_read_wins_over_input_read() {
        // Read both ways: control flow depends on it, so it is request-response.
        let c = classify_json(
            r#"{
            "name": "wf",
            "tasks": [
                {"name": "approval", "taskReferenceName": "approve", "type": "HUMAN"},
                {"name": "route", "taskReferenceName": "s1", "type": "SWITCH",
                 "evaluatorType": "value-param",
                 "expression": "decision",
                 "inputParameters": {"decision": "${approve.output.decision}"},
                 "decisionCases": {
                    "yes": [{"name": "ship", "taskReferenceName": "ship", "type": "SIMPLE",
                             "inputParameters": {"note": "${approve.output.note}"}}]
                 },
                 "defaultCase": [{"name": "halt", "taskReferenceName": "halt", "type": "SIMPLE"}]}
            ]
        }"#,
        )
        .unwrap();
        assert_eq!(c.modes["approve"], InteractionMode::RequestResponse);
    }
}
