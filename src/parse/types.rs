//! Rust types for the Conductor workflow-definition schema.
//!
//! Two layers: `WorkflowDef`/`TaskDef` are the raw serde targets for the
//! Conductor JSON, and `WorkflowGraph`/`TaskNode` are the typed tree the
//! loader builds from it. Unknown task `type` values are preserved as
//! `TaskNode::Opaque` rather than rejected so later phases can fail with a
//! specific error instead of a generic parse failure.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type JsonMap = serde_json::Map<String, Value>;

// =============================================================================
// RAW SERDE LAYER
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDef {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub input_parameters: Vec<String>,
    #[serde(default)]
    pub variables: JsonMap,
    #[serde(default)]
    pub output_parameters: JsonMap,
    #[serde(default)]
    pub tasks: Vec<TaskDef>,
}

fn default_version() -> u32 {
    1
}

/// One raw task. Conductor tasks are heterogeneous over a string `type`
/// discriminator, so all type-specific fields are optional here; the loader
/// picks the ones the declared type requires.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDef {
    pub name: String,
    pub task_reference_name: String,
    #[serde(rename = "type")]
    pub task_type: String,
    #[serde(default)]
    pub input_parameters: JsonMap,
    // SWITCH
    #[serde(default)]
    pub evaluator_type: Option<String>,
    #[serde(default)]
    pub expression: Option<String>,
    /// Case order is semantic (declared-order fallthrough), hence IndexMap.
    #[serde(default)]
    pub decision_cases: Option<IndexMap<String, Vec<TaskDef>>>,
    #[serde(default)]
    pub default_case: Option<Vec<TaskDef>>,
    // FORK_JOIN / JOIN
    #[serde(default)]
    pub fork_tasks: Option<Vec<Vec<TaskDef>>>,
    #[serde(default)]
    pub join_on: Option<Vec<String>>,
    // FORK_JOIN_DYNAMIC
    #[serde(default)]
    pub dynamic_fork_tasks_param: Option<String>,
    #[serde(default)]
    pub dynamic_fork_tasks_input_param_name: Option<String>,
    // DO_WHILE
    #[serde(default)]
    pub loop_condition: Option<String>,
    #[serde(default)]
    pub loop_over: Option<Vec<TaskDef>>,
    // SUB_WORKFLOW
    #[serde(default)]
    pub sub_workflow_param: Option<SubWorkflowParam>,
    // Embedded task definition (retry/timeout/determinism metadata)
    #[serde(default)]
    pub task_definition: Option<TaskDefinition>,
    /// Anything the schema above does not name, kept for `Opaque` nodes.
    #[serde(flatten)]
    pub extra: JsonMap,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubWorkflowParam {
    pub name: String,
    #[serde(default)]
    pub version: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDefinition {
    #[serde(default)]
    pub retry_count: Option<u32>,
    #[serde(default)]
    pub retry_delay_seconds: Option<u64>,
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
    /// Declared hint that the task is a pure computation with no
    /// non-deterministic dependencies.
    #[serde(default)]
    pub deterministic: Option<bool>,
}

// =============================================================================
// TYPED TREE
// =============================================================================

/// The validated root entity. Immutable once the loader returns it; every
/// later stage builds derived structures and never mutates this.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowGraph {
    pub name: String,
    pub version: u32,
    pub description: Option<String>,
    pub input_parameters: Vec<String>,
    pub variables: JsonMap,
    pub output_parameters: JsonMap,
    pub tasks: Vec<TaskNode>,
}

/// Common fields every task variant carries.
#[derive(Debug, Clone, Serialize)]
pub struct TaskBase<S> {
    pub name: String,
    pub reference_name: String,
    pub input_parameters: JsonMap,
    pub definition: Option<TaskDefinition>,
    pub spec: S,
}

#[derive(Debug, Clone, Serialize)]
pub enum TaskNode {
    Simple(TaskBase<SimpleSpec>),
    Http(TaskBase<HttpSpec>),
    Switch(TaskBase<SwitchSpec>),
    ForkJoin(TaskBase<ForkJoinSpec>),
    DynamicFork(TaskBase<DynamicForkSpec>),
    DoWhile(TaskBase<DoWhileSpec>),
    Human(TaskBase<SuspendSpec>),
    Wait(TaskBase<SuspendSpec>),
    SubWorkflow(TaskBase<SubWorkflowSpec>),
    Opaque(TaskBase<OpaqueSpec>),
}

#[derive(Debug, Clone, Serialize)]
pub struct SimpleSpec;

/// Marker for HTTP tasks. The `inputParameters.http_request` envelope is
/// validated at build time and flows through reference resolution like any
/// other input value.
#[derive(Debug, Clone, Serialize)]
pub struct HttpSpec;

#[derive(Debug, Clone, Serialize)]
pub struct SwitchSpec {
    pub evaluator_type: String,
    pub expression: String,
    /// Declared order preserved.
    pub cases: Vec<(String, Vec<TaskNode>)>,
    pub default_case: Option<Vec<TaskNode>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForkJoinSpec {
    pub branches: Vec<Vec<TaskNode>>,
    /// Reference name of the folded-in JOIN task.
    pub join_reference_name: Option<String>,
    /// None = join on all branches.
    pub join_on: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DynamicForkSpec {
    pub tasks_param: String,
    pub tasks_input_param_name: Option<String>,
    pub join_reference_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DoWhileSpec {
    pub condition: String,
    pub body: Vec<TaskNode>,
}

/// HUMAN and WAIT tasks both suspend awaiting external input; they differ
/// only in how the timeout is declared.
#[derive(Debug, Clone, Serialize)]
pub struct SuspendSpec {
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubWorkflowSpec {
    pub workflow_name: String,
    pub workflow_version: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OpaqueSpec {
    pub task_type: String,
    pub raw: JsonMap,
}

impl TaskNode {
    pub fn reference_name(&self) -> &str {
        match self {
            TaskNode::Simple(t) => &t.reference_name,
            TaskNode::Http(t) => &t.reference_name,
            TaskNode::Switch(t) => &t.reference_name,
            TaskNode::ForkJoin(t) => &t.reference_name,
            TaskNode::DynamicFork(t) => &t.reference_name,
            TaskNode::DoWhile(t) => &t.reference_name,
            TaskNode::Human(t) => &t.reference_name,
            TaskNode::Wait(t) => &t.reference_name,
            TaskNode::SubWorkflow(t) => &t.reference_name,
            TaskNode::Opaque(t) => &t.reference_name,
        }
    }

    pub fn task_type(&self) -> &str {
        match self {
            TaskNode::Simple(_) => "SIMPLE",
            TaskNode::Http(_) => "HTTP",
            TaskNode::Switch(_) => "SWITCH",
            TaskNode::ForkJoin(_) => "FORK_JOIN",
            TaskNode::DynamicFork(_) => "FORK_JOIN_DYNAMIC",
            TaskNode::DoWhile(_) => "DO_WHILE",
            TaskNode::Human(_) => "HUMAN",
            TaskNode::Wait(_) => "WAIT",
            TaskNode::SubWorkflow(_) => "SUB_WORKFLOW",
            TaskNode::Opaque(t) => &t.spec.task_type,
        }
    }

    pub fn input_parameters(&self) -> &JsonMap {
        match self {
            TaskNode::Simple(t) => &t.input_parameters,
            TaskNode::Http(t) => &t.input_parameters,
            TaskNode::Switch(t) => &t.input_parameters,
            TaskNode::ForkJoin(t) => &t.input_parameters,
            TaskNode::DynamicFork(t) => &t.input_parameters,
            TaskNode::DoWhile(t) => &t.input_parameters,
            TaskNode::Human(t) => &t.input_parameters,
            TaskNode::Wait(t) => &t.input_parameters,
            TaskNode::SubWorkflow(t) => &t.input_parameters,
            TaskNode::Opaque(t) => &t.input_parameters,
        }
    }

    /// Child task lists in declared order, paired with a label for JSON paths.
    pub fn child_lists(&self) -> Vec<(String, &Vec<TaskNode>)> {
        match self {
            TaskNode::Switch(t) => {
                let mut lists: Vec<(String, &Vec<TaskNode>)> = t
                    .spec
                    .cases
                    .iter()
                    .map(|(label, body)| (format!("decisionCases.{}", label), body))
                    .collect();
                if let Some(default) = &t.spec.default_case {
                    lists.push(("defaultCase".to_string(), default));
                }
                lists
            }
            TaskNode::ForkJoin(t) => t
                .spec
                .branches
                .iter()
                .enumerate()
                .map(|(i, branch)| (format!("forkTasks[{}]", i), branch))
                .collect(),
            TaskNode::DoWhile(t) => vec![("loopOver".to_string(), &t.spec.body)],
            _ => vec![],
        }
    }

    pub fn is_suspend(&self) -> bool {
        matches!(self, TaskNode::Human(_) | TaskNode::Wait(_))
    }
}
