//! The canonical intermediate representation.
//!
//! After lowering, the workflow is a tree of six operation kinds and nothing
//! else. The emitter never sees Conductor task types; everything it needs is
//! carried here.

use serde::Serialize;

use crate::parse::JsonMap;
use crate::resolve::{DataRef, ResolvedValue};

#[derive(Debug, Clone, Serialize)]
pub struct TranslationIr {
    pub metadata: WorkflowMetadata,
    pub input_parameters: Vec<String>,
    pub variables: JsonMap,
    /// Workflow output mapping, resolved. Empty means "return all state".
    pub output_parameters: Vec<(String, ResolvedValue)>,
    pub program: Vec<CanonicalOp>,
    pub warnings: Vec<TranslateWarning>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkflowMetadata {
    pub name: String,
    pub version: u32,
    pub description: Option<String>,
}

/// A non-fatal translation note surfaced to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct TranslateWarning {
    pub code: &'static str,
    pub message: String,
    pub op_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum CanonicalOp {
    Step(StepOp),
    Branch(BranchOp),
    Parallel(ParallelOp),
    Loop(LoopOp),
    Suspend(SuspendOp),
    Invoke(InvokeOp),
}

impl CanonicalOp {
    pub fn id(&self) -> &str {
        match self {
            CanonicalOp::Step(op) => &op.id,
            CanonicalOp::Branch(op) => &op.id,
            CanonicalOp::Parallel(op) => &op.id,
            CanonicalOp::Loop(op) => &op.id,
            CanonicalOp::Suspend(op) => &op.id,
            CanonicalOp::Invoke(op) => &op.id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepTaskType {
    Simple,
    Http,
}

/// A single unit of work, realized as an activity invocation (or an inline
/// state assignment when the classifier proves it pure).
#[derive(Debug, Clone, Serialize)]
pub struct StepOp {
    pub id: String,
    /// Activity name; the Conductor task name.
    pub activity: String,
    pub inputs: Vec<(String, ResolvedValue)>,
    pub timeout_seconds: Option<u64>,
    pub retry_attempts: Option<u32>,
    pub task_type: StepTaskType,
    /// Declared determinism hint from the embedded task definition.
    pub deterministic_hint: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct BranchOp {
    pub id: String,
    pub selector: ResolvedValue,
    pub cases: Vec<BranchCase>,
    pub default: Option<Vec<CanonicalOp>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BranchCase {
    pub label: String,
    pub body: Vec<CanonicalOp>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParallelOp {
    pub id: String,
    pub branches: ParallelBranches,
    pub join: JoinPolicy,
    /// Reference name of the folded-in JOIN; its state slot receives the
    /// awaited branch results.
    pub join_ref: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParallelBranches {
    Static { branches: Vec<ParallelBranch> },
    /// Branch list known only at runtime; each item names an activity.
    Dynamic {
        items: ResolvedValue,
        /// Resolved per-item input map, keyed by item reference name.
        inputs: Option<ResolvedValue>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct ParallelBranch {
    /// Reference name of the branch's terminal task; joinOn targets this.
    pub name: String,
    pub body: Vec<CanonicalOp>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JoinPolicy {
    /// Await every branch.
    All,
    /// Await only the named branches; the rest keep running unawaited.
    On { branches: Vec<String> },
}

#[derive(Debug, Clone, Serialize)]
pub struct LoopOp {
    pub id: String,
    /// Raw Conductor condition text, re-expressed by the emitter.
    pub condition: String,
    pub condition_reads: Vec<DataRef>,
    pub body: Vec<CanonicalOp>,
}

/// Pause until an external interaction arrives (or the timeout fires).
#[derive(Debug, Clone, Serialize)]
pub struct SuspendOp {
    pub id: String,
    pub signal_name: String,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InvokeOp {
    pub id: String,
    pub workflow_name: String,
    pub workflow_version: Option<u32>,
    pub inputs: Vec<(String, ResolvedValue)>,
}

/// Walk every op in the program, depth first, nested bodies included.
pub fn walk_ops<'a>(ops: &'a [CanonicalOp], visit: &mut impl FnMut(&'a CanonicalOp)) {
    for op in ops {
        visit(op);
        match op {
            CanonicalOp::Branch(b) => {
                for case in &b.cases {
                    walk_ops(&case.body, visit);
                }
                if let Some(default) = &b.default {
                    walk_ops(default, visit);
                }
            }
            CanonicalOp::Parallel(p) => {
                if let ParallelBranches::Static { branches } = &p.branches {
                    for branch in branches {
                        walk_ops(&branch.body, visit);
                    }
                }
            }
            CanonicalOp::Loop(l) => walk_ops(&l.body, visit),
            _ => {}
        }
    }
}
