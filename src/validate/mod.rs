//! Validate phase: structural rules over the typed task tree.
//!
//! Every rule appends to a shared error list so a single pass reports all
//! structural problems at once.

mod structural;

use crate::error::TranslateError;
use crate::parse::WorkflowGraph;

pub fn validate(graph: &WorkflowGraph) -> Result<(), Vec<TranslateError>> {
    let mut errors = Vec::new();

    structural::v001_unique_reference_names(graph, &mut errors);
    structural::v002_nonempty_workflow_name(graph, &mut errors);
    structural::v003_switch_has_arms(graph, &mut errors);
    structural::v004_join_on_targets_exist(graph, &mut errors);
    structural::v005_dynamic_fork_has_join(graph, &mut errors);
    structural::v006_suspend_has_name(graph, &mut errors);

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
