//! Emission of the generated `workflow.py`.
//!
//! One canonical operation maps to one block of workflow code. Everything
//! the workflow computes lands in `self._state` keyed by operation id, so a
//! downstream data reference is always a state read regardless of which
//! construct produced the value.

use crate::classify::{Classification, InteractionMode, StepKind};
use crate::codegen::value_expr::{condition_expr, py_literal, py_str, value_expr};
use crate::codegen::writer::PyWriter;
use crate::codegen::{pascal_case, py_ident};
use crate::config::EmitterConfig;
use crate::error::{ErrorKind, TranslateError};
use crate::ir::{
    BranchOp, CanonicalOp, InvokeOp, JoinPolicy, LoopOp, ParallelBranches, ParallelOp, StepOp,
    SuspendOp, TranslationIr,
};
use crate::resolve::ResolvedValue;

pub fn emit_workflow(
    ir: &TranslationIr,
    classification: &Classification,
    config: &EmitterConfig,
) -> Result<String, Vec<TranslateError>> {
    let mut emitter = WorkflowEmitter {
        ir,
        classification,
        config,
        w: PyWriter::new(),
        errors: Vec::new(),
        loop_stack: Vec::new(),
    };
    emitter.emit_module();
    if emitter.errors.is_empty() {
        Ok(emitter.w.into_string())
    } else {
        Err(emitter.errors)
    }
}

struct WorkflowEmitter<'a> {
    ir: &'a TranslationIr,
    classification: &'a Classification,
    config: &'a EmitterConfig,
    w: PyWriter,
    errors: Vec<TranslateError>,
    /// Loops enclosing the op being emitted, as `(op id, counter variable)`.
    /// Ops inside a loop body run once per iteration and must not carry the
    /// completed-slot replay guard.
    loop_stack: Vec<(String, String)>,
}

impl WorkflowEmitter<'_> {
    fn emit_module(&mut self) {
        self.emit_header();
        self.emit_pluck_helper();
        self.emit_class();
    }

    fn emit_header(&mut self) {
        let meta = &self.ir.metadata;
        self.w.line(&format!(
            "\"\"\"Temporal workflow generated from '{}' (version {}).",
            meta.name, meta.version
        ));
        if let Some(description) = &meta.description {
            self.w.blank();
            self.w.line(description);
        }
        self.w.line("\"\"\"");
        self.w.blank();
        self.w.line("from __future__ import annotations");
        self.w.blank();
        self.w.line("import asyncio");
        self.w.line("from datetime import timedelta");
        self.w.line("from typing import Any, Dict, List");
        self.w.blank();
        self.w.line("from temporalio import workflow");
        self.w.line("from temporalio.common import RetryPolicy");
        if self.has_updates() {
            self.w.line("from temporalio.exceptions import ApplicationError");
        }
        self.w.blank();
        self.w.blank();
    }

    fn has_updates(&self) -> bool {
        self.classification
            .modes
            .values()
            .any(|m| *m == InteractionMode::RequestResponse)
    }

    fn emit_pluck_helper(&mut self) {
        // Segments are names with optional [N] indexing; anything the helper
        // cannot resolve raises rather than degrading to None.
        self.w.block("def _pluck(value: Any, path: str) -> Any");
        self.w.block("for segment in path.split('.')");
        self.w.line("name, _, indexes = segment.partition('[')");
        self.w.block("if name");
        self.w
            .line("value = value[name] if isinstance(value, dict) else getattr(value, name)");
        self.w.end_block();
        self.w.block("if indexes");
        self.w.block("for index in indexes.rstrip(']').split('][')");
        self.w.line("value = value[int(index)]");
        self.w.end_block();
        self.w.end_block();
        self.w.end_block();
        self.w.line("return value");
        self.w.end_block();
        self.w.blank();
        self.w.blank();
    }

    fn emit_class(&mut self) {
        let meta = &self.ir.metadata;
        self.w
            .line(&format!("@workflow.defn(name={})", py_str(&meta.name)));
        self.w.block(&format!("class {}", pascal_case(&meta.name)));
        self.emit_init();
        self.w.blank();
        self.emit_run();
        self.emit_handlers();
        self.w.blank();
        self.emit_status_query();
        self.w.end_block();
    }

    fn emit_init(&mut self) {
        self.w.block("def __init__(self) -> None");
        self.w.line("self._args: Dict[str, Any] = {}");
        self.w.line("self._state: Dict[str, Any] = {}");
        self.w.line("self._inbox: Dict[str, Any] = {}");
        self.w.line(&format!(
            "self._variables: Dict[str, Any] = {}",
            py_literal(&serde_json::Value::Object(self.ir.variables.clone()))
        ));
        self.w.line("self._background: List[asyncio.Task] = []");
        self.w.end_block();
    }

    fn emit_run(&mut self) {
        self.w.line("@workflow.run");
        self.w
            .block("async def run(self, args: Dict[str, Any]) -> Dict[str, Any]");
        self.w.line("self._args = args or {}");
        // A run continued from a loop checkpoint carries its progress under
        // the reserved _resume key: completed state slots and loop counters.
        self.w.line("_resume = self._args.pop('_resume', None) or {}");
        self.w.line("self._state = dict(_resume.get('state') or {})");
        self.w.line(&format!(
            "workflow.logger.info('Workflow %s started', {})",
            py_str(&self.ir.metadata.name)
        ));
        self.w.block("try");
        let program = self.ir.program.clone();
        self.emit_ops(&program);
        self.w.end_block();
        self.w.block("finally");
        self.w.block("for _task in self._background");
        self.w.line("_task.cancel()");
        self.w.end_block();
        self.w.end_block();
        self.emit_return();
        self.w.end_block();
    }

    fn emit_return(&mut self) {
        if self.ir.output_parameters.is_empty() {
            self.w.line("return dict(self._state)");
            return;
        }
        self.w.line("return {");
        self.w.indent();
        for (key, value) in &self.ir.output_parameters {
            self.w
                .line(&format!("{}: {},", py_str(key), value_expr(value)));
        }
        self.w.dedent();
        self.w.line("}");
    }

    fn emit_ops(&mut self, ops: &[CanonicalOp]) {
        if ops.is_empty() {
            self.w.line("pass");
            return;
        }
        for op in ops {
            match op {
                CanonicalOp::Step(s) => self.emit_step(s),
                CanonicalOp::Branch(b) => self.emit_branch(b),
                CanonicalOp::Parallel(p) => self.emit_parallel(p),
                CanonicalOp::Loop(l) => self.emit_loop(l),
                CanonicalOp::Suspend(s) => self.emit_suspend(s),
                CanonicalOp::Invoke(i) => self.emit_invoke(i),
            }
        }
    }

    fn emit_step(&mut self, step: &StepOp) {
        if self.classification.kind_of(&step.id) == StepKind::PureCompute {
            self.w.line(&format!(
                "self._state[{}] = {}",
                py_str(&step.id),
                inputs_expr(&step.inputs)
            ));
            return;
        }

        let timeout = step
            .timeout_seconds
            .unwrap_or(self.config.default_activity_timeout_secs);
        let attempts = step
            .retry_attempts
            .unwrap_or(self.config.default_retry_attempts);

        let guarded = self.begin_replay_guard(&step.id);
        self.w.line(&format!(
            "self._state[{}] = await workflow.execute_activity(",
            py_str(&step.id)
        ));
        self.w.indent();
        self.w.line(&format!("{},", py_str(&step.activity)));
        self.w.line(&format!("{},", inputs_expr(&step.inputs)));
        self.w.line(&format!(
            "schedule_to_close_timeout=timedelta(seconds={}),",
            timeout
        ));
        self.w.line(&format!(
            "retry_policy=RetryPolicy(maximum_attempts={}),",
            attempts
        ));
        self.w.dedent();
        self.w.line(")");
        self.end_replay_guard(guarded);
    }

    /// Open an `if <slot> not in self._state` block around a side-effecting
    /// op, so a run continued from a loop checkpoint does not redo work whose
    /// result was carried over. Ops inside a loop body run every iteration
    /// and are never guarded.
    fn begin_replay_guard(&mut self, slot: &str) -> bool {
        if !self.loop_stack.is_empty() {
            return false;
        }
        self.w
            .block(&format!("if {} not in self._state", py_str(slot)));
        true
    }

    fn end_replay_guard(&mut self, guarded: bool) {
        if guarded {
            self.w.end_block();
        }
    }

    fn emit_branch(&mut self, branch: &BranchOp) {
        let var = format!("_case_{}", py_ident(&branch.id));
        self.w
            .line(&format!("{} = {}", var, value_expr(&branch.selector)));
        for (i, case) in branch.cases.iter().enumerate() {
            let keyword = if i == 0 { "if" } else { "elif" };
            self.w
                .block(&format!("{} {} == {}", keyword, var, py_str(&case.label)));
            let body = case.body.clone();
            self.emit_ops(&body);
            self.w.end_block();
        }
        if let Some(default) = &branch.default {
            self.w.block("else");
            let body = default.clone();
            self.emit_ops(&body);
            self.w.end_block();
        }
    }

    fn emit_parallel(&mut self, parallel: &ParallelOp) {
        match &parallel.branches {
            ParallelBranches::Static { branches } => self.emit_static_parallel(parallel, branches),
            ParallelBranches::Dynamic { items, inputs } => {
                self.emit_dynamic_parallel(parallel, items, inputs.as_ref())
            }
        }
    }

    fn emit_static_parallel(&mut self, parallel: &ParallelOp, branches: &[crate::ir::ParallelBranch]) {
        for branch in branches {
            self.w
                .block(&format!("async def _branch_{}() -> None", py_ident(&branch.name)));
            let body = branch.body.clone();
            self.emit_ops(&body);
            self.w.end_block();
        }

        let tasks_var = format!("_tasks_{}", py_ident(&parallel.id));
        self.w.line(&format!("{} = {{", tasks_var));
        self.w.indent();
        for branch in branches {
            self.w.line(&format!(
                "{}: asyncio.create_task(_branch_{}()),",
                py_str(&branch.name),
                py_ident(&branch.name)
            ));
        }
        self.w.dedent();
        self.w.line("}");
        // Registered at creation: if an awaited branch raises, the un-awaited
        // siblings are already reachable from run()'s cancelling epilogue.
        self.w
            .line(&format!("self._background.extend({}.values())", tasks_var));

        let awaited: Vec<&str> = match &parallel.join {
            JoinPolicy::All => branches.iter().map(|b| b.name.as_str()).collect(),
            JoinPolicy::On { branches } => branches.iter().map(String::as_str).collect(),
        };

        match &parallel.join {
            JoinPolicy::All => {
                self.w
                    .line(&format!("await asyncio.gather(*{}.values())", tasks_var));
            }
            JoinPolicy::On { .. } => {
                self.w.line(&format!(
                    "await asyncio.gather(*({}[name] for name in {}))",
                    tasks_var,
                    py_str_tuple(&awaited)
                ));
            }
        }

        if let Some(join_ref) = &parallel.join_ref {
            self.w.line(&format!(
                "self._state[{}] = {{name: self._state.get(name) for name in {}}}",
                py_str(join_ref),
                py_str_tuple(&awaited)
            ));
        }
    }

    fn emit_dynamic_parallel(
        &mut self,
        parallel: &ParallelOp,
        items: &ResolvedValue,
        inputs: Option<&ResolvedValue>,
    ) {
        let id = py_ident(&parallel.id);
        let items_var = format!("_items_{}", id);
        let results_var = format!("_results_{}", id);

        let guarded = match &parallel.join_ref {
            Some(join_ref) => self.begin_replay_guard(join_ref),
            None => false,
        };
        self.w
            .line(&format!("{} = {} or []", items_var, value_expr(items)));
        let item_arg = match inputs {
            Some(inputs) => {
                let inputs_var = format!("_inputs_{}", id);
                self.w
                    .line(&format!("{} = {} or {{}}", inputs_var, value_expr(inputs)));
                format!("{}.get(_item['taskReferenceName'])", inputs_var)
            }
            None => "_item.get('input')".to_string(),
        };

        self.w.line(&format!("{} = await asyncio.gather(*(", results_var));
        self.w.indent();
        self.w.line("workflow.execute_activity(");
        self.w.indent();
        self.w.line("_item['name'],");
        self.w.line(&format!("{},", item_arg));
        self.w.line(&format!(
            "schedule_to_close_timeout=timedelta(seconds={}),",
            self.config.default_activity_timeout_secs
        ));
        self.w.line(&format!(
            "retry_policy=RetryPolicy(maximum_attempts={}),",
            self.config.default_retry_attempts
        ));
        self.w.dedent();
        self.w.line(")");
        self.w.line(&format!("for _item in {}", items_var));
        self.w.dedent();
        self.w.line("))");

        let by_ref_var = format!("_by_ref_{}", id);
        self.w.line(&format!("{} = {{}}", by_ref_var));
        self.w.block(&format!(
            "for _item, _result in zip({}, {})",
            items_var, results_var
        ));
        self.w
            .line(&format!("{}[_item['taskReferenceName']] = _result", by_ref_var));
        self.w
            .line("self._state[_item['taskReferenceName']] = _result");
        self.w.end_block();
        if let Some(join_ref) = &parallel.join_ref {
            self.w
                .line(&format!("self._state[{}] = {}", py_str(join_ref), by_ref_var));
        }
        self.end_replay_guard(guarded);
    }

    fn emit_loop(&mut self, l: &LoopOp) {
        let counter = format!("_iteration_{}", py_ident(&l.id));
        let condition = match condition_expr(&l.condition, &counter) {
            Ok(condition) => condition,
            Err(message) => {
                self.errors.push(TranslateError::codegen(
                    ErrorKind::MalformedInput,
                    format!("Cannot express loop condition: {}", message),
                    Some(l.id.clone()),
                ));
                return;
            }
        };

        // A continued run resumes the counter where the checkpoint left it;
        // pop so a later fresh pass over this loop starts from zero again.
        self.w.line(&format!(
            "{} = _resume.get('counters', {{}}).pop({}, 0)",
            counter,
            py_str(&l.id)
        ));
        self.loop_stack.push((l.id.clone(), counter.clone()));
        self.w.block("while True");
        self.w.line(&format!("{} += 1", counter));
        // Body tasks may read the counter through the loop's own state slot.
        self.w.line(&format!(
            "self._state[{}] = {{'iteration': {}}}",
            py_str(&l.id),
            counter
        ));
        let body = l.body.clone();
        self.emit_ops(&body);
        self.w.block(&format!("if not ({})", condition));
        self.w.line("break");
        self.w.end_block();
        // Bound the event history on long-running loops. Progress rides along
        // under _resume so the continued run picks up instead of starting over.
        self.w.block(&format!(
            "if {} % {} == 0",
            counter, self.config.loop_checkpoint_threshold
        ));
        let counters: Vec<String> = self
            .loop_stack
            .iter()
            .map(|(id, var)| format!("{}: {}", py_str(id), var))
            .collect();
        self.w.line(&format!(
            "workflow.continue_as_new({{**self._args, '_resume': {{'state': dict(self._state), 'counters': {{{}}}}}}})",
            counters.join(", ")
        ));
        self.w.end_block();
        self.w.end_block();
        self.loop_stack.pop();
    }

    fn emit_suspend(&mut self, s: &SuspendOp) {
        let slot = py_str(&s.signal_name);
        let guarded = self.begin_replay_guard(&s.id);
        self.w.line(&format!(
            "workflow.logger.info('Awaiting external input %r', {})",
            slot
        ));
        match s.timeout_seconds {
            Some(timeout) => {
                self.w.block("try");
                self.w.line("await workflow.wait_condition(");
                self.w.indent();
                self.w.line(&format!("lambda: {} in self._inbox,", slot));
                self.w
                    .line(&format!("timeout=timedelta(seconds={}),", timeout));
                self.w.dedent();
                self.w.line(")");
                self.w.end_block();
                self.w.block("except asyncio.TimeoutError");
                // The time-out verdict stands even if input lands later.
                self.w
                    .line(&format!("self._inbox[{}] = {{'status': 'TIMED_OUT'}}", slot));
                self.w.end_block();
            }
            None => {
                self.w.line(&format!(
                    "await workflow.wait_condition(lambda: {} in self._inbox)",
                    slot
                ));
            }
        }
        self.w
            .line(&format!("self._state[{}] = self._inbox[{}]", py_str(&s.id), slot));
        self.end_replay_guard(guarded);
    }

    fn emit_invoke(&mut self, invoke: &InvokeOp) {
        let guarded = self.begin_replay_guard(&invoke.id);
        self.w.line(&format!(
            "self._state[{}] = await workflow.execute_child_workflow(",
            py_str(&invoke.id)
        ));
        self.w.indent();
        self.w.line(&format!("{},", py_str(&invoke.workflow_name)));
        self.w.line(&format!("{},", inputs_expr(&invoke.inputs)));
        self.w.dedent();
        self.w.line(")");
        self.end_replay_guard(guarded);
    }

    fn emit_handlers(&mut self) {
        let modes: Vec<(String, InteractionMode)> = self
            .classification
            .modes
            .iter()
            .map(|(id, mode)| (id.clone(), *mode))
            .collect();
        for (name, mode) in modes {
            self.w.blank();
            let slot = py_str(&name);
            match mode {
                InteractionMode::FireAndForget => {
                    self.w.line("@workflow.signal");
                    self.w.block(&format!(
                        "def resolve_{}(self, payload: Dict[str, Any]) -> None",
                        py_ident(&name)
                    ));
                    self.w.line(&format!("self._inbox[{}] = payload", slot));
                    self.w.end_block();
                }
                InteractionMode::RequestResponse => {
                    self.w.line("@workflow.update");
                    self.w.block(&format!(
                        "def resolve_{}(self, payload: Dict[str, Any]) -> Dict[str, Any]",
                        py_ident(&name)
                    ));
                    self.w.block(&format!("if {} in self._inbox", slot));
                    self.w.line(&format!(
                        "raise ApplicationError('Input for {} was already provided')",
                        name
                    ));
                    self.w.end_block();
                    self.w.line(&format!("self._inbox[{}] = payload", slot));
                    self.w.line("return {'accepted': True}");
                    self.w.end_block();
                }
            }
        }
    }

    fn emit_status_query(&mut self) {
        let pending: Vec<String> = self.classification.modes.keys().cloned().collect();
        let pending_refs: Vec<&str> = pending.iter().map(String::as_str).collect();
        self.w.line("@workflow.query");
        self.w.block("def status(self) -> Dict[str, Any]");
        self.w.line("return {");
        self.w.indent();
        self.w.line("'completed': sorted(self._state),");
        if pending.is_empty() {
            self.w.line("'pending_inputs': [],");
        } else {
            self.w.line(&format!(
                "'pending_inputs': [name for name in {} if name not in self._inbox],",
                py_str_tuple(&pending_refs)
            ));
        }
        self.w.dedent();
        self.w.line("}");
        self.w.end_block();
    }
}

fn inputs_expr(inputs: &[(String, ResolvedValue)]) -> String {
    if inputs.is_empty() {
        return "{}".to_string();
    }
    let parts: Vec<String> = inputs
        .iter()
        .map(|(key, value)| format!("{}: {}", py_str(key), value_expr(value)))
        .collect();
    format!("{{{}}}", parts.join(", "))
}

fn py_str_tuple(names: &[&str]) -> String {
    let parts: Vec<String> = names.iter().map(|n| py_str(n)).collect();
    if parts.len() == 1 {
        format!("({},)", parts[0])
    } else {
        format!("({})", parts.join(", "))
    }
}
