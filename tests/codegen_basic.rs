use conductor_bridge::{translate, EmitterConfig};

const FORK_JOIN: &str = include_str!("fixtures/fork_join.json");
const DO_WHILE: &str = include_str!("fixtures/do_while.json");
const DYNAMIC_FORK: &str = include_str!("fixtures/dynamic_fork.json");

fn workflow_py(json: &str) -> String {
    let output = translate(json, &EmitterConfig::default()).expect("translation should succeed");
    output
        .files
        .into_iter()
        .find(|f| f.path == "workflow.py")
        .expect("workflow.py generated")
        .contents
}

#[test]
fn static_fork_emits_branch_tasks() {
    let workflow = workflow_py(FORK_JOIN);

    assert!(workflow.contains("async def _branch_credit() -> None:"));
    assert!(workflow.contains("async def _branch_fraud() -> None:"));
    assert!(workflow.contains("async def _branch_audit() -> None:"));
    assert!(workflow.contains("'credit': asyncio.create_task(_branch_credit()),"));
}

#[test]
fn selective_join_awaits_only_named_branches() {
    let workflow = workflow_py(FORK_JOIN);

    assert!(workflow
        .contains("await asyncio.gather(*(_tasks_f1[name] for name in ('credit', 'fraud')))"));
    // The audit branch keeps running; run() cancels leftovers on exit.
    assert!(workflow.contains("self._background.extend(_tasks_f1.values())"));
    assert!(workflow.contains("for _task in self._background:"));
    assert!(workflow.contains("_task.cancel()"));
}

#[test]
fn branch_tasks_are_cancellable_before_the_join_settles() {
    // If an awaited branch raises, the gather never returns; the un-awaited
    // siblings must already be registered for cancellation by then.
    let workflow = workflow_py(FORK_JOIN);
    let registered = workflow
        .find("self._background.extend(_tasks_f1.values())")
        .expect("branch tasks registered");
    let gathered = workflow
        .find("await asyncio.gather(*(_tasks_f1[name]")
        .expect("join gathers the required branches");
    assert!(registered < gathered);
}

#[test]
fn join_slot_holds_awaited_results() {
    let workflow = workflow_py(FORK_JOIN);
    assert!(workflow.contains(
        "self._state['j1'] = {name: self._state.get(name) for name in ('credit', 'fraud')}"
    ));
}

#[test]
fn do_while_counts_iterations() {
    let workflow = workflow_py(DO_WHILE);

    assert!(workflow.contains("_iteration_l1 = _resume.get('counters', {}).pop('l1', 0)"));
    assert!(workflow.contains("while True:"));
    assert!(workflow.contains("_iteration_l1 += 1"));
    assert!(workflow.contains("self._state['l1'] = {'iteration': _iteration_l1}"));
    // Post-condition semantics: the body runs before the check.
    assert!(workflow.contains("if not (_iteration_l1 < 3):"));
    assert!(workflow.contains("break"));
}

#[test]
fn do_while_checkpoints_history() {
    let workflow = workflow_py(DO_WHILE);
    assert!(workflow.contains("if _iteration_l1 % 100 == 0:"));
    assert!(workflow.contains(
        "workflow.continue_as_new({**self._args, '_resume': \
         {'state': dict(self._state), 'counters': {'l1': _iteration_l1}}})"
    ));
}

#[test]
fn loop_checkpoint_carries_progress_forward() {
    // A loop needing more iterations than the threshold must make progress
    // across continue-as-new: the counter and completed state ride along, and
    // the continued run restores both instead of starting from iteration one.
    let workflow = workflow_py(DO_WHILE);

    assert!(workflow.contains("_resume = self._args.pop('_resume', None) or {}"));
    assert!(workflow.contains("self._state = dict(_resume.get('state') or {})"));
    assert!(workflow.contains("_iteration_l1 = _resume.get('counters', {}).pop('l1', 0)"));
    assert!(workflow.contains("'counters': {'l1': _iteration_l1}"));

    // Ops after the loop skip on the continued run once their slot is carried
    // over; ops inside the body run every iteration and stay unguarded.
    assert!(workflow.contains("if 'report' not in self._state:"));
    assert!(!workflow.contains("if 'poll' not in self._state:"));
}

#[test]
fn loop_checkpoint_threshold_is_configurable() {
    let config = EmitterConfig {
        loop_checkpoint_threshold: 25,
        ..EmitterConfig::default()
    };
    let output = translate(DO_WHILE, &config).unwrap();
    let workflow = &output
        .files
        .iter()
        .find(|f| f.path == "workflow.py")
        .unwrap()
        .contents;
    assert!(workflow.contains("if _iteration_l1 % 25 == 0:"));
}

#[test]
fn dynamic_fork_gathers_runtime_items() {
    let workflow = workflow_py(DYNAMIC_FORK);

    assert!(workflow.contains("_items_dyn = self._state['plan']['tasks'] or []"));
    assert!(workflow.contains("_inputs_dyn = self._state['plan']['inputs'] or {}"));
    assert!(workflow.contains("_item['name'],"));
    assert!(workflow.contains("_inputs_dyn.get(_item['taskReferenceName']),"));
    assert!(workflow.contains("for _item in _items_dyn"));
}

#[test]
fn untimed_suspend_waits_indefinitely() {
    let workflow = workflow_py(
        r#"{
        "name": "wf",
        "tasks": [
            {"name": "ack", "taskReferenceName": "ack", "type": "WAIT"},
            {"name": "next", "taskReferenceName": "t1", "type": "SIMPLE"}
        ]
    }"#,
    );

    assert!(workflow.contains("await workflow.wait_condition(lambda: 'ack' in self._inbox)"));
    assert!(!workflow.contains("asyncio.TimeoutError"));
    // Unread input: delivered as a fire-and-forget signal.
    assert!(workflow.contains("@workflow.signal"));
    assert!(workflow.contains("def resolve_ack(self, payload: Dict[str, Any]) -> None:"));
    assert!(workflow.contains("self._state['ack'] = self._inbox['ack']"));
}

#[test]
fn pluck_helper_resolves_list_indices() {
    // References like items[0] route through _pluck; the helper must index
    // lists and raise on segments it cannot resolve, never return None.
    let workflow = workflow_py(
        r#"{
        "name": "wf",
        "tasks": [
            {"name": "scan", "taskReferenceName": "t1", "type": "SIMPLE"},
            {"name": "first", "taskReferenceName": "t2", "type": "SIMPLE",
             "inputParameters": {"head": "${t1.output.items[0]}"}}
        ]
    }"#,
    );

    assert!(workflow.contains("_pluck(self._state['t1'], 'items[0]')"));
    assert!(workflow.contains("name, _, indexes = segment.partition('[')"));
    assert!(workflow.contains("value = value[int(index)]"));
    assert!(workflow.contains("value = value[name] if isinstance(value, dict) else getattr(value, name)"));
    assert!(!workflow.contains("getattr(value, key, None)"));
}

#[test]
fn dynamic_join_slot_keyed_by_reference() {
    let workflow = workflow_py(DYNAMIC_FORK);
    assert!(workflow.contains("_by_ref_dyn[_item['taskReferenceName']] = _result"));
    assert!(workflow.contains("self._state[_item['taskReferenceName']] = _result"));
    assert!(workflow.contains("self._state['dynjoin'] = _by_ref_dyn"));
}
