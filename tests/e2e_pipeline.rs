use conductor_bridge::{translate, EmitterConfig, StepKind, TranslationOutput};

const TWO_STEP: &str = include_str!("fixtures/two_step.json");
const HUMAN_APPROVAL: &str = include_str!("fixtures/human_approval.json");

fn run(json: &str) -> TranslationOutput {
    translate(json, &EmitterConfig::default()).expect("translation should succeed")
}

fn file<'a>(output: &'a TranslationOutput, path: &str) -> &'a str {
    &output
        .files
        .iter()
        .find(|f| f.path == path)
        .unwrap_or_else(|| panic!("missing generated file {}", path))
        .contents
}

#[test]
fn generates_the_full_project() {
    let output = run(TWO_STEP);
    let paths: Vec<&str> = output.files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(
        paths,
        vec![
            "workflow.py",
            "activities.py",
            "worker.py",
            "starter.py",
            "contract.json"
        ]
    );
}

#[test]
fn two_step_workflow_shape() {
    let output = run(TWO_STEP);
    let workflow = file(&output, "workflow.py");

    assert!(workflow.contains("@workflow.defn(name='order_total')"));
    assert!(workflow.contains("class OrderTotal:"));
    assert!(workflow.contains("self._state['t1'] = await workflow.execute_activity("));
    assert!(workflow.contains("'fetch_order',"));
    // Declared deterministic: computed inline, not dispatched as an activity.
    assert!(workflow.contains("self._state['t2'] = {'x': self._state['t1']['y']}"));
    assert!(!workflow.contains("'compute_total',"));
    assert!(workflow.contains("'total': self._state['t2']['total'],"));

    assert_eq!(output.classification.kind_of("t1"), StepKind::ExternalIo);
    assert_eq!(output.classification.kind_of("t2"), StepKind::PureCompute);
}

#[test]
fn pure_steps_get_no_activity_stub() {
    let output = run(TWO_STEP);
    let activities = file(&output, "activities.py");
    assert!(activities.contains("@activity.defn(name='fetch_order')"));
    assert!(!activities.contains("compute_total"));
}

#[test]
fn worker_registers_workflow_and_activities() {
    let output = run(TWO_STEP);
    let worker = file(&output, "worker.py");
    assert!(worker.contains("from workflow import OrderTotal"));
    assert!(worker.contains("from activities import fetch_order"));
    assert!(worker.contains("task_queue='order-total',"));
    assert!(worker.contains("workflows=[OrderTotal],"));
    assert!(worker.contains("activities=[fetch_order],"));
}

#[test]
fn approval_workflow_end_to_end() {
    let output = run(HUMAN_APPROVAL);
    let workflow = file(&output, "workflow.py");

    // The suspend gates a switch, so its input is request-response.
    assert!(workflow.contains("@workflow.update"));
    assert!(workflow.contains("def resolve_approve(self, payload: Dict[str, Any]) -> Dict[str, Any]:"));
    assert!(workflow.contains("raise ApplicationError('Input for approve was already provided')"));
    assert!(!workflow.contains("@workflow.signal"));

    // Timeout wins over late input.
    assert!(workflow.contains("timeout=timedelta(seconds=86400),"));
    assert!(workflow.contains("except asyncio.TimeoutError:"));
    assert!(workflow.contains("self._inbox['approve'] = {'status': 'TIMED_OUT'}"));

    // Switch over the approval decision.
    assert!(workflow.contains("_case_route = self._state['approve']['decision']"));
    assert!(workflow.contains("if _case_route == 'APPROVED':"));
    assert!(workflow.contains("elif _case_route == 'REJECTED':"));
    assert!(workflow.contains("else:"));

    // HTTP task runs as an activity fed from the request envelope.
    assert!(workflow.contains("self._state['reimburse'] = await workflow.execute_activity("));
    assert!(workflow.contains("'method': 'POST'"));

    // Sub-workflow becomes a child workflow call.
    assert!(workflow.contains("self._state['archive'] = await workflow.execute_child_workflow("));
    assert!(workflow.contains("'archive_report',"));

    // Status query advertises the pending interaction.
    assert!(workflow
        .contains("'pending_inputs': [name for name in ('approve',) if name not in self._inbox],"));
}

#[test]
fn starter_launches_and_drives_the_workflow() {
    let output = run(HUMAN_APPROVAL);
    let starter = file(&output, "starter.py");

    assert!(starter.contains("from workflow import ExpenseApproval"));
    assert!(starter.contains("client = await Client.connect('localhost:7233')"));
    assert!(starter.contains("handle = await client.start_workflow("));
    assert!(starter.contains("ExpenseApproval.run,"));
    assert!(starter.contains("{'report_id': None, 'amount': None},"));
    assert!(starter.contains("id=f'expense-approval-{uuid4()}',"));
    assert!(starter.contains("task_queue='expense-approval',"));

    // Pending interactions surface as commented delivery calls.
    assert!(starter.contains("# await handle.execute_update(ExpenseApproval.resolve_approve, {})"));
    assert!(starter.contains("status = await handle.query(ExpenseApproval.status)"));
    assert!(starter.contains("result = await handle.result()"));
}

#[test]
fn approval_contract() {
    let output = run(HUMAN_APPROVAL);
    insta::assert_json_snapshot!(output.classification.contract(), @r###"
    {
      "signals": [],
      "updates": [
        "approve"
      ],
      "queries": [
        "status"
      ]
    }
    "###);
}

#[test]
fn translation_is_deterministic() {
    let first = run(HUMAN_APPROVAL);
    let second = run(HUMAN_APPROVAL);

    let first_ir = serde_json::to_string(&first.ir).unwrap();
    let second_ir = serde_json::to_string(&second.ir).unwrap();
    assert_eq!(first_ir, second_ir);

    for (a, b) in first.files.iter().zip(second.files.iter()) {
        assert_eq!(a.path, b.path);
        assert_eq!(a.contents, b.contents, "file {} differs between runs", a.path);
    }
}
