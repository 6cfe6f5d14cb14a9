use conductor_bridge::{translate, EmitterConfig, ErrorKind, Phase, TranslateError};

fn fail(json: &str) -> Vec<TranslateError> {
    translate(json, &EmitterConfig::default()).expect_err("translation should fail")
}

#[test]
fn malformed_json() {
    let errors = fail("{ not json");
    assert_eq!(errors[0].kind, ErrorKind::MalformedInput);
    assert_eq!(errors[0].phase, Phase::Parse);
}

#[test]
fn missing_required_field_is_schema_error() {
    // Task without a taskReferenceName.
    let errors = fail(r#"{"name": "wf", "tasks": [{"name": "a", "type": "SIMPLE"}]}"#);
    assert_eq!(errors[0].kind, ErrorKind::Schema);
}

#[test]
fn duplicate_reference_names() {
    let errors = fail(
        r#"{
        "name": "wf",
        "tasks": [
            {"name": "a", "taskReferenceName": "t1", "type": "SIMPLE"},
            {"name": "b", "taskReferenceName": "t1", "type": "SIMPLE"}
        ]
    }"#,
    );
    assert_eq!(errors[0].kind, ErrorKind::DuplicateReference);
}

#[test]
fn forward_reference() {
    let errors = fail(
        r#"{
        "name": "wf",
        "tasks": [
            {"name": "a", "taskReferenceName": "t1", "type": "SIMPLE",
             "inputParameters": {"x": "${t2.output.y}"}},
            {"name": "b", "taskReferenceName": "t2", "type": "SIMPLE"}
        ]
    }"#,
    );
    assert_eq!(errors[0].kind, ErrorKind::ForwardReference);
    assert_eq!(errors[0].phase, Phase::Resolve);
}

#[test]
fn unresolved_reference() {
    let errors = fail(
        r#"{
        "name": "wf",
        "tasks": [
            {"name": "a", "taskReferenceName": "t1", "type": "SIMPLE",
             "inputParameters": {"x": "${nobody.output.y}"}}
        ]
    }"#,
    );
    assert_eq!(errors[0].kind, ErrorKind::UnresolvedReference);
}

#[test]
fn self_reference_is_cyclic() {
    let errors = fail(
        r#"{
        "name": "wf",
        "tasks": [
            {"name": "a", "taskReferenceName": "t1", "type": "SIMPLE",
             "inputParameters": {"x": "${t1.output.y}"}}
        ]
    }"#,
    );
    assert_eq!(errors[0].kind, ErrorKind::CyclicDependency);
}

#[test]
fn unsupported_task_type() {
    let errors = fail(
        r#"{
        "name": "wf",
        "tasks": [
            {"name": "jq", "taskReferenceName": "jq1", "type": "JSON_JQ_TRANSFORM"}
        ]
    }"#,
    );
    assert_eq!(errors[0].kind, ErrorKind::UnsupportedConstruct);
    assert_eq!(errors[0].phase, Phase::Lower);
}

#[test]
fn ambiguous_interaction_mode() {
    let errors = fail(
        r#"{
        "name": "wf",
        "tasks": [
            {"name": "form", "taskReferenceName": "form", "type": "HUMAN"},
            {"name": "store", "taskReferenceName": "t1", "type": "SIMPLE",
             "inputParameters": {"payload": "${form.output.fields}"}}
        ]
    }"#,
    );
    assert_eq!(errors[0].kind, ErrorKind::AmbiguousInteractionMode);
    assert_eq!(errors[0].phase, Phase::Classify);
}

#[test]
fn all_errors_reported_in_one_pass() {
    // Two independent resolution failures arrive together.
    let errors = fail(
        r#"{
        "name": "wf",
        "tasks": [
            {"name": "a", "taskReferenceName": "t1", "type": "SIMPLE",
             "inputParameters": {"x": "${ghost.output.y}", "z": "${phantom.output.q}"}}
        ]
    }"#,
    );
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().all(|e| e.kind == ErrorKind::UnresolvedReference));
}

#[test]
fn error_display_names_the_taxonomy_entry() {
    let errors = fail(
        r#"{
        "name": "wf",
        "tasks": [
            {"name": "a", "taskReferenceName": "t1", "type": "SIMPLE"},
            {"name": "b", "taskReferenceName": "t1", "type": "SIMPLE"}
        ]
    }"#,
    );
    let rendered = errors[0].to_string();
    assert!(rendered.contains("DuplicateReferenceError"));
    assert!(rendered.contains("(task 't1')"));
}
