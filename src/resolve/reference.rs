//! `${...}` data-reference parsing.
//!
//! Conductor wires data with placeholder strings like `${t1.output.y}` or
//! `${workflow.input.customer_id}`. This module turns raw JSON values into
//! `ResolvedValue`s: literals pass through, a string that is exactly one
//! placeholder becomes a `Ref`, and mixed text becomes a `Template`.

use serde::Serialize;
use serde_json::Value;

/// A parsed data reference, with the `.output.` marker already stripped.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataRef {
    TaskOutput {
        reference_name: String,
        field_path: Vec<String>,
    },
    WorkflowInput {
        field_path: Vec<String>,
    },
    WorkflowVariable {
        field_path: Vec<String>,
    },
    /// The implicit per-iteration counter inside a DO_WHILE condition.
    Iteration,
}

impl DataRef {
    /// The producing task's reference name, if the value comes from a task.
    pub fn producer(&self) -> Option<&str> {
        match self {
            DataRef::TaskOutput { reference_name, .. } => Some(reference_name),
            _ => None,
        }
    }

    pub fn field_path(&self) -> &[String] {
        match self {
            DataRef::TaskOutput { field_path, .. }
            | DataRef::WorkflowInput { field_path }
            | DataRef::WorkflowVariable { field_path } => field_path,
            DataRef::Iteration => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TemplatePart {
    Text { text: String },
    Ref { data_ref: DataRef },
}

/// An input value after reference resolution. `Object` keeps field order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolvedValue {
    Literal { value: Value },
    Ref { data_ref: DataRef },
    Template { parts: Vec<TemplatePart> },
    Object { fields: Vec<(String, ResolvedValue)> },
    Array { items: Vec<ResolvedValue> },
}

/// Parse the inside of a `${...}` placeholder.
pub fn parse_data_ref(inner: &str) -> Result<DataRef, String> {
    let inner = inner.trim();
    if inner.is_empty() {
        return Err("empty data reference '${}'".to_string());
    }

    let segments: Vec<&str> = inner.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(format!("data reference '{}' has an empty path segment", inner));
    }

    if segments[0] == "workflow" {
        match segments.get(1) {
            Some(&"input") => Ok(DataRef::WorkflowInput {
                field_path: to_path(&segments[2..]),
            }),
            Some(&"variables") => Ok(DataRef::WorkflowVariable {
                field_path: to_path(&segments[2..]),
            }),
            Some(other) => Err(format!(
                "unknown workflow scope '{}' in '{}'; expected input or variables",
                other, inner
            )),
            None => Err(format!(
                "reference '{}' names the workflow scope but no field",
                inner
            )),
        }
    } else {
        // `<ref>.output.<path>`; the `output` segment is a marker, not data.
        let rest = if segments.get(1) == Some(&"output") {
            &segments[2..]
        } else {
            &segments[1..]
        };
        Ok(DataRef::TaskOutput {
            reference_name: segments[0].to_string(),
            field_path: to_path(rest),
        })
    }
}

fn to_path(segments: &[&str]) -> Vec<String> {
    segments.iter().map(|s| s.to_string()).collect()
}

/// Scan a string for `${...}` placeholders.
///
/// Returns the alternating text/ref parts. An unterminated `${` is an error;
/// a `$` not followed by `{` is plain text.
fn scan_template(s: &str) -> Result<Vec<TemplatePart>, String> {
    let mut parts = Vec::new();
    let mut text = String::new();
    let mut rest = s;

    while let Some(start) = rest.find("${") {
        text.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            return Err(format!("unterminated '${{' in '{}'", s));
        };
        if !text.is_empty() {
            parts.push(TemplatePart::Text {
                text: std::mem::take(&mut text),
            });
        }
        parts.push(TemplatePart::Ref {
            data_ref: parse_data_ref(&after[..end])?,
        });
        rest = &after[end + 1..];
    }

    text.push_str(rest);
    if !text.is_empty() {
        parts.push(TemplatePart::Text { text });
    }
    Ok(parts)
}

/// Resolve one raw JSON input value.
pub fn resolve_value(value: &Value) -> Result<ResolvedValue, String> {
    match value {
        Value::String(s) => {
            let parts = scan_template(s)?;
            match parts.as_slice() {
                [] => Ok(ResolvedValue::Literal {
                    value: Value::String(String::new()),
                }),
                [TemplatePart::Text { .. }] => Ok(ResolvedValue::Literal {
                    value: value.clone(),
                }),
                [TemplatePart::Ref { data_ref }] => Ok(ResolvedValue::Ref {
                    data_ref: data_ref.clone(),
                }),
                _ => Ok(ResolvedValue::Template { parts }),
            }
        }
        Value::Object(map) => {
            let mut fields = Vec::with_capacity(map.len());
            for (key, nested) in map {
                fields.push((key.clone(), resolve_value(nested)?));
            }
            Ok(ResolvedValue::Object { fields })
        }
        Value::Array(items) => {
            let mut resolved = Vec::with_capacity(items.len());
            for item in items {
                resolved.push(resolve_value(item)?);
            }
            Ok(ResolvedValue::Array { items: resolved })
        }
        other => Ok(ResolvedValue::Literal {
            value: other.clone(),
        }),
    }
}

/// Collect every data reference inside a resolved value.
pub fn collect_refs<'a>(value: &'a ResolvedValue, out: &mut Vec<&'a DataRef>) {
    match value {
        ResolvedValue::Literal { .. } => {}
        ResolvedValue::Ref { data_ref } => out.push(data_ref),
        ResolvedValue::Template { parts } => {
            for part in parts {
                if let TemplatePart::Ref { data_ref } = part {
                    out.push(data_ref);
                }
            }
        }
        ResolvedValue::Object { fields } => {
            for (_, nested) in fields {
                collect_refs(nested, out);
            }
        }
        ResolvedValue::Array { items } => {
            for item in items {
                collect_refs(item, out);
            }
        }
    }
}

/// Parse the references a DO_WHILE condition reads. The bare identifier
/// `iteration` refers to the loop's own counter.
pub fn parse_condition_refs(condition: &str) -> Result<Vec<DataRef>, String> {
    let mut refs = Vec::new();
    for part in scan_template(condition)? {
        if let TemplatePart::Ref { data_ref } = part {
            refs.push(data_ref);
        }
    }
    if contains_word(condition, "iteration") {
        refs.push(DataRef::Iteration);
    }
    Ok(refs)
}

fn contains_word(haystack: &str, word: &str) -> bool {
    let bytes = haystack.as_bytes();
    let mut from = 0;
    while let Some(pos) = haystack[from..].find(word) {
        let start = from + pos;
        let end = start + word.len();
        let before_ok = start == 0 || !is_ident_char(bytes[start - 1]);
        let after_ok = end == bytes.len() || !is_ident_char(bytes[end]);
        if before_ok && after_ok {
            return true;
        }
        from = end;
    }
    false
}

fn is_ident_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'.'
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pure_ref_string() {
        let resolved = resolve_value(&json!("${t1.output.y}")).unwrap();
        assert_eq!(
            resolved,
            ResolvedValue::Ref {
                data_ref: DataRef::TaskOutput {
                    reference_name: "t1".to_string(),
                    field_path: vec!["y".to_string()],
                }
            }
        );
    }

    #[test]
    fn workflow_input_ref() {
        let resolved = resolve_value(&json!("${workflow.input.customer_id}")).unwrap();
        assert_eq!(
            resolved,
            ResolvedValue::Ref {
                data_ref: DataRef::WorkflowInput {
                    field_path: vec!["customer_id".to_string()],
                }
            }
        );
    }

    #[test]
    fn plain_string_is_literal() {
        let resolved = resolve_value(&json!("hello")).unwrap();
        assert_eq!(
            resolved,
            ResolvedValue::Literal {
                value: json!("hello")
            }
        );
    }

    #[test]
    fn mixed_string_is_template() {
        let resolved = resolve_value(&json!("order ${t1.output.id} ready")).unwrap();
        let ResolvedValue::Template { parts } = resolved else {
            panic!("expected template");
        };
        assert_eq!(parts.len(), 3);
        assert_eq!(
            parts[0],
            TemplatePart::Text {
                text: "order ".to_string()
            }
        );
    }

    #[test]
    fn nested_object_resolves_recursively() {
        let resolved =
            resolve_value(&json!({"a": "${t1.output.x}", "b": {"c": 7}})).unwrap();
        let mut refs = Vec::new();
        collect_refs(&resolved, &mut refs);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].producer(), Some("t1"));
    }

    #[test]
    fn unterminated_placeholder_rejected() {
        assert!(resolve_value(&json!("${t1.output.y")).is_err());
    }

    #[test]
    fn condition_refs_include_iteration() {
        let refs = parse_condition_refs("${counter.output.value} < 10 and iteration < 3").unwrap();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].producer(), Some("counter"));
        assert_eq!(refs[1], DataRef::Iteration);
    }

    #[test]
    fn iteration_not_matched_inside_identifier() {
        let refs = parse_condition_refs("${t.output.max_iterations} > 1").unwrap();
        assert_eq!(refs.len(), 1);
    }
}
