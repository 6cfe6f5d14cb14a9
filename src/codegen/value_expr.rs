//! Python expression emission for resolved values.
//!
//! Task outputs live in `self._state`, workflow inputs in `self._args`, and
//! workflow variables in `self._variables`. Field paths whose segments are
//! plain identifiers become chained subscripts; anything else goes through
//! the generated `_pluck` helper and is resolved at runtime.

use serde_json::Value;

use crate::resolve::{DataRef, ResolvedValue, TemplatePart};

/// Single-quoted Python string literal.
pub fn py_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out.push('\'');
    out
}

pub fn py_literal(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => py_str(s),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(py_literal).collect();
            format!("[{}]", parts.join(", "))
        }
        Value::Object(map) => {
            let parts: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", py_str(k), py_literal(v)))
                .collect();
            format!("{{{}}}", parts.join(", "))
        }
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn path_expr(base: String, path: &[String]) -> String {
    if path.is_empty() {
        return base;
    }
    if path.iter().all(|seg| is_identifier(seg)) {
        let mut out = base;
        for seg in path {
            out.push_str(&format!("[{}]", py_str(seg)));
        }
        out
    } else {
        format!("_pluck({}, {})", base, py_str(&path.join(".")))
    }
}

pub fn ref_expr(data_ref: &DataRef) -> String {
    match data_ref {
        DataRef::TaskOutput {
            reference_name,
            field_path,
        } => path_expr(format!("self._state[{}]", py_str(reference_name)), field_path),
        DataRef::WorkflowInput { field_path } => path_expr("self._args".to_string(), field_path),
        DataRef::WorkflowVariable { field_path } => {
            path_expr("self._variables".to_string(), field_path)
        }
        DataRef::Iteration => "_iteration".to_string(),
    }
}

pub fn value_expr(value: &ResolvedValue) -> String {
    match value {
        ResolvedValue::Literal { value } => py_literal(value),
        ResolvedValue::Ref { data_ref } => ref_expr(data_ref),
        ResolvedValue::Template { parts } => template_expr(parts),
        ResolvedValue::Object { fields } => {
            let parts: Vec<String> = fields
                .iter()
                .map(|(k, v)| format!("{}: {}", py_str(k), value_expr(v)))
                .collect();
            format!("{{{}}}", parts.join(", "))
        }
        ResolvedValue::Array { items } => {
            let parts: Vec<String> = items.iter().map(value_expr).collect();
            format!("[{}]", parts.join(", "))
        }
    }
}

/// Mixed text and references become a double-quoted f-string; interpolated
/// expressions only ever use single quotes, so the quoting never collides.
fn template_expr(parts: &[TemplatePart]) -> String {
    let mut out = String::from("f\"");
    for part in parts {
        match part {
            TemplatePart::Text { text } => {
                for c in text.chars() {
                    match c {
                        '\\' => out.push_str("\\\\"),
                        '"' => out.push_str("\\\""),
                        '{' => out.push_str("{{"),
                        '}' => out.push_str("}}"),
                        '\n' => out.push_str("\\n"),
                        other => out.push(other),
                    }
                }
            }
            TemplatePart::Ref { data_ref } => {
                out.push('{');
                out.push_str(&ref_expr(data_ref));
                out.push('}');
            }
        }
    }
    out.push('"');
    out
}

/// Re-express a loop condition in Python. `${...}` references become state
/// reads, the bare `iteration` identifier becomes the loop counter, and the
/// common JavaScript-flavored operators get their Python spellings.
pub fn condition_expr(condition: &str, iteration_var: &str) -> Result<String, String> {
    let mut out = String::new();
    let mut rest = condition;

    while let Some(start) = rest.find("${") {
        out.push_str(&pythonize_text(&rest[..start], iteration_var));
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            return Err(format!("unterminated '${{' in condition '{}'", condition));
        };
        let data_ref = crate::resolve::reference::parse_data_ref(&after[..end])?;
        out.push_str(&ref_expr(&data_ref));
        rest = &after[end + 1..];
    }
    out.push_str(&pythonize_text(rest, iteration_var));

    Ok(out)
}

fn pythonize_text(text: &str, iteration_var: &str) -> String {
    let text = text.replace("&&", " and ").replace("||", " or ");
    let text = replace_word(&text, "true", "True");
    let text = replace_word(&text, "false", "False");
    replace_word(&text, "iteration", iteration_var)
}

fn replace_word(text: &str, word: &str, replacement: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let bytes = text.as_bytes();
    let mut from = 0;
    while let Some(pos) = text[from..].find(word) {
        let start = from + pos;
        let end = start + word.len();
        let before_ok = start == 0 || !is_word_char(bytes[start - 1]);
        let after_ok = end == bytes.len() || !is_word_char(bytes[end]);
        out.push_str(&text[from..start]);
        if before_ok && after_ok {
            out.push_str(replacement);
        } else {
            out.push_str(word);
        }
        from = end;
    }
    out.push_str(&text[from..]);
    out
}

fn is_word_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}
