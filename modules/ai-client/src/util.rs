use std::collections::HashMap;

use anyhow::{bail, Result};
use serde_json::Value;

/// Strip markdown code fences from a model response.
pub fn strip_code_blocks(response: &str) -> &str {
    response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

/// Render `{name}` placeholders in an instruction from a state map.
///
/// String values are inserted as-is, other JSON values in compact form.
/// `{name?}` renders as empty when `name` is absent; a plain `{name}` with no
/// value is an error. Braces that do not enclose an identifier are left alone,
/// so JSON examples inside prompts survive.
pub fn render_template(template: &str, state: &HashMap<String, Value>) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            return Ok(out);
        };

        let inner = &after[..close];
        let (name, optional) = match inner.strip_suffix('?') {
            Some(name) => (name, true),
            None => (inner, false),
        };

        if !is_identifier(name) {
            out.push('{');
            rest = after;
            continue;
        }

        match state.get(name) {
            Some(Value::String(s)) => out.push_str(s),
            Some(Value::Null) | None if optional => {}
            Some(other) => out.push_str(&other.to_string()),
            None => bail!("Template variable '{}' has no value", name),
        }
        rest = &after[close + 1..];
    }

    out.push_str(rest);
    Ok(out)
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_strip_code_blocks() {
        assert_eq!(strip_code_blocks("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_blocks("{}"), "{}");
    }

    #[test]
    fn renders_string_values_verbatim() {
        let vars = state(&[("search_results", Value::String("flooding on MG Road".into()))]);
        let out = render_template("Evidence:\n{search_results}\nEnd", &vars).unwrap();
        assert_eq!(out, "Evidence:\nflooding on MG Road\nEnd");
    }

    #[test]
    fn missing_required_variable_is_an_error() {
        let err = render_template("{search_results}", &HashMap::new()).unwrap_err();
        assert!(err.to_string().contains("search_results"));
    }

    #[test]
    fn optional_variable_renders_empty() {
        let out = render_template("a{hint?}b", &HashMap::new()).unwrap();
        assert_eq!(out, "ab");
    }

    #[test]
    fn json_braces_are_left_alone() {
        let vars = state(&[("n", serde_json::json!(3))]);
        let out = render_template(r#"{"anomalies": []} x{n}"#, &vars).unwrap();
        assert_eq!(out, r#"{"anomalies": []} x3"#);
    }

    #[test]
    fn unclosed_brace_is_kept() {
        let out = render_template("tail {open", &HashMap::new()).unwrap();
        assert_eq!(out, "tail {open");
    }
}
