//! A small Go-template-flavored evaluator: `{{ .Field }}` substitution,
//! `| pipeline` functions, `{{ range }}`/`{{ if }}` blocks. Backs the
//! `ctxforge:text/template` host module and `tui.createPromptBuilder`.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("unclosed action starting at byte {0}")]
    UnclosedAction(usize),

    #[error("unknown pipeline function: {0}")]
    UnknownFunction(String),

    #[error("{{{{range}}}} without matching {{{{end}}}}")]
    UnclosedRange,

    #[error("{{{{if}}}} without matching {{{{end}}}}")]
    UnclosedIf,
}

#[derive(Debug)]
enum Node {
    Text(String),
    Field(Vec<String>, Vec<String>),
    Range(Vec<String>, Vec<Node>),
    If(Vec<String>, Vec<Node>, Vec<Node>),
}

/// Renders `template` against `vars` (a JSON object acting as `.` at the
/// top level).
pub fn render_template(template: &str, vars: &Value) -> Result<String, TemplateError> {
    let nodes = parse(template)?;
    let mut out = String::new();
    render_nodes(&nodes, vars, &mut out)?;
    Ok(out)
}

fn parse(input: &str) -> Result<Vec<Node>, TemplateError> {
    let mut nodes = Vec::new();
    parse_until(input, &mut 0, &mut nodes, None)?;
    Ok(nodes)
}

/// Parses `input` from `*pos` until either end-of-string or the given
/// `stop_tag` (`"end"` or `"else"`) is encountered, leaving `*pos`
/// pointing just past the consumed stop tag.
fn parse_until(input: &str, pos: &mut usize, out: &mut Vec<Node>, stop_tag: Option<&str>) -> Result<Option<String>, TemplateError> {
    let bytes = input.as_bytes();
    while *pos < bytes.len() {
        match input[*pos..].find("{{") {
            None => {
                out.push(Node::Text(input[*pos..].to_string()));
                *pos = bytes.len();
                break;
            }
            Some(rel) => {
                if rel > 0 {
                    out.push(Node::Text(input[*pos..*pos + rel].to_string()));
                }
                let action_start = *pos + rel;
                let close = input[action_start..]
                    .find("}}")
                    .ok_or(TemplateError::UnclosedAction(action_start))?;
                let action = input[action_start + 2..action_start + close].trim();
                *pos = action_start + close + 2;

                if let Some(rest) = action.strip_prefix("range ") {
                    let path = parse_field_path(rest.trim());
                    let mut body = Vec::new();
                    parse_until(input, pos, &mut body, Some("end"))?;
                    out.push(Node::Range(path, body));
                } else if let Some(rest) = action.strip_prefix("if ") {
                    let path = parse_field_path(rest.trim());
                    let mut then_body = Vec::new();
                    let stop = parse_until(input, pos, &mut then_body, Some("end"))?;
                    let else_body = if stop.as_deref() == Some("else") {
                        let mut body = Vec::new();
                        parse_until(input, pos, &mut body, Some("end"))?;
                        body
                    } else {
                        Vec::new()
                    };
                    out.push(Node::If(path, then_body, else_body));
                } else if action == "else" {
                    if stop_tag == Some("end") {
                        return Ok(Some("else".to_string()));
                    }
                } else if action == "end" {
                    return Ok(Some("end".to_string()));
                } else {
                    let mut parts = action.split('|').map(str::trim);
                    let field = parts.next().unwrap_or("");
                    let pipeline: Vec<String> = parts.map(String::from).collect();
                    out.push(Node::Field(parse_field_path(field), pipeline));
                }
            }
        }
    }
    if stop_tag.is_some() {
        return Err(if stop_tag == Some("end") {
            TemplateError::UnclosedRange
        } else {
            TemplateError::UnclosedIf
        });
    }
    Ok(None)
}

fn parse_field_path(field: &str) -> Vec<String> {
    field
        .trim_start_matches('.')
        .split('.')
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn resolve_path<'a>(root: &'a Value, path: &[String]) -> Option<&'a Value> {
    let mut current = root;
    for segment in path {
        current = current.get(segment)?;
    }
    Some(current)
}

fn resolve_path_or_self<'a>(root: &'a Value, path: &[String]) -> Option<&'a Value> {
    if path.is_empty() {
        Some(root)
    } else {
        resolve_path(root, path)
    }
}

fn value_to_display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn apply_pipeline(mut value: String, pipeline: &[String]) -> Result<String, TemplateError> {
    for func in pipeline {
        value = match func.as_str() {
            "upper" => value.to_uppercase(),
            "lower" => value.to_lowercase(),
            "trim" => value.trim().to_string(),
            "title" => value
                .split_whitespace()
                .map(|w| {
                    let mut chars = w.chars();
                    match chars.next() {
                        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                        None => String::new(),
                    }
                })
                .collect::<Vec<_>>()
                .join(" "),
            other => return Err(TemplateError::UnknownFunction(other.to_string())),
        };
    }
    Ok(value)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn render_nodes(nodes: &[Node], scope: &Value, out: &mut String) -> Result<(), TemplateError> {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Field(path, pipeline) => {
                let value = resolve_path_or_self(scope, path).cloned().unwrap_or(Value::Null);
                out.push_str(&apply_pipeline(value_to_display(&value), pipeline)?);
            }
            Node::Range(path, body) => {
                let value = resolve_path_or_self(scope, path).cloned().unwrap_or(Value::Null);
                if let Value::Array(items) = value {
                    for item in items {
                        render_nodes(body, &item, out)?;
                    }
                }
            }
            Node::If(path, then_body, else_body) => {
                let value = resolve_path_or_self(scope, path).cloned().unwrap_or(Value::Null);
                if is_truthy(&value) {
                    render_nodes(then_body, scope, out)?;
                } else {
                    render_nodes(else_body, scope, out)?;
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn substitutes_a_simple_field() {
        let out = render_template("Hello, {{ .Name }}!", &json!({"Name": "World"})).unwrap();
        assert_eq!(out, "Hello, World!");
    }

    #[test]
    fn applies_a_pipeline_function() {
        let out = render_template("{{ .Name | upper }}", &json!({"Name": "ada"})).unwrap();
        assert_eq!(out, "ADA");
    }

    #[test]
    fn chains_multiple_pipeline_functions() {
        let out = render_template("{{ .Name | trim | upper }}", &json!({"Name": "  ada  "})).unwrap();
        assert_eq!(out, "ADA");
    }

    #[test]
    fn range_iterates_over_an_array() {
        let out = render_template(
            "{{ range .Items }}[{{ .Name }}]{{ end }}",
            &json!({"Items": [{"Name": "a"}, {"Name": "b"}]}),
        )
        .unwrap();
        assert_eq!(out, "[a][b]");
    }

    #[test]
    fn if_renders_then_branch_when_truthy() {
        let out = render_template("{{ if .Flag }}yes{{ else }}no{{ end }}", &json!({"Flag": true})).unwrap();
        assert_eq!(out, "yes");
    }

    #[test]
    fn if_renders_else_branch_when_falsy() {
        let out = render_template("{{ if .Flag }}yes{{ else }}no{{ end }}", &json!({"Flag": false})).unwrap();
        assert_eq!(out, "no");
    }

    #[test]
    fn unknown_pipeline_function_errors() {
        let result = render_template("{{ .Name | bogus }}", &json!({"Name": "x"}));
        assert!(matches!(result, Err(TemplateError::UnknownFunction(_))));
    }
}
