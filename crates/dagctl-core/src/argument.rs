//! Argument resolution.
//!
//! Two representations co-exist: the structured `{type, ...}` shape
//! (preferred) and legacy `$OUTPUT[task_id](.path)?` strings. Resolution
//! walks a task's `arguments` map and produces a plain
//! `serde_json::Value` per argument, ready for the tool executor.

use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::error::TaskFailure;
use crate::result::{TaskResult, TaskStatus};
use crate::task::ArgumentValue;

fn legacy_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\$OUTPUT\[([^\]]+)\](?:\.(.+))?$").unwrap())
}

fn reference_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // identifier (. identifier | [index])*
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(?:(?:\.[A-Za-z_][A-Za-z0-9_]*)|(?:\[\d+\]))*$").unwrap())
}

/// A non-fatal resolution warning (undefined/failed structured
/// reference). Fatal legacy reference errors are returned as `Err`.
#[derive(Debug, Clone)]
pub struct ResolutionWarning {
    pub argument: String,
    pub message: String,
}

/// Resolves every argument of a task against the results already
/// produced by its dependencies.
pub struct ArgumentResolver<'a> {
    results: &'a HashMap<String, TaskResult>,
}

impl<'a> ArgumentResolver<'a> {
    pub fn new(results: &'a HashMap<String, TaskResult>) -> Self {
        Self { results }
    }

    pub fn resolve_all(
        &self,
        arguments: &HashMap<String, ArgumentValue>,
    ) -> Result<(HashMap<String, Value>, Vec<ResolutionWarning>), TaskFailure> {
        let mut resolved = HashMap::with_capacity(arguments.len());
        let mut warnings = Vec::new();
        for (name, value) in arguments {
            let v = self.resolve_value(name, value, &mut warnings)?;
            resolved.insert(name.clone(), v);
        }
        Ok((resolved, warnings))
    }

    fn resolve_value(
        &self,
        name: &str,
        value: &ArgumentValue,
        warnings: &mut Vec<ResolutionWarning>,
    ) -> Result<Value, TaskFailure> {
        match value {
            ArgumentValue::Literal { value } => Ok(value.clone()),
            ArgumentValue::Parameter { parameter_name } => {
                warnings.push(ResolutionWarning {
                    argument: name.to_string(),
                    message: format!("unbound parameter {parameter_name}, resolved to null"),
                });
                Ok(Value::Null)
            }
            ArgumentValue::Reference { expression } => {
                Ok(self.resolve_expression(name, expression, warnings))
            }
            ArgumentValue::Legacy(s) => self.resolve_legacy(s),
            ArgumentValue::Object(map) => {
                let mut out = serde_json::Map::with_capacity(map.len());
                for (k, v) in map {
                    out.insert(k.clone(), self.resolve_value(name, v, warnings)?);
                }
                Ok(Value::Object(out))
            }
            ArgumentValue::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    out.push(self.resolve_value(&format!("{name}[{i}]"), item, warnings)?);
                }
                Ok(Value::Array(out))
            }
        }
    }

    /// Resolves a structured `reference` expression, including template
    /// literals of the form `` `${expr}...` `` by substitution.
    /// Undefined or failed references resolve to `null` with a warning
    /// (non-fatal, unlike the legacy form).
    fn resolve_expression(&self, arg_name: &str, expr: &str, warnings: &mut Vec<ResolutionWarning>) -> Value {
        if expr.starts_with('`') && expr.ends_with('`') {
            return self.resolve_template(arg_name, &expr[1..expr.len() - 1], warnings);
        }
        self.resolve_path_expression(arg_name, expr, warnings)
    }

    fn resolve_template(&self, arg_name: &str, body: &str, warnings: &mut Vec<ResolutionWarning>) -> Value {
        let mut out = String::new();
        let mut rest = body;
        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find('}') else {
                out.push_str(&rest[start..]);
                rest = "";
                break;
            };
            let expr = &after[..end];
            let resolved = self.resolve_path_expression(arg_name, expr, warnings);
            out.push_str(&value_to_display(&resolved));
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        Value::String(out)
    }

    fn resolve_path_expression(&self, arg_name: &str, expr: &str, warnings: &mut Vec<ResolutionWarning>) -> Value {
        if !reference_pattern().is_match(expr) {
            warnings.push(ResolutionWarning {
                argument: arg_name.to_string(),
                message: format!("malformed reference expression: {expr}"),
            });
            return Value::Null;
        }

        let mut parts = split_path(expr);
        if parts.is_empty() {
            return Value::Null;
        }
        let node_id = match parts.remove(0) {
            PathSegment::Field(name) => name,
            PathSegment::Index(i) => i.to_string(),
        };
        let task_id = format!("task_{node_id}");

        let Some(result) = self.results.get(&task_id) else {
            warnings.push(ResolutionWarning {
                argument: arg_name.to_string(),
                message: format!("reference to undefined task: {task_id}"),
            });
            return Value::Null;
        };

        if result.status == TaskStatus::Error {
            warnings.push(ResolutionWarning {
                argument: arg_name.to_string(),
                message: format!("reference to failed task: {task_id}"),
            });
            return Value::Null;
        }

        let mut current = result.output.clone().unwrap_or(Value::Null);
        for part in parts {
            current = navigate(&current, &part);
        }
        current
    }

    fn resolve_legacy(&self, s: &str) -> Result<Value, TaskFailure> {
        let caps = legacy_pattern()
            .captures(s)
            .ok_or_else(|| TaskFailure::ToolError(format!("malformed legacy reference: {s}")))?;
        let task_id = caps.get(1).unwrap().as_str();
        let path = caps.get(2).map(|m| m.as_str());

        let result = self
            .results
            .get(task_id)
            .ok_or_else(|| TaskFailure::ReferenceToUndefinedTask(task_id.to_string()))?;

        if result.status == TaskStatus::Error {
            return Err(TaskFailure::ReferenceToFailedTask(task_id.to_string()));
        }

        let mut current = result.output.clone().unwrap_or(Value::Null);
        if let Some(path) = path {
            for part in split_path(path) {
                current = navigate(&current, &part);
            }
        }
        Ok(current)
    }
}

/// A path segment: either a named field or a numeric array index.
enum PathSegment {
    Field(String),
    Index(usize),
}

fn split_path(path: &str) -> Vec<PathSegment> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = path.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '.' => {
                if !current.is_empty() {
                    segments.push(PathSegment::Field(std::mem::take(&mut current)));
                }
            }
            '[' => {
                if !current.is_empty() {
                    segments.push(PathSegment::Field(std::mem::take(&mut current)));
                }
                let mut idx = String::new();
                for c2 in chars.by_ref() {
                    if c2 == ']' {
                        break;
                    }
                    idx.push(c2);
                }
                if let Ok(n) = idx.parse() {
                    segments.push(PathSegment::Index(n));
                }
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        segments.push(PathSegment::Field(current));
    }
    segments
}

fn navigate(value: &Value, segment: &PathSegment) -> Value {
    match segment {
        PathSegment::Field(name) => value.get(name).cloned().unwrap_or(Value::Null),
        PathSegment::Index(i) => value.get(i).cloned().unwrap_or(Value::Null),
    }
}

fn value_to_display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::TaskResult;

    fn ok_result(output: Value) -> TaskResult {
        TaskResult {
            task_id: "task_a".into(),
            status: TaskStatus::Success,
            output: Some(output),
            error: None,
            execution_time_ms: Some(5),
            layer_index: Some(0),
        }
    }

    #[test]
    fn resolves_nested_reference() {
        let mut results = HashMap::new();
        results.insert(
            "task_a".to_string(),
            ok_result(serde_json::json!({"field": {"path": 42}})),
        );
        let resolver = ArgumentResolver::new(&results);
        let v = resolver.resolve_path_expression("x", "a.field.path", &mut vec![]);
        assert_eq!(v, serde_json::json!(42));
    }

    #[test]
    fn undefined_reference_is_non_fatal() {
        let results = HashMap::new();
        let resolver = ArgumentResolver::new(&results);
        let mut warnings = vec![];
        let v = resolver.resolve_path_expression("x", "missing.field", &mut warnings);
        assert_eq!(v, Value::Null);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn legacy_reference_to_failed_task_is_fatal() {
        let mut results = HashMap::new();
        results.insert(
            "task_a".to_string(),
            TaskResult {
                task_id: "task_a".into(),
                status: TaskStatus::Error,
                output: None,
                error: Some("boom".into()),
                execution_time_ms: None,
                layer_index: Some(0),
            },
        );
        let resolver = ArgumentResolver::new(&results);
        let err = resolver.resolve_legacy("$OUTPUT[task_a].field").unwrap_err();
        assert!(matches!(err, TaskFailure::ReferenceToFailedTask(_)));
    }

    #[test]
    fn template_literal_substitutes_expressions() {
        let mut results = HashMap::new();
        results.insert("task_a".to_string(), ok_result(serde_json::json!({"name": "bob"})));
        let resolver = ArgumentResolver::new(&results);
        let v = resolver.resolve_template("x", "hello ${a.name}!", &mut vec![]);
        assert_eq!(v, Value::String("hello bob!".to_string()));
    }
}
