//! YAML configuration loader with `$include` composition and
//! `${ENV_VAR:default}` expansion. Adapted from
//! `orchestrator::config::loader`, narrowed to the single `Config`
//! target type this crate deserializes into (the original loader is
//! generic over any `DeserializeOwned` type; a server with one config
//! shape has no need for that generality).

use std::env;
use std::fs;
use std::path::Path;

use serde_json::Value as JsonValue;
use serde_yaml::Value as YamlValue;

use crate::error::{ServerError, Result};

/// Loads a YAML file, resolving `$include` directives relative to the
/// file's own directory and expanding `${ENV_VAR:default}` references,
/// then deserializes the result into `super::Config`.
pub fn load_yaml_file<P: AsRef<Path>>(path: P) -> Result<YamlValue> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .map_err(|e| ServerError::Config(format!("failed to read {:?}: {e}", path)))?;

    let mut value: YamlValue = serde_yaml::from_str(&content)
        .map_err(|e| ServerError::Config(format!("failed to parse {:?}: {e}", path)))?;

    let base_dir = path.parent().ok_or_else(|| ServerError::Config("invalid config path".into()))?;
    process_includes(&mut value, base_dir)?;
    expand_variables(&mut value);

    Ok(value)
}

pub fn load_yaml_config<P: AsRef<Path>>(path: P) -> Result<super::Config> {
    let yaml = load_yaml_file(path)?;
    let json = yaml_to_json(&yaml)?;
    serde_json::from_value(json).map_err(|e| ServerError::Config(format!("invalid configuration: {e}")))
}

/// Replaces a `{$include: "relative/path.yaml"}` mapping with the
/// parsed contents of that file, recursively, depth-first so a nested
/// include's own includes resolve relative to its own directory.
fn process_includes(value: &mut YamlValue, base_dir: &Path) -> Result<()> {
    match value {
        YamlValue::Mapping(map) => {
            if let Some(YamlValue::String(include_path)) = map.get(&YamlValue::String("$include".to_string())) {
                let full_path = base_dir.join(include_path);
                *value = load_yaml_file(&full_path)?;
                return Ok(());
            }
            for (_, v) in map.iter_mut() {
                process_includes(v, base_dir)?;
            }
        }
        YamlValue::Sequence(seq) => {
            for item in seq.iter_mut() {
                process_includes(item, base_dir)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn expand_variables(value: &mut YamlValue) {
    match value {
        YamlValue::String(s) => {
            if let Some(expanded) = expand_env_in_string(s) {
                *s = expanded;
            }
        }
        YamlValue::Mapping(map) => {
            for (_, v) in map.iter_mut() {
                expand_variables(v);
            }
        }
        YamlValue::Sequence(seq) => {
            for item in seq.iter_mut() {
                expand_variables(item);
            }
        }
        _ => {}
    }
}

/// `${VAR}` or `${VAR:default}`; unset variables with no default expand
/// to the empty string.
fn expand_env_in_string(s: &str) -> Option<String> {
    if !s.contains("${") {
        return None;
    }
    let re = regex::Regex::new(r"\$\{([^:}]+)(?::([^}]*))?\}").ok()?;
    let mut result = s.to_string();
    for cap in re.captures_iter(s) {
        let full_match = cap.get(0)?.as_str();
        let var_name = cap.get(1)?.as_str();
        let default_value = cap.get(2).map(|m| m.as_str()).unwrap_or("");
        let value = env::var(var_name).unwrap_or_else(|_| default_value.to_string());
        result = result.replace(full_match, &value);
    }
    Some(result)
}

fn yaml_to_json(yaml: &YamlValue) -> Result<JsonValue> {
    match yaml {
        YamlValue::Null => Ok(JsonValue::Null),
        YamlValue::Bool(b) => Ok(JsonValue::Bool(*b)),
        YamlValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(JsonValue::Number(i.into()))
            } else if let Some(u) = n.as_u64() {
                Ok(JsonValue::Number(u.into()))
            } else if let Some(f) = n.as_f64() {
                serde_json::Number::from_f64(f).map(JsonValue::Number).ok_or_else(|| ServerError::Config("invalid number in config".into()))
            } else {
                Err(ServerError::Config("invalid number in config".into()))
            }
        }
        YamlValue::String(s) => Ok(JsonValue::String(s.clone())),
        YamlValue::Sequence(seq) => {
            let items: Result<Vec<JsonValue>> = seq.iter().map(yaml_to_json).collect();
            Ok(JsonValue::Array(items?))
        }
        YamlValue::Mapping(map) => {
            let mut out = serde_json::Map::new();
            for (k, v) in map {
                let key = match k {
                    YamlValue::String(s) => s.clone(),
                    _ => return Err(ServerError::Config("config map keys must be strings".into())),
                };
                out.insert(key, yaml_to_json(v)?);
            }
            Ok(JsonValue::Object(out))
        }
        YamlValue::Tagged(tagged) => yaml_to_json(&tagged.value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn expands_env_var_with_default() {
        env::set_var("DAGCTL_TEST_VAR", "prod");
        assert_eq!(expand_env_in_string("env: ${DAGCTL_TEST_VAR:dev}").unwrap(), "env: prod");
        env::remove_var("DAGCTL_TEST_VAR");
        assert_eq!(expand_env_in_string("env: ${DAGCTL_TEST_VAR:dev}").unwrap(), "env: dev");
    }

    #[test]
    fn resolves_include_relative_to_parent_file() {
        let dir = tempfile::tempdir().unwrap();
        let included_path = dir.path().join("base.yaml");
        std::fs::File::create(&included_path).unwrap().write_all(b"task_timeout_ms: 5000\n").unwrap();

        let main_path = dir.path().join("main.yaml");
        std::fs::File::create(&main_path).unwrap().write_all(b"$include: base.yaml\n").unwrap();

        let resolved = load_yaml_file(&main_path).unwrap();
        let json = yaml_to_json(&resolved).unwrap();
        assert_eq!(json["task_timeout_ms"], serde_json::json!(5000));
    }
}
