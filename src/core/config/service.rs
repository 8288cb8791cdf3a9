use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};

use super::paths::AppPaths;
use super::settings::PipelineSettings;
use super::validation::validate_config;
use crate::core::errors::PipelineError;

/// Environment variables that override `config.yml`, mapped to their config path.
const ENV_OVERRIDES: [(&str, &str, &str); 9] = [
    ("EMBEDDING_DIMENSION", "embedding", "dimension"),
    ("EMBEDDING_MAX_CONCURRENCY", "embedding", "max_concurrency"),
    ("EMBEDDING_BATCH_SIZE", "embedding", "batch_size"),
    ("EMBEDDING_BATCH_TIMEOUT_MS", "embedding", "batch_timeout_ms"),
    ("VECTOR_METRIC_TYPE", "store", "metric"),
    ("VECTOR_TOP_K", "store", "top_k"),
    ("QA_DB_PATH", "store", "db_path"),
    ("DATASET_PATH", "dataset", "path"),
    ("DATASET_FIELD", "embedding", "field"),
];

#[derive(Clone)]
pub struct ConfigService {
    paths: Arc<AppPaths>,
}

impl ConfigService {
    pub fn new(paths: Arc<AppPaths>) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &AppPaths {
        &self.paths
    }

    pub fn config_path(&self) -> PathBuf {
        if let Ok(path) = env::var("QA_PIPELINE_CONFIG_PATH") {
            return PathBuf::from(path);
        }

        let user_config = self.paths.user_data_dir.join("config.yml");
        if user_config.exists() {
            return user_config;
        }

        self.paths.project_root.join("config.yml")
    }

    /// Raw merged configuration: file contents overlaid with environment overrides.
    pub fn load_config(&self) -> Result<Value, PipelineError> {
        let file_config = load_yaml_file(&self.config_path())?;
        let env_config = env_overrides(|key| env::var(key).ok());
        Ok(deep_merge(&file_config, &env_config))
    }

    pub fn load_settings(&self) -> Result<PipelineSettings, PipelineError> {
        let config = self.load_config()?;
        let mut settings = settings_from_value(&config)?;
        if settings.store.db_path.is_none() {
            settings.store.db_path = Some(self.paths.db_path.clone());
        }
        Ok(settings)
    }
}

pub fn settings_from_value(config: &Value) -> Result<PipelineSettings, PipelineError> {
    validate_config(config)?;
    let normalized = normalize_enum_values(config);
    serde_json::from_value(normalized)
        .map_err(|err| PipelineError::Config(format!("Invalid config: {err}")))
}

fn load_yaml_file(path: &Path) -> Result<Value, PipelineError> {
    if !path.exists() {
        return Ok(Value::Object(Map::new()));
    }

    let contents = fs::read_to_string(path).map_err(|err| {
        PipelineError::Config(format!("Failed to read {}: {err}", path.display()))
    })?;
    if contents.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }

    let value = serde_yaml::from_str::<Value>(&contents).map_err(|err| {
        PipelineError::Config(format!("Failed to parse {}: {err}", path.display()))
    })?;
    match value {
        Value::Object(_) => Ok(value),
        Value::Null => Ok(Value::Object(Map::new())),
        _ => Err(PipelineError::Config(format!(
            "{} must contain a mapping at the top level",
            path.display()
        ))),
    }
}

fn env_overrides<F>(lookup: F) -> Value
where
    F: Fn(&str) -> Option<String>,
{
    let mut root = Map::new();
    for (var, section, key) in ENV_OVERRIDES {
        let Some(raw) = lookup(var) else {
            continue;
        };
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        let entry = root
            .entry(section.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(map) = entry {
            map.insert(key.to_string(), parse_env_value(raw));
        }
    }
    Value::Object(root)
}

fn parse_env_value(raw: &str) -> Value {
    if let Ok(number) = raw.parse::<u64>() {
        return Value::from(number);
    }
    match raw.to_ascii_lowercase().as_str() {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(raw.to_string()),
    }
}

/// Metric names are matched case-insensitively, serde expects canonical casing.
fn normalize_enum_values(config: &Value) -> Value {
    let mut normalized = config.clone();
    if let Some(metric) = normalized.pointer_mut("/store/metric") {
        if let Some(text) = metric.as_str() {
            *metric = Value::String(text.to_ascii_uppercase());
        }
    }
    if let Some(field) = normalized.pointer_mut("/embedding/field") {
        if let Some(text) = field.as_str() {
            *field = Value::String(text.to_ascii_lowercase());
        }
    }
    normalized
}

fn deep_merge(base: &Value, override_value: &Value) -> Value {
    match (base, override_value) {
        (Value::Object(base_map), Value::Object(override_map)) => {
            let mut merged: Map<String, Value> = base_map.clone();
            for (key, value) in override_map {
                let merged_value = match merged.get(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), merged_value);
            }
            Value::Object(merged)
        }
        _ => override_value.clone(),
    }
}
