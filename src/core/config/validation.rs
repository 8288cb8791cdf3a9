use serde_json::{Map, Value};

use crate::core::errors::PipelineError;

const METRIC_TYPES: [&str; 2] = ["IP", "L2"];
const TEXT_FIELDS: [&str; 2] = ["question", "answer"];

pub fn validate_config(config: &Value) -> Result<(), PipelineError> {
    let root = config
        .as_object()
        .ok_or_else(|| config_type_error("root", "object"))?;

    if let Some(embedding) = expect_optional_object(root, "embedding")? {
        validate_u64_field(embedding, "embedding.dimension", "dimension", 1, 65_536)?;
        validate_u64_field(
            embedding,
            "embedding.max_concurrency",
            "max_concurrency",
            1,
            4_096,
        )?;
        validate_u64_field(
            embedding,
            "embedding.batch_size",
            "batch_size",
            1,
            10_000_000,
        )?;
        validate_u64_field(
            embedding,
            "embedding.batch_timeout_ms",
            "batch_timeout_ms",
            1,
            86_400_000,
        )?;
        validate_bool_field(embedding, "embedding.normalize", "normalize")?;
        validate_enum_field(embedding, "embedding.field", "field", &TEXT_FIELDS)?;
    }

    if let Some(store) = expect_optional_object(root, "store")? {
        validate_enum_field(store, "store.metric", "metric", &METRIC_TYPES)?;
        validate_u64_field(store, "store.top_k", "top_k", 1, 1_000)?;
        validate_optional_string_field(store, "store.db_path", "db_path")?;
    }

    if let Some(dataset) = expect_optional_object(root, "dataset")? {
        validate_optional_string_field(dataset, "dataset.path", "path")?;
    }

    Ok(())
}

fn expect_optional_object<'a>(
    root: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a Map<String, Value>>, PipelineError> {
    match root.get(key) {
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(Value::Null) | None => Ok(None),
        Some(_) => Err(config_type_error(key, "object")),
    }
}

fn validate_bool_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), PipelineError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.as_bool().is_some() {
        return Ok(());
    }
    Err(config_type_error(path, "boolean"))
}

fn validate_u64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: u64,
    max: u64,
) -> Result<(), PipelineError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.is_null() {
        return Ok(());
    }
    let Some(number) = value.as_u64() else {
        return Err(config_type_error(path, "integer"));
    };
    if number < min || number > max {
        return Err(PipelineError::Config(format!(
            "Invalid config at '{}': must be between {} and {}",
            path, min, max
        )));
    }
    Ok(())
}

fn validate_optional_string_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), PipelineError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.is_null() || value.as_str().is_some() {
        return Ok(());
    }
    Err(config_type_error(path, "string"))
}

fn validate_enum_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    allowed: &[&str],
) -> Result<(), PipelineError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(text) = value.as_str() else {
        return Err(config_type_error(path, "string"));
    };
    if allowed.iter().any(|candidate| candidate.eq_ignore_ascii_case(text)) {
        return Ok(());
    }
    Err(PipelineError::Config(format!(
        "Invalid config at '{}': expected one of {}",
        path,
        allowed.join(", ")
    )))
}

fn config_type_error(path: &str, expected: &str) -> PipelineError {
    PipelineError::Config(format!(
        "Invalid config at '{}': expected {}",
        path, expected
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_empty_and_complete_configs() {
        assert!(validate_config(&json!({})).is_ok());
        let full = json!({
            "embedding": {
                "dimension": 768,
                "max_concurrency": 8,
                "batch_size": 32,
                "batch_timeout_ms": 5000,
                "normalize": true,
                "field": "answer"
            },
            "store": { "metric": "l2", "top_k": 10, "db_path": "/tmp/qa.db" },
            "dataset": { "path": "data.jsonl" }
        });
        assert!(validate_config(&full).is_ok());
    }

    #[test]
    fn rejects_out_of_range_numbers() {
        let err = validate_config(&json!({ "embedding": { "max_concurrency": 0 } })).unwrap_err();
        assert!(err.to_string().contains("embedding.max_concurrency"));

        let err = validate_config(&json!({ "store": { "top_k": 5000 } })).unwrap_err();
        assert!(err.to_string().contains("store.top_k"));
    }

    #[test]
    fn rejects_wrong_types_and_unknown_variants() {
        assert!(validate_config(&json!({ "embedding": "fast" })).is_err());
        assert!(validate_config(&json!({ "embedding": { "normalize": "yes" } })).is_err());
        assert!(validate_config(&json!({ "store": { "metric": "COSINE" } })).is_err());
        assert!(validate_config(&json!({ "embedding": { "field": "title" } })).is_err());
    }
}
