use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::errors::PipelineError;

/// One question/answer pair with its external identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaRecord {
    pub id: String,
    pub question: String,
    pub answer: String,
}

/// Dataset column selected for embedding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextField {
    #[default]
    Question,
    Answer,
}

/// Ordered, immutable collection of records for one pipeline run.
#[derive(Debug, Clone)]
pub struct Dataset {
    records: Vec<QaRecord>,
}

impl Dataset {
    /// Build a dataset; rejects an empty list and duplicate ids.
    pub fn from_records(records: Vec<QaRecord>) -> Result<Self, PipelineError> {
        if records.is_empty() {
            return Err(PipelineError::invalid("dataset is empty"));
        }
        let mut seen = HashSet::with_capacity(records.len());
        for (line, record) in records.iter().enumerate() {
            if !seen.insert(record.id.as_str()) {
                return Err(PipelineError::invalid(format!(
                    "duplicate record id '{}' at position {}",
                    record.id, line
                )));
            }
        }
        Ok(Self { records })
    }

    /// Parse a JSON Lines file of `{"id", "question", "answer"}` objects.
    ///
    /// Blank lines are skipped. A record without `id` takes its 1-based line number.
    pub fn from_jsonl_str(contents: &str) -> Result<Self, PipelineError> {
        let mut records = Vec::new();
        for (index, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let raw: RawRecord = serde_json::from_str(line).map_err(|err| {
                PipelineError::invalid(format!("line {}: {err}", index + 1))
            })?;
            records.push(QaRecord {
                id: raw.id.unwrap_or_else(|| (index + 1).to_string()),
                question: raw.question,
                answer: raw.answer,
            });
        }
        Self::from_records(records)
    }

    pub async fn from_jsonl(path: &Path) -> Result<Self, PipelineError> {
        let contents = tokio::fs::read_to_string(path).await.map_err(|err| {
            PipelineError::invalid(format!("failed to read {}: {err}", path.display()))
        })?;
        Self::from_jsonl_str(&contents)
    }

    pub fn records(&self) -> &[QaRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Texts of one column, in record order.
    pub fn texts(&self, field: TextField) -> Vec<String> {
        self.records
            .iter()
            .map(|record| match field {
                TextField::Question => record.question.clone(),
                TextField::Answer => record.answer.clone(),
            })
            .collect()
    }
}

#[derive(Deserialize)]
struct RawRecord {
    #[serde(default, deserialize_with = "id_from_any")]
    id: Option<String>,
    question: String,
    answer: String,
}

fn id_from_any<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(text)) => Some(text),
        Some(other) => Some(other.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
{"id": "a", "question": "What is Rust?", "answer": "A systems language."}

{"id": 7, "question": "What is Tokio?", "answer": "An async runtime."}
{"question": "What is sqlx?", "answer": "A database toolkit."}
"#;

    #[test]
    fn parses_jsonl_with_mixed_ids() {
        let dataset = Dataset::from_jsonl_str(SAMPLE).unwrap();
        let ids: Vec<&str> = dataset.records().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "7", "5"]);
        assert_eq!(dataset.len(), 3);
        assert_eq!(
            dataset.texts(TextField::Answer)[1],
            "An async runtime.".to_string()
        );
    }

    #[test]
    fn empty_dataset_is_invalid() {
        assert!(matches!(
            Dataset::from_jsonl_str("\n\n"),
            Err(PipelineError::InvalidInput(_))
        ));
    }

    #[test]
    fn duplicate_ids_are_invalid() {
        let err = Dataset::from_jsonl_str(
            "{\"id\": \"x\", \"question\": \"q1\", \"answer\": \"a1\"}\n{\"id\": \"x\", \"question\": \"q2\", \"answer\": \"a2\"}",
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate record id 'x'"));
    }

    #[test]
    fn malformed_line_reports_its_number() {
        let err = Dataset::from_jsonl_str("{\"question\": \"q\"}").unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[tokio::test]
    async fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qa.jsonl");
        tokio::fs::write(&path, SAMPLE).await.unwrap();

        let dataset = Dataset::from_jsonl(&path).await.unwrap();
        assert_eq!(dataset.texts(TextField::Question)[0], "What is Rust?");
    }
}
