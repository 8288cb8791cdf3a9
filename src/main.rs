use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;

use qa_pipeline::core::config::AppPaths;
use qa_pipeline::core::logging;
use qa_pipeline::qa::Dataset;
use qa_pipeline::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let paths = Arc::new(AppPaths::new().context("Failed to prepare data directories")?);
    logging::init(&paths);

    let state = AppState::initialize(paths).await?;

    let mut args = env::args().skip(1);
    let dataset_path = args
        .next()
        .map(PathBuf::from)
        .or_else(|| state.settings.dataset.path.clone())
        .context("No dataset given: pass a JSONL path or set DATASET_PATH")?;
    let questions: Vec<String> = args.collect();
    let dataset_path = state.paths.resolve(&dataset_path);

    let dataset = Dataset::from_jsonl(&dataset_path)
        .await
        .with_context(|| format!("Failed to load dataset {}", dataset_path.display()))?;
    tracing::info!(records = dataset.len(), path = %dataset_path.display(), "Dataset loaded");

    let summary = state.qa.ingest(&dataset).await.context("Ingestion failed")?;
    match &summary.report {
        Some(report) => println!("{}", report),
        None => println!("Dataset already stored; skipped embedding"),
    }

    for question in questions {
        match state.qa.answer(&question).await {
            Ok(answer) => {
                println!("Q: {}", question);
                println!("A: {}", answer.answer);
                for similar in answer.similar_questions.iter().skip(1) {
                    println!("   ~ {}", similar);
                }
            }
            Err(err) => tracing::error!("Failed to answer '{}': {}", question, err),
        }
    }

    Ok(())
}
