//! Question-answering over a JSONL dataset: ingest embeds and stores the
//! records, `answer` embeds a query and returns the closest stored answer.

mod dataset;
mod service;

pub use dataset::{Dataset, QaRecord, TextField};
pub use service::{Answer, IngestSummary, QaService, NO_ANSWER};
