//! Language-model report generation: prompt, client, and the extraction
//! cascade that turns free text back into a [`crate::models::Report`].

pub mod extract;
pub mod generator;
pub mod llm;
pub mod prompt;

pub use extract::{extract_report, PARSE_FAILURE_SUMMARY};
pub use generator::{
    reconcile_summary, ReportGenerator, MODEL_UNAVAILABLE_SUMMARY, NO_DETECTIONS_SUMMARY,
};
pub use llm::{ChatCompletionClient, LanguageModel};
