pub mod analyzer;
pub mod cli;
pub mod domain;
pub mod error;
pub mod infra;
pub mod llm;
pub mod prompts;

pub use analyzer::{AnalyzerOptions, SyllabusAnalyzer};
pub use domain::{Event, EventTime};
pub use error::AnalyzerError;
