pub mod client;
pub mod extractor;

pub use client::{ContentGenerator, Document, GeminiClient, GenerationRequest};
pub use extractor::{AttemptFailure, EventExtractor, Extraction, FailureReason};
