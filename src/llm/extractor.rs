use serde_json::Value;
use std::fmt;
use tracing::{debug, info};

use crate::domain::Event;
use crate::infra::Credentials;
use crate::llm::client::{ContentGenerator, Document, GenerationRequest};

/// Why a single (credential, model) attempt produced nothing usable.
#[derive(Debug, Clone, PartialEq)]
pub enum FailureReason {
    Request(String),
    EmptyResponse,
    InvalidJson(String),
    UnexpectedShape(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request(e) => write!(f, "request failed: {e}"),
            Self::EmptyResponse => write!(f, "empty response"),
            Self::InvalidJson(e) => write!(f, "invalid JSON: {e}"),
            Self::UnexpectedShape(e) => write!(f, "unexpected shape: {e}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttemptFailure {
    /// Position of the key in the credential list; keys themselves are never kept.
    pub credential_index: usize,
    pub model: String,
    pub reason: FailureReason,
}

/// Result of walking the (credential, model) grid.
///
/// `events` is `None` when every attempt failed.
#[derive(Debug, Default)]
pub struct Extraction {
    pub events: Option<Vec<Event>>,
    pub failures: Vec<AttemptFailure>,
}

pub struct EventExtractor<'a, G: ?Sized> {
    generator: &'a G,
    models: &'a [String],
}

impl<'a, G: ContentGenerator + ?Sized> EventExtractor<'a, G> {
    pub fn new(generator: &'a G, models: &'a [String]) -> Self {
        Self { generator, models }
    }

    /// Try every model for every credential, one call at a time, and stop at
    /// the first response that parses into an event list.
    pub async fn extract(&self, credentials: &Credentials, document: &Document, prompt: &str) -> Extraction {
        let mut failures = Vec::new();

        for (credential_index, api_key) in credentials.iter().enumerate() {
            for model in self.models {
                let request = GenerationRequest {
                    api_key,
                    model,
                    document,
                    prompt,
                };

                let outcome = match self.generator.generate(&request).await {
                    Ok(text) => parse_event_response(&text),
                    Err(e) => Err(FailureReason::Request(format!("{e:#}"))),
                };

                match outcome {
                    Ok(events) => {
                        info!(credential_index, model = %model, count = events.len(), "extracted events");
                        return Extraction {
                            events: Some(events),
                            failures,
                        };
                    }
                    Err(reason) => {
                        debug!(credential_index, model = %model, %reason, "extraction attempt failed");
                        failures.push(AttemptFailure {
                            credential_index,
                            model: model.clone(),
                            reason,
                        });
                    }
                }
            }
        }

        Extraction { events: None, failures }
    }
}

/// Drop Markdown code fences the model adds despite being told not to.
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "").trim().to_string()
}

/// Read model text as either a bare event array or `{"events": [...]}`.
pub fn parse_event_response(text: &str) -> Result<Vec<Event>, FailureReason> {
    if text.is_empty() {
        return Err(FailureReason::EmptyResponse);
    }

    let cleaned = strip_code_fences(text);
    let value: Value =
        serde_json::from_str(&cleaned).map_err(|e| FailureReason::InvalidJson(e.to_string()))?;

    let list = match value {
        Value::Array(items) => Value::Array(items),
        Value::Object(mut map) => match map.remove("events") {
            Some(events) => events,
            None => {
                return Err(FailureReason::UnexpectedShape(
                    "object without an \"events\" key".to_string(),
                ))
            }
        },
        other => {
            return Err(FailureReason::UnexpectedShape(format!(
                "top-level {}",
                json_kind(&other)
            )))
        }
    };

    serde_json::from_value(list).map_err(|e| FailureReason::UnexpectedShape(e.to_string()))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    const ONE_EVENT: &str = r#"[{"summary": "EXAM: Final", "start": {"date": "2030-05-01"}, "end": {"date": "2030-05-02"}}]"#;

    /// Replies from a script, in call order, and records who was asked.
    struct Scripted {
        replies: Mutex<Vec<Result<String, String>>>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<&str, &str>>) -> Self {
            let mut replies: Vec<_> = replies
                .into_iter()
                .map(|r| r.map(String::from).map_err(String::from))
                .collect();
            replies.reverse();
            Self {
                replies: Mutex::new(replies),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<(String, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ContentGenerator for Scripted {
        async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String> {
            self.calls
                .lock()
                .unwrap()
                .push((request.api_key.to_string(), request.model.to_string()));
            match self.replies.lock().unwrap().pop() {
                Some(Ok(text)) => Ok(text),
                Some(Err(e)) => Err(anyhow::anyhow!(e)),
                None => Err(anyhow::anyhow!("script exhausted")),
            }
        }
    }

    fn models() -> Vec<String> {
        vec!["m1".to_string(), "m2".to_string()]
    }

    fn keys() -> Credentials {
        Credentials::new(vec!["k1".to_string(), "k2".to_string()])
    }

    #[test]
    fn fenced_and_wrapped_responses_parse_like_bare_arrays() {
        let bare = parse_event_response(ONE_EVENT).unwrap();
        let fenced = parse_event_response(&format!("```json\n{ONE_EVENT}\n```\n")).unwrap();
        let wrapped = parse_event_response(&format!(r#"{{"events": {ONE_EVENT}}}"#)).unwrap();

        assert_eq!(bare.len(), 1);
        assert_eq!(fenced, bare);
        assert_eq!(wrapped, bare);
    }

    #[test]
    fn rejects_unusable_shapes() {
        assert_eq!(parse_event_response(""), Err(FailureReason::EmptyResponse));
        assert!(matches!(parse_event_response("Sure! Here"), Err(FailureReason::InvalidJson(_))));
        assert!(matches!(
            parse_event_response(r#"{"items": []}"#),
            Err(FailureReason::UnexpectedShape(_))
        ));
        assert!(matches!(parse_event_response("42"), Err(FailureReason::UnexpectedShape(_))));
        assert!(matches!(
            parse_event_response(r#"["EXAM: Final"]"#),
            Err(FailureReason::UnexpectedShape(_))
        ));
    }

    #[test]
    fn loosely_typed_fields_are_accepted() {
        let text = r#"[
            {"summary": "EXAM: Midterm", "colorId": 1, "start": {"date": "2030-03-01"}},
            {"summary": "LECTURE: Weekly", "recurrence": "RRULE:FREQ=WEEKLY", "start": {"date": "2030-01-10"}},
            {"summary": null, "location": null, "start": {"date": "2030-02-01"}}
        ]"#;

        let events = parse_event_response(text).unwrap();

        assert_eq!(events.len(), 3);
        assert_eq!(events[0].get("colorId"), Some(&serde_json::json!(1)));
        assert_eq!(events[1].summary(), Some("LECTURE: Weekly"));
        assert_eq!(events[2].summary(), None);
        assert_eq!(events[2].get("location"), Some(&Value::Null));
    }

    #[test]
    fn empty_array_is_a_success() {
        assert_eq!(parse_event_response("[]"), Ok(Vec::new()));
    }

    #[tokio::test]
    async fn walks_models_before_moving_to_next_key() {
        let generator = Scripted::new(vec![Err("quota"), Ok("not json"), Ok(""), Ok(ONE_EVENT)]);
        let models = models();
        let extractor = EventExtractor::new(&generator, &models);

        let extraction = extractor.extract(&keys(), &Document::pdf(Vec::new()), "prompt").await;

        assert_eq!(extraction.events.map(|e| e.len()), Some(1));
        assert_eq!(
            generator.calls(),
            vec![
                ("k1".to_string(), "m1".to_string()),
                ("k1".to_string(), "m2".to_string()),
                ("k2".to_string(), "m1".to_string()),
                ("k2".to_string(), "m2".to_string()),
            ]
        );
        let reasons: Vec<_> = extraction.failures.iter().map(|f| &f.reason).collect();
        assert!(matches!(reasons[0], FailureReason::Request(_)));
        assert!(matches!(reasons[1], FailureReason::InvalidJson(_)));
        assert_eq!(reasons[2], &FailureReason::EmptyResponse);
        assert_eq!(extraction.failures[2].credential_index, 1);
    }

    #[tokio::test]
    async fn stops_at_first_success() {
        let generator = Scripted::new(vec![Ok(ONE_EVENT)]);
        let models = models();
        let extraction = EventExtractor::new(&generator, &models)
            .extract(&keys(), &Document::pdf(Vec::new()), "prompt")
            .await;

        assert!(extraction.failures.is_empty());
        assert_eq!(generator.calls().len(), 1);
    }

    #[tokio::test]
    async fn exhaustion_is_not_an_error() {
        let generator = Scripted::new(vec![Err("boom"); 4]);
        let models = models();
        let extraction = EventExtractor::new(&generator, &models)
            .extract(&keys(), &Document::pdf(Vec::new()), "prompt")
            .await;

        assert!(extraction.events.is_none());
        assert_eq!(extraction.failures.len(), 4);
        assert_eq!(extraction.failures[3].model, "m2");
    }
}
