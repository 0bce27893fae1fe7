use chrono::DateTime;
use chrono_tz::Tz;
use std::path::Path;
use tracing::{info, warn};

use crate::domain::{apply_timezone, filter_past_events, Event, UserTimezone};
use crate::error::{AnalyzerError, AnalyzerResult};
use crate::infra::Credentials;
use crate::llm::{AttemptFailure, ContentGenerator, Document, EventExtractor};
use crate::prompts::extraction_prompt;

#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerOptions {
    /// Only these categories are requested from the model; `None` means all.
    pub categories: Option<Vec<String>>,
    pub color_id: String,
    /// IANA name; unknown names fall back to UTC.
    pub user_timezone: String,
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        Self {
            categories: None,
            color_id: "1".to_string(),
            user_timezone: "UTC".to_string(),
        }
    }
}

impl AnalyzerOptions {
    pub fn prompt(&self) -> String {
        extraction_prompt(&self.color_id, self.categories.as_deref())
    }
}

/// Upcoming events extracted from one syllabus.
///
/// All the work happens in [`SyllabusAnalyzer::load_file`]; the result is
/// read-only afterwards.
#[derive(Debug)]
pub struct SyllabusAnalyzer {
    options: AnalyzerOptions,
    timezone: UserTimezone,
    events: Vec<Event>,
    failures: Vec<AttemptFailure>,
    exhausted: bool,
}

impl SyllabusAnalyzer {
    pub async fn load_file<G>(
        file: impl AsRef<Path>,
        options: AnalyzerOptions,
        credentials: &Credentials,
        models: &[String],
        generator: &G,
    ) -> AnalyzerResult<Self>
    where
        G: ContentGenerator + ?Sized,
    {
        if credentials.is_empty() {
            return Err(AnalyzerError::NoCredentials { searched: Vec::new() });
        }

        let file = file.as_ref();
        let bytes = tokio::fs::read(file).await.map_err(|source| AnalyzerError::Io {
            path: file.to_path_buf(),
            source,
        })?;
        info!(file = %file.display(), bytes = bytes.len(), "analyzing syllabus");

        let document = Document::pdf(bytes);
        let prompt = options.prompt();
        let extraction = EventExtractor::new(generator, models)
            .extract(credentials, &document, &prompt)
            .await;

        let timezone = UserTimezone::resolve(&options.user_timezone);
        let exhausted = extraction.events.is_none();
        let events = match extraction.events {
            Some(events) => prepare_events(events, &timezone, timezone.now()),
            None => {
                warn!(attempts = extraction.failures.len(), "all extraction attempts failed");
                Vec::new()
            }
        };

        Ok(Self {
            options,
            timezone,
            events,
            failures: extraction.failures,
            exhausted,
        })
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Attempts that failed before the successful one, or all of them.
    pub fn failures(&self) -> &[AttemptFailure] {
        &self.failures
    }

    /// True when no attempt produced an event list.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn timezone(&self) -> &UserTimezone {
        &self.timezone
    }

    pub fn options(&self) -> &AnalyzerOptions {
        &self.options
    }
}

/// Localize naive times, then drop everything that started before `now`.
pub fn prepare_events(mut events: Vec<Event>, timezone: &UserTimezone, now: DateTime<Tz>) -> Vec<Event> {
    apply_timezone(&mut events, timezone);
    filter_past_events(events, timezone, now)
}
