//! User-facing strings and the extraction prompt.
//!
//! Everything the model is told lives here so the output contract can be
//! reviewed in one place.

// CLI Messages
pub const MSG_CONFIG_CREATED: &str = "✓ Configuration created at";
pub const MSG_CONFIG_EXISTS: &str = "Configuration already exists at";
pub const MSG_HEALTH_CHECK: &str = "🏥 Checking syllabus-events health...";
pub const MSG_CONFIG_OK: &str = "✓ Configuration loaded";
pub const MSG_CONFIG_ERROR: &str = "Config error";
pub const MSG_CREDENTIALS_OK: &str = "✓ API credentials resolved";
pub const MSG_CREDENTIALS_ERROR: &str = "No usable API credentials";
pub const MSG_MODELS_HEADER: &str = "\nModels (in priority order):";
pub const MSG_ALL_SYSTEMS_OK: &str = "\n✅ Ready to extract events";
pub const MSG_ISSUES_DETECTED: &str = "\n⚠️ Some issues detected";
pub const MSG_NO_EVENTS: &str = "No upcoming events found";
pub const MSG_ALL_ATTEMPTS_FAILED: &str = "Every credential/model attempt failed:";

// Configuration File Content
pub const DEFAULT_CONFIG_CONTENT: &str = r#"# syllabus-events configuration

# Tried in order for every API key.
models:
  - gemini-2.5-flash
  - gemini-2.5-flash-lite
  - gemini-2.5-pro
  - gemini-3-flash-preview
  - gemini-3-pro-preview

# dotenv files holding API keys; the first file that exists is used.
# credential_files:
#   - /etc/secrets/api.env

# Remote fallback (AWS Secrets Manager) when no credential file is found.
secret:
  name: GEMINI_API_KEYS
  region: us-east-1

timezone: UTC
color_id: "1"
request_timeout_secs: 120
"#;

pub const ALL_CATEGORIES: &str = "All academic events";

/// Build the extraction instruction sent alongside the document.
///
/// An empty category list behaves like no filter at all.
pub fn extraction_prompt(color_id: &str, categories: Option<&[String]>) -> String {
    let categories = match categories {
        Some(list) if !list.is_empty() => list.join(", "),
        _ => ALL_CATEGORIES.to_string(),
    };

    format!(
        r#"Analyze the provided syllabus content.
Do NOT output events such as: "The duration of [COURSE] is from [DATE] to [DATE]".

Output ONLY a JSON array of Google Calendar event objects (no prose, no markdown). Each object must match this structure and use valid JSON:
{{
    "summary": "Title of the event",
    "description": "Optional details or context",
    "location": "Venue or room" (omit this key if unknown),
    "colorId": "{color_id}",
    "start": {{
        "dateTime": "YYYY-MM-DDTHH:MM:SS" (timed) OR "date": "YYYY-MM-DD" (all-day)
    }},
    "end": {{
        "dateTime": "YYYY-MM-DDTHH:MM:SS" OR "date": "YYYY-MM-DD"
    }},
    "recurrence": [
    ],
    "reminders": {{
        "useDefault": false,
        "overrides": []
    }}
}}

Rules:
1. For all-day events, set end.date to the day AFTER the event day.
2. Infer the correct year (current or upcoming) if not explicitly present.
3. Output ONLY the raw JSON array (no backticks, no preamble, no trailing text).
4. Keep the "reminders" object exactly as shown for every event.
5. Naming pattern:
    + Assignment → "ASSIGNMENT: [EVENTNAME]"
    + Exam/midterm → "EXAM: [EVENTNAME]"
    + Quiz → "QUIZ: [EVENTNAME]"
    + Project → "PROJECT DEADLINE: [EVENTNAME]"
    + Lecture/class → "LECTURE: [EVENTNAME]"
6. Recurrence:
    + If not recurring, omit the recurrence key entirely.
    + If recurring, include one RRULE string, e.g., "RRULE:FREQ=WEEKLY;UNTIL=YYYYMMDD".
    + Find the course end date in the syllabus (last lecture, finals week, or explicit end-of-course date) and use it for UNTIL in YYYYMMDD.
    + If no end date is found, omit recurrence entirely.
7. Ignore ALL office hours.
8. Only include events in these categories: {categories}.
"#
    )
}
