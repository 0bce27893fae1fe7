use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

pub type Fields = Map<String, Value>;

/// A Google Calendar event as emitted by the model.
///
/// The object is kept exactly as received. Any JSON object is accepted, so a
/// numeric `colorId` or a `null` summary never costs the rest of the list;
/// the accessors below read the keys the pipeline cares about.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Event {
    fields: Fields,
}

/// One side of an event's span: `date` for all-day, `dateTime` for timed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventTime {
    fields: Fields,
}

/// Typed reads over the `start`/`end` objects of an event.
pub trait TimeFields {
    fn date(&self) -> Option<&str>;
    fn date_time(&self) -> Option<&str>;
    fn time_zone(&self) -> Option<&str>;
}

impl TimeFields for Fields {
    fn date(&self) -> Option<&str> {
        self.get("date").and_then(Value::as_str)
    }

    fn date_time(&self) -> Option<&str> {
        self.get("dateTime").and_then(Value::as_str)
    }

    fn time_zone(&self) -> Option<&str> {
        self.get("timeZone").and_then(Value::as_str)
    }
}

impl Event {
    pub fn new(summary: impl Into<String>) -> Self {
        let mut fields = Fields::new();
        fields.insert("summary".to_string(), Value::String(summary.into()));
        fields.insert(
            "reminders".to_string(),
            json!({"useDefault": false, "overrides": []}),
        );
        Self { fields }
    }

    pub fn with_start(mut self, start: EventTime) -> Self {
        self.fields.insert("start".to_string(), Value::Object(start.fields));
        self
    }

    pub fn with_end(mut self, end: EventTime) -> Self {
        self.fields.insert("end".to_string(), Value::Object(end.fields));
        self
    }

    pub fn with_color(mut self, color_id: impl Into<String>) -> Self {
        self.fields.insert("colorId".to_string(), Value::String(color_id.into()));
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn summary(&self) -> Option<&str> {
        self.get("summary").and_then(Value::as_str)
    }

    /// `None` when the key is missing or not an object.
    pub fn start(&self) -> Option<&Fields> {
        self.get("start").and_then(Value::as_object)
    }

    pub fn end(&self) -> Option<&Fields> {
        self.get("end").and_then(Value::as_object)
    }

    pub(crate) fn side_mut(&mut self, key: &str) -> Option<&mut Fields> {
        self.fields.get_mut(key).and_then(Value::as_object_mut)
    }

    pub fn is_all_day(&self) -> bool {
        self.start().is_some_and(|s| s.contains_key("date"))
    }
}

impl EventTime {
    pub fn all_day(date: impl Into<String>) -> Self {
        let mut fields = Fields::new();
        fields.insert("date".to_string(), Value::String(date.into()));
        Self { fields }
    }

    pub fn timed(date_time: impl Into<String>) -> Self {
        let mut fields = Fields::new();
        fields.insert("dateTime".to_string(), Value::String(date_time.into()));
        Self { fields }
    }
}
