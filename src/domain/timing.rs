use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, Offset, SecondsFormat, TimeZone, Utc};
use chrono_tz::Tz;
use serde_json::Value;
use tracing::{debug, warn};

use super::events::{Event, Fields, TimeFields};

const NAIVE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// The user's IANA timezone, resolved once. Unknown names fall back to UTC.
#[derive(Debug, Clone, PartialEq)]
pub struct UserTimezone {
    tz: Tz,
}

impl UserTimezone {
    pub fn resolve(name: &str) -> Self {
        match name.trim().parse::<Tz>() {
            Ok(tz) => Self { tz },
            Err(_) => {
                warn!(timezone = name, "unknown timezone, falling back to UTC");
                Self { tz: Tz::UTC }
            }
        }
    }

    pub fn tz(&self) -> Tz {
        self.tz
    }

    pub fn name(&self) -> &'static str {
        self.tz.name()
    }

    pub fn now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.tz)
    }

    /// Attach this zone to a wall-clock time.
    ///
    /// Ambiguous times resolve to the earlier instant. Times inside a DST gap
    /// keep their wall-clock value with the offset in force after the gap.
    pub fn localize(&self, naive: &NaiveDateTime) -> DateTime<FixedOffset> {
        if let Some(dt) = self.tz.from_local_datetime(naive).earliest() {
            return dt.fixed_offset();
        }
        let before = self
            .tz
            .from_local_datetime(&(*naive - Duration::hours(1)))
            .earliest()
            .map(|dt| dt.offset().fix())
            .unwrap_or_else(|| self.tz.offset_from_utc_datetime(naive).fix());
        let after = self.tz.offset_from_utc_datetime(&(*naive - before)).fix();
        DateTime::from_naive_utc_and_offset(*naive - after, after)
    }
}

impl Default for UserTimezone {
    fn default() -> Self {
        Self { tz: Tz::UTC }
    }
}

/// True when a `dateTime` string already names its zone: a trailing `Z`, or
/// a `+HH:MM`/`-HH:MM` style offset in the last six characters.
pub fn has_explicit_zone(value: &str) -> bool {
    if value.ends_with('Z') {
        return true;
    }
    let tail: Vec<char> = value.chars().rev().take(6).collect();
    if tail.contains(&'+') {
        return true;
    }
    // tail is reversed, so the sixth-from-last character is its final element
    tail.contains(&'-') && tail.len() == 6 && tail[5] != 'T'
}

/// Rewrite naive `dateTime` values in place so every timed event carries zone
/// information. All-day sides are left alone.
pub fn apply_timezone(events: &mut [Event], zone: &UserTimezone) {
    for event in events.iter_mut() {
        for key in ["start", "end"] {
            if let Some(side) = event.side_mut(key) {
                normalize_side(side, zone);
            }
        }
    }
}

/// Non-string `dateTime` values are left as they are.
fn normalize_side(side: &mut Fields, zone: &UserTimezone) {
    if side.contains_key("date") {
        return;
    }
    let Some(raw) = side.date_time() else {
        return;
    };
    if has_explicit_zone(raw) {
        return;
    }

    match NaiveDateTime::parse_from_str(raw, NAIVE_FORMAT) {
        Ok(naive) => {
            let aware = zone.localize(&naive).to_rfc3339_opts(SecondsFormat::AutoSi, false);
            side.insert("dateTime".to_string(), Value::String(aware));
            side.insert("timeZone".to_string(), Value::String(zone.name().to_string()));
        }
        Err(e) => {
            debug!(value = raw, error = %e, "unparseable dateTime, treating as UTC");
            let marked = format!("{raw}Z");
            side.insert("dateTime".to_string(), Value::String(marked));
        }
    }
}

/// Keep events starting at or after `now`. Unparseable starts are kept.
pub fn filter_past_events(events: Vec<Event>, zone: &UserTimezone, now: DateTime<Tz>) -> Vec<Event> {
    let today = now.date_naive();
    let before = events.len();

    let kept: Vec<Event> = events
        .into_iter()
        .filter(|event| match event.start() {
            Some(start) => starts_on_or_after(start, zone, &now, today),
            None => true,
        })
        .collect();

    debug!(before, after = kept.len(), "filtered past events");
    kept
}

fn starts_on_or_after(start: &Fields, zone: &UserTimezone, now: &DateTime<Tz>, today: NaiveDate) -> bool {
    if start.contains_key("date") {
        return match start.date().map(|d| NaiveDate::parse_from_str(d, DATE_FORMAT)) {
            Some(Ok(date)) => date >= today,
            _ => true,
        };
    }
    if let Some(date_time) = start.date_time() {
        return match parse_event_instant(date_time, zone) {
            Some(instant) => instant >= *now,
            None => true,
        };
    }
    true
}

/// Parse an ISO-8601-like timestamp. Naive values are placed in `zone`.
pub fn parse_event_instant(value: &str, zone: &UserTimezone) -> Option<DateTime<FixedOffset>> {
    let value = match value.strip_suffix('Z') {
        Some(stripped) => format!("{stripped}+00:00"),
        None => value.to_string(),
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(&value) {
        return Some(dt);
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%dT%H:%M%z", "%Y-%m-%d %H:%M:%S%.f%:z"] {
        if let Ok(dt) = DateTime::parse_from_str(&value, format) {
            return Some(dt);
        }
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&value, format) {
            return Some(zone.localize(&naive));
        }
    }
    NaiveDate::parse_from_str(&value, DATE_FORMAT)
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| zone.localize(&naive))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EventTime;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn timed(start: &str, end: &str) -> Event {
        Event::new("LECTURE: Week 1")
            .with_start(EventTime::timed(start))
            .with_end(EventTime::timed(end))
    }

    fn all_day(date: &str) -> Event {
        Event::new("ASSIGNMENT: Essay").with_start(EventTime::all_day(date))
    }

    fn at(zone: &UserTimezone, value: &str) -> DateTime<Tz> {
        let naive = NaiveDateTime::parse_from_str(value, NAIVE_FORMAT).unwrap();
        zone.tz().from_local_datetime(&naive).single().unwrap()
    }

    #[test]
    fn unknown_timezone_falls_back_to_utc() {
        assert_eq!(UserTimezone::resolve("Mars/Olympus_Mons").name(), "UTC");
        assert_eq!(UserTimezone::resolve("Europe/Berlin").name(), "Europe/Berlin");
    }

    #[test]
    fn detects_explicit_zones() {
        assert!(has_explicit_zone("2030-01-10T09:00:00Z"));
        assert!(has_explicit_zone("2030-01-10T09:00:00+02:00"));
        assert!(has_explicit_zone("2030-01-10T09:00:00-05:00"));
        assert!(!has_explicit_zone("2030-01-10T09:00:00"));
        assert!(!has_explicit_zone("2030-01-10T09:00"));
    }

    #[test]
    fn naive_times_gain_offset_and_zone_name() {
        let zone = UserTimezone::resolve("America/New_York");
        let mut events = vec![timed("2025-01-10T09:00:00", "2025-07-10T10:30:00")];

        apply_timezone(&mut events, &zone);

        let start = events[0].start().unwrap();
        let end = events[0].end().unwrap();
        assert_eq!(start.date_time(), Some("2025-01-10T09:00:00-05:00"));
        assert_eq!(start.time_zone(), Some("America/New_York"));
        assert_eq!(end.date_time(), Some("2025-07-10T10:30:00-04:00"));
    }

    #[test]
    fn normalization_is_idempotent() {
        let zone = UserTimezone::resolve("Asia/Kolkata");
        let mut events = vec![timed("2030-02-01T14:00:00", "not a time")];

        apply_timezone(&mut events, &zone);
        let once = events.clone();
        apply_timezone(&mut events, &zone);

        assert_eq!(events, once);
        assert_eq!(events[0].end().unwrap().date_time(), Some("not a timeZ"));
    }

    #[test]
    fn zoned_and_all_day_values_are_untouched() {
        let zone = UserTimezone::resolve("America/Chicago");
        let mut events = vec![
            timed("2030-01-10T09:00:00Z", "2030-01-10T10:00:00+01:00"),
            all_day("2030-01-10"),
        ];
        let expected = events.clone();

        apply_timezone(&mut events, &zone);
        assert_eq!(events, expected);
    }

    #[test]
    fn filters_all_day_events_before_today() {
        let zone = UserTimezone::default();
        let now = at(&zone, "2025-06-01T12:00:00");
        let events = vec![all_day("2025-05-31"), all_day("2025-06-01"), all_day("2025-06-02")];

        let kept: Vec<_> = filter_past_events(events, &zone, now)
            .into_iter()
            .map(|e| e.start().unwrap().date().unwrap().to_string())
            .collect();
        assert_eq!(kept, vec!["2025-06-01", "2025-06-02"]);
    }

    #[test]
    fn past_timed_event_is_dropped_after_normalization() {
        let zone = UserTimezone::resolve("America/New_York");
        let now = at(&zone, "2025-06-01T00:00:00");
        let mut events = vec![timed("2025-01-10T09:00:00", "2025-01-10T10:00:00")];

        apply_timezone(&mut events, &zone);
        assert_eq!(
            events[0].start().unwrap().date_time(),
            Some("2025-01-10T09:00:00-05:00")
        );
        assert!(filter_past_events(events, &zone, now).is_empty());
    }

    #[test]
    fn utc_marker_is_compared_as_an_instant() {
        let zone = UserTimezone::resolve("Europe/Paris");
        let now = at(&zone, "2025-06-01T12:00:00");
        // 10:30Z is 12:30 in Paris
        let events = vec![timed("2025-06-01T10:30:00Z", "2025-06-01T11:00:00Z")];

        assert_eq!(filter_past_events(events, &zone, now).len(), 1);
    }

    #[test]
    fn unparseable_or_missing_starts_are_kept() {
        let zone = UserTimezone::default();
        let now = at(&zone, "2025-06-01T12:00:00");
        let events = vec![
            all_day("June 3rd"),
            timed("sometime next week", "later"),
            Event::new("QUIZ: Pop quiz"),
        ];

        assert_eq!(filter_past_events(events, &zone, now).len(), 3);
    }

    #[test]
    fn parses_common_iso_variants() {
        let zone = UserTimezone::resolve("UTC");
        for value in [
            "2030-01-10T09:00:00+0100",
            "2030-01-10T09:00:00.250",
            "2030-01-10T09:00",
            "2030-01-10 09:00:00",
            "2030-01-10",
        ] {
            assert!(parse_event_instant(value, &zone).is_some(), "{value}");
        }
        assert!(parse_event_instant("10/01/2030", &zone).is_none());
    }

    #[test]
    fn dst_gap_keeps_wall_clock_with_offset_after_the_gap() {
        for (name, value, offset) in [
            ("America/New_York", "2030-03-10T02:30:00", -4 * 3600),
            ("Europe/Berlin", "2030-03-31T02:30:00", 2 * 3600),
        ] {
            let zone = UserTimezone::resolve(name);
            let naive = NaiveDateTime::parse_from_str(value, NAIVE_FORMAT).unwrap();

            let localized = zone.localize(&naive);
            assert_eq!(localized.naive_local(), naive, "{name}");
            assert_eq!(localized.offset().local_minus_utc(), offset, "{name}");
        }
    }

    #[test]
    fn dst_gap_is_written_with_offset_after_the_gap() {
        let mut events = vec![timed("2030-03-31T02:30:00", "2030-03-31T03:30:00")];
        apply_timezone(&mut events, &UserTimezone::resolve("Europe/Berlin"));
        assert_eq!(events[0].start().unwrap().date_time(), Some("2030-03-31T02:30:00+02:00"));

        let mut events = vec![timed("2030-03-10T02:30:00", "2030-03-10T03:30:00")];
        apply_timezone(&mut events, &UserTimezone::resolve("America/New_York"));
        assert_eq!(events[0].start().unwrap().date_time(), Some("2030-03-10T02:30:00-04:00"));
    }

    #[test]
    fn ambiguous_fall_back_time_takes_earlier_instant() {
        let zone = UserTimezone::resolve("America/New_York");
        let naive = NaiveDateTime::parse_from_str("2030-11-03T01:30:00", NAIVE_FORMAT).unwrap();
        assert_eq!(zone.localize(&naive).offset().local_minus_utc(), -4 * 3600);
    }

    #[test]
    fn odd_value_types_are_left_alone_and_kept() {
        let zone = UserTimezone::resolve("America/New_York");
        let now = at(&zone, "2025-06-01T00:00:00");
        let raw = json!([
            {"summary": "EXAM: Numeric", "start": {"dateTime": 1700000000}},
            {"summary": "EXAM: Bare start", "start": "2020-01-01"},
            {"summary": "EXAM: Null date", "start": {"date": null}}
        ]);
        let mut events: Vec<Event> = serde_json::from_value(raw.clone()).unwrap();

        apply_timezone(&mut events, &zone);
        let kept = filter_past_events(events, &zone, now);

        assert_eq!(serde_json::to_value(&kept).unwrap(), raw);
    }
}
