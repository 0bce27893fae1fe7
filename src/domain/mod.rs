pub mod events;
pub mod timing;

pub use events::{Event, EventTime, Fields, TimeFields};
pub use timing::{apply_timezone, filter_past_events, UserTimezone};
