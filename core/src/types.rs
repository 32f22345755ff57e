//! Shared primitive types used across the entire toolkit.

/// Month offset relative to the install event. Negative = before install.
pub type EventMonth = i32;

/// Calendar month index. Equals the event month when every user installs
/// at calendar month 0.
pub type CalendarMonth = i32;

/// A stable, unique user identifier: `"{cohort}_{i}"`.
pub type UserId = String;

/// The canonical run identifier.
pub type RunId = String;

pub const COL_USER_ID: &str = "user_id";
pub const COL_GROUP: &str = "group";
pub const COL_EVENT_MONTH: &str = "event_month";
pub const COL_CALENDAR_MONTH: &str = "calendar_month";
pub const COL_POST: &str = "post";

/// Index columns every panel table carries, in file order.
/// Outcome and covariate names may never collide with these.
pub const INDEX_COLUMNS: [&str; 5] = [
    COL_USER_ID,
    COL_GROUP,
    COL_EVENT_MONTH,
    COL_CALENDAR_MONTH,
    COL_POST,
];
