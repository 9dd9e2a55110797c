//! Shared utility functions

/// Current wall-clock time as milliseconds since the Unix epoch.
///
/// All persisted timestamps (created/updated/token expiry) use this format.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// The current calendar year (UTC), used as the upper bound for
/// elevation-year validation.
pub fn current_year() -> i32 {
    use chrono::Datelike;
    chrono::Utc::now().year()
}
