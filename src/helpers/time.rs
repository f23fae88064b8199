use chrono::{DateTime, Utc};
use tokio::time::Instant;

pub fn now_i64() -> i64 {
    Utc::now().timestamp()
}

pub fn now_utc() -> DateTime<Utc> {
    Utc::now()
}

pub fn get_instant() -> Instant {
    Instant::now()
}

/// `YYYY-MM-DD` of the given instant, used in attachment names.
pub fn date_stamp(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d").to_string()
}
