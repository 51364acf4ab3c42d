//! Time-related utilities

use chrono::{SecondsFormat, Utc};

/// Current UTC time formatted as RFC 3339 with second precision
pub fn rfc3339_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
