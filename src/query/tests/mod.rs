pub mod cursor;
pub mod intervals;

use super::*;
use chrono::DateTime;

pub fn ms(rfc3339: &str) -> i64 {
    DateTime::parse_from_rfc3339(rfc3339)
        .unwrap()
        .timestamp_millis()
}
