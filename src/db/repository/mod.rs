//! Repository layer — entity-scoped database operations.
//!
//! Free functions over `&rusqlite::Connection`, one sub-module per entity.
//! All public functions are re-exported here.

mod actor;
mod alert;
mod patient;
mod vital;

pub use actor::*;
pub use alert::*;
pub use patient::*;
pub use vital::*;

use chrono::NaiveDateTime;

use super::sqlite::TIMESTAMP_FORMAT;

pub(crate) fn fmt_ts(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub(crate) fn parse_ts(s: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
}

pub(crate) fn conversion_err(
    idx: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn timestamp_round_trip_keeps_millis() {
        let ts = NaiveDate::from_ymd_opt(2026, 3, 14)
            .unwrap()
            .and_hms_milli_opt(9, 26, 53, 589)
            .unwrap();
        let parsed = parse_ts(&fmt_ts(&ts)).unwrap();
        assert_eq!(parsed, ts);
    }
}
