//! ID and timestamp utilities (visitor ULIDs, claim timestamps).

use time::{format_description::FormatItem, macros::format_description, OffsetDateTime};
use ulid::Ulid;

const CLAIM_TIMESTAMP: &[FormatItem<'static>] = format_description!(
    "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
);

/// Generate an opaque visitor id. Lowercased so it is stable in URLs.
pub fn new_visitor_id() -> String {
    Ulid::new().to_string().to_lowercase()
}

/// Current UTC time as an ISO-8601 string with millisecond precision,
/// e.g. `2024-12-24T18:00:00.000Z`.
pub fn now_timestamp() -> String {
    format_timestamp(OffsetDateTime::now_utc())
}

pub fn format_timestamp(at: OffsetDateTime) -> String {
    at.format(CLAIM_TIMESTAMP).unwrap_or_else(|_| {
        at.format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default()
    })
}
