use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::OffsetDateTime;

/// Parse the upstream `created_at` form, e.g. `Wed Aug 27 13:08:45 +0000 2008`.
pub fn parse_upstream_timestamp(s: &str) -> Option<OffsetDateTime> {
    let fmt = format_description!(
        "[weekday repr:short] [month repr:short] [day] [hour]:[minute]:[second] [offset_hour sign:mandatory][offset_minute] [year]"
    );
    OffsetDateTime::parse(s.trim(), &fmt).ok()
}

/// RFC 3339 rendering of an upstream timestamp, or `None` if it does not parse.
pub fn to_rfc3339(s: &str) -> Option<String> {
    parse_upstream_timestamp(s).and_then(|dt| dt.format(&Rfc3339).ok())
}

/// Rewrite `slot` in place when it holds a parsable upstream timestamp.
/// Unparsable values are left as they are.
pub fn normalize_in_place(slot: &mut Option<String>) {
    if let Some(converted) = slot.as_deref().and_then(to_rfc3339) {
        *slot = Some(converted);
    }
}
