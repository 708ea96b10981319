//! Attribute extraction: project raw upstream records onto the fixed display
//! schemas by walking dotted key paths.
//!
//! Lookups are deliberately loose. A walk stops at the first key that is
//! missing *or* falsy (`null`, `false`, `0`, `""`, `[]`, `{}`), and the field
//! is then simply absent from the projection.

use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// A walk from the record root, one key per level.
pub type PathSpec = &'static [&'static str];

/// One output field and the alternative paths that may supply it.
/// The first path that resolves wins.
#[derive(Debug)]
pub struct FieldSpec {
    pub name: &'static str,
    pub paths: &'static [PathSpec],
}

/// An output schema: canonical field name → path alternatives.
pub type Schema = &'static [FieldSpec];

const fn field(name: &'static str, paths: &'static [PathSpec]) -> FieldSpec {
    FieldSpec { name, paths }
}

pub const ID_PATH: PathSpec = &["id_str"];
pub const REPOST_OF: PathSpec = &["retweeted_status"];
pub const QUOTE_OF: PathSpec = &["quoted_status"];
pub const USER: PathSpec = &["user"];

const HASHTAG_PATHS: &[PathSpec] = &[
    &["extended_tweet", "entities", "hashtags"],
    &["entities", "hashtags"],
];

/// Display-post schema (Twitter v1.1 tweet object).
/// `hashtags` and `reposts` are not path lookups and are filled in separately.
pub const POST_SCHEMA: Schema = &[
    field("id", &[&["id_str"]]),
    field("text", &[&["extended_tweet", "full_text"], &["full_text"], &["text"]]),
    field("retweeted_status_id", &[&["retweeted_status", "id_str"]]),
    field("quoted_status_id", &[&["quoted_status", "id_str"], &["quoted_status_id_str"]]),
    field("in_reply_to_status_id", &[&["in_reply_to_status_id_str"]]),
    field("in_reply_to_user_id", &[&["in_reply_to_user_id_str"]]),
    field("in_reply_to_screen_name", &[&["in_reply_to_screen_name"]]),
    field("favorite_count", &[&["favorite_count"]]),
    field("retweet_count", &[&["retweet_count"]]),
    field("quote_count", &[&["quote_count"]]),
    field("reply_count", &[&["reply_count"]]),
    field("created_at", &[&["created_at"]]),
    field("lang", &[&["lang"]]),
    field("user_id", &[&["user", "id_str"]]),
    field("user_screen_name", &[&["user", "screen_name"]]),
];

/// Display-user schema, applied to the embedded `user` object.
pub const USER_SCHEMA: Schema = &[
    field("id", &[&["id_str"]]),
    field("verified", &[&["verified"]]),
    field("followers_count", &[&["followers_count"]]),
    field("friends_count", &[&["friends_count"]]),
    field("statuses_count", &[&["statuses_count"]]),
    field("description", &[&["description"]]),
    field("location", &[&["location"]]),
    field("screen_name", &[&["screen_name"]]),
    field("name", &[&["name"]]),
    field("url", &[&["url"]]),
    field("created_at", &[&["created_at"]]),
    field("lang", &[&["lang"]]),
    field("time_zone", &[&["time_zone"]]),
    field("utc_offset", &[&["utc_offset"]]),
];

/// JSON truthiness as the extractor understands it.
pub fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Walk `path` from `record`. Returns `None` as soon as a key is missing or
/// its value is falsy; otherwise the leaf value, unchanged.
pub fn extract<'a>(path: &[&str], record: &'a Value) -> Option<&'a Value> {
    let mut cur = record;
    for key in path {
        cur = cur.get(*key).filter(|v| is_truthy(v))?;
    }
    Some(cur)
}

/// First alternative path that resolves.
pub fn extract_first<'a>(paths: &[PathSpec], record: &'a Value) -> Option<&'a Value> {
    paths.iter().find_map(|p| extract(p, record))
}

/// Convenience for string leaves (ids, handles).
pub fn extract_str<'a>(path: &[&str], record: &'a Value) -> Option<&'a str> {
    extract(path, record).and_then(Value::as_str)
}

/// Apply every field of `schema` to `record`. Fields whose lookup came back
/// absent are omitted, so the result is sparse.
pub fn extract_attributes(schema: Schema, record: &Value) -> Map<String, Value> {
    let mut out = Map::new();
    for spec in schema {
        if let Some(v) = extract_first(spec.paths, record) {
            out.insert(spec.name.to_string(), v.clone());
        }
    }
    out
}

/// Lowercased, de-duplicated hashtag texts. Sorted so output is stable.
pub fn extract_hashtags(record: &Value) -> Vec<String> {
    let Some(tags) = extract_first(HASHTAG_PATHS, record).and_then(Value::as_array) else {
        return Vec::new();
    };
    let set: BTreeSet<String> = tags
        .iter()
        .filter_map(|t| extract_str(&["text"], t))
        .map(str::to_lowercase)
        .collect();
    set.into_iter().collect()
}
