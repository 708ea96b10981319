//! Recursive unfolding of one raw post into every display post and display
//! user reachable through its repost-of / quote-of embeddings.
//!
//! The walk uses an explicit stack plus a visited set instead of call-stack
//! recursion. Pre-order: the post itself, then its repost-of subtree, then its
//! quote-of subtree. The first occurrence of an id wins and is never
//! descended into twice, which also terminates self-referential input.
//! Pure per input: safe to run on any worker thread.

use crate::date::normalize_in_place;
use crate::error::RecordError;
use crate::model::{CanonicalPost, CanonicalUser};
use crate::schema::{
    extract, extract_attributes, extract_hashtags, extract_str, ID_PATH, POST_SCHEMA, QUOTE_OF,
    REPOST_OF, USER, USER_SCHEMA,
};
use ahash::AHashSet;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Everything one raw post unfolds into. Both lists hold unique ids, in
/// discovery order.
#[derive(Clone, Debug, Default)]
pub struct Unfolded {
    pub posts: Vec<CanonicalPost>,
    pub users: Vec<CanonicalUser>,
    /// Embedded posts not visited because they sat deeper than `max_depth`.
    pub truncated: usize,
    /// Projected fields omitted because their JSON type did not fit the record.
    pub fields_dropped: usize,
}

#[derive(Clone, Copy, Debug)]
pub struct Unfolder {
    max_depth: usize,
    rfc3339: bool,
}

impl Default for Unfolder {
    fn default() -> Self {
        Self { max_depth: DEFAULT_MAX_DEPTH, rfc3339: false }
    }
}

impl Unfolder {
    pub fn new(max_depth: usize, rfc3339: bool) -> Self {
        Self { max_depth, rfc3339 }
    }

    pub fn unfold(&self, raw: &Value) -> Result<Unfolded, RecordError> {
        if !raw.is_object() {
            return Err(RecordError::NotAnObject);
        }
        if extract_str(ID_PATH, raw).is_none() {
            return Err(RecordError::MissingId);
        }

        let mut out = Unfolded::default();
        let mut seen_posts: AHashSet<String> = AHashSet::new();
        let mut seen_users: AHashSet<String> = AHashSet::new();
        let mut stack: Vec<(&Value, usize)> = vec![(raw, 0)];

        while let Some((node, depth)) = stack.pop() {
            let Some(id) = extract_str(ID_PATH, node) else {
                tracing::warn!(depth, "embedded post without id_str; skipping it and its embeddings");
                continue;
            };
            if !seen_posts.insert(id.to_string()) {
                continue;
            }

            out.posts.push(self.project_post(node, id, &mut out.fields_dropped)?);
            if let Some(user) = self.project_user(node, &mut out.fields_dropped)? {
                if seen_users.insert(user.id.clone()) {
                    out.users.push(user);
                }
            }

            // Quote pushed first so the repost subtree is popped (visited) first.
            let children: Vec<&Value> = [QUOTE_OF, REPOST_OF]
                .iter()
                .filter_map(|p| extract(p, node))
                .filter(|v| v.is_object())
                .collect();
            if children.is_empty() {
                continue;
            }
            if depth >= self.max_depth {
                tracing::warn!(post_id = id, depth, "embedding chain exceeds max depth; not descending");
                out.truncated += children.len();
                continue;
            }
            for child in children {
                stack.push((child, depth + 1));
            }
        }

        Ok(out)
    }

    fn project_post(&self, node: &Value, id: &str, dropped: &mut usize) -> Result<CanonicalPost, RecordError> {
        let attrs = extract_attributes(POST_SCHEMA, node);
        let mut post: CanonicalPost = decode_lenient("post", id, attrs, dropped)?;
        post.hashtags = extract_hashtags(node);
        if self.rfc3339 {
            normalize_in_place(&mut post.created_at);
        }
        Ok(post)
    }

    /// `None` when the post carries no user object or the user has no id.
    fn project_user(&self, node: &Value, dropped: &mut usize) -> Result<Option<CanonicalUser>, RecordError> {
        let Some(raw_user) = extract(USER, node) else {
            return Ok(None);
        };
        let Some(id) = extract_str(ID_PATH, raw_user) else {
            return Ok(None);
        };
        let attrs = extract_attributes(USER_SCHEMA, raw_user);
        let mut user: CanonicalUser = decode_lenient("user", id, attrs, dropped)?;
        if self.rfc3339 {
            normalize_in_place(&mut user.created_at);
        }
        Ok(Some(user))
    }
}

/// Decode projected attributes into `T`. A field whose JSON type does not fit
/// (a string count, a fractional offset) is omitted and counted in `dropped`;
/// the rest of the record is kept.
fn decode_lenient<T: DeserializeOwned>(
    kind: &'static str,
    id: &str,
    attrs: Map<String, Value>,
    dropped: &mut usize,
) -> Result<T, RecordError> {
    let mut value = Value::Object(attrs);
    if let Ok(record) = T::deserialize(&value) {
        return Ok(record);
    }
    if let Value::Object(attrs) = &mut value {
        let fields: Vec<String> = attrs.keys().filter(|k| k.as_str() != "id").cloned().collect();
        for field in fields {
            let mut single = Map::new();
            single.insert("id".to_string(), Value::String(id.to_string()));
            if let Some(v) = attrs.get(&field) {
                single.insert(field.clone(), v.clone());
            }
            if let Err(err) = T::deserialize(&Value::Object(single)) {
                tracing::debug!(kind, id, field = %field, "omitting mistyped field: {err}");
                attrs.remove(&field);
                *dropped += 1;
            }
        }
    }
    T::deserialize(&value).map_err(|source| RecordError::Schema { kind, id: id.to_string(), source })
}

/// Unfold posts with default settings.
pub fn unfold_posts(raw: &Value) -> Result<Vec<CanonicalPost>, RecordError> {
    Unfolder::default().unfold(raw).map(|u| u.posts)
}

/// Unfold users with default settings.
pub fn unfold_users(raw: &Value) -> Result<Vec<CanonicalUser>, RecordError> {
    Unfolder::default().unfold(raw).map(|u| u.users)
}
