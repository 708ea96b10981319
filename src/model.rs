//! Display records. Every optional field is either present or absent; absent
//! fields are skipped on output rather than written as `null`.
//!
//! `text`, `user_screen_name` and `hashtags` are always written because the
//! search-index builder reads them unconditionally.

use serde::{Deserialize, Serialize};

/// Anything stored under a string identity.
pub trait Keyed {
    fn key(&self) -> &str;
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CanonicalPost {
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retweeted_status_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quoted_status_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to_status_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to_user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to_screen_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favorite_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retweet_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub user_screen_name: String,
    #[serde(default)]
    pub hashtags: Vec<String>,
    /// Reposts folded into this post, in discovery order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reposts: Option<Vec<RepostAnnotation>>,
}

impl CanonicalPost {
    pub fn is_repost(&self) -> bool {
        self.retweeted_status_id.is_some()
    }

    /// Repost count as observed in this archive (not the upstream counter).
    pub fn archived_repost_count(&self) -> usize {
        self.reposts.as_ref().map_or(0, Vec::len)
    }
}

impl Keyed for CanonicalPost {
    fn key(&self) -> &str {
        &self.id
    }
}

/// Who reposted, under which handle, and when. Written as a 3-element array
/// `[user_id, screen_name, created_at]`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "AnnotationTuple", from = "AnnotationTuple")]
pub struct RepostAnnotation {
    pub user_id: Option<String>,
    pub user_screen_name: Option<String>,
    pub created_at: Option<String>,
}

type AnnotationTuple = (Option<String>, Option<String>, Option<String>);

impl From<RepostAnnotation> for AnnotationTuple {
    fn from(a: RepostAnnotation) -> Self {
        (a.user_id, a.user_screen_name, a.created_at)
    }
}

impl From<AnnotationTuple> for RepostAnnotation {
    fn from((user_id, user_screen_name, created_at): AnnotationTuple) -> Self {
        Self { user_id, user_screen_name, created_at }
    }
}

impl RepostAnnotation {
    /// Annotation describing `repost` itself (its author and its timestamp).
    pub fn of_repost(repost: &CanonicalPost) -> Self {
        let handle = if repost.user_screen_name.is_empty() {
            None
        } else {
            Some(repost.user_screen_name.clone())
        };
        Self {
            user_id: repost.user_id.clone(),
            user_screen_name: handle,
            created_at: repost.created_at.clone(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CanonicalUser {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub followers_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friends_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statuses_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utc_offset: Option<i64>,
}

impl Keyed for CanonicalUser {
    fn key(&self) -> &str {
        &self.id
    }
}
