//! Dedup/merge engine: the run-wide post and user stores.
//!
//! `DisplayStore` is an owned value; nothing else mutates it. Each line's
//! unfolded posts are merged in one step:
//!  1. ids already stored, or reposts already folded/dropped, are discarded;
//!  2. remaining non-repost posts are inserted (first seen wins);
//!  3. each remaining repost is folded into its target's `reposts` list,
//!     looking the target up in the store (never the per-line batch). A
//!     missing target drops the repost with a warning.
//!
//! Reposts therefore never become top-level entries.

use crate::model::{CanonicalPost, CanonicalUser, Keyed, RepostAnnotation};
use crate::unfold::Unfolded;
use ahash::{AHashMap, AHashSet};
use serde::Serialize;

/// Insertion-ordered keyed store. Iteration order is insertion order, which is
/// what shard assignment relies on.
#[derive(Clone, Debug)]
pub struct OrderedStore<T> {
    items: Vec<T>,
    index: AHashMap<String, usize>,
}

impl<T> Default for OrderedStore<T> {
    fn default() -> Self {
        Self { items: Vec::new(), index: AHashMap::new() }
    }
}

impl<T: Keyed> OrderedStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(n: usize) -> Self {
        Self { items: Vec::with_capacity(n), index: AHashMap::with_capacity(n) }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.index.get(key).map(|&i| &self.items[i])
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut T> {
        let i = *self.index.get(key)?;
        self.items.get_mut(i)
    }

    /// Returns `false` (and drops `item`) if the key is already present.
    pub fn insert_if_absent(&mut self, item: T) -> bool {
        if self.index.contains_key(item.key()) {
            return false;
        }
        self.index.insert(item.key().to_string(), self.items.len());
        self.items.push(item);
        true
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items
    }
}

/// Running totals of merge decisions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MergeStats {
    pub posts_inserted: u64,
    pub posts_duplicate: u64,
    pub reposts_folded: u64,
    pub reposts_dangling: u64,
    pub users_inserted: u64,
    pub users_duplicate: u64,
    pub depth_truncations: u64,
    pub fields_dropped: u64,
}

/// What one `merge_posts` call did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub inserted: usize,
    pub duplicates: usize,
    pub folded: usize,
    pub dangling: usize,
}

#[derive(Debug, Default)]
pub struct DisplayStore {
    posts: OrderedStore<CanonicalPost>,
    users: OrderedStore<CanonicalUser>,
    /// Reposts that were folded or dropped; remembered so replaying a line is a no-op.
    settled_reposts: AHashSet<String>,
    stats: MergeStats,
}

impl DisplayStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn posts(&self) -> &OrderedStore<CanonicalPost> {
        &self.posts
    }

    pub fn users(&self) -> &OrderedStore<CanonicalUser> {
        &self.users
    }

    pub fn stats(&self) -> &MergeStats {
        &self.stats
    }

    /// Merge everything one raw line unfolded into.
    pub fn merge(&mut self, unfolded: Unfolded) -> MergeOutcome {
        self.stats.depth_truncations += unfolded.truncated as u64;
        self.stats.fields_dropped += unfolded.fields_dropped as u64;
        let outcome = self.merge_posts(unfolded.posts);
        self.merge_users(unfolded.users);
        outcome
    }

    pub fn merge_posts(&mut self, posts: Vec<CanonicalPost>) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();
        let mut reposts = Vec::new();

        for post in posts {
            if self.posts.contains(&post.id) || self.settled_reposts.contains(&post.id) {
                outcome.duplicates += 1;
                continue;
            }
            if post.is_repost() {
                reposts.push(post);
                continue;
            }
            if self.posts.insert_if_absent(post) {
                outcome.inserted += 1;
            } else {
                outcome.duplicates += 1;
            }
        }

        for repost in reposts {
            if self.fold(repost) {
                outcome.folded += 1;
            } else {
                outcome.dangling += 1;
            }
        }

        self.stats.posts_inserted += outcome.inserted as u64;
        self.stats.posts_duplicate += outcome.duplicates as u64;
        self.stats.reposts_folded += outcome.folded as u64;
        self.stats.reposts_dangling += outcome.dangling as u64;
        outcome
    }

    /// Returns `true` if the repost found its target.
    fn fold(&mut self, repost: CanonicalPost) -> bool {
        let Some(target_id) = repost.retweeted_status_id.as_deref() else {
            return false;
        };
        let annotation = RepostAnnotation::of_repost(&repost);
        let found = match self.posts.get_mut(target_id) {
            Some(target) => {
                target.reposts.get_or_insert_with(Vec::new).push(annotation);
                true
            }
            None => {
                tracing::warn!(
                    repost_id = %repost.id,
                    target_id,
                    "repost target not in store; dropping repost"
                );
                false
            }
        };
        self.settled_reposts.insert(repost.id);
        found
    }

    /// First seen wins; no field-level merge.
    pub fn merge_users(&mut self, users: Vec<CanonicalUser>) -> usize {
        let mut inserted = 0;
        for user in users {
            if self.users.insert_if_absent(user) {
                inserted += 1;
            } else {
                self.stats.users_duplicate += 1;
            }
        }
        self.stats.users_inserted += inserted as u64;
        inserted
    }

    /// Terminal drain: hand both stores over for writing.
    pub fn into_parts(self) -> (Vec<CanonicalPost>, Vec<CanonicalUser>, MergeStats) {
        (self.posts.into_vec(), self.users.into_vec(), self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unfold::Unfolder;
    use serde_json::{json, Value};

    fn tweet(id: &str, uid: &str, handle: &str, ts: &str) -> Value {
        json!({
            "id_str": id,
            "text": format!("text of {id}"),
            "created_at": ts,
            "user": {"id_str": uid, "screen_name": handle}
        })
    }

    fn merge_raw(store: &mut DisplayStore, raw: &Value) -> MergeOutcome {
        store.merge(Unfolder::default().unfold(raw).unwrap())
    }

    fn post_ids(store: &DisplayStore) -> Vec<&str> {
        store.posts().iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn repost_and_quote_scenario() {
        let a = tweet("A", "U1", "one", "t1");
        let mut b = tweet("B", "U2", "two", "t2");
        b["retweeted_status"] = a.clone();
        let mut c = tweet("C", "U3", "three", "t3");
        c["quoted_status"] = a.clone();

        let mut store = DisplayStore::new();
        merge_raw(&mut store, &a);
        let ob = merge_raw(&mut store, &b);
        assert_eq!(ob, MergeOutcome { inserted: 0, duplicates: 1, folded: 1, dangling: 0 });
        merge_raw(&mut store, &c);

        assert_eq!(post_ids(&store), vec!["A", "C"]);
        let reposts = store.posts().get("A").unwrap().reposts.clone().unwrap();
        assert_eq!(
            reposts,
            vec![RepostAnnotation {
                user_id: Some("U2".into()),
                user_screen_name: Some("two".into()),
                created_at: Some("t2".into()),
            }]
        );
        assert_eq!(store.posts().get("C").unwrap().quoted_status_id.as_deref(), Some("A"));
        let uids: Vec<&str> = store.users().iter().map(|u| u.id.as_str()).collect();
        assert_eq!(uids, vec!["U1", "U2", "U3"]);
    }

    #[test]
    fn repost_seen_before_original_still_folds() {
        let a = tweet("A", "U1", "one", "t1");
        let mut b = tweet("B", "U2", "two", "t2");
        b["retweeted_status"] = a.clone();

        let mut store = DisplayStore::new();
        let out = merge_raw(&mut store, &b);
        assert_eq!(out, MergeOutcome { inserted: 1, duplicates: 0, folded: 1, dangling: 0 });
        merge_raw(&mut store, &a);
        assert_eq!(post_ids(&store), vec!["A"]);
        assert_eq!(store.posts().get("A").unwrap().archived_repost_count(), 1);
    }

    #[test]
    fn replaying_a_line_is_a_no_op() {
        let a = tweet("A", "U1", "one", "t1");
        let mut b = tweet("B", "U2", "two", "t2");
        b["retweeted_status"] = a;

        let mut store = DisplayStore::new();
        merge_raw(&mut store, &b);
        let before_posts = store.posts().as_slice().to_vec();
        let before_users = store.users().as_slice().to_vec();

        let again = merge_raw(&mut store, &b);
        assert_eq!(again, MergeOutcome { inserted: 0, duplicates: 2, folded: 0, dangling: 0 });
        assert_eq!(store.posts().as_slice(), before_posts.as_slice());
        assert_eq!(store.users().as_slice(), before_users.as_slice());
    }

    #[test]
    fn dangling_repost_is_dropped_without_mutation() {
        let mut store = DisplayStore::new();
        merge_raw(&mut store, &tweet("X", "U1", "one", "t1"));
        // Hand-built repost whose target was never unfolded.
        let orphan = CanonicalPost {
            id: "R".into(),
            retweeted_status_id: Some("missing".into()),
            ..Default::default()
        };
        let out = store.merge_posts(vec![orphan]);
        assert_eq!(out.dangling, 1);
        assert_eq!(post_ids(&store), vec!["X"]);
        assert!(store.posts().get("X").unwrap().reposts.is_none());
        assert_eq!(store.stats().reposts_dangling, 1);
    }

    #[test]
    fn repost_of_repost_target_is_dangling() {
        // Z <- A (repost) <- B (repost of A): A folds into Z, B has nowhere to go.
        let z = tweet("Z", "U0", "zero", "t0");
        let mut a = tweet("A", "U1", "one", "t1");
        a["retweeted_status"] = z;
        let mut b = tweet("B", "U2", "two", "t2");
        b["retweeted_status"] = a;

        let mut store = DisplayStore::new();
        let out = merge_raw(&mut store, &b);
        assert_eq!(out.inserted, 1);
        assert_eq!(out.folded + out.dangling, 2);
        assert_eq!(post_ids(&store), vec!["Z"]);
        assert!(store.posts().get("A").is_none());
        assert!(store.posts().get("B").is_none());
    }

    #[test]
    fn users_first_seen_wins() {
        let mut store = DisplayStore::new();
        let mut first = tweet("1", "U1", "old_handle", "t1");
        first["user"]["location"] = json!("here");
        let second = tweet("2", "U1", "new_handle", "t2");
        merge_raw(&mut store, &first);
        merge_raw(&mut store, &second);
        assert_eq!(store.users().len(), 1);
        let u = store.users().get("U1").unwrap();
        assert_eq!(u.screen_name.as_deref(), Some("old_handle"));
        assert_eq!(u.location.as_deref(), Some("here"));
        assert_eq!(store.stats().users_duplicate, 1);
    }
}
