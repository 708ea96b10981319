#![allow(dead_code)]

use serde_json::{json, Value};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// A minimal upstream tweet object by user `uid` / `handle`.
pub fn tweet(id: &str, uid: &str, handle: &str, created_at: &str) -> Value {
    json!({
        "created_at": created_at,
        "id": id.parse::<u64>().unwrap_or(0),
        "id_str": id,
        "text": format!("tweet {id} by @{handle}"),
        "truncated": false,
        "entities": {"hashtags": [], "urls": [], "user_mentions": []},
        "in_reply_to_status_id": null,
        "in_reply_to_status_id_str": null,
        "retweet_count": 0,
        "favorite_count": 0,
        "lang": "en",
        "user": {
            "id": uid.parse::<u64>().unwrap_or(0),
            "id_str": uid,
            "name": format!("{handle} display"),
            "screen_name": handle,
            "location": "",
            "description": format!("bio of {handle}"),
            "verified": false,
            "followers_count": 10,
            "friends_count": 5,
            "statuses_count": 100,
            "created_at": "Mon Aug 14 09:30:00 +0000 2017",
            "utc_offset": null,
            "time_zone": null
        }
    })
}

pub fn with_hashtags(mut t: Value, tags: &[&str]) -> Value {
    t["entities"]["hashtags"] = Value::Array(tags.iter().map(|s| json!({"text": s, "indices": [0, 1]})).collect());
    t
}

pub fn retweet_of(mut t: Value, original: Value) -> Value {
    t["retweeted_status"] = original;
    t
}

pub fn quote_of(mut t: Value, original: Value) -> Value {
    t["quoted_status_id_str"] = original["id_str"].clone();
    t["is_quote_status"] = json!(true);
    t["quoted_status"] = original;
    t
}

/// The three-line scenario: A by U1; B by U2 reposting A; C by U3 quoting A.
pub fn scenario_lines() -> Vec<String> {
    let a = tweet("100", "1", "one", "Mon Aug 14 10:00:00 +0000 2017");
    let b = retweet_of(tweet("200", "2", "two", "Mon Aug 14 11:00:00 +0000 2017"), a.clone());
    let c = quote_of(tweet("300", "3", "three", "Mon Aug 14 12:00:00 +0000 2017"), a.clone());
    vec![a.to_string(), b.to_string(), c.to_string()]
}

pub fn write_jsonl(path: &Path, lines: &[String]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut f = File::create(path).unwrap();
    for l in lines {
        writeln!(&mut f, "{}", l).unwrap();
    }
}

/// Write a compressed `.zst` file containing the provided JSONL lines.
pub fn write_zst_lines(path: &Path, lines: &[String]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let f = File::create(path).unwrap();
    let mut enc = zstd::stream::write::Encoder::new(f, 3).unwrap();
    for l in lines {
        writeln!(&mut enc, "{}", l).unwrap();
    }
    enc.finish().unwrap();
}

pub fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

/// Sorted file names under `dir`.
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut v: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    v.sort();
    v
}

pub fn out_dir(tmp: &tempfile::TempDir) -> PathBuf {
    tmp.path().join("output")
}
