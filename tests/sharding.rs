#[path = "common/mod.rs"]
mod common;

use common::*;
use disparch::{write_shards, CanonicalPost, DisplayETL, ShardConfig};
use serde_json::json;
use std::fs;

fn posts(ids: &[&str]) -> Vec<CanonicalPost> {
    ids.iter()
        .map(|id| CanonicalPost {
            id: id.to_string(),
            text: format!("text {id}"),
            user_screen_name: "someone".into(),
            ..Default::default()
        })
        .collect()
}

fn cfg(dir: &std::path::Path) -> ShardConfig {
    ShardConfig {
        out_dir: dir.to_path_buf(),
        basename: "t".into(),
        shard_size: 2,
        write_buffer_bytes: 64 * 1024,
        pretty: false,
    }
}

/// Shard limit 2 over [A,B,C,D,E] → [A,B], [C,D], [E], with a matching id index.
#[test]
fn five_posts_limit_two() {
    let tmp = tempfile::tempdir().unwrap();
    let manifest = write_shards(&posts(&["A", "B", "C", "D", "E"]), &cfg(tmp.path())).unwrap();

    let names: Vec<String> = manifest
        .shard_files
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["disp_tw_t-000.json", "disp_tw_t-001.json", "disp_tw_t-002.json"]);

    let members: Vec<Vec<String>> = manifest
        .shard_files
        .iter()
        .map(|p| read_json(p).as_object().unwrap().keys().cloned().collect())
        .collect();
    assert_eq!(members, vec![vec!["A", "B"], vec!["C", "D"], vec!["E"]]);

    assert_eq!(
        read_json(&manifest.id_index_path),
        json!({
            "A": "disp_tw_t-000.json", "B": "disp_tw_t-000.json",
            "C": "disp_tw_t-001.json", "D": "disp_tw_t-001.json",
            "E": "disp_tw_t-002.json"
        })
    );
    assert_eq!(manifest.id_index.len(), 5);
}

/// Re-running on the same store and limit yields byte-identical files.
#[test]
fn sharding_is_reproducible() {
    let tmp = tempfile::tempdir().unwrap();
    let store = posts(&["9", "3", "7", "1", "5", "2"]);
    let first = write_shards(&store, &cfg(&tmp.path().join("one"))).unwrap();
    let second = write_shards(&store, &cfg(&tmp.path().join("two"))).unwrap();
    assert_eq!(first.id_index, second.id_index);
    for (a, b) in first.shard_files.iter().zip(&second.shard_files) {
        assert_eq!(fs::read(a).unwrap(), fs::read(b).unwrap());
    }
    assert_eq!(
        fs::read(&first.id_index_path).unwrap(),
        fs::read(&second.id_index_path).unwrap()
    );
    // Store order, not id order, drives membership.
    let shard0 = read_json(&first.shard_files[0]);
    assert!(shard0.get("9").is_some() && shard0.get("3").is_some());
}

/// An empty store writes no shards but still writes an (empty) index and user file.
#[test]
fn empty_input_writes_empty_index() {
    let tmp = tempfile::tempdir().unwrap();
    let input = tmp.path().join("empty.jsonl");
    write_jsonl(&input, &[]);
    let summary = DisplayETL::new().output_dir(out_dir(&tmp)).progress(false).run(&[&input]).unwrap();
    assert!(summary.manifest.shard_files.is_empty());
    assert_eq!(read_json(&summary.manifest.id_index_path), json!({}));
    assert_eq!(read_json(&summary.users_path), json!({}));
}

/// Pretty output is still the same JSON.
#[test]
fn pretty_output_parses_identically() {
    let tmp = tempfile::tempdir().unwrap();
    let input = tmp.path().join("s.jsonl");
    write_jsonl(&input, &scenario_lines());
    let compact = DisplayETL::new().output_dir(tmp.path().join("c")).progress(false).run(&[&input]).unwrap();
    let pretty = DisplayETL::new().output_dir(tmp.path().join("p")).pretty_output(true).progress(false).run(&[&input]).unwrap();
    assert_eq!(read_json(&compact.manifest.shard_files[0]), read_json(&pretty.manifest.shard_files[0]));
    assert_ne!(
        fs::read(&compact.manifest.shard_files[0]).unwrap(),
        fs::read(&pretty.manifest.shard_files[0]).unwrap()
    );
}

/// A shard that cannot be written fails the run; shards already promoted stay
/// on disk and no id index is written for the incomplete set.
#[test]
fn failed_shard_write_is_fatal_and_keeps_earlier_shards() {
    let tmp = tempfile::tempdir().unwrap();
    fs::create_dir(tmp.path().join("disp_tw_t-001.json")).unwrap();

    let result = write_shards(&posts(&["A", "B", "C"]), &cfg(tmp.path()));
    assert!(result.is_err());
    assert!(tmp.path().join("disp_tw_t-000.json").is_file());
    assert!(!tmp.path().join("disp_twids_t.json").exists());
    assert_eq!(read_json(&tmp.path().join("disp_tw_t-000.json")).as_object().unwrap().len(), 2);
}
