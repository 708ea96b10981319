use anyhow::{bail, Result};
use disparch::{init_tracing_once, DisplayETL, DisplayOptions};
use std::path::PathBuf;

// Each input file gets its own store and output set, named after the file.
fn main() -> Result<()> {
    init_tracing_once();
    let inputs: Vec<PathBuf> = std::env::args_os().skip(1).map(PathBuf::from).collect();
    if inputs.is_empty() {
        bail!("usage: disparch <tweets.jsonl[.zst]>...  (DISPARCH_OUT, DISPARCH_SHARD_SIZE, RUST_LOG)");
    }

    let hw = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4);
    let opts = DisplayOptions::default().with_parallelism(hw).with_env_overrides();
    std::fs::create_dir_all(&opts.output_dir)?;

    for input in &inputs {
        let label = input.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        let summary = DisplayETL::from_options(opts.clone())
            .progress_label(label)
            .run(std::slice::from_ref(input))?;
        println!(
            "{}: {} posts in {} shards, {} users, {} lines skipped",
            summary.basename,
            summary.posts_written,
            summary.manifest.shard_files.len(),
            summary.users_written,
            summary.stats.lines_skipped
        );
    }
    Ok(())
}
