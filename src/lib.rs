mod config;
mod date;
mod error;
mod model;
mod schema;
mod unfold;
mod dedupe;
mod shard;

mod ndjson;
mod progress;
mod mem;
mod util;
mod pipeline;
mod index_feed;

pub use crate::config::DisplayOptions;
pub use crate::error::RecordError;
pub use crate::model::{CanonicalPost, CanonicalUser, Keyed, RepostAnnotation};
pub use crate::pipeline::{decode_line, DisplayETL, Ingest, RunSummary};

// attribute extraction over raw upstream records
pub use crate::schema::{
    extract, extract_attributes, extract_first, extract_hashtags, is_truthy, FieldSpec, PathSpec, Schema,
    POST_SCHEMA, USER_SCHEMA,
};

// recursive unfolding and the merge engine
pub use crate::unfold::{unfold_posts, unfold_users, Unfolded, Unfolder, DEFAULT_MAX_DEPTH};
pub use crate::dedupe::{DisplayStore, MergeOutcome, MergeStats, OrderedStore};

// shard output and the indexer-facing read side
pub use crate::shard::{
    id_index_file_name, plan_shards, shard_file_name, users_file_name, write_shards, write_users, ShardConfig,
    ShardManifest,
};
pub use crate::index_feed::{collect_index_documents, discover_shards, write_index_documents, IndexDocument};

// diagnostics
pub use crate::progress::{ProgressScope, RunStats};
pub use crate::mem::{available_memory_fraction, headroom, Headroom};
pub use crate::date::to_rfc3339;
pub use crate::util::init_tracing_once;
pub use crate::ndjson::{NdjsonReader, NdjsonWriter};
