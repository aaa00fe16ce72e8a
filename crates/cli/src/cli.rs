use std::path::PathBuf;

use clap::{Parser, Subcommand};

use contentflow_core::{Capability, ContentKind, Limits, UserId};

/// Operator tool for a contentflow store snapshot.
///
/// Reads configuration from the environment (and `.env`), the same keys the
/// service uses. Every command prints its result as JSON on stdout.
#[derive(Parser, Debug)]
#[command(name = "contentflow", about = "Inspect and drive a contentflow store snapshot")]
pub struct Cli {
    /// JSON store snapshot to read (and, for `ingest`, write back)
    #[arg(long, global = true, env = "CONTENTFLOW_STORE", default_value = "data/store.json")]
    pub store: PathBuf,

    /// Back-end registry file; overrides BACKENDS_FILE
    #[arg(long, global = true)]
    pub backends: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List registered back-ends, optionally only those with every given capability
    Backends {
        #[arg(long = "capability", value_name = "CAPABILITY")]
        capabilities: Vec<Capability>,
    },

    /// Run a federated similarity search for a stored item
    Search {
        /// GUID of the item to find similar content for
        seed: String,

        #[arg(long, default_value = "photo")]
        kind: ContentKind,

        /// Search as this user; anonymous when omitted
        #[arg(long)]
        user: Option<UserId>,

        /// Only return content owned by these users
        #[arg(long = "user-filter", value_delimiter = ',')]
        user_filter: Vec<UserId>,

        /// Result window, e.g. 0-9
        #[arg(long)]
        limits: Option<Limits>,
    },

    /// Apply a back-end result envelope (JSON) to the snapshot
    Ingest {
        file: PathBuf,
    },

    /// Preview how many tasks a batch of `count` items splits into
    Partition {
        count: usize,

        /// Items per task; defaults to MAX_TASK_SIZE, below 1 disables splitting
        #[arg(long)]
        max: Option<i64>,
    },
}
