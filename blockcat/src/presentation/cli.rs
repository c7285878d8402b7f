use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about = "blockcat: browse the blocked-URL category taxonomy", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub store: StoreArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Clone, Debug, Default)]
pub struct StoreArgs {
    /// TOML config file (store backend, database path, anomaly policy)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Category database; overrides the config file
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Load the whole database into memory before answering
    #[arg(long, global = true)]
    pub snapshot: bool,

    /// Fail parent lookups on colliding prefixes instead of warning
    #[arg(long, global = true)]
    pub strict: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the schema in an empty database
    Init,

    /// Import category rows from a tab-separated file
    /// (id, display name, "A > B > C" path, blocked url count, block count)
    Import { file: PathBuf },

    /// Attach a URL to a leaf category
    Link { url: String, category: i64 },

    /// Record the latest status of a URL on one network
    Status {
        url: String,
        network: String,
        /// ok, blocked, timeout, error or dnsfail
        status: String,
    },

    /// List top-level categories
    Top,

    /// List immediate children of a category
    Children {
        /// "News > Politics", or "id:<n>" for a row id
        node: String,
    },

    /// Print the parent id of a category (0 for top level)
    Parent {
        /// "News > Politics", or "id:<n>" for a row id
        node: String,
    },

    /// Print the breadcrumb trail down to a category
    Trail {
        /// "News > Politics", or "id:<n>" for a row id
        node: String,
    },

    /// Subtree totals for a category
    Counts {
        /// "News > Politics", or "id:<n>" for a row id
        node: String,
    },

    /// Show one category row
    Show { id: i64 },

    /// URLs attached to one leaf category
    Sites { id: i64 },

    /// Blocked URLs of one leaf category with the number of blocking networks
    Blocks { id: i64 },
}
