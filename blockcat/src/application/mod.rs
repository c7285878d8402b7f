pub mod handlers;

use crate::presentation::cli::{Cli, Commands};
use blockcat_core::error::Result;
use clap::Parser;

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let store = cli.store;
    match cli.command {
        Commands::Init => handlers::handle_init(&store),
        Commands::Import { file } => handlers::handle_import(&store, &file),
        Commands::Link { url, category } => handlers::handle_link(&store, &url, category),
        Commands::Status {
            url,
            network,
            status,
        } => handlers::handle_status(&store, &url, &network, &status),
        Commands::Top => handlers::handle_top(&store),
        Commands::Children { node } => handlers::handle_children(&store, &node),
        Commands::Parent { node } => handlers::handle_parent(&store, &node),
        Commands::Trail { node } => handlers::handle_trail(&store, &node),
        Commands::Counts { node } => handlers::handle_counts(&store, &node),
        Commands::Show { id } => handlers::handle_show(&store, id),
        Commands::Sites { id } => handlers::handle_sites(&store, id),
        Commands::Blocks { id } => handlers::handle_blocks(&store, id),
    }
}
