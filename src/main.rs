//! FollowGraph - social follow graph acquisition
//!
//! Main entry point for the followgraph CLI.

use clap::Parser;
use followgraph::config::FollowGraphConfig;
use followgraph::fetch::ListKind;
use followgraph::{Mid, Pipeline, PipelineOutput, StaticIdentity};
use std::fs;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

/// Build the follow graph of a user for visualization
#[derive(Parser, Debug)]
#[command(name = "followgraph")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: ~/.config/followgraph/config.yaml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Session cookie, overriding the config file
    #[arg(long, env = "FOLLOWGRAPH_COOKIE", hide_env_values = true)]
    cookie: Option<String>,

    /// Build the graph of this user instead of the session user
    #[arg(long)]
    vmid: Option<u64>,

    /// Walk the follower list instead of the following list
    #[arg(long)]
    followers: bool,

    /// Point every edge from followee to follower
    #[arg(long)]
    swap_direction: bool,

    /// Drop all cached responses before running
    #[arg(long)]
    clear_cache: bool,

    /// Write the graph JSON here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() {
    // Initialize logging
    if let Err(e) = followgraph::logging::init() {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> followgraph::Result<()> {
    let mut config = match cli.config {
        Some(ref path) => FollowGraphConfig::load(path)?,
        None => FollowGraphConfig::load_default()?,
    };

    if cli.cookie.is_some() {
        config.api.cookie = cli.cookie.clone();
    }
    if cli.swap_direction {
        config.graph.swap_link_direction = true;
    }

    let mut pipeline = Pipeline::from_config(config)?;

    if cli.clear_cache {
        pipeline.cache().clear()?;
        eprintln!("Cache cleared: {}", pipeline.cache().path().display());
    }

    if let Some(vmid) = cli.vmid {
        pipeline = pipeline.with_identity(Arc::new(StaticIdentity(Mid::new(vmid))));
    }

    let kind = if cli.followers {
        ListKind::Followers
    } else {
        ListKind::Followings
    };

    let runtime = tokio::runtime::Runtime::new()?;
    let output = runtime.block_on(pipeline.run(kind))?;

    let json = output.graph.to_json()?;
    match cli.output {
        Some(ref path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, json)?;
            eprintln!("Graph written to {}", path.display());
        }
        None => println!("{}", json),
    }

    print_summary(&output);
    Ok(())
}

fn print_summary(output: &PipelineOutput) {
    let stats = &output.graph.stats;
    eprintln!();
    eprintln!("User {} ({})", output.owner, output.kind);
    eprintln!(
        "  Listed:         {} of {} reported",
        output.follow_list.len(),
        output.reported_total
    );
    if !output.skipped_pages.is_empty() {
        eprintln!("  Skipped pages:  {:?}", output.skipped_pages);
    }
    eprintln!("  Nodes:          {}", stats.total_nodes);
    eprintln!("  Connected:      {}", stats.connected_nodes);
    eprintln!(
        "  Edges:          {} ({} bidirectional)",
        stats.edge_count, stats.bidirectional_edge_count
    );
    eprintln!(
        "  Requests:       {} ({} retries, {} failed)",
        output.client_stats.requests, output.client_stats.retries, output.client_stats.failures
    );
}
