//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use paperbundle::build::DEFAULT_CONCURRENCY;
use paperbundle::config::DEFAULT_MANIFEST_PATH;
use paperbundle::fetch::DEFAULT_RETRIES;

/// Build self-contained local article bundles from rendered papers.
///
/// Reads the article manifest, fetches each enabled article's rendered
/// page, localizes its figures, and writes a bundle the reader can serve
/// without touching the network again.
#[derive(Parser, Debug)]
#[command(name = "paperbundle")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Path to the article manifest
    #[arg(short, long, default_value = DEFAULT_MANIFEST_PATH)]
    pub manifest: PathBuf,

    /// Rebuild articles whose bundle already exists
    #[arg(short, long)]
    pub force: bool,

    /// Also compile fixed-layout (PDF) output for articles with sources
    #[arg(short, long)]
    pub pdf: bool,

    /// Maximum concurrent article builds (1-32)
    #[arg(short = 'c', long, default_value_t = DEFAULT_CONCURRENCY as u8, value_parser = clap::value_parser!(u8).range(1..=32))]
    pub concurrency: u8,

    /// Maximum retry attempts for transient fetch failures (0-10)
    #[arg(short = 'r', long, default_value_t = DEFAULT_RETRIES as u8, value_parser = clap::value_parser!(u8).range(0..=10))]
    pub max_retries: u8,
}
