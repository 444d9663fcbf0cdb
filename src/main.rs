//! CLI entry point for the bundle builder.

use anyhow::Result;
use clap::Parser;
use paperbundle::{
    BatchBuilder, BuildOptions, FetchClient, FetchPolicy, Manifest, MirrorResolver,
};
use tracing::{debug, info};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Determine log level based on verbose/quiet flags
    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");
    info!("Bundle build starting");

    let manifest = Manifest::load(&args.manifest)?;
    let enabled = manifest.enabled_articles().count();
    if enabled == 0 {
        info!(manifest = %args.manifest.display(), "No enabled articles in manifest");
        return Ok(());
    }
    info!(
        articles = manifest.articles.len(),
        enabled,
        "Manifest loaded"
    );

    let policy = FetchPolicy::with_retries(u32::from(args.max_retries));
    let client = FetchClient::new(policy);
    let resolver = MirrorResolver::with_default_mirrors(client.clone());

    let options = BuildOptions {
        force: args.force,
        pdf: args.pdf,
        concurrency: usize::from(args.concurrency),
    };

    let builder = BatchBuilder::new(resolver, client, options);
    let stats = builder.run(&manifest).await;

    info!(
        built = stats.built(),
        skipped = stats.skipped(),
        failed = stats.failed(),
        pdf_failed = stats.pdf_failed(),
        total = stats.total(),
        "Bundle build complete"
    );

    Ok(())
}
