//! Command-line entry point for the site mirror.

use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sitemirror::{AcceptAll, CrawlContext, Manager, SiteConfig};

/// Mirror a whole site into a browsable local directory tree.
#[derive(Parser)]
#[command(name = "sitemirror")]
#[command(about = "Recursive whole-site mirror with offline-ready link rewriting")]
#[command(version)]
struct Cli {
    /// Root URL of the site to mirror
    #[arg(short = 'u', long, default_value = "http://www.daorenjia.com/")]
    url: String,
}

/// Log to stdout and to `log.log`, which is truncated on every run.
fn init_logging() -> anyhow::Result<()> {
    let file = Arc::new(std::fs::File::create("log.log")?);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sitemirror=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(move || Arc::clone(&file)),
        )
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging()?;

    let config = SiteConfig::for_url(&cli.url)?;
    let ctx = Arc::new(CrawlContext::new(config, Arc::new(AcceptAll))?);
    let stats = Manager::new(ctx).run().await?;

    info!(
        "mirror complete: {} links crawled, {} failed",
        stats.links_seen,
        stats.failed.len()
    );
    Ok(())
}
