//! CLI entry point for the avatar downloader.

use anyhow::{Context, Result};
use avatar_downloader_core::progress::service_bar;
use avatar_downloader_core::{
    Config, DownloadSummary, GtaDownloader, MiiDownloader, RobloxDownloader,
};
use clap::Parser;
use tracing::{debug, info};

mod cli;

use cli::Args;

/// Picks the default log level.
///
/// Priority: quiet flag > verbose flag > config `debug` > info. `RUST_LOG`
/// overrides all of these when set.
fn default_level(args: &Args, config_debug: bool) -> &'static str {
    if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 if config_debug => "debug",
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    let mut config = Config::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    if let Some(root) = &args.output_root {
        config = config.with_output_root(root);
    }

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level(&args, config.debug)));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");
    let command = args.command();
    info!(?command, "Avatar downloader starting");

    let client = config.http.build_client()?;
    let mut summary = DownloadSummary::new();

    if command.includes_mii() {
        let bar = service_bar("Downloading Mii images", 0, args.quiet);
        summary.merge(MiiDownloader::new(&client, &config.mii).run(&bar).await?);
        bar.finish();
    }
    if command.includes_roblox() {
        let bar = service_bar("Downloading Roblox avatars", 0, args.quiet);
        summary.merge(RobloxDownloader::new(&client, &config.roblox).run(&bar).await?);
        bar.finish();
    }
    if command.includes_gta() {
        let bar = service_bar("Downloading GTA Online avatars", 0, args.quiet);
        summary.merge(GtaDownloader::new(&client, &config.gta).run(&bar).await?);
        bar.finish();
    }

    info!(
        saved = summary.saved(),
        skipped = summary.skipped(),
        failed = summary.failed(),
        total = summary.total(),
        "Download complete"
    );

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_level_priority() {
        let quiet = Args::try_parse_from(["avatar-downloader", "-q", "-v"]).unwrap();
        assert_eq!(default_level(&quiet, true), "error");

        let verbose = Args::try_parse_from(["avatar-downloader", "-vv"]).unwrap();
        assert_eq!(default_level(&verbose, false), "trace");

        let plain = Args::try_parse_from(["avatar-downloader"]).unwrap();
        assert_eq!(default_level(&plain, true), "debug");
        assert_eq!(default_level(&plain, false), "info");
    }
}
