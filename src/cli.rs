//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use avatar_downloader_core::config::DEFAULT_CONFIG_FILE;

/// Download avatar renders from Mii, Roblox and GTA Online services.
///
/// Every image is fingerprinted before it is written, so repeated runs only
/// add files whose content changed.
#[derive(Parser, Debug)]
#[command(name = "avatar-downloader")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output and progress bars
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CONFIG_FILE, global = true)]
    pub config: PathBuf,

    /// Write into mii/, roblox/ and gta_online/ under this folder
    #[arg(long, value_name = "DIR", global = true)]
    pub output_root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Args {
    /// Returns the selected service, defaulting to all of them.
    #[must_use]
    pub fn command(&self) -> Command {
        self.command.unwrap_or(Command::All)
    }
}

/// Services to download from.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Download Mii renders
    Mii,
    /// Download Roblox avatars and outfits
    Roblox,
    /// Download GTA Online portraits
    Gta,
    /// Download from every service (default)
    All,
}

impl Command {
    /// Returns `true` if the Mii downloader should run.
    #[must_use]
    pub fn includes_mii(self) -> bool {
        matches!(self, Self::Mii | Self::All)
    }

    /// Returns `true` if the Roblox downloader should run.
    #[must_use]
    pub fn includes_roblox(self) -> bool {
        matches!(self, Self::Roblox | Self::All)
    }

    /// Returns `true` if the GTA Online downloader should run.
    #[must_use]
    pub fn includes_gta(self) -> bool {
        matches!(self, Self::Gta | Self::All)
    }
}
