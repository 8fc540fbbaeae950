//! Run configuration loaded from a TOML file.
//!
//! Every setting has a default, so an absent file or a file that only sets
//! a few keys is valid. The loaded [`Config`] is passed explicitly to the
//! HTTP client and to every service downloader.
//!
//! ```toml
//! debug = false
//!
//! [http]
//! timeout_secs = 10
//!
//! [mii]
//! download_folder = "mii"
//! save_rotating_gifs = true
//!
//! [[mii.subjects]]
//! name = "Alex"
//! hd = true
//! source = { kind = "studio_code", mii_code = "000f1629..." }
//!
//! [roblox]
//! users = [{ username = "builderman" }, { user_id = 156 }]
//!
//! [gta]
//! character_names = ["Alex1331xela"]
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::download::{
    DEFAULT_MAX_RATE_LIMIT_RETRIES, DEFAULT_RATE_LIMIT_FALLBACK, FetchError, HttpClient,
    REQUEST_TIMEOUT_SECS, RateLimitPolicy,
};
use crate::services::mii::{MiiExpression, MiiPose, MiiShading};

/// Config file looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "avatar-downloader.toml";

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file exists but could not be read.
    #[error("failed to read config file '{path}': {source}")]
    Read {
        /// Path of the config file.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for [`Config`].
    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        /// Path of the config file.
        path: PathBuf,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// A value is outside its accepted range.
    #[error("invalid config value for `{field}`: {message}")]
    Invalid {
        /// Dotted key of the offending value.
        field: String,
        /// What was wrong with it.
        message: String,
    },
}

impl ConfigError {
    fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Complete run configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Emit debug-level logs (per-URL "Loading", skip reasons).
    pub debug: bool,
    /// HTTP client settings.
    pub http: HttpConfig,
    /// Mii downloader settings.
    pub mii: MiiConfig,
    /// Roblox downloader settings.
    pub roblox: RobloxConfig,
    /// GTA Online downloader settings.
    pub gta: GtaConfig,
}

/// HTTP client settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpConfig {
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Retries allowed after HTTP 429 before giving up.
    pub max_rate_limit_retries: u32,
    /// Wait used when `Retry-After` is missing or unparseable.
    pub rate_limit_fallback_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: REQUEST_TIMEOUT_SECS,
            max_rate_limit_retries: DEFAULT_MAX_RATE_LIMIT_RETRIES,
            rate_limit_fallback_secs: DEFAULT_RATE_LIMIT_FALLBACK.as_secs(),
        }
    }
}

impl HttpConfig {
    /// Returns the rate-limit policy these settings describe.
    #[must_use]
    pub fn rate_limit_policy(&self) -> RateLimitPolicy {
        RateLimitPolicy::new(
            self.max_rate_limit_retries,
            Duration::from_secs(self.rate_limit_fallback_secs),
        )
    }

    /// Builds an [`HttpClient`] with these settings.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::ClientBuild`] if the client cannot be built.
    pub fn build_client(&self) -> Result<HttpClient, FetchError> {
        Ok(HttpClient::new_with_timeout(self.timeout_secs)?.with_policy(self.rate_limit_policy()))
    }
}

/// How a Mii is identified upstream.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind")]
pub enum MiiSubject {
    /// A Mii stored on a Nintendo Account.
    #[serde(rename = "account_id")]
    ByAccountId {
        /// `{account}/{mii}` identifier used by the account CDN.
        mii_id: String,
    },
    /// A Mii exported from Mii Studio.
    #[serde(rename = "studio_code")]
    ByStudioCode {
        /// Hex-encoded Mii data.
        mii_code: String,
    },
    /// A Mii attached to a Nintendo Network ID.
    #[serde(rename = "network_username")]
    ByNetworkUsername {
        /// Nintendo Network ID username.
        nnid: String,
    },
}

/// One Mii to download.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MiiEntry {
    /// Display name, used for the output folder and file names.
    pub name: String,
    /// Upstream identifier.
    pub source: MiiSubject,
    /// Also render through the HD renderer when HD images are enabled.
    #[serde(default)]
    pub hd: bool,
}

/// Mii downloader settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MiiConfig {
    /// Root folder; each Mii gets a subfolder named after it.
    pub download_folder: PathBuf,
    /// Render HD images for entries marked `hd`.
    pub save_hd_images: bool,
    /// Save a looping GIF assembled from the 16-frame rotation.
    pub save_rotating_gifs: bool,
    /// Save the raw 16-frame rotation sheet.
    pub save_rotating_frames: bool,
    /// Poses to render.
    pub poses: Vec<MiiPose>,
    /// Expressions to render.
    pub expressions: Vec<MiiExpression>,
    /// Shadings used for HD renders.
    pub shadings: Vec<MiiShading>,
    /// Miis to download.
    pub subjects: Vec<MiiEntry>,
}

impl Default for MiiConfig {
    fn default() -> Self {
        Self {
            download_folder: PathBuf::from("mii"),
            save_hd_images: false,
            save_rotating_gifs: false,
            save_rotating_frames: false,
            poses: MiiPose::ALL.to_vec(),
            expressions: MiiExpression::ALL.to_vec(),
            shadings: MiiShading::ALL.to_vec(),
            subjects: Vec::new(),
        }
    }
}

/// A Roblox account, identified by name, id or both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RobloxUser {
    /// Account name.
    pub username: Option<String>,
    /// Numeric account id.
    pub user_id: Option<u64>,
}

/// Roblox downloader settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RobloxConfig {
    /// Folder for avatar renders; outfits go to an `outfits` subfolder.
    pub download_folder: PathBuf,
    /// Also download thumbnails of every currently worn asset.
    pub save_outfit_images: bool,
    /// Accounts to download.
    pub users: Vec<RobloxUser>,
    /// Thumbnail state checks before giving up on a pending render.
    pub pending_poll_attempts: u32,
    /// Wait between pending-render checks.
    pub pending_poll_interval_secs: u64,
}

impl Default for RobloxConfig {
    fn default() -> Self {
        Self {
            download_folder: PathBuf::from("roblox"),
            save_outfit_images: false,
            users: Vec::new(),
            pending_poll_attempts: 10,
            pending_poll_interval_secs: 5,
        }
    }
}

impl RobloxConfig {
    /// Returns the wait between pending-render checks.
    #[must_use]
    pub fn pending_poll_interval(&self) -> Duration {
        Duration::from_secs(self.pending_poll_interval_secs)
    }
}

/// GTA Online downloader settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GtaConfig {
    /// Output folder.
    pub download_folder: PathBuf,
    /// Social Club character names.
    pub character_names: Vec<String>,
}

impl Default for GtaConfig {
    fn default() -> Self {
        Self {
            download_folder: PathBuf::from("gta_online"),
            character_names: Vec::new(),
        }
    }
}

impl Config {
    /// Loads configuration from `path`, falling back to defaults when the
    /// file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed, or a
    /// value fails validation.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!(path = %path.display(), "no config file found, using defaults");
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Parses configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed input and
    /// [`ConfigError::Invalid`] for out-of-range values.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values against the ranges the downloaders support.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=3600).contains(&self.http.timeout_secs) {
            return Err(ConfigError::invalid(
                "http.timeout_secs",
                format!("{} (expected 1..=3600)", self.http.timeout_secs),
            ));
        }
        if self.http.max_rate_limit_retries > 100 {
            return Err(ConfigError::invalid(
                "http.max_rate_limit_retries",
                format!("{} (expected 0..=100)", self.http.max_rate_limit_retries),
            ));
        }
        if self.roblox.pending_poll_attempts == 0 {
            return Err(ConfigError::invalid(
                "roblox.pending_poll_attempts",
                "must be at least 1",
            ));
        }
        for (index, entry) in self.mii.subjects.iter().enumerate() {
            if entry.name.trim().is_empty() {
                return Err(ConfigError::invalid(
                    format!("mii.subjects[{index}].name"),
                    "must not be empty",
                ));
            }
        }
        for (index, user) in self.roblox.users.iter().enumerate() {
            if user.username.is_none() && user.user_id.is_none() {
                return Err(ConfigError::invalid(
                    format!("roblox.users[{index}]"),
                    "needs a username or a user_id",
                ));
            }
        }
        for (index, name) in self.gta.character_names.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(ConfigError::invalid(
                    format!("gta.character_names[{index}]"),
                    "must not be empty",
                ));
            }
        }
        Ok(())
    }

    /// Places every service folder under `root` (`mii`, `roblox`, `gta_online`).
    #[must_use]
    pub fn with_output_root(mut self, root: &Path) -> Self {
        self.mii.download_folder = root.join("mii");
        self.roblox.download_folder = root.join("roblox");
        self.gta.download_folder = root.join("gta_online");
        self
    }
}
