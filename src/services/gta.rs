//! GTA Online character portraits from the Rockstar members cloud.

use indicatif::ProgressBar;
use rand::Rng;
use tracing::{debug, info, instrument, warn};

use super::{DownloadSummary, ServiceError, fail, save};
use crate::config::GtaConfig;
use crate::download::HttpClient;
use crate::store::{FileFingerprint, sanitize_filename};

/// Base URL of the members cloud.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GtaEndpoints {
    /// Prefix every portrait path is appended to.
    pub members_base: String,
}

impl Default for GtaEndpoints {
    fn default() -> Self {
        Self {
            members_base: "https://prod.cloud.rockstargames.com/members/np".to_string(),
        }
    }
}

impl GtaEndpoints {
    /// Serves portraits from `base`.
    #[must_use]
    pub fn with_base(base: &str) -> Self {
        Self {
            members_base: base.to_string(),
        }
    }
}

/// Builds the portrait URL for `character` under a four-digit shard.
#[must_use]
pub fn portrait_url(endpoints: &GtaEndpoints, shard: u16, character: &str) -> String {
    format!(
        "{}/{shard:04}/{character}/publish/gta5/mpchars/0_ps4.png",
        endpoints.members_base
    )
}

/// Downloads one portrait per configured character.
#[derive(Debug)]
pub struct GtaDownloader<'a> {
    client: &'a HttpClient,
    config: &'a GtaConfig,
    endpoints: GtaEndpoints,
}

impl<'a> GtaDownloader<'a> {
    /// Creates a downloader using the public members cloud.
    #[must_use]
    pub fn new(client: &'a HttpClient, config: &'a GtaConfig) -> Self {
        Self {
            client,
            config,
            endpoints: GtaEndpoints::default(),
        }
    }

    /// Replaces the members cloud base URL.
    #[must_use]
    pub fn with_endpoints(mut self, endpoints: GtaEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Downloads every portrait, advancing `progress` once per character.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Fetch`] or [`ServiceError::Store`] when a
    /// request or a write fails.
    #[instrument(skip_all, fields(characters = self.config.character_names.len()))]
    pub async fn run(&self, progress: &ProgressBar) -> Result<DownloadSummary, ServiceError> {
        progress.set_length(self.config.character_names.len() as u64);
        let mut summary = DownloadSummary::new();

        for character in &self.config.character_names {
            // Any shard serves the portrait.
            let shard = rand::thread_rng().gen_range(0..=9999);
            let url = portrait_url(&self.endpoints, shard, character);
            debug!(%url, "Loading");

            let Some(bytes) = self.client.fetch_bytes(&url, None).await? else {
                warn!(character = %character, "failed to download portrait");
                fail(&mut summary, progress, 1);
                continue;
            };
            if FileFingerprint::from_bytes(&bytes).is_empty_content() {
                warn!(character = %character, %url, "empty portrait, nothing saved");
                fail(&mut summary, progress, 1);
                continue;
            }

            let file_name = sanitize_filename(&format!("gta_online_{character}.png"));
            save(&self.config.download_folder, &file_name, &bytes, &mut summary, progress)?;
        }

        info!(
            saved = summary.saved(),
            skipped = summary.skipped(),
            failed = summary.failed(),
            "GTA Online downloads finished"
        );
        Ok(summary)
    }
}
