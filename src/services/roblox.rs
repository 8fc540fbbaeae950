//! Roblox avatar renders and outfit asset thumbnails.
//!
//! Users may be configured by name, id or both; missing halves are looked
//! up through the users API. Thumbnail endpoints answer with a render
//! state, and renders still being generated are polled a bounded number of
//! times before the item is given up.

use std::collections::BTreeSet;

use indicatif::ProgressBar;
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::{DownloadSummary, ServiceError, fail, save, tolerate};
use crate::config::{RobloxConfig, RobloxUser};
use crate::download::HttpClient;
use crate::store::sanitize_filename;

const OUTFIT_FOLDER: &str = "outfits";
const OUTFIT_THUMBNAIL_SIZE: &str = "700x700";

/// Avatar render kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RobloxPose {
    Avatar,
    AvatarHeadshot,
    AvatarBust,
}

impl RobloxPose {
    /// All poses, in download order.
    pub const ALL: [Self; 3] = [Self::Avatar, Self::AvatarHeadshot, Self::AvatarBust];

    /// Returns the thumbnail endpoint name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Avatar => "avatar",
            Self::AvatarHeadshot => "avatar-headshot",
            Self::AvatarBust => "avatar-bust",
        }
    }

    /// Returns the largest size the endpoint serves.
    #[must_use]
    pub fn size(self) -> &'static str {
        match self {
            Self::Avatar | Self::AvatarHeadshot => "720x720",
            Self::AvatarBust => "420x420",
        }
    }
}

/// Base URLs of the Roblox web APIs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RobloxEndpoints {
    /// Users API (name and id lookups).
    pub users_api: String,
    /// Thumbnails API.
    pub thumbnails_api: String,
    /// Avatar API (currently worn assets).
    pub avatar_api: String,
}

impl Default for RobloxEndpoints {
    fn default() -> Self {
        Self {
            users_api: "https://users.roblox.com".to_string(),
            thumbnails_api: "https://thumbnails.roblox.com".to_string(),
            avatar_api: "https://avatar.roblox.com".to_string(),
        }
    }
}

impl RobloxEndpoints {
    /// Serves every API from `base`.
    #[must_use]
    pub fn with_base(base: &str) -> Self {
        Self {
            users_api: base.to_string(),
            thumbnails_api: base.to_string(),
            avatar_api: base.to_string(),
        }
    }
}

/// A user whose id is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUser {
    /// Account name, when known.
    pub username: Option<String>,
    /// Numeric account id.
    pub user_id: u64,
}

fn first_entry(data: &Value) -> Option<&Value> {
    data.get("data")?.as_array()?.first()
}

fn parse_id(value: &Value) -> Option<u64> {
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

/// Returns the asset type encoded in a thumbnail URL.
///
/// Thumbnail URLs end in `/{type}/{format}/{filter}`, so the type is the
/// third path segment from the end.
#[must_use]
pub fn asset_type_from_url(image_url: &str) -> Option<String> {
    let url = Url::parse(image_url).ok()?;
    let segments: Vec<&str> = url.path_segments()?.collect();
    let index = segments.len().checked_sub(3)?;
    segments
        .get(index)
        .filter(|segment| !segment.is_empty())
        .map(|segment| (*segment).to_string())
}

/// Downloads avatars, and optionally outfits, for every configured user.
#[derive(Debug)]
pub struct RobloxDownloader<'a> {
    client: &'a HttpClient,
    config: &'a RobloxConfig,
    endpoints: RobloxEndpoints,
}

impl<'a> RobloxDownloader<'a> {
    /// Creates a downloader using the public APIs.
    #[must_use]
    pub fn new(client: &'a HttpClient, config: &'a RobloxConfig) -> Self {
        Self {
            client,
            config,
            endpoints: RobloxEndpoints::default(),
        }
    }

    /// Replaces the API base URLs.
    #[must_use]
    pub fn with_endpoints(mut self, endpoints: RobloxEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    async fn json(&self, url: &str, body: Option<Value>) -> Result<Value, ServiceError> {
        self.client
            .fetch_json(url, body)
            .await?
            .ok_or_else(|| ServiceError::no_data(url, "request denied or rate limited"))
    }

    /// Looks up the account name for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NoData`] when the id is unknown.
    pub async fn lookup_username(&self, user_id: u64) -> Result<String, ServiceError> {
        let url = format!("{}/v1/users", self.endpoints.users_api);
        let body = json!({ "userIds": [user_id], "excludeBannedUsers": true });
        let data = self.json(&url, Some(body)).await?;
        first_entry(&data)
            .and_then(|entry| entry.get("name"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ServiceError::no_data(&url, format!("no user with id {user_id}")))
    }

    /// Looks up the account id for `username`.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NoData`] when the name is unknown.
    pub async fn lookup_user_id(&self, username: &str) -> Result<u64, ServiceError> {
        let url = format!("{}/v1/usernames/users", self.endpoints.users_api);
        let body = json!({ "usernames": [username], "excludeBannedUsers": true });
        let data = self.json(&url, Some(body)).await?;
        first_entry(&data)
            .and_then(|entry| {
                ["id", "Id", "userId"]
                    .iter()
                    .find_map(|key| entry.get(*key).and_then(parse_id))
            })
            .ok_or_else(|| ServiceError::no_data(&url, format!("no user named {username}")))
    }

    /// Fills in whichever of name and id is missing.
    ///
    /// A missing name is only cosmetic, so a failed name lookup is logged
    /// and the user is still returned.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the id cannot be determined.
    #[instrument(skip(self), fields(username = ?user.username, user_id = ?user.user_id))]
    pub async fn resolve(&self, user: &RobloxUser) -> Result<ResolvedUser, ServiceError> {
        match (&user.username, user.user_id) {
            (Some(username), Some(user_id)) => Ok(ResolvedUser {
                username: Some(username.clone()),
                user_id,
            }),
            (None, Some(user_id)) => {
                let username = match self.lookup_username(user_id).await {
                    Ok(name) => Some(name),
                    Err(error) => {
                        tolerate(error)?;
                        None
                    }
                };
                Ok(ResolvedUser { username, user_id })
            }
            (Some(username), None) => Ok(ResolvedUser {
                user_id: self.lookup_user_id(username).await?,
                username: Some(username.clone()),
            }),
            (None, None) => Err(ServiceError::no_data(
                &self.endpoints.users_api,
                "user has neither a name nor an id",
            )),
        }
    }

    /// Resolves a thumbnail API URL to the image URL it points at.
    ///
    /// A `Pending` render is checked again after the configured interval,
    /// up to the configured number of checks.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::PendingTimeout`] if the render never
    /// completes and [`ServiceError::NoData`] for empty or blocked answers.
    pub async fn thumbnail_url(&self, api_url: &str) -> Result<String, ServiceError> {
        let attempts = self.config.pending_poll_attempts.max(1);
        for attempt in 1..=attempts {
            let data = self.json(api_url, None).await?;
            let entry =
                first_entry(&data).ok_or_else(|| ServiceError::no_data(api_url, "empty data list"))?;

            match entry.get("state").and_then(Value::as_str) {
                Some("Completed") => {
                    return entry
                        .get("imageUrl")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .ok_or_else(|| {
                            ServiceError::no_data(api_url, "completed thumbnail without imageUrl")
                        });
                }
                Some("Pending") => {
                    debug!(url = %api_url, attempt, attempts, "image generation pending");
                    if attempt < attempts {
                        self.client
                            .sleeper()
                            .sleep(self.config.pending_poll_interval())
                            .await;
                    }
                }
                other => {
                    return Err(ServiceError::no_data(
                        api_url,
                        format!("thumbnail state {}", other.unwrap_or("missing")),
                    ));
                }
            }
        }
        Err(ServiceError::PendingTimeout {
            url: api_url.to_string(),
            attempts,
        })
    }

    /// Returns the ids of the assets `user_id` is wearing.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NoData`] when the list is missing or empty.
    pub async fn outfit_asset_ids(&self, user_id: u64) -> Result<Vec<u64>, ServiceError> {
        let url = format!(
            "{}/v1/users/{user_id}/currently-wearing",
            self.endpoints.avatar_api
        );
        let data = self.json(&url, None).await?;
        let ids: Vec<u64> = data
            .get("assetIds")
            .and_then(Value::as_array)
            .map(|ids| ids.iter().filter_map(parse_id).collect())
            .unwrap_or_default();
        if ids.is_empty() {
            return Err(ServiceError::no_data(&url, "no outfit asset ids"));
        }
        Ok(ids)
    }

    /// Downloads every avatar and outfit, advancing `progress` once per image.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Fetch`] or [`ServiceError::Store`] when a
    /// request or a write fails.
    #[instrument(skip_all, fields(users = self.config.users.len()))]
    pub async fn run(&self, progress: &ProgressBar) -> Result<DownloadSummary, ServiceError> {
        let avatar_units = (self.config.users.len() * RobloxPose::ALL.len()) as u64;
        progress.set_length(avatar_units);

        let mut users = Vec::with_capacity(self.config.users.len());
        for user in &self.config.users {
            match self.resolve(user).await {
                Ok(resolved) => users.push(Some(resolved)),
                Err(error) => {
                    tolerate(error)?;
                    users.push(None);
                }
            }
        }

        let mut asset_ids = BTreeSet::new();
        if self.config.save_outfit_images {
            for user in users.iter().flatten() {
                match self.outfit_asset_ids(user.user_id).await {
                    Ok(ids) => asset_ids.extend(ids),
                    Err(error) => tolerate(error)?,
                }
            }
            debug!(assets = asset_ids.len(), "collected outfit assets");
        }
        progress.set_length(avatar_units + asset_ids.len() as u64);

        let mut summary = DownloadSummary::new();
        for user in &users {
            for pose in RobloxPose::ALL {
                match user {
                    Some(user) => self.download_avatar(user, pose, &mut summary, progress).await?,
                    None => fail(&mut summary, progress, 1),
                }
            }
        }
        for asset_id in asset_ids {
            self.download_outfit(asset_id, &mut summary, progress).await?;
        }

        info!(
            saved = summary.saved(),
            skipped = summary.skipped(),
            failed = summary.failed(),
            "Roblox downloads finished"
        );
        Ok(summary)
    }

    /// Resolves and fetches a thumbnail, or records the failure.
    async fn fetch_thumbnail(
        &self,
        api_url: &str,
        summary: &mut DownloadSummary,
        progress: &ProgressBar,
    ) -> Result<Option<(String, Vec<u8>)>, ServiceError> {
        let image_url = match self.thumbnail_url(api_url).await {
            Ok(url) => url,
            Err(error) => {
                tolerate(error)?;
                fail(summary, progress, 1);
                return Ok(None);
            }
        };
        debug!(url = %image_url, "Loading");

        let Some(bytes) = self.client.fetch_bytes(&image_url, None).await? else {
            warn!(url = %image_url, "failed to download image");
            fail(summary, progress, 1);
            return Ok(None);
        };
        Ok(Some((image_url, bytes)))
    }

    async fn download_avatar(
        &self,
        user: &ResolvedUser,
        pose: RobloxPose,
        summary: &mut DownloadSummary,
        progress: &ProgressBar,
    ) -> Result<(), ServiceError> {
        let api_url = format!(
            "{}/v1/users/{}?userIds={}&size={}&format=png",
            self.endpoints.thumbnails_api,
            pose.as_str(),
            user.user_id,
            pose.size()
        );
        let Some((_, bytes)) = self.fetch_thumbnail(&api_url, summary, progress).await? else {
            warn!(
                username = ?user.username,
                user_id = user.user_id,
                pose = pose.as_str(),
                "no avatar image"
            );
            return Ok(());
        };

        let file_name = format!("roblox_{}_{}.png", user.user_id, pose.as_str());
        save(&self.config.download_folder, &file_name, &bytes, summary, progress)
    }

    async fn download_outfit(
        &self,
        asset_id: u64,
        summary: &mut DownloadSummary,
        progress: &ProgressBar,
    ) -> Result<(), ServiceError> {
        let api_url = format!(
            "{}/v1/assets?assetIds={asset_id}&size={OUTFIT_THUMBNAIL_SIZE}&format=png",
            self.endpoints.thumbnails_api
        );
        let Some((image_url, bytes)) = self.fetch_thumbnail(&api_url, summary, progress).await?
        else {
            warn!(asset_id, "no outfit image");
            return Ok(());
        };

        let asset_type = asset_type_from_url(&image_url).unwrap_or_else(|| "asset".to_string());
        let file_name = sanitize_filename(&format!("roblox_outfit_{asset_type}_{asset_id}.png"));
        save(
            &self.config.download_folder.join(OUTFIT_FOLDER),
            &file_name,
            &bytes,
            summary,
            progress,
        )
    }
}
