//! Mii renders from the Nintendo Account CDN, Mii Studio and the HD renderer.
//!
//! Every configured Mii is rendered in each pose and expression. Account and
//! Studio Miis use the standard 512px renderers; entries marked `hd` are
//! additionally rendered by the HD renderer in every shading. When rotating
//! output is enabled each still is followed by a 16-frame rotation sheet,
//! saved as is and/or assembled into a looping GIF.

use std::path::PathBuf;

use indicatif::ProgressBar;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use super::{DownloadSummary, ServiceError, fail, save};
use crate::config::{MiiConfig, MiiEntry, MiiSubject};
use crate::download::HttpClient;
use crate::render::render_gif_from_frames;
use crate::store::sanitize_filename;

/// Frames in a rotation sheet.
pub const ROTATION_FRAMES: u32 = 16;

const STANDARD_WIDTH: u32 = 512;
const HD_MAX_WIDTH: u32 = 1200;
/// Rotation sheets must stay narrower than this many pixels.
const MAX_SHEET_WIDTH: u32 = 16_384;

/// Body framing of a render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MiiPose {
    Face,
    FaceOnly,
    AllBody,
}

impl MiiPose {
    /// All poses, in download order.
    pub const ALL: [Self; 3] = [Self::Face, Self::FaceOnly, Self::AllBody];

    /// Returns the renderer's name for the pose.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Face => "face",
            Self::FaceOnly => "face_only",
            Self::AllBody => "all_body",
        }
    }
}

/// Facial expression of a render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MiiExpression {
    Normal,
    Smile,
    Anger,
    Sorrow,
    Surprise,
    Blink,
    NormalOpenMouth,
    SmileOpenMouth,
    AngerOpenMouth,
    SorrowOpenMouth,
    SurpriseOpenMouth,
    BlinkOpenMouth,
    WinkLeft,
    WinkRight,
    WinkLeftOpenMouth,
    WinkRightOpenMouth,
    LikeWinkLeft,
    LikeWinkRight,
    Frustrated,
}

impl MiiExpression {
    /// All expressions, in download order.
    pub const ALL: [Self; 19] = [
        Self::Normal,
        Self::Smile,
        Self::Anger,
        Self::Sorrow,
        Self::Surprise,
        Self::Blink,
        Self::NormalOpenMouth,
        Self::SmileOpenMouth,
        Self::AngerOpenMouth,
        Self::SorrowOpenMouth,
        Self::SurpriseOpenMouth,
        Self::BlinkOpenMouth,
        Self::WinkLeft,
        Self::WinkRight,
        Self::WinkLeftOpenMouth,
        Self::WinkRightOpenMouth,
        Self::LikeWinkLeft,
        Self::LikeWinkRight,
        Self::Frustrated,
    ];

    /// Returns the renderer's name for the expression.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Smile => "smile",
            Self::Anger => "anger",
            Self::Sorrow => "sorrow",
            Self::Surprise => "surprise",
            Self::Blink => "blink",
            Self::NormalOpenMouth => "normal_open_mouth",
            Self::SmileOpenMouth => "smile_open_mouth",
            Self::AngerOpenMouth => "anger_open_mouth",
            Self::SorrowOpenMouth => "sorrow_open_mouth",
            Self::SurpriseOpenMouth => "surprise_open_mouth",
            Self::BlinkOpenMouth => "blink_open_mouth",
            Self::WinkLeft => "wink_left",
            Self::WinkRight => "wink_right",
            Self::WinkLeftOpenMouth => "wink_left_open_mouth",
            Self::WinkRightOpenMouth => "wink_right_open_mouth",
            Self::LikeWinkLeft => "like_wink_left",
            Self::LikeWinkRight => "like_wink_right",
            Self::Frustrated => "frustrated",
        }
    }
}

/// Shader used by the HD renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MiiShading {
    Miitomo,
    Switch,
    Wiiu,
}

impl MiiShading {
    /// All shadings, in download order.
    pub const ALL: [Self; 3] = [Self::Miitomo, Self::Switch, Self::Wiiu];

    /// Returns the renderer's name for the shading.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Miitomo => "miitomo",
            Self::Switch => "switch",
            Self::Wiiu => "wiiu",
        }
    }
}

/// Base URLs of the three renderers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiiEndpoints {
    /// Nintendo Account image CDN (path prefix for `{mii_id}.png`).
    pub account_cdn: String,
    /// Mii Studio render endpoint.
    pub studio: String,
    /// HD renderer endpoint.
    pub hd_renderer: String,
}

impl Default for MiiEndpoints {
    fn default() -> Self {
        Self {
            account_cdn: "https://cdn-mii.accounts.nintendo.com/2.0.0/mii_images".to_string(),
            studio: "https://studio.mii.nintendo.com/miis/image.png".to_string(),
            hd_renderer: "https://mii-unsecure.ariankordi.net/miis/image.png".to_string(),
        }
    }
}

impl MiiEndpoints {
    /// Points every renderer at paths under `base`.
    #[must_use]
    pub fn with_base(base: &str) -> Self {
        Self {
            account_cdn: format!("{base}/mii_images"),
            studio: format!("{base}/studio/image.png"),
            hd_renderer: format!("{base}/hd/image.png"),
        }
    }
}

/// Parameters of one render request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MiiRender {
    /// Body framing.
    pub pose: MiiPose,
    /// Facial expression.
    pub expression: MiiExpression,
    /// HD shading, or `None` for the standard renderers.
    pub shading: Option<MiiShading>,
    /// Frames in the sheet; 1 for a still.
    pub frames: u32,
}

impl MiiRender {
    /// A single-frame render.
    #[must_use]
    pub fn still(pose: MiiPose, expression: MiiExpression, shading: Option<MiiShading>) -> Self {
        Self {
            pose,
            expression,
            shading,
            frames: 1,
        }
    }

    /// The rotation sheet matching this render.
    #[must_use]
    pub fn rotation(self) -> Self {
        Self {
            frames: ROTATION_FRAMES,
            ..self
        }
    }

    fn query_suffix(&self) -> String {
        let mut suffix = format!(
            "&type={}&expression={}&bgColor=00000000",
            self.pose.as_str(),
            self.expression.as_str()
        );
        if self.frames != 1 {
            suffix.push_str(&format!("&instanceCount={}", self.frames));
        }
        suffix
    }

    /// File name for this render of the Mii called `name`.
    #[must_use]
    pub fn file_name(&self, name: &str, extension: &str) -> String {
        let shading = self
            .shading
            .map(|s| format!("_{}", s.as_str()))
            .unwrap_or_default();
        sanitize_filename(&format!(
            "Mii_{name}_{}_{}{shading}.{extension}",
            self.pose.as_str().replace('_', "-"),
            self.expression.as_str().replace('_', "-"),
        ))
    }
}

/// Width requested from the HD renderer so a sheet of `frames` fits.
#[must_use]
pub fn hd_width(frames: u32) -> u32 {
    HD_MAX_WIDTH.min((MAX_SHEET_WIDTH - 1) / frames.max(1))
}

/// Builds the URL for `render` of `subject`.
///
/// Returns `None` where no renderer serves the combination: account Miis
/// have no HD render and network-ID Miis have no standard render.
#[must_use]
pub fn render_url(endpoints: &MiiEndpoints, subject: &MiiSubject, render: &MiiRender) -> Option<String> {
    let suffix = render.query_suffix();
    match (subject, render.shading) {
        (MiiSubject::ByAccountId { mii_id }, None) => Some(format!(
            "{}/{mii_id}.png?width={STANDARD_WIDTH}{suffix}",
            endpoints.account_cdn
        )),
        (MiiSubject::ByStudioCode { mii_code }, None) => Some(format!(
            "{}?data={mii_code}&width={STANDARD_WIDTH}{suffix}",
            endpoints.studio
        )),
        (MiiSubject::ByStudioCode { mii_code }, Some(shading)) => {
            Some(hd_url(endpoints, "data", mii_code, shading, render, &suffix))
        }
        (MiiSubject::ByNetworkUsername { nnid }, Some(shading)) => {
            Some(hd_url(endpoints, "nnid", nnid, shading, render, &suffix))
        }
        (MiiSubject::ByAccountId { .. }, Some(_)) | (MiiSubject::ByNetworkUsername { .. }, None) => {
            None
        }
    }
}

fn hd_url(
    endpoints: &MiiEndpoints,
    key: &str,
    value: &str,
    shading: MiiShading,
    render: &MiiRender,
    suffix: &str,
) -> String {
    format!(
        "{}?{key}={value}&shaderType={}&resourceType=very_high&width={}{suffix}",
        endpoints.hd_renderer,
        shading.as_str(),
        hd_width(render.frames),
    )
}

fn has_standard_render(subject: &MiiSubject) -> bool {
    matches!(
        subject,
        MiiSubject::ByAccountId { .. } | MiiSubject::ByStudioCode { .. }
    )
}

fn has_hd_render(entry: &MiiEntry) -> bool {
    entry.hd && !matches!(entry.source, MiiSubject::ByAccountId { .. })
}

/// Downloads every configured Mii render.
#[derive(Debug)]
pub struct MiiDownloader<'a> {
    client: &'a HttpClient,
    config: &'a MiiConfig,
    endpoints: MiiEndpoints,
}

impl<'a> MiiDownloader<'a> {
    /// Creates a downloader using the public renderers.
    #[must_use]
    pub fn new(client: &'a HttpClient, config: &'a MiiConfig) -> Self {
        Self {
            client,
            config,
            endpoints: MiiEndpoints::default(),
        }
    }

    /// Replaces the renderer URLs.
    #[must_use]
    pub fn with_endpoints(mut self, endpoints: MiiEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    fn standard_subjects(&self) -> impl Iterator<Item = &'a MiiEntry> + use<'a> {
        self.config
            .subjects
            .iter()
            .filter(|entry| has_standard_render(&entry.source))
    }

    fn hd_subjects(&self) -> impl Iterator<Item = &'a MiiEntry> + use<'a> {
        let enabled = self.config.save_hd_images;
        self.config
            .subjects
            .iter()
            .filter(move |entry| enabled && has_hd_render(entry))
    }

    fn rotation_outputs(&self) -> u64 {
        u64::from(self.config.save_rotating_frames) + u64::from(self.config.save_rotating_gifs)
    }

    /// Number of progress units a run will take.
    ///
    /// Each still counts once, plus once per enabled rotating output.
    #[must_use]
    pub fn total_units(&self) -> u64 {
        let combos = (self.config.poses.len() * self.config.expressions.len()) as u64;
        let standard = self.standard_subjects().count() as u64;
        let hd = self.hd_subjects().count() as u64 * self.config.shadings.len() as u64;
        combos * (standard + hd) * (1 + self.rotation_outputs())
    }

    /// Downloads every render, advancing `progress` once per unit.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Fetch`] or [`ServiceError::Store`] when a
    /// request or a write fails; denied and rate-limited renders are counted
    /// as failures instead.
    #[instrument(skip_all, fields(subjects = self.config.subjects.len()))]
    pub async fn run(&self, progress: &ProgressBar) -> Result<DownloadSummary, ServiceError> {
        progress.set_length(self.total_units());
        for entry in &self.config.subjects {
            let standard = has_standard_render(&entry.source);
            let hd = self.config.save_hd_images && has_hd_render(entry);
            if !standard && !hd {
                warn!(mii = %entry.name, "no renderer available for this Mii with the current settings");
            }
        }

        let mut summary = DownloadSummary::new();
        for &pose in &self.config.poses {
            for &expression in &self.config.expressions {
                for entry in self.standard_subjects() {
                    let render = MiiRender::still(pose, expression, None);
                    self.process(entry, render, &mut summary, progress).await?;
                }
                for entry in self.hd_subjects() {
                    for &shading in &self.config.shadings {
                        let render = MiiRender::still(pose, expression, Some(shading));
                        self.process(entry, render, &mut summary, progress).await?;
                    }
                }
            }
        }

        info!(
            saved = summary.saved(),
            skipped = summary.skipped(),
            failed = summary.failed(),
            "Mii downloads finished"
        );
        Ok(summary)
    }

    async fn process(
        &self,
        entry: &MiiEntry,
        still: MiiRender,
        summary: &mut DownloadSummary,
        progress: &ProgressBar,
    ) -> Result<(), ServiceError> {
        self.download_still(entry, &still, summary, progress).await?;
        if self.rotation_outputs() > 0 {
            self.download_rotation(entry, &still.rotation(), summary, progress)
                .await?;
        }
        Ok(())
    }

    fn subject_folder(&self, entry: &MiiEntry) -> PathBuf {
        self.config
            .download_folder
            .join(sanitize_filename(&entry.name))
    }

    async fn fetch_render(
        &self,
        entry: &MiiEntry,
        render: &MiiRender,
    ) -> Result<Option<Vec<u8>>, ServiceError> {
        let Some(url) = render_url(&self.endpoints, &entry.source, render) else {
            return Ok(None);
        };
        debug!(url = %url, "Loading");
        let bytes = self.client.fetch_bytes(&url, None).await?;
        if bytes.is_none() {
            warn!(
                mii = %entry.name,
                pose = render.pose.as_str(),
                expression = render.expression.as_str(),
                url = %url,
                "failed to download image"
            );
        }
        Ok(bytes)
    }

    async fn download_still(
        &self,
        entry: &MiiEntry,
        render: &MiiRender,
        summary: &mut DownloadSummary,
        progress: &ProgressBar,
    ) -> Result<(), ServiceError> {
        match self.fetch_render(entry, render).await? {
            Some(bytes) => save(
                &self.subject_folder(entry),
                &render.file_name(&entry.name, "png"),
                &bytes,
                summary,
                progress,
            )?,
            None => fail(summary, progress, 1),
        }
        Ok(())
    }

    async fn download_rotation(
        &self,
        entry: &MiiEntry,
        render: &MiiRender,
        summary: &mut DownloadSummary,
        progress: &ProgressBar,
    ) -> Result<(), ServiceError> {
        let Some(sheet) = self.fetch_render(entry, render).await? else {
            fail(summary, progress, self.rotation_outputs());
            return Ok(());
        };

        if self.config.save_rotating_frames {
            let folder = self
                .subject_folder(entry)
                .join(format!("{} frames", render.frames));
            save(
                &folder,
                &render.file_name(&entry.name, "png"),
                &sheet,
                summary,
                progress,
            )?;
        }

        if self.config.save_rotating_gifs {
            match render_gif_from_frames(&sheet, render.frames) {
                Ok(gif) => save(
                    &self.subject_folder(entry),
                    &render.file_name(&entry.name, "gif"),
                    &gif,
                    summary,
                    progress,
                )?,
                Err(error) => {
                    warn!(mii = %entry.name, error = %error, "failed to assemble rotating GIF");
                    fail(summary, progress, 1);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_support::{instant_client, png};
    use tempfile::TempDir;
    use wiremock::matchers::{method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn studio(name: &str, hd: bool) -> MiiEntry {
        MiiEntry {
            name: name.to_string(),
            source: MiiSubject::ByStudioCode {
                mii_code: "000f1629".to_string(),
            },
            hd,
        }
    }

    fn account(name: &str) -> MiiEntry {
        MiiEntry {
            name: name.to_string(),
            source: MiiSubject::ByAccountId {
                mii_id: "9dfb1b54/6636421f".to_string(),
            },
            hd: false,
        }
    }

    fn nnid(name: &str) -> MiiEntry {
        MiiEntry {
            name: name.to_string(),
            source: MiiSubject::ByNetworkUsername {
                nnid: "Alex1331xela".to_string(),
            },
            hd: true,
        }
    }

    fn small_config(folder: PathBuf, subjects: Vec<MiiEntry>) -> MiiConfig {
        MiiConfig {
            download_folder: folder,
            poses: vec![MiiPose::Face],
            expressions: vec![MiiExpression::Normal, MiiExpression::Smile],
            subjects,
            ..MiiConfig::default()
        }
    }

    #[test]
    fn test_parameter_lists() {
        assert_eq!(MiiPose::ALL.len(), 3);
        assert_eq!(MiiExpression::ALL.len(), 19);
        assert_eq!(MiiShading::ALL.len(), 3);
        assert_eq!(MiiExpression::WinkRightOpenMouth.as_str(), "wink_right_open_mouth");
        assert_eq!(MiiShading::Wiiu.as_str(), "wiiu");
    }

    #[test]
    fn test_account_url() {
        let render = MiiRender::still(MiiPose::Face, MiiExpression::Smile, None);
        let url = render_url(&MiiEndpoints::default(), &account("Alex").source, &render).unwrap();
        assert_eq!(
            url,
            "https://cdn-mii.accounts.nintendo.com/2.0.0/mii_images/9dfb1b54/6636421f.png\
             ?width=512&type=face&expression=smile&bgColor=00000000"
        );
    }

    #[test]
    fn test_studio_rotation_url() {
        let render = MiiRender::still(MiiPose::AllBody, MiiExpression::Normal, None).rotation();
        let url = render_url(&MiiEndpoints::default(), &studio("Alex", false).source, &render).unwrap();
        assert_eq!(
            url,
            "https://studio.mii.nintendo.com/miis/image.png?data=000f1629&width=512\
             &type=all_body&expression=normal&bgColor=00000000&instanceCount=16"
        );
    }

    #[test]
    fn test_hd_urls() {
        let render = MiiRender::still(MiiPose::FaceOnly, MiiExpression::Blink, Some(MiiShading::Switch));
        let url = render_url(&MiiEndpoints::default(), &nnid("Alex3DS").source, &render).unwrap();
        assert_eq!(
            url,
            "https://mii-unsecure.ariankordi.net/miis/image.png?nnid=Alex1331xela\
             &shaderType=switch&resourceType=very_high&width=1200\
             &type=face_only&expression=blink&bgColor=00000000"
        );

        let url = render_url(&MiiEndpoints::default(), &studio("Alex", true).source, &render.rotation())
            .unwrap();
        assert!(url.contains("?data=000f1629&shaderType=switch"));
        assert!(url.contains("&width=1023&"));
        assert!(url.ends_with("&instanceCount=16"));
    }

    #[test]
    fn test_unavailable_combinations() {
        let hd = MiiRender::still(MiiPose::Face, MiiExpression::Normal, Some(MiiShading::Miitomo));
        let standard = MiiRender::still(MiiPose::Face, MiiExpression::Normal, None);
        assert!(render_url(&MiiEndpoints::default(), &account("A").source, &hd).is_none());
        assert!(render_url(&MiiEndpoints::default(), &nnid("A").source, &standard).is_none());
    }

    #[test]
    fn test_hd_width() {
        assert_eq!(hd_width(1), 1200);
        assert_eq!(hd_width(16), 1023);
        assert_eq!(hd_width(0), 1200);
    }

    #[test]
    fn test_file_names() {
        let render = MiiRender::still(MiiPose::FaceOnly, MiiExpression::SmileOpenMouth, None);
        assert_eq!(render.file_name("Alex", "png"), "Mii_Alex_face-only_smile-open-mouth.png");

        let render = MiiRender::still(MiiPose::AllBody, MiiExpression::WinkLeft, Some(MiiShading::Wiiu));
        assert_eq!(render.file_name("Alex", "gif"), "Mii_Alex_all-body_wink-left_wiiu.gif");
    }

    #[test]
    fn test_total_units() {
        let (client, _) = instant_client();
        let mut config = MiiConfig {
            subjects: vec![account("Olivia"), studio("Alex", true), nnid("Alex3DS")],
            save_hd_images: true,
            save_rotating_gifs: true,
            ..MiiConfig::default()
        };
        // 57 combos x (2 standard + 2 hd x 3 shadings) x (still + gif)
        assert_eq!(MiiDownloader::new(&client, &config).total_units(), 57 * 8 * 2);

        config.save_rotating_frames = true;
        assert_eq!(MiiDownloader::new(&client, &config).total_units(), 57 * 8 * 3);

        config.save_hd_images = false;
        config.save_rotating_gifs = false;
        config.save_rotating_frames = false;
        assert_eq!(MiiDownloader::new(&client, &config).total_units(), 57 * 2);
    }

    #[tokio::test]
    async fn test_run_saves_stills_sheets_and_gifs() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/studio/image.png"))
            .and(query_param("instanceCount", "16"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(png(16 * 8, 8, 30)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/studio/image.png"))
            .and(query_param_is_missing("instanceCount"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(png(8, 8, 60)))
            .mount(&server)
            .await;

        let temp = TempDir::new().unwrap();
        let mut config = small_config(temp.path().to_path_buf(), vec![studio("Alex", false)]);
        config.save_rotating_frames = true;
        config.save_rotating_gifs = true;

        let (client, _) = instant_client();
        let downloader = MiiDownloader::new(&client, &config).with_endpoints(MiiEndpoints::with_base(&server.uri()));
        let progress = ProgressBar::hidden();
        let summary = downloader.run(&progress).await.unwrap();

        assert_eq!(progress.length(), Some(6));
        assert_eq!(progress.position(), 6);
        assert_eq!(summary.saved(), 6);

        let folder = temp.path().join("Alex");
        assert!(folder.join("Mii_Alex_face_normal.png").is_file());
        assert!(folder.join("Mii_Alex_face_smile.png").is_file());
        assert!(folder.join("Mii_Alex_face_normal.gif").is_file());
        assert!(folder.join("16 frames").join("Mii_Alex_face_smile.png").is_file());
    }

    #[tokio::test]
    async fn test_run_counts_denied_renders_as_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/mii_images/9dfb1b54/6636421f.png"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let temp = TempDir::new().unwrap();
        let config = small_config(temp.path().to_path_buf(), vec![account("Olivia")]);
        let (client, _) = instant_client();
        let downloader = MiiDownloader::new(&client, &config).with_endpoints(MiiEndpoints::with_base(&server.uri()));
        let progress = ProgressBar::hidden();
        let summary = downloader.run(&progress).await.unwrap();

        assert_eq!(summary.failed(), 2);
        assert_eq!(summary.saved(), 0);
        assert_eq!(progress.position(), 2);
        assert!(!temp.path().join("Olivia").exists());
    }

    #[tokio::test]
    async fn test_run_failed_rotation_counts_every_output() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("instanceCount", "16"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param_is_missing("instanceCount"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(png(8, 8, 60)))
            .mount(&server)
            .await;

        let temp = TempDir::new().unwrap();
        let mut config = small_config(temp.path().to_path_buf(), vec![studio("Alex", false)]);
        config.expressions = vec![MiiExpression::Normal];
        config.save_rotating_frames = true;
        config.save_rotating_gifs = true;

        let (client, _) = instant_client();
        let downloader = MiiDownloader::new(&client, &config).with_endpoints(MiiEndpoints::with_base(&server.uri()));
        let progress = ProgressBar::hidden();
        let summary = downloader.run(&progress).await.unwrap();

        assert_eq!(summary.saved(), 1);
        assert_eq!(summary.failed(), 2);
        assert_eq!(progress.position(), 3);
    }

    #[tokio::test]
    async fn test_run_undecodable_sheet_skips_gif_only() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("instanceCount", "16"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"not a png".to_vec()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param_is_missing("instanceCount"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(png(8, 8, 60)))
            .mount(&server)
            .await;

        let temp = TempDir::new().unwrap();
        let mut config = small_config(temp.path().to_path_buf(), vec![studio("Alex", false)]);
        config.expressions = vec![MiiExpression::Normal];
        config.save_rotating_frames = true;
        config.save_rotating_gifs = true;

        let (client, _) = instant_client();
        let downloader = MiiDownloader::new(&client, &config).with_endpoints(MiiEndpoints::with_base(&server.uri()));
        let progress = ProgressBar::hidden();
        let summary = downloader.run(&progress).await.unwrap();

        assert_eq!(summary.saved(), 2, "still and raw sheet are kept");
        assert_eq!(summary.failed(), 1);
        assert!(!temp.path().join("Alex").join("Mii_Alex_face_normal.gif").exists());
    }

    #[tokio::test]
    async fn test_run_server_error_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let temp = TempDir::new().unwrap();
        let config = small_config(temp.path().to_path_buf(), vec![studio("Alex", false)]);
        let (client, _) = instant_client();
        let downloader = MiiDownloader::new(&client, &config).with_endpoints(MiiEndpoints::with_base(&server.uri()));
        let result = downloader.run(&ProgressBar::hidden()).await;

        assert!(matches!(result, Err(ServiceError::Fetch(_))));
    }

    #[tokio::test]
    async fn test_run_hd_renders_each_shading() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/hd/image.png"))
            .and(query_param("nnid", "Alex1331xela"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(png(8, 8, 90)))
            .mount(&server)
            .await;

        let temp = TempDir::new().unwrap();
        let mut config = small_config(temp.path().to_path_buf(), vec![nnid("Alex3DS")]);
        config.expressions = vec![MiiExpression::Normal];
        config.save_hd_images = true;

        let (client, _) = instant_client();
        let downloader = MiiDownloader::new(&client, &config).with_endpoints(MiiEndpoints::with_base(&server.uri()));
        let summary = downloader.run(&ProgressBar::hidden()).await.unwrap();

        assert_eq!(summary.saved(), 3);
        let folder = temp.path().join("Alex3DS");
        for shading in ["miitomo", "switch", "wiiu"] {
            assert!(folder.join(format!("Mii_Alex3DS_face_normal_{shading}.png")).is_file());
        }
    }
}
