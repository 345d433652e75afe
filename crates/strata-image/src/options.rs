//! Image session options.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use strata_oci::{ExecutionConfig, Platform};

use crate::media::MediaTypes;
use crate::reader::ImageReader;

/// Options for a mutation session.
///
/// Built with [`ImageOptions::default`] and the `with_*` methods.
#[derive(Clone, Default)]
pub struct ImageOptions {
    /// Image to start from; an empty image when absent.
    pub base_image: Option<Arc<dyn ImageReader>>,
    /// Layout path of the base image, used when `base_image` is absent.
    pub base_image_path: Option<PathBuf>,
    /// Image whose layers may be reused.
    pub previous_image: Option<Arc<dyn ImageReader>>,
    /// Layout path of the previous image, used when `previous_image` is absent.
    pub previous_image_path: Option<PathBuf>,
    /// Execution config replacing the base image's.
    pub config: Option<ExecutionConfig>,
    /// Build timestamp; the process default when absent.
    pub created_at: Option<DateTime<Utc>>,
    /// Preferred media types.
    pub media_types: MediaTypes,
    /// Platform to select from indexes and stamp on the image.
    pub platform: Option<Platform>,
    /// Keep caller-supplied layer history instead of blank entries.
    pub preserve_history: bool,
    /// Skip restamping on save so an unchanged image keeps its digest.
    pub preserve_digest: bool,
    /// Save manifest, config and history but no layer blobs.
    pub without_layers: bool,
}

impl ImageOptions {
    /// Start from this image.
    #[must_use]
    pub fn with_base_image(mut self, image: Arc<dyn ImageReader>) -> Self {
        self.base_image = Some(image);
        self
    }

    /// Start from the image stored in this layout.
    #[must_use]
    pub fn with_base_image_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_image_path = Some(path.into());
        self
    }

    /// Allow reusing layers of this image.
    #[must_use]
    pub fn with_previous_image(mut self, image: Arc<dyn ImageReader>) -> Self {
        self.previous_image = Some(image);
        self
    }

    /// Allow reusing layers of the image stored in this layout.
    #[must_use]
    pub fn with_previous_image_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.previous_image_path = Some(path.into());
        self
    }

    /// Replace the execution config.
    #[must_use]
    pub fn with_config(mut self, config: ExecutionConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Stamp layers, history and the config with this time.
    #[must_use]
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Prefer these media types.
    #[must_use]
    pub fn with_media_types(mut self, media_types: MediaTypes) -> Self {
        self.media_types = media_types;
        self
    }

    /// Target this platform.
    #[must_use]
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Keep layer history.
    #[must_use]
    pub fn with_history(mut self) -> Self {
        self.preserve_history = true;
        self
    }

    /// Keep the digest of an unchanged image on save.
    #[must_use]
    pub fn with_preserve_digest(mut self) -> Self {
        self.preserve_digest = true;
        self
    }

    /// Save without layer blobs.
    #[must_use]
    pub fn without_layers(mut self) -> Self {
        self.without_layers = true;
        self
    }
}

impl fmt::Debug for ImageOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageOptions")
            .field("base_image", &self.base_image.is_some())
            .field("base_image_path", &self.base_image_path)
            .field("previous_image", &self.previous_image.is_some())
            .field("previous_image_path", &self.previous_image_path)
            .field("created_at", &self.created_at)
            .field("media_types", &self.media_types)
            .field("platform", &self.platform)
            .field("preserve_history", &self.preserve_history)
            .field("preserve_digest", &self.preserve_digest)
            .field("without_layers", &self.without_layers)
            .finish()
    }
}
