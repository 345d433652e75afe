//! Layout directory access.

use std::fs;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use strata_common::{Digest, StrataError, StrataResult};
use strata_oci::image::media_types;
use strata_oci::{Descriptor, ImageIndex};

use crate::image::OciImage;
use crate::layer::Layer;
use crate::save::AppendOptions;

const LAYOUT_FILE: &str = "oci-layout";
const INDEX_FILE: &str = "index.json";
const BLOBS_DIR: &str = "blobs/sha256";
const LAYOUT_VERSION: &str = "1.0.0";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LayoutMarker {
    image_layout_version: String,
}

/// An OCI image layout directory.
#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    /// Create an empty layout at `root`, replacing any existing index.
    ///
    /// Blobs already present are kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the directories or files cannot be written.
    pub fn init(root: impl Into<PathBuf>) -> StrataResult<Self> {
        let root = root.into();
        fs::create_dir_all(root.join(BLOBS_DIR))?;

        let marker = LayoutMarker {
            image_layout_version: LAYOUT_VERSION.to_string(),
        };
        fs::write(root.join(LAYOUT_FILE), serde_json::to_vec(&marker)?)?;

        let layout = Self { root };
        layout.write_index(&ImageIndex::empty())?;

        tracing::debug!(path = %layout.root.display(), "Layout initialized");
        Ok(layout)
    }

    /// Open an existing layout.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` has no index.
    pub fn open(root: impl Into<PathBuf>) -> StrataResult<Self> {
        let root = root.into();
        let index = root.join(INDEX_FILE);
        if !index.is_file() {
            return Err(StrataError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no image index at {}", index.display()),
            )));
        }
        Ok(Self { root })
    }

    /// Whether `root` holds a layout index.
    #[must_use]
    pub fn exists_at(root: &Path) -> bool {
        root.join(INDEX_FILE).is_file()
    }

    /// The layout directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Read the image index.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be read or parsed.
    pub fn index(&self) -> StrataResult<ImageIndex> {
        let content = fs::read(self.root.join(INDEX_FILE))?;
        Ok(serde_json::from_slice(&content)?)
    }

    fn write_index(&self, index: &ImageIndex) -> StrataResult<()> {
        let content = serde_json::to_vec_pretty(index)?;
        fs::write(self.root.join(INDEX_FILE), content)?;
        Ok(())
    }

    /// Store a blob and return its digest.
    ///
    /// # Errors
    ///
    /// Returns an error if the blob cannot be written.
    pub fn write_blob(&self, data: &[u8]) -> StrataResult<Digest> {
        let digest = Digest::sha256_of(data);
        let blob_path = self.blob_path(&digest);

        if !blob_path.exists() {
            fs::write(&blob_path, data)?;
            tracing::debug!(digest = digest.short(), size = data.len(), "Blob stored");
        }

        Ok(digest)
    }

    /// Read a blob by digest, `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the blob exists but cannot be read.
    pub fn read_blob(&self, digest: &Digest) -> StrataResult<Option<Bytes>> {
        let blob_path = self.blob_path(digest);
        if blob_path.is_file() {
            Ok(Some(Bytes::from(fs::read(&blob_path)?)))
        } else {
            Ok(None)
        }
    }

    /// Check if a blob exists.
    #[must_use]
    pub fn has_blob(&self, digest: &Digest) -> bool {
        self.blob_path(digest).is_file()
    }

    fn blob_path(&self, digest: &Digest) -> PathBuf {
        self.root.join(BLOBS_DIR).join(digest.hex())
    }

    /// Write an image's blobs and add it to the index.
    ///
    /// Layer blobs are skipped when `options.without_layers` is set.
    ///
    /// # Errors
    ///
    /// Fails if a blob cannot be written, or a layer to write has no content.
    pub fn append_image(&self, image: &OciImage, options: &AppendOptions) -> StrataResult<Descriptor> {
        self.write_blob(&image.raw_config()?)?;

        if !options.without_layers {
            for layer in image.layer_list() {
                if !self.has_blob(layer.digest()) {
                    self.write_blob(&layer.compressed()?)?;
                }
            }
        }

        let raw_manifest = image.raw_manifest()?;
        let digest = self.write_blob(&raw_manifest)?;

        let manifest = image.manifest_ref();
        let mut descriptor = Descriptor::new(
            manifest
                .media_type
                .clone()
                .unwrap_or_else(|| media_types::MANIFEST.to_string()),
            digest,
            i64::try_from(raw_manifest.len()).unwrap_or(i64::MAX),
        );
        descriptor.platform.clone_from(&manifest.config.platform);
        descriptor.annotations.clone_from(&options.annotations);

        let mut index = self.index()?;
        index.manifests.push(descriptor.clone());
        self.write_index(&index)?;

        tracing::debug!(
            path = %self.root.display(),
            digest = %descriptor.digest,
            layers = image.layer_list().len(),
            without_layers = options.without_layers,
            "Image appended to layout"
        );
        Ok(descriptor)
    }

    /// Load the image a manifest descriptor points at.
    ///
    /// Layers whose blobs are absent become content-less facades.
    ///
    /// # Errors
    ///
    /// Fails if the manifest or config blob is missing or malformed, or if
    /// the manifest and config disagree on the layer count. Nested indexes
    /// are rejected with [`StrataError::InvalidMediaType`].
    pub fn image(&self, descriptor: &Descriptor) -> StrataResult<OciImage> {
        if matches!(
            descriptor.media_type.as_str(),
            media_types::INDEX | media_types::DOCKER_INDEX
        ) {
            return Err(StrataError::InvalidMediaType {
                media_type: descriptor.media_type.clone(),
            });
        }
        let raw_manifest = self
            .read_blob(&descriptor.digest)?
            .ok_or_else(StrataError::missing_manifest)?;
        let manifest: strata_oci::ImageManifest = serde_json::from_slice(&raw_manifest)?;
        let raw_config = self
            .read_blob(&manifest.config.digest)?
            .ok_or_else(StrataError::missing_config)?;
        let config: strata_oci::ImageConfig = serde_json::from_slice(&raw_config)?;

        let diff_ids = &config.rootfs.diff_ids;
        if diff_ids.len() != manifest.layers.len() {
            return Err(StrataError::InvalidImage {
                reason: format!(
                    "{} manifest layers, {} diff IDs",
                    manifest.layers.len(),
                    diff_ids.len()
                ),
            });
        }

        let mut layers = Vec::with_capacity(diff_ids.len());
        for (layer_descriptor, diff_id) in manifest.layers.iter().zip(diff_ids) {
            let layer = match self.read_blob(&layer_descriptor.digest)? {
                Some(blob) => Layer::from_blob(blob, layer_descriptor, diff_id.clone()),
                None => Layer::facade(layer_descriptor, diff_id.clone()),
            };
            layers.push(layer);
        }

        OciImage::from_raw(raw_config, raw_manifest, layers)
    }
}
