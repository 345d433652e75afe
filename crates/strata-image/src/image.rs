//! In-memory image values.
//!
//! [`OciImage`] is immutable: every change produces a new value whose
//! manifest describes its config and layers. Serialized bytes of documents
//! that were loaded and never changed are kept as read, so an untouched
//! image keeps its digest.

use bytes::Bytes;
use serde::Serialize;
use strata_common::{Digest, StrataError, StrataResult};
use strata_oci::{Descriptor, HistoryEntry, ImageConfig, ImageManifest};

use crate::layer::Layer;
use crate::media::MediaTypes;
use crate::reader::ImageReader;

/// A layer to append, with its history and an optional media type override.
#[derive(Debug, Clone)]
pub struct Addendum {
    layer: Layer,
    history: HistoryEntry,
    media_type: Option<String>,
}

impl Addendum {
    /// Append `layer` with a default history entry.
    #[must_use]
    pub fn new(layer: Layer) -> Self {
        Self {
            layer,
            history: HistoryEntry::default(),
            media_type: None,
        }
    }

    /// Use this history entry for the layer.
    #[must_use]
    pub fn with_history(mut self, history: HistoryEntry) -> Self {
        self.history = history;
        self
    }

    /// Declare the layer under this media type.
    #[must_use]
    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }
}

/// An immutable image: config, manifest and layers.
#[derive(Debug, Clone)]
pub struct OciImage {
    config: ImageConfig,
    manifest: ImageManifest,
    layers: Vec<Layer>,
    raw_config: Option<Bytes>,
    raw_manifest: Option<Bytes>,
}

impl OciImage {
    /// An image with no layers and an empty config.
    ///
    /// `Missing` and `Default` types produce an OCI image.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized.
    pub fn empty(types: MediaTypes) -> StrataResult<Self> {
        let types = match types {
            MediaTypes::Missing | MediaTypes::Default => MediaTypes::Oci,
            other => other,
        };
        let config = ImageConfig::default();
        let raw_config = encode(&config)?;
        let manifest = ImageManifest {
            schema_version: 2,
            media_type: Some(types.manifest_type().to_string()),
            artifact_type: None,
            config: Descriptor::new(
                types.config_type(),
                Digest::sha256_of(&raw_config),
                byte_len(&raw_config),
            ),
            layers: Vec::new(),
            subject: None,
            annotations: std::collections::BTreeMap::new(),
        };
        Ok(Self {
            config,
            manifest,
            layers: Vec::new(),
            raw_config: Some(raw_config),
            raw_manifest: None,
        })
    }

    /// Assemble an image from documents as read from storage.
    ///
    /// The raw bytes are kept so an unchanged image keeps its digests.
    ///
    /// # Errors
    ///
    /// Returns an error if either document does not parse.
    pub fn from_raw(raw_config: Bytes, raw_manifest: Bytes, layers: Vec<Layer>) -> StrataResult<Self> {
        let config: ImageConfig = serde_json::from_slice(&raw_config)?;
        let manifest: ImageManifest = serde_json::from_slice(&raw_manifest)?;
        Ok(Self {
            config,
            manifest,
            layers,
            raw_config: Some(raw_config),
            raw_manifest: Some(raw_manifest),
        })
    }

    /// A layerless image from a config and a manifest.
    ///
    /// Both documents are taken as the skeleton to append onto; their layer
    /// lists should already be empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized.
    pub fn from_parts(config: ImageConfig, manifest: ImageManifest) -> StrataResult<Self> {
        Self {
            config: config.clone(),
            manifest,
            layers: Vec::new(),
            raw_config: None,
            raw_manifest: None,
        }
        .with_config(config)
    }

    /// Materialize any image source into an owned value.
    ///
    /// # Errors
    ///
    /// Returns an error if a document is missing or the layers cannot be listed.
    pub fn from_reader<R: ImageReader + ?Sized>(reader: &R) -> StrataResult<Self> {
        if let (Some(raw_config), Some(raw_manifest)) =
            (reader.raw_config_file()?, reader.raw_manifest_file()?)
        {
            return Self::from_raw(raw_config, raw_manifest, reader.layers()?);
        }
        let config = crate::reader::config_file_of(reader)?;
        let manifest = crate::reader::manifest_of(reader)?;
        let layers = reader.layers()?;
        let image = Self {
            config,
            manifest,
            layers,
            raw_config: None,
            raw_manifest: None,
        };
        // Keep the manifest's config descriptor honest.
        image.with_config(image.config.clone())
    }

    /// The config document.
    #[must_use]
    pub const fn config_ref(&self) -> &ImageConfig {
        &self.config
    }

    /// The manifest document.
    #[must_use]
    pub const fn manifest_ref(&self) -> &ImageManifest {
        &self.manifest
    }

    /// Layers in order, base first.
    #[must_use]
    pub fn layer_list(&self) -> &[Layer] {
        &self.layers
    }

    /// Serialized config document.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized.
    pub fn raw_config(&self) -> StrataResult<Bytes> {
        match &self.raw_config {
            Some(raw) => Ok(raw.clone()),
            None => encode(&self.config),
        }
    }

    /// Serialized manifest document.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest cannot be serialized.
    pub fn raw_manifest(&self) -> StrataResult<Bytes> {
        match &self.raw_manifest {
            Some(raw) => Ok(raw.clone()),
            None => encode(&self.manifest),
        }
    }

    /// Digest of the serialized manifest.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest cannot be serialized.
    pub fn manifest_digest(&self) -> StrataResult<Digest> {
        Ok(Digest::sha256_of(&self.raw_manifest()?))
    }

    /// A copy with a new config; the manifest's config descriptor follows.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized.
    pub fn with_config(&self, config: ImageConfig) -> StrataResult<Self> {
        let raw_config = encode(&config)?;
        let mut manifest = self.manifest.clone();
        manifest.config.digest = Digest::sha256_of(&raw_config);
        manifest.config.size = byte_len(&raw_config);
        Ok(Self {
            config,
            manifest,
            layers: self.layers.clone(),
            raw_config: Some(raw_config),
            raw_manifest: None,
        })
    }

    /// A copy with a new manifest.
    #[must_use]
    pub fn with_manifest(&self, manifest: ImageManifest) -> Self {
        Self {
            manifest,
            raw_manifest: None,
            ..self.clone()
        }
    }

    /// A copy with new layer objects and a manifest describing them.
    #[must_use]
    pub fn with_layers_and_manifest(&self, layers: Vec<Layer>, manifest: ImageManifest) -> Self {
        Self {
            layers,
            manifest,
            raw_manifest: None,
            ..self.clone()
        }
    }

    /// A copy with one more layer on top.
    ///
    /// Adds exactly one diff ID, one history entry and one manifest layer.
    ///
    /// # Errors
    ///
    /// Returns an error if the new config cannot be serialized.
    pub fn append(&self, addendum: Addendum) -> StrataResult<Self> {
        let Addendum {
            layer,
            mut history,
            media_type,
        } = addendum;
        let layer = match media_type {
            Some(media_type) if media_type != layer.media_type() => layer.with_media_type(media_type),
            _ => layer,
        };
        history.empty_layer = false;

        tracing::debug!(
            diff_id = %layer.diff_id(),
            media_type = layer.media_type(),
            position = self.layers.len(),
            "Appending layer"
        );

        let mut config = self.config.clone();
        config.rootfs.diff_ids.push(layer.diff_id().clone());
        config.history.push(history);

        let mut manifest = self.manifest.clone();
        manifest.layers.push(layer.descriptor());

        let mut layers = self.layers.clone();
        layers.push(layer);

        Self {
            manifest,
            layers,
            ..self.clone()
        }
        .with_config(config)
    }

    /// Check that manifest, config and layers agree.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::InvalidImage`] naming the first disagreement.
    pub fn validate(&self) -> StrataResult<()> {
        let invalid = |reason: String| Err(StrataError::InvalidImage { reason });

        let diff_ids = &self.config.rootfs.diff_ids;
        if self.manifest.layers.len() != self.layers.len() || diff_ids.len() != self.layers.len() {
            return invalid(format!(
                "{} manifest layers, {} diff IDs, {} layers",
                self.manifest.layers.len(),
                diff_ids.len(),
                self.layers.len()
            ));
        }
        for (i, ((descriptor, diff_id), layer)) in self
            .manifest
            .layers
            .iter()
            .zip(diff_ids)
            .zip(&self.layers)
            .enumerate()
        {
            if &descriptor.digest != layer.digest() {
                return invalid(format!("layer {i} digest does not match manifest"));
            }
            if diff_id != layer.diff_id() {
                return invalid(format!("layer {i} diff ID does not match config"));
            }
        }
        let raw_config = self.raw_config()?;
        if self.manifest.config.digest != Digest::sha256_of(&raw_config) {
            return invalid("config digest does not match manifest".to_string());
        }
        Ok(())
    }
}

impl ImageReader for OciImage {
    fn config_file(&self) -> StrataResult<Option<ImageConfig>> {
        Ok(Some(self.config.clone()))
    }

    fn manifest(&self) -> StrataResult<Option<ImageManifest>> {
        Ok(Some(self.manifest.clone()))
    }

    fn layers(&self) -> StrataResult<Vec<Layer>> {
        Ok(self.layers.clone())
    }

    fn raw_config_file(&self) -> StrataResult<Option<Bytes>> {
        self.raw_config().map(Some)
    }

    fn raw_manifest_file(&self) -> StrataResult<Option<Bytes>> {
        self.raw_manifest().map(Some)
    }

    fn size(&self) -> StrataResult<i64> {
        Ok(byte_len(&self.raw_manifest()?))
    }
}

fn encode<T: Serialize>(value: &T) -> StrataResult<Bytes> {
    Ok(Bytes::from(serde_json::to_vec(value)?))
}

fn byte_len(data: &[u8]) -> i64 {
    i64::try_from(data.len()).unwrap_or(i64::MAX)
}
