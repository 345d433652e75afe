//! The image mutation engine.
//!
//! [`ImageCore`] wraps an [`OciImage`] for one build session. Every change to
//! the config document goes through [`ImageCore::mutate_config_file`], which
//! mirrors the platform fields into the manifest so the two documents never
//! disagree. Fields a manifest format cannot carry (features, URLs,
//! annotations) are held as session overrides until save.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use strata_common::{Digest, StrataError, StrataResult, default_created_at};
use strata_oci::image::annotations;
use strata_oci::{HistoryEntry, ImageConfig, ImageManifest};

use crate::history::{empty_history, normalized_history};
use crate::image::{Addendum, OciImage};
use crate::layer::Layer;
use crate::media::{ManifestField, MediaTypes, ensure_media_types, preferred_media_types};
use crate::options::ImageOptions;
use crate::reader::{ImageReader, config_file_of};
use crate::rebase::{BasePrefix, rebase};

/// Session state that the manifest format may not be able to express.
#[derive(Debug, Default)]
struct SessionOverrides {
    features: Vec<String>,
    urls: Vec<String>,
    annotations: BTreeMap<String, String>,
}

/// A mutable build session over an immutable image.
pub struct ImageCore {
    image: OciImage,
    created_at: DateTime<Utc>,
    media_types: MediaTypes,
    preserve_history: bool,
    preserve_digest: bool,
    without_layers: bool,
    previous_image: Option<Arc<dyn ImageReader>>,
    overrides: Mutex<SessionOverrides>,
}

impl ImageCore {
    /// Start a session from the options' base image, or an empty image.
    ///
    /// The base image is converted to the preferred media types. Layout
    /// paths in the options are ignored here; see
    /// [`LayoutImage`](crate::layout::LayoutImage) for path-backed sessions.
    ///
    /// # Errors
    ///
    /// Returns an error if the base image cannot be read or converted.
    pub fn new(options: &ImageOptions) -> StrataResult<Self> {
        let media_types = preferred_media_types(options.media_types, options.base_image.as_deref())?;

        let image = match &options.base_image {
            Some(base) => ensure_media_types(&OciImage::from_reader(base.as_ref())?, media_types)?,
            None => OciImage::empty(media_types)?,
        };

        let mut core = Self {
            image,
            created_at: options.created_at.unwrap_or_else(default_created_at),
            media_types,
            preserve_history: options.preserve_history,
            preserve_digest: options.preserve_digest,
            without_layers: options.without_layers,
            previous_image: options.previous_image.clone(),
            overrides: Mutex::new(SessionOverrides::default()),
        };

        if options.base_image.is_none() {
            if let Some(platform) = &options.platform {
                core.mutate_config_file(|c| {
                    c.architecture.clone_from(&platform.architecture);
                    c.os.clone_from(&platform.os);
                    c.os_version.clone_from(&platform.os_version);
                })?;
            }
        }
        if let Some(exec) = &options.config {
            core.mutate_config_file(|c| c.config = Some(exec.clone()))?;
        }

        tracing::debug!(
            layers = core.image.layer_list().len(),
            media_types = ?core.media_types,
            created_at = %core.created_at,
            "Image session started"
        );
        Ok(core)
    }

    /// The current image value.
    #[must_use]
    pub const fn image(&self) -> &OciImage {
        &self.image
    }

    /// Consume the session, keeping the image.
    #[must_use]
    pub fn into_image(self) -> OciImage {
        self.image
    }

    /// Media types the session writes.
    #[must_use]
    pub const fn media_types(&self) -> MediaTypes {
        self.media_types
    }

    /// Whether saving skips restamping.
    #[must_use]
    pub const fn preserve_digest(&self) -> bool {
        self.preserve_digest
    }

    /// Whether saving omits layer blobs.
    #[must_use]
    pub const fn without_layers(&self) -> bool {
        self.without_layers
    }

    // Getters

    /// Operating system.
    #[must_use]
    pub fn os(&self) -> &str {
        &self.config().os
    }

    /// CPU architecture.
    #[must_use]
    pub fn architecture(&self) -> &str {
        &self.config().architecture
    }

    /// Architecture variant.
    #[must_use]
    pub fn variant(&self) -> Option<&str> {
        self.config().variant.as_deref()
    }

    /// OS version.
    #[must_use]
    pub fn os_version(&self) -> Option<&str> {
        self.config().os_version.as_deref()
    }

    /// OS features.
    #[must_use]
    pub fn os_features(&self) -> &[String] {
        &self.config().os_features
    }

    /// Platform features: the session override, else the manifest's.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::UnsupportedField`] if neither holds any.
    pub fn features(&self) -> StrataResult<Vec<String>> {
        self.features_with(&self.overrides.lock())
    }

    /// Config URLs: the session override, else the manifest's.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::UnsupportedField`] if neither holds any.
    pub fn urls(&self) -> StrataResult<Vec<String>> {
        self.urls_with(&self.overrides.lock())
    }

    /// Manifest annotations: the session override, else the manifest's.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::UnsupportedField`] if neither holds any.
    pub fn annotations(&self) -> StrataResult<BTreeMap<String, String>> {
        self.annotations_with(&self.overrides.lock())
    }

    /// Creation time recorded in the config.
    #[must_use]
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.config().created
    }

    /// Entrypoint.
    #[must_use]
    pub fn entrypoint(&self) -> &[String] {
        self.config()
            .config
            .as_ref()
            .and_then(|c| c.entrypoint.as_deref())
            .unwrap_or_default()
    }

    /// Default command.
    #[must_use]
    pub fn cmd(&self) -> &[String] {
        self.config()
            .config
            .as_ref()
            .and_then(|c| c.cmd.as_deref())
            .unwrap_or_default()
    }

    /// Value of the first environment entry named `key`.
    ///
    /// Keys compare case-insensitively on windows.
    #[must_use]
    pub fn env(&self, key: &str) -> Option<&str> {
        let ignore_case = self.is_windows();
        self.config().env().iter().find_map(|entry| {
            let (name, value) = entry.split_once('=')?;
            env_key_matches(name, key, ignore_case).then_some(value)
        })
    }

    /// Value of a label.
    #[must_use]
    pub fn label(&self, key: &str) -> Option<&str> {
        self.config()
            .config
            .as_ref()
            .and_then(|c| c.labels.get(key))
            .map(String::as_str)
    }

    /// All labels.
    #[must_use]
    pub fn labels(&self) -> BTreeMap<String, String> {
        self.config()
            .config
            .as_ref()
            .map(|c| c.labels.clone())
            .unwrap_or_default()
    }

    /// History as recorded in the config.
    #[must_use]
    pub fn history(&self) -> &[HistoryEntry] {
        &self.config().history
    }

    /// Working directory.
    #[must_use]
    pub fn working_dir(&self) -> Option<&str> {
        self.config()
            .config
            .as_ref()
            .and_then(|c| c.working_dir.as_deref())
    }

    /// Diff ID of the last layer.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::EmptyImage`] if the image has no layers.
    pub fn top_layer(&self) -> StrataResult<Digest> {
        self.image
            .layer_list()
            .last()
            .map(|layer| layer.diff_id().clone())
            .ok_or(StrataError::EmptyImage)
    }

    /// Uncompressed content of the layer with this diff ID.
    ///
    /// # Errors
    ///
    /// Fails if the layer is not in the image or its content is unavailable.
    pub fn get_layer(&self, diff_id: &Digest) -> StrataResult<Box<dyn Read + Send>> {
        self.image.layer_by_diff_id(diff_id)?.uncompressed()
    }

    /// Size of the serialized manifest.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest cannot be serialized.
    pub fn manifest_size(&self) -> StrataResult<i64> {
        self.image.size()
    }

    /// Manifest media type.
    #[must_use]
    pub fn media_type(&self) -> Option<&str> {
        self.image.manifest_ref().media_type.as_deref()
    }

    /// Manifest digest.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest cannot be serialized.
    pub fn digest(&self) -> StrataResult<Digest> {
        self.image.manifest_digest()
    }

    /// The `org.opencontainers.image.ref.name` annotation.
    #[must_use]
    pub fn get_annotate_ref_name(&self) -> Option<&str> {
        self.image
            .manifest_ref()
            .annotations
            .get(annotations::REF_NAME)
            .map(String::as_str)
    }

    /// Whether manifest, config and layers agree.
    #[must_use]
    pub fn valid(&self) -> bool {
        self.image.validate().is_ok()
    }

    // Setters

    /// Set the `org.opencontainers.image.ref.name` annotation.
    pub fn annotate_ref_name(&mut self, ref_name: impl Into<String>) {
        let mut manifest = self.image.manifest_ref().clone();
        manifest
            .annotations
            .insert(annotations::REF_NAME.to_string(), ref_name.into());
        self.image = self.image.with_manifest(manifest);
    }

    /// Set the operating system.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be rewritten.
    pub fn set_os(&mut self, os: impl Into<String>) -> StrataResult<()> {
        let os = os.into();
        self.mutate_config_file(|c| c.os = os)
    }

    /// Set the CPU architecture.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be rewritten.
    pub fn set_architecture(&mut self, architecture: impl Into<String>) -> StrataResult<()> {
        let architecture = architecture.into();
        self.mutate_config_file(|c| c.architecture = architecture)
    }

    /// Set the architecture variant.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be rewritten.
    pub fn set_variant(&mut self, variant: impl Into<String>) -> StrataResult<()> {
        let variant = variant.into();
        self.mutate_config_file(|c| c.variant = Some(variant))
    }

    /// Set the OS version.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be rewritten.
    pub fn set_os_version(&mut self, os_version: impl Into<String>) -> StrataResult<()> {
        let os_version = os_version.into();
        self.mutate_config_file(|c| c.os_version = Some(os_version))
    }

    /// Replace the OS features.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be rewritten.
    pub fn set_os_features(&mut self, os_features: Vec<String>) -> StrataResult<()> {
        self.mutate_config_file(|c| c.os_features = os_features)
    }

    /// Add platform features to the session override.
    pub fn set_features(&self, features: &[String]) {
        self.overrides.lock().features.extend_from_slice(features);
    }

    /// Add config URLs to the session override.
    pub fn set_urls(&self, urls: &[String]) {
        self.overrides.lock().urls.extend_from_slice(urls);
    }

    /// Merge annotations into the session override.
    pub fn set_annotations(&self, annotations: &BTreeMap<String, String>) {
        self.overrides
            .lock()
            .annotations
            .extend(annotations.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    /// Set the default command.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be rewritten.
    pub fn set_cmd(&mut self, cmd: Vec<String>) -> StrataResult<()> {
        self.mutate_config_file(|c| c.exec_mut().cmd = Some(cmd))
    }

    /// Set the entrypoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be rewritten.
    pub fn set_entrypoint(&mut self, entrypoint: Vec<String>) -> StrataResult<()> {
        self.mutate_config_file(|c| c.exec_mut().entrypoint = Some(entrypoint))
    }

    /// Set an environment variable, replacing an existing entry in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be rewritten.
    pub fn set_env(&mut self, key: &str, value: &str) -> StrataResult<()> {
        self.mutate_config_file(|c| {
            let ignore_case = c.os == "windows";
            let entry = format!("{key}={value}");
            let env = &mut c.exec_mut().env;
            let existing = env.iter_mut().find(|e| {
                let name = e.split_once('=').map_or(e.as_str(), |(name, _)| name);
                env_key_matches(name, key, ignore_case)
            });
            match existing {
                Some(slot) => *slot = entry,
                None => env.push(entry),
            }
        })
    }

    /// Replace the history.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be rewritten.
    pub fn set_history(&mut self, history: Vec<HistoryEntry>) -> StrataResult<()> {
        self.mutate_config_file(|c| c.history = history)
    }

    /// Set a label.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be rewritten.
    pub fn set_label(&mut self, key: impl Into<String>, value: impl Into<String>) -> StrataResult<()> {
        let (key, value) = (key.into(), value.into());
        self.mutate_config_file(|c| {
            c.exec_mut().labels.insert(key, value);
        })
    }

    /// Remove a label if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be rewritten.
    pub fn remove_label(&mut self, key: &str) -> StrataResult<()> {
        self.mutate_config_file(|c| {
            if let Some(exec) = c.config.as_mut() {
                exec.labels.remove(key);
            }
        })
    }

    /// Set the working directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be rewritten.
    pub fn set_working_dir(&mut self, dir: impl Into<String>) -> StrataResult<()> {
        let dir = dir.into();
        self.mutate_config_file(|c| c.exec_mut().working_dir = Some(dir))
    }

    // Modifiers

    /// Append the layer tarball at `path` with blank history.
    ///
    /// # Errors
    ///
    /// Fails if the tarball cannot be read or the image cannot be rewritten.
    pub fn add_layer(&mut self, path: impl AsRef<Path>) -> StrataResult<()> {
        self.add_layer_with_history(Layer::from_path(path)?, empty_history())
    }

    /// Append the layer tarball at `path`, expecting the given diff ID.
    ///
    /// The diff ID is always computed from the content; a mismatch with the
    /// expected one is logged.
    ///
    /// # Errors
    ///
    /// Fails if the tarball cannot be read or the image cannot be rewritten.
    pub fn add_layer_with_diff_id(&mut self, path: impl AsRef<Path>, diff_id: &Digest) -> StrataResult<()> {
        self.add_layer_with_diff_id_and_history(path, diff_id, empty_history())
    }

    /// Append the layer tarball at `path` with a history entry.
    ///
    /// # Errors
    ///
    /// Fails if the tarball cannot be read or the image cannot be rewritten.
    pub fn add_layer_with_diff_id_and_history(
        &mut self,
        path: impl AsRef<Path>,
        diff_id: &Digest,
        history: HistoryEntry,
    ) -> StrataResult<()> {
        let layer = Layer::from_path(path.as_ref())?;
        if layer.diff_id() != diff_id {
            tracing::warn!(
                path = %path.as_ref().display(),
                expected = %diff_id,
                actual = %layer.diff_id(),
                "Layer diff ID differs from the expected one"
            );
        }
        self.add_layer_with_history(layer, history)
    }

    /// Append a layer.
    ///
    /// Without history preservation the entry is replaced by a blank one.
    /// Either way it is stamped with the session's build time.
    ///
    /// # Errors
    ///
    /// Returns an error if the image cannot be rewritten.
    pub fn add_layer_with_history(&mut self, layer: Layer, history: HistoryEntry) -> StrataResult<()> {
        let mut history = if self.preserve_history {
            history
        } else {
            empty_history()
        };
        history.created = Some(self.created_at);
        self.append_layer(layer, history)
    }

    /// Append a layer of the previous image, keeping its recorded history.
    ///
    /// # Errors
    ///
    /// Fails without a previous image, or if it has no layer `diff_id`.
    pub fn reuse_layer(&mut self, diff_id: &Digest) -> StrataResult<()> {
        let previous = self.previous_image.as_ref().ok_or(StrataError::NoPreviousImage)?;
        let config = config_file_of(previous.as_ref())?;
        let diff_ids = &config.rootfs.diff_ids;
        let index = diff_ids
            .iter()
            .position(|d| d == diff_id)
            .ok_or_else(|| StrataError::LayerNotFound {
                diff_id: diff_id.to_string(),
                context: "failed to find diffID in previous image config file".to_string(),
            })?;
        let history = normalized_history(&config.history, diff_ids.len())
            .into_iter()
            .nth(index)
            .ok_or_else(|| StrataError::Internal {
                message: format!("no history at index {index} after normalization"),
            })?;
        self.reuse_layer_with_history(diff_id, history)
    }

    /// Append a layer of the previous image with a history entry.
    ///
    /// The layer object is reused as is; its content is not read again.
    ///
    /// # Errors
    ///
    /// Fails without a previous image, or if it has no layer `diff_id`.
    pub fn reuse_layer_with_history(&mut self, diff_id: &Digest, history: HistoryEntry) -> StrataResult<()> {
        let previous = self.previous_image.as_ref().ok_or(StrataError::NoPreviousImage)?;
        let layer = previous.layer_by_diff_id(diff_id)?;
        let history = if self.preserve_history {
            HistoryEntry {
                created: Some(self.created_at),
                ..history
            }
        } else {
            empty_history()
        };
        tracing::debug!(diff_id = diff_id.short(), "Reusing layer from previous image");
        self.append_layer(layer, history)
    }

    /// Replace every layer up to and including `base_top_layer` with the
    /// layers of `new_base`.
    ///
    /// Architecture, OS and OS version are taken from the new base; variant
    /// and OS features are kept. The image is left untouched on failure.
    ///
    /// # Errors
    ///
    /// Fails if `base_top_layer` is not in the image or the new base cannot
    /// be read.
    pub fn rebase<R: ImageReader + ?Sized>(&mut self, base_top_layer: &Digest, new_base: &R) -> StrataResult<()> {
        let old_base = BasePrefix::new(&self.image, base_top_layer.clone());
        let rebased = rebase(&self.image, &old_base, new_base)?;
        let new_base_config = config_file_of(new_base)?;

        let mut config = rebased.config_ref().clone();
        config.architecture = new_base_config.architecture;
        config.os = new_base_config.os;
        config.os_version = new_base_config.os_version;
        self.image = with_mirrored_config(&rebased, config)?;

        tracing::info!(top_layer = %base_top_layer, layers = self.image.layer_list().len(), "Image rebased");
        Ok(())
    }

    // Helpers

    /// Rewrite the config document and mirror its platform into the manifest.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized.
    pub fn mutate_config_file<F>(&mut self, mutate: F) -> StrataResult<()>
    where
        F: FnOnce(&mut ImageConfig),
    {
        let mut config = config_file_of(&self.image)?;
        mutate(&mut config);
        self.image = with_mirrored_config(&self.image, config)?;
        Ok(())
    }

    /// Stamp the build time on the config and its history.
    ///
    /// With history preservation every entry is restamped; otherwise every
    /// entry is reduced to the timestamp alone.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be rewritten.
    pub fn set_created_at_and_history(&mut self) -> StrataResult<()> {
        let created_at = self.created_at;
        let preserve_history = self.preserve_history;
        self.mutate_config_file(|c| {
            c.created = Some(created_at);
            c.container = None;
            for entry in &mut c.history {
                if preserve_history {
                    entry.created = Some(created_at);
                } else {
                    *entry = HistoryEntry::blank(created_at);
                }
            }
        })
    }

    /// Write the platform and session overrides into the manifest before save.
    ///
    /// Features are appended to the platform; annotations are merged only
    /// when the manifest format carries them.
    pub(crate) fn mutate_manifest_for_save(&mut self) {
        let manifest = {
            let overrides = self.overrides.lock();
            let config = self.config();
            let mut manifest = self.image.manifest_ref().clone();
            mirror_platform(&mut manifest, config);

            if let Ok(features) = self.features_with(&overrides) {
                let platform = manifest.platform_mut();
                for feature in features {
                    if !platform.features.contains(&feature) {
                        platform.features.push(feature);
                    }
                }
            }
            if self.format().carries(ManifestField::Annotations) {
                if let Ok(annotations) = self.annotations_with(&overrides) {
                    manifest.annotations.extend(annotations);
                }
            }
            manifest
        };
        self.image = self.image.with_manifest(manifest);
    }

    fn config(&self) -> &ImageConfig {
        self.image.config_ref()
    }

    fn is_windows(&self) -> bool {
        self.config().os == "windows"
    }

    /// Format deciding field carriage: the session's, or the manifest's own
    /// when the session keeps existing types.
    fn format(&self) -> MediaTypes {
        match self.media_types {
            MediaTypes::Missing | MediaTypes::Default => {
                MediaTypes::from_manifest_type(self.media_type())
            }
            types => types,
        }
    }

    fn unsupported(&self, field: ManifestField) -> StrataError {
        let format = self.format().manifest_type();
        StrataError::UnsupportedField {
            field: field.to_string(),
            format: if format.is_empty() {
                self.media_type().unwrap_or_default().to_string()
            } else {
                format.to_string()
            },
        }
    }

    fn features_with(&self, overrides: &SessionOverrides) -> StrataResult<Vec<String>> {
        if !overrides.features.is_empty() {
            return Ok(overrides.features.clone());
        }
        let features = self
            .image
            .manifest_ref()
            .config
            .platform
            .as_ref()
            .map(|p| p.features.clone())
            .unwrap_or_default();
        self.carried(ManifestField::Features, features)
    }

    fn urls_with(&self, overrides: &SessionOverrides) -> StrataResult<Vec<String>> {
        if !overrides.urls.is_empty() {
            return Ok(overrides.urls.clone());
        }
        let urls = self.image.manifest_ref().config.urls.clone();
        self.carried(ManifestField::Urls, urls)
    }

    fn annotations_with(&self, overrides: &SessionOverrides) -> StrataResult<BTreeMap<String, String>> {
        if !overrides.annotations.is_empty() {
            return Ok(overrides.annotations.clone());
        }
        let annotations = self.image.manifest_ref().annotations.clone();
        if annotations.is_empty() || !self.format().carries(ManifestField::Annotations) {
            return Err(self.unsupported(ManifestField::Annotations));
        }
        Ok(annotations)
    }

    fn carried(&self, field: ManifestField, values: Vec<String>) -> StrataResult<Vec<String>> {
        if values.is_empty() || !self.format().carries(field) {
            return Err(self.unsupported(field));
        }
        Ok(values)
    }

    /// Normalize history against the diff IDs, then append one layer.
    fn append_layer(&mut self, layer: Layer, history: HistoryEntry) -> StrataResult<()> {
        let mut config = self.config().clone();
        config.history = normalized_history(&config.history, config.rootfs.diff_ids.len());
        let normalized = with_mirrored_config(&self.image, config)?;

        let compression = layer.compression();
        let media_type = self.media_types.layer_type_for(compression);
        if media_type.is_none() && matches!(self.media_types, MediaTypes::Oci | MediaTypes::Docker) {
            tracing::warn!(
                diff_id = layer.diff_id().short(),
                media_type = layer.media_type(),
                ?compression,
                format = self.media_types.manifest_type(),
                "Layer compression has no media type in this format, keeping its own"
            );
        }
        let mut addendum = Addendum::new(layer).with_history(history);
        if let Some(media_type) = media_type {
            addendum = addendum.with_media_type(media_type);
        }
        self.image = normalized.append(addendum)?;
        Ok(())
    }
}

impl ImageReader for ImageCore {
    fn config_file(&self) -> StrataResult<Option<ImageConfig>> {
        self.image.config_file()
    }

    fn manifest(&self) -> StrataResult<Option<ImageManifest>> {
        self.image.manifest()
    }

    fn layers(&self) -> StrataResult<Vec<Layer>> {
        self.image.layers()
    }

    fn raw_config_file(&self) -> StrataResult<Option<Bytes>> {
        self.image.raw_config_file()
    }

    fn raw_manifest_file(&self) -> StrataResult<Option<Bytes>> {
        self.image.raw_manifest_file()
    }

    fn size(&self) -> StrataResult<i64> {
        self.image.size()
    }
}

impl std::fmt::Debug for ImageCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageCore")
            .field("image", &self.image)
            .field("created_at", &self.created_at)
            .field("media_types", &self.media_types)
            .field("preserve_history", &self.preserve_history)
            .field("preserve_digest", &self.preserve_digest)
            .field("without_layers", &self.without_layers)
            .field("previous_image", &self.previous_image.is_some())
            .field("overrides", &*self.overrides.lock())
            .finish()
    }
}

fn env_key_matches(found: &str, wanted: &str, ignore_case: bool) -> bool {
    if ignore_case {
        found.eq_ignore_ascii_case(wanted)
    } else {
        found == wanted
    }
}

/// Copy the config's platform fields into the manifest's config descriptor.
fn mirror_platform(manifest: &mut ImageManifest, config: &ImageConfig) {
    let platform = manifest.platform_mut();
    platform.os.clone_from(&config.os);
    platform.architecture.clone_from(&config.architecture);
    platform.variant.clone_from(&config.variant);
    platform.os_version.clone_from(&config.os_version);
    platform.os_features.clone_from(&config.os_features);
}

fn with_mirrored_config(image: &OciImage, config: ImageConfig) -> StrataResult<OciImage> {
    let updated = image.with_config(config)?;
    let mut manifest = updated.manifest_ref().clone();
    mirror_platform(&mut manifest, updated.config_ref());
    Ok(updated.with_manifest(manifest))
}
