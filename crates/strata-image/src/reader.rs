//! Read access to an image.
//!
//! [`ImageReader`] is the narrow capability every image source provides:
//! the two documents and the ordered layers. Views that change one aspect of
//! an image (such as the base-prefix view used by rebase) hold another reader
//! and delegate everything they do not override.

use bytes::Bytes;
use strata_common::{Digest, StrataError, StrataResult};
use strata_oci::{ImageConfig, ImageManifest};

use crate::layer::Layer;

/// Read access to an image's config, manifest and layers.
pub trait ImageReader: Send + Sync {
    /// The config document, if the image has one.
    fn config_file(&self) -> StrataResult<Option<ImageConfig>>;

    /// The manifest document, if the image has one.
    fn manifest(&self) -> StrataResult<Option<ImageManifest>>;

    /// Layers in order, base first.
    fn layers(&self) -> StrataResult<Vec<Layer>>;

    /// The config document exactly as stored, when the source keeps it.
    fn raw_config_file(&self) -> StrataResult<Option<Bytes>> {
        Ok(None)
    }

    /// The manifest document exactly as stored, when the source keeps it.
    fn raw_manifest_file(&self) -> StrataResult<Option<Bytes>> {
        Ok(None)
    }

    /// The layer with the given diff ID.
    fn layer_by_diff_id(&self, diff_id: &Digest) -> StrataResult<Layer> {
        self.layers()?
            .into_iter()
            .find(|layer| layer.diff_id() == diff_id)
            .ok_or_else(|| StrataError::LayerNotFound {
                diff_id: diff_id.to_string(),
                context: "failed to get layer by diffID".to_string(),
            })
    }

    /// Size of the serialized manifest.
    fn size(&self) -> StrataResult<i64> {
        let raw = serde_json::to_vec(&manifest_of(self)?)?;
        Ok(i64::try_from(raw.len()).unwrap_or(i64::MAX))
    }
}

/// The config document, failing if it is absent.
///
/// # Errors
///
/// Returns [`StrataError::MissingDocument`] if the image has no config.
pub fn config_file_of<R: ImageReader + ?Sized>(image: &R) -> StrataResult<ImageConfig> {
    image.config_file()?.ok_or_else(StrataError::missing_config)
}

/// The manifest document, failing if it is absent.
///
/// # Errors
///
/// Returns [`StrataError::MissingDocument`] if the image has no manifest.
pub fn manifest_of<R: ImageReader + ?Sized>(image: &R) -> StrataResult<ImageManifest> {
    image.manifest()?.ok_or_else(StrataError::missing_manifest)
}
