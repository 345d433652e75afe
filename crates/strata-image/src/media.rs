//! Media-type negotiation.
//!
//! Decides which manifest, config and layer media types an image is written
//! with, and which optional metadata fields a manifest format can carry.

use std::fmt;

use strata_common::StrataResult;
use strata_oci::image::media_types;

use crate::image::OciImage;
use crate::layer::{Compression, Layer};
use crate::reader::{ImageReader, manifest_of};

/// Preferred media types for an image session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MediaTypes {
    /// Not specified; resolved from the base image.
    #[default]
    Missing,
    /// Keep whatever types the image already has.
    Default,
    /// OCI image types.
    Oci,
    /// Docker v2 schema 2 types.
    Docker,
}

/// Optional manifest fields whose carriage depends on the format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestField {
    /// Platform features.
    Features,
    /// Config descriptor URLs.
    Urls,
    /// Manifest annotations.
    Annotations,
}

impl fmt::Display for ManifestField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Features => write!(f, "features"),
            Self::Urls => write!(f, "urls"),
            Self::Annotations => write!(f, "annotations"),
        }
    }
}

impl MediaTypes {
    /// Manifest media type, empty when unspecified.
    #[must_use]
    pub const fn manifest_type(self) -> &'static str {
        match self {
            Self::Oci => media_types::MANIFEST,
            Self::Docker => media_types::DOCKER_MANIFEST,
            Self::Missing | Self::Default => "",
        }
    }

    /// Config media type, empty when unspecified.
    #[must_use]
    pub const fn config_type(self) -> &'static str {
        match self {
            Self::Oci => media_types::CONFIG,
            Self::Docker => media_types::DOCKER_CONFIG,
            Self::Missing | Self::Default => "",
        }
    }

    /// Layer media type for uncompressed layers, empty when unspecified.
    #[must_use]
    pub const fn layer_type(self) -> &'static str {
        match self {
            Self::Oci => media_types::LAYER_TAR,
            Self::Docker => media_types::DOCKER_LAYER_TAR,
            Self::Missing | Self::Default => "",
        }
    }

    /// Layer media type for a given compression.
    ///
    /// `None` means the layer keeps its current type, either because no
    /// format is preferred or the format has no type for that compression.
    /// Docker v2 has no zstd layer type, so a zstd layer in a Docker image
    /// keeps its OCI `tar+zstd` type next to Docker manifest and config types.
    #[must_use]
    pub const fn layer_type_for(self, compression: Compression) -> Option<&'static str> {
        match (self, compression) {
            (Self::Oci, c) => Some(c.oci_media_type()),
            (Self::Docker, Compression::None) => Some(media_types::DOCKER_LAYER_TAR),
            (Self::Docker, Compression::Gzip) => Some(media_types::DOCKER_LAYER),
            (Self::Docker, Compression::Zstd) | (Self::Missing | Self::Default, _) => None,
        }
    }

    /// Types implied by a manifest media type. A manifest without a media
    /// type is OCI.
    #[must_use]
    pub fn from_manifest_type(media_type: Option<&str>) -> Self {
        match media_type {
            Some(media_types::DOCKER_MANIFEST) => Self::Docker,
            _ => Self::Oci,
        }
    }

    /// Whether manifests of this format can carry the field.
    #[must_use]
    pub const fn carries(self, field: ManifestField) -> bool {
        match self {
            Self::Oci => true,
            Self::Docker => !matches!(field, ManifestField::Annotations),
            Self::Missing | Self::Default => false,
        }
    }
}

/// Choose the session's media types.
///
/// An explicit choice wins; otherwise the base image's manifest decides;
/// with no base image the result is OCI.
///
/// # Errors
///
/// Returns an error if the base image's manifest cannot be read.
pub fn preferred_media_types(
    requested: MediaTypes,
    base: Option<&dyn ImageReader>,
) -> StrataResult<MediaTypes> {
    if requested != MediaTypes::Missing {
        return Ok(requested);
    }
    match base {
        None => Ok(MediaTypes::Oci),
        Some(base) => {
            let manifest = manifest_of(base)?;
            Ok(MediaTypes::from_manifest_type(manifest.media_type.as_deref()))
        }
    }
}

/// Rewrite an image's manifest, config and layer types to `types`.
///
/// Layers keep their compression; annotations are dropped when the target
/// format cannot carry them. `Missing` and `Default` leave the image as is.
///
/// # Errors
///
/// Returns an error if the image's documents cannot be read or rewritten.
pub fn ensure_media_types(image: &OciImage, types: MediaTypes) -> StrataResult<OciImage> {
    if matches!(types, MediaTypes::Missing | MediaTypes::Default) {
        return Ok(image.clone());
    }

    let layers: Vec<Layer> = image
        .layer_list()
        .iter()
        .map(|layer| match types.layer_type_for(layer.compression()) {
            Some(media_type) if media_type != layer.media_type() => {
                layer.with_media_type(media_type)
            }
            _ => layer.clone(),
        })
        .collect();

    let mut manifest = manifest_of(image)?;
    if manifest.media_type.as_deref() == Some(types.manifest_type())
        && manifest.config.media_type == types.config_type()
        && manifest
            .layers
            .iter()
            .zip(&layers)
            .all(|(d, l)| d.media_type == l.media_type())
    {
        return Ok(image.clone());
    }

    tracing::debug!(manifest_type = types.manifest_type(), "Converting image media types");

    manifest.media_type = Some(types.manifest_type().to_string());
    manifest.config.media_type = types.config_type().to_string();
    for (descriptor, layer) in manifest.layers.iter_mut().zip(&layers) {
        descriptor.media_type = layer.media_type().to_string();
    }
    if !types.carries(ManifestField::Annotations) {
        manifest.annotations.clear();
    }

    Ok(image.with_layers_and_manifest(layers, manifest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_tables() {
        assert_eq!(MediaTypes::Oci.manifest_type(), media_types::MANIFEST);
        assert_eq!(MediaTypes::Docker.config_type(), media_types::DOCKER_CONFIG);
        assert_eq!(MediaTypes::Docker.layer_type(), media_types::DOCKER_LAYER_TAR);
        assert_eq!(MediaTypes::Missing.manifest_type(), "");
        assert_eq!(
            MediaTypes::Docker.layer_type_for(Compression::Gzip),
            Some(media_types::DOCKER_LAYER)
        );
        assert_eq!(MediaTypes::Docker.layer_type_for(Compression::Zstd), None);
        assert_eq!(MediaTypes::Default.layer_type_for(Compression::None), None);
    }

    #[test]
    fn field_carriage() {
        assert!(MediaTypes::Oci.carries(ManifestField::Annotations));
        assert!(MediaTypes::Docker.carries(ManifestField::Features));
        assert!(MediaTypes::Docker.carries(ManifestField::Urls));
        assert!(!MediaTypes::Docker.carries(ManifestField::Annotations));
        assert!(!MediaTypes::Missing.carries(ManifestField::Features));
    }

    #[test]
    fn preferred_types() {
        assert_eq!(
            preferred_media_types(MediaTypes::Docker, None).unwrap(),
            MediaTypes::Docker
        );
        assert_eq!(
            preferred_media_types(MediaTypes::Missing, None).unwrap(),
            MediaTypes::Oci
        );

        let docker_base = OciImage::empty(MediaTypes::Docker).unwrap();
        assert_eq!(
            preferred_media_types(MediaTypes::Missing, Some(&docker_base)).unwrap(),
            MediaTypes::Docker
        );
    }

    #[test]
    fn converts_docker_image_to_oci() {
        let layer = Layer::from_bytes(b"content".to_vec()).unwrap();
        let image = OciImage::empty(MediaTypes::Docker)
            .unwrap()
            .append(crate::image::Addendum::new(layer).with_media_type(media_types::DOCKER_LAYER_TAR))
            .unwrap();

        let converted = ensure_media_types(&image, MediaTypes::Oci).unwrap();
        let manifest = manifest_of(&converted).unwrap();
        assert_eq!(manifest.media_type.as_deref(), Some(media_types::MANIFEST));
        assert_eq!(manifest.config.media_type, media_types::CONFIG);
        assert_eq!(manifest.layers[0].media_type, media_types::LAYER_TAR);
        assert_eq!(converted.layer_list()[0].media_type(), media_types::LAYER_TAR);
        assert_eq!(
            converted.layer_list()[0].diff_id(),
            image.layer_list()[0].diff_id()
        );
    }

    #[test]
    fn matching_types_are_left_alone() {
        let image = OciImage::empty(MediaTypes::Oci).unwrap();
        let same = ensure_media_types(&image, MediaTypes::Oci).unwrap();
        assert_eq!(same.manifest_digest().unwrap(), image.manifest_digest().unwrap());
    }
}
