//! Layer rebasing.
//!
//! Rebasing swaps the layers an image inherited from its base for the layers
//! of a new base, keeping every layer added on top in order.

use strata_common::{Digest, StrataError, StrataResult};
use strata_oci::{ImageConfig, ImageManifest};

use crate::history::normalized_history;
use crate::image::{Addendum, OciImage};
use crate::layer::Layer;
use crate::reader::{ImageReader, config_file_of, manifest_of};

/// An image seen only up to and including one of its layers.
///
/// Stands in for the old base of an image during a rebase. Everything but
/// the layer list is read from the wrapped image.
pub struct BasePrefix<'a, R: ImageReader + ?Sized> {
    image: &'a R,
    top_layer: Digest,
}

impl<'a, R: ImageReader + ?Sized> BasePrefix<'a, R> {
    /// View `image` up to and including `top_layer`.
    pub const fn new(image: &'a R, top_layer: Digest) -> Self {
        Self { image, top_layer }
    }
}

impl<R: ImageReader + ?Sized> ImageReader for BasePrefix<'_, R> {
    fn config_file(&self) -> StrataResult<Option<ImageConfig>> {
        self.image.config_file()
    }

    fn manifest(&self) -> StrataResult<Option<ImageManifest>> {
        self.image.manifest()
    }

    fn layers(&self) -> StrataResult<Vec<Layer>> {
        let mut all = self.image.layers()?;
        let top = all
            .iter()
            .position(|layer| layer.diff_id() == &self.top_layer)
            .ok_or_else(|| StrataError::LayerNotFound {
                diff_id: self.top_layer.to_string(),
                context: "could not find base layer in image".to_string(),
            })?;
        all.truncate(top + 1);
        Ok(all)
    }

    fn size(&self) -> StrataResult<i64> {
        self.image.size()
    }
}

/// Splice `orig`'s layers above `old_base` onto all of `new_base`'s layers.
///
/// The result keeps `orig`'s config (execution settings, labels, platform)
/// and manifest metadata; history follows the layers it belongs to.
///
/// # Errors
///
/// Fails if `old_base`'s layers cannot be listed, are not a prefix of
/// `orig`'s layers, or any config document is missing.
pub fn rebase<O, B, N>(orig: &O, old_base: &B, new_base: &N) -> StrataResult<OciImage>
where
    O: ImageReader + ?Sized,
    B: ImageReader + ?Sized,
    N: ImageReader + ?Sized,
{
    let orig_layers = orig.layers()?;
    let old_base_layers = old_base.layers()?;

    if old_base_layers.len() > orig_layers.len() {
        return Err(StrataError::NotBasedOn {
            reason: "too few layers".to_string(),
        });
    }
    for (i, (old, current)) in old_base_layers.iter().zip(&orig_layers).enumerate() {
        if old.diff_id() != current.diff_id() {
            return Err(StrataError::NotBasedOn {
                reason: format!("layer {i} mismatch"),
            });
        }
    }

    let orig_config = config_file_of(orig)?;
    let orig_manifest = manifest_of(orig)?;
    let new_base_config = config_file_of(new_base)?;
    let new_base_layers = new_base.layers()?;

    let orig_history = normalized_history(&orig_config.history, orig_layers.len());
    let new_base_history = normalized_history(&new_base_config.history, new_base_layers.len());

    tracing::info!(
        replaced = old_base_layers.len(),
        kept = orig_layers.len() - old_base_layers.len(),
        new_base = new_base_layers.len(),
        "Rebasing image"
    );

    let mut skeleton_config = orig_config;
    skeleton_config.rootfs.diff_ids.clear();
    skeleton_config.history.clear();
    let mut skeleton_manifest = orig_manifest;
    skeleton_manifest.layers.clear();

    let skeleton = OciImage::from_parts(skeleton_config, skeleton_manifest)?;

    let base_part = new_base_layers.into_iter().zip(new_base_history);
    let app_part = orig_layers
        .into_iter()
        .zip(orig_history)
        .skip(old_base_layers.len());

    base_part
        .chain(app_part)
        .try_fold(skeleton, |image, (layer, history)| {
            image.append(Addendum::new(layer).with_history(history))
        })
}
