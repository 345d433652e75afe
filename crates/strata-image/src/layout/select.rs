//! Reading an image out of a layout for a platform.

use std::path::Path;

use strata_common::{StrataError, StrataResult};
use strata_oci::{Descriptor, ImageIndex, Platform};

use super::store::Layout;
use crate::image::OciImage;

/// Whether `path` holds a layout with an index.
#[must_use]
pub fn image_exists(path: &Path) -> bool {
    path.exists() && Layout::exists_at(path)
}

/// Pick the manifest of `index` to use for `platform`.
///
/// A single manifest is used whatever its platform. With several, the first
/// whose OS and architecture match wins.
///
/// # Errors
///
/// Fails if the index is empty, or if none of several manifests matches.
pub fn select_manifest<'a>(index: &'a ImageIndex, platform: &Platform) -> StrataResult<&'a Descriptor> {
    match index.manifests.as_slice() {
        [] => Err(StrataError::InvalidImage {
            reason: "failed to find manifest at index".to_string(),
        }),
        [only] => Ok(only),
        manifests => manifests
            .iter()
            .find(|m| {
                m.platform
                    .as_ref()
                    .is_some_and(|p| p.os == platform.os && p.architecture == platform.architecture)
            })
            .ok_or_else(|| StrataError::PlatformNotFound {
                platform: platform.to_string(),
            }),
    }
}

/// Load the image stored at `path` for `platform`.
///
/// Returns `None` when no layout exists at `path`.
///
/// # Errors
///
/// Fails if the layout exists but its index or selected image cannot be read.
pub fn read_image(path: &Path, platform: &Platform) -> StrataResult<Option<OciImage>> {
    if !image_exists(path) {
        return Ok(None);
    }
    let layout = Layout::open(path)?;
    let index = layout.index()?;
    let descriptor = select_manifest(&index, platform)?;

    tracing::debug!(
        path = %path.display(),
        digest = %descriptor.digest,
        %platform,
        "Loading image from layout"
    );
    layout.image(descriptor).map(Some)
}
