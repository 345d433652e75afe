//! Layout-backed image sessions.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use strata_common::{Digest, StrataResult};
use strata_oci::{ImageConfig, ImageManifest, Platform};

use super::select::{image_exists, read_image};
use super::store::Layout;
use crate::image::OciImage;
use crate::layer::Layer;
use crate::options::ImageOptions;
use crate::reader::ImageReader;
use crate::save::{AppendOptions, ImageWriter};
use crate::session::ImageCore;

/// Writes images into layout directories named by path.
///
/// Each destination is reinitialized with an empty index before the image
/// is appended, so the destination ends up holding exactly this image.
#[derive(Debug, Clone, Copy, Default)]
pub struct LayoutWriter;

impl ImageWriter for LayoutWriter {
    fn append_image(&self, destination: &str, image: &OciImage, options: &AppendOptions) -> StrataResult<()> {
        let layout = Layout::init(destination)?;
        layout.append_image(image, options)?;
        Ok(())
    }
}

/// Identifies a saved layout image: `path@digest`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutIdentifier {
    /// Layout directory.
    pub path: PathBuf,
    /// Manifest digest.
    pub digest: Digest,
}

impl fmt::Display for LayoutIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.path.display(), self.digest)
    }
}

/// An image session saved to an OCI layout directory.
#[derive(Debug)]
pub struct LayoutImage {
    core: ImageCore,
    repo_path: PathBuf,
}

impl LayoutImage {
    /// Start a session that saves to `path`.
    ///
    /// Base and previous images given by layout path are loaded for the
    /// options' platform, linux/amd64 by default. An explicit base image
    /// wins over a base image path.
    ///
    /// # Errors
    ///
    /// Fails if an existing base or previous layout cannot be read.
    pub fn new_image(path: impl Into<PathBuf>, options: ImageOptions) -> StrataResult<Self> {
        let mut options = options;
        let platform = options
            .platform
            .get_or_insert_with(Platform::linux_amd64)
            .clone();

        if let Some(previous_path) = &options.previous_image_path {
            if let Some(previous) = read_image(previous_path, &platform)? {
                options.previous_image = Some(Arc::new(previous));
            }
        }
        if options.base_image.is_none() {
            if let Some(base_path) = &options.base_image_path {
                if let Some(base) = read_image(base_path, &platform)? {
                    options.base_image = Some(Arc::new(base));
                }
            }
        }

        let core = ImageCore::new(&options)?;
        Ok(Self {
            core,
            repo_path: path.into(),
        })
    }

    /// The mutation session.
    #[must_use]
    pub const fn core(&self) -> &ImageCore {
        &self.core
    }

    /// The mutation session, mutably.
    pub const fn core_mut(&mut self) -> &mut ImageCore {
        &mut self.core
    }

    /// Path the image saves to.
    #[must_use]
    pub fn name(&self) -> &Path {
        &self.repo_path
    }

    /// Save to another path from now on.
    pub fn rename(&mut self, name: impl Into<PathBuf>) {
        self.repo_path = name.into();
    }

    /// Whether a layout exists at the image's path.
    #[must_use]
    pub fn found(&self) -> bool {
        image_exists(&self.repo_path)
    }

    /// The image's path and current manifest digest.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest cannot be serialized.
    pub fn identifier(&self) -> StrataResult<LayoutIdentifier> {
        Ok(LayoutIdentifier {
            path: self.repo_path.clone(),
            digest: self.core.digest()?,
        })
    }

    /// Remove the layout directory at the image's path, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory exists but cannot be removed.
    pub fn delete(&self) -> StrataResult<()> {
        if self.repo_path.exists() {
            fs::remove_dir_all(&self.repo_path)?;
            tracing::info!(path = %self.repo_path.display(), "Layout deleted");
        }
        Ok(())
    }

    /// Save to the image's path and every additional path.
    ///
    /// # Errors
    ///
    /// See [`ImageCore::save_as`].
    pub fn save(&mut self, additional_names: &[&str]) -> StrataResult<()> {
        let name = self.repo_path.to_string_lossy().into_owned();
        self.save_as(&name, additional_names)
    }

    /// Save to `name` and every additional path, ignoring the image's path.
    ///
    /// # Errors
    ///
    /// See [`ImageCore::save_as`].
    pub fn save_as(&mut self, name: &str, additional_names: &[&str]) -> StrataResult<()> {
        self.core.save_as(&LayoutWriter, name, additional_names)
    }

    /// Whether manifest, config and layers agree.
    #[must_use]
    pub fn valid(&self) -> bool {
        self.core.valid()
    }
}

impl ImageReader for LayoutImage {
    fn config_file(&self) -> StrataResult<Option<ImageConfig>> {
        self.core.config_file()
    }

    fn manifest(&self) -> StrataResult<Option<ImageManifest>> {
        self.core.manifest()
    }

    fn layers(&self) -> StrataResult<Vec<Layer>> {
        self.core.layers()
    }

    fn raw_config_file(&self) -> StrataResult<Option<Bytes>> {
        self.core.raw_config_file()
    }

    fn raw_manifest_file(&self) -> StrataResult<Option<Bytes>> {
        self.core.raw_manifest_file()
    }

    fn size(&self) -> StrataResult<i64> {
        self.core.size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_linux_amd64() {
        let dir = tempfile::tempdir().unwrap();
        let image = LayoutImage::new_image(dir.path().join("app"), ImageOptions::default()).unwrap();
        assert_eq!(image.core().os(), "linux");
        assert_eq!(image.core().architecture(), "amd64");
        assert!(!image.found());
    }

    #[test]
    fn save_then_found_and_identified() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app");
        let mut image = LayoutImage::new_image(&path, ImageOptions::default()).unwrap();
        image.save(&[]).unwrap();
        assert!(image.found());

        let identifier = image.identifier().unwrap();
        assert_eq!(
            identifier.to_string(),
            format!("{}@{}", path.display(), image.core().digest().unwrap())
        );

        image.delete().unwrap();
        assert!(!image.found());
    }

    #[test]
    fn rename_changes_save_target() {
        let dir = tempfile::tempdir().unwrap();
        let mut image = LayoutImage::new_image(dir.path().join("first"), ImageOptions::default()).unwrap();
        image.rename(dir.path().join("second"));
        image.save(&[]).unwrap();
        assert!(dir.path().join("second").join("index.json").is_file());
        assert!(!dir.path().join("first").exists());
    }
}
