//! Multi-destination save.
//!
//! A session is saved under one or more names. Each destination is written
//! independently; failures are collected and reported together once every
//! destination has been attempted.

use std::collections::BTreeMap;

use strata_common::{SaveDiagnostic, SaveError, StrataResult};
use strata_oci::image::annotations;

use crate::image::OciImage;
use crate::session::ImageCore;

/// Options passed to a writer for every destination of a save.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppendOptions {
    /// Annotations for the index entry pointing at the image.
    pub annotations: BTreeMap<String, String>,
    /// Write manifest and config but no layer blobs.
    pub without_layers: bool,
}

/// Materializes an image at a named destination.
pub trait ImageWriter {
    /// Write `image` to `destination`, preparing the destination first.
    ///
    /// # Errors
    ///
    /// Returns the cause of failure for this destination only.
    fn append_image(&self, destination: &str, image: &OciImage, options: &AppendOptions) -> StrataResult<()>;
}

impl ImageCore {
    /// Save the image to `name` and every additional name.
    ///
    /// Unless digest preservation was requested, the build time is stamped
    /// and the platform and session overrides are written into the manifest
    /// first.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::Save`](strata_common::StrataError::Save) listing
    /// every destination that failed; the others were written.
    pub fn save_as<W: ImageWriter + ?Sized>(
        &mut self,
        writer: &W,
        name: &str,
        additional_names: &[&str],
    ) -> StrataResult<()> {
        if !self.preserve_digest() {
            self.set_created_at_and_history()?;
        }

        let mut options = AppendOptions {
            without_layers: self.without_layers(),
            ..AppendOptions::default()
        };
        if let Some(ref_name) = self.get_annotate_ref_name() {
            options
                .annotations
                .insert(annotations::REF_NAME.to_string(), ref_name.to_string());
        }

        if !self.preserve_digest() {
            self.mutate_manifest_for_save();
        }

        let mut errors = Vec::new();
        for destination in std::iter::once(name).chain(additional_names.iter().copied()) {
            match writer.append_image(destination, self.image(), &options) {
                Ok(()) => tracing::info!(destination, "Image saved"),
                Err(cause) => {
                    tracing::warn!(destination, error = %cause, "Failed to save image");
                    errors.push(SaveDiagnostic::new(destination, cause));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(SaveError { errors }.into())
        }
    }
}
