//! # strata-image
//!
//! Container image mutation engine for Strata.
//!
//! This crate provides:
//! - An immutable in-memory image value and the layers it is built from
//! - A mutation session that keeps config and manifest consistent
//! - Layer append, reuse from a previous image, and rebase onto a new base
//! - Media-type negotiation between OCI and Docker formats
//! - Saving to several destinations, including OCI image layouts
//!
//! ```no_run
//! use strata_image::{ImageOptions, LayoutImage};
//!
//! # fn main() -> strata_common::StrataResult<()> {
//! let mut image = LayoutImage::new_image(
//!     "/tmp/app",
//!     ImageOptions::default().with_base_image_path("/tmp/base"),
//! )?;
//! image.core_mut().add_layer("/tmp/layer.tar")?;
//! image.core_mut().set_label("io.buildpacks.stack.id", "heroku-22")?;
//! image.save(&["/tmp/app-latest"])?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod history;
pub mod image;
pub mod layer;
pub mod layout;
pub mod media;
pub mod options;
pub mod reader;
pub mod rebase;
pub mod save;
pub mod session;

pub use history::{empty_history, normalized_history};
pub use image::{Addendum, OciImage};
pub use layer::{Compression, Layer};
pub use layout::{Layout, LayoutImage, LayoutWriter};
pub use media::{ManifestField, MediaTypes, ensure_media_types, preferred_media_types};
pub use options::ImageOptions;
pub use reader::ImageReader;
pub use save::{AppendOptions, ImageWriter};
pub use session::ImageCore;
