//! OCI image layout storage.
//!
//! This module handles:
//! - Reading and writing layout directories (`oci-layout`, `index.json`,
//!   `blobs/sha256/`)
//! - Selecting one manifest of an index for a platform
//! - Layout-backed image sessions

mod image;
mod select;
mod store;

pub use image::{LayoutIdentifier, LayoutImage, LayoutWriter};
pub use select::{image_exists, read_image, select_manifest};
pub use store::Layout;
