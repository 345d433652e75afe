//! # strata-oci
//!
//! OCI (Open Container Initiative) image document types for Strata.
//!
//! This crate provides Rust types for:
//! - Image configs (the config document)
//! - Image manifests and indexes
//! - Well-known media types and annotation keys

#![warn(missing_docs)]

pub mod image;

pub use image::{
    Descriptor, ExecutionConfig, HistoryEntry, ImageConfig, ImageIndex, ImageManifest, Platform,
    RootFs,
};
