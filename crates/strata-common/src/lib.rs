//! # strata-common
//!
//! Shared utilities and types for the Strata image engine.
//!
//! This crate provides common functionality used across all Strata crates:
//! - Content-addressed digests
//! - Process-wide defaults (build timestamp)
//! - Common error types, including the aggregate save failure

#![warn(missing_docs)]

pub mod defaults;
pub mod digest;
pub mod error;

pub use defaults::{NORMALIZED_DATE_TIME, default_created_at};
pub use digest::Digest;
pub use error::{DocumentKind, SaveDiagnostic, SaveError, StrataError, StrataResult};
