//! Common error types for the Strata image engine.

use std::fmt;

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias using [`StrataError`].
pub type StrataResult<T> = Result<T, StrataError>;

/// The two serialized documents every image carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// The image config document.
    Config,
    /// The image manifest document.
    Manifest,
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config => write!(f, "config file"),
            Self::Manifest => write!(f, "manifest"),
        }
    }
}

/// Common errors across the Strata crates.
#[derive(Error, Diagnostic, Debug)]
pub enum StrataError {
    /// Config or manifest document absent from the image.
    #[error("missing {document}")]
    #[diagnostic(code(strata::image::missing_document))]
    MissingDocument {
        /// Which document was absent.
        document: DocumentKind,
    },

    /// A diff ID was not present in the image it was looked up in.
    #[error("{context}: layer {diff_id} not found")]
    #[diagnostic(code(strata::layer::not_found))]
    LayerNotFound {
        /// The diff ID that was looked up.
        diff_id: String,
        /// Where the lookup happened.
        context: String,
    },

    /// Layer reuse requested without a previous image.
    #[error("failed to reuse layer because no previous image was provided")]
    #[diagnostic(
        code(strata::layer::no_previous_image),
        help("Provide a previous image in the image options to reuse its layers")
    )]
    NoPreviousImage,

    /// Field not expressible by the image format and no override was set.
    #[error("image {field} is undefined for {format} ImageIndex")]
    #[diagnostic(code(strata::format::unsupported_field))]
    UnsupportedField {
        /// The field name (features, urls, annotations).
        field: String,
        /// The manifest media type of the format.
        format: String,
    },

    /// No manifest in an index matched the requested platform.
    #[error("failed to find manifest matching platform {platform}")]
    #[diagnostic(code(strata::index::platform_not_found))]
    PlatformNotFound {
        /// The requested platform, `os/arch`.
        platform: String,
    },

    /// The image has no layers.
    #[error("image has no layers")]
    #[diagnostic(code(strata::image::empty))]
    EmptyImage,

    /// Rebase requested against a base the image does not start with.
    #[error("image is not based on the given base: {reason}")]
    #[diagnostic(code(strata::rebase::not_based_on))]
    NotBasedOn {
        /// Why the prefix check failed.
        reason: String,
    },

    /// The layer is a facade whose bytes are not available locally.
    #[error("content for layer {diff_id} is not available")]
    #[diagnostic(
        code(strata::layer::content_unavailable),
        help("Layers loaded without their blobs can only be saved without layers")
    )]
    LayerContentUnavailable {
        /// The diff ID of the facade layer.
        diff_id: String,
    },

    /// Manifest, config and layers disagree with each other.
    #[error("invalid image: {reason}")]
    #[diagnostic(code(strata::image::invalid))]
    InvalidImage {
        /// The first disagreement found.
        reason: String,
    },

    /// Malformed digest string.
    #[error("invalid digest: {value}")]
    #[diagnostic(
        code(strata::digest::invalid),
        help("Digests look like 'sha256:' followed by 64 lowercase hex characters")
    )]
    InvalidDigest {
        /// The offending value.
        value: String,
    },

    /// Media type that is not valid in the position it was used.
    #[error("invalid media type: {media_type}")]
    #[diagnostic(code(strata::format::invalid_media_type))]
    InvalidMediaType {
        /// The offending media type.
        media_type: String,
    },

    /// One or more destinations failed during a multi-target save.
    #[error(transparent)]
    #[diagnostic(code(strata::save::failed))]
    Save(#[from] SaveError),

    /// I/O error.
    #[error("I/O error: {0}")]
    #[diagnostic(code(strata::io))]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    #[diagnostic(code(strata::serialization))]
    Serialization(String),

    /// Internal error (should not happen).
    #[error("Internal error: {message}")]
    #[diagnostic(
        code(strata::internal),
        help("This is a bug, please report it at https://github.com/strata-images/strata/issues")
    )]
    Internal {
        /// The error message.
        message: String,
    },
}

impl StrataError {
    /// Shorthand for a missing config document.
    #[must_use]
    pub const fn missing_config() -> Self {
        Self::MissingDocument {
            document: DocumentKind::Config,
        }
    }

    /// Shorthand for a missing manifest document.
    #[must_use]
    pub const fn missing_manifest() -> Self {
        Self::MissingDocument {
            document: DocumentKind::Manifest,
        }
    }
}

impl From<serde_json::Error> for StrataError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// A single destination that failed during save.
#[derive(Debug)]
pub struct SaveDiagnostic {
    /// The destination name or path.
    pub destination: String,
    /// Why writing to it failed.
    pub cause: Box<StrataError>,
}

impl SaveDiagnostic {
    /// Record a failure for a destination.
    pub fn new(destination: impl Into<String>, cause: StrataError) -> Self {
        Self {
            destination: destination.into(),
            cause: Box::new(cause),
        }
    }
}

/// Aggregate failure of a multi-destination save.
///
/// Destinations that are not listed here were written successfully.
#[derive(Error, Diagnostic, Debug, Default)]
#[error("failed to write image to the following tags: {}", render(.errors))]
#[diagnostic(code(strata::save::failed))]
pub struct SaveError {
    /// One entry per failed destination, in save order.
    pub errors: Vec<SaveDiagnostic>,
}

impl SaveError {
    /// Names of the destinations that failed.
    #[must_use]
    pub fn destinations(&self) -> Vec<&str> {
        self.errors.iter().map(|d| d.destination.as_str()).collect()
    }
}

fn render(errors: &[SaveDiagnostic]) -> String {
    errors
        .iter()
        .map(|d| format!("[{}: {}]", d.destination, d.cause))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(StrataError::missing_config().to_string(), "missing config file");
        assert_eq!(StrataError::missing_manifest().to_string(), "missing manifest");

        let err = StrataError::UnsupportedField {
            field: "features".to_string(),
            format: "application/vnd.docker.distribution.manifest.v2+json".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "image features is undefined for application/vnd.docker.distribution.manifest.v2+json ImageIndex"
        );
    }

    #[test]
    fn error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: StrataError = io_err.into();
        assert!(matches!(err, StrataError::Io(_)));
    }

    #[test]
    fn empty_save_error_renders_no_tags() {
        let err = SaveError::default();
        assert_eq!(err.to_string(), "failed to write image to the following tags: ");
        let wrapped: StrataError = err.into();
        assert!(matches!(wrapped, StrataError::Save(_)));
    }

    #[test]
    fn save_error_lists_every_destination() {
        let err = SaveError {
            errors: vec![
                SaveDiagnostic::new("b", StrataError::NoPreviousImage),
                SaveDiagnostic::new("d", StrataError::EmptyImage),
            ],
        };
        assert_eq!(err.destinations(), vec!["b", "d"]);
        assert!(std::error::Error::source(&err).is_none());
        insta::assert_snapshot!(
            err.to_string(),
            @"failed to write image to the following tags: [b: failed to reuse layer because no previous image was provided],[d: image has no layers]"
        );
    }
}
