//! Image layers.
//!
//! A [`Layer`] is identified by its diff ID (the digest of its uncompressed
//! content) and carries the blob as stored, its digest and its media type.
//! Layers loaded without their blob are facades: they can be referenced,
//! rebased and saved without layers, but not read.

use std::fmt;
use std::io::Read;
use std::path::Path;

use bytes::{Buf, Bytes};
use strata_common::{Digest, StrataError, StrataResult};
use strata_oci::Descriptor;
use strata_oci::image::media_types;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xb5, 0x2f, 0xfd];

/// Compression of a layer blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// Plain tar.
    None,
    /// Gzip-compressed tar.
    Gzip,
    /// Zstd-compressed tar.
    Zstd,
}

impl Compression {
    /// Compression implied by a layer media type.
    #[must_use]
    pub fn from_media_type(media_type: &str) -> Self {
        if media_type.ends_with("+gzip") || media_type.ends_with(".tar.gzip") {
            Self::Gzip
        } else if media_type.ends_with("+zstd") || media_type.ends_with(".tar.zstd") {
            Self::Zstd
        } else {
            Self::None
        }
    }

    /// Compression detected from the leading bytes of a blob.
    #[must_use]
    pub fn sniff(data: &[u8]) -> Self {
        if data.starts_with(&GZIP_MAGIC) {
            Self::Gzip
        } else if data.starts_with(&ZSTD_MAGIC) {
            Self::Zstd
        } else {
            Self::None
        }
    }

    /// The OCI layer media type for this compression.
    #[must_use]
    pub const fn oci_media_type(self) -> &'static str {
        match self {
            Self::None => media_types::LAYER_TAR,
            Self::Gzip => media_types::LAYER_TAR_GZIP,
            Self::Zstd => media_types::LAYER_TAR_ZSTD,
        }
    }
}

/// A content-addressed image layer.
#[derive(Clone)]
pub struct Layer {
    diff_id: Digest,
    digest: Digest,
    size: i64,
    media_type: String,
    blob: Option<Bytes>,
}

impl Layer {
    /// Build a layer from a blob, computing its digests.
    ///
    /// Compression is detected from the blob's magic bytes; compressed blobs
    /// are decompressed once to compute the diff ID.
    ///
    /// # Errors
    ///
    /// Returns an error if a compressed blob cannot be decompressed.
    pub fn from_bytes(blob: impl Into<Bytes>) -> StrataResult<Self> {
        let blob = blob.into();
        let compression = Compression::sniff(&blob);
        let digest = Digest::sha256_of(&blob);
        let diff_id = match compression {
            Compression::None => digest.clone(),
            Compression::Gzip | Compression::Zstd => {
                let mut content = Vec::new();
                decompress(blob.clone(), compression)?.read_to_end(&mut content)?;
                Digest::sha256_of(&content)
            }
        };

        tracing::debug!(diff_id = diff_id.short(), size = blob.len(), ?compression, "Layer created");

        Ok(Self {
            diff_id,
            digest,
            size: blob_size(&blob),
            media_type: compression.oci_media_type().to_string(),
            blob: Some(blob),
        })
    }

    /// Build a layer from a tarball on disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or decompressed.
    pub fn from_path(path: impl AsRef<Path>) -> StrataResult<Self> {
        let data = std::fs::read(path.as_ref())?;
        Self::from_bytes(data)
    }

    /// Build a layer from a stored blob whose diff ID is already known.
    #[must_use]
    pub fn from_blob(blob: Bytes, descriptor: &Descriptor, diff_id: Digest) -> Self {
        Self {
            diff_id,
            digest: descriptor.digest.clone(),
            size: descriptor.size,
            media_type: descriptor.media_type.clone(),
            blob: Some(blob),
        }
    }

    /// Build a content-less layer from its descriptor and diff ID.
    #[must_use]
    pub fn facade(descriptor: &Descriptor, diff_id: Digest) -> Self {
        Self {
            diff_id,
            digest: descriptor.digest.clone(),
            size: descriptor.size,
            media_type: descriptor.media_type.clone(),
            blob: None,
        }
    }

    /// Digest of the uncompressed content.
    #[must_use]
    pub const fn diff_id(&self) -> &Digest {
        &self.diff_id
    }

    /// Digest of the blob as stored.
    #[must_use]
    pub const fn digest(&self) -> &Digest {
        &self.digest
    }

    /// Size of the blob as stored.
    #[must_use]
    pub const fn size(&self) -> i64 {
        self.size
    }

    /// Declared media type.
    #[must_use]
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// Compression implied by the declared media type.
    #[must_use]
    pub fn compression(&self) -> Compression {
        Compression::from_media_type(&self.media_type)
    }

    /// Whether the blob bytes are available.
    #[must_use]
    pub const fn has_content(&self) -> bool {
        self.blob.is_some()
    }

    /// The same layer under another media type.
    #[must_use]
    pub fn with_media_type(&self, media_type: impl Into<String>) -> Self {
        Self {
            media_type: media_type.into(),
            ..self.clone()
        }
    }

    /// The blob as stored.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::LayerContentUnavailable`] for facades.
    pub fn compressed(&self) -> StrataResult<Bytes> {
        self.blob
            .clone()
            .ok_or_else(|| StrataError::LayerContentUnavailable {
                diff_id: self.diff_id.to_string(),
            })
    }

    /// A reader over the uncompressed content.
    ///
    /// # Errors
    ///
    /// Returns an error for facades or if the decoder cannot be created.
    pub fn uncompressed(&self) -> StrataResult<Box<dyn Read + Send>> {
        decompress(self.compressed()?, self.compression())
    }

    /// Descriptor of this layer for a manifest.
    #[must_use]
    pub fn descriptor(&self) -> Descriptor {
        Descriptor::new(self.media_type.clone(), self.digest.clone(), self.size)
    }
}

impl fmt::Debug for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layer")
            .field("diff_id", &self.diff_id)
            .field("digest", &self.digest)
            .field("size", &self.size)
            .field("media_type", &self.media_type)
            .field("has_content", &self.has_content())
            .finish()
    }
}

fn decompress(blob: Bytes, compression: Compression) -> StrataResult<Box<dyn Read + Send>> {
    let reader = blob.reader();
    Ok(match compression {
        Compression::None => Box::new(reader),
        Compression::Gzip => Box::new(flate2::read::GzDecoder::new(reader)),
        Compression::Zstd => Box::new(zstd::stream::read::Decoder::new(reader)?),
    })
}

fn blob_size(blob: &Bytes) -> i64 {
    i64::try_from(blob.len()).unwrap_or(i64::MAX)
}
