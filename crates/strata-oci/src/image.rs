//! OCI Image Specification types.
//!
//! Based on the OCI Image Specification v1.1.0:
//! <https://github.com/opencontainers/image-spec>
//!
//! Maps are ordered so that serializing the same document twice yields the
//! same bytes, and therefore the same digest.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strata_common::Digest;

/// OCI Image Manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageManifest {
    /// Schema version (must be 2).
    pub schema_version: u32,
    /// Media type of the manifest.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    /// Artifact type (for artifacts).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_type: Option<String>,
    /// Image configuration descriptor.
    pub config: Descriptor,
    /// Image layers.
    pub layers: Vec<Descriptor>,
    /// Subject (for referrers).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<Descriptor>,
    /// Annotations.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl ImageManifest {
    /// Platform descriptor of the config, created empty if absent.
    pub fn platform_mut(&mut self) -> &mut Platform {
        self.config.platform.get_or_insert_with(Platform::default)
    }
}

/// OCI Image Index (multi-architecture manifest).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageIndex {
    /// Schema version (must be 2).
    pub schema_version: u32,
    /// Media type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    /// Manifest list.
    #[serde(default)]
    pub manifests: Vec<Descriptor>,
    /// Annotations.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl ImageIndex {
    /// An OCI index with no manifests.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            schema_version: 2,
            media_type: Some(media_types::INDEX.to_string()),
            manifests: Vec::new(),
            annotations: BTreeMap::new(),
        }
    }
}

/// Content descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    /// Media type of the referenced content.
    pub media_type: String,
    /// Content digest.
    pub digest: Digest,
    /// Content size in bytes.
    pub size: i64,
    /// URLs for downloading.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub urls: Vec<String>,
    /// Annotations.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    /// Data (base64-encoded, for small content).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    /// Platform (index entries and config descriptors).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
    /// Artifact type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_type: Option<String>,
}

impl Descriptor {
    /// Describe a blob by media type, digest and size.
    pub fn new(media_type: impl Into<String>, digest: Digest, size: i64) -> Self {
        Self {
            media_type: media_type.into(),
            digest,
            size,
            urls: Vec::new(),
            annotations: BTreeMap::new(),
            data: None,
            platform: None,
            artifact_type: None,
        }
    }
}

/// Platform specification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    /// Architecture.
    #[serde(default)]
    pub architecture: String,
    /// Operating system.
    #[serde(default)]
    pub os: String,
    /// OS version.
    #[serde(rename = "os.version", skip_serializing_if = "Option::is_none")]
    pub os_version: Option<String>,
    /// OS features.
    #[serde(rename = "os.features", default, skip_serializing_if = "Vec::is_empty")]
    pub os_features: Vec<String>,
    /// Architecture variant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    /// Features (Docker manifest lists only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
}

impl Platform {
    /// Create a platform from an OS and architecture.
    pub fn new(os: impl Into<String>, architecture: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            architecture: architecture.into(),
            ..Self::default()
        }
    }

    /// Create a platform for linux/amd64.
    #[must_use]
    pub fn linux_amd64() -> Self {
        Self::new("linux", "amd64")
    }

    /// Create a platform for linux/arm64.
    #[must_use]
    pub fn linux_arm64() -> Self {
        Self::new("linux", "arm64")
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.architecture)?;
        if let Some(variant) = self.variant.as_deref().filter(|v| !v.is_empty()) {
            write!(f, "/{variant}")?;
        }
        Ok(())
    }
}

/// OCI Image Configuration (the config document).
///
/// Fields this crate does not model are kept in `extra` so they survive a
/// read-modify-write.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageConfig {
    /// Creation timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    /// Author.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Architecture.
    #[serde(default)]
    pub architecture: String,
    /// Operating system.
    #[serde(default)]
    pub os: String,
    /// OS version.
    #[serde(rename = "os.version", skip_serializing_if = "Option::is_none")]
    pub os_version: Option<String>,
    /// OS features.
    #[serde(rename = "os.features", default, skip_serializing_if = "Vec::is_empty")]
    pub os_features: Vec<String>,
    /// Architecture variant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    /// Legacy Docker container ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
    /// Execution parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<ExecutionConfig>,
    /// Rootfs information.
    #[serde(default)]
    pub rootfs: RootFs,
    /// History entries.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<HistoryEntry>,
    /// Unmodelled fields.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ImageConfig {
    /// Execution config, created empty if absent.
    pub fn exec_mut(&mut self) -> &mut ExecutionConfig {
        self.config.get_or_insert_with(ExecutionConfig::default)
    }

    /// Environment entries, or an empty slice.
    #[must_use]
    pub fn env(&self) -> &[String] {
        self.config.as_ref().map_or(&[], |c| c.env.as_slice())
    }
}

/// Execution configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExecutionConfig {
    /// User.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Exposed ports.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub exposed_ports: BTreeMap<String, Value>,
    /// Environment variables (`KEY=value`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<String>,
    /// Entrypoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<Vec<String>>,
    /// Default command.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cmd: Option<Vec<String>>,
    /// Volumes.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub volumes: BTreeMap<String, Value>,
    /// Working directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    /// Labels.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Stop signal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_signal: Option<String>,
    /// Unmodelled fields (healthcheck, shell, ...).
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Root filesystem information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootFs {
    /// Type (must be "layers").
    #[serde(rename = "type")]
    pub fs_type: String,
    /// Layer diff IDs (uncompressed digests).
    #[serde(default)]
    pub diff_ids: Vec<Digest>,
}

impl Default for RootFs {
    fn default() -> Self {
        Self {
            fs_type: "layers".to_string(),
            diff_ids: Vec::new(),
        }
    }
}

/// History entry for an image layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Creation timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    /// Author.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Command that created this layer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    /// Comment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Whether this entry has no layer of its own.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub empty_layer: bool,
}

impl HistoryEntry {
    /// An entry carrying nothing but a timestamp.
    #[must_use]
    pub fn blank(created: DateTime<Utc>) -> Self {
        Self {
            created: Some(created),
            ..Self::default()
        }
    }
}

/// Well-known annotation keys.
pub mod annotations {
    /// Reference name of an image inside an OCI layout.
    pub const REF_NAME: &str = "org.opencontainers.image.ref.name";
}

/// Common media types.
pub mod media_types {
    /// OCI image manifest media type.
    pub const MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";
    /// OCI image index media type.
    pub const INDEX: &str = "application/vnd.oci.image.index.v1+json";
    /// OCI image config media type.
    pub const CONFIG: &str = "application/vnd.oci.image.config.v1+json";
    /// OCI layer media type (tar+gzip).
    pub const LAYER_TAR_GZIP: &str = "application/vnd.oci.image.layer.v1.tar+gzip";
    /// OCI layer media type (tar+zstd).
    pub const LAYER_TAR_ZSTD: &str = "application/vnd.oci.image.layer.v1.tar+zstd";
    /// OCI layer media type (uncompressed tar).
    pub const LAYER_TAR: &str = "application/vnd.oci.image.layer.v1.tar";

    /// Docker manifest v2 schema 2 media type.
    pub const DOCKER_MANIFEST: &str = "application/vnd.docker.distribution.manifest.v2+json";
    /// Docker manifest list media type.
    pub const DOCKER_INDEX: &str = "application/vnd.docker.distribution.manifest.list.v2+json";
    /// Docker image config media type.
    pub const DOCKER_CONFIG: &str = "application/vnd.docker.container.image.v1+json";
    /// Docker layer media type.
    pub const DOCKER_LAYER: &str = "application/vnd.docker.image.rootfs.diff.tar.gzip";
    /// Docker layer media type (uncompressed tar).
    pub const DOCKER_LAYER_TAR: &str = "application/vnd.docker.image.rootfs.diff.tar";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_serialization() {
        let mut manifest = ImageManifest {
            schema_version: 2,
            media_type: Some(media_types::MANIFEST.to_string()),
            artifact_type: None,
            config: Descriptor::new(media_types::CONFIG, Digest::sha256_of(b"config"), 1024),
            layers: vec![Descriptor::new(
                media_types::LAYER_TAR_GZIP,
                Digest::sha256_of(b"layer1"),
                10240,
            )],
            subject: None,
            annotations: BTreeMap::new(),
        };
        manifest.platform_mut().os = "linux".to_string();

        let json = serde_json::to_string_pretty(&manifest).unwrap();
        assert!(json.contains("schemaVersion"));
        assert!(json.contains(&Digest::sha256_of(b"config").to_string()));
        assert!(json.contains("\"os\": \"linux\""));

        let back: ImageManifest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, manifest);
    }

    #[test]
    fn platform_creation() {
        let platform = Platform::linux_amd64();
        assert_eq!(platform.os, "linux");
        assert_eq!(platform.architecture, "amd64");
        assert_eq!(platform.to_string(), "linux/amd64");

        let arm = Platform {
            variant: Some("v8".to_string()),
            ..Platform::linux_arm64()
        };
        assert_eq!(arm.to_string(), "linux/arm64/v8");
    }

    #[test]
    fn config_uses_dotted_os_keys_and_keeps_unknown_fields() {
        let raw = r#"{
            "architecture": "amd64",
            "os": "windows",
            "os.version": "10.0.17763.1040",
            "os.features": ["win32k"],
            "config": {"Env": ["PATH=C:\\Windows"], "Healthcheck": {"Test": ["NONE"]}},
            "rootfs": {"type": "layers", "diff_ids": []},
            "moby.buildkit.buildinfo.v1": "e30="
        }"#;
        let config: ImageConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.os_version.as_deref(), Some("10.0.17763.1040"));
        assert_eq!(config.os_features, vec!["win32k"]);
        assert_eq!(config.env(), ["PATH=C:\\Windows"]);
        assert!(config.extra.contains_key("moby.buildkit.buildinfo.v1"));

        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"os.version\""));
        assert!(json.contains("\"Healthcheck\""));
        assert!(json.contains("moby.buildkit.buildinfo.v1"));
    }

    #[test]
    fn history_omits_false_empty_layer() {
        let entry = HistoryEntry {
            created_by: Some("COPY . /app".to_string()),
            ..HistoryEntry::default()
        };
        let json = serde_json::to_string(&entry).unwrap();
        assert_eq!(json, r#"{"created_by":"COPY . /app"}"#);

        let marker: HistoryEntry = serde_json::from_str(r#"{"empty_layer":true}"#).unwrap();
        assert!(marker.empty_layer);
    }
}
