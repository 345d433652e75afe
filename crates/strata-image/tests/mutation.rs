//! Integration tests for image mutation sessions.

use std::error::Error;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use proptest::prelude::*;
use strata_common::{Digest, DocumentKind, NORMALIZED_DATE_TIME, StrataError, StrataResult};
use strata_image::{Addendum, ImageCore, ImageOptions, ImageReader, Layer, MediaTypes, OciImage};
use strata_oci::{HistoryEntry, ImageConfig, ImageManifest};
use strata_oci::image::media_types;

fn build_time() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap()
}

fn layer(content: &str) -> Layer {
    Layer::from_bytes(content.as_bytes().to_vec()).unwrap()
}

fn history(created_by: &str) -> HistoryEntry {
    HistoryEntry {
        created_by: Some(created_by.to_string()),
        ..HistoryEntry::default()
    }
}

fn diff_ids(image: &impl ImageReader) -> Vec<Digest> {
    image
        .layers()
        .unwrap()
        .iter()
        .map(|l| l.diff_id().clone())
        .collect()
}

/// An image whose layers are `contents`, each with a matching history entry.
fn image_of(contents: &[&str]) -> OciImage {
    contents
        .iter()
        .try_fold(OciImage::empty(MediaTypes::Oci).unwrap(), |image, content| {
            image.append(Addendum::new(layer(content)).with_history(history(content)))
        })
        .unwrap()
}

proptest! {
    #[test]
    fn test_add_layer_keeps_history_aligned(
        initial_history in 0usize..5,
        adds in proptest::collection::vec(any::<bool>(), 1..8),
        preserve in any::<bool>(),
    ) {
        let mut options = ImageOptions::default().with_created_at(build_time());
        if preserve {
            options = options.with_history();
        }
        let mut core = ImageCore::new(&options).unwrap();
        core.set_history((0..initial_history).map(|i| history(&format!("old-{i}"))).collect()).unwrap();

        for (i, with_comment) in adds.iter().enumerate() {
            let entry = if *with_comment { history(&format!("RUN step {i}")) } else { HistoryEntry::default() };
            core.add_layer_with_history(layer(&format!("content-{i}")), entry.clone()).unwrap();

            let config = core.image().config_ref();
            prop_assert_eq!(config.history.len(), config.rootfs.diff_ids.len());
            prop_assert_eq!(config.rootfs.diff_ids.len(), i + 1);

            let last = config.history.last().unwrap();
            prop_assert_eq!(last.created, Some(build_time()));
            if preserve {
                prop_assert_eq!(&last.created_by, &entry.created_by);
            } else {
                prop_assert_eq!(last, &HistoryEntry::blank(build_time()));
            }
            prop_assert!(core.valid());
        }
    }
}

#[test]
fn test_reuse_layer_carries_previous_history() -> Result<(), Box<dyn Error>> {
    let previous = image_of(&["base", "deps", "app"]);
    let options = ImageOptions::default()
        .with_previous_image(Arc::new(previous))
        .with_created_at(build_time())
        .with_history();
    let mut core = ImageCore::new(&options)?;

    core.reuse_layer(layer("deps").diff_id())?;

    let last = core.history().last().unwrap().clone();
    assert_eq!(last.created_by.as_deref(), Some("deps"));
    assert_eq!(last.created, Some(build_time()));
    assert_eq!(diff_ids(&core), vec![layer("deps").diff_id().clone()]);
    Ok(())
}

#[test]
fn test_reuse_layer_skips_empty_layer_history() -> Result<(), Box<dyn Error>> {
    let mut previous = ImageCore::new(&ImageOptions::default().with_history())?;
    previous.add_layer_with_history(layer("base"), history("base"))?;
    previous.add_layer_with_history(layer("app"), history("app"))?;
    let mut recorded = previous.history().to_vec();
    recorded.insert(
        1,
        HistoryEntry {
            empty_layer: true,
            ..history("ENV PORT=8080")
        },
    );
    previous.set_history(recorded)?;

    let options = ImageOptions::default()
        .with_previous_image(Arc::new(previous.into_image()))
        .with_history();
    let mut core = ImageCore::new(&options)?;
    core.reuse_layer(layer("app").diff_id())?;

    assert_eq!(core.history()[0].created_by.as_deref(), Some("app"));
    Ok(())
}

#[test]
fn test_reuse_layer_without_history_preservation() -> Result<(), Box<dyn Error>> {
    let options = ImageOptions::default().with_previous_image(Arc::new(image_of(&["base"])));
    let mut core = ImageCore::new(&options)?;
    core.reuse_layer(layer("base").diff_id())?;

    assert_eq!(core.history(), [HistoryEntry::blank(*NORMALIZED_DATE_TIME)]);
    Ok(())
}

#[test]
fn test_reuse_unknown_layer_fails() -> Result<(), Box<dyn Error>> {
    let options = ImageOptions::default().with_previous_image(Arc::new(image_of(&["base"])));
    let mut core = ImageCore::new(&options)?;
    let before = core.digest()?;

    let err = core.reuse_layer(layer("elsewhere").diff_id()).unwrap_err();
    assert!(matches!(err, StrataError::LayerNotFound { .. }));
    assert_eq!(core.digest()?, before);
    Ok(())
}

#[test]
fn test_rebase_replaces_base_and_keeps_app_layers() -> Result<(), Box<dyn Error>> {
    let old_base = image_of(&["old-os", "old-runtime"]);
    let mut core = ImageCore::new(&ImageOptions::default().with_base_image(Arc::new(old_base)).with_history())?;
    core.set_architecture("amd64")?;
    core.set_os("linux")?;
    core.set_variant("v3")?;
    core.set_label("app", "web")?;
    core.add_layer_with_history(layer("app-1"), history("app-1"))?;
    core.add_layer_with_history(layer("app-2"), history("app-2"))?;

    let mut new_base = ImageCore::new(&ImageOptions::default().with_base_image(Arc::new(image_of(&[
        "new-os",
        "new-runtime",
        "new-extra",
    ]))))?;
    new_base.set_architecture("arm64")?;
    new_base.set_os("linux")?;
    new_base.set_os_version("6.1")?;
    new_base.set_variant("v8")?;

    core.rebase(layer("old-runtime").diff_id(), &new_base)?;

    let expected: Vec<Digest> = ["new-os", "new-runtime", "new-extra", "app-1", "app-2"]
        .iter()
        .map(|c| layer(c).diff_id().clone())
        .collect();
    assert_eq!(diff_ids(&core), expected);

    assert_eq!(core.architecture(), "arm64");
    assert_eq!(core.os(), "linux");
    assert_eq!(core.os_version(), Some("6.1"));
    assert_eq!(core.variant(), Some("v3"));
    assert_eq!(core.label("app"), Some("web"));

    let created_by: Vec<_> = core
        .history()
        .iter()
        .map(|h| h.created_by.clone().unwrap_or_default())
        .collect();
    assert_eq!(&created_by[3..], ["app-1", "app-2"]);

    let platform = core.image().manifest_ref().config.platform.clone().unwrap();
    assert_eq!(platform.architecture, "arm64");
    assert_eq!(platform.os_version.as_deref(), Some("6.1"));
    assert_eq!(platform.variant.as_deref(), Some("v3"));
    assert!(core.valid());
    Ok(())
}

#[test]
fn test_rebase_with_unknown_top_layer_leaves_image_unchanged() -> Result<(), Box<dyn Error>> {
    let mut core = ImageCore::new(&ImageOptions::default().with_base_image(Arc::new(image_of(&["base", "app"]))))?;
    let before = core.digest()?;
    let layers_before = diff_ids(&core);

    let err = core.rebase(layer("not-there").diff_id(), &image_of(&["new"])).unwrap_err();
    assert!(matches!(err, StrataError::LayerNotFound { .. }));
    assert!(err.to_string().contains("could not find base layer in image"));
    assert_eq!(core.digest()?, before);
    assert_eq!(diff_ids(&core), layers_before);
    Ok(())
}

/// An image source that has lost its config document.
struct WithoutConfig(OciImage);

impl ImageReader for WithoutConfig {
    fn config_file(&self) -> StrataResult<Option<ImageConfig>> {
        Ok(None)
    }

    fn manifest(&self) -> StrataResult<Option<ImageManifest>> {
        self.0.manifest()
    }

    fn layers(&self) -> StrataResult<Vec<Layer>> {
        self.0.layers()
    }
}

#[test]
fn test_rebase_onto_base_without_config_leaves_image_unchanged() -> Result<(), Box<dyn Error>> {
    let mut core = ImageCore::new(&ImageOptions::default().with_base_image(Arc::new(image_of(&["base", "app"]))))?;
    let before = core.digest()?;

    let err = core
        .rebase(layer("base").diff_id(), &WithoutConfig(image_of(&["new"])))
        .unwrap_err();
    assert!(matches!(
        err,
        StrataError::MissingDocument {
            document: DocumentKind::Config
        }
    ));
    assert_eq!(err.to_string(), "missing config file");
    assert_eq!(core.digest()?, before);
    assert_eq!(diff_ids(&core), vec![layer("base").diff_id().clone(), layer("app").diff_id().clone()]);
    Ok(())
}

#[test]
fn test_set_env_twice_keeps_one_entry() -> Result<(), Box<dyn Error>> {
    let mut core = ImageCore::new(&ImageOptions::default())?;
    core.set_env("K", "v1")?;
    core.set_env("K", "v2")?;
    let entries: Vec<&String> = core
        .image()
        .config_ref()
        .env()
        .iter()
        .filter(|e| e.starts_with("K="))
        .collect();
    assert_eq!(entries, ["K=v2"]);
    Ok(())
}

#[test]
fn test_docker_base_keeps_docker_types_and_rejects_missing_features() -> Result<(), Box<dyn Error>> {
    let base = OciImage::empty(MediaTypes::Docker)?
        .append(Addendum::new(layer("base")).with_media_type(media_types::DOCKER_LAYER_TAR))?;
    let core = ImageCore::new(&ImageOptions::default().with_base_image(Arc::new(base)))?;

    assert_eq!(core.media_types(), MediaTypes::Docker);
    assert_eq!(core.media_type(), Some(media_types::DOCKER_MANIFEST));

    let err = core.features().unwrap_err();
    assert_eq!(
        err.to_string(),
        format!("image features is undefined for {} ImageIndex", media_types::DOCKER_MANIFEST)
    );

    core.set_features(&["sse4".to_string()]);
    assert_eq!(core.features()?, ["sse4"]);
    Ok(())
}

#[test_log::test]
fn test_zstd_layer_in_docker_image_keeps_oci_type() -> Result<(), Box<dyn Error>> {
    let mut core = ImageCore::new(&ImageOptions::default().with_media_types(MediaTypes::Docker))?;
    let blob = zstd::encode_all(&b"zstd layer"[..], 0)?;
    core.add_layer_with_history(Layer::from_bytes(blob)?, HistoryEntry::default())?;

    let manifest = core.image().manifest_ref();
    assert_eq!(manifest.media_type.as_deref(), Some(media_types::DOCKER_MANIFEST));
    assert_eq!(manifest.layers[0].media_type, media_types::LAYER_TAR_ZSTD);
    assert!(core.valid());
    Ok(())
}

#[test]
fn test_base_image_converted_to_requested_types() -> Result<(), Box<dyn Error>> {
    let base = OciImage::empty(MediaTypes::Docker)?
        .append(Addendum::new(layer("base")).with_media_type(media_types::DOCKER_LAYER_TAR))?;
    let mut core = ImageCore::new(
        &ImageOptions::default()
            .with_base_image(Arc::new(base))
            .with_media_types(MediaTypes::Oci),
    )?;

    assert_eq!(core.media_type(), Some(media_types::MANIFEST));
    assert_eq!(core.image().manifest_ref().config.media_type, media_types::CONFIG);
    assert_eq!(core.image().manifest_ref().layers[0].media_type, media_types::LAYER_TAR);

    core.add_layer_with_history(layer("app"), HistoryEntry::default())?;
    assert_eq!(core.image().manifest_ref().layers[1].media_type, media_types::LAYER_TAR);
    assert!(core.valid());
    Ok(())
}
