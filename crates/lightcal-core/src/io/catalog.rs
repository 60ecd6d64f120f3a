use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{CalibrationError, Result};
use crate::frame::{ChannelLayout, StackingInfo};
use crate::masters::{MasterCatalog, MasterDark, MasterFlat, MasterKind, MasterOffset};
use crate::pipeline::config::FlatNormalization;

use super::image_io::load_image;

/// One master frame on disk and the acquisition metadata it was built from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MasterEntry {
    pub path: PathBuf,
    #[serde(flatten)]
    pub info: StackingInfo,
}

/// File list describing every master available to a batch run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogManifest {
    #[serde(default)]
    pub offsets: Vec<MasterEntry>,
    #[serde(default)]
    pub darks: Vec<MasterEntry>,
    #[serde(default)]
    pub flats: Vec<MasterEntry>,
}

impl CatalogManifest {
    pub fn len(&self) -> usize {
        self.offsets.len() + self.darks.len() + self.flats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Resolve `path` against `base_dir` unless it is already absolute.
pub fn resolve_path(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

/// Load every master listed in `manifest`.
///
/// Relative paths are resolved against `base_dir`. `layout` overrides the
/// layout read from each file, as for the lights; flat references use
/// `normalization`.
pub fn load_catalog(
    manifest: &CatalogManifest,
    base_dir: &Path,
    layout: Option<ChannelLayout>,
    normalization: FlatNormalization,
) -> Result<MasterCatalog> {
    let mut catalog = MasterCatalog::new();

    for entry in &manifest.offsets {
        let buffer = load_image(&resolve_path(base_dir, &entry.path), layout)?;
        catalog = catalog.with_offset(MasterOffset::new(buffer, entry.info.clone()));
    }
    for entry in &manifest.darks {
        if !(entry.info.exposure > 0.0) {
            return Err(CalibrationError::InvalidMaster {
                kind: MasterKind::Dark,
                reason: format!("{} has no exposure", entry.path.display()),
            });
        }
        let buffer = load_image(&resolve_path(base_dir, &entry.path), layout)?;
        catalog = catalog.with_dark(MasterDark::new(buffer, entry.info.clone()));
    }
    for entry in &manifest.flats {
        let buffer = load_image(&resolve_path(base_dir, &entry.path), layout)?;
        catalog = catalog.with_flat(MasterFlat::new(buffer, entry.info.clone(), normalization)?);
    }

    info!(
        offsets = catalog.offsets.len(),
        darks = catalog.darks.len(),
        flats = catalog.flats.len(),
        "Master catalog loaded"
    );
    Ok(catalog)
}
