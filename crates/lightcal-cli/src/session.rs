use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use lightcal_core::frame::{ChannelLayout, StackingInfo};
use lightcal_core::io::catalog::{load_catalog, resolve_path, CatalogManifest, MasterEntry};
use lightcal_core::io::image_io::load_image;
use lightcal_core::masters::MasterCatalog;
use lightcal_core::pipeline::config::CalibrationSettings;
use lightcal_core::pipeline::LightFrame;
use lightcal_core::stars::StarList;

/// One light frame listed in a session file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LightEntry {
    pub path: PathBuf,
    #[serde(flatten)]
    pub info: StackingInfo,
    /// Stars found by the detector; these pixels are never hot-pixel corrected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stars: Option<StarList>,
}

/// A calibration session: settings, masters and the lights to calibrate.
///
/// Relative paths are resolved against the directory holding the session file.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Session {
    /// Channel layout forced on every light and master. Unset, each file
    /// keeps the layout it was saved with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<ChannelLayout>,
    #[serde(default)]
    pub settings: CalibrationSettings,
    #[serde(default)]
    pub masters: CatalogManifest,
    #[serde(default)]
    pub lights: Vec<LightEntry>,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl Session {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read session {}", path.display()))?;
        let mut session: Session = toml::from_str(&contents)
            .with_context(|| format!("Invalid session file {}", path.display()))?;
        session.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(session)
    }

    pub fn light_path(&self, entry: &LightEntry) -> PathBuf {
        resolve_path(&self.base_dir, &entry.path)
    }

    pub fn load_catalog(&self) -> Result<MasterCatalog> {
        load_catalog(
            &self.masters,
            &self.base_dir,
            self.layout,
            self.settings.flat.normalization,
        )
        .context("Failed to load master frames")
    }

    /// Decode every light frame, in parallel.
    pub fn load_lights(&self) -> Result<Vec<LightFrame>> {
        let lights = self
            .lights
            .par_iter()
            .map(|entry| -> Result<LightFrame> {
                let path = self.light_path(entry);
                let buffer = load_image(&path, self.layout)
                    .with_context(|| format!("Failed to load light {}", path.display()))?;
                let light = LightFrame::new(buffer, entry.info.clone());
                Ok(match &entry.stars {
                    Some(stars) => light.with_stars(stars.clone()),
                    None => light,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        info!(lights = lights.len(), "Light frames loaded");
        Ok(lights)
    }

    /// Session template with one entry of every kind.
    pub fn template() -> Self {
        let entry = |path: &str, info: StackingInfo| MasterEntry {
            path: PathBuf::from(path),
            info,
        };
        let dark_info = StackingInfo {
            temperature: Some(-10.0),
            gain: Some(100),
            ..StackingInfo::with_exposure(300.0)
        };
        let flat_info = StackingInfo {
            filter: Some("L".to_string()),
            ..StackingInfo::with_exposure(2.0)
        };
        let light_info = StackingInfo {
            timestamp: Some(1_700_000_000),
            ..dark_info.clone()
        };

        Self {
            layout: None,
            settings: CalibrationSettings::default(),
            masters: CatalogManifest {
                offsets: vec![entry("masters/offset.tiff", StackingInfo::default())],
                darks: vec![entry("masters/dark_300s.tiff", dark_info)],
                flats: vec![entry("masters/flat_L.tiff", flat_info.clone())],
            },
            lights: vec![LightEntry {
                path: PathBuf::from("lights/light_0001.tiff"),
                info: StackingInfo {
                    filter: flat_info.filter,
                    ..light_info
                },
                stars: None,
            }],
            base_dir: PathBuf::new(),
        }
    }
}
