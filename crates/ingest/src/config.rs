use std::path::Path;

use layers::{NormalMode, ProceduralMaterialBuilder, TubeOptions};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Build settings. Every field has a default, so a config file only needs
/// the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub terrain_normals: NormalMode,
    /// Edge length of the square procedural seabed tiles, in texels.
    pub seabed_texture_size: u32,
    pub seabed_repeat: f32,
    pub tube_radial_segments: u32,
    pub tube_samples_per_span: u32,
    pub connection_width_px: f32,
}

impl Default for IngestConfig {
    fn default() -> Self {
        let tube = TubeOptions::default();
        Self {
            terrain_normals: NormalMode::Up,
            seabed_texture_size: 256,
            seabed_repeat: 8.0,
            tube_radial_segments: tube.radial_segments,
            tube_samples_per_span: tube.samples_per_span,
            connection_width_px: 2.0,
        }
    }
}

impl IngestConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn tube_options(&self) -> TubeOptions {
        TubeOptions {
            radial_segments: self.tube_radial_segments,
            samples_per_span: self.tube_samples_per_span,
        }
    }

    pub fn material_builder(&self) -> ProceduralMaterialBuilder {
        ProceduralMaterialBuilder::new(self.seabed_texture_size, self.seabed_repeat)
    }
}

#[cfg(test)]
mod tests {
    use super::IngestConfig;
    use layers::NormalMode;
    use pretty_assertions::assert_eq;

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg = IngestConfig::from_json(r#"{"terrain_normals":"computed","seabed_repeat":4.0}"#)
            .expect("config");
        assert_eq!(cfg.terrain_normals, NormalMode::Computed);
        assert_eq!(cfg.seabed_repeat, 4.0);
        assert_eq!(cfg.seabed_texture_size, 256);
        assert_eq!(cfg.tube_options().radial_segments, 12);
    }

    #[test]
    fn load_reports_missing_files() {
        let err = IngestConfig::load("/nonexistent/ingest.json").expect_err("missing");
        assert!(err.to_string().contains("/nonexistent/ingest.json"));
    }

    #[test]
    fn rejects_unknown_normal_modes() {
        assert!(IngestConfig::from_json(r#"{"terrain_normals":"flat"}"#).is_err());
    }
}
