//! Staged equipment placement.

use formats::payload::StagedAsset;
use foundation::math::Vec3;
use scene::components::Rotation;

use crate::layer::{SkipReason, is_origin_artifact};

/// A validated placement request. The builder normalizes `position` once the
/// model is loaded and the origin is settled.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetPlacement {
    pub model_url: String,
    /// Domain coordinates (east, north, elevation).
    pub position: Vec3,
    pub rotation: Rotation,
    pub scale: f64,
}

impl AssetPlacement {
    /// Check the record has what a placement needs.
    ///
    /// Heading is a compass bearing (clockwise from north). Render yaw turns
    /// counter-clockwise about +y, hence the sign flip.
    pub fn plan(asset: &StagedAsset) -> Result<Self, SkipReason> {
        let model_url = asset
            .model_url
            .clone()
            .ok_or(SkipReason::MissingGeometry("model url"))?;
        let position = asset
            .position
            .ok_or(SkipReason::MissingGeometry("position"))?;
        if is_origin_artifact(position) {
            return Err(SkipReason::Artifact);
        }
        Ok(Self {
            model_url,
            position,
            rotation: Rotation::from_degrees(
                asset.tilt_degrees.unwrap_or(0.0),
                -asset.heading_degrees,
                asset.roll_degrees.unwrap_or(0.0),
            ),
            scale: asset.scale,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::AssetPlacement;
    use crate::layer::SkipReason;
    use formats::payload::StagedAsset;
    use foundation::math::Vec3;
    use std::collections::BTreeMap;

    fn asset(position: Option<Vec3>, heading: f64) -> StagedAsset {
        StagedAsset {
            name: None,
            model_url: Some("models/pump.json".to_string()),
            position,
            heading_degrees: heading,
            tilt_degrees: None,
            roll_degrees: None,
            scale: 2.0,
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn heading_east_faces_plus_x() {
        let plan =
            AssetPlacement::plan(&asset(Some(Vec3::new(1000.0, 2000.0, -50.0)), 90.0)).expect("plan");
        // Model forward is north, i.e. render -z.
        let forward = plan.rotation.apply(Vec3::new(0.0, 0.0, -1.0));
        assert!((forward.x - 1.0).abs() < 1e-9);
        assert!(forward.z.abs() < 1e-9);
        assert_eq!(plan.scale, 2.0);
        assert_eq!(plan.position, Vec3::new(1000.0, 2000.0, -50.0));
    }

    #[test]
    fn rejects_artifacts_and_missing_fields() {
        assert_eq!(
            AssetPlacement::plan(&asset(Some(Vec3::new(0.0, 0.0, 5.0)), 0.0)),
            Err(SkipReason::Artifact)
        );
        assert_eq!(
            AssetPlacement::plan(&asset(None, 0.0)),
            Err(SkipReason::MissingGeometry("position"))
        );
        let mut no_url = asset(Some(Vec3::new(10.0, 10.0, 0.0)), 0.0);
        no_url.model_url = None;
        assert_eq!(
            AssetPlacement::plan(&no_url),
            Err(SkipReason::MissingGeometry("model url"))
        );
    }
}
