pub mod layer;
pub mod objects;
pub mod seabed;
pub mod terrain;
pub mod tube;
pub mod vector;

pub use layer::*;
pub use objects::AssetPlacement;
pub use seabed::{ProceduralMaterialBuilder, SeabedStyle, SeabedTextures};
pub use terrain::{NormalMode, TerrainMesh, mesh_terrain};
pub use tube::{TubeOptions, build_well};
pub use vector::{build_connection, build_shape};
