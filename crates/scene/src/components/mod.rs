pub mod bounds;
pub mod drawable3d;
pub mod material;
pub mod mesh;
pub mod model;
pub mod properties;
pub mod transform;
pub mod visibility;

pub use bounds::*;
pub use drawable3d::*;
pub use material::*;
pub use mesh::*;
pub use model::*;
pub use properties::*;
pub use transform::*;
pub use visibility::*;
