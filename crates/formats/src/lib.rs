pub mod model;
pub mod payload;
pub mod terrain_bin;

pub use model::*;
pub use payload::*;
pub use terrain_bin::*;
