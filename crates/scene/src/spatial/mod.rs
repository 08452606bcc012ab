pub mod bvh;
pub mod surface;

pub use bvh::*;
pub use surface::*;
