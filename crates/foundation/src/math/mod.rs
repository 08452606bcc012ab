pub mod origin;
pub mod precision;
pub mod vec;

pub use origin::*;
pub use precision::*;
pub use vec::*;
