pub mod metrics;
pub mod progress;

pub use metrics::*;
pub use progress::*;
