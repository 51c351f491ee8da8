mod health;
mod plans;
mod process;
mod sagas;
mod stats;

pub use health::*;
pub use plans::*;
pub use process::*;
pub use sagas::*;
pub use stats::*;
