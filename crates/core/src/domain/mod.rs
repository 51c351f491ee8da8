pub mod plan;
pub mod saga;
pub mod session;
pub mod signal;

pub use plan::*;
pub use saga::*;
pub use session::*;
pub use signal::*;
