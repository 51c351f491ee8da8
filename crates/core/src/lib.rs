//! Domain model shared by the planner, the saga executor and the HTTP layer.

pub mod domain;
mod error;

pub use domain::*;
pub use error::CoreError;
