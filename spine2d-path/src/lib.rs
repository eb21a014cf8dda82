//! Path constraint runtime for Spine 4.x skeletons (unofficial).
//!
//! Bends bone chains along cubic Bézier path attachments. The skeleton types in this crate
//! carry just enough of the Spine pose model (bones, slots, skins, path attachments) to drive
//! the solver; rendering and animation playback live elsewhere.

#![forbid(unsafe_code)]

mod error;
mod model;
mod runtime;
mod version;

#[cfg(feature = "json")]
pub mod json;

pub use error::*;
pub use model::*;
pub use runtime::*;
pub use version::*;

#[cfg(all(test, feature = "json"))]
mod json_tests;
