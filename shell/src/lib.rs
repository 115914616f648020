//! Platform-independent half of the Keva shell.
//!
//! Everything that has to stay consistent across the host/surface boundary lives
//! here: the window geometry negotiator, the message bridge, the surface-side
//! state mirror with its save and shutdown machinery, and the host-side router
//! and worker. The Windows binary only adapts OS calls onto these types.

pub mod bridge;
pub mod config;
pub mod error;
pub mod geometry;
pub mod host;
pub mod logging;
pub mod save;
pub mod shutdown;
pub mod state;
pub mod surface;

pub use error::{Error, Result};
