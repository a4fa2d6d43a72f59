//! Dispatch, routing, and live-trip-tracking engine.
//!
//! The host app owns screens, navigation, and push registration; this
//! crate owns everything with real invariants in it: hospital ranking,
//! route acquisition with provider fallback, marker animation, progress
//! derivation, and reconciliation of local trip state against the server.

pub mod dispatch;
pub mod geometry;
pub mod progress;
pub mod routing;
pub mod state;
pub mod tracking;

// Re-export the directory from the directory crate
pub use resq_directory as directory;
