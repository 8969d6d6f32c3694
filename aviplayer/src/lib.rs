//! Announcement playback control.
//!
//! The [`AnnouncementController`] owns the "now playing" state and a FIFO
//! pending queue, and applies the interruption policy of the currently
//! playing item to every new submission. Actual audio output goes through
//! the [`AudioDriver`] trait; two drivers ship with the crate, a simulated
//! [`NullDriver`] and a [`PlayerProcessDriver`] shelling out to an external
//! CLI player.

mod controller;
mod driver;
mod error;

pub use controller::AnnouncementController;
pub use driver::{AudioDriver, NullDriver, PlayerProcessDriver, StoppedCallback};
pub use error::{Error, Result};
