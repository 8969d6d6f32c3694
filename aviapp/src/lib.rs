//! Application composition for the announcement unit.
//!
//! Glues the periodic task primitive, the geofence engine and the playback
//! controller together: the [`AnnouncementTask`] polls a [`PositionSource`]
//! every tick, filters the fixes, feeds accepted ones to the engine and
//! forwards zone entries to the controller. Route data comes from a
//! [`RouteStore`]; every processed fix lands in the [`Navigator`]'s track
//! log.

mod announce;
mod navigator;
mod source;
mod store;

pub use announce::{AnnouncementSettings, AnnouncementTask, FrameListener};
pub use navigator::{Navigator, TrackLog};
pub use source::{PositionSource, ReplaySource};
pub use store::{media_content_present, RouteStore, YamlRouteStore};
