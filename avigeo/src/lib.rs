//! Route data model and geofence matching for the announcement unit.
//!
//! A selected route is an immutable list of main [`Frame`]s (each pairing a
//! geographic [`Zone`] with the [`MediaInfo`] to announce) plus a side table
//! of child frames chained after "parent" announcements. The
//! [`GeofenceEngine`] tests incoming GPS fixes against the main frames with
//! hysteresis so that lingering inside a zone triggers its announcement only
//! once.

mod course;
mod engine;
mod error;
mod fix;
mod route;
mod zone;

pub use course::CourseMask;
pub use engine::{GeofenceEngine, MatchResult};
pub use error::{Error, Result};
pub use fix::GpsFix;
pub use route::{Frame, MediaInfo, Mode, Route, RouteHandle};
pub use zone::Zone;
