use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::fix::GpsFix;
use crate::route::{MediaInfo, RouteHandle};

/// Outcome of testing one GPS fix against the selected route.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchResult {
    /// The vehicle entered a new zone; its media should be announced.
    Entered { frame_id: i32, media: MediaInfo },
    /// Still inside the previously matched zone; nothing re-dispatched.
    StillInside,
    /// Left the previously matched zone without entering another.
    Exited { frame_id: i32 },
    /// No zone contains the fix and none was previously matched.
    NoMatch,
}

/// Stateful zone matcher with hysteresis.
///
/// The engine remembers the index of the last matched main frame. While the
/// fix stays inside that frame's zone the course is deliberately ignored, so
/// heading changes while idling at a stop cannot re-trigger the same
/// announcement. Only after a clean miss does the full course-filtered scan
/// run again.
pub struct GeofenceEngine {
    route: Arc<RouteHandle>,
    prev: Mutex<Option<usize>>,
}

impl GeofenceEngine {
    pub fn new(route: Arc<RouteHandle>) -> Self {
        Self {
            route,
            prev: Mutex::new(None),
        }
    }

    /// Forget the previously matched frame. Must be called when the route
    /// handle is swapped, since the stored index refers to the old route.
    pub fn reset(&self) {
        *self.prev.lock() = None;
    }

    /// Test a fix against the selected route. Never fails; an empty or
    /// unloaded route simply yields `NoMatch`.
    pub fn match_fix(&self, fix: &GpsFix) -> MatchResult {
        let route = self.route.current();
        let frames = route.frames();
        let mut prev = self.prev.lock();

        if let Some(idx) = *prev {
            match frames.get(idx) {
                Some(frame)
                    if frame
                        .zone
                        .as_ref()
                        .is_some_and(|z| z.contains(fix.lat, fix.lon, GpsFix::UNKNOWN_COURSE)) =>
                {
                    return MatchResult::StillInside;
                }
                Some(_) => {}
                None => {
                    // Stale index from before a route swap.
                    debug!(index = idx, "dropping stale frame index");
                    *prev = None;
                }
            }
        }

        for (idx, frame) in frames.iter().enumerate() {
            let Some(zone) = frame.zone.as_ref() else {
                continue;
            };
            if zone.contains(fix.lat, fix.lon, fix.course) {
                *prev = Some(idx);
                info!(
                    frame_id = frame.id,
                    lat = fix.lat,
                    lon = fix.lon,
                    course = fix.course,
                    zone = %zone,
                    "entering zone"
                );
                return MatchResult::Entered {
                    frame_id: frame.id,
                    media: frame.media.clone(),
                };
            }
        }

        if let Some(idx) = prev.take() {
            if let Some(frame) = frames.get(idx) {
                info!(
                    frame_id = frame.id,
                    lat = fix.lat,
                    lon = fix.lon,
                    "exiting zone"
                );
                return MatchResult::Exited { frame_id: frame.id };
            }
        }

        MatchResult::NoMatch
    }
}
