use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, warn};

use avigeo::{GeofenceEngine, GpsFix, MatchResult};
use aviplayer::AnnouncementController;
use avitask::{Signal, TaskBody, TaskContext};

use crate::navigator::Navigator;
use crate::source::PositionSource;

/// Invoked with `Some(frame_id)` when the vehicle enters a zone and `None`
/// when it leaves without entering another; drives the UI ticker only.
pub type FrameListener = Box<dyn Fn(Option<i32>) + Send>;

/// GPS acceptance tuning.
#[derive(Debug, Clone, Copy)]
pub struct AnnouncementSettings {
    /// Samples at or below this speed are stationary noise (the course may
    /// not have settled yet).
    pub min_valid_speed_kmh: f64,
    /// Consecutive usable samples required before one is accepted.
    pub valid_threshold: u32,
}

impl Default for AnnouncementSettings {
    fn default() -> Self {
        Self {
            min_valid_speed_kmh: 6.0,
            valid_threshold: 4,
        }
    }
}

/// Work function of the announcement loop.
///
/// Each tick: read one fix, filter it for validity and stability, match the
/// accepted fix against the route's zones and forward entries to the
/// playback controller. Every processed fix is appended to the track log.
pub struct AnnouncementTask {
    source: Arc<dyn PositionSource>,
    engine: Arc<GeofenceEngine>,
    controller: Arc<AnnouncementController>,
    navigator: Arc<Navigator>,
    settings: AnnouncementSettings,

    validity_counter: u32,
    was_valid: bool,
    frame_listener: Option<FrameListener>,
}

impl AnnouncementTask {
    pub fn new(
        source: Arc<dyn PositionSource>,
        engine: Arc<GeofenceEngine>,
        controller: Arc<AnnouncementController>,
        navigator: Arc<Navigator>,
        settings: AnnouncementSettings,
    ) -> Self {
        Self {
            source,
            engine,
            controller,
            navigator,
            settings,
            validity_counter: 0,
            was_valid: false,
            frame_listener: None,
        }
    }

    /// Hook for the UI layer's "current frame changed" ticker.
    pub fn set_frame_listener(&mut self, listener: FrameListener) {
        self.frame_listener = Some(listener);
    }

    /// Latest processed position for display: validity, latitude, longitude.
    pub fn current_position(&self) -> (bool, f64, f64) {
        self.navigator.position()
    }

    /// A sample is usable when the receiver marks it valid and the vehicle
    /// is moving faster than the configured minimum. An acceptance requires
    /// `valid_threshold` consecutive usable samples; the counter resets on
    /// any unusable sample and after every acceptance.
    fn sample_accepted(&mut self, fix: &GpsFix) -> bool {
        if !fix.valid || fix.speed_kmh < self.settings.min_valid_speed_kmh {
            self.validity_counter = 0;
            return false;
        }

        self.validity_counter += 1;
        if self.validity_counter >= self.settings.valid_threshold {
            self.validity_counter = 0;
            return true;
        }
        false
    }

    fn notify_frame(&self, frame_id: Option<i32>) {
        if let Some(listener) = &self.frame_listener {
            listener(frame_id);
        }
    }
}

impl TaskBody for AnnouncementTask {
    fn run_once(&mut self, ctx: &TaskContext) -> Result<Signal> {
        if ctx.stop_requested() {
            return Ok(Signal::Stop);
        }

        let fix = self.navigator.update(self.source.read()?);

        if !fix.valid && self.was_valid {
            // Log the loss of valid coordinates once, on the transition.
            warn!("valid GPS data lost");
            self.was_valid = false;
        }

        if self.sample_accepted(&fix) {
            self.was_valid = true;

            match self.engine.match_fix(&fix) {
                MatchResult::Entered { frame_id, media } => {
                    self.notify_frame(Some(frame_id));
                    self.controller.submit(media);
                }
                MatchResult::Exited { frame_id } => {
                    debug!(frame_id, "left zone without entering another");
                    self.notify_frame(None);
                }
                MatchResult::StillInside | MatchResult::NoMatch => {}
            }
        }

        if let Err(e) = self.navigator.log_position(&fix) {
            warn!(error = %e, "failed to append to the track log");
        }

        Ok(Signal::Sleep)
    }
}
