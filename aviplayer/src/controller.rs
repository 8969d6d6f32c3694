use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use avigeo::{MediaInfo, Mode, RouteHandle};

use crate::driver::AudioDriver;
use crate::error::Result;

/// Poll granularity for the pre-roll pause and the wait-for-driver-idle
/// loop inside the dispatcher.
const DISPATCH_TICK: Duration = Duration::from_millis(10);

struct StartRequest {
    media: MediaInfo,
    from_queue: bool,
}

struct PlaybackState {
    playing: Option<MediaInfo>,
    queue: VecDeque<MediaInfo>,
}

struct Inner {
    driver: Arc<dyn AudioDriver>,
    route: Arc<RouteHandle>,
    media_dir: PathBuf,
    state: Mutex<PlaybackState>,
    // Dropped on shutdown to close the dispatch channel.
    tx: Mutex<Option<Sender<StartRequest>>>,
    shutting_down: AtomicBool,
}

/// Playback state machine for zone announcements.
///
/// [`submit`] is the sole entry point for new announcement requests; the
/// interruption policy is keyed by the mode of the *currently playing* item.
/// The pause/drain/play sequence runs on a dedicated dispatcher worker so
/// the state lock is never held across a call into the audio driver — the
/// driver's stop-completion callback may re-enter
/// [`on_playback_finished`] synchronously.
///
/// [`submit`]: AnnouncementController::submit
/// [`on_playback_finished`]: AnnouncementController::on_playback_finished
pub struct AnnouncementController {
    inner: Arc<Inner>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl AnnouncementController {
    pub fn new(
        driver: Arc<dyn AudioDriver>,
        route: Arc<RouteHandle>,
        media_dir: PathBuf,
    ) -> Result<Self> {
        let (tx, rx) = crossbeam_channel::unbounded();

        let inner = Arc::new(Inner {
            driver: Arc::clone(&driver),
            route,
            media_dir,
            state: Mutex::new(PlaybackState {
                playing: None,
                queue: VecDeque::new(),
            }),
            tx: Mutex::new(Some(tx)),
            shutting_down: AtomicBool::new(false),
        });

        // Weak reference: the driver outliving the controller must not keep
        // the controller state alive through its callback.
        let weak: Weak<Inner> = Arc::downgrade(&inner);
        driver.set_stopped_callback(Some(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.on_playback_finished();
            }
        })));

        let worker = Arc::clone(&inner);
        let dispatcher = thread::Builder::new()
            .name("announce-dispatch".into())
            .spawn(move || dispatch_loop(worker, rx))?;

        Ok(Self {
            inner,
            dispatcher: Mutex::new(Some(dispatcher)),
        })
    }

    /// Dispatch a new announcement according to the current playback mode.
    pub fn submit(&self, media: MediaInfo) {
        self.inner.submit(media);
    }

    /// Completion callback, invoked by the audio driver exactly once per
    /// completed or explicitly stopped playback.
    pub fn on_playback_finished(&self) {
        self.inner.on_playback_finished();
    }

    pub fn now_playing(&self) -> Option<MediaInfo> {
        self.inner.state.lock().playing.clone()
    }

    pub fn pending(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    /// Clear all playback state, stop the driver and join the dispatcher.
    pub fn shutdown(&self) {
        if self.inner.shutting_down.swap(true, Ordering::AcqRel) {
            return;
        }

        {
            let mut state = self.inner.state.lock();
            state.queue.clear();
            state.playing = None;
        }

        // Closing the channel lets the dispatcher drain out.
        self.inner.tx.lock().take();
        if let Some(handle) = self.dispatcher.lock().take() {
            if handle.join().is_err() {
                error!("playback dispatcher panicked");
            }
        }

        self.inner.driver.set_stopped_callback(None);
        self.inner.driver.stop();
        debug!("announcement controller shut down");
    }
}

impl Drop for AnnouncementController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Inner {
    fn submit(&self, media: MediaInfo) {
        if self.shutting_down.load(Ordering::Acquire) {
            return;
        }

        let mut state = self.state.lock();

        let current_mode = if self.driver.is_playing() {
            state.playing.as_ref().map(|m| m.mode)
        } else {
            None
        };

        match current_mode {
            None => self.start_locked(&mut state, media, false),

            Some(Mode::Uninterrupted) | Some(Mode::UninterruptedParent) => {
                warn!(
                    filename = %media.filename,
                    "uninterrupted media is playing now, ignoring"
                );
            }

            Some(Mode::Queued) => {
                debug!(filename = %media.filename, "queued media is playing, enqueuing");
                state.queue.push_back(media);
            }

            Some(Mode::Interrupted) | Some(Mode::InterruptedParent) => {
                debug!(filename = %media.filename, "interruptible media is playing, stopping it");
                state.queue.clear();
                state.queue.push_back(media);
                drop(state);
                // The stop-completion callback re-enters through
                // on_playback_finished, which pops the queue and starts the
                // replacement. The state lock must be released first.
                self.driver.stop();
            }
        }
    }

    fn on_playback_finished(&self) {
        debug!("audio stopped");

        let mut state = self.state.lock();
        state.playing = None;

        if self.shutting_down.load(Ordering::Acquire) {
            return;
        }

        let Some(next) = state.queue.pop_front() else {
            debug!("media queue is empty");
            return;
        };
        self.start_locked(&mut state, next, true);
    }

    /// Queue the chained child (if any) and hand the item to the dispatcher.
    /// The caller holds the state lock; no driver call happens here.
    fn start_locked(&self, state: &mut PlaybackState, media: MediaInfo, from_queue: bool) {
        self.enqueue_child(state, &media);

        if let Some(tx) = self.tx.lock().as_ref() {
            if tx.send(StartRequest { media, from_queue }).is_err() {
                warn!("playback dispatcher is gone, dropping start request");
            }
        }
    }

    fn enqueue_child(&self, state: &mut PlaybackState, parent: &MediaInfo) {
        if !parent.mode.is_parent() {
            return;
        }
        let Some(id) = parent.id_next else {
            return;
        };

        match self.route.current().child(id) {
            Some(child) => {
                debug!(
                    id,
                    filename = %child.filename,
                    mode = %child.mode,
                    "enqueuing child media"
                );
                state.queue.push_back(child.clone());
            }
            None => warn!(id, "no child media found"),
        }
    }

    /// Runs on the dispatcher worker: pre-roll pause, wait for the driver to
    /// drain, issue the play call, then record "now playing" under the lock.
    fn start_playback(&self, request: StartRequest) -> Result<()> {
        if request.media.pause_secs > 0 {
            debug!(secs = request.media.pause_secs, "waiting pause before playing");
            let total = Duration::from_secs(u64::from(request.media.pause_secs));
            let mut elapsed = Duration::ZERO;
            while elapsed < total {
                if self.shutting_down.load(Ordering::Acquire) {
                    return Ok(());
                }
                thread::sleep(DISPATCH_TICK);
                elapsed += DISPATCH_TICK;
            }
        }

        while self.driver.is_playing() {
            if self.shutting_down.load(Ordering::Acquire) {
                return Ok(());
            }
            thread::sleep(DISPATCH_TICK);
        }

        if self.shutting_down.load(Ordering::Acquire) {
            return Ok(());
        }

        let path = self.media_dir.join(&request.media.filename);
        info!(
            path = %path.display(),
            mode = %request.media.mode,
            from_queue = request.from_queue,
            "playing audio"
        );
        self.driver.play(&path)?;

        self.state.lock().playing = Some(request.media);
        Ok(())
    }
}

fn dispatch_loop(inner: Arc<Inner>, rx: Receiver<StartRequest>) {
    while let Ok(request) = rx.recv() {
        if inner.shutting_down.load(Ordering::Acquire) {
            break;
        }
        let filename = request.media.filename.clone();
        if let Err(e) = inner.start_playback(request) {
            // Leave the controller idle; the next qualifying GPS sample
            // re-triggers through the geofence hysteresis.
            error!(filename = %filename, error = %e, "failed to start playback");
        }
    }
    debug!("playback dispatcher exited");
}
