use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Fired once per completed or externally stopped playback.
pub type StoppedCallback = Box<dyn Fn() + Send + Sync>;

/// Platform audio output.
///
/// `play` must not be re-entered by a second request until the stopped
/// callback has fired for the previous one; the controller's dispatcher
/// guarantees this by draining `is_playing` before each play call.
pub trait AudioDriver: Send + Sync {
    fn play(&self, path: &Path) -> Result<()>;

    /// Request the current playback to stop. The stopped callback fires as a
    /// consequence, possibly synchronously from inside this call.
    fn stop(&self);

    fn is_playing(&self) -> bool;

    fn set_stopped_callback(&self, callback: Option<StoppedCallback>);
}

/// Shared storage for the single stopped callback of a driver.
struct CallbackSlot(Mutex<Option<StoppedCallback>>);

impl CallbackSlot {
    fn new() -> Self {
        Self(Mutex::new(None))
    }

    fn set(&self, callback: Option<StoppedCallback>) {
        *self.0.lock() = callback;
    }

    fn fire(&self) {
        if let Some(cb) = self.0.lock().as_ref() {
            cb();
        }
    }
}

/// Driver that only logs, simulating a fixed playback duration on a helper
/// thread. Used for dry runs and bench setups without audio hardware.
pub struct NullDriver {
    state: Arc<NullState>,
    duration: Duration,
}

struct NullState {
    playing: AtomicBool,
    // Incremented on every play and stop so a stale completion thread from
    // a previous playback never fires the callback twice.
    generation: AtomicU64,
    callback: CallbackSlot,
}

impl NullDriver {
    pub fn new(duration: Duration) -> Self {
        Self {
            state: Arc::new(NullState {
                playing: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                callback: CallbackSlot::new(),
            }),
            duration,
        }
    }
}

impl AudioDriver for NullDriver {
    fn play(&self, path: &Path) -> Result<()> {
        info!(path = %path.display(), "null driver: play");
        let generation = self.state.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.state.playing.store(true, Ordering::Release);

        let state = Arc::clone(&self.state);
        let duration = self.duration;
        thread::Builder::new()
            .name("null-audio".into())
            .spawn(move || {
                thread::sleep(duration);
                if state.generation.load(Ordering::Acquire) == generation
                    && state.playing.swap(false, Ordering::AcqRel)
                {
                    state.callback.fire();
                }
            })?;
        Ok(())
    }

    fn stop(&self) {
        self.state.generation.fetch_add(1, Ordering::AcqRel);
        if self.state.playing.swap(false, Ordering::AcqRel) {
            info!("null driver: stop");
            // Deliberately synchronous, like a codec stop-complete interrupt.
            self.state.callback.fire();
        }
    }

    fn is_playing(&self) -> bool {
        self.state.playing.load(Ordering::Acquire)
    }

    fn set_stopped_callback(&self, callback: Option<StoppedCallback>) {
        self.state.callback.set(callback);
    }
}

const CHILD_POLL: Duration = Duration::from_millis(50);

/// Driver that delegates playback to an external CLI player process
/// (for example `mpg123 -q`). A monitor thread fires the stopped callback
/// when the child exits; `stop` kills the child.
pub struct PlayerProcessDriver {
    command: String,
    state: Arc<ProcessState>,
}

struct ProcessState {
    child: Mutex<Option<Child>>,
    callback: CallbackSlot,
}

impl PlayerProcessDriver {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            state: Arc::new(ProcessState {
                child: Mutex::new(None),
                callback: CallbackSlot::new(),
            }),
        }
    }
}

impl AudioDriver for PlayerProcessDriver {
    fn play(&self, path: &Path) -> Result<()> {
        let mut parts = self.command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| Error::Driver("empty player command".into()))?;

        let mut guard = self.state.child.lock();
        if guard.is_some() {
            return Err(Error::Driver("player process already running".into()));
        }

        let child = Command::new(program)
            .args(parts)
            .arg(path)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        let pid = child.id();
        info!(path = %path.display(), pid, "spawned player process");
        *guard = Some(child);
        drop(guard);

        let state = Arc::clone(&self.state);
        thread::Builder::new()
            .name("player-monitor".into())
            .spawn(move || loop {
                thread::sleep(CHILD_POLL);
                let mut guard = state.child.lock();
                match guard.as_mut() {
                    Some(child) if child.id() == pid => match child.try_wait() {
                        Ok(Some(status)) => {
                            debug!(pid, %status, "player process exited");
                            *guard = None;
                            drop(guard);
                            state.callback.fire();
                            break;
                        }
                        Ok(None) => {}
                        Err(e) => {
                            warn!(pid, error = %e, "failed to poll player process");
                            *guard = None;
                            drop(guard);
                            state.callback.fire();
                            break;
                        }
                    },
                    // Replaced or cleared by someone else; not ours anymore.
                    _ => break,
                }
            })?;
        Ok(())
    }

    fn stop(&self) {
        if let Some(child) = self.state.child.lock().as_mut() {
            debug!(pid = child.id(), "killing player process");
            if let Err(e) = child.kill() {
                warn!(error = %e, "failed to kill player process");
            }
            // The monitor thread observes the exit and fires the callback.
        }
    }

    fn is_playing(&self) -> bool {
        self.state.child.lock().is_some()
    }

    fn set_stopped_callback(&self, callback: Option<StoppedCallback>) {
        self.state.callback.set(callback);
    }
}
