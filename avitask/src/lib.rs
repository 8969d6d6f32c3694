//! Periodic background task primitive.
//!
//! A [`PeriodicTask`] runs a [`TaskBody`] repeatedly on a dedicated worker
//! thread. Between invocations the worker sleeps in tick-sized increments so
//! that a [`Signal::WakeUp`] or [`Signal::Stop`] is observed within one tick
//! rather than one full period.
//!
//! Stopping is cooperative: `stop()` only requests termination, `wait()`
//! joins the worker once the in-flight invocation returns, and `cancel()`
//! abandons the worker without waiting (the loop still observes the stop
//! signal within one tick and unwinds normally).

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, error, warn};

/// Default granularity of the interruptible sleep.
pub const DEFAULT_TICK: Duration = Duration::from_millis(250);

/// Control signal of a background task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Signal {
    /// Idle state, also the value a work function returns to keep looping.
    Sleep = 0,
    /// Force an immediate re-invocation of the work function.
    WakeUp = 1,
    /// Finish the current invocation, then exit the loop.
    Stop = 2,
}

/// Atomic storage for the last signal sent to a task.
///
/// Reads consume: taking a non-`Sleep` value resets the cell to `Sleep`, so
/// each wake-up or stop request is observed exactly once.
#[derive(Debug)]
struct SignalCell(AtomicU8);

impl SignalCell {
    fn new() -> Self {
        Self(AtomicU8::new(Signal::Sleep as u8))
    }

    fn send(&self, sig: Signal) {
        self.0.store(sig as u8, Ordering::Release);
    }

    fn take(&self) -> Signal {
        Self::decode(self.0.swap(Signal::Sleep as u8, Ordering::AcqRel))
    }

    fn peek(&self) -> Signal {
        Self::decode(self.0.load(Ordering::Acquire))
    }

    fn decode(raw: u8) -> Signal {
        match raw {
            1 => Signal::WakeUp,
            2 => Signal::Stop,
            _ => Signal::Sleep,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Timing {
    period: Duration,
    tick: Duration,
}

struct Shared {
    name: String,
    signal: SignalCell,
    timing: Mutex<Timing>,
}

impl Shared {
    fn timing(&self) -> Timing {
        *self.timing.lock()
    }

    /// Sleep for one period, polling the signal cell every tick.
    ///
    /// Returns early with the interrupting signal if one arrives; returns
    /// `Sleep` after a full uninterrupted period.
    fn sleep(&self) -> Signal {
        let Timing { period, tick } = self.timing();
        let mut elapsed = Duration::ZERO;

        while elapsed < period {
            thread::sleep(tick);
            elapsed += tick;

            let sig = self.signal.take();
            if sig != Signal::Sleep {
                return sig;
            }
        }

        Signal::Sleep
    }
}

/// Read-only view of the task state, passed to the work function so it can
/// notice an external stop request mid-invocation.
pub struct TaskContext {
    shared: Arc<Shared>,
}

impl TaskContext {
    /// Stand-alone context for driving a body outside a task loop, e.g. for
    /// a one-shot invocation or in tests.
    pub fn detached(name: impl Into<String>) -> Self {
        Self {
            shared: Arc::new(Shared {
                name: name.into(),
                signal: SignalCell::new(),
                timing: Mutex::new(Timing {
                    period: Duration::ZERO,
                    tick: DEFAULT_TICK,
                }),
            }),
        }
    }

    pub fn stop_requested(&self) -> bool {
        self.shared.signal.peek() == Signal::Stop
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }
}

/// Unit of work driven by a [`PeriodicTask`].
///
/// Errors returned by `run_once` are logged at the loop boundary and treated
/// as `Sleep`: only an explicit `Stop` return value or an external stop
/// request ends the loop.
pub trait TaskBody: Send + 'static {
    fn run_once(&mut self, ctx: &TaskContext) -> anyhow::Result<Signal>;
}

impl<F> TaskBody for F
where
    F: FnMut(&TaskContext) -> anyhow::Result<Signal> + Send + 'static,
{
    fn run_once(&mut self, ctx: &TaskContext) -> anyhow::Result<Signal> {
        self(ctx)
    }
}

/// Remote control for a [`PeriodicTask`], detached from its lifetime.
#[derive(Clone)]
pub struct TaskHandle {
    shared: Arc<Shared>,
}

impl TaskHandle {
    pub fn send_signal(&self, sig: Signal) {
        self.shared.signal.send(sig);
    }

    pub fn stop(&self) {
        self.send_signal(Signal::Stop);
    }

    pub fn wake_up(&self) {
        self.send_signal(Signal::WakeUp);
    }
}

/// A repeatedly scheduled background task with cooperative cancellation.
pub struct PeriodicTask {
    shared: Arc<Shared>,
    body: Option<Box<dyn TaskBody>>,
    thread: Option<JoinHandle<()>>,
}

impl PeriodicTask {
    pub fn new(name: impl Into<String>, body: impl TaskBody) -> Self {
        Self {
            shared: Arc::new(Shared {
                name: name.into(),
                signal: SignalCell::new(),
                timing: Mutex::new(Timing {
                    period: Duration::ZERO,
                    tick: DEFAULT_TICK,
                }),
            }),
            body: Some(Box::new(body)),
            thread: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Set how often the work function runs, with the default tick.
    pub fn set_period(&self, period: Duration) {
        self.set_period_with_tick(period, DEFAULT_TICK);
    }

    /// Set the period and the sleep polling granularity. The tick is clamped
    /// to the period so a short period never sleeps past itself.
    pub fn set_period_with_tick(&self, period: Duration, tick: Duration) {
        let tick = if tick.is_zero() || tick > period {
            period
        } else {
            tick
        };
        *self.shared.timing.lock() = Timing { period, tick };
    }

    pub fn send_signal(&self, sig: Signal) {
        self.shared.signal.send(sig);
    }

    /// Request graceful termination. The loop exits after the in-flight
    /// invocation returns, or within one tick if it is sleeping.
    pub fn stop(&self) {
        self.send_signal(Signal::Stop);
    }

    /// Force an immediate re-invocation of the work function.
    pub fn wake_up(&self) {
        self.send_signal(Signal::WakeUp);
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Cloneable remote control, usable from signal handlers and other
    /// threads that do not own the task.
    pub fn handle(&self) -> TaskHandle {
        TaskHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Begin the background loop. A no-op when the task is already running.
    ///
    /// With `run_immediately` false the loop sleeps one full period before
    /// the first invocation of the work function.
    pub fn start(&mut self, run_immediately: bool) -> anyhow::Result<()> {
        if self.thread.is_some() {
            debug!(task = %self.shared.name, "already running, start ignored");
            return Ok(());
        }

        let Some(mut body) = self.body.take() else {
            warn!(task = %self.shared.name, "task already ran to completion, start ignored");
            return Ok(());
        };

        if self.shared.timing().period.is_zero() {
            warn!(task = %self.shared.name, "period not set, refusing to start");
            self.body = Some(body);
            return Ok(());
        }

        // Clear any signal left over from before the start.
        self.shared.signal.send(Signal::Sleep);

        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name(self.shared.name.clone())
            .spawn(move || {
                let ctx = TaskContext {
                    shared: Arc::clone(&shared),
                };

                loop {
                    if !run_immediately && shared.sleep() == Signal::Stop {
                        break;
                    }

                    match panic::catch_unwind(AssertUnwindSafe(|| body.run_once(&ctx))) {
                        Ok(Ok(Signal::Stop)) => break,
                        Ok(Ok(_)) => {}
                        Ok(Err(e)) => {
                            error!(task = %shared.name, error = %e, "work function failed")
                        }
                        Err(_) => {
                            error!(task = %shared.name, "work function panicked")
                        }
                    }

                    if run_immediately && shared.sleep() == Signal::Stop {
                        break;
                    }
                }

                debug!(task = %shared.name, "task loop exited");
            })?;

        self.thread = Some(handle);
        Ok(())
    }

    /// Block until the loop thread has actually exited.
    pub fn wait(&mut self) {
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                error!(task = %self.shared.name, "task thread panicked");
            }
        }
    }

    /// Abandon the worker without waiting for the in-flight invocation.
    ///
    /// The stop signal is still sent so the loop winds down on its own
    /// within one tick of sleep; its resources are released when it does.
    pub fn cancel(&mut self) {
        self.stop();
        if let Some(handle) = self.thread.take() {
            drop(handle);
        }
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.cancel();
    }
}
