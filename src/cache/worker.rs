use crate::cache::core::Shared;
use crate::cache::sweep::SWEEP_LOG_TARGET;
use crate::errors::CacheError;
use parking_lot::{Condvar, Mutex};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

#[derive(Default)]
struct SignalState {
    stopped: bool,
    rearm: bool,
}

/// Why [`ShutdownSignal::wait`] returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Wake {
    Stopped,
    TimedOut,
    /// The interval changed; the caller should start a new wait.
    Rearmed,
}

/// Stop flag the sweep thread waits on between cycles.
#[derive(Default)]
pub(crate) struct ShutdownSignal {
    state: Mutex<SignalState>,
    cv: Condvar,
}

impl ShutdownSignal {
    pub(crate) fn trigger(&self) {
        self.state.lock().stopped = true;
        self.cv.notify_all();
    }

    /// Interrupts the current wait without requesting shutdown.
    pub(crate) fn rearm(&self) {
        self.state.lock().rearm = true;
        self.cv.notify_all();
    }

    pub(crate) fn is_triggered(&self) -> bool {
        self.state.lock().stopped
    }

    /// Blocks for up to `timeout`, or until stopped or re-armed.
    pub(crate) fn wait(&self, timeout: Duration) -> Wake {
        let deadline = Instant::now() + timeout;
        let mut st = self.state.lock();
        loop {
            if st.stopped {
                return Wake::Stopped;
            }
            if std::mem::take(&mut st.rearm) {
                return Wake::Rearmed;
            }
            if self.cv.wait_until(&mut st, deadline).timed_out() {
                return if st.stopped { Wake::Stopped } else { Wake::TimedOut };
            }
        }
    }
}

/// Handle to the background sweep thread.
pub(crate) struct SweepWorker {
    signal: Arc<ShutdownSignal>,
    handle: JoinHandle<()>,
}

impl SweepWorker {
    /// Spawns the sweep loop. The thread only holds a weak reference to the cache,
    /// so dropping every cache handle also ends the loop.
    pub(crate) fn spawn<V>(shared: Weak<Shared<V>>, thread_name: &str) -> Result<Self, CacheError>
    where
        V: Clone + Send + Sync + 'static,
    {
        let signal = Arc::new(ShutdownSignal::default());
        let thread_signal = Arc::clone(&signal);
        let handle = std::thread::Builder::new()
            .name(thread_name.to_string())
            .spawn(move || sweep_loop(&shared, &thread_signal))
            .map_err(|e| CacheError::Init(format!("failed to spawn sweep thread: {e}")))?;
        Ok(Self { signal, handle })
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Makes the thread restart its wait, picking up a changed interval.
    pub(crate) fn rearm(&self) {
        self.signal.rearm();
    }

    /// Requests shutdown without waiting for the thread.
    pub(crate) fn signal(&self) {
        self.signal.trigger();
    }

    /// Requests shutdown and joins the thread, unless called from the sweep thread itself.
    pub(crate) fn stop(self) {
        self.signal.trigger();
        if self.handle.thread().id() == std::thread::current().id() {
            return;
        }
        if self.handle.join().is_err() {
            log::error!(target: SWEEP_LOG_TARGET, "sweep thread terminated by panic");
        }
    }
}

fn sweep_loop<V>(shared: &Weak<Shared<V>>, signal: &ShutdownSignal)
where
    V: Clone + Send + Sync + 'static,
{
    log::info!(target: SWEEP_LOG_TARGET, "sweep thread started");
    loop {
        // Re-read every cycle so interval changes apply on the next wait.
        let Some(interval) = shared.upgrade().map(|s| s.sweep_interval()) else {
            break;
        };
        match signal.wait(interval) {
            Wake::Stopped => break,
            Wake::Rearmed => continue,
            Wake::TimedOut => {}
        }
        let Some(cache) = shared.upgrade() else {
            break;
        };
        cache.sweep(&|| signal.is_triggered());
    }
    log::info!(target: SWEEP_LOG_TARGET, "sweep thread stopped");
}
