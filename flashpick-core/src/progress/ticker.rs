use super::{Estimator, EstimatorState};
use crate::error::Result;
use log::debug;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

// Upper bound on how long the driver thread sleeps before rechecking the
// estimator, so it exits promptly after a terminal transition.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Drives an [`Estimator`] against the wall clock from a background thread.
///
/// The writer calls [`Ticker::update`] from its own loop; reports are
/// produced on the estimator's fixed cadence by the driver thread. The
/// progress callback runs on the driver thread (and, for the start and
/// terminal reports, on the caller's thread) with the estimator locked, so it
/// must not call back into the `Ticker`.
pub struct Ticker {
    estimator: Arc<Mutex<Estimator>>,
    handle: Option<JoinHandle<()>>,
}

fn lock(estimator: &Mutex<Estimator>) -> MutexGuard<'_, Estimator> {
    estimator.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Ticker {
    /// Starts `estimator` and spawns the thread that fires its timers.
    pub fn start(mut estimator: Estimator) -> Result<Self> {
        estimator.start_update()?;
        let estimator = Arc::new(Mutex::new(estimator));

        let shared = estimator.clone();
        let handle = thread::spawn(move || {
            loop {
                let deadline = {
                    let mut estimator = lock(&shared);
                    estimator.advance_to(Instant::now());
                    if estimator.state() != EstimatorState::Running {
                        break;
                    }
                    estimator.next_deadline()
                };
                let wait = deadline
                    .map(|d| d.saturating_duration_since(Instant::now()))
                    .unwrap_or(POLL_INTERVAL)
                    .min(POLL_INTERVAL);
                thread::sleep(wait);
            }
            debug!("Progress ticker stopped");
        });

        Ok(Ticker {
            estimator,
            handle: Some(handle),
        })
    }

    pub fn update(&self, delta: u64) -> Result<()> {
        lock(&self.estimator).update(delta)
    }

    pub fn state(&self) -> EstimatorState {
        lock(&self.estimator).state()
    }

    /// Aborts the run. No report is emitted after the abort report.
    pub fn abort(mut self) -> Result<()> {
        let result = lock(&self.estimator).abort();
        self.join();
        result
    }

    pub fn complete(mut self) -> Result<()> {
        let result = lock(&self.estimator).complete();
        self.join();
        result
    }

    fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            // The thread only panics if the callback did; nothing to recover.
            let _ = handle.join();
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        {
            let mut estimator = lock(&self.estimator);
            if !estimator.state().is_terminal() {
                let _ = estimator.abort();
            }
        }
        self.join();
    }
}
