//! Turns a raw "bytes processed" feed into percentage, smoothed speed and ETA.
//!
//! The [`Estimator`] is a state machine driven by an explicit clock: the
//! owner feeds it byte deltas with [`Estimator::update`] at whatever rate
//! the writer produces them, and calls [`Estimator::advance_to`] to fire any
//! timer events that are due. Reports go out on a fixed one-second cadence
//! regardless of how often `update` is called.
//!
//! [`Ticker`] drives an estimator from a background thread against the wall
//! clock.
//!
//! ```rust,no_run
//! use flashpick_core::progress::{Estimator, EstimatorOptions, Ticker};
//!
//! let estimator = Estimator::new(
//!     EstimatorOptions::default().total_size(4_000_000_000),
//!     |snapshot| println!("{}%", snapshot.percentage),
//! );
//! let ticker = Ticker::start(estimator)?;
//! ticker.update(1024 * 1024)?;
//! ticker.complete()?;
//! # Ok::<(), flashpick_core::Error>(())
//! ```
use crate::error::{Error, Result};
use log::{info, trace, warn};
use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};

mod ticker;
pub use ticker::Ticker;

/// Reporting cadence. Calibrated together with [`SMOOTHING_FACTOR`].
pub const TICK_INTERVAL: Duration = Duration::from_millis(1000);
/// Weight of the newest one-second sample in the moving average.
pub const SMOOTHING_FACTOR: f64 = 0.005;
pub const DEFAULT_INITIAL_UPDATE_DELAY: Duration = Duration::from_millis(2000);

/// One progress report. `None` means "unknown".
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    /// 0 to 99 while running; 100 only once the operation has completed.
    pub percentage: u8,
    /// Seconds remaining.
    pub eta: Option<u64>,
    /// Smoothed throughput in bytes per second.
    pub speed: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimatorState {
    Idle,
    Running,
    Completed,
    Aborted,
}

impl EstimatorState {
    pub fn is_terminal(self) -> bool {
        matches!(self, EstimatorState::Completed | EstimatorState::Aborted)
    }

    fn name(self) -> &'static str {
        match self {
            EstimatorState::Idle => "idle",
            EstimatorState::Running => "running",
            EstimatorState::Completed => "completed",
            EstimatorState::Aborted => "aborted",
        }
    }
}

impl fmt::Display for EstimatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone)]
pub struct EstimatorOptions {
    /// Total bytes to process. `None` (or zero) means unknown: percentage
    /// and ETA cannot be computed.
    pub total_size: Option<u64>,
    /// Bytes already processed before this run, e.g. when resuming.
    pub start_size: u64,
    /// Window used to seed the average speed before the first tick.
    pub initial_update_delay: Duration,
}

impl Default for EstimatorOptions {
    fn default() -> Self {
        EstimatorOptions {
            total_size: None,
            start_size: 0,
            initial_update_delay: DEFAULT_INITIAL_UPDATE_DELAY,
        }
    }
}

impl EstimatorOptions {
    pub fn total_size(mut self, total_size: u64) -> Self {
        self.total_size = Some(total_size);
        self
    }

    pub fn start_size(mut self, start_size: u64) -> Self {
        self.start_size = start_size;
        self
    }

    pub fn initial_update_delay(mut self, delay: Duration) -> Self {
        self.initial_update_delay = delay;
        self
    }
}

pub type ProgressCallback = Box<dyn FnMut(ProgressSnapshot) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerEvent {
    Seed,
    Tick,
}

pub struct Estimator {
    callback: ProgressCallback,
    state: EstimatorState,
    total_size: u64,
    start_size: u64,
    initial_update_delay: Duration,
    /// Bytes reported through `update`, excluding `start_size`.
    processed: u64,
    last_updated_size: u64,
    seed_base_size: u64,
    average_speed: f64,
    seeded: bool,
    last_percentage: u8,
    next_event: Option<(Instant, TimerEvent)>,
}

impl fmt::Debug for Estimator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Estimator")
            .field("state", &self.state)
            .field("total_size", &self.total_size)
            .field("updated_size", &self.updated_size())
            .field("average_speed", &self.average_speed)
            .finish_non_exhaustive()
    }
}

impl Estimator {
    pub fn new<F>(options: EstimatorOptions, callback: F) -> Self
    where
        F: FnMut(ProgressSnapshot) + Send + 'static,
    {
        Estimator {
            callback: Box::new(callback),
            state: EstimatorState::Idle,
            total_size: options.total_size.unwrap_or(0),
            start_size: options.start_size,
            initial_update_delay: options.initial_update_delay,
            processed: 0,
            last_updated_size: 0,
            seed_base_size: 0,
            average_speed: 0.0,
            seeded: false,
            last_percentage: 0,
            next_event: None,
        }
    }

    pub fn state(&self) -> EstimatorState {
        self.state
    }

    /// Total bytes processed so far, including the start offset.
    pub fn updated_size(&self) -> u64 {
        self.start_size.saturating_add(self.processed)
    }

    pub fn average_speed(&self) -> f64 {
        self.average_speed
    }

    /// When the next timer event is due, if one is pending.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.next_event.map(|(at, _)| at)
    }

    fn violation(&self, operation: &'static str) -> Error {
        warn!("Rejected {} on {} estimator", operation, self.state);
        Error::LifecycleViolation {
            operation,
            state: self.state.name(),
        }
    }

    pub fn set_total_size(&mut self, total_size: u64) -> Result<()> {
        if self.state != EstimatorState::Idle {
            return Err(self.violation("set total size"));
        }
        self.total_size = total_size;
        Ok(())
    }

    pub fn set_start_size(&mut self, start_size: u64) -> Result<()> {
        if self.state != EstimatorState::Idle {
            return Err(self.violation("set start size"));
        }
        self.start_size = start_size;
        Ok(())
    }

    pub fn start_update(&mut self) -> Result<()> {
        self.start_update_at(Instant::now())
    }

    /// Starts the run as of `now`: reports the initial percentage with
    /// unknown speed and ETA, and schedules the seeding event.
    pub fn start_update_at(&mut self, now: Instant) -> Result<()> {
        if self.state != EstimatorState::Idle {
            return Err(self.violation("start"));
        }
        self.state = EstimatorState::Running;
        self.seed_base_size = self.updated_size();
        self.last_updated_size = self.seed_base_size;
        self.next_event = Some((now + self.initial_update_delay, TimerEvent::Seed));

        let percentage = self.percentage();
        self.last_percentage = percentage;
        self.emit(ProgressSnapshot {
            percentage,
            eta: None,
            speed: None,
        });
        Ok(())
    }

    /// Accounts for `delta` more processed bytes. Never reports by itself.
    pub fn update(&mut self, delta: u64) -> Result<()> {
        if self.state.is_terminal() {
            return Err(self.violation("update"));
        }
        self.processed = self.processed.saturating_add(delta);
        Ok(())
    }

    /// Fires every timer event due at or before `now`, in order.
    pub fn advance_to(&mut self, now: Instant) {
        while self.state == EstimatorState::Running {
            let Some((at, event)) = self.next_event else {
                break;
            };
            if at > now {
                break;
            }
            match event {
                TimerEvent::Seed => self.seed(),
                TimerEvent::Tick => self.tick(),
            }
            self.next_event = Some((at + TICK_INTERVAL, TimerEvent::Tick));
        }
    }

    fn seed(&mut self) {
        let updated = self.updated_size();
        let delta = updated.saturating_sub(self.seed_base_size) as f64;
        let window = self.initial_update_delay.as_secs_f64();
        self.average_speed = if window > 0.0 { delta / window } else { delta };
        self.last_updated_size = updated;
        self.seeded = true;
        trace!("Seeded average speed at {:.0} B/s", self.average_speed);
        self.report();
    }

    fn tick(&mut self) {
        let updated = self.updated_size();
        let last_speed = updated.saturating_sub(self.last_updated_size) as f64;
        self.last_updated_size = updated;

        // Stalls do not drag the average down.
        if last_speed > 0.0 {
            self.average_speed =
                SMOOTHING_FACTOR * last_speed + (1.0 - SMOOTHING_FACTOR) * self.average_speed;
        }
        trace!(
            "Tick: {} bytes, last {:.0} B/s, average {:.0} B/s",
            updated, last_speed, self.average_speed
        );
        self.report();
    }

    fn report(&mut self) {
        let percentage = self.percentage().max(self.last_percentage);
        self.last_percentage = percentage;
        let snapshot = ProgressSnapshot {
            percentage,
            eta: self.eta(),
            speed: self.seeded.then_some(self.average_speed),
        };
        self.emit(snapshot);
    }

    fn percentage(&self) -> u8 {
        if self.total_size == 0 {
            return 0;
        }
        let ratio = self.updated_size() as f64 / self.total_size as f64;
        (ratio * 100.0).round().clamp(0.0, 99.0) as u8
    }

    fn eta(&self) -> Option<u64> {
        if self.total_size == 0 || self.average_speed <= 0.0 {
            return None;
        }
        let pending = self.total_size.checked_sub(self.updated_size())?;
        let eta = (pending as f64 / self.average_speed).floor() as u64;
        Some(eta.max(1))
    }

    fn emit(&mut self, snapshot: ProgressSnapshot) {
        (self.callback)(snapshot);
    }

    /// Stops the run, keeping the last percentage and forgetting speed/ETA.
    pub fn abort(&mut self) -> Result<()> {
        if self.state.is_terminal() {
            return Err(self.violation("abort"));
        }
        self.state = EstimatorState::Aborted;
        self.next_event = None;
        info!("Progress aborted at {}%", self.last_percentage);
        self.emit(ProgressSnapshot {
            percentage: self.last_percentage,
            eta: None,
            speed: None,
        });
        Ok(())
    }

    /// Finishes the run, reporting 100% with zero speed and ETA.
    pub fn complete(&mut self) -> Result<()> {
        if self.state.is_terminal() {
            return Err(self.violation("complete"));
        }
        self.state = EstimatorState::Completed;
        self.next_event = None;
        self.last_percentage = 100;
        info!("Progress complete after {} bytes", self.updated_size());
        self.emit(ProgressSnapshot {
            percentage: 100,
            eta: Some(0),
            speed: Some(0.0),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recording(options: EstimatorOptions) -> (Estimator, Arc<Mutex<Vec<ProgressSnapshot>>>) {
        let reports = Arc::new(Mutex::new(Vec::new()));
        let sink = reports.clone();
        let estimator = Estimator::new(options, move |s| sink.lock().unwrap().push(s));
        (estimator, reports)
    }

    #[test]
    fn start_reports_unknown_speed() {
        let (mut estimator, reports) = recording(EstimatorOptions::default().total_size(1000));
        estimator.set_start_size(250).unwrap();
        estimator.start_update_at(Instant::now()).unwrap();
        let reports = reports.lock().unwrap();
        assert_eq!(
            reports[0],
            ProgressSnapshot {
                percentage: 25,
                eta: None,
                speed: None
            }
        );
    }

    #[test]
    fn seed_uses_initial_window() {
        let (mut estimator, reports) = recording(EstimatorOptions::default().total_size(10_000));
        let start = Instant::now();
        estimator.start_update_at(start).unwrap();
        estimator.update(2000).unwrap();
        estimator.advance_to(start + Duration::from_millis(1999));
        assert_eq!(reports.lock().unwrap().len(), 1);
        estimator.advance_to(start + Duration::from_millis(2000));
        assert_eq!(estimator.average_speed(), 1000.0);
        let last = *reports.lock().unwrap().last().unwrap();
        assert_eq!(last.speed, Some(1000.0));
        assert_eq!(last.eta, Some(8));
        assert_eq!(last.percentage, 20);
    }

    #[test]
    fn stalls_do_not_lower_average() {
        let (mut estimator, _) = recording(EstimatorOptions::default().total_size(1_000_000));
        let start = Instant::now();
        estimator.start_update_at(start).unwrap();
        estimator.update(2000).unwrap();
        estimator.advance_to(start + Duration::from_secs(2));
        estimator.advance_to(start + Duration::from_secs(5));
        assert_eq!(estimator.average_speed(), 1000.0);
        estimator.update(3000).unwrap();
        estimator.advance_to(start + Duration::from_secs(6));
        let expected = SMOOTHING_FACTOR * 3000.0 + (1.0 - SMOOTHING_FACTOR) * 1000.0;
        assert_eq!(estimator.average_speed(), expected);
    }

    #[test]
    fn unknown_total_reports_zero_percent() {
        let (mut estimator, reports) = recording(EstimatorOptions::default());
        let start = Instant::now();
        estimator.start_update_at(start).unwrap();
        estimator.update(5000).unwrap();
        estimator.advance_to(start + Duration::from_secs(3));
        for report in reports.lock().unwrap().iter() {
            assert_eq!(report.percentage, 0);
            assert_eq!(report.eta, None);
        }
    }

    #[test]
    fn eta_floors_at_one_second() {
        let (mut estimator, reports) = recording(EstimatorOptions::default().total_size(1000));
        let start = Instant::now();
        estimator.start_update_at(start).unwrap();
        estimator.update(999).unwrap();
        estimator.advance_to(start + Duration::from_secs(2));
        let last = *reports.lock().unwrap().last().unwrap();
        assert_eq!(last.eta, Some(1));
        assert_eq!(last.percentage, 99);
    }

    #[test]
    fn overshoot_gives_unknown_eta() {
        let (mut estimator, reports) = recording(EstimatorOptions::default().total_size(1000));
        let start = Instant::now();
        estimator.start_update_at(start).unwrap();
        estimator.update(1500).unwrap();
        estimator.advance_to(start + Duration::from_secs(2));
        let last = *reports.lock().unwrap().last().unwrap();
        assert_eq!(last.eta, None);
        assert_eq!(last.percentage, 99);
    }

    #[test]
    fn configuration_is_locked_after_start() {
        let (mut estimator, _) = recording(EstimatorOptions::default());
        estimator.start_update_at(Instant::now()).unwrap();
        for err in [
            estimator.set_total_size(1).unwrap_err(),
            estimator.set_start_size(1).unwrap_err(),
            estimator.start_update().unwrap_err(),
        ] {
            assert!(matches!(err, Error::LifecycleViolation { state: "running", .. }));
        }
    }

    #[test]
    fn terminal_states_reject_everything() {
        let (mut estimator, _) = recording(EstimatorOptions::default());
        estimator.start_update_at(Instant::now()).unwrap();
        estimator.complete().unwrap();
        assert_eq!(estimator.state(), EstimatorState::Completed);
        assert!(estimator.update(1).is_err());
        assert!(estimator.start_update().is_err());
        assert!(estimator.abort().is_err());
        assert!(estimator.complete().is_err());
        assert_eq!(estimator.next_deadline(), None);
    }
}
