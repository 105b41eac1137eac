//! Schedules drive task fire cycles.
//!
//! A schedule blocks until the next tick and reports whether it is still
//! active and how many intervals went by unserved since the previous tick.
//! Waiting uses `tokio::time`, so schedules follow a paused test clock.

use crate::error::ScheduleError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

/// Lifecycle state reported with every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleState {
    /// The schedule produced a tick.
    Active,
    /// The schedule will produce no more ticks.
    Ended,
    /// The schedule failed to produce a tick.
    Error,
}

/// The outcome of waiting on a schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleResponse {
    state: ScheduleState,
    missed_intervals: u64,
    last_time: Instant,
    error: Option<ScheduleError>,
}

impl ScheduleResponse {
    /// A tick, after `missed_intervals` unserved intervals.
    #[must_use]
    pub fn active(missed_intervals: u64, last_time: Instant) -> Self {
        Self {
            state: ScheduleState::Active,
            missed_intervals,
            last_time,
            error: None,
        }
    }

    /// The schedule has finished.
    #[must_use]
    pub fn ended(last_time: Instant) -> Self {
        Self {
            state: ScheduleState::Ended,
            missed_intervals: 0,
            last_time,
            error: None,
        }
    }

    /// The schedule failed.
    #[must_use]
    pub fn error(error: ScheduleError, last_time: Instant) -> Self {
        Self {
            state: ScheduleState::Error,
            missed_intervals: 0,
            last_time,
            error: Some(error),
        }
    }

    /// Whether the schedule ticked, ended or failed.
    #[must_use]
    pub fn state(&self) -> ScheduleState {
        self.state
    }

    /// Intervals that elapsed without a tick since the previous response.
    #[must_use]
    pub fn missed_intervals(&self) -> u64 {
        self.missed_intervals
    }

    /// The instant the tick fired. Pass it to the next [`Schedule::wait`].
    #[must_use]
    pub fn last_time(&self) -> Instant {
        self.last_time
    }

    /// The failure, for an [`ScheduleState::Error`] response.
    #[must_use]
    pub fn schedule_error(&self) -> Option<&ScheduleError> {
        self.error.as_ref()
    }
}

/// A source of ticks for a task.
#[async_trait]
pub trait Schedule: Send + Sync {
    /// Checks the schedule's own parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if the schedule can never produce a valid tick.
    fn validate(&self) -> Result<(), ScheduleError>;

    /// Waits for the next tick.
    ///
    /// `last` is the `last_time` of the previous response, or `None` on the
    /// first wait.
    async fn wait(&self, last: Option<Instant>) -> ScheduleResponse;
}

/// Sleeps to the next interval boundary after `last` and returns the number
/// of whole intervals that already elapsed.
async fn wait_on_interval(last: Option<Instant>, interval: Duration) -> (u64, Instant) {
    let Some(last) = last else {
        tokio::time::sleep(interval).await;
        return (0, Instant::now());
    };

    let elapsed = Instant::now().saturating_duration_since(last).as_nanos();
    let interval_nanos = interval.as_nanos().max(1);
    let remainder = elapsed % interval_nanos;
    let missed = u64::try_from(elapsed / interval_nanos).unwrap_or(u64::MAX);

    let pause = u64::try_from(interval_nanos - remainder).unwrap_or(u64::MAX);
    tokio::time::sleep(Duration::from_nanos(pause)).await;
    (missed, Instant::now())
}

/// Fires every `interval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimpleSchedule {
    interval: Duration,
}

impl SimpleSchedule {
    /// Creates a schedule. A zero interval fails validation.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Returns the tick interval.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[async_trait]
impl Schedule for SimpleSchedule {
    fn validate(&self) -> Result<(), ScheduleError> {
        if self.interval.is_zero() {
            return Err(ScheduleError::InvalidInterval);
        }
        Ok(())
    }

    async fn wait(&self, last: Option<Instant>) -> ScheduleResponse {
        let (missed, last_time) = wait_on_interval(last, self.interval).await;
        ScheduleResponse::active(missed, last_time)
    }
}

/// Fires every `interval` between optional wall-clock start and stop times.
///
/// Before the start time the first wait sleeps until the window opens.
/// Once the stop time has passed every wait reports [`ScheduleState::Ended`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowedSchedule {
    interval: Duration,
    start: Option<DateTime<Utc>>,
    stop: Option<DateTime<Utc>>,
}

impl WindowedSchedule {
    /// Creates a windowed schedule. `None` leaves that side of the window open.
    #[must_use]
    pub fn new(
        interval: Duration,
        start: Option<DateTime<Utc>>,
        stop: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            interval,
            start,
            stop,
        }
    }

    fn has_ended(&self, now: DateTime<Utc>) -> bool {
        self.stop.is_some_and(|stop| now >= stop)
    }
}

#[async_trait]
impl Schedule for WindowedSchedule {
    fn validate(&self) -> Result<(), ScheduleError> {
        if self.interval.is_zero() {
            return Err(ScheduleError::InvalidInterval);
        }
        if let Some(stop) = self.stop {
            if stop < Utc::now() {
                return Err(ScheduleError::InvalidWindow {
                    reason: "stop time is in the past".to_string(),
                });
            }
            if self.start.is_some_and(|start| stop <= start) {
                return Err(ScheduleError::InvalidWindow {
                    reason: "stop time is not after start time".to_string(),
                });
            }
        }
        Ok(())
    }

    async fn wait(&self, last: Option<Instant>) -> ScheduleResponse {
        if let Some(start) = self.start {
            let now = Utc::now();
            if now < start {
                let until_start = (start - now).to_std().unwrap_or_default();
                tokio::time::sleep(until_start).await;
            }
        }

        if self.has_ended(Utc::now()) {
            return ScheduleResponse::ended(Instant::now());
        }
        let (missed, last_time) = wait_on_interval(last, self.interval).await;
        ScheduleResponse::active(missed, last_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_interval_is_rejected() {
        let schedule = SimpleSchedule::new(Duration::ZERO);
        let err = schedule.validate().unwrap_err();
        assert_eq!(err.to_string(), "Interval must be greater than 0");

        let windowed = WindowedSchedule::new(Duration::ZERO, None, None);
        assert_eq!(windowed.validate(), Err(ScheduleError::InvalidInterval));
    }

    #[tokio::test(start_paused = true)]
    async fn first_wait_sleeps_one_interval() {
        let schedule = SimpleSchedule::new(Duration::from_secs(1));
        let before = Instant::now();
        let response = schedule.wait(None).await;

        assert_eq!(response.state(), ScheduleState::Active);
        assert_eq!(response.missed_intervals(), 0);
        assert!(response.last_time() - before >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn on_time_wait_reports_no_misses() {
        let schedule = SimpleSchedule::new(Duration::from_secs(1));
        let first = schedule.wait(None).await;
        tokio::time::advance(Duration::from_millis(200)).await;

        let second = schedule.wait(Some(first.last_time())).await;
        assert_eq!(second.missed_intervals(), 0);
        let gap = second.last_time() - first.last_time();
        assert!(gap >= Duration::from_secs(1) && gap < Duration::from_millis(1_100));
    }

    #[tokio::test(start_paused = true)]
    async fn late_wait_reports_missed_intervals() {
        let schedule = SimpleSchedule::new(Duration::from_secs(1));
        let first = schedule.wait(None).await;
        tokio::time::advance(Duration::from_millis(3_500)).await;

        let second = schedule.wait(Some(first.last_time())).await;
        assert_eq!(second.missed_intervals(), 3);
        let gap = second.last_time() - first.last_time();
        assert!(gap >= Duration::from_secs(4) && gap < Duration::from_millis(4_100));
    }

    #[test]
    fn window_in_the_past_is_rejected() {
        let stop = Utc::now() - chrono::Duration::minutes(1);
        let schedule = WindowedSchedule::new(Duration::from_secs(1), None, Some(stop));
        assert!(matches!(
            schedule.validate(),
            Err(ScheduleError::InvalidWindow { .. })
        ));
    }

    #[test]
    fn window_stop_before_start_is_rejected() {
        let start = Utc::now() + chrono::Duration::hours(2);
        let stop = Utc::now() + chrono::Duration::hours(1);
        let schedule = WindowedSchedule::new(Duration::from_secs(1), Some(start), Some(stop));
        assert!(schedule.validate().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn open_window_behaves_like_simple_schedule() {
        let stop = Utc::now() + chrono::Duration::hours(1);
        let schedule = WindowedSchedule::new(Duration::from_secs(1), None, Some(stop));
        assert!(schedule.validate().is_ok());

        let response = schedule.wait(None).await;
        assert_eq!(response.state(), ScheduleState::Active);
    }

    #[tokio::test(start_paused = true)]
    async fn closed_window_reports_ended() {
        let stop = Utc::now() - chrono::Duration::seconds(1);
        let schedule = WindowedSchedule::new(Duration::from_secs(1), None, Some(stop));

        let response = schedule.wait(None).await;
        assert_eq!(response.state(), ScheduleState::Ended);
    }
}
