//! Latency, wall-clock and response-time collaborators
//!
//! Simulated latency goes through [`Delay`] and timestamps through [`Clock`]
//! so tests can run the turn controller on tokio's paused clock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

const TIMER_HISTORY_LIMIT: usize = 100;

/// Inclusive range of simulated latency in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencyWindow {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl LatencyWindow {
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    /// Extra "deep reasoning" wait before the backend is called.
    pub const fn thinking() -> Self {
        Self::new(2_000, 5_000)
    }

    /// Simulated backend round trip.
    pub const fn response() -> Self {
        Self::new(1_000, 3_000)
    }

    pub fn min(&self) -> Duration {
        Duration::from_millis(self.min_ms.min(self.max_ms))
    }

    pub fn max(&self) -> Duration {
        Duration::from_millis(self.max_ms.max(self.min_ms))
    }
}

#[async_trait]
pub trait Delay: Send + Sync {
    /// Suspend for some duration inside `window`.
    async fn pause(&self, window: LatencyWindow);
}

/// Uniformly random wait inside the window.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomDelay;

#[async_trait]
impl Delay for RandomDelay {
    async fn pause(&self, window: LatencyWindow) {
        let (lo, hi) = (window.min().as_millis() as u64, window.max().as_millis() as u64);
        let ms = rand::thread_rng().gen_range(lo..=hi);
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

/// Always waits the same amount, ignoring the window.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay(pub Duration);

#[async_trait]
impl Delay for FixedDelay {
    async fn pause(&self, _window: LatencyWindow) {
        tokio::time::sleep(self.0).await;
    }
}

/// Returns immediately.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDelay;

#[async_trait]
impl Delay for NoDelay {
    async fn pause(&self, _window: LatencyWindow) {}
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerRecord {
    pub id: String,
    pub operation: String,
    pub duration: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResponseDistribution {
    /// Under one second.
    pub fast: usize,
    /// One to three seconds.
    pub medium: usize,
    /// Three seconds or more.
    pub slow: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PerformanceStats {
    pub total_requests: usize,
    pub average: Duration,
    pub fastest: Duration,
    pub slowest: Duration,
    pub distribution: ResponseDistribution,
}

/// Named stopwatches plus a bounded history of finished timings.
#[derive(Debug, Default)]
pub struct ResponseTimer {
    active: HashMap<String, (Instant, String)>,
    history: VecDeque<TimerRecord>,
}

impl ResponseTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, id: &str, operation: &str) {
        tracing::debug!(id, operation, "timer started");
        self.active
            .insert(id.to_string(), (Instant::now(), operation.to_string()));
    }

    /// Stop a running timer and record it. Unknown ids yield `None`.
    pub fn stop(&mut self, id: &str) -> Option<Duration> {
        let Some((started, operation)) = self.active.remove(id) else {
            tracing::warn!(id, "timer not found");
            return None;
        };
        let duration = started.elapsed();
        self.record(id, &operation, duration);
        Some(duration)
    }

    /// Drop a running timer without recording it.
    pub fn discard(&mut self, id: &str) {
        self.active.remove(id);
    }

    pub fn record(&mut self, id: &str, operation: &str, duration: Duration) {
        tracing::debug!(id, operation, ms = duration.as_millis() as u64, "timer recorded");
        self.history.push_back(TimerRecord {
            id: id.to_string(),
            operation: operation.to_string(),
            duration,
        });
        while self.history.len() > TIMER_HISTORY_LIMIT {
            self.history.pop_front();
        }
    }

    pub fn history(&self, operation: Option<&str>) -> Vec<TimerRecord> {
        self.history
            .iter()
            .filter(|r| operation.map_or(true, |op| r.operation == op))
            .cloned()
            .collect()
    }

    pub fn average(&self, operation: Option<&str>) -> Duration {
        let records = self.history(operation);
        if records.is_empty() {
            return Duration::ZERO;
        }
        let total: Duration = records.iter().map(|r| r.duration).sum();
        total / records.len() as u32
    }

    pub fn stats(&self) -> PerformanceStats {
        if self.history.is_empty() {
            return PerformanceStats::default();
        }
        let mut distribution = ResponseDistribution::default();
        for record in &self.history {
            if record.duration < Duration::from_secs(1) {
                distribution.fast += 1;
            } else if record.duration < Duration::from_secs(3) {
                distribution.medium += 1;
            } else {
                distribution.slow += 1;
            }
        }
        let durations = self.history.iter().map(|r| r.duration);
        PerformanceStats {
            total_requests: self.history.len(),
            average: self.average(None),
            fastest: durations.clone().min().unwrap_or_default(),
            slowest: durations.max().unwrap_or_default(),
            distribution,
        }
    }
}

/// `850ms`, `2.4s`, `1m 5.0s`
pub fn format_duration(duration: Duration) -> String {
    let ms = duration.as_millis();
    if ms < 1_000 {
        format!("{}ms", ms)
    } else if ms < 60_000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        let minutes = ms / 60_000;
        let seconds = (ms % 60_000) as f64 / 1000.0;
        format!("{}m {:.1}s", minutes, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(850)), "850ms");
        assert_eq!(format_duration(Duration::from_millis(2_400)), "2.4s");
        assert_eq!(format_duration(Duration::from_millis(65_000)), "1m 5.0s");
    }

    #[test]
    fn test_stats_distribution() {
        let mut timer = ResponseTimer::new();
        timer.record("a", "turn", Duration::from_millis(500));
        timer.record("b", "turn", Duration::from_millis(1_500));
        timer.record("c", "search", Duration::from_millis(4_000));

        let stats = timer.stats();
        assert_eq!(stats.total_requests, 3);
        assert_eq!(stats.fastest, Duration::from_millis(500));
        assert_eq!(stats.slowest, Duration::from_millis(4_000));
        assert_eq!(stats.average, Duration::from_millis(2_000));
        assert_eq!(
            stats.distribution,
            ResponseDistribution { fast: 1, medium: 1, slow: 1 }
        );
        assert_eq!(timer.average(Some("turn")), Duration::from_millis(1_000));
        assert_eq!(timer.history(Some("search")).len(), 1);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut timer = ResponseTimer::new();
        for i in 0..150 {
            timer.record(&i.to_string(), "turn", Duration::from_millis(i));
        }
        let history = timer.history(None);
        assert_eq!(history.len(), TIMER_HISTORY_LIMIT);
        assert_eq!(history[0].id, "50");
    }

    #[test]
    fn test_stop_unknown_timer() {
        let mut timer = ResponseTimer::new();
        assert_eq!(timer.stop("missing"), None);
        assert_eq!(timer.stats(), PerformanceStats::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_stop_measures_elapsed() {
        let mut timer = ResponseTimer::new();
        timer.start("t1", "turn");
        tokio::time::sleep(Duration::from_millis(1_200)).await;
        let elapsed = timer.stop("t1").unwrap();
        assert!(elapsed >= Duration::from_millis(1_200));
        assert_eq!(timer.stop("t1"), None);
        assert_eq!(timer.stats().total_requests, 1);
    }

    #[test]
    fn test_discarded_timer_is_not_recorded() {
        let mut timer = ResponseTimer::new();
        timer.start("t1", "turn");
        timer.discard("t1");
        assert_eq!(timer.stop("t1"), None);
        assert!(timer.history(None).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_random_delay_stays_in_window() {
        let window = LatencyWindow::new(1_000, 3_000);
        let start = Instant::now();
        RandomDelay.pause(window).await;
        let waited = start.elapsed();
        assert!(waited >= window.min());
        assert!(waited <= window.max() + Duration::from_millis(5));
    }

    #[test]
    fn test_manual_clock_moves_only_when_set() {
        let start = Utc::now();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now(), start);
        let later = start + chrono::Duration::hours(2);
        clock.set(later);
        assert_eq!(clock.now(), later);
    }
}
