//! Named timers for measuring data fetches.

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};
use tracing::debug;

/// Records how long labelled operations take.
///
/// A timer is started with [`start_timer`](Self::start_timer) and completed
/// with [`end_timer`](Self::end_timer); only completed timers are reported.
/// Restarting a label before ending it discards the earlier start.
#[derive(Debug, Default)]
pub struct PerformanceMonitor {
  started: HashMap<String, Instant>,
  metrics: BTreeMap<String, Duration>,
}

impl PerformanceMonitor {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn start_timer(&mut self, label: &str) {
    self.started.insert(label.to_string(), Instant::now());
  }

  /// Stop the timer for `label` and record its duration.
  /// Returns `None` if the timer was never started.
  pub fn end_timer(&mut self, label: &str) -> Option<Duration> {
    let started = self.started.remove(label)?;
    let elapsed = started.elapsed();

    debug!(
      label,
      elapsed_ms = elapsed.as_secs_f64() * 1000.0,
      "timer finished"
    );
    self.metrics.insert(label.to_string(), elapsed);

    Some(elapsed)
  }

  /// Last recorded duration for `label`.
  pub fn metric(&self, label: &str) -> Option<Duration> {
    self.metrics.get(label).copied()
  }

  pub fn all_metrics(&self) -> BTreeMap<String, Duration> {
    self.metrics.clone()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_end_without_start_is_none() {
    let mut monitor = PerformanceMonitor::new();
    assert_eq!(monitor.end_timer("never"), None);
    assert!(monitor.all_metrics().is_empty());
  }

  #[test]
  fn test_completed_timer_is_recorded() {
    let mut monitor = PerformanceMonitor::new();
    monitor.start_timer("fetch");
    std::thread::sleep(Duration::from_millis(5));
    let elapsed = monitor.end_timer("fetch").unwrap();

    assert!(elapsed >= Duration::from_millis(5));
    assert_eq!(monitor.metric("fetch"), Some(elapsed));
  }

  #[test]
  fn test_running_timers_are_not_reported() {
    let mut monitor = PerformanceMonitor::new();
    monitor.start_timer("done");
    monitor.end_timer("done");
    monitor.start_timer("running");

    let metrics = monitor.all_metrics();
    assert_eq!(metrics.keys().collect::<Vec<_>>(), vec!["done"]);
    assert_eq!(monitor.metric("running"), None);
  }

  #[test]
  fn test_timer_cannot_be_ended_twice() {
    let mut monitor = PerformanceMonitor::new();
    monitor.start_timer("once");
    assert!(monitor.end_timer("once").is_some());
    assert!(monitor.end_timer("once").is_none());
    assert!(monitor.metric("once").is_some());
  }
}
