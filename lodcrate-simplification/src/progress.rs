//! Progress reporting and cooperative cancellation
//!
//! Long sessions report `(phase, item, fraction)` through a [`ProgressSink`]
//! and check a [`CancellationToken`] between units of work: between chunks
//! of the batch cost pass and between collapses.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared stop request. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop at the next check point
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Clear a previous request so the token can drive another session
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::Relaxed);
    }
}

/// Receiver of progress updates
pub trait ProgressSink {
    fn progress(&mut self, phase: &str, item: &str, fraction: f32);
}

impl<F> ProgressSink for F
where
    F: FnMut(&str, &str, f32),
{
    fn progress(&mut self, phase: &str, item: &str, fraction: f32) {
        self(phase, item, fraction)
    }
}

/// Sink that discards every update
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn progress(&mut self, _phase: &str, _item: &str, _fraction: f32) {}
}

/// Forwards updates to a sink only when the labels change or the whole
/// percentage moves, so hosts are not flooded from tight loops.
pub struct ProgressReporter<'a> {
    sink: &'a mut dyn ProgressSink,
    last_phase: String,
    last_item: String,
    last_percent: Option<i32>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new(sink: &'a mut dyn ProgressSink) -> Self {
        Self {
            sink,
            last_phase: String::new(),
            last_item: String::new(),
            last_percent: None,
        }
    }

    /// Report `fraction` (clamped to [0, 1]). Returns whether the update
    /// was forwarded.
    pub fn report(&mut self, phase: &str, item: &str, fraction: f32) -> bool {
        let fraction = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
        let percent = (fraction * 100.0).round() as i32;

        if self.last_percent == Some(percent) && self.last_phase == phase && self.last_item == item
        {
            return false;
        }

        self.last_percent = Some(percent);
        if self.last_phase != phase {
            self.last_phase = phase.to_string();
        }
        if self.last_item != item {
            self.last_item = item.to_string();
        }
        self.sink.progress(phase, item, fraction);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_is_shared_between_clones() {
        let token = CancellationToken::new();
        let other = token.clone();
        assert!(!token.is_cancelled());
        other.cancel();
        assert!(token.is_cancelled());
        token.reset();
        assert!(!other.is_cancelled());
    }

    #[test]
    fn test_closure_is_a_sink() {
        let mut seen = Vec::new();
        {
            let mut sink = |phase: &str, item: &str, t: f32| {
                seen.push((phase.to_string(), item.to_string(), t))
            };
            sink.progress("phase", "item", 0.5);
        }
        assert_eq!(seen, vec![("phase".to_string(), "item".to_string(), 0.5)]);
    }

    #[test]
    fn test_reporter_throttles_by_percent() {
        let mut seen = Vec::new();
        let mut sink = |_: &str, _: &str, t: f32| seen.push(t);
        let mut reporter = ProgressReporter::new(&mut sink);

        assert!(reporter.report("a", "mesh", 0.0));
        assert!(!reporter.report("a", "mesh", 0.001));
        assert!(reporter.report("a", "mesh", 0.02));
        // A new phase is always forwarded
        assert!(reporter.report("b", "mesh", 0.02));
        assert!(reporter.report("b", "mesh", 2.0));
        drop(reporter);

        assert_eq!(seen, vec![0.0, 0.02, 0.02, 1.0]);
    }

    #[test]
    fn test_reporter_sanitizes_nan() {
        let mut last = -1.0;
        let mut sink = |_: &str, _: &str, t: f32| last = t;
        let mut reporter = ProgressReporter::new(&mut sink);
        reporter.report("a", "b", f32::NAN);
        drop(reporter);
        assert_eq!(last, 0.0);
    }
}
