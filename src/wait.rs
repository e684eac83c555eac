//! Polling the screen until a target shows up.

use std::time::{Duration, Instant};

use at_cv::{MatchCandidate, Matcher, Target};
use tracing::{debug, trace};

use crate::{
    capture::CaptureSource,
    error::{Error, Result},
    evaluate::{EvaluationOutcome, evaluate},
};

#[derive(Debug, Clone, PartialEq)]
pub struct WaitOptions {
    pub timeout: Duration,
    /// Sleep between two attempts
    pub interval: Duration,
    /// Confidence to exceed, the target's own threshold when missing
    pub accuracy: Option<f32>,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            interval: Duration::from_millis(500),
            accuracy: None,
        }
    }
}

impl WaitOptions {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Default::default()
        }
    }
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
    pub fn with_accuracy(mut self, accuracy: f32) -> Self {
        self.accuracy = Some(accuracy);
        self
    }
}

/// Capture and evaluate `target` until it is confirmed or `options.timeout` elapsed.
///
/// `on_miss` is called after every failed attempt. A new attempt only starts before the
/// timeout elapsed, so a zero timeout makes exactly one attempt.
pub fn loop_find(
    source: &CaptureSource,
    matcher: &dyn Matcher,
    target: &Target,
    options: &WaitOptions,
    mut on_miss: Option<&mut dyn FnMut()>,
) -> Result<MatchCandidate> {
    let accuracy = options.accuracy.unwrap_or(target.threshold());
    let start = Instant::now();
    let mut attempts = 0usize;

    loop {
        attempts += 1;
        let evaluation = evaluate(
            matcher,
            target,
            |_| Ok(vec![source.fresh(None)?]),
            accuracy,
            1,
        )?;
        if let EvaluationOutcome::Confirmed(candidate) = evaluation.outcome {
            debug!(
                "[Wait]: found {} at {:?} after {attempts} attempt(s)",
                target.id(),
                candidate.position
            );
            return Ok(candidate);
        }

        if let Some(on_miss) = on_miss.as_deref_mut() {
            on_miss();
        }
        let Some(remaining) = options
            .timeout
            .checked_sub(start.elapsed())
            .filter(|remaining| !remaining.is_zero())
        else {
            debug!("[Wait]: {} not found after {attempts} attempt(s)", target.id());
            return Err(Error::TargetNotFound {
                target: target.id(),
                timeout: options.timeout,
            });
        };
        trace!("[Wait]: {} not found yet, retrying", target.id());
        // never sleep past the deadline, the last attempt starts no later than it
        std::thread::sleep(options.interval.min(remaining));
    }
}
