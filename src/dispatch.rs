//! Turning a confirmed match into touches and swipes.

use std::time::Duration;

use at_controller::{Device, Point};
use tracing::{debug, trace};

use crate::{
    error::{Error, Result},
    evaluate::EvaluationOutcome,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ActionKind {
    /// Touch the offset position
    Tap,
    /// Swipe from the match to the offset position
    Swipe,
    /// Long press on the match, a swipe without displacement
    Press,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActionOptions {
    pub offset: Point,
    pub repetitions: u32,
    /// Sleep between two repetitions
    pub interval: Duration,
    /// Duration of a swipe or a press
    pub swipe_duration: Duration,
}

impl Default for ActionOptions {
    fn default() -> Self {
        Self {
            offset: (0, 0),
            repetitions: 1,
            interval: Duration::from_millis(100),
            swipe_duration: Duration::from_millis(300),
        }
    }
}

impl ActionOptions {
    pub fn with_offset(mut self, x: i32, y: i32) -> Self {
        self.offset = (x, y);
        self
    }
    pub fn with_repetitions(mut self, repetitions: u32) -> Self {
        self.repetitions = repetitions;
        self
    }
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
    pub fn with_swipe_duration(mut self, duration: Duration) -> Self {
        self.swipe_duration = duration;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionResult {
    pub final_position: Point,
    /// Whether the target was confirmed and the action issued
    pub applied: bool,
}

pub fn offset_position(position: Point, offset: Point) -> Point {
    (
        position.0.saturating_add(offset.0),
        position.1.saturating_add(offset.1),
    )
}

/// Act on `outcome`, only a confirmed outcome touches the device.
pub fn act(
    device: &dyn Device,
    kind: ActionKind,
    outcome: &EvaluationOutcome,
    options: &ActionOptions,
) -> Result<ActionResult> {
    let Some(candidate) = outcome.confirmed() else {
        let final_position = outcome.candidate().map_or((0, 0), |c| c.position);
        trace!("[Dispatch]: {kind:?} skipped, target not confirmed");
        return Ok(ActionResult {
            final_position,
            applied: false,
        });
    };

    let final_position = offset_position(candidate.position, options.offset);
    debug!(
        "[Dispatch]: {kind:?} x{} at {:?} -> {final_position:?}",
        options.repetitions, candidate.position
    );
    for i in 0..options.repetitions {
        if i > 0 {
            std::thread::sleep(options.interval);
        }
        let res = match kind {
            ActionKind::Tap => device.touch(final_position),
            ActionKind::Swipe => {
                device.swipe(candidate.position, final_position, options.swipe_duration)
            }
            ActionKind::Press => {
                device.swipe(candidate.position, candidate.position, options.swipe_duration)
            }
        };
        res.map_err(Error::Device)?;
    }

    Ok(ActionResult {
        final_position,
        applied: true,
    })
}
