//! Locating templates on a screen.
//!
//! A [`Target`] names a template image and how a match is turned into a single point.
//! A [`Matcher`] produces [`MatchCandidate`]s for a target on a screen; [`match_candidates`]
//! is the only way the rest of auto-tap calls a matcher.

use thiserror::Error;

pub mod core;
pub mod matcher;
pub mod target;

pub use matcher::{
    ImageprocMatcher, Matcher, MatcherOptions, best_candidate, compare_candidates,
    match_candidates,
};
pub use target::{MatchCandidate, Target};

/// A position on the screen, in pixels.
pub type Point = (i32, i32);

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CvError {
    #[error("anchor {0:?} is outside of the unit square")]
    InvalidAnchor((f32, f32)),

    #[error("threshold {0} is outside of [0, 1]")]
    InvalidThreshold(f32),
}
