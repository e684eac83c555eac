use std::path::{Path, PathBuf};

use crate::{CvError, Point};

/// A template image plus the parameters used to match it.
///
/// `anchor` is a point in the unit square of the template, used to turn a matched region into
/// a single position, `(0.5, 0.5)` being the center. `threshold` is the minimum confidence the
/// matcher itself accepts.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    path: PathBuf,
    anchor: (f32, f32),
    threshold: f32,
}

impl Target {
    pub const DEFAULT_ANCHOR: (f32, f32) = (0.5, 0.5);
    pub const DEFAULT_THRESHOLD: f32 = 0.6;

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            anchor: Self::DEFAULT_ANCHOR,
            threshold: Self::DEFAULT_THRESHOLD,
        }
    }

    pub fn with_anchor(mut self, x: f32, y: f32) -> Result<Self, CvError> {
        if !((0.0..=1.0).contains(&x) && (0.0..=1.0).contains(&y)) {
            return Err(CvError::InvalidAnchor((x, y)));
        }
        self.anchor = (x, y);
        Ok(self)
    }

    pub fn with_threshold(mut self, threshold: f32) -> Result<Self, CvError> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(CvError::InvalidThreshold(threshold));
        }
        self.threshold = threshold;
        Ok(self)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The template file name without extension, used in logs and backup file names.
    pub fn id(&self) -> String {
        self.path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.to_string_lossy().into_owned())
    }

    pub fn anchor(&self) -> (f32, f32) {
        self.anchor
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }
}

/// One place on the screen where a template matched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchCandidate {
    pub position: Point,
    /// left-top, left-bottom, right-bottom, right-top
    pub bounding_box: [Point; 4],
    pub confidence: f32,
}

impl MatchCandidate {
    /// Build a candidate from the matched rectangle, placing `position` at `anchor`.
    pub fn from_rect(
        (x, y): (u32, u32),
        (width, height): (u32, u32),
        anchor: (f32, f32),
        confidence: f32,
    ) -> Self {
        let (x, y, w, h) = (x as i32, y as i32, width as i32, height as i32);
        let position = (
            x + (anchor.0 * width as f32).round() as i32,
            y + (anchor.1 * height as f32).round() as i32,
        );
        Self {
            position,
            bounding_box: [(x, y), (x, y + h), (x + w, y + h), (x + w, y)],
            confidence,
        }
    }
}
