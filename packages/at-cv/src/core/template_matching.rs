//! Template matching on top of [`imageproc::template_matching`].
//!
//! Scores of every method are turned into a confidence in `[0, 1]` where higher is better,
//! so callers never need to know whether the raw score is a distance or a correlation.
use std::fmt::Display;

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::template_matching::{self, MatchTemplateMethod};

#[derive(Clone, Debug)]
pub struct Match {
    /// Top left corner of the matched region
    pub location: (u32, u32),
    pub confidence: f32,
}

#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub enum MatchMethod {
    #[default]
    SumOfSquaredErrorsNormalized,
    CrossCorrelationNormalized,
}

impl MatchMethod {
    pub const ALL: [MatchMethod; 2] = [
        MatchMethod::SumOfSquaredErrorsNormalized,
        MatchMethod::CrossCorrelationNormalized,
    ];

    /// Map a raw score of this method to a confidence, higher is a better match.
    pub fn confidence(self, score: f32) -> f32 {
        match self {
            MatchMethod::SumOfSquaredErrorsNormalized => 1.0 - score,
            MatchMethod::CrossCorrelationNormalized => score,
        }
    }
}

impl From<MatchMethod> for MatchTemplateMethod {
    fn from(value: MatchMethod) -> Self {
        match value {
            MatchMethod::SumOfSquaredErrorsNormalized => {
                MatchTemplateMethod::SumOfSquaredErrorsNormalized
            }
            MatchMethod::CrossCorrelationNormalized => {
                MatchTemplateMethod::CrossCorrelationNormalized
            }
        }
    }
}

impl Display for MatchMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MatchMethod::SumOfSquaredErrorsNormalized => "sqdiff_normed",
            MatchMethod::CrossCorrelationNormalized => "ccorr_normed",
        };
        f.write_str(s)
    }
}

/// Score every placement of `template` on `image`, rows are scored in parallel.
///
/// Returns `None` when the template does not fit in the image.
pub fn match_template(
    image: &GrayImage,
    template: &GrayImage,
    method: MatchMethod,
) -> Option<ImageBuffer<Luma<f32>, Vec<f32>>> {
    if template.width() == 0
        || template.height() == 0
        || template.width() > image.width()
        || template.height() > image.height()
    {
        return None;
    }
    Some(template_matching::match_template_parallel(
        image,
        template,
        method.into(),
    ))
}

/// Collect the local best matches whose confidence reaches `threshold`.
///
/// Placements closer than one template size to an already found match are merged into it,
/// keeping the better one. The result is sorted by confidence, best first.
pub fn find_matches(
    scores: &ImageBuffer<Luma<f32>, Vec<f32>>,
    template_width: u32,
    template_height: u32,
    method: MatchMethod,
    threshold: f32,
) -> Vec<Match> {
    let mut matches: Vec<Match> = Vec::new();

    for (x, y, p) in scores.enumerate_pixels() {
        let confidence = method.confidence(p.0[0]);
        if !confidence.is_finite() || confidence < threshold {
            continue;
        }
        if let Some(m) = matches.iter_mut().rev().find(|m| {
            m.location.0.abs_diff(x) < template_width && m.location.1.abs_diff(y) < template_height
        }) {
            if confidence > m.confidence {
                m.location = (x, y);
                m.confidence = confidence;
            }
        } else {
            matches.push(Match {
                location: (x, y),
                confidence,
            });
        }
    }

    matches.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_direction() {
        assert_eq!(MatchMethod::SumOfSquaredErrorsNormalized.confidence(0.0), 1.0);
        assert_eq!(MatchMethod::CrossCorrelationNormalized.confidence(0.25), 0.25);
    }

    #[test]
    fn test_find_matches_merges_neighbours() {
        // distances: two close minima around (2, 2) and one far away at (12, 1)
        let mut scores = ImageBuffer::from_pixel(16, 8, Luma([1.0f32]));
        scores.put_pixel(2, 2, Luma([0.1]));
        scores.put_pixel(3, 2, Luma([0.05]));
        scores.put_pixel(12, 1, Luma([0.3]));
        scores.put_pixel(5, 5, Luma([f32::NAN]));

        let matches = find_matches(&scores, 4, 4, MatchMethod::SumOfSquaredErrorsNormalized, 0.6);
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].location, (3, 2));
        assert!((matches[0].confidence - 0.95).abs() < 1e-6);
        assert_eq!(matches[1].location, (12, 1));
    }

    #[test]
    fn test_template_larger_than_image() {
        let image = GrayImage::new(4, 4);
        let template = GrayImage::new(8, 2);
        assert!(match_template(&image, &template, MatchMethod::default()).is_none());
    }
}
