//! Matchers and the adapter the rest of auto-tap uses to call them.
//!
//! [`Matcher`]: anything that can find every occurrence of a [`Target`] on a screen.
//! [`match_candidates`]: calls a matcher and normalizes its answer.
//! [`ImageprocMatcher`]: a matcher based on [`imageproc`]'s template matching.

use std::{
    cmp::Ordering,
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Mutex,
};

use anyhow::Context;
use image::{DynamicImage, GrayImage};
use tracing::{trace, warn};

use crate::{
    MatchCandidate, Target,
    core::template_matching::{MatchMethod, find_matches, match_template},
};

/// Finds every occurrence of a template on a screen.
pub trait Matcher {
    fn match_all(
        &self,
        target: &Target,
        screen: &DynamicImage,
    ) -> anyhow::Result<Vec<MatchCandidate>>;
}

impl<M: Matcher + ?Sized> Matcher for &M {
    fn match_all(
        &self,
        target: &Target,
        screen: &DynamicImage,
    ) -> anyhow::Result<Vec<MatchCandidate>> {
        (**self).match_all(target, screen)
    }
}

impl<M: Matcher + ?Sized> Matcher for Box<M> {
    fn match_all(
        &self,
        target: &Target,
        screen: &DynamicImage,
    ) -> anyhow::Result<Vec<MatchCandidate>> {
        (**self).match_all(target, screen)
    }
}

/// Run `matcher` for `target` on `screen`.
///
/// An empty list is the only "no match" signal: matcher errors are logged and yield no
/// candidates, and candidates with a non-finite confidence or one below the target's own
/// threshold are dropped. Confidences are clamped to `[0, 1]`.
pub fn match_candidates(
    matcher: &dyn Matcher,
    target: &Target,
    screen: &DynamicImage,
) -> Vec<MatchCandidate> {
    match matcher.match_all(target, screen) {
        Ok(candidates) => candidates
            .into_iter()
            .filter(|c| c.confidence.is_finite() && c.confidence >= target.threshold())
            .map(|c| MatchCandidate {
                confidence: c.confidence.clamp(0.0, 1.0),
                ..c
            })
            .collect(),
        Err(err) => {
            warn!("[Matcher]: matching {} failed: {err:#}", target.id());
            Vec::new()
        }
    }
}

/// Order candidates so that the better one is greater.
///
/// Higher confidence wins; on equal confidence the topmost, then the leftmost candidate wins.
pub fn compare_candidates(a: &MatchCandidate, b: &MatchCandidate) -> Ordering {
    a.confidence
        .total_cmp(&b.confidence)
        .then_with(|| b.position.1.cmp(&a.position.1))
        .then_with(|| b.position.0.cmp(&a.position.0))
}

/// The best candidate according to [`compare_candidates`], the earliest one on a full tie.
pub fn best_candidate<'a, I>(candidates: I) -> Option<&'a MatchCandidate>
where
    I: IntoIterator<Item = &'a MatchCandidate>,
{
    candidates.into_iter().reduce(|best, c| {
        if compare_candidates(c, best) == Ordering::Greater {
            c
        } else {
            best
        }
    })
}

pub struct MatcherOptions {
    pub method: MatchMethod,
    /// At most this many candidates are returned per screen
    pub max_results: usize,
}

impl Default for MatcherOptions {
    fn default() -> Self {
        Self {
            method: MatchMethod::SumOfSquaredErrorsNormalized,
            max_results: 16,
        }
    }
}

impl MatcherOptions {
    pub fn with_method(mut self, method: MatchMethod) -> Self {
        self.method = method;
        self
    }
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }
}

/// Grayscale template matching through [`imageproc`], templates are loaded once per path.
#[derive(Default)]
pub struct ImageprocMatcher {
    options: MatcherOptions,
    templates: Mutex<HashMap<PathBuf, GrayImage>>,
}

impl ImageprocMatcher {
    pub fn new(options: MatcherOptions) -> Self {
        Self {
            options,
            templates: Mutex::new(HashMap::new()),
        }
    }

    fn template(&self, path: &Path) -> anyhow::Result<GrayImage> {
        let mut templates = self
            .templates
            .lock()
            .map_err(|_| anyhow::anyhow!("template cache poisoned"))?;
        if let Some(template) = templates.get(path) {
            return Ok(template.clone());
        }
        let template = image::open(path)
            .with_context(|| format!("failed to load template {}", path.display()))?
            .to_luma8();
        templates.insert(path.to_path_buf(), template.clone());
        Ok(template)
    }
}

impl Matcher for ImageprocMatcher {
    fn match_all(
        &self,
        target: &Target,
        screen: &DynamicImage,
    ) -> anyhow::Result<Vec<MatchCandidate>> {
        let template = self.template(target.path())?;
        let screen = screen.to_luma8();

        let Some(scores) = match_template(&screen, &template, self.options.method) else {
            trace!(
                "[ImageprocMatcher]: template {} does not fit in {}x{}",
                target.id(),
                screen.width(),
                screen.height()
            );
            return Ok(Vec::new());
        };

        let size = (template.width(), template.height());
        Ok(find_matches(
            &scores,
            size.0,
            size.1,
            self.options.method,
            target.threshold(),
        )
        .into_iter()
        .take(self.options.max_results)
        .map(|m| MatchCandidate::from_rect(m.location, size, target.anchor(), m.confidence))
        .collect())
    }
}

#[cfg(test)]
mod tests {
    use image::{Luma, imageops};

    use super::*;

    struct FixedMatcher(anyhow::Result<Vec<MatchCandidate>>);

    impl Matcher for FixedMatcher {
        fn match_all(&self, _: &Target, _: &DynamicImage) -> anyhow::Result<Vec<MatchCandidate>> {
            match &self.0 {
                Ok(candidates) => Ok(candidates.clone()),
                Err(err) => Err(anyhow::anyhow!("{err}")),
            }
        }
    }

    fn candidate(position: (i32, i32), confidence: f32) -> MatchCandidate {
        MatchCandidate {
            position,
            bounding_box: [position; 4],
            confidence,
        }
    }

    fn noise(width: u32, height: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            let mut h = x.wrapping_mul(73856093) ^ y.wrapping_mul(19349663);
            h ^= h >> 13;
            h = h.wrapping_mul(0x5bd1e995);
            h ^= h >> 15;
            Luma([(h & 0xff) as u8])
        })
    }

    #[test]
    fn test_match_candidates_normalizes() {
        let screen = DynamicImage::new_luma8(4, 4);
        let target = Target::new("t.png");

        let matcher = FixedMatcher(Ok(vec![
            candidate((1, 1), 0.5),
            candidate((2, 2), f32::NAN),
            candidate((3, 3), 1.2),
            candidate((4, 4), 0.6),
        ]));
        let candidates = match_candidates(&matcher, &target, &screen);
        assert_eq!(candidates, vec![candidate((3, 3), 1.0), candidate((4, 4), 0.6)]);

        let failing = FixedMatcher(Err(anyhow::anyhow!("broken")));
        assert!(match_candidates(&failing, &target, &screen).is_empty());
    }

    #[test]
    fn test_best_candidate_ignores_order() {
        let pool = vec![
            candidate((50, 80), 0.91),
            candidate((10, 90), 0.97),
            candidate((90, 20), 0.97),
            candidate((30, 20), 0.97),
            candidate((5, 5), 0.42),
        ];
        let best = *best_candidate(&pool).unwrap();
        assert_eq!(best, candidate((30, 20), 0.97));

        let mut reversed = pool.clone();
        reversed.reverse();
        assert_eq!(*best_candidate(&reversed).unwrap(), best);
        for c in &pool {
            assert!(best.confidence >= c.confidence);
        }

        assert!(best_candidate(&Vec::new()).is_none());
    }

    #[test]
    fn test_imageproc_matcher() {
        let dir = tempfile::tempdir().unwrap();
        let screen = noise(120, 80);
        let template = imageops::crop_imm(&screen, 40, 30, 16, 12).to_image();
        let template_path = dir.path().join("button.png");
        template.save(&template_path).unwrap();

        let matcher = ImageprocMatcher::default();
        let target = Target::new(&template_path);
        let candidates = matcher
            .match_all(&target, &DynamicImage::ImageLuma8(screen))
            .unwrap();

        let best = candidates[0];
        assert_eq!(best.position, (48, 36));
        assert_eq!(best.bounding_box[0], (40, 30));
        assert!(best.confidence > 0.99);
        assert!(candidates.len() <= MatcherOptions::default().max_results);
    }

    #[test]
    fn test_imageproc_matcher_missing_template() {
        let matcher = ImageprocMatcher::default();
        let target = Target::new("/nonexistent/template.png");
        let screen = DynamicImage::new_luma8(8, 8);
        assert!(matcher.match_all(&target, &screen).is_err());
        assert!(match_candidates(&matcher, &target, &screen).is_empty());
    }
}
