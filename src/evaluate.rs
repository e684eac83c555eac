//! Deciding whether a target is on screen.
//!
//! Every round pools the candidates of all its captures and keeps the best one. The first round
//! whose best candidate is strictly more confident than the accuracy threshold confirms the
//! target and ends the evaluation; otherwise the best candidate of all rounds is reported as
//! rejected, or no candidate at all.

use std::{cmp::Ordering, time::Duration};

use at_cv::{
    MatchCandidate, Matcher, Target, best_candidate, compare_candidates, match_candidates,
};
use tracing::{debug, trace};

use crate::{capture::Capture, error::Result, layout::RootKey};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EvaluationOutcome {
    /// The best candidate was more confident than required
    Confirmed(MatchCandidate),
    /// The best candidate seen, not confident enough
    Rejected(MatchCandidate),
    NoCandidate,
}

impl EvaluationOutcome {
    pub fn classify(best: Option<MatchCandidate>, accuracy: f32) -> Self {
        match best {
            Some(candidate) if candidate.confidence > accuracy => Self::Confirmed(candidate),
            Some(candidate) => Self::Rejected(candidate),
            None => Self::NoCandidate,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed(_))
    }

    /// The confirmed candidate only.
    pub fn confirmed(&self) -> Option<&MatchCandidate> {
        match self {
            Self::Confirmed(candidate) => Some(candidate),
            _ => None,
        }
    }

    /// The best candidate seen, confirmed or not.
    pub fn candidate(&self) -> Option<&MatchCandidate> {
        match self {
            Self::Confirmed(candidate) | Self::Rejected(candidate) => Some(candidate),
            Self::NoCandidate => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Evaluation {
    pub outcome: EvaluationOutcome,
    /// The capture the reported candidate was found on, the last capture without a candidate
    pub capture: Option<Capture>,
    /// Rounds actually run
    pub rounds: usize,
}

/// The best candidate over all `captures`, with the index of the capture it was found on.
pub fn best_in_round(
    matcher: &dyn Matcher,
    target: &Target,
    captures: &[Capture],
) -> Option<(MatchCandidate, usize)> {
    let bests = captures
        .iter()
        .enumerate()
        .filter_map(|(idx, capture)| {
            let candidates = match_candidates(matcher, target, &capture.image);
            best_candidate(&candidates).map(|best| (*best, idx))
        })
        .collect::<Vec<_>>();
    let best = best_candidate(bests.iter().map(|(candidate, _)| candidate))?;
    bests.iter().find(|(candidate, _)| candidate == best).copied()
}

/// Evaluate `target` for up to `attempts` rounds, at least one.
///
/// `captures` is called with the round index and returns the captures of that round, its
/// errors are propagated.
pub fn evaluate<F>(
    matcher: &dyn Matcher,
    target: &Target,
    mut captures: F,
    accuracy: f32,
    attempts: usize,
) -> Result<Evaluation>
where
    F: FnMut(usize) -> Result<Vec<Capture>>,
{
    let mut best: Option<(MatchCandidate, Capture)> = None;
    let mut last_capture = None;

    for round in 0..attempts.max(1) {
        let round_captures = captures(round)?;
        let Some((candidate, idx)) = best_in_round(matcher, target, &round_captures) else {
            trace!("[Evaluate]: {} round {round}: no candidate", target.id());
            last_capture = round_captures.into_iter().last();
            continue;
        };
        trace!(
            "[Evaluate]: {} round {round}: best {:.4} at {:?}",
            target.id(),
            candidate.confidence,
            candidate.position
        );
        let capture = round_captures.into_iter().nth(idx);

        let outcome = EvaluationOutcome::classify(Some(candidate), accuracy);
        if outcome.is_confirmed() {
            debug!(
                "[Evaluate]: {} confirmed in round {round} with {:.4}",
                target.id(),
                candidate.confidence
            );
            return Ok(Evaluation {
                outcome,
                capture,
                rounds: round + 1,
            });
        }
        if best
            .as_ref()
            .is_none_or(|(b, _)| compare_candidates(&candidate, b) == Ordering::Greater)
        {
            if let Some(capture) = capture {
                best = Some((candidate, capture));
            }
        }
    }

    let rounds = attempts.max(1);
    Ok(match best {
        Some((candidate, capture)) => Evaluation {
            outcome: EvaluationOutcome::Rejected(candidate),
            capture: Some(capture),
            rounds,
        },
        None => Evaluation {
            outcome: EvaluationOutcome::NoCandidate,
            capture: last_capture,
            rounds,
        },
    })
}

/// Options of [`crate::AutoTap::check_image`].
#[derive(Debug, Clone)]
pub struct CheckOptions {
    /// Evaluation rounds at most
    pub attempts: usize,
    /// Sleep before capturing
    pub screenshot_wait: Duration,
    /// Confidence the best candidate has to exceed
    pub accuracy: f32,
    /// Take new screenshots instead of reading the last one back
    pub refresh: bool,
    /// Screenshots per round, named `tmp0` .. `tmpN` when more than one
    pub captures_per_round: usize,
    pub screen_name: String,
    pub screen_root: RootKey,
    pub screen_subdir: String,
    pub template_root: RootKey,
    pub template_subdir: String,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            attempts: 1,
            screenshot_wait: Duration::from_millis(100),
            accuracy: 0.9,
            refresh: true,
            captures_per_round: 1,
            screen_name: "tmp0".to_string(),
            screen_root: RootKey::Tmp,
            screen_subdir: String::new(),
            template_root: RootKey::Icon,
            template_subdir: String::new(),
        }
    }
}

impl CheckOptions {
    pub fn with_attempts(mut self, attempts: usize) -> Self {
        self.attempts = attempts;
        self
    }
    pub fn with_screenshot_wait(mut self, wait: Duration) -> Self {
        self.screenshot_wait = wait;
        self
    }
    pub fn with_accuracy(mut self, accuracy: f32) -> Self {
        self.accuracy = accuracy;
        self
    }
    pub fn with_refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }
    pub fn with_captures_per_round(mut self, captures: usize) -> Self {
        self.captures_per_round = captures;
        self
    }
    pub fn with_screen(mut self, root: RootKey, subdir: &str, name: &str) -> Self {
        self.screen_root = root;
        self.screen_subdir = subdir.to_string();
        self.screen_name = name.to_string();
        self
    }
    pub fn with_template_dir(mut self, root: RootKey, subdir: &str) -> Self {
        self.template_root = root;
        self.template_subdir = subdir.to_string();
        self
    }
}

#[cfg(test)]
mod tests {
    use image::DynamicImage;

    use crate::{
        error::Error,
        tests::{ScriptedMatcher, candidate},
    };

    use super::*;

    fn screens(n: usize) -> Vec<Capture> {
        (0..n)
            .map(|_| Capture::new(DynamicImage::new_luma8(4, 4)))
            .collect()
    }

    #[test]
    fn test_classify_is_strict() {
        let c = candidate((1, 1), 0.9);
        assert_eq!(
            EvaluationOutcome::classify(Some(c), 0.9),
            EvaluationOutcome::Rejected(c)
        );
        assert_eq!(
            EvaluationOutcome::classify(Some(c), 0.89),
            EvaluationOutcome::Confirmed(c)
        );
        assert_eq!(
            EvaluationOutcome::classify(None, 0.0),
            EvaluationOutcome::NoCandidate
        );
        assert!(EvaluationOutcome::NoCandidate.candidate().is_none());
        assert!(EvaluationOutcome::Rejected(c).confirmed().is_none());
    }

    #[test]
    fn test_confirmed_in_second_round() {
        let matcher = ScriptedMatcher::new(vec![
            vec![candidate((10, 10), 0.5)],
            vec![candidate((20, 30), 0.95)],
            vec![candidate((99, 99), 0.99)],
        ]);
        let target = Target::new("start.png");

        let evaluation = evaluate(&matcher, &target, |_| Ok(screens(1)), 0.9, 3).unwrap();
        assert_eq!(
            evaluation.outcome,
            EvaluationOutcome::Confirmed(candidate((20, 30), 0.95))
        );
        assert_eq!(evaluation.rounds, 2);
        assert!(evaluation.capture.is_some());
        // the third round never ran
        assert_eq!(matcher.calls(), 2);
    }

    #[test]
    fn test_equal_to_accuracy_is_rejected() {
        let matcher = ScriptedMatcher::new(vec![
            vec![candidate((10, 20), 0.9)],
            vec![candidate((10, 20), 0.9)],
        ]);
        let target = Target::new("start.png");

        let evaluation = evaluate(&matcher, &target, |_| Ok(screens(1)), 0.9, 2).unwrap();
        assert_eq!(
            evaluation.outcome,
            EvaluationOutcome::Rejected(candidate((10, 20), 0.9))
        );
        assert_eq!(evaluation.rounds, 2);
        assert_eq!(matcher.calls(), 2);
    }

    #[test]
    fn test_rejected_keeps_best_of_all_rounds() {
        let matcher = ScriptedMatcher::new(vec![
            vec![candidate((1, 1), 0.7)],
            vec![candidate((2, 2), 0.85), candidate((3, 3), 0.65)],
            vec![],
        ]);
        let target = Target::new("start.png");

        let evaluation = evaluate(&matcher, &target, |_| Ok(screens(1)), 0.9, 3).unwrap();
        assert_eq!(
            evaluation.outcome,
            EvaluationOutcome::Rejected(candidate((2, 2), 0.85))
        );
        assert_eq!(evaluation.rounds, 3);
    }

    #[test]
    fn test_no_candidate() {
        let matcher = ScriptedMatcher::new(Vec::new());
        let target = Target::new("start.png");

        let mut rounds = Vec::new();
        let evaluation = evaluate(
            &matcher,
            &target,
            |round| {
                rounds.push(round);
                Ok(screens(1))
            },
            0.9,
            0,
        )
        .unwrap();
        assert_eq!(evaluation.outcome, EvaluationOutcome::NoCandidate);
        assert!(evaluation.capture.is_some());
        // zero attempts still run one round
        assert_eq!(rounds, vec![0]);
    }

    #[test]
    fn test_pools_captures_of_a_round() {
        let matcher = ScriptedMatcher::new(vec![
            vec![candidate((5, 5), 0.8)],
            vec![candidate((6, 6), 0.93)],
            vec![candidate((7, 7), 0.91)],
        ]);
        let target = Target::new("start.png");

        let captures = screens(3);
        let (best, idx) = best_in_round(&matcher, &target, &captures).unwrap();
        assert_eq!(best, candidate((6, 6), 0.93));
        assert_eq!(idx, 1);
    }

    #[test]
    fn test_selection_ignores_order() {
        let pool = vec![
            candidate((40, 10), 0.92),
            candidate((10, 50), 0.92),
            candidate((30, 10), 0.92),
            candidate((0, 0), 0.7),
        ];
        let target = Target::new("start.png");
        let captures = screens(1);

        let forward = ScriptedMatcher::new(vec![pool.clone()]);
        let mut reversed_pool = pool.clone();
        reversed_pool.reverse();
        let reversed = ScriptedMatcher::new(vec![reversed_pool]);

        let (a, _) = best_in_round(&forward, &target, &captures).unwrap();
        let (b, _) = best_in_round(&reversed, &target, &captures).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.position, (30, 10));
        assert!(pool.iter().all(|c| a.confidence >= c.confidence));
    }

    #[test]
    fn test_capture_error_propagates() {
        let matcher = ScriptedMatcher::new(Vec::new());
        let target = Target::new("start.png");
        let res = evaluate(
            &matcher,
            &target,
            |_| Err(Error::Device(anyhow::anyhow!("offline"))),
            0.9,
            2,
        );
        assert!(matches!(res, Err(Error::Device(_))));
    }
}
