use anyhow::{Context, Result};
use log::info;
use rand::seq::SliceRandom;
use rand::Rng;
use std::path::Path;
use std::sync::Arc;

use crate::analyzer::WidthState;
use crate::types::{ClipPcm, QuestionSpec, Side};

/// Which screen the trainer is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Loading,
    Quiz,
    Results,
}

/// One quiz question at runtime: the spec, the decoded pair (present once the
/// loader delivers it), the post-swap answer, and independent per-clip
/// analyzer state for the two stereo-field meters.
pub struct Question {
    pub spec: QuestionSpec,
    /// Which button is correct *after* the random A/B swap.
    pub answer: Side,
    /// Whether the pair was presented swapped this session.
    pub swapped: bool,
    pub clip_a: Option<Arc<ClipPcm>>,
    pub clip_b: Option<Arc<ClipPcm>>,
    pub width_a: WidthState,
    pub width_b: WidthState,
}

impl Question {
    fn new(spec: QuestionSpec) -> Self {
        let answer = spec.correct;
        Self {
            spec,
            answer,
            swapped: false,
            clip_a: None,
            clip_b: None,
            width_a: WidthState::new(),
            width_b: WidthState::new(),
        }
    }

    pub fn loaded(&self) -> bool {
        self.clip_a.is_some() && self.clip_b.is_some()
    }

    /// Attach the decoded pair, optionally swapped. The answer tracks the
    /// swap so the listener can never learn a fixed button mapping.
    fn attach(&mut self, a: Arc<ClipPcm>, b: Arc<ClipPcm>, swapped: bool) {
        if swapped {
            self.clip_a = Some(b);
            self.clip_b = Some(a);
        } else {
            self.clip_a = Some(a);
            self.clip_b = Some(b);
        }
        self.swapped = swapped;
        self.answer = if swapped {
            self.spec.correct.other()
        } else {
            self.spec.correct
        };
    }

    /// Drop clips and analyzer state back to the never-loaded state.
    fn unload(&mut self) {
        self.clip_a = None;
        self.clip_b = None;
        self.swapped = false;
        self.answer = self.spec.correct;
        self.width_a.reset();
        self.width_b.reset();
    }
}

/// The quiz session: shuffled question list, the listener's choices, and the
/// current screen. All mutation happens on the UI thread.
pub struct Session {
    pub questions: Vec<Question>,
    pub current: usize,
    pub choices: Vec<Option<Side>>,
    pub screen: Screen,
}

impl Session {
    pub fn new<R: Rng>(mut specs: Vec<QuestionSpec>, rng: &mut R) -> Self {
        specs.shuffle(rng);
        let n = specs.len();
        Self {
            questions: specs.into_iter().map(Question::new).collect(),
            current: 0,
            choices: vec![None; n],
            screen: Screen::Loading,
        }
    }

    pub fn total(&self) -> usize {
        self.questions.len()
    }

    pub fn loaded_count(&self) -> usize {
        self.questions.iter().filter(|q| q.loaded()).count()
    }

    pub fn all_loaded(&self) -> bool {
        self.questions.iter().all(|q| q.loaded())
    }

    /// Attach a decoded pair to its slot with a coin-flip swap.
    pub fn attach_pair<R: Rng>(
        &mut self,
        slot: usize,
        a: Arc<ClipPcm>,
        b: Arc<ClipPcm>,
        rng: &mut R,
    ) {
        if let Some(q) = self.questions.get_mut(slot) {
            q.attach(a, b, rng.gen_bool(0.5));
        }
    }

    /// Record the listener's choice for the current question and advance.
    pub fn choose(&mut self, side: Side) {
        if self.screen != Screen::Quiz || self.current >= self.total() {
            return;
        }
        self.choices[self.current] = Some(side);
        self.current += 1;
        if self.current >= self.total() {
            self.screen = Screen::Results;
            info!(
                "Quiz finished: {}/{} correct",
                self.score(),
                self.total()
            );
        }
    }

    pub fn score(&self) -> usize {
        self.questions
            .iter()
            .zip(&self.choices)
            .filter(|(q, c)| **c == Some(q.answer))
            .count()
    }

    /// 1-based indices (in presentation order) of the questions answered
    /// wrong — the `missed` field of the results CSV.
    pub fn missed(&self) -> Vec<usize> {
        self.questions
            .iter()
            .zip(&self.choices)
            .enumerate()
            .filter(|(_, (q, c))| **c != Some(q.answer))
            .map(|(i, _)| i + 1)
            .collect()
    }

    /// Full session restart: reshuffle, drop all clips and analyzer state
    /// (the loader decodes everything again, with fresh swaps), clear
    /// choices, back to the loading screen.
    pub fn restart<R: Rng>(&mut self, rng: &mut R) {
        for q in &mut self.questions {
            q.unload();
        }
        self.questions.shuffle(rng);
        for c in &mut self.choices {
            *c = None;
        }
        self.current = 0;
        self.screen = Screen::Loading;
        info!("Session restarted: {} questions reshuffled", self.total());
    }
}

/// Load a `quiz.json` manifest: a JSON array of [`QuestionSpec`].
pub fn load_manifest(path: &Path) -> Result<Vec<QuestionSpec>> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read quiz manifest: {}", path.display()))?;
    let specs: Vec<QuestionSpec> =
        serde_json::from_str(&data).context("Malformed quiz manifest")?;
    anyhow::ensure!(!specs.is_empty(), "Quiz manifest contains no questions");
    info!("Loaded {} questions from {}", specs.len(), path.display());
    Ok(specs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn clip() -> Arc<ClipPcm> {
        Arc::new(ClipPcm {
            samples: vec![0; 1600],
            channels: 2,
            sample_rate: 48000,
        })
    }

    fn session(n: usize, seed: u64) -> (Session, StdRng) {
        let mut rng = StdRng::seed_from_u64(seed);
        let s = Session::new(QuestionSpec::builtin(n), &mut rng);
        (s, rng)
    }

    #[test]
    fn test_answer_tracks_swap() {
        let mut q = Question::new(QuestionSpec {
            prompt: "w".into(),
            correct: Side::A,
            clip: 1,
        });
        q.attach(clip(), clip(), true);
        assert_eq!(q.answer, Side::B, "swapped pair flips the correct button");
        q.unload();
        q.attach(clip(), clip(), false);
        assert_eq!(q.answer, Side::A);
    }

    #[test]
    fn test_choose_advances_and_finishes() {
        let (mut s, _) = session(2, 7);
        s.screen = Screen::Quiz;
        s.choose(Side::A);
        assert_eq!(s.current, 1);
        assert_eq!(s.screen, Screen::Quiz);
        s.choose(Side::B);
        assert_eq!(s.screen, Screen::Results);
        // Further choices are ignored.
        s.choose(Side::A);
        assert_eq!(s.current, 2);
    }

    #[test]
    fn test_empty_session_is_inert() {
        let (mut s, _) = session(0, 3);
        assert_eq!(s.total(), 0);
        s.screen = Screen::Quiz;
        s.choose(Side::A);
        assert_eq!(s.current, 0);
        assert_eq!(s.score(), 0);
        assert!(s.missed().is_empty());
    }

    #[test]
    fn test_score_and_missed() {
        let (mut s, _) = session(3, 1);
        s.screen = Screen::Quiz;
        // Answer every question with its correct side except the second.
        let answers: Vec<Side> = s.questions.iter().map(|q| q.answer).collect();
        s.choose(answers[0]);
        s.choose(answers[1].other());
        s.choose(answers[2]);
        assert_eq!(s.score(), 2);
        assert_eq!(s.missed(), vec![2]);
    }

    #[test]
    fn test_unanswered_counts_as_missed() {
        let (s, _) = session(2, 3);
        assert_eq!(s.score(), 0);
        assert_eq!(s.missed(), vec![1, 2]);
    }

    #[test]
    fn test_restart_resets_everything() {
        let (mut s, mut rng) = session(2, 42);
        s.attach_pair(0, clip(), clip(), &mut rng);
        s.attach_pair(1, clip(), clip(), &mut rng);
        s.screen = Screen::Quiz;
        s.questions[0].width_a.held_score = 5.0;
        s.choose(Side::A);
        s.choose(Side::B);

        s.restart(&mut rng);
        assert_eq!(s.screen, Screen::Loading);
        assert_eq!(s.current, 0);
        assert!(s.choices.iter().all(|c| c.is_none()));
        assert_eq!(s.loaded_count(), 0);
        for q in &s.questions {
            assert_eq!(q.width_a.held_score, 0.0);
            assert!(q.width_a.held_points.is_empty());
        }
    }

    #[test]
    fn test_attach_out_of_range_slot_is_ignored() {
        let (mut s, mut rng) = session(1, 9);
        s.attach_pair(5, clip(), clip(), &mut rng);
        assert_eq!(s.loaded_count(), 0);
    }
}
