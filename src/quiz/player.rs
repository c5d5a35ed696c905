use std::time::{Duration, Instant};

use super::handoff::QuizHandoff;
use super::score::{calculate_score, score_bucket};
use super::types::{QuizDefinition, QuizQuestion};
use crate::experiments::tracking::{Tracker, TrackingEvent};

/// Delay between locking an answer and moving to the next question.
pub const AUTO_ADVANCE: Duration = Duration::from_millis(1200);

/// One run through a quiz. Time is passed in by the caller so the
/// auto-advance can be driven from a UI loop or a test clock.
#[derive(Debug)]
pub struct QuizAttempt<'q> {
    quiz: &'q QuizDefinition,
    answers: Vec<Option<usize>>,
    locked: Vec<bool>,
    current: usize,
    advance_at: Option<Instant>,
    finished: Option<QuizHandoff>,
    tracker: Tracker,
}

impl<'q> QuizAttempt<'q> {
    /// Emits `quiz_view` and `quiz_start`.
    pub fn start(quiz: &'q QuizDefinition, tracker: Tracker) -> Self {
        let n = quiz.questions.len();
        tracker.emit(TrackingEvent::QuizView {
            slug: quiz.slug.clone(),
        });
        tracker.emit(TrackingEvent::QuizStart {
            slug: quiz.slug.clone(),
        });
        Self {
            quiz,
            answers: vec![None; n],
            locked: vec![false; n],
            current: 0,
            advance_at: None,
            finished: None,
            tracker,
        }
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_question(&self) -> Option<&'q QuizQuestion> {
        self.quiz.questions.get(self.current)
    }

    pub fn answers(&self) -> &[Option<usize>] {
        &self.answers
    }

    pub fn is_locked(&self, index: usize) -> bool {
        self.locked.get(index).copied().unwrap_or(false)
    }

    pub fn is_last_question(&self) -> bool {
        self.current + 1 >= self.quiz.questions.len()
    }

    /// True once the last question is answered; results are then requested
    /// with [`finish`](Self::finish).
    pub fn can_finish(&self) -> bool {
        self.is_last_question() && self.is_locked(self.current)
    }

    /// Records an answer for the current question and locks it. Returns
    /// false (and changes nothing) when the question is already locked or
    /// the option does not exist.
    pub fn select(&mut self, option: usize, now: Instant) -> bool {
        let Some(question) = self.current_question() else {
            return false;
        };
        if self.is_locked(self.current) || option >= question.options().len() {
            return false;
        }
        self.answers[self.current] = Some(option);
        self.locked[self.current] = true;
        self.advance_at = if self.is_last_question() {
            None
        } else {
            Some(now + AUTO_ADVANCE)
        };
        true
    }

    /// Moves to the next question once the auto-advance delay has passed.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.advance_at {
            Some(at) if now >= at => {
                self.advance_at = None;
                self.current += 1;
                true
            }
            _ => false,
        }
    }

    pub fn score(&self) -> usize {
        calculate_score(self.quiz, &self.answers)
    }

    /// Emits `quiz_complete` and `quiz_score_bucket` once and returns the
    /// results hand-off. `None` until the last question is answered.
    pub fn finish(&mut self) -> Option<QuizHandoff> {
        if let Some(done) = &self.finished {
            return Some(done.clone());
        }
        if !self.can_finish() {
            return None;
        }
        let score = self.score();
        self.tracker.emit(TrackingEvent::QuizComplete {
            slug: self.quiz.slug.clone(),
            score,
        });
        self.tracker.emit(TrackingEvent::QuizScoreBucket {
            slug: self.quiz.slug.clone(),
            bucket: score_bucket(score),
        });
        let handoff = QuizHandoff::new(score, self.answers.clone());
        self.finished = Some(handoff.clone());
        Some(handoff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiments::tracking::RecordingSink;
    use crate::quiz::schema::{fixtures::quiz_json, parse_quiz_definition};
    use std::sync::Arc;

    fn quiz() -> QuizDefinition {
        parse_quiz_definition(&quiz_json("hundraser").to_string(), "test").unwrap()
    }

    fn attempt(quiz: &QuizDefinition) -> (QuizAttempt<'_>, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::new());
        let tracker = Tracker::disabled().with_sink(sink.clone());
        (QuizAttempt::start(quiz, tracker), sink)
    }

    #[test]
    fn start_emits_view_and_start() {
        let quiz = quiz();
        let (_attempt, sink) = attempt(&quiz);
        assert_eq!(sink.event_names(), vec!["quiz_view", "quiz_start"]);
    }

    #[test]
    fn selecting_locks_and_advances_after_delay() {
        let quiz = quiz();
        let (mut a, _) = attempt(&quiz);
        let t0 = Instant::now();
        assert!(a.select(1, t0));
        assert!(a.is_locked(0));
        assert!(!a.tick(t0 + Duration::from_millis(1199)));
        assert_eq!(a.current_index(), 0);
        assert!(a.tick(t0 + AUTO_ADVANCE));
        assert_eq!(a.current_index(), 1);
        assert!(!a.tick(t0 + AUTO_ADVANCE * 2));
        assert_eq!(a.current_index(), 1);
    }

    #[test]
    fn second_select_on_locked_question_is_ignored() {
        let quiz = quiz();
        let (mut a, _) = attempt(&quiz);
        let t0 = Instant::now();
        assert!(a.select(0, t0));
        assert!(!a.select(2, t0 + Duration::from_millis(10)));
        assert_eq!(a.answers()[0], Some(0));
        // The first lock's timer still fires on schedule.
        assert!(a.tick(t0 + AUTO_ADVANCE));
    }

    #[test]
    fn out_of_range_option_is_ignored() {
        let quiz = quiz();
        let (mut a, _) = attempt(&quiz);
        assert!(!a.select(7, Instant::now()));
        assert!(!a.is_locked(0));
    }

    #[test]
    fn last_question_does_not_auto_advance() {
        let quiz = quiz();
        let (mut a, sink) = attempt(&quiz);
        let mut now = Instant::now();
        for i in 0..10 {
            assert!(!a.can_finish());
            assert!(a.finish().is_none());
            assert!(a.select(quiz.questions[i].correct_index().unwrap_or(0), now));
            now += AUTO_ADVANCE;
            a.tick(now);
        }
        assert_eq!(a.current_index(), 9);
        assert!(a.can_finish());

        let handoff = a.finish().unwrap();
        assert_eq!(handoff.score, 9);
        assert_eq!(handoff.answers.len(), 10);
        assert_eq!(
            sink.event_names(),
            vec!["quiz_view", "quiz_start", "quiz_complete", "quiz_score_bucket"]
        );
        let payload = sink.events()[3].payload();
        assert_eq!(payload["bucket"], "high");
        assert_eq!(payload["slug"], "hundraser");
    }

    #[test]
    fn finish_is_idempotent() {
        let quiz = quiz();
        let (mut a, sink) = attempt(&quiz);
        let mut now = Instant::now();
        for _ in 0..10 {
            a.select(0, now);
            now += AUTO_ADVANCE;
            a.tick(now);
        }
        let first = a.finish().unwrap();
        let second = a.finish().unwrap();
        assert_eq!(first, second);
        assert_eq!(sink.events().len(), 4);
    }
}
