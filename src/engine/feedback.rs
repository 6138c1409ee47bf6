//! Rating feedback loop
//!
//! An attempt is a match between learner and lesson. Both sides are updated
//! from the same pre-attempt snapshot, and the learner's per-skill
//! proficiency moves by the lesson's weight times an improvement factor.

use super::rating::update_rating;
use crate::config::EngineConfig;
use crate::profile::{clamp_unit, LearnerProfile, LessonProfile};

/// Updated copies of both sides of an attempt; inputs are left untouched
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptUpdate {
    pub learner: LearnerProfile,
    pub lesson: LessonProfile,
}

pub struct FeedbackProcessor {
    k_factor: f64,
    pass_improvement: f64,
    fail_improvement: f64,
}

impl FeedbackProcessor {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            k_factor: config.k_factor,
            pass_improvement: config.pass_improvement,
            fail_improvement: config.fail_improvement,
        }
    }

    /// Compute new ratings and proficiencies for one attempt
    pub fn apply(&self, learner: &LearnerProfile, lesson: &LessonProfile, passed: bool) -> AttemptUpdate {
        let learner_actual = if passed { 1.0 } else { 0.0 };
        let lesson_actual = 1.0 - learner_actual;

        // Both updates read the snapshot, neither feeds the other
        let learner_before = learner.rating;
        let lesson_before = lesson.difficulty_rating;
        let new_learner_rating = update_rating(learner_before, lesson_before, learner_actual, self.k_factor);
        let new_lesson_rating = update_rating(lesson_before, learner_before, lesson_actual, self.k_factor);

        let factor = if passed { self.pass_improvement } else { self.fail_improvement };
        let proficiency = learner
            .proficiency
            .map(|skill, current| clamp_unit(current + lesson.weights.get(skill) * factor));

        AttemptUpdate {
            learner: LearnerProfile {
                rating: new_learner_rating,
                proficiency,
                ..learner.clone()
            },
            lesson: LessonProfile {
                difficulty_rating: new_lesson_rating,
                ..lesson.clone()
            },
        }
    }
}
