//! Needs and content vectors
//!
//! Both vectors are laid out as `[grammar, vocab, listening]`.

use crate::profile::{clamp_unit, LearnerProfile, LessonProfile};

pub const DIMENSIONS: usize = 3;

/// How much the learner still needs each skill: `1 - proficiency`
///
/// Weaker skills produce larger components, which steers similarity toward
/// lessons that emphasize them.
pub fn user_needs_vector(profile: &LearnerProfile) -> [f64; DIMENSIONS] {
    profile.proficiency.map(|_, level| clamp_unit(1.0 - level)).to_array()
}

/// How much a lesson exercises each skill
pub fn lesson_content_vector(lesson: &LessonProfile) -> [f64; DIMENSIONS] {
    lesson.weights.clamped().to_array()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::profile::{LearnerRecord, LessonRecord};

    #[test]
    fn test_needs_vector_inverts_proficiency() {
        let learner = LearnerRecord {
            grammar_proficiency: Some(0.25),
            vocab_proficiency: Some(1.0),
            listening_proficiency: None,
            ..LearnerRecord::draft("cy")
        }
        .resolve(&EngineConfig::default());

        assert_eq!(user_needs_vector(&learner), [0.75, 0.0, 1.0]);
    }

    #[test]
    fn test_content_vector_defaults_missing_weights() {
        let lesson = LessonRecord {
            vocab_weight: Some(0.9),
            ..LessonRecord::draft("food words")
        }
        .resolve(&EngineConfig::default());

        assert_eq!(lesson_content_vector(&lesson), [0.33, 0.9, 0.34]);
    }

    #[test]
    fn test_content_vector_clamps_direct_profiles() {
        let mut lesson = LessonRecord::draft("x").resolve(&EngineConfig::default());
        lesson.weights.listening = 3.0;
        lesson.weights.grammar = -1.0;
        assert_eq!(lesson_content_vector(&lesson), [0.0, 0.33, 1.0]);
    }
}
