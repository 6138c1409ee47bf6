//! Content-based ranking
//!
//! Scores each lesson by cosine similarity between the learner's needs vector
//! and the lesson's content vector, then keeps the best `top_k`.

use std::cmp::Ordering;

use super::rating::cosine_similarity;
use super::vectors::lesson_content_vector;
use crate::error::Result;
use crate::profile::LessonProfile;

/// A lesson paired with its similarity score
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredLesson<'a> {
    pub lesson: &'a LessonProfile,
    pub similarity: f64,
}

pub struct Ranker {
    top_k: usize,
}

impl Ranker {
    pub fn new(top_k: usize) -> Self {
        Self { top_k }
    }

    /// Rank `lessons` by descending similarity to `needs`
    ///
    /// Equal scores keep their input order.
    pub fn rank<'a>(
        &self,
        needs: &[f64],
        lessons: &[&'a LessonProfile],
    ) -> Result<Vec<ScoredLesson<'a>>> {
        let mut scored = lessons
            .iter()
            .map(|lesson| -> Result<ScoredLesson<'a>> {
                let similarity = cosine_similarity(needs, &lesson_content_vector(lesson))?;
                Ok(ScoredLesson { lesson: *lesson, similarity })
            })
            .collect::<Result<Vec<_>>>()?;

        // sort_by is stable
        scored.sort_by(|a, b| {
            b.similarity.partial_cmp(&a.similarity).unwrap_or(Ordering::Equal)
        });
        scored.truncate(self.top_k);
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::profile::{LessonRecord, SkillLevels};

    fn lesson(id: i64, weights: SkillLevels) -> LessonProfile {
        LessonRecord {
            id,
            grammar_weight: Some(weights.grammar),
            vocab_weight: Some(weights.vocab),
            listening_weight: Some(weights.listening),
            ..LessonRecord::draft(&format!("lesson {}", id))
        }
        .resolve(&EngineConfig::default())
    }

    fn ids(ranked: &[ScoredLesson<'_>]) -> Vec<i64> {
        ranked.iter().map(|s| s.lesson.id).collect()
    }

    #[test]
    fn test_prefers_lessons_matching_needs() {
        let grammar = lesson(1, SkillLevels::new(0.8, 0.1, 0.1));
        let listening = lesson(2, SkillLevels::new(0.1, 0.1, 0.8));
        let needs = [0.1, 0.2, 0.9];

        let ranked = Ranker::new(5).rank(&needs, &[&grammar, &listening]).unwrap();
        assert_eq!(ids(&ranked), vec![2, 1]);
        assert!(ranked[0].similarity > ranked[1].similarity);
    }

    #[test]
    fn test_truncates_to_top_k() {
        let pool: Vec<LessonProfile> = (1..=8)
            .map(|i| lesson(i, SkillLevels::new(0.1 * i as f64, 0.5, 0.5)))
            .collect();
        let refs: Vec<&LessonProfile> = pool.iter().collect();

        let ranked = Ranker::new(5).rank(&[1.0, 0.0, 0.0], &refs).unwrap();
        assert_eq!(ranked.len(), 5);
        assert_eq!(ids(&ranked), vec![8, 7, 6, 5, 4]);
    }

    #[test]
    fn test_fewer_than_k_returns_all() {
        let a = lesson(1, SkillLevels::new(0.5, 0.5, 0.0));
        let ranked = Ranker::new(5).rank(&[1.0, 1.0, 1.0], &[&a]).unwrap();
        assert_eq!(ranked.len(), 1);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let weights = SkillLevels::new(0.33, 0.33, 0.34);
        let pool: Vec<LessonProfile> = [4, 2, 9, 1, 7, 3]
            .iter()
            .map(|id| lesson(*id, weights))
            .collect();
        let refs: Vec<&LessonProfile> = pool.iter().collect();

        let ranked = Ranker::new(5).rank(&[1.0, 1.0, 1.0], &refs).unwrap();
        assert_eq!(ids(&ranked), vec![4, 2, 9, 1, 7]);
    }

    #[test]
    fn test_fully_proficient_learner_scores_zero() {
        let a = lesson(1, SkillLevels::new(0.33, 0.33, 0.34));
        let ranked = Ranker::new(5).rank(&[0.0, 0.0, 0.0], &[&a]).unwrap();
        assert_eq!(ranked[0].similarity, 0.0);
    }
}
