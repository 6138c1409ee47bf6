//! Hybrid recommendation engine
//!
//! Two stages pick what a learner should study next:
//! 1. Adaptive filtering keeps lessons whose difficulty rating is close to
//!    the learner's rating.
//! 2. Content-based ranking orders them by how well the lesson's skill mix
//!    matches what the learner still needs.
//!
//! After each attempt the feedback loop moves learner and lesson ratings in
//! opposite directions and nudges per-skill proficiency.
//!
//! The engine keeps no state between calls. Serializing concurrent outcomes
//! for one learner or lesson is left to the store, which rejects stale writes.

pub mod feedback;
pub mod filter;
pub mod ranker;
pub mod rating;
pub mod vectors;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::Result;
use crate::profile::{LearnerId, LearnerRecord, LessonId, LessonProfile, LessonRecord, SkillLevels};
use crate::store::{AttemptRecord, OutcomeCommit, RecommenderStore};

pub use feedback::{AttemptUpdate, FeedbackProcessor};
pub use filter::{AdaptiveFilter, BandUsed, DifficultyBand};
pub use ranker::{Ranker, ScoredLesson};

/// A recommended lesson with its similarity score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub lesson_id: LessonId,
    pub lesson_name: String,
    pub difficulty_rating: i32,
    pub similarity: f64,
}

/// Current rating and proficiencies for a learner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnerStats {
    pub learner_id: LearnerId,
    pub name: String,
    pub rating: i32,
    pub grammar_proficiency: f64,
    pub vocab_proficiency: f64,
    pub listening_proficiency: f64,
}

/// Before/after view of one processed attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeReport {
    pub learner_id: LearnerId,
    pub lesson_id: LessonId,
    pub passed: bool,
    pub previous_rating: i32,
    pub new_rating: i32,
    pub rating_delta: i32,
    pub previous_proficiencies: SkillLevels,
    pub new_proficiencies: SkillLevels,
    pub proficiency_deltas: SkillLevels,
    pub previous_lesson_difficulty: i32,
    pub new_lesson_difficulty: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub learner_id: LearnerId,
    pub name: String,
    pub rating: i32,
}

pub struct RecommendationEngine {
    store: Arc<dyn RecommenderStore>,
    config: EngineConfig,
    filter: AdaptiveFilter,
    ranker: Ranker,
    feedback: FeedbackProcessor,
}

impl RecommendationEngine {
    pub fn new(store: Arc<dyn RecommenderStore>, config: EngineConfig) -> Self {
        Self {
            filter: AdaptiveFilter::new(config.primary_band, config.widened_band),
            ranker: Ranker::new(config.top_k),
            feedback: FeedbackProcessor::new(&config),
            store,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Up to `top_k` active, not-yet-completed lessons, best match first
    ///
    /// An empty list means no lesson fell inside either difficulty band.
    pub async fn recommend(&self, learner_id: LearnerId) -> Result<Vec<Recommendation>> {
        let learner = self.store.get_learner(learner_id).await?.resolve(&self.config);
        let completed = self.store.completed_lesson_ids(learner_id).await?;

        let candidates: Vec<LessonProfile> = self
            .store
            .get_active_lessons()
            .await?
            .iter()
            .filter(|lesson| lesson.active && !completed.contains(&lesson.id))
            .map(|lesson| lesson.resolve(&self.config))
            .collect();

        let (filtered, band) = self.filter.filter(learner.rating, &candidates);
        let needs = vectors::user_needs_vector(&learner);
        let ranked = self.ranker.rank(&needs, &filtered)?;

        debug!(
            "Learner {} (rating {}): {} candidates, {} after {:?} band, returning {}",
            learner_id,
            learner.rating,
            candidates.len(),
            filtered.len(),
            band,
            ranked.len()
        );

        Ok(ranked
            .into_iter()
            .map(|scored| Recommendation {
                lesson_id: scored.lesson.id,
                lesson_name: scored.lesson.name.clone(),
                difficulty_rating: scored.lesson.difficulty_rating,
                similarity: scored.similarity,
            })
            .collect())
    }

    pub async fn get_stats(&self, learner_id: LearnerId) -> Result<LearnerStats> {
        let learner = self.store.get_learner(learner_id).await?.resolve(&self.config);
        Ok(LearnerStats {
            learner_id: learner.id,
            name: learner.name,
            rating: learner.rating,
            grammar_proficiency: learner.proficiency.grammar,
            vocab_proficiency: learner.proficiency.vocab,
            listening_proficiency: learner.proficiency.listening,
        })
    }

    /// Apply one attempt to both ratings and the learner's proficiencies
    ///
    /// The learner and lesson writes land together or not at all. A
    /// `Conflict` means another outcome touched one of them first; the caller
    /// should resubmit.
    pub async fn process_outcome(
        &self,
        learner_id: LearnerId,
        lesson_id: LessonId,
        passed: bool,
    ) -> Result<OutcomeReport> {
        let learner_record = self.store.get_learner(learner_id).await?;
        let lesson_record = self.store.get_lesson(lesson_id).await?;
        let learner = learner_record.resolve(&self.config);
        let lesson = lesson_record.resolve(&self.config);

        let AttemptUpdate { learner: updated, lesson: updated_lesson } =
            self.feedback.apply(&learner, &lesson, passed);

        // Only touch what the attempt changed; unset weights stay unset
        let commit = OutcomeCommit {
            learner: LearnerRecord {
                rating: Some(updated.rating),
                grammar_proficiency: Some(updated.proficiency.grammar),
                vocab_proficiency: Some(updated.proficiency.vocab),
                listening_proficiency: Some(updated.proficiency.listening),
                ..learner_record
            },
            lesson: LessonRecord {
                difficulty_rating: Some(updated_lesson.difficulty_rating),
                ..lesson_record
            },
            attempt: AttemptRecord {
                learner_id,
                lesson_id,
                passed,
                learner_rating_before: learner.rating,
                learner_rating_after: updated.rating,
                lesson_rating_before: lesson.difficulty_rating,
                lesson_rating_after: updated_lesson.difficulty_rating,
                recorded_at: Utc::now(),
            },
        };

        if let Err(e) = self.store.commit_outcome(&commit).await {
            warn!(
                "Outcome for learner {} on lesson {} not applied (retryable: {}): {}",
                learner_id,
                lesson_id,
                e.is_retryable(),
                e
            );
            return Err(e);
        }

        info!(
            "Learner {} {} lesson {}: rating {} -> {}, lesson difficulty {} -> {}",
            learner_id,
            if passed { "passed" } else { "failed" },
            lesson_id,
            learner.rating,
            updated.rating,
            lesson.difficulty_rating,
            updated_lesson.difficulty_rating
        );

        Ok(OutcomeReport {
            learner_id,
            lesson_id,
            passed,
            previous_rating: learner.rating,
            new_rating: updated.rating,
            rating_delta: updated.rating - learner.rating,
            previous_proficiencies: learner.proficiency,
            new_proficiencies: updated.proficiency,
            proficiency_deltas: updated.proficiency.delta_from(&learner.proficiency),
            previous_lesson_difficulty: lesson.difficulty_rating,
            new_lesson_difficulty: updated_lesson.difficulty_rating,
        })
    }

    /// Record that the learner finished a lesson so it is no longer recommended
    pub async fn mark_completed(&self, learner_id: LearnerId, lesson_id: LessonId) -> Result<()> {
        self.store.mark_completed(learner_id, lesson_id).await
    }

    /// Most recent attempts for a learner
    pub async fn history(&self, learner_id: LearnerId, limit: usize) -> Result<Vec<AttemptRecord>> {
        // Surface NotFound rather than an empty list for unknown learners
        self.store.get_learner(learner_id).await?;
        self.store.attempt_history(learner_id, limit).await
    }

    /// Learners by rating, highest first; equal ratings by id
    pub async fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>> {
        let mut learners: Vec<_> = self
            .store
            .list_learners()
            .await?
            .iter()
            .map(|record| record.resolve(&self.config))
            .collect();
        learners.sort_by(|a, b| b.rating.cmp(&a.rating).then(a.id.cmp(&b.id)));

        Ok(learners
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(i, learner)| LeaderboardEntry {
                rank: i + 1,
                learner_id: learner.id,
                name: learner.name,
                rating: learner.rating,
            })
            .collect())
    }
}
