//! Persistence collaborators
//!
//! The engine only talks to these traits. Two implementations ship:
//! - `SqliteStore`: durable, one transaction per outcome commit
//! - `MemoryStore`: in-process maps for tests and throwaway runs
//!
//! Every learner and lesson write bumps a `version` counter. Outcome commits
//! carry the versions the engine read and fail with `Conflict` if either
//! entity moved underneath them, so a concurrent delta is never lost.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::Result;
use crate::profile::{LearnerId, LearnerRecord, LessonId, LessonRecord};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// One applied attempt, kept for rating history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub learner_id: LearnerId,
    pub lesson_id: LessonId,
    pub passed: bool,
    pub learner_rating_before: i32,
    pub learner_rating_after: i32,
    pub lesson_rating_before: i32,
    pub lesson_rating_after: i32,
    pub recorded_at: DateTime<Utc>,
}

/// The paired learner/lesson write for one attempt
///
/// `learner.version` and `lesson.version` are the versions that were read;
/// stores write `version + 1` only if the stored version still matches.
#[derive(Debug, Clone)]
pub struct OutcomeCommit {
    pub learner: LearnerRecord,
    pub lesson: LessonRecord,
    pub attempt: AttemptRecord,
}

#[async_trait]
pub trait LearnerStore: Send + Sync {
    /// Fails with `NotFound` for unknown ids
    async fn get_learner(&self, id: LearnerId) -> Result<LearnerRecord>;

    /// Overwrite an existing learner unconditionally
    async fn save_learner(&self, learner: &LearnerRecord) -> Result<()>;

    /// Insert a new learner, ignoring `learner.id`, and return the assigned id
    async fn insert_learner(&self, learner: &LearnerRecord) -> Result<LearnerId>;

    /// All learners ordered by id
    async fn list_learners(&self) -> Result<Vec<LearnerRecord>>;
}

#[async_trait]
pub trait LessonStore: Send + Sync {
    /// Active lessons ordered by id
    async fn get_active_lessons(&self) -> Result<Vec<LessonRecord>>;

    /// Fails with `NotFound` for unknown ids
    async fn get_lesson(&self, id: LessonId) -> Result<LessonRecord>;

    /// Overwrite an existing lesson unconditionally
    async fn save_lesson(&self, lesson: &LessonRecord) -> Result<()>;

    /// Insert a new lesson, ignoring `lesson.id`, and return the assigned id
    async fn insert_lesson(&self, lesson: &LessonRecord) -> Result<LessonId>;

    /// All lessons, active or not, ordered by id
    async fn list_lessons(&self) -> Result<Vec<LessonRecord>>;
}

#[async_trait]
pub trait CompletionStore: Send + Sync {
    async fn completed_lesson_ids(&self, learner_id: LearnerId) -> Result<HashSet<LessonId>>;

    /// Idempotent
    async fn mark_completed(&self, learner_id: LearnerId, lesson_id: LessonId) -> Result<()>;
}

#[async_trait]
pub trait OutcomeStore: Send + Sync {
    /// Write learner, lesson and history row as a single unit
    ///
    /// On any failure nothing is written. Version mismatches surface as
    /// `Conflict`, backend failures as `Persistence`; both are retryable.
    async fn commit_outcome(&self, commit: &OutcomeCommit) -> Result<()>;

    /// Most recent attempts first
    async fn attempt_history(&self, learner_id: LearnerId, limit: usize) -> Result<Vec<AttemptRecord>>;
}

/// Everything the engine needs from persistence
pub trait RecommenderStore: LearnerStore + LessonStore + CompletionStore + OutcomeStore {}

impl<T> RecommenderStore for T where T: LearnerStore + LessonStore + CompletionStore + OutcomeStore {}
