//! In-memory store
//!
//! All state sits behind one `RwLock`, so an outcome commit is atomic by
//! holding the write guard across the version checks and the writes.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::RwLock;

use super::{AttemptRecord, CompletionStore, LearnerStore, LessonStore, OutcomeCommit, OutcomeStore};
use crate::error::{EngineError, EntityKind, Result};
use crate::profile::{LearnerId, LearnerRecord, LessonId, LessonRecord};

#[derive(Default)]
struct Inner {
    learners: BTreeMap<LearnerId, LearnerRecord>,
    lessons: BTreeMap<LessonId, LessonRecord>,
    completions: HashMap<LearnerId, HashSet<LessonId>>,
    attempts: Vec<AttemptRecord>,
    next_learner_id: LearnerId,
    next_lesson_id: LessonId,
}

/// Volatile store backed by ordered maps
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LearnerStore for MemoryStore {
    async fn get_learner(&self, id: LearnerId) -> Result<LearnerRecord> {
        let inner = self.inner.read().await;
        inner.learners.get(&id).cloned()
            .ok_or_else(|| EngineError::learner_not_found(id))
    }

    async fn save_learner(&self, learner: &LearnerRecord) -> Result<()> {
        let mut inner = self.inner.write().await;
        let stored = inner.learners.get_mut(&learner.id)
            .ok_or_else(|| EngineError::learner_not_found(learner.id))?;
        let version = stored.version + 1;
        *stored = LearnerRecord { version, ..learner.clone() };
        Ok(())
    }

    async fn insert_learner(&self, learner: &LearnerRecord) -> Result<LearnerId> {
        let mut inner = self.inner.write().await;
        inner.next_learner_id += 1;
        let id = inner.next_learner_id;
        inner.learners.insert(id, LearnerRecord { id, version: 0, ..learner.clone() });
        Ok(id)
    }

    async fn list_learners(&self) -> Result<Vec<LearnerRecord>> {
        let inner = self.inner.read().await;
        Ok(inner.learners.values().cloned().collect())
    }
}

#[async_trait]
impl LessonStore for MemoryStore {
    async fn get_active_lessons(&self) -> Result<Vec<LessonRecord>> {
        let inner = self.inner.read().await;
        Ok(inner.lessons.values().filter(|l| l.active).cloned().collect())
    }

    async fn get_lesson(&self, id: LessonId) -> Result<LessonRecord> {
        let inner = self.inner.read().await;
        inner.lessons.get(&id).cloned()
            .ok_or_else(|| EngineError::lesson_not_found(id))
    }

    async fn save_lesson(&self, lesson: &LessonRecord) -> Result<()> {
        let mut inner = self.inner.write().await;
        let stored = inner.lessons.get_mut(&lesson.id)
            .ok_or_else(|| EngineError::lesson_not_found(lesson.id))?;
        let version = stored.version + 1;
        *stored = LessonRecord { version, ..lesson.clone() };
        Ok(())
    }

    async fn insert_lesson(&self, lesson: &LessonRecord) -> Result<LessonId> {
        let mut inner = self.inner.write().await;
        inner.next_lesson_id += 1;
        let id = inner.next_lesson_id;
        inner.lessons.insert(id, LessonRecord { id, version: 0, ..lesson.clone() });
        Ok(id)
    }

    async fn list_lessons(&self) -> Result<Vec<LessonRecord>> {
        let inner = self.inner.read().await;
        Ok(inner.lessons.values().cloned().collect())
    }
}

#[async_trait]
impl CompletionStore for MemoryStore {
    async fn completed_lesson_ids(&self, learner_id: LearnerId) -> Result<HashSet<LessonId>> {
        let inner = self.inner.read().await;
        Ok(inner.completions.get(&learner_id).cloned().unwrap_or_default())
    }

    async fn mark_completed(&self, learner_id: LearnerId, lesson_id: LessonId) -> Result<()> {
        let mut inner = self.inner.write().await;
        if !inner.learners.contains_key(&learner_id) {
            return Err(EngineError::learner_not_found(learner_id));
        }
        if !inner.lessons.contains_key(&lesson_id) {
            return Err(EngineError::lesson_not_found(lesson_id));
        }
        inner.completions.entry(learner_id).or_default().insert(lesson_id);
        Ok(())
    }
}

#[async_trait]
impl OutcomeStore for MemoryStore {
    async fn commit_outcome(&self, commit: &OutcomeCommit) -> Result<()> {
        let mut inner = self.inner.write().await;

        // Check both sides before touching either
        let learner_version = inner.learners.get(&commit.learner.id)
            .map(|l| l.version)
            .ok_or_else(|| EngineError::learner_not_found(commit.learner.id))?;
        if learner_version != commit.learner.version {
            return Err(EngineError::Conflict { kind: EntityKind::Learner, id: commit.learner.id });
        }
        let lesson_version = inner.lessons.get(&commit.lesson.id)
            .map(|l| l.version)
            .ok_or_else(|| EngineError::lesson_not_found(commit.lesson.id))?;
        if lesson_version != commit.lesson.version {
            return Err(EngineError::Conflict { kind: EntityKind::Lesson, id: commit.lesson.id });
        }

        inner.learners.insert(
            commit.learner.id,
            LearnerRecord { version: learner_version + 1, ..commit.learner.clone() },
        );
        inner.lessons.insert(
            commit.lesson.id,
            LessonRecord { version: lesson_version + 1, ..commit.lesson.clone() },
        );
        inner.attempts.push(commit.attempt.clone());
        Ok(())
    }

    async fn attempt_history(&self, learner_id: LearnerId, limit: usize) -> Result<Vec<AttemptRecord>> {
        let inner = self.inner.read().await;
        Ok(inner.attempts.iter()
            .rev()
            .filter(|a| a.learner_id == learner_id)
            .take(limit)
            .cloned()
            .collect())
    }
}
