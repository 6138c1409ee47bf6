//! Error types for the recommendation engine
//!
//! The library surfaces one typed error so callers can tell a missing learner
//! apart from a write that should simply be retried. The CLI wraps these in
//! `anyhow` at the edge.

use thiserror::Error;

use crate::profile::{LearnerId, LessonId};

/// Which kind of entity an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Learner,
    Lesson,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Learner => write!(f, "learner"),
            EntityKind::Lesson => write!(f, "lesson"),
        }
    }
}

/// Errors produced by the engine and its stores
#[derive(Debug, Error)]
pub enum EngineError {
    /// Unknown learner or lesson id
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: i64 },

    /// Vectors of unequal length were compared
    #[error("vector dimension mismatch: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },

    /// The entity changed between read and write
    #[error("concurrent update on {kind} {id}, retry the outcome")]
    Conflict { kind: EntityKind, id: i64 },

    /// The backing store failed
    #[error("persistence failure: {source}")]
    Persistence {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl EngineError {
    pub fn learner_not_found(id: LearnerId) -> Self {
        Self::NotFound { kind: EntityKind::Learner, id }
    }

    pub fn lesson_not_found(id: LessonId) -> Self {
        Self::NotFound { kind: EntityKind::Lesson, id }
    }

    pub fn persistence<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Persistence { source: Box::new(err) }
    }

    /// Whether resubmitting the same request can succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::Persistence { .. })
    }
}

impl From<rusqlite::Error> for EngineError {
    fn from(err: rusqlite::Error) -> Self {
        Self::persistence(err)
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
