//! Lesson Recommender Library
//!
//! A hybrid recommendation engine for language lessons:
//! - Rating-based adaptive filtering so lessons sit near the learner's level
//! - Content-based ranking against per-skill proficiency gaps
//! - A feedback loop that updates learner and lesson ratings after each attempt
//! - SQLite and in-memory stores with atomic, versioned outcome commits
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use lesson_recommender::{Config, RecommendationEngine, SqliteStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let store = Arc::new(SqliteStore::new(config.storage.database_path()?).await?);
//!     let engine = RecommendationEngine::new(store, config.engine);
//!     for rec in engine.recommend(1).await? {
//!         println!("{} ({:.3})", rec.lesson_name, rec.similarity);
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod config;
pub mod profile;
pub mod store;
pub mod engine;
pub mod cli;

pub use config::{Config, EngineConfig, StorageConfig};

pub use error::{EngineError, EntityKind};

pub use profile::{
    LearnerId,
    LessonId,
    LearnerProfile,
    LearnerRecord,
    LessonProfile,
    LessonRecord,
    Skill,
    SkillLevels,
};

pub use engine::{
    LeaderboardEntry,
    LearnerStats,
    OutcomeReport,
    Recommendation,
    RecommendationEngine,
};

pub use store::{
    AttemptRecord,
    MemoryStore,
    RecommenderStore,
    SqliteStore,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get the library info
pub fn info() -> String {
    format!("{} v{} - Adaptive lesson recommendation engine", NAME, VERSION)
}
