//! SQLite-backed store for learners, lessons, completions and attempt history

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use super::{AttemptRecord, CompletionStore, LearnerStore, LessonStore, OutcomeCommit, OutcomeStore};
use crate::error::{EngineError, EntityKind, Result};
use crate::profile::{LearnerId, LearnerRecord, LessonId, LessonRecord};

const LEARNER_COLUMNS: &str =
    "id, name, rating, grammar_proficiency, vocab_proficiency, listening_proficiency, version";

const LESSON_COLUMNS: &str =
    "id, name, difficulty_rating, grammar_weight, vocab_weight, listening_weight, active, version";

/// SQLite-based store
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(EngineError::persistence)?;
        }

        let conn = Connection::open(&path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;")?;
        Self::init_schema(&conn)?;
        debug!("Opened recommender database at {}", path.display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(r#"
            CREATE TABLE IF NOT EXISTS learners (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                rating INTEGER,
                grammar_proficiency REAL,
                vocab_proficiency REAL,
                listening_proficiency REAL,
                version INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS lessons (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                difficulty_rating INTEGER,
                grammar_weight REAL,
                vocab_weight REAL,
                listening_weight REAL,
                active INTEGER NOT NULL DEFAULT 1,
                version INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS completions (
                learner_id INTEGER NOT NULL,
                lesson_id INTEGER NOT NULL,
                completed_at TEXT NOT NULL,
                PRIMARY KEY (learner_id, lesson_id),
                FOREIGN KEY (learner_id) REFERENCES learners(id) ON DELETE CASCADE,
                FOREIGN KEY (lesson_id) REFERENCES lessons(id) ON DELETE CASCADE
            );

            -- One row per applied outcome, in commit order
            CREATE TABLE IF NOT EXISTS attempts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                learner_id INTEGER NOT NULL,
                lesson_id INTEGER NOT NULL,
                passed INTEGER NOT NULL,
                learner_rating_before INTEGER NOT NULL,
                learner_rating_after INTEGER NOT NULL,
                lesson_rating_before INTEGER NOT NULL,
                lesson_rating_after INTEGER NOT NULL,
                recorded_at TEXT NOT NULL,
                FOREIGN KEY (learner_id) REFERENCES learners(id) ON DELETE CASCADE,
                FOREIGN KEY (lesson_id) REFERENCES lessons(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_lessons_active ON lessons(active);
            CREATE INDEX IF NOT EXISTS idx_attempts_learner ON attempts(learner_id, id DESC);
        "#)?;

        Ok(())
    }

    fn learner_from_row(row: &Row<'_>) -> rusqlite::Result<LearnerRecord> {
        Ok(LearnerRecord {
            id: row.get(0)?,
            name: row.get(1)?,
            rating: row.get(2)?,
            grammar_proficiency: row.get(3)?,
            vocab_proficiency: row.get(4)?,
            listening_proficiency: row.get(5)?,
            version: row.get(6)?,
        })
    }

    fn lesson_from_row(row: &Row<'_>) -> rusqlite::Result<LessonRecord> {
        Ok(LessonRecord {
            id: row.get(0)?,
            name: row.get(1)?,
            difficulty_rating: row.get(2)?,
            grammar_weight: row.get(3)?,
            vocab_weight: row.get(4)?,
            listening_weight: row.get(5)?,
            active: row.get(6)?,
            version: row.get(7)?,
        })
    }

    fn attempt_from_row(row: &Row<'_>) -> rusqlite::Result<AttemptRecord> {
        let recorded_at: String = row.get(7)?;
        Ok(AttemptRecord {
            learner_id: row.get(0)?,
            lesson_id: row.get(1)?,
            passed: row.get(2)?,
            learner_rating_before: row.get(3)?,
            learner_rating_after: row.get(4)?,
            lesson_rating_before: row.get(5)?,
            lesson_rating_after: row.get(6)?,
            recorded_at: DateTime::parse_from_rfc3339(&recorded_at)
                .map(|d| d.with_timezone(&Utc))
                .map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e))
                })?,
        })
    }

    fn exists(conn: &Connection, table: &str, id: i64) -> Result<bool> {
        let found = conn
            .query_row(&format!("SELECT 1 FROM {} WHERE id = ?1", table), params![id], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    /// Turn a zero-row versioned update into `NotFound` or `Conflict`
    fn missed_update(conn: &Connection, kind: EntityKind, id: i64) -> EngineError {
        let table = match kind {
            EntityKind::Learner => "learners",
            EntityKind::Lesson => "lessons",
        };
        match Self::exists(conn, table, id) {
            Ok(true) => EngineError::Conflict { kind, id },
            Ok(false) => EngineError::NotFound { kind, id },
            Err(e) => e,
        }
    }
}

#[async_trait]
impl LearnerStore for SqliteStore {
    async fn get_learner(&self, id: LearnerId) -> Result<LearnerRecord> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(
            &format!("SELECT {} FROM learners WHERE id = ?1", LEARNER_COLUMNS)
        )?;
        let record = stmt.query_row(params![id], Self::learner_from_row).optional()?;
        record.ok_or_else(|| EngineError::learner_not_found(id))
    }

    async fn save_learner(&self, learner: &LearnerRecord) -> Result<()> {
        let conn = self.conn.lock().await;
        let changed = conn.execute(
            r#"UPDATE learners
               SET name = ?2, rating = ?3, grammar_proficiency = ?4, vocab_proficiency = ?5,
                   listening_proficiency = ?6, version = version + 1
               WHERE id = ?1"#,
            params![
                learner.id,
                learner.name,
                learner.rating,
                learner.grammar_proficiency,
                learner.vocab_proficiency,
                learner.listening_proficiency,
            ],
        )?;
        if changed == 0 {
            return Err(EngineError::learner_not_found(learner.id));
        }
        Ok(())
    }

    async fn insert_learner(&self, learner: &LearnerRecord) -> Result<LearnerId> {
        let conn = self.conn.lock().await;
        conn.execute(
            r#"INSERT INTO learners
               (name, rating, grammar_proficiency, vocab_proficiency, listening_proficiency, version)
               VALUES (?1, ?2, ?3, ?4, ?5, 0)"#,
            params![
                learner.name,
                learner.rating,
                learner.grammar_proficiency,
                learner.vocab_proficiency,
                learner.listening_proficiency,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    async fn list_learners(&self) -> Result<Vec<LearnerRecord>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(
            &format!("SELECT {} FROM learners ORDER BY id", LEARNER_COLUMNS)
        )?;
        let learners = stmt.query_map([], Self::learner_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(learners)
    }
}

#[async_trait]
impl LessonStore for SqliteStore {
    async fn get_active_lessons(&self) -> Result<Vec<LessonRecord>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(
            &format!("SELECT {} FROM lessons WHERE active = 1 ORDER BY id", LESSON_COLUMNS)
        )?;
        let lessons = stmt.query_map([], Self::lesson_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(lessons)
    }

    async fn get_lesson(&self, id: LessonId) -> Result<LessonRecord> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(
            &format!("SELECT {} FROM lessons WHERE id = ?1", LESSON_COLUMNS)
        )?;
        let record = stmt.query_row(params![id], Self::lesson_from_row).optional()?;
        record.ok_or_else(|| EngineError::lesson_not_found(id))
    }

    async fn save_lesson(&self, lesson: &LessonRecord) -> Result<()> {
        let conn = self.conn.lock().await;
        let changed = conn.execute(
            r#"UPDATE lessons
               SET name = ?2, difficulty_rating = ?3, grammar_weight = ?4, vocab_weight = ?5,
                   listening_weight = ?6, active = ?7, version = version + 1
               WHERE id = ?1"#,
            params![
                lesson.id,
                lesson.name,
                lesson.difficulty_rating,
                lesson.grammar_weight,
                lesson.vocab_weight,
                lesson.listening_weight,
                lesson.active,
            ],
        )?;
        if changed == 0 {
            return Err(EngineError::lesson_not_found(lesson.id));
        }
        Ok(())
    }

    async fn insert_lesson(&self, lesson: &LessonRecord) -> Result<LessonId> {
        let conn = self.conn.lock().await;
        conn.execute(
            r#"INSERT INTO lessons
               (name, difficulty_rating, grammar_weight, vocab_weight, listening_weight, active, version)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)"#,
            params![
                lesson.name,
                lesson.difficulty_rating,
                lesson.grammar_weight,
                lesson.vocab_weight,
                lesson.listening_weight,
                lesson.active,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    async fn list_lessons(&self) -> Result<Vec<LessonRecord>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(
            &format!("SELECT {} FROM lessons ORDER BY id", LESSON_COLUMNS)
        )?;
        let lessons = stmt.query_map([], Self::lesson_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(lessons)
    }
}

#[async_trait]
impl CompletionStore for SqliteStore {
    async fn completed_lesson_ids(&self, learner_id: LearnerId) -> Result<HashSet<LessonId>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(
            "SELECT lesson_id FROM completions WHERE learner_id = ?1"
        )?;
        let ids = stmt.query_map(params![learner_id], |row| row.get::<_, LessonId>(0))?
            .collect::<rusqlite::Result<HashSet<_>>>()?;
        Ok(ids)
    }

    async fn mark_completed(&self, learner_id: LearnerId, lesson_id: LessonId) -> Result<()> {
        let conn = self.conn.lock().await;
        if !Self::exists(&conn, "learners", learner_id)? {
            return Err(EngineError::learner_not_found(learner_id));
        }
        if !Self::exists(&conn, "lessons", lesson_id)? {
            return Err(EngineError::lesson_not_found(lesson_id));
        }
        conn.execute(
            "INSERT OR IGNORE INTO completions (learner_id, lesson_id, completed_at) VALUES (?1, ?2, ?3)",
            params![learner_id, lesson_id, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

#[async_trait]
impl OutcomeStore for SqliteStore {
    async fn commit_outcome(&self, commit: &OutcomeCommit) -> Result<()> {
        let mut conn = self.conn.lock().await;
        // Dropping `tx` without commit rolls everything back
        let tx = conn.transaction()?;

        let learner = &commit.learner;
        let changed = tx.execute(
            r#"UPDATE learners
               SET rating = ?2, grammar_proficiency = ?3, vocab_proficiency = ?4,
                   listening_proficiency = ?5, version = version + 1
               WHERE id = ?1 AND version = ?6"#,
            params![
                learner.id,
                learner.rating,
                learner.grammar_proficiency,
                learner.vocab_proficiency,
                learner.listening_proficiency,
                learner.version,
            ],
        )?;
        if changed == 0 {
            return Err(Self::missed_update(&tx, EntityKind::Learner, learner.id));
        }

        let lesson = &commit.lesson;
        let changed = tx.execute(
            "UPDATE lessons SET difficulty_rating = ?2, version = version + 1 WHERE id = ?1 AND version = ?3",
            params![lesson.id, lesson.difficulty_rating, lesson.version],
        )?;
        if changed == 0 {
            return Err(Self::missed_update(&tx, EntityKind::Lesson, lesson.id));
        }

        let attempt = &commit.attempt;
        tx.execute(
            r#"INSERT INTO attempts
               (learner_id, lesson_id, passed, learner_rating_before, learner_rating_after,
                lesson_rating_before, lesson_rating_after, recorded_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
            params![
                attempt.learner_id,
                attempt.lesson_id,
                attempt.passed,
                attempt.learner_rating_before,
                attempt.learner_rating_after,
                attempt.lesson_rating_before,
                attempt.lesson_rating_after,
                attempt.recorded_at.to_rfc3339(),
            ],
        )?;

        tx.commit()?;
        Ok(())
    }

    async fn attempt_history(&self, learner_id: LearnerId, limit: usize) -> Result<Vec<AttemptRecord>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(
            r#"SELECT learner_id, lesson_id, passed, learner_rating_before, learner_rating_after,
                      lesson_rating_before, lesson_rating_after, recorded_at
               FROM attempts
               WHERE learner_id = ?1
               ORDER BY id DESC
               LIMIT ?2"#
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let attempts = stmt.query_map(params![learner_id, limit], Self::attempt_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(attempts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn open() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempdir().unwrap();
        let store = SqliteStore::new(dir.path().join("test.db")).await.unwrap();
        (dir, store)
    }

    fn commit_for(learner: LearnerRecord, lesson: LessonRecord) -> OutcomeCommit {
        let attempt = AttemptRecord {
            learner_id: learner.id,
            lesson_id: lesson.id,
            passed: false,
            learner_rating_before: 1500,
            learner_rating_after: 1484,
            lesson_rating_before: 1500,
            lesson_rating_after: 1516,
            recorded_at: Utc::now(),
        };
        OutcomeCommit {
            learner: LearnerRecord { rating: Some(1484), grammar_proficiency: Some(0.1), ..learner },
            lesson: LessonRecord { difficulty_rating: Some(1516), ..lesson },
            attempt,
        }
    }

    #[tokio::test]
    async fn test_insert_and_load_keeps_nulls() {
        let (_dir, store) = open().await;
        let id = store.insert_learner(&LearnerRecord::draft("ana")).await.unwrap();

        let loaded = store.get_learner(id).await.unwrap();
        assert_eq!(loaded.name, "ana");
        assert_eq!(loaded.rating, None);
        assert_eq!(loaded.grammar_proficiency, None);
        assert_eq!(loaded.version, 0);
    }

    #[tokio::test]
    async fn test_missing_rows_are_not_found() {
        let (_dir, store) = open().await;
        assert!(matches!(store.get_learner(42).await, Err(EngineError::NotFound { kind: EntityKind::Learner, id: 42 })));
        assert!(matches!(store.get_lesson(42).await, Err(EngineError::NotFound { kind: EntityKind::Lesson, id: 42 })));
    }

    #[tokio::test]
    async fn test_active_lessons_ordered_by_id() {
        let (_dir, store) = open().await;
        store.insert_lesson(&LessonRecord { difficulty_rating: Some(1400), ..LessonRecord::draft("a") }).await.unwrap();
        store.insert_lesson(&LessonRecord { active: false, ..LessonRecord::draft("b") }).await.unwrap();
        store.insert_lesson(&LessonRecord { grammar_weight: Some(0.7), ..LessonRecord::draft("c") }).await.unwrap();

        let active = store.get_active_lessons().await.unwrap();
        let names: Vec<&str> = active.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["a", "c"]);
        assert_eq!(active[0].difficulty_rating, Some(1400));
        assert_eq!(active[1].grammar_weight, Some(0.7));
    }

    #[tokio::test]
    async fn test_save_bumps_version() {
        let (_dir, store) = open().await;
        let id = store.insert_lesson(&LessonRecord::draft("a")).await.unwrap();
        let lesson = store.get_lesson(id).await.unwrap();
        store.save_lesson(&LessonRecord { active: false, ..lesson }).await.unwrap();

        let lesson = store.get_lesson(id).await.unwrap();
        assert!(!lesson.active);
        assert_eq!(lesson.version, 1);
    }

    #[tokio::test]
    async fn test_commit_outcome_writes_all_parts() {
        let (_dir, store) = open().await;
        let learner_id = store.insert_learner(&LearnerRecord::draft("ana")).await.unwrap();
        let lesson_id = store.insert_lesson(&LessonRecord::draft("tenses")).await.unwrap();

        let commit = commit_for(
            store.get_learner(learner_id).await.unwrap(),
            store.get_lesson(lesson_id).await.unwrap(),
        );
        store.commit_outcome(&commit).await.unwrap();

        let learner = store.get_learner(learner_id).await.unwrap();
        assert_eq!(learner.rating, Some(1484));
        assert_eq!(learner.grammar_proficiency, Some(0.1));
        assert_eq!(learner.version, 1);

        let lesson = store.get_lesson(lesson_id).await.unwrap();
        assert_eq!(lesson.difficulty_rating, Some(1516));
        assert_eq!(lesson.version, 1);

        let history = store.attempt_history(learner_id, 5).await.unwrap();
        assert_eq!(history.len(), 1);
        assert!(!history[0].passed);
        assert_eq!(history[0].lesson_rating_after, 1516);
    }

    #[tokio::test]
    async fn test_stale_lesson_version_rolls_back_learner_write() {
        let (_dir, store) = open().await;
        let learner_id = store.insert_learner(&LearnerRecord::draft("ana")).await.unwrap();
        let lesson_id = store.insert_lesson(&LessonRecord::draft("tenses")).await.unwrap();

        let learner = store.get_learner(learner_id).await.unwrap();
        let lesson = store.get_lesson(lesson_id).await.unwrap();
        store.save_lesson(&LessonRecord { difficulty_rating: Some(1700), ..lesson.clone() }).await.unwrap();

        let err = store.commit_outcome(&commit_for(learner, lesson)).await.unwrap_err();
        assert!(matches!(err, EngineError::Conflict { kind: EntityKind::Lesson, .. }));

        // The learner update ran first inside the transaction and must be gone
        let learner = store.get_learner(learner_id).await.unwrap();
        assert_eq!(learner.rating, None);
        assert_eq!(learner.version, 0);
        assert!(store.attempt_history(learner_id, 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_commit_for_deleted_learner_is_not_found() {
        let (_dir, store) = open().await;
        let lesson_id = store.insert_lesson(&LessonRecord::draft("tenses")).await.unwrap();
        let ghost = LearnerRecord { id: 77, ..LearnerRecord::draft("ghost") };

        let err = store
            .commit_outcome(&commit_for(ghost, store.get_lesson(lesson_id).await.unwrap()))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound { kind: EntityKind::Learner, id: 77 }));
    }

    #[tokio::test]
    async fn test_completions_are_idempotent() {
        let (_dir, store) = open().await;
        let learner_id = store.insert_learner(&LearnerRecord::draft("ana")).await.unwrap();
        let lesson_id = store.insert_lesson(&LessonRecord::draft("tenses")).await.unwrap();

        store.mark_completed(learner_id, lesson_id).await.unwrap();
        store.mark_completed(learner_id, lesson_id).await.unwrap();

        let done = store.completed_lesson_ids(learner_id).await.unwrap();
        assert_eq!(done, HashSet::from([lesson_id]));
        assert!(matches!(
            store.mark_completed(learner_id, 500).await,
            Err(EngineError::NotFound { kind: EntityKind::Lesson, .. })
        ));
    }

    #[tokio::test]
    async fn test_reopen_preserves_data() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("test.db");
        let id = {
            let store = SqliteStore::new(&path).await.unwrap();
            store.insert_learner(&LearnerRecord { rating: Some(1320), ..LearnerRecord::draft("bo") }).await.unwrap()
        };
        let store = SqliteStore::new(&path).await.unwrap();
        assert_eq!(store.get_learner(id).await.unwrap().rating, Some(1320));
    }

    #[tokio::test]
    async fn test_corrupt_timestamp_is_an_error_not_now() {
        let (_dir, store) = open().await;
        let learner = store.insert_learner(&LearnerRecord::draft("cy")).await.unwrap();
        let lesson = store.insert_lesson(&LessonRecord::draft("l")).await.unwrap();
        {
            let conn = store.conn.lock().await;
            conn.execute(
                r#"INSERT INTO attempts
                   (learner_id, lesson_id, passed, learner_rating_before, learner_rating_after,
                    lesson_rating_before, lesson_rating_after, recorded_at)
                   VALUES (?1, ?2, 1, 1500, 1516, 1500, 1484, 'yesterday')"#,
                params![learner, lesson],
            )
            .unwrap();
        }

        let err = store.attempt_history(learner, 10).await.unwrap_err();
        assert!(matches!(err, EngineError::Persistence { .. }));
    }
}
