//! SQLite-based sermon store.

use super::SermonStore;
use crate::analysis::{DiscussionQuestion, SermonNote};
use crate::error::{Result, SermonError};
use crate::models::{AnalysisJob, NewSermon, Sermon, SermonDetail, SermonQuestion, SermonStatus};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};
use uuid::Uuid;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS sermons (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('created', 'pending', 'complete', 'error')),
    date_given TEXT,
    summary TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sermons_status ON sermons(status);

CREATE TABLE IF NOT EXISTS analysis_jobs (
    id TEXT PRIMARY KEY,
    sermon_id TEXT NOT NULL REFERENCES sermons(id) ON DELETE CASCADE,
    audio_url TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_analysis_jobs_sermon_id ON analysis_jobs(sermon_id);

CREATE TABLE IF NOT EXISTS sermon_details (
    id TEXT PRIMARY KEY,
    sermon_id TEXT NOT NULL REFERENCES sermons(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    key_verse TEXT NOT NULL,
    relevant_verses TEXT NOT NULL,
    "order" INTEGER NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sermon_details_sermon_id ON sermon_details(sermon_id);

CREATE TABLE IF NOT EXISTS sermon_questions (
    id TEXT PRIMARY KEY,
    sermon_id TEXT NOT NULL REFERENCES sermons(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    "order" INTEGER NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sermon_questions_sermon_id ON sermon_questions(sermon_id);
"#;

const SERMON_COLUMNS: &str = "id, title, status, date_given, summary, created_at, updated_at";

/// SQLite-based sermon store.
pub struct SqliteSermonStore {
    conn: Mutex<Connection>,
}

impl SqliteSermonStore {
    /// Open (or create) the store at `path`.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::init(&conn)?;

        info!("Initialized sermon store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init(conn: &Connection) -> Result<()> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| SermonError::Store(format!("Failed to acquire lock: {}", e)))
    }

    fn sermon_from_row(row: &Row<'_>) -> rusqlite::Result<Sermon> {
        let status: String = row.get(2)?;
        let date_given: Option<String> = row.get(3)?;
        Ok(Sermon {
            id: row.get(0)?,
            title: row.get(1)?,
            status: status
                .parse()
                .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, e.into()))?,
            date_given: date_given.and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok()),
            summary: row.get(4)?,
            created_at: parse_timestamp(&row.get::<_, String>(5)?),
            updated_at: parse_timestamp(&row.get::<_, String>(6)?),
        })
    }

    fn job_from_row(row: &Row<'_>) -> rusqlite::Result<AnalysisJob> {
        Ok(AnalysisJob {
            id: row.get(0)?,
            sermon_id: row.get(1)?,
            audio_url: row.get(2)?,
            created_at: parse_timestamp(&row.get::<_, String>(3)?),
            updated_at: parse_timestamp(&row.get::<_, String>(4)?),
        })
    }
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn require(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(SermonError::InvalidInput(format!("{} is required", field)));
    }
    Ok(())
}

#[async_trait]
impl SermonStore for SqliteSermonStore {
    #[instrument(skip(self))]
    async fn jobs_for_status(&self, status: SermonStatus) -> Result<Vec<AnalysisJob>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, sermon_id, audio_url, created_at, updated_at
            FROM analysis_jobs
            WHERE sermon_id IN (SELECT id FROM sermons WHERE status = ?1)
            ORDER BY created_at, rowid
            "#,
        )?;

        let jobs = stmt
            .query_map(params![status.as_str()], Self::job_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        debug!("Found {} jobs for status {}", jobs.len(), status);
        Ok(jobs)
    }

    async fn find_sermon(&self, id: &str) -> Result<Option<Sermon>> {
        let conn = self.lock()?;
        let result = conn.query_row(
            &format!("SELECT {} FROM sermons WHERE id = ?1", SERMON_COLUMNS),
            params![id],
            Self::sermon_from_row,
        );

        match result {
            Ok(sermon) => Ok(Some(sermon)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self))]
    async fn transition_status(
        &self,
        id: &str,
        from: SermonStatus,
        to: SermonStatus,
    ) -> Result<bool> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE sermons SET status = ?3, updated_at = ?4 WHERE id = ?1 AND status = ?2",
            params![id, from.as_str(), to.as_str(), Utc::now().to_rfc3339()],
        )?;

        debug!("Transition {} -> {} for {}: {}", from, to, id, updated == 1);
        Ok(updated == 1)
    }

    #[instrument(skip(self, summary))]
    async fn set_summary(&self, id: &str, summary: &str) -> Result<()> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE sermons SET summary = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, summary, Utc::now().to_rfc3339()],
        )?;

        if updated == 0 {
            return Err(SermonError::Store(format!("Sermon {} not found", id)));
        }
        Ok(())
    }

    #[instrument(skip(self, note))]
    async fn create_detail(
        &self,
        sermon_id: &str,
        note: &SermonNote,
        order: usize,
    ) -> Result<SermonDetail> {
        require(sermon_id, "sermon_id")?;

        let detail = SermonDetail {
            id: Uuid::new_v4().to_string(),
            sermon_id: sermon_id.to_string(),
            title: note.title.clone(),
            description: note.description.clone(),
            key_verse: note.key_verse.clone(),
            relevant_verses: note.joined_verses(),
            order: order as i64,
            created_at: Utc::now(),
        };

        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO sermon_details
            (id, sermon_id, title, description, key_verse, relevant_verses, "order", created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                detail.id,
                detail.sermon_id,
                detail.title,
                detail.description,
                detail.key_verse,
                detail.relevant_verses,
                detail.order,
                detail.created_at.to_rfc3339(),
            ],
        )?;

        Ok(detail)
    }

    #[instrument(skip(self, question))]
    async fn create_question(
        &self,
        sermon_id: &str,
        question: &DiscussionQuestion,
        order: usize,
    ) -> Result<SermonQuestion> {
        require(sermon_id, "sermon_id")?;

        let record = SermonQuestion {
            id: Uuid::new_v4().to_string(),
            sermon_id: sermon_id.to_string(),
            title: question.title.clone(),
            description: question.description.clone(),
            order: order as i64,
            created_at: Utc::now(),
        };

        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO sermon_questions (id, sermon_id, title, description, "order", created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                record.id,
                record.sermon_id,
                record.title,
                record.description,
                record.order,
                record.created_at.to_rfc3339(),
            ],
        )?;

        Ok(record)
    }

    async fn details_for(&self, sermon_id: &str) -> Result<Vec<SermonDetail>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, sermon_id, title, description, key_verse, relevant_verses, "order", created_at
            FROM sermon_details
            WHERE sermon_id = ?1
            ORDER BY "order"
            "#,
        )?;

        let details = stmt
            .query_map(params![sermon_id], |row| {
                Ok(SermonDetail {
                    id: row.get(0)?,
                    sermon_id: row.get(1)?,
                    title: row.get(2)?,
                    description: row.get(3)?,
                    key_verse: row.get(4)?,
                    relevant_verses: row.get(5)?,
                    order: row.get(6)?,
                    created_at: parse_timestamp(&row.get::<_, String>(7)?),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(details)
    }

    async fn questions_for(&self, sermon_id: &str) -> Result<Vec<SermonQuestion>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, sermon_id, title, description, "order", created_at
            FROM sermon_questions
            WHERE sermon_id = ?1
            ORDER BY "order"
            "#,
        )?;

        let questions = stmt
            .query_map(params![sermon_id], |row| {
                Ok(SermonQuestion {
                    id: row.get(0)?,
                    sermon_id: row.get(1)?,
                    title: row.get(2)?,
                    description: row.get(3)?,
                    order: row.get(4)?,
                    created_at: parse_timestamp(&row.get::<_, String>(5)?),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(questions)
    }

    #[instrument(skip(self, sermon), fields(title = %sermon.title))]
    async fn create_sermon(&self, sermon: &NewSermon) -> Result<(Sermon, AnalysisJob)> {
        require(&sermon.title, "title")?;
        require(&sermon.audio_url, "audio_url")?;

        let now = Utc::now();
        let record = Sermon {
            id: Uuid::new_v4().to_string(),
            title: sermon.title.trim().to_string(),
            status: SermonStatus::Created,
            date_given: sermon.date_given,
            summary: None,
            created_at: now,
            updated_at: now,
        };
        let job = AnalysisJob {
            id: Uuid::new_v4().to_string(),
            sermon_id: record.id.clone(),
            audio_url: sermon.audio_url.trim().to_string(),
            created_at: now,
            updated_at: now,
        };

        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;
        tx.execute(
            r#"
            INSERT INTO sermons (id, title, status, date_given, summary, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, NULL, ?5, ?5)
            "#,
            params![
                record.id,
                record.title,
                record.status.as_str(),
                record.date_given.map(|d| d.format("%Y-%m-%d").to_string()),
                now.to_rfc3339(),
            ],
        )?;
        tx.execute(
            r#"
            INSERT INTO analysis_jobs (id, sermon_id, audio_url, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?4)
            "#,
            params![job.id, job.sermon_id, job.audio_url, now.to_rfc3339()],
        )?;
        tx.commit()?;

        info!("Created sermon {} with job {}", record.id, job.id);
        Ok((record, job))
    }

    async fn list_sermons(&self, status: Option<SermonStatus>) -> Result<Vec<Sermon>> {
        let conn = self.lock()?;
        let sermons = match status {
            Some(status) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM sermons WHERE status = ?1 ORDER BY created_at DESC, rowid DESC",
                    SERMON_COLUMNS
                ))?;
                let rows = stmt
                    .query_map(params![status.as_str()], Self::sermon_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM sermons ORDER BY created_at DESC, rowid DESC",
                    SERMON_COLUMNS
                ))?;
                let rows = stmt
                    .query_map([], Self::sermon_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            }
        };
        Ok(sermons)
    }

    #[instrument(skip(self))]
    async fn reset_for_reanalysis(&self, id: &str) -> Result<bool> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        let details = tx.execute("DELETE FROM sermon_details WHERE sermon_id = ?1", params![id])?;
        let questions = tx.execute("DELETE FROM sermon_questions WHERE sermon_id = ?1", params![id])?;
        let updated = tx.execute(
            "UPDATE sermons SET status = ?2, summary = NULL, updated_at = ?3 WHERE id = ?1",
            params![id, SermonStatus::Created.as_str(), Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;

        info!(
            "Reset sermon {} (removed {} details, {} questions)",
            id, details, questions
        );
        Ok(updated == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_sermon(title: &str) -> NewSermon {
        NewSermon {
            title: title.to_string(),
            date_given: NaiveDate::from_ymd_opt(2024, 6, 2),
            audio_url: format!("https://example.com/{}.mp3", title),
        }
    }

    #[tokio::test]
    async fn test_create_and_find_sermon() {
        let store = SqliteSermonStore::in_memory().unwrap();
        let (sermon, job) = store.create_sermon(&new_sermon("grace")).await.unwrap();

        assert_eq!(job.sermon_id, sermon.id);
        let found = store.find_sermon(&sermon.id).await.unwrap().unwrap();
        assert_eq!(found.title, "grace");
        assert_eq!(found.status, SermonStatus::Created);
        assert_eq!(found.date_given, NaiveDate::from_ymd_opt(2024, 6, 2));
        assert!(found.summary.is_none());

        assert!(store.find_sermon("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_sermon_requires_audio_url() {
        let store = SqliteSermonStore::in_memory().unwrap();
        let mut sermon = new_sermon("x");
        sermon.audio_url = " ".to_string();
        assert!(matches!(
            store.create_sermon(&sermon).await,
            Err(SermonError::InvalidInput(_))
        ));
        assert!(store.list_sermons(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_jobs_for_status_filters_by_sermon_status() {
        let store = SqliteSermonStore::in_memory().unwrap();
        let (a, _) = store.create_sermon(&new_sermon("a")).await.unwrap();
        let (b, job_b) = store.create_sermon(&new_sermon("b")).await.unwrap();

        assert!(store
            .transition_status(&a.id, SermonStatus::Created, SermonStatus::Complete)
            .await
            .unwrap());

        let jobs = store.jobs_for_status(SermonStatus::Created).await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, job_b.id);
        assert_eq!(jobs[0].sermon_id, b.id);
    }

    #[tokio::test]
    async fn test_transition_is_conditional() {
        let store = SqliteSermonStore::in_memory().unwrap();
        let (sermon, _) = store.create_sermon(&new_sermon("a")).await.unwrap();

        assert!(store
            .transition_status(&sermon.id, SermonStatus::Created, SermonStatus::Pending)
            .await
            .unwrap());
        // A second claim loses.
        assert!(!store
            .transition_status(&sermon.id, SermonStatus::Created, SermonStatus::Pending)
            .await
            .unwrap());
        assert!(!store
            .transition_status("missing", SermonStatus::Created, SermonStatus::Pending)
            .await
            .unwrap());

        let found = store.find_sermon(&sermon.id).await.unwrap().unwrap();
        assert_eq!(found.status, SermonStatus::Pending);
    }

    #[tokio::test]
    async fn test_details_and_questions_keep_order() {
        let store = SqliteSermonStore::in_memory().unwrap();
        let (sermon, _) = store.create_sermon(&new_sermon("a")).await.unwrap();

        for (i, title) in ["first", "second", "third"].iter().enumerate() {
            let note = SermonNote {
                title: title.to_string(),
                relevant_verses: vec!["John 1:1".to_string(), "John 1:14".to_string()],
                ..Default::default()
            };
            store.create_detail(&sermon.id, &note, i).await.unwrap();
        }
        let question = DiscussionQuestion {
            title: "Why?".to_string(),
            description: String::new(),
        };
        store.create_question(&sermon.id, &question, 0).await.unwrap();

        let details = store.details_for(&sermon.id).await.unwrap();
        let titles: Vec<_> = details.iter().map(|d| d.title.as_str()).collect();
        assert_eq!(titles, vec!["first", "second", "third"]);
        assert_eq!(details.iter().map(|d| d.order).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(details[0].relevant_verses, "John 1:1|John 1:14");

        let questions = store.questions_for(&sermon.id).await.unwrap();
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].order, 0);
    }

    #[tokio::test]
    async fn test_detail_for_unknown_sermon_fails() {
        let store = SqliteSermonStore::in_memory().unwrap();
        let err = store
            .create_detail("missing", &SermonNote::default(), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, SermonError::Database(_)));
    }

    #[tokio::test]
    async fn test_reset_for_reanalysis() {
        let store = SqliteSermonStore::in_memory().unwrap();
        let (sermon, _) = store.create_sermon(&new_sermon("a")).await.unwrap();
        store
            .transition_status(&sermon.id, SermonStatus::Created, SermonStatus::Pending)
            .await
            .unwrap();
        store.set_summary(&sermon.id, "partial").await.unwrap();
        store
            .create_detail(&sermon.id, &SermonNote::default(), 0)
            .await
            .unwrap();
        store
            .transition_status(&sermon.id, SermonStatus::Pending, SermonStatus::Error)
            .await
            .unwrap();

        assert!(store.reset_for_reanalysis(&sermon.id).await.unwrap());

        let found = store.find_sermon(&sermon.id).await.unwrap().unwrap();
        assert_eq!(found.status, SermonStatus::Created);
        assert!(found.summary.is_none());
        assert!(store.details_for(&sermon.id).await.unwrap().is_empty());
        assert!(!store.reset_for_reanalysis("missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_sermons_by_status() {
        let store = SqliteSermonStore::in_memory().unwrap();
        let (a, _) = store.create_sermon(&new_sermon("a")).await.unwrap();
        store.create_sermon(&new_sermon("b")).await.unwrap();
        store
            .transition_status(&a.id, SermonStatus::Created, SermonStatus::Error)
            .await
            .unwrap();

        assert_eq!(store.list_sermons(None).await.unwrap().len(), 2);
        let errored = store.list_sermons(Some(SermonStatus::Error)).await.unwrap();
        assert_eq!(errored.len(), 1);
        assert_eq!(errored[0].id, a.id);
    }
}
