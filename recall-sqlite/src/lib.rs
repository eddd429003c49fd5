use chrono::{DateTime, SecondsFormat, Utc};
use recall_core::{
    repo::Repository, Card, CardId, CoreError, ScheduleOutcome, Subject, SubjectId,
};
use sqlx::{sqlite::SqlitePoolOptions, Row, SqlitePool};
use std::path::Path;
use tracing::debug;

const CARD_COLUMNS: &str =
    "id,subject_id,front,back,interval,ease_factor,next_review_at,created_at";

pub struct SqliteRepo {
    pool: SqlitePool,
}

impl SqliteRepo {
    pub async fn open_file(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let url = format!("sqlite://{}?mode=rwc", path.as_ref().to_string_lossy());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await
            .map_err(|_| CoreError::Storage("sqlite connect"))?;
        let repo = Self { pool };
        repo.ensure_schema().await?;
        debug!(path = %path.as_ref().display(), "sqlite store opened");
        Ok(repo)
    }

    /// Every pooled connection to `:memory:` is its own database, so the
    /// pool is pinned to a single connection.
    pub async fn open_memory() -> Result<Self, CoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|_| CoreError::Storage("sqlite connect"))?;
        let repo = Self { pool };
        repo.ensure_schema().await?;
        Ok(repo)
    }

    async fn ensure_schema(&self) -> Result<(), CoreError> {
        // next_review_at is unix microseconds so the due query compares numerically.
        const STMT: &str = r#"
        PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS subjects (
          id          TEXT PRIMARY KEY,
          name        TEXT NOT NULL UNIQUE,
          created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS cards (
          id              TEXT PRIMARY KEY,
          subject_id      TEXT NOT NULL,
          front           TEXT NOT NULL,
          back            TEXT NOT NULL,
          interval        INTEGER NOT NULL DEFAULT 0,
          ease_factor     REAL    NOT NULL DEFAULT 2.5,
          next_review_at  INTEGER NOT NULL,
          created_at      TEXT NOT NULL,
          FOREIGN KEY(subject_id) REFERENCES subjects(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_cards_due ON cards (next_review_at);
        CREATE INDEX IF NOT EXISTS idx_cards_subject_due ON cards (subject_id, next_review_at);
        "#;

        for chunk in STMT.split(';') {
            let sql = chunk.trim();
            if sql.is_empty() {
                continue;
            }
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|_| CoreError::Storage("sqlite schema"))?;
        }
        Ok(())
    }

    async fn subject_exists(&self, id: SubjectId) -> Result<bool, CoreError> {
        Ok(sqlx::query("SELECT 1 FROM subjects WHERE id=? LIMIT 1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|_| CoreError::Storage("read subject"))?
            .is_some())
    }

    async fn insert_card(&self, card: &Card) -> Result<(), CoreError> {
        sqlx::query(&format!(
            "INSERT INTO cards ({CARD_COLUMNS}) VALUES (?,?,?,?,?,?,?,?)"
        ))
        .bind(card.id.to_string())
        .bind(card.subject_id.to_string())
        .bind(&card.front)
        .bind(&card.back)
        .bind(card.interval as i64)
        .bind(card.ease_factor)
        .bind(card.next_review_at.timestamp_micros())
        .bind(dt_to_str(card.created_at))
        .execute(&self.pool)
        .await
        .map_err(|_| CoreError::Storage("insert card"))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Repository for SqliteRepo {
    // ===== Subjects =====
    async fn create_subject(&self, name: &str) -> Result<Subject, CoreError> {
        let exists = sqlx::query("SELECT 1 FROM subjects WHERE lower(name)=lower(?) LIMIT 1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|_| CoreError::Storage("read subject"))?
            .is_some();
        if exists {
            return Err(CoreError::Conflict("subject name already exists"));
        }

        let subject = Subject::new(name);
        sqlx::query("INSERT INTO subjects (id,name,created_at) VALUES (?,?,?)")
            .bind(subject.id.to_string())
            .bind(&subject.name)
            .bind(dt_to_str(subject.created_at))
            .execute(&self.pool)
            .await
            .map_err(|_| CoreError::Storage("insert subject"))?;
        Ok(subject)
    }

    async fn get_subject(&self, id: SubjectId) -> Result<Subject, CoreError> {
        let row = sqlx::query("SELECT id,name,created_at FROM subjects WHERE id=?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|_| CoreError::Storage("read subject"))?;
        let row = row.ok_or(CoreError::NotFound("subject"))?;
        row_into_subject(row)
    }

    async fn list_subjects(&self) -> Result<Vec<Subject>, CoreError> {
        let rows = sqlx::query("SELECT id,name,created_at FROM subjects ORDER BY created_at ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(|_| CoreError::Storage("list subjects"))?;
        rows.into_iter().map(row_into_subject).collect()
    }

    async fn delete_subject(&self, id: SubjectId) -> Result<(), CoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|_| CoreError::Storage("tx"))?;

        // Manual cascade (robust even if PRAGMA foreign_keys is off)
        sqlx::query("DELETE FROM cards WHERE subject_id=?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|_| CoreError::Storage("del cards"))?;

        let res = sqlx::query("DELETE FROM subjects WHERE id=?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|_| CoreError::Storage("del subject"))?;
        if res.rows_affected() == 0 {
            tx.rollback().await.ok();
            return Err(CoreError::NotFound("subject"));
        }

        tx.commit()
            .await
            .map_err(|_| CoreError::Storage("tx commit"))
    }

    // ===== Cards =====
    async fn add_card(
        &self,
        subject_id: SubjectId,
        front: &str,
        back: &str,
    ) -> Result<Card, CoreError> {
        if !self.subject_exists(subject_id).await? {
            return Err(CoreError::NotFound("subject"));
        }
        let card = Card::new(subject_id, front, back);
        self.insert_card(&card).await?;
        Ok(card)
    }

    async fn import_card(&self, card: &Card) -> Result<(), CoreError> {
        if !self.subject_exists(card.subject_id).await? {
            return Err(CoreError::NotFound("subject"));
        }
        if self.get_card(card.id).await.is_ok() {
            return Err(CoreError::Conflict("card already exists"));
        }
        self.insert_card(card).await
    }

    async fn get_card(&self, id: CardId) -> Result<Card, CoreError> {
        let row = sqlx::query(&format!("SELECT {CARD_COLUMNS} FROM cards WHERE id=?"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|_| CoreError::Storage("read card"))?;
        let row = row.ok_or(CoreError::NotFound("card"))?;
        row_into_card(row)
    }

    async fn list_cards(&self, subject_id: Option<SubjectId>) -> Result<Vec<Card>, CoreError> {
        let rows = if let Some(sid) = subject_id {
            sqlx::query(&format!(
                "SELECT {CARD_COLUMNS} FROM cards WHERE subject_id=? ORDER BY created_at ASC"
            ))
            .bind(sid.to_string())
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query(&format!("SELECT {CARD_COLUMNS} FROM cards ORDER BY created_at ASC"))
                .fetch_all(&self.pool)
                .await
        }
        .map_err(|_| CoreError::Storage("list cards"))?;
        rows.into_iter().map(row_into_card).collect()
    }

    async fn update_card_content(
        &self,
        id: CardId,
        front: &str,
        back: &str,
    ) -> Result<Card, CoreError> {
        let res = sqlx::query("UPDATE cards SET front=?, back=? WHERE id=?")
            .bind(front)
            .bind(back)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|_| CoreError::Storage("update card"))?;
        if res.rows_affected() == 0 {
            return Err(CoreError::NotFound("card"));
        }
        self.get_card(id).await
    }

    async fn delete_card(&self, id: CardId) -> Result<(), CoreError> {
        let res = sqlx::query("DELETE FROM cards WHERE id=?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|_| CoreError::Storage("del card"))?;
        if res.rows_affected() == 0 {
            return Err(CoreError::NotFound("card"));
        }
        Ok(())
    }

    // ===== Scheduling =====
    async fn fetch_due_cards(
        &self,
        subject_id: Option<SubjectId>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Card>, CoreError> {
        let order = "ORDER BY next_review_at ASC, created_at ASC";
        let rows = if let Some(sid) = subject_id {
            sqlx::query(&format!(
                "SELECT {CARD_COLUMNS} FROM cards WHERE subject_id=? AND next_review_at<=? {order}"
            ))
            .bind(sid.to_string())
            .bind(now.timestamp_micros())
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query(&format!(
                "SELECT {CARD_COLUMNS} FROM cards WHERE next_review_at<=? {order}"
            ))
            .bind(now.timestamp_micros())
            .fetch_all(&self.pool)
            .await
        }
        .map_err(|_| CoreError::Storage("due cards"))?;
        rows.into_iter().map(row_into_card).collect()
    }

    async fn update_card_schedule(
        &self,
        id: CardId,
        schedule: &ScheduleOutcome,
    ) -> Result<(), CoreError> {
        let res = sqlx::query(
            "UPDATE cards SET interval=?, ease_factor=?, next_review_at=? WHERE id=?",
        )
        .bind(schedule.interval as i64)
        .bind(schedule.ease_factor)
        .bind(schedule.next_review_at.timestamp_micros())
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|_| CoreError::Storage("update schedule"))?;
        if res.rows_affected() == 0 {
            return Err(CoreError::NotFound("card"));
        }
        Ok(())
    }
}

// ===== Helpers =====
fn uuid_from_str(s: String) -> Result<uuid::Uuid, CoreError> {
    uuid::Uuid::parse_str(&s).map_err(|_| CoreError::Invalid("uuid"))
}

// Fixed-width so ORDER BY on the text column is chronological.
fn dt_to_str(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn dt_from_str(s: String) -> Result<DateTime<Utc>, CoreError> {
    DateTime::parse_from_rfc3339(&s)
        .map_err(|_| CoreError::Invalid("datetime"))
        .map(|dt| dt.with_timezone(&Utc))
}

fn dt_from_micros(us: i64) -> Result<DateTime<Utc>, CoreError> {
    DateTime::from_timestamp_micros(us).ok_or(CoreError::Invalid("timestamp"))
}

fn row_into_subject(row: sqlx::sqlite::SqliteRow) -> Result<Subject, CoreError> {
    Ok(Subject {
        id: uuid_from_str(row.get::<String, _>("id"))?,
        name: row.get::<String, _>("name"),
        created_at: dt_from_str(row.get::<String, _>("created_at"))?,
    })
}

fn row_into_card(row: sqlx::sqlite::SqliteRow) -> Result<Card, CoreError> {
    let interval = u32::try_from(row.get::<i64, _>("interval"))
        .map_err(|_| CoreError::Invalid("interval"))?;
    Ok(Card {
        id: uuid_from_str(row.get::<String, _>("id"))?,
        subject_id: uuid_from_str(row.get::<String, _>("subject_id"))?,
        front: row.get::<String, _>("front"),
        back: row.get::<String, _>("back"),
        interval,
        ease_factor: row.get::<f64, _>("ease_factor"),
        next_review_at: dt_from_micros(row.get::<i64, _>("next_review_at"))?,
        created_at: dt_from_str(row.get::<String, _>("created_at"))?,
    })
}
