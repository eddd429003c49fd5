use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use recall_core::{
    due_cards, repo::Repository, Card, CardId, CoreError, ScheduleOutcome, Subject, SubjectId,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tokio::task;
use tracing::{debug, warn};

pub mod paths;

const FILE_VERSION: u32 = 1;

#[derive(Clone, Serialize, Deserialize)]
struct FileImage {
    version: u32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    subjects: Vec<Subject>,
    cards: Vec<Card>,
}

#[derive(Clone)]
struct State {
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    subjects: HashMap<SubjectId, Subject>,
    cards: HashMap<CardId, Card>,
}

impl State {
    fn new_empty() -> Self {
        let now = Utc::now();
        Self {
            created_at: now,
            updated_at: now,
            subjects: HashMap::new(),
            cards: HashMap::new(),
        }
    }

    fn to_image(&self) -> FileImage {
        FileImage {
            version: FILE_VERSION,
            created_at: self.created_at,
            updated_at: self.updated_at,
            subjects: self.subjects.values().cloned().collect(),
            cards: self.cards.values().cloned().collect(),
        }
    }

    fn from_image(img: FileImage) -> Self {
        Self {
            created_at: img.created_at,
            updated_at: img.updated_at,
            subjects: img.subjects.into_iter().map(|s| (s.id, s)).collect(),
            cards: img.cards.into_iter().map(|c| (c.id, c)).collect(),
        }
    }
}

/// Whole-store JSON file. Every mutation rewrites the file atomically and
/// drops a timestamped copy into the backups directory.
pub struct JsonStore {
    path: PathBuf,
    backups_dir: PathBuf,
    max_backups: usize,
    state: RwLock<State>,
    /// Serialises commits so none is built from a stale copy.
    writer: Mutex<()>,
}

impl JsonStore {
    pub async fn open_default() -> Result<Self, CoreError> {
        let (file, backups) = paths::default_store_file();
        Self::open_with(file, backups, 10).await
    }

    pub async fn open_with(
        path: PathBuf,
        backups_dir: PathBuf,
        max_backups: usize,
    ) -> Result<Self, CoreError> {
        ensure_parent_dirs(&path)?;
        ensure_dir(&backups_dir)?;
        let max_backups = max_backups.max(1);
        let state = load_or_init(&path, &backups_dir, max_backups).await?;
        debug!(path = %path.display(), cards = state.cards.len(), "json store opened");
        Ok(Self {
            path,
            backups_dir,
            max_backups,
            state: RwLock::new(state),
            writer: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Applies `f` to a copy of the state, writes the copy, and only then
    /// swaps it in. A failed write leaves memory and disk as they were.
    async fn commit<T, F>(&self, f: F) -> Result<T, CoreError>
    where
        T: Send,
        F: FnOnce(&mut State) -> Result<T, CoreError> + Send,
    {
        let _writer = self.writer.lock().await;
        let mut next = self.state.read().clone();
        let out = f(&mut next)?;
        next.updated_at = Utc::now();

        let snapshot = next.to_image();
        let path = self.path.clone();
        let backups = self.backups_dir.clone();
        let keep = self.max_backups;
        task::spawn_blocking(move || write_with_backup(&path, &backups, keep, &snapshot))
            .await
            .map_err(|_| CoreError::Storage("io"))?
            .map_err(|e| {
                warn!(error = %e, "json store write failed");
                CoreError::Storage("io")
            })?;

        *self.state.write() = next;
        Ok(out)
    }
}

fn ensure_parent_dirs(path: &Path) -> Result<(), CoreError> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    Ok(())
}

fn ensure_dir(path: &Path) -> Result<(), CoreError> {
    fs::create_dir_all(path).map_err(|_| CoreError::Storage("io"))
}

async fn load_or_init(path: &Path, backups_dir: &Path, keep: usize) -> Result<State, CoreError> {
    if path.exists() {
        let p = path.to_path_buf();
        let img: FileImage = task::spawn_blocking(move || {
            let mut f = fs::File::open(&p)?;
            let mut buf = String::new();
            f.read_to_string(&mut buf)?;
            let v = serde_json::from_str::<FileImage>(&buf)?;
            Ok::<FileImage, std::io::Error>(v)
        })
        .await
        .map_err(|_| CoreError::Storage("io"))
        .and_then(|r| r.map_err(|_| CoreError::Storage("corrupt store file")))?;
        if img.version != FILE_VERSION {
            return Err(CoreError::Invalid("unsupported store file version"));
        }
        Ok(State::from_image(img))
    } else {
        let st = State::new_empty();
        write_with_backup(path, backups_dir, keep, &st.to_image())
            .map_err(|_| CoreError::Storage("io"))?;
        Ok(st)
    }
}

fn write_with_backup(
    path: &Path,
    backups_dir: &Path,
    max_backups: usize,
    img: &FileImage,
) -> Result<(), std::io::Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::create_dir_all(backups_dir)?;

    let json = serde_json::to_vec_pretty(img)?;

    // Backup first: if it cannot be written the store file is left alone.
    let ts = chrono::Local::now().format("%Y%m%d-%H%M%S");
    let backup_path = backups_dir.join(format!("recall-{ts}.json"));
    let mut btmp = NamedTempFile::new_in(backups_dir)?;
    btmp.write_all(&json)?;
    btmp.flush()?;
    btmp.persist(&backup_path)?;

    let mut tmp = NamedTempFile::new_in(path.parent().unwrap_or_else(|| Path::new(".")))?;
    tmp.write_all(&json)?;
    tmp.flush()?;
    tmp.persist(path)?;

    if let Err(e) = rotate_backups(backups_dir, max_backups) {
        warn!(error = %e, "backup rotation failed");
    }
    Ok(())
}

fn rotate_backups(dir: &Path, keep: usize) -> Result<(), std::io::Error> {
    let mut entries: Vec<_> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("json"))
        .collect();
    entries.sort_by_key(|e| e.metadata().and_then(|m| m.modified()).ok());
    if entries.len() > keep {
        for e in &entries[0..entries.len() - keep] {
            let _ = fs::remove_file(e.path());
        }
    }
    Ok(())
}

#[async_trait]
impl Repository for JsonStore {
    async fn create_subject(&self, name: &str) -> Result<Subject, CoreError> {
        self.commit(|s| {
            if s.subjects.values().any(|x| x.name.eq_ignore_ascii_case(name)) {
                return Err(CoreError::Conflict("subject name already exists"));
            }
            let subject = Subject::new(name);
            s.subjects.insert(subject.id, subject.clone());
            Ok(subject)
        })
        .await
    }

    async fn get_subject(&self, id: SubjectId) -> Result<Subject, CoreError> {
        let s = self.state.read();
        s.subjects.get(&id).cloned().ok_or(CoreError::NotFound("subject"))
    }

    async fn list_subjects(&self) -> Result<Vec<Subject>, CoreError> {
        let s = self.state.read();
        Ok(s.subjects.values().cloned().collect())
    }

    async fn delete_subject(&self, id: SubjectId) -> Result<(), CoreError> {
        self.commit(|s| {
            if s.subjects.remove(&id).is_none() {
                return Err(CoreError::NotFound("subject"));
            }
            s.cards.retain(|_, c| c.subject_id != id);
            Ok(())
        })
        .await
    }

    async fn add_card(
        &self,
        subject_id: SubjectId,
        front: &str,
        back: &str,
    ) -> Result<Card, CoreError> {
        self.commit(|s| {
            if !s.subjects.contains_key(&subject_id) {
                return Err(CoreError::NotFound("subject"));
            }
            let card = Card::new(subject_id, front, back);
            s.cards.insert(card.id, card.clone());
            Ok(card)
        })
        .await
    }

    async fn import_card(&self, card: &Card) -> Result<(), CoreError> {
        self.commit(|s| {
            if !s.subjects.contains_key(&card.subject_id) {
                return Err(CoreError::NotFound("subject"));
            }
            if s.cards.contains_key(&card.id) {
                return Err(CoreError::Conflict("card already exists"));
            }
            s.cards.insert(card.id, card.clone());
            Ok(())
        })
        .await
    }

    async fn get_card(&self, id: CardId) -> Result<Card, CoreError> {
        let s = self.state.read();
        s.cards.get(&id).cloned().ok_or(CoreError::NotFound("card"))
    }

    async fn list_cards(&self, subject_id: Option<SubjectId>) -> Result<Vec<Card>, CoreError> {
        let s = self.state.read();
        let mut v: Vec<Card> = s.cards.values().cloned().collect();
        if let Some(sid) = subject_id {
            v.retain(|c| c.subject_id == sid);
        }
        Ok(v)
    }

    async fn update_card_content(
        &self,
        id: CardId,
        front: &str,
        back: &str,
    ) -> Result<Card, CoreError> {
        self.commit(|s| {
            let c = s.cards.get_mut(&id).ok_or(CoreError::NotFound("card"))?;
            c.front = front.to_string();
            c.back = back.to_string();
            Ok(c.clone())
        })
        .await
    }

    async fn delete_card(&self, id: CardId) -> Result<(), CoreError> {
        self.commit(|s| {
            s.cards.remove(&id).map(|_| ()).ok_or(CoreError::NotFound("card"))
        })
        .await
    }

    async fn fetch_due_cards(
        &self,
        subject_id: Option<SubjectId>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Card>, CoreError> {
        let cards = self.list_cards(subject_id).await?;
        Ok(due_cards(&cards, now))
    }

    async fn update_card_schedule(
        &self,
        id: CardId,
        schedule: &ScheduleOutcome,
    ) -> Result<(), CoreError> {
        self.commit(|s| {
            let c = s.cards.get_mut(&id).ok_or(CoreError::NotFound("card"))?;
            c.apply_schedule(schedule);
            Ok(())
        })
        .await
    }
}
