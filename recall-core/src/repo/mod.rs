use crate::{Card, CardId, CoreError, ScheduleOutcome, Subject, SubjectId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub mod memory;

pub use memory::MemoryRepo;

#[async_trait]
pub trait Repository: Send + Sync {
    // Subjects
    async fn create_subject(&self, name: &str) -> Result<Subject, CoreError>;
    async fn get_subject(&self, id: SubjectId) -> Result<Subject, CoreError>;
    async fn list_subjects(&self) -> Result<Vec<Subject>, CoreError>;
    async fn delete_subject(&self, id: SubjectId) -> Result<(), CoreError>;

    // Cards
    async fn add_card(&self, subject_id: SubjectId, front: &str, back: &str)
        -> Result<Card, CoreError>;
    /// Inserts a card as-is, schedule included.
    async fn import_card(&self, card: &Card) -> Result<(), CoreError>;
    async fn get_card(&self, id: CardId) -> Result<Card, CoreError>;
    async fn list_cards(&self, subject_id: Option<SubjectId>) -> Result<Vec<Card>, CoreError>;
    async fn update_card_content(&self, id: CardId, front: &str, back: &str)
        -> Result<Card, CoreError>;
    async fn delete_card(&self, id: CardId) -> Result<(), CoreError>;

    // Scheduling
    /// Cards with `next_review_at <= now`, oldest-due first.
    async fn fetch_due_cards(
        &self,
        subject_id: Option<SubjectId>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Card>, CoreError>;
    async fn update_card_schedule(
        &self,
        id: CardId,
        schedule: &ScheduleOutcome,
    ) -> Result<(), CoreError>;
}
