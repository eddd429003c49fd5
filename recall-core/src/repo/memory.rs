use crate::repo::Repository;
use crate::{due_cards, Card, CardId, CoreError, ScheduleOutcome, Subject, SubjectId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Default)]
pub struct MemoryRepo {
    subjects: RwLock<HashMap<SubjectId, Subject>>,
    cards: RwLock<HashMap<CardId, Card>>,
}

impl MemoryRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for MemoryRepo {
    async fn create_subject(&self, name: &str) -> Result<Subject, CoreError> {
        let subject = Subject::new(name);
        let mut m = self.subjects.write();
        if m.values().any(|s| s.name.eq_ignore_ascii_case(name)) {
            return Err(CoreError::Conflict("subject name already exists"));
        }
        m.insert(subject.id, subject.clone());
        Ok(subject)
    }

    async fn get_subject(&self, id: SubjectId) -> Result<Subject, CoreError> {
        self.subjects
            .read()
            .get(&id)
            .cloned()
            .ok_or(CoreError::NotFound("subject"))
    }

    async fn list_subjects(&self) -> Result<Vec<Subject>, CoreError> {
        Ok(self.subjects.read().values().cloned().collect())
    }

    async fn delete_subject(&self, id: SubjectId) -> Result<(), CoreError> {
        self.subjects
            .write()
            .remove(&id)
            .ok_or(CoreError::NotFound("subject"))?;
        self.cards.write().retain(|_, c| c.subject_id != id);
        Ok(())
    }

    async fn add_card(
        &self,
        subject_id: SubjectId,
        front: &str,
        back: &str,
    ) -> Result<Card, CoreError> {
        if !self.subjects.read().contains_key(&subject_id) {
            return Err(CoreError::NotFound("subject"));
        }
        let card = Card::new(subject_id, front, back);
        self.cards.write().insert(card.id, card.clone());
        Ok(card)
    }

    async fn import_card(&self, card: &Card) -> Result<(), CoreError> {
        if !self.subjects.read().contains_key(&card.subject_id) {
            return Err(CoreError::NotFound("subject"));
        }
        let mut m = self.cards.write();
        if m.contains_key(&card.id) {
            return Err(CoreError::Conflict("card already exists"));
        }
        m.insert(card.id, card.clone());
        Ok(())
    }

    async fn get_card(&self, id: CardId) -> Result<Card, CoreError> {
        self.cards
            .read()
            .get(&id)
            .cloned()
            .ok_or(CoreError::NotFound("card"))
    }

    async fn list_cards(&self, subject_id: Option<SubjectId>) -> Result<Vec<Card>, CoreError> {
        let cards = self.cards.read();
        let mut v: Vec<Card> = cards.values().cloned().collect();
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
        let mut m = self.cards.write();
        let Some(card) = m.get_mut(&id) else {
            return Err(CoreError::NotFound("card"));
        };
        card.front = front.to_string();
        card.back = back.to_string();
        Ok(card.clone())
    }

    async fn delete_card(&self, id: CardId) -> Result<(), CoreError> {
        self.cards
            .write()
            .remove(&id)
            .ok_or(CoreError::NotFound("card"))?;
        Ok(())
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
        let mut m = self.cards.write();
        let Some(card) = m.get_mut(&id) else {
            return Err(CoreError::NotFound("card"));
        };
        card.apply_schedule(schedule);
        Ok(())
    }
}
