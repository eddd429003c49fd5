use chrono::{DateTime, Utc};
use recall_core::{Card, RateOutcome, ReviewSession, SessionState, SessionStats, Subject};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Serialize)]
pub struct SubjectOut {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl From<Subject> for SubjectOut {
    fn from(s: Subject) -> Self {
        Self { id: s.id, name: s.name, created_at: s.created_at }
    }
}

#[derive(Serialize)]
pub struct CardOut {
    pub id: Uuid,
    pub subject_id: Uuid,
    pub front: String,
    pub back: String,
    pub interval: u32,
    pub ease_factor: f64,
    pub next_review_at: DateTime<Utc>,
}

impl From<Card> for CardOut {
    fn from(c: Card) -> Self {
        Self {
            id: c.id,
            subject_id: c.subject_id,
            front: c.front,
            back: c.back,
            interval: c.interval,
            ease_factor: c.ease_factor,
            next_review_at: c.next_review_at,
        }
    }
}

#[derive(Deserialize, Default)]
pub struct SessionIn {
    pub subject: Option<String>,
    pub max: Option<usize>,
    pub strict: Option<bool>,
}

#[derive(Deserialize)]
pub struct RateIn {
    pub rating: String,
}

/// The answer is withheld until the card is revealed.
#[derive(Serialize, Debug, PartialEq)]
pub struct SessionCardOut {
    pub id: Uuid,
    pub front: String,
    pub back: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct SessionOut {
    pub id: Uuid,
    pub state: SessionState,
    pub position: Option<usize>,
    pub total: usize,
    pub remaining: usize,
    pub stats: SessionStats,
    pub card: Option<SessionCardOut>,
}

impl SessionOut {
    pub fn from_session(id: Uuid, s: &ReviewSession) -> Self {
        Self {
            id,
            state: s.state(),
            position: s.position(),
            total: s.len(),
            remaining: s.remaining(),
            stats: s.stats(),
            card: s.current_card().map(|c| SessionCardOut {
                id: c.id,
                front: c.front.clone(),
                back: s.is_revealed().then(|| c.back.clone()),
            }),
        }
    }
}

#[derive(Serialize, Debug)]
pub struct RateOut {
    pub card_id: Uuid,
    pub rating: recall_core::Rating,
    pub interval: u32,
    pub ease_factor: f64,
    pub next_review_at: DateTime<Utc>,
    pub persisted: bool,
    pub summary: Option<SessionStats>,
    pub session: SessionOut,
}

impl RateOut {
    pub fn new(out: RateOutcome, session: SessionOut) -> Self {
        Self {
            card_id: out.card_id,
            rating: out.rating,
            interval: out.schedule.interval,
            ease_factor: out.schedule.ease_factor,
            next_review_at: out.schedule.next_review_at,
            persisted: out.persisted,
            summary: out.summary,
            session,
        }
    }
}
