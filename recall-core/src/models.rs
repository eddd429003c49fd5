use crate::CoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub type SubjectId = Uuid;
pub type CardId = Uuid;

/// Lowest ease factor the scheduler will ever hand out.
pub const EASE_FLOOR: f64 = 1.3;
pub const EASE_DEFAULT: f64 = 2.5;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Rating {
    Again,
    Hard,
    Good,
    Easy,
}

impl Rating {
    pub const ALL: [Rating; 4] = [Rating::Again, Rating::Hard, Rating::Good, Rating::Easy];

    /// Everything except `Again` counts as a successful recall.
    pub fn is_correct(&self) -> bool {
        !matches!(self, Rating::Again)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Rating::Again => "again",
            Rating::Hard => "hard",
            Rating::Good => "good",
            Rating::Easy => "easy",
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rating {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1" | "a" | "again" => Ok(Rating::Again),
            "2" | "h" | "hard" => Ok(Rating::Hard),
            "3" | "g" | "good" => Ok(Rating::Good),
            "4" | "e" | "easy" => Ok(Rating::Easy),
            _ => Err(CoreError::InvalidRating(s.to_string())),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Subject {
    pub id: SubjectId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Subject {
    pub fn new(name: impl Into<String>) -> Self {
        Self::new_at(name, Utc::now())
    }

    pub fn new_at(name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            created_at: now,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Card {
    pub id: CardId,
    pub subject_id: SubjectId,
    pub front: String,
    pub back: String,

    pub interval: u32,
    pub ease_factor: f64,
    pub next_review_at: DateTime<Utc>,

    pub created_at: DateTime<Utc>,
}

impl Card {
    /// A fresh card is due immediately.
    pub fn new(subject_id: SubjectId, front: impl Into<String>, back: impl Into<String>) -> Self {
        Self::new_at(subject_id, front, back, Utc::now())
    }

    /// Like [`Card::new`], stamped with the given time instead of the wall clock.
    pub fn new_at(
        subject_id: SubjectId,
        front: impl Into<String>,
        back: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            subject_id,
            front: front.into(),
            back: back.into(),
            interval: 0,
            ease_factor: EASE_DEFAULT,
            next_review_at: now,
            created_at: now,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_review_at <= now
    }

    pub fn apply_schedule(&mut self, outcome: &crate::ScheduleOutcome) {
        self.interval = outcome.interval;
        self.ease_factor = outcome.ease_factor;
        self.next_review_at = outcome.next_review_at;
    }

    /// False for ease factors no rating could have produced.
    pub fn has_usable_ease(&self) -> bool {
        self.ease_factor.is_finite() && self.ease_factor >= EASE_FLOOR
    }

    /// Back to the new-card schedule, due at `now`.
    pub fn reset_schedule(&mut self, now: DateTime<Utc>) {
        self.interval = 0;
        self.ease_factor = EASE_DEFAULT;
        self.next_review_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn new_at_stamps_the_given_time() {
        let t = Utc.with_ymd_and_hms(2024, 9, 1, 8, 0, 0).unwrap();
        let card = Card::new_at(Uuid::new_v4(), "q", "a", t);
        assert_eq!(card.created_at, t);
        assert_eq!(card.next_review_at, t);
        assert!(card.is_due(t));
        assert!(!card.is_due(t - chrono::Duration::seconds(1)));
        assert_eq!(Subject::new_at("Logic", t).created_at, t);
    }

    #[test]
    fn reset_restores_new_card_schedule() {
        let t = Utc.with_ymd_and_hms(2024, 9, 1, 8, 0, 0).unwrap();
        let mut card = Card::new_at(Uuid::new_v4(), "q", "a", t);
        card.interval = 9;
        card.ease_factor = 0.4;
        assert!(!card.has_usable_ease());
        card.reset_schedule(t);
        assert_eq!((card.interval, card.ease_factor, card.next_review_at), (0, EASE_DEFAULT, t));
        assert!(card.has_usable_ease());
        card.ease_factor = f64::INFINITY;
        assert!(!card.has_usable_ease());
    }

    #[test]
    fn rating_parses_names_and_shortcuts() {
        assert_eq!("again".parse::<Rating>().unwrap(), Rating::Again);
        assert_eq!(" Good ".parse::<Rating>().unwrap(), Rating::Good);
        assert_eq!("2".parse::<Rating>().unwrap(), Rating::Hard);
        assert_eq!("e".parse::<Rating>().unwrap(), Rating::Easy);
    }

    #[test]
    fn rating_rejects_unknown_text() {
        for bad in ["", "medium", "5", "ok"] {
            match bad.parse::<Rating>() {
                Err(CoreError::InvalidRating(s)) => assert_eq!(s, bad),
                other => panic!("expected InvalidRating for {bad:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn only_again_is_incorrect() {
        let correct: Vec<_> = Rating::ALL.iter().filter(|r| r.is_correct()).collect();
        assert_eq!(correct, vec![&Rating::Hard, &Rating::Good, &Rating::Easy]);
    }

    #[test]
    fn new_card_is_due_at_creation() {
        let card = Card::new(Uuid::new_v4(), "q", "a");
        assert_eq!(card.interval, 0);
        assert_eq!(card.ease_factor, EASE_DEFAULT);
        assert!(card.is_due(card.created_at));
    }
}
