use crate::{CardId, SessionState};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("not found: {0}")]
    NotFound(&'static str),
    #[error("invalid input: {0}")]
    Invalid(&'static str),
    #[error("conflict: {0}")]
    Conflict(&'static str),
    #[error("storage error: {0}")]
    Storage(&'static str),
    #[error("invalid rating: {0:?} (expected again, hard, good or easy)")]
    InvalidRating(String),
    #[error("cannot {op} while session is {state}")]
    IllegalTransition {
        op: &'static str,
        state: SessionState,
    },
    #[error("failed to persist schedule for card {card_id}: {reason}")]
    Persistence { card_id: CardId, reason: String },
}
