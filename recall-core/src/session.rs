//! Review session controller.
//!
//! A [`ReviewSession`] walks a fixed, oldest-due-first batch of cards. Each
//! card is shown question-first, revealed, then rated; the rating is run
//! through [`schedule`](crate::schedule) and written back to the store
//! before the session moves on. Cards are never requeued within a session,
//! not even after `again`: they come back through the next due query.

use crate::{
    Calendar, Card, CardId, Clock, CoreError, Rating, Repository, ScheduleOutcome, SessionStats,
    SubjectId, SystemClock,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Current card shows its question only.
    AwaitingReveal,
    /// Current card shows question and answer.
    AwaitingRating,
    Completed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SessionState::AwaitingReveal => "awaiting reveal",
            SessionState::AwaitingRating => "awaiting rating",
            SessionState::Completed => "completed",
        })
    }
}

/// What to do when the store rejects a schedule write.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistencePolicy {
    /// Log the failure, count the rating and move on. The write is lost.
    #[default]
    BestEffort,
    /// Return the failure and stay on the same card so the rating can be retried.
    Strict,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub persistence: PersistencePolicy,
    #[serde(default)]
    pub calendar: Calendar,
    /// Upper bound on the number of cards taken into the queue.
    #[serde(default)]
    pub max_cards: Option<usize>,
}

/// Result of one accepted rating.
#[derive(Clone, Debug, PartialEq)]
pub struct RateOutcome {
    pub card_id: CardId,
    pub rating: Rating,
    pub schedule: ScheduleOutcome,
    /// False only under [`PersistencePolicy::BestEffort`] when the write failed.
    pub persisted: bool,
    /// Final tally, present exactly when this rating finished the session.
    pub summary: Option<SessionStats>,
}

pub struct ReviewSession<C: Clock = SystemClock> {
    store: Arc<dyn Repository>,
    clock: C,
    config: SessionConfig,
    queue: Vec<Card>,
    cursor: usize,
    revealed: bool,
    stats: SessionStats,
}

impl<C: Clock> ReviewSession<C> {
    /// Builds a session over `cards`, which the caller has already ordered.
    pub fn new(
        mut cards: Vec<Card>,
        store: Arc<dyn Repository>,
        clock: C,
        config: SessionConfig,
    ) -> Self {
        if let Some(max) = config.max_cards {
            cards.truncate(max);
        }
        info!(cards = cards.len(), ?config, "review session created");
        Self {
            store,
            clock,
            config,
            queue: cards,
            cursor: 0,
            revealed: false,
            stats: SessionStats::default(),
        }
    }

    /// Snapshots the cards due now (optionally for one subject) and builds a session.
    pub async fn start(
        store: Arc<dyn Repository>,
        clock: C,
        subject_id: Option<SubjectId>,
        config: SessionConfig,
    ) -> Result<Self, CoreError> {
        let now = clock.now();
        let due = store.fetch_due_cards(subject_id, now).await?;
        debug!(?subject_id, %now, due = due.len(), "fetched due cards");
        Ok(Self::new(due, store, clock, config))
    }

    pub fn state(&self) -> SessionState {
        if self.cursor >= self.queue.len() {
            SessionState::Completed
        } else if self.revealed {
            SessionState::AwaitingRating
        } else {
            SessionState::AwaitingReveal
        }
    }

    pub fn current_card(&self) -> Option<&Card> {
        self.queue.get(self.cursor)
    }

    pub fn is_revealed(&self) -> bool {
        self.revealed && self.current_card().is_some()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// 1-based position of the current card, `None` once completed.
    pub fn position(&self) -> Option<usize> {
        self.current_card().map(|_| self.cursor + 1)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.queue.len().saturating_sub(self.cursor)
    }

    /// Shows the answer. Revealing an already revealed card does nothing.
    pub fn reveal(&mut self) -> Result<(), CoreError> {
        match self.state() {
            SessionState::AwaitingReveal => {
                self.revealed = true;
                debug!(position = self.cursor + 1, "card revealed");
                Ok(())
            }
            SessionState::AwaitingRating => Ok(()),
            state @ SessionState::Completed => Err(CoreError::IllegalTransition {
                op: "reveal",
                state,
            }),
        }
    }

    /// Schedules the current card, persists it, and advances.
    ///
    /// Nothing in the session changes until the store write has resolved,
    /// so a rejected call (or a dropped future) leaves it as it was.
    pub async fn rate(&mut self, rating: Rating) -> Result<RateOutcome, CoreError> {
        let state = self.state();
        if state != SessionState::AwaitingRating {
            return Err(CoreError::IllegalTransition { op: "rate", state });
        }
        let card = &self.queue[self.cursor];
        let card_id = card.id;
        let now = self.clock.now();
        let schedule = self
            .config
            .calendar
            .schedule(card.interval, card.ease_factor, rating, now);

        let persisted = match self.store.update_card_schedule(card_id, &schedule).await {
            Ok(()) => true,
            Err(err) => match self.config.persistence {
                PersistencePolicy::BestEffort => {
                    warn!(%card_id, %rating, error = %err, "schedule write failed; continuing");
                    false
                }
                PersistencePolicy::Strict => {
                    warn!(%card_id, %rating, error = %err, "schedule write failed; session held");
                    return Err(CoreError::Persistence {
                        card_id,
                        reason: err.to_string(),
                    });
                }
            },
        };

        self.stats.record(rating);
        self.cursor += 1;
        self.revealed = false;
        debug!(
            %card_id,
            %rating,
            interval = schedule.interval,
            ease_factor = schedule.ease_factor,
            next_review_at = %schedule.next_review_at,
            "card rated"
        );

        let summary = if self.state() == SessionState::Completed {
            info!(
                reviewed = self.stats.reviewed,
                correct = self.stats.correct,
                "review session completed"
            );
            Some(self.stats)
        } else {
            None
        };

        Ok(RateOutcome {
            card_id,
            rating,
            schedule,
            persisted,
            summary,
        })
    }
}
