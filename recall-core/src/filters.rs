use crate::Card;
use chrono::{DateTime, Utc};

pub fn filter_by_text(cards: &[Card], query: &str) -> Vec<Card> {
    let q = query.trim().to_lowercase();
    if q.is_empty() {
        return cards.to_vec();
    }
    cards
        .iter()
        .filter(|c| c.front.to_lowercase().contains(&q) || c.back.to_lowercase().contains(&q))
        .cloned()
        .collect()
}

/// Oldest-due first; creation time breaks ties.
pub fn sort_by_due(cards: &mut [Card]) {
    cards.sort_by_key(|c| (c.next_review_at, c.created_at));
}

/// Cards due at or before `now`, in review order.
pub fn due_cards(cards: &[Card], now: DateTime<Utc>) -> Vec<Card> {
    let mut due: Vec<Card> = cards.iter().filter(|c| c.is_due(now)).cloned().collect();
    sort_by_due(&mut due);
    due
}
