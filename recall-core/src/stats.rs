use crate::Rating;
use serde::{Deserialize, Serialize};

/// Running tally for one review session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub reviewed: u32,
    pub correct: u32,
}

impl SessionStats {
    pub fn record(&mut self, rating: Rating) {
        self.reviewed += 1;
        if rating.is_correct() {
            self.correct += 1;
        }
    }

    pub fn accuracy(&self) -> f32 {
        if self.reviewed == 0 {
            0.0
        } else {
            self.correct as f32 / self.reviewed as f32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_counts_everything_but_again_as_correct() {
        let mut s = SessionStats::default();
        for r in [Rating::Good, Rating::Again, Rating::Hard, Rating::Again, Rating::Easy] {
            s.record(r);
        }
        assert_eq!(s, SessionStats { reviewed: 5, correct: 3 });
        assert!((s.accuracy() - 0.6).abs() < 1e-6);
    }

    #[test]
    fn empty_accuracy_is_zero() {
        assert_eq!(SessionStats::default().accuracy(), 0.0);
    }
}
