use crate::{Rating, EASE_DEFAULT, EASE_FLOOR};
use chrono::{DateTime, Days, Duration, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// New schedule for a card after one rating.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScheduleOutcome {
    pub interval: u32,
    pub ease_factor: f64,
    pub next_review_at: DateTime<Utc>,
}

/// Calendar used for whole-day arithmetic when computing due times.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Calendar {
    #[default]
    Utc,
    Local,
}

impl Calendar {
    pub fn schedule(
        &self,
        interval: u32,
        ease_factor: f64,
        rating: Rating,
        now: DateTime<Utc>,
    ) -> ScheduleOutcome {
        match self {
            Calendar::Utc => schedule(interval, ease_factor, rating, now),
            Calendar::Local => schedule(interval, ease_factor, rating, now.with_timezone(&Local)),
        }
    }
}

/// Out-of-contract ease factors are pulled back into range: missing or
/// nonsensical values restart at the default, low ones sit on the floor.
fn sanitize_ease(ease_factor: f64) -> f64 {
    if ease_factor.is_finite() && ease_factor > 0.0 {
        ease_factor.max(EASE_FLOOR)
    } else {
        EASE_DEFAULT
    }
}

fn grown(interval: u32, first: u32, scaled: f64) -> u32 {
    if interval == 0 {
        first
    } else {
        // `as` saturates at u32::MAX.
        scaled.floor() as u32
    }
}

/// Applies one rating to a card's `(interval, ease_factor)`.
///
/// | rating | interval                           | ease factor          |
/// |--------|------------------------------------|----------------------|
/// | again  | 0                                  | `max(1.3, ef - 0.2)` |
/// | hard   | 1 if new, else `floor(i * 1.2)`    | `max(1.3, ef - 0.15)`|
/// | good   | 1 if new, else `floor(i * 2.5)`    | unchanged            |
/// | easy   | 4 if new, else `floor(i * ef * 1.3)` | `ef + 0.15`        |
///
/// An interval of 0 is due one minute after `now`; anything else is due
/// `interval` calendar days later in `now`'s time zone.
pub fn schedule<Tz: TimeZone>(
    interval: u32,
    ease_factor: f64,
    rating: Rating,
    now: DateTime<Tz>,
) -> ScheduleOutcome {
    let ef = sanitize_ease(ease_factor);
    let i = interval as f64;

    let (new_interval, new_ef) = match rating {
        Rating::Again => (0, (ef - 0.2).max(EASE_FLOOR)),
        Rating::Hard => (grown(interval, 1, i * 1.2), (ef - 0.15).max(EASE_FLOOR)),
        Rating::Good => (grown(interval, 1, i * 2.5), ef),
        Rating::Easy => (grown(interval, 4, i * ef * 1.3), ef + 0.15),
    };

    ScheduleOutcome {
        interval: new_interval,
        ease_factor: new_ef,
        next_review_at: next_due(now, new_interval),
    }
}

fn next_due<Tz: TimeZone>(now: DateTime<Tz>, interval: u32) -> DateTime<Utc> {
    let utc = now.with_timezone(&Utc);
    if interval == 0 {
        return utc
            .checked_add_signed(Duration::minutes(1))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
    }
    // Calendar addition fails on skipped local times and past the end of
    // the representable range; fall back to fixed days, then saturate.
    now.checked_add_days(Days::new(interval as u64))
        .map(|due| due.with_timezone(&Utc))
        .or_else(|| utc.checked_add_signed(Duration::days(interval as i64)))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 31, 22, 30, 0).unwrap()
    }

    #[test]
    fn broken_ease_restarts_at_default() {
        let out = schedule(0, f64::NAN, Rating::Good, t0());
        assert_eq!(out.ease_factor, EASE_DEFAULT);
        let out = schedule(0, 0.0, Rating::Good, t0());
        assert_eq!(out.ease_factor, EASE_DEFAULT);
    }

    #[test]
    fn low_ease_is_lifted_to_floor() {
        let out = schedule(3, 0.9, Rating::Good, t0());
        assert_eq!(out.ease_factor, EASE_FLOOR);
    }

    #[test]
    fn huge_intervals_saturate_instead_of_panicking() {
        let out = schedule(u32::MAX, 2.5, Rating::Easy, t0());
        assert_eq!(out.interval, u32::MAX);
        assert_eq!(out.next_review_at, DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn day_arithmetic_uses_the_given_offset() {
        // 22:30 UTC is already Feb 1st at +03:00; one day later is Feb 2nd local.
        let tz = FixedOffset::east_opt(3 * 3600).unwrap();
        let out = schedule(0, 2.5, Rating::Good, t0().with_timezone(&tz));
        assert_eq!(out.next_review_at, t0() + Duration::days(1));
        assert_eq!(
            out.next_review_at.with_timezone(&tz).date_naive(),
            chrono::NaiveDate::from_ymd_opt(2024, 2, 2).unwrap()
        );
    }

    #[test]
    fn utc_calendar_matches_direct_call() {
        let direct = schedule(6, 2.2, Rating::Hard, t0());
        assert_eq!(Calendar::Utc.schedule(6, 2.2, Rating::Hard, t0()), direct);
    }
}
