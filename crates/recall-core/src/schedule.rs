//! Review outcome processing.
//!
//! Both functions are pure: they return a new [`Card`] and leave persisting
//! it, and feeding the same outcome into progress tracking, to the caller.
//!
//! - Remembered: the interval is the rule for the card's *current* review
//!   count, and the count goes up by one.
//! - Forgotten: the count resets to 0 and the tier-0 interval applies.
//!
//! The resulting due time is always the end of a UTC day, so "is it due"
//! comparisons are day-granular.

use chrono::{DateTime, Utc};

use crate::{
  ValidationError, calendar::end_of_day_after, card::Card, rules::RuleTable,
};

/// Apply one review outcome to `card` at `now`.
pub fn apply_outcome(
  card: &Card,
  remembered: bool,
  rules: &RuleTable,
  now: DateTime<Utc>,
) -> Card {
  let (review_count, interval) = if remembered {
    (card.review_count.saturating_add(1), rules.interval_for(card.review_count))
  } else {
    (0, rules.interval_for(0))
  };

  Card {
    review_count,
    next_review_at: Some(end_of_day_after(now, interval)),
    updated_at: now,
    ..card.clone()
  }
}

/// Move a card's next review to `at`, bypassing the rule table.
pub fn reschedule(
  card: &Card,
  at: DateTime<Utc>,
  now: DateTime<Utc>,
) -> Result<Card, ValidationError> {
  if at < card.created_at {
    return Err(ValidationError::RescheduleBeforeCreation(card.card_id));
  }
  Ok(Card { next_review_at: Some(at), updated_at: now, ..card.clone() })
}
