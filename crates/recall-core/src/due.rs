//! Due-set calculation.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::card::Card;

/// A card whose schedule could not be read. It is treated as not due.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataIntegrityWarning {
  pub card_id: Uuid,
  pub reason:  String,
}

/// The due subset of a collection, in source order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DueSet {
  pub cards:    Vec<Card>,
  pub warnings: Vec<DataIntegrityWarning>,
}

impl DueSet {
  pub fn ids(&self) -> Vec<Uuid> { self.cards.iter().map(|c| c.card_id).collect() }
}

/// Every card with `next_review_at <= now`, preserving the input order.
pub fn due_cards<'a>(
  cards: impl IntoIterator<Item = &'a Card>,
  now: DateTime<Utc>,
) -> DueSet {
  let mut set = DueSet::default();
  for card in cards {
    match card.next_review_at {
      Some(at) if at <= now => set.cards.push(card.clone()),
      Some(_) => {}
      None => {
        tracing::warn!(card_id = %card.card_id, "card has no readable next-review time; skipping");
        set.warnings.push(DataIntegrityWarning {
          card_id: card.card_id,
          reason:  "missing or malformed next_review_at".to_owned(),
        });
      }
    }
  }
  set
}

#[cfg(test)]
mod tests {
  use chrono::{Duration, TimeZone};

  use super::*;
  use crate::card::CardContent;

  fn card_due_at(at: Option<DateTime<Utc>>) -> Card {
    let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let mut card = Card::new(Uuid::new_v4(), CardContent::new("q", "a"), created);
    card.next_review_at = at;
    card
  }

  #[test]
  fn returns_exactly_cards_at_or_before_now() {
    let now = Utc.with_ymd_and_hms(2024, 2, 1, 12, 0, 0).unwrap();
    let cards = vec![
      card_due_at(Some(now - Duration::days(2))),
      card_due_at(Some(now + Duration::seconds(1))),
      card_due_at(Some(now)),
      card_due_at(Some(now + Duration::days(9))),
    ];

    let due = due_cards(&cards, now);
    assert_eq!(due.ids(), vec![cards[0].card_id, cards[2].card_id]);
    assert!(due.warnings.is_empty());
  }

  #[test]
  fn empty_when_now_precedes_everything() {
    let now = Utc.with_ymd_and_hms(2024, 2, 1, 12, 0, 0).unwrap();
    let cards: Vec<_> = (1..4)
      .map(|d| card_due_at(Some(now + Duration::days(d))))
      .collect();
    assert!(due_cards(&cards, now).cards.is_empty());
  }

  #[test]
  fn malformed_schedule_is_not_due_and_warns() {
    let now = Utc.with_ymd_and_hms(2024, 2, 1, 12, 0, 0).unwrap();
    let broken = card_due_at(None);
    let ok = card_due_at(Some(now - Duration::hours(1)));
    let cards = vec![broken.clone(), ok.clone()];

    let due = due_cards(&cards, now);
    assert_eq!(due.ids(), vec![ok.card_id]);
    assert_eq!(due.warnings.len(), 1);
    assert_eq!(due.warnings[0].card_id, broken.card_id);
  }

  #[test]
  fn order_is_stable_for_ties() {
    let now = Utc.with_ymd_and_hms(2024, 2, 1, 12, 0, 0).unwrap();
    let at = Some(now - Duration::days(1));
    let cards: Vec<_> = (0..5).map(|_| card_due_at(at)).collect();
    let first = due_cards(&cards, now).ids();
    let second = due_cards(&cards, now).ids();
    assert_eq!(first, cards.iter().map(|c| c.card_id).collect::<Vec<_>>());
    assert_eq!(first, second);
  }
}
