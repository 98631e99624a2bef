//! A question/answer pair together with its review schedule.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  ValidationError,
  calendar::{end_of_day, lenient_timestamp, utc_date},
};

/// User-editable text of a card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardContent {
  pub question: String,
  pub answer:   String,
}

impl CardContent {
  pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
    Self { question: question.into(), answer: answer.into() }
  }

  /// Reject content no backend should accept.
  pub fn validate(&self) -> Result<(), ValidationError> {
    if self.question.trim().is_empty() {
      return Err(ValidationError::EmptyQuestion);
    }
    Ok(())
  }
}

/// A flashcard and its schedule state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
  pub card_id:        Uuid,
  pub question:       String,
  pub answer:         String,
  /// Number of review outcomes applied since the last reset.
  #[serde(default)]
  pub review_count:   u32,
  /// When the card becomes due. Only `None` when a storage or transport
  /// boundary handed us a missing or malformed timestamp.
  #[serde(default, deserialize_with = "lenient_timestamp")]
  pub next_review_at: Option<DateTime<Utc>>,
  pub created_at:     DateTime<Utc>,
  pub updated_at:     DateTime<Utc>,
}

impl Card {
  /// A freshly created card: never reviewed, due at the end of `now`'s day.
  pub fn new(card_id: Uuid, content: CardContent, now: DateTime<Utc>) -> Self {
    Self {
      card_id,
      question: content.question,
      answer: content.answer,
      review_count: 0,
      next_review_at: Some(end_of_day(utc_date(now))),
      created_at: now,
      updated_at: now,
    }
  }

  /// A local stand-in with a client-issued id, used until the backend assigns
  /// the durable one.
  pub fn placeholder(content: CardContent, now: DateTime<Utc>) -> Self {
    Self::new(Uuid::new_v4(), content, now)
  }

  pub fn content(&self) -> CardContent {
    CardContent { question: self.question.clone(), answer: self.answer.clone() }
  }

  /// Copy of this card with new text; the schedule is untouched.
  pub fn with_content(&self, content: CardContent, now: DateTime<Utc>) -> Self {
    Self {
      question: content.question,
      answer: content.answer,
      updated_at: now,
      ..self.clone()
    }
  }

  pub fn is_due(&self, now: DateTime<Utc>) -> bool {
    self.next_review_at.is_some_and(|at| at <= now)
  }
}

#[cfg(test)]
mod tests {
  use chrono::{NaiveDate, TimeZone};

  use super::*;

  #[test]
  fn new_card_is_due_end_of_today() {
    let now = Utc.with_ymd_and_hms(2024, 3, 10, 9, 15, 0).unwrap();
    let card = Card::new(Uuid::new_v4(), CardContent::new("q", "a"), now);
    assert_eq!(card.review_count, 0);
    let due = card.next_review_at.unwrap();
    assert_eq!(due.date_naive(), NaiveDate::from_ymd_opt(2024, 3, 10).unwrap());
    assert!(!card.is_due(now));
    assert!(card.is_due(due));
  }

  #[test]
  fn malformed_next_review_deserialises_as_none() {
    let json = serde_json::json!({
      "card_id": Uuid::new_v4(),
      "question": "q",
      "answer": "a",
      "review_count": 2,
      "next_review_at": "yesterday-ish",
      "created_at": "2024-01-01T00:00:00Z",
      "updated_at": "2024-01-01T00:00:00Z",
    });
    let card: Card = serde_json::from_value(json).unwrap();
    assert!(card.next_review_at.is_none());
    assert_eq!(card.review_count, 2);
  }

  #[test]
  fn missing_next_review_deserialises_as_none() {
    let json = serde_json::json!({
      "card_id": Uuid::new_v4(),
      "question": "q",
      "answer": "a",
      "created_at": "2024-01-01T00:00:00Z",
      "updated_at": "2024-01-01T00:00:00Z",
    });
    let card: Card = serde_json::from_value(json).unwrap();
    assert!(card.next_review_at.is_none());
    assert_eq!(card.review_count, 0);
  }

  #[test]
  fn blank_question_is_rejected() {
    assert_eq!(
      CardContent::new("  ", "a").validate(),
      Err(ValidationError::EmptyQuestion)
    );
  }
}
