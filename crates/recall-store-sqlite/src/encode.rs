//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings with millisecond precision.
//! UUIDs are stored as hyphenated lowercase strings.

use chrono::{DateTime, SecondsFormat, Utc};
use recall_core::{calendar::parse_timestamp, card::Card};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Search ──────────────────────────────────────────────────────────────────

/// A `LIKE` pattern matching `term` anywhere, with `\` as the escape.
pub fn like_pattern(term: &str) -> String {
  let mut out = String::with_capacity(term.len() + 2);
  out.push('%');
  for ch in term.chars() {
    if matches!(ch, '%' | '_' | '\\') {
      out.push('\\');
    }
    out.push(ch);
  }
  out.push('%');
  out
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const CARD_COLUMNS: &str =
  "card_id, question, answer, review_count, next_review_at, created_at, updated_at";

/// Raw values read directly from a `cards` row.
pub struct RawCard {
  pub card_id:        String,
  pub question:       String,
  pub answer:         String,
  pub review_count:   i64,
  pub next_review_at: Option<String>,
  pub created_at:     String,
  pub updated_at:     String,
}

impl RawCard {
  /// Map a row selected with [`CARD_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      card_id:        row.get(0)?,
      question:       row.get(1)?,
      answer:         row.get(2)?,
      review_count:   row.get(3)?,
      next_review_at: row.get(4)?,
      created_at:     row.get(5)?,
      updated_at:     row.get(6)?,
    })
  }

  /// An unreadable `next_review_at` becomes `None` so the card is skipped by
  /// due-set calculation instead of failing the whole read.
  pub fn into_card(self) -> Result<Card> {
    let card_id = decode_uuid(&self.card_id)?;
    let next_review_at = self.next_review_at.as_deref().and_then(parse_timestamp);
    if next_review_at.is_none() {
      tracing::warn!(%card_id, raw = ?self.next_review_at, "unreadable next_review_at");
    }

    Ok(Card {
      card_id,
      question: self.question,
      answer: self.answer,
      review_count: u32::try_from(self.review_count).unwrap_or(0),
      next_review_at,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

/// Column values for writing a whole card.
pub struct CardRow {
  pub card_id:        String,
  pub question:       String,
  pub answer:         String,
  pub review_count:   i64,
  pub next_review_at: Option<String>,
  pub created_at:     String,
  pub updated_at:     String,
}

impl From<&Card> for CardRow {
  fn from(card: &Card) -> Self {
    Self {
      card_id:        encode_uuid(card.card_id),
      question:       card.question.clone(),
      answer:         card.answer.clone(),
      review_count:   i64::from(card.review_count),
      next_review_at: card.next_review_at.map(encode_dt),
      created_at:     encode_dt(card.created_at),
      updated_at:     encode_dt(card.updated_at),
    }
  }
}
