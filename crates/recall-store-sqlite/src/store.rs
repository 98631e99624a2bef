//! [`SqliteStore`]: the SQLite implementation of the Recall storage traits.

use std::{
  path::Path,
  sync::{Arc, Mutex},
};

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use recall_core::{
  card::{Card, CardContent},
  repository::{CardQuery, CardRepository, KeyValueStore, Page, PageRequest, RuleTableBackend},
  rules::{DEFAULT_RULES, ReviewRule, RuleTable},
  schedule,
};

use crate::{
  Error, Result,
  encode::{CARD_COLUMNS, CardRow, RawCard, encode_dt, encode_uuid, like_pattern},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Recall store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
  clock:           Arc<Mutex<Option<DateTime<Utc>>>>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn).await
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn).await
  }

  /// Pin the clock used for scheduling; `None` returns to the wall clock.
  pub fn set_now(&self, now: Option<DateTime<Utc>>) {
    *self.clock.lock().unwrap_or_else(|p| p.into_inner()) = now;
  }

  fn now(&self) -> DateTime<Utc> {
    let pinned = *self.clock.lock().unwrap_or_else(|p| p.into_inner());
    pinned.unwrap_or_else(Utc::now)
  }

  async fn init(conn: tokio_rusqlite::Connection) -> Result<Self> {
    conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        let rules: i64 =
          conn.query_row("SELECT COUNT(*) FROM review_rules", [], |r| r.get(0))?;
        if rules == 0 {
          let tx = conn.transaction()?;
          for (count, days) in DEFAULT_RULES {
            tx.execute(
              "INSERT INTO review_rules (review_count, interval_days) VALUES (?1, ?2)",
              rusqlite::params![count, days],
            )?;
          }
          tx.commit()?;
        }
        Ok(())
      })
      .await?;
    tracing::debug!("sqlite schema ready");
    Ok(Self { conn, clock: Arc::default() })
  }

  /// Read one card, or `None` if the id is unknown.
  async fn fetch_card(&self, id: Uuid) -> Result<Option<Card>> {
    let id_str = encode_uuid(id);
    let raw: Option<RawCard> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {CARD_COLUMNS} FROM cards WHERE card_id = ?1"),
            rusqlite::params![id_str],
            RawCard::from_row,
          )
          .optional()?)
      })
      .await?;
    raw.map(RawCard::into_card).transpose()
  }

  /// Overwrite every column of an existing card.
  async fn write_card(&self, card: &Card) -> Result<()> {
    let row = CardRow::from(card);
    let id = card.card_id;
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE cards
             SET question = ?2, answer = ?3, review_count = ?4,
                 next_review_at = ?5, updated_at = ?6
           WHERE card_id = ?1",
          rusqlite::params![
            row.card_id,
            row.question,
            row.answer,
            row.review_count,
            row.next_review_at,
            row.updated_at,
          ],
        )?)
      })
      .await?;
    if changed == 0 {
      return Err(Error::CardNotFound(id));
    }
    Ok(())
  }

  /// Read a card, change it, write it back.
  async fn modify(
    &self,
    id: Uuid,
    change: impl FnOnce(&Card) -> Result<Card>,
  ) -> Result<Card> {
    let card = self.fetch_card(id).await?.ok_or(Error::CardNotFound(id))?;
    let next = change(&card)?;
    self.write_card(&next).await?;
    Ok(next)
  }

  async fn current_rules(&self) -> Result<RuleTable> {
    let rules = RuleTableBackend::get_rules(self).await?;
    Ok(RuleTable::new(&rules).unwrap_or_else(|e| {
      tracing::warn!(error = %e, "stored rule table invalid; using defaults");
      RuleTable::default()
    }))
  }

  async fn store_rules(&self, table: &RuleTable) -> Result<Vec<ReviewRule>> {
    let rules = table.rules();
    let rows: Vec<(u32, i64)> = rules.iter().map(|r| (r.review_count, r.interval_days)).collect();
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM review_rules", [])?;
        for (count, days) in rows {
          tx.execute(
            "INSERT INTO review_rules (review_count, interval_days) VALUES (?1, ?2)",
            rusqlite::params![count, days],
          )?;
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(rules)
  }

  async fn load_cards(&self) -> Result<Vec<Card>> {
    let raws: Vec<RawCard> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {CARD_COLUMNS} FROM cards ORDER BY created_at, rowid"
        ))?;
        let rows = stmt
          .query_map([], RawCard::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawCard::into_card).collect()
  }
}

// ─── CardRepository impl ─────────────────────────────────────────────────────

impl CardRepository for SqliteStore {
  type Error = Error;

  async fn list(&self, query: &CardQuery) -> Result<Page<Card>> {
    let pattern = query.search.as_deref().filter(|s| !s.is_empty()).map(like_pattern);
    let page = query.page;
    let limit = i64::from(page.per_page);
    let offset = i64::try_from(page.offset()).unwrap_or(i64::MAX);

    let (total, raws): (i64, Vec<RawCard>) = self
      .conn
      .call(move |conn| {
        const FILTER: &str = "?1 IS NULL
          OR question LIKE ?1 ESCAPE '\\'
          OR answer   LIKE ?1 ESCAPE '\\'";

        let total: i64 = conn.query_row(
          &format!("SELECT COUNT(*) FROM cards WHERE {FILTER}"),
          rusqlite::params![pattern],
          |r| r.get(0),
        )?;

        let mut stmt = conn.prepare(&format!(
          "SELECT {CARD_COLUMNS} FROM cards WHERE {FILTER}
           ORDER BY created_at, rowid
           LIMIT ?2 OFFSET ?3"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![pattern, limit, offset], RawCard::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok((total, rows))
      })
      .await?;

    Ok(Page {
      total:    u64::try_from(total).unwrap_or(0),
      page:     page.page,
      per_page: page.per_page,
      items:    raws.into_iter().map(RawCard::into_card).collect::<Result<_>>()?,
    })
  }

  async fn create(&self, content: CardContent) -> Result<Card> {
    content.validate()?;
    let card = Card::new(Uuid::new_v4(), content, self.now());
    let row = CardRow::from(&card);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          &format!("INSERT INTO cards ({CARD_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
          rusqlite::params![
            row.card_id,
            row.question,
            row.answer,
            row.review_count,
            row.next_review_at,
            row.created_at,
            row.updated_at,
          ],
        )?;
        Ok(())
      })
      .await?;

    tracing::debug!(card_id = %card.card_id, "card created");
    Ok(card)
  }

  async fn update(&self, id: Uuid, content: CardContent) -> Result<Card> {
    content.validate()?;
    let now = self.now();
    self.modify(id, |card| Ok(card.with_content(content, now))).await
  }

  async fn delete(&self, id: Uuid) -> Result<()> {
    let id_str = encode_uuid(id);
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM cards WHERE card_id = ?1", rusqlite::params![id_str])?)
      })
      .await?;
    if changed == 0 {
      return Err(Error::CardNotFound(id));
    }
    tracing::debug!(card_id = %id, "card deleted");
    Ok(())
  }

  async fn get(&self, id: Uuid) -> Result<Option<Card>> { self.fetch_card(id).await }

  async fn fetch_due(&self, page: PageRequest) -> Result<Page<Card>> {
    // Filtered after decoding so unreadable timestamps count as not due.
    let now = self.now();
    let due = self.load_cards().await?.into_iter().filter(|c| c.is_due(now)).collect();
    Ok(Page::slice(due, page))
  }

  async fn set_next_review(&self, id: Uuid, at: DateTime<Utc>) -> Result<Card> {
    let now = self.now();
    self.modify(id, |card| Ok(schedule::reschedule(card, at, now)?)).await
  }

  async fn apply_outcome(&self, id: Uuid, remembered: bool) -> Result<Card> {
    let rules = self.current_rules().await?;
    let now = self.now();
    let card = self
      .modify(id, |card| Ok(schedule::apply_outcome(card, remembered, &rules, now)))
      .await?;
    tracing::debug!(
      card_id = %id,
      remembered,
      review_count = card.review_count,
      next_review_at = ?card.next_review_at.map(encode_dt),
      "review outcome applied"
    );
    Ok(card)
  }
}

// ─── RuleTableBackend impl ───────────────────────────────────────────────────

impl RuleTableBackend for SqliteStore {
  type Error = Error;

  async fn get_rules(&self) -> Result<Vec<ReviewRule>> {
    let rows: Vec<(u32, i64)> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT review_count, interval_days FROM review_rules ORDER BY review_count",
        )?;
        let rows = stmt
          .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(rows.into_iter().map(|(count, days)| ReviewRule::new(count, days)).collect())
  }

  async fn replace_rules(&self, rules: Vec<ReviewRule>) -> Result<Vec<ReviewRule>> {
    let table = RuleTable::new(&rules)?;
    self.store_rules(&table).await
  }

  async fn reset_rules(&self) -> Result<Vec<ReviewRule>> {
    self.store_rules(&RuleTable::default()).await
  }
}

// ─── KeyValueStore impl ──────────────────────────────────────────────────────

impl KeyValueStore for SqliteStore {
  type Error = Error;

  async fn get_item(&self, key: &str) -> Result<Option<serde_json::Value>> {
    let key = key.to_owned();
    let raw: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row("SELECT value_json FROM kv WHERE key = ?1", rusqlite::params![key], |r| {
            r.get(0)
          })
          .optional()?)
      })
      .await?;
    Ok(raw.as_deref().map(serde_json::from_str).transpose()?)
  }

  async fn set_item(&self, key: &str, value: serde_json::Value) -> Result<()> {
    let key = key.to_owned();
    let json = value.to_string();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO kv (key, value_json) VALUES (?1, ?2)
           ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
          rusqlite::params![key, json],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
