//! In-process implementations of the storage traits.
//!
//! Useful as an offline backend and in tests. Each can be switched into a
//! failing mode to exercise rollback paths. Clones share the same storage.

use std::{
  collections::HashMap,
  sync::{
    Arc, Mutex, MutexGuard,
    atomic::{AtomicBool, Ordering},
  },
};

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::{
  ValidationError,
  card::{Card, CardContent},
  repository::{CardQuery, CardRepository, KeyValueStore, Page, PageRequest, RuleTableBackend},
  rules::{ReviewRule, RuleTable},
  schedule,
};

#[derive(Debug, Error)]
pub enum MemoryError {
  #[error("backend unavailable")]
  Unavailable,

  #[error("card not found: {0}")]
  NotFound(Uuid),

  #[error(transparent)]
  Validation(#[from] ValidationError),
}

impl From<MemoryError> for crate::Error {
  fn from(e: MemoryError) -> Self {
    match e {
      MemoryError::NotFound(id) => Self::CardNotFound(id),
      MemoryError::Validation(v) => Self::Validation(v),
      e @ MemoryError::Unavailable => Self::transport(e),
    }
  }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
  // A poisoned lock only means a test thread panicked mid-write.
  m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Default)]
struct Switch(AtomicBool);

impl Switch {
  fn set(&self, on: bool) { self.0.store(on, Ordering::SeqCst) }

  fn check(&self) -> Result<(), MemoryError> {
    if self.0.load(Ordering::SeqCst) {
      Err(MemoryError::Unavailable)
    } else {
      Ok(())
    }
  }
}

// ─── MemoryKv ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct MemoryKv {
  items:   Arc<Mutex<HashMap<String, serde_json::Value>>>,
  failing: Arc<Switch>,
}

impl MemoryKv {
  /// While failing, every read and write returns [`MemoryError::Unavailable`].
  pub fn set_failing(&self, failing: bool) { self.failing.set(failing) }
}

impl KeyValueStore for MemoryKv {
  type Error = MemoryError;

  async fn get_item(&self, key: &str) -> Result<Option<serde_json::Value>, MemoryError> {
    self.failing.check()?;
    Ok(lock(&self.items).get(key).cloned())
  }

  async fn set_item(&self, key: &str, value: serde_json::Value) -> Result<(), MemoryError> {
    self.failing.check()?;
    lock(&self.items).insert(key.to_owned(), value);
    Ok(())
  }
}

// ─── MemoryRules ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct MemoryRules {
  table:   Arc<Mutex<RuleTable>>,
  failing: Arc<Switch>,
}

impl MemoryRules {
  pub fn set_failing(&self, failing: bool) { self.failing.set(failing) }

  pub fn snapshot(&self) -> Vec<ReviewRule> { lock(&self.table).rules() }

  pub fn table(&self) -> RuleTable { lock(&self.table).clone() }
}

impl RuleTableBackend for MemoryRules {
  type Error = MemoryError;

  async fn get_rules(&self) -> Result<Vec<ReviewRule>, MemoryError> {
    self.failing.check()?;
    Ok(lock(&self.table).rules())
  }

  async fn replace_rules(&self, rules: Vec<ReviewRule>) -> Result<Vec<ReviewRule>, MemoryError> {
    self.failing.check()?;
    let mut table = lock(&self.table);
    table.replace_all(&rules)?;
    Ok(table.rules())
  }

  async fn reset_rules(&self) -> Result<Vec<ReviewRule>, MemoryError> {
    self.failing.check()?;
    let mut table = lock(&self.table);
    table.reset_to_default();
    Ok(table.rules())
  }
}

// ─── MemoryCards ─────────────────────────────────────────────────────────────

/// An in-process card repository that schedules with the same processor as
/// the local path.
#[derive(Debug, Clone, Default)]
pub struct MemoryCards {
  cards:   Arc<Mutex<Vec<Card>>>,
  rules:   MemoryRules,
  clock:   Arc<Mutex<Option<DateTime<Utc>>>>,
  failing: Arc<Switch>,
}

impl MemoryCards {
  pub fn with_rules(rules: MemoryRules) -> Self { Self { rules, ..Self::default() } }

  pub fn set_failing(&self, failing: bool) { self.failing.set(failing) }

  /// Pin the repository clock; `None` returns to the wall clock.
  pub fn set_now(&self, now: Option<DateTime<Utc>>) { *lock(&self.clock) = now; }

  pub fn rules(&self) -> &MemoryRules { &self.rules }

  /// Change a stored card behind every client's back, as a concurrent
  /// editor would.
  pub fn edit_stored(&self, id: Uuid, edit: impl FnOnce(&mut Card)) {
    if let Some(card) = lock(&self.cards).iter_mut().find(|c| c.card_id == id) {
      edit(card);
    }
  }

  pub fn stored(&self) -> Vec<Card> { lock(&self.cards).clone() }

  fn now(&self) -> DateTime<Utc> { lock(&self.clock).unwrap_or_else(Utc::now) }

  fn modify(
    &self,
    id: Uuid,
    change: impl FnOnce(&Card) -> Result<Card, MemoryError>,
  ) -> Result<Card, MemoryError> {
    self.failing.check()?;
    let mut cards = lock(&self.cards);
    let slot = cards
      .iter_mut()
      .find(|c| c.card_id == id)
      .ok_or(MemoryError::NotFound(id))?;
    *slot = change(slot)?;
    Ok(slot.clone())
  }
}

impl CardRepository for MemoryCards {
  type Error = MemoryError;

  async fn list(&self, query: &CardQuery) -> Result<Page<Card>, MemoryError> {
    self.failing.check()?;
    let needle = query.search.as_deref().map(str::to_lowercase);
    let matching: Vec<Card> = lock(&self.cards)
      .iter()
      .filter(|c| match &needle {
        Some(n) => {
          c.question.to_lowercase().contains(n) || c.answer.to_lowercase().contains(n)
        }
        None => true,
      })
      .cloned()
      .collect();
    Ok(Page::slice(matching, query.page))
  }

  async fn create(&self, content: CardContent) -> Result<Card, MemoryError> {
    self.failing.check()?;
    content.validate()?;
    let card = Card::new(Uuid::new_v4(), content, self.now());
    lock(&self.cards).push(card.clone());
    Ok(card)
  }

  async fn update(&self, id: Uuid, content: CardContent) -> Result<Card, MemoryError> {
    content.validate()?;
    let now = self.now();
    self.modify(id, |card| Ok(card.with_content(content, now)))
  }

  async fn delete(&self, id: Uuid) -> Result<(), MemoryError> {
    self.failing.check()?;
    let mut cards = lock(&self.cards);
    let before = cards.len();
    cards.retain(|c| c.card_id != id);
    if cards.len() == before {
      return Err(MemoryError::NotFound(id));
    }
    Ok(())
  }

  async fn get(&self, id: Uuid) -> Result<Option<Card>, MemoryError> {
    self.failing.check()?;
    Ok(lock(&self.cards).iter().find(|c| c.card_id == id).cloned())
  }

  async fn fetch_due(&self, page: PageRequest) -> Result<Page<Card>, MemoryError> {
    self.failing.check()?;
    let now = self.now();
    let due = lock(&self.cards).iter().filter(|c| c.is_due(now)).cloned().collect();
    Ok(Page::slice(due, page))
  }

  async fn set_next_review(&self, id: Uuid, at: DateTime<Utc>) -> Result<Card, MemoryError> {
    let now = self.now();
    self.modify(id, |card| Ok(schedule::reschedule(card, at, now)?))
  }

  async fn apply_outcome(&self, id: Uuid, remembered: bool) -> Result<Card, MemoryError> {
    let now = self.now();
    let rules = self.rules.table();
    self.modify(id, |card| Ok(schedule::apply_outcome(card, remembered, &rules, now)))
  }
}
