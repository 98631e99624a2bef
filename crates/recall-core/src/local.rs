//! An offline-first repository kept entirely in a [`KeyValueStore`].
//!
//! Cards live as one JSON array under [`CARDS_KEY`] and the rule table under
//! [`RULES_KEY`]. Every write reads the array, changes it and writes it back,
//! so concurrent writers are last-write-wins.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  Error, Result,
  card::{Card, CardContent},
  repository::{CardQuery, CardRepository, KeyValueStore, Page, PageRequest, RuleTableBackend},
  rules::{ReviewRule, RuleTable},
  schedule,
};

pub const CARDS_KEY: &str = "cards";
pub const RULES_KEY: &str = "review_rules";

#[derive(Debug, Clone)]
pub struct LocalRepository<K> {
  kv:    K,
  clock: Option<DateTime<Utc>>,
}

impl<K: KeyValueStore> LocalRepository<K> {
  pub fn new(kv: K) -> Self { Self { kv, clock: None } }

  /// Schedule against a fixed instant instead of the wall clock.
  pub fn with_clock(self, now: DateTime<Utc>) -> Self { Self { clock: Some(now), ..self } }

  pub fn kv(&self) -> &K { &self.kv }

  fn now(&self) -> DateTime<Utc> { self.clock.unwrap_or_else(Utc::now) }

  async fn read<T: serde::de::DeserializeOwned + Default>(&self, key: &str) -> Result<T> {
    match self.kv.get_item(key).await.map_err(Into::<Error>::into)? {
      Some(value) => Ok(serde_json::from_value(value)?),
      None => Ok(T::default()),
    }
  }

  async fn write<T: serde::Serialize>(&self, key: &str, value: &T) -> Result<()> {
    let value = serde_json::to_value(value)?;
    self.kv.set_item(key, value).await.map_err(Into::into)
  }

  async fn cards(&self) -> Result<Vec<Card>> { self.read(CARDS_KEY).await }

  async fn modify(
    &self,
    id: Uuid,
    change: impl FnOnce(&Card) -> Result<Card>,
  ) -> Result<Card> {
    let mut cards = self.cards().await?;
    let slot = cards
      .iter_mut()
      .find(|c| c.card_id == id)
      .ok_or(Error::CardNotFound(id))?;
    *slot = change(slot)?;
    let card = slot.clone();
    self.write(CARDS_KEY, &cards).await?;
    Ok(card)
  }

  async fn table(&self) -> Result<RuleTable> {
    let stored: Vec<ReviewRule> = self.read(RULES_KEY).await?;
    if stored.is_empty() {
      return Ok(RuleTable::default());
    }
    Ok(RuleTable::new(&stored)?)
  }
}

impl<K: KeyValueStore> CardRepository for LocalRepository<K> {
  type Error = Error;

  async fn list(&self, query: &CardQuery) -> Result<Page<Card>> {
    let mut cards = self.cards().await?;
    if let Some(needle) = query.search.as_deref().map(str::to_lowercase) {
      cards.retain(|c| {
        c.question.to_lowercase().contains(&needle) || c.answer.to_lowercase().contains(&needle)
      });
    }
    Ok(Page::slice(cards, query.page))
  }

  async fn create(&self, content: CardContent) -> Result<Card> {
    content.validate()?;
    let mut cards = self.cards().await?;
    let card = Card::new(Uuid::new_v4(), content, self.now());
    cards.push(card.clone());
    self.write(CARDS_KEY, &cards).await?;
    Ok(card)
  }

  async fn update(&self, id: Uuid, content: CardContent) -> Result<Card> {
    content.validate()?;
    let now = self.now();
    self.modify(id, |card| Ok(card.with_content(content, now))).await
  }

  async fn delete(&self, id: Uuid) -> Result<()> {
    let mut cards = self.cards().await?;
    let before = cards.len();
    cards.retain(|c| c.card_id != id);
    if cards.len() == before {
      return Err(Error::CardNotFound(id));
    }
    self.write(CARDS_KEY, &cards).await
  }

  async fn get(&self, id: Uuid) -> Result<Option<Card>> {
    Ok(self.cards().await?.into_iter().find(|c| c.card_id == id))
  }

  async fn fetch_due(&self, page: PageRequest) -> Result<Page<Card>> {
    let now = self.now();
    let due = self.cards().await?.into_iter().filter(|c| c.is_due(now)).collect();
    Ok(Page::slice(due, page))
  }

  async fn set_next_review(&self, id: Uuid, at: DateTime<Utc>) -> Result<Card> {
    let now = self.now();
    self.modify(id, |card| Ok(schedule::reschedule(card, at, now)?)).await
  }

  async fn apply_outcome(&self, id: Uuid, remembered: bool) -> Result<Card> {
    let rules = self.table().await?;
    let now = self.now();
    self
      .modify(id, |card| Ok(schedule::apply_outcome(card, remembered, &rules, now)))
      .await
  }
}

impl<K: KeyValueStore> RuleTableBackend for LocalRepository<K> {
  type Error = Error;

  async fn get_rules(&self) -> Result<Vec<ReviewRule>> { Ok(self.table().await?.rules()) }

  async fn replace_rules(&self, rules: Vec<ReviewRule>) -> Result<Vec<ReviewRule>> {
    let rules = RuleTable::new(&rules)?.rules();
    self.write(RULES_KEY, &rules).await?;
    Ok(rules)
  }

  async fn reset_rules(&self) -> Result<Vec<ReviewRule>> {
    let rules = RuleTable::default().rules();
    self.write(RULES_KEY, &rules).await?;
    Ok(rules)
  }
}

#[cfg(test)]
mod tests {
  use chrono::{Duration, TimeZone};
  use serde_json::json;

  use super::*;
  use crate::{calendar::end_of_day, cards::CardStore, due::due_cards, memory::MemoryKv};

  fn day(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 2, 1, 7, 0, 0).unwrap() + Duration::days(n)
  }

  #[tokio::test]
  async fn cards_survive_a_new_instance() {
    let kv = MemoryKv::default();
    let repo = LocalRepository::new(kv.clone()).with_clock(day(0));
    let card = repo.create(CardContent::new("q", "a")).await.unwrap();
    repo.apply_outcome(card.card_id, true).await.unwrap();

    let reopened = LocalRepository::new(kv);
    let stored = reopened.get(card.card_id).await.unwrap().unwrap();
    assert_eq!(stored.review_count, 1);
    assert_eq!(stored.next_review_at, Some(end_of_day(day(1).date_naive())));
  }

  #[tokio::test]
  async fn stored_rules_drive_outcomes() {
    let repo = LocalRepository::new(MemoryKv::default()).with_clock(day(0));
    repo.replace_rules(vec![ReviewRule::new(0, 10)]).await.unwrap();
    let card = repo.create(CardContent::new("q", "a")).await.unwrap();

    let c = repo.apply_outcome(card.card_id, true).await.unwrap();
    assert_eq!(c.next_review_at, Some(end_of_day(day(10).date_naive())));

    assert_eq!(repo.reset_rules().await.unwrap(), RuleTable::default().rules());
    assert!(repo.replace_rules(vec![ReviewRule::new(1, 0)]).await.is_err());
    assert_eq!(repo.get_rules().await.unwrap(), RuleTable::default().rules());
  }

  #[tokio::test]
  async fn legacy_and_broken_timestamps_decode_leniently() {
    let kv = MemoryKv::default();
    let good = Uuid::new_v4();
    let bad = Uuid::new_v4();
    kv.set_item(
      CARDS_KEY,
      json!([
        {
          "card_id": good, "question": "q1", "answer": "a",
          "next_review_at": "2024-02-01T23:59:59.999+00:00Z",
          "created_at": "2024-01-01T00:00:00Z", "updated_at": "2024-01-01T00:00:00Z"
        },
        {
          "card_id": bad, "question": "q2", "answer": "a",
          "next_review_at": "Invalid Date",
          "created_at": "2024-01-01T00:00:00Z", "updated_at": "2024-01-01T00:00:00Z"
        }
      ]),
    )
    .await
    .unwrap();

    let repo = LocalRepository::new(kv).with_clock(day(1));
    let cards = repo.list(&CardQuery::default()).await.unwrap().items;
    assert_eq!(cards[0].review_count, 0);

    let set = due_cards(&cards, day(1));
    assert_eq!(set.ids(), vec![good]);
    assert_eq!(set.warnings[0].card_id, bad);

    assert_eq!(repo.fetch_due(PageRequest::default()).await.unwrap().total, 1);
  }

  #[tokio::test]
  async fn card_store_works_offline() {
    let repo = LocalRepository::new(MemoryKv::default()).with_clock(day(0));
    let mut store = CardStore::new(repo);
    let card = store.create(CardContent::new("q", "a"), day(0)).await.unwrap();
    store.review(card.card_id, false, day(0)).await.unwrap();
    store.delete(card.card_id, day(0)).await.unwrap();
    assert!(store.repository().get(card.card_id).await.unwrap().is_none());
  }

  #[tokio::test]
  async fn unavailable_storage_is_transport() {
    let kv = MemoryKv::default();
    let repo = LocalRepository::new(kv.clone());
    kv.set_failing(true);
    let err = repo.create(CardContent::new("q", "a")).await.unwrap_err();
    assert!(matches!(err, Error::Transport(_)));
  }
}
