//! [`CardStore`]: the single owner of the in-memory card collection.
//!
//! Every card mutation goes through `&mut self`, so two read-modify-write
//! sequences can never interleave. Each operation predicts its result locally
//! (placeholder creation, [`schedule::apply_outcome`], [`schedule::reschedule`])
//! and hands the prediction to the [`SyncCoordinator`], which talks to the
//! repository and rolls back on failure.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  Error, Result,
  card::{Card, CardContent},
  due::{DueSet, due_cards},
  notice::{Action, Notice, Notices},
  repository::{CardQuery, CardRepository, Page},
  rules::RuleTable,
  schedule,
  sync::{CardIndex, DueSource, Operation, SyncCoordinator},
};

pub struct CardStore<R> {
  sync:        SyncCoordinator<R>,
  rules:       RuleTable,
  due_source:  DueSource,
  notices:     Notices,
  initialized: bool,
}

impl<R: CardRepository> CardStore<R> {
  pub fn new(repo: R) -> Self {
    Self {
      sync:        SyncCoordinator::new(repo),
      rules:       RuleTable::default(),
      due_source:  DueSource::default(),
      notices:     Notices::default(),
      initialized: false,
    }
  }

  /// Use `source` when building the today queue.
  pub fn with_due_source(mut self, source: DueSource) -> Self {
    self.due_source = source;
    self
  }

  /// The table used for local predictions. Keep it in step with the
  /// repository's table or every review will come back as a conflict.
  pub fn set_rules(&mut self, rules: RuleTable) { self.rules = rules; }

  pub fn rules(&self) -> &RuleTable { &self.rules }

  pub fn repository(&self) -> &R { self.sync.repository() }

  pub fn index(&self) -> &CardIndex { self.sync.index() }

  pub fn cards(&self) -> &[Card] { self.sync.index().cards() }

  pub fn get(&self, id: Uuid) -> Option<&Card> { self.sync.index().get(id) }

  pub fn total_count(&self) -> usize { self.sync.index().len() }

  pub fn is_initialized(&self) -> bool { self.initialized }

  /// Load every card once. Later calls are no-ops until [`CardStore::reset`].
  pub async fn initialize(&mut self) -> Result<()> {
    if self.initialized {
      return Ok(());
    }
    let result = self.sync.load_all(None).await.map(|_| ());
    self.notices.track(Action::LoadCards, result)?;
    self.initialized = true;
    Ok(())
  }

  /// Re-fetch every card regardless of earlier loads.
  pub async fn reload(&mut self) -> Result<()> {
    let result = self.sync.load_all(None).await.map(|_| ());
    self.notices.track(Action::LoadCards, result)?;
    self.initialized = true;
    Ok(())
  }

  /// A page of cards straight from the repository (search, pagination).
  pub async fn list(&self, query: &CardQuery) -> Result<Page<Card>> { self.sync.list(query).await }

  pub async fn create(&mut self, content: CardContent, now: DateTime<Utc>) -> Result<Card> {
    let result = match content.validate() {
      Ok(()) => {
        let placeholder = Card::placeholder(content, now);
        self.sync.reconcile(placeholder, Operation::Create, now).await
      }
      Err(e) => Err(e.into()),
    };
    self.notices.track(Action::CreateCard, result)
  }

  pub async fn update(
    &mut self,
    id: Uuid,
    content: CardContent,
    now: DateTime<Utc>,
  ) -> Result<Card> {
    let result = self.update_inner(id, content, now).await;
    self.notices.track(Action::UpdateCard, result)
  }

  pub async fn delete(&mut self, id: Uuid, now: DateTime<Utc>) -> Result<()> {
    let result = match self.current(id).await {
      Ok(card) => self.sync.reconcile(card, Operation::Delete, now).await.map(|_| ()),
      Err(e) => Err(e),
    };
    self.notices.track(Action::DeleteCard, result)
  }

  /// Apply a review outcome. Call once per outcome.
  pub async fn review(&mut self, id: Uuid, remembered: bool, now: DateTime<Utc>) -> Result<Card> {
    let result = match self.current(id).await {
      Ok(card) => {
        let predicted = schedule::apply_outcome(&card, remembered, &self.rules, now);
        self
          .sync
          .reconcile(predicted, Operation::ApplyOutcome { remembered }, now)
          .await
      }
      Err(e) => Err(e),
    };
    self.notices.track(Action::ReviewCard, result)
  }

  /// Move a card's next review to `at`, bypassing the rule table.
  pub async fn reschedule(
    &mut self,
    id: Uuid,
    at: DateTime<Utc>,
    now: DateTime<Utc>,
  ) -> Result<Card> {
    let result = self.reschedule_inner(id, at, now).await;
    self.notices.track(Action::RescheduleCard, result)
  }

  /// The locally computed due set over every loaded card.
  pub fn due_cards(&self, now: DateTime<Utc>) -> DueSet { due_cards(self.cards(), now) }

  /// Rebuild the cached today queue from the configured source.
  pub async fn refresh_today(&mut self, now: DateTime<Utc>) -> Result<DueSet> {
    self.sync.refresh_today(now, self.due_source).await
  }

  /// Cards in the cached today queue, in queue order.
  pub fn today(&self) -> Vec<&Card> {
    let index = self.sync.index();
    index
      .today()
      .map(|q| q.ids.iter().filter_map(|id| index.get(*id)).collect())
      .unwrap_or_default()
  }

  pub fn today_count(&self) -> usize { self.today().len() }

  pub fn take_notices(&mut self) -> Vec<Notice> { self.notices.take() }

  /// Forget all loaded state; the next [`CardStore::initialize`] reloads.
  pub fn reset(&mut self) {
    self.sync.clear();
    self.notices.take();
    self.initialized = false;
  }

  async fn current(&self, id: Uuid) -> Result<Card> {
    if let Some(card) = self.sync.index().get(id) {
      return Ok(card.clone());
    }
    self
      .sync
      .repository()
      .get(id)
      .await
      .map_err(Into::<Error>::into)?
      .ok_or(Error::CardNotFound(id))
  }

  async fn update_inner(
    &mut self,
    id: Uuid,
    content: CardContent,
    now: DateTime<Utc>,
  ) -> Result<Card> {
    content.validate()?;
    let card = self.current(id).await?;
    self
      .sync
      .reconcile(card.with_content(content, now), Operation::UpdateContent, now)
      .await
  }

  async fn reschedule_inner(
    &mut self,
    id: Uuid,
    at: DateTime<Utc>,
    now: DateTime<Utc>,
  ) -> Result<Card> {
    let card = self.current(id).await?;
    let moved = schedule::reschedule(&card, at, now)?;
    self.sync.reconcile(moved, Operation::SetNextReview, now).await
  }
}
