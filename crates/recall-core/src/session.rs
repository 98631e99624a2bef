//! A study session: card scheduling, the rule table and learning statistics.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  Error, Result,
  card::Card,
  cards::CardStore,
  notice::Notice,
  progress::{ProgressSnapshot, ProgressStore},
  repository::{CardRepository, KeyValueStore, RuleTableBackend},
  rules::{ReviewRule, RuleStore, RuleTable},
};

/// Owns the card, rule and progress stores of one study session.
///
/// The card store predicts outcomes with the rule table held here, so every
/// rule change goes through the session to keep the two in step.
pub struct ReviewSession<R, B, K> {
  cards:    CardStore<R>,
  rules:    RuleStore<B>,
  progress: ProgressStore<K>,
}

impl<R, B, K> ReviewSession<R, B, K>
where
  R: CardRepository,
  B: RuleTableBackend,
  K: KeyValueStore,
{
  pub fn new(cards: CardStore<R>, rules: RuleStore<B>, progress: ProgressStore<K>) -> Self {
    Self { cards, rules, progress }
  }

  pub fn cards(&self) -> &CardStore<R> { &self.cards }

  pub fn cards_mut(&mut self) -> &mut CardStore<R> { &mut self.cards }

  pub fn rules(&self) -> &RuleTable { self.rules.table() }

  pub fn progress(&self) -> &ProgressSnapshot { self.progress.snapshot() }

  /// Load the rule table, cards and statistics, then build today's queue.
  pub async fn initialize(&mut self, now: DateTime<Utc>) -> Result<Vec<&Card>> {
    let table = self.rules.load().await?.clone();
    self.cards.set_rules(table);
    self.cards.initialize().await?;
    self.progress.initialize(now).await?;
    self.cards.refresh_today(now).await?;
    Ok(self.cards.today())
  }

  /// Replace the backend's rule table and predict with it from now on.
  pub async fn replace_rules(&mut self, rules: Vec<ReviewRule>) -> Result<&RuleTable> {
    let table = self.rules.replace_all(rules).await?.clone();
    self.cards.set_rules(table);
    Ok(self.rules.table())
  }

  pub async fn reset_rules(&mut self) -> Result<&RuleTable> {
    let table = self.rules.reset_to_default().await?.clone();
    self.cards.set_rules(table);
    Ok(self.rules.table())
  }

  /// Apply one answer. Progress is recorded only once the repository has
  /// accepted the outcome; a failed card write leaves statistics untouched.
  ///
  /// A [`Error::Conflict`] still means the repository applied the outcome,
  /// so it is counted before the conflict is returned.
  pub async fn answer(
    &mut self,
    id: Uuid,
    remembered: bool,
    now: DateTime<Utc>,
  ) -> Result<Card> {
    match self.cards.review(id, remembered, now).await {
      Ok(card) => {
        self.progress.record(remembered, now).await?;
        Ok(card)
      }
      Err(conflict @ Error::Conflict { .. }) => {
        self.progress.record(remembered, now).await?;
        Err(conflict)
      }
      Err(e) => Err(e),
    }
  }

  pub async fn record_study_time(&mut self, minutes: u64, now: DateTime<Utc>) -> Result<()> {
    self.progress.record_study_time(minutes, now).await.map(|_| ())
  }

  /// Notices from every store: cards, then rules, then progress.
  pub fn take_notices(&mut self) -> Vec<Notice> {
    let mut notices = self.cards.take_notices();
    notices.extend(self.rules.take_notices());
    notices.extend(self.progress.take_notices());
    notices
  }

  /// Drop loaded cards and wipe statistics.
  pub async fn reset(&mut self) -> Result<()> {
    self.cards.reset();
    self.progress.reset().await
  }
}
