//! Reconciliation of optimistic local changes with the durable repository.
//!
//! The coordinator owns the in-memory card index and the cached "today"
//! queue. Every write follows the same shape:
//!
//! 1. checkpoint the index;
//! 2. apply the local prediction to the index;
//! 3. send the operation to the repository;
//! 4. on failure restore the checkpoint and return the error, on success
//!    store the repository's card and compare it with the prediction.
//!
//! The repository is authoritative. When its result disagrees with the
//! prediction the index keeps the repository's card and the caller gets
//! [`Error::Conflict`] carrying both versions.

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::{
  Error, Result, ValidationError,
  calendar::{end_of_day, utc_date},
  card::{Card, CardContent},
  due::{DueSet, due_cards},
  repository::{CardQuery, CardRepository, Page, PageRequest},
};

/// What the repository is asked to do with a local card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
  /// The local card is a placeholder; the repository assigns the real id.
  Create,
  UpdateContent,
  SetNextReview,
  ApplyOutcome { remembered: bool },
  Delete,
}

/// Where the "today" queue comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DueSource {
  /// Computed from the index with [`due_cards`].
  #[default]
  Local,
  /// Taken from [`CardRepository::fetch_due`].
  Repository,
}

/// The cached set of cards to review on `date`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodayQueue {
  pub date: NaiveDate,
  pub ids:  Vec<Uuid>,
}

/// In-memory cards keyed by id, in load/insertion order.
#[derive(Debug, Clone, Default)]
pub struct CardIndex {
  cards: Vec<Card>,
  today: Option<TodayQueue>,
}

impl CardIndex {
  pub fn cards(&self) -> &[Card] { &self.cards }

  pub fn len(&self) -> usize { self.cards.len() }

  pub fn is_empty(&self) -> bool { self.cards.is_empty() }

  pub fn get(&self, id: Uuid) -> Option<&Card> { self.cards.iter().find(|c| c.card_id == id) }

  pub fn today(&self) -> Option<&TodayQueue> { self.today.as_ref() }

  fn position(&self, id: Uuid) -> Option<usize> {
    self.cards.iter().position(|c| c.card_id == id)
  }

  fn upsert(&mut self, card: Card) {
    match self.position(card.card_id) {
      Some(i) => self.cards[i] = card,
      None => self.cards.push(card),
    }
  }

  /// Put `card` where `old_id` was, dropping any other entry that already
  /// carries `card`'s id. Appends if `old_id` is absent.
  fn replace(&mut self, old_id: Uuid, card: Card) {
    let new_id = card.card_id;
    if old_id != new_id {
      self.cards.retain(|c| c.card_id != new_id);
    }
    match self.position(old_id) {
      Some(i) => self.cards[i] = card,
      None => self.cards.push(card),
    }
    if let Some(queue) = &mut self.today {
      for id in &mut queue.ids {
        if *id == old_id {
          *id = new_id;
        }
      }
      dedup_in_order(&mut queue.ids);
    }
  }

  fn remove(&mut self, id: Uuid) {
    self.cards.retain(|c| c.card_id != id);
    self.drop_from_today(id);
  }

  fn drop_from_today(&mut self, id: Uuid) {
    if let Some(queue) = &mut self.today {
      queue.ids.retain(|q| *q != id);
    }
  }

  /// Drop `card` from the today queue once its next review lies past the end
  /// of `now`'s day. The queue's own date may be stale.
  fn settle_today(&mut self, card: &Card, now: DateTime<Utc>) {
    if self.today.is_none() {
      return;
    }
    let still_today = card
      .next_review_at
      .is_some_and(|at| at <= end_of_day(utc_date(now)));
    if !still_today {
      self.drop_from_today(card.card_id);
    }
  }
}

fn dedup_in_order(ids: &mut Vec<Uuid>) {
  let mut seen = Vec::with_capacity(ids.len());
  ids.retain(|id| {
    if seen.contains(id) {
      false
    } else {
      seen.push(*id);
      true
    }
  });
}

/// The repository call an [`Operation`] turns into.
enum Request {
  Create(CardContent),
  Update(CardContent),
  SetNextReview(DateTime<Utc>),
  Outcome(bool),
  Delete,
}

impl Request {
  fn for_op(op: Operation, local: &Card) -> Result<Self, ValidationError> {
    Ok(match op {
      Operation::Create => Self::Create(local.content()),
      Operation::UpdateContent => Self::Update(local.content()),
      Operation::SetNextReview => Self::SetNextReview(
        local
          .next_review_at
          .ok_or(ValidationError::MissingNextReview(local.card_id))?,
      ),
      Operation::ApplyOutcome { remembered } => Self::Outcome(remembered),
      Operation::Delete => Self::Delete,
    })
  }
}

/// Whether the repository's card differs from what we predicted.
fn diverges(local: &Card, remote: &Card) -> bool {
  local.question != remote.question
    || local.answer != remote.answer
    || local.review_count != remote.review_count
    || local.next_review_at != remote.next_review_at
}

// ─── Coordinator ─────────────────────────────────────────────────────────────

pub struct SyncCoordinator<R> {
  repo:  R,
  index: CardIndex,
}

impl<R: CardRepository> SyncCoordinator<R> {
  pub fn new(repo: R) -> Self { Self { repo, index: CardIndex::default() } }

  pub fn index(&self) -> &CardIndex { &self.index }

  pub fn repository(&self) -> &R { &self.repo }

  /// Drop every cached card and the today queue.
  pub fn clear(&mut self) { self.index = CardIndex::default(); }

  /// Replace the index with every card matching `search`, fetched page by
  /// page. On failure the index is left as it was.
  pub async fn load_all(&mut self, search: Option<String>) -> Result<&CardIndex> {
    let mut query = CardQuery { page: PageRequest::default(), search };
    let mut cards = Vec::new();
    loop {
      let page = self.repo.list(&query).await.map_err(Into::<Error>::into)?;
      let more = page.has_more();
      cards.extend(page.items);
      if !more {
        break;
      }
      query.page = query.page.next();
    }

    tracing::debug!(count = cards.len(), "card index reloaded");
    self.index.cards = cards;
    if let Some(queue) = &mut self.index.today {
      let known: Vec<Uuid> = self.index.cards.iter().map(|c| c.card_id).collect();
      queue.ids.retain(|id| known.contains(id));
    }
    Ok(&self.index)
  }

  /// One page straight from the repository; the index is not touched.
  pub async fn list(&self, query: &CardQuery) -> Result<Page<Card>> {
    self.repo.list(query).await.map_err(Into::into)
  }

  /// Rebuild the today queue for `now`'s date.
  pub async fn refresh_today(
    &mut self,
    now: DateTime<Utc>,
    source: DueSource,
  ) -> Result<DueSet> {
    let set = match source {
      DueSource::Local => due_cards(&self.index.cards, now),
      DueSource::Repository => {
        let mut page = PageRequest::default();
        let mut set = DueSet::default();
        loop {
          let fetched = self.repo.fetch_due(page).await.map_err(Into::<Error>::into)?;
          let more = fetched.has_more();
          set.cards.extend(fetched.items);
          if !more {
            break;
          }
          page = page.next();
        }
        for card in &set.cards {
          self.index.upsert(card.clone());
        }
        set
      }
    };

    self.index.today = Some(TodayQueue { date: utc_date(now), ids: set.ids() });
    Ok(set)
  }

  /// Push `local` to the repository as `op` and fold the result back into
  /// the index. Returns the repository's card (for deletes, the removed
  /// local card).
  pub async fn reconcile(
    &mut self,
    local: Card,
    op: Operation,
    now: DateTime<Utc>,
  ) -> Result<Card> {
    let id = local.card_id;
    let request = Request::for_op(op, &local)?;

    let checkpoint = self.index.clone();
    match op {
      Operation::Delete => self.index.remove(id),
      _ => {
        self.index.upsert(local.clone());
        self.index.settle_today(&local, now);
      }
    }

    let sent = match request {
      Request::Create(content) => self.repo.create(content).await.map(Some),
      Request::Update(content) => self.repo.update(id, content).await.map(Some),
      Request::SetNextReview(at) => self.repo.set_next_review(id, at).await.map(Some),
      Request::Outcome(remembered) => self.repo.apply_outcome(id, remembered).await.map(Some),
      Request::Delete => self.repo.delete(id).await.map(|()| None),
    };

    let remote = match sent {
      Ok(remote) => remote,
      Err(e) => {
        self.index = checkpoint;
        let e: Error = e.into();
        tracing::warn!(card_id = %id, ?op, error = %e, "repository rejected change; rolled back");
        return Err(e);
      }
    };

    let Some(remote) = remote else {
      tracing::debug!(card_id = %id, "card deleted");
      return Ok(local);
    };

    if op != Operation::Create && remote.card_id != id {
      self.index = checkpoint;
      tracing::warn!(card_id = %id, remote_id = %remote.card_id, "repository answered for a different card");
      return Err(Error::Conflict { local: Box::new(local), remote: Box::new(remote) });
    }

    self.index.replace(id, remote.clone());
    self.index.settle_today(&remote, now);

    if diverges(&local, &remote) {
      tracing::warn!(card_id = %remote.card_id, ?op, "repository result differs from local prediction");
      return Err(Error::Conflict { local: Box::new(local), remote: Box::new(remote) });
    }

    tracing::debug!(card_id = %remote.card_id, ?op, "card reconciled");
    Ok(remote)
  }
}
