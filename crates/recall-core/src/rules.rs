//! The review rule table, mapping review-count tier to interval in days.
//!
//! The table is a total function: a card whose review count lies above the
//! highest tier uses the highest tier's interval (clamp, no extrapolation). A
//! count between two tiers uses the lower one, a count below the lowest tier
//! uses the lowest.

use serde::{Deserialize, Serialize};

use crate::{
  Error, Result, ValidationError,
  notice::{Action, Notice, Notices},
  repository::RuleTableBackend,
};

/// Built-in intervals restored by [`RuleTable::reset_to_default`].
pub const DEFAULT_RULES: [(u32, u32); 6] =
  [(0, 1), (1, 2), (2, 4), (3, 7), (4, 15), (5, 30)];

/// Longest interval a tier may carry, about a century.
pub const MAX_INTERVAL_DAYS: u32 = 36_500;

/// A single tier as exchanged with backends. `interval_days` is signed so that
/// bad input reaches validation instead of failing to deserialise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRule {
  pub review_count:  u32,
  pub interval_days: i64,
}

impl ReviewRule {
  pub fn new(review_count: u32, interval_days: i64) -> Self {
    Self { review_count, interval_days }
  }
}

/// A validated, ascending rule table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleTable {
  tiers: Vec<(u32, u32)>,
}

impl Default for RuleTable {
  fn default() -> Self { Self { tiers: DEFAULT_RULES.to_vec() } }
}

impl RuleTable {
  /// Validate and sort `rules` into a table.
  pub fn new(rules: &[ReviewRule]) -> Result<Self, ValidationError> {
    if rules.is_empty() {
      return Err(ValidationError::EmptyRuleTable);
    }

    let mut tiers = Vec::with_capacity(rules.len());
    for rule in rules {
      let interval = u32::try_from(rule.interval_days)
        .ok()
        .filter(|days| *days >= 1)
        .ok_or(ValidationError::NonPositiveInterval {
          review_count:  rule.review_count,
          interval_days: rule.interval_days,
        })?;
      if interval > MAX_INTERVAL_DAYS {
        return Err(ValidationError::IntervalTooLong {
          review_count:  rule.review_count,
          interval_days: rule.interval_days,
          max:           MAX_INTERVAL_DAYS,
        });
      }
      tiers.push((rule.review_count, interval));
    }

    tiers.sort_by_key(|(count, _)| *count);
    if let Some(pair) = tiers.windows(2).find(|w| w[0].0 == w[1].0) {
      return Err(ValidationError::DuplicateTier(pair[0].0));
    }

    Ok(Self { tiers })
  }

  /// Days until the next occurrence for a card currently at `review_count`.
  pub fn interval_for(&self, review_count: u32) -> u32 {
    let idx = self.tiers.partition_point(|(count, _)| *count <= review_count);
    // `tiers` is never empty; idx == 0 means below the lowest tier.
    self.tiers[idx.saturating_sub(1)].1
  }

  /// Atomically replace every tier. On error the table is left untouched.
  pub fn replace_all(&mut self, rules: &[ReviewRule]) -> Result<(), ValidationError> {
    *self = Self::new(rules)?;
    Ok(())
  }

  pub fn reset_to_default(&mut self) { *self = Self::default(); }

  pub fn rules(&self) -> Vec<ReviewRule> {
    self
      .tiers
      .iter()
      .map(|&(count, days)| ReviewRule::new(count, i64::from(days)))
      .collect()
  }
}

// ─── RuleStore ───────────────────────────────────────────────────────────────

/// Owns the in-memory rule table and keeps it in step with a backend.
///
/// The in-memory table only changes after the backend accepted the change.
pub struct RuleStore<B> {
  backend: B,
  table:   RuleTable,
  notices: Notices,
}

impl<B: RuleTableBackend> RuleStore<B> {
  /// A store holding the default table until [`RuleStore::load`] is called.
  pub fn new(backend: B) -> Self {
    Self { backend, table: RuleTable::default(), notices: Notices::default() }
  }

  pub fn table(&self) -> &RuleTable { &self.table }

  pub fn backend(&self) -> &B { &self.backend }

  pub async fn load(&mut self) -> Result<&RuleTable> {
    let result = self.fetch_and_swap(Fetch::Get).await;
    self.notices.track(Action::LoadRules, result)?;
    Ok(&self.table)
  }

  /// Validate locally, then replace the backend's table, then swap.
  pub async fn replace_all(&mut self, rules: Vec<ReviewRule>) -> Result<&RuleTable> {
    let result = match RuleTable::new(&rules) {
      Ok(_) => self.fetch_and_swap(Fetch::Replace(rules)).await,
      Err(e) => Err(e.into()),
    };
    self.notices.track(Action::ReplaceRules, result)?;
    Ok(&self.table)
  }

  pub async fn reset_to_default(&mut self) -> Result<&RuleTable> {
    let result = self.fetch_and_swap(Fetch::Reset).await;
    self.notices.track(Action::ResetRules, result)?;
    Ok(&self.table)
  }

  pub fn take_notices(&mut self) -> Vec<Notice> { self.notices.take() }

  async fn fetch_and_swap(&mut self, fetch: Fetch) -> Result<()> {
    let rules = match fetch {
      Fetch::Get => self.backend.get_rules().await,
      Fetch::Replace(rules) => self.backend.replace_rules(rules).await,
      Fetch::Reset => self.backend.reset_rules().await,
    }
    .map_err(Into::<Error>::into)?;

    self.table = RuleTable::new(&rules)?;
    tracing::debug!(tiers = self.table.tiers.len(), "rule table updated");
    Ok(())
  }
}

enum Fetch {
  Get,
  Replace(Vec<ReviewRule>),
  Reset,
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::memory::MemoryRules;

  fn table(pairs: &[(u32, i64)]) -> RuleTable {
    let rules: Vec<_> = pairs.iter().map(|&(c, d)| ReviewRule::new(c, d)).collect();
    RuleTable::new(&rules).unwrap()
  }

  #[test]
  fn interval_lookup_and_clamp() {
    let t = table(&[(0, 1), (1, 3), (2, 7)]);
    assert_eq!(t.interval_for(0), 1);
    assert_eq!(t.interval_for(1), 3);
    assert_eq!(t.interval_for(2), 7);
    assert_eq!(t.interval_for(3), 7);
    assert_eq!(t.interval_for(500), 7);
  }

  #[test]
  fn gaps_use_lower_tier_and_floor_uses_lowest() {
    let t = table(&[(5, 10), (2, 4)]);
    assert_eq!(t.interval_for(0), 4);
    assert_eq!(t.interval_for(3), 4);
    assert_eq!(t.interval_for(5), 10);
    assert_eq!(t.rules()[0].review_count, 2);
  }

  #[test]
  fn rejects_bad_tables() {
    assert_eq!(RuleTable::new(&[]), Err(ValidationError::EmptyRuleTable));
    assert_eq!(
      RuleTable::new(&[ReviewRule::new(0, 1), ReviewRule::new(0, 2)]),
      Err(ValidationError::DuplicateTier(0))
    );
    assert!(matches!(
      RuleTable::new(&[ReviewRule::new(1, 0)]),
      Err(ValidationError::NonPositiveInterval { review_count: 1, .. })
    ));
    assert!(matches!(
      RuleTable::new(&[ReviewRule::new(1, -3)]),
      Err(ValidationError::NonPositiveInterval { interval_days: -3, .. })
    ));
  }

  #[test]
  fn rejects_intervals_past_the_cap() {
    let limit = i64::from(MAX_INTERVAL_DAYS);
    assert!(RuleTable::new(&[ReviewRule::new(0, limit)]).is_ok());
    assert_eq!(
      RuleTable::new(&[ReviewRule::new(0, 100_000_000)]),
      Err(ValidationError::IntervalTooLong {
        review_count:  0,
        interval_days: 100_000_000,
        max:           MAX_INTERVAL_DAYS,
      })
    );
  }

  #[test]
  fn failed_replace_leaves_table_untouched() {
    let mut t = RuleTable::default();
    let before = t.clone();
    let err = t.replace_all(&[ReviewRule::new(0, 2), ReviewRule::new(1, 0)]);
    assert!(err.is_err());
    assert_eq!(t, before);
  }

  #[test]
  fn replace_then_reset_restores_defaults() {
    let mut t = RuleTable::default();
    t.replace_all(&[ReviewRule::new(0, 9)]).unwrap();
    assert_eq!(t.interval_for(3), 9);
    t.reset_to_default();
    for (count, days) in DEFAULT_RULES {
      assert_eq!(t.interval_for(count), days);
    }
  }

  #[tokio::test]
  async fn rule_store_validates_before_backend() {
    let mut store = RuleStore::new(MemoryRules::default());
    store.load().await.unwrap();

    let err = store
      .replace_all(vec![ReviewRule::new(0, 1), ReviewRule::new(0, 4)])
      .await
      .unwrap_err();
    assert!(matches!(err, Error::Validation(ValidationError::DuplicateTier(0))));
    // The backend never saw the rejected batch.
    assert_eq!(store.backend().snapshot(), RuleTable::default().rules());

    let notices = store.take_notices();
    assert!(notices[0].is_success());
    assert!(!notices[1].is_success());
  }

  #[tokio::test]
  async fn rule_store_replace_and_reset_round_trip() {
    let mut store = RuleStore::new(MemoryRules::default());
    store
      .replace_all(vec![ReviewRule::new(0, 1), ReviewRule::new(1, 3), ReviewRule::new(2, 7)])
      .await
      .unwrap();
    assert_eq!(store.table().interval_for(9), 7);
    assert_eq!(store.backend().snapshot().len(), 3);

    store.reset_to_default().await.unwrap();
    assert_eq!(store.table(), &RuleTable::default());
    assert_eq!(store.backend().snapshot(), RuleTable::default().rules());
  }
}
