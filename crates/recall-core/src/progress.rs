//! Learning statistics.
//!
//! [`ProgressSnapshot`] is plain data with pure update methods.
//! [`ProgressStore`] owns the live snapshot and persists every change through
//! a [`KeyValueStore`]: it updates a copy, persists the copy, and only then
//! swaps it in, so a failed write leaves the visible snapshot untouched.
//!
//! Days are UTC dates throughout.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  calendar::{days_between, utc_date},
  notice::{Action, Notice, Notices},
  repository::KeyValueStore,
};

/// Key under which the snapshot is persisted.
pub const PROGRESS_KEY: &str = "progress";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyStat {
  pub reviews:    u64,
  pub correct:    u64,
  /// Minutes.
  pub study_time: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressSnapshot {
  pub total_reviews:     u64,
  pub correct_reviews:   u64,
  /// Total minutes studied.
  pub study_time:        u64,
  pub daily_streak:      u32,
  pub last_study_date:   Option<NaiveDate>,
  /// The day the streak was last evaluated; makes `refresh_streak` a no-op
  /// for the rest of that day.
  pub streak_checked_on: Option<NaiveDate>,
  pub daily_stats:       BTreeMap<NaiveDate, DailyStat>,
}

impl ProgressSnapshot {
  /// Fraction of reviews remembered, in `0.0..=1.0`. Zero with no reviews.
  pub fn accuracy(&self) -> f64 {
    if self.total_reviews == 0 {
      return 0.0;
    }
    self.correct_reviews as f64 / self.total_reviews as f64
  }

  /// Record one review outcome at `at`.
  pub fn record(&mut self, remembered: bool, at: DateTime<Utc>) {
    let today = utc_date(at);

    self.total_reviews += 1;
    if remembered {
      self.correct_reviews += 1;
    }

    let day = self.daily_stats.entry(today).or_default();
    day.reviews += 1;
    if remembered {
      day.correct += 1;
    }

    self.refresh_streak(at);
    if self.last_study_date < Some(today) && self.daily_streak == 0 {
      self.daily_streak = 1;
    }
    // A late-arriving review for an earlier day never rewinds the streak.
    self.last_study_date = self.last_study_date.max(Some(today));
  }

  /// Re-evaluate the streak against `last_study_date`. Runs at most once per
  /// calendar day.
  pub fn refresh_streak(&mut self, now: DateTime<Utc>) {
    let today = utc_date(now);
    if self.streak_checked_on >= Some(today) {
      return;
    }
    self.streak_checked_on = Some(today);

    let Some(last) = self.last_study_date else {
      self.daily_streak = 0;
      return;
    };

    match days_between(last, today) {
      diff if diff > 1 => self.daily_streak = 0,
      1 => self.daily_streak += 1,
      _ => {}
    }
  }

  pub fn record_study_time(&mut self, minutes: u64, at: DateTime<Utc>) {
    self.study_time += minutes;
    self.daily_stats.entry(utc_date(at)).or_default().study_time += minutes;
  }

  /// Whether the cumulative counters agree with the per-day entries.
  pub fn is_consistent(&self) -> bool {
    let daily_reviews: u64 = self.daily_stats.values().map(|d| d.reviews).sum();
    let daily_correct: u64 = self.daily_stats.values().map(|d| d.correct).sum();
    self.correct_reviews <= self.total_reviews
      && daily_reviews == self.total_reviews
      && daily_correct == self.correct_reviews
  }
}

// ─── ProgressStore ───────────────────────────────────────────────────────────

/// Sole owner and writer of a [`ProgressSnapshot`].
pub struct ProgressStore<K> {
  kv:       K,
  snapshot: ProgressSnapshot,
  notices:  Notices,
}

impl<K: KeyValueStore> ProgressStore<K> {
  pub fn new(kv: K) -> Self {
    Self { kv, snapshot: ProgressSnapshot::default(), notices: Notices::default() }
  }

  pub fn snapshot(&self) -> &ProgressSnapshot { &self.snapshot }

  pub fn accuracy(&self) -> f64 { self.snapshot.accuracy() }

  pub fn kv(&self) -> &K { &self.kv }

  /// Load the persisted snapshot (if any) and bring the streak up to date.
  pub async fn initialize(&mut self, now: DateTime<Utc>) -> Result<&ProgressSnapshot> {
    let stored = self.kv.get_item(PROGRESS_KEY).await.map_err(Into::<Error>::into)?;
    if let Some(value) = stored {
      self.snapshot = serde_json::from_value(value)?;
    }
    self.refresh_streak(now).await
  }

  pub async fn record(
    &mut self,
    remembered: bool,
    at: DateTime<Utc>,
  ) -> Result<&ProgressSnapshot> {
    let result = self.commit(|s| s.record(remembered, at)).await;
    self.notices.track(Action::RecordProgress, result)?;
    Ok(&self.snapshot)
  }

  pub async fn refresh_streak(&mut self, now: DateTime<Utc>) -> Result<&ProgressSnapshot> {
    let mut next = self.snapshot.clone();
    next.refresh_streak(now);
    if next != self.snapshot {
      self.persist_and_swap(next).await?;
    }
    Ok(&self.snapshot)
  }

  pub async fn record_study_time(
    &mut self,
    minutes: u64,
    at: DateTime<Utc>,
  ) -> Result<&ProgressSnapshot> {
    self.commit(|s| s.record_study_time(minutes, at)).await?;
    Ok(&self.snapshot)
  }

  /// Discard all statistics, in memory and in storage.
  pub async fn reset(&mut self) -> Result<()> {
    self.persist_and_swap(ProgressSnapshot::default()).await
  }

  pub fn take_notices(&mut self) -> Vec<Notice> { self.notices.take() }

  async fn commit(&mut self, apply: impl FnOnce(&mut ProgressSnapshot)) -> Result<()> {
    let mut next = self.snapshot.clone();
    apply(&mut next);
    self.persist_and_swap(next).await
  }

  async fn persist_and_swap(&mut self, next: ProgressSnapshot) -> Result<()> {
    let value = serde_json::to_value(&next)?;
    if let Err(e) = self.kv.set_item(PROGRESS_KEY, value).await {
      let e: Error = e.into();
      tracing::warn!(error = %e, "failed to persist progress; keeping previous snapshot");
      return Err(e);
    }
    self.snapshot = next;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use chrono::{Duration, TimeZone};

  use super::*;
  use crate::memory::MemoryKv;

  fn day(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, 1, 8, 0, 0).unwrap() + Duration::days(n)
  }

  #[test]
  fn accuracy_is_zero_without_reviews() {
    let p = ProgressSnapshot::default();
    assert_eq!(p.accuracy(), 0.0);
    assert!(!p.accuracy().is_nan());
  }

  #[test]
  fn record_counts_and_daily_entry() {
    let mut p = ProgressSnapshot::default();
    p.record(true, day(0));
    p.record(false, day(0));
    p.record(true, day(0));

    assert_eq!(p.total_reviews, 3);
    assert_eq!(p.correct_reviews, 2);
    let stat = p.daily_stats[&day(0).date_naive()];
    assert_eq!((stat.reviews, stat.correct), (3, 2));
    assert!((p.accuracy() - 2.0 / 3.0).abs() < f64::EPSILON);
    assert_eq!(p.last_study_date, Some(day(0).date_naive()));
    assert!(p.is_consistent());
  }

  #[test]
  fn two_consecutive_days_give_streak_two() {
    let mut p = ProgressSnapshot::default();
    for _ in 0..3 {
      p.record(true, day(0));
    }
    for i in 0..5 {
      p.record(i % 2 == 0, day(1));
    }
    assert_eq!(p.total_reviews, 8);
    assert_eq!(p.daily_streak, 2);
    assert!(p.is_consistent());
  }

  #[test]
  fn gap_resets_streak_and_next_review_restarts_it() {
    let mut p = ProgressSnapshot::default();
    p.record(true, day(0));
    p.record(true, day(1));
    assert_eq!(p.daily_streak, 2);

    p.refresh_streak(day(4));
    assert_eq!(p.daily_streak, 0);

    p.record(true, day(4));
    assert_eq!(p.daily_streak, 1);
  }

  #[test]
  fn refresh_streak_is_idempotent_per_day() {
    let mut p = ProgressSnapshot::default();
    p.record(true, day(0));
    assert_eq!(p.daily_streak, 1);

    p.refresh_streak(day(1));
    p.refresh_streak(day(1) + Duration::hours(3));
    assert_eq!(p.daily_streak, 2);

    // A review later that day does not count the day twice.
    p.record(true, day(1) + Duration::hours(5));
    assert_eq!(p.daily_streak, 2);
  }

  #[test]
  fn refresh_without_history_keeps_zero() {
    let mut p = ProgressSnapshot::default();
    p.refresh_streak(day(0));
    assert_eq!(p.daily_streak, 0);
  }

  #[test]
  fn study_time_does_not_touch_review_counts() {
    let mut p = ProgressSnapshot::default();
    p.record_study_time(12, day(0));
    p.record(true, day(0));
    p.record_study_time(3, day(0));
    assert_eq!(p.study_time, 15);
    assert_eq!(p.daily_stats[&day(0).date_naive()].study_time, 15);
    assert!(p.is_consistent());
  }

  #[test]
  fn correct_never_exceeds_total() {
    let mut p = ProgressSnapshot::default();
    for i in 0..50 {
      p.record(i % 3 != 0, day(i / 7));
      assert!(p.correct_reviews <= p.total_reviews);
    }
    assert!(p.is_consistent());
  }

  #[test]
  fn earlier_review_does_not_rewind_the_streak() {
    let mut p = ProgressSnapshot::default();
    p.record(true, day(0));
    p.record(true, day(1));
    assert_eq!(p.daily_streak, 2);

    p.record(true, day(0));
    assert_eq!(p.last_study_date, Some(day(1).date_naive()));
    assert_eq!(p.streak_checked_on, Some(day(1).date_naive()));

    p.record(true, day(1));
    assert_eq!(p.daily_streak, 2);
    assert_eq!(p.total_reviews, 4);
    assert_eq!(p.daily_stats[&day(0).date_naive()].reviews, 2);
    assert!(p.is_consistent());
  }

  #[tokio::test]
  async fn store_persists_and_reloads() {
    let kv = MemoryKv::default();
    let mut store = ProgressStore::new(kv.clone());
    store.initialize(day(0)).await.unwrap();
    store.record(true, day(0)).await.unwrap();
    store.record(false, day(0)).await.unwrap();

    let mut reloaded = ProgressStore::new(kv);
    let snap = reloaded.initialize(day(0)).await.unwrap();
    assert_eq!(snap.total_reviews, 2);
    assert_eq!(snap.correct_reviews, 1);
  }

  #[tokio::test]
  async fn failed_persist_leaves_snapshot_unchanged() {
    let kv = MemoryKv::default();
    let mut store = ProgressStore::new(kv.clone());
    store.record(true, day(0)).await.unwrap();
    let before = store.snapshot().clone();

    kv.set_failing(true);
    let err = store.record(true, day(1)).await.unwrap_err();
    assert!(matches!(err, Error::Transport(_)));
    assert_eq!(store.snapshot(), &before);

    let notices = store.take_notices();
    assert!(notices[0].is_success());
    assert!(!notices[1].is_success());

    kv.set_failing(false);
    store.record(true, day(1)).await.unwrap();
    assert_eq!(store.snapshot().total_reviews, 2);
    assert_eq!(store.snapshot().daily_streak, 2);
  }

  #[tokio::test]
  async fn reset_clears_storage() {
    let kv = MemoryKv::default();
    let mut store = ProgressStore::new(kv.clone());
    store.record(true, day(0)).await.unwrap();
    store.reset().await.unwrap();
    assert_eq!(store.snapshot(), &ProgressSnapshot::default());

    let mut reloaded = ProgressStore::new(kv);
    assert_eq!(reloaded.initialize(day(0)).await.unwrap().total_reviews, 0);
  }
}
