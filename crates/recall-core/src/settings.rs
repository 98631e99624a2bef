//! Scheduler settings.
//!
//! These values are stored and exposed but no scheduling code reads them: the
//! rule table alone decides intervals. They are kept so an ease-based
//! algorithm can be added later without a storage migration.

use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  notice::{Action, Notice, Notices},
  repository::KeyValueStore,
};

pub const SETTINGS_KEY: &str = "settings";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
  pub daily_new_cards:    u32,
  pub daily_review_cards: u32,
  pub interval_modifier:  f64,
  pub easy_bonus:         f64,
  pub starting_ease:      f64,
}

impl Default for SchedulerSettings {
  fn default() -> Self {
    Self {
      daily_new_cards:    20,
      daily_review_cards: 100,
      interval_modifier:  1.0,
      easy_bonus:         1.3,
      starting_ease:      2.5,
    }
  }
}

/// A partial update; `None` fields are left as they are.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsPatch {
  pub daily_new_cards:    Option<u32>,
  pub daily_review_cards: Option<u32>,
  pub interval_modifier:  Option<f64>,
  pub easy_bonus:         Option<f64>,
  pub starting_ease:      Option<f64>,
}

impl SchedulerSettings {
  pub fn patched(&self, patch: &SettingsPatch) -> Self {
    Self {
      daily_new_cards:    patch.daily_new_cards.unwrap_or(self.daily_new_cards),
      daily_review_cards: patch.daily_review_cards.unwrap_or(self.daily_review_cards),
      interval_modifier:  patch.interval_modifier.unwrap_or(self.interval_modifier),
      easy_bonus:         patch.easy_bonus.unwrap_or(self.easy_bonus),
      starting_ease:      patch.starting_ease.unwrap_or(self.starting_ease),
    }
  }
}

pub struct SettingsStore<K> {
  kv:       K,
  settings: SchedulerSettings,
  notices:  Notices,
}

impl<K: KeyValueStore> SettingsStore<K> {
  pub fn new(kv: K) -> Self {
    Self { kv, settings: SchedulerSettings::default(), notices: Notices::default() }
  }

  pub fn settings(&self) -> &SchedulerSettings { &self.settings }

  /// Load stored values; fields missing from storage keep their defaults.
  pub async fn initialize(&mut self) -> Result<&SchedulerSettings> {
    let stored = self.kv.get_item(SETTINGS_KEY).await.map_err(Into::<Error>::into)?;
    if let Some(value) = stored {
      self.settings = serde_json::from_value(value)?;
    }
    Ok(&self.settings)
  }

  pub async fn update(&mut self, patch: &SettingsPatch) -> Result<&SchedulerSettings> {
    let next = self.settings.patched(patch);
    let result = self.persist_and_swap(next).await;
    self.notices.track(Action::UpdateSettings, result)?;
    Ok(&self.settings)
  }

  pub async fn reset(&mut self) -> Result<&SchedulerSettings> {
    let result = self.persist_and_swap(SchedulerSettings::default()).await;
    self.notices.track(Action::UpdateSettings, result)?;
    Ok(&self.settings)
  }

  pub fn take_notices(&mut self) -> Vec<Notice> { self.notices.take() }

  async fn persist_and_swap(&mut self, next: SchedulerSettings) -> Result<()> {
    let value = serde_json::to_value(&next)?;
    self.kv.set_item(SETTINGS_KEY, value).await.map_err(Into::<Error>::into)?;
    self.settings = next;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::memory::MemoryKv;

  #[tokio::test]
  async fn stored_values_merge_over_defaults() {
    let kv = MemoryKv::default();
    kv.set_item(SETTINGS_KEY, serde_json::json!({ "easy_bonus": 1.5 }))
      .await
      .unwrap();

    let mut store = SettingsStore::new(kv);
    let s = store.initialize().await.unwrap();
    assert_eq!(s.easy_bonus, 1.5);
    assert_eq!(s.daily_new_cards, 20);
  }

  #[tokio::test]
  async fn update_and_reset() {
    let kv = MemoryKv::default();
    let mut store = SettingsStore::new(kv.clone());
    store
      .update(&SettingsPatch { daily_review_cards: Some(40), ..Default::default() })
      .await
      .unwrap();
    assert_eq!(store.settings().daily_review_cards, 40);
    assert_eq!(store.settings().starting_ease, 2.5);

    let mut reloaded = SettingsStore::new(kv.clone());
    assert_eq!(reloaded.initialize().await.unwrap().daily_review_cards, 40);

    store.reset().await.unwrap();
    assert_eq!(store.settings(), &SchedulerSettings::default());
  }

  #[tokio::test]
  async fn failed_update_keeps_old_values() {
    let kv = MemoryKv::default();
    let mut store = SettingsStore::new(kv.clone());
    kv.set_failing(true);
    let patch = SettingsPatch { daily_new_cards: Some(1), ..Default::default() };
    assert!(store.update(&patch).await.is_err());
    assert_eq!(store.settings().daily_new_cards, 20);
    assert!(!store.take_notices()[0].is_success());
  }
}
